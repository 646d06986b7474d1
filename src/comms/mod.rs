//! Comms: the boundary between the relay and the chat platform.
//!
//! The relay only talks to the platform through [`Outbox`], so it can be
//! driven by Telegram in production and by a recording double in tests.

pub mod telegram;

use std::future::Future;

/// Outbound operations the relay needs from a chat platform, already bound
/// to one conversation.
///
/// Both operations are best effort: failures are logged by the
/// implementation and never reach the relay.
pub trait Outbox: Send + Sync {
    /// Show a "typing…" indicator.
    fn send_typing(&self) -> impl Future<Output = ()> + Send;

    /// Deliver `text` to the user.
    fn send_text(&self, text: &str) -> impl Future<Output = ()> + Send;
}

/// Split `text` into chunks of at most `max_chars` characters.
/// Splits on `char` boundaries, never inside a UTF-8 sequence.
pub fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(max_chars.max(1))
        .map(|chunk| chunk.iter().collect())
        .collect()
}
