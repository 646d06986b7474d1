//! In-memory conversation history.
//!
//! [`HistoryStore`] maps a [`ConversationId`] to the most recent messages of
//! that conversation, capped at a fixed window (FIFO: oldest dropped first).
//! Nothing is persisted; a history lives until it is cleared or the process
//! exits.

pub mod types;

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

pub use types::{ChatMessage, ConversationId, Role};

/// Default number of messages kept per conversation.
pub const DEFAULT_HISTORY_LIMIT: usize = 25;

/// Drop entries from the front of `messages` until at most `limit` remain.
/// Relative order of the kept entries is unchanged.
pub fn window(messages: &mut Vec<ChatMessage>, limit: usize) {
    if messages.len() > limit {
        let excess = messages.len() - limit;
        messages.drain(..excess);
    }
}

/// Process-wide map of conversation histories.
///
/// The lock is only held for the duration of a single map operation and
/// never across an `.await`.
pub struct HistoryStore {
    limit: usize,
    histories: Mutex<HashMap<ConversationId, Vec<ChatMessage>>>,
}

impl HistoryStore {
    /// `limit` is clamped to at least one message.
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            histories: Mutex::new(HashMap::new()),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ConversationId, Vec<ChatMessage>>> {
        // A panic elsewhere cannot leave a half-written Vec behind, so the
        // map is still usable after poisoning.
        self.histories.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append `message` to the history of `id`, creating it if absent, then
    /// trim to the window.
    pub fn append(&self, id: ConversationId, message: ChatMessage) {
        let mut map = self.lock();
        let history = map.entry(id).or_default();
        history.push(message);
        window(history, self.limit);
    }

    /// Current history of `id`, or an empty list for unknown ids.
    pub fn get(&self, id: ConversationId) -> Vec<ChatMessage> {
        self.lock().get(&id).cloned().unwrap_or_default()
    }

    /// Overwrite the history of `id` with `messages`, trimmed to the window.
    pub fn replace(&self, id: ConversationId, mut messages: Vec<ChatMessage>) {
        window(&mut messages, self.limit);
        debug!(conversation = %id, len = messages.len(), "history stored");
        self.lock().insert(id, messages);
    }

    /// Remove the history of `id`. Returns `true` if one existed.
    pub fn clear(&self, id: ConversationId) -> bool {
        let removed = self.lock().remove(&id).is_some();
        debug!(conversation = %id, removed, "history cleared");
        removed
    }
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}
