//! Telegram channel: long-polls the Bot API, turns updates into
//! [`Inbound`] events for the [`Relay`] and sends its replies back.

use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::types::{ChatAction, MessageId, ReplyParameters};
use teloxide::utils::command::BotCommands;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Secret;
use crate::error::AppError;
use crate::memory::ConversationId;
use crate::relay::{Inbound, Relay};
use super::{split_message, Outbox};

// ── Constants ────────────────────────────────────────────────────────────────

/// Telegram has a 4096 character limit per message.
/// We chunk at 4000 to be safe.
const MAX_MESSAGE_LENGTH: usize = 4000;

/// Telegram rejects empty messages.
const EMPTY_REPLY: &str = "(empty response)";

// ── Commands ─────────────────────────────────────────────────────────────────

#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase")]
enum Command {
    #[command(description = "greeting and help")]
    Start,
    #[command(description = "forget this conversation")]
    Clear,
}

impl From<Command> for Inbound {
    fn from(cmd: Command) -> Self {
        match cmd {
            Command::Start => Inbound::Start,
            Command::Clear => Inbound::Clear,
        }
    }
}

// ── Outbox ───────────────────────────────────────────────────────────────────

/// Replies to one triggering message in one chat.
struct TelegramOutbox {
    bot: Bot,
    chat_id: ChatId,
    reply_to: MessageId,
}

impl Outbox for TelegramOutbox {
    async fn send_typing(&self) {
        if let Err(e) = self.bot.send_chat_action(self.chat_id, ChatAction::Typing).await {
            warn!(chat_id = %self.chat_id, "failed to send typing indicator: {e}");
        }
    }

    async fn send_text(&self, text: &str) {
        for chunk in outbound_chunks(text) {
            let sent = self
                .bot
                .send_message(self.chat_id, chunk)
                .reply_parameters(ReplyParameters::new(self.reply_to))
                .await;
            if let Err(e) = sent {
                warn!(chat_id = %self.chat_id, "failed to send telegram reply: {e}");
            }
        }
    }
}

/// The messages actually sent for a reply: never empty, each within
/// Telegram's length limit.
fn outbound_chunks(text: &str) -> Vec<String> {
    let text = if text.is_empty() { EMPTY_REPLY } else { text };
    split_message(text, MAX_MESSAGE_LENGTH)
}

// ── Handlers ─────────────────────────────────────────────────────────────────

async fn on_command(bot: Bot, msg: Message, cmd: Command, relay: Arc<Relay>) -> ResponseResult<()> {
    debug!(chat_id = %msg.chat.id, command = ?cmd, "telegram command");
    forward(bot, &msg, cmd.into(), &relay).await;
    Ok(())
}

async fn on_message(bot: Bot, msg: Message, relay: Arc<Relay>) -> ResponseResult<()> {
    debug!(
        chat_id = %msg.chat.id,
        from = ?msg.from.as_ref().and_then(|u| u.username.as_ref()),
        has_text = msg.text().is_some(),
        "telegram received message"
    );
    let event = Inbound::Message(msg.text().map(str::to_owned));
    forward(bot, &msg, event, &relay).await;
    Ok(())
}

async fn forward(bot: Bot, msg: &Message, event: Inbound, relay: &Relay) {
    let outbox = TelegramOutbox { bot, chat_id: msg.chat.id, reply_to: msg.id };
    relay.handle(ConversationId(msg.chat.id.0), event, &outbox).await;
}

// ── run_telegram ─────────────────────────────────────────────────────────────

/// Poll Telegram until the dispatcher stops or `shutdown` is cancelled.
///
/// Updates from one chat are handled one at a time (teloxide's default
/// per-chat distribution); different chats run concurrently.
pub async fn run_telegram(
    token: &Secret,
    relay: Arc<Relay>,
    shutdown: CancellationToken,
) -> Result<(), AppError> {
    info!("telegram channel starting");

    let bot = Bot::new(token.expose());

    let handler = Update::filter_message()
        .branch(dptree::entry().filter_command::<Command>().endpoint(on_command))
        .branch(dptree::endpoint(on_message));

    let mut dispatcher = Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![relay])
        .default_handler(|upd| async move {
            debug!(update_id = ?upd.id, "ignoring non-message update");
        })
        .build();

    tokio::select! {
        biased;

        _ = shutdown.cancelled() => {
            info!("shutdown signal received, closing telegram channel");
            Ok(())
        }
        _ = dispatcher.dispatch() => {
            warn!("telegram dispatcher exited unexpectedly");
            Err(AppError::Comms("telegram dispatcher exited".into()))
        }
    }
}
