//! Relay: routes inbound chat events to greet, clear or converse.
//!
//! ```text
//! Telegram update ─► Inbound ─► Relay::handle ─► Outbox (reply / typing)
//!                                   │
//!                        HistoryStore + LlmProvider
//! ```
//!
//! `Relay` owns the conversation state explicitly and is shared as
//! `Arc<Relay>`. Each inbound event is handled to completion; the
//! completion call runs on its own task so the dispatcher keeps serving
//! other chats meanwhile.

pub mod replies;

use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::comms::Outbox;
use crate::llm::{LlmProvider, TRANSPORT_FALLBACK};
use crate::memory::{self, ChatMessage, ConversationId, HistoryStore};

/// An inbound event from the chat platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// The `/start` command.
    Start,
    /// The `/clear` command.
    Clear,
    /// Anything else. `None` when the message carries no text
    /// (stickers, photos without caption…).
    Message(Option<String>),
}

pub struct Relay {
    history: HistoryStore,
    llm: LlmProvider,
}

impl Relay {
    pub fn new(history: HistoryStore, llm: LlmProvider) -> Self {
        Self { history, llm }
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    /// Handle one inbound event for conversation `id`, replying through `out`.
    pub async fn handle<O: Outbox>(&self, id: ConversationId, event: Inbound, out: &O) {
        match event {
            Inbound::Start => self.start(id, out).await,
            Inbound::Clear => self.clear(id, out).await,
            Inbound::Message(text) => self.converse(id, text, out).await,
        }
    }

    async fn start<O: Outbox>(&self, id: ConversationId, out: &O) {
        debug!(conversation = %id, "start command");
        out.send_text(replies::GREETING).await;
    }

    async fn clear<O: Outbox>(&self, id: ConversationId, out: &O) {
        let text = if self.history.clear(id) {
            info!(conversation = %id, "conversation history cleared");
            replies::HISTORY_CLEARED
        } else {
            replies::NOTHING_TO_CLEAR
        };
        out.send_text(text).await;
    }

    async fn converse<O: Outbox>(&self, id: ConversationId, text: Option<String>, out: &O) {
        let Some(text) = text else {
            debug!(conversation = %id, "non-text message ignored");
            out.send_text(replies::TEXT_ONLY).await;
            return;
        };

        out.send_typing().await;

        let limit = self.history.limit();
        let mut turn = self.history.get(id);
        turn.push(ChatMessage::user(text));
        memory::window(&mut turn, limit);

        debug!(conversation = %id, history_len = turn.len(), "requesting completion");
        let reply = self.complete_off_loop(turn.clone()).await;

        turn.push(ChatMessage::assistant(reply.clone()));
        memory::window(&mut turn, limit);
        self.history.replace(id, turn);

        out.send_text(&reply).await;
    }

    /// Run the completion on a separate task and wait for it. A task that
    /// panics or is cancelled degrades to the transport fallback.
    async fn complete_off_loop(&self, history: Vec<ChatMessage>) -> String {
        let llm = self.llm.clone();
        join_reply(tokio::spawn(async move { llm.reply(&history).await })).await
    }
}

async fn join_reply(worker: JoinHandle<String>) -> String {
    match worker.await {
        Ok(reply) => reply,
        Err(e) => {
            error!(error = %e, "completion task failed");
            TRANSPORT_FALLBACK.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::llm::providers::dummy::DummyProvider;
    use crate::memory::Role;

    #[derive(Debug, PartialEq, Eq)]
    enum Sent {
        Typing,
        Text(String),
    }

    #[derive(Default)]
    struct RecordingOutbox {
        sent: Mutex<Vec<Sent>>,
    }

    impl RecordingOutbox {
        fn take(&self) -> Vec<Sent> {
            std::mem::take(&mut *self.sent.lock().unwrap())
        }
    }

    impl Outbox for RecordingOutbox {
        async fn send_typing(&self) {
            self.sent.lock().unwrap().push(Sent::Typing);
        }

        async fn send_text(&self, text: &str) {
            self.sent.lock().unwrap().push(Sent::Text(text.to_string()));
        }
    }

    const CHAT: ConversationId = ConversationId(42);

    fn relay(limit: usize) -> Relay {
        Relay::new(HistoryStore::new(limit), LlmProvider::Dummy(DummyProvider))
    }

    #[tokio::test]
    async fn start_sends_greeting_without_state_change() {
        let relay = relay(25);
        let out = RecordingOutbox::default();
        relay.handle(CHAT, Inbound::Start, &out).await;
        assert_eq!(out.take(), vec![Sent::Text(replies::GREETING.into())]);
        assert!(relay.history().get(CHAT).is_empty());
    }

    #[tokio::test]
    async fn clear_without_history() {
        let relay = relay(25);
        let out = RecordingOutbox::default();
        relay.handle(CHAT, Inbound::Clear, &out).await;
        assert_eq!(out.take(), vec![Sent::Text(replies::NOTHING_TO_CLEAR.into())]);
    }

    #[tokio::test]
    async fn clear_after_conversation() {
        let relay = relay(25);
        let out = RecordingOutbox::default();
        relay.handle(CHAT, Inbound::Message(Some("hello".into())), &out).await;
        out.take();

        relay.handle(CHAT, Inbound::Clear, &out).await;
        assert_eq!(out.take(), vec![Sent::Text(replies::HISTORY_CLEARED.into())]);
        assert!(relay.history().get(CHAT).is_empty());
    }

    #[tokio::test]
    async fn non_text_message_asks_for_text() {
        let relay = relay(25);
        let out = RecordingOutbox::default();
        relay.handle(CHAT, Inbound::Message(None), &out).await;
        assert_eq!(out.take(), vec![Sent::Text(replies::TEXT_ONLY.into())]);
        assert!(relay.history().get(CHAT).is_empty());
    }

    #[tokio::test]
    async fn text_message_runs_one_turn() {
        let relay = relay(25);
        let out = RecordingOutbox::default();
        relay.handle(CHAT, Inbound::Message(Some("hello".into())), &out).await;

        assert_eq!(out.take(), vec![Sent::Typing, Sent::Text("[echo] hello".into())]);
        assert_eq!(
            relay.history().get(CHAT),
            vec![ChatMessage::user("hello"), ChatMessage::assistant("[echo] hello")]
        );
    }

    #[tokio::test]
    async fn history_stays_within_window_and_alternates() {
        let relay = relay(5);
        let out = RecordingOutbox::default();
        for i in 0..4 {
            relay.handle(CHAT, Inbound::Message(Some(format!("m{i}"))), &out).await;
        }
        let history = relay.history().get(CHAT);
        assert_eq!(history.len(), 5);
        // Oldest dropped first: m1's assistant reply now leads.
        assert_eq!(history[0], ChatMessage::assistant("[echo] m1"));
        assert_eq!(history[4], ChatMessage::assistant("[echo] m3"));
        assert_eq!(history[3].role, Role::User);
    }

    #[tokio::test]
    async fn panicked_worker_yields_transport_fallback() {
        let worker: JoinHandle<String> = tokio::spawn(async { panic!("provider blew up") });
        assert_eq!(join_reply(worker).await, TRANSPORT_FALLBACK);
    }

    #[tokio::test]
    async fn cancelled_worker_yields_transport_fallback() {
        let worker = tokio::spawn(std::future::pending::<String>());
        worker.abort();
        assert_eq!(join_reply(worker).await, TRANSPORT_FALLBACK);
    }

    #[tokio::test]
    async fn finished_worker_reply_passes_through() {
        let worker = tokio::spawn(async { "done".to_string() });
        assert_eq!(join_reply(worker).await, "done");
    }

    #[tokio::test]
    async fn conversations_do_not_share_history() {
        let relay = relay(25);
        let out = RecordingOutbox::default();
        relay.handle(ConversationId(1), Inbound::Message(Some("a".into())), &out).await;
        relay.handle(ConversationId(2), Inbound::Message(Some("b".into())), &out).await;
        assert_eq!(relay.history().get(ConversationId(1))[0], ChatMessage::user("a"));
        assert_eq!(relay.history().get(ConversationId(2))[0], ChatMessage::user("b"));
    }
}
