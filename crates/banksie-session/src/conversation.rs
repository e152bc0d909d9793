//! Chat transcript and session bookkeeping
//!
//! Only one session is active at a time. Starting a new one cancels the
//! previous session's token, and any update still carrying the old session
//! id is dropped by [`Conversation::apply`].

use crate::session::{Session, SessionConfig, SessionUpdate};
use banksie_core::{ChatMessage, ResponderSource, SessionId, StreamUpdate};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

#[derive(Debug)]
struct ActiveSession {
    id: SessionId,
    cancel: CancellationToken,
}

#[derive(Debug, Default)]
pub struct Conversation {
    /// Finalized messages, append-only between resets
    messages: Vec<ChatMessage>,
    /// Latest partial snapshot of the active session
    streaming_text: String,
    active: Option<ActiveSession>,
    next_session: u64,
    config: SessionConfig,
}

impl Conversation {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn streaming_text(&self) -> &str {
        &self.streaming_text
    }

    pub fn active_session(&self) -> Option<SessionId> {
        self.active.as_ref().map(|a| a.id)
    }

    pub fn is_streaming(&self) -> bool {
        self.active.is_some()
    }

    /// Append previously persisted messages
    pub fn load_history(&mut self, messages: impl IntoIterator<Item = ChatMessage>) {
        self.messages.extend(messages);
    }

    /// Record the user's message and open a new session slot.
    ///
    /// Cancels any outstanding session. Returns `None` for blank input.
    pub fn begin(&mut self, message: &str) -> Option<(SessionId, CancellationToken)> {
        if message.trim().is_empty() {
            return None;
        }

        self.cancel_active();
        self.messages.push(ChatMessage::user(message));

        self.next_session += 1;
        let id = SessionId(self.next_session);
        let cancel = CancellationToken::new();
        self.active = Some(ActiveSession {
            id,
            cancel: cancel.clone(),
        });
        debug!("Began {}", id);
        Some((id, cancel))
    }

    /// [`Conversation::begin`] plus a ready-to-drive [`Session`]
    pub fn send(&mut self, source: Arc<dyn ResponderSource>, message: &str) -> Option<Session> {
        let (id, cancel) = self.begin(message)?;
        Some(Session::start(
            id,
            source,
            message,
            self.config.clone(),
            cancel,
        ))
    }

    /// Apply an update to the transcript.
    ///
    /// Returns `false` (and changes nothing) when the update belongs to a
    /// session that is no longer active.
    pub fn apply(&mut self, update: SessionUpdate) -> bool {
        if self.active_session() != Some(update.session) {
            debug!("Discarding update from superseded {}", update.session);
            return false;
        }

        match update.update {
            StreamUpdate::Partial(text) => {
                self.streaming_text = text;
            }
            StreamUpdate::Completed(message) => {
                self.messages.push(ChatMessage::from_final(message));
                self.finish_active();
            }
            StreamUpdate::Failed(e) => {
                error!("Error sending message: {}", e);
                self.messages.push(ChatMessage::from_error(&e));
                self.finish_active();
            }
        }
        true
    }

    /// Abort the active session, if any, discarding its partial text
    pub fn cancel_active(&mut self) {
        if let Some(active) = self.active.take() {
            debug!("Cancelling {}", active.id);
            active.cancel.cancel();
        }
        self.streaming_text.clear();
    }

    /// Start a new chat: abort the active session and clear the transcript.
    /// Persisted history on the backend is unaffected.
    pub fn reset(&mut self) {
        self.cancel_active();
        self.messages.clear();
    }

    fn finish_active(&mut self) {
        self.active = None;
        self.streaming_text.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use banksie_core::{ByteStream, FinalMessage, Sender, SessionState, StreamError};
    use bytes::Bytes;
    use futures::StreamExt;

    /// Serves the given chunks and then never ends
    struct HangingSource(Vec<&'static str>);

    #[async_trait::async_trait]
    impl ResponderSource for HangingSource {
        async fn open(&self, _message: &str) -> banksie_core::Result<ByteStream> {
            let items: Vec<banksie_core::Result<Bytes>> = self
                .0
                .iter()
                .map(|c| Ok(Bytes::from_static(c.as_bytes())))
                .collect();
            Ok(Box::pin(
                futures::stream::iter(items).chain(futures::stream::pending()),
            ))
        }
    }

    fn tagged(id: SessionId, update: StreamUpdate) -> SessionUpdate {
        SessionUpdate {
            session: id,
            update,
        }
    }

    #[test]
    fn test_blank_message_ignored() {
        let mut conversation = Conversation::default();
        assert!(conversation.begin("   ").is_none());
        assert!(conversation.messages().is_empty());
        assert!(!conversation.is_streaming());
    }

    #[test]
    fn test_completed_session_appends_reply() {
        let mut conversation = Conversation::default();
        let (id, _) = conversation.begin("hi").unwrap();

        assert!(conversation.apply(tagged(id, StreamUpdate::Partial("Hel".into()))));
        assert_eq!(conversation.streaming_text(), "Hel");

        assert!(conversation.apply(tagged(
            id,
            StreamUpdate::Completed(FinalMessage::new("Hello"))
        )));
        assert_eq!(conversation.streaming_text(), "");
        assert!(!conversation.is_streaming());

        let messages = conversation.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].sender, Sender::User);
        assert_eq!(messages[0].text, "hi");
        assert_eq!(messages[1].sender, Sender::Assistant);
        assert_eq!(messages[1].text, "Hello");
    }

    #[test]
    fn test_failure_appends_single_placeholder() {
        let mut conversation = Conversation::default();
        let (id, _) = conversation.begin("hi").unwrap();
        conversation.apply(tagged(id, StreamUpdate::Partial("garbled".into())));
        conversation.apply(tagged(id, StreamUpdate::Failed(StreamError::EmptyStream)));

        let messages = conversation.messages();
        assert_eq!(messages.len(), 2);
        assert!(messages[1].is_error);
        assert_eq!(messages[1].text, StreamError::EmptyStream.user_message());
        assert!(!messages.iter().any(|m| m.text == "garbled"));
    }

    #[test]
    fn test_begin_cancels_previous_session() {
        let mut conversation = Conversation::default();
        let (first, first_token) = conversation.begin("one").unwrap();
        conversation.apply(tagged(first, StreamUpdate::Partial("partial".into())));

        let (second, _) = conversation.begin("two").unwrap();
        assert!(first_token.is_cancelled());
        assert_ne!(first, second);
        assert_eq!(conversation.streaming_text(), "");

        assert!(!conversation.apply(tagged(first, StreamUpdate::Partial("late".into()))));
        assert!(!conversation.apply(tagged(
            first,
            StreamUpdate::Completed(FinalMessage::new("late"))
        )));
        assert_eq!(conversation.streaming_text(), "");
        assert_eq!(conversation.messages().len(), 2);
        assert_eq!(conversation.active_session(), Some(second));
    }

    #[test]
    fn test_reset_clears_transcript() {
        let mut conversation = Conversation::default();
        conversation.load_history(vec![ChatMessage::user("old")]);
        let (_, token) = conversation.begin("new").unwrap();

        conversation.reset();
        assert!(token.is_cancelled());
        assert!(conversation.messages().is_empty());
        assert!(!conversation.is_streaming());
    }

    #[tokio::test]
    async fn test_superseded_session_emits_nothing() {
        let mut conversation = Conversation::default();
        let source: Arc<dyn ResponderSource> = Arc::new(HangingSource(vec![
            "data: {\"chunk\":\"a\"}\n",
            "data: {\"chunk\":\"b\"}\n",
        ]));

        let mut first = conversation.send(source.clone(), "first").unwrap();
        let update = first.next_update().await.unwrap();
        assert!(conversation.apply(tagged(first.id(), update)));
        assert_eq!(conversation.streaming_text(), "a");

        let done = HangingSource(vec!["data: {\"done\":true,\"response\":\"fresh\"}\n"]);
        let second = conversation.send(Arc::new(done), "second").unwrap();

        assert_eq!(first.next_update().await, None);
        assert_eq!(first.state(), SessionState::Cancelled);

        let updates: Vec<SessionUpdate> = second.into_tagged_stream().collect().await;
        for update in updates {
            assert!(conversation.apply(update));
        }

        let texts: Vec<&str> = conversation
            .messages()
            .iter()
            .map(|m| m.text.as_str())
            .collect();
        assert_eq!(texts, vec!["first", "second", "fresh"]);
    }
}
