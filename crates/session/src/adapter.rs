use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use devkart_agent::extractor::DebouncedExtractor;
use devkart_agent::toolcall::parse_tool_call;
use devkart_core::domain::cart::Cart;
use devkart_core::domain::catalog::Catalog;
use devkart_core::domain::conversation::ConversationHistory;
use devkart_core::domain::intent::Intent;
use devkart_core::reconciler::resolve_intents;

use crate::backends::BackendSession;
use crate::events::{parse_backend_message, BackendEvent};
use crate::monitoring::MonitoringSink;
use crate::shared_cart::SharedCart;
use crate::state::{InvalidTransition, SessionState};

/// Errors a session start/stop surfaces to the user. Everything else that
/// goes wrong mid-session (extraction failures, malformed messages, unknown
/// catalog items, monitoring flushes) degrades locally and is only logged.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("media permission denied: {0}")]
    PermissionDenied(String),
    #[error("backend session failed: {0}")]
    Backend(String),
    #[error(transparent)]
    Transition(#[from] InvalidTransition),
}

/// Drives one avatar backend through its lifecycle and routes its messages
/// into the cart pipeline.
///
/// The two concrete shapes differ only in extraction strategy:
/// - the voice adapter carries a [`DebouncedExtractor`] and infers intents
///   from transcript text;
/// - the video adapter carries none and relies on native tool calls.
///
/// Both hold a clone of the same [`SharedCart`], so their mutations land in
/// one place regardless of which backend the user is talking to.
pub struct SessionAdapter<B> {
    session_id: Uuid,
    backend_label: &'static str,
    backend: B,
    extractor: Option<DebouncedExtractor>,
    catalog: Catalog,
    cart: SharedCart,
    monitoring: Arc<dyn MonitoringSink>,
    history: ConversationHistory,
    state: SessionState,
}

impl<B: BackendSession> SessionAdapter<B> {
    /// Voice-style adapter: free-text utterances, AI-inferred intents. With
    /// no extractor the adapter still records transcripts but never infers
    /// intents from them.
    pub fn voice(
        backend: B,
        extractor: Option<DebouncedExtractor>,
        catalog: Catalog,
        cart: SharedCart,
        monitoring: Arc<dyn MonitoringSink>,
    ) -> Self {
        Self::build("voice", backend, extractor, catalog, cart, monitoring)
    }

    /// Video-style adapter: native tool calls, no model round-trip.
    pub fn video(
        backend: B,
        catalog: Catalog,
        cart: SharedCart,
        monitoring: Arc<dyn MonitoringSink>,
    ) -> Self {
        Self::build("video", backend, None, catalog, cart, monitoring)
    }

    fn build(
        backend_label: &'static str,
        backend: B,
        extractor: Option<DebouncedExtractor>,
        catalog: Catalog,
        cart: SharedCart,
        monitoring: Arc<dyn MonitoringSink>,
    ) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            backend_label,
            backend,
            extractor,
            catalog,
            cart,
            monitoring,
            history: ConversationHistory::default(),
            state: SessionState::Idle,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    /// Start the session: request media permissions, join the backend call,
    /// and reset conversation state for the fresh session.
    ///
    /// Permission denial and join failure both land the adapter in `Errored`
    /// and surface to the caller; they are the two failure classes the user
    /// must see and act on.
    pub async fn start(&mut self) -> Result<(), SessionError> {
        self.state.transition_to(SessionState::Starting)?;

        if let Err(cause) = self.backend.request_permissions().await {
            self.state.transition_to(SessionState::Errored)?;
            error!(
                event_name = "session.permission_denied",
                session_id = %self.session_id,
                backend = self.backend_label,
                error = %cause,
                "media permission denied; session errored"
            );
            return Err(SessionError::PermissionDenied(cause.to_string()));
        }

        if let Err(cause) = self.backend.join().await {
            self.state.transition_to(SessionState::Errored)?;
            error!(
                event_name = "session.join_failed",
                session_id = %self.session_id,
                backend = self.backend_label,
                error = %cause,
                "backend join failed; session errored"
            );
            return Err(SessionError::Backend(cause.to_string()));
        }

        self.state.transition_to(SessionState::Active)?;
        // Conversation state must not leak across sessions.
        self.history.reset();
        info!(
            event_name = "session.started",
            session_id = %self.session_id,
            backend = self.backend_label,
            "session active"
        );
        Ok(())
    }

    /// Route one raw backend message. Returns the new cart snapshot when the
    /// message resulted in cart mutations, `None` otherwise.
    ///
    /// Messages arriving outside `Active` are dropped; mid-session failures
    /// (unrecognized shapes, bad tool calls, extraction misses) are logged
    /// and never interrupt the session.
    pub async fn handle_message(&mut self, raw: &Value) -> Option<Cart> {
        if self.state != SessionState::Active {
            debug!(
                event_name = "session.message_dropped",
                session_id = %self.session_id,
                state = ?self.state,
                "message received outside an active session; dropped"
            );
            return None;
        }

        let event = match parse_backend_message(raw) {
            Ok(event) => event,
            Err(cause) => {
                warn!(
                    event_name = "session.message_unrecognized",
                    session_id = %self.session_id,
                    backend = self.backend_label,
                    error = %cause,
                    "unrecognized backend message; ignored"
                );
                return None;
            }
        };

        match event {
            BackendEvent::Utterance(turn) => {
                self.history.push(turn);
                self.extract_and_apply().await
            }
            BackendEvent::ConversationUpdate(turns) => {
                self.history.extend(turns);
                self.extract_and_apply().await
            }
            BackendEvent::ToolCall(payload) => match parse_tool_call(&payload) {
                Ok(intent) => self.apply_intents(&[intent]).await,
                Err(cause) => {
                    warn!(
                        event_name = "session.tool_call_rejected",
                        session_id = %self.session_id,
                        tool = %payload.name,
                        error = %cause,
                        "invalid tool call; cart untouched"
                    );
                    None
                }
            },
            BackendEvent::CallStarted => {
                debug!(
                    event_name = "session.call_started",
                    session_id = %self.session_id,
                    backend = self.backend_label,
                );
                None
            }
            BackendEvent::CallEnded => {
                info!(
                    event_name = "session.call_ended",
                    session_id = %self.session_id,
                    backend = self.backend_label,
                );
                None
            }
            BackendEvent::BackendError { message } => {
                error!(
                    event_name = "session.backend_error",
                    session_id = %self.session_id,
                    backend = self.backend_label,
                    message = %message,
                    "backend reported a fatal error; session errored"
                );
                let _ = self.state.transition_to(SessionState::Errored);
                None
            }
        }
    }

    async fn extract_and_apply(&mut self) -> Option<Cart> {
        // Tool-call-only adapters record the transcript (it still feeds the
        // monitoring flush) but never infer intents from it.
        let extractor = self.extractor.as_ref()?;
        let intents = extractor.extract(&self.history).await;
        if intents.is_empty() {
            return None;
        }
        self.apply_intents(&intents).await
    }

    async fn apply_intents(&self, intents: &[Intent]) -> Option<Cart> {
        let updates = resolve_intents(&self.catalog, intents);
        if updates.is_empty() {
            return None;
        }
        Some(self.cart.apply_updates(&updates).await)
    }

    /// Stop the session: flush the transcript to monitoring, release the
    /// backend, and return to `Idle`. Both the flush and the release are
    /// best-effort; neither failure blocks the stop.
    pub async fn stop(&mut self) -> Result<(), SessionError> {
        self.state.transition_to(SessionState::Stopping)?;

        if let Err(cause) = self.monitoring.push_transcript(self.history.turns()).await {
            warn!(
                event_name = "session.monitoring_flush_failed",
                session_id = %self.session_id,
                error = %cause,
                "transcript flush failed; continuing stop"
            );
        }

        if let Err(cause) = self.backend.leave().await {
            warn!(
                event_name = "session.leave_failed",
                session_id = %self.session_id,
                backend = self.backend_label,
                error = %cause,
                "backend release failed; continuing stop"
            );
        }

        self.state.transition_to(SessionState::Idle)?;
        info!(
            event_name = "session.stopped",
            session_id = %self.session_id,
            backend = self.backend_label,
            "session idle"
        );
        Ok(())
    }

    /// Run the full lifecycle: start, pump messages until the stream closes,
    /// then stop. A transport read failure errors the session.
    pub async fn run(&mut self) -> Result<(), SessionError> {
        self.start().await?;

        loop {
            match self.backend.next_message().await {
                Ok(Some(raw)) => {
                    self.handle_message(&raw).await;
                    if self.state == SessionState::Errored {
                        return Err(SessionError::Backend(
                            "backend reported a fatal error".to_string(),
                        ));
                    }
                }
                Ok(None) => break,
                Err(cause) => {
                    let _ = self.state.transition_to(SessionState::Errored);
                    error!(
                        event_name = "session.stream_failed",
                        session_id = %self.session_id,
                        backend = self.backend_label,
                        error = %cause,
                        "backend stream failed; session errored"
                    );
                    return Err(SessionError::Backend(cause.to_string()));
                }
            }
        }

        self.stop().await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use serde_json::json;
    use tokio::sync::{broadcast, Mutex};

    use devkart_agent::extractor::IntentExtractor;
    use devkart_agent::llm::{CompletionRequest, LlmClient, LlmError};
    use devkart_core::domain::catalog::Catalog;
    use devkart_core::domain::conversation::ConversationTurn;

    use crate::backends::ScriptedBackend;
    use crate::monitoring::{MonitoringError, MonitoringSink, NoopMonitoringSink};
    use crate::shared_cart::SharedCart;
    use crate::state::SessionState;

    use super::{SessionAdapter, SessionError};

    struct FixedClient(String);

    #[async_trait]
    impl LlmClient for FixedClient {
        async fn complete(&self, _request: CompletionRequest) -> Result<String, LlmError> {
            Ok(self.0.clone())
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        flushed: Mutex<Vec<Vec<ConversationTurn>>>,
    }

    #[async_trait]
    impl MonitoringSink for RecordingSink {
        async fn push_transcript(
            &self,
            transcript: &[ConversationTurn],
        ) -> Result<(), MonitoringError> {
            self.flushed.lock().await.push(transcript.to_vec());
            Ok(())
        }
    }

    fn shared_cart() -> SharedCart {
        let (checkout_tx, _) = broadcast::channel(8);
        SharedCart::new(checkout_tx)
    }

    fn video_adapter(backend: ScriptedBackend, cart: SharedCart) -> SessionAdapter<ScriptedBackend> {
        SessionAdapter::video(
            backend,
            Catalog::storefront(),
            cart,
            Arc::new(NoopMonitoringSink),
        )
    }

    fn tool_call(arguments: &str) -> serde_json::Value {
        json!({
            "event_type": "conversation.tool_call",
            "properties": {"name": "update_kart", "arguments": arguments}
        })
    }

    #[tokio::test]
    async fn permission_denial_errors_the_session() {
        let mut adapter = video_adapter(ScriptedBackend::denying_permissions(), shared_cart());
        let error = adapter.run().await.expect_err("permission denial is fatal");
        assert!(matches!(error, SessionError::PermissionDenied(_)));
        assert_eq!(adapter.state(), SessionState::Errored);
    }

    #[tokio::test]
    async fn join_failure_errors_the_session() {
        let mut adapter = video_adapter(ScriptedBackend::failing_join(), shared_cart());
        let error = adapter.run().await.expect_err("join failure is fatal");
        assert!(matches!(error, SessionError::Backend(_)));
        assert_eq!(adapter.state(), SessionState::Errored);
    }

    #[tokio::test]
    async fn tool_calls_mutate_the_shared_cart() {
        let cart = shared_cart();
        let backend = ScriptedBackend::new([
            tool_call(r#"{"action":"add","itemName":"Windsurf","quantity":2}"#),
            tool_call(r#"{"action":"remove","itemName":"Windsurf","quantity":1}"#),
        ]);
        let mut adapter = video_adapter(backend, cart.clone());

        adapter.run().await.expect("clean run");

        let snapshot = cart.snapshot().await;
        assert_eq!(snapshot.lines().len(), 1);
        assert_eq!(snapshot.total(), Decimal::new(15_00, 2));
        assert_eq!(adapter.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn invalid_tool_calls_are_ignored() {
        let cart = shared_cart();
        let backend = ScriptedBackend::new([
            tool_call(r#"{"action":"refund","itemName":"Windsurf"}"#),
            json!({"unexpected": "shape"}),
        ]);
        let mut adapter = video_adapter(backend, cart.clone());

        adapter.run().await.expect("bad messages never kill the session");
        assert!(cart.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn checkout_tool_call_broadcasts_a_notice() {
        let cart = shared_cart();
        let mut notices = cart.subscribe();
        let backend = ScriptedBackend::new([
            tool_call(r#"{"action":"add","itemName":"Cursor","quantity":1}"#),
            tool_call(r#"{"action":"checkout"}"#),
        ]);
        let mut adapter = video_adapter(backend, cart.clone());

        adapter.run().await.expect("clean run");

        let notice = notices.try_recv().expect("checkout notice");
        assert_eq!(notice.order.total, Decimal::new(20_00, 2));
    }

    #[tokio::test]
    async fn backend_error_event_is_fatal() {
        let backend =
            ScriptedBackend::new([json!({"type": "error", "message": "ice failure"})]);
        let mut adapter = video_adapter(backend, shared_cart());

        let error = adapter.run().await.expect_err("backend error is fatal");
        assert!(matches!(error, SessionError::Backend(_)));
        assert_eq!(adapter.state(), SessionState::Errored);
    }

    #[tokio::test]
    async fn messages_outside_an_active_session_are_dropped() {
        let mut adapter = video_adapter(ScriptedBackend::new([]), shared_cart());
        let applied = adapter
            .handle_message(&tool_call(r#"{"action":"add","itemName":"Windsurf"}"#))
            .await;
        assert!(applied.is_none());
        assert_eq!(adapter.state(), SessionState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn voice_utterances_feed_the_extractor() {
        let cart = shared_cart();
        let client = Arc::new(FixedClient(
            r#"[{"action":"add","itemName":"Windsurf","quantity":2}]"#.to_string(),
        ));
        let catalog = Catalog::storefront();
        let extractor =
            IntentExtractor::new(client, &catalog).into_debounced(Duration::from_millis(500));
        let backend = ScriptedBackend::new([json!({
            "type": "conversation-update",
            "conversation": [{"role": "user", "content": "add two windsurf"}]
        })]);
        let mut adapter = SessionAdapter::voice(
            backend,
            Some(extractor),
            catalog,
            cart.clone(),
            Arc::new(NoopMonitoringSink),
        );

        adapter.run().await.expect("clean run");

        let snapshot = cart.snapshot().await;
        assert_eq!(snapshot.total(), Decimal::new(30_00, 2));
    }

    #[tokio::test]
    async fn stop_flushes_the_transcript() {
        let sink = Arc::new(RecordingSink::default());
        let backend = ScriptedBackend::new([
            json!({"role": "user", "content": "hello"}),
            json!({"role": "assistant", "content": "hi! what can I get you?"}),
        ]);
        let mut adapter = SessionAdapter::video(
            backend,
            Catalog::storefront(),
            shared_cart(),
            Arc::clone(&sink) as Arc<dyn MonitoringSink>,
        );

        adapter.run().await.expect("clean run");

        let flushed = sink.flushed.lock().await;
        assert_eq!(flushed.len(), 1);
        assert_eq!(flushed[0].len(), 2);
        assert_eq!(flushed[0][0].content, "hello");
    }

    #[tokio::test]
    async fn both_adapters_share_one_cart() {
        let cart = shared_cart();
        let mut video = video_adapter(
            ScriptedBackend::new([tool_call(r#"{"action":"add","itemName":"Postman"}"#)]),
            cart.clone(),
        );
        let mut video_second = video_adapter(
            ScriptedBackend::new([tool_call(r#"{"action":"add","itemName":"Postman"}"#)]),
            cart.clone(),
        );

        video.run().await.expect("clean run");
        video_second.run().await.expect("clean run");

        let snapshot = cart.snapshot().await;
        assert_eq!(snapshot.lines().len(), 1);
        assert_eq!(snapshot.lines()[0].quantity, 2);
    }
}
