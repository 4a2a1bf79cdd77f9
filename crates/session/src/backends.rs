use std::collections::VecDeque;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::Mutex;

/// Transport-level failures from an avatar backend.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("media permission denied: {0}")]
    PermissionDenied(String),
    #[error("backend session join failed: {0}")]
    Join(String),
    #[error("backend stream read failed: {0}")]
    Receive(String),
    #[error("backend session release failed: {0}")]
    Leave(String),
}

/// One avatar/voice backend session, reduced to its interface: the rendering,
/// call-signaling, and media plumbing behind it are external collaborators.
///
/// Both concrete integrations (voice-only and audio/video) satisfy this
/// contract; the adapter neither knows nor cares which it is driving.
#[async_trait]
pub trait BackendSession: Send + Sync {
    /// Request microphone/camera access. Denial is fatal to the start.
    async fn request_permissions(&self) -> Result<(), TransportError>;
    /// Establish the external call/connection.
    async fn join(&self) -> Result<(), TransportError>;
    /// Next raw message from the backend; `None` means the stream closed.
    async fn next_message(&self) -> Result<Option<Value>, TransportError>;
    /// Release the external session.
    async fn leave(&self) -> Result<(), TransportError>;
}

/// Placeholder transport for unconfigured backends: joins instantly and
/// produces no messages.
#[derive(Default)]
pub struct NoopBackend;

#[async_trait]
impl BackendSession for NoopBackend {
    async fn request_permissions(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn join(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn next_message(&self) -> Result<Option<Value>, TransportError> {
        Ok(None)
    }

    async fn leave(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Deterministic backend that replays a fixed message script. Drives the
/// offline `replay` command and the adapter tests.
pub struct ScriptedBackend {
    messages: Mutex<VecDeque<Value>>,
    deny_permissions: bool,
    fail_join: bool,
}

impl ScriptedBackend {
    pub fn new(messages: impl IntoIterator<Item = Value>) -> Self {
        Self {
            messages: Mutex::new(messages.into_iter().collect()),
            deny_permissions: false,
            fail_join: false,
        }
    }

    pub fn denying_permissions() -> Self {
        Self { messages: Mutex::new(VecDeque::new()), deny_permissions: true, fail_join: false }
    }

    pub fn failing_join() -> Self {
        Self { messages: Mutex::new(VecDeque::new()), deny_permissions: false, fail_join: true }
    }
}

#[async_trait]
impl BackendSession for ScriptedBackend {
    async fn request_permissions(&self) -> Result<(), TransportError> {
        if self.deny_permissions {
            return Err(TransportError::PermissionDenied(
                "microphone access was denied".to_string(),
            ));
        }
        Ok(())
    }

    async fn join(&self) -> Result<(), TransportError> {
        if self.fail_join {
            return Err(TransportError::Join("conversation could not be created".to_string()));
        }
        Ok(())
    }

    async fn next_message(&self) -> Result<Option<Value>, TransportError> {
        Ok(self.messages.lock().await.pop_front())
    }

    async fn leave(&self) -> Result<(), TransportError> {
        Ok(())
    }
}
