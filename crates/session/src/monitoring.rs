use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use thiserror::Error;

use devkart_core::config::MonitoringConfig;
use devkart_core::domain::conversation::ConversationTurn;

#[derive(Debug, Error)]
pub enum MonitoringError {
    #[error("monitoring sink request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("monitoring sink returned status {0}")]
    Status(u16),
}

/// Transcript flush on session stop. Strictly fire-and-forget: every failure
/// is logged by the caller and swallowed - the stop transition never blocks
/// on this, and the user never sees a monitoring error.
#[async_trait]
pub trait MonitoringSink: Send + Sync {
    async fn push_transcript(&self, transcript: &[ConversationTurn]) -> Result<(), MonitoringError>;
}

#[derive(Serialize)]
struct TranscriptPayload<'a> {
    transcript: &'a [ConversationTurn],
    metrics: serde_json::Value,
    metadata: TranscriptMetadata<'a>,
}

#[derive(Serialize)]
struct TranscriptMetadata<'a> {
    agent_id: &'a str,
}

pub struct HttpMonitoringSink {
    http: reqwest::Client,
    endpoint: String,
    api_key: SecretString,
    agent_id: String,
}

impl HttpMonitoringSink {
    pub fn from_config(config: &MonitoringConfig) -> Option<Self> {
        let api_key = config.api_key.clone()?;
        let http = reqwest::Client::builder().timeout(Duration::from_secs(10)).build().ok()?;

        Some(Self {
            http,
            endpoint: config.endpoint.clone(),
            api_key,
            agent_id: config.agent_id.clone(),
        })
    }
}

#[async_trait]
impl MonitoringSink for HttpMonitoringSink {
    async fn push_transcript(
        &self,
        transcript: &[ConversationTurn],
    ) -> Result<(), MonitoringError> {
        let payload = TranscriptPayload {
            transcript,
            metrics: serde_json::json!({}),
            metadata: TranscriptMetadata { agent_id: &self.agent_id },
        };

        let response = self
            .http
            .post(&self.endpoint)
            .header("x-api-key", self.api_key.expose_secret())
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(MonitoringError::Status(status.as_u16()));
        }

        Ok(())
    }
}

/// Used when monitoring is disabled or unconfigured.
#[derive(Default)]
pub struct NoopMonitoringSink;

#[async_trait]
impl MonitoringSink for NoopMonitoringSink {
    async fn push_transcript(
        &self,
        _transcript: &[ConversationTurn],
    ) -> Result<(), MonitoringError> {
        Ok(())
    }
}
