use serde_json::Value;
use thiserror::Error;

use devkart_agent::toolcall::ToolCallPayload;
use devkart_core::domain::conversation::{ConversationTurn, Role};

/// A backend message after shape validation. Raw payloads from the avatar
/// backends are duck-typed JSON; everything crossing into the pipeline goes
/// through [`parse_backend_message`] first so unknown shapes surface as a
/// typed error at the boundary instead of deep inside intent handling.
#[derive(Clone, Debug, PartialEq)]
pub enum BackendEvent {
    /// One free-text utterance (voice backends).
    Utterance(ConversationTurn),
    /// A whole batch of turns delivered at once (`conversation-update`).
    ConversationUpdate(Vec<ConversationTurn>),
    /// A native tool invocation (video backends).
    ToolCall(ToolCallPayload),
    CallStarted,
    CallEnded,
    /// A fatal error event from the backend.
    BackendError { message: String },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum MessageParseError {
    #[error("unrecognized backend message (event type `{event_type}`)")]
    Unrecognized { event_type: String },
    #[error("backend message field `{field}` was missing or malformed")]
    MalformedField { field: String },
}

/// Validate a raw backend message into a tagged event.
pub fn parse_backend_message(raw: &Value) -> Result<BackendEvent, MessageParseError> {
    // Video backend shape: {"event_type": "conversation.tool_call",
    //                       "properties": {"name": ..., "arguments": ...}}
    if let Some(event_type) = raw.get("event_type").and_then(Value::as_str) {
        return match event_type {
            "conversation.tool_call" => {
                let properties = raw
                    .get("properties")
                    .ok_or_else(|| MessageParseError::MalformedField {
                        field: "properties".to_string(),
                    })?;
                let payload: ToolCallPayload = serde_json::from_value(properties.clone())
                    .map_err(|_| MessageParseError::MalformedField {
                        field: "properties".to_string(),
                    })?;
                Ok(BackendEvent::ToolCall(payload))
            }
            other => Err(MessageParseError::Unrecognized { event_type: other.to_string() }),
        };
    }

    // Voice backend shapes keyed by "type".
    if let Some(message_type) = raw.get("type").and_then(Value::as_str) {
        return match message_type {
            "conversation-update" => {
                let turns = raw
                    .get("conversation")
                    .cloned()
                    .and_then(|conversation| {
                        serde_json::from_value::<Vec<ConversationTurn>>(conversation).ok()
                    })
                    .ok_or_else(|| MessageParseError::MalformedField {
                        field: "conversation".to_string(),
                    })?;
                Ok(BackendEvent::ConversationUpdate(turns))
            }
            "call-start" => Ok(BackendEvent::CallStarted),
            "call-end" => Ok(BackendEvent::CallEnded),
            "error" => {
                let message = raw
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("backend reported an unspecified error")
                    .to_string();
                Ok(BackendEvent::BackendError { message })
            }
            other => Err(MessageParseError::Unrecognized { event_type: other.to_string() }),
        };
    }

    // Bare utterance: {"role": ..., "content": ...}
    if raw.get("role").is_some() && raw.get("content").is_some() {
        let role: Role = serde_json::from_value(raw["role"].clone())
            .map_err(|_| MessageParseError::MalformedField { field: "role".to_string() })?;
        let content = raw["content"]
            .as_str()
            .ok_or_else(|| MessageParseError::MalformedField { field: "content".to_string() })?
            .to_string();
        return Ok(BackendEvent::Utterance(ConversationTurn { role, content }));
    }

    Err(MessageParseError::Unrecognized { event_type: "<untagged>".to_string() })
}
