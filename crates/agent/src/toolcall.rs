use serde::{Deserialize, Serialize};
use thiserror::Error;

use devkart_core::domain::intent::Intent;

/// Tool name the avatar backends use for native cart mutations. The spelling
/// is part of the external contract.
pub const CART_TOOL_NAME: &str = "update_kart";

/// A native tool invocation as emitted by the backend: a tool name plus a
/// JSON-encoded argument string of `{action, itemName?, quantity?}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallPayload {
    pub name: String,
    pub arguments: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ToolCallError {
    #[error("unsupported tool `{0}`")]
    UnsupportedTool(String),
    #[error("tool arguments were not valid JSON: {0}")]
    InvalidArguments(String),
    #[error("unsupported cart action `{0}`")]
    UnsupportedAction(String),
    #[error("tool arguments did not match the intent shape: {0}")]
    InvalidIntent(String),
}

/// Structured extraction strategy: no model round-trip, no parse ambiguity.
/// Preferred whenever the backend natively emits tool calls.
///
/// Invalid payloads are typed errors; callers log and ignore them (the
/// session stays alive, the cart stays untouched).
pub fn parse_tool_call(payload: &ToolCallPayload) -> Result<Intent, ToolCallError> {
    if payload.name != CART_TOOL_NAME {
        return Err(ToolCallError::UnsupportedTool(payload.name.clone()));
    }

    let arguments: serde_json::Value = serde_json::from_str(&payload.arguments)
        .map_err(|error| ToolCallError::InvalidArguments(error.to_string()))?;

    let action = arguments
        .get("action")
        .and_then(serde_json::Value::as_str)
        .unwrap_or_default()
        .to_string();
    if !matches!(action.as_str(), "add" | "remove" | "clear" | "checkout") {
        return Err(ToolCallError::UnsupportedAction(action));
    }

    serde_json::from_value(arguments)
        .map_err(|error| ToolCallError::InvalidIntent(error.to_string()))
}

#[cfg(test)]
mod tests {
    use devkart_core::domain::intent::Intent;

    use super::{parse_tool_call, ToolCallError, ToolCallPayload, CART_TOOL_NAME};

    fn payload(arguments: &str) -> ToolCallPayload {
        ToolCallPayload { name: CART_TOOL_NAME.to_string(), arguments: arguments.to_string() }
    }

    #[test]
    fn parses_an_add_call() {
        let intent = parse_tool_call(&payload(
            r#"{"action":"add","itemName":"Windsurf","quantity":2}"#,
        ))
        .expect("valid tool call");
        assert_eq!(
            intent,
            Intent::Add { item_name: "Windsurf".to_string(), quantity: Some(2) }
        );
    }

    #[test]
    fn parses_checkout_without_extra_fields() {
        let intent =
            parse_tool_call(&payload(r#"{"action":"checkout"}"#)).expect("valid tool call");
        assert!(intent.is_checkout());
    }

    #[test]
    fn rejects_unknown_tools() {
        let result = parse_tool_call(&ToolCallPayload {
            name: "update_wishlist".to_string(),
            arguments: r#"{"action":"add","itemName":"Windsurf"}"#.to_string(),
        });
        assert_eq!(result, Err(ToolCallError::UnsupportedTool("update_wishlist".to_string())));
    }

    #[test]
    fn rejects_unknown_actions() {
        let result = parse_tool_call(&payload(r#"{"action":"refund","itemName":"Windsurf"}"#));
        assert_eq!(result, Err(ToolCallError::UnsupportedAction("refund".to_string())));
    }

    #[test]
    fn rejects_malformed_argument_json() {
        let result = parse_tool_call(&payload("not json"));
        assert!(matches!(result, Err(ToolCallError::InvalidArguments(_))));
    }

    #[test]
    fn rejects_add_without_item_name() {
        let result = parse_tool_call(&payload(r#"{"action":"add"}"#));
        assert!(matches!(result, Err(ToolCallError::InvalidIntent(_))));
    }
}
