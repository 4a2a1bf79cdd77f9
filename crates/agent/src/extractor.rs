use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tracing::{debug, warn};

use devkart_core::domain::catalog::Catalog;
use devkart_core::domain::conversation::ConversationHistory;
use devkart_core::domain::intent::Intent;

use crate::debounce::Debouncer;
use crate::llm::{CompletionRequest, LlmClient};

/// Fixed instruction prompt for intent extraction. The model must answer
/// with a bare JSON array of `{action, itemName?, quantity?}` objects and
/// nothing else; anything that does not parse as an array degrades to an
/// empty batch.
const EXTRACTION_PROMPT: &str = r#"You are a shopping assistant that processes conversation messages and extracts order intents.
For each conversation, return an array of order intents in the following format:
[
  {
    "action": "add" | "remove" | "clear" | "checkout",
    "itemName": "item name" (optional),
    "quantity": number (optional, defaults to 1)
  }
]

Guidelines for processing orders:
1. When adding items, specify the quantity mentioned (default to 1 if not specified)
2. When removing items:
   - If a specific quantity is mentioned (e.g., "remove 2 items"), include that quantity
   - If no quantity is mentioned, remove all of that item
3. For "clear" or "checkout" actions, no itemName or quantity needed
4. Pay attention to quantity words like "all", "both", "one", "two", etc.
5. Detect checkout intents from assistant confirmations such as:
   - Order placed
   - Congratulations on your order!
   - Your order is confirmed
   - Your order has been placed successfully
   When any of these are detected, return [{"action": "checkout"}]

Only return the JSON array, no other text.
Examples:
User: "Add 2 Windsurf licenses"
[
  {"action": "add", "itemName": "Windsurf", "quantity": 2}
]

User: "Let me buy these items"
[
  {"action": "checkout"}
]"#;

const EXTRACTION_TEMPERATURE: f32 = 0.2;
const EXTRACTION_MAX_TOKENS: u32 = 150;

/// AI-inferred extraction strategy: conversation history + catalog summary
/// in, structured intents out.
pub struct IntentExtractor {
    client: Arc<dyn LlmClient>,
    catalog_summary: String,
}

impl IntentExtractor {
    pub fn new(client: Arc<dyn LlmClient>, catalog: &Catalog) -> Self {
        Self { client, catalog_summary: catalog.summary() }
    }

    /// Extract intents from the full conversation so far. Fails soft: any
    /// transport or parse failure yields an empty batch, never an error.
    pub async fn extract(&self, history: &ConversationHistory) -> Vec<Intent> {
        let request = CompletionRequest {
            system: EXTRACTION_PROMPT.to_string(),
            user: self.user_message(history),
            temperature: EXTRACTION_TEMPERATURE,
            max_tokens: EXTRACTION_MAX_TOKENS,
        };

        let raw = match self.client.complete(request).await {
            Ok(raw) => raw,
            Err(error) => {
                warn!(
                    event_name = "extract.llm_failed",
                    error = %error,
                    "intent extraction call failed; returning no intents"
                );
                return Vec::new();
            }
        };

        parse_intent_batch(&raw)
    }

    fn user_message(&self, history: &ConversationHistory) -> String {
        format!(
            "Catalog items:\n{}\n\nConversation:\n{}\n\nExtract order intents:",
            self.catalog_summary,
            history.transcript()
        )
    }

    /// Wrap this extractor in a trailing-window debouncer.
    pub fn into_debounced(self, window: Duration) -> DebouncedExtractor {
        let extractor = Arc::new(self);
        let debouncer = Debouncer::new(window, move |history: ConversationHistory| {
            let extractor = Arc::clone(&extractor);
            async move { extractor.extract(&history).await }.boxed()
        });

        DebouncedExtractor { debouncer }
    }
}

/// Debounced AI-inferred extraction: rapid transcript updates within the
/// window coalesce into one completion call whose result resolves every
/// queued requester.
pub struct DebouncedExtractor {
    debouncer: Debouncer<ConversationHistory, Vec<Intent>>,
}

impl DebouncedExtractor {
    pub async fn extract(&self, history: &ConversationHistory) -> Vec<Intent> {
        self.debouncer.call(history.clone()).await.unwrap_or_default()
    }
}

/// Parse a raw completion into an intent batch.
///
/// Contract: the response must be a bare JSON array. A non-array response is
/// a parse failure and yields `[]`. Individual elements that do not match
/// the intent shape (unknown action, missing itemName) are skipped rather
/// than poisoning the batch. A checkout anywhere collapses the batch to
/// `[checkout]`.
pub fn parse_intent_batch(raw: &str) -> Vec<Intent> {
    let elements: Vec<serde_json::Value> = match serde_json::from_str(raw.trim()) {
        Ok(elements) => elements,
        Err(error) => {
            warn!(
                event_name = "extract.parse_failed",
                error = %error,
                "completion was not a JSON array; returning no intents"
            );
            return Vec::new();
        }
    };

    let mut intents = Vec::with_capacity(elements.len());
    for element in elements {
        match serde_json::from_value::<Intent>(element) {
            Ok(intent) => intents.push(intent),
            Err(error) => {
                debug!(
                    event_name = "extract.intent_skipped",
                    error = %error,
                    "batch element did not match the intent shape; skipping"
                );
            }
        }
    }

    Intent::collapse_checkout(intents)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use devkart_core::domain::catalog::Catalog;
    use devkart_core::domain::conversation::{ConversationHistory, ConversationTurn, Role};
    use devkart_core::domain::intent::Intent;

    use crate::llm::{CompletionRequest, LlmClient, LlmError};

    use super::{parse_intent_batch, IntentExtractor};

    struct ScriptedClient {
        responses: Mutex<Vec<Result<String, LlmError>>>,
        seen: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedClient {
        fn returning(response: &str) -> Self {
            Self {
                responses: Mutex::new(vec![Ok(response.to_string())]),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                responses: Mutex::new(vec![Err(LlmError::EmptyResponse)]),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedClient {
        async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError> {
            self.seen.lock().await.push(request);
            self.responses.lock().await.pop().unwrap_or(Err(LlmError::EmptyResponse))
        }
    }

    fn history(text: &str) -> ConversationHistory {
        let mut history = ConversationHistory::default();
        history.push(ConversationTurn::new(Role::User, text));
        history
    }

    #[test]
    fn parses_a_plain_intent_array() {
        let intents = parse_intent_batch(
            r#"[{"action":"add","itemName":"Windsurf","quantity":2},{"action":"clear"}]"#,
        );
        assert_eq!(
            intents,
            vec![
                Intent::Add { item_name: "Windsurf".to_string(), quantity: Some(2) },
                Intent::Clear,
            ]
        );
    }

    #[test]
    fn non_json_response_yields_no_intents() {
        assert!(parse_intent_batch("Sure! I added Windsurf to your cart.").is_empty());
    }

    #[test]
    fn non_array_json_yields_no_intents() {
        assert!(parse_intent_batch(r#"{"action":"add","itemName":"Windsurf"}"#).is_empty());
    }

    #[test]
    fn malformed_elements_are_skipped_not_fatal() {
        let intents = parse_intent_batch(
            r#"[{"action":"refund"},{"action":"add","itemName":"Cursor"}]"#,
        );
        assert_eq!(intents, vec![Intent::Add { item_name: "Cursor".to_string(), quantity: None }]);
    }

    #[test]
    fn checkout_anywhere_collapses_the_batch() {
        let intents = parse_intent_batch(
            r#"[{"action":"add","itemName":"Windsurf"},{"action":"checkout"}]"#,
        );
        assert_eq!(intents, vec![Intent::Checkout]);
    }

    #[tokio::test]
    async fn extractor_embeds_catalog_summary_and_transcript() {
        let client = Arc::new(ScriptedClient::returning("[]"));
        let extractor = IntentExtractor::new(Arc::clone(&client) as _, &Catalog::storefront());

        let intents = extractor.extract(&history("add windsurf")).await;
        assert!(intents.is_empty());

        let seen = client.seen.lock().await;
        let request = seen.first().expect("one completion call");
        assert!(request.user.contains("Windsurf - $15.00"));
        assert!(request.user.contains("user: add windsurf"));
        assert!((request.temperature - 0.2).abs() < f32::EPSILON);
        assert_eq!(request.max_tokens, 150);
    }

    #[tokio::test]
    async fn transport_failure_degrades_to_no_intents() {
        let client = Arc::new(ScriptedClient::failing());
        let extractor = IntentExtractor::new(client, &Catalog::storefront());
        assert!(extractor.extract(&history("add windsurf")).await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn debounced_extraction_coalesces_rapid_updates() {
        let client = Arc::new(ScriptedClient::returning(
            r#"[{"action":"add","itemName":"Windsurf","quantity":1}]"#,
        ));
        let extractor = IntentExtractor::new(Arc::clone(&client) as _, &Catalog::storefront());
        let debounced = Arc::new(extractor.into_debounced(Duration::from_millis(500)));

        let first = tokio::spawn({
            let debounced = Arc::clone(&debounced);
            async move { debounced.extract(&history("add win")).await }
        });
        let second = tokio::spawn({
            let debounced = Arc::clone(&debounced);
            async move { debounced.extract(&history("add windsurf")).await }
        });

        let first = first.await.expect("task");
        let second = second.await.expect("task");
        assert_eq!(first, second);
        assert_eq!(
            first,
            vec![Intent::Add { item_name: "Windsurf".to_string(), quantity: Some(1) }]
        );
        // The scripted client held exactly one response; both callers were
        // served by a single completion call.
        assert_eq!(client.seen.lock().await.len(), 1);
    }
}
