//! Devkart Agent - intent extraction from conversation
//!
//! This crate turns what the shopper *said* into what the shopper *wants*:
//! - **LLM client** (`llm`) - pluggable completion trait plus the OpenAI
//!   chat-completions implementation
//! - **Extractor** (`extractor`) - the fixed prompt, the JSON-array parse
//!   contract, and checkout dominance
//! - **Debounce** (`debounce`) - single-slot trailing-window coalescing for
//!   rapid-fire transcript updates
//! - **Tool calls** (`toolcall`) - the zero-latency structured path for
//!   backends that natively emit `update_kart` invocations
//!
//! # Safety Principle
//!
//! The LLM is strictly a translator. It proposes intents; it never touches
//! cart state, prices, or the checkout decision. Malformed model output
//! degrades to an empty intent batch, never to an error the session sees.

pub mod debounce;
pub mod extractor;
pub mod llm;
pub mod toolcall;

pub use debounce::Debouncer;
pub use extractor::{DebouncedExtractor, IntentExtractor};
pub use llm::{CompletionRequest, LlmClient, LlmError, OpenAiClient};
pub use toolcall::{parse_tool_call, ToolCallError, ToolCallPayload, CART_TOOL_NAME};
