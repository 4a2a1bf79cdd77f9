//! Devkart Session - avatar backend adapters
//!
//! Bridges external conversational backends into the intent/cart pipeline:
//! - **Events** (`events`) - tagged-union parse of raw backend messages;
//!   unknown shapes become typed "unrecognized" errors instead of duck-typed
//!   payloads leaking inward
//! - **State** (`state`) - the per-adapter lifecycle machine
//!   (`Idle -> Starting -> Active -> Stopping -> Idle`, terminal `Errored`)
//! - **Shared cart** (`shared_cart`) - the single mutation entry point both
//!   adapters share; checkout notices go out on an injected broadcast channel
//! - **Adapter** (`adapter`) - routes parsed events to the right extraction
//!   strategy and applies the resulting updates
//! - **Monitoring** (`monitoring`) - fire-and-forget transcript flush to the
//!   evaluation endpoint on session stop
//!
//! # Architecture
//!
//! ```text
//! Backend events -> SessionAdapter -> IntentExtractor / tool-call parse
//!                        |                      |
//!                        v                      v
//!                  ConversationHistory    resolve_intents -> SharedCart.apply
//!                                                                 |
//!                                                   CheckoutNotice broadcast
//! ```

pub mod adapter;
pub mod backends;
pub mod events;
pub mod monitoring;
pub mod shared_cart;
pub mod state;

pub use adapter::{SessionAdapter, SessionError};
pub use backends::{BackendSession, NoopBackend, ScriptedBackend, TransportError};
pub use events::{parse_backend_message, BackendEvent, MessageParseError};
pub use monitoring::{HttpMonitoringSink, MonitoringError, MonitoringSink, NoopMonitoringSink};
pub use shared_cart::{CheckoutNotice, SharedCart};
pub use state::SessionState;
