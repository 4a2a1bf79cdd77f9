//! Devkart Core - catalog, cart, and the reconciliation engine
//!
//! This crate owns every deterministic decision in devkart:
//! - **Catalog** (`domain::catalog`) - the static storefront of purchasable
//!   developer tools, with fuzzy name lookup
//! - **Cart** (`domain::cart`) - session-scoped line items with quantity
//!   invariants
//! - **Reconciler** (`reconciler`) - the pure `apply` function that turns a
//!   resolved cart update into new cart state
//! - **Config** (`config`) - TOML + env configuration with secret redaction
//!
//! # Safety Principle
//!
//! Conversational AI never mutates the cart. The agent layer only *proposes*
//! intents; this crate resolves them against the catalog and applies them
//! deterministically. Same cart + same update always yields the same result.

pub mod config;
pub mod domain;
pub mod errors;
pub mod reconciler;

pub use domain::cart::{Cart, CartLine};
pub use domain::catalog::{Catalog, CatalogItem, ItemId};
pub use domain::conversation::{ConversationHistory, ConversationTurn, Role};
pub use domain::intent::Intent;
pub use domain::order::{Order, OrderId};
pub use errors::DomainError;
pub use reconciler::{apply, apply_batch, resolve_intents, Applied, BatchApplied, CartUpdate};
