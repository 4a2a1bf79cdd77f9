use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::cart::{Cart, CartLine};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(pub String);

impl OrderId {
    /// Opaque, display-friendly id: 9 uppercase alphanumeric characters.
    pub fn generate() -> Self {
        let id: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(9)
            .map(char::from)
            .collect();
        Self(id.to_uppercase())
    }
}

/// A checkout snapshot. Generated only at checkout, displayed once, and never
/// persisted - the cart itself is cleared after the UI acknowledges it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub lines: Vec<CartLine>,
    pub total: Decimal,
    pub placed_at: DateTime<Utc>,
}

impl Order {
    pub fn snapshot(cart: &Cart) -> Self {
        Self {
            id: OrderId::generate(),
            lines: cart.lines().to_vec(),
            total: cart.total(),
            placed_at: Utc::now(),
        }
    }
}
