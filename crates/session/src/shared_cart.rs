use std::sync::Arc;

use tokio::sync::{broadcast, Mutex};
use tracing::info;

use devkart_core::domain::cart::Cart;
use devkart_core::domain::order::Order;
use devkart_core::reconciler::{apply_batch, CartUpdate};

/// The checkout signal. Broadcast to every interested listener (the page UI,
/// the server's receipt logger); delivery is best-effort, at-least-once per
/// trigger, and duplicates are tolerated - listeners simply re-show the
/// receipt for the latest order id.
#[derive(Clone, Debug)]
pub struct CheckoutNotice {
    pub order: Order,
}

/// The one mutable shared resource in a shopping session.
///
/// Both session adapters hold a clone of this handle, never the cart itself,
/// so concurrent backends can never diverge into two carts. Every mutation
/// is serialized through [`apply`](devkart_core::reconciler::apply) behind
/// the lock; external code reads snapshots and may replace state wholesale
/// (the UI-level clear), but never edits lines in place.
#[derive(Clone)]
pub struct SharedCart {
    cart: Arc<Mutex<Cart>>,
    checkout_tx: broadcast::Sender<CheckoutNotice>,
}

impl SharedCart {
    /// The checkout channel is injected at construction: no process-wide
    /// event bus, just an explicit sender shared with whoever owns the
    /// session.
    pub fn new(checkout_tx: broadcast::Sender<CheckoutNotice>) -> Self {
        Self { cart: Arc::new(Mutex::new(Cart::empty())), checkout_tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CheckoutNotice> {
        self.checkout_tx.subscribe()
    }

    pub async fn snapshot(&self) -> Cart {
        self.cart.lock().await.clone()
    }

    /// Apply a resolved update batch in order and publish any checkout
    /// notices. Returns the resulting cart state for UI re-render.
    pub async fn apply_updates(&self, updates: &[CartUpdate]) -> Cart {
        let mut cart = self.cart.lock().await;
        let batch = apply_batch(&cart, updates);
        *cart = batch.cart.clone();
        drop(cart);

        for order in batch.orders {
            info!(
                event_name = "cart.checkout_triggered",
                order_id = %order.id.0,
                total = %order.total,
                "checkout notification emitted"
            );
            // No subscribers is fine; delivery is best-effort.
            let _ = self.checkout_tx.send(CheckoutNotice { order });
        }

        batch.cart
    }

    /// Wholesale state replacement. This is how clearing actually happens -
    /// the reconciler's `clear` arm is a deliberate no-op.
    pub async fn replace(&self, next: Cart) -> Cart {
        let mut cart = self.cart.lock().await;
        *cart = next.clone();
        next
    }
}
