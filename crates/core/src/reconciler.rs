//! The cart reconciliation engine.
//!
//! `apply` is a pure function: same cart + same update always yields the same
//! result, with no hidden state and no environment access. Checkout is the
//! one update with a side signal, and even that is expressed as a returned
//! [`Order`] snapshot - emitting the notification is the caller's job, so the
//! reconciler works identically inside a UI event handler or a batch replay.

use tracing::debug;

use crate::domain::cart::{Cart, CartLine};
use crate::domain::catalog::{Catalog, CatalogItem, ItemId};
use crate::domain::intent::Intent;
use crate::domain::order::Order;

/// An intent whose item name has already been resolved against the catalog.
/// Only values of this type can affect the cart.
#[derive(Clone, Debug, PartialEq)]
pub enum CartUpdate {
    Add { item: CatalogItem, quantity: u32 },
    Remove { item_id: ItemId, quantity: Option<u32> },
    Clear,
    Checkout,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Applied {
    pub cart: Cart,
    pub order: Option<Order>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BatchApplied {
    pub cart: Cart,
    pub orders: Vec<Order>,
}

/// Resolve extracted intents into cart updates.
///
/// Lookup misses are dropped silently (logged for diagnostics) - a misheard
/// item name must never crash the session or leave the cart half-applied.
pub fn resolve_intents(catalog: &Catalog, intents: &[Intent]) -> Vec<CartUpdate> {
    let mut updates = Vec::with_capacity(intents.len());

    for intent in intents {
        match intent {
            Intent::Add { item_name, quantity } => match catalog.find_by_name(item_name) {
                Some(item) => updates.push(CartUpdate::Add {
                    item: item.clone(),
                    quantity: quantity.unwrap_or(1).max(1),
                }),
                None => {
                    debug!(
                        event_name = "reconcile.lookup_miss",
                        item_name = %item_name,
                        "add intent dropped: no catalog match"
                    );
                }
            },
            Intent::Remove { item_name, quantity } => match catalog.find_by_name(item_name) {
                Some(item) => {
                    updates.push(CartUpdate::Remove { item_id: item.id.clone(), quantity: *quantity })
                }
                None => {
                    debug!(
                        event_name = "reconcile.lookup_miss",
                        item_name = %item_name,
                        "remove intent dropped: no catalog match"
                    );
                }
            },
            Intent::Clear => updates.push(CartUpdate::Clear),
            Intent::Checkout => updates.push(CartUpdate::Checkout),
        }
    }

    updates
}

/// Apply one update to the cart, producing new cart state.
pub fn apply(cart: &Cart, update: &CartUpdate) -> Applied {
    match update {
        CartUpdate::Add { item, quantity } => Applied {
            cart: add_to_cart(cart, item, (*quantity).max(1)),
            order: None,
        },
        CartUpdate::Remove { item_id, quantity } => Applied {
            cart: remove_from_cart(cart, item_id, *quantity),
            order: None,
        },
        // Clear is deliberately a no-op here: the original behavior performs
        // clearing by replacing cart state wholesale at the owner, never
        // through the reconciler. Callers must not rely on this arm to empty
        // the cart.
        CartUpdate::Clear => Applied { cart: cart.clone(), order: None },
        CartUpdate::Checkout => Applied {
            cart: cart.clone(),
            order: Some(Order::snapshot(cart)),
        },
    }
}

/// Apply a batch strictly in order, threading the cart through each update.
/// Never parallel: `[add, remove]` and `[remove, add]` are different batches.
pub fn apply_batch(cart: &Cart, updates: &[CartUpdate]) -> BatchApplied {
    let mut current = cart.clone();
    let mut orders = Vec::new();

    for update in updates {
        let applied = apply(&current, update);
        current = applied.cart;
        if let Some(order) = applied.order {
            orders.push(order);
        }
    }

    BatchApplied { cart: current, orders }
}

fn add_to_cart(cart: &Cart, item: &CatalogItem, quantity: u32) -> Cart {
    let mut lines = cart.clone().into_lines();

    match lines.iter_mut().find(|line| line.item_id == item.id) {
        // Saturate rather than wrap: wrapping could produce a zero-quantity
        // line, which the cart forbids.
        Some(line) => line.quantity = line.quantity.saturating_add(quantity),
        None => lines.push(CartLine::for_item(item, quantity)),
    }

    Cart::from_lines_unchecked(lines)
}

fn remove_from_cart(cart: &Cart, item_id: &ItemId, quantity: Option<u32>) -> Cart {
    let current_quantity = cart.quantity_of(item_id);
    if current_quantity == 0 {
        return cart.clone();
    }

    // Omitted quantity removes the whole line.
    let remove_quantity = quantity.unwrap_or(current_quantity);
    let mut lines = cart.clone().into_lines();

    if remove_quantity >= current_quantity {
        lines.retain(|line| &line.item_id != item_id);
    } else if let Some(line) = lines.iter_mut().find(|line| &line.item_id == item_id) {
        line.quantity = current_quantity - remove_quantity;
    }

    Cart::from_lines_unchecked(lines)
}
