use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::catalog::{CatalogItem, ItemId};
use crate::errors::DomainError;

/// One cart line. At most one line exists per item id, and quantity is
/// always >= 1 - a line that would drop to zero is removed instead.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    pub item_id: ItemId,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: u32,
}

impl CartLine {
    pub fn for_item(item: &CatalogItem, quantity: u32) -> Self {
        Self {
            item_id: item.id.clone(),
            name: item.name.clone(),
            unit_price: item.price,
            quantity,
        }
    }

    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// The session-scoped shopping cart. Lines are created, mutated, and
/// destroyed only through reconciler output; external code reads state and
/// replaces it wholesale, never edits lines in place.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Validated constructor for rebuilding a cart from known-good lines.
    pub fn new(lines: Vec<CartLine>) -> Result<Self, DomainError> {
        for (index, line) in lines.iter().enumerate() {
            if line.quantity == 0 {
                return Err(DomainError::InvariantViolation(format!(
                    "cart line for `{}` has zero quantity",
                    line.item_id.0
                )));
            }
            if lines[..index].iter().any(|earlier| earlier.item_id == line.item_id) {
                return Err(DomainError::InvariantViolation(format!(
                    "duplicate cart line for `{}`",
                    line.item_id.0
                )));
            }
        }

        Ok(Self { lines })
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn quantity_of(&self, item_id: &ItemId) -> u32 {
        self.lines
            .iter()
            .find(|line| &line.item_id == item_id)
            .map(|line| line.quantity)
            .unwrap_or(0)
    }

    /// Derived total - never stored.
    pub fn total(&self) -> Decimal {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    pub(crate) fn into_lines(self) -> Vec<CartLine> {
        self.lines
    }

    pub(crate) fn from_lines_unchecked(lines: Vec<CartLine>) -> Self {
        Self { lines }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use crate::domain::catalog::Catalog;
    use crate::errors::DomainError;

    use super::{Cart, CartLine};

    #[test]
    fn total_sums_price_times_quantity() {
        let catalog = Catalog::storefront();
        let windsurf = catalog.find_by_name("windsurf").expect("fixture item");
        let cart = Cart::new(vec![CartLine::for_item(windsurf, 2)]).expect("valid cart");
        assert_eq!(cart.total(), Decimal::new(30_00, 2));
    }

    #[test]
    fn empty_cart_totals_zero() {
        assert_eq!(Cart::empty().total(), Decimal::ZERO);
    }

    #[test]
    fn rejects_zero_quantity_lines() {
        let catalog = Catalog::storefront();
        let windsurf = catalog.find_by_name("windsurf").expect("fixture item");
        let error = Cart::new(vec![CartLine::for_item(windsurf, 0)])
            .expect_err("zero quantity must be rejected");
        assert!(matches!(error, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn rejects_duplicate_lines_for_one_item() {
        let catalog = Catalog::storefront();
        let windsurf = catalog.find_by_name("windsurf").expect("fixture item");
        let error = Cart::new(vec![
            CartLine::for_item(windsurf, 1),
            CartLine::for_item(windsurf, 2),
        ])
        .expect_err("duplicate lines must be rejected");
        assert!(matches!(error, DomainError::InvariantViolation(_)));
    }
}
