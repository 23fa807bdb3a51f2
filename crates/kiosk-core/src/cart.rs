//! # Cart & Checkout Rules
//!
//! The kiosk cart and the checks a checkout must pass before kiosk-db
//! writes it.
//!
//! ## Checkout Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Kiosk: "Pay"                                                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  CheckoutRequest { customer?, items, total }                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  validate_checkout() ← THIS MODULE                                     │
//! │       │   non-empty, qty > 0, price >= 0, total == Σ line totals       │
//! │       ▼                                                                 │
//! │  kiosk-db: one DB transaction                                          │
//! │       ├── per line: apply_sale(stock, qty, policy) + CAS write         │
//! │       └── insert transaction + line items                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::CartLine;
use crate::validation::{validate_cart_size, validate_quantity, validate_sale_price};
use crate::GUEST_CUSTOMER_NAME;

// =============================================================================
// Line Helpers
// =============================================================================

/// Sum of line totals.
pub fn cart_total(lines: &[CartLine]) -> Money {
    lines.iter().map(CartLine::line_total).sum()
}

/// Sum of line totals, or `None` when a line total or the sum does not
/// fit in `Money`.
pub fn checked_cart_total(lines: &[CartLine]) -> Option<Money> {
    lines.iter().try_fold(Money::zero(), |acc, line| {
        line.price
            .checked_mul(line.quantity)
            .and_then(|line_total| acc.checked_add(line_total))
    })
}

/// Total number of units in the cart.
pub fn cart_item_count(lines: &[CartLine]) -> i64 {
    lines.iter().map(|l| l.quantity).sum()
}

/// Finds the line for a product/variant pair.
pub fn find_line<'a>(
    lines: &'a [CartLine],
    product_id: &str,
    variant_id: Option<&str>,
) -> Option<&'a CartLine> {
    lines.iter().find(|l| l.is_item(product_id, variant_id))
}

// =============================================================================
// Cart
// =============================================================================

/// An in-progress kiosk cart.
///
/// Adding an item that is already in the cart (same product and variant)
/// increases that line's quantity instead of adding a second line.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn into_lines(self) -> Vec<CartLine> {
        self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn total(&self) -> Money {
        cart_total(&self.lines)
    }

    pub fn item_count(&self) -> i64 {
        cart_item_count(&self.lines)
    }

    /// Adds a line, merging it into an existing line for the same item.
    ///
    /// ## Errors
    /// `CoreError::Validation` when the merged quantity or the number of
    /// lines exceeds the cart limits.
    pub fn add(&mut self, line: CartLine) -> CoreResult<()> {
        validate_quantity(line.quantity)?;
        validate_sale_price(line.price)?;

        let variant_id = line.variant_id.as_deref();
        if let Some(existing) = self
            .lines
            .iter_mut()
            .find(|l| l.is_item(&line.product_id, variant_id))
        {
            let merged = existing.quantity + line.quantity;
            validate_quantity(merged)?;
            existing.quantity = merged;
            return Ok(());
        }

        validate_cart_size(self.lines.len() + 1)?;
        self.lines.push(line);
        Ok(())
    }

    /// Sets the quantity of a line; zero removes it.
    ///
    /// Returns false when the item is not in the cart.
    pub fn set_quantity(
        &mut self,
        product_id: &str,
        variant_id: Option<&str>,
        quantity: i64,
    ) -> CoreResult<bool> {
        if quantity == 0 {
            return Ok(self.remove(product_id, variant_id));
        }
        validate_quantity(quantity)?;

        match self
            .lines
            .iter_mut()
            .find(|l| l.is_item(product_id, variant_id))
        {
            Some(line) => {
                line.quantity = quantity;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Removes the line for an item. Returns false when it was not present.
    pub fn remove(&mut self, product_id: &str, variant_id: Option<&str>) -> bool {
        let before = self.lines.len();
        self.lines.retain(|l| !l.is_item(product_id, variant_id));
        self.lines.len() != before
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }
}

// =============================================================================
// Checkout Request
// =============================================================================

/// A checkout submitted by the kiosk.
///
/// `customer_id` is `None` for a guest purchase; such transactions never
/// appear on anyone's balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub customer_id: Option<String>,
    pub customer_name: String,
    pub items: Vec<CartLine>,
    pub total: Money,
}

impl CheckoutRequest {
    /// A checkout for a registered customer.
    pub fn for_customer(
        customer_id: impl Into<String>,
        customer_name: impl Into<String>,
        items: Vec<CartLine>,
        total: Money,
    ) -> Self {
        CheckoutRequest {
            customer_id: Some(customer_id.into()),
            customer_name: customer_name.into(),
            items,
            total,
        }
    }

    /// A guest checkout. A blank name falls back to [`GUEST_CUSTOMER_NAME`].
    pub fn guest(customer_name: &str, items: Vec<CartLine>, total: Money) -> Self {
        let name = customer_name.trim();
        CheckoutRequest {
            customer_id: None,
            customer_name: if name.is_empty() {
                GUEST_CUSTOMER_NAME.to_string()
            } else {
                name.to_string()
            },
            items,
            total,
        }
    }

    pub fn is_guest(&self) -> bool {
        self.customer_id.is_none()
    }

    /// Runs [`validate_checkout`] on the request.
    pub fn validate(&self) -> CoreResult<()> {
        validate_checkout(&self.items, self.total)
    }
}

/// Checks a cart before it is charged.
///
/// ## Rules
/// - at least one line, at most `MAX_CART_LINES`
/// - every quantity in `1..=MAX_ITEM_QUANTITY`
/// - no negative prices
/// - the sum of line totals fits in `Money`
/// - `total` equals the sum of line totals
pub fn validate_checkout(lines: &[CartLine], total: Money) -> CoreResult<()> {
    if lines.is_empty() {
        return Err(CoreError::EmptyCart);
    }
    validate_cart_size(lines.len())?;

    for line in lines {
        validate_quantity(line.quantity)?;
        validate_sale_price(line.price)?;
    }

    let computed = checked_cart_total(lines)
        .ok_or_else(|| CoreError::invalid("total", "cart total is too large"))?;
    if computed != total {
        return Err(CoreError::TotalMismatch {
            submitted: total,
            computed,
        });
    }

    Ok(())
}

// =============================================================================
// Stock Policy
// =============================================================================

/// What a checkout does when a line asks for more than is in stock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum StockPolicy {
    /// Sell anyway and floor the stock at zero.
    #[default]
    Clamp,
    /// Refuse the whole checkout.
    Reject,
}

impl fmt::Display for StockPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StockPolicy::Clamp => write!(f, "clamp"),
            StockPolicy::Reject => write!(f, "reject"),
        }
    }
}

impl FromStr for StockPolicy {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "clamp" => Ok(StockPolicy::Clamp),
            "reject" => Ok(StockPolicy::Reject),
            other => Err(CoreError::invalid(
                "stock_policy",
                format!("unknown policy '{}', expected clamp or reject", other),
            )),
        }
    }
}

/// Stock level after selling `quantity` units.
///
/// ## Example
/// ```rust
/// use kiosk_core::cart::{apply_sale, StockPolicy};
///
/// assert_eq!(apply_sale(3, 5, StockPolicy::Clamp, "Cola").unwrap(), 0);
/// assert!(apply_sale(3, 5, StockPolicy::Reject, "Cola").is_err());
/// ```
pub fn apply_sale(stock: i64, quantity: i64, policy: StockPolicy, item: &str) -> CoreResult<i64> {
    if quantity <= stock {
        return Ok(stock - quantity);
    }

    match policy {
        StockPolicy::Clamp => Ok(0),
        StockPolicy::Reject => Err(CoreError::InsufficientStock {
            item: item.to_string(),
            available: stock,
            requested: quantity,
        }),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MAX_CART_LINES, MAX_ITEM_QUANTITY};

    fn line(product: &str, variant: Option<&str>, price: i64, qty: i64) -> CartLine {
        CartLine {
            product_id: product.to_string(),
            name: product.to_string(),
            price: Money::from_major(price),
            quantity: qty,
            image: String::new(),
            variant_id: variant.map(str::to_string),
            variant_name: None,
        }
    }

    #[test]
    fn test_add_merges_same_item() {
        let mut cart = Cart::new();
        cart.add(line("soda", Some("lime"), 15, 1)).unwrap();
        cart.add(line("soda", Some("lime"), 15, 2)).unwrap();
        cart.add(line("soda", Some("cherry"), 15, 1)).unwrap();
        cart.add(line("soda", None, 15, 1)).unwrap();

        assert_eq!(cart.lines().len(), 3);
        assert_eq!(find_line(cart.lines(), "soda", Some("lime")).unwrap().quantity, 3);
        assert_eq!(cart.item_count(), 5);
        assert_eq!(cart.total(), Money::from_major(75));
    }

    #[test]
    fn test_add_enforces_limits() {
        let mut cart = Cart::new();
        cart.add(line("a", None, 1, MAX_ITEM_QUANTITY)).unwrap();
        assert!(cart.add(line("a", None, 1, 1)).is_err());
        assert_eq!(cart.item_count(), MAX_ITEM_QUANTITY);

        let mut full = Cart::new();
        for i in 0..MAX_CART_LINES {
            full.add(line(&format!("p{}", i), None, 1, 1)).unwrap();
        }
        assert!(full.add(line("one-more", None, 1, 1)).is_err());
    }

    #[test]
    fn test_set_quantity_and_remove() {
        let mut cart = Cart::new();
        cart.add(line("a", None, 10, 1)).unwrap();
        assert!(cart.set_quantity("a", None, 4).unwrap());
        assert_eq!(cart.total(), Money::from_major(40));
        assert!(!cart.set_quantity("b", None, 4).unwrap());
        assert!(cart.set_quantity("a", None, 0).unwrap());
        assert!(cart.is_empty());
    }

    #[test]
    fn test_validate_checkout() {
        let lines = vec![line("a", None, 10, 2), line("b", None, 5, 1)];
        assert!(validate_checkout(&lines, Money::from_major(25)).is_ok());

        assert!(matches!(
            validate_checkout(&lines, Money::from_major(24)),
            Err(CoreError::TotalMismatch { .. })
        ));
        assert!(matches!(
            validate_checkout(&[], Money::zero()),
            Err(CoreError::EmptyCart)
        ));
        assert!(matches!(
            validate_checkout(&[line("a", None, 10, 0)], Money::zero()),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn test_validate_checkout_rejects_overflowing_total() {
        let mut big = line("a", None, 0, 3);
        big.price = Money::from_cents(i64::MAX / 2);
        let wrapped = Money::from_cents((i64::MAX / 2).wrapping_mul(3));

        assert_eq!(checked_cart_total(std::slice::from_ref(&big)), None);
        for total in [Money::zero(), wrapped] {
            assert!(matches!(
                validate_checkout(std::slice::from_ref(&big), total),
                Err(CoreError::InvalidArgument { ref field, .. }) if field == "total"
            ));
        }

        // Each line fits but the sum does not
        let mut half = line("b", None, 0, 1);
        half.price = Money::from_cents(i64::MAX / 2 + 1);
        assert_eq!(checked_cart_total(&[half.clone(), half]), None);
    }

    #[test]
    fn test_guest_request() {
        let request = CheckoutRequest::guest("  ", vec![line("a", None, 10, 1)], Money::from_major(10));
        assert!(request.is_guest());
        assert_eq!(request.customer_name, GUEST_CUSTOMER_NAME);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_apply_sale() {
        assert_eq!(apply_sale(10, 3, StockPolicy::Clamp, "a").unwrap(), 7);
        assert_eq!(apply_sale(10, 10, StockPolicy::Reject, "a").unwrap(), 0);
        assert_eq!(apply_sale(2, 3, StockPolicy::Clamp, "a").unwrap(), 0);
        assert!(matches!(
            apply_sale(2, 3, StockPolicy::Reject, "a"),
            Err(CoreError::InsufficientStock {
                available: 2,
                requested: 3,
                ..
            })
        ));
    }

    #[test]
    fn test_stock_policy_parse() {
        assert_eq!("Reject".parse::<StockPolicy>().unwrap(), StockPolicy::Reject);
        assert_eq!(" clamp ".parse::<StockPolicy>().unwrap(), StockPolicy::Clamp);
        assert!("maybe".parse::<StockPolicy>().is_err());
        assert_eq!(StockPolicy::default(), StockPolicy::Clamp);
        assert_eq!(StockPolicy::Reject.to_string(), "reject");
    }
}
