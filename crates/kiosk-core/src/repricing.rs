//! # Repricing
//!
//! Folds a restock event into an item's running cost and price using
//! weighted-average costing, so historical purchase cost is blended rather
//! than overwritten.
//!
//! ## Restock Workflow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Admin: "Add to stock"                                                  │
//! │                                                                         │
//! │  Variant "Lime": stock 10 @ cost 5                                     │
//! │  Incoming batch:  10 @ cost 15, markup 1.1                             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  reprice() ← THIS MODULE                                               │
//! │       │   cost  = (5×10 + 15×10) / 20 = 10                              │
//! │       │   price = round(10 × 1.1)     = 11                              │
//! │       ▼                                                                 │
//! │  kiosk-db writes { stock: 20, purchase_price: 10, price: 11 }          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;

/// Markup used by the restock dialog when none is configured (1.1 = +10%).
pub const DEFAULT_MARKUP: Decimal = Decimal::from_parts(11, 0, 0, false, 1);

/// A restock event for a single product or variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct StockBatch {
    pub current_stock: i64,
    #[ts(as = "String")]
    pub current_purchase_price: Decimal,
    pub incoming_stock: i64,
    /// Cost of the incoming units; `None` when the admin left it blank.
    #[ts(as = "Option<String>")]
    pub incoming_purchase_price: Option<Decimal>,
    #[ts(as = "String")]
    pub markup_factor: Decimal,
}

impl StockBatch {
    /// Builds a batch the way the restock dialog does.
    ///
    /// An item with no recorded cost (zero) takes the incoming cost as its
    /// current cost, so the first priced delivery is not averaged against 0.
    pub fn restock(
        current_stock: i64,
        current_purchase_price: Decimal,
        incoming_stock: i64,
        incoming_purchase_price: Option<Decimal>,
        markup_factor: Decimal,
    ) -> Self {
        let current_purchase_price = if current_purchase_price.is_zero() {
            incoming_purchase_price.unwrap_or(Decimal::ZERO)
        } else {
            current_purchase_price
        };

        StockBatch {
            current_stock,
            current_purchase_price,
            incoming_stock,
            incoming_purchase_price,
            markup_factor,
        }
    }
}

/// New stock, cost and sale price after a restock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct RepricedStock {
    pub stock: i64,
    /// Weighted-average cost, full precision.
    #[ts(as = "String")]
    pub purchase_price: Decimal,
    /// Sale price rounded to a whole major unit.
    pub price: Money,
}

/// Computes the weighted-average cost, new stock level and marked-up price.
///
/// ## Rules
/// - `total = current_stock + incoming_stock`
/// - `total == 0`: cost tracks the incoming cost (0 when absent), stock 0
/// - otherwise: cost is the quantity-weighted average of both costs
/// - `price = round(cost × markup)` to a whole major unit, halves away
///   from zero; `purchase_price` is not rounded
///
/// ## Errors
/// `CoreError::InvalidArgument` for negative stock counts, negative
/// prices, a non-positive markup, or a result that overflows.
pub fn reprice(batch: &StockBatch) -> CoreResult<RepricedStock> {
    validate_batch(batch)?;

    let incoming_price = batch.incoming_purchase_price.unwrap_or(Decimal::ZERO);
    let total_stock = batch
        .current_stock
        .checked_add(batch.incoming_stock)
        .ok_or_else(|| CoreError::invalid("incoming_stock", "total stock overflows"))?;

    let purchase_price = if total_stock == 0 {
        incoming_price
    } else {
        let current_value = batch
            .current_purchase_price
            .checked_mul(Decimal::from(batch.current_stock));
        let incoming_value = incoming_price.checked_mul(Decimal::from(batch.incoming_stock));

        current_value
            .zip(incoming_value)
            .and_then(|(c, i)| c.checked_add(i))
            .and_then(|sum| sum.checked_div(Decimal::from(total_stock)))
            .ok_or_else(|| CoreError::invalid("purchase_price", "stock value overflows"))?
    };

    let price = purchase_price
        .checked_mul(batch.markup_factor)
        .and_then(Money::from_decimal_rounded)
        .ok_or_else(|| CoreError::invalid("price", "marked-up price overflows"))?;

    Ok(RepricedStock {
        stock: total_stock,
        purchase_price,
        price,
    })
}

/// Refreshes the sale price from existing cost without adding stock.
pub fn reprice_existing(
    stock: i64,
    purchase_price: Decimal,
    markup_factor: Decimal,
) -> CoreResult<RepricedStock> {
    reprice(&StockBatch {
        current_stock: stock,
        current_purchase_price: purchase_price,
        incoming_stock: 0,
        incoming_purchase_price: None,
        markup_factor,
    })
}

fn validate_batch(batch: &StockBatch) -> CoreResult<()> {
    if batch.current_stock < 0 {
        return Err(CoreError::invalid("current_stock", "must not be negative"));
    }
    if batch.incoming_stock < 0 {
        return Err(CoreError::invalid("incoming_stock", "must not be negative"));
    }
    if batch.current_purchase_price < Decimal::ZERO {
        return Err(CoreError::invalid(
            "current_purchase_price",
            "must not be negative",
        ));
    }
    if let Some(price) = batch.incoming_purchase_price {
        if price < Decimal::ZERO {
            return Err(CoreError::invalid(
                "incoming_purchase_price",
                "must not be negative",
            ));
        }
    }
    if batch.markup_factor <= Decimal::ZERO {
        return Err(CoreError::invalid(
            "markup_factor",
            "must be greater than zero",
        ));
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
