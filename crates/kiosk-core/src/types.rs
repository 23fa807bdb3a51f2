//! # Domain Types
//!
//! Core domain types used throughout the kiosk.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Customer     │   │   Transaction   │   │    Product      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id             │◄──│  customer_id?   │   │  id             │       │
//! │  │  name, email?   │   │  items[]  ──────┼──►│  price, stock   │       │
//! │  │  role           │   │  total          │   │  purchase_price │       │
//! │  └─────────────────┘   │  paid, pending  │   │  variants[]     │       │
//! │                        └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  Balances are NOT fields: they are derived from transactions on every  │
//! │  read (see balance.rs).                                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;

// =============================================================================
// Customer
// =============================================================================

/// Role of a customer account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "UPPERCASE"))]
#[ts(export)]
#[serde(rename_all = "UPPERCASE")]
pub enum CustomerRole {
    #[default]
    User,
    Admin,
}

/// A customer with a running tab at the kiosk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub role: CustomerRole,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// A customer together with balances derived from their transactions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CustomerBalance {
    pub customer: Customer,
    /// Unbilled, unpaid amount.
    pub balance: Money,
    /// Invoiced, unpaid amount.
    pub invoice_balance: Money,
}

// =============================================================================
// Catalog
// =============================================================================

/// A product category shown as a filter tab at the kiosk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub title: String,
    /// Icon name rendered by the UI.
    pub icon: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// A product available at the kiosk.
///
/// ## Variants
/// A product with variants (e.g. flavours) tracks price and stock per
/// variant; its own `stock` and `purchase_price` stay at zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    /// Sale price.
    pub price: Money,
    pub image: String,
    pub stock: i64,
    /// Weighted-average purchase cost in major units (full precision).
    #[ts(as = "String")]
    pub purchase_price: Decimal,
    pub category_id: Option<String>,
    pub related_product_ids: Vec<String>,
    pub variants: Vec<ProductVariant>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns true when stock and price are tracked per variant.
    pub fn has_variants(&self) -> bool {
        !self.variants.is_empty()
    }

    /// Finds a variant by ID.
    pub fn variant(&self, variant_id: &str) -> Option<&ProductVariant> {
        self.variants.iter().find(|v| v.id == variant_id)
    }

    /// Units on hand, summed over variants when present.
    pub fn total_stock(&self) -> i64 {
        if self.has_variants() {
            self.variants.iter().map(|v| v.stock).sum()
        } else {
            self.stock
        }
    }

    /// Stock valued at sale price, summed over variants when present.
    pub fn stock_value(&self) -> Money {
        if self.has_variants() {
            self.variants.iter().map(|v| v.price * v.stock).sum()
        } else {
            self.price * self.stock
        }
    }
}

/// A sellable variant of a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ProductVariant {
    pub id: String,
    pub product_id: String,
    pub name: String,
    pub price: Money,
    pub stock: i64,
    #[ts(as = "String")]
    pub purchase_price: Decimal,
    pub image: Option<String>,
}

/// Input for creating or replacing a product from the admin form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ProductDraft {
    pub name: String,
    pub price: Money,
    pub image: String,
    pub stock: i64,
    #[ts(as = "String")]
    pub purchase_price: Decimal,
    pub category_id: Option<String>,
    #[serde(default)]
    pub related_product_ids: Vec<String>,
    #[serde(default)]
    pub variants: Vec<VariantDraft>,
}

impl ProductDraft {
    /// Normalizes the draft before it is persisted.
    ///
    /// A product with variants carries no stock or cost of its own.
    pub fn normalized(mut self) -> Self {
        self.name = self.name.trim().to_string();
        if !self.variants.is_empty() {
            self.stock = 0;
            self.purchase_price = Decimal::ZERO;
        }
        for variant in &mut self.variants {
            variant.name = variant.name.trim().to_string();
        }
        self
    }
}

/// Input for a variant inside a [`ProductDraft`].
///
/// `id` is `Some` when an existing variant is being kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct VariantDraft {
    pub id: Option<String>,
    pub name: String,
    pub price: Money,
    pub stock: i64,
    #[ts(as = "String")]
    pub purchase_price: Decimal,
    pub image: Option<String>,
}

// =============================================================================
// Cart Line
// =============================================================================

/// A line in a cart or a recorded transaction.
///
/// Name and price are snapshots taken when the line was added, so history
/// survives later product edits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: String,
    pub name: String,
    pub price: Money,
    pub quantity: i64,
    #[serde(default)]
    pub image: String,
    pub variant_id: Option<String>,
    pub variant_name: Option<String>,
}

impl CartLine {
    /// Line total (price × quantity).
    #[inline]
    pub fn line_total(&self) -> Money {
        self.price.multiply_quantity(self.quantity)
    }

    /// True when this line is for the given product/variant pair.
    pub fn is_item(&self, product_id: &str, variant_id: Option<&str>) -> bool {
        self.product_id == product_id && self.variant_id.as_deref() == variant_id
    }

    /// Name with the variant in parentheses, e.g. `Soda (Lime)`.
    pub fn display_name(&self) -> String {
        match &self.variant_name {
            Some(variant) if !variant.is_empty() => format!("{} ({})", self.name, variant),
            _ => self.name.clone(),
        }
    }
}

// =============================================================================
// Transaction
// =============================================================================

/// Where a transaction sits in the billing cycle.
///
/// ```text
/// Unbilled ──(invoice sent)──► PendingInvoice ──(payment received)──► Paid
/// ```
/// `Paid` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentState {
    Unbilled,
    PendingInvoice,
    Paid,
}

impl PaymentState {
    /// The `(paid, pending)` flags stored for this state.
    pub fn flags(self) -> (bool, bool) {
        match self {
            PaymentState::Unbilled => (false, false),
            PaymentState::PendingInvoice => (false, true),
            PaymentState::Paid => (true, true),
        }
    }
}

impl FromStr for PaymentState {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "unbilled" => Ok(PaymentState::Unbilled),
            "pending" | "pending_invoice" => Ok(PaymentState::PendingInvoice),
            "paid" => Ok(PaymentState::Paid),
            other => Err(CoreError::invalid(
                "state",
                format!("unknown payment state '{}', expected unbilled, pending or paid", other),
            )),
        }
    }
}

/// A completed kiosk purchase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    /// `None` for guest checkouts.
    pub customer_id: Option<String>,
    pub customer_name: String,
    pub items: Vec<CartLine>,
    pub total: Money,
    #[ts(as = "String")]
    pub timestamp: DateTime<Utc>,
    pub paid: bool,
    pub pending: bool,
}

impl Transaction {
    /// Derives the payment state from the two flags.
    ///
    /// A paid transaction is `Paid` whatever its `pending` flag says.
    pub fn state(&self) -> PaymentState {
        match (self.paid, self.pending) {
            (true, _) => PaymentState::Paid,
            (false, true) => PaymentState::PendingInvoice,
            (false, false) => PaymentState::Unbilled,
        }
    }

    /// True when the transaction was made by the given customer.
    pub fn belongs_to(&self, customer_id: &str) -> bool {
        self.customer_id.as_deref() == Some(customer_id)
    }

    /// Invoice sent: an unpaid transaction becomes pending.
    ///
    /// Returns true when the flags changed.
    pub fn send_invoice(&mut self) -> bool {
        if self.paid || self.pending {
            return false;
        }
        self.pending = true;
        true
    }

    /// Payment received: a pending transaction becomes paid.
    ///
    /// Returns true when the flags changed.
    pub fn settle(&mut self) -> bool {
        if self.paid || !self.pending {
            return false;
        }
        self.paid = true;
        true
    }

    /// Manual correction of the payment flags.
    ///
    /// Any unpaid state may move to any other state; `Paid` is terminal.
    /// Returns true when the flags changed.
    ///
    /// ## Errors
    /// `CoreError::AlreadyPaid` when a paid transaction would become unpaid.
    pub fn set_state(&mut self, state: PaymentState) -> CoreResult<bool> {
        let current = self.state();
        if current == state {
            return Ok(false);
        }
        if current == PaymentState::Paid {
            return Err(CoreError::AlreadyPaid(self.id.clone()));
        }

        let (paid, pending) = state.flags();
        self.paid = paid;
        self.pending = pending;
        Ok(true)
    }

    /// Total number of units across all lines.
    pub fn item_count(&self) -> i64 {
        self.items.iter().map(|i| i.quantity).sum()
    }
}

// =============================================================================
// Product Request
// =============================================================================

/// A request from a kiosk user for an item that is out of stock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ProductRequest {
    pub id: String,
    pub product_id: String,
    pub product_name: String,
    pub variant_id: Option<String>,
    pub variant_name: Option<String>,
    /// How many times the item was requested.
    pub count: i64,
    #[ts(as = "String")]
    pub last_requested: DateTime<Utc>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Notification Outbox
// =============================================================================

/// The kind of message queued for delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Receipt,
    Invoice,
    PaymentReceived,
    ProductRequest,
}

/// A rendered notification waiting in the outbox for an external worker.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct NotificationOutboxEntry {
    pub id: String,
    pub kind: NotificationKind,
    /// Email address, when the recipient has one.
    pub recipient: Option<String>,
    pub subject: String,
    /// Chat (markdown) body.
    pub text: String,
    /// Email (HTML) body.
    pub html: String,
    /// Structured chat payload as JSON.
    pub chat_payload: String,
    pub attempts: i64,
    pub last_error: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub attempted_at: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub delivered_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn transaction(paid: bool, pending: bool) -> Transaction {
        Transaction {
            id: "t1".to_string(),
            customer_id: Some("c1".to_string()),
            customer_name: "Ada".to_string(),
            items: vec![],
            total: Money::from_major(10),
            timestamp: Utc::now(),
            paid,
            pending,
        }
    }

    fn variant(stock: i64, price: i64) -> ProductVariant {
        ProductVariant {
            id: format!("v{}", stock),
            product_id: "p1".to_string(),
            name: "Lime".to_string(),
            price: Money::from_major(price),
            stock,
            purchase_price: Decimal::ZERO,
            image: None,
        }
    }

    fn product(variants: Vec<ProductVariant>) -> Product {
        Product {
            id: "p1".to_string(),
            name: "Soda".to_string(),
            price: Money::from_major(15),
            image: String::new(),
            stock: 4,
            purchase_price: Decimal::from(10),
            category_id: None,
            related_product_ids: vec![],
            variants,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_payment_state_from_flags() {
        assert_eq!(transaction(false, false).state(), PaymentState::Unbilled);
        assert_eq!(transaction(false, true).state(), PaymentState::PendingInvoice);
        assert_eq!(transaction(true, false).state(), PaymentState::Paid);
        assert_eq!(transaction(true, true).state(), PaymentState::Paid);
    }

    #[test]
    fn test_send_invoice_then_settle() {
        let mut tx = transaction(false, false);
        assert!(tx.send_invoice());
        assert_eq!(tx.state(), PaymentState::PendingInvoice);
        assert!(!tx.send_invoice());

        assert!(tx.settle());
        assert_eq!(tx.state(), PaymentState::Paid);
        assert!(!tx.settle());
        assert!(!tx.send_invoice());
    }

    #[test]
    fn test_payment_state_parse() {
        assert_eq!("pending".parse::<PaymentState>().unwrap(), PaymentState::PendingInvoice);
        assert_eq!("Pending-Invoice".parse::<PaymentState>().unwrap(), PaymentState::PendingInvoice);
        assert_eq!(" paid ".parse::<PaymentState>().unwrap(), PaymentState::Paid);
        assert!("refunded".parse::<PaymentState>().is_err());
    }

    #[test]
    fn test_set_state_keeps_paid_terminal() {
        let mut tx = transaction(false, true);
        assert!(!tx.set_state(PaymentState::PendingInvoice).unwrap());
        assert!(tx.set_state(PaymentState::Unbilled).unwrap());
        assert_eq!((tx.paid, tx.pending), (false, false));

        assert!(tx.set_state(PaymentState::Paid).unwrap());
        assert_eq!(tx.state(), PaymentState::Paid);
        assert!(matches!(
            tx.set_state(PaymentState::Unbilled),
            Err(CoreError::AlreadyPaid(_))
        ));
        assert!(!transaction(true, false).set_state(PaymentState::Paid).unwrap());
    }

    #[test]
    fn test_settle_requires_pending() {
        let mut tx = transaction(false, false);
        assert!(!tx.settle());
        assert_eq!(tx.state(), PaymentState::Unbilled);
    }

    #[test]
    fn test_stock_totals_without_variants() {
        let p = product(vec![]);
        assert_eq!(p.total_stock(), 4);
        assert_eq!(p.stock_value(), Money::from_major(60));
    }

    #[test]
    fn test_stock_totals_with_variants() {
        let p = product(vec![variant(2, 10), variant(3, 20)]);
        assert!(p.has_variants());
        assert_eq!(p.total_stock(), 5);
        assert_eq!(p.stock_value(), Money::from_major(80));
        assert!(p.variant("v3").is_some());
        assert!(p.variant("missing").is_none());
    }

    #[test]
    fn test_draft_with_variants_drops_own_stock() {
        let draft = ProductDraft {
            name: "  Soda ".to_string(),
            price: Money::from_major(15),
            image: String::new(),
            stock: 12,
            purchase_price: Decimal::from(9),
            category_id: None,
            related_product_ids: vec![],
            variants: vec![VariantDraft {
                id: None,
                name: " Lime ".to_string(),
                price: Money::from_major(15),
                stock: 3,
                purchase_price: Decimal::from(9),
                image: None,
            }],
        }
        .normalized();

        assert_eq!(draft.name, "Soda");
        assert_eq!(draft.stock, 0);
        assert_eq!(draft.purchase_price, Decimal::ZERO);
        assert_eq!(draft.variants[0].name, "Lime");
        assert_eq!(draft.variants[0].stock, 3);
    }

    #[test]
    fn test_cart_line_display_name() {
        let mut line = CartLine {
            product_id: "p1".to_string(),
            name: "Soda".to_string(),
            price: Money::from_major(15),
            quantity: 2,
            image: String::new(),
            variant_id: None,
            variant_name: None,
        };
        assert_eq!(line.display_name(), "Soda");
        assert_eq!(line.line_total(), Money::from_major(30));

        line.variant_id = Some("v1".to_string());
        line.variant_name = Some("Lime".to_string());
        assert_eq!(line.display_name(), "Soda (Lime)");
        assert!(line.is_item("p1", Some("v1")));
        assert!(!line.is_item("p1", None));
    }

    #[test]
    fn test_role_serializes_uppercase() {
        let json = serde_json::to_string(&CustomerRole::Admin).unwrap();
        assert_eq!(json, "\"ADMIN\"");
    }
}
