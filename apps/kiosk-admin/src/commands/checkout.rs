//! # Checkout Commands
//!
//! Purchases made at the kiosk. A registered customer's purchase goes on
//! their tab and gets a receipt; a guest purchase is recorded by name only.

use kiosk_core::cart::{cart_total, CheckoutRequest};
use kiosk_core::{notification, CartLine, Money, Transaction};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::ApiError;
use crate::state::{ConfigState, DbState};

/// Result of a checkout.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub transaction: Transaction,
    /// Outstanding balance after the purchase; `None` for guests.
    pub new_balance: Option<Money>,
    pub notification_queued: bool,
}

/// Charges a cart to a customer's tab.
///
/// `total` is the amount the kiosk showed; it must match the lines. Stock
/// shortfalls follow the configured stock policy.
pub async fn process_payment(
    db: &DbState,
    config: &ConfigState,
    customer_id: &str,
    items: Vec<CartLine>,
    total: Money,
) -> Result<CheckoutResponse, ApiError> {
    debug!(customer_id = %customer_id, lines = items.len(), "process_payment command");

    let customer = db
        .inner()
        .customers()
        .get_by_id(customer_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Customer", customer_id))?;

    let request = CheckoutRequest::for_customer(&customer.id, &customer.name, items, total);
    let transaction = db
        .inner()
        .transactions()
        .checkout(&request, config.stock_policy)
        .await?;

    let new_balance = db.inner().customers().balance(&customer.id).await?.outstanding;

    let receipt = notification::receipt(
        &customer.name,
        customer.email.as_deref(),
        &transaction.items,
        transaction.total,
        new_balance,
        &config.currency_symbol,
    );
    let notification_queued = super::queue_notification(db, &receipt).await;

    info!(
        transaction_id = %transaction.id,
        customer_id = %customer.id,
        total = %transaction.total,
        new_balance = %new_balance,
        "Payment processed"
    );

    Ok(CheckoutResponse {
        transaction,
        new_balance: Some(new_balance),
        notification_queued,
    })
}

/// Records a purchase by someone without an account.
///
/// The total is computed from the lines. A blank name is recorded as the
/// guest name.
pub async fn process_guest_payment(
    db: &DbState,
    config: &ConfigState,
    customer_name: &str,
    items: Vec<CartLine>,
) -> Result<CheckoutResponse, ApiError> {
    debug!(lines = items.len(), "process_guest_payment command");

    let total = cart_total(&items);
    let request = CheckoutRequest::guest(customer_name, items, total);
    let transaction = db
        .inner()
        .transactions()
        .checkout(&request, config.stock_policy)
        .await?;

    info!(
        transaction_id = %transaction.id,
        customer_name = %transaction.customer_name,
        total = %transaction.total,
        "Guest payment processed"
    );

    Ok(CheckoutResponse {
        transaction,
        new_balance: None,
        notification_queued: false,
    })
}
