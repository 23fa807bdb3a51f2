//! # Balance Commands
//!
//! Customer tabs and the billing cycle.
//!
//! ## Billing Cycle
//! ```text
//! checkout ──► UNBILLED ──send_invoice──► PENDING INVOICE ──settle──► PAID
//!              (balance)                  (invoice balance)
//! ```
//!
//! Each transition is one guarded UPDATE in kiosk-db. The notification is
//! queued after the UPDATE has committed.

use kiosk_core::balance::{sort_by_balance_desc, total_outstanding};
use kiosk_core::{notification, CustomerBalance, Money};
use kiosk_db::Settlement;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::ApiError;
use crate::state::{ConfigState, DbState};

// =============================================================================
// Response Types
// =============================================================================

/// Every customer with balances, largest balance first.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceReport {
    pub customers: Vec<CustomerBalance>,
    /// Sum of all outstanding balances.
    pub total_outstanding: Money,
}

/// Outcome of invoicing one customer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceResponse {
    pub customer_id: String,
    pub customer_name: String,
    /// Transactions moved from unbilled to pending invoice.
    pub transactions_invoiced: u64,
    /// Amount on the invoice (everything unpaid).
    pub amount: Money,
    pub notification_queued: bool,
}

/// Outcome of settling one customer's pending invoices.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettleResponse {
    pub customer_id: String,
    pub transactions_settled: u64,
    pub amount: Money,
    pub notification_queued: bool,
}

// =============================================================================
// Commands
// =============================================================================

/// Lists customers with their balances.
pub async fn list_balances(db: &DbState) -> Result<BalanceReport, ApiError> {
    debug!("list_balances command");

    let mut customers = db.inner().customers().list_with_balances().await?;
    sort_by_balance_desc(&mut customers);
    let total_outstanding = total_outstanding(&customers);

    Ok(BalanceReport {
        customers,
        total_outstanding,
    })
}

/// Sends an invoice for everything the customer has not paid yet.
///
/// Unbilled transactions become pending invoices; the invoice lists every
/// unpaid line and bills the sum of both balances. A customer with nothing
/// unpaid gets no invoice.
pub async fn send_invoice(
    db: &DbState,
    config: &ConfigState,
    customer_id: &str,
) -> Result<InvoiceResponse, ApiError> {
    debug!(customer_id = %customer_id, "send_invoice command");

    let customer = db
        .inner()
        .customers()
        .get_by_id(customer_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Customer", customer_id))?;

    let transactions = db.inner().transactions();
    let invoiced = transactions.mark_invoice_sent(customer_id).await?;
    let amount = db.inner().customers().balance(customer_id).await?.total_unpaid();

    if amount.is_zero() {
        debug!(customer_id = %customer_id, "Nothing to invoice");
        return Ok(InvoiceResponse {
            customer_id: customer.id,
            customer_name: customer.name,
            transactions_invoiced: invoiced,
            amount,
            notification_queued: false,
        });
    }

    let history = transactions.list_for_customer(customer_id).await?;
    let message = notification::invoice(
        &customer,
        &history,
        amount,
        config.payment_link.as_deref(),
        &config.currency_symbol,
    );
    let notification_queued = super::queue_notification(db, &message).await;

    info!(
        customer_id = %customer_id,
        transactions = invoiced,
        amount = %amount,
        "Invoice sent"
    );

    Ok(InvoiceResponse {
        customer_id: customer.id,
        customer_name: customer.name,
        transactions_invoiced: invoiced,
        amount,
        notification_queued,
    })
}

/// Invoices every customer with an outstanding balance.
pub async fn send_all_invoices(
    db: &DbState,
    config: &ConfigState,
) -> Result<Vec<InvoiceResponse>, ApiError> {
    debug!("send_all_invoices command");

    let balances = db.inner().customers().list_with_balances().await?;
    let mut sent = Vec::new();

    for entry in balances.iter().filter(|b| b.balance.is_positive()) {
        sent.push(send_invoice(db, config, &entry.customer.id).await?);
    }

    info!(count = sent.len(), "Invoices sent");
    Ok(sent)
}

/// Records payment of the customer's pending invoices.
///
/// Unbilled purchases made after the invoice stay open.
pub async fn settle_customer(
    db: &DbState,
    config: &ConfigState,
    customer_id: &str,
) -> Result<SettleResponse, ApiError> {
    debug!(customer_id = %customer_id, "settle_customer command");

    let customer = db
        .inner()
        .customers()
        .get_by_id(customer_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Customer", customer_id))?;

    let Settlement {
        transactions_settled: settled,
        amount,
    } = db.inner().transactions().settle_customer(customer_id).await?;

    let notification_queued = if settled > 0 {
        let message = notification::payment_received(&customer, amount, &config.currency_symbol);
        super::queue_notification(db, &message).await
    } else {
        false
    };

    info!(
        customer_id = %customer_id,
        transactions = settled,
        amount = %amount,
        "Customer settled"
    );

    Ok(SettleResponse {
        customer_id: customer.id,
        transactions_settled: settled,
        amount,
        notification_queued,
    })
}

/// Marks every pending invoice of every customer as paid. No notifications.
pub async fn settle_all(db: &DbState) -> Result<u64, ApiError> {
    debug!("settle_all command");

    let settled = db.inner().transactions().mark_all_paid().await?;
    info!(transactions = settled, "All pending invoices settled");
    Ok(settled)
}
