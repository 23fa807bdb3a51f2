//! Transaction commands: the admin's log view and manual corrections.
//!
//! Corrections change what a customer owes without touching stock or the
//! sold line items. No notification is queued for them.

use kiosk_core::{Money, PaymentState, Transaction};
use tracing::{debug, info};

use crate::error::ApiError;
use crate::state::DbState;

/// Lists transactions newest first, optionally for one customer.
pub async fn list_transactions(
    db: &DbState,
    customer_id: Option<&str>,
) -> Result<Vec<Transaction>, ApiError> {
    debug!(customer_id = ?customer_id, "list_transactions command");

    let transactions = match customer_id {
        Some(id) => db.inner().transactions().list_for_customer(id).await?,
        None => db.inner().transactions().list().await?,
    };
    Ok(transactions)
}

/// Replaces the charged total of a transaction.
pub async fn update_transaction_total(
    db: &DbState,
    transaction_id: &str,
    total: Money,
) -> Result<Transaction, ApiError> {
    debug!(transaction_id = %transaction_id, "update_transaction_total command");

    let transaction = db
        .inner()
        .transactions()
        .update_total(transaction_id, total)
        .await?;

    info!(
        transaction_id = %transaction.id,
        customer = %transaction.customer_name,
        total = %transaction.total,
        "Transaction total updated"
    );
    Ok(transaction)
}

/// Moves a transaction to another payment state. Paid transactions stay paid.
pub async fn set_transaction_state(
    db: &DbState,
    transaction_id: &str,
    state: PaymentState,
) -> Result<Transaction, ApiError> {
    debug!(transaction_id = %transaction_id, state = ?state, "set_transaction_state command");

    let transaction = db
        .inner()
        .transactions()
        .set_payment_state(transaction_id, state)
        .await?;

    info!(
        transaction_id = %transaction.id,
        paid = transaction.paid,
        pending = transaction.pending,
        "Transaction state updated"
    );
    Ok(transaction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::balance::list_balances;
    use crate::commands::checkout::process_payment;
    use crate::commands::test_support::{customer, line, product, state};
    use crate::error::ErrorCode;

    #[tokio::test]
    async fn test_corrected_total_shows_in_balances() {
        let (db, config) = state().await;
        let cola = product(&db, "Cola", 3, 20).await;
        let ann = customer(&db, "Ann").await;

        let checkout = process_payment(&db, &config, &ann.id, vec![line(&cola, 2)], Money::from_major(6))
            .await
            .unwrap();

        let updated = update_transaction_total(&db, &checkout.transaction.id, Money::from_major(4))
            .await
            .unwrap();
        assert_eq!(updated.total, Money::from_major(4));

        let report = list_balances(&db).await.unwrap();
        assert_eq!(report.total_outstanding, Money::from_major(4));
        assert_eq!(db.inner().products().get_by_id(&cola.id).await.unwrap().unwrap().stock, 18);

        let err = update_transaction_total(&db, &checkout.transaction.id, Money::from_cents(-100))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);

        let err = update_transaction_total(&db, "missing", Money::zero())
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_paid_transaction_cannot_be_reopened() {
        let (db, config) = state().await;
        let cola = product(&db, "Cola", 3, 20).await;
        let ann = customer(&db, "Ann").await;
        let checkout = process_payment(&db, &config, &ann.id, vec![line(&cola, 1)], Money::from_major(3))
            .await
            .unwrap();
        let id = checkout.transaction.id;

        let pending = set_transaction_state(&db, &id, PaymentState::PendingInvoice).await.unwrap();
        assert_eq!(pending.state(), PaymentState::PendingInvoice);
        let paid = set_transaction_state(&db, &id, PaymentState::Paid).await.unwrap();
        assert_eq!(paid.state(), PaymentState::Paid);

        let err = set_transaction_state(&db, &id, PaymentState::Unbilled).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::BusinessLogic);

        let listed = list_transactions(&db, Some(&ann.id)).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].state(), PaymentState::Paid);
        assert_eq!(list_transactions(&db, None).await.unwrap().len(), 1);
    }
}
