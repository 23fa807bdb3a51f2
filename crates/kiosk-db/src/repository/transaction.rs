//! # Transaction Repository
//!
//! Checkout, the billing transitions, and sales figures.
//!
//! ## Checkout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  checkout(request, policy)                                              │
//! │       │                                                                 │
//! │       │  request.validate()   (empty cart, quantities, total)           │
//! │       ▼                                                                 │
//! │  BEGIN IMMEDIATE                        (waits on busy_timeout)         │
//! │   customer exists?            (skipped for guests)                      │
//! │   for each line:                                                        │
//! │     read stock → apply_sale(stock, qty, policy)                         │
//! │     UPDATE .. SET stock = new WHERE id = ? AND stock = <read>           │
//! │        └── 0 rows: ROLLBACK and retry the whole checkout                │
//! │   INSERT transaction + line snapshots                                   │
//! │  COMMIT                                                                 │
//! │                                                                         │
//! │  Either every stock change and the transaction row land, or nothing.    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Billing Transitions
//! ```text
//! Unbilled (0,0) ──mark_invoice_sent──► Pending (0,1) ──mark_customer_paid──► Paid (1,1)
//! ```
//! Each transition is one `UPDATE` guarded by the source state, so applying
//! it twice is a no-op.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use kiosk_core::cart::{apply_sale, CheckoutRequest, StockPolicy};
use kiosk_core::validation::validate_transaction_total;
use kiosk_core::{
    CartLine, Money, PaymentState, ProductSales, SalesStatistics, Transaction, VariantSales,
};
use sqlx::{Sqlite, SqlitePool, Transaction as SqlTransaction};
use tracing::{debug, info, warn};

use super::{begin_write, new_id, Attempt, MAX_STOCK_ATTEMPTS};
use crate::error::{DbError, DbResult};

/// What a customer's payment settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settlement {
    pub transactions_settled: u64,
    pub amount: Money,
}

/// Repository for the transaction log.
#[derive(Debug, Clone)]
pub struct TransactionRepository {
    pool: SqlitePool,
}

#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: String,
    customer_id: Option<String>,
    customer_name: String,
    total_cents: i64,
    timestamp: DateTime<Utc>,
    paid: bool,
    pending: bool,
}

impl TransactionRow {
    fn into_transaction(self, items: Vec<CartLine>) -> Transaction {
        Transaction {
            id: self.id,
            customer_id: self.customer_id,
            customer_name: self.customer_name,
            items,
            total: Money::from_cents(self.total_cents),
            timestamp: self.timestamp,
            paid: self.paid,
            pending: self.pending,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ItemRow {
    transaction_id: String,
    product_id: String,
    name: String,
    price_cents: i64,
    quantity: i64,
    image: String,
    variant_id: Option<String>,
    variant_name: Option<String>,
}

impl From<ItemRow> for CartLine {
    fn from(row: ItemRow) -> Self {
        CartLine {
            product_id: row.product_id,
            name: row.name,
            price: Money::from_cents(row.price_cents),
            quantity: row.quantity,
            image: row.image,
            variant_id: row.variant_id,
            variant_name: row.variant_name,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SalesRow {
    product_id: String,
    variant_id: Option<String>,
    total_sold: i64,
    total_revenue_cents: i64,
}

const TRANSACTION_COLUMNS: &str =
    "id, customer_id, customer_name, total_cents, timestamp, paid, pending";

const ITEM_COLUMNS: &str = r#"
    transaction_id, product_id, name, price_cents, quantity, image, variant_id, variant_name
"#;

impl TransactionRepository {
    /// Creates a new TransactionRepository.
    pub fn new(pool: SqlitePool) -> Self {
        TransactionRepository { pool }
    }

    // =========================================================================
    // Checkout
    // =========================================================================

    /// Records a purchase and decrements stock, atomically.
    ///
    /// ## Errors
    /// - `DbError::Domain` for an invalid cart, or `InsufficientStock`
    ///   under [`StockPolicy::Reject`]
    /// - `DbError::NotFound` for an unknown customer, product or variant
    /// - `DbError::StockConflict` when every attempt lost a stock race
    ///
    /// Nothing is written when an error is returned.
    pub async fn checkout(
        &self,
        request: &CheckoutRequest,
        policy: StockPolicy,
    ) -> DbResult<Transaction> {
        request.validate()?;

        let mut item = String::new();
        for attempt in 1..=MAX_STOCK_ATTEMPTS {
            match self.try_checkout(request, policy).await? {
                Attempt::Done(transaction) => {
                    info!(
                        id = %transaction.id,
                        customer = %transaction.customer_name,
                        guest = request.is_guest(),
                        total = %transaction.total,
                        lines = transaction.items.len(),
                        "Checkout recorded"
                    );
                    return Ok(transaction);
                }
                Attempt::Conflict(conflicted) => {
                    warn!(item = %conflicted, attempt, "Stock changed during checkout, retrying");
                    item = conflicted;
                }
            }
        }

        Err(DbError::StockConflict {
            item,
            attempts: MAX_STOCK_ATTEMPTS,
        })
    }

    async fn try_checkout(
        &self,
        request: &CheckoutRequest,
        policy: StockPolicy,
    ) -> DbResult<Attempt<Transaction>> {
        let mut tx = begin_write(&self.pool).await?;

        if let Some(customer_id) = &request.customer_id {
            let exists: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM customers WHERE id = ?1")
                .bind(customer_id)
                .fetch_one(&mut *tx)
                .await?;
            if exists == 0 {
                return Err(DbError::not_found("Customer", customer_id));
            }
        }

        for line in &request.items {
            if !take_stock(&mut tx, line, policy).await? {
                tx.rollback().await?;
                return Ok(Attempt::Conflict(line.display_name()));
            }
        }

        let transaction = Transaction {
            id: new_id(),
            customer_id: request.customer_id.clone(),
            customer_name: request.customer_name.clone(),
            items: request.items.clone(),
            total: request.total,
            timestamp: Utc::now(),
            paid: false,
            pending: false,
        };

        sqlx::query(
            r#"
            INSERT INTO transactions (
                id, customer_id, customer_name, total_cents, timestamp, paid, pending
            ) VALUES (?1, ?2, ?3, ?4, ?5, 0, 0)
            "#,
        )
        .bind(&transaction.id)
        .bind(&transaction.customer_id)
        .bind(&transaction.customer_name)
        .bind(transaction.total.cents())
        .bind(transaction.timestamp)
        .execute(&mut *tx)
        .await?;

        for (position, line) in transaction.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO transaction_items (
                    id, transaction_id, product_id, name, price_cents, quantity,
                    image, variant_id, variant_name, position
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                "#,
            )
            .bind(new_id())
            .bind(&transaction.id)
            .bind(&line.product_id)
            .bind(&line.name)
            .bind(line.price.cents())
            .bind(line.quantity)
            .bind(&line.image)
            .bind(&line.variant_id)
            .bind(&line.variant_name)
            .bind(position as i64)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(Attempt::Done(transaction))
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Gets a transaction with its lines.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Transaction>> {
        let sql = format!("SELECT {} FROM transactions WHERE id = ?1", TRANSACTION_COLUMNS);
        let row: Option<TransactionRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let sql = format!(
            "SELECT {} FROM transaction_items WHERE transaction_id = ?1 ORDER BY position",
            ITEM_COLUMNS
        );
        let items = sqlx::query_as::<_, ItemRow>(&sql)
            .bind(id)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(CartLine::from)
            .collect();

        Ok(Some(row.into_transaction(items)))
    }

    /// Lists all transactions, newest first.
    pub async fn list(&self) -> DbResult<Vec<Transaction>> {
        let sql = format!(
            "SELECT {} FROM transactions ORDER BY timestamp DESC",
            TRANSACTION_COLUMNS
        );
        let rows: Vec<TransactionRow> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;

        let sql = format!(
            "SELECT {} FROM transaction_items ORDER BY transaction_id, position",
            ITEM_COLUMNS
        );
        let items: Vec<ItemRow> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;

        Ok(attach_items(rows, items))
    }

    /// Lists one customer's transactions, newest first.
    pub async fn list_for_customer(&self, customer_id: &str) -> DbResult<Vec<Transaction>> {
        let sql = format!(
            "SELECT {} FROM transactions WHERE customer_id = ?1 ORDER BY timestamp DESC",
            TRANSACTION_COLUMNS
        );
        let rows: Vec<TransactionRow> = sqlx::query_as(&sql)
            .bind(customer_id)
            .fetch_all(&self.pool)
            .await?;

        let sql = format!(
            r#"
            SELECT {} FROM transaction_items
            WHERE transaction_id IN (SELECT id FROM transactions WHERE customer_id = ?1)
            ORDER BY transaction_id, position
            "#,
            ITEM_COLUMNS
        );
        let items: Vec<ItemRow> = sqlx::query_as(&sql)
            .bind(customer_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(attach_items(rows, items))
    }

    /// Counts transactions.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM transactions")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    // =========================================================================
    // Billing Transitions
    // =========================================================================

    /// Moves a customer's unbilled transactions to pending.
    ///
    /// Returns the number of transactions that changed.
    pub async fn mark_invoice_sent(&self, customer_id: &str) -> DbResult<u64> {
        let result = sqlx::query(
            "UPDATE transactions SET pending = 1 WHERE customer_id = ?1 AND paid = 0 AND pending = 0",
        )
        .bind(customer_id)
        .execute(&self.pool)
        .await?;

        debug!(customer_id = %customer_id, changed = result.rows_affected(), "Invoice sent");
        Ok(result.rows_affected())
    }

    /// Settles a customer's pending transactions.
    ///
    /// Unbilled transactions are untouched: only invoiced amounts are paid.
    pub async fn mark_customer_paid(&self, customer_id: &str) -> DbResult<u64> {
        let result = sqlx::query(
            "UPDATE transactions SET paid = 1 WHERE customer_id = ?1 AND paid = 0 AND pending = 1",
        )
        .bind(customer_id)
        .execute(&self.pool)
        .await?;

        debug!(customer_id = %customer_id, changed = result.rows_affected(), "Customer paid");
        Ok(result.rows_affected())
    }

    /// Settles a customer's pending transactions and reports the amount
    /// settled.
    ///
    /// The sum and the update run in one write transaction, so an invoice
    /// sent concurrently is either fully included or left for the next
    /// payment.
    pub async fn settle_customer(&self, customer_id: &str) -> DbResult<Settlement> {
        let mut tx = begin_write(&self.pool).await?;

        let amount: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(total_cents), 0) FROM transactions
            WHERE customer_id = ?1 AND paid = 0 AND pending = 1
            "#,
        )
        .bind(customer_id)
        .fetch_one(&mut *tx)
        .await?;

        let result = sqlx::query(
            "UPDATE transactions SET paid = 1 WHERE customer_id = ?1 AND paid = 0 AND pending = 1",
        )
        .bind(customer_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        let settlement = Settlement {
            transactions_settled: result.rows_affected(),
            amount: Money::from_cents(amount),
        };
        debug!(
            customer_id = %customer_id,
            changed = settlement.transactions_settled,
            amount = %settlement.amount,
            "Customer settled"
        );
        Ok(settlement)
    }

    /// Settles every pending transaction of every customer.
    pub async fn mark_all_paid(&self) -> DbResult<u64> {
        let result =
            sqlx::query("UPDATE transactions SET paid = 1 WHERE paid = 0 AND pending = 1")
                .execute(&self.pool)
                .await?;

        info!(changed = result.rows_affected(), "All pending transactions paid");
        Ok(result.rows_affected())
    }

    // =========================================================================
    // Corrections
    // =========================================================================

    /// Replaces a transaction's total (an admin correction).
    ///
    /// Line items are kept as they were sold; only the charged amount, and
    /// with it the customer's balance, changes.
    pub async fn update_total(&self, id: &str, total: Money) -> DbResult<Transaction> {
        validate_transaction_total(total).map_err(kiosk_core::CoreError::from)?;

        let result = sqlx::query("UPDATE transactions SET total_cents = ?2 WHERE id = ?1")
            .bind(id)
            .bind(total.cents())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Transaction", id));
        }

        info!(id = %id, total = %total, "Transaction total corrected");
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Transaction", id))
    }

    /// Sets a transaction's payment flags by hand.
    ///
    /// ## Errors
    /// `CoreError::AlreadyPaid` (as `DbError::Domain`) when a paid
    /// transaction would be reopened.
    pub async fn set_payment_state(&self, id: &str, state: PaymentState) -> DbResult<Transaction> {
        let mut tx = begin_write(&self.pool).await?;

        let sql = format!("SELECT {} FROM transactions WHERE id = ?1", TRANSACTION_COLUMNS);
        let row: TransactionRow = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DbError::not_found("Transaction", id))?;

        let mut transaction = row.into_transaction(Vec::new());
        if transaction.set_state(state)? {
            sqlx::query("UPDATE transactions SET paid = ?2, pending = ?3 WHERE id = ?1")
                .bind(id)
                .bind(transaction.paid)
                .bind(transaction.pending)
                .execute(&mut *tx)
                .await?;
            info!(id = %id, state = ?state, "Transaction payment state set");
        }
        tx.commit().await?;

        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Transaction", id))
    }

    // =========================================================================
    // Sales
    // =========================================================================

    /// Units and revenue per product and variant over all history.
    pub async fn sales_statistics(&self) -> DbResult<SalesStatistics> {
        let rows: Vec<SalesRow> = sqlx::query_as(
            r#"
            SELECT
                product_id,
                variant_id,
                SUM(quantity) AS total_sold,
                SUM(price_cents * quantity) AS total_revenue_cents
            FROM transaction_items
            GROUP BY product_id, variant_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut stats = SalesStatistics::new();
        for row in rows {
            let revenue = Money::from_cents(row.total_revenue_cents);
            let product = stats.entry(row.product_id).or_insert_with(ProductSales::default);
            product.total_sold += row.total_sold;
            product.total_revenue += revenue;

            if let Some(variant_id) = row.variant_id {
                let variant = product.variant_sales.entry(variant_id).or_insert_with(VariantSales::default);
                variant.total_sold += row.total_sold;
                variant.total_revenue += revenue;
            }
        }

        Ok(stats)
    }
}

/// Reads the stock of the line's product or variant, applies the sale and
/// writes it back if nobody changed it in between.
///
/// Returns false when the compare-and-swap lost.
async fn take_stock(
    tx: &mut SqlTransaction<'_, Sqlite>,
    line: &CartLine,
    policy: StockPolicy,
) -> DbResult<bool> {
    let (table, item_id) = match &line.variant_id {
        Some(variant_id) => ("product_variants", variant_id.as_str()),
        None => ("products", line.product_id.as_str()),
    };

    let stock: Option<i64> = match &line.variant_id {
        Some(variant_id) => {
            sqlx::query_scalar("SELECT stock FROM product_variants WHERE id = ?1 AND product_id = ?2")
                .bind(variant_id)
                .bind(&line.product_id)
                .fetch_optional(&mut **tx)
                .await?
        }
        None => {
            sqlx::query_scalar("SELECT stock FROM products WHERE id = ?1")
                .bind(&line.product_id)
                .fetch_optional(&mut **tx)
                .await?
        }
    };

    let stock = stock.ok_or_else(|| match line.variant_id {
        Some(_) => DbError::not_found("Variant", item_id),
        None => DbError::not_found("Product", item_id),
    })?;

    let remaining = apply_sale(stock, line.quantity, policy, &line.display_name())?;

    let sql = format!("UPDATE {} SET stock = ?2 WHERE id = ?1 AND stock = ?3", table);
    let result = sqlx::query(&sql)
        .bind(item_id)
        .bind(remaining)
        .bind(stock)
        .execute(&mut **tx)
        .await?;

    Ok(result.rows_affected() == 1)
}

fn attach_items(rows: Vec<TransactionRow>, items: Vec<ItemRow>) -> Vec<Transaction> {
    let mut by_transaction: HashMap<String, Vec<CartLine>> = HashMap::new();
    for item in items {
        by_transaction
            .entry(item.transaction_id.clone())
            .or_default()
            .push(item.into());
    }

    rows.into_iter()
        .map(|row| {
            let lines = by_transaction.remove(&row.id).unwrap_or_default();
            row.into_transaction(lines)
        })
        .collect()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{customer, db, draft, variant};
    use crate::{Database, DbConfig, RestockRequest};
    use kiosk_core::{CoreError, Product};

    fn line(product: &Product, quantity: i64) -> CartLine {
        CartLine {
            product_id: product.id.clone(),
            name: product.name.clone(),
            price: product.price,
            quantity,
            image: String::new(),
            variant_id: None,
            variant_name: None,
        }
    }

    fn variant_line(product: &Product, index: usize, quantity: i64) -> CartLine {
        let v = &product.variants[index];
        CartLine {
            price: v.price,
            variant_id: Some(v.id.clone()),
            variant_name: Some(v.name.clone()),
            ..line(product, quantity)
        }
    }

    fn request_for(customer: &kiosk_core::Customer, items: Vec<CartLine>) -> CheckoutRequest {
        let total = kiosk_core::cart::cart_total(&items);
        CheckoutRequest::for_customer(&customer.id, &customer.name, items, total)
    }

    async fn stock_of(db: &Database, product_id: &str) -> i64 {
        db.products().get_by_id(product_id).await.unwrap().unwrap().stock
    }

    #[tokio::test]
    async fn test_checkout_records_transaction_and_decrements_stock() {
        let db = db().await;
        let ada = customer(&db, "Ada").await;
        let cola = db.products().create(draft("Cola", 2, 10, 1)).await.unwrap();

        let tx = db
            .transactions()
            .checkout(&request_for(&ada, vec![line(&cola, 3)]), StockPolicy::Clamp)
            .await
            .unwrap();

        assert_eq!(tx.total, Money::from_major(6));
        assert!(!tx.paid && !tx.pending);
        assert_eq!(stock_of(&db, &cola.id).await, 7);

        let stored = db.transactions().get_by_id(&tx.id).await.unwrap().unwrap();
        assert_eq!(stored, tx);

        let balance = db.customers().balance(&ada.id).await.unwrap();
        assert_eq!(balance.outstanding, Money::from_major(6));
    }

    #[tokio::test]
    async fn test_checkout_variant_stock() {
        let db = db().await;
        let ada = customer(&db, "Ada").await;
        let mut d = draft("Soda", 2, 0, 0);
        d.variants = vec![variant("Lime", 2, 4, 1), variant("Cola", 3, 4, 1)];
        let soda = db.products().create(d).await.unwrap();

        db.transactions()
            .checkout(&request_for(&ada, vec![variant_line(&soda, 1, 2)]), StockPolicy::Clamp)
            .await
            .unwrap();

        let soda = db.products().get_by_id(&soda.id).await.unwrap().unwrap();
        assert_eq!(soda.variants[0].stock, 4);
        assert_eq!(soda.variants[1].stock, 2);
    }

    #[tokio::test]
    async fn test_clamp_floors_stock_at_zero() {
        let db = db().await;
        let ada = customer(&db, "Ada").await;
        let cola = db.products().create(draft("Cola", 2, 2, 1)).await.unwrap();

        db.transactions()
            .checkout(&request_for(&ada, vec![line(&cola, 5)]), StockPolicy::Clamp)
            .await
            .unwrap();

        assert_eq!(stock_of(&db, &cola.id).await, 0);
    }

    #[tokio::test]
    async fn test_reject_leaves_everything_untouched() {
        let db = db().await;
        let ada = customer(&db, "Ada").await;
        let cola = db.products().create(draft("Cola", 2, 10, 1)).await.unwrap();
        let chips = db.products().create(draft("Chips", 1, 1, 1)).await.unwrap();

        let err = db
            .transactions()
            .checkout(
                &request_for(&ada, vec![line(&cola, 3), line(&chips, 2)]),
                StockPolicy::Reject,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::Domain(CoreError::InsufficientStock { .. })));
        assert_eq!(stock_of(&db, &cola.id).await, 10);
        assert_eq!(stock_of(&db, &chips.id).await, 1);
        assert_eq!(db.transactions().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unknown_product_or_customer_writes_nothing() {
        let db = db().await;
        let ada = customer(&db, "Ada").await;
        let cola = db.products().create(draft("Cola", 2, 10, 1)).await.unwrap();

        let mut ghost = line(&cola, 1);
        ghost.product_id = "missing".to_string();
        let err = db
            .transactions()
            .checkout(&request_for(&ada, vec![line(&cola, 1), ghost]), StockPolicy::Clamp)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
        assert_eq!(stock_of(&db, &cola.id).await, 10);

        let mut stranger = ada.clone();
        stranger.id = "missing".to_string();
        let err = db
            .transactions()
            .checkout(&request_for(&stranger, vec![line(&cola, 1)]), StockPolicy::Clamp)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
        assert_eq!(db.transactions().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_invalid_cart_rejected_before_io() {
        let db = db().await;
        let ada = customer(&db, "Ada").await;
        let cola = db.products().create(draft("Cola", 2, 10, 1)).await.unwrap();

        let request = CheckoutRequest::for_customer(
            &ada.id,
            &ada.name,
            vec![line(&cola, 1)],
            Money::from_major(99),
        );
        assert!(matches!(
            db.transactions().checkout(&request, StockPolicy::Clamp).await,
            Err(DbError::Domain(CoreError::TotalMismatch { .. }))
        ));

        let empty = CheckoutRequest::for_customer(&ada.id, &ada.name, vec![], Money::zero());
        assert!(matches!(
            db.transactions().checkout(&empty, StockPolicy::Clamp).await,
            Err(DbError::Domain(CoreError::EmptyCart))
        ));
    }

    #[tokio::test]
    async fn test_guest_checkout_never_hits_balances() {
        let db = db().await;
        let ada = customer(&db, "Ada").await;
        let cola = db.products().create(draft("Cola", 2, 10, 1)).await.unwrap();

        let items = vec![line(&cola, 2)];
        let total = kiosk_core::cart::cart_total(&items);
        let tx = db
            .transactions()
            .checkout(&CheckoutRequest::guest("", items, total), StockPolicy::Clamp)
            .await
            .unwrap();

        assert!(tx.customer_id.is_none());
        assert_eq!(tx.customer_name, kiosk_core::GUEST_CUSTOMER_NAME);
        assert_eq!(stock_of(&db, &cola.id).await, 8);

        let balances = db.customers().list_with_balances().await.unwrap();
        assert_eq!(balances.len(), 1);
        assert!(balances[0].balance.is_zero());
        assert_eq!(db.customers().get_by_id(&ada.id).await.unwrap().unwrap().name, "Ada");
    }

    #[tokio::test]
    async fn test_billing_cycle() {
        let db = db().await;
        let ada = customer(&db, "Ada").await;
        let cola = db.products().create(draft("Cola", 1, 1000, 1)).await.unwrap();

        for qty in [100, 50, 30] {
            db.transactions()
                .checkout(&request_for(&ada, vec![line(&cola, qty)]), StockPolicy::Clamp)
                .await
                .unwrap();
        }

        let balance = db.customers().balance(&ada.id).await.unwrap();
        assert_eq!(balance.outstanding, Money::from_major(180));
        assert!(balance.pending_invoice.is_zero());

        // Paying before invoicing settles nothing
        assert_eq!(db.transactions().mark_customer_paid(&ada.id).await.unwrap(), 0);

        assert_eq!(db.transactions().mark_invoice_sent(&ada.id).await.unwrap(), 3);
        assert_eq!(db.transactions().mark_invoice_sent(&ada.id).await.unwrap(), 0);
        let balance = db.customers().balance(&ada.id).await.unwrap();
        assert!(balance.outstanding.is_zero());
        assert_eq!(balance.pending_invoice, Money::from_major(180));

        // A purchase after the invoice is outstanding again
        db.transactions()
            .checkout(&request_for(&ada, vec![line(&cola, 5)]), StockPolicy::Clamp)
            .await
            .unwrap();

        assert_eq!(db.transactions().mark_all_paid().await.unwrap(), 3);
        let balance = db.customers().balance(&ada.id).await.unwrap();
        assert_eq!(balance.outstanding, Money::from_major(5));
        assert!(balance.pending_invoice.is_zero());
    }

    #[tokio::test]
    async fn test_sql_balances_match_core_fold() {
        let db = db().await;
        let ada = customer(&db, "Ada").await;
        let bob = customer(&db, "Bob").await;
        let cola = db.products().create(draft("Cola", 3, 1000, 1)).await.unwrap();

        for (who, qty) in [(&ada, 2), (&bob, 1), (&ada, 4)] {
            db.transactions()
                .checkout(&request_for(who, vec![line(&cola, qty)]), StockPolicy::Clamp)
                .await
                .unwrap();
        }
        db.transactions().mark_invoice_sent(&bob.id).await.unwrap();

        let all = db.transactions().list().await.unwrap();
        let folded = kiosk_core::balance::aggregate_by_customer(&all);

        for row in db.customers().list_with_balances().await.unwrap() {
            let expected = folded.get(&row.customer.id).copied().unwrap_or_default();
            assert_eq!(row.balance, expected.outstanding);
            assert_eq!(row.invoice_balance, expected.pending_invoice);
        }
    }

    #[tokio::test]
    async fn test_customer_with_history_cannot_be_deleted() {
        let db = db().await;
        let ada = customer(&db, "Ada").await;
        let cola = db.products().create(draft("Cola", 1, 5, 1)).await.unwrap();
        db.transactions()
            .checkout(&request_for(&ada, vec![line(&cola, 1)]), StockPolicy::Clamp)
            .await
            .unwrap();

        assert!(matches!(
            db.customers().delete(&ada.id).await,
            Err(DbError::ForeignKeyViolation { .. })
        ));
    }

    #[tokio::test]
    async fn test_list_is_newest_first_with_items() {
        let db = db().await;
        let ada = customer(&db, "Ada").await;
        let cola = db.products().create(draft("Cola", 1, 50, 1)).await.unwrap();
        let chips = db.products().create(draft("Chips", 2, 50, 1)).await.unwrap();

        let first = db
            .transactions()
            .checkout(&request_for(&ada, vec![line(&cola, 1)]), StockPolicy::Clamp)
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = db
            .transactions()
            .checkout(
                &request_for(&ada, vec![line(&chips, 1), line(&cola, 2)]),
                StockPolicy::Clamp,
            )
            .await
            .unwrap();

        let listed = db.transactions().list_for_customer(&ada.id).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, second.id);
        assert_eq!(listed[0].items[0].name, "Chips");
        assert_eq!(listed[1].id, first.id);
    }

    #[tokio::test]
    async fn test_sales_statistics_match_core_fold() {
        let db = db().await;
        let ada = customer(&db, "Ada").await;
        let cola = db.products().create(draft("Cola", 2, 50, 1)).await.unwrap();
        let mut d = draft("Soda", 2, 0, 0);
        d.variants = vec![variant("Lime", 2, 10, 1), variant("Cola", 3, 10, 1)];
        let soda = db.products().create(d).await.unwrap();

        db.transactions()
            .checkout(
                &request_for(&ada, vec![line(&cola, 2), variant_line(&soda, 0, 1)]),
                StockPolicy::Clamp,
            )
            .await
            .unwrap();
        db.transactions()
            .checkout(
                &request_for(&ada, vec![variant_line(&soda, 1, 2), line(&cola, 1)]),
                StockPolicy::Clamp,
            )
            .await
            .unwrap();

        let stats = db.transactions().sales_statistics().await.unwrap();
        let all = db.transactions().list().await.unwrap();
        assert_eq!(stats, kiosk_core::sales::compute_sales_statistics(&all));

        let soda_sales = &stats[&soda.id];
        assert_eq!(soda_sales.total_sold, 3);
        assert_eq!(soda_sales.total_revenue, Money::from_major(8));
        assert_eq!(soda_sales.variant_sales.len(), 2);
        assert_eq!(stats[&cola.id].total_sold, 3);
    }

    #[tokio::test]
    async fn test_settle_customer_reports_what_it_settled() {
        let db = db().await;
        let ada = customer(&db, "Ada").await;
        let cola = db.products().create(draft("Cola", 1, 100, 1)).await.unwrap();

        let nothing = db.transactions().settle_customer(&ada.id).await.unwrap();
        assert_eq!(nothing, Settlement { transactions_settled: 0, amount: Money::zero() });

        for qty in [10, 5] {
            db.transactions()
                .checkout(&request_for(&ada, vec![line(&cola, qty)]), StockPolicy::Clamp)
                .await
                .unwrap();
        }
        db.transactions().mark_invoice_sent(&ada.id).await.unwrap();
        db.transactions()
            .checkout(&request_for(&ada, vec![line(&cola, 3)]), StockPolicy::Clamp)
            .await
            .unwrap();

        let settled = db.transactions().settle_customer(&ada.id).await.unwrap();
        assert_eq!(settled.transactions_settled, 2);
        assert_eq!(settled.amount, Money::from_major(15));

        let balance = db.customers().balance(&ada.id).await.unwrap();
        assert_eq!(balance.outstanding, Money::from_major(3));
        assert!(balance.pending_invoice.is_zero());
    }

    #[tokio::test]
    async fn test_update_total_changes_balance() {
        let db = db().await;
        let ada = customer(&db, "Ada").await;
        let cola = db.products().create(draft("Cola", 4, 10, 1)).await.unwrap();
        let tx = db
            .transactions()
            .checkout(&request_for(&ada, vec![line(&cola, 2)]), StockPolicy::Clamp)
            .await
            .unwrap();

        let corrected = db
            .transactions()
            .update_total(&tx.id, Money::from_major(5))
            .await
            .unwrap();
        assert_eq!(corrected.total, Money::from_major(5));
        assert_eq!(corrected.items, tx.items);
        assert_eq!(
            db.customers().balance(&ada.id).await.unwrap().outstanding,
            Money::from_major(5)
        );

        assert!(matches!(
            db.transactions().update_total(&tx.id, Money::from_cents(-1)).await,
            Err(DbError::Domain(CoreError::Validation(_)))
        ));
        assert!(matches!(
            db.transactions().update_total("missing", Money::zero()).await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_set_payment_state_keeps_paid_terminal() {
        let db = db().await;
        let ada = customer(&db, "Ada").await;
        let cola = db.products().create(draft("Cola", 1, 10, 1)).await.unwrap();
        let tx = db
            .transactions()
            .checkout(&request_for(&ada, vec![line(&cola, 2)]), StockPolicy::Clamp)
            .await
            .unwrap();

        let pending = db
            .transactions()
            .set_payment_state(&tx.id, PaymentState::PendingInvoice)
            .await
            .unwrap();
        assert_eq!(pending.state(), PaymentState::PendingInvoice);
        assert_eq!(
            db.customers().balance(&ada.id).await.unwrap().pending_invoice,
            Money::from_major(2)
        );

        let paid = db
            .transactions()
            .set_payment_state(&tx.id, PaymentState::Paid)
            .await
            .unwrap();
        assert!(paid.paid && paid.pending);

        assert!(matches!(
            db.transactions().set_payment_state(&tx.id, PaymentState::Unbilled).await,
            Err(DbError::Domain(CoreError::AlreadyPaid(_)))
        ));
        let stored = db.transactions().get_by_id(&tx.id).await.unwrap().unwrap();
        assert_eq!(stored.state(), PaymentState::Paid);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_checkouts_on_file_database_all_land() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(DbConfig::new(dir.path().join("kiosk.db")).max_connections(8))
            .await
            .unwrap();
        let ada = customer(&db, "Ada").await;
        let cola = db.products().create(draft("Cola", 1, 100, 1)).await.unwrap();
        let request = request_for(&ada, vec![line(&cola, 1)]);

        let mut checkouts = Vec::new();
        for _ in 0..48 {
            let db = db.clone();
            let request = request.clone();
            checkouts.push(tokio::spawn(async move {
                db.transactions().checkout(&request, StockPolicy::Reject).await
            }));
        }
        let mut restocks = Vec::new();
        for _ in 0..8 {
            let db = db.clone();
            let restock = RestockRequest {
                product_id: cola.id.clone(),
                variant_id: None,
                incoming_stock: 1,
                incoming_purchase_price: None,
                markup: kiosk_core::DEFAULT_MARKUP,
            };
            restocks.push(tokio::spawn(async move { db.products().restock(&restock).await }));
        }

        for handle in checkouts {
            handle.await.unwrap().unwrap();
        }
        for handle in restocks {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(stock_of(&db, &cola.id).await, 100 - 48 + 8);
        assert_eq!(db.transactions().count().await.unwrap(), 48);
        db.close().await;
    }
}
