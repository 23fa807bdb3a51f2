//! # Customer Repository
//!
//! Customers, and their balances folded from the transaction log in SQL.
//!
//! ## Balance Push-Down
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  customers c LEFT JOIN transactions t ON t.customer_id = c.id          │
//! │  GROUP BY c.id                                                          │
//! │                                                                         │
//! │  balance         = Σ total WHERE paid = 0 AND pending = 0              │
//! │  invoice_balance = Σ total WHERE paid = 0 AND pending = 1              │
//! │                                                                         │
//! │  Same semantics as kiosk_core::balance::aggregate, without loading     │
//! │  every transaction into memory.                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use kiosk_core::validation::{validate_customer_name, validate_email};
use kiosk_core::{BalanceSummary, CoreError, Customer, CustomerBalance, CustomerRole, Money};
use sqlx::SqlitePool;
use tracing::{debug, info};

use super::new_id;
use crate::error::{DbError, DbResult};

/// Repository for customer database operations.
#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

#[derive(Debug, sqlx::FromRow)]
struct CustomerRow {
    id: String,
    name: String,
    email: Option<String>,
    role: CustomerRole,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CustomerRow> for Customer {
    fn from(row: CustomerRow) -> Self {
        Customer {
            id: row.id,
            name: row.name,
            // Blank emails are stored as NULL; normalize legacy rows too
            email: row.email.filter(|e| !e.trim().is_empty()),
            role: row.role,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CustomerBalanceRow {
    #[sqlx(flatten)]
    customer: CustomerRow,
    balance_cents: i64,
    invoice_balance_cents: i64,
}

const BALANCE_COLUMNS: &str = r#"
    c.id, c.name, c.email, c.role, c.created_at, c.updated_at,
    COALESCE(SUM(CASE WHEN t.paid = 0 AND t.pending = 0 THEN t.total_cents END), 0) AS balance_cents,
    COALESCE(SUM(CASE WHEN t.paid = 0 AND t.pending = 1 THEN t.total_cents END), 0) AS invoice_balance_cents
"#;

fn normalize_email(email: Option<&str>) -> Result<Option<String>, CoreError> {
    match email.map(str::trim).filter(|e| !e.is_empty()) {
        Some(email) => {
            validate_email(email)?;
            Ok(Some(email.to_string()))
        }
        None => Ok(None),
    }
}

impl CustomerRepository {
    /// Creates a new CustomerRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CustomerRepository { pool }
    }

    /// Creates a customer.
    ///
    /// ## Errors
    /// `DbError::Domain` for a blank name or malformed email.
    pub async fn create(
        &self,
        name: &str,
        email: Option<&str>,
        role: CustomerRole,
    ) -> DbResult<Customer> {
        validate_customer_name(name).map_err(CoreError::from)?;
        let email = normalize_email(email)?;
        let now = Utc::now();

        let customer = Customer {
            id: new_id(),
            name: name.trim().to_string(),
            email,
            role,
            created_at: now,
            updated_at: now,
        };

        debug!(id = %customer.id, "Inserting customer");

        sqlx::query(
            r#"
            INSERT INTO customers (id, name, email, role, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&customer.id)
        .bind(&customer.name)
        .bind(&customer.email)
        .bind(customer.role)
        .bind(customer.created_at)
        .bind(customer.updated_at)
        .execute(&self.pool)
        .await?;

        info!(id = %customer.id, name = %customer.name, "Customer created");
        Ok(customer)
    }

    /// Updates name, email and role.
    pub async fn update(&self, customer: &Customer) -> DbResult<Customer> {
        validate_customer_name(&customer.name).map_err(CoreError::from)?;
        let email = normalize_email(customer.email.as_deref())?;
        let now = Utc::now();

        debug!(id = %customer.id, "Updating customer");

        let result = sqlx::query(
            r#"
            UPDATE customers SET
                name = ?2,
                email = ?3,
                role = ?4,
                updated_at = ?5
            WHERE id = ?1
            "#,
        )
        .bind(&customer.id)
        .bind(customer.name.trim())
        .bind(&email)
        .bind(customer.role)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Customer", &customer.id));
        }

        Ok(Customer {
            name: customer.name.trim().to_string(),
            email,
            updated_at: now,
            ..customer.clone()
        })
    }

    /// Deletes a customer.
    ///
    /// ## Errors
    /// `DbError::ForeignKeyViolation` when the customer has transactions.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting customer");

        let result = sqlx::query("DELETE FROM customers WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Customer", id));
        }

        Ok(())
    }

    /// Gets a customer by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Customer>> {
        let row: Option<CustomerRow> = sqlx::query_as(
            r#"
            SELECT id, name, email, role, created_at, updated_at
            FROM customers
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Customer::from))
    }

    /// Lists customers by name.
    pub async fn list(&self) -> DbResult<Vec<Customer>> {
        let rows: Vec<CustomerRow> = sqlx::query_as(
            r#"
            SELECT id, name, email, role, created_at, updated_at
            FROM customers
            ORDER BY name COLLATE NOCASE
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Customer::from).collect())
    }

    /// Lists every customer with outstanding and pending-invoice balances.
    ///
    /// Customers without transactions are included with zero balances.
    pub async fn list_with_balances(&self) -> DbResult<Vec<CustomerBalance>> {
        let sql = format!(
            r#"
            SELECT {}
            FROM customers c
            LEFT JOIN transactions t ON t.customer_id = c.id
            GROUP BY c.id
            ORDER BY c.name COLLATE NOCASE
            "#,
            BALANCE_COLUMNS
        );

        let rows: Vec<CustomerBalanceRow> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;

        debug!(count = rows.len(), "Loaded customer balances");

        Ok(rows.into_iter().map(into_balance).collect())
    }

    /// One customer with balances.
    pub async fn get_with_balance(&self, id: &str) -> DbResult<Option<CustomerBalance>> {
        let sql = format!(
            r#"
            SELECT {}
            FROM customers c
            LEFT JOIN transactions t ON t.customer_id = c.id
            WHERE c.id = ?1
            GROUP BY c.id
            "#,
            BALANCE_COLUMNS
        );

        let row: Option<CustomerBalanceRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(into_balance))
    }

    /// Balance figures of one customer (zero for an unknown id).
    pub async fn balance(&self, id: &str) -> DbResult<BalanceSummary> {
        let (outstanding, pending): (i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COALESCE(SUM(CASE WHEN paid = 0 AND pending = 0 THEN total_cents END), 0),
                COALESCE(SUM(CASE WHEN paid = 0 AND pending = 1 THEN total_cents END), 0)
            FROM transactions
            WHERE customer_id = ?1
            "#,
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        Ok(BalanceSummary {
            outstanding: Money::from_cents(outstanding),
            pending_invoice: Money::from_cents(pending),
        })
    }

    /// Counts customers.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM customers")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

fn into_balance(row: CustomerBalanceRow) -> CustomerBalance {
    CustomerBalance {
        customer: row.customer.into(),
        balance: Money::from_cents(row.balance_cents),
        invoice_balance: Money::from_cents(row.invoice_balance_cents),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support;

    #[tokio::test]
    async fn test_create_and_get() {
        let db = test_support::db().await;
        let created = db
            .customers()
            .create("  Ada ", Some(" ada@example.com "), CustomerRole::Admin)
            .await
            .unwrap();

        assert_eq!(created.name, "Ada");
        assert_eq!(created.email.as_deref(), Some("ada@example.com"));

        let loaded = db.customers().get_by_id(&created.id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "Ada");
        assert_eq!(loaded.role, CustomerRole::Admin);
        assert_eq!(db.customers().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_blank_email_is_stored_as_none() {
        let db = test_support::db().await;
        let c = db.customers().create("Bob", Some("  "), CustomerRole::User).await.unwrap();
        assert!(c.email.is_none());
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_input() {
        let db = test_support::db().await;
        let err = db.customers().create(" ", None, CustomerRole::User).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::Validation(_))));

        let err = db
            .customers()
            .create("Eve", Some("not-an-email"), CustomerRole::User)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(_)));
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let db = test_support::db().await;
        let mut c = test_support::customer(&db, "Ada").await;
        c.name = "Ada L.".to_string();
        c.email = None;
        let updated = db.customers().update(&c).await.unwrap();
        assert_eq!(updated.name, "Ada L.");

        let loaded = db.customers().get_by_id(&c.id).await.unwrap().unwrap();
        assert!(loaded.email.is_none());

        db.customers().delete(&c.id).await.unwrap();
        assert!(db.customers().get_by_id(&c.id).await.unwrap().is_none());
        assert!(matches!(
            db.customers().delete(&c.id).await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_customers_without_transactions_have_zero_balance() {
        let db = test_support::db().await;
        test_support::customer(&db, "Ada").await;
        test_support::customer(&db, "Bob").await;

        let balances = db.customers().list_with_balances().await.unwrap();
        assert_eq!(balances.len(), 2);
        assert_eq!(balances[0].customer.name, "Ada");
        assert!(balances.iter().all(|b| b.balance.is_zero() && b.invoice_balance.is_zero()));

        let summary = db.customers().balance("nobody").await.unwrap();
        assert_eq!(summary, BalanceSummary::default());
    }
}
