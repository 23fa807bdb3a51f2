//! # Product Request Repository
//!
//! Out-of-stock requests from the kiosk. Repeated requests for the same
//! product/variant pair bump one row's `count` instead of adding rows.

use chrono::{DateTime, Utc};
use kiosk_core::ProductRequest;
use sqlx::SqlitePool;
use tracing::debug;

use super::{begin_write, new_id};
use crate::error::{DbError, DbResult};

/// Repository for product requests.
#[derive(Debug, Clone)]
pub struct ProductRequestRepository {
    pool: SqlitePool,
}

#[derive(Debug, sqlx::FromRow)]
struct ProductRequestRow {
    id: String,
    product_id: String,
    product_name: String,
    variant_id: Option<String>,
    variant_name: Option<String>,
    count: i64,
    last_requested: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl From<ProductRequestRow> for ProductRequest {
    fn from(row: ProductRequestRow) -> Self {
        ProductRequest {
            id: row.id,
            product_id: row.product_id,
            product_name: row.product_name,
            variant_id: row.variant_id,
            variant_name: row.variant_name,
            count: row.count,
            last_requested: row.last_requested,
            created_at: row.created_at,
        }
    }
}

const REQUEST_COLUMNS: &str = r#"
    id, product_id, product_name, variant_id, variant_name,
    count, last_requested, created_at
"#;

impl ProductRequestRepository {
    /// Creates a new ProductRequestRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRequestRepository { pool }
    }

    /// Records a request: increments the existing row for this
    /// product/variant, or inserts one with `count = 1`.
    ///
    /// Names are refreshed on every request so the list shows the
    /// current product name.
    pub async fn record(
        &self,
        product_id: &str,
        product_name: &str,
        variant_id: Option<&str>,
        variant_name: Option<&str>,
    ) -> DbResult<ProductRequest> {
        let now = Utc::now();
        let mut tx = begin_write(&self.pool).await?;

        let existing: Option<String> = sqlx::query_scalar(
            r#"
            SELECT id FROM product_requests
            WHERE product_id = ?1 AND COALESCE(variant_id, '') = COALESCE(?2, '')
            "#,
        )
        .bind(product_id)
        .bind(variant_id)
        .fetch_optional(&mut *tx)
        .await?;

        let id = match existing {
            Some(id) => {
                sqlx::query(
                    r#"
                    UPDATE product_requests SET
                        count = count + 1,
                        product_name = ?2,
                        variant_name = ?3,
                        last_requested = ?4
                    WHERE id = ?1
                    "#,
                )
                .bind(&id)
                .bind(product_name)
                .bind(variant_name)
                .bind(now)
                .execute(&mut *tx)
                .await?;
                id
            }
            None => {
                let id = new_id();
                sqlx::query(
                    r#"
                    INSERT INTO product_requests (
                        id, product_id, product_name, variant_id, variant_name,
                        count, last_requested, created_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?6)
                    "#,
                )
                .bind(&id)
                .bind(product_id)
                .bind(product_name)
                .bind(variant_id)
                .bind(variant_name)
                .bind(now)
                .execute(&mut *tx)
                .await?;
                id
            }
        };

        let sql = format!("SELECT {} FROM product_requests WHERE id = ?1", REQUEST_COLUMNS);
        let row: ProductRequestRow = sqlx::query_as(&sql).bind(&id).fetch_one(&mut *tx).await?;

        tx.commit().await?;

        debug!(product_id = %product_id, variant_id = ?variant_id, count = row.count, "Product requested");
        Ok(row.into())
    }

    /// Lists requests, oldest first.
    pub async fn list(&self) -> DbResult<Vec<ProductRequest>> {
        let sql = format!(
            "SELECT {} FROM product_requests ORDER BY created_at ASC",
            REQUEST_COLUMNS
        );
        let rows: Vec<ProductRequestRow> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;

        Ok(rows.into_iter().map(ProductRequest::from).collect())
    }

    /// Deletes one request (e.g. once the item is back in stock).
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM product_requests WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("ProductRequest", id));
        }

        Ok(())
    }

    /// Deletes every request. Returns how many were removed.
    pub async fn clear_all(&self) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM product_requests")
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::db;

    #[tokio::test]
    async fn test_repeated_requests_increment_one_row() {
        let db = db().await;
        let requests = db.requests();

        requests.record("p1", "Cola", None, None).await.unwrap();
        let again = requests.record("p1", "Cola Zero", None, None).await.unwrap();
        assert_eq!(again.count, 2);
        assert_eq!(again.product_name, "Cola Zero");

        let lime = requests.record("p1", "Cola", Some("v1"), Some("Lime")).await.unwrap();
        assert_eq!(lime.count, 1);

        let all = requests.list().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, again.id);
    }

    #[tokio::test]
    async fn test_delete_and_clear() {
        let db = db().await;
        let requests = db.requests();

        let a = requests.record("p1", "Cola", None, None).await.unwrap();
        requests.record("p2", "Chips", None, None).await.unwrap();

        requests.delete(&a.id).await.unwrap();
        assert!(matches!(requests.delete(&a.id).await, Err(DbError::NotFound { .. })));

        assert_eq!(requests.clear_all().await.unwrap(), 1);
        assert!(requests.list().await.unwrap().is_empty());
    }
}
