//! # Product Repository
//!
//! Products, their variants, and restocking.
//!
//! ## Restock Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  restock(request)                                                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  BEGIN IMMEDIATE                        (waits on busy_timeout)         │
//! │   read stock + purchase_price (product row or variant row)              │
//! │   StockBatch::restock(..) → reprice(..)  (kiosk-core, pure)             │
//! │   UPDATE .. SET stock, purchase_price, price                            │
//! │          WHERE id = ? AND stock = <read> AND purchase_price = <read>    │
//! │       │                                                                 │
//! │       ├── 1 row  → COMMIT, done                                         │
//! │       └── 0 rows → ROLLBACK, retry (up to MAX_STOCK_ATTEMPTS)           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use kiosk_core::repricing::{reprice, StockBatch};
use kiosk_core::validation::{validate_markup, validate_product_draft};
use kiosk_core::{
    CoreError, Money, Product, ProductDraft, ProductVariant, RepricedStock, VariantDraft,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{Sqlite, SqlitePool, Transaction as SqlTransaction};
use tracing::{debug, info, warn};

use super::{begin_write, decode_decimal, encode_decimal, new_id, Attempt, MAX_STOCK_ATTEMPTS};
use crate::error::{DbError, DbResult};

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

/// A delivery to book against a product or one of its variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestockRequest {
    pub product_id: String,
    /// Required when the product has variants.
    pub variant_id: Option<String>,
    pub incoming_stock: i64,
    /// Unit cost of the delivery; `None` when unknown.
    pub incoming_purchase_price: Option<Decimal>,
    pub markup: Decimal,
}

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: String,
    name: String,
    price_cents: i64,
    image: String,
    stock: i64,
    purchase_price: String,
    category_id: Option<String>,
    related_product_ids: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ProductRow {
    fn into_product(self, variants: Vec<ProductVariant>) -> DbResult<Product> {
        let purchase_price = decode_decimal(&self.purchase_price, "purchase_price", &self.id)?;
        let related_product_ids: Vec<String> = serde_json::from_str(&self.related_product_ids)
            .map_err(|e| DbError::corrupt("related_product_ids", &self.id, e))?;

        Ok(Product {
            id: self.id,
            name: self.name,
            price: Money::from_cents(self.price_cents),
            image: self.image,
            stock: self.stock,
            purchase_price,
            category_id: self.category_id,
            related_product_ids,
            variants,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct VariantRow {
    id: String,
    product_id: String,
    name: String,
    price_cents: i64,
    stock: i64,
    purchase_price: String,
    image: Option<String>,
}

impl TryFrom<VariantRow> for ProductVariant {
    type Error = DbError;

    fn try_from(row: VariantRow) -> DbResult<Self> {
        let purchase_price = decode_decimal(&row.purchase_price, "purchase_price", &row.id)?;
        Ok(ProductVariant {
            id: row.id,
            product_id: row.product_id,
            name: row.name,
            price: Money::from_cents(row.price_cents),
            stock: row.stock,
            purchase_price,
            image: row.image,
        })
    }
}

/// Stock and cost as read at the start of a restock attempt.
#[derive(Debug, sqlx::FromRow)]
struct StockRow {
    stock: i64,
    purchase_price: String,
}

const PRODUCT_COLUMNS: &str = r#"
    id, name, price_cents, image, stock, purchase_price,
    category_id, related_product_ids, created_at, updated_at
"#;

const VARIANT_COLUMNS: &str =
    "id, product_id, name, price_cents, stock, purchase_price, image";

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    // =========================================================================
    // Catalog CRUD
    // =========================================================================

    /// Creates a product and its variants in one transaction.
    pub async fn create(&self, draft: ProductDraft) -> DbResult<Product> {
        validate_product_draft(&draft).map_err(CoreError::from)?;
        let draft = draft.normalized();
        let id = new_id();
        let now = Utc::now();
        let related = serde_json::to_string(&draft.related_product_ids)?;

        let mut tx = begin_write(&self.pool).await?;

        sqlx::query(
            r#"
            INSERT INTO products (
                id, name, price_cents, image, stock, purchase_price,
                category_id, related_product_ids, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
            "#,
        )
        .bind(&id)
        .bind(&draft.name)
        .bind(draft.price.cents())
        .bind(&draft.image)
        .bind(draft.stock)
        .bind(encode_decimal(draft.purchase_price))
        .bind(&draft.category_id)
        .bind(&related)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for (position, variant) in draft.variants.iter().enumerate() {
            insert_variant(&mut tx, &id, &new_id(), variant, position as i64).await?;
        }

        tx.commit().await?;

        info!(id = %id, name = %draft.name, variants = draft.variants.len(), "Product created");

        self.get_by_id(&id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", &id))
    }

    /// Replaces a product's fields and reconciles its variants.
    ///
    /// Variants in the draft with a known `id` are updated, those without
    /// one are created, and stored variants missing from the draft are
    /// deleted. Past transactions keep their snapshots either way.
    pub async fn update(&self, id: &str, draft: ProductDraft) -> DbResult<Product> {
        validate_product_draft(&draft).map_err(CoreError::from)?;
        let draft = draft.normalized();
        let related = serde_json::to_string(&draft.related_product_ids)?;

        let mut tx = begin_write(&self.pool).await?;

        let result = sqlx::query(
            r#"
            UPDATE products SET
                name = ?2,
                price_cents = ?3,
                image = ?4,
                stock = ?5,
                purchase_price = ?6,
                category_id = ?7,
                related_product_ids = ?8,
                updated_at = ?9
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(&draft.name)
        .bind(draft.price.cents())
        .bind(&draft.image)
        .bind(draft.stock)
        .bind(encode_decimal(draft.purchase_price))
        .bind(&draft.category_id)
        .bind(&related)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        let existing: HashSet<String> =
            sqlx::query_scalar("SELECT id FROM product_variants WHERE product_id = ?1")
                .bind(id)
                .fetch_all(&mut *tx)
                .await?
                .into_iter()
                .collect();

        let mut kept = HashSet::new();
        for (position, variant) in draft.variants.iter().enumerate() {
            let position = position as i64;
            match variant.id.as_deref().filter(|v| existing.contains(*v)) {
                Some(variant_id) => {
                    update_variant(&mut tx, variant_id, variant, position).await?;
                    kept.insert(variant_id.to_string());
                }
                None => insert_variant(&mut tx, id, &new_id(), variant, position).await?,
            }
        }

        for stale in existing.difference(&kept) {
            sqlx::query("DELETE FROM product_variants WHERE id = ?1")
                .bind(stale)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        debug!(
            id = %id,
            kept = kept.len(),
            removed = existing.len() - kept.len(),
            "Product updated"
        );

        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))
    }

    /// Deletes a product; its variants go with it.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM products WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        info!(id = %id, "Product deleted");
        Ok(())
    }

    /// Gets a product with its variants.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {} FROM products WHERE id = ?1", PRODUCT_COLUMNS);
        let row: Option<ProductRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let sql = format!(
            "SELECT {} FROM product_variants WHERE product_id = ?1 ORDER BY position",
            VARIANT_COLUMNS
        );
        let variants = sqlx::query_as::<_, VariantRow>(&sql)
            .bind(id)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(ProductVariant::try_from)
            .collect::<DbResult<Vec<_>>>()?;

        row.into_product(variants).map(Some)
    }

    /// Lists all products by name, variants included.
    pub async fn list(&self) -> DbResult<Vec<Product>> {
        let sql = format!(
            "SELECT {} FROM products ORDER BY name COLLATE NOCASE",
            PRODUCT_COLUMNS
        );
        let rows: Vec<ProductRow> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;

        let sql = format!(
            "SELECT {} FROM product_variants ORDER BY product_id, position",
            VARIANT_COLUMNS
        );
        let mut variants: HashMap<String, Vec<ProductVariant>> = HashMap::new();
        for row in sqlx::query_as::<_, VariantRow>(&sql)
            .fetch_all(&self.pool)
            .await?
        {
            let variant = ProductVariant::try_from(row)?;
            variants
                .entry(variant.product_id.clone())
                .or_default()
                .push(variant);
        }

        rows.into_iter()
            .map(|row| {
                let own = variants.remove(&row.id).unwrap_or_default();
                row.into_product(own)
            })
            .collect()
    }

    /// Counts products.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    // =========================================================================
    // Restock
    // =========================================================================

    /// Books a delivery: adds stock, averages the cost and sets the
    /// marked-up sale price, all in one transaction.
    ///
    /// ## Errors
    /// - `DbError::NotFound` for an unknown product or variant
    /// - `DbError::Domain` for invalid quantities or markup, or when a
    ///   product with variants is restocked without naming one
    /// - `DbError::StockConflict` when every attempt lost a race
    pub async fn restock(&self, request: &RestockRequest) -> DbResult<RepricedStock> {
        validate_markup(request.markup).map_err(CoreError::from)?;

        let mut item = request.product_id.clone();
        for attempt in 1..=MAX_STOCK_ATTEMPTS {
            match self.try_restock(request).await? {
                Attempt::Done(repriced) => {
                    info!(
                        product_id = %request.product_id,
                        variant_id = ?request.variant_id,
                        stock = repriced.stock,
                        price = %repriced.price,
                        "Restocked"
                    );
                    return Ok(repriced);
                }
                Attempt::Conflict(conflicted) => {
                    warn!(item = %conflicted, attempt, "Stock changed during restock, retrying");
                    item = conflicted;
                }
            }
        }

        Err(DbError::StockConflict {
            item,
            attempts: MAX_STOCK_ATTEMPTS,
        })
    }

    async fn try_restock(&self, request: &RestockRequest) -> DbResult<Attempt<RepricedStock>> {
        let mut tx = begin_write(&self.pool).await?;

        let (table, item_id) = match request.variant_id.as_deref() {
            Some(variant_id) => ("product_variants", variant_id),
            None => ("products", request.product_id.as_str()),
        };

        let current: StockRow = match request.variant_id.as_deref() {
            Some(variant_id) => sqlx::query_as(
                "SELECT stock, purchase_price FROM product_variants WHERE id = ?1 AND product_id = ?2",
            )
            .bind(variant_id)
            .bind(&request.product_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DbError::not_found("Variant", variant_id))?,
            None => {
                let row: StockRow = sqlx::query_as(
                    "SELECT stock, purchase_price FROM products WHERE id = ?1",
                )
                .bind(&request.product_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| DbError::not_found("Product", &request.product_id))?;

                let variant_count: i64 = sqlx::query_scalar(
                    "SELECT COUNT(*) FROM product_variants WHERE product_id = ?1",
                )
                .bind(&request.product_id)
                .fetch_one(&mut *tx)
                .await?;

                if variant_count > 0 {
                    return Err(CoreError::invalid(
                        "variant_id",
                        "product has variants; restock one of them",
                    )
                    .into());
                }
                row
            }
        };

        let current_cost = decode_decimal(&current.purchase_price, "purchase_price", item_id)?;
        let batch = StockBatch::restock(
            current.stock,
            current_cost,
            request.incoming_stock,
            request.incoming_purchase_price,
            request.markup,
        );
        let repriced = reprice(&batch)?;

        let sql = format!(
            r#"
            UPDATE {} SET stock = ?2, purchase_price = ?3, price_cents = ?4
            WHERE id = ?1 AND stock = ?5 AND purchase_price = ?6
            "#,
            table
        );
        let result = sqlx::query(&sql)
            .bind(item_id)
            .bind(repriced.stock)
            .bind(encode_decimal(repriced.purchase_price))
            .bind(repriced.price.cents())
            .bind(current.stock)
            .bind(&current.purchase_price)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(Attempt::Conflict(item_id.to_string()));
        }

        sqlx::query("UPDATE products SET updated_at = ?2 WHERE id = ?1")
            .bind(&request.product_id)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Attempt::Done(repriced))
    }
}

async fn insert_variant(
    tx: &mut SqlTransaction<'_, Sqlite>,
    product_id: &str,
    variant_id: &str,
    variant: &VariantDraft,
    position: i64,
) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO product_variants (
            id, product_id, name, price_cents, stock, purchase_price, image, position
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(variant_id)
    .bind(product_id)
    .bind(&variant.name)
    .bind(variant.price.cents())
    .bind(variant.stock)
    .bind(encode_decimal(variant.purchase_price))
    .bind(&variant.image)
    .bind(position)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

async fn update_variant(
    tx: &mut SqlTransaction<'_, Sqlite>,
    variant_id: &str,
    variant: &VariantDraft,
    position: i64,
) -> DbResult<()> {
    sqlx::query(
        r#"
        UPDATE product_variants SET
            name = ?2,
            price_cents = ?3,
            stock = ?4,
            purchase_price = ?5,
            image = ?6,
            position = ?7
        WHERE id = ?1
        "#,
    )
    .bind(variant_id)
    .bind(&variant.name)
    .bind(variant.price.cents())
    .bind(variant.stock)
    .bind(encode_decimal(variant.purchase_price))
    .bind(&variant.image)
    .bind(position)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
