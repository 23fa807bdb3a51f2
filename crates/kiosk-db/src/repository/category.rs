//! # Category Repository
//!
//! Product categories. Deleting a category leaves its products
//! uncategorized (`ON DELETE SET NULL`).

use chrono::{DateTime, Utc};
use kiosk_core::validation::validate_category_title;
use kiosk_core::{Category, CoreError};
use sqlx::SqlitePool;
use tracing::debug;

use super::new_id;
use crate::error::{DbError, DbResult};

/// Repository for category database operations.
#[derive(Debug, Clone)]
pub struct CategoryRepository {
    pool: SqlitePool,
}

#[derive(Debug, sqlx::FromRow)]
struct CategoryRow {
    id: String,
    title: String,
    icon: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Category {
            id: row.id,
            title: row.title,
            icon: row.icon,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl CategoryRepository {
    /// Creates a new CategoryRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CategoryRepository { pool }
    }

    /// Creates a category.
    pub async fn create(&self, title: &str, icon: &str) -> DbResult<Category> {
        validate_category_title(title).map_err(CoreError::from)?;
        let now = Utc::now();

        let category = Category {
            id: new_id(),
            title: title.trim().to_string(),
            icon: icon.trim().to_string(),
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO categories (id, title, icon, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&category.id)
        .bind(&category.title)
        .bind(&category.icon)
        .bind(category.created_at)
        .bind(category.updated_at)
        .execute(&self.pool)
        .await?;

        debug!(id = %category.id, title = %category.title, "Category created");
        Ok(category)
    }

    /// Renames a category or changes its icon.
    pub async fn update(&self, id: &str, title: &str, icon: &str) -> DbResult<Category> {
        validate_category_title(title).map_err(CoreError::from)?;

        let result = sqlx::query(
            "UPDATE categories SET title = ?2, icon = ?3, updated_at = ?4 WHERE id = ?1",
        )
        .bind(id)
        .bind(title.trim())
        .bind(icon.trim())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Category", id));
        }

        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Category", id))
    }

    /// Deletes a category.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM categories WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Category", id));
        }

        debug!(id = %id, "Category deleted");
        Ok(())
    }

    /// Gets a category by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Category>> {
        let row: Option<CategoryRow> = sqlx::query_as(
            "SELECT id, title, icon, created_at, updated_at FROM categories WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Category::from))
    }

    /// Lists categories by title.
    pub async fn list(&self) -> DbResult<Vec<Category>> {
        let rows: Vec<CategoryRow> = sqlx::query_as(
            r#"
            SELECT id, title, icon, created_at, updated_at
            FROM categories
            ORDER BY title COLLATE NOCASE
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Category::from).collect())
    }
}
