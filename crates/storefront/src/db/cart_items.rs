//! Cart line repository for `storefront.cart_items`.
//!
//! Every statement filters on `user_id`, so one user's cart can never be
//! read or modified through another user's identity. Absent size/color are
//! stored as `''`, see [`variant_column`].

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

use little_sprout_core::{AddToCartRequest, LineKey, UserId};

use crate::stores::{CartRow, RemoteCartStore, StoreError, column_quantity, variant_column};

const ROW_COLUMNS: &str = "id, user_id, product_id, quantity, selected_size, selected_color, \
                           created_at, updated_at";

/// `PostgreSQL`-backed remote cart store.
#[derive(Debug, Clone)]
pub struct PgCartStore {
    pool: PgPool,
}

impl PgCartStore {
    /// Create a new cart store on top of a connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RemoteCartStore for PgCartStore {
    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn list(&self, user_id: &UserId) -> Result<Vec<CartRow>, StoreError> {
        let rows = sqlx::query_as::<_, CartRow>(&format!(
            "SELECT {ROW_COLUMNS} FROM storefront.cart_items \
             WHERE user_id = $1 ORDER BY created_at, id"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    #[instrument(skip(self, key), fields(user_id = %user_id, product_id = %key.product_id))]
    async fn find(&self, user_id: &UserId, key: &LineKey) -> Result<Option<CartRow>, StoreError> {
        let row = sqlx::query_as::<_, CartRow>(&format!(
            "SELECT {ROW_COLUMNS} FROM storefront.cart_items \
             WHERE user_id = $1 AND product_id = $2 \
               AND selected_size = $3 AND selected_color = $4 \
             LIMIT 1"
        ))
        .bind(user_id)
        .bind(&key.product_id)
        .bind(variant_column(key.selected_size.as_deref()))
        .bind(variant_column(key.selected_color.as_deref()))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    #[instrument(skip(self, request), fields(user_id = %user_id, product_id = %request.product_id))]
    async fn insert(
        &self,
        user_id: &UserId,
        request: &AddToCartRequest,
    ) -> Result<CartRow, StoreError> {
        let quantity = column_quantity(u64::from(request.quantity))?;
        let row = sqlx::query_as::<_, CartRow>(&format!(
            "INSERT INTO storefront.cart_items \
               (user_id, product_id, quantity, selected_size, selected_color) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {ROW_COLUMNS}"
        ))
        .bind(user_id)
        .bind(&request.product_id)
        .bind(quantity)
        .bind(variant_column(request.selected_size.as_deref()))
        .bind(variant_column(request.selected_color.as_deref()))
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn set_quantity(
        &self,
        user_id: &UserId,
        id: Uuid,
        quantity: u32,
    ) -> Result<bool, StoreError> {
        let quantity = column_quantity(u64::from(quantity))?;
        let result = sqlx::query(
            "UPDATE storefront.cart_items \
             SET quantity = $3, updated_at = NOW() \
             WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .bind(quantity)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn update(
        &self,
        user_id: &UserId,
        id: Uuid,
        quantity: u32,
        selected_size: Option<&str>,
        selected_color: Option<&str>,
    ) -> Result<bool, StoreError> {
        let quantity = column_quantity(u64::from(quantity))?;
        let mut tx = self.pool.begin().await?;

        let Some(row) = sqlx::query_as::<_, CartRow>(&format!(
            "SELECT {ROW_COLUMNS} FROM storefront.cart_items \
             WHERE id = $1 AND user_id = $2 FOR UPDATE"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        else {
            return Ok(false);
        };
        let size = selected_size.unwrap_or(&row.selected_size);
        let color = selected_color.unwrap_or(&row.selected_color);

        // Fold into a line that already has the new selection
        let merged = sqlx::query(
            "UPDATE storefront.cart_items \
             SET quantity = quantity + $6, updated_at = NOW() \
             WHERE user_id = $1 AND product_id = $2 \
               AND selected_size = $3 AND selected_color = $4 AND id <> $5",
        )
        .bind(user_id)
        .bind(&row.product_id)
        .bind(size)
        .bind(color)
        .bind(id)
        .bind(quantity)
        .execute(&mut *tx)
        .await?;

        if merged.rows_affected() > 0 {
            sqlx::query("DELETE FROM storefront.cart_items WHERE id = $1 AND user_id = $2")
                .bind(id)
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
        } else {
            sqlx::query(
                "UPDATE storefront.cart_items \
                 SET quantity = $3, selected_size = $4, selected_color = $5, updated_at = NOW() \
                 WHERE id = $1 AND user_id = $2",
            )
            .bind(id)
            .bind(user_id)
            .bind(quantity)
            .bind(size)
            .bind(color)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                // A concurrent insert of the same selection trips the unique key
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.is_unique_violation()
                {
                    return StoreError::Rejected("line with this variant already exists".to_owned());
                }
                StoreError::Database(e)
            })?;
        }

        tx.commit().await?;
        Ok(true)
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn delete(&self, user_id: &UserId, id: Uuid) -> Result<bool, StoreError> {
        let result =
            sqlx::query("DELETE FROM storefront.cart_items WHERE id = $1 AND user_id = $2")
                .bind(id)
                .bind(user_id)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn delete_all(&self, user_id: &UserId) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM storefront.cart_items WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
