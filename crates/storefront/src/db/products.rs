//! Catalog queries.

use async_trait::async_trait;
use uuid::Uuid;

use respace_core::ProductId;

use super::{CatalogRepository, PgStore, RepositoryError};
use crate::models::{NewProduct, Product};

const PRODUCT_COLUMNS: &str =
    "id, name, description, price_krw, image_url, is_active, created_at";

#[async_trait]
impl CatalogRepository for PgStore {
    async fn active_product(&self) -> Result<Option<Product>, RepositoryError> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE is_active ORDER BY created_at ASC LIMIT 1"
        ))
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    async fn products_by_ids(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        let ids: Vec<Uuid> = ids.iter().map(ProductId::as_uuid).collect();

        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ANY($1)"
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    async fn insert_product(&self, product: &NewProduct) -> Result<Product, RepositoryError> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "INSERT INTO products (name, description, price_krw, image_url, is_active) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price_krw)
        .bind(&product.image_url)
        .bind(product.is_active)
        .fetch_one(&self.pool)
        .await?;

        Ok(product)
    }
}
