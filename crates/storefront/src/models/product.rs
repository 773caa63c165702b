//! Catalog products.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use respace_core::ProductId;

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: Option<String>,
    /// Unit price in whole won.
    pub price_krw: i64,
    pub image_url: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// A product to insert, as read from a seed file.
#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price_krw: i64,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

const fn default_active() -> bool {
    true
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_new_product_defaults() {
        let product: NewProduct =
            serde_json::from_str(r#"{"name": "Refurbished desk", "price_krw": 100000}"#).unwrap();
        assert!(product.is_active);
        assert_eq!(product.description, None);
    }
}
