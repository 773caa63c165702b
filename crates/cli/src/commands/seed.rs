//! Seed the catalog from a YAML file.
//!
//! The file is a list of products:
//!
//! ```yaml
//! - name: Refurbished standing desk
//!   description: Steel frame, oak top
//!   price_krw: 100000
//! - name: Monitor arm
//!   price_krw: 30000
//!   is_active: false
//! ```

use std::path::Path;

use thiserror::Error;
use tracing::info;

use respace_storefront::db::{self, CatalogRepository, PgStore, RepositoryError};
use respace_storefront::models::NewProduct;

use super::{CommandError, database_url};

/// Errors that can occur while seeding.
#[derive(Debug, Error)]
pub enum SeedError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Could not read seed file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid seed file: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid product '{name}': {reason}")]
    InvalidProduct { name: String, reason: &'static str },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Parse and check a product list before touching the database.
fn parse_products(content: &str) -> Result<Vec<NewProduct>, SeedError> {
    let products: Vec<NewProduct> = serde_yaml::from_str(content)?;

    for product in &products {
        if product.name.trim().is_empty() {
            return Err(SeedError::InvalidProduct {
                name: product.name.clone(),
                reason: "name is empty",
            });
        }
        if product.price_krw < 0 {
            return Err(SeedError::InvalidProduct {
                name: product.name.clone(),
                reason: "price_krw is negative",
            });
        }
    }

    Ok(products)
}

/// Insert catalog products from a YAML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, a product is
/// invalid, or database operations fail. Nothing is inserted unless the whole
/// file is valid.
pub async fn products(file_path: &str) -> Result<(), SeedError> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(SeedError::FileNotFound(file_path.to_owned()));
    }

    info!(path = %file_path, "Loading products from file");
    let content = tokio::fs::read_to_string(path).await?;
    let products = parse_products(&content)?;
    info!(count = products.len(), "Parsed products");

    let database_url = database_url()?;
    let pool = db::create_pool(&database_url).await?;
    let store = PgStore::new(pool);
    info!("Connected to database");

    for product in &products {
        let created = store.insert_product(product).await?;
        info!(
            product_id = %created.id,
            name = %created.name,
            price_krw = created.price_krw,
            active = created.is_active,
            "Inserted product"
        );
    }

    info!("Seeding complete!");
    Ok(())
}
