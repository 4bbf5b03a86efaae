//! Catalog seeding.
//!
//! # Usage
//!
//! ```bash
//! ph-cli seed products crates/cli/seed/products.yaml
//! ```
//!
//! The file holds a `products` list in the same shape the API returns.
//! Each product is inserted or replaced by id, so the command is safe to
//! re-run after editing the file.

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use pasta_haus_core::Product;
use pasta_haus_storefront::db::{self, PgBackend, ProductRepository, RepositoryError};

use super::{MissingEnvVar, database_url};

/// Errors that can occur while seeding.
#[derive(Debug, Error)]
pub enum SeedError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid seed data: {0}")]
    Invalid(String),

    #[error(transparent)]
    MissingEnvVar(#[from] MissingEnvVar),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Failed to write product: {0}")]
    Repository(#[from] RepositoryError),
}

#[derive(Debug, Deserialize)]
struct SeedFile {
    products: Vec<Product>,
}

/// Load products from a YAML file into the store.
///
/// # Errors
///
/// Returns `SeedError` if the file is unreadable or invalid, or a write fails.
/// Nothing is written when validation fails.
pub async fn products(file: &str) -> Result<(), SeedError> {
    let content = tokio::fs::read_to_string(Path::new(file))
        .await
        .map_err(|source| SeedError::Read {
            path: file.to_owned(),
            source,
        })?;

    let products = parse(&content)?;
    tracing::info!(count = products.len(), "Loaded products from {file}");

    let pool = db::create_pool(&database_url()?).await?;
    let backend = PgBackend::new(pool);

    for product in &products {
        backend.upsert_product(product).await?;
        tracing::info!(product_id = %product.id, name = %product.name, "Seeded product");
    }

    tracing::info!("Seeding complete!");
    Ok(())
}

fn parse(content: &str) -> Result<Vec<Product>, SeedError> {
    let seed: SeedFile = serde_yaml::from_str(content)?;
    validate(&seed.products)?;
    Ok(seed.products)
}

fn validate(products: &[Product]) -> Result<(), SeedError> {
    let mut ids = HashSet::new();

    for product in products {
        if product.name.trim().is_empty() {
            return Err(SeedError::Invalid(format!(
                "product {} has no name",
                product.id
            )));
        }
        if !ids.insert(product.id.as_str()) {
            return Err(SeedError::Invalid(format!(
                "duplicate product id {}",
                product.id
            )));
        }

        let mut variants = HashSet::new();
        for variant in &product.variants {
            if !variants.insert(variant.id.as_str()) {
                return Err(SeedError::Invalid(format!(
                    "product {} repeats size {}",
                    product.id, variant.id
                )));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pasta_haus_core::{Category, Price, ProductId};

    use super::*;

    const LAUNCH_MENU: &str = include_str!("../../seed/products.yaml");

    #[test]
    fn test_launch_menu_parses() {
        let products = parse(LAUNCH_MENU).unwrap();
        assert_eq!(products.len(), 4);
        assert!(products.iter().all(|p| p.is_best_seller));

        let lasagna = products
            .iter()
            .find(|p| p.id == ProductId::new("1"))
            .unwrap();
        assert_eq!(lasagna.category, Category::Pasta);
        assert_eq!(lasagna.variants.len(), 3);
        assert_eq!(lasagna.variants[2].price, Price::from_pesos(799));
        assert!(lasagna.status.is_none());
    }

    #[test]
    fn test_duplicate_ids_are_rejected() {
        let yaml = r#"
products:
  - { id: "1", name: Lasagna, category: pasta, description: "", price: "180", image: a.jpg }
  - { id: "1", name: Baked Mac, category: pasta, description: "", price: "140", image: b.jpg }
"#;
        assert!(matches!(parse(yaml), Err(SeedError::Invalid(_))));
    }

    #[test]
    fn test_repeated_size_is_rejected() {
        let yaml = r#"
products:
  - id: "1"
    name: Lasagna
    category: pasta
    description: ""
    price: "180"
    image: a.jpg
    variants:
      - { id: small, label: Small, price: "180" }
      - { id: small, label: Small again, price: "190" }
"#;
        assert!(matches!(parse(yaml), Err(SeedError::Invalid(_))));
    }

    #[test]
    fn test_unknown_category_is_a_yaml_error() {
        let yaml = r#"
products:
  - { id: "9", name: Soup, category: soup, description: "", price: "90", image: s.jpg }
"#;
        assert!(matches!(parse(yaml), Err(SeedError::Yaml(_))));
    }
}
