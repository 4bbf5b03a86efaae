//! `PostgreSQL` product repository.

use async_trait::async_trait;
use sqlx::types::Json;

use pasta_haus_core::{
    Category, Price, Product, ProductId, ProductStatus, Variant, VariantId,
};

use super::{PgBackend, ProductRepository, RepositoryError};

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: ProductId,
    name: String,
    category: Category,
    description: String,
    price: Price,
    image: String,
    ingredients: Vec<String>,
    is_best_seller: bool,
    variants: Json<Vec<Variant>>,
    status: Option<ProductStatus>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            category: row.category,
            description: row.description,
            price: row.price,
            image: row.image,
            ingredients: row.ingredients,
            is_best_seller: row.is_best_seller,
            variants: row.variants.0,
            status: row.status,
        }
    }
}

const SELECT_PRODUCT: &str = r"
    SELECT id, name, category, description, price, image, ingredients,
           is_best_seller, variants, status
    FROM storefront.products
";

#[async_trait]
impl ProductRepository for PgBackend {
    async fn list_products(&self) -> Result<Vec<Product>, RepositoryError> {
        let rows: Vec<ProductRow> = sqlx::query_as(&format!("{SELECT_PRODUCT} ORDER BY id"))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Product::from).collect())
    }

    async fn get_product(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError> {
        let row: Option<ProductRow> = sqlx::query_as(&format!("{SELECT_PRODUCT} WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Product::from))
    }

    async fn upsert_product(&self, product: &Product) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO storefront.products
                (id, name, category, description, price, image, ingredients,
                 is_best_seller, variants, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                category = EXCLUDED.category,
                description = EXCLUDED.description,
                price = EXCLUDED.price,
                image = EXCLUDED.image,
                ingredients = EXCLUDED.ingredients,
                is_best_seller = EXCLUDED.is_best_seller,
                variants = EXCLUDED.variants,
                status = EXCLUDED.status,
                updated_at = NOW()
            ",
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(product.category)
        .bind(&product.description)
        .bind(product.price)
        .bind(&product.image)
        .bind(&product.ingredients)
        .bind(product.is_best_seller)
        .bind(Json(&product.variants))
        .bind(product.status)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn set_product_status(
        &self,
        id: &ProductId,
        status: ProductStatus,
    ) -> Result<Product, RepositoryError> {
        let row: Option<ProductRow> = sqlx::query_as(
            r"
            UPDATE storefront.products
            SET status = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, category, description, price, image, ingredients,
                      is_best_seller, variants, status
            ",
        )
        .bind(id)
        .bind(status)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Product::from).ok_or(RepositoryError::NotFound)
    }

    async fn set_variant_status(
        &self,
        id: &ProductId,
        variant_id: &VariantId,
        status: ProductStatus,
    ) -> Result<Product, RepositoryError> {
        // Read-modify-write on the variants document, serialized by the row lock.
        let mut tx = self.pool.begin().await?;

        let row: Option<ProductRow> =
            sqlx::query_as(&format!("{SELECT_PRODUCT} WHERE id = $1 FOR UPDATE"))
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let mut product = row.map(Product::from).ok_or(RepositoryError::NotFound)?;

        product
            .variant_mut(variant_id)
            .ok_or(RepositoryError::NotFound)?
            .status = Some(status);

        sqlx::query(
            "UPDATE storefront.products SET variants = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(Json(&product.variants))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(product)
    }
}
