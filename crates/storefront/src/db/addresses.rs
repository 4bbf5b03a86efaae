//! `PostgreSQL` address repository.
//!
//! The one-default-per-user rule is backed by a partial unique index on
//! `(user_id) WHERE is_default`; [`set_default_address`] swaps the flag inside
//! a transaction so readers never see zero or two defaults.
//!
//! [`set_default_address`]: AddressRepository::set_default_address

use async_trait::async_trait;

use pasta_haus_core::{Address, AddressId, UserId};

use super::{AddressRepository, PgBackend, RepositoryError, conflict_or};

const SELECT_ADDRESS: &str = r"
    SELECT id, user_id, street, barangay, city, province, postal_code, country,
           phone_number, is_default, label, created_at, updated_at
    FROM storefront.addresses
";

#[derive(sqlx::FromRow)]
struct AddressRow {
    id: AddressId,
    user_id: UserId,
    street: String,
    barangay: Option<String>,
    city: String,
    province: String,
    postal_code: Option<String>,
    country: String,
    phone_number: Option<String>,
    is_default: bool,
    label: Option<String>,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<AddressRow> for Address {
    fn from(row: AddressRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            street: row.street,
            barangay: row.barangay,
            city: row.city,
            province: row.province,
            postal_code: row.postal_code,
            country: row.country,
            phone_number: row.phone_number,
            is_default: row.is_default,
            label: row.label,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl AddressRepository for PgBackend {
    async fn list_addresses(&self, user: &UserId) -> Result<Vec<Address>, RepositoryError> {
        let rows: Vec<AddressRow> = sqlx::query_as(&format!(
            "{SELECT_ADDRESS} WHERE user_id = $1 ORDER BY is_default DESC, created_at DESC"
        ))
        .bind(user)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Address::from).collect())
    }

    async fn get_address(
        &self,
        user: &UserId,
        id: &AddressId,
    ) -> Result<Option<Address>, RepositoryError> {
        let row: Option<AddressRow> =
            sqlx::query_as(&format!("{SELECT_ADDRESS} WHERE user_id = $1 AND id = $2"))
                .bind(user)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(Address::from))
    }

    async fn insert_address(&self, address: &Address) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO storefront.addresses
                (id, user_id, street, barangay, city, province, postal_code, country,
                 phone_number, is_default, label, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ",
        )
        .bind(&address.id)
        .bind(&address.user_id)
        .bind(&address.street)
        .bind(&address.barangay)
        .bind(&address.city)
        .bind(&address.province)
        .bind(&address.postal_code)
        .bind(&address.country)
        .bind(&address.phone_number)
        .bind(address.is_default)
        .bind(&address.label)
        .bind(address.created_at)
        .bind(address.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_or(e, "address"))?;

        Ok(())
    }

    async fn update_address(&self, address: &Address) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE storefront.addresses
            SET street = $3, barangay = $4, city = $5, province = $6,
                postal_code = $7, country = $8, phone_number = $9, label = $10,
                updated_at = $11
            WHERE user_id = $1 AND id = $2
            ",
        )
        .bind(&address.user_id)
        .bind(&address.id)
        .bind(&address.street)
        .bind(&address.barangay)
        .bind(&address.city)
        .bind(&address.province)
        .bind(&address.postal_code)
        .bind(&address.country)
        .bind(&address.phone_number)
        .bind(&address.label)
        .bind(address.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn delete_address(
        &self,
        user: &UserId,
        id: &AddressId,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM storefront.addresses WHERE user_id = $1 AND id = $2")
            .bind(user)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_default_address(
        &self,
        user: &UserId,
        id: &AddressId,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r"
            UPDATE storefront.addresses
            SET is_default = FALSE, updated_at = NOW()
            WHERE user_id = $1 AND is_default AND id <> $2
            ",
        )
        .bind(user)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        let result = sqlx::query(
            r"
            UPDATE storefront.addresses
            SET is_default = TRUE, updated_at = NOW()
            WHERE user_id = $1 AND id = $2
            ",
        )
        .bind(user)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            // Dropping the transaction rolls back the cleared flags.
            return Err(RepositoryError::NotFound);
        }

        tx.commit().await?;
        Ok(())
    }
}
