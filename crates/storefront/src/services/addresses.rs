//! Saved delivery addresses.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use uuid::Uuid;

use pasta_haus_core::{Address, AddressFields, AddressId, AddressValidationError, UserId};

use super::live::LiveQuery;
use crate::db::{Backend, Collection, RepositoryError};

/// Errors that can occur during address operations.
#[derive(Debug, Error)]
pub enum AddressError {
    #[error(transparent)]
    Invalid(#[from] AddressValidationError),

    #[error("address {0} not found")]
    NotFound(AddressId),

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Address book for one signed-in customer at a time.
#[derive(Clone)]
pub struct AddressService {
    backend: Arc<dyn Backend>,
}

impl AddressService {
    #[must_use]
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// The user's addresses, default first.
    ///
    /// # Errors
    ///
    /// Returns `AddressError::Repository` if the store cannot be read.
    pub async fn list(&self, user: &UserId) -> Result<Vec<Address>, AddressError> {
        Ok(self.backend.list_addresses(user).await?)
    }

    /// The user's default address, if they have one.
    ///
    /// # Errors
    ///
    /// Returns `AddressError::Repository` if the store cannot be read.
    pub async fn default_address(&self, user: &UserId) -> Result<Option<Address>, AddressError> {
        Ok(self
            .backend
            .list_addresses(user)
            .await?
            .into_iter()
            .find(|a| a.is_default))
    }

    /// # Errors
    ///
    /// Returns `AddressError::NotFound` if the address is not the user's.
    pub async fn get(&self, user: &UserId, id: &AddressId) -> Result<Address, AddressError> {
        self.backend
            .get_address(user, id)
            .await?
            .ok_or_else(|| AddressError::NotFound(id.clone()))
    }

    /// Live view of the user's addresses.
    #[must_use]
    pub fn subscribe(&self, user: UserId) -> LiveQuery<Address> {
        let backend = Arc::clone(&self.backend);
        LiveQuery::new(self.backend.changes(), Collection::Addresses, move || {
            let backend = Arc::clone(&backend);
            let user = user.clone();
            async move { backend.list_addresses(&user).await }
        })
    }

    /// Save a new address.
    ///
    /// It becomes the default when asked to, or when it is the user's first.
    ///
    /// # Errors
    ///
    /// Returns `AddressError::Invalid` for a blank required field.
    pub async fn create(
        &self,
        user: &UserId,
        fields: AddressFields,
    ) -> Result<Address, AddressError> {
        let fields = fields.validate()?;
        let make_default =
            fields.is_default || self.backend.list_addresses(user).await?.is_empty();

        let mut address = Address::new(
            AddressId::new(Uuid::new_v4().to_string()),
            user.clone(),
            AddressFields {
                is_default: false,
                ..fields
            },
            Utc::now(),
        );
        self.backend.insert_address(&address).await?;

        if make_default {
            self.backend.set_default_address(user, &address.id).await?;
            address.is_default = true;
        }

        tracing::info!(
            user_id = %user,
            address_id = %address.id,
            is_default = address.is_default,
            "Address saved"
        );
        Ok(address)
    }

    /// Replace an address's editable fields.
    ///
    /// Asking for `is_default` makes it the default; the flag is never
    /// cleared through an update.
    ///
    /// # Errors
    ///
    /// - `AddressError::Invalid` for a blank required field
    /// - `AddressError::NotFound` if the address is not the user's
    pub async fn update(
        &self,
        user: &UserId,
        id: &AddressId,
        fields: AddressFields,
    ) -> Result<Address, AddressError> {
        let fields = fields.validate()?;
        let make_default = fields.is_default;

        let mut address = self.get(user, id).await?;
        address.apply(fields, Utc::now());
        self.backend
            .update_address(&address)
            .await
            .map_err(|e| not_found_as(e, id))?;

        if make_default && !address.is_default {
            self.set_default(user, id).await?;
            address.is_default = true;
        }

        Ok(address)
    }

    /// Delete an address.
    ///
    /// # Errors
    ///
    /// Returns `AddressError::NotFound` if nothing was deleted.
    pub async fn delete(&self, user: &UserId, id: &AddressId) -> Result<(), AddressError> {
        if self.backend.delete_address(user, id).await? {
            tracing::info!(user_id = %user, address_id = %id, "Address deleted");
            Ok(())
        } else {
            Err(AddressError::NotFound(id.clone()))
        }
    }

    /// Make `id` the user's only default address.
    ///
    /// # Errors
    ///
    /// Returns `AddressError::NotFound` if the address is not the user's; no
    /// flags change in that case.
    pub async fn set_default(&self, user: &UserId, id: &AddressId) -> Result<(), AddressError> {
        self.backend
            .set_default_address(user, id)
            .await
            .map_err(|e| not_found_as(e, id))
    }
}

fn not_found_as(e: RepositoryError, id: &AddressId) -> AddressError {
    match e {
        RepositoryError::NotFound => AddressError::NotFound(id.clone()),
        other => AddressError::Repository(other),
    }
}
