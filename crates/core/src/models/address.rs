//! Delivery addresses saved by signed-in customers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{AddressId, UserId};

/// A saved delivery address.
///
/// At most one address per user has `is_default` set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub id: AddressId,
    pub user_id: UserId,
    pub street: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub barangay: Option<String>,
    pub city: String,
    pub province: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    pub is_default: bool,
    /// e.g. "Home" or "Work".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Editable address fields, as submitted by the customer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressFields {
    pub street: String,
    #[serde(default)]
    pub barangay: Option<String>,
    pub city: String,
    pub province: String,
    #[serde(default)]
    pub postal_code: Option<String>,
    pub country: String,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

/// Validation failures for [`AddressFields`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),
}

fn trim_optional(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
}

fn require(value: &str, field: &'static str) -> Result<String, AddressValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(AddressValidationError::MissingField(field))
    } else {
        Ok(trimmed.to_owned())
    }
}

impl AddressFields {
    /// Trim every field and check the required ones.
    ///
    /// # Errors
    ///
    /// Returns [`AddressValidationError::MissingField`] for the first blank
    /// required field.
    pub fn validate(self) -> Result<Self, AddressValidationError> {
        Ok(Self {
            street: require(&self.street, "street")?,
            barangay: trim_optional(self.barangay),
            city: require(&self.city, "city")?,
            province: require(&self.province, "province")?,
            postal_code: trim_optional(self.postal_code),
            country: require(&self.country, "country")?,
            phone_number: trim_optional(self.phone_number),
            label: trim_optional(self.label),
            is_default: self.is_default,
        })
    }
}

impl Address {
    /// Build a new address from validated fields. `is_default` is taken as given;
    /// the store is responsible for keeping the one-default invariant.
    #[must_use]
    pub fn new(id: AddressId, user_id: UserId, fields: AddressFields, now: DateTime<Utc>) -> Self {
        Self {
            id,
            user_id,
            street: fields.street,
            barangay: fields.barangay,
            city: fields.city,
            province: fields.province,
            postal_code: fields.postal_code,
            country: fields.country,
            phone_number: fields.phone_number,
            is_default: fields.is_default,
            label: fields.label,
            created_at: now,
            updated_at: now,
        }
    }

    /// Overwrite the editable fields, keeping identity, default flag and creation time.
    pub fn apply(&mut self, fields: AddressFields, now: DateTime<Utc>) {
        self.street = fields.street;
        self.barangay = fields.barangay;
        self.city = fields.city;
        self.province = fields.province;
        self.postal_code = fields.postal_code;
        self.country = fields.country;
        self.phone_number = fields.phone_number;
        self.label = fields.label;
        self.updated_at = now;
    }

    /// Single-line rendering used for an order's delivery address.
    #[must_use]
    pub fn one_line(&self) -> String {
        [
            Some(self.street.as_str()),
            self.barangay.as_deref(),
            Some(self.city.as_str()),
            Some(self.province.as_str()),
            self.postal_code.as_deref(),
            Some(self.country.as_str()),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(", ")
    }
}
