//! Status enums for catalog and order entities.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Error returned when parsing one of the enums in this module fails.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind}: {value}")]
pub struct ParseEnumError {
    kind: &'static str,
    value: String,
}

impl ParseEnumError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_owned(),
        }
    }
}

/// Menu category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "product_category", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Pasta,
    Pastry,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pasta => f.write_str("pasta"),
            Self::Pastry => f.write_str("pastry"),
        }
    }
}

impl FromStr for Category {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pasta" => Ok(Self::Pasta),
            "pastry" => Ok(Self::Pastry),
            _ => Err(ParseEnumError::new("category", s)),
        }
    }
}

/// Availability of a product or variant.
///
/// A missing status on a stored document means [`ProductStatus::Available`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "product_status", rename_all = "kebab-case")
)]
#[serde(rename_all = "kebab-case")]
pub enum ProductStatus {
    #[default]
    Available,
    SoldOut,
    Unavailable,
}

impl ProductStatus {
    /// Resolve an optional stored status to its effective value.
    #[must_use]
    pub fn effective(status: Option<Self>) -> Self {
        status.unwrap_or_default()
    }

    /// Whether items in this state can be ordered.
    #[must_use]
    pub const fn is_orderable(self) -> bool {
        matches!(self, Self::Available)
    }
}

impl fmt::Display for ProductStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Available => f.write_str("available"),
            Self::SoldOut => f.write_str("sold-out"),
            Self::Unavailable => f.write_str("unavailable"),
        }
    }
}

impl FromStr for ProductStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(Self::Available),
            "sold-out" => Ok(Self::SoldOut),
            "unavailable" => Ok(Self::Unavailable),
            _ => Err(ParseEnumError::new("product status", s)),
        }
    }
}

/// How the customer receives the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "order_type", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Pickup,
    Delivery,
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pickup => f.write_str("pickup"),
            Self::Delivery => f.write_str("delivery"),
        }
    }
}

/// Order fulfillment status.
///
/// Orders move along a fixed line:
///
/// ```text
/// pending -> confirmed -> preparing -> ready -> delivering -> completed
/// ```
///
/// `cancelled` can be reached from any non-terminal state. `completed` and
/// `cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "order_status", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Preparing,
    Ready,
    Delivering,
    Completed,
    Cancelled,
}

impl OrderStatus {
    /// All statuses in lifecycle order.
    pub const ALL: [Self; 7] = [
        Self::Pending,
        Self::Confirmed,
        Self::Preparing,
        Self::Ready,
        Self::Delivering,
        Self::Completed,
        Self::Cancelled,
    ];

    /// The linear successor of this status, if any.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Pending => Some(Self::Confirmed),
            Self::Confirmed => Some(Self::Preparing),
            Self::Preparing => Some(Self::Ready),
            Self::Ready => Some(Self::Delivering),
            Self::Delivering => Some(Self::Completed),
            Self::Completed | Self::Cancelled => None,
        }
    }

    /// Whether no further transitions are permitted.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Whether `self -> to` is a permitted transition.
    #[must_use]
    pub fn can_transition_to(self, to: Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        to == Self::Cancelled || self.next() == Some(to)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Preparing => "preparing",
            Self::Ready => "ready",
            Self::Delivering => "delivering",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

impl FromStr for OrderStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.to_string() == s)
            .ok_or_else(|| ParseEnumError::new("order status", s))
    }
}
