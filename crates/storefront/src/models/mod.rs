//! Storefront-only models. Domain types live in `pasta_haus_core`.

pub mod session;

pub use session::{CurrentUser, keys as session_keys};
