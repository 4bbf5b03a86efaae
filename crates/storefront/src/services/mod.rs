//! Business logic services for storefront.
//!
//! # Services
//!
//! - `cart` - Session cart and the handler-facing cart facade
//! - `cart_mirror` - Remote cart sync and sign-in merge
//! - `checkout` - Order creation from the cart
//! - `orders` - Order retrieval and status lifecycle
//! - `addresses` - Saved delivery addresses
//! - `catalog` - Cached menu reads and availability switches
//! - `admin` - Admin password gate
//! - `auth` - Google sign-in for customers
//! - `live` - Change-driven live queries

pub mod addresses;
pub mod admin;
pub mod auth;
pub mod cart;
pub mod cart_mirror;
pub mod catalog;
pub mod checkout;
pub mod live;
pub mod orders;

pub use addresses::{AddressError, AddressService};
pub use admin::{AdminError, AdminGate};
pub use auth::{AuthError, GoogleClient};
pub use cart::{LocalCart, ShoppingCart};
pub use cart_mirror::CartMirror;
pub use catalog::{CatalogError, ProductCatalog};
pub use checkout::{CheckoutError, CheckoutService};
pub use live::LiveQuery;
pub use orders::{OrderError, OrderService, OrderWindow};
