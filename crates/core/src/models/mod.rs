//! Domain models shared by the storefront and the CLI.

pub mod address;
pub mod cart;
pub mod order;
pub mod product;

pub use address::{Address, AddressFields, AddressValidationError};
pub use cart::{Cart, CartItem, CartKey, normalize_instructions};
pub use order::{CustomerInfo, InvalidTransition, Order, OrderRecord};
pub use product::{Product, Unorderable, Variant};
