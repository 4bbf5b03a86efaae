//! Pasta Haus Core - Shared types library.
//!
//! This crate provides the types used across all Pasta Haus components:
//! - `storefront` - Customer ordering site and admin dashboard
//! - `cli` - Command-line tools for migrations and catalog seeding
//!
//! # Architecture
//!
//! The core crate contains only types and pure logic - no I/O, no database
//! access, no HTTP clients. Cart arithmetic and the order status lifecycle
//! live here so they can be tested without a store.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, prices and statuses
//! - [`models`] - Products, carts, orders and addresses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod models;
pub mod types;

pub use models::*;
pub use types::*;
