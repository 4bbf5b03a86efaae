//! Pasta Haus storefront library.
//!
//! The ordering API and admin dashboard as a library, so the router can be
//! driven from integration tests with the in-memory backend.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

pub use routes::app;
pub use state::AppState;
