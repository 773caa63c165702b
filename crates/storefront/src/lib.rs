//! Re:Space storefront library.
//!
//! The binary in `main.rs` wires configuration, the `PostgreSQL` store and
//! the `PortOne` client into [`state::AppState`]; everything else lives here
//! so the integration tests can drive the same router with an in-memory store
//! and a scripted gateway.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod portone;
pub mod routes;
pub mod services;
pub mod state;

pub use routes::app;
