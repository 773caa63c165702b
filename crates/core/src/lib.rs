//! Re:Space Core - Shared types and reconciliation rules.
//!
//! This crate provides the pieces of the storefront that carry no I/O:
//! - `storefront` - Public REST API (orders, checkout, gateway webhooks)
//! - `cli` - Command-line tools for migrations and catalog seeding
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no database access,
//! no HTTP clients. Everything that decides *what* a payment notification does
//! to an order lives here so it can be tested without a database.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, amounts, emails, order numbers, and statuses
//! - [`reconcile`] - Gateway status normalization, status precedence, and the
//!   reconciliation decision

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod reconcile;
pub mod types;

pub use types::*;
