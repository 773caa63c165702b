//! Core types for the Re:Space storefront.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod order_number;
pub mod price;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use order_number::{OrderNumber, OrderNumberError};
pub use price::{CurrencyCode, Krw};
pub use status::*;
