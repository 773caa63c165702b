//! Domain models for the storefront.
//!
//! Row types derive `sqlx::FromRow` and serialize with the `snake_case` field
//! names the storefront client reads (`order_number`, `total_price_krw`, ...).
//! Request payloads live next to the services that validate them.

pub mod order;
pub mod payment;
pub mod product;
pub mod quote;

pub use order::{
    Customer, NewOrder, NewOrderLine, Order, OrderCreated, OrderDetail, OrderLine,
};
pub use payment::{NewPayment, Payment, PaymentSummary};
pub use product::{NewProduct, Product};
pub use quote::{NewQuote, QuoteCreated};
