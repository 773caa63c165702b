//! `PortOne` V2 integration.
//!
//! This module provides:
//! - [`PaymentGateway`], the poll seam, and [`PortOneClient`] implementing it
//! - [`WebhookVerifier`] for Standard Webhooks signature checks
//! - Decoded payloads: [`PolledPayment`] and [`WebhookEvent`]
//!
//! # Flow
//!
//! 1. Checkout prepares a payment row and hands the browser SDK a request descriptor
//! 2. The buyer pays in the gateway UI
//! 3. The browser calls the completion endpoint and `PortOne` posts a webhook
//! 4. Both paths poll [`PaymentGateway::get_payment`] and reconcile the result

mod client;
mod error;
mod types;
mod webhook;

pub use client::{PaymentGateway, PortOneClient};
pub use error::{GatewayError, WebhookError};
pub use types::{PolledPayment, WebhookEvent};
pub use webhook::WebhookVerifier;
