//! Business logic services for storefront.
//!
//! # Services
//!
//! - `checkout` - Order creation, payment preparation and completion, order lookup
//! - `reconciliation` - Applies gateway signals to orders and payments
//! - `webhooks` - Verifies and dispatches `PortOne` webhooks
//! - `quotes` - Bulk quote requests
//!
//! Services borrow what they need from [`crate::state::AppState`] per request.

pub mod checkout;
pub mod quotes;
pub mod reconciliation;
pub mod validation;
pub mod webhooks;

pub use checkout::{CheckoutError, CheckoutService};
pub use quotes::{QuoteError, QuoteService};
pub use reconciliation::{ReconcileError, ReconciliationEngine};
pub use validation::ValidationErrors;
pub use webhooks::{NotificationError, WebhookOutcome, WebhookService};
