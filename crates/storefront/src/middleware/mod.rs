//! HTTP middleware stack for storefront.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (added by the binary)
//! 2. `TraceLayer` (request tracing)
//! 3. CORS
//! 4. Request ID (add unique ID to each request)
//! 5. Security headers
//! 6. Body limit
//! 7. Rate limiting (governor), on order, quote and payment routes only

pub mod rate_limit;
pub mod request_id;
pub mod security_headers;

pub use rate_limit::{ClientIpKeyExtractor, api_rate_limiter};
pub use request_id::{REQUEST_ID_HEADER, request_id_middleware};
pub use security_headers::security_headers_middleware;
