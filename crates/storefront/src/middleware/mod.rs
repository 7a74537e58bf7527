//! HTTP middleware stack for storefront.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, transaction)
//! 2. `TraceLayer` (request span)
//! 3. Request ID (recorded in the span and Sentry scope)
//! 4. CSP nonce (per-request nonce for the inline script)
//! 5. Security headers (CSP built with that nonce, frame/sniff/referrer)
//! 6. Session layer (tower-sessions, in-memory store)
//! 7. Rate limiting (governor, auth form posts only)

pub mod auth;
pub mod csp;
pub mod page;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;
pub mod session;

pub use auth::{OptionalAuth, RequireAuth, Visitor, is_htmx};
pub use csp::{CspNonce, csp_nonce_middleware};
pub use page::{AlertView, PageContext};
pub use rate_limit::auth_rate_limiter;
pub use request_id::{RequestId, request_id_middleware};
pub use security_headers::security_headers_middleware;
pub use session::{create_session_layer, existing_visitor_id, visitor_id};
