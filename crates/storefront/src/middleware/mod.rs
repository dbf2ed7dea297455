//! HTTP middleware stack for storefront.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. `TraceLayer` (request span)
//! 3. Request ID (record id in span, Sentry scope and response)
//! 4. Session layer (tower-sessions, moka store)
//! 5. Security headers (CSP, isolation)
//! 6. Coming-soon gate
//! 7. Visitor cookie
//! 8. Rate limiting on password forms (per route)

pub mod auth;
pub mod coming_soon;
pub mod htmx;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;
pub mod session;
pub mod visitor;

pub use auth::{AdminCandidate, GuardRejection, OptionalAuth, RequireAdmin, RequireAuth};
pub use coming_soon::{GateCredentials, bypass_cookie, coming_soon_gate};
pub use htmx::HxRequest;
pub use rate_limit::auth_rate_limiter;
pub use request_id::{RequestId, request_id_middleware};
pub use security_headers::security_headers_middleware;
pub use session::create_session_layer;
pub use visitor::{Visitor, visitor_middleware};
