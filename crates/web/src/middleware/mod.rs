//! HTTP middleware stack.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. Security headers (CSP and companions, on every response)
//! 5. Session cookie `Expires`
//! 6. Session layer (tower-sessions over `TouchDebouncedStore`)
//! 7. Error page (renders `ErrorView` responses)
//! 8. Sanitize (query, form and JSON keys)
//! 9. Render context (current user and flash)
//! 10. Routes; credential routes add the login rate limiter

pub mod auth;
pub mod context;
pub mod csp;
pub mod error_page;
pub mod flash;
pub mod rate_limit;
pub mod request_id;
pub mod sanitize;
pub mod security_headers;
pub mod session;

pub use auth::{RequireAuth, log_in, log_out, take_return_to};
pub use context::{RenderContext, current_user, render_context_middleware};
pub use error_page::error_page_middleware;
pub use flash::{push_flash, take_flash};
pub use rate_limit::login_rate_limiter;
pub use request_id::request_id_middleware;
pub use sanitize::sanitize_middleware;
pub use security_headers::security_headers_middleware;
pub use session::{SESSION_COOKIE_NAME, create_session_layer, session_cookie_expires_middleware};
