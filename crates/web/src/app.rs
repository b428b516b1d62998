//! Router assembly.

use axum::{
    Router,
    extract::Request,
    middleware::{from_fn, from_fn_with_state},
};
use tower_http::trace::TraceLayer;
use tower_sessions::SessionStore;

use crate::middleware::{
    create_session_layer, error_page_middleware, login_rate_limiter, rate_limit::RateLimitConfigError,
    render_context_middleware, request_id_middleware, sanitize_middleware,
    security_headers_middleware, session_cookie_expires_middleware,
};
use crate::routes;
use crate::state::AppState;

/// Build the full application: routes plus the middleware chain.
///
/// `session_store` is normally a `TouchDebouncedStore` over Postgres; tests
/// pass one over `MemoryStore`.
///
/// # Errors
///
/// Returns an error if the login rate limiter cannot be configured.
pub fn build_app<S>(state: AppState, session_store: S) -> Result<Router, RateLimitConfigError>
where
    S: SessionStore + Clone,
{
    let session_layer = create_session_layer(session_store, &state.config().session);

    let trace_layer = TraceLayer::new_for_http().make_span_with(|request: &Request| {
        tracing::info_span!(
            "request",
            method = %request.method(),
            path = %request.uri().path(),
            request_id = tracing::field::Empty,
        )
    });

    // Layers run bottom-up: the last one added sees the request first.
    let app = routes::routes(login_rate_limiter(state.config().trust_proxy_headers)?)
        .layer(from_fn_with_state(state.clone(), render_context_middleware))
        .layer(from_fn(sanitize_middleware))
        .layer(from_fn(error_page_middleware))
        .layer(session_layer)
        .layer(from_fn(session_cookie_expires_middleware))
        .layer(from_fn_with_state(state.clone(), security_headers_middleware))
        .layer(from_fn(request_id_middleware))
        .layer(trace_layer)
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction());

    Ok(app)
}
