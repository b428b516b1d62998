//! Session middleware configuration.
//!
//! Sessions are persisted through any `SessionStore` (Postgres behind
//! `TouchDebouncedStore` in production). The manager saves on every request
//! so the sliding expiry moves; the store decides whether that save costs a
//! write.

use axum::{
    extract::Request,
    http::{HeaderValue, header::SET_COOKIE},
    middleware::Next,
    response::Response,
};
use tower_sessions::cookie::time::{Duration, OffsetDateTime};
use tower_sessions::cookie::{Cookie, SameSite};
use tower_sessions::{Expiry, SessionManagerLayer, SessionStore};

use crate::config::SessionConfig;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "session";

/// Create the session layer over `store`.
#[must_use]
pub fn create_session_layer<S: SessionStore>(
    store: S,
    config: &SessionConfig,
) -> SessionManagerLayer<S> {
    let ttl = Duration::try_from(config.ttl).unwrap_or(Duration::weeks(1));

    SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(ttl))
        .with_always_save(true)
        .with_secure(config.cookie_secure)
        .with_same_site(SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
}

/// Give the session cookie an absolute `Expires` next to its `Max-Age`.
///
/// Must wrap the session layer so it sees the `Set-Cookie` header.
pub async fn session_cookie_expires_middleware(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;

    let now = OffsetDateTime::now_utc();
    let mut changed = false;
    let cookies: Vec<HeaderValue> = response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .map(|value| {
            with_expires(value, now).map_or_else(
                || value.clone(),
                |rewritten| {
                    changed = true;
                    rewritten
                },
            )
        })
        .collect();

    if changed {
        let headers = response.headers_mut();
        headers.remove(SET_COOKIE);
        for value in cookies {
            headers.append(SET_COOKIE, value);
        }
    }

    response
}

/// Rewrite one `Set-Cookie` value, or `None` if it needs no change.
fn with_expires(value: &HeaderValue, now: OffsetDateTime) -> Option<HeaderValue> {
    let raw = value.to_str().ok()?;
    let mut cookie = Cookie::parse(raw.to_owned()).ok()?;

    if cookie.name() != SESSION_COOKIE_NAME || cookie.expires().is_some() {
        return None;
    }
    let max_age = cookie.max_age()?;
    cookie.set_expires(now + max_age);

    HeaderValue::from_str(&cookie.to_string()).ok()
}
