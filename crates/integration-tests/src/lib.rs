//! Integration tests for Yelp Camp.
//!
//! The full router (every middleware layer included) is driven in-process
//! with `tower::ServiceExt::oneshot`. Users, assets and sessions live in
//! memory, so no database or upload provider is needed.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p yelpcamp-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `security_chain` - Headers, request ids, 404 and 500 pages
//! - `session_flow` - Register, login, logout and flash messages
//! - `uploads` - Authenticated image uploads

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    extract::ConnectInfo,
    http::{Request, Response, header},
};
use secrecy::SecretString;
use tower::ServiceExt;
use tower_sessions::MemoryStore;

use yelpcamp_web::config::{AppConfig, CloudinaryConfig, SessionConfig};
use yelpcamp_web::db::{MemoryUserStore, TouchDebouncedStore, UserStore};
use yelpcamp_web::middleware::SESSION_COOKIE_NAME;
use yelpcamp_web::services::upload::MemoryAssetStorage;
use yelpcamp_web::state::AppState;

/// Peer address every test request arrives from.
pub const CLIENT_ADDR: SocketAddr =
    SocketAddr::new(IpAddr::V4(Ipv4Addr::new(203, 0, 113, 7)), 40_000);

/// A complete application wired to in-memory collaborators.
pub struct TestApp {
    router: Router,
    /// Uploaded assets, for asserting what was kept.
    pub assets: Arc<MemoryAssetStorage>,
}

impl TestApp {
    /// Application with an empty in-memory user store.
    #[must_use]
    pub fn new() -> Self {
        Self::with_users(Arc::new(MemoryUserStore::new()))
    }

    /// Application over a caller-supplied user store.
    ///
    /// # Panics
    ///
    /// Panics if the router cannot be built.
    #[must_use]
    pub fn with_users(users: Arc<dyn UserStore>) -> Self {
        let config = test_config();
        let assets = Arc::new(MemoryAssetStorage::default());
        let sessions = TouchDebouncedStore::new(MemoryStore::default(), &config.session);

        let state = AppState::new(config, users, assets.clone()).expect("valid policy");
        let router = yelpcamp_web::build_app(state, sessions).expect("valid rate limiter");

        Self { router, assets }
    }

    /// Send one request through the full middleware chain.
    ///
    /// # Panics
    ///
    /// Panics if the router's service errors, which it never does.
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration with test-friendly defaults and no upload credentials.
#[must_use]
pub fn test_config() -> AppConfig {
    AppConfig {
        database_url: SecretString::from("postgres://127.0.0.1:5432/yelp_camp_test"),
        host: Ipv4Addr::LOCALHOST.into(),
        port: 0,
        session: SessionConfig::default(),
        cloudinary: CloudinaryConfig {
            cloud_name: "campsite".to_string(),
            ..CloudinaryConfig::default()
        },
        trust_proxy_headers: false,
        sentry_dsn: None,
        sentry_environment: None,
    }
}

/// Build a GET request, optionally carrying a session cookie.
///
/// # Panics
///
/// Panics if `uri` is not a valid request target.
#[must_use]
pub fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::get(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).expect("valid request")
}

/// Build a url-encoded form POST from [`CLIENT_ADDR`].
///
/// # Panics
///
/// Panics if `uri` is not a valid request target.
#[must_use]
pub fn post_form(uri: &str, body: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::post(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .extension(ConnectInfo(CLIENT_ADDR));
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder
        .body(Body::from(body.to_string()))
        .expect("valid request")
}

/// The `session=<id>` pair from a response's `Set-Cookie`, if any.
#[must_use]
pub fn session_cookie(response: &Response<Body>) -> Option<String> {
    let prefix = format!("{SESSION_COOKIE_NAME}=");
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find(|value| value.starts_with(&prefix))
        .and_then(|value| value.split(';').next())
        .map(str::to_string)
}

/// The full `Set-Cookie` line for the session cookie, if any.
#[must_use]
pub fn session_set_cookie(response: &Response<Body>) -> Option<String> {
    let prefix = format!("{SESSION_COOKIE_NAME}=");
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find(|value| value.starts_with(&prefix))
        .map(str::to_string)
}

/// The `Location` header of a redirect.
#[must_use]
pub fn location(response: &Response<Body>) -> Option<&str> {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
}

/// Read the whole response body as text.
///
/// # Panics
///
/// Panics if the body cannot be read or is not UTF-8.
pub async fn body_text(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("readable body");
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

/// Register `username` and return the session cookie pair.
///
/// # Panics
///
/// Panics if registration does not set a session cookie.
pub async fn register(app: &TestApp, username: &str) -> String {
    let body = format!(
        "username={username}&email={username}%40example.com&password=correct+horse+battery"
    );
    let response = app.send(post_form("/register", &body, None)).await;
    session_cookie(&response).expect("registration sets a session cookie")
}
