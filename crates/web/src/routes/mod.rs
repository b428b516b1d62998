//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                - Home page
//! GET  /health          - Liveness
//! GET  /health/ready    - Readiness (user store ping)
//!
//! # Users
//! GET  /register        - Registration page
//! POST /register        - Create account and log in (rate limited)
//! GET  /login           - Login page
//! POST /login           - Login action (rate limited)
//! POST /logout          - Logout action
//!
//! # Uploads (requires auth)
//! POST /uploads         - Multipart image upload, returns stored assets
//!
//! *                     - 404 Page Not Found
//! ```

pub mod health;
pub mod home;
pub mod uploads;
pub mod users;

use axum::{
    Router,
    extract::{DefaultBodyLimit, Request},
    routing::{get, post},
};

use crate::error::AppError;
use crate::middleware::rate_limit::RateLimiterLayer;
use crate::state::AppState;

/// Create the application router (without middleware).
pub fn routes(limiter: RateLimiterLayer) -> Router<AppState> {
    Router::new()
        .route("/", get(home::home))
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .merge(user_routes(limiter))
        .route(
            "/uploads",
            post(uploads::create).layer(DefaultBodyLimit::max(uploads::UPLOAD_BODY_LIMIT)),
        )
        .fallback(not_found)
}

/// Create the user routes router.
pub fn user_routes(limiter: RateLimiterLayer) -> Router<AppState> {
    Router::new()
        .route(
            "/register",
            get(users::register_page).merge(post(users::register).layer(limiter.clone())),
        )
        .route(
            "/login",
            get(users::login_page).merge(post(users::login).layer(limiter)),
        )
        .route("/logout", post(users::logout))
}

/// Fallback for unmatched routes.
pub async fn not_found(request: Request) -> AppError {
    AppError::NotFound(request.uri().path().to_string())
}
