//! Unified error handling with Sentry integration.
//!
//! Every failure that reaches the client goes through `AppError`. Its response
//! carries an [`ErrorView`] extension with the status and a client-safe
//! message; `middleware::error_page_middleware` turns that into the rendered
//! error page. Server-side failures are captured to Sentry first.

use axum::{
    Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::auth::AuthError;
use crate::services::upload::UploadError;

/// Message shown when a failure carries nothing fit for the client.
pub const FALLBACK_MESSAGE: &str = "Oh No, Something Went Wrong!";

/// Message shown for unmatched routes.
pub const NOT_FOUND_MESSAGE: &str = "Page Not Found";

/// Status and message of the uniform error page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorView {
    pub status: StatusCode,
    pub message: String,
}

impl ErrorView {
    /// View for `status`, falling back to the generic message.
    #[must_use]
    pub fn new(status: StatusCode, message: Option<String>) -> Self {
        Self {
            status,
            message: message
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| FALLBACK_MESSAGE.to_string()),
        }
    }
}

impl Default for ErrorView {
    fn default() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, None)
    }
}

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Storing or discarding an asset failed.
    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    /// Session could not be read or written.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Template rendering failed.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),

    /// No route or resource.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Request body over the accepted size.
    #[error("Payload too large")]
    PayloadTooLarge,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Status code sent to the client.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Database(_) | Self::Session(_) | Self::Template(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials | AuthError::UnknownPrincipal => {
                    StatusCode::UNAUTHORIZED
                }
                AuthError::UserAlreadyExists(_) => StatusCode::CONFLICT,
                AuthError::WeakPassword(_)
                | AuthError::InvalidEmail(_)
                | AuthError::InvalidUsername(_) => StatusCode::BAD_REQUEST,
                AuthError::Session(_) | AuthError::Repository(_) | AuthError::PasswordHash => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Upload(err) => match err {
                UploadError::UnsupportedFormat(_) | UploadError::EmptyFile => {
                    StatusCode::BAD_REQUEST
                }
                UploadError::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
                UploadError::Provider { .. } | UploadError::Http(_) | UploadError::Parse(_) => {
                    StatusCode::BAD_GATEWAY
                }
            },
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }

    /// Client-safe message; `None` means the generic fallback.
    fn public_message(&self) -> Option<String> {
        match self {
            Self::Database(_) | Self::Session(_) | Self::Template(_) | Self::Internal(_) => None,
            Self::Auth(err) => match err {
                AuthError::Session(_) | AuthError::Repository(_) | AuthError::PasswordHash => None,
                _ => Some(err.user_message()),
            },
            Self::Upload(err) => match err {
                UploadError::NotConfigured => Some("Image uploads are unavailable".to_string()),
                err if err.is_client_error() => Some(err.to_string()),
                _ => Some("Image upload failed, please try again".to_string()),
            },
            Self::NotFound(_) => Some(NOT_FOUND_MESSAGE.to_string()),
            Self::BadRequest(msg) => Some(msg.clone()),
            Self::PayloadTooLarge => Some("Request body too large".to_string()),
        }
    }

    /// The uniform error view for this error.
    #[must_use]
    pub fn view(&self) -> ErrorView {
        ErrorView::new(self.status(), self.public_message())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let view = self.view();

        // Capture server errors to Sentry
        if view.status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, status = %view.status, "request rejected");
        }

        // Plain-text body until the error page middleware renders the view.
        (view.status, Extension(view.clone()), view.message).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context after a successful login.
pub fn set_sentry_user(user_id: &impl ToString, username: &str) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            username: Some(username.to_string()),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context on logout.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}
