//! Authentication error types.

use thiserror::Error;

use crate::db::RepositoryError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Wrong password, unknown username, or a username that could never exist.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The session's principal reference no longer resolves to a user.
    #[error("unknown principal")]
    UnknownPrincipal,

    /// Username or email already registered; carries the clashing field.
    #[error("{0} already registered")]
    UserAlreadyExists(String),

    /// Password too weak or invalid.
    #[error("password validation failed: {0}")]
    WeakPassword(String),

    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] yelpcamp_core::EmailError),

    /// Invalid username format.
    #[error("invalid username: {0}")]
    InvalidUsername(#[from] yelpcamp_core::UsernameError),

    /// Reading or writing the session failed.
    #[error("session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}

impl AuthError {
    /// Message suitable for a flash notification.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidCredentials => "Password or username is incorrect".to_string(),
            Self::UnknownPrincipal => "Please sign in again".to_string(),
            Self::UserAlreadyExists(field) => {
                format!("A user with the given {field} is already registered")
            }
            Self::WeakPassword(msg) => msg.clone(),
            Self::InvalidEmail(e) => e.to_string(),
            Self::InvalidUsername(e) => e.to_string(),
            Self::Session(_) | Self::Repository(_) | Self::PasswordHash => {
                "Something went wrong, please try again".to_string()
            }
        }
    }
}
