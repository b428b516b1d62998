//! Persistence for users and sessions.
//!
//! # Tables
//!
//! - `users` - Login names, emails and Argon2 password hashes
//! - `tower_sessions.session` - Session records (managed by `tower-sessions-sqlx-store`)
//!
//! # Migrations
//!
//! Migrations live in `crates/web/migrations/` and are run via:
//! ```bash
//! cargo run -p yelpcamp-cli -- migrate
//! ```

pub mod memory;
pub mod session_store;
pub mod users;

use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use yelpcamp_core::{Email, UserId, Username};

use crate::models::User;

pub use memory::MemoryUserStore;
pub use session_store::TouchDebouncedStore;
pub use users::PgUserStore;

/// Errors from the user store.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored value no longer passes domain validation.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Unique constraint violation; carries the clashing field.
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// A user together with the hash their password is checked against.
///
/// Only the authentication gate sees this; it never reaches a session or a
/// template.
#[derive(Debug, Clone)]
pub struct StoredCredentials {
    pub user: User,
    pub password_hash: String,
}

/// Fields required to insert a user.
#[derive(Debug, Clone, Copy)]
pub struct NewUser<'a> {
    pub username: &'a Username,
    pub email: &'a Email,
    pub password_hash: &'a str,
}

/// Durable user records, looked up by the authentication gate.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Look up a user and their password hash by login name.
    async fn find_credentials(
        &self,
        username: &Username,
    ) -> Result<Option<StoredCredentials>, RepositoryError>;

    /// Look up a user by id.
    async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError>;

    /// Insert a user.
    ///
    /// Returns `RepositoryError::Conflict("username" | "email")` on duplicates.
    async fn create(&self, new_user: NewUser<'_>) -> Result<User, RepositoryError>;

    /// Check that the backing store is reachable.
    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
