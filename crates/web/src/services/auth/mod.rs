//! Authentication gate.
//!
//! Verifies credentials against the user store and converts between the
//! principal and the opaque token kept in the session. The request pipeline
//! calls it explicitly; nothing here touches the session.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use yelpcamp_core::{Email, Username};

use crate::db::{NewUser, RepositoryError, UserStore};
use crate::models::{PrincipalToken, User};

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Maximum password length (bounds hashing cost).
const MAX_PASSWORD_LENGTH: usize = 128;

/// Authentication gate over a user store.
pub struct AuthGate<'a> {
    users: &'a dyn UserStore,
}

impl<'a> AuthGate<'a> {
    /// Create a gate over `users`.
    #[must_use]
    pub const fn new(users: &'a dyn UserStore) -> Self {
        Self { users }
    }

    /// Verify a username and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` for an unknown user or a wrong
    /// password, without saying which.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<User, AuthError> {
        let Ok(username) = Username::parse(username) else {
            return Err(AuthError::InvalidCredentials);
        };

        let stored = self
            .users
            .find_credentials(&username)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &stored.password_hash)?;

        tracing::debug!(user_id = %stored.user.id, "credentials verified");
        Ok(stored.user)
    }

    /// Reference to `user` suitable for storing in the session.
    #[must_use]
    pub fn serialize(&self, user: &User) -> PrincipalToken {
        PrincipalToken::for_user(user.id)
    }

    /// Resolve a session token back to the current user record.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UnknownPrincipal` if the token is malformed or the
    /// user no longer exists.
    pub async fn deserialize(&self, token: &PrincipalToken) -> Result<User, AuthError> {
        let id = token.user_id().ok_or(AuthError::UnknownPrincipal)?;
        self.users
            .get_by_id(id)
            .await?
            .ok_or(AuthError::UnknownPrincipal)
    }

    /// Register a new user.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidUsername` / `AuthError::InvalidEmail` for
    /// malformed input, `AuthError::WeakPassword` if the password doesn't meet
    /// requirements, and `AuthError::UserAlreadyExists` on duplicates.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<User, AuthError> {
        let username = Username::parse(username)?;
        let email = Email::parse(email)?;
        validate_password(password)?;
        let password_hash = hash_password(password)?;

        let user = self
            .users
            .create(NewUser {
                username: &username,
                email: &email,
                password_hash: &password_hash,
            })
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(field) => AuthError::UserAlreadyExists(field),
                other => AuthError::Repository(other),
            })?;

        tracing::info!(user_id = %user.id, username = %user.username, "user registered");
        Ok(user)
    }
}

/// Validate password meets requirements.
fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "Password must be at most {MAX_PASSWORD_LENGTH} bytes"
        )));
    }
    Ok(())
}

/// Hash a password using Argon2id.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}
