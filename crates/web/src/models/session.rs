//! Types stored in the session.
//!
//! The session only ever holds a reference to the principal, never the
//! credential hash or the user record itself.

use serde::{Deserialize, Serialize};

use yelpcamp_core::UserId;

/// Opaque reference to the authenticated principal.
///
/// Produced by `AuthGate::serialize` and resolved back to a user by
/// `AuthGate::deserialize` on every request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalToken(String);

impl PrincipalToken {
    /// Token referring to `id`.
    #[must_use]
    pub fn for_user(id: UserId) -> Self {
        Self(id.to_string())
    }

    /// The user id this token refers to, if it is well formed.
    #[must_use]
    pub fn user_id(&self) -> Option<UserId> {
        self.0.parse().ok()
    }

    /// Raw token text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for PrincipalToken {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

/// Flash message category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashKind {
    /// Rendered as `messages` in templates.
    Success,
    /// Rendered as `errors` in templates.
    Errors,
}

/// Queued one-time notifications, drained by the next rendered response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashMessages {
    #[serde(default)]
    pub success: Vec<String>,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl FlashMessages {
    /// Queue a message under `kind`.
    pub fn push(&mut self, kind: FlashKind, message: impl Into<String>) {
        match kind {
            FlashKind::Success => self.success.push(message.into()),
            FlashKind::Errors => self.errors.push(message.into()),
        }
    }

    /// Whether nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.success.is_empty() && self.errors.is_empty()
    }
}

/// Session keys.
pub mod keys {
    /// Serialized principal reference.
    pub const PRINCIPAL: &str = "principal";

    /// Pending flash messages.
    pub const FLASH: &str = "flash";

    /// Path to resume after a forced login.
    pub const RETURN_TO: &str = "return_to";
}
