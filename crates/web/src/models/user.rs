//! User domain types.
//!
//! Separate from database row types; never carries the credential hash.

use chrono::{DateTime, Utc};
use serde::Serialize;

use yelpcamp_core::{Email, UserId, Username};

/// A registered camper (the authenticated principal).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// Login name.
    pub username: Username,
    /// Contact address.
    pub email: Email,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
}
