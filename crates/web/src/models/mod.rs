//! Domain models for the web crate.

pub mod session;
pub mod user;

pub use session::{FlashKind, FlashMessages, PrincipalToken, keys as session_keys};
pub use user::User;
