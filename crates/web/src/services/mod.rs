//! Business logic services.
//!
//! # Services
//!
//! - `auth` - Credential verification, registration and principal tokens
//! - `upload` - Image upload delegation to the asset provider

pub mod auth;
pub mod upload;
