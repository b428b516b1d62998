//! Yelp Camp Core - shared domain types.
//!
//! Used by:
//! - `web` - the campground site (sessions, auth, uploads)
//! - `cli` - migrations and user management
//!
//! # Architecture
//!
//! Types and validation only. No I/O, no database access, no HTTP clients.
//!
//! # Modules
//!
//! - [`types`] - Newtypes for user ids, usernames, emails and image formats

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
