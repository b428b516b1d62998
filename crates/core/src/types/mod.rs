//! Core types for Yelp Camp.

pub mod email;
pub mod id;
pub mod image_format;
pub mod username;

pub use email::{Email, EmailError};
pub use id::*;
pub use image_format::{ImageFormat, UnsupportedImageFormat};
pub use username::{Username, UsernameError};
