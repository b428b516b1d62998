//! Content security policy.
//!
//! The policy is an allow-list of the external origins the layout pulls
//! scripts, styles, map tiles and images from. It is assembled once from
//! configuration (the image allow-list names the Cloudinary account) and the
//! resulting header value is shared by every response.

use axum::http::HeaderValue;
use axum::http::header::InvalidHeaderValue;
use thiserror::Error;

use crate::config::CloudinaryConfig;

const SCRIPT_SRC_URLS: &[&str] = &[
    "https://cdn.jsdelivr.net/npm/bootstrap@5.3.2/dist/js/bootstrap.min.js",
    "https://api.tiles.mapbox.com/",
    "https://api.mapbox.com/",
    "https://kit.fontawesome.com/",
    "https://cdnjs.cloudflare.com/",
    "https://cdn.jsdelivr.net/npm/bootstrap@5.3.2/dist/js/bootstrap.bundle.min.js",
];

const STYLE_SRC_URLS: &[&str] = &[
    "https://kit-free.fontawesome.com/",
    "https://cdn.jsdelivr.net/npm/bootstrap@5.3.2/dist/css/bootstrap.min.css",
    "https://api.mapbox.com/",
    "https://api.tiles.mapbox.com/",
    "https://fonts.googleapis.com/",
    "https://use.fontawesome.com/",
];

const CONNECT_SRC_URLS: &[&str] = &[
    "https://api.mapbox.com/",
    "https://a.tiles.mapbox.com/",
    "https://b.tiles.mapbox.com/",
    "https://events.mapbox.com/",
];

const FONT_SRC_URLS: &[&str] = &[];

const UNSPLASH_ORIGIN: &str = "https://images.unsplash.com/";

/// The policy could not be encoded as a header value.
#[derive(Debug, Error)]
#[error("invalid content security policy: {0}")]
pub struct InvalidPolicy(#[from] InvalidHeaderValue);

/// Render the policy as header text.
///
/// ```text
/// default-src 'none';
/// base-uri 'self';
/// connect-src 'self' <mapbox>;
/// script-src 'unsafe-inline' 'self' <cdn, mapbox, fontawesome>;
/// script-src-attr 'none';
/// style-src 'self' 'unsafe-inline' <cdn, mapbox, fonts>;
/// worker-src 'self' blob:;
/// object-src 'none';
/// img-src https://res.cloudinary.com/<cloud>/ https://images.unsplash.com/;
/// font-src 'self';
/// form-action 'self';
/// frame-ancestors 'self';
/// upgrade-insecure-requests
/// ```
#[must_use]
pub fn policy_text(cloudinary: &CloudinaryConfig) -> String {
    let cloudinary_origin = cloudinary.delivery_origin();

    let directives: Vec<(&str, Vec<&str>)> = vec![
        ("default-src", vec!["'none'"]),
        ("base-uri", vec!["'self'"]),
        ("connect-src", with_sources(&["'self'"], CONNECT_SRC_URLS)),
        (
            "script-src",
            with_sources(&["'unsafe-inline'", "'self'"], SCRIPT_SRC_URLS),
        ),
        ("script-src-attr", vec!["'none'"]),
        (
            "style-src",
            with_sources(&["'self'", "'unsafe-inline'"], STYLE_SRC_URLS),
        ),
        ("worker-src", vec!["'self'", "blob:"]),
        ("object-src", vec!["'none'"]),
        ("img-src", vec![cloudinary_origin.as_str(), UNSPLASH_ORIGIN]),
        ("font-src", with_sources(&["'self'"], FONT_SRC_URLS)),
        ("form-action", vec!["'self'"]),
        ("frame-ancestors", vec!["'self'"]),
        ("upgrade-insecure-requests", vec![]),
    ];

    directives
        .into_iter()
        .map(|(name, sources)| {
            if sources.is_empty() {
                name.to_string()
            } else {
                format!("{name} {}", sources.join(" "))
            }
        })
        .collect::<Vec<_>>()
        .join("; ")
}

fn with_sources<'a>(keywords: &[&'a str], urls: &[&'a str]) -> Vec<&'a str> {
    keywords.iter().chain(urls).copied().collect()
}

/// Build the `Content-Security-Policy` header value.
///
/// # Errors
///
/// Returns `InvalidPolicy` if the cloud name contains characters that cannot
/// appear in a header.
pub fn content_security_policy(cloudinary: &CloudinaryConfig) -> Result<HeaderValue, InvalidPolicy> {
    Ok(HeaderValue::from_str(&policy_text(cloudinary))?)
}
