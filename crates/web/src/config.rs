//! Application configuration loaded once from environment variables.
//!
//! Every variable is optional. A `.env` file is loaded first if present.
//!
//! # Environment Variables
//!
//! - `DB_URL` - `PostgreSQL` connection string (fallback: `DATABASE_URL`,
//!   default: `postgres://127.0.0.1:5432/yelp_camp`)
//! - `HOST` - Bind address (default: 127.0.0.1)
//! - `PORT` - Listen port (default: 3000)
//! - `CLOUDINARY_CLOUDNAME` - Upload provider account name
//! - `CLOUDINARY_KEY` - Upload provider API key
//! - `CLOUDINARY_SECRET` - Upload provider API secret
//! - `CLOUDINARY_FOLDER` - Folder every asset is stored under (default: yelp-camp)
//! - `CLOUDINARY_API_BASE` - Provider API root (default: <https://api.cloudinary.com>)
//! - `SESSION_TTL_SECS` - Session lifetime and cookie max-age (default: 7 days)
//! - `SESSION_TOUCH_AFTER_SECS` - Minimum gap between touch writes (default: 10080)
//! - `SESSION_COOKIE_SECURE` - Set the `Secure` cookie flag (default: true)
//! - `TRUST_PROXY_HEADERS` - Take the client IP from `x-forwarded-for` /
//!   `x-real-ip` (default: false; enable only behind a proxy that sets them)
//! - `SENTRY_DSN` / `SENTRY_ENVIRONMENT` - Error tracking

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const DEFAULT_DATABASE_URL: &str = "postgres://127.0.0.1:5432/yelp_camp";
const DEFAULT_FOLDER: &str = "yelp-camp";
const DEFAULT_API_BASE: &str = "https://api.cloudinary.com";

/// Seven days.
const DEFAULT_SESSION_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// `24 * 60 * 7` seconds.
const DEFAULT_TOUCH_AFTER_SECS: u64 = 24 * 60 * 7;

/// One year.
const MAX_SESSION_TTL_SECS: u64 = 365 * 24 * 60 * 60;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "insert",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
    #[error("{0} is set but {1} is missing")]
    Incomplete(String, String),
}

/// Application configuration, built once at start-up and shared read-only.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// `PostgreSQL` connection URL (may contain a password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Session cookie and persistence settings
    pub session: SessionConfig,
    /// Upload provider settings
    pub cloudinary: CloudinaryConfig,
    /// Whether proxy headers identify the client for rate limiting
    pub trust_proxy_headers: bool,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Session lifetime and cookie policy.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Absolute lifetime of a session after its last write, and cookie max-age.
    pub ttl: Duration,
    /// A session whose content did not change is rewritten at most this often.
    pub touch_after: Duration,
    /// Whether the cookie carries the `Secure` flag.
    pub cookie_secure: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(DEFAULT_SESSION_TTL_SECS),
            touch_after: Duration::from_secs(DEFAULT_TOUCH_AFTER_SECS),
            cookie_secure: true,
        }
    }
}

/// Upload provider credentials and namespace.
///
/// Implements `Debug` manually to redact the API secret.
#[derive(Clone)]
pub struct CloudinaryConfig {
    /// Account ("cloud") name; also part of the image CSP origin
    pub cloud_name: String,
    /// API key sent with every signed request
    pub api_key: String,
    /// API secret used to sign requests
    pub api_secret: SecretString,
    /// Folder every upload is tagged with
    pub folder: String,
    /// API root, overridable for self-hosted gateways
    pub api_base: String,
}

impl CloudinaryConfig {
    /// Whether all three credentials are present.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.cloud_name.is_empty()
            && !self.api_key.is_empty()
            && !self.api_secret.expose_secret().is_empty()
    }

    /// Public origin that serves this account's images.
    #[must_use]
    pub fn delivery_origin(&self) -> String {
        format!("https://res.cloudinary.com/{}/", self.cloud_name)
    }
}

impl Default for CloudinaryConfig {
    fn default() -> Self {
        Self {
            cloud_name: String::new(),
            api_key: String::new(),
            api_secret: SecretString::from(String::new()),
            folder: DEFAULT_FOLDER.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }
}

impl std::fmt::Debug for CloudinaryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudinaryConfig")
            .field("cloud_name", &self.cloud_name)
            .field("api_key", &self.api_key)
            .field("api_secret", &"[REDACTED]")
            .field("folder", &self.folder)
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but unparseable, if the
    /// upload credentials are only partially set, or if the upload secret looks
    /// like a placeholder.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_optional_env("DB_URL")
            .or_else(|| get_optional_env("DATABASE_URL"))
            .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());

        Ok(Self {
            database_url: SecretString::from(database_url),
            host: parse_env_or("HOST", IpAddr::from([127, 0, 0, 1]))?,
            port: parse_env_or("PORT", 3000)?,
            session: SessionConfig::from_env()?,
            cloudinary: CloudinaryConfig::from_env()?,
            trust_proxy_headers: parse_env_or("TRUST_PROXY_HEADERS", false)?,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl SessionConfig {
    /// Build from second counts.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` if `ttl_secs` is zero or above one
    /// year, or if `touch_after_secs` is not below `ttl_secs`.
    pub fn from_secs(
        ttl_secs: u64,
        touch_after_secs: u64,
        cookie_secure: bool,
    ) -> Result<Self, ConfigError> {
        if ttl_secs == 0 || ttl_secs > MAX_SESSION_TTL_SECS {
            return Err(ConfigError::InvalidEnvVar(
                "SESSION_TTL_SECS".to_string(),
                format!("must be between 1 and {MAX_SESSION_TTL_SECS}"),
            ));
        }
        // A touch window as long as the lifetime lets stored sessions expire
        // under a live cookie.
        if touch_after_secs >= ttl_secs {
            return Err(ConfigError::InvalidEnvVar(
                "SESSION_TOUCH_AFTER_SECS".to_string(),
                format!("must be less than SESSION_TTL_SECS ({ttl_secs})"),
            ));
        }
        Ok(Self {
            ttl: Duration::from_secs(ttl_secs),
            touch_after: Duration::from_secs(touch_after_secs),
            cookie_secure,
        })
    }

    fn from_env() -> Result<Self, ConfigError> {
        Self::from_secs(
            parse_env_or("SESSION_TTL_SECS", DEFAULT_SESSION_TTL_SECS)?,
            parse_env_or("SESSION_TOUCH_AFTER_SECS", DEFAULT_TOUCH_AFTER_SECS)?,
            parse_env_or("SESSION_COOKIE_SECURE", true)?,
        )
    }
}

impl CloudinaryConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let cloud_name = get_optional_env("CLOUDINARY_CLOUDNAME").unwrap_or_default();
        let api_key = get_optional_env("CLOUDINARY_KEY").unwrap_or_default();
        let api_secret = get_optional_env("CLOUDINARY_SECRET").unwrap_or_default();

        if !api_secret.is_empty() {
            validate_secret_strength(&api_secret, "CLOUDINARY_SECRET")?;
            for (key, value) in [("CLOUDINARY_CLOUDNAME", &cloud_name), ("CLOUDINARY_KEY", &api_key)] {
                if value.is_empty() {
                    return Err(ConfigError::Incomplete(
                        "CLOUDINARY_SECRET".to_string(),
                        key.to_string(),
                    ));
                }
            }
        }

        Ok(Self {
            cloud_name,
            api_key,
            api_secret: SecretString::from(api_secret),
            folder: get_env_or_default("CLOUDINARY_FOLDER", DEFAULT_FOLDER),
            api_base: get_env_or_default("CLOUDINARY_API_BASE", DEFAULT_API_BASE),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get an optional environment variable, treating empty values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Parse an optional environment variable, falling back to `default` when unset.
fn parse_env_or<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_optional_env(key).map_or(Ok(default), |raw| {
        raw.trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    })
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Reject placeholder values and low-entropy strings.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    if let Some(pattern) = PLACEHOLDER_PATTERNS.iter().find(|p| lower.contains(*p)) {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!("appears to be a placeholder (contains '{pattern}')"),
        ));
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1})"
            ),
        ));
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_shannon_entropy_bounds() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy("zzzz") - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy("ab") - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_rejects_placeholders() {
        let err = validate_secret_strength("your-cloudinary-secret", "CLOUDINARY_SECRET").unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
        assert!(validate_secret_strength("qqqqqqqqqqqqqqqqqqqq", "CLOUDINARY_SECRET").is_err());
    }

    #[test]
    fn test_validate_secret_accepts_random_value() {
        assert!(validate_secret_strength("Zr8_kP2vQx7LmN4tB9wYc1Hd6Ef", "CLOUDINARY_SECRET").is_ok());
    }

    #[test]
    fn test_session_defaults() {
        let session = SessionConfig::default();
        assert_eq!(session.ttl, Duration::from_secs(604_800));
        assert_eq!(session.touch_after, Duration::from_secs(10_080));
        assert!(session.cookie_secure);
    }

    #[test]
    fn test_session_lifetime_bounds() {
        let config = SessionConfig::from_secs(3600, 60, false).unwrap();
        assert_eq!(config.ttl, Duration::from_secs(3600));
        assert!(!config.cookie_secure);

        for (ttl, touch_after) in [(0, 0), (MAX_SESSION_TTL_SECS + 1, 60), (u64::MAX, 60)] {
            let err = SessionConfig::from_secs(ttl, touch_after, true).unwrap_err();
            assert!(matches!(err, ConfigError::InvalidEnvVar(ref key, _) if key == "SESSION_TTL_SECS"));
        }
        assert!(SessionConfig::from_secs(MAX_SESSION_TTL_SECS, 60, true).is_ok());
    }

    #[test]
    fn test_touch_window_shorter_than_lifetime() {
        for touch_after in [3600, 7200] {
            let err = SessionConfig::from_secs(3600, touch_after, true).unwrap_err();
            assert!(
                matches!(err, ConfigError::InvalidEnvVar(ref key, _) if key == "SESSION_TOUCH_AFTER_SECS")
            );
        }
        assert!(SessionConfig::from_secs(3600, 3599, true).is_ok());
    }

    #[test]
    fn test_cloudinary_configured_and_origin() {
        let mut config = CloudinaryConfig::default();
        assert!(!config.is_configured());

        config.cloud_name = "campsite".to_string();
        config.api_key = "123456".to_string();
        config.api_secret = SecretString::from("Zr8_kP2vQx7LmN4tB9wYc1Hd6Ef");
        assert!(config.is_configured());
        assert_eq!(config.delivery_origin(), "https://res.cloudinary.com/campsite/");
    }

    #[test]
    fn test_cloudinary_debug_redacts_secret() {
        let config = CloudinaryConfig {
            api_secret: SecretString::from("super_hidden_value"),
            ..CloudinaryConfig::default()
        };
        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_hidden_value"));
    }

    #[test]
    fn test_socket_addr() {
        let config = AppConfig {
            database_url: SecretString::from(DEFAULT_DATABASE_URL),
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            session: SessionConfig::default(),
            cloudinary: CloudinaryConfig::default(),
            trust_proxy_headers: false,
            sentry_dsn: None,
            sentry_environment: None,
        };

        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3000);
    }
}
