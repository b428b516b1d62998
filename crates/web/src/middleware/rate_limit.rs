//! Login rate limiting using governor and `tower_governor`.
//!
//! Credential endpoints are limited per client IP to roughly ten attempts a
//! minute. Proxy headers name the client only when `TRUST_PROXY_HEADERS` is set.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::ConnectInfo;
use axum::http::Request;
use governor::clock::QuantaInstant;
use governor::middleware::NoOpMiddleware;
use thiserror::Error;
use tower_governor::{GovernorError, GovernorLayer, governor::GovernorConfigBuilder};

/// Seconds to replenish one attempt.
const REPLENISH_SECS: u64 = 6;

/// Attempts allowed back to back.
const BURST: u32 = 5;

/// The limiter parameters were rejected.
#[derive(Debug, Error)]
#[error("invalid rate limiter configuration")]
pub struct RateLimitConfigError;

/// Key extractor for the client address.
///
/// `x-forwarded-for` (first hop) and `x-real-ip` are only read when the
/// server runs behind a proxy that sets them; otherwise any client could
/// choose its own key. The peer address is the fallback in both modes.
#[derive(Clone, Copy)]
pub struct ClientIpKeyExtractor {
    trust_proxy_headers: bool,
}

impl ClientIpKeyExtractor {
    /// Extractor that reads proxy headers only if `trust_proxy_headers`.
    #[must_use]
    pub const fn new(trust_proxy_headers: bool) -> Self {
        Self {
            trust_proxy_headers,
        }
    }
}

fn header_ip<T>(req: &Request<T>, name: &str) -> Option<IpAddr> {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(|s| s.trim().parse::<IpAddr>().ok())
}

fn peer_ip<T>(req: &Request<T>) -> Option<IpAddr> {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
}

impl tower_governor::key_extractor::KeyExtractor for ClientIpKeyExtractor {
    type Key = IpAddr;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        let forwarded = if self.trust_proxy_headers {
            header_ip(req, "x-forwarded-for").or_else(|| header_ip(req, "x-real-ip"))
        } else {
            None
        };

        forwarded
            .or_else(|| peer_ip(req))
            .ok_or(GovernorError::UnableToExtractKey)
    }
}

/// Layer type produced by [`login_rate_limiter`].
pub type RateLimiterLayer =
    GovernorLayer<ClientIpKeyExtractor, NoOpMiddleware<QuantaInstant>, axum::body::Body>;

/// Build the limiter for credential endpoints.
///
/// # Errors
///
/// Returns an error if governor rejects the quota.
pub fn login_rate_limiter(
    trust_proxy_headers: bool,
) -> Result<RateLimiterLayer, RateLimitConfigError> {
    let config = GovernorConfigBuilder::default()
        .key_extractor(ClientIpKeyExtractor::new(trust_proxy_headers))
        .per_second(REPLENISH_SECS)
        .burst_size(BURST)
        .finish()
        .ok_or(RateLimitConfigError)?;
    Ok(GovernorLayer::new(Arc::new(config)))
}
