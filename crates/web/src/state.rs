//! Application state shared across handlers.

use std::sync::Arc;

use axum::http::HeaderValue;

use crate::config::AppConfig;
use crate::db::UserStore;
use crate::middleware::csp::{InvalidPolicy, content_security_policy};
use crate::services::auth::AuthGate;
use crate::services::upload::AssetStorage;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like the user store and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AppConfig,
    users: Arc<dyn UserStore>,
    assets: Arc<dyn AssetStorage>,
    csp: HeaderValue,
}

impl AppState {
    /// Create a new application state.
    ///
    /// The content security policy is built here, once.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured cloud name cannot appear in a header.
    pub fn new(
        config: AppConfig,
        users: Arc<dyn UserStore>,
        assets: Arc<dyn AssetStorage>,
    ) -> Result<Self, InvalidPolicy> {
        let csp = content_security_policy(&config.cloudinary)?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                users,
                assets,
                csp,
            }),
        })
    }

    /// Get a reference to the application configuration.
    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    /// Get a reference to the user store.
    #[must_use]
    pub fn users(&self) -> &dyn UserStore {
        self.inner.users.as_ref()
    }

    /// Authentication gate over the user store.
    #[must_use]
    pub fn auth(&self) -> AuthGate<'_> {
        AuthGate::new(self.users())
    }

    /// Get a reference to the upload provider.
    #[must_use]
    pub fn assets(&self) -> &dyn AssetStorage {
        self.inner.assets.as_ref()
    }

    /// The `Content-Security-Policy` header value.
    #[must_use]
    pub fn csp(&self) -> &HeaderValue {
        &self.inner.csp
    }
}
