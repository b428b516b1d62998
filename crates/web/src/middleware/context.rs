//! Per-request render context.
//!
//! Resolves the session's principal through the authentication gate, drains
//! the flash queue and exposes both to handlers and templates as a read-only
//! [`RenderContext`].

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tower_sessions::Session;

use crate::error::AppError;
use crate::models::{PrincipalToken, User, session_keys};
use crate::services::auth::{AuthError, AuthGate};
use crate::state::AppState;

use super::flash::take_flash;

/// Values every rendered page can read.
#[derive(Debug, Clone, Default)]
pub struct RenderContext {
    pub current_user: Option<User>,
    /// Success flashes.
    pub messages: Vec<String>,
    /// Error flashes.
    pub errors: Vec<String>,
}

impl RenderContext {
    /// Whether a user is signed in.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.current_user.is_some()
    }

    /// Signed-in username, for templates.
    #[must_use]
    pub fn username(&self) -> Option<&str> {
        self.current_user.as_ref().map(|u| u.username.as_str())
    }
}

impl<S> FromRequestParts<S> for RenderContext
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<Self>().cloned().unwrap_or_else(|| {
            tracing::warn!("render context missing - middleware may be misconfigured");
            Self::default()
        }))
    }
}

/// Resolve the principal referenced by `session`.
///
/// A reference that no longer resolves is removed from the session; the
/// session itself is kept.
///
/// # Errors
///
/// Returns `AuthError::UnknownPrincipal` when there is no principal or it is
/// stale, and other variants for session or store failures.
pub async fn current_user(gate: &AuthGate<'_>, session: &Session) -> Result<User, AuthError> {
    let token: PrincipalToken = session
        .get(session_keys::PRINCIPAL)
        .await?
        .ok_or(AuthError::UnknownPrincipal)?;

    match gate.deserialize(&token).await {
        Err(AuthError::UnknownPrincipal) => {
            tracing::info!(principal = token.as_str(), "dropping stale principal");
            session
                .remove::<PrincipalToken>(session_keys::PRINCIPAL)
                .await?;
            Err(AuthError::UnknownPrincipal)
        }
        other => other,
    }
}

/// Attach the render context to the request and to its response.
///
/// The response copy lets the error page middleware, which runs outside this
/// one, render with the same navigation and flash as a normal page.
pub async fn render_context_middleware(
    State(state): State<AppState>,
    session: Session,
    mut request: Request,
    next: Next,
) -> Response {
    let context = match build_context(&state, &session).await {
        Ok(context) => context,
        Err(e) => return e.into_response(),
    };

    request.extensions_mut().insert(context.clone());
    let mut response = next.run(request).await;
    response.extensions_mut().insert(context);
    response
}

async fn build_context(state: &AppState, session: &Session) -> Result<RenderContext, AppError> {
    let current_user = match current_user(&state.auth(), session).await {
        Ok(user) => Some(user),
        Err(AuthError::UnknownPrincipal) => None,
        Err(e) => return Err(e.into()),
    };
    let flash = take_flash(session).await?;

    Ok(RenderContext {
        current_user,
        messages: flash.success,
        errors: flash.errors,
    })
}
