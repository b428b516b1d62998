//! Authentication extractors and session helpers.
//!
//! The principal reference is only ever written by [`log_in`] and removed by
//! [`log_out`]; everything else reads the resolved user from the
//! [`RenderContext`].

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

use crate::models::{FlashKind, PrincipalToken, User, session_keys};

use super::context::RenderContext;
use super::flash::push_flash;

/// Flash shown when a protected page is requested anonymously.
pub const SIGN_IN_REQUIRED: &str = "You must be signed in first!";

/// Where a successful login lands when nothing else was requested.
pub const DEFAULT_LANDING: &str = "/campgrounds";

/// Extractor that requires a signed-in user.
///
/// If nobody is signed in, remembers the requested path, queues a flash and
/// redirects to the login page.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(RequireAuth(user): RequireAuth) -> impl IntoResponse {
///     format!("Hello, {}!", user.username)
/// }
/// ```
pub struct RequireAuth(pub User);

/// Error returned when authentication is required but nobody is signed in.
pub enum AuthRejection {
    /// Redirect to the login page.
    RedirectToLogin,
    /// The session layer is missing.
    MissingSession,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin => Redirect::to("/login").into_response(),
            Self::MissingSession => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        }
    }
}

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts
            .extensions
            .get::<RenderContext>()
            .and_then(|ctx| ctx.current_user.clone())
        {
            return Ok(Self(user));
        }

        let session = parts
            .extensions
            .get::<Session>()
            .ok_or(AuthRejection::MissingSession)?;

        let return_to = parts
            .uri
            .path_and_query()
            .map_or_else(|| parts.uri.path().to_string(), |pq| pq.as_str().to_string());

        if let Err(e) = session.insert(session_keys::RETURN_TO, &return_to).await {
            tracing::warn!(error = %e, "failed to remember return path");
        }
        if let Err(e) = push_flash(session, FlashKind::Errors, SIGN_IN_REQUIRED).await {
            tracing::warn!(error = %e, "failed to queue sign-in flash");
        }

        Err(AuthRejection::RedirectToLogin)
    }
}

/// Establish `token` as the session's principal.
///
/// The session id is rotated first so a pre-login id cannot be reused.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn log_in(
    session: &Session,
    token: &PrincipalToken,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(session_keys::PRINCIPAL, token).await
}

/// Remove the session's principal.
///
/// The session itself, and anything queued on it, survives.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn log_out(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session
        .remove::<PrincipalToken>(session_keys::PRINCIPAL)
        .await?;
    Ok(())
}

/// Take the path remembered by [`RequireAuth`], if it is a local path.
///
/// # Errors
///
/// Returns an error if the session cannot be read.
pub async fn take_return_to(session: &Session) -> Result<String, tower_sessions::session::Error> {
    let remembered: Option<String> = session.remove(session_keys::RETURN_TO).await?;
    Ok(remembered
        .filter(|path| path.starts_with('/') && !path.starts_with("//"))
        .unwrap_or_else(|| DEFAULT_LANDING.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use tower_sessions::MemoryStore;
    use yelpcamp_core::UserId;

    use super::*;

    fn session() -> Session {
        Session::new(None, Arc::new(MemoryStore::default()), None)
    }

    #[tokio::test]
    async fn test_log_out_keeps_other_data() {
        let session = session();
        log_in(&session, &PrincipalToken::for_user(UserId::new(3)))
            .await
            .unwrap();
        push_flash(&session, FlashKind::Success, "Goodbye!")
            .await
            .unwrap();

        log_out(&session).await.unwrap();

        let principal: Option<PrincipalToken> =
            session.get(session_keys::PRINCIPAL).await.unwrap();
        assert!(principal.is_none());
        assert!(!session.is_empty().await);
    }

    #[tokio::test]
    async fn test_principal_unresolvable_after_log_out() {
        let users = crate::db::MemoryUserStore::new();
        let gate = crate::services::auth::AuthGate::new(&users);
        let user = gate
            .register("colt", "colt@example.com", "correct horse battery")
            .await
            .unwrap();

        let session = session();
        log_in(&session, &gate.serialize(&user)).await.unwrap();
        let resolved = crate::middleware::current_user(&gate, &session).await.unwrap();
        assert_eq!(resolved.id, user.id);

        log_out(&session).await.unwrap();
        assert!(matches!(
            crate::middleware::current_user(&gate, &session).await,
            Err(crate::services::auth::AuthError::UnknownPrincipal)
        ));
    }

    #[tokio::test]
    async fn test_return_to_defaults_and_rejects_external() {
        let session = session();
        assert_eq!(take_return_to(&session).await.unwrap(), DEFAULT_LANDING);

        session
            .insert(session_keys::RETURN_TO, "/uploads?x=1")
            .await
            .unwrap();
        assert_eq!(take_return_to(&session).await.unwrap(), "/uploads?x=1");
        assert_eq!(take_return_to(&session).await.unwrap(), DEFAULT_LANDING);

        session
            .insert(session_keys::RETURN_TO, "//evil.example")
            .await
            .unwrap();
        assert_eq!(take_return_to(&session).await.unwrap(), DEFAULT_LANDING);
    }
}
