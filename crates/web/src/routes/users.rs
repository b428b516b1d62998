//! Registration, login and logout.
//!
//! Credential failures never reach the error page: they are flashed and the
//! form is shown again.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;

use crate::error::{AppError, Result, clear_sentry_user, set_sentry_user};
use crate::middleware::{RenderContext, log_in, log_out, push_flash, take_return_to};
use crate::models::FlashKind;
use crate::services::auth::AuthError;
use crate::state::AppState;

// =============================================================================
// Form Types
// =============================================================================

/// Login form data.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

/// Registration form data.
#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub username: String,
    pub email: String,
    pub password: String,
}

// =============================================================================
// Templates
// =============================================================================

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "users/login.html")]
pub struct LoginTemplate {
    pub ctx: RenderContext,
}

/// Register page template.
#[derive(Template, WebTemplate)]
#[template(path = "users/register.html")]
pub struct RegisterTemplate {
    pub ctx: RenderContext,
}

// =============================================================================
// Registration
// =============================================================================

/// Display the registration page.
pub async fn register_page(ctx: RenderContext) -> impl IntoResponse {
    RegisterTemplate { ctx }
}

/// Handle registration form submission; the new user is logged in.
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<RegisterForm>,
) -> Result<Response> {
    let gate = state.auth();

    match gate
        .register(&form.username, &form.email, &form.password)
        .await
    {
        Ok(user) => {
            log_in(&session, &gate.serialize(&user)).await?;
            set_sentry_user(&user.id, user.username.as_str());
            push_flash(&session, FlashKind::Success, "Welcome to Yelp Camp!").await?;
            Ok(Redirect::to(&take_return_to(&session).await?).into_response())
        }
        Err(
            e @ (AuthError::UserAlreadyExists(_)
            | AuthError::WeakPassword(_)
            | AuthError::InvalidEmail(_)
            | AuthError::InvalidUsername(_)),
        ) => {
            tracing::info!(error = %e, "registration rejected");
            push_flash(&session, FlashKind::Errors, e.user_message()).await?;
            Ok(Redirect::to("/register").into_response())
        }
        Err(e) => Err(AppError::from(e)),
    }
}

// =============================================================================
// Login / Logout
// =============================================================================

/// Display the login page.
pub async fn login_page(ctx: RenderContext) -> impl IntoResponse {
    LoginTemplate { ctx }
}

/// Handle login form submission.
///
/// On success the session id is rotated and the user lands on the page that
/// sent them to login. On failure the session's principal is left untouched.
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Response> {
    let gate = state.auth();

    match gate.authenticate(&form.username, &form.password).await {
        Ok(user) => {
            let destination = take_return_to(&session).await?;
            log_in(&session, &gate.serialize(&user)).await?;
            set_sentry_user(&user.id, user.username.as_str());
            push_flash(&session, FlashKind::Success, "Welcome back!").await?;
            tracing::info!(user_id = %user.id, "login");
            Ok(Redirect::to(&destination).into_response())
        }
        Err(e @ AuthError::InvalidCredentials) => {
            tracing::warn!(username = %form.username, "login failed");
            push_flash(&session, FlashKind::Errors, e.user_message()).await?;
            Ok(Redirect::to("/login").into_response())
        }
        Err(e) => Err(AppError::from(e)),
    }
}

/// Handle logout; the session survives so the goodbye flash is shown.
pub async fn logout(session: Session) -> Result<Redirect> {
    log_out(&session).await?;
    clear_sentry_user();
    push_flash(&session, FlashKind::Success, "Goodbye!").await?;
    Ok(Redirect::to("/campgrounds"))
}
