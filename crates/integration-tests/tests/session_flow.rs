//! Integration tests for registration, login, logout and flash messages.
//!
//! Each step carries the session cookie from the previous response, the way
//! a browser would.

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;

use yelpcamp_integration_tests::{
    TestApp, body_text, get, location, post_form, register, session_cookie, session_set_cookie,
};

const PASSWORD_FORM: &str = "password=correct+horse+battery";

// =============================================================================
// Registration
// =============================================================================

#[tokio::test]
async fn test_register_logs_in_and_flashes_once() {
    let app = TestApp::new();
    let response = app
        .send(post_form(
            "/register",
            &format!("username=colt&email=colt%40example.com&{PASSWORD_FORM}"),
            None,
        ))
        .await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/campgrounds"));

    let set_cookie = session_set_cookie(&response).expect("session cookie");
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("Max-Age=604800"));
    assert!(set_cookie.contains("Expires="));
    let cookie = session_cookie(&response).unwrap();

    // The flash appears on the next page...
    let body = body_text(app.send(get("/", Some(&cookie))).await).await;
    assert!(body.contains("Welcome to Yelp Camp!"));
    assert!(body.contains("Signed in as colt"));

    // ...and only on that one.
    let body = body_text(app.send(get("/", Some(&cookie))).await).await;
    assert!(!body.contains("Welcome to Yelp Camp!"));
    assert!(body.contains("Signed in as colt"));
}

#[tokio::test]
async fn test_duplicate_username_is_flashed() {
    let app = TestApp::new();
    register(&app, "colt").await;

    let response = app
        .send(post_form(
            "/register",
            &format!("username=colt&email=other%40example.com&{PASSWORD_FORM}"),
            None,
        ))
        .await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/register"));

    let cookie = session_cookie(&response).unwrap();
    let body = body_text(app.send(get("/register", Some(&cookie))).await).await;
    assert!(body.contains("A user with the given username is already registered"));
    assert!(!body.contains("Signed in as"));
}

// =============================================================================
// Login / Logout
// =============================================================================

#[tokio::test]
async fn test_wrong_password_is_flashed_on_login_page() {
    let app = TestApp::new();
    register(&app, "colt").await;

    let response = app
        .send(post_form(
            "/login",
            "username=colt&password=not+the+password",
            None,
        ))
        .await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/login"));

    let cookie = session_cookie(&response).unwrap();
    let body = body_text(app.send(get("/login", Some(&cookie))).await).await;
    assert!(body.contains("Password or username is incorrect"));
    assert!(!body.contains("Signed in as"));
}

#[tokio::test]
async fn test_failed_login_keeps_signed_in_principal() {
    let app = TestApp::new();
    let cookie = register(&app, "colt").await;

    let response = app
        .send(post_form(
            "/login",
            "username=bob&password=not+the+password",
            Some(&cookie),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/login"));
    // Same session id, if the cookie is re-sent at all
    if let Some(returned) = session_cookie(&response) {
        assert_eq!(returned, cookie);
    }

    let body = body_text(app.send(get("/", Some(&cookie))).await).await;
    assert!(body.contains("Password or username is incorrect"));
    assert!(body.contains("Signed in as colt"));
}

#[tokio::test]
async fn test_login_rotates_session_id() {
    let app = TestApp::new();
    register(&app, "colt").await;

    // An anonymous session that already holds a flash
    let failed = app
        .send(post_form("/login", "username=colt&password=wrong+password", None))
        .await;
    let anonymous = session_cookie(&failed).unwrap();

    let response = app
        .send(post_form(
            "/login",
            &format!("username=colt&{PASSWORD_FORM}"),
            Some(&anonymous),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let authenticated = session_cookie(&response).unwrap();
    assert_ne!(authenticated, anonymous);

    let body = body_text(app.send(get("/", Some(&authenticated))).await).await;
    assert!(body.contains("Welcome back!"));
    assert!(body.contains("Signed in as colt"));

    // The pre-login id no longer carries the principal
    let body = body_text(app.send(get("/", Some(&anonymous))).await).await;
    assert!(!body.contains("Signed in as"));
}

#[tokio::test]
async fn test_logout_clears_principal_and_says_goodbye() {
    let app = TestApp::new();
    let cookie = register(&app, "colt").await;

    let response = app.send(post_form("/logout", "", Some(&cookie))).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/campgrounds"));

    let body = body_text(app.send(get("/", Some(&cookie))).await).await;
    assert!(body.contains("Goodbye!"));
    assert!(!body.contains("Signed in as"));
}

#[tokio::test]
async fn test_return_to_survives_login() {
    let app = TestApp::new();
    register(&app, "colt").await;

    // Hitting a protected route anonymously remembers where we were going
    let response = app.send(post_form("/uploads", "", None)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/login"));
    let cookie = session_cookie(&response).unwrap();

    let body = body_text(app.send(get("/login", Some(&cookie))).await).await;
    assert!(body.contains("You must be signed in first!"));

    let response = app
        .send(post_form(
            "/login",
            &format!("username=colt&{PASSWORD_FORM}"),
            Some(&cookie),
        ))
        .await;
    assert_eq!(location(&response), Some("/uploads"));
}
