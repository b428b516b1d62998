//! Integration tests for authenticated image uploads.

#![allow(clippy::unwrap_used)]

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use serde_json::Value;

use yelpcamp_integration_tests::{TestApp, body_text, location, register};

const BOUNDARY: &str = "yelpcamp-test-boundary";

/// A multipart body with one `image` part per `(file name, content type)`.
fn multipart(files: &[(&str, &str)], cookie: Option<&str>) -> Request<Body> {
    let mut body = String::new();
    for (file_name, content_type) in files {
        body.push_str(&format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"image\"; filename=\"{file_name}\"\r\n\
             Content-Type: {content_type}\r\n\r\n\
             not-really-pixels\r\n"
        ));
    }
    body.push_str(&format!("--{BOUNDARY}--\r\n"));

    let mut builder = Request::post("/uploads").header(
        header::CONTENT_TYPE,
        format!("multipart/form-data; boundary={BOUNDARY}"),
    );
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body)).unwrap()
}

#[tokio::test]
async fn test_upload_requires_login() {
    let app = TestApp::new();
    let response = app
        .send(multipart(&[("tent.png", "image/png")], None))
        .await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/login"));
    assert!(app.assets.is_empty().await);
}

#[tokio::test]
async fn test_upload_stores_every_image() {
    let app = TestApp::new();
    let cookie = register(&app, "colt").await;

    let response = app
        .send(multipart(
            &[("tent.png", "image/png"), ("lake.jpeg", "image/jpeg")],
            Some(&cookie),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::CREATED);

    let assets: Value = serde_json::from_str(&body_text(response).await).unwrap();
    let assets = assets.as_array().unwrap();
    assert_eq!(assets.len(), 2);
    for asset in assets {
        let public_id = asset["public_id"].as_str().unwrap();
        assert!(public_id.starts_with("yelp-camp/"));
        assert!(app.assets.contains(public_id).await);
    }
    assert_eq!(app.assets.len().await, 2);
}

#[tokio::test]
async fn test_unsupported_format_rejects_whole_batch() {
    let app = TestApp::new();
    let cookie = register(&app, "colt").await;

    let response = app
        .send(multipart(
            &[("tent.png", "image/png"), ("dance.gif", "image/gif")],
            Some(&cookie),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(app.assets.is_empty().await, "nothing kept from a rejected batch");
}

#[tokio::test]
async fn test_upload_without_image_field_is_bad_request() {
    let app = TestApp::new();
    let cookie = register(&app, "colt").await;

    let response = app.send(multipart(&[], Some(&cookie))).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_text(response).await.contains("No image provided"));
}
