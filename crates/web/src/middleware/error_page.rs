//! Terminal error renderer.
//!
//! Any response carrying an [`ErrorView`] is replaced by the rendered error
//! page, keeping its status and headers (session cookie included).

use askama::Template;
use axum::{
    body::Body,
    extract::Request,
    http::{
        HeaderValue, StatusCode,
        header::{CONTENT_LENGTH, CONTENT_TYPE},
    },
    middleware::Next,
    response::Response,
};

use crate::error::ErrorView;

use super::context::RenderContext;
use super::request_id::RequestId;

/// Uniform error page.
#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub ctx: RenderContext,
    pub status: u16,
    pub message: String,
    /// Shown for server errors so reports can be correlated.
    pub reference: Option<String>,
}

/// Middleware that renders `ErrorView` responses.
///
/// Must wrap the render context middleware, whose copy of the context on the
/// response is used for the page chrome.
pub async fn error_page_middleware(request: Request, next: Next) -> Response {
    let request_id = request.extensions().get::<RequestId>().cloned();
    let response = next.run(request).await;

    let Some(view) = response.extensions().get::<ErrorView>().cloned() else {
        return response;
    };

    let (mut parts, _) = response.into_parts();
    let ctx = parts
        .extensions
        .get::<RenderContext>()
        .cloned()
        .unwrap_or_default();

    let page = ErrorTemplate {
        ctx,
        status: view.status.as_u16(),
        message: view.message.clone(),
        reference: request_id
            .filter(|_| view.status.is_server_error())
            .map(|id| id.0),
    };

    let body = match page.render() {
        Ok(html) => {
            parts
                .headers
                .insert(CONTENT_TYPE, HeaderValue::from_static("text/html; charset=utf-8"));
            Body::from(html)
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to render error page");
            parts.status = StatusCode::INTERNAL_SERVER_ERROR;
            parts.headers.insert(
                CONTENT_TYPE,
                HeaderValue::from_static("text/plain; charset=utf-8"),
            );
            Body::from(view.message)
        }
    };
    parts.headers.remove(CONTENT_LENGTH);

    Response::from_parts(parts, body)
}
