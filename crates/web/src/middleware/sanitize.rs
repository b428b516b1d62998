//! Inbound key sanitizer.
//!
//! Keys that a document store could read as query operators are neutralised
//! before any handler runs: a leading `$` and every `.` become `_`. Applies to
//! the query string, URL-encoded form bodies and JSON bodies (recursively).
//! Multipart and other bodies pass through untouched.

use std::borrow::Cow;
use std::error::Error;

use axum::{
    body::{Body, Bytes},
    extract::Request,
    http::{
        HeaderValue, Uri,
        header::{CONTENT_LENGTH, CONTENT_TYPE},
        uri::PathAndQuery,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use http_body_util::LengthLimitError;
use serde_json::Value;
use url::form_urlencoded;

use crate::error::AppError;

/// Largest form or JSON body that is buffered for sanitizing.
pub const MAX_SANITIZED_BODY: usize = 2 * 1024 * 1024;

const REPLACEMENT: &str = "_";

/// Sanitize one key.
#[must_use]
pub fn sanitize_key(key: &str) -> Cow<'_, str> {
    if !key.starts_with('$') && !key.contains('.') {
        return Cow::Borrowed(key);
    }

    let (prefix, rest) = key
        .strip_prefix('$')
        .map_or(("", key), |rest| (REPLACEMENT, rest));
    Cow::Owned(format!("{prefix}{}", rest.replace('.', REPLACEMENT)))
}

/// Re-encode a `application/x-www-form-urlencoded` string if any key needs
/// sanitizing.
fn sanitize_urlencoded(input: &[u8]) -> Option<String> {
    let pairs: Vec<(Cow<'_, str>, Cow<'_, str>)> = form_urlencoded::parse(input).collect();
    if pairs
        .iter()
        .all(|(key, _)| matches!(sanitize_key(key), Cow::Borrowed(_)))
    {
        return None;
    }

    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in &pairs {
        serializer.append_pair(&sanitize_key(key), value);
    }
    Some(serializer.finish())
}

/// Sanitize object keys at every depth. Returns whether anything changed.
fn sanitize_json(value: &mut Value) -> bool {
    match value {
        Value::Object(map) => {
            let mut changed = false;
            let entries = std::mem::take(map);
            for (key, mut inner) in entries {
                changed |= sanitize_json(&mut inner);
                let clean = sanitize_key(&key);
                changed |= matches!(clean, Cow::Owned(_));
                map.insert(clean.into_owned(), inner);
            }
            changed
        }
        Value::Array(items) => items
            .iter_mut()
            .fold(false, |changed, item| sanitize_json(item) | changed),
        _ => false,
    }
}

fn sanitize_uri(uri: &Uri) -> Option<Uri> {
    let query = uri.query()?;
    let clean = sanitize_urlencoded(query.as_bytes())?;

    let mut parts = uri.clone().into_parts();
    let path_and_query = if clean.is_empty() {
        uri.path().to_string()
    } else {
        format!("{}?{clean}", uri.path())
    };
    parts.path_and_query = Some(PathAndQuery::try_from(path_and_query).ok()?);
    Uri::from_parts(parts).ok()
}

#[derive(Clone, Copy)]
enum BodyKind {
    Form,
    Json,
}

fn body_kind(request: &Request) -> Option<BodyKind> {
    let content_type = request.headers().get(CONTENT_TYPE)?.to_str().ok()?;
    let essence = content_type.split(';').next()?.trim().to_ascii_lowercase();

    if essence == "application/x-www-form-urlencoded" {
        Some(BodyKind::Form)
    } else if essence == "application/json" || essence.ends_with("+json") {
        Some(BodyKind::Json)
    } else {
        None
    }
}

fn sanitize_body(kind: BodyKind, bytes: &Bytes) -> Option<Vec<u8>> {
    match kind {
        BodyKind::Form => sanitize_urlencoded(bytes).map(String::into_bytes),
        BodyKind::Json => {
            // Malformed JSON is left for the handler to reject.
            let mut value: Value = serde_json::from_slice(bytes).ok()?;
            if sanitize_json(&mut value) {
                serde_json::to_vec(&value).ok()
            } else {
                None
            }
        }
    }
}

/// Buffer a body of at most [`MAX_SANITIZED_BODY`] bytes.
async fn read_body(body: Body) -> Result<Bytes, AppError> {
    axum::body::to_bytes(body, MAX_SANITIZED_BODY)
        .await
        .map_err(|e| {
            if is_length_limit(&e) {
                AppError::PayloadTooLarge
            } else {
                tracing::debug!(error = %e, "failed to read request body");
                AppError::BadRequest("Failed to read request body".to_string())
            }
        })
}

fn is_length_limit(error: &(dyn Error + 'static)) -> bool {
    let mut current = Some(error);
    while let Some(e) = current {
        if e.is::<LengthLimitError>() {
            return true;
        }
        current = e.source();
    }
    false
}

/// Middleware that sanitizes inbound keys.
pub async fn sanitize_middleware(request: Request, next: Next) -> Response {
    let (mut parts, body) = request.into_parts();

    if let Some(uri) = sanitize_uri(&parts.uri) {
        tracing::debug!(path = %parts.uri.path(), "sanitized query keys");
        parts.uri = uri;
    }

    let request = Request::from_parts(parts, body);
    let Some(kind) = body_kind(&request) else {
        return next.run(request).await;
    };

    let (mut parts, body) = request.into_parts();
    let bytes = match read_body(body).await {
        Ok(bytes) => bytes,
        Err(e) => return e.into_response(),
    };

    let body = match sanitize_body(kind, &bytes) {
        Some(clean) => {
            tracing::debug!(path = %parts.uri.path(), "sanitized body keys");
            parts.headers.insert(CONTENT_LENGTH, HeaderValue::from(clean.len()));
            Body::from(clean)
        }
        None => Body::from(bytes),
    };

    next.run(Request::from_parts(parts, body)).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_sanitize_key() {
        assert_eq!(sanitize_key("username"), "username");
        assert_eq!(sanitize_key("$gt"), "_gt");
        assert_eq!(sanitize_key("a.b.c"), "a_b_c");
        assert_eq!(sanitize_key("$where.x"), "_where_x");
        assert_eq!(sanitize_key("price$"), "price$");
        assert!(matches!(sanitize_key("plain"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_urlencoded() {
        assert_eq!(sanitize_urlencoded(b"username=colt&password=x"), None);
        assert_eq!(
            sanitize_urlencoded(b"username%5B%24ne%5D=1&%24where=x").as_deref(),
            Some("username%5B%24ne%5D=1&_where=x")
        );
        assert_eq!(
            sanitize_urlencoded(b"a.b=c+d").as_deref(),
            Some("a_b=c+d")
        );
    }

    #[test]
    fn test_json_nested() {
        let mut value = json!({
            "username": {"$ne": null},
            "list": [{"a.b": 1}, 2],
            "ok": "$keep-values"
        });
        assert!(sanitize_json(&mut value));
        assert_eq!(
            value,
            json!({
                "username": {"_ne": null},
                "list": [{"a_b": 1}, 2],
                "ok": "$keep-values"
            })
        );

        let mut clean = json!({"username": "colt"});
        assert!(!sanitize_json(&mut clean));
    }

    #[test]
    fn test_uri() {
        let uri: Uri = "/campgrounds?$where=1&page=2".parse().unwrap();
        let clean = sanitize_uri(&uri).unwrap();
        assert_eq!(clean.path(), "/campgrounds");
        assert_eq!(clean.query(), Some("_where=1&page=2"));

        let untouched: Uri = "/campgrounds?page=2".parse().unwrap();
        assert!(sanitize_uri(&untouched).is_none());
    }

    #[tokio::test]
    async fn test_oversized_body_is_payload_too_large() {
        let body = Body::from(vec![b'a'; MAX_SANITIZED_BODY + 1]);
        assert!(matches!(read_body(body).await, Err(AppError::PayloadTooLarge)));
    }

    #[tokio::test]
    async fn test_broken_body_is_bad_request() {
        use http_body_util::{BodyExt, Limited};

        // A stream that fails mid-read for a reason other than its size
        let broken = Limited::new(Body::from("username=colt"), 4)
            .map_err(|_| std::io::Error::other("connection reset"));
        assert!(matches!(
            read_body(Body::new(broken)).await,
            Err(AppError::BadRequest(_))
        ));

        let ok = read_body(Body::from("username=colt")).await.unwrap();
        assert_eq!(ok, Bytes::from_static(b"username=colt"));
    }

    #[test]
    fn test_body_json_untouched_when_malformed() {
        assert!(sanitize_body(BodyKind::Json, &Bytes::from_static(b"{\"$x\":")).is_none());
    }
}
