//! Image upload endpoint.

use axum::{
    Json,
    extract::{Multipart, State},
    http::StatusCode,
};

use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::services::upload::{self, IncomingFile, StoredAsset};
use crate::state::AppState;

/// Multipart field carrying images.
const IMAGE_FIELD: &str = "image";

/// Largest accepted upload request.
pub const UPLOAD_BODY_LIMIT: usize = 10 * 1024 * 1024;

/// Store every `image` field and return the resulting assets.
///
/// Nothing is kept if any file is rejected.
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Vec<StoredAsset>>)> {
    let mut files = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;

        files.push(IncomingFile {
            file_name,
            content_type,
            bytes,
        });
    }

    if files.is_empty() {
        return Err(AppError::BadRequest("No image provided".to_string()));
    }

    let assets = upload::store_all(state.assets(), files).await?;
    tracing::info!(user_id = %user.id, count = assets.len(), "images uploaded");

    Ok((StatusCode::CREATED, Json(assets)))
}
