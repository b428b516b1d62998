//! Cloudinary upload client.
//!
//! Uses the signed REST API directly: every request carries the API key, a
//! UNIX timestamp and a SHA-256 signature over the sorted signed parameters
//! followed by the API secret.

use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
use reqwest::multipart::{Form, Part};
use secrecy::ExposeSecret;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use yelpcamp_core::ImageFormat;

use super::{AssetStorage, StoredAsset, UploadError};
use crate::config::CloudinaryConfig;

/// Upload requests can carry up to the multipart body limit.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct UploadResponse {
    public_id: String,
    secure_url: String,
    #[serde(default)]
    format: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Asset storage backed by a Cloudinary account.
#[derive(Clone)]
pub struct CloudinaryStorage {
    client: reqwest::Client,
    config: CloudinaryConfig,
}

impl CloudinaryStorage {
    /// Create a client for `config`.
    ///
    /// An unconfigured account is accepted here; every operation then fails
    /// with `UploadError::NotConfigured`.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &CloudinaryConfig) -> Result<Self, UploadError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        if !config.is_configured() {
            tracing::warn!("Cloudinary credentials not set; uploads are disabled");
        }

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    fn endpoint(&self, action: &str) -> String {
        format!(
            "{}/v1_1/{}/image/{action}",
            self.config.api_base.trim_end_matches('/'),
            self.config.cloud_name
        )
    }

    /// Build a multipart form with `params`, the API key and the signature.
    fn signed_form(&self, params: &[(&'static str, String)]) -> Form {
        let signature = sign(params, self.config.api_secret.expose_secret());

        params
            .iter()
            .fold(Form::new(), |form, (key, value)| form.text(*key, value.clone()))
            .text("api_key", self.config.api_key.clone())
            .text("signature", signature)
            .text("signature_algorithm", "sha256")
    }

    async fn post(&self, action: &str, form: Form) -> Result<reqwest::Response, UploadError> {
        let response = self
            .client
            .post(self.endpoint(action))
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorResponse>(&body)
            .map(|e| e.error.message)
            .unwrap_or(body);
        Err(UploadError::Provider {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl AssetStorage for CloudinaryStorage {
    async fn store(&self, bytes: Bytes, format: ImageFormat) -> Result<StoredAsset, UploadError> {
        if !self.config.is_configured() {
            return Err(UploadError::NotConfigured);
        }

        let params = [
            ("allowed_formats", ImageFormat::allow_list()),
            ("folder", self.config.folder.clone()),
            ("timestamp", chrono::Utc::now().timestamp().to_string()),
        ];

        let file = Part::bytes(bytes.to_vec())
            .file_name(format!("upload.{format}"))
            .mime_str(format.mime_type())?;
        let form = self.signed_form(&params).part("file", file);

        let uploaded: UploadResponse = self
            .post("upload", form)
            .await?
            .json()
            .await
            .map_err(|e| UploadError::Parse(e.to_string()))?;

        let format = uploaded
            .format
            .as_deref()
            .and_then(|f| f.parse().ok())
            .unwrap_or(format);

        tracing::info!(public_id = %uploaded.public_id, %format, "asset uploaded");
        Ok(StoredAsset {
            public_id: uploaded.public_id,
            url: uploaded.secure_url,
            folder: self.config.folder.clone(),
            format,
        })
    }

    async fn discard(&self, asset: &StoredAsset) -> Result<(), UploadError> {
        if !self.config.is_configured() {
            return Err(UploadError::NotConfigured);
        }

        let params = [
            ("public_id", asset.public_id.clone()),
            ("timestamp", chrono::Utc::now().timestamp().to_string()),
        ];

        let destroyed: DestroyResponse = self
            .post("destroy", self.signed_form(&params))
            .await?
            .json()
            .await
            .map_err(|e| UploadError::Parse(e.to_string()))?;

        match destroyed.result.as_str() {
            "ok" => {
                tracing::info!(public_id = %asset.public_id, "asset discarded");
                Ok(())
            }
            "not found" => {
                tracing::debug!(public_id = %asset.public_id, "asset already gone");
                Ok(())
            }
            other => Err(UploadError::Parse(format!("unexpected destroy result: {other}"))),
        }
    }
}

/// Request signature: hex SHA-256 of `k1=v1&k2=v2...` (keys sorted) + secret.
fn sign(params: &[(&str, String)], secret: &str) -> String {
    let mut sorted: Vec<_> = params.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let to_sign = sorted
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&");

    let digest = Sha256::digest(format!("{to_sign}{secret}").as_bytes());
    format!("{digest:x}")
}
