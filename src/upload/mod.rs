//! Image upload client
//!
//! Validates user files against the device profile and posts them to the
//! image hosting endpoint. Upload failures never escape [`ImageHost::upload`];
//! callers get `None` and surface a status message.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use utoipa::ToSchema;

use crate::config::{DeviceProfile, UploadSettings};

/// Rejections raised before any network call
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("Only image files are allowed")]
    NotAnImage(String),
    #[error("Image exceeds {limit_mb}MB limit")]
    TooLarge { size: u64, limit_mb: u64 },
}

/// Upload transport / endpoint failures
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Endpoint returned {status}: {message}")]
    Endpoint { status: u16, message: String },
    #[error("Response did not contain a secure URL")]
    MissingUrl,
}

/// A user-selected file
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        UploadFile {
            name: name.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Check MIME type and size before uploading
pub fn validate_file(file: &UploadFile, profile: &DeviceProfile) -> Result<(), ValidationError> {
    if !file.content_type.starts_with("image/") {
        return Err(ValidationError::NotAnImage(file.content_type.clone()));
    }

    if file.size() > profile.max_upload_bytes {
        return Err(ValidationError::TooLarge {
            size: file.size(),
            limit_mb: profile.max_upload_mb(),
        });
    }

    Ok(())
}

/// Upload progress shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    Loading,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct UploadStatus {
    pub kind: StatusKind,
    pub message: String,
}

impl UploadStatus {
    pub fn loading() -> Self {
        UploadStatus { kind: StatusKind::Loading, message: "Uploading...".to_string() }
    }

    pub fn success() -> Self {
        UploadStatus { kind: StatusKind::Success, message: "Upload successful!".to_string() }
    }

    pub fn failed() -> Self {
        UploadStatus { kind: StatusKind::Error, message: "Upload failed".to_string() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        UploadStatus { kind: StatusKind::Error, message: message.into() }
    }
}

impl From<&ValidationError> for UploadStatus {
    fn from(err: &ValidationError) -> Self {
        UploadStatus::error(err.to_string())
    }
}

/// Remote image host
#[async_trait]
pub trait ImageHost: Send + Sync {
    /// Public URL of the stored image, or `None` if the upload did not happen
    async fn upload(&self, file: &UploadFile) -> Option<String>;
}

#[derive(Debug, Deserialize)]
struct HostResponse {
    secure_url: Option<String>,
}

/// Unsigned multipart upload with a fixed preset
pub struct CloudinaryClient {
    http_client: reqwest::Client,
    settings: UploadSettings,
}

impl CloudinaryClient {
    pub fn new(settings: UploadSettings) -> Result<Self, UploadError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent(concat!("glove-customizer/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(CloudinaryClient { http_client, settings })
    }

    fn form(&self, file: &UploadFile) -> Result<Form, UploadError> {
        let part = Part::bytes(file.bytes.to_vec())
            .file_name(file.name.clone())
            .mime_str(&file.content_type)?;

        Ok(Form::new()
            .part("file", part)
            .text("upload_preset", self.settings.upload_preset.clone())
            .text("quality", self.settings.quality.clone())
            .text("format", self.settings.format.clone()))
    }

    /// Upload and return the secure URL, surfacing every failure
    pub async fn try_upload(&self, file: &UploadFile) -> Result<String, UploadError> {
        let response = self
            .http_client
            .post(&self.settings.endpoint)
            .multipart(self.form(file)?)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UploadError::Endpoint {
                status: status.as_u16(),
                message: body.chars().take(500).collect(),
            });
        }

        let body: HostResponse = response.json().await?;
        body.secure_url.ok_or(UploadError::MissingUrl)
    }
}

#[async_trait]
impl ImageHost for CloudinaryClient {
    #[instrument(skip_all, fields(file = %file.name, bytes = file.size()))]
    async fn upload(&self, file: &UploadFile) -> Option<String> {
        debug!(endpoint = %self.settings.endpoint, "Uploading image");

        match self.try_upload(file).await {
            Ok(url) => {
                info!(url = %url, "Image uploaded");
                Some(url)
            }
            Err(e) => {
                warn!(error = %e, "Image upload failed");
                None
            }
        }
    }
}
