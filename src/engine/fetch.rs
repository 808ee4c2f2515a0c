//! Image layer sources
//!
//! Layer URLs are resolved through an [`ImageFetcher`]; the HTTP fetcher also
//! understands inline `data:` URLs so previews can be composited before upload.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use image::DynamicImage;
use tracing::debug;
use url::Url;

use super::compositor::TextureError;

/// Loads and decodes the image behind a layer URL
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<DynamicImage, TextureError>;
}

/// Fetches layer images over HTTP(S)
pub struct HttpImageFetcher {
    http_client: reqwest::Client,
}

impl HttpImageFetcher {
    pub fn new(timeout: Duration) -> Result<Self, TextureError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("glove-customizer/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(HttpImageFetcher { http_client })
    }

    async fn fetch_remote(&self, url: &Url) -> Result<DynamicImage, TextureError> {
        let response = self.http_client.get(url.as_str()).send().await?;

        if !response.status().is_success() {
            return Err(TextureError::FetchFailed(format!(
                "HTTP {}: {}",
                response.status(),
                url
            )));
        }

        let bytes = response.bytes().await?;
        Ok(image::load_from_memory(&bytes)?)
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> Result<DynamicImage, TextureError> {
        debug!(url = %truncate_for_log(url), "Fetching layer image");

        let parsed = Url::parse(url).map_err(|e| TextureError::InvalidUrl(format!("{}: {}", url, e)))?;

        let image = match parsed.scheme() {
            "http" | "https" => self.fetch_remote(&parsed).await?,
            "data" => decode_data_url(url)?,
            other => {
                return Err(TextureError::InvalidUrl(format!("unsupported scheme {:?}", other)));
            }
        };

        debug!(width = image.width(), height = image.height(), "Layer image loaded");
        Ok(image)
    }
}

/// Decode `data:image/...;base64,<payload>`
pub fn decode_data_url(url: &str) -> Result<DynamicImage, TextureError> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| TextureError::InvalidUrl("not a data URL".to_string()))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| TextureError::InvalidUrl("data URL without payload".to_string()))?;

    if !header.ends_with(";base64") {
        return Err(TextureError::InvalidUrl("only base64 data URLs are supported".to_string()));
    }

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| TextureError::FetchFailed(format!("bad base64 payload: {}", e)))?;

    Ok(image::load_from_memory(&bytes)?)
}

fn truncate_for_log(url: &str) -> &str {
    match url.char_indices().nth(96) {
        Some((idx, _)) => &url[..idx],
        None => url,
    }
}
