//! Project Gutenberg text client
//!
//! Raw book text lives at a fixed URL pattern:
//! `{base}/cache/epub/{id}/pg{id}.txt`. The human-readable catalog page used
//! for metadata is `{base}/ebooks/{id}`.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = concat!("lear-explorer/", env!("CARGO_PKG_VERSION"));

/// Raw text retrieval failure
///
/// An identifier the archive does not know shows up as `Status(404, ..)`,
/// indistinguishable at this layer from any other failed download.
#[derive(Debug, Error)]
pub enum ContentFetchError {
    #[error("failed to fetch content: {0}")]
    Network(String),

    #[error("failed to fetch content: status {0} from {1}")]
    Status(u16, String),

    #[error("failed to read content: {0}")]
    Read(String),

    #[error("failed to fetch content: empty body from {0}")]
    Empty(String),
}

/// Source of raw book text
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Full plain text of the book
    async fn fetch_text(&self, external_id: i64) -> Result<String, ContentFetchError>;

    /// Catalog page URL handed to the metadata extractor
    fn catalog_url(&self, external_id: i64) -> String;
}

/// Gutenberg archive client
pub struct GutenbergClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl GutenbergClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ContentFetchError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| ContentFetchError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Plain-text download URL for a catalog identifier
    pub fn text_url(&self, external_id: i64) -> String {
        format!(
            "{}/cache/epub/{}/pg{}.txt",
            self.base_url, external_id, external_id
        )
    }
}

#[async_trait]
impl ContentSource for GutenbergClient {
    async fn fetch_text(&self, external_id: i64) -> Result<String, ContentFetchError> {
        let url = self.text_url(external_id);
        tracing::debug!(external_id, url = %url, "Downloading book text");

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| ContentFetchError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ContentFetchError::Status(status.as_u16(), url));
        }

        let text = response
            .text()
            .await
            .map_err(|e| ContentFetchError::Read(e.to_string()))?;

        if text.trim().is_empty() {
            return Err(ContentFetchError::Empty(url));
        }

        tracing::info!(external_id, bytes = text.len(), "Content fetched successfully");
        Ok(text)
    }

    fn catalog_url(&self, external_id: i64) -> String {
        format!("{}/ebooks/{}", self.base_url, external_id)
    }
}
