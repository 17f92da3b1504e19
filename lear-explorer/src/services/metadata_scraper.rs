//! Catalog page metadata extractor
//!
//! Scrapes a Gutenberg "ebooks/{id}" page into a [`Metadata`] record and
//! hands it back as a serialized JSON blob. Parsing is regex based and only
//! looks at the handful of elements the page reliably carries:
//!
//! - `<h1>` (title fallback)
//! - the bibliographic `<tr><th>Label</th><td>Value</td></tr>` rows
//! - the author link (`href` containing `/author`)
//! - `<meta name="description" content="...">`

use async_trait::async_trait;
use regex::Regex;
use std::time::Duration;
use thiserror::Error;

use crate::models::Metadata;

const USER_AGENT: &str = concat!("lear-explorer/", env!("CARGO_PKG_VERSION"));

/// Metadata extraction failure
#[derive(Debug, Error)]
pub enum MetadataFetchError {
    #[error("failed to fetch metadata page: {0}")]
    Network(String),

    #[error("failed to fetch metadata: unexpected status code {0} from {1}")]
    Status(u16, String),

    #[error("failed to parse metadata page: {0}")]
    Parse(String),

    #[error("failed to serialize metadata: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Turns a catalog page URL into a serialized metadata blob
#[async_trait]
pub trait MetadataExtractor: Send + Sync {
    async fn extract(&self, catalog_url: &str) -> Result<Vec<u8>, MetadataFetchError>;
}

/// Compiled patterns for the catalog page
struct CatalogPatterns {
    heading: Regex,
    author_link: Regex,
    table_row: Regex,
    description: Regex,
    description_reversed: Regex,
    tag: Regex,
    whitespace: Regex,
}

impl CatalogPatterns {
    fn compile() -> Result<Self, regex::Error> {
        Ok(Self {
            heading: Regex::new(r"(?is)<h1[^>]*>(.*?)</h1>")?,
            author_link: Regex::new(r#"(?is)<a\s[^>]*href="[^"]*/author[^"]*"[^>]*>(.*?)</a>"#)?,
            table_row: Regex::new(r"(?is)<tr[^>]*>\s*<th[^>]*>(.*?)</th>\s*<td[^>]*>(.*?)</td>")?,
            description: Regex::new(
                r#"(?is)<meta\s[^>]*name="description"[^>]*content="([^"]*)""#,
            )?,
            description_reversed: Regex::new(
                r#"(?is)<meta\s[^>]*content="([^"]*)"[^>]*name="description""#,
            )?,
            tag: Regex::new(r"(?s)<[^>]*>")?,
            whitespace: Regex::new(r"\s+")?,
        })
    }

    /// Strip tags, decode common entities and collapse whitespace
    fn clean(&self, fragment: &str) -> String {
        let without_tags = self.tag.replace_all(fragment, " ");
        let decoded = decode_entities(&without_tags);
        self.whitespace.replace_all(&decoded, " ").trim().to_string()
    }

    fn parse(&self, html: &str) -> Metadata {
        let mut metadata = Metadata::default();
        let mut subjects: Vec<String> = Vec::new();

        for row in self.table_row.captures_iter(html) {
            let label = self.clean(&row[1]).to_lowercase();
            let value = self.clean(&row[2]);
            if value.is_empty() {
                continue;
            }

            match label.as_str() {
                "title" if metadata.title.is_empty() => metadata.title = value,
                "author" if metadata.author.is_empty() => metadata.author = value,
                "language" if metadata.language.is_empty() => metadata.language = value,
                "category" if metadata.category.is_empty() => metadata.category = value,
                "credits" | "produced by" if metadata.credits.is_empty() => {
                    metadata.credits = value
                }
                "subject" if !subjects.contains(&value) => subjects.push(value),
                _ => {}
            }
        }
        metadata.subject = subjects.join("; ");

        if metadata.title.is_empty() {
            if let Some(caps) = self.heading.captures(html) {
                metadata.title = self.clean(&caps[1]);
            }
        }

        if metadata.author.is_empty() {
            if let Some(caps) = self.author_link.captures(html) {
                metadata.author = self.clean(&caps[1]);
            }
        }

        let description = self
            .description
            .captures(html)
            .or_else(|| self.description_reversed.captures(html));
        if let Some(caps) = description {
            metadata.summary = self.clean(&caps[1]);
        }

        metadata
    }
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&amp;", "&")
}

/// Scraper for Gutenberg catalog pages
pub struct GutenbergScraper {
    http_client: reqwest::Client,
    patterns: CatalogPatterns,
}

impl GutenbergScraper {
    pub fn new() -> Result<Self, MetadataFetchError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| MetadataFetchError::Network(e.to_string()))?;

        let patterns =
            CatalogPatterns::compile().map_err(|e| MetadataFetchError::Parse(e.to_string()))?;

        Ok(Self {
            http_client,
            patterns,
        })
    }

    /// Parse an already downloaded catalog page
    pub fn parse_page(&self, html: &str) -> Metadata {
        self.patterns.parse(html)
    }
}

#[async_trait]
impl MetadataExtractor for GutenbergScraper {
    async fn extract(&self, catalog_url: &str) -> Result<Vec<u8>, MetadataFetchError> {
        tracing::debug!(url = %catalog_url, "Fetching catalog page");

        let response = self
            .http_client
            .get(catalog_url)
            .send()
            .await
            .map_err(|e| MetadataFetchError::Network(e.to_string()))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(MetadataFetchError::Status(
                status.as_u16(),
                catalog_url.to_string(),
            ));
        }

        let html = response
            .text()
            .await
            .map_err(|e| MetadataFetchError::Network(e.to_string()))?;

        let metadata = self.parse_page(&html);
        tracing::info!(
            url = %catalog_url,
            title = %metadata.title,
            author = %metadata.author,
            "Metadata fetched successfully"
        );

        Ok(serde_json::to_vec(&metadata)?)
    }
}
