//! Book acquisition
//!
//! Resolves a book by catalog identifier: cache first, otherwise the text
//! and the catalog metadata are fetched concurrently, reconciled, and the
//! result persisted.
//!
//! Both fetches always run to completion even when the other one has already
//! failed.
//!
//! There is no guard around check-then-save: two concurrent calls for the
//! same uncached identifier can both miss the cache and both persist a row.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::Instrument;

use crate::db::BookRepository;
use crate::models::{Book, Metadata, NewBook};
use crate::services::gutenberg_client::{ContentFetchError, ContentSource};
use crate::services::metadata_scraper::{MetadataExtractor, MetadataFetchError};

/// Failure of one of the two concurrent fetch branches
#[derive(Debug, Error)]
pub enum FetchFailure {
    #[error(transparent)]
    Content(#[from] ContentFetchError),

    #[error(transparent)]
    Metadata(#[from] MetadataFetchError),
}

/// Book acquisition failure
#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("failed to look up cached book: {0}")]
    CacheLookup(#[source] lear_common::Error),

    /// One or both fetch branches failed; messages are joined with "; "
    #[error("{}", join_failures(.0))]
    Fetch(Vec<FetchFailure>),

    #[error("failed to decode metadata JSON: {0}")]
    MetadataDecode(#[source] serde_json::Error),

    #[error("failed to save book: {0}")]
    Persistence(#[source] lear_common::Error),
}

impl AcquisitionError {
    /// Branch failures, empty for the non-fetch variants
    pub fn fetch_failures(&self) -> &[FetchFailure] {
        match self {
            AcquisitionError::Fetch(failures) => failures.as_slice(),
            _ => &[],
        }
    }
}

fn join_failures(failures: &[FetchFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Tunables for acquisition
#[derive(Debug, Clone, Default)]
pub struct AcquisitionSettings {
    /// Upper bound on each fetch branch; `None` waits indefinitely
    pub fetch_timeout: Option<Duration>,
}

/// Cache-or-fetch orchestrator
pub struct BookAcquisition {
    repository: Arc<dyn BookRepository>,
    content: Arc<dyn ContentSource>,
    extractor: Arc<dyn MetadataExtractor>,
    settings: AcquisitionSettings,
}

impl BookAcquisition {
    pub fn new(
        repository: Arc<dyn BookRepository>,
        content: Arc<dyn ContentSource>,
        extractor: Arc<dyn MetadataExtractor>,
    ) -> Self {
        Self {
            repository,
            content,
            extractor,
            settings: AcquisitionSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: AcquisitionSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Every cached book
    pub async fn fetch_all_books(&self) -> Result<Vec<Book>, AcquisitionError> {
        self.repository
            .list_all()
            .await
            .map_err(AcquisitionError::CacheLookup)
    }

    /// Resolve a book by catalog identifier
    ///
    /// A cache hit returns immediately without any network call. On a miss,
    /// nothing is persisted unless both fetches succeed and the metadata
    /// decodes.
    pub async fn fetch_book(&self, external_id: i64) -> Result<Book, AcquisitionError> {
        let span = tracing::info_span!("fetch_book", external_id);
        self.acquire(external_id).instrument(span).await
    }

    async fn acquire(&self, external_id: i64) -> Result<Book, AcquisitionError> {
        let cached = self
            .repository
            .get_by_external_id(external_id)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to fetch book");
                AcquisitionError::CacheLookup(e)
            })?;

        if let Some(book) = cached {
            tracing::info!("Returning existing book from cache");
            return Ok(book);
        }

        let catalog_url = self.content.catalog_url(external_id);
        let (content, metadata_blob) = tokio::join!(
            self.fetch_content(external_id),
            self.fetch_metadata(&catalog_url),
        );

        let (content, metadata_blob) = match (content, metadata_blob) {
            (Ok(content), Ok(blob)) => (content, blob),
            (content, blob) => {
                let failures: Vec<FetchFailure> = [
                    content.err().map(FetchFailure::from),
                    blob.err().map(FetchFailure::from),
                ]
                .into_iter()
                .flatten()
                .collect();

                let err = AcquisitionError::Fetch(failures);
                tracing::error!(error = %err, "Failed to fetch book data");
                return Err(err);
            }
        };

        let metadata: Metadata = serde_json::from_slice(&metadata_blob).map_err(|e| {
            tracing::error!(error = %e, "Failed to decode metadata JSON");
            AcquisitionError::MetadataDecode(e)
        })?;

        let book = self
            .repository
            .save(NewBook {
                external_id,
                content,
                metadata,
            })
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to save book");
                AcquisitionError::Persistence(e)
            })?;

        tracing::info!(id = book.id, "Book saved successfully");
        Ok(book)
    }

    async fn fetch_content(&self, external_id: i64) -> Result<String, ContentFetchError> {
        let fetch = self.content.fetch_text(external_id);
        match self.settings.fetch_timeout {
            Some(limit) => tokio::time::timeout(limit, fetch).await.unwrap_or_else(|_| {
                Err(ContentFetchError::Network(format!(
                    "timed out after {:?}",
                    limit
                )))
            }),
            None => fetch.await,
        }
    }

    async fn fetch_metadata(&self, catalog_url: &str) -> Result<Vec<u8>, MetadataFetchError> {
        let fetch = self.extractor.extract(catalog_url);
        match self.settings.fetch_timeout {
            Some(limit) => tokio::time::timeout(limit, fetch).await.unwrap_or_else(|_| {
                Err(MetadataFetchError::Network(format!(
                    "timed out after {:?}",
                    limit
                )))
            }),
            None => fetch.await,
        }
    }
}
