//! Remote clients and the two core services
//!
//! - `gutenberg_client`, `metadata_scraper`, `chat_engine`: remote collaborators
//!   behind traits so the core can be exercised with mocks
//! - `book_acquisition`: cache-or-fetch orchestration
//! - `analysis_relay`: upstream chat stream to downstream event stream

pub mod analysis_relay;
pub mod book_acquisition;
pub mod chat_engine;
pub mod gutenberg_client;
pub mod metadata_scraper;

pub use analysis_relay::{AnalysisRelay, OpenAnalysis, RelayError, RelaySummary};
pub use book_acquisition::{
    AcquisitionError, AcquisitionSettings, BookAcquisition, FetchFailure,
};
pub use chat_engine::{ChatEngine, ChatEngineError, ChatStream, SambaNovaClient};
pub use gutenberg_client::{ContentFetchError, ContentSource, GutenbergClient};
pub use metadata_scraper::{GutenbergScraper, MetadataExtractor, MetadataFetchError};
