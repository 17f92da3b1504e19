//! Book and catalog metadata
//!
//! A `Book` is owned by the cache once persisted. The acquisition path builds
//! a `NewBook` and the cache assigns the store key and creation time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Catalog metadata scraped from the archive's book page
///
/// Every field may be empty; the page does not always carry them all.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Metadata {
    pub author: String,
    pub title: String,
    pub credits: String,
    pub summary: String,
    pub language: String,
    pub subject: String,
    pub category: String,
}

impl Metadata {
    /// Title to show in listings, falling back to the catalog number
    pub fn display_title(&self, external_id: i64) -> String {
        if self.title.trim().is_empty() {
            format!("Book #{}", external_id)
        } else {
            self.title.clone()
        }
    }
}

/// Persisted book
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    /// Store key assigned by the cache
    pub id: i64,
    /// Public catalog identifier
    pub external_id: i64,
    /// Full plain text, never empty once persisted
    pub content: String,
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
}

/// Book under construction, not yet saved
#[derive(Debug, Clone, PartialEq)]
pub struct NewBook {
    pub external_id: i64,
    pub content: String,
    pub metadata: Metadata,
}

impl NewBook {
    /// Attach the store key and timestamp handed back by the cache
    pub fn into_book(self, id: i64, created_at: DateTime<Utc>) -> Book {
        Book {
            id,
            external_id: self.external_id,
            content: self.content,
            metadata: self.metadata,
            created_at,
        }
    }
}
