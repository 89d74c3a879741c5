//! Point-in-time symbol mapping tables.
//!
//! A map file lists, for one listing, which ticker it traded under up to
//! and including each row's date. Rows are kept sorted by date so a lookup
//! picks the first row on or after the requested day.

pub mod directory;

pub use directory::{DirectoryMapFiles, InMemoryMapFiles};

use chrono::{DateTime, NaiveDate, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised by a mapping table provider.
#[derive(Debug, Error)]
pub enum MappingError {
    /// The table for this ticker exists but carries no rows.
    #[error("map file for '{ticker}' has no data")]
    NoData { ticker: String },

    #[error("failed to read map file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed map file {path}, row {row}: {message}")]
    Malformed {
        path: PathBuf,
        row: usize,
        message: String,
    },
}

/// One row of a map file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapFileRow {
    /// Last day (inclusive) on which `symbol` applies.
    pub date: NaiveDate,
    /// Ticker in effect up to `date`.
    pub symbol: String,
}

impl MapFileRow {
    pub fn new(date: NaiveDate, symbol: impl Into<String>) -> Self {
        Self {
            date,
            symbol: symbol.into(),
        }
    }
}

/// Point-in-time mapping for a single listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MapFile {
    rows: Vec<MapFileRow>,
}

impl MapFile {
    /// Build a map file, sorting rows by date.
    pub fn new(mut rows: Vec<MapFileRow>) -> Self {
        rows.sort_by_key(|r| r.date);
        Self { rows }
    }

    /// Whether the table covers any date at all.
    pub fn has_coverage(&self) -> bool {
        !self.rows.is_empty()
    }

    #[allow(dead_code)] // Inspection helper
    pub fn rows(&self) -> &[MapFileRow] {
        &self.rows
    }

    /// Ticker in effect at `as_of`, or `None` when past the last row or blank.
    pub fn mapped_symbol_as_of(&self, as_of: DateTime<Utc>) -> Option<&str> {
        let day = as_of.date_naive();
        self.rows
            .iter()
            .find(|r| r.date >= day)
            .map(|r| r.symbol.trim())
            .filter(|s| !s.is_empty())
    }
}

/// Source of map files, keyed by ticker.
///
/// Implementations apply their own key normalization; a ticker with no
/// table yields an empty [`MapFile`]. Tables are shared, not copied, per
/// lookup.
pub trait MapFileProvider: Send + Sync {
    fn map_file(&self, ticker: &str) -> Result<Arc<MapFile>, MappingError>;
}
