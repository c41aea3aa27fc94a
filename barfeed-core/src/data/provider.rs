//! Data provider trait and structured error types.
//!
//! The DataProvider trait abstracts over data sources (CSV directory,
//! market-data terminal) so we can swap implementations and mock for tests.
//! The feed layer sits above this trait — providers know nothing about
//! alignment or replay.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raw OHLCV observation from a data provider, before alignment.
///
/// The symbol is carried by [`FetchResult`], not by each bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawBar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

/// Structured error types for data operations.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("source unavailable for '{symbol}': {detail}")]
    SourceUnavailable { symbol: String, detail: String },

    #[error("malformed data for '{symbol}': {detail}")]
    Malformed { symbol: String, detail: String },

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by terminal (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("data error: {0}")]
    Other(String),
}

/// Optional inclusive time window for a load.
///
/// Providers that query a remote source pass the bounds through; the feed
/// applies them again after alignment, so a provider that ignores the
/// range (the CSV source does) still produces a correctly truncated replay.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplayRange {
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
}

impl ReplayRange {
    /// The unbounded range: every available observation.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn between(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    pub fn starting_at(start: NaiveDateTime) -> Self {
        Self {
            start: Some(start),
            end: None,
        }
    }

    pub fn ending_at(end: NaiveDateTime) -> Self {
        Self {
            start: None,
            end: Some(end),
        }
    }

    /// True if `ts` falls inside the (inclusive) bounds.
    pub fn contains(&self, ts: NaiveDateTime) -> bool {
        self.start.map_or(true, |s| ts >= s) && self.end.map_or(true, |e| ts <= e)
    }
}

/// Result of a successful fetch for a single symbol.
///
/// Bars are sorted ascending by timestamp with duplicates removed
/// (first occurrence kept) — providers guarantee this.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub symbol: String,
    pub bars: Vec<RawBar>,
    pub source: DataSource,
}

/// Where the data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataSource {
    CsvDir,
    Terminal,
}

/// Trait for data providers (CSV directory, terminal gateway, etc).
///
/// Implementations handle the specifics of one source kind. The core feed
/// has no compiled dependency on any vendor SDK — it only sees this port.
pub trait DataProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch OHLCV bars for a symbol, optionally bounded by `range`.
    fn fetch(&self, symbol: &str, range: &ReplayRange) -> Result<FetchResult, DataError>;
}
