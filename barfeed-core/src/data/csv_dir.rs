//! CSV directory source — one delimited file per symbol.
//!
//! Layout: `{dir}/{SYMBOL}.csv`, first row is a header, columns
//! `timestamp,open,high,low,close,volume`. Rows are sorted ascending and
//! deduplicated by timestamp (first occurrence kept) before being handed
//! to the feed. A missing file is `SourceUnavailable`; an unparseable row
//! or a file with no data rows is `Malformed` — a bad source never leaks
//! a partial series.

use super::provider::{DataError, DataProvider, DataSource, FetchResult, RawBar, ReplayRange};
use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Raw CSV row. Header names vary across vendors, so common spellings
/// are accepted via serde aliases.
#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(
        alias = "Timestamp",
        alias = "Date",
        alias = "date",
        alias = "datetime",
        alias = "Datetime",
        alias = "time",
        alias = "Time"
    )]
    timestamp: String,
    #[serde(alias = "Open", alias = "o")]
    open: f64,
    #[serde(alias = "High", alias = "h")]
    high: f64,
    #[serde(alias = "Low", alias = "l")]
    low: f64,
    #[serde(alias = "Close", alias = "c")]
    close: f64,
    #[serde(alias = "Volume", alias = "v")]
    volume: f64,
}

/// Timestamp formats tried when no explicit format is configured.
const FALLBACK_DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];
const FALLBACK_DATE_FORMAT: &str = "%Y-%m-%d";

/// CSV directory data provider.
pub struct CsvDirProvider {
    dir: PathBuf,
    timestamp_format: Option<String>,
}

impl CsvDirProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            timestamp_format: None,
        }
    }

    /// Use an explicit chrono format string instead of the fallbacks.
    pub fn with_timestamp_format(mut self, format: impl Into<String>) -> Self {
        self.timestamp_format = Some(format.into());
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn symbol_path(&self, symbol: &str) -> PathBuf {
        self.dir.join(format!("{symbol}.csv"))
    }

    fn parse_timestamp(&self, raw: &str) -> Option<NaiveDateTime> {
        if let Some(fmt) = &self.timestamp_format {
            return NaiveDateTime::parse_from_str(raw, fmt).ok().or_else(|| {
                NaiveDate::parse_from_str(raw, fmt)
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
            });
        }
        for fmt in FALLBACK_DATETIME_FORMATS {
            if let Ok(ts) = NaiveDateTime::parse_from_str(raw, fmt) {
                return Some(ts);
            }
        }
        NaiveDate::parse_from_str(raw, FALLBACK_DATE_FORMAT)
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
    }

    fn read_symbol(&self, symbol: &str) -> Result<Vec<RawBar>, DataError> {
        let path = self.symbol_path(symbol);
        let file = File::open(&path).map_err(|e| DataError::SourceUnavailable {
            symbol: symbol.to_string(),
            detail: format!("{}: {e}", path.display()),
        })?;

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(file);

        let mut bars = Vec::new();
        for (line, result) in reader.deserialize::<CsvRow>().enumerate() {
            let row = result.map_err(|e| DataError::Malformed {
                symbol: symbol.to_string(),
                detail: format!("row {}: {e}", line + 1),
            })?;
            let timestamp =
                self.parse_timestamp(&row.timestamp)
                    .ok_or_else(|| DataError::Malformed {
                        symbol: symbol.to_string(),
                        detail: format!("row {}: unparseable timestamp '{}'", line + 1, row.timestamp),
                    })?;
            bars.push(RawBar {
                timestamp,
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
                volume: row.volume.max(0.0) as u64,
            });
        }

        if bars.is_empty() {
            return Err(DataError::Malformed {
                symbol: symbol.to_string(),
                detail: "no data rows".into(),
            });
        }

        bars.sort_by_key(|b| b.timestamp);
        bars.dedup_by_key(|b| b.timestamp);
        Ok(bars)
    }
}

impl DataProvider for CsvDirProvider {
    fn name(&self) -> &str {
        "csv_dir"
    }

    // The range is intentionally not applied here: the file is materialized
    // in full and truncation happens once, after alignment.
    fn fetch(&self, symbol: &str, _range: &ReplayRange) -> Result<FetchResult, DataError> {
        let bars = self.read_symbol(symbol)?;
        Ok(FetchResult {
            symbol: symbol.to_string(),
            bars,
            source: DataSource::CsvDir,
        })
    }
}
