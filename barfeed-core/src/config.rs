//! Serializable replay configuration.

use crate::data::{CsvDirProvider, DataProvider, ReplayRange, TerminalProvider};
use crate::feed::DEFAULT_WINDOW_CAPACITY;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(String),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid config field '{field}': {detail}")]
    Invalid { field: String, detail: String },
}

/// Serializable configuration for a replay session.
///
/// Captures everything needed to reproduce a replay: the universe, the
/// data source, the requested time range, and the lookback window size.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReplayConfig {
    /// Universe of symbols to load and replay
    pub symbols: Vec<String>,

    /// Capacity of the per-symbol recent-bars window
    #[serde(default = "default_window_capacity")]
    pub window_capacity: usize,

    /// Where the bars come from
    pub source: SourceConfig,

    /// Optional inclusive time bounds
    #[serde(default)]
    pub range: RangeConfig,
}

fn default_window_capacity() -> usize {
    DEFAULT_WINDOW_CAPACITY
}

/// Data source configuration (serializable enum).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    /// Directory of per-symbol CSV files.
    Csv {
        dir: PathBuf,
        #[serde(default)]
        timestamp_format: Option<String>,
    },

    /// Market-data terminal gateway.
    Terminal { base_url: String },
}

/// Optional time bounds, as `YYYY-MM-DD` or `YYYY-MM-DD HH:MM:SS` strings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RangeConfig {
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
}

impl ReplayConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {e}", path.display())))?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        if config.symbols.is_empty() {
            return Err(ConfigError::Invalid {
                field: "symbols".into(),
                detail: "at least one symbol is required".into(),
            });
        }
        Ok(config)
    }

    /// Construct the provider this config names.
    pub fn build_provider(&self) -> Result<Box<dyn DataProvider>, ConfigError> {
        match &self.source {
            SourceConfig::Csv {
                dir,
                timestamp_format,
            } => {
                let mut provider = CsvDirProvider::new(dir);
                if let Some(format) = timestamp_format {
                    provider = provider.with_timestamp_format(format);
                }
                Ok(Box::new(provider))
            }
            SourceConfig::Terminal { base_url } => {
                let provider =
                    TerminalProvider::new(base_url).map_err(|e| ConfigError::Invalid {
                        field: "source.base_url".into(),
                        detail: e.to_string(),
                    })?;
                Ok(Box::new(provider))
            }
        }
    }

    /// Parse the configured bounds into a [`ReplayRange`].
    pub fn replay_range(&self) -> Result<ReplayRange, ConfigError> {
        Ok(ReplayRange {
            start: parse_bound("range.start", self.range.start.as_deref())?,
            end: parse_bound("range.end", self.range.end.as_deref())?,
        })
    }
}

fn parse_bound(field: &str, raw: Option<&str>) -> Result<Option<NaiveDateTime>, ConfigError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    if let Ok(ts) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Ok(Some(ts));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(Some)
        .ok_or_else(|| ConfigError::Invalid {
            field: field.into(),
            detail: format!("unparseable timestamp '{raw}'"),
        })
}
