//! Market-data terminal gateway provider.
//!
//! Fetches OHLCV history from a locally running terminal gateway over HTTP.
//! Handles rate limiting, retries with exponential backoff, and response
//! parsing. The gateway speaks a field-major matrix format: one row of
//! values per requested field, one column per timestamp.
//!
//! The terminal requires a logged-in desktop session; when it is down the
//! CSV directory source is the fallback.

use super::provider::{DataError, DataProvider, DataSource, FetchResult, RawBar, ReplayRange};
use chrono::NaiveDateTime;
use serde::Deserialize;
use std::time::Duration;

const HISTORY_FIELDS: &str = "open,high,low,close,volume";

/// Terminal gateway history response.
///
/// `data[f][t]` is the value of field `fields[f]` at `times[t]`. Cells are
/// null where the terminal had no observation even after its own fill pass.
#[derive(Debug, Deserialize)]
struct HistoryResponse {
    #[serde(default)]
    error_code: i32,
    message: Option<String>,
    #[serde(default)]
    fields: Vec<String>,
    #[serde(default)]
    times: Vec<i64>,
    #[serde(default)]
    data: Vec<Vec<Option<f64>>>,
}

/// Market-data terminal provider.
pub struct TerminalProvider {
    client: reqwest::blocking::Client,
    base_url: String,
    max_retries: u32,
    base_delay: Duration,
}

impl TerminalProvider {
    pub fn new(base_url: impl Into<String>) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build the history URL for a symbol and optional time bounds.
    fn history_url(&self, symbol: &str, range: &ReplayRange) -> String {
        let mut url = format!(
            "{}/api/history?symbol={symbol}&fields={HISTORY_FIELDS}&fill=previous",
            self.base_url
        );
        if let Some(start) = range.start {
            url.push_str(&format!("&start={}", start.and_utc().timestamp()));
        }
        if let Some(end) = range.end {
            url.push_str(&format!("&end={}", end.and_utc().timestamp()));
        }
        url
    }

    /// Parse the field-major history response into RawBars.
    fn parse_response(symbol: &str, resp: HistoryResponse) -> Result<Vec<RawBar>, DataError> {
        if resp.error_code != 0 {
            let message = resp.message.unwrap_or_else(|| "no message".into());
            return Err(DataError::Other(format!(
                "terminal error {} for {symbol}: {message}",
                resp.error_code
            )));
        }

        let field_row = |name: &str| -> Result<&Vec<Option<f64>>, DataError> {
            let idx = resp
                .fields
                .iter()
                .position(|f| f.eq_ignore_ascii_case(name))
                .ok_or_else(|| {
                    DataError::ResponseFormatChanged(format!("missing field '{name}'"))
                })?;
            resp.data.get(idx).ok_or_else(|| {
                DataError::ResponseFormatChanged(format!("no data row for field '{name}'"))
            })
        };

        let opens = field_row("open")?;
        let highs = field_row("high")?;
        let lows = field_row("low")?;
        let closes = field_row("close")?;
        let volumes = field_row("volume")?;

        let mut bars = Vec::with_capacity(resp.times.len());
        for (i, &ts) in resp.times.iter().enumerate() {
            let timestamp = timestamp_from_epoch(ts).ok_or_else(|| {
                DataError::ResponseFormatChanged(format!("invalid timestamp: {ts}"))
            })?;

            let open = opens.get(i).copied().flatten();
            let high = highs.get(i).copied().flatten();
            let low = lows.get(i).copied().flatten();
            let close = closes.get(i).copied().flatten();
            let volume = volumes.get(i).copied().flatten();

            // Skip columns where every field is null (non-trading timestamps)
            if open.is_none()
                && high.is_none()
                && low.is_none()
                && close.is_none()
                && volume.is_none()
            {
                continue;
            }

            let (open, high, low, close) = match (open, high, low, close) {
                (Some(o), Some(h), Some(l), Some(c)) => (o, h, l, c),
                _ => {
                    return Err(DataError::Malformed {
                        symbol: symbol.to_string(),
                        detail: format!("partial OHLC at timestamp {ts}"),
                    })
                }
            };

            bars.push(RawBar {
                timestamp,
                open,
                high,
                low,
                close,
                volume: volume.map_or(0, |v| v.max(0.0) as u64),
            });
        }

        if bars.is_empty() {
            return Err(DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            });
        }

        bars.sort_by_key(|b| b.timestamp);
        bars.dedup_by_key(|b| b.timestamp);
        Ok(bars)
    }

    /// Execute the HTTP request with retry and backoff.
    fn fetch_with_retry(&self, symbol: &str, range: &ReplayRange) -> Result<Vec<RawBar>, DataError> {
        let url = self.history_url(symbol, range);
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.base_delay * 2u32.pow(attempt - 1);
                std::thread::sleep(delay);
            }

            match self.client.get(&url).send() {
                Ok(resp) => {
                    let status = resp.status();

                    if status == reqwest::StatusCode::UNAUTHORIZED
                        || status == reqwest::StatusCode::FORBIDDEN
                    {
                        return Err(DataError::AuthenticationRequired(
                            "terminal session is not logged in".into(),
                        ));
                    }

                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        let retry_after = resp
                            .headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.parse::<u64>().ok())
                            .unwrap_or(60);
                        last_error = Some(DataError::RateLimited {
                            retry_after_secs: retry_after,
                        });
                        continue;
                    }

                    if status == reqwest::StatusCode::NOT_FOUND {
                        return Err(DataError::SymbolNotFound {
                            symbol: symbol.to_string(),
                        });
                    }

                    if !status.is_success() {
                        last_error = Some(DataError::Other(format!("HTTP {status} for {symbol}")));
                        continue;
                    }

                    let body = resp.text().map_err(|e| {
                        DataError::NetworkUnreachable(format!(
                            "failed to read response for {symbol}: {e}"
                        ))
                    })?;
                    let history: HistoryResponse = serde_json::from_str(&body).map_err(|e| {
                        DataError::ResponseFormatChanged(format!(
                            "failed to parse response for {symbol}: {e}"
                        ))
                    })?;

                    return Self::parse_response(symbol, history);
                }
                Err(e) => {
                    if e.is_connect() || e.is_timeout() {
                        last_error = Some(DataError::NetworkUnreachable(e.to_string()));
                        continue;
                    }
                    return Err(DataError::NetworkUnreachable(e.to_string()));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| DataError::Other("max retries exceeded".into())))
    }
}

fn timestamp_from_epoch(ts: i64) -> Option<NaiveDateTime> {
    chrono::DateTime::from_timestamp(ts, 0).map(|dt| dt.naive_utc())
}

impl DataProvider for TerminalProvider {
    fn name(&self) -> &str {
        "terminal"
    }

    fn fetch(&self, symbol: &str, range: &ReplayRange) -> Result<FetchResult, DataError> {
        let bars = self.fetch_with_retry(symbol, range)?;
        Ok(FetchResult {
            symbol: symbol.to_string(),
            bars,
            source: DataSource::Terminal,
        })
    }
}
