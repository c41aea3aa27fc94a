//! Bar — the fundamental market data unit.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// OHLCV bar for a single symbol at a single point in time.
///
/// Immutable once constructed. Bars produced by forward-fill carry the
/// values of the latest genuine observation with the timestamp rewritten
/// to the aligned index position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub symbol: String,
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl Bar {
    /// Basic OHLC sanity check: high >= low, high bounds open/close, prices positive.
    pub fn is_sane(&self) -> bool {
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.open > 0.0
            && self.close > 0.0
    }
}
