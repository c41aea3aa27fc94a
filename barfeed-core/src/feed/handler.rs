//! Historical bar feed: load, align, replay.
//!
//! The feed owns the full lifecycle: fetch raw series through a
//! [`DataProvider`], align them onto the shared index with forward-fill,
//! then replay one index position per `update_bars` call, publishing a
//! `NewBar` event for every symbol that emits. Once any cursor runs out the
//! feed is exhausted and stays exhausted.

use crate::data::{align_and_fill, DataError, DataProvider, RawBar, ReplayRange};
use crate::domain::Bar;
use crate::feed::cursor::{CursorStep, SeriesCursor};
use crate::feed::events::{EventSink, MarketEvent};
use crate::feed::window::RecentWindow;
use crate::feed::{BarFeed, FeedError};
use chrono::NaiveDateTime;
use rayon::prelude::*;
use std::collections::HashMap;
use tracing::{debug, warn};

pub const DEFAULT_WINDOW_CAPACITY: usize = 256;

/// Replay lifecycle. The transition is one-way; a fresh load resets it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayState {
    Replaying,
    Exhausted,
}

/// Which edge of a requested range a warning refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    Start,
    End,
}

/// Non-fatal findings from a load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadWarning {
    /// A requested bound falls outside the available data. `symbol` is
    /// `None` when the shared index itself does not reach the bound.
    RangeNotCovered {
        symbol: Option<String>,
        boundary: Boundary,
        requested: NaiveDateTime,
    },
}

/// Outcome of a [`HistoricalBarFeed::load`] call.
#[derive(Debug)]
pub struct LoadReport {
    pub requested: usize,
    pub loaded: Vec<String>,
    pub failures: Vec<(String, DataError)>,
    pub warnings: Vec<LoadWarning>,
}

impl LoadReport {
    pub fn all_loaded(&self) -> bool {
        self.failures.is_empty() && self.loaded.len() == self.requested
    }
}

/// Bar feed that replays pre-loaded history.
pub struct HistoricalBarFeed {
    symbols: Vec<String>,
    raw: HashMap<String, Vec<RawBar>>,
    index: Vec<NaiveDateTime>,
    cursors: HashMap<String, SeriesCursor>,
    windows: HashMap<String, RecentWindow>,
    sink: Box<dyn EventSink>,
    state: ReplayState,
    window_capacity: usize,
}

impl HistoricalBarFeed {
    pub fn new(symbols: Vec<String>, sink: Box<dyn EventSink>) -> Self {
        Self::with_window_capacity(symbols, sink, DEFAULT_WINDOW_CAPACITY)
    }

    pub fn with_window_capacity(
        symbols: Vec<String>,
        sink: Box<dyn EventSink>,
        window_capacity: usize,
    ) -> Self {
        let cursors = symbols
            .iter()
            .map(|s| (s.clone(), SeriesCursor::new(Vec::new())))
            .collect();
        let windows = symbols
            .iter()
            .map(|s| (s.clone(), RecentWindow::new(window_capacity)))
            .collect();
        Self {
            symbols,
            raw: HashMap::new(),
            index: Vec::new(),
            cursors,
            windows,
            sink,
            state: ReplayState::Replaying,
            window_capacity,
        }
    }

    /// Fetch every configured symbol through `provider` and rebuild the
    /// aligned replay from scratch.
    ///
    /// Symbols fetch in parallel. A failed symbol is reported and skipped;
    /// its previously loaded series, if any, is kept. Cursors and windows
    /// are reset either way, so a reload always restarts the replay.
    pub fn load(&mut self, provider: &dyn DataProvider, range: &ReplayRange) -> LoadReport {
        let results: Vec<(String, Result<Vec<RawBar>, DataError>)> = self
            .symbols
            .par_iter()
            .map(|symbol| {
                let result = provider.fetch(symbol, range).map(|r| r.bars);
                (symbol.clone(), result)
            })
            .collect();

        let mut loaded = Vec::new();
        let mut failures = Vec::new();
        for (symbol, result) in results {
            match result {
                Ok(bars) => {
                    debug!(provider = provider.name(), symbol = %symbol, bars = bars.len(), "loaded series");
                    self.raw.insert(symbol.clone(), bars);
                    loaded.push(symbol);
                }
                Err(err) => {
                    warn!(provider = provider.name(), symbol = %symbol, error = %err, "failed to load series");
                    failures.push((symbol, err));
                }
            }
        }

        let warnings = self.rebuild(range);

        LoadReport {
            requested: self.symbols.len(),
            loaded,
            failures,
            warnings,
        }
    }

    /// Realign the raw series and reset cursors, windows, and state.
    fn rebuild(&mut self, range: &ReplayRange) -> Vec<LoadWarning> {
        let mut aligned = align_and_fill(&self.raw);
        let mut warnings = Vec::new();

        for (symbol, bars) in &self.raw {
            let (Some(first), Some(last)) = (bars.first(), bars.last()) else {
                continue;
            };
            if let Some(start) = range.start {
                if start < first.timestamp {
                    warnings.push(LoadWarning::RangeNotCovered {
                        symbol: Some(symbol.clone()),
                        boundary: Boundary::Start,
                        requested: start,
                    });
                }
            }
            if let Some(end) = range.end {
                if end > last.timestamp {
                    warnings.push(LoadWarning::RangeNotCovered {
                        symbol: Some(symbol.clone()),
                        boundary: Boundary::End,
                        requested: end,
                    });
                }
            }
        }

        // A bound past the whole index would empty the replay; warn and
        // keep the full extent on that side instead.
        let mut start_bound = range.start;
        if let (Some(start), Some(last)) = (range.start, aligned.index.last().copied()) {
            if start > last {
                warnings.push(LoadWarning::RangeNotCovered {
                    symbol: None,
                    boundary: Boundary::Start,
                    requested: start,
                });
                start_bound = None;
            }
        }
        let mut end_bound = range.end;
        if let (Some(end), Some(first)) = (range.end, aligned.index.first().copied()) {
            if end < first {
                warnings.push(LoadWarning::RangeNotCovered {
                    symbol: None,
                    boundary: Boundary::End,
                    requested: end,
                });
                end_bound = None;
            }
        }
        aligned.truncate(start_bound, end_bound);

        let insane: usize = aligned
            .series
            .values()
            .flat_map(|slots| slots.iter().filter_map(|s| s.bar.as_ref()))
            .filter(|b| !b.is_sane())
            .count();
        if insane > 0 {
            warn!(bars = insane, "aligned data contains bars that fail the OHLC sanity check");
        }

        for warning in &warnings {
            warn!(?warning, "requested range not fully covered");
        }

        self.cursors = self
            .symbols
            .iter()
            .map(|s| {
                let slots = aligned.series.remove(s).unwrap_or_default();
                (s.clone(), SeriesCursor::new(slots))
            })
            .collect();
        self.windows = self
            .symbols
            .iter()
            .map(|s| (s.clone(), RecentWindow::new(self.window_capacity)))
            .collect();
        self.index = aligned.index;
        self.state = ReplayState::Replaying;

        warnings
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    /// The shared timestamp index the replay walks.
    pub fn aligned_index(&self) -> &[NaiveDateTime] {
        &self.index
    }

    pub fn state(&self) -> ReplayState {
        self.state
    }

    /// Up to `n` most recent bars for `symbol`, ascending.
    pub fn latest_bars(&self, symbol: &str, n: usize) -> Result<Vec<Bar>, FeedError> {
        let window = self.windows.get(symbol).ok_or_else(|| FeedError::UnknownSymbol {
            symbol: symbol.to_string(),
        })?;
        Ok(window.latest(n))
    }

    /// The most recent bar for `symbol`, if any has been emitted yet.
    pub fn latest_bar(&self, symbol: &str) -> Result<Option<Bar>, FeedError> {
        let window = self.windows.get(symbol).ok_or_else(|| FeedError::UnknownSymbol {
            symbol: symbol.to_string(),
        })?;
        Ok(window.last().cloned())
    }

    /// Timestamp of the most recent bar for `symbol`.
    pub fn latest_bar_timestamp(&self, symbol: &str) -> Result<Option<NaiveDateTime>, FeedError> {
        let window = self.windows.get(symbol).ok_or_else(|| FeedError::UnknownSymbol {
            symbol: symbol.to_string(),
        })?;
        Ok(window.last_timestamp())
    }

    /// Advance the replay by one index position.
    ///
    /// Every symbol with a bar at the new position pushes it into its
    /// window and publishes a `NewBar` event. Symbols in a gap advance
    /// silently. When any cursor runs out, the feed flips to `Exhausted`;
    /// further calls do nothing and publish nothing.
    pub fn update_bars(&mut self) {
        if self.state == ReplayState::Exhausted {
            return;
        }

        let mut any_exhausted = false;
        for symbol in &self.symbols {
            let Some(cursor) = self.cursors.get_mut(symbol) else {
                continue;
            };
            match cursor.advance() {
                CursorStep::Emitted(bar) => {
                    let timestamp = bar.timestamp;
                    if let Some(window) = self.windows.get_mut(symbol) {
                        window.push(bar);
                    }
                    self.sink.publish(MarketEvent::NewBar {
                        symbol: symbol.clone(),
                        timestamp,
                    });
                }
                CursorStep::Gap(_) => {}
                CursorStep::Exhausted => {
                    any_exhausted = true;
                }
            }
        }

        if any_exhausted {
            debug!("replay exhausted");
            self.state = ReplayState::Exhausted;
        }
    }

    pub fn continue_replay(&self) -> bool {
        self.state == ReplayState::Replaying
    }
}

impl BarFeed for HistoricalBarFeed {
    fn latest_bars(&self, symbol: &str, n: usize) -> Result<Vec<Bar>, FeedError> {
        HistoricalBarFeed::latest_bars(self, symbol, n)
    }

    fn update_bars(&mut self) {
        HistoricalBarFeed::update_bars(self);
    }

    fn continue_replay(&self) -> bool {
        HistoricalBarFeed::continue_replay(self)
    }
}
