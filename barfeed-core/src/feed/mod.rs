//! Replay feed: cursors, windows, events, and the bar feed itself.

pub mod cursor;
pub mod events;
pub mod handler;
pub mod window;

pub use cursor::{CursorStep, SeriesCursor};
pub use events::{EventSink, MarketEvent, NullSink, RecordingSink};
pub use handler::{
    Boundary, HistoricalBarFeed, LoadReport, LoadWarning, ReplayState, DEFAULT_WINDOW_CAPACITY,
};
pub use window::RecentWindow;

use crate::domain::Bar;
use thiserror::Error;

/// Errors surfaced by feed queries.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("unknown symbol: {symbol}")]
    UnknownSymbol { symbol: String },
}

/// Consumer-facing port of a bar feed.
///
/// Strategies and downstream components depend on this trait, not on
/// [`HistoricalBarFeed`], so a live feed can slot in later.
pub trait BarFeed {
    /// Up to `n` most recent bars for `symbol`, ascending by timestamp.
    fn latest_bars(&self, symbol: &str, n: usize) -> Result<Vec<Bar>, FeedError>;

    /// Advance the replay by one index position.
    fn update_bars(&mut self);

    /// True while the replay has positions left to emit.
    fn continue_replay(&self) -> bool;
}
