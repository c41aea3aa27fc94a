//! barfeed-core — historical OHLCV bar loading, alignment, and replay.
//!
//! The crate is organized in layers:
//! - `domain`: the [`Bar`] type shared by everything above it
//! - `data`: provider ports (CSV directory, terminal gateway) and
//!   multi-symbol alignment with forward-fill
//! - `feed`: the replay engine — cursors, recent-bar windows, market
//!   events, and [`HistoricalBarFeed`]
//! - `config`: TOML replay configuration
//!
//! A typical session loads a [`ReplayConfig`], builds the provider it
//! names, feeds it to a [`HistoricalBarFeed`], then drives the replay
//! with `update_bars` until `continue_replay` turns false.

pub mod config;
pub mod data;
pub mod domain;
pub mod feed;

pub use config::{ConfigError, ReplayConfig};
pub use data::{DataError, DataProvider, ReplayRange};
pub use domain::Bar;
pub use feed::{BarFeed, FeedError, HistoricalBarFeed, MarketEvent};
