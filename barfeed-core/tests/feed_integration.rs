//! End-to-end feed tests: CSV directory on disk through load, alignment,
//! and replay.

use barfeed_core::data::{CsvDirProvider, ReplayRange};
use barfeed_core::feed::{HistoricalBarFeed, LoadWarning, MarketEvent, RecordingSink};
use barfeed_core::FeedError;
use chrono::{NaiveDate, NaiveDateTime};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

fn temp_data_dir() -> PathBuf {
    let id = TEST_COUNTER.fetch_add(1, Ordering::Relaxed);
    let dir = env::temp_dir().join(format!("barfeed_feed_test_{}_{id}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn write_csv(dir: &Path, symbol: &str, body: &str) {
    fs::write(dir.join(format!("{symbol}.csv")), body).unwrap();
}

fn ts(day: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2020, 1, day)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

/// A on every day 1..=5, B only on days 1, 3, 5.
fn staggered_dir() -> PathBuf {
    let dir = temp_data_dir();
    write_csv(
        &dir,
        "A",
        "timestamp,open,high,low,close,volume\n\
         2020-01-01,9.0,11.0,8.0,10.0,1000\n\
         2020-01-02,10.0,12.0,9.0,11.0,1000\n\
         2020-01-03,11.0,13.0,10.0,12.0,1000\n\
         2020-01-04,12.0,14.0,11.0,13.0,1000\n\
         2020-01-05,13.0,15.0,12.0,14.0,1000\n",
    );
    write_csv(
        &dir,
        "B",
        "timestamp,open,high,low,close,volume\n\
         2020-01-01,19.0,21.0,18.0,20.0,2000\n\
         2020-01-03,20.0,22.0,19.0,21.0,2000\n\
         2020-01-05,21.0,23.0,20.0,22.0,2000\n",
    );
    dir
}

fn staggered_feed() -> (HistoricalBarFeed, Arc<RecordingSink>, PathBuf) {
    let dir = staggered_dir();
    let sink = Arc::new(RecordingSink::new());
    let mut feed = HistoricalBarFeed::new(
        vec!["A".into(), "B".into()],
        Box::new(Arc::clone(&sink)),
    );
    let report = feed.load(&CsvDirProvider::new(&dir), &ReplayRange::all());
    assert!(report.all_loaded());
    (feed, sink, dir)
}

#[test]
fn staggered_series_replay_with_forward_fill() {
    let (mut feed, sink, dir) = staggered_feed();

    assert_eq!(feed.aligned_index().len(), 5);

    while feed.continue_replay() {
        feed.update_bars();
    }

    let b_closes: Vec<f64> = feed
        .latest_bars("B", 5)
        .unwrap()
        .iter()
        .map(|b| b.close)
        .collect();
    assert_eq!(b_closes, vec![20.0, 20.0, 21.0, 21.0, 22.0]);

    let b_timestamps: Vec<NaiveDateTime> = feed
        .latest_bars("B", 5)
        .unwrap()
        .iter()
        .map(|b| b.timestamp)
        .collect();
    assert_eq!(b_timestamps, vec![ts(1), ts(2), ts(3), ts(4), ts(5)]);

    // Both symbols emit at every one of the 5 index positions
    let events = sink.drain();
    assert_eq!(events.len(), 10);
    assert!(events.iter().all(|e| matches!(e, MarketEvent::NewBar { .. })));

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn events_arrive_in_index_order() {
    let (mut feed, sink, dir) = staggered_feed();

    feed.update_bars();
    feed.update_bars();

    let timestamps: Vec<NaiveDateTime> = sink
        .drain()
        .into_iter()
        .map(|e| match e {
            MarketEvent::NewBar { timestamp, .. } => timestamp,
        })
        .collect();
    assert_eq!(timestamps, vec![ts(1), ts(1), ts(2), ts(2)]);

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn asking_for_more_bars_than_emitted_returns_what_exists() {
    let (mut feed, _sink, dir) = staggered_feed();

    feed.update_bars();
    feed.update_bars();

    let bars = feed.latest_bars("A", 100).unwrap();
    assert_eq!(bars.len(), 2);
    assert_eq!(bars[0].timestamp, ts(1));

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn exhaustion_stops_the_replay_for_good() {
    let (mut feed, sink, dir) = staggered_feed();

    let mut updates = 0;
    while feed.continue_replay() {
        feed.update_bars();
        updates += 1;
        assert!(updates < 100, "replay never exhausted");
    }
    // 5 emitting positions plus the call that discovers exhaustion
    assert_eq!(updates, 6);

    sink.drain();
    let before = feed.latest_bars("A", 10).unwrap();
    feed.update_bars();
    feed.update_bars();

    assert!(sink.is_empty());
    assert_eq!(feed.latest_bars("A", 10).unwrap(), before);
    assert!(!feed.continue_replay());

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn early_start_bound_warns_and_keeps_data() {
    let dir = staggered_dir();
    let sink = Arc::new(RecordingSink::new());
    let mut feed = HistoricalBarFeed::new(
        vec!["A".into(), "B".into()],
        Box::new(Arc::clone(&sink)),
    );

    let early = NaiveDate::from_ymd_opt(2019, 6, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    let report = feed.load(&CsvDirProvider::new(&dir), &ReplayRange::starting_at(early));

    assert!(report.all_loaded());
    assert!(report
        .warnings
        .iter()
        .any(|w| matches!(w, LoadWarning::RangeNotCovered { .. })));
    assert_eq!(feed.aligned_index().len(), 5);

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn range_bounds_truncate_the_replay() {
    let dir = staggered_dir();
    let sink = Arc::new(RecordingSink::new());
    let mut feed = HistoricalBarFeed::new(
        vec!["A".into(), "B".into()],
        Box::new(Arc::clone(&sink)),
    );

    let report = feed.load(
        &CsvDirProvider::new(&dir),
        &ReplayRange::between(ts(2), ts(4)),
    );
    assert!(report.all_loaded());
    assert_eq!(feed.aligned_index(), &[ts(2), ts(3), ts(4)]);

    while feed.continue_replay() {
        feed.update_bars();
    }
    let a_closes: Vec<f64> = feed
        .latest_bars("A", 10)
        .unwrap()
        .iter()
        .map(|b| b.close)
        .collect();
    assert_eq!(a_closes, vec![11.0, 12.0, 13.0]);

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn missing_file_fails_only_that_symbol() {
    let dir = staggered_dir();
    let sink = Arc::new(RecordingSink::new());
    let mut feed = HistoricalBarFeed::new(
        vec!["A".into(), "B".into(), "MISSING".into()],
        Box::new(Arc::clone(&sink)),
    );

    let report = feed.load(&CsvDirProvider::new(&dir), &ReplayRange::all());

    assert!(!report.all_loaded());
    assert_eq!(report.loaded.len(), 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].0, "MISSING");

    feed.update_bars();
    assert_eq!(feed.latest_bars("A", 1).unwrap().len(), 1);
    assert_eq!(feed.latest_bars("B", 1).unwrap().len(), 1);
    assert!(feed.latest_bars("MISSING", 1).unwrap().is_empty());

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn unknown_symbol_is_an_error_not_a_panic() {
    let (feed, _sink, dir) = staggered_feed();

    match feed.latest_bars("ZZZ", 1) {
        Err(FeedError::UnknownSymbol { symbol }) => assert_eq!(symbol, "ZZZ"),
        other => panic!("expected UnknownSymbol, got: {other:?}"),
    }

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn reload_after_exhaustion_replays_from_the_top() {
    let (mut feed, sink, dir) = staggered_feed();

    while feed.continue_replay() {
        feed.update_bars();
    }
    assert!(!feed.continue_replay());

    let report = feed.load(&CsvDirProvider::new(&dir), &ReplayRange::all());
    assert!(report.all_loaded());
    assert!(feed.continue_replay());
    assert!(feed.latest_bars("A", 10).unwrap().is_empty());

    sink.drain();
    feed.update_bars();
    assert_eq!(sink.len(), 2);
    assert_eq!(feed.latest_bar_timestamp("A").unwrap(), Some(ts(1)));

    let _ = fs::remove_dir_all(&dir);
}
