//! Market events published during replay.

use chrono::NaiveDateTime;
use std::sync::{Arc, Mutex};

/// Event published when a symbol emits a bar during replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarketEvent {
    NewBar {
        symbol: String,
        timestamp: NaiveDateTime,
    },
}

/// Sink for market events.
///
/// The feed publishes through this port; consumers decide what a
/// notification means (queue it, log it, wake a strategy).
pub trait EventSink: Send {
    fn publish(&self, event: MarketEvent);
}

/// Channel-backed sink. A gone receiver is not the feed's problem, so
/// send failures are swallowed.
impl EventSink for std::sync::mpsc::Sender<MarketEvent> {
    fn publish(&self, event: MarketEvent) {
        let _ = self.send(event);
    }
}

impl<S: EventSink + Sync> EventSink for Arc<S> {
    fn publish(&self, event: MarketEvent) {
        self.as_ref().publish(event);
    }
}

/// Sink that discards every event.
#[derive(Debug, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn publish(&self, _event: MarketEvent) {}
}

/// Sink that records events for inspection in tests.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<MarketEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take all recorded events, leaving the sink empty.
    pub fn drain(&self) -> Vec<MarketEvent> {
        match self.events.lock() {
            Ok(mut events) => std::mem::take(&mut *events),
            Err(_) => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.events.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventSink for RecordingSink {
    fn publish(&self, event: MarketEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
