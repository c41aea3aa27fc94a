//! Bounded window of recently emitted bars.

use crate::domain::Bar;
use chrono::NaiveDateTime;
use std::collections::VecDeque;

/// Fixed-capacity window over the most recent bars for one symbol.
///
/// The oldest bar is evicted when a push would exceed capacity, so lookback
/// memory stays bounded no matter how long the replay runs.
#[derive(Debug)]
pub struct RecentWindow {
    bars: VecDeque<Bar>,
    capacity: usize,
}

impl RecentWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            bars: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, bar: Bar) {
        if self.bars.len() == self.capacity {
            self.bars.pop_front();
        }
        self.bars.push_back(bar);
    }

    /// Up to `n` most recent bars in ascending timestamp order. Fewer are
    /// returned when fewer have been emitted.
    pub fn latest(&self, n: usize) -> Vec<Bar> {
        let skip = self.bars.len().saturating_sub(n);
        self.bars.iter().skip(skip).cloned().collect()
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.back()
    }

    pub fn last_timestamp(&self) -> Option<NaiveDateTime> {
        self.bars.back().map(|b| b.timestamp)
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }
}
