//! Replay cursor over one aligned series.

use crate::data::SeriesSlot;
use crate::domain::Bar;
use chrono::NaiveDateTime;

/// Outcome of advancing a cursor by one index position.
#[derive(Debug, Clone, PartialEq)]
pub enum CursorStep {
    /// The slot held a bar (genuine or forward-filled).
    Emitted(Bar),
    /// The slot was empty for this symbol; the index still advanced.
    Gap(NaiveDateTime),
    /// The series end was already reached. The position does not move.
    Exhausted,
}

/// Forward-only cursor over one symbol's aligned slots.
///
/// There is no rewind: restarting a replay means rebuilding the feed.
#[derive(Debug)]
pub struct SeriesCursor {
    slots: Vec<SeriesSlot>,
    pos: usize,
}

impl SeriesCursor {
    pub fn new(slots: Vec<SeriesSlot>) -> Self {
        Self { slots, pos: 0 }
    }

    /// The slot the next `advance` will consume, if any.
    pub fn peek(&self) -> Option<&SeriesSlot> {
        self.slots.get(self.pos)
    }

    pub fn advance(&mut self) -> CursorStep {
        let Some(slot) = self.slots.get(self.pos) else {
            return CursorStep::Exhausted;
        };
        let step = match &slot.bar {
            Some(bar) => CursorStep::Emitted(bar.clone()),
            None => CursorStep::Gap(slot.timestamp),
        };
        self.pos += 1;
        step
    }

    pub fn is_exhausted(&self) -> bool {
        self.pos >= self.slots.len()
    }

    pub fn remaining(&self) -> usize {
        self.slots.len() - self.pos
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
