//! Multi-symbol time alignment and forward-fill.
//!
//! All loaded series are reindexed onto the union of their timestamps. A
//! symbol with no genuine observation at an index position gets the most
//! recent earlier observation (forward-fill) with the timestamp rewritten
//! to the index position. Positions before a symbol's first observation or
//! after its last stay empty: alignment never fabricates history in either
//! direction.

use super::provider::RawBar;
use crate::domain::Bar;
use chrono::NaiveDateTime;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// One aligned index position for one symbol.
///
/// `bar` is `None` where the symbol has no data: before its first genuine
/// observation or after its last.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesSlot {
    pub timestamp: NaiveDateTime,
    pub bar: Option<Bar>,
}

/// All series reindexed onto the shared timestamp index.
///
/// Every slot vector has exactly `index.len()` entries, in index order.
#[derive(Debug, Clone, Default)]
pub struct AlignedData {
    pub index: Vec<NaiveDateTime>,
    pub series: HashMap<String, Vec<SeriesSlot>>,
}

impl AlignedData {
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Drop index positions outside the (inclusive) bounds, keeping every
    /// slot vector the same length as the index.
    pub fn truncate(&mut self, start: Option<NaiveDateTime>, end: Option<NaiveDateTime>) {
        let keep: Vec<bool> = self
            .index
            .iter()
            .map(|ts| start.map_or(true, |s| *ts >= s) && end.map_or(true, |e| *ts <= e))
            .collect();

        let mut i = 0;
        self.index.retain(|_| {
            let k = keep[i];
            i += 1;
            k
        });

        for slots in self.series.values_mut() {
            let mut i = 0;
            slots.retain(|_| {
                let k = keep[i];
                i += 1;
                k
            });
        }
    }
}

/// Reindex every symbol's bars onto the union timestamp index with
/// forward-fill. Input series must be sorted ascending and deduplicated,
/// which the providers guarantee.
pub fn align_and_fill(raw: &HashMap<String, Vec<RawBar>>) -> AlignedData {
    let index: Vec<NaiveDateTime> = raw
        .values()
        .flat_map(|bars| bars.iter().map(|b| b.timestamp))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let mut series = HashMap::with_capacity(raw.len());
    for (symbol, bars) in raw {
        let by_ts: BTreeMap<NaiveDateTime, &RawBar> =
            bars.iter().map(|b| (b.timestamp, b)).collect();
        let first = bars.first().map(|b| b.timestamp);
        let last = bars.last().map(|b| b.timestamp);

        let mut latest: Option<&RawBar> = None;
        let slots: Vec<SeriesSlot> = index
            .iter()
            .map(|&ts| {
                if let Some(&bar) = by_ts.get(&ts) {
                    latest = Some(bar);
                }
                let in_span = first.map_or(false, |f| ts >= f) && last.map_or(false, |l| ts <= l);
                let bar = if in_span {
                    latest.map(|b| Bar {
                        symbol: symbol.clone(),
                        timestamp: ts,
                        open: b.open,
                        high: b.high,
                        low: b.low,
                        close: b.close,
                        volume: b.volume,
                    })
                } else {
                    None
                };
                SeriesSlot { timestamp: ts, bar }
            })
            .collect();

        series.insert(symbol.clone(), slots);
    }

    AlignedData { index, series }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2020, 1, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn raw_bar(day: u32, close: f64) -> RawBar {
        RawBar {
            timestamp: ts(day),
            open: close - 1.0,
            high: close + 1.0,
            low: close - 2.0,
            close,
            volume: 1000,
        }
    }

    fn input(series: &[(&str, &[(u32, f64)])]) -> HashMap<String, Vec<RawBar>> {
        series
            .iter()
            .map(|(symbol, bars)| {
                (
                    symbol.to_string(),
                    bars.iter().map(|&(d, c)| raw_bar(d, c)).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn index_is_sorted_union() {
        let raw = input(&[("A", &[(2, 10.0), (4, 11.0)]), ("B", &[(3, 20.0)])]);
        let aligned = align_and_fill(&raw);

        assert_eq!(aligned.index, vec![ts(2), ts(3), ts(4)]);
        assert_eq!(aligned.series["A"].len(), 3);
        assert_eq!(aligned.series["B"].len(), 3);
    }

    #[test]
    fn gaps_are_forward_filled() {
        let raw = input(&[("A", &[(2, 10.0), (4, 11.0)]), ("B", &[(3, 20.0)])]);
        let aligned = align_and_fill(&raw);

        let filled = aligned.series["A"][1].bar.as_ref().unwrap();
        assert_eq!(filled.close, 10.0);
        assert_eq!(filled.timestamp, ts(3));
        assert_eq!(filled.symbol, "A");
    }

    #[test]
    fn no_fill_before_first_observation() {
        let raw = input(&[("A", &[(1, 10.0)]), ("B", &[(2, 20.0), (3, 21.0)])]);
        let aligned = align_and_fill(&raw);

        assert!(aligned.series["B"][0].bar.is_none());
        assert!(aligned.series["B"][1].bar.is_some());
    }

    #[test]
    fn no_fill_after_last_observation() {
        let raw = input(&[("A", &[(1, 10.0), (2, 10.5)]), ("B", &[(1, 20.0), (3, 21.0)])]);
        let aligned = align_and_fill(&raw);

        assert_eq!(aligned.index, vec![ts(1), ts(2), ts(3)]);
        assert!(aligned.series["A"][2].bar.is_none());
        assert_eq!(aligned.series["A"][1].bar.as_ref().unwrap().close, 10.5);
    }

    #[test]
    fn genuine_observations_are_untouched() {
        let raw = input(&[("A", &[(2, 10.0)])]);
        let aligned = align_and_fill(&raw);

        let bar = aligned.series["A"][0].bar.as_ref().unwrap();
        assert_eq!(bar.timestamp, ts(2));
        assert_eq!(bar.close, 10.0);
        assert_eq!(bar.volume, 1000);
    }

    #[test]
    fn empty_input_yields_empty_index() {
        let aligned = align_and_fill(&HashMap::new());
        assert!(aligned.is_empty());
        assert!(aligned.series.is_empty());
    }

    #[test]
    fn truncate_keeps_extents_equal() {
        let raw = input(&[("A", &[(1, 10.0), (2, 11.0), (3, 12.0), (4, 13.0)])]);
        let mut aligned = align_and_fill(&raw);

        aligned.truncate(Some(ts(2)), Some(ts(3)));

        assert_eq!(aligned.index, vec![ts(2), ts(3)]);
        assert_eq!(aligned.series["A"].len(), 2);
        assert_eq!(aligned.series["A"][0].bar.as_ref().unwrap().close, 11.0);
    }

    #[test]
    fn truncate_with_no_bounds_is_identity() {
        let raw = input(&[("A", &[(1, 10.0), (2, 11.0)])]);
        let mut aligned = align_and_fill(&raw);

        aligned.truncate(None, None);
        assert_eq!(aligned.len(), 2);
    }
}
