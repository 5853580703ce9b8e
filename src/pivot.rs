//! Long-to-wide reshaping of weekly prices into one row per trend.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::combine::{CombinedPriceTable, TrendId};
use crate::completeness::PriceAccumulator;
use crate::observation::{LabeledObservation, WeekdaySlot};

/// Wide price table keyed by `K`, one column per weekday slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WideTable<K> {
    pub slots: Vec<WeekdaySlot>,
    pub keys: Vec<K>,
    pub rows: Vec<Vec<Option<f64>>>,
}

impl<K> WideTable<K> {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column(&self, slot: WeekdaySlot) -> Option<usize> {
        self.slots.iter().position(|s| *s == slot)
    }

    /// Drops the key index, leaving only the anonymous price matrix.
    pub fn into_matrix(self) -> PriceMatrix {
        PriceMatrix {
            slots: self.slots,
            rows: self.rows,
        }
    }
}

/// A week of trends with their (user, island) identity erased.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceMatrix {
    pub slots: Vec<WeekdaySlot>,
    pub rows: Vec<Vec<Option<f64>>>,
}

impl PriceMatrix {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn price(&self, row: usize, slot: WeekdaySlot) -> Option<f64> {
        let column = self.slots.iter().position(|s| *s == slot)?;
        self.rows.get(row)?.get(column).copied().flatten()
    }
}

/// Pivots one week keyed by `(user_id, island_id)`.
pub fn pivot_by_pair(observations: &[LabeledObservation]) -> WideTable<(i64, i64)> {
    pivot_rows(observations.iter().map(|row| {
        (
            row.observation.pair(),
            row.weekday_slot,
            row.observation.price,
        )
    }))
}

/// Pivots one week and drops the pair index; rows keep the pair sort order.
pub fn pivot_week(observations: &[LabeledObservation]) -> PriceMatrix {
    pivot_by_pair(observations).into_matrix()
}

/// Re-pivots a combined long table keyed by `trend_id`.
pub fn pivot_combined(table: &CombinedPriceTable) -> WideTable<TrendId> {
    pivot_rows(
        table
            .rows
            .iter()
            .map(|row| (row.trend_id, row.weekday_slot, row.price)),
    )
}

/// Columns follow the first occurrence of each slot in `rows`, not label order.
/// Keys with no non-null price are left out; repeated cells average.
fn pivot_rows<K: Ord>(
    rows: impl IntoIterator<Item = (K, WeekdaySlot, Option<f64>)>,
) -> WideTable<K> {
    let mut slots: Vec<WeekdaySlot> = Vec::new();
    let mut cells: BTreeMap<K, HashMap<WeekdaySlot, PriceAccumulator>> = BTreeMap::new();

    for (key, slot, price) in rows {
        if !slots.contains(&slot) {
            slots.push(slot);
        }
        if let Some(price) = price.filter(|p| !p.is_nan()) {
            cells.entry(key).or_default().entry(slot).or_default().push(price);
        }
    }

    let mut keys = Vec::with_capacity(cells.len());
    let mut out_rows: Vec<Vec<Option<f64>>> = Vec::with_capacity(cells.len());
    for (key, prices) in cells {
        out_rows.push(
            slots
                .iter()
                .map(|slot| prices.get(slot).map(PriceAccumulator::mean))
                .collect(),
        );
        keys.push(key);
    }

    WideTable {
        slots,
        keys,
        rows: out_rows,
    }
}
