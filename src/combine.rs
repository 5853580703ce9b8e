//! Cross-week trend combination into one anonymized long table.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::observation::{LabeledObservation, WeekdaySlot};
use crate::pivot::{pivot_week, PriceMatrix};

/// Run-scoped surrogate key: row position after weekly matrices are stacked.
pub type TrendId = usize;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedPriceRow {
    pub trend_id: TrendId,
    #[serde(rename = "weekday_observed")]
    pub weekday_slot: WeekdaySlot,
    pub price: Option<f64>,
}

/// Long-format `{trend_id, weekday_slot, price}` table, slot-major like a melt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CombinedPriceTable {
    pub slots: Vec<WeekdaySlot>,
    pub rows: Vec<CombinedPriceRow>,
}

impl CombinedPriceTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn trend_ids(&self) -> BTreeSet<TrendId> {
        self.rows.iter().map(|row| row.trend_id).collect()
    }

    pub fn trend_count(&self) -> usize {
        self.trend_ids().len()
    }

    /// Prices of one trend in slot order.
    pub fn trend(&self, trend_id: TrendId) -> Vec<(WeekdaySlot, Option<f64>)> {
        self.rows
            .iter()
            .filter(|row| row.trend_id == trend_id)
            .map(|row| (row.weekday_slot, row.price))
            .collect()
    }

    pub fn retain_trends(&self, trend_ids: &BTreeSet<TrendId>) -> CombinedPriceTable {
        CombinedPriceTable {
            slots: self.slots.clone(),
            rows: self
                .rows
                .iter()
                .filter(|row| trend_ids.contains(&row.trend_id))
                .cloned()
                .collect(),
        }
    }
}

/// Pivots each week, stacks the anonymous matrices in week order and melts them back.
pub fn combine(weeks: &[Vec<LabeledObservation>]) -> CombinedPriceTable {
    let matrices: Vec<PriceMatrix> = weeks.iter().map(|week| pivot_week(week)).collect();
    let table = combine_matrices(&matrices);

    info!(
        component = "combine",
        event = "combine.finish",
        weeks = weeks.len(),
        trends = matrices.iter().map(|m| m.rows.len()).sum::<usize>(),
        slots = table.slots.len(),
        rows = table.rows.len()
    );

    table
}

pub fn combine_matrices(matrices: &[PriceMatrix]) -> CombinedPriceTable {
    let mut slots: Vec<WeekdaySlot> = Vec::new();
    for matrix in matrices {
        for slot in &matrix.slots {
            if !slots.contains(slot) {
                slots.push(*slot);
            }
        }
    }

    let stacked: Vec<(&PriceMatrix, usize)> = matrices
        .iter()
        .flat_map(|matrix| (0..matrix.rows.len()).map(move |row| (matrix, row)))
        .collect();

    let mut rows = Vec::with_capacity(slots.len() * stacked.len());
    for slot in &slots {
        for (trend_id, (matrix, row)) in stacked.iter().enumerate() {
            rows.push(CombinedPriceRow {
                trend_id,
                weekday_slot: *slot,
                price: matrix.price(*row, *slot),
            });
        }
    }

    CombinedPriceTable { slots, rows }
}
