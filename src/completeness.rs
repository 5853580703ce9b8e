//! All-or-nothing weekly completeness filter per (user, island) pair.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDateTime;
use tracing::info;

use crate::observation::Observation;

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct PriceAccumulator {
    sum: f64,
    count: u32,
}

impl PriceAccumulator {
    pub(crate) fn push(&mut self, price: f64) {
        self.sum += price;
        self.count += 1;
    }

    pub(crate) fn mean(&self) -> f64 {
        self.sum / f64::from(self.count)
    }
}

/// Keeps only pairs holding a non-null price at every timestamp seen in `observations`.
///
/// The expected timestamp set is the union of `datetime_observed` across the whole
/// input, so one pair's gap drops that pair entirely. Repeated readings of a pair at
/// the same timestamp collapse to their mean. Output is dense and ordered by
/// timestamp, then `(user_id, island_id)`.
pub fn drop_incomplete(observations: &[Observation]) -> Vec<Observation> {
    let expected: BTreeSet<NaiveDateTime> = observations
        .iter()
        .map(|observation| observation.datetime_observed)
        .collect();

    let mut by_pair: BTreeMap<(i64, i64), BTreeMap<NaiveDateTime, PriceAccumulator>> =
        BTreeMap::new();
    for observation in observations {
        let prices = by_pair.entry(observation.pair()).or_default();
        if let Some(price) = observation.price.filter(|p| !p.is_nan()) {
            prices
                .entry(observation.datetime_observed)
                .or_default()
                .push(price);
        }
    }

    let total_pairs = by_pair.len();
    by_pair.retain(|_, prices| prices.len() == expected.len());

    let mut out = Vec::with_capacity(by_pair.len() * expected.len());
    for ts in &expected {
        for (&(user_id, island_id), prices) in &by_pair {
            out.push(Observation {
                user_id,
                island_id,
                datetime_observed: *ts,
                price: prices.get(ts).map(PriceAccumulator::mean),
            });
        }
    }

    info!(
        component = "completeness",
        event = "completeness.filtered",
        input_rows = observations.len(),
        expected_timestamps = expected.len(),
        pairs_seen = total_pairs,
        pairs_kept = by_pair.len(),
        pairs_dropped = total_pairs - by_pair.len()
    );

    out
}
