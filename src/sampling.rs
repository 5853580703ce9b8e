//! Uniform trend sampling for visual inspection of clusters.

use std::collections::BTreeSet;

use rand::seq::index;
use rand::Rng;
use serde::Serialize;
use tracing::debug;

use crate::combine::{CombinedPriceTable, TrendId};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterSample {
    pub cluster: u32,
    pub sample_ids: BTreeSet<TrendId>,
    pub trends: CombinedPriceTable,
}

/// Draws `min(n, trend_ids.len())` distinct ids uniformly without replacement.
///
/// The caller owns the random source; seed it for reproducible samples.
pub fn sample_trend_ids<R: Rng + ?Sized>(
    trend_ids: &BTreeSet<TrendId>,
    n: usize,
    rng: &mut R,
) -> BTreeSet<TrendId> {
    let pool: Vec<TrendId> = trend_ids.iter().copied().collect();
    let amount = n.min(pool.len());
    index::sample(rng, pool.len(), amount)
        .into_iter()
        .map(|idx| pool[idx])
        .collect()
}

/// Rows of `table` belonging to a sample drawn from `candidates`.
pub fn sample_trends<R: Rng + ?Sized>(
    table: &CombinedPriceTable,
    candidates: &BTreeSet<TrendId>,
    n: usize,
    rng: &mut R,
) -> CombinedPriceTable {
    let sample_ids = sample_trend_ids(candidates, n, rng);
    table.retain_trends(&sample_ids)
}

/// Groups trend ids by cluster label; `labels[trend_id]` holds a label in `1..=num_clusters`.
pub fn cluster_trend_ids(labels: &[u32], num_clusters: u32) -> Vec<BTreeSet<TrendId>> {
    (1..=num_clusters)
        .map(|cluster| {
            labels
                .iter()
                .enumerate()
                .filter(|(_, label)| **label == cluster)
                .map(|(trend_id, _)| trend_id)
                .collect()
        })
        .collect()
}

pub fn sample_clusters<R: Rng + ?Sized>(
    table: &CombinedPriceTable,
    labels: &[u32],
    num_clusters: u32,
    per_cluster: usize,
    rng: &mut R,
) -> Vec<ClusterSample> {
    cluster_trend_ids(labels, num_clusters)
        .into_iter()
        .zip(1..=num_clusters)
        .map(|(members, cluster)| {
            let sample_ids = sample_trend_ids(&members, per_cluster, rng);
            debug!(
                component = "sampling",
                event = "sampling.cluster",
                cluster,
                members = members.len(),
                sampled = sample_ids.len()
            );
            ClusterSample {
                cluster,
                trends: table.retain_trends(&sample_ids),
                sample_ids,
            }
        })
        .collect()
}
