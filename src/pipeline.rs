//! Weekly load, completeness filter, slot labeling and cross-week combination.

use std::collections::BTreeSet;
use std::sync::Arc;

use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::combine::{combine, CombinedPriceTable};
use crate::completeness::drop_incomplete;
use crate::observation::{label_observations, LabeledObservation, Observation};
use crate::source::{DataSourceError, SellDataSource};
use crate::window::{DateWindower, WindowError};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid week window: {0}")]
    Window(#[from] WindowError),
    #[error("data source failed for week {week_index}: {source}")]
    DataSource {
        week_index: u32,
        #[source]
        source: DataSourceError,
    },
    /// A week's load task died without reporting; `week_index` is the lowest such week.
    #[error("load task failed: {message}")]
    Join {
        week_index: Option<u32>,
        message: String,
    },
}

impl PipelineError {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::DataSource { source, .. } => source.is_retryable(),
            Self::Window(_) | Self::Join { .. } => false,
        }
    }

    pub fn week_index(&self) -> Option<u32> {
        match self {
            Self::DataSource { week_index, .. } => Some(*week_index),
            Self::Join { week_index, .. } => *week_index,
            Self::Window(_) => None,
        }
    }
}

/// Fetches the raw observations of one week window.
pub fn load_week<S: SellDataSource + ?Sized>(
    source: &S,
    windower: &DateWindower,
    week_index: u32,
) -> Result<Vec<Observation>, PipelineError> {
    let window = windower.window_for_week(week_index)?;
    match source.fetch_window(&window) {
        Ok(rows) => {
            info!(
                component = "pipeline",
                event = "pipeline.week.loaded",
                week_index,
                lower_bound = %window.lower_bound(),
                upper_bound = %window.upper_bound(),
                rows = rows.len()
            );
            Ok(rows)
        }
        Err(source) => {
            warn!(
                component = "pipeline",
                event = "pipeline.week.error",
                week_index,
                retryable = source.is_retryable(),
                error = %source
            );
            Err(PipelineError::DataSource { week_index, source })
        }
    }
}

/// Drops incomplete pairs and attaches weekday slot labels.
pub fn transform_week(observations: &[Observation]) -> Vec<LabeledObservation> {
    label_observations(drop_incomplete(observations))
}

/// Runs weeks `1..=num_weeks` in order and combines the surviving trends.
pub fn load_transform_combine<S: SellDataSource + ?Sized>(
    source: &S,
    windower: &DateWindower,
    num_weeks: u32,
) -> Result<CombinedPriceTable, PipelineError> {
    let mut weeks = Vec::with_capacity(num_weeks as usize);
    for week_index in 1..=num_weeks {
        let raw = load_week(source, windower, week_index)?;
        weeks.push(transform_week(&raw));
    }

    Ok(finish(weeks))
}

/// Same result as [`load_transform_combine`], with one blocking query per week in flight.
///
/// Results are re-ordered by week index before combination so trend ids match the
/// sequential run. The first failing week (by index) is reported.
pub async fn load_transform_combine_concurrent<S>(
    source: Arc<S>,
    windower: DateWindower,
    num_weeks: u32,
) -> Result<CombinedPriceTable, PipelineError>
where
    S: SellDataSource + Send + Sync + 'static,
{
    let mut tasks = JoinSet::new();
    for week_index in 1..=num_weeks {
        let source = Arc::clone(&source);
        tasks.spawn_blocking(move || {
            let loaded = load_week(source.as_ref(), &windower, week_index)
                .map(|raw| transform_week(&raw));
            (week_index, loaded)
        });
    }

    let mut pending: BTreeSet<u32> = (1..=num_weeks).collect();
    let mut results = Vec::with_capacity(num_weeks as usize);
    let mut join_failure = None;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((week_index, loaded)) => {
                pending.remove(&week_index);
                results.push((week_index, loaded));
            }
            Err(err) => join_failure = Some(err.to_string()),
        }
    }

    if let Some(message) = join_failure {
        return Err(PipelineError::Join {
            week_index: pending.first().copied(),
            message,
        });
    }

    results.sort_by_key(|(week_index, _)| *week_index);
    let weeks = results
        .into_iter()
        .map(|(_, loaded)| loaded)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(finish(weeks))
}

fn finish(weeks: Vec<Vec<LabeledObservation>>) -> CombinedPriceTable {
    let table = combine(&weeks);
    info!(
        component = "pipeline",
        event = "pipeline.finish",
        weeks = weeks.len(),
        trends = table.trend_count(),
        rows = table.rows.len()
    );
    table
}
