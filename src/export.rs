//! Long-format `{x, y, group}` rows and writers for external plotting tools.

use std::io::Write;

use serde::Serialize;
use thiserror::Error;

use crate::combine::CombinedPriceTable;
use crate::observation::Observation;

const X_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlotPoint {
    pub x: String,
    pub y: Option<f64>,
    pub group: Option<String>,
}

/// Date-vs-price points; `per_group` keeps one series per (user, island) pair.
pub fn plot_points(observations: &[Observation], per_group: bool) -> Vec<PlotPoint> {
    observations
        .iter()
        .map(|observation| PlotPoint {
            x: observation
                .datetime_observed
                .format(X_TIMESTAMP_FORMAT)
                .to_string(),
            y: observation.price,
            group: per_group
                .then(|| format!("({}, {})", observation.user_id, observation.island_id)),
        })
        .collect()
}

/// Slot-vs-price points, one series per trend.
pub fn trend_plot_points(table: &CombinedPriceTable) -> Vec<PlotPoint> {
    table
        .rows
        .iter()
        .map(|row| PlotPoint {
            x: row.weekday_slot.to_string(),
            y: row.price,
            group: Some(row.trend_id.to_string()),
        })
        .collect()
}

pub fn write_plot_points<W: Write>(points: &[PlotPoint], writer: W) -> Result<(), ExportError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for point in points {
        csv_writer.serialize(point)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Writes `trend_id,weekday_observed,price` rows in table order.
pub fn write_combined_csv<W: Write>(
    table: &CombinedPriceTable,
    writer: W,
) -> Result<(), ExportError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for row in &table.rows {
        csv_writer.serialize(row)?;
    }
    csv_writer.flush()?;
    Ok(())
}

pub fn write_combined_json<W: Write>(
    table: &CombinedPriceTable,
    writer: W,
) -> Result<(), ExportError> {
    serde_json::to_writer_pretty(writer, table)?;
    Ok(())
}
