//! Turnip price-trend pipeline.
//!
//! Current implemented scope:
//! - weekly half-open date windows over the `sell_data` store
//! - all-or-nothing completeness filtering per (user, island) pair
//! - weekday slot labeling, pivoting and cross-week trend combination
//! - spreadsheet export preprocessing
//! - trend sampling and plotting-friendly exports

mod combine;
mod completeness;
mod config;
mod export;
mod observability;
mod observation;
mod pipeline;
mod pivot;
mod preprocess;
mod sampling;
mod source;
#[cfg(test)]
mod test_support;
mod window;

pub use combine::{combine, combine_matrices, CombinedPriceRow, CombinedPriceTable, TrendId};
pub use completeness::drop_incomplete;
pub use config::{pipeline_config_from_env, PipelineConfig};
pub use export::{
    plot_points, trend_plot_points, write_combined_csv, write_combined_json, write_plot_points,
    ExportError, PlotPoint,
};
pub use observability::{
    init_logging, log_pipeline_start, logging_config_from_env, LogFormat, LoggingConfig,
    LoggingInitError,
};
pub use observation::{
    label, label_observations, LabeledObservation, Meridiem, Observation, SlotParseError,
    WeekdaySlot, SELLING_SLOTS,
};
pub use pipeline::{
    load_transform_combine, load_transform_combine_concurrent, load_week, transform_week,
    PipelineError,
};
pub use pivot::{pivot_by_pair, pivot_combined, pivot_week, PriceMatrix, WideTable};
pub use preprocess::{
    coerce_price, coerce_prices, dedup_identity, filter_valid_identity, preprocess,
    preprocess_table, read_raw_export, select_columns, IdentifiedRow, PreprocessError,
    PreprocessedRecord, RawTable, SchemaError, SelectedRow, BUY_PRICE_COLUMN, ISLAND_NAME_COLUMN,
    PLAYER_NAME_COLUMN, SELL_PRICE_COLUMNS,
};
pub use sampling::{
    cluster_trend_ids, sample_clusters, sample_trend_ids, sample_trends, ClusterSample,
};
pub use source::{DataSourceError, InMemorySellSource, SellDataSource, SqliteSellStore};
pub use window::{DateWindower, WeekWindow, WindowError, DEFAULT_EPOCH};
