//! Sell-price observation sources: the query contract plus SQLite and in-memory backings.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::NaiveDateTime;
use rusqlite::{params, Connection, ErrorCode};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::observation::Observation;
use crate::window::WeekWindow;

const TIMESTAMP_WRITE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const TIMESTAMP_READ_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];
const PROGRESS_HANDLER_OPS: i32 = 1_000;

#[derive(Debug, Error)]
pub enum DataSourceError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("query exceeded timeout of {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    #[error("invalid datetime_observed value '{value}'")]
    InvalidTimestamp { value: String },
}

impl DataSourceError {
    /// Whether the same query may succeed if issued again.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Sqlite(err) => matches!(
                err.sqlite_error_code(),
                Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
            ),
            Self::InvalidTimestamp { .. } => false,
        }
    }
}

/// Returns every observation with `window.lower <= datetime_observed < window.upper`.
pub trait SellDataSource {
    fn fetch_window(&self, window: &WeekWindow) -> Result<Vec<Observation>, DataSourceError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqliteSellStore {
    path: PathBuf,
    query_timeout: Duration,
}

impl SqliteSellStore {
    pub fn new(path: impl Into<PathBuf>, query_timeout: Duration) -> Self {
        Self {
            path: path.into(),
            query_timeout,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn create_schema(&self) -> Result<(), DataSourceError> {
        let conn = Connection::open(&self.path)?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS sell_data (
                user_id INTEGER NOT NULL,
                island_id INTEGER NOT NULL,
                datetime_observed TEXT NOT NULL,
                price REAL
            );
            CREATE INDEX IF NOT EXISTS sell_data_observed_idx
                ON sell_data (datetime_observed);
            ",
        )?;
        Ok(())
    }

    pub fn insert_observations(&self, observations: &[Observation]) -> Result<usize, DataSourceError> {
        let mut conn = Connection::open(&self.path)?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "
                INSERT INTO sell_data (user_id, island_id, datetime_observed, price)
                VALUES (?1, ?2, ?3, ?4)
                ",
            )?;
            for observation in observations {
                stmt.execute(params![
                    observation.user_id,
                    observation.island_id,
                    observation
                        .datetime_observed
                        .format(TIMESTAMP_WRITE_FORMAT)
                        .to_string(),
                    observation.price
                ])?;
            }
        }
        tx.commit()?;

        debug!(
            component = "sell_store",
            event = "sell_store.insert",
            path = %self.path.display(),
            rows = observations.len()
        );
        Ok(observations.len())
    }

    fn open_with_deadline(&self) -> Result<Connection, DataSourceError> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(self.query_timeout)?;
        let deadline = Instant::now() + self.query_timeout;
        conn.progress_handler(PROGRESS_HANDLER_OPS, Some(move || Instant::now() >= deadline));
        Ok(conn)
    }

    fn map_query_error(&self, err: rusqlite::Error) -> DataSourceError {
        if err.sqlite_error_code() == Some(ErrorCode::OperationInterrupted) {
            DataSourceError::Timeout {
                timeout_ms: u64::try_from(self.query_timeout.as_millis()).unwrap_or(u64::MAX),
            }
        } else {
            DataSourceError::Sqlite(err)
        }
    }
}

impl SellDataSource for SqliteSellStore {
    fn fetch_window(&self, window: &WeekWindow) -> Result<Vec<Observation>, DataSourceError> {
        let conn = self.open_with_deadline()?;
        let query = || -> Result<Vec<(i64, i64, String, Option<f64>)>, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "
                SELECT
                    user_id,
                    island_id,
                    datetime_observed,
                    price
                FROM sell_data
                WHERE datetime_observed >= ?1
                  AND datetime_observed < ?2
                ORDER BY datetime_observed ASC, user_id ASC, island_id ASC
                ",
            )?;
            let rows = stmt.query_map(params![window.lower_bound(), window.upper_bound()], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })?;
            let collected = rows.collect();
            collected
        };

        let raw = query().map_err(|err| self.map_query_error(err))?;
        let observations = raw
            .into_iter()
            .map(|(user_id, island_id, observed, price)| {
                Ok(Observation {
                    user_id,
                    island_id,
                    datetime_observed: parse_timestamp(&observed)?,
                    price,
                })
            })
            .collect::<Result<Vec<_>, DataSourceError>>();

        match &observations {
            Ok(rows) => info!(
                component = "sell_store",
                event = "sell_store.fetch",
                week_index = window.week_index,
                lower_bound = %window.lower_bound(),
                upper_bound = %window.upper_bound(),
                rows = rows.len()
            ),
            Err(err) => warn!(
                component = "sell_store",
                event = "sell_store.fetch.error",
                week_index = window.week_index,
                error = %err
            ),
        }

        observations
    }
}

/// Fixed observation set, filtered per window exactly like the SQL query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InMemorySellSource {
    observations: Vec<Observation>,
}

impl InMemorySellSource {
    pub fn new(observations: Vec<Observation>) -> Self {
        Self { observations }
    }
}

impl SellDataSource for InMemorySellSource {
    fn fetch_window(&self, window: &WeekWindow) -> Result<Vec<Observation>, DataSourceError> {
        let mut rows: Vec<Observation> = self
            .observations
            .iter()
            .filter(|observation| window.contains(observation.datetime_observed.date()))
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            (a.datetime_observed, a.user_id, a.island_id).cmp(&(
                b.datetime_observed,
                b.user_id,
                b.island_id,
            ))
        });
        Ok(rows)
    }
}

fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, DataSourceError> {
    let trimmed = raw.trim();
    TIMESTAMP_READ_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        .ok_or_else(|| DataSourceError::InvalidTimestamp {
            value: raw.to_string(),
        })
}
