//! Week index to half-open date window arithmetic.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Sunday before the first recorded selling week.
pub const DEFAULT_EPOCH: NaiveDate = match NaiveDate::from_ymd_opt(2020, 4, 12) {
    Some(date) => date,
    None => panic!("default epoch must be a valid calendar date"),
};

const DATE_FORMAT: &str = "%Y-%m-%d";
const DAYS_PER_WEEK: u64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WeekWindow {
    pub week_index: u32,
    pub lower: NaiveDate,
    pub upper: NaiveDate,
}

impl WeekWindow {
    /// Inclusive lower bound as bound into store queries.
    pub fn lower_bound(&self) -> String {
        self.lower.format(DATE_FORMAT).to_string()
    }

    /// Exclusive upper bound as bound into store queries.
    pub fn upper_bound(&self) -> String {
        self.upper.format(DATE_FORMAT).to_string()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.lower <= date && date < self.upper
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WindowError {
    #[error("week index must be >= 1, got {0}")]
    InvalidWeekIndex(u32),
    #[error("week {week_index} falls outside the representable calendar")]
    OutOfRange { week_index: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindower {
    epoch: NaiveDate,
}

impl Default for DateWindower {
    fn default() -> Self {
        Self {
            epoch: DEFAULT_EPOCH,
        }
    }
}

impl DateWindower {
    pub fn new(epoch: NaiveDate) -> Self {
        Self { epoch }
    }

    pub fn epoch(&self) -> NaiveDate {
        self.epoch
    }

    pub fn window_for_week(&self, week_index: u32) -> Result<WeekWindow, WindowError> {
        if week_index == 0 {
            return Err(WindowError::InvalidWeekIndex(week_index));
        }

        let offset = |weeks: u32| {
            self.epoch
                .checked_add_days(Days::new(DAYS_PER_WEEK * u64::from(weeks)))
                .ok_or(WindowError::OutOfRange { week_index })
        };

        Ok(WeekWindow {
            week_index,
            lower: offset(week_index - 1)?,
            upper: offset(week_index)?,
        })
    }
}
