//! Price observations and the weekday slot labels they are bucketed into.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDateTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One turnip sell-price sighting as stored in `sell_data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub user_id: i64,
    pub island_id: i64,
    pub datetime_observed: NaiveDateTime,
    pub price: Option<f64>,
}

impl Observation {
    pub fn pair(&self) -> (i64, i64) {
        (self.user_id, self.island_id)
    }
}

/// An observation carrying its weekday slot label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledObservation {
    #[serde(flatten)]
    pub observation: Observation,
    pub weekday_slot: WeekdaySlot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Meridiem {
    Am,
    Pm,
}

impl Meridiem {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Am => "AM",
            Self::Pm => "PM",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct WeekdaySlot {
    pub weekday: Weekday,
    pub meridiem: Meridiem,
}

/// The twelve selling sessions of a week, Monday AM through Saturday PM.
pub const SELLING_SLOTS: [WeekdaySlot; 12] = [
    WeekdaySlot::new(Weekday::Mon, Meridiem::Am),
    WeekdaySlot::new(Weekday::Mon, Meridiem::Pm),
    WeekdaySlot::new(Weekday::Tue, Meridiem::Am),
    WeekdaySlot::new(Weekday::Tue, Meridiem::Pm),
    WeekdaySlot::new(Weekday::Wed, Meridiem::Am),
    WeekdaySlot::new(Weekday::Wed, Meridiem::Pm),
    WeekdaySlot::new(Weekday::Thu, Meridiem::Am),
    WeekdaySlot::new(Weekday::Thu, Meridiem::Pm),
    WeekdaySlot::new(Weekday::Fri, Meridiem::Am),
    WeekdaySlot::new(Weekday::Fri, Meridiem::Pm),
    WeekdaySlot::new(Weekday::Sat, Meridiem::Am),
    WeekdaySlot::new(Weekday::Sat, Meridiem::Pm),
];

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid weekday slot label: {0}")]
pub struct SlotParseError(pub String);

impl WeekdaySlot {
    pub const fn new(weekday: Weekday, meridiem: Meridiem) -> Self {
        Self { weekday, meridiem }
    }

    /// Parses the abbreviated spreadsheet header form, e.g. `Mon AM`.
    pub fn from_short_label(label: &str) -> Result<Self, SlotParseError> {
        let (day, meridiem) = split_label(label)?;
        let weekday = match day {
            "Mon" => Weekday::Mon,
            "Tue" => Weekday::Tue,
            "Wed" => Weekday::Wed,
            "Thu" => Weekday::Thu,
            "Fri" => Weekday::Fri,
            "Sat" => Weekday::Sat,
            "Sun" => Weekday::Sun,
            _ => return Err(SlotParseError(label.to_string())),
        };
        Ok(Self::new(weekday, meridiem))
    }

    pub fn short_label(&self) -> String {
        format!("{} {}", self.weekday, self.meridiem.as_str())
    }
}

impl fmt::Display for WeekdaySlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", weekday_name(self.weekday), self.meridiem.as_str())
    }
}

impl FromStr for WeekdaySlot {
    type Err = SlotParseError;

    fn from_str(label: &str) -> Result<Self, Self::Err> {
        let (day, meridiem) = split_label(label)?;
        let weekday = match day {
            "Monday" => Weekday::Mon,
            "Tuesday" => Weekday::Tue,
            "Wednesday" => Weekday::Wed,
            "Thursday" => Weekday::Thu,
            "Friday" => Weekday::Fri,
            "Saturday" => Weekday::Sat,
            "Sunday" => Weekday::Sun,
            _ => return Err(SlotParseError(label.to_string())),
        };
        Ok(Self::new(weekday, meridiem))
    }
}

impl From<WeekdaySlot> for String {
    fn from(slot: WeekdaySlot) -> Self {
        slot.to_string()
    }
}

impl TryFrom<String> for WeekdaySlot {
    type Error = SlotParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Buckets a local timestamp into its weekday and AM/PM half.
pub fn label(ts: NaiveDateTime) -> WeekdaySlot {
    let meridiem = if ts.hour() < 12 {
        Meridiem::Am
    } else {
        Meridiem::Pm
    };
    WeekdaySlot::new(ts.weekday(), meridiem)
}

pub fn label_observations(observations: Vec<Observation>) -> Vec<LabeledObservation> {
    observations
        .into_iter()
        .map(|observation| LabeledObservation {
            weekday_slot: label(observation.datetime_observed),
            observation,
        })
        .collect()
}

fn split_label(label: &str) -> Result<(&str, Meridiem), SlotParseError> {
    let (day, meridiem) = label
        .split_once(' ')
        .ok_or_else(|| SlotParseError(label.to_string()))?;
    let meridiem = match meridiem {
        "AM" => Meridiem::Am,
        "PM" => Meridiem::Pm,
        _ => return Err(SlotParseError(label.to_string())),
    };
    Ok((day, meridiem))
}

fn weekday_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}
