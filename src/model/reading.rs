use chrono::{NaiveDate, NaiveDateTime};

use super::types::SourceId;

/// A single normalised sample from a source.
///
/// Timestamps are local wall-clock times; the calendar day of a reading is
/// simply `timestamp.date()`. Sources with several readings per instant
/// (weather stations) distinguish them with `tag`.
#[derive(Debug, Clone, PartialEq)]
pub struct RawReading {
    pub timestamp: NaiveDateTime,
    pub value: f64,
    pub tag: Option<String>,
}

impl RawReading {
    pub fn new(timestamp: NaiveDateTime, value: f64) -> Self {
        Self {
            timestamp,
            value,
            tag: None,
        }
    }

    pub fn tagged(timestamp: NaiveDateTime, value: f64, tag: impl Into<String>) -> Self {
        Self {
            timestamp,
            value,
            tag: Some(tag.into()),
        }
    }

    /// The calendar day this reading belongs to.
    pub fn day(&self) -> NaiveDate {
        self.timestamp.date()
    }
}

/// One reduced value per source per calendar day.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyAggregate {
    pub source: SourceId,
    pub day: NaiveDate,
    pub value: f64,
}
