//! Utility meter readings from Green Button XML exports.
//!
//! The utility does not offer an API, so the user downloads Green Button
//! files and lists them in the config. Every `IntervalReading` carries a Unix
//! `timePeriod/start` and a `value` in Wh covering that period.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{NaiveDate, TimeDelta};
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::aggregate::AggregationRule;
use crate::chunker::Interval;
use crate::config::SourceConfig;
use crate::error::{ConfigError, FetchError, ParseError, SourceError};
use crate::model::{RawReading, Session, SourceAdapter, SourceId};

use super::{client, local_from_unix};

pub const REQUIRED_FIELDS: &[&str] = &["files"];

pub struct PepcoAdapter {
    files: Vec<PathBuf>,
}

impl PepcoAdapter {
    pub fn from_config(config: &SourceConfig) -> Result<Self, ConfigError> {
        let files = config
            .string_list(SourceId::Pepco, "files")?
            .into_iter()
            .map(PathBuf::from)
            .collect();
        Ok(Self { files })
    }
}

#[async_trait]
impl SourceAdapter for PepcoAdapter {
    fn id(&self) -> SourceId {
        SourceId::Pepco
    }

    fn default_range(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        (NaiveDate::from_ymd_opt(2015, 1, 1).unwrap_or(today), today)
    }

    fn max_span(&self) -> TimeDelta {
        TimeDelta::days(366)
    }

    async fn establish_session(&self) -> Result<Session, SourceError> {
        Ok(Session::new(client::http_client(false)?))
    }

    async fn fetch_chunk(
        &self,
        _session: &Session,
        interval: &Interval<NaiveDate>,
    ) -> Result<Vec<RawReading>, SourceError> {
        let mut readings = Vec::new();

        for path in &self.files {
            let xml = tokio::fs::read_to_string(path)
                .await
                .map_err(|e| FetchError::io(path.display().to_string(), e))?;

            match parse_green_button(&xml) {
                Ok(parsed) => readings.extend(
                    parsed
                        .into_iter()
                        .filter(|r| interval.start <= r.day() && r.day() <= interval.end),
                ),
                Err(e) => {
                    tracing::warn!(source = "pepco", file = %path.display(), "Skipping malformed Green Button file: {}", e)
                }
            }
        }

        Ok(readings)
    }

    fn aggregation_rule(&self) -> AggregationRule {
        AggregationRule::Sum
    }
}

/// Extracts every interval reading from a Green Button document.
pub fn parse_green_button(xml: &str) -> Result<Vec<RawReading>, ParseError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut path: Vec<String> = Vec::new();
    let mut start: Option<i64> = None;
    let mut value: Option<f64> = None;
    let mut readings = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if name == "IntervalReading" {
                    start = None;
                    value = None;
                }
                path.push(name);
            }
            Ok(Event::End(e)) => {
                if e.local_name().as_ref() == b"IntervalReading" {
                    if let (Some(start), Some(value)) = (start.take(), value.take()) {
                        readings.push(RawReading::new(local_from_unix(start)?, value));
                    }
                }
                path.pop();
            }
            Ok(Event::Text(text)) => {
                let text = text.unescape().map_err(|e| ParseError::Xml(e.to_string()))?;
                if ends_with(&path, &["IntervalReading", "timePeriod", "start"]) {
                    start = Some(
                        text.parse::<i64>()
                            .map_err(|e| ParseError::number_parse(&*text, e))?,
                    );
                } else if ends_with(&path, &["IntervalReading", "value"]) {
                    value = Some(
                        text.parse::<f64>()
                            .map_err(|e| ParseError::number_parse(&*text, e))?,
                    );
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ParseError::Xml(e.to_string())),
            _ => {}
        }
    }

    Ok(readings)
}

fn ends_with(path: &[String], tail: &[&str]) -> bool {
    path.len() >= tail.len()
        && path[path.len() - tail.len()..]
            .iter()
            .zip(tail)
            .all(|(name, expected)| name == expected)
}
