//! Geothermal heat pump power draw scraped from the Symphony web site.
//!
//! There is no public API. A session is a logged-in cookie jar that has
//! visited the historical data page with the gateway token found on the
//! landing page. Each day's samples are then served as JSON by `fetch.php`.
//! Once the cookie expires the site answers with its HTML login page instead.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{NaiveDate, TimeDelta};
use scraper::Html;
use serde_json::Value;

use crate::aggregate::AggregationRule;
use crate::chunker::Interval;
use crate::config::SourceConfig;
use crate::error::{ConfigError, ConnectionError, ParseError, SourceError};
use crate::model::{RawReading, Session, SourceAdapter, SourceId};

use super::client::{self, endpoint};
use super::html::{looks_like_html, parse_attr_from_html};
use super::local_from_unix;

pub const REQUIRED_FIELDS: &[&str] = &["username", "password"];

const DEFAULT_URL: &str = "https://symphony.mywaterfurnace.com";
const TECH_VIEW_SELECTOR: &str = r#"a[title="AWL Tech View"]"#;
const TIMESTAMP_FIELD: &str = "1";
const WATTS_FIELD: &str = "78";

pub struct HeatPumpAdapter {
    username: String,
    password: String,
    base_url: String,
}

impl HeatPumpAdapter {
    pub fn from_config(config: &SourceConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            username: config.string(SourceId::HeatPump, "username")?,
            password: config.string(SourceId::HeatPump, "password")?,
            base_url: config
                .optional_string("url")
                .unwrap_or_else(|| DEFAULT_URL.to_string()),
        })
    }

    async fn fetch_day(&self, session: &Session, day: NaiveDate) -> Result<Vec<RawReading>, SourceError> {
        let url = format!(
            "{}?json&date={}",
            endpoint(&self.base_url, "fetch.php"),
            day.format("%m-%d-%Y")
        );
        let body = client::fetch_text(session.http.get(url)).await?;

        if looks_like_html(&body) {
            return Err(SourceError::SessionExpired);
        }

        match parse_day(&body) {
            Ok(readings) => Ok(readings),
            Err(e) => {
                tracing::warn!(source = "heat-pump", day = %day, "Ignoring malformed day: {}", e);
                Ok(Vec::new())
            }
        }
    }
}

#[async_trait]
impl SourceAdapter for HeatPumpAdapter {
    fn id(&self) -> SourceId {
        SourceId::HeatPump
    }

    fn default_range(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        (NaiveDate::from_ymd_opt(2016, 10, 31).unwrap_or(today), today)
    }

    fn max_span(&self) -> TimeDelta {
        TimeDelta::days(1)
    }

    /// Starts one day early: each one-day interval fetches its closing day,
    /// so the first requested day is the end of the first interval.
    fn collection_range(&self, start: NaiveDate, end: NaiveDate) -> (NaiveDate, NaiveDate) {
        (start.pred_opt().unwrap_or(start), end)
    }

    async fn establish_session(&self) -> Result<Session, SourceError> {
        let http = client::http_client(true)?;

        tracing::debug!(source = "heat-pump", "Logging in");
        let landing = client::connect_text(
            http.post(endpoint(&self.base_url, "account/login"))
                .form(&[
                    ("op", "login"),
                    ("redirect", "/"),
                    ("emailaddress", self.username.as_str()),
                    ("password", self.password.as_str()),
                ]),
        )
        .await?;

        let token = gateway_token(&landing).map_err(ConnectionError::from)?;
        client::connect_text(http.get(format!(
            "{}{}",
            endpoint(&self.base_url, "dealer/historical-data"),
            token
        )))
        .await?;

        Ok(Session::with_token(http, token))
    }

    async fn fetch_chunk(
        &self,
        session: &Session,
        interval: &Interval<NaiveDate>,
    ) -> Result<Vec<RawReading>, SourceError> {
        tracing::debug!(
            source = "heat-pump",
            gateway = session.token.as_deref().unwrap_or("-"),
            interval = %interval,
            "Fetching historical data"
        );
        let mut readings = Vec::new();
        for day in closing_days(interval) {
            readings.extend(self.fetch_day(session, day).await?);
        }
        Ok(readings)
    }

    fn aggregation_rule(&self) -> AggregationRule {
        AggregationRule::TimeWeightedPower
    }
}

/// Days `(start, end]`, or just `end` for a zero-width interval.
fn closing_days(interval: &Interval<NaiveDate>) -> Vec<NaiveDate> {
    if interval.start >= interval.end {
        return vec![interval.end];
    }
    interval
        .start
        .iter_days()
        .skip(1)
        .take_while(|day| *day <= interval.end)
        .collect()
}

/// The gateway token is the Tech View link's href without its leading `/`.
fn gateway_token(landing: &str) -> Result<String, ParseError> {
    let document = Html::parse_document(landing);
    let href = parse_attr_from_html(&document, TECH_VIEW_SELECTOR, "href")?;
    Ok(href.strip_prefix('/').unwrap_or(&href).to_string())
}

/// Parses one day of samples. Rows without a timestamp or wattage are skipped.
pub fn parse_day(body: &str) -> Result<Vec<RawReading>, ParseError> {
    let rows: Vec<HashMap<String, Value>> = serde_json::from_str(body)?;

    let mut readings = Vec::with_capacity(rows.len());
    for row in rows {
        let (Some(seconds), Some(watts)) = (
            row.get(TIMESTAMP_FIELD).and_then(number),
            row.get(WATTS_FIELD).and_then(number),
        ) else {
            continue;
        };
        readings.push(RawReading::new(local_from_unix(seconds as i64)?, watts));
    }
    Ok(readings)
}

/// Symphony serialises every field as a string.
fn number(value: &Value) -> Option<f64> {
    match value {
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}
