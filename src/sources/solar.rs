//! Solar generation from the SolarEdge monitoring API.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use serde_derive::Deserialize;

use crate::aggregate::AggregationRule;
use crate::chunker::Interval;
use crate::config::SourceConfig;
use crate::error::{ConfigError, ParseError, SourceError};
use crate::model::{RawReading, Session, SourceAdapter, SourceId, WindowPolicy};

use super::client::{self, endpoint};

pub const REQUIRED_FIELDS: &[&str] = &["api_key", "site_id"];

const DEFAULT_URL: &str = "https://monitoringapi.solaredge.com";
const DATE_FORMAT: &str = "%Y-%m-%d";
const VALUE_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Deserialize, Debug)]
struct EnergyResponse {
    energy: Energy,
}

#[derive(Deserialize, Debug)]
struct Energy {
    #[serde(default)]
    values: Vec<EnergyValue>,
}

#[derive(Deserialize, Debug)]
struct EnergyValue {
    date: String,
    value: Option<f64>,
}

pub struct SolarAdapter {
    api_key: String,
    site_id: String,
    base_url: String,
}

impl SolarAdapter {
    pub fn from_config(config: &SourceConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            api_key: config.string(SourceId::Solar, "api_key")?,
            site_id: config.string(SourceId::Solar, "site_id")?,
            base_url: config
                .optional_string("url")
                .unwrap_or_else(|| DEFAULT_URL.to_string()),
        })
    }
}

#[async_trait]
impl SourceAdapter for SolarAdapter {
    fn id(&self) -> SourceId {
        SourceId::Solar
    }

    fn default_range(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        (NaiveDate::from_ymd_opt(2016, 1, 27).unwrap_or(today), today)
    }

    // quarter-hour data is limited to one month per request
    fn max_span(&self) -> TimeDelta {
        TimeDelta::days(30)
    }

    async fn establish_session(&self) -> Result<Session, SourceError> {
        Ok(Session::new(client::http_client(false)?))
    }

    async fn fetch_chunk(
        &self,
        session: &Session,
        interval: &Interval<NaiveDate>,
    ) -> Result<Vec<RawReading>, SourceError> {
        let url = endpoint(
            &self.base_url,
            &format!("site/{}/energy.json", self.site_id),
        );
        let request = session.http.get(url).query(&[
            ("api_key", self.api_key.clone()),
            ("startDate", interval.start.format(DATE_FORMAT).to_string()),
            ("endDate", interval.end.format(DATE_FORMAT).to_string()),
            ("timeUnit", "QUARTER_OF_AN_HOUR".to_string()),
        ]);
        let body = client::fetch_text(request).await?;

        match parse_energy(&body) {
            Ok(readings) => Ok(readings),
            Err(e) => {
                tracing::warn!(source = "solar", interval = %interval, "Ignoring malformed energy response: {}", e);
                Ok(Vec::new())
            }
        }
    }

    fn aggregation_rule(&self) -> AggregationRule {
        AggregationRule::Sum
    }

    // the inverter reports late; re-collected windows must replace stale zeros
    fn window_policy(&self) -> WindowPolicy {
        WindowPolicy::ReplaceWindow
    }
}

/// Parses an `energy.json` response. Missing values are recorded as 0 Wh.
pub fn parse_energy(body: &str) -> Result<Vec<RawReading>, ParseError> {
    let response: EnergyResponse = serde_json::from_str(body)?;

    response
        .energy
        .values
        .into_iter()
        .map(|v| {
            let timestamp = NaiveDateTime::parse_from_str(&v.date, VALUE_DATE_FORMAT)
                .map_err(|e| ParseError::datetime_parse(&v.date, e))?;
            Ok(RawReading::new(timestamp, v.value.unwrap_or(0.0)))
        })
        .collect()
}
