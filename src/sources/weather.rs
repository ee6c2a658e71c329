//! Daily maximum temperatures from NOAA's Climate Data Online v2 API.
//!
//! One request returns at most 1000 results, one per station per day, so the
//! chunk width shrinks as more stations are configured. Responses larger than
//! one page are followed through `metadata.resultset`.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use serde_derive::Deserialize;

use crate::aggregate::AggregationRule;
use crate::chunker::Interval;
use crate::config::SourceConfig;
use crate::error::{ConfigError, ParseError, SourceError};
use crate::model::{RawReading, Session, SourceAdapter, SourceId};

use super::client::{self, endpoint};

pub const REQUIRED_FIELDS: &[&str] = &["api_key", "stations"];

const DEFAULT_URL: &str = "https://www.ncdc.noaa.gov/cdo-web/api/v2";
const PAGE_LIMIT: usize = 1000;
const MAX_SPAN_DAYS: usize = 365;
const DATE_FORMAT: &str = "%Y-%m-%d";
const RESULT_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Deserialize, Debug, Default)]
struct DataResponse {
    metadata: Option<Metadata>,
    #[serde(default)]
    results: Vec<Observation>,
}

#[derive(Deserialize, Debug)]
struct Metadata {
    resultset: ResultSet,
}

#[derive(Deserialize, Debug)]
struct ResultSet {
    offset: usize,
    count: usize,
    limit: usize,
}

#[derive(Deserialize, Debug)]
struct Observation {
    date: String,
    station: String,
    value: f64,
}

/// One parsed page of results.
#[derive(Debug)]
pub struct Page {
    pub readings: Vec<RawReading>,
    /// Offset of the following page, if the result set continues
    pub next_offset: Option<usize>,
}

pub struct WeatherAdapter {
    api_key: String,
    stations: Vec<String>,
    base_url: String,
}

impl WeatherAdapter {
    pub fn from_config(config: &SourceConfig) -> Result<Self, ConfigError> {
        let stations = config.string_list(SourceId::Weather, "stations")?;
        if stations.is_empty() {
            return Err(ConfigError::invalid("stations", "at least one station is required"));
        }

        Ok(Self {
            api_key: config.string(SourceId::Weather, "api_key")?,
            stations,
            base_url: config
                .optional_string("url")
                .unwrap_or_else(|| DEFAULT_URL.to_string()),
        })
    }

    async fn fetch_page(
        &self,
        session: &Session,
        interval: &Interval<NaiveDate>,
        offset: usize,
    ) -> Result<String, SourceError> {
        let mut request = session
            .http
            .get(endpoint(&self.base_url, "data"))
            .header("token", &self.api_key)
            .query(&[
                ("datasetid", "GHCND".to_string()),
                ("datatypeid", "TMAX".to_string()),
                ("units", "standard".to_string()),
                ("limit", PAGE_LIMIT.to_string()),
                ("offset", offset.to_string()),
                ("startdate", interval.start.format(DATE_FORMAT).to_string()),
                ("enddate", interval.end.format(DATE_FORMAT).to_string()),
            ]);
        for station in &self.stations {
            request = request.query(&[("stationid", station)]);
        }

        Ok(client::fetch_text(request).await?)
    }
}

#[async_trait]
impl SourceAdapter for WeatherAdapter {
    fn id(&self) -> SourceId {
        SourceId::Weather
    }

    fn default_range(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        (NaiveDate::from_ymd_opt(2014, 1, 1).unwrap_or(today), today)
    }

    fn max_span(&self) -> TimeDelta {
        let days = (PAGE_LIMIT / self.stations.len().max(1)).clamp(1, MAX_SPAN_DAYS);
        TimeDelta::days(days as i64)
    }

    async fn establish_session(&self) -> Result<Session, SourceError> {
        Ok(Session::new(client::http_client(false)?))
    }

    async fn fetch_chunk(
        &self,
        session: &Session,
        interval: &Interval<NaiveDate>,
    ) -> Result<Vec<RawReading>, SourceError> {
        let mut readings = Vec::new();
        let mut offset = 1;

        loop {
            let body = self.fetch_page(session, interval, offset).await?;
            match parse_page(&body) {
                Ok(page) => {
                    readings.extend(page.readings);
                    match page.next_offset {
                        Some(next) if next > offset => offset = next,
                        _ => break,
                    }
                }
                Err(e) => {
                    tracing::warn!(source = "weather", interval = %interval, offset, "Ignoring malformed data page: {}", e);
                    break;
                }
            }
        }

        Ok(readings)
    }

    fn aggregation_rule(&self) -> AggregationRule {
        AggregationRule::Average
    }
}

/// Parses one page of `/data` results. An empty object means no data.
pub fn parse_page(body: &str) -> Result<Page, ParseError> {
    let response: DataResponse = serde_json::from_str(body)?;

    let readings = response
        .results
        .into_iter()
        .map(|o| {
            let timestamp = NaiveDateTime::parse_from_str(&o.date, RESULT_DATE_FORMAT)
                .map_err(|e| ParseError::datetime_parse(&o.date, e))?;
            Ok(RawReading::tagged(timestamp, o.value, o.station))
        })
        .collect::<Result<Vec<_>, ParseError>>()?;

    let next_offset = response.metadata.and_then(|m| {
        let next = m.resultset.offset + m.resultset.limit;
        (next <= m.resultset.count).then_some(next)
    });

    Ok(Page {
        readings,
        next_offset,
    })
}
