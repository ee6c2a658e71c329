//! Test fixtures and provider payloads.
//!
//! Payload builders produce the exact wire formats each source parses, so
//! adapter tests exercise the real parsers.

use chrono::{Local, NaiveDate, NaiveDateTime};

/// Creates a test date.
pub fn day(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

/// Creates a local wall-clock timestamp.
pub fn at(year: i32, month: u32, d: u32, hour: u32, minute: u32) -> NaiveDateTime {
    day(year, month, d).and_hms_opt(hour, minute, 0).unwrap()
}

/// Unix seconds for a local wall-clock time.
pub fn unix(year: i32, month: u32, d: u32, hour: u32, minute: u32) -> i64 {
    at(year, month, d, hour, minute)
        .and_local_timezone(Local)
        .single()
        .unwrap()
        .timestamp()
}

/// A Green Button feed with one `IntervalBlock` holding `readings`
/// (`(unix start, Wh)`), 15 minutes each.
pub fn green_button_xml(readings: &[(i64, f64)]) -> String {
    let block_start = readings.first().map(|(start, _)| *start).unwrap_or(0);
    let mut xml = format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:espi="http://naesb.org/espi">
  <id>urn:uuid:test-feed</id>
  <title>Green Button Usage Feed</title>
  <entry>
    <title>Meter Reading</title>
    <content>
      <espi:MeterReading/>
    </content>
  </entry>
  <entry>
    <content>
      <espi:IntervalBlock>
        <espi:interval>
          <espi:duration>{}</espi:duration>
          <espi:start>{}</espi:start>
        </espi:interval>
"#,
        readings.len() * 900,
        block_start
    );
    for (start, value) in readings {
        xml.push_str(&format!(
            r#"        <espi:IntervalReading>
          <espi:cost>0</espi:cost>
          <espi:timePeriod>
            <espi:duration>900</espi:duration>
            <espi:start>{}</espi:start>
          </espi:timePeriod>
          <espi:value>{}</espi:value>
        </espi:IntervalReading>
"#,
            start, value
        ));
    }
    xml.push_str(
        r#"      </espi:IntervalBlock>
    </content>
  </entry>
</feed>
"#,
    );
    xml
}

/// A SolarEdge `energy.json` body.
pub fn solar_energy_json(values: &[(&str, Option<f64>)]) -> String {
    let values: Vec<serde_json::Value> = values
        .iter()
        .map(|(date, value)| serde_json::json!({ "date": date, "value": value }))
        .collect();
    serde_json::json!({
        "energy": {
            "timeUnit": "QUARTER_OF_AN_HOUR",
            "unit": "Wh",
            "measuredBy": "INVERTER",
            "values": values,
        }
    })
    .to_string()
}

/// A CDO `/data` page. `results` are `(date, station, value)`.
pub fn weather_data_json(results: &[(&str, &str, f64)], offset: usize, count: usize) -> String {
    let results: Vec<serde_json::Value> = results
        .iter()
        .map(|(date, station, value)| {
            serde_json::json!({
                "date": date,
                "datatype": "TMAX",
                "station": station,
                "attributes": ",,7,",
                "value": value,
            })
        })
        .collect();
    serde_json::json!({
        "metadata": {
            "resultset": { "offset": offset, "count": count, "limit": 1000 }
        },
        "results": results,
    })
    .to_string()
}

/// The page Symphony returns after a successful login.
pub fn symphony_landing_html(tech_view_href: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
  <head><title>Symphony</title></head>
  <body>
    <nav>
      <a href="/account/logout" title="Logout">Logout</a>
      <a href="{}" title="AWL Tech View">Tech View</a>
    </nav>
  </body>
</html>"#,
        tech_view_href
    )
}

/// A `fetch.php?json` body; every field is a string, as the site sends it.
pub fn heat_pump_day_json(samples: &[(i64, f64)]) -> String {
    let rows: Vec<serde_json::Value> = samples
        .iter()
        .map(|(seconds, watts)| {
            serde_json::json!({
                "1": seconds.to_string(),
                "2": "12:00 AM",
                "78": watts.to_string(),
            })
        })
        .collect();
    serde_json::Value::Array(rows).to_string()
}
