//! Built-in data sources and the static registry that constructs them.
//!
//! Each source is registered once with its identifier, a one-line summary,
//! the configuration fields it requires and a factory. Building a source
//! validates its configuration table; no network access happens until the
//! collector asks the adapter for a session.

pub mod client;
pub mod heat_pump;
pub mod html;
pub mod pepco;
pub mod solar;
pub mod weather;

use chrono::{DateTime, Local, NaiveDateTime};

use crate::aggregate::AggregationRule;
use crate::config::{Settings, SourceConfig};
use crate::error::{ConfigError, ParseError};
use crate::model::{SourceAdapter, SourceId, Unit};

pub use heat_pump::HeatPumpAdapter;
pub use pepco::PepcoAdapter;
pub use solar::SolarAdapter;
pub use weather::WeatherAdapter;

type Factory = fn(&SourceConfig) -> Result<Box<dyn SourceAdapter>, ConfigError>;

/// Compile-time registration of one source.
pub struct SourceDescriptor {
    pub id: SourceId,
    pub summary: &'static str,
    pub required_fields: &'static [&'static str],
    /// How raw readings fold into the daily cache
    pub rule: AggregationRule,
    /// Unit of the daily aggregate
    pub unit: Unit,
    factory: Factory,
}

impl SourceDescriptor {
    /// Checks the required fields, then constructs the adapter.
    pub fn build(&self, config: &SourceConfig) -> Result<Box<dyn SourceAdapter>, ConfigError> {
        config.require(self.id, self.required_fields)?;
        (self.factory)(config)
    }
}

pub static REGISTRY: [SourceDescriptor; 4] = [
    SourceDescriptor {
        id: SourceId::Pepco,
        summary: "Utility meter usage from downloaded Green Button XML files",
        required_fields: pepco::REQUIRED_FIELDS,
        rule: AggregationRule::Sum,
        unit: Unit::Kwh,
        factory: build_pepco,
    },
    SourceDescriptor {
        id: SourceId::Solar,
        summary: "Solar generation from the SolarEdge monitoring API",
        required_fields: solar::REQUIRED_FIELDS,
        rule: AggregationRule::Sum,
        unit: Unit::Kwh,
        factory: build_solar,
    },
    SourceDescriptor {
        id: SourceId::Weather,
        summary: "Daily maximum temperature from NOAA weather stations",
        required_fields: weather::REQUIRED_FIELDS,
        rule: AggregationRule::Average,
        unit: Unit::Fahrenheit,
        factory: build_weather,
    },
    SourceDescriptor {
        id: SourceId::HeatPump,
        summary: "Geothermal heat pump power draw scraped from Symphony",
        required_fields: heat_pump::REQUIRED_FIELDS,
        rule: AggregationRule::TimeWeightedPower,
        unit: Unit::Kwh,
        factory: build_heat_pump,
    },
];

pub fn descriptor(id: SourceId) -> &'static SourceDescriptor {
    let index = match id {
        SourceId::Pepco => 0,
        SourceId::Solar => 1,
        SourceId::Weather => 2,
        SourceId::HeatPump => 3,
    };
    &REGISTRY[index]
}

fn build_pepco(config: &SourceConfig) -> Result<Box<dyn SourceAdapter>, ConfigError> {
    Ok(Box::new(PepcoAdapter::from_config(config)?))
}

fn build_solar(config: &SourceConfig) -> Result<Box<dyn SourceAdapter>, ConfigError> {
    Ok(Box::new(SolarAdapter::from_config(config)?))
}

fn build_weather(config: &SourceConfig) -> Result<Box<dyn SourceAdapter>, ConfigError> {
    Ok(Box::new(WeatherAdapter::from_config(config)?))
}

fn build_heat_pump(config: &SourceConfig) -> Result<Box<dyn SourceAdapter>, ConfigError> {
    Ok(Box::new(HeatPumpAdapter::from_config(config)?))
}

/// Validates and constructs the adapters for `ids`.
///
/// Every selected source is validated before any adapter is returned, so one
/// misconfigured source aborts the run before side effects occur.
pub fn build_all(
    ids: &[SourceId],
    settings: &Settings,
) -> Result<Vec<Box<dyn SourceAdapter>>, ConfigError> {
    ids.iter()
        .map(|id| {
            let config = settings.source(*id)?;
            descriptor(*id).build(config)
        })
        .collect()
}

/// Converts a provider's Unix timestamp into local wall-clock time.
pub fn local_from_unix(seconds: i64) -> Result<NaiveDateTime, ParseError> {
    DateTime::from_timestamp(seconds, 0)
        .map(|utc| utc.with_timezone(&Local).naive_local())
        .ok_or_else(|| ParseError::datetime_parse(seconds.to_string(), "timestamp out of range"))
}
