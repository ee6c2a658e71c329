use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// Identifies one of the built-in data sources.
///
/// The identifier doubles as the configuration table name and, via
/// [`SourceId::table_prefix`], as the prefix of the source's SQLite tables.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum SourceId {
    /// Pepco Green Button exports (power usage)
    Pepco,
    /// SolarEdge monitoring API (solar production)
    Solar,
    /// NOAA daily station data (outdoor temperature)
    Weather,
    /// Symphony ground source heat pump (power draw)
    HeatPump,
}

impl SourceId {
    /// Every built-in source, in export column order.
    pub const ALL: [SourceId; 4] = [
        SourceId::Pepco,
        SourceId::Solar,
        SourceId::Weather,
        SourceId::HeatPump,
    ];

    /// Name used in configuration files and CSV headers.
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceId::Pepco => "pepco",
            SourceId::Solar => "solar",
            SourceId::Weather => "weather",
            SourceId::HeatPump => "heat-pump",
        }
    }

    /// Prefix of the `<prefix>_raw` and `<prefix>_day` tables.
    ///
    /// Always a fixed identifier, never user input, so it is safe to splice
    /// into SQL.
    pub fn table_prefix(&self) -> &'static str {
        match self {
            SourceId::Pepco => "pepco",
            SourceId::Solar => "solar",
            SourceId::Weather => "weather",
            SourceId::HeatPump => "heat_pump",
        }
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceId {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pepco" => Ok(SourceId::Pepco),
            "solar" => Ok(SourceId::Solar),
            "weather" => Ok(SourceId::Weather),
            "heat-pump" | "heat_pump" | "gshp" => Ok(SourceId::HeatPump),
            other => Err(ConfigError::UnknownSource(other.to_string())),
        }
    }
}

/// Units of a source's daily aggregate.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Unit {
    /// Kilowatt-hours (kWh) - for daily energy totals
    Kwh,
    /// Degrees Fahrenheit - for temperatures
    Fahrenheit,
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Unit::Kwh => write!(f, "kWh"),
            Unit::Fahrenheit => write!(f, "°F"),
        }
    }
}
