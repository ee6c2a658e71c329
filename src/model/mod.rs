//! Core data model shared by adapters, the store and the aggregator.
//!
//! This module provides the reading and aggregate records, source
//! identifiers, and the capability trait every source adapter implements.

pub mod reading;
pub mod traits;
pub mod types;

// Re-export commonly used items at the module level
pub use reading::{DailyAggregate, RawReading};
pub use traits::{Session, SourceAdapter, WindowPolicy};
pub use types::{SourceId, Unit};

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    mod succeeds {
        use super::*;

        #[test]
        fn test_source_id_display() {
            assert_eq!(SourceId::Pepco.to_string(), "pepco");
            assert_eq!(SourceId::Solar.to_string(), "solar");
            assert_eq!(SourceId::Weather.to_string(), "weather");
            assert_eq!(SourceId::HeatPump.to_string(), "heat-pump");
        }

        #[test]
        fn test_source_id_parse_accepts_aliases() {
            assert_eq!("heat-pump".parse::<SourceId>().unwrap(), SourceId::HeatPump);
            assert_eq!("gshp".parse::<SourceId>().unwrap(), SourceId::HeatPump);
            assert_eq!("solar".parse::<SourceId>().unwrap(), SourceId::Solar);
        }

        #[test]
        fn test_table_prefix_is_sql_identifier() {
            for id in SourceId::ALL {
                assert!(id
                    .table_prefix()
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c == '_'));
            }
        }

        #[test]
        fn test_unit_display() {
            assert_eq!(Unit::Kwh.to_string(), "kWh");
            assert_eq!(Unit::Fahrenheit.to_string(), "°F");
        }

        #[test]
        fn test_reading_day() {
            let ts = NaiveDate::from_ymd_opt(2019, 7, 12)
                .unwrap()
                .and_hms_opt(23, 59, 0)
                .unwrap();
            let reading = RawReading::tagged(ts, 80.0, "GHCND:USW00093721");

            assert_eq!(reading.day(), NaiveDate::from_ymd_opt(2019, 7, 12).unwrap());
            assert_eq!(reading.tag.as_deref(), Some("GHCND:USW00093721"));
        }
    }

    mod fails {
        use super::*;

        #[test]
        fn test_unknown_source_id() {
            let err = "tesla".parse::<SourceId>().unwrap_err();
            assert_eq!(err.to_string(), "unknown source: tesla");
        }
    }
}
