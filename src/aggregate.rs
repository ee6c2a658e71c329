//! Reduces a day's raw readings to one comparable number per source.
//!
//! Each rule is an explicit fold over readings sorted by timestamp, kept
//! separate from storage so the numeric behaviour can be tested on its own.
//! [`Aggregator`] connects the rules to the store and maintains the
//! `<source>_day` cache.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::StoreError;
use crate::model::{DailyAggregate, RawReading, SourceId};
use crate::store::Store;

/// Source-specific reduction of one day's readings.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum AggregationRule {
    /// Readings are Wh deltas; the day total is reported in kWh.
    Sum,
    /// Readings are independent observations (e.g. one per station).
    Average,
    /// Readings are wattage samples integrated over time into kWh.
    TimeWeightedPower,
}

impl AggregationRule {
    /// Folds readings for a single day into its aggregate value.
    ///
    /// The input order does not matter: readings are sorted by timestamp
    /// (then tag) first. Returns `None` for an empty day.
    pub fn fold(&self, readings: &[RawReading]) -> Option<f64> {
        if readings.is_empty() {
            return None;
        }

        let mut sorted: Vec<&RawReading> = readings.iter().collect();
        sorted.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.tag.cmp(&b.tag))
        });

        let value = match self {
            AggregationRule::Sum => sorted.iter().map(|r| r.value).sum::<f64>() / 1000.0,
            AggregationRule::Average => {
                sorted.iter().map(|r| r.value).sum::<f64>() / sorted.len() as f64
            }
            AggregationRule::TimeWeightedPower => integrate_power(&sorted),
        };

        Some(value)
    }
}

/// Integrates wattage samples into kWh.
///
/// Each sample's wattage is held backward to the previous sample; the first
/// sample of the day is held back to local midnight. Nothing is carried over
/// from the previous day and nothing is extrapolated past the last sample, so
/// gaps and the stretch before midnight are under-counted.
fn integrate_power(sorted: &[&RawReading]) -> f64 {
    let mut energy = 0.0;
    let mut previous: Option<NaiveDateTime> = None;

    for reading in sorted {
        let since = previous.unwrap_or_else(|| midnight(reading.timestamp));
        let hours = (reading.timestamp - since).num_milliseconds() as f64 / 3_600_000.0;

        energy += (reading.value / 1000.0) * hours;
        previous = Some(reading.timestamp);
    }

    energy
}

fn midnight(timestamp: NaiveDateTime) -> NaiveDateTime {
    timestamp.date().and_time(NaiveTime::MIN)
}

/// Computes daily aggregates from stored readings and caches them.
#[derive(Clone)]
pub struct Aggregator {
    store: Store,
}

impl Aggregator {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Aggregates one day and overwrites its cached value.
    ///
    /// Returns `None` when the day has no readings; any stale cache entry for
    /// that day is removed.
    pub async fn aggregate(
        &self,
        source: SourceId,
        rule: AggregationRule,
        day: NaiveDate,
    ) -> Result<Option<DailyAggregate>, StoreError> {
        let readings = self.store.readings_for_day(source, day).await?;

        match rule.fold(&readings) {
            Some(value) => {
                let aggregate = DailyAggregate { source, day, value };
                tracing::debug!(source = %aggregate.source, day = %aggregate.day, value, "Aggregated day");
                self.store.put_aggregates(source, vec![aggregate.clone()]).await?;
                Ok(Some(aggregate))
            }
            None => {
                self.store.delete_aggregates(source, day, day).await?;
                Ok(None)
            }
        }
    }

    /// Re-aggregates every day in `[start, end]` in one store round trip.
    pub async fn aggregate_range(
        &self,
        source: SourceId,
        rule: AggregationRule,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyAggregate>, StoreError> {
        if start > end {
            return Ok(Vec::new());
        }
        if start == end {
            return Ok(self.aggregate(source, rule, start).await?.into_iter().collect());
        }

        let readings = self.store.readings_between(source, start, end).await?;
        let aggregates = fold_by_day(source, rule, readings);

        self.store.delete_aggregates(source, start, end).await?;
        self.store.put_aggregates(source, aggregates.clone()).await?;

        tracing::debug!(
            source = %source,
            days = aggregates.len(),
            "Refreshed daily aggregates from {} to {}",
            start,
            end
        );
        Ok(aggregates)
    }

    /// Rebuilds the whole cache for a source from its raw rows.
    pub async fn refresh(
        &self,
        source: SourceId,
        rule: AggregationRule,
    ) -> Result<Vec<DailyAggregate>, StoreError> {
        match self.store.date_span(source).await? {
            Some((start, end)) => self.aggregate_range(source, rule, start, end).await,
            None => Ok(Vec::new()),
        }
    }
}

/// Groups readings by calendar day and folds each group.
fn fold_by_day(
    source: SourceId,
    rule: AggregationRule,
    readings: Vec<RawReading>,
) -> Vec<DailyAggregate> {
    let mut by_day = std::collections::BTreeMap::<NaiveDate, Vec<RawReading>>::new();
    for reading in readings {
        by_day.entry(reading.day()).or_default().push(reading);
    }

    by_day
        .into_iter()
        .filter_map(|(day, readings)| {
            rule.fold(&readings)
                .map(|value| DailyAggregate { source, day, value })
        })
        .collect()
}
