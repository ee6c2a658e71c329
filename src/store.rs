//! SQLite persistence for raw readings and cached daily aggregates.
//!
//! Every source owns a `<prefix>_raw` table keyed by `(time, tag)` and a
//! `<prefix>_day` table keyed by `day`. Raw rows are insert-if-absent; a
//! chunk's rows are written in a single transaction so readers never observe
//! half of an interval. The connection lives on its own thread
//! (`tokio-rusqlite`), which serialises writes from concurrently running
//! sources.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::StoreError;
use crate::model::{DailyAggregate, RawReading, SourceId};

const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
const DAY_FORMAT: &str = "%Y-%m-%d";

/// Handle to the local database. Cloning is cheap.
#[derive(Clone)]
pub struct Store {
    conn: tokio_rusqlite::Connection,
}

impl Store {
    /// Opens (or creates) the database at `path`.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = tokio_rusqlite::Connection::open(path).await?;
        conn.call(|conn| {
            conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))?;
            Ok(())
        })
        .await?;
        Ok(Self { conn })
    }

    #[cfg(test)]
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        let conn = tokio_rusqlite::Connection::open_in_memory().await?;
        Ok(Self { conn })
    }

    /// Creates the source's tables if they do not exist yet.
    pub async fn ensure_source(&self, source: SourceId) -> Result<(), StoreError> {
        let prefix = source.table_prefix();
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {prefix}_raw (
                 time  TEXT NOT NULL,
                 tag   TEXT NOT NULL DEFAULT '',
                 value REAL NOT NULL,
                 PRIMARY KEY (time, tag)
             );
             CREATE TABLE IF NOT EXISTS {prefix}_day (
                 day   TEXT PRIMARY KEY,
                 value REAL NOT NULL
             );"
        );

        self.conn
            .call(move |conn| {
                conn.execute_batch(&ddl)?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Persists one chunk of readings atomically and returns how many rows
    /// were new.
    ///
    /// With `replace` set, stored rows whose day falls in the inclusive range
    /// are deleted first, inside the same transaction. An empty chunk never
    /// clears its window: a provider that returned nothing usable has not
    /// revised anything.
    pub async fn insert_readings(
        &self,
        source: SourceId,
        readings: Vec<RawReading>,
        replace: Option<(NaiveDate, NaiveDate)>,
    ) -> Result<usize, StoreError> {
        let prefix = source.table_prefix();
        let rows: Vec<(String, String, f64)> = readings
            .into_iter()
            .map(|r| (encode_time(r.timestamp), r.tag.unwrap_or_default(), r.value))
            .collect();
        let window = replace
            .filter(|_| !rows.is_empty())
            .map(|(start, end)| day_bounds(start, end));

        let inserted = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                if let Some((lower, upper)) = &window {
                    tx.execute(
                        &format!("DELETE FROM {prefix}_raw WHERE time >= ?1 AND time < ?2"),
                        rusqlite::params![lower, upper],
                    )?;
                }

                let mut inserted = 0;
                {
                    let mut stmt = tx.prepare(&format!(
                        "INSERT OR IGNORE INTO {prefix}_raw (time, tag, value) VALUES (?1, ?2, ?3)"
                    ))?;
                    for (time, tag, value) in &rows {
                        inserted += stmt.execute(rusqlite::params![time, tag, value])?;
                    }
                }
                tx.commit()?;
                Ok(inserted)
            })
            .await?;
        Ok(inserted)
    }

    /// Readings for a single day, sorted by time then tag.
    pub async fn readings_for_day(
        &self,
        source: SourceId,
        day: NaiveDate,
    ) -> Result<Vec<RawReading>, StoreError> {
        self.readings_between(source, day, day).await
    }

    /// Readings whose day falls in `[start, end]`, sorted by time then tag.
    pub async fn readings_between(
        &self,
        source: SourceId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawReading>, StoreError> {
        let prefix = source.table_prefix();
        let (lower, upper) = day_bounds(start, end);

        let rows: Vec<(String, String, f64)> = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT time, tag, value FROM {prefix}_raw
                     WHERE time >= ?1 AND time < ?2
                     ORDER BY time, tag"
                ))?;
                let rows = stmt
                    .query_map(rusqlite::params![lower, upper], |row| {
                        Ok((row.get(0)?, row.get(1)?, row.get(2)?))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;

        rows.into_iter()
            .map(|(time, tag, value)| {
                Ok(RawReading {
                    timestamp: decode_time(&time)?,
                    value,
                    tag: if tag.is_empty() { None } else { Some(tag) },
                })
            })
            .collect()
    }

    /// Number of stored raw rows for a source.
    #[cfg(test)]
    pub async fn reading_count(&self, source: SourceId) -> Result<usize, StoreError> {
        let prefix = source.table_prefix();
        let count: i64 = self
            .conn
            .call(move |conn| {
                let count = conn.query_row(&format!("SELECT count(*) FROM {prefix}_raw"), [], |r| {
                    r.get(0)
                })?;
                Ok(count)
            })
            .await?;
        Ok(count as usize)
    }

    /// First and last day with raw readings, if any.
    pub async fn date_span(
        &self,
        source: SourceId,
    ) -> Result<Option<(NaiveDate, NaiveDate)>, StoreError> {
        let prefix = source.table_prefix();
        let (min, max): (Option<String>, Option<String>) = self
            .conn
            .call(move |conn| {
                let span = conn.query_row(
                    &format!("SELECT min(time), max(time) FROM {prefix}_raw"),
                    [],
                    |r| Ok((r.get(0)?, r.get(1)?)),
                )?;
                Ok(span)
            })
            .await?;

        match (min, max) {
            (Some(min), Some(max)) => Ok(Some((
                decode_time(&min)?.date(),
                decode_time(&max)?.date(),
            ))),
            _ => Ok(None),
        }
    }

    /// Upserts cached aggregates; an existing value for a day is overwritten.
    pub async fn put_aggregates(
        &self,
        source: SourceId,
        aggregates: Vec<DailyAggregate>,
    ) -> Result<(), StoreError> {
        let prefix = source.table_prefix();
        let rows: Vec<(String, f64)> = aggregates
            .into_iter()
            .map(|a| (a.day.format(DAY_FORMAT).to_string(), a.value))
            .collect();

        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                {
                    let mut stmt = tx.prepare(&format!(
                        "INSERT OR REPLACE INTO {prefix}_day (day, value) VALUES (?1, ?2)"
                    ))?;
                    for (day, value) in &rows {
                        stmt.execute(rusqlite::params![day, value])?;
                    }
                }
                tx.commit()?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Removes cached aggregates for days in `[start, end]`.
    pub async fn delete_aggregates(
        &self,
        source: SourceId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<(), StoreError> {
        let prefix = source.table_prefix();
        let start = start.format(DAY_FORMAT).to_string();
        let end = end.format(DAY_FORMAT).to_string();

        self.conn
            .call(move |conn| {
                conn.execute(
                    &format!("DELETE FROM {prefix}_day WHERE day >= ?1 AND day <= ?2"),
                    rusqlite::params![start, end],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// All cached aggregates for a source, keyed by day.
    pub async fn aggregates(
        &self,
        source: SourceId,
    ) -> Result<BTreeMap<NaiveDate, f64>, StoreError> {
        let prefix = source.table_prefix();
        let rows: Vec<(String, f64)> = self
            .conn
            .call(move |conn| {
                let mut stmt =
                    conn.prepare(&format!("SELECT day, value FROM {prefix}_day ORDER BY day"))?;
                let rows = stmt
                    .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;

        rows.into_iter()
            .map(|(day, value)| {
                NaiveDate::parse_from_str(&day, DAY_FORMAT)
                    .map(|d| (d, value))
                    .map_err(|e| StoreError::decode(day, e))
            })
            .collect()
    }
}

fn encode_time(timestamp: NaiveDateTime) -> String {
    timestamp.format(TIME_FORMAT).to_string()
}

fn decode_time(text: &str) -> Result<NaiveDateTime, StoreError> {
    NaiveDateTime::parse_from_str(text, TIME_FORMAT).map_err(|e| StoreError::decode(text, e))
}

/// Half-open text bounds `[start 00:00, day after end 00:00)`.
fn day_bounds(start: NaiveDate, end: NaiveDate) -> (String, String) {
    let lower = encode_time(start.and_time(NaiveTime::MIN));
    let upper = match end.succ_opt() {
        Some(next) => encode_time(next.and_time(NaiveTime::MIN)),
        None => "~".to_string(),
    };
    (lower, upper)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::fixtures::{at, day};

    async fn store_with(source: SourceId) -> Store {
        let store = Store::open_in_memory().await.unwrap();
        store.ensure_source(source).await.unwrap();
        store
    }

    mod succeeds {
        use super::*;

        #[tokio::test]
        async fn test_insert_and_read_back_sorted() {
            let store = store_with(SourceId::HeatPump).await;
            let inserted = store
                .insert_readings(
                    SourceId::HeatPump,
                    vec![
                        RawReading::new(at(2019, 7, 12, 6, 0), 2000.0),
                        RawReading::new(at(2019, 7, 12, 0, 0), 1000.0),
                        RawReading::new(at(2019, 7, 13, 0, 0), 500.0),
                    ],
                    None,
                )
                .await
                .unwrap();

            assert_eq!(inserted, 3);
            let readings = store
                .readings_for_day(SourceId::HeatPump, day(2019, 7, 12))
                .await
                .unwrap();
            assert_eq!(
                readings,
                vec![
                    RawReading::new(at(2019, 7, 12, 0, 0), 1000.0),
                    RawReading::new(at(2019, 7, 12, 6, 0), 2000.0),
                ]
            );
        }

        #[tokio::test]
        async fn test_reingest_is_noop() {
            let store = store_with(SourceId::Solar).await;
            let payload = vec![
                RawReading::new(at(2019, 7, 12, 12, 0), 250.0),
                RawReading::new(at(2019, 7, 12, 12, 15), 300.0),
            ];

            store
                .insert_readings(SourceId::Solar, payload.clone(), None)
                .await
                .unwrap();
            let mut changed = payload.clone();
            changed[0].value = 999.0;
            let inserted = store
                .insert_readings(SourceId::Solar, changed, None)
                .await
                .unwrap();

            assert_eq!(inserted, 0);
            assert_eq!(store.reading_count(SourceId::Solar).await.unwrap(), 2);
            let readings = store
                .readings_for_day(SourceId::Solar, day(2019, 7, 12))
                .await
                .unwrap();
            assert_eq!(readings, payload);
        }

        #[tokio::test]
        async fn test_tags_form_part_of_key() {
            let store = store_with(SourceId::Weather).await;
            let ts = at(2019, 7, 12, 0, 0);

            let inserted = store
                .insert_readings(
                    SourceId::Weather,
                    vec![
                        RawReading::tagged(ts, 70.0, "fake1"),
                        RawReading::tagged(ts, 74.0, "fake2"),
                        RawReading::tagged(ts, 99.0, "fake1"),
                    ],
                    None,
                )
                .await
                .unwrap();

            assert_eq!(inserted, 2);
            let readings = store
                .readings_for_day(SourceId::Weather, day(2019, 7, 12))
                .await
                .unwrap();
            assert_eq!(readings[0].tag.as_deref(), Some("fake1"));
            assert_eq!(readings[0].value, 70.0);
        }

        #[tokio::test]
        async fn test_replace_window_overwrites_only_that_window() {
            let store = store_with(SourceId::Solar).await;
            store
                .insert_readings(
                    SourceId::Solar,
                    vec![
                        RawReading::new(at(2019, 7, 11, 12, 0), 100.0),
                        RawReading::new(at(2019, 7, 12, 12, 0), 0.0),
                    ],
                    None,
                )
                .await
                .unwrap();

            store
                .insert_readings(
                    SourceId::Solar,
                    vec![RawReading::new(at(2019, 7, 12, 12, 0), 450.0)],
                    Some((day(2019, 7, 12), day(2019, 7, 12))),
                )
                .await
                .unwrap();

            let readings = store
                .readings_between(SourceId::Solar, day(2019, 7, 11), day(2019, 7, 12))
                .await
                .unwrap();
            assert_eq!(readings.len(), 2);
            assert_eq!(readings[0].value, 100.0);
            assert_eq!(readings[1].value, 450.0);
        }

        #[tokio::test]
        async fn test_empty_chunk_keeps_replace_window() {
            let store = store_with(SourceId::Solar).await;
            store
                .insert_readings(
                    SourceId::Solar,
                    vec![RawReading::new(at(2019, 7, 12, 12, 0), 450.0)],
                    None,
                )
                .await
                .unwrap();

            let inserted = store
                .insert_readings(
                    SourceId::Solar,
                    Vec::new(),
                    Some((day(2019, 7, 12), day(2019, 7, 12))),
                )
                .await
                .unwrap();

            assert_eq!(inserted, 0);
            assert_eq!(store.reading_count(SourceId::Solar).await.unwrap(), 1);
        }

        #[tokio::test]
        async fn test_date_span() {
            let store = store_with(SourceId::Pepco).await;
            store
                .insert_readings(
                    SourceId::Pepco,
                    vec![
                        RawReading::new(at(2019, 7, 3, 23, 0), 1.0),
                        RawReading::new(at(2019, 6, 27, 1, 0), 1.0),
                    ],
                    None,
                )
                .await
                .unwrap();

            let span = store.date_span(SourceId::Pepco).await.unwrap();

            assert_eq!(span, Some((day(2019, 6, 27), day(2019, 7, 3))));
        }

        #[tokio::test]
        async fn test_aggregates_upsert() {
            let store = store_with(SourceId::Pepco).await;
            let aggregate = |value| DailyAggregate {
                source: SourceId::Pepco,
                day: day(2019, 7, 12),
                value,
            };

            store
                .put_aggregates(SourceId::Pepco, vec![aggregate(1.0)])
                .await
                .unwrap();
            store
                .put_aggregates(SourceId::Pepco, vec![aggregate(2.0)])
                .await
                .unwrap();

            let cached = store.aggregates(SourceId::Pepco).await.unwrap();
            assert_eq!(cached.len(), 1);
            assert_eq!(cached[&day(2019, 7, 12)], 2.0);
        }

        #[tokio::test]
        async fn test_sources_are_partitioned() {
            let store = Store::open_in_memory().await.unwrap();
            store.ensure_source(SourceId::Pepco).await.unwrap();
            store.ensure_source(SourceId::Solar).await.unwrap();

            store
                .insert_readings(
                    SourceId::Pepco,
                    vec![RawReading::new(at(2019, 7, 12, 0, 0), 1.0)],
                    None,
                )
                .await
                .unwrap();

            assert_eq!(store.reading_count(SourceId::Pepco).await.unwrap(), 1);
            assert_eq!(store.reading_count(SourceId::Solar).await.unwrap(), 0);
        }

        #[tokio::test]
        async fn test_data_survives_reopen() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("netzero.sqlite3");

            {
                let store = Store::open(&path).await.unwrap();
                store.ensure_source(SourceId::Pepco).await.unwrap();
                store
                    .insert_readings(
                        SourceId::Pepco,
                        vec![RawReading::new(at(2019, 7, 12, 0, 0), 1.0)],
                        None,
                    )
                    .await
                    .unwrap();
            }

            let store = Store::open(&path).await.unwrap();
            store.ensure_source(SourceId::Pepco).await.unwrap();
            let inserted = store
                .insert_readings(
                    SourceId::Pepco,
                    vec![RawReading::new(at(2019, 7, 12, 0, 0), 5.0)],
                    None,
                )
                .await
                .unwrap();
            assert_eq!(inserted, 0);
            assert_eq!(store.reading_count(SourceId::Pepco).await.unwrap(), 1);
        }
    }

    mod fails {
        use super::*;

        #[tokio::test]
        async fn test_empty_source_has_no_span() {
            let store = store_with(SourceId::Weather).await;

            assert_eq!(store.date_span(SourceId::Weather).await.unwrap(), None);
        }

        #[tokio::test]
        async fn test_missing_table_is_an_error() {
            let store = Store::open_in_memory().await.unwrap();

            let result = store.reading_count(SourceId::Weather).await;

            assert!(matches!(result, Err(StoreError::Database(_))));
        }
    }
}
