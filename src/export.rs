//! Joins per-source daily aggregates by date into one CSV report.

use std::collections::BTreeMap;
use std::io::Write;

use chrono::NaiveDate;

use crate::aggregate::Aggregator;
use crate::error::{ExportError, StoreError};
use crate::model::SourceId;
use crate::sources;
use crate::store::Store;

/// One calendar day of the report; `None` marks a day without an aggregate.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub day: NaiveDate,
    pub values: Vec<Option<f64>>,
}

/// Daily aggregates of several sources, outer-joined on the day.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub sources: Vec<SourceId>,
    pub rows: Vec<Row>,
}

impl Table {
    /// Builds one row for every day of the span.
    ///
    /// The span is the union of the days present in `columns`; an explicit
    /// `start` or `end` replaces that side. A day missing from a column stays
    /// empty rather than becoming zero.
    pub fn outer_join(
        sources: Vec<SourceId>,
        columns: &[BTreeMap<NaiveDate, f64>],
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Self {
        let first = columns.iter().filter_map(|c| c.keys().next()).min().copied();
        let last = columns.iter().filter_map(|c| c.keys().next_back()).max().copied();

        let rows = match (start.or(first), end.or(last)) {
            (Some(start), Some(end)) => start
                .iter_days()
                .take_while(|day| *day <= end)
                .map(|day| Row {
                    day,
                    values: columns.iter().map(|c| c.get(&day).copied()).collect(),
                })
                .collect(),
            _ => Vec::new(),
        };

        Self { sources, rows }
    }

    /// Writes the table as CSV with a `date` column followed by one column
    /// per source.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), ExportError> {
        let mut csv = csv::Writer::from_writer(writer);

        let mut header = vec!["date".to_string()];
        header.extend(self.sources.iter().map(|s| s.to_string()));
        csv.write_record(&header)?;

        for row in &self.rows {
            let mut record = vec![row.day.format("%Y-%m-%d").to_string()];
            record.extend(
                row.values
                    .iter()
                    .map(|v| v.map(|v| v.to_string()).unwrap_or_default()),
            );
            csv.write_record(&record)?;
        }

        csv.flush().map_err(csv::Error::from)?;
        Ok(())
    }
}

/// Reads cached aggregates out of the store for export.
pub struct Exporter {
    store: Store,
}

impl Exporter {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Rebuilds each source's daily cache from its raw rows, then joins the
    /// caches into a [`Table`].
    pub async fn table(
        &self,
        ids: &[SourceId],
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Table, StoreError> {
        let aggregator = Aggregator::new(self.store.clone());
        let mut columns = Vec::with_capacity(ids.len());

        for id in ids {
            self.store.ensure_source(*id).await?;
            let refreshed = aggregator.refresh(*id, sources::descriptor(*id).rule).await?;
            tracing::debug!(source = %id, days = refreshed.len(), "Refreshed aggregates for export");

            columns.push(self.store.aggregates(*id).await?);
        }

        Ok(Table::outer_join(ids.to_vec(), &columns, start, end))
    }

    /// Writes the joined table to `writer`, returning the number of rows.
    pub async fn export<W: Write>(
        &self,
        ids: &[SourceId],
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        writer: W,
    ) -> Result<usize, ExportError> {
        let table = self.table(ids, start, end).await?;
        table.write_csv(writer)?;
        Ok(table.rows.len())
    }
}
