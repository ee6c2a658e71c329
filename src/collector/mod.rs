//! Drives each selected source from session setup to committed readings.
//!
//! Per source the collector walks `Connecting → Chunking → Collecting →
//! Committing` for every interval and ends in `Done` or `Failed`. Each
//! interval is committed in its own store transaction before the next one is
//! fetched, so an interrupted or failed run keeps everything up to the last
//! committed interval and can simply be run again.
//!
//! Sources run concurrently on the calling task; intervals within a source
//! are strictly sequential.

pub mod progress;
pub mod retry;

use std::fmt;

use chrono::NaiveDate;
use futures::future::join_all;
use tokio_util::sync::CancellationToken;

use crate::aggregate::Aggregator;
use crate::chunker::{chunk, Interval};
use crate::error::{SourceError, StoreError};
use crate::model::{RawReading, Session, SourceAdapter, SourceId, WindowPolicy};
use crate::store::Store;

pub use progress::{LogProgress, Progress};
pub use retry::RetryPolicy;

/// Where a source is in its collection run.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum CollectorState {
    Idle,
    Connecting,
    Chunking,
    Collecting,
    Committing,
    Done,
    Failed,
}

impl fmt::Display for CollectorState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            CollectorState::Idle => "idle",
            CollectorState::Connecting => "connecting",
            CollectorState::Chunking => "chunking",
            CollectorState::Collecting => "collecting",
            CollectorState::Committing => "committing",
            CollectorState::Done => "done",
            CollectorState::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// How a source's run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Completed,
    /// Stopped between intervals on request
    Cancelled,
    /// Gave up; committed data is kept
    Failed(String),
}

/// Summary of one source's run.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceReport {
    pub source: SourceId,
    pub outcome: Outcome,
    /// Intervals committed
    pub chunks: usize,
    /// Readings that were not already stored
    pub inserted: usize,
    /// End of the last committed interval
    pub committed_through: Option<NaiveDate>,
}

impl SourceReport {
    fn new(source: SourceId) -> Self {
        Self {
            source,
            outcome: Outcome::Completed,
            chunks: 0,
            inserted: 0,
            committed_through: None,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, Outcome::Failed(_))
    }
}

impl fmt::Display for SourceReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let through = self
            .committed_through
            .map(|day| day.to_string())
            .unwrap_or_else(|| "-".to_string());
        match &self.outcome {
            Outcome::Completed => write!(
                f,
                "{}: completed, {} chunks, {} new readings, through {}",
                self.source, self.chunks, self.inserted, through
            ),
            Outcome::Cancelled => write!(
                f,
                "{}: cancelled after {} chunks, {} new readings, through {}",
                self.source, self.chunks, self.inserted, through
            ),
            Outcome::Failed(error) => write!(
                f,
                "{}: FAILED after {} chunks ({} new readings, through {}): {}",
                self.source, self.chunks, self.inserted, through, error
            ),
        }
    }
}

/// Optional explicit bounds; missing sides use the source's defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RangeRequest {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl RangeRequest {
    pub fn resolve(&self, adapter: &dyn SourceAdapter, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        let (default_start, default_end) = adapter.default_range(today);
        (
            self.start.unwrap_or(default_start),
            self.end.unwrap_or(default_end),
        )
    }
}

pub struct Collector {
    store: Store,
    policy: RetryPolicy,
    cancel: CancellationToken,
}

impl Collector {
    pub fn new(store: Store, policy: RetryPolicy, cancel: CancellationToken) -> Self {
        Self {
            store,
            policy,
            cancel,
        }
    }

    /// Collects every adapter concurrently. One report per adapter, in order.
    pub async fn collect_all(
        &self,
        adapters: &[Box<dyn SourceAdapter>],
        request: RangeRequest,
        today: NaiveDate,
    ) -> Vec<SourceReport> {
        join_all(adapters.iter().map(|adapter| async move {
            let mut progress = LogProgress::new(adapter.id());
            self.collect_source(adapter.as_ref(), request, today, &mut progress)
                .await
        }))
        .await
    }

    /// Runs one source to completion, cancellation or failure.
    pub async fn collect_source(
        &self,
        adapter: &dyn SourceAdapter,
        request: RangeRequest,
        today: NaiveDate,
        progress: &mut dyn Progress,
    ) -> SourceReport {
        let mut run = SourceRun::new(adapter.id(), progress);
        let (start, end) = request.resolve(adapter, today);
        let (start, end) = adapter.collection_range(start, end);

        if let Err(e) = self.store.ensure_source(adapter.id()).await {
            return run.fail(e);
        }
        if self.cancel.is_cancelled() {
            return run.cancel();
        }

        run.transition(CollectorState::Connecting);
        let mut session = match self.connect(adapter).await {
            Ok(session) => session,
            Err(e) => return run.fail(e),
        };

        run.transition(CollectorState::Chunking);
        let chunks = chunk(start, end, adapter.max_span());
        run.progress.set_max(chunks.clone().count());
        tracing::info!(source = %adapter.id(), "Collecting from {} to {}", start, end);

        for interval in chunks {
            if self.cancel.is_cancelled() {
                self.refresh_aggregates(adapter, start, &run.report).await;
                return run.cancel();
            }

            run.transition(CollectorState::Collecting);
            let readings = match self.fetch_with_retry(adapter, &mut session, &interval).await {
                Ok(readings) => readings,
                Err(e) => {
                    self.refresh_aggregates(adapter, start, &run.report).await;
                    return run.fail(e);
                }
            };

            run.transition(CollectorState::Committing);
            let window = match adapter.window_policy() {
                WindowPolicy::Append => None,
                WindowPolicy::ReplaceWindow => Some((interval.start, interval.end)),
            };
            match self.store.insert_readings(adapter.id(), readings, window).await {
                Ok(inserted) => run.committed(&interval, inserted),
                Err(e) => {
                    self.refresh_aggregates(adapter, start, &run.report).await;
                    return run.fail(e);
                }
            }
        }

        if let Err(e) = self.aggregate(adapter, start, &run.report).await {
            return run.fail(e);
        }
        run.done()
    }

    async fn connect(&self, adapter: &dyn SourceAdapter) -> Result<Session, SourceError> {
        self.policy
            .run(adapter.id(), "establish session", || adapter.establish_session())
            .await
    }

    /// Fetches one interval, retrying on the same session. An expired session
    /// is re-established and counts as an attempt.
    async fn fetch_with_retry(
        &self,
        adapter: &dyn SourceAdapter,
        session: &mut Session,
        interval: &Interval<NaiveDate>,
    ) -> Result<Vec<RawReading>, SourceError> {
        let mut attempt = 1;
        loop {
            let error = match adapter.fetch_chunk(session, interval).await {
                Ok(readings) => return Ok(readings),
                Err(SourceError::SessionExpired) => {
                    tracing::warn!(source = %adapter.id(), interval = %interval, "Session expired, logging in again");
                    match self.connect(adapter).await {
                        Ok(fresh) => {
                            *session = fresh;
                            SourceError::SessionExpired
                        }
                        Err(e) => return Err(e),
                    }
                }
                Err(e) => e,
            };

            if attempt >= self.policy.max_attempts() {
                return Err(error);
            }
            tracing::warn!(
                source = %adapter.id(),
                interval = %interval,
                attempt,
                error = %error,
                "Failed to fetch chunk, retrying in {:?}",
                self.policy.delay
            );
            if !matches!(error, SourceError::SessionExpired) {
                self.policy.pause().await;
            }
            attempt += 1;
        }
    }

    /// Re-aggregates the days this run committed.
    async fn aggregate(
        &self,
        adapter: &dyn SourceAdapter,
        start: NaiveDate,
        report: &SourceReport,
    ) -> Result<(), StoreError> {
        if let Some(through) = report.committed_through {
            Aggregator::new(self.store.clone())
                .aggregate_range(adapter.id(), adapter.aggregation_rule(), start, through)
                .await?;
        }
        Ok(())
    }

    /// Best-effort aggregation before an early exit; the exit reason wins.
    async fn refresh_aggregates(&self, adapter: &dyn SourceAdapter, start: NaiveDate, report: &SourceReport) {
        if let Err(e) = self.aggregate(adapter, start, report).await {
            tracing::error!(source = %adapter.id(), "Failed to refresh daily aggregates: {}", e);
        }
    }
}

/// Mutable state of one source's run.
struct SourceRun<'a> {
    state: CollectorState,
    report: SourceReport,
    progress: &'a mut dyn Progress,
}

impl<'a> SourceRun<'a> {
    fn new(source: SourceId, progress: &'a mut dyn Progress) -> Self {
        Self {
            state: CollectorState::Idle,
            report: SourceReport::new(source),
            progress,
        }
    }

    fn transition(&mut self, next: CollectorState) {
        if self.state != next {
            tracing::debug!(source = %self.report.source, "{} -> {}", self.state, next);
            self.state = next;
            self.progress.set_status(&next.to_string());
        }
    }

    fn committed(&mut self, interval: &Interval<NaiveDate>, inserted: usize) {
        self.report.chunks += 1;
        self.report.inserted += inserted;
        self.report.committed_through = Some(interval.end);
        self.progress.set_progress(self.report.chunks);
        tracing::debug!(source = %self.report.source, interval = %interval, inserted, "Committed chunk");
    }

    fn done(mut self) -> SourceReport {
        self.transition(CollectorState::Done);
        self.report
    }

    fn cancel(mut self) -> SourceReport {
        tracing::info!(source = %self.report.source, "Stop requested, ending after last committed chunk");
        self.report.outcome = Outcome::Cancelled;
        self.transition(CollectorState::Done);
        self.report
    }

    fn fail(mut self, error: impl fmt::Display) -> SourceReport {
        tracing::error!(
            source = %self.report.source,
            state = %self.state,
            "Collection failed: {}",
            error
        );
        self.report.outcome = Outcome::Failed(error.to_string());
        self.transition(CollectorState::Failed);
        self.report
    }
}
