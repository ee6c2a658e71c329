//! Mock adapters and progress sinks for collector tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime, TimeDelta};
use tokio_util::sync::CancellationToken;

use crate::aggregate::AggregationRule;
use crate::chunker::Interval;
use crate::collector::Progress;
use crate::error::{ConnectionError, FetchError, SourceError};
use crate::model::{RawReading, Session, SourceAdapter, SourceId};
use crate::sources::client;

/// An adapter that yields one 1000 Wh reading at noon for every day of the
/// requested interval, with configurable failures.
pub struct MockAdapter {
    id: SourceId,
    connect_failures: AtomicUsize,
    fail_from: Option<NaiveDate>,
    expire_once: AtomicBool,
    cancel_after: Option<(CancellationToken, usize)>,
    session_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
    successes: AtomicUsize,
    requested: Mutex<Vec<(NaiveDate, NaiveDate)>>,
}

impl MockAdapter {
    pub fn new(id: SourceId) -> Self {
        Self {
            id,
            connect_failures: AtomicUsize::new(0),
            fail_from: None,
            expire_once: AtomicBool::new(false),
            cancel_after: None,
            session_calls: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
            successes: AtomicUsize::new(0),
            requested: Mutex::new(Vec::new()),
        }
    }

    /// The first `count` session attempts fail.
    pub fn failing_connect(mut self, count: usize) -> Self {
        self.connect_failures = AtomicUsize::new(count);
        self
    }

    /// Every interval starting on or after `day` fails to fetch.
    pub fn failing_from(mut self, day: NaiveDate) -> Self {
        self.fail_from = Some(day);
        self
    }

    /// The first fetch reports an expired session.
    pub fn expiring_once(self) -> Self {
        self.expire_once.store(true, Ordering::SeqCst);
        self
    }

    /// Cancels `token` after `fetches` successful fetches.
    pub fn cancelling_after(mut self, token: CancellationToken, fetches: usize) -> Self {
        self.cancel_after = Some((token, fetches));
        self
    }

    pub fn session_calls(&self) -> usize {
        self.session_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    /// Intervals passed to successful fetches, in order.
    pub fn requested(&self) -> Vec<(NaiveDate, NaiveDate)> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl SourceAdapter for MockAdapter {
    fn id(&self) -> SourceId {
        self.id
    }

    fn default_range(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        (today - TimeDelta::days(2), today)
    }

    fn max_span(&self) -> TimeDelta {
        TimeDelta::days(2)
    }

    async fn establish_session(&self) -> Result<Session, SourceError> {
        self.session_calls.fetch_add(1, Ordering::SeqCst);
        if self.connect_failures.load(Ordering::SeqCst) > 0 {
            self.connect_failures.fetch_sub(1, Ordering::SeqCst);
            return Err(ConnectionError::ServerError {
                status: 503,
                message: "Service Unavailable".to_string(),
            }
            .into());
        }
        Ok(Session::with_token(client::http_client(false)?, "mock"))
    }

    async fn fetch_chunk(
        &self,
        _session: &Session,
        interval: &Interval<NaiveDate>,
    ) -> Result<Vec<RawReading>, SourceError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);

        if self.expire_once.swap(false, Ordering::SeqCst) {
            return Err(SourceError::SessionExpired);
        }
        if self.fail_from.is_some_and(|day| interval.start >= day) {
            return Err(FetchError::ServerError {
                status: 500,
                message: "Internal Server Error".to_string(),
            }
            .into());
        }

        self.requested
            .lock()
            .unwrap()
            .push((interval.start, interval.end));
        let successes = self.successes.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((token, after)) = &self.cancel_after {
            if successes >= *after {
                token.cancel();
            }
        }

        let noon = NaiveTime::from_hms_opt(12, 0, 0).unwrap();
        Ok(interval
            .start
            .iter_days()
            .take_while(|day| *day <= interval.end)
            .map(|day| RawReading::new(day.and_time(noon), 1000.0))
            .collect())
    }

    fn aggregation_rule(&self) -> AggregationRule {
        AggregationRule::Sum
    }
}

/// Records everything the collector reports.
#[derive(Default)]
pub struct RecordingProgress {
    statuses: Vec<String>,
    max: usize,
    values: Vec<usize>,
}

impl RecordingProgress {
    pub fn statuses(&self) -> Vec<String> {
        self.statuses.clone()
    }

    pub fn max(&self) -> usize {
        self.max
    }

    pub fn values(&self) -> Vec<usize> {
        self.values.clone()
    }
}

impl Progress for RecordingProgress {
    fn set_status(&mut self, status: &str) {
        self.statuses.push(status.to_string());
    }

    fn set_max(&mut self, max: usize) {
        self.max = max;
    }

    fn set_progress(&mut self, value: usize) {
        self.values.push(value);
    }
}
