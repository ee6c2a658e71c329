use async_trait::async_trait;
use chrono::{NaiveDate, TimeDelta};

use crate::aggregate::AggregationRule;
use crate::chunker::Interval;
use crate::error::SourceError;

use super::reading::RawReading;
use super::types::SourceId;

/// Connection state threaded from [`SourceAdapter::establish_session`] into
/// every [`SourceAdapter::fetch_chunk`] call.
///
/// Holds the HTTP client (with its cookie jar, for scraped sites) and any
/// token extracted during login. There is no global session state.
#[derive(Debug, Clone)]
pub struct Session {
    pub http: reqwest::Client,
    pub token: Option<String>,
}

impl Session {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http, token: None }
    }

    pub fn with_token(http: reqwest::Client, token: impl Into<String>) -> Self {
        Self {
            http,
            token: Some(token.into()),
        }
    }
}

/// How stored raw rows inside a chunk's window are treated on re-collection.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum WindowPolicy {
    /// Insert-if-absent; existing rows are never touched.
    Append,
    /// Delete the chunk's day range and insert the fresh rows in the same
    /// transaction, so values the provider revised replace stale ones.
    ReplaceWindow,
}

/// Capability set every data source implements.
///
/// Adapters own their validated configuration and never mutate global state.
/// Configuration validation happens in the source registry before an adapter
/// is constructed.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Which source this adapter collects.
    fn id(&self) -> SourceId;

    /// Range used when the caller supplies none: the source's historical
    /// floor date through `today`.
    fn default_range(&self, today: NaiveDate) -> (NaiveDate, NaiveDate);

    /// Widest interval a single [`fetch_chunk`](Self::fetch_chunk) may cover.
    fn max_span(&self) -> TimeDelta;

    /// Adjusts a requested range before chunking. Most sources collect the
    /// range as given.
    fn collection_range(&self, start: NaiveDate, end: NaiveDate) -> (NaiveDate, NaiveDate) {
        (start, end)
    }

    /// Logs in or otherwise prepares a session. Retried independently of
    /// chunk fetches.
    async fn establish_session(&self) -> Result<Session, SourceError>;

    /// Fetches and parses the readings inside `interval`.
    ///
    /// Malformed payloads yield an empty vector; transport failures and error
    /// statuses are returned as retryable errors.
    async fn fetch_chunk(
        &self,
        session: &Session,
        interval: &Interval<NaiveDate>,
    ) -> Result<Vec<RawReading>, SourceError>;

    /// How raw readings for one day reduce to a daily aggregate.
    fn aggregation_rule(&self) -> AggregationRule;

    /// How re-collected windows interact with stored rows.
    fn window_policy(&self) -> WindowPolicy {
        WindowPolicy::Append
    }
}
