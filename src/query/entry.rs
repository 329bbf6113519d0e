//! Cache entries and the snapshots handed to observers
//!
//! Ordering uses logical ticks from the owning client's clock: every fetch
//! start and every invalidation draws a fresh tick. An entry remembers the
//! tick of the fetch that produced its current state (`fetched_tick`) and of
//! the last invalidation that hit it (`stale_tick`).

use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::time::Instant;

use super::error::{LoaderError, QueryError};
use super::key::QueryKey;

/// Lifecycle of a query as seen by the UI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    /// Nothing requested yet
    Idle,
    /// First fetch in progress, no value to show
    Loading,
    Success,
    Error,
}

/// Point-in-time view of a cache entry
#[derive(Debug, Clone, PartialEq)]
pub struct QueryState<T> {
    pub key: QueryKey,
    pub status: QueryStatus,
    /// Last successfully fetched value; survives later errors and invalidation
    pub data: Option<T>,
    pub error: Option<LoaderError>,
    /// A fetch for this key is in flight (also true during background refetches)
    pub is_fetching: bool,
    pub is_stale: bool,
    /// Wall-clock time the current state landed
    pub updated_at: Option<DateTime<Utc>>,
}

impl<T> QueryState<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self.status, QueryStatus::Idle | QueryStatus::Loading)
    }

    pub fn is_success(&self) -> bool {
        self.status == QueryStatus::Success
    }

    pub fn is_error(&self) -> bool {
        self.status == QueryStatus::Error
    }
}

#[derive(Debug)]
pub(crate) struct CacheEntry<T> {
    key: QueryKey,
    status: QueryStatus,
    data: Option<T>,
    error: Option<LoaderError>,
    fetched_tick: Option<u64>,
    stale_tick: Option<u64>,
    fetched_at: Option<Instant>,
    updated_at: Option<DateTime<Utc>>,
}

impl<T: Clone> CacheEntry<T> {
    pub(crate) fn new(key: QueryKey) -> Self {
        Self {
            key,
            status: QueryStatus::Idle,
            data: None,
            error: None,
            fetched_tick: None,
            stale_tick: None,
            fetched_at: None,
            updated_at: None,
        }
    }

    pub(crate) fn status(&self) -> QueryStatus {
        self.status
    }

    pub(crate) fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    /// Enters Loading unless there is a value to keep showing
    pub(crate) fn begin_fetch(&mut self) {
        if self.data.is_none() {
            self.status = QueryStatus::Loading;
        }
    }

    /// Applies the outcome of the fetch started at `fetch_tick`
    ///
    /// Rejected when the current state came from a fetch started later.
    pub(crate) fn settle(
        &mut self,
        fetch_tick: u64,
        result: Result<T, LoaderError>,
    ) -> Result<(), QueryError> {
        if let Some(current) = self.fetched_tick {
            if current > fetch_tick {
                return Err(QueryError::StaleReadIgnored {
                    key: self.key.clone(),
                    fetch_id: fetch_tick,
                    current,
                });
            }
        }

        match result {
            Ok(value) => {
                self.data = Some(value);
                self.error = None;
                self.status = QueryStatus::Success;
            }
            Err(err) => {
                self.error = Some(err);
                self.status = QueryStatus::Error;
            }
        }
        self.fetched_tick = Some(fetch_tick);
        self.fetched_at = Some(Instant::now());
        self.updated_at = Some(Utc::now());
        Ok(())
    }

    /// Stores a value directly, as if a fetch started at `tick` returned it
    pub(crate) fn set_data(&mut self, tick: u64, value: T) {
        self.data = Some(value);
        self.error = None;
        self.status = QueryStatus::Success;
        self.fetched_tick = Some(tick);
        self.fetched_at = Some(Instant::now());
        self.updated_at = Some(Utc::now());
    }

    pub(crate) fn mark_stale(&mut self, tick: u64) {
        self.stale_tick = Some(tick);
    }

    pub(crate) fn is_stale(&self, stale_time: Duration, now: Instant) -> bool {
        let Some(fetched_tick) = self.fetched_tick else {
            return true;
        };
        if self.stale_tick.is_some_and(|stale| stale >= fetched_tick) {
            return true;
        }
        self.fetched_at
            .map_or(true, |at| now.saturating_duration_since(at) > stale_time)
    }

    pub(crate) fn snapshot(&self, is_fetching: bool, stale_time: Duration) -> QueryState<T> {
        QueryState {
            key: self.key.clone(),
            status: self.status,
            data: self.data.clone(),
            error: self.error.clone(),
            is_fetching,
            is_stale: self.is_stale(stale_time, Instant::now()),
            updated_at: self.updated_at,
        }
    }
}
