//! The append-only check log and the timestamp discipline shared by its
//! implementations.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::future::Future;
use std::sync::Mutex;
use thiserror::Error;

use crate::db::models::CheckResult;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Corrupt record: {0}")]
    Corrupt(String),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Append/query interface over stored probe results.
///
/// There are no update or delete operations. Implementations must make
/// `append` atomic with respect to concurrent readers.
#[async_trait]
pub trait CheckStore: Send + Sync {
    /// Stores `result`, assigning its timestamp when unset, and returns the
    /// stored record.
    async fn append(&self, result: CheckResult) -> Result<CheckResult, StoreError>;

    /// Records for `target` strictly newer than `after`, oldest first.
    async fn query_newer_than(
        &self,
        target: &str,
        after: DateTime<Utc>,
    ) -> Result<Vec<CheckResult>, StoreError>;

    /// At most `limit` records for `target`, newest first.
    async fn query_recent(&self, target: &str, limit: usize)
        -> Result<Vec<CheckResult>, StoreError>;

    /// Records for `target` within the inclusive `[start, end]` window, oldest
    /// first. Open bounds are unbounded.
    async fn query_range(
        &self,
        target: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        limit: Option<usize>,
    ) -> Result<Vec<CheckResult>, StoreError>;
}

/// Drops sub-microsecond precision so a value survives a database round trip.
pub fn truncate_to_micros(instant: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_micros(instant.timestamp_micros()).unwrap_or(instant)
}

/// Hands out strictly increasing append timestamps.
///
/// Successive calls never return the same instant even when the wall clock
/// has not moved (or moved backwards); the value is bumped by one microsecond
/// past the previous one, which is also the resolution PostgreSQL keeps.
#[derive(Debug, Default)]
pub struct TimestampAllocator {
    last: Mutex<Option<DateTime<Utc>>>,
}

impl TimestampAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> DateTime<Utc> {
        self.next_after(Utc::now())
    }

    fn next_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let now = truncate_to_micros(now);
        let mut last = self.last.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let assigned = match *last {
            Some(previous) if now <= previous => previous + Duration::microseconds(1),
            _ => now,
        };
        *last = Some(assigned);
        assigned
    }
}

/// Stamps and commits appends one at a time.
///
/// A timestamp is only visible to readers once its commit finishes. Holding
/// the gate across both steps means commits land in timestamp order, so a
/// reader that has seen timestamp `t` will never later find a record older
/// than `t` appear.
#[derive(Debug, Default)]
pub struct AppendSequencer {
    clock: TimestampAllocator,
    gate: tokio::sync::Mutex<()>,
}

impl AppendSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns the timestamp of `result` when unset, then runs `commit` with
    /// the stamped record while no other append can start.
    pub async fn append_with<F, Fut, E>(
        &self,
        mut result: CheckResult,
        commit: F,
    ) -> Result<CheckResult, E>
    where
        F: FnOnce(CheckResult) -> Fut,
        Fut: Future<Output = Result<CheckResult, E>>,
    {
        let _gate = self.gate.lock().await;
        if result.timestamp.is_none() {
            result.timestamp = Some(self.clock.next());
        }
        commit(result).await
    }
}
