use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::db::models::CheckResult;
use crate::db::store::{CheckStore, StoreError, TimestampAllocator};

/// Process-local check log. Used when no database is configured and in tests.
#[derive(Debug, Default)]
pub struct MemoryCheckStore {
    records: RwLock<Vec<CheckResult>>,
    clock: TimestampAllocator,
}

impl MemoryCheckStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Snapshot of one target's records, oldest first.
    async fn snapshot_for(&self, target: &str) -> Vec<CheckResult> {
        let records = self.records.read().await;
        let mut matching: Vec<CheckResult> = records
            .iter()
            .filter(|r| r.target == target)
            .cloned()
            .collect();
        matching.sort_by_key(|r| r.timestamp);
        matching
    }
}

#[async_trait]
impl CheckStore for MemoryCheckStore {
    async fn append(&self, mut result: CheckResult) -> Result<CheckResult, StoreError> {
        // Timestamp assignment and push happen under the same write lock so
        // insertion order and timestamp order agree.
        let mut records = self.records.write().await;
        if result.timestamp.is_none() {
            result.timestamp = Some(self.clock.next());
        }
        records.push(result.clone());
        Ok(result)
    }

    async fn query_newer_than(
        &self,
        target: &str,
        after: DateTime<Utc>,
    ) -> Result<Vec<CheckResult>, StoreError> {
        Ok(self
            .snapshot_for(target)
            .await
            .into_iter()
            .filter(|r| r.timestamp.is_some_and(|ts| ts > after))
            .collect())
    }

    async fn query_recent(
        &self,
        target: &str,
        limit: usize,
    ) -> Result<Vec<CheckResult>, StoreError> {
        let mut records = self.snapshot_for(target).await;
        records.reverse();
        records.truncate(limit);
        Ok(records)
    }

    async fn query_range(
        &self,
        target: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        limit: Option<usize>,
    ) -> Result<Vec<CheckResult>, StoreError> {
        let mut records: Vec<CheckResult> = self
            .snapshot_for(target)
            .await
            .into_iter()
            .filter(|r| match r.timestamp {
                Some(ts) => start.map_or(true, |s| ts >= s) && end.map_or(true, |e| ts <= e),
                None => false,
            })
            .collect();
        if let Some(limit) = limit {
            records.truncate(limit);
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::CheckStatus;
    use std::sync::Arc;

    fn up(target: &str) -> CheckResult {
        CheckResult::responded(target, CheckStatus::Up, 200, 10, "ok")
    }

    #[tokio::test]
    async fn test_append_assigns_increasing_timestamps() {
        let store = MemoryCheckStore::new();
        let first = store.append(up("https://a.test")).await.unwrap();
        let second = store.append(up("https://a.test")).await.unwrap();

        assert!(first.timestamp.is_some());
        assert!(second.timestamp > first.timestamp);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_query_newer_than_respects_the_watermark() {
        let store = MemoryCheckStore::new();
        let before = Utc::now() - chrono::Duration::seconds(1);
        let stored = store.append(up("https://a.test")).await.unwrap();

        let batch = store.query_newer_than("https://a.test", before).await.unwrap();
        assert_eq!(batch, vec![stored.clone()]);

        let advanced = stored.timestamp.unwrap();
        let batch = store.query_newer_than("https://a.test", advanced).await.unwrap();
        assert!(batch.is_empty());
    }

    #[tokio::test]
    async fn test_queries_are_scoped_to_the_target() {
        let store = MemoryCheckStore::new();
        store.append(up("https://a.test")).await.unwrap();
        store.append(up("https://b.test")).await.unwrap();

        let recent = store.query_recent("https://b.test", 10).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].target, "https://b.test");
    }

    #[tokio::test]
    async fn test_query_recent_is_newest_first_and_bounded() {
        let store = MemoryCheckStore::new();
        let mut stored = Vec::new();
        for code in [200u16, 201, 202, 203] {
            let record = CheckResult::responded("https://a.test", CheckStatus::Up, code, 5, "ok");
            stored.push(store.append(record).await.unwrap());
        }

        let recent = store.query_recent("https://a.test", 3).await.unwrap();
        let codes: Vec<_> = recent.iter().map(|r| r.status_code.unwrap()).collect();
        assert_eq!(codes, vec![203, 202, 201]);
    }

    #[tokio::test]
    async fn test_query_range_uses_inclusive_bounds() {
        let store = MemoryCheckStore::new();
        let a = store.append(up("https://a.test")).await.unwrap();
        let b = store.append(up("https://a.test")).await.unwrap();
        let c = store.append(up("https://a.test")).await.unwrap();

        let window = store
            .query_range("https://a.test", b.timestamp, c.timestamp, None)
            .await
            .unwrap();
        assert_eq!(window, vec![b.clone(), c.clone()]);

        let open = store
            .query_range("https://a.test", None, None, Some(2))
            .await
            .unwrap();
        assert_eq!(open, vec![a, b]);
    }

    #[tokio::test]
    async fn test_concurrent_appends_keep_every_record() {
        let store = Arc::new(MemoryCheckStore::new());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.append(up("https://a.test")).await.unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let all = store
            .query_range("https://a.test", None, None, None)
            .await
            .unwrap();
        assert_eq!(all.len(), 16);
        assert!(all.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }
}
