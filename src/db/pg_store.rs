//! PostgreSQL-backed check log.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool};
use tracing::{debug, error, info};

use crate::db::models::{CheckResult, CheckStatus};
use crate::db::store::{AppendSequencer, CheckStore, StoreError};

const SCHEMA: &str = include_str!("../../migrations/20250801000000_create_health_checks.sql");

#[derive(FromRow, Debug)]
struct HealthCheckRow {
    target_website: String,
    status: String,
    status_code: Option<i32>,
    response_time_ms: i64,
    message: String,
    checked_at: DateTime<Utc>,
}

impl TryFrom<HealthCheckRow> for CheckResult {
    type Error = StoreError;

    fn try_from(row: HealthCheckRow) -> Result<Self, Self::Error> {
        let status: CheckStatus = row.status.parse().map_err(StoreError::Corrupt)?;
        let status_code = row
            .status_code
            .map(u16::try_from)
            .transpose()
            .map_err(|e| StoreError::Corrupt(format!("status_code out of range: {e}")))?;
        Ok(CheckResult {
            target: row.target_website,
            status,
            status_code,
            response_time_ms: row.response_time_ms.max(0) as u64,
            message: row.message,
            timestamp: Some(row.checked_at),
        })
    }
}

fn rows_into_results(rows: Vec<HealthCheckRow>) -> Result<Vec<CheckResult>, StoreError> {
    rows.into_iter().map(CheckResult::try_from).collect()
}

pub struct PgCheckStore {
    pool: PgPool,
    sequencer: AppendSequencer,
}

impl PgCheckStore {
    /// Connects and makes sure the `health_checks` table exists.
    #[tracing::instrument(level = "info", skip(database_url))]
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        debug!("Connecting to PostgreSQL check store.");
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        let store = Self::with_pool(pool);
        store.initialize_schema().await?;
        info!("PostgreSQL check store ready.");
        Ok(store)
    }

    pub fn with_pool(pool: PgPool) -> Self {
        Self {
            pool,
            sequencer: AppendSequencer::new(),
        }
    }

    async fn initialize_schema(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await.map_err(|e| {
            error!(error = %e, "Failed to create health_checks schema.");
            StoreError::Database(e)
        })?;
        Ok(())
    }
}

#[async_trait]
impl CheckStore for PgCheckStore {
    async fn append(&self, result: CheckResult) -> Result<CheckResult, StoreError> {
        let pool = &self.pool;
        self.sequencer
            .append_with(result, |stamped| async move {
                sqlx::query(
                    r#"
                    INSERT INTO health_checks
                        (target_website, status, status_code, response_time_ms, message, checked_at)
                    VALUES ($1, $2, $3, $4, $5, $6)
                    "#,
                )
                .bind(&stamped.target)
                .bind(stamped.status.as_str())
                .bind(stamped.status_code.map(i32::from))
                .bind(i64::try_from(stamped.response_time_ms).unwrap_or(i64::MAX))
                .bind(&stamped.message)
                .bind(stamped.timestamp)
                .execute(pool)
                .await?;
                Ok::<_, StoreError>(stamped)
            })
            .await
    }

    async fn query_newer_than(
        &self,
        target: &str,
        after: DateTime<Utc>,
    ) -> Result<Vec<CheckResult>, StoreError> {
        let rows = sqlx::query_as::<_, HealthCheckRow>(
            r#"
            SELECT target_website, status, status_code, response_time_ms, message, checked_at
            FROM health_checks
            WHERE target_website = $1 AND checked_at > $2
            ORDER BY checked_at ASC
            "#,
        )
        .bind(target)
        .bind(after)
        .fetch_all(&self.pool)
        .await?;
        rows_into_results(rows)
    }

    async fn query_recent(
        &self,
        target: &str,
        limit: usize,
    ) -> Result<Vec<CheckResult>, StoreError> {
        let rows = sqlx::query_as::<_, HealthCheckRow>(
            r#"
            SELECT target_website, status, status_code, response_time_ms, message, checked_at
            FROM health_checks
            WHERE target_website = $1
            ORDER BY checked_at DESC
            LIMIT $2
            "#,
        )
        .bind(target)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;
        rows_into_results(rows)
    }

    async fn query_range(
        &self,
        target: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        limit: Option<usize>,
    ) -> Result<Vec<CheckResult>, StoreError> {
        let rows = sqlx::query_as::<_, HealthCheckRow>(
            r#"
            SELECT target_website, status, status_code, response_time_ms, message, checked_at
            FROM health_checks
            WHERE target_website = $1
              AND ($2::timestamptz IS NULL OR checked_at >= $2)
              AND ($3::timestamptz IS NULL OR checked_at <= $3)
            ORDER BY checked_at ASC
            LIMIT $4
            "#,
        )
        .bind(target)
        .bind(start)
        .bind(end)
        .bind(limit.map(|l| i64::try_from(l).unwrap_or(i64::MAX)))
        .fetch_all(&self.pool)
        .await?;
        rows_into_results(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(status: &str, status_code: Option<i32>) -> HealthCheckRow {
        HealthCheckRow {
            target_website: "https://example.com".to_string(),
            status: status.to_string(),
            status_code,
            response_time_ms: 42,
            message: "m".to_string(),
            checked_at: Utc::now(),
        }
    }

    #[test]
    fn test_row_conversion_keeps_fields() {
        let result = CheckResult::try_from(row("SLOW", Some(200))).unwrap();
        assert_eq!(result.status, CheckStatus::Slow);
        assert_eq!(result.status_code, Some(200));
        assert_eq!(result.response_time_ms, 42);
        assert!(result.timestamp.is_some());
    }

    #[test]
    fn test_row_with_unknown_status_is_corrupt() {
        let err = CheckResult::try_from(row("MAYBE", None)).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt(_)));
    }

    #[test]
    fn test_schema_constrains_status_values() {
        assert!(SCHEMA.contains("CHECK (status IN ('UP', 'DOWN', 'SLOW', 'ERROR'))"));
    }
}
