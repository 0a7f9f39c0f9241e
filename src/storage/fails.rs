//! Fail record persistence: one row per recoverable crawl failure, keyed by
//! the run's start time. The feed descriptor is stored as JSON so a later
//! `resume` can replay the subtree byte-identically.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use sqlx::types::Json;
use tracing::error;

use crate::model::ResumableFeed;

use super::{trace_sql, StoreError};

/// One persisted fail row.
#[derive(Debug, Clone, PartialEq)]
pub struct FailRecord {
    pub id: i64,
    pub start_time: DateTime<Utc>,
    pub feed: ResumableFeed,
    pub error: String,
}

/// Data-access contract for fail records.
#[async_trait]
pub trait FailRepository: Send + Sync {
    /// Persists one failure.
    async fn save(
        &self,
        start_time: DateTime<Utc>,
        feed: &ResumableFeed,
        error: &str,
    ) -> Result<(), StoreError>;

    /// Returns up to `limit` fail rows with `start_time <= not_after`,
    /// oldest id first.
    async fn fails_not_after(
        &self,
        not_after: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<FailRecord>, StoreError>;

    /// Deletes one fail row after successful replay.
    async fn delete(&self, id: i64) -> Result<(), StoreError>;
}

#[derive(sqlx::FromRow)]
struct FailRow {
    id: i64,
    start_time: DateTime<Utc>,
    feed: serde_json::Value,
    error: String,
}

/// PostgreSQL-backed [`FailRepository`].
#[derive(Debug, Clone)]
pub struct PgFailRepository {
    pool: PgPool,
}

impl PgFailRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const INSERT: &str = "INSERT INTO fail (start_time, feed, error) VALUES ($1, $2, $3)";
const SELECT: &str = "SELECT id, start_time, feed, error FROM fail \
     WHERE start_time <= $1 ORDER BY id ASC LIMIT $2";
const DELETE: &str = "DELETE FROM fail WHERE id = $1";

#[async_trait]
impl FailRepository for PgFailRepository {
    async fn save(
        &self,
        start_time: DateTime<Utc>,
        feed: &ResumableFeed,
        error: &str,
    ) -> Result<(), StoreError> {
        trace_sql(INSERT);
        sqlx::query(INSERT)
            .bind(start_time)
            .bind(Json(feed))
            .bind(error)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn fails_not_after(
        &self,
        not_after: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<FailRecord>, StoreError> {
        trace_sql(SELECT);
        let rows: Vec<FailRow> = sqlx::query_as(SELECT)
            .bind(not_after)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            // A descriptor this process cannot decode would wedge the resume
            // loop forever; skip it and leave the row for inspection.
            match serde_json::from_value::<ResumableFeed>(row.feed) {
                Ok(feed) => records.push(FailRecord {
                    id: row.id,
                    start_time: row.start_time,
                    feed,
                    error: row.error,
                }),
                Err(err) => {
                    error!(id = row.id, "failed to decode fail feed stored in DB: {err}");
                }
            }
        }

        Ok(records)
    }

    async fn delete(&self, id: i64) -> Result<(), StoreError> {
        trace_sql(DELETE);
        sqlx::query(DELETE).bind(id).execute(&self.pool).await?;
        Ok(())
    }
}
