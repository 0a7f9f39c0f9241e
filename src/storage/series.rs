//! Series persistence.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::QueryBuilder;

use crate::model::Series;

use super::{escape_like, trace_sql, StoreError};

/// Data-access contract for series.
#[async_trait]
pub trait SeriesRepository: Send + Sync {
    /// Returns the series with `id`, or `None` when unknown.
    async fn get_by_id(&self, id: &str) -> Result<Option<Series>, StoreError>;

    /// Returns the known series among `ids`, keyed by id. Absent ids are
    /// missing from the map; values are never null.
    async fn get_by_ids(&self, ids: &[String]) -> Result<HashMap<String, Series>, StoreError>;

    /// Upserts one series on its primary key.
    async fn save(&self, series: &Series) -> Result<(), StoreError>;

    /// Word-wise case-insensitive title search.
    async fn search(&self, query: &str, limit: i64) -> Result<Vec<Series>, StoreError>;
}

#[derive(sqlx::FromRow)]
struct SeriesRow {
    id: String,
    title: String,
}

impl From<SeriesRow> for Series {
    fn from(row: SeriesRow) -> Self {
        Series {
            id: row.id,
            title: row.title,
        }
    }
}

/// PostgreSQL-backed [`SeriesRepository`].
#[derive(Debug, Clone)]
pub struct PgSeriesRepository {
    pool: PgPool,
}

impl PgSeriesRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const SELECT_BY_ID: &str = "SELECT id, title FROM series WHERE id = $1";
const SELECT_BY_IDS: &str = "SELECT id, title FROM series WHERE id = ANY($1)";
const UPSERT: &str = "INSERT INTO series (id, title) VALUES ($1, $2) \
     ON CONFLICT (id) DO UPDATE SET title = excluded.title";

#[async_trait]
impl SeriesRepository for PgSeriesRepository {
    async fn get_by_id(&self, id: &str) -> Result<Option<Series>, StoreError> {
        trace_sql(SELECT_BY_ID);
        let row: Option<SeriesRow> = sqlx::query_as(SELECT_BY_ID)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Series::from))
    }

    async fn get_by_ids(&self, ids: &[String]) -> Result<HashMap<String, Series>, StoreError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        trace_sql(SELECT_BY_IDS);
        let rows: Vec<SeriesRow> = sqlx::query_as(SELECT_BY_IDS)
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| (row.id.clone(), Series::from(row)))
            .collect())
    }

    async fn save(&self, series: &Series) -> Result<(), StoreError> {
        trace_sql(UPSERT);
        sqlx::query(UPSERT)
            .bind(&series.id)
            .bind(&series.title)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn search(&self, query: &str, limit: i64) -> Result<Vec<Series>, StoreError> {
        let mut qb: QueryBuilder<sqlx::Postgres> =
            QueryBuilder::new("SELECT id, title FROM series WHERE true");

        for word in query.split_whitespace() {
            qb.push(" AND title ILIKE ");
            qb.push_bind(format!("%{}%", escape_like(word)));
        }

        qb.push(" ORDER BY title ASC LIMIT ");
        qb.push_bind(limit);

        trace_sql(qb.sql());
        let rows: Vec<SeriesRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Series::from).collect())
    }
}
