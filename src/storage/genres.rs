//! Genre persistence. Titles are unique case-insensitively; all maps are
//! keyed by lowercased title so a case-variant lookup can never miss.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::QueryBuilder;

use super::{trace_sql, StoreError};

/// Data-access contract for genres.
#[async_trait]
pub trait GenreRepository: Send + Sync {
    /// Returns the stored-case title of one genre id, or `None`.
    async fn get_by_id(&self, id: u16) -> Result<Option<String>, StoreError>;

    /// Returns the known genres among `ids`, keyed by id.
    async fn get_by_ids(&self, ids: &[u16]) -> Result<HashMap<u16, String>, StoreError>;

    /// Resolves titles to ids, matching case-insensitively. The returned map
    /// is keyed by lowercased title and contains only known genres.
    async fn get_id_by_titles(&self, titles: &[String])
        -> Result<HashMap<String, u16>, StoreError>;

    /// Inserts the given titles, skipping ones that already exist under any
    /// case, and returns ids for every requested title (lowercase-keyed).
    ///
    /// A title created concurrently between lookup and insert is recovered
    /// by re-fetching whatever `RETURNING` did not report.
    async fn insert(&self, titles: &[String]) -> Result<HashMap<String, u16>, StoreError>;

    /// Every stored genre title.
    async fn all(&self) -> Result<Vec<String>, StoreError>;
}

#[derive(sqlx::FromRow)]
struct GenreRow {
    id: i16,
    title: String,
}

impl GenreRow {
    fn into_pair(self) -> Result<(String, u16), StoreError> {
        let id = u16::try_from(self.id)
            .map_err(|_| StoreError::Data(format!("negative genre id {}", self.id)))?;
        Ok((self.title.to_lowercase(), id))
    }
}

/// PostgreSQL-backed [`GenreRepository`].
#[derive(Debug, Clone)]
pub struct PgGenreRepository {
    pool: PgPool,
}

impl PgGenreRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GenreRepository for PgGenreRepository {
    async fn get_by_id(&self, id: u16) -> Result<Option<String>, StoreError> {
        const SQL: &str = "SELECT id, title FROM genre WHERE id = $1";
        trace_sql(SQL);
        let row: Option<GenreRow> = sqlx::query_as(SQL)
            .bind(i32::from(id))
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.title))
    }

    async fn get_by_ids(&self, ids: &[u16]) -> Result<HashMap<u16, String>, StoreError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let ids: Vec<i16> = ids.iter().map(|id| *id as i16).collect();

        const SQL: &str = "SELECT id, title FROM genre WHERE id = ANY($1)";
        trace_sql(SQL);
        let rows: Vec<GenreRow> = sqlx::query_as(SQL)
            .bind(&ids)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|row| {
                let id = u16::try_from(row.id)
                    .map_err(|_| StoreError::Data(format!("negative genre id {}", row.id)))?;
                Ok((id, row.title))
            })
            .collect()
    }

    async fn get_id_by_titles(
        &self,
        titles: &[String],
    ) -> Result<HashMap<String, u16>, StoreError> {
        if titles.is_empty() {
            return Ok(HashMap::new());
        }

        let lowered: Vec<String> = titles.iter().map(|t| t.to_lowercase()).collect();

        const SQL: &str = "SELECT id, title FROM genre WHERE lower(title) = ANY($1)";
        trace_sql(SQL);
        let rows: Vec<GenreRow> = sqlx::query_as(SQL)
            .bind(&lowered)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(GenreRow::into_pair).collect()
    }

    async fn insert(&self, titles: &[String]) -> Result<HashMap<String, u16>, StoreError> {
        if titles.is_empty() {
            return Ok(HashMap::new());
        }

        let mut qb: QueryBuilder<sqlx::Postgres> = QueryBuilder::new("INSERT INTO genre (title) ");
        qb.push_values(titles, |mut b, title| {
            b.push_bind(title);
        });
        qb.push(" ON CONFLICT DO NOTHING RETURNING id, title");

        trace_sql(qb.sql());
        let rows: Vec<GenreRow> = qb.build_query_as().fetch_all(&self.pool).await?;

        let mut out: HashMap<String, u16> = rows
            .into_iter()
            .map(GenreRow::into_pair)
            .collect::<Result<_, _>>()?;

        // Titles the insert skipped were created by someone else (or existed
        // under a different case); fetch their ids.
        let missing: Vec<String> = titles
            .iter()
            .filter(|t| !out.contains_key(&t.to_lowercase()))
            .cloned()
            .collect();

        if !missing.is_empty() {
            out.extend(self.get_id_by_titles(&missing).await?);
        }

        Ok(out)
    }

    async fn all(&self) -> Result<Vec<String>, StoreError> {
        const SQL: &str = "SELECT title FROM genre ORDER BY title ASC";
        trace_sql(SQL);
        let rows: Vec<(String,)> = sqlx::query_as(SQL).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(|(title,)| title).collect())
    }
}
