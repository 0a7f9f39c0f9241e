//! Author persistence.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::QueryBuilder;
use tracing::error;
use url::Url;

use crate::model::Author;

use super::{escape_like, trace_sql, StoreError};

/// Data-access contract for authors.
#[async_trait]
pub trait AuthorRepository: Send + Sync {
    /// Returns the author with `id`, or `None` when unknown.
    async fn get_by_id(&self, id: &str) -> Result<Option<Author>, StoreError>;

    /// Returns the known authors among `ids`, keyed by id. Absent ids are
    /// simply missing from the map; values are never null.
    async fn get_by_ids(&self, ids: &[String]) -> Result<HashMap<String, Author>, StoreError>;

    /// Upserts one author on its primary key.
    async fn save(&self, author: &Author) -> Result<(), StoreError>;

    /// Word-wise case-insensitive name search, optionally narrowed to
    /// authors with books in any of `genre_ids`.
    async fn search(
        &self,
        query: &str,
        limit: i64,
        genre_ids: &[u16],
    ) -> Result<Vec<Author>, StoreError>;
}

#[derive(sqlx::FromRow)]
struct AuthorRow {
    id: String,
    name: String,
    bio: String,
    avatar_url: String,
}

impl AuthorRow {
    fn into_author(self) -> Author {
        let avatar = if self.avatar_url.is_empty() {
            None
        } else {
            match Url::parse(&self.avatar_url) {
                Ok(url) => Some(url),
                Err(err) => {
                    error!(
                        id = self.id,
                        url = self.avatar_url,
                        "failed to parse avatar URL stored in DB: {err}"
                    );
                    None
                }
            }
        };

        Author {
            id: self.id,
            name: self.name,
            bio: self.bio,
            avatar,
        }
    }
}

/// PostgreSQL-backed [`AuthorRepository`].
#[derive(Debug, Clone)]
pub struct PgAuthorRepository {
    pool: PgPool,
}

impl PgAuthorRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const SELECT_BY_ID: &str = "SELECT id, name, bio, avatar_url FROM author WHERE id = $1";
const SELECT_BY_IDS: &str = "SELECT id, name, bio, avatar_url FROM author WHERE id = ANY($1)";
const UPSERT: &str = "INSERT INTO author (id, name, bio, avatar_url) VALUES ($1, $2, $3, $4) \
     ON CONFLICT (id) DO UPDATE SET \
     name = excluded.name, bio = excluded.bio, avatar_url = excluded.avatar_url";

#[async_trait]
impl AuthorRepository for PgAuthorRepository {
    async fn get_by_id(&self, id: &str) -> Result<Option<Author>, StoreError> {
        trace_sql(SELECT_BY_ID);
        let row: Option<AuthorRow> = sqlx::query_as(SELECT_BY_ID)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(AuthorRow::into_author))
    }

    async fn get_by_ids(&self, ids: &[String]) -> Result<HashMap<String, Author>, StoreError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        trace_sql(SELECT_BY_IDS);
        let rows: Vec<AuthorRow> = sqlx::query_as(SELECT_BY_IDS)
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| (row.id.clone(), row.into_author()))
            .collect())
    }

    async fn save(&self, author: &Author) -> Result<(), StoreError> {
        trace_sql(UPSERT);
        sqlx::query(UPSERT)
            .bind(&author.id)
            .bind(&author.name)
            .bind(&author.bio)
            .bind(author.avatar.as_ref().map(Url::as_str).unwrap_or(""))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn search(
        &self,
        query: &str,
        limit: i64,
        genre_ids: &[u16],
    ) -> Result<Vec<Author>, StoreError> {
        let mut qb: QueryBuilder<sqlx::Postgres> =
            QueryBuilder::new("SELECT id, name, bio, avatar_url FROM author WHERE true");

        for word in query.split_whitespace() {
            qb.push(" AND name ILIKE ");
            qb.push_bind(format!("%{}%", escape_like(word)));
        }

        if !genre_ids.is_empty() {
            let ids: Vec<i16> = genre_ids.iter().map(|id| *id as i16).collect();
            qb.push(
                " AND id IN (SELECT author_id FROM book_author WHERE book_id IN \
                 (SELECT book_id FROM book_genre WHERE genre_id = ANY(",
            );
            qb.push_bind(ids);
            qb.push(")))");
        }

        qb.push(" ORDER BY name ASC LIMIT ");
        qb.push_bind(limit);

        trace_sql(qb.sql());
        let rows: Vec<AuthorRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(AuthorRow::into_author).collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_author_row_parses_avatar() {
        let row = AuthorRow {
            id: "tag:author:7".to_string(),
            name: "Jane".to_string(),
            bio: String::new(),
            avatar_url: "https://example.com/i/7.jpg".to_string(),
        };
        let author = row.into_author();
        assert_eq!(
            author.avatar.as_ref().map(Url::as_str),
            Some("https://example.com/i/7.jpg")
        );
    }

    #[test]
    fn test_author_row_degrades_bad_avatar_to_none() {
        let row = AuthorRow {
            id: "tag:author:7".to_string(),
            name: "Jane".to_string(),
            bio: String::new(),
            avatar_url: "not a url".to_string(),
        };
        assert!(row.into_author().avatar.is_none());
    }

    #[test]
    fn test_author_row_empty_avatar_is_none() {
        let row = AuthorRow {
            id: "tag:author:7".to_string(),
            name: "Jane".to_string(),
            bio: String::new(),
            avatar_url: String::new(),
        };
        assert!(row.into_author().avatar.is_none());
    }
}
