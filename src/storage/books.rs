//! Book persistence, including the three link tables.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::QueryBuilder;
use tracing::error;
use url::Url;

use crate::model::{Book, InSeries};

use super::{escape_like, trace_sql, StoreError};

/// Data-access contract for books and their link tables.
#[async_trait]
pub trait BookRepository: Send + Sync {
    /// Returns the book with `id` (authors, genres and series memberships
    /// populated), or `None` when unknown.
    async fn get_by_id(&self, id: &str) -> Result<Option<Book>, StoreError>;

    /// Returns the known books among `ids`, keyed by id, fully populated.
    /// Absent ids are missing from the map; values are never null.
    async fn get_by_ids(&self, ids: &[String]) -> Result<HashMap<String, Book>, StoreError>;

    /// Upserts a batch of books on their primary keys. Link tables are not
    /// touched; use the `link_*` operations.
    async fn save(&self, books: &[Book]) -> Result<(), StoreError>;

    /// Replaces the `book_author` rows of one book with the given sequence;
    /// `author_order` is assigned densely from 1.
    async fn link_book_authors(&self, book_id: &str, author_ids: &[String])
        -> Result<(), StoreError>;

    /// Replaces the `book_genre` rows of one book.
    async fn link_book_genres(&self, book_id: &str, genre_ids: &[u16]) -> Result<(), StoreError>;

    /// Replaces the `book_series` rows of one series with the given book
    /// sequence; `book_order` is assigned densely from 1.
    async fn link_series_books(&self, series_id: &str, book_ids: &[String])
        -> Result<(), StoreError>;

    /// Word-wise case-insensitive title search.
    async fn search(&self, query: &str, limit: i64) -> Result<Vec<Book>, StoreError>;
}

#[derive(sqlx::FromRow)]
struct BookRow {
    id: String,
    title: String,
    language: String,
    year: i32,
    about: String,
    cover_url: String,
}

impl BookRow {
    fn into_book(self, authors: Vec<String>, genres: Vec<String>, series: Vec<InSeries>) -> Book {
        let cover = if self.cover_url.is_empty() {
            None
        } else {
            match Url::parse(&self.cover_url) {
                Ok(url) => Some(url),
                Err(err) => {
                    error!(
                        id = self.id,
                        url = self.cover_url,
                        "failed to parse cover URL stored in DB: {err}"
                    );
                    None
                }
            }
        };

        let year = u16::try_from(self.year).unwrap_or_else(|_| {
            error!(id = self.id, year = self.year, "stored year out of range");
            0
        });

        Book {
            id: self.id,
            title: self.title,
            authors,
            series,
            genres,
            language: self.language,
            year,
            about: self.about,
            cover,
        }
    }
}

/// PostgreSQL-backed [`BookRepository`].
#[derive(Debug, Clone)]
pub struct PgBookRepository {
    pool: PgPool,
}

impl PgBookRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn authors_by_books(
        &self,
        book_ids: &[String],
    ) -> Result<HashMap<String, Vec<String>>, StoreError> {
        const SQL: &str = "SELECT book_id, author_id FROM book_author \
             WHERE book_id = ANY($1) ORDER BY author_order ASC";
        trace_sql(SQL);
        let rows: Vec<(String, String)> = sqlx::query_as(SQL)
            .bind(book_ids)
            .fetch_all(&self.pool)
            .await?;

        let mut out: HashMap<String, Vec<String>> = HashMap::with_capacity(book_ids.len());
        for (book_id, author_id) in rows {
            out.entry(book_id).or_default().push(author_id);
        }
        Ok(out)
    }

    async fn genres_by_books(
        &self,
        book_ids: &[String],
    ) -> Result<HashMap<String, Vec<String>>, StoreError> {
        const SQL: &str = "SELECT bg.book_id, g.title FROM book_genre bg \
             JOIN genre g ON g.id = bg.genre_id \
             WHERE bg.book_id = ANY($1) ORDER BY g.title ASC";
        trace_sql(SQL);
        let rows: Vec<(String, String)> = sqlx::query_as(SQL)
            .bind(book_ids)
            .fetch_all(&self.pool)
            .await?;

        let mut out: HashMap<String, Vec<String>> = HashMap::with_capacity(book_ids.len());
        for (book_id, title) in rows {
            out.entry(book_id).or_default().push(title);
        }
        Ok(out)
    }

    async fn series_by_books(
        &self,
        book_ids: &[String],
    ) -> Result<HashMap<String, Vec<InSeries>>, StoreError> {
        const SQL: &str =
            "SELECT book_id, series_id, book_order FROM book_series WHERE book_id = ANY($1)";
        trace_sql(SQL);
        let rows: Vec<(String, String, Option<i32>)> = sqlx::query_as(SQL)
            .bind(book_ids)
            .fetch_all(&self.pool)
            .await?;

        let mut out: HashMap<String, Vec<InSeries>> = HashMap::with_capacity(book_ids.len());
        for (book_id, series_id, book_order) in rows {
            out.entry(book_id).or_default().push(InSeries {
                series_id,
                position: book_order.and_then(|o| u16::try_from(o).ok()),
            });
        }
        Ok(out)
    }
}

#[async_trait]
impl BookRepository for PgBookRepository {
    async fn get_by_id(&self, id: &str) -> Result<Option<Book>, StoreError> {
        let ids = [id.to_string()];
        Ok(self.get_by_ids(&ids).await?.remove(id))
    }

    async fn get_by_ids(&self, ids: &[String]) -> Result<HashMap<String, Book>, StoreError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        const SQL: &str =
            "SELECT id, title, language, year, about, cover_url FROM book WHERE id = ANY($1)";
        trace_sql(SQL);
        let rows: Vec<BookRow> = sqlx::query_as(SQL).bind(ids).fetch_all(&self.pool).await?;

        if rows.is_empty() {
            return Ok(HashMap::new());
        }

        let found_ids: Vec<String> = rows.iter().map(|row| row.id.clone()).collect();
        let mut authors = self.authors_by_books(&found_ids).await?;
        let mut genres = self.genres_by_books(&found_ids).await?;
        let mut series = self.series_by_books(&found_ids).await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let id = row.id.clone();
                let book = row.into_book(
                    authors.remove(&id).unwrap_or_default(),
                    genres.remove(&id).unwrap_or_default(),
                    series.remove(&id).unwrap_or_default(),
                );
                (id, book)
            })
            .collect())
    }

    async fn save(&self, books: &[Book]) -> Result<(), StoreError> {
        if books.is_empty() {
            return Ok(());
        }

        let mut qb: QueryBuilder<sqlx::Postgres> =
            QueryBuilder::new("INSERT INTO book (id, title, language, year, about, cover_url) ");
        qb.push_values(books, |mut b, book| {
            b.push_bind(&book.id)
                .push_bind(&book.title)
                .push_bind(&book.language)
                .push_bind(i32::from(book.year))
                .push_bind(&book.about)
                .push_bind(book.cover.as_ref().map(Url::as_str).unwrap_or(""));
        });
        qb.push(
            " ON CONFLICT (id) DO UPDATE SET \
             title = excluded.title, language = excluded.language, year = excluded.year, \
             about = excluded.about, cover_url = excluded.cover_url",
        );

        trace_sql(qb.sql());
        qb.build().execute(&self.pool).await?;
        Ok(())
    }

    async fn link_book_authors(
        &self,
        book_id: &str,
        author_ids: &[String],
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        const DELETE: &str = "DELETE FROM book_author WHERE book_id = $1";
        trace_sql(DELETE);
        sqlx::query(DELETE).bind(book_id).execute(&mut *tx).await?;

        if !author_ids.is_empty() {
            let mut qb: QueryBuilder<sqlx::Postgres> =
                QueryBuilder::new("INSERT INTO book_author (book_id, author_id, author_order) ");
            qb.push_values(author_ids.iter().enumerate(), |mut b, (ix, author_id)| {
                b.push_bind(book_id)
                    .push_bind(author_id)
                    .push_bind(ix as i32 + 1);
            });
            trace_sql(qb.sql());
            qb.build().execute(&mut *tx).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn link_book_genres(&self, book_id: &str, genre_ids: &[u16]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        const DELETE: &str = "DELETE FROM book_genre WHERE book_id = $1";
        trace_sql(DELETE);
        sqlx::query(DELETE).bind(book_id).execute(&mut *tx).await?;

        if !genre_ids.is_empty() {
            let mut qb: QueryBuilder<sqlx::Postgres> =
                QueryBuilder::new("INSERT INTO book_genre (book_id, genre_id) ");
            qb.push_values(genre_ids, |mut b, genre_id| {
                b.push_bind(book_id).push_bind(*genre_id as i16);
            });
            trace_sql(qb.sql());
            qb.build().execute(&mut *tx).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn link_series_books(
        &self,
        series_id: &str,
        book_ids: &[String],
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        const DELETE: &str = "DELETE FROM book_series WHERE series_id = $1";
        trace_sql(DELETE);
        sqlx::query(DELETE).bind(series_id).execute(&mut *tx).await?;

        if !book_ids.is_empty() {
            let mut qb: QueryBuilder<sqlx::Postgres> =
                QueryBuilder::new("INSERT INTO book_series (book_id, series_id, book_order) ");
            qb.push_values(book_ids.iter().enumerate(), |mut b, (ix, book_id)| {
                b.push_bind(book_id)
                    .push_bind(series_id)
                    .push_bind(ix as i32 + 1);
            });
            trace_sql(qb.sql());
            qb.build().execute(&mut *tx).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn search(&self, query: &str, limit: i64) -> Result<Vec<Book>, StoreError> {
        let mut qb: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(
            "SELECT id, title, language, year, about, cover_url FROM book WHERE true",
        );

        for word in query.split_whitespace() {
            qb.push(" AND title ILIKE ");
            qb.push_bind(format!("%{}%", escape_like(word)));
        }

        qb.push(" ORDER BY title ASC LIMIT ");
        qb.push_bind(limit);

        trace_sql(qb.sql());
        let rows: Vec<BookRow> = qb.build_query_as().fetch_all(&self.pool).await?;

        let found_ids: Vec<String> = rows.iter().map(|row| row.id.clone()).collect();
        let mut authors = self.authors_by_books(&found_ids).await?;
        let mut genres = self.genres_by_books(&found_ids).await?;
        let mut series = self.series_by_books(&found_ids).await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let id = row.id.clone();
                row.into_book(
                    authors.remove(&id).unwrap_or_default(),
                    genres.remove(&id).unwrap_or_default(),
                    series.remove(&id).unwrap_or_default(),
                )
            })
            .collect())
    }
}
