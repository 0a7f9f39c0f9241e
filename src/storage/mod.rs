//! PostgreSQL-backed persistence: the pooled connection wrapper and one
//! repository per domain entity.
//!
//! The crawler depends only on the repository traits; the `Pg*` types are
//! the production implementations. The test suite substitutes in-memory
//! doubles.

mod authors;
mod books;
mod fails;
mod genres;
mod series;

use sqlx::postgres::{PgPool, PgPoolOptions};
use thiserror::Error;
use tracing::instrument;

pub use authors::{AuthorRepository, PgAuthorRepository};
pub use books::{BookRepository, PgBookRepository};
pub use fails::{FailRecord, FailRepository, PgFailRepository};
pub use genres::{GenreRepository, PgGenreRepository};
pub use series::{PgSeriesRepository, SeriesRepository};

/// Connections the pool keeps at most. The crawler is sequential; the pool
/// mostly covers the burst of link-table round-trips per batch.
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Database-level errors (connect and migrate).
#[derive(Debug, Error)]
pub enum DbError {
    /// Failed to connect to the database.
    #[error("failed to connect to database: {0}")]
    Connection(#[from] sqlx::Error),

    /// Failed to run migrations.
    #[error("failed to run migrations: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Errors surfaced by repository operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A query failed.
    #[error("database query failed: {0}")]
    Query(#[from] sqlx::Error),

    /// A stored value could not be interpreted.
    #[error("invalid stored data: {0}")]
    Data(String),
}

/// Connection pool wrapper; runs pending migrations on connect.
#[derive(Debug, Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Connects to the database at `database_url` and applies migrations.
    #[instrument(skip_all)]
    pub async fn connect(database_url: &str) -> Result<Self, DbError> {
        let pool = PgPoolOptions::new()
            .max_connections(DEFAULT_MAX_CONNECTIONS)
            .connect(database_url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    /// The underlying connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Gracefully closes all pooled connections.
    pub async fn close(self) {
        self.pool.close().await;
    }
}

/// Logs an executed statement at trace level.
pub(crate) fn trace_sql(sql: &str) {
    tracing::trace!(target: "bookcrawler::sql", sql, "executing statement");
}

/// Escapes LIKE/ILIKE metacharacters in a search word.
pub(crate) fn escape_like(word: &str) -> String {
    word.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like_escapes_metacharacters() {
        assert_eq!(escape_like("50%_done\\x"), "50\\%\\_done\\\\x");
        assert_eq!(escape_like("plain"), "plain");
    }
}
