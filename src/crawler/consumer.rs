//! The consumer contract: the sink for extracted entities and the bridge
//! between traversal and persistence.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::model::{Author, Book, Series};
use crate::storage::{AuthorRepository, BookRepository, GenreRepository, SeriesRepository};

use super::error::{ConsumerError, CrawlError};

/// Fetches an author by feed id on demand (hydration).
///
/// Handed to [`Consumer::consume_books`] and [`Consumer::consume_series`];
/// hides the crawler's ability to fetch an author description mid-batch, so
/// consumers never touch the transport.
#[async_trait]
pub trait AuthorSource: Send + Sync {
    async fn fetch_author(&self, id: &str) -> Result<Author, CrawlError>;
}

/// Receives extracted entities from the traversal.
///
/// Implementations must be idempotent: replaying the same entities yields
/// the same observable state. The crawler calls a consumer serially, but the
/// contract permits calls from any single calling context.
#[async_trait]
pub trait Consumer: Send + Sync {
    /// One author, emitted before the books of its subtree.
    async fn consume_author(&self, author: &Author) -> Result<(), ConsumerError>;

    /// One page worth of books from an author's books feed.
    async fn consume_books(
        &self,
        books: &[Book],
        authors: &dyn AuthorSource,
    ) -> Result<(), ConsumerError>;

    /// One series with all books of its page.
    async fn consume_series(
        &self,
        series: &Series,
        books: &[Book],
        authors: &dyn AuthorSource,
    ) -> Result<(), ConsumerError>;
}

/// A consumer that narrates what it receives without storing anything.
///
/// Still exercises the [`AuthorSource`] for every referenced author id, so a
/// dry crawl surfaces the same hydration failures a storing run would.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingConsumer;

#[async_trait]
impl Consumer for LoggingConsumer {
    async fn consume_author(&self, author: &Author) -> Result<(), ConsumerError> {
        info!(
            id = author.id,
            name = author.name,
            has_bio = !author.bio.is_empty(),
            has_avatar = author.avatar.is_some(),
            "consumed author"
        );
        Ok(())
    }

    async fn consume_books(
        &self,
        books: &[Book],
        authors: &dyn AuthorSource,
    ) -> Result<(), ConsumerError> {
        for book in books {
            for author_id in &book.authors {
                authors
                    .fetch_author(author_id)
                    .await
                    .map_err(|source| ConsumerError::Hydrate {
                        id: author_id.clone(),
                        source: Box::new(source),
                    })?;
            }

            info!(
                id = book.id,
                title = book.title,
                authors = book.authors.join(", "),
                "consumed book"
            );
        }

        Ok(())
    }

    async fn consume_series(
        &self,
        series: &Series,
        books: &[Book],
        authors: &dyn AuthorSource,
    ) -> Result<(), ConsumerError> {
        self.consume_books(books, authors).await?;

        let book_ids: Vec<&str> = books.iter().map(|b| b.id.as_str()).collect();
        info!(
            id = series.id,
            title = series.title,
            books = book_ids.join(", "),
            "consumed series"
        );

        Ok(())
    }
}

/// The storing consumer: reconciles entities into the repositories with
/// dedup and differential updates.
pub struct StoringConsumer {
    authors: Arc<dyn AuthorRepository>,
    books: Arc<dyn BookRepository>,
    genres: Arc<dyn GenreRepository>,
    series: Arc<dyn SeriesRepository>,
}

impl StoringConsumer {
    pub fn new(
        authors: Arc<dyn AuthorRepository>,
        books: Arc<dyn BookRepository>,
        genres: Arc<dyn GenreRepository>,
        series: Arc<dyn SeriesRepository>,
    ) -> Self {
        Self {
            authors,
            books,
            genres,
            series,
        }
    }
}

#[async_trait]
impl Consumer for StoringConsumer {
    async fn consume_author(&self, author: &Author) -> Result<(), ConsumerError> {
        match self.authors.get_by_id(&author.id).await? {
            None => info!(id = author.id, name = author.name, "storing new author"),
            Some(existing) if existing != *author => {
                info!(id = author.id, name = author.name, "updating existing author");
            }
            Some(_) => {
                debug!(id = author.id, name = author.name, "skip unchanged author");
                return Ok(());
            }
        }

        Ok(self.authors.save(author).await?)
    }

    async fn consume_books(
        &self,
        books: &[Book],
        authors: &dyn AuthorSource,
    ) -> Result<(), ConsumerError> {
        // Hydrate and save every referenced author the store does not know yet.
        let author_ids = unique_in_order(books.iter().flat_map(|b| &b.authors));
        let known_authors = self.authors.get_by_ids(&author_ids).await?;

        for author_id in &author_ids {
            if known_authors.contains_key(author_id) {
                continue;
            }

            let author = authors
                .fetch_author(author_id)
                .await
                .map_err(|source| ConsumerError::Hydrate {
                    id: author_id.clone(),
                    source: Box::new(source),
                })?;

            info!(id = author.id, name = author.name, "storing hydrated author");
            self.authors.save(&author).await?;
        }

        // Resolve every genre title to an id, inserting the missing ones.
        // The maps are keyed by lowercased title throughout.
        let genre_titles = unique_in_order(books.iter().flat_map(|b| &b.genres));
        let mut genre_ids = self.genres.get_id_by_titles(&genre_titles).await?;

        let missing: Vec<String> = genre_titles
            .iter()
            .filter(|t| !genre_ids.contains_key(&t.to_lowercase()))
            .cloned()
            .collect();
        if !missing.is_empty() {
            genre_ids.extend(self.genres.insert(&missing).await?);
        }

        // Save books that are new or materially changed.
        let book_ids: Vec<String> = books.iter().map(|b| b.id.clone()).collect();
        let existing = self.books.get_by_ids(&book_ids).await?;

        let mut to_save = Vec::with_capacity(books.len());
        for book in books {
            match existing.get(&book.id) {
                None => info!(id = book.id, title = book.title, "storing new book"),
                Some(stored) if book_needs_update(stored, book) => {
                    info!(id = book.id, title = book.title, "updating existing book");
                }
                Some(_) => {
                    debug!(id = book.id, title = book.title, "skip unchanged book");
                    continue;
                }
            }
            to_save.push(book.clone());
        }

        self.books.save(&to_save).await?;

        for book in &to_save {
            self.books.link_book_authors(&book.id, &book.authors).await?;

            let mut ids = Vec::with_capacity(book.genres.len());
            for title in &book.genres {
                let id = genre_ids
                    .get(&title.to_lowercase())
                    .copied()
                    .ok_or_else(|| ConsumerError::GenreResolution(title.clone()))?;
                ids.push(id);
            }
            self.books.link_book_genres(&book.id, &ids).await?;
        }

        Ok(())
    }

    async fn consume_series(
        &self,
        series: &Series,
        books: &[Book],
        authors: &dyn AuthorSource,
    ) -> Result<(), ConsumerError> {
        match self.series.get_by_id(&series.id).await? {
            None => {
                info!(id = series.id, title = series.title, "storing new series");
                self.series.save(series).await?;
            }
            Some(existing) if existing != *series => {
                info!(id = series.id, title = series.title, "updating existing series");
                self.series.save(series).await?;
            }
            Some(_) => debug!(id = series.id, title = series.title, "skip unchanged series"),
        }

        self.consume_books(books, authors).await?;

        let book_ids: Vec<String> = books.iter().map(|b| b.id.clone()).collect();
        debug!(id = series.id, title = series.title, "linking books with series");
        Ok(self.books.link_series_books(&series.id, &book_ids).await?)
    }
}

/// Compares a stored book against a freshly extracted one, ignoring the
/// series memberships (those are owned by the series link step).
fn book_needs_update(stored: &Book, new: &Book) -> bool {
    stored.title != new.title
        || stored.authors != new.authors
        || stored.genres != new.genres
        || stored.language != new.language
        || stored.year != new.year
        || stored.about != new.about
        || stored.cover != new.cover
}

/// First-seen-order deduplication of an iterator of strings.
fn unique_in_order<'a, I>(values: I) -> Vec<String>
where
    I: Iterator<Item = &'a String>,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for value in values {
        if seen.insert(value.as_str()) {
            out.push(value.clone());
        }
    }
    out
}
