//! In-memory repository doubles with write counting and failure injection.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use bookcrawler::{
    Author, AuthorRepository, Book, BookRepository, FailRecord, FailRepository, GenreRepository,
    InSeries, ResumableFeed, Series, SeriesRepository, StoreError,
};

fn injected(what: &str) -> StoreError {
    StoreError::Data(format!("injected {what} failure"))
}

#[derive(Default)]
pub struct MemoryAuthors {
    rows: Mutex<HashMap<String, Author>>,
    pub writes: AtomicUsize,
}

impl MemoryAuthors {
    pub fn get(&self, id: &str) -> Option<Author> {
        self.rows.lock().unwrap().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }
}

#[async_trait]
impl AuthorRepository for MemoryAuthors {
    async fn get_by_id(&self, id: &str) -> Result<Option<Author>, StoreError> {
        Ok(self.rows.lock().unwrap().get(id).cloned())
    }

    async fn get_by_ids(&self, ids: &[String]) -> Result<HashMap<String, Author>, StoreError> {
        let rows = self.rows.lock().unwrap();
        Ok(ids
            .iter()
            .filter_map(|id| rows.get(id).map(|a| (id.clone(), a.clone())))
            .collect())
    }

    async fn save(&self, author: &Author) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.rows
            .lock()
            .unwrap()
            .insert(author.id.clone(), author.clone());
        Ok(())
    }

    async fn search(
        &self,
        query: &str,
        limit: i64,
        _genre_ids: &[u16],
    ) -> Result<Vec<Author>, StoreError> {
        let needle = query.to_lowercase();
        let rows = self.rows.lock().unwrap();
        let mut found: Vec<Author> = rows
            .values()
            .filter(|a| a.name.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name));
        found.truncate(limit as usize);
        Ok(found)
    }
}

#[derive(Default)]
struct GenreRows {
    next_id: u16,
    // id -> stored-case title
    titles: HashMap<u16, String>,
}

#[derive(Default)]
pub struct MemoryGenres {
    rows: Mutex<GenreRows>,
    pub creates: AtomicUsize,
}

impl MemoryGenres {
    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().titles.len()
    }

    pub fn titles(&self) -> Vec<String> {
        let rows = self.rows.lock().unwrap();
        let mut titles: Vec<String> = rows.titles.values().cloned().collect();
        titles.sort();
        titles
    }

    fn title_of(&self, id: u16) -> Option<String> {
        self.rows.lock().unwrap().titles.get(&id).cloned()
    }
}

#[async_trait]
impl GenreRepository for MemoryGenres {
    async fn get_by_id(&self, id: u16) -> Result<Option<String>, StoreError> {
        Ok(self.title_of(id))
    }

    async fn get_by_ids(&self, ids: &[u16]) -> Result<HashMap<u16, String>, StoreError> {
        let rows = self.rows.lock().unwrap();
        Ok(ids
            .iter()
            .filter_map(|id| rows.titles.get(id).map(|t| (*id, t.clone())))
            .collect())
    }

    async fn get_id_by_titles(
        &self,
        titles: &[String],
    ) -> Result<HashMap<String, u16>, StoreError> {
        let rows = self.rows.lock().unwrap();
        let mut out = HashMap::new();
        for title in titles {
            let lower = title.to_lowercase();
            if let Some((id, _)) = rows
                .titles
                .iter()
                .find(|(_, stored)| stored.to_lowercase() == lower)
            {
                out.insert(lower, *id);
            }
        }
        Ok(out)
    }

    async fn insert(&self, titles: &[String]) -> Result<HashMap<String, u16>, StoreError> {
        let mut rows = self.rows.lock().unwrap();
        let mut out = HashMap::new();
        for title in titles {
            let lower = title.to_lowercase();
            let existing = rows
                .titles
                .iter()
                .find(|(_, stored)| stored.to_lowercase() == lower)
                .map(|(id, _)| *id);
            let id = match existing {
                Some(id) => id,
                None => {
                    rows.next_id += 1;
                    let id = rows.next_id;
                    rows.titles.insert(id, title.clone());
                    self.creates.fetch_add(1, Ordering::SeqCst);
                    id
                }
            };
            out.insert(lower, id);
        }
        Ok(out)
    }

    async fn all(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.titles())
    }
}

#[derive(Default)]
struct BookRows {
    books: HashMap<String, Book>,
    book_authors: HashMap<String, Vec<String>>,
    book_genres: HashMap<String, Vec<u16>>,
    // series_id -> ordered book ids
    series_books: HashMap<String, Vec<String>>,
}

pub struct MemoryBooks {
    rows: Mutex<BookRows>,
    genres: std::sync::Arc<MemoryGenres>,
    pub writes: AtomicUsize,
    pub fail_saves: AtomicBool,
}

impl MemoryBooks {
    pub fn new(genres: std::sync::Arc<MemoryGenres>) -> Self {
        Self {
            rows: Mutex::new(BookRows::default()),
            genres,
            writes: AtomicUsize::new(0),
            fail_saves: AtomicBool::new(false),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().books.len()
    }

    pub fn authors_of(&self, book_id: &str) -> Vec<String> {
        self.rows
            .lock()
            .unwrap()
            .book_authors
            .get(book_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn series_books(&self, series_id: &str) -> Vec<String> {
        self.rows
            .lock()
            .unwrap()
            .series_books
            .get(series_id)
            .cloned()
            .unwrap_or_default()
    }

    fn assemble(&self, rows: &BookRows, id: &str) -> Option<Book> {
        let mut book = rows.books.get(id)?.clone();

        book.authors = rows.book_authors.get(id).cloned().unwrap_or_default();

        let mut genres: Vec<String> = rows
            .book_genres
            .get(id)
            .into_iter()
            .flatten()
            .filter_map(|genre_id| self.genres.title_of(*genre_id))
            .collect();
        genres.sort();
        book.genres = genres;

        book.series = rows
            .series_books
            .iter()
            .filter_map(|(series_id, book_ids)| {
                book_ids.iter().position(|b| b == id).map(|ix| InSeries {
                    series_id: series_id.clone(),
                    position: Some(ix as u16 + 1),
                })
            })
            .collect();

        Some(book)
    }
}

#[async_trait]
impl BookRepository for MemoryBooks {
    async fn get_by_id(&self, id: &str) -> Result<Option<Book>, StoreError> {
        let rows = self.rows.lock().unwrap();
        Ok(self.assemble(&rows, id))
    }

    async fn get_by_ids(&self, ids: &[String]) -> Result<HashMap<String, Book>, StoreError> {
        let rows = self.rows.lock().unwrap();
        Ok(ids
            .iter()
            .filter_map(|id| self.assemble(&rows, id).map(|b| (id.clone(), b)))
            .collect())
    }

    async fn save(&self, books: &[Book]) -> Result<(), StoreError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(injected("book save"));
        }
        if books.is_empty() {
            return Ok(());
        }
        self.writes.fetch_add(books.len(), Ordering::SeqCst);

        let mut rows = self.rows.lock().unwrap();
        for book in books {
            let mut stored = book.clone();
            // Relations live in the link maps, mirroring the real schema.
            stored.authors = Vec::new();
            stored.genres = Vec::new();
            stored.series = Vec::new();
            rows.books.insert(book.id.clone(), stored);
        }
        Ok(())
    }

    async fn link_book_authors(
        &self,
        book_id: &str,
        author_ids: &[String],
    ) -> Result<(), StoreError> {
        self.rows
            .lock()
            .unwrap()
            .book_authors
            .insert(book_id.to_string(), author_ids.to_vec());
        Ok(())
    }

    async fn link_book_genres(&self, book_id: &str, genre_ids: &[u16]) -> Result<(), StoreError> {
        self.rows
            .lock()
            .unwrap()
            .book_genres
            .insert(book_id.to_string(), genre_ids.to_vec());
        Ok(())
    }

    async fn link_series_books(
        &self,
        series_id: &str,
        book_ids: &[String],
    ) -> Result<(), StoreError> {
        self.rows
            .lock()
            .unwrap()
            .series_books
            .insert(series_id.to_string(), book_ids.to_vec());
        Ok(())
    }

    async fn search(&self, query: &str, limit: i64) -> Result<Vec<Book>, StoreError> {
        let needle = query.to_lowercase();
        let rows = self.rows.lock().unwrap();
        let mut found: Vec<Book> = rows
            .books
            .keys()
            .filter_map(|id| self.assemble(&rows, id))
            .filter(|b| b.title.to_lowercase().contains(&needle))
            .collect();
        found.sort_by(|a, b| a.title.cmp(&b.title));
        found.truncate(limit as usize);
        Ok(found)
    }
}

#[derive(Default)]
pub struct MemorySeries {
    rows: Mutex<HashMap<String, Series>>,
    pub writes: AtomicUsize,
}

impl MemorySeries {
    pub fn get(&self, id: &str) -> Option<Series> {
        self.rows.lock().unwrap().get(id).cloned()
    }
}

#[async_trait]
impl SeriesRepository for MemorySeries {
    async fn get_by_id(&self, id: &str) -> Result<Option<Series>, StoreError> {
        Ok(self.rows.lock().unwrap().get(id).cloned())
    }

    async fn get_by_ids(&self, ids: &[String]) -> Result<HashMap<String, Series>, StoreError> {
        let rows = self.rows.lock().unwrap();
        Ok(ids
            .iter()
            .filter_map(|id| rows.get(id).map(|s| (id.clone(), s.clone())))
            .collect())
    }

    async fn save(&self, series: &Series) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.rows
            .lock()
            .unwrap()
            .insert(series.id.clone(), series.clone());
        Ok(())
    }

    async fn search(&self, query: &str, limit: i64) -> Result<Vec<Series>, StoreError> {
        let needle = query.to_lowercase();
        let rows = self.rows.lock().unwrap();
        let mut found: Vec<Series> = rows
            .values()
            .filter(|s| s.title.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.title.cmp(&b.title));
        found.truncate(limit as usize);
        Ok(found)
    }
}

#[derive(Default)]
struct FailRows {
    next_id: i64,
    records: Vec<FailRecord>,
}

#[derive(Default)]
pub struct MemoryFails {
    rows: Mutex<FailRows>,
    pub fail_saves: AtomicBool,
}

impl MemoryFails {
    pub fn records(&self) -> Vec<FailRecord> {
        self.rows.lock().unwrap().records.clone()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().records.len()
    }

    /// Seeds a pre-existing fail row, as if written by an earlier run.
    pub fn seed(&self, start_time: DateTime<Utc>, feed: ResumableFeed, error: &str) {
        let mut rows = self.rows.lock().unwrap();
        rows.next_id += 1;
        let id = rows.next_id;
        rows.records.push(FailRecord {
            id,
            start_time,
            feed,
            error: error.to_string(),
        });
    }
}

#[async_trait]
impl FailRepository for MemoryFails {
    async fn save(
        &self,
        start_time: DateTime<Utc>,
        feed: &ResumableFeed,
        error: &str,
    ) -> Result<(), StoreError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(injected("fail save"));
        }

        // Round-trip through JSON like the real store, so descriptor
        // serialization stays covered.
        let json = serde_json::to_value(feed).map_err(|e| StoreError::Data(e.to_string()))?;
        let feed: ResumableFeed =
            serde_json::from_value(json).map_err(|e| StoreError::Data(e.to_string()))?;

        self.seed(start_time, feed, error);
        Ok(())
    }

    async fn fails_not_after(
        &self,
        not_after: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<FailRecord>, StoreError> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .records
            .iter()
            .filter(|r| r.start_time <= not_after)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn delete(&self, id: i64) -> Result<(), StoreError> {
        self.rows.lock().unwrap().records.retain(|r| r.id != id);
        Ok(())
    }
}
