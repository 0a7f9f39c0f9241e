//! The books-feed subtree: per-page batches with in-page dedup and
//! pagination.

use std::collections::HashSet;

use tracing::{debug, warn};
use url::Url;

use crate::model::{Author, ResumableFeed};
use crate::opds;

use super::authors::AuthorResolver;
use super::error::CrawlError;
use super::{absorb, extract, next_page, WalkContext};

/// Walks one author's books feed, emitting a batch per page.
pub(crate) struct BooksWalk<'a> {
    pub(crate) cx: &'a WalkContext<'a>,
    pub(crate) author: &'a Author,
    pub(crate) feed: Url,
}

impl BooksWalk<'_> {
    pub(crate) async fn crawl(&self) -> Result<(), CrawlError> {
        debug!(feed = %self.feed.path(), "processing books feed");

        let feed = opds::fetch_feed(self.cx.http, &self.feed, "books feed").await?;

        let mut books = Vec::with_capacity(feed.entries.len());
        let mut seen = HashSet::with_capacity(feed.entries.len());

        for entry in &feed.entries {
            if extract::is_book_id(&entry.id) {
                debug!(id = entry.id, "found book");

                if !seen.insert(entry.id.clone()) {
                    warn!(id = entry.id, "duplicate book in feed");
                    continue;
                }

                books.push(extract::book_from_entry(entry, &self.feed));
            } else {
                warn!(id = entry.id, "unknown entry in books feed");
            }
        }

        if books.is_empty() {
            warn!(feed = %self.feed.path(), "no books parsed from feed");
        } else {
            let resolver = AuthorResolver {
                author: Some(self.author),
                http: self.cx.http,
                feed: &self.feed,
            };
            self.cx
                .consumer
                .consume_books(&books, &resolver)
                .await
                .map_err(CrawlError::Consumer)?;
        }

        if let Some(next) = next_page(&feed, &self.feed)? {
            let walk = BooksWalk {
                cx: self.cx,
                author: self.author,
                feed: next.clone(),
            };
            return absorb(
                Box::pin(walk.crawl()).await,
                ResumableFeed::books(next, self.author.clone()),
                self.cx.handler,
            )
            .await;
        }

        Ok(())
    }
}
