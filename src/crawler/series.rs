//! The sequences-index subtree: nested index recursion, series pages and
//! their book batches.

use std::collections::HashSet;

use tracing::{debug, error, warn};
use url::Url;

use crate::model::{ResumableFeed, Series};
use crate::opds;

use super::authors::AuthorResolver;
use super::error::CrawlError;
use super::link::{self, SkipLevel};
use super::{absorb, extract, next_page, WalkContext};

/// Walks one sequences-index feed, descending into nested indexes and
/// series pages and following pagination.
pub(crate) struct SeriesWalk<'a> {
    pub(crate) cx: &'a WalkContext<'a>,
    pub(crate) feed: Url,
}

impl SeriesWalk<'_> {
    fn with_feed(&self, feed: Url) -> SeriesWalk<'_> {
        SeriesWalk { cx: self.cx, feed }
    }

    pub(crate) async fn crawl(&self) -> Result<(), CrawlError> {
        debug!(feed = %self.feed.path(), "processing sequences index");

        let feed = opds::fetch_feed(self.cx.http, &self.feed, "sequences index").await?;

        for entry in &feed.entries {
            if extract::is_sequences_index_id(&entry.id) {
                debug!(id = entry.id, "found nested sequences index");

                let Some(found) =
                    link::choose_link(&entry.links, link::catalog_link, SkipLevel::Warn)
                else {
                    warn!(id = entry.id, "failed to choose link for nested index");
                    continue;
                };

                let nested = match self.feed.join(&found.href) {
                    Ok(url) => url,
                    Err(err) => {
                        error!(
                            id = entry.id,
                            href = found.href,
                            "failed to resolve nested index link: {err}"
                        );
                        continue;
                    }
                };

                let walk = self.with_feed(nested.clone());
                absorb(
                    Box::pin(walk.crawl()).await,
                    ResumableFeed::sequences_index(nested),
                    self.cx.handler,
                )
                .await?;
            } else if extract::is_sequence_id(&entry.id) {
                debug!(id = entry.id, "found series");

                let series = Series {
                    id: entry.id.clone(),
                    title: entry.title.trim().to_string(),
                };

                let Some(found) = link::choose_link(
                    &entry.links,
                    |l| {
                        link::catalog_link(l).or_else(|| {
                            (!extract::is_series_books_href(&l.href))
                                .then(|| format!("invalid href: {}", l.href))
                        })
                    },
                    SkipLevel::Silent,
                ) else {
                    warn!(id = entry.id, "failed to choose link for series description");
                    continue;
                };

                let series_url = match self.feed.join(&found.href) {
                    Ok(url) => url,
                    Err(err) => {
                        error!(
                            id = entry.id,
                            href = found.href,
                            "failed to resolve series description link: {err}"
                        );
                        continue;
                    }
                };

                absorb(
                    self.series_page(&series_url, series.clone()).await,
                    ResumableFeed::series(series_url.clone(), series),
                    self.cx.handler,
                )
                .await?;
            } else {
                warn!(id = entry.id, "unknown entry in sequences index");
            }
        }

        if let Some(next) = next_page(&feed, &self.feed)? {
            let walk = self.with_feed(next.clone());
            return absorb(
                Box::pin(walk.crawl()).await,
                ResumableFeed::sequences_index(next),
                self.cx.handler,
            )
            .await;
        }

        Ok(())
    }

    /// Processes one series page: collects its books and emits the series
    /// with its book batch to the consumer.
    pub(crate) async fn series_page(
        &self,
        series_url: &Url,
        series: Series,
    ) -> Result<(), CrawlError> {
        debug!(
            id = series.id,
            title = series.title,
            url = %series_url.path(),
            "processing series"
        );

        let feed = opds::fetch_feed(self.cx.http, series_url, "series description").await?;

        let mut books = Vec::with_capacity(feed.entries.len());
        let mut seen = HashSet::with_capacity(feed.entries.len());

        for entry in &feed.entries {
            if extract::is_book_id(&entry.id) {
                if !seen.insert(entry.id.clone()) {
                    warn!(id = entry.id, "duplicate book in series");
                    continue;
                }

                books.push(extract::book_from_entry(entry, series_url));
            } else {
                warn!(id = entry.id, "unknown entry in series");
            }
        }

        if books.is_empty() {
            warn!(id = series.id, title = series.title, "empty series");
            return Ok(());
        }

        let resolver = AuthorResolver {
            author: None,
            http: self.cx.http,
            feed: series_url,
        };
        self.cx
            .consumer
            .consume_series(&series, &books, &resolver)
            .await
            .map_err(CrawlError::Consumer)
    }
}
