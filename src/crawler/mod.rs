//! The recursive traversal engine over the authors-index and
//! sequences-index trees.
//!
//! Each subtree is wrapped in [`absorb`]: recoverable failures are offered
//! to the [`ErrorHandler`] as a [`ResumableFeed`] descriptor and the crawl
//! continues with siblings, while consumer and handler failures abort the
//! whole run.

mod authors;
mod books;
mod consumer;
mod error;
mod extract;
mod handler;
mod link;
mod series;

use tracing::{debug, error};
use url::Url;

use crate::model::{FeedKind, ResumableFeed};
use crate::opds::Feed;

pub use consumer::{AuthorSource, Consumer, LoggingConsumer, StoringConsumer};
pub use error::{ConsumerError, CrawlError, HandlerError};
pub use handler::{ErrorHandler, StoringHandler};

use authors::AuthorsWalk;
use books::BooksWalk;
use link::SkipLevel;
use series::SeriesWalk;

/// Shared state threaded through every walker of one run.
pub(crate) struct WalkContext<'a> {
    pub(crate) http: &'a reqwest::Client,
    pub(crate) consumer: &'a dyn Consumer,
    pub(crate) handler: &'a dyn ErrorHandler,
}

/// The crawler over an OPDS book catalog.
pub struct Crawler {
    http: reqwest::Client,
}

impl Crawler {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// A full crawl: the authors-index tree first, then the sequences-index
    /// tree.
    pub async fn crawl(
        &self,
        authors_feed: Url,
        series_feed: Url,
        consumer: &dyn Consumer,
        handler: &dyn ErrorHandler,
    ) -> Result<(), CrawlError> {
        let cx = WalkContext {
            http: &self.http,
            consumer,
            handler,
        };

        let walk = AuthorsWalk {
            cx: &cx,
            feed: authors_feed.clone(),
        };
        absorb(
            walk.crawl().await,
            ResumableFeed::authors_index(authors_feed),
            handler,
        )
        .await?;

        let walk = SeriesWalk {
            cx: &cx,
            feed: series_feed.clone(),
        };
        absorb(
            walk.crawl().await,
            ResumableFeed::sequences_index(series_feed),
            handler,
        )
        .await
    }

    /// Restarts the subtree described by a fail record at its exact entry
    /// point.
    pub async fn resume(
        &self,
        feed: ResumableFeed,
        consumer: &dyn Consumer,
        handler: &dyn ErrorHandler,
    ) -> Result<(), CrawlError> {
        debug!(kind = feed.kind.label(), url = %feed.url.path(), "resuming");

        let cx = WalkContext {
            http: &self.http,
            consumer,
            handler,
        };

        let result = match &feed.kind {
            FeedKind::AuthorsIndex => {
                AuthorsWalk {
                    cx: &cx,
                    feed: feed.url.clone(),
                }
                .crawl()
                .await
            }
            FeedKind::Author => match feed.author.clone() {
                None => Err(CrawlError::IncompleteDescriptor("author description")),
                Some(author) => {
                    AuthorsWalk {
                        cx: &cx,
                        feed: feed.url.clone(),
                    }
                    .author(&feed.url, author)
                    .await
                }
            },
            FeedKind::Books => match &feed.author {
                None => Err(CrawlError::IncompleteDescriptor("books feed")),
                Some(author) => {
                    BooksWalk {
                        cx: &cx,
                        author,
                        feed: feed.url.clone(),
                    }
                    .crawl()
                    .await
                }
            },
            FeedKind::SequencesIndex => {
                SeriesWalk {
                    cx: &cx,
                    feed: feed.url.clone(),
                }
                .crawl()
                .await
            }
            FeedKind::Series => match feed.series.clone() {
                None => Err(CrawlError::IncompleteDescriptor("series")),
                Some(series) => {
                    SeriesWalk {
                        cx: &cx,
                        feed: feed.url.clone(),
                    }
                    .series_page(&feed.url, series)
                    .await
                }
            },
        };

        absorb(result, feed, handler).await
    }
}

/// Applies the crawl error policy to one subtree result.
///
/// Recoverable errors are handed to the handler together with the subtree's
/// descriptor; if the handler accepts them the crawl goes on. Unresumable
/// errors, and handler failures, short-circuit to the top of the recursion.
pub(crate) async fn absorb(
    result: Result<(), CrawlError>,
    feed: ResumableFeed,
    handler: &dyn ErrorHandler,
) -> Result<(), CrawlError> {
    let Err(err) = result else {
        return Ok(());
    };

    if err.is_unresumable() {
        return Err(err);
    }

    match handler.handle(&feed, &err).await {
        Ok(()) => {
            error!(
                kind = feed.kind.label(),
                url = %feed.url,
                "ignoring recorded failure: {err}"
            );
            Ok(())
        }
        Err(handler_err) => {
            error!(
                kind = feed.kind.label(),
                url = %feed.url,
                "failed to record failure {err}: {handler_err}"
            );
            Err(CrawlError::Handler(handler_err))
        }
    }
}

/// Resolves the pagination link of a feed, when present.
///
/// An unresolvable next-page href is an error for the enclosing subtree, not
/// a skippable link: silently dropping it would truncate the feed.
pub(crate) fn next_page(feed: &Feed, base: &Url) -> Result<Option<Url>, CrawlError> {
    let Some(found) = link::choose_link(&feed.links, link::next_page_link, SkipLevel::Silent)
    else {
        return Ok(None);
    };

    debug!(feed = %base.path(), "found link to the next page");

    match base.join(&found.href) {
        Ok(url) => Ok(Some(url)),
        Err(source) => {
            error!(href = found.href, "failed to resolve next page link: {source}");
            Err(CrawlError::NextPageLink {
                href: found.href.clone(),
                source,
            })
        }
    }
}
