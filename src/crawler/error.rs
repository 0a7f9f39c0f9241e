//! Error types for the crawl pipeline.
//!
//! The crawler distinguishes two classes of failure: recoverable errors
//! (network, decode, malformed links) that are persisted as fail records and
//! absorbed, and unresumable errors (consumer or handler failures) that
//! abort the whole run — those indicate a store outage or a bug, and
//! persisting a fail record would itself require the store.

use thiserror::Error;

use crate::opds::FeedError;
use crate::storage::StoreError;

/// Error returned by a [`Consumer`](super::Consumer) implementation.
#[derive(Debug, Error)]
pub enum ConsumerError {
    /// A repository operation failed.
    #[error("store operation failed: {0}")]
    Store(#[from] StoreError),

    /// Hydrating a referenced author through the [`AuthorSource`](super::AuthorSource) failed.
    #[error("hydrating author {id}: {source}")]
    Hydrate {
        id: String,
        #[source]
        source: Box<CrawlError>,
    },

    /// A genre title could not be resolved to an id even after insertion.
    #[error("genre {0:?} missing after insert")]
    GenreResolution(String),
}

/// The error handler itself failed while persisting a fail record.
#[derive(Debug, Error)]
#[error("saving fail record: {0}")]
pub struct HandlerError(#[from] pub StoreError);

/// Any failure inside a crawl or resume.
#[derive(Debug, Error)]
pub enum CrawlError {
    /// Fetch/read/decode failure for a specific feed. Recoverable.
    #[error(transparent)]
    Feed(#[from] FeedError),

    /// The next-page link of a feed did not resolve. Recoverable.
    #[error("resolving next page link {href:?}: {source}")]
    NextPageLink {
        href: String,
        #[source]
        source: url::ParseError,
    },

    /// An href did not resolve against its feed URL. Recoverable.
    #[error("resolving href {href:?}: {source}")]
    Href {
        href: String,
        #[source]
        source: url::ParseError,
    },

    /// An author id did not match the feed-id taxonomy.
    #[error("could not parse author id in {0:?}")]
    AuthorId(String),

    /// A fail record descriptor lacked its required entity.
    #[error("fail descriptor for {0} is missing its entity")]
    IncompleteDescriptor(&'static str),

    /// The consumer rejected an entity. Unresumable.
    #[error("consumer failed: {0}")]
    Consumer(#[source] ConsumerError),

    /// The error handler failed. Unresumable.
    #[error("error handler failed: {0}")]
    Handler(#[source] HandlerError),
}

impl CrawlError {
    /// `true` for failures that must abort the whole run instead of being
    /// persisted as a fail record.
    pub fn is_unresumable(&self) -> bool {
        matches!(self, Self::Consumer(_) | Self::Handler(_))
    }
}
