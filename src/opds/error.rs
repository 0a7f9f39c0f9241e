//! Error type for fetching and decoding OPDS feeds.

use thiserror::Error;
use url::Url;

/// A feed could not be fetched, read, or decoded.
///
/// All variants are recoverable from the crawler's point of view: the
/// enclosing subtree is offered to the error handler and siblings continue.
#[derive(Debug, Error)]
pub enum FeedError {
    /// Network-level failure (DNS, connect, TLS, timeout).
    #[error("fetching {kind} {url}: {source}")]
    Http {
        kind: &'static str,
        url: Url,
        #[source]
        source: reqwest::Error,
    },

    /// Non-success HTTP response.
    #[error("HTTP {status} fetching {kind} {url}")]
    Status {
        kind: &'static str,
        url: Url,
        status: u16,
    },

    /// The response body could not be read.
    #[error("reading {kind} {url}: {source}")]
    Read {
        kind: &'static str,
        url: Url,
        #[source]
        source: reqwest::Error,
    },

    /// The body was not a decodable OPDS Atom document.
    #[error("decoding {kind} {url}: {source}")]
    Decode {
        kind: &'static str,
        url: Url,
        #[source]
        source: quick_xml::DeError,
    },
}

impl FeedError {
    pub(crate) fn http(kind: &'static str, url: &Url, source: reqwest::Error) -> Self {
        Self::Http {
            kind,
            url: url.clone(),
            source,
        }
    }

    pub(crate) fn status(kind: &'static str, url: &Url, status: u16) -> Self {
        Self::Status {
            kind,
            url: url.clone(),
            status,
        }
    }

    pub(crate) fn read(kind: &'static str, url: &Url, source: reqwest::Error) -> Self {
        Self::Read {
            kind,
            url: url.clone(),
            source,
        }
    }

    pub(crate) fn decode(kind: &'static str, url: &Url, source: quick_xml::DeError) -> Self {
        Self::Decode {
            kind,
            url: url.clone(),
            source,
        }
    }
}
