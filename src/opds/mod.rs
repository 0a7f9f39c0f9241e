//! OPDS Atom feed fetching and decoding.
//!
//! [`fetch_feed`] pulls a catalog document over HTTP, strips XML-illegal
//! codepoints and decodes it into the typed [`Feed`] model. The media type
//! constants used for link matching throughout the crawler live here too.

mod error;
mod feed;
mod sanitize;

use std::time::Duration;

use tracing::{debug, error};
use url::Url;

pub use error::FeedError;
pub use feed::{Category, Content, Entry, EntryAuthor, Feed, Link};
pub use sanitize::strip_disallowed;

/// Media type of OPDS catalog navigation links.
pub const CATALOG_TYPE: &str = "application/atom+xml;profile=opds-catalog";
/// `rel` of image links (covers, avatars).
pub const IMAGE_REL: &str = "http://opds-spec.org/image";
/// `rel` of pagination links.
pub const NEXT_REL: &str = "next";

/// Total per-request timeout. The source occasionally hangs mid-response,
/// so this bounds the whole request, not just the connect.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Builds the shared HTTP client used for every catalog request.
pub fn build_http_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .gzip(true)
        .build()
}

/// Fetches and decodes one catalog feed.
///
/// `kind` is a human label ("authors feed", "series description", ...) used
/// in error messages and logs.
pub async fn fetch_feed(
    client: &reqwest::Client,
    url: &Url,
    kind: &'static str,
) -> Result<Feed, FeedError> {
    debug!(%url, kind, "fetching feed");

    let response = client
        .get(url.clone())
        .send()
        .await
        .map_err(|e| fetch_failed(FeedError::http(kind, url, e)))?;

    let status = response.status();
    if !status.is_success() {
        return Err(fetch_failed(FeedError::status(kind, url, status.as_u16())));
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| fetch_failed(FeedError::read(kind, url, e)))?;

    parse(&body).map_err(|e| fetch_failed(FeedError::decode(kind, url, e)))
}

fn fetch_failed(err: FeedError) -> FeedError {
    error!(error = %err, "feed fetch failed");
    err
}

/// Decodes a raw feed document, stripping XML-illegal codepoints first.
pub fn parse(bytes: &[u8]) -> Result<Feed, quick_xml::DeError> {
    let cleansed = strip_disallowed(bytes);
    let mut feed: Feed = quick_xml::de::from_reader(cleansed.as_ref())?;
    feed.normalize();
    Ok(feed)
}
