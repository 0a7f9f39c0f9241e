//! Shared fixtures for the integration tests: feed document builders, mock
//! server helpers and a harness bundling the crawler with in-memory
//! repositories.

// Each integration test binary compiles its own copy of this module and
// uses a different subset of it.
#![allow(dead_code)]

pub mod memory;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use bookcrawler::{opds, Crawler, StoringConsumer, StoringHandler};

use memory::{MemoryAuthors, MemoryBooks, MemoryFails, MemoryGenres, MemorySeries};

/// The crawler wired to in-memory repositories.
pub struct Harness {
    pub authors: Arc<MemoryAuthors>,
    pub books: Arc<MemoryBooks>,
    pub genres: Arc<MemoryGenres>,
    pub series: Arc<MemorySeries>,
    pub fails: Arc<MemoryFails>,
    pub consumer: StoringConsumer,
    pub handler: StoringHandler,
    pub crawler: Crawler,
}

impl Harness {
    pub fn new(start_time: DateTime<Utc>) -> Self {
        let authors = Arc::new(MemoryAuthors::default());
        let genres = Arc::new(MemoryGenres::default());
        let books = Arc::new(MemoryBooks::new(genres.clone()));
        let series = Arc::new(MemorySeries::default());
        let fails = Arc::new(MemoryFails::default());

        let consumer = StoringConsumer::new(
            authors.clone(),
            books.clone(),
            genres.clone(),
            series.clone(),
        );
        let handler = StoringHandler::new(start_time, fails.clone());
        let crawler = Crawler::new(opds::build_http_client().unwrap());

        Self {
            authors,
            books,
            genres,
            series,
            fails,
            consumer,
            handler,
            crawler,
        }
    }
}

pub const CATALOG: &str = "application/atom+xml;profile=opds-catalog";
pub const IMAGE_REL: &str = "http://opds-spec.org/image";

pub fn feed_doc(title: &str, body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:dc="http://purl.org/dc/terms/">
  <title>{title}</title>
{body}
</feed>"#
    )
}

pub fn catalog_link(href: &str) -> String {
    format!(r#"<link href="{href}" rel="subsection" type="{CATALOG}"/>"#)
}

pub fn next_link(href: &str) -> String {
    format!(r#"<link href="{href}" rel="next" type="{CATALOG}"/>"#)
}

/// A nested index entry (`tag:authors:...` / `tag:sequences:...`).
pub fn index_entry(id: &str, title: &str, href: &str) -> String {
    format!(
        "<entry><id>{id}</id><title>{title}</title>{}</entry>",
        catalog_link(href)
    )
}

/// An author entry on an authors-index page.
pub fn author_entry(num: u32, name: &str) -> String {
    format!(
        "<entry><id>tag:author:{num}</id><title>{name}</title>{}</entry>",
        catalog_link(&format!("/opds/author/{num}"))
    )
}

/// The bio entry of an author description page.
pub fn bio_entry(num: u32, bio: &str, avatar_href: &str) -> String {
    format!(
        r#"<entry><id>tag:author:bio:{num}</id><title>About</title>
<content type="text/html">{bio}</content>
<link href="{avatar_href}" rel="{IMAGE_REL}" type="image/jpeg"/></entry>"#
    )
}

/// The books-feed pointer entry of an author description page.
pub fn author_books_entry(num: u32, href: &str) -> String {
    format!(
        "<entry><id>tag:author:{num}:alphabet</id><title>Alphabetical</title>{}</entry>",
        catalog_link(href)
    )
}

/// A series entry on a sequences-index page.
pub fn series_entry(num: u32, title: &str) -> String {
    format!(
        "<entry><id>tag:sequence:{num}</id><title>{title}</title>{}</entry>",
        catalog_link(&format!("/opds/sequencebooks/{num}"))
    )
}

/// A book entry with authors, genres and a cover.
pub fn book_entry(
    num: u32,
    title: &str,
    author_nums: &[u32],
    genres: &[&str],
    year: &str,
    language: &str,
) -> String {
    let authors: String = author_nums
        .iter()
        .map(|n| format!("<author><name>Author {n}</name><uri>/a/{n}</uri></author>"))
        .collect();
    let categories: String = genres
        .iter()
        .map(|g| format!(r#"<category term="{g}"/>"#))
        .collect();

    format!(
        r#"<entry><id>tag:book:{num}</id><title>{title}</title>
{authors}{categories}
<dc:issued>{year}</dc:issued><dc:language>{language}</dc:language>
<content type="text/html">About book {num}.</content>
<link href="/i/{num}.jpg" rel="{IMAGE_REL}" type="image/jpeg"/></entry>"#
    )
}

/// Mounts an OPDS document at `route`.
pub async fn mount_feed(server: &MockServer, route: &str, xml: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_raw(xml, "application/atom+xml"))
        .mount(server)
        .await;
}

/// Mounts an HTTP 500 at `route`.
pub async fn mount_500(server: &MockServer, route: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(500))
        .mount(server)
        .await;
}

/// Mounts an HTTP 500 that answers only the first `times` requests; later
/// requests fall through to mocks mounted afterwards.
pub async fn mount_500_times(server: &MockServer, route: &str, times: u64) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(times)
        .mount(server)
        .await;
}

/// An empty sequences index, for tests that only exercise the authors tree.
pub async fn mount_empty_series_root(server: &MockServer) {
    mount_feed(
        server,
        "/opds/sequencesindex",
        feed_doc("Series by name", ""),
    )
    .await;
}

/// An empty authors index, for tests that only exercise the series tree.
pub async fn mount_empty_authors_root(server: &MockServer) {
    mount_feed(
        server,
        "/opds/authorsindex",
        feed_doc("Authors by name", ""),
    )
    .await;
}

pub fn route_url(server: &MockServer, route: &str) -> url::Url {
    url::Url::parse(&format!("{}{route}", server.uri())).unwrap()
}
