//! The feed-id and href taxonomy, and promotion of OPDS entries into domain
//! objects.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{error, info, warn};
use url::Url;

use crate::model::Book;
use crate::opds::Entry;

use super::link::{self, SkipLevel};

static TAG_AUTHORS_INDEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^tag:authors:[^:]+$").expect("authors index id regex is valid"));
static TAG_AUTHOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^tag:author:(\d+)$").expect("author id regex is valid"));
static TAG_AUTHOR_BIO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^tag:author:bio:\d+$").expect("author bio id regex is valid"));
static TAG_AUTHOR_BOOKS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^tag:author:\d+:alphabet$").expect("author books id regex is valid")
});
static TAG_BOOK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^tag:book:[^:]+$").expect("book id regex is valid"));
static TAG_SEQUENCES_INDEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^tag:sequences:[^:]+$").expect("sequences index id regex is valid")
});
static TAG_SEQUENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^tag:sequence:\d+$").expect("sequence id regex is valid"));

static HREF_AUTHOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/opds/author/\d+$").expect("author href regex is valid"));
static HREF_AUTHOR_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/a/(\d+)$").expect("author back-reference regex is valid"));
static HREF_SERIES_BOOKS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/opds/sequencebooks/\d+$").expect("series books href regex is valid")
});

static IMAGE_TYPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^image/[^/]+$").expect("image media type regex is valid"));

/// Feed title of an author description page, capturing the author name.
static AUTHOR_FEED_TITLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^Книги автора\s+(.+)$").expect("author feed title regex is valid")
});

pub(crate) fn is_authors_index_id(id: &str) -> bool {
    TAG_AUTHORS_INDEX.is_match(id)
}

pub(crate) fn is_author_id(id: &str) -> bool {
    TAG_AUTHOR.is_match(id)
}

pub(crate) fn is_author_bio_id(id: &str) -> bool {
    TAG_AUTHOR_BIO.is_match(id)
}

pub(crate) fn is_author_books_id(id: &str) -> bool {
    TAG_AUTHOR_BOOKS.is_match(id)
}

pub(crate) fn is_book_id(id: &str) -> bool {
    TAG_BOOK.is_match(id)
}

pub(crate) fn is_sequences_index_id(id: &str) -> bool {
    TAG_SEQUENCES_INDEX.is_match(id)
}

pub(crate) fn is_sequence_id(id: &str) -> bool {
    TAG_SEQUENCE.is_match(id)
}

pub(crate) fn is_author_href(href: &str) -> bool {
    HREF_AUTHOR.is_match(href)
}

pub(crate) fn is_series_books_href(href: &str) -> bool {
    HREF_SERIES_BOOKS.is_match(href)
}

pub(crate) fn is_image_type(media_type: &str) -> bool {
    IMAGE_TYPE.is_match(media_type)
}

/// The numeric part of a `tag:author:NNN` id.
pub(crate) fn author_id_number(id: &str) -> Option<&str> {
    TAG_AUTHOR
        .captures(id)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Reshapes an author back-reference (`/a/NNN`) into a `tag:author:NNN` id.
pub(crate) fn author_id_from_uri(uri: &str) -> Option<String> {
    HREF_AUTHOR_REF
        .captures(uri)
        .and_then(|c| c.get(1))
        .map(|m| format!("tag:author:{}", m.as_str()))
}

/// Extracts an author name from an author description feed title.
pub(crate) fn author_name_from_feed_title(title: &str) -> Option<&str> {
    AUTHOR_FEED_TITLE
        .captures(title)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Promotes a book entry into a [`Book`].
///
/// Never fails: unparseable pieces degrade (year 0, skipped author
/// reference, missing cover) with a log line. Hrefs resolve against
/// `feed_url`.
pub(crate) fn book_from_entry(entry: &Entry, feed_url: &Url) -> Book {
    let issued = entry.issued.trim();
    let year = if issued.is_empty() {
        0
    } else {
        match issued.parse::<u16>() {
            Ok(year) => year,
            Err(err) => {
                warn!(id = entry.id, issued, "failed to parse book year: {err}");
                0
            }
        }
    };

    let mut genres = Vec::with_capacity(entry.categories.len());
    let mut seen_genres = HashSet::with_capacity(entry.categories.len());
    for category in &entry.categories {
        let term = category.term.trim();
        if !seen_genres.insert(term.to_lowercase()) {
            warn!(id = entry.id, genre = term, "duplicate genre within one book");
            continue;
        }
        genres.push(term.to_string());
    }
    genres.sort_unstable();

    let mut authors = Vec::with_capacity(entry.authors.len());
    let mut seen_authors = HashSet::with_capacity(entry.authors.len());
    for author in &entry.authors {
        let Some(author_id) = author_id_from_uri(&author.uri) else {
            error!(id = entry.id, uri = author.uri, "failed to parse author from URI");
            continue;
        };
        if !seen_authors.insert(author_id.clone()) {
            warn!(id = entry.id, author = author_id, "duplicate author within one book");
            continue;
        }
        authors.push(author_id);
    }

    let cover_link = link::choose_link(&entry.links, link::image_link, SkipLevel::Silent);
    let cover = match cover_link {
        None => {
            info!(id = entry.id, "no book cover link");
            None
        }
        Some(found) => match feed_url.join(&found.href) {
            Ok(url) => Some(url),
            Err(err) => {
                error!(id = entry.id, href = found.href, "failed to resolve cover link: {err}");
                None
            }
        },
    };

    Book {
        id: entry.id.clone(),
        title: entry.title.trim().to_string(),
        authors,
        series: Vec::new(),
        genres,
        language: entry.language.trim().to_string(),
        year,
        about: entry
            .content
            .as_ref()
            .map(|c| c.value.trim().to_string())
            .unwrap_or_default(),
        cover,
    }
}
