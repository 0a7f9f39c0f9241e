//! Domain types shared between the crawler and the storage layer.

use serde::{Deserialize, Serialize};
use url::Url;

/// A catalog author.
///
/// `id` is the opaque feed identifier (`tag:author:NNN`), not a database
/// surrogate. `bio` and `avatar` are filled from the author description feed
/// and may stay empty when the source does not provide them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub avatar: Option<Url>,
}

impl Author {
    /// An author known only by id, before the description feed was fetched.
    pub fn bare(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            bio: String::new(),
            avatar: None,
        }
    }
}

/// A book series (`tag:sequence:NNN`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Series {
    pub id: String,
    pub title: String,
}

/// Membership of a book in a series.
///
/// `position` is the 1-based order within the series feed; `None` when the
/// book was never seen through its series feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InSeries {
    pub series_id: String,
    pub position: Option<u16>,
}

/// A catalog book (`tag:book:NNN`).
///
/// `authors` preserves source-feed order and is unique; `genres` is unique
/// case-insensitively and sorted ascending. `series` is only populated when
/// the book is loaded back from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub id: String,
    pub title: String,
    pub authors: Vec<String>,
    #[serde(default)]
    pub series: Vec<InSeries>,
    pub genres: Vec<String>,
    pub language: String,
    pub year: u16,
    pub about: String,
    pub cover: Option<Url>,
}

/// The five feed shapes the crawler distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedKind {
    AuthorsIndex,
    Author,
    Books,
    SequencesIndex,
    Series,
}

impl FeedKind {
    /// Human label used in log lines and error messages.
    pub fn label(self) -> &'static str {
        match self {
            Self::AuthorsIndex => "authors index",
            Self::Author => "author description",
            Self::Books => "books feed",
            Self::SequencesIndex => "sequences index",
            Self::Series => "series",
        }
    }
}

/// The minimal self-contained descriptor of an interrupted subtree.
///
/// Given only these fields the crawler reproduces the exact work that was in
/// flight when a failure was recorded. Use the constructors below; `author`
/// is required for [`FeedKind::Author`] and [`FeedKind::Books`], `series`
/// for [`FeedKind::Series`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumableFeed {
    pub url: Url,
    pub kind: FeedKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<Author>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series: Option<Series>,
}

impl ResumableFeed {
    pub fn authors_index(url: Url) -> Self {
        Self {
            url,
            kind: FeedKind::AuthorsIndex,
            author: None,
            series: None,
        }
    }

    pub fn author(url: Url, author: Author) -> Self {
        Self {
            url,
            kind: FeedKind::Author,
            author: Some(author),
            series: None,
        }
    }

    pub fn books(url: Url, author: Author) -> Self {
        Self {
            url,
            kind: FeedKind::Books,
            author: Some(author),
            series: None,
        }
    }

    pub fn sequences_index(url: Url) -> Self {
        Self {
            url,
            kind: FeedKind::SequencesIndex,
            author: None,
            series: None,
        }
    }

    pub fn series(url: Url, series: Series) -> Self {
        Self {
            url,
            kind: FeedKind::Series,
            author: None,
            series: Some(series),
        }
    }
}
