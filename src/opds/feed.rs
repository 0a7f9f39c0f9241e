//! Typed document model for OPDS Atom feeds.
//!
//! Only the subset the crawler consumes is modeled; unknown elements are
//! skipped by the decoder. Entry ids and link `rel`/`type` attributes are
//! whitespace-trimmed during [`normalize`](Feed::normalize) so downstream
//! matching never has to.

use serde::Deserialize;

/// An OPDS catalog feed: a title, top-level navigation links and entries.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct Feed {
    #[serde(default)]
    pub title: String,
    #[serde(rename = "link", default)]
    pub links: Vec<Link>,
    #[serde(rename = "entry", default)]
    pub entries: Vec<Entry>,
}

impl Feed {
    /// Trims the fields the crawler matches on. Upstream pads some of them
    /// with stray whitespace.
    pub(crate) fn normalize(&mut self) {
        self.title = self.title.trim().to_string();
        for link in &mut self.links {
            link.normalize();
        }
        for entry in &mut self.entries {
            entry.id = entry.id.trim().to_string();
            for link in &mut entry.links {
                link.normalize();
            }
        }
    }
}

/// A single catalog entry: an author, a book, a series, or a nested index.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct Entry {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: Option<Content>,
    /// Dublin Core `dc:issued` — the publication year as free text.
    #[serde(default, alias = "dc:issued")]
    pub issued: String,
    /// Dublin Core `dc:language`.
    #[serde(default, alias = "dc:language")]
    pub language: String,
    #[serde(rename = "author", default)]
    pub authors: Vec<EntryAuthor>,
    #[serde(rename = "category", default)]
    pub categories: Vec<Category>,
    #[serde(rename = "link", default)]
    pub links: Vec<Link>,
}

/// Entry body text (`<content>`); upstream uses escaped HTML.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct Content {
    #[serde(rename = "@type", default)]
    pub content_type: String,
    #[serde(rename = "$text", default)]
    pub value: String,
}

/// An `<author>` element inside an entry; `uri` carries the catalog
/// back-reference (`/a/NNN`).
#[derive(Debug, Default, Clone, Deserialize)]
pub struct EntryAuthor {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub uri: String,
}

/// A `<category>` element; `term` is the genre title.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct Category {
    #[serde(rename = "@term", default)]
    pub term: String,
}

/// A navigation or resource link.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct Link {
    #[serde(rename = "@rel", default)]
    pub rel: String,
    #[serde(rename = "@type", default)]
    pub media_type: String,
    #[serde(rename = "@href", default)]
    pub href: String,
}

impl Link {
    fn normalize(&mut self) {
        self.rel = self.rel.trim().to_string();
        self.media_type = self.media_type.trim().to_string();
    }
}
