//! The authors-index subtree: nested index recursion, author description
//! pages, and on-demand author hydration for the consumer.

use async_trait::async_trait;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::model::{Author, ResumableFeed};
use crate::opds;

use super::books::BooksWalk;
use super::consumer::AuthorSource;
use super::error::CrawlError;
use super::link::{self, SkipLevel};
use super::{absorb, extract, next_page, WalkContext};

/// Walks one authors-index feed, descending into nested indexes and author
/// pages and following pagination.
pub(crate) struct AuthorsWalk<'a> {
    pub(crate) cx: &'a WalkContext<'a>,
    pub(crate) feed: Url,
}

impl AuthorsWalk<'_> {
    fn with_feed(&self, feed: Url) -> AuthorsWalk<'_> {
        AuthorsWalk { cx: self.cx, feed }
    }

    pub(crate) async fn crawl(&self) -> Result<(), CrawlError> {
        debug!(feed = %self.feed.path(), "processing authors index");

        let feed = opds::fetch_feed(self.cx.http, &self.feed, "authors index").await?;

        for entry in &feed.entries {
            if extract::is_authors_index_id(&entry.id) {
                debug!(id = entry.id, "found nested authors index");

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
                    ResumableFeed::authors_index(nested),
                    self.cx.handler,
                )
                .await?;
            } else if extract::is_author_id(&entry.id) {
                debug!(id = entry.id, "found author");

                let author = Author {
                    id: entry.id.clone(),
                    name: entry.title.trim().to_string(),
                    bio: String::new(),
                    avatar: None,
                };

                let Some(found) = link::choose_link(
                    &entry.links,
                    |l| {
                        link::catalog_link(l).or_else(|| {
                            (!extract::is_author_href(&l.href))
                                .then(|| format!("invalid href: {}", l.href))
                        })
                    },
                    SkipLevel::Silent,
                ) else {
                    warn!(id = entry.id, "failed to choose link for author description");
                    continue;
                };

                let author_url = match self.feed.join(&found.href) {
                    Ok(url) => url,
                    Err(err) => {
                        error!(
                            id = entry.id,
                            href = found.href,
                            "failed to resolve author description link: {err}"
                        );
                        continue;
                    }
                };

                absorb(
                    self.author(&author_url, author.clone()).await,
                    ResumableFeed::author(author_url.clone(), author),
                    self.cx.handler,
                )
                .await?;
            } else {
                warn!(id = entry.id, "unknown entry in authors index");
            }
        }

        if let Some(next) = next_page(&feed, &self.feed)? {
            let walk = self.with_feed(next.clone());
            return absorb(
                Box::pin(walk.crawl()).await,
                ResumableFeed::authors_index(next),
                self.cx.handler,
            )
            .await;
        }

        Ok(())
    }

    /// Processes one author: fetches the description feed, emits the author
    /// to the consumer, then walks the author's books feed.
    pub(crate) async fn author(
        &self,
        author_url: &Url,
        mut author: Author,
    ) -> Result<(), CrawlError> {
        debug!(
            id = author.id,
            name = author.name,
            url = %author_url.path(),
            "processing author"
        );

        let books_url = fetch_author_details(self.cx.http, author_url, &mut author).await?;

        let Some(books_url) = books_url else {
            warn!(id = author.id, "no link to author books feed");
            return Ok(());
        };

        self.cx
            .consumer
            .consume_author(&author)
            .await
            .map_err(CrawlError::Consumer)?;

        let walk = BooksWalk {
            cx: self.cx,
            author: &author,
            feed: books_url.clone(),
        };
        absorb(
            walk.crawl().await,
            ResumableFeed::books(books_url, author.clone()),
            self.cx.handler,
        )
        .await
    }
}

/// Fetches an author description feed and fills `bio`, `avatar` and (when
/// the title form allows) `name`. Returns the resolved URL of the author's
/// books feed, when one was advertised.
///
/// Author pages also carry cross-sale entries (books by series and the
/// like); those are expected and ignored without a warning.
pub(crate) async fn fetch_author_details(
    http: &reqwest::Client,
    author_url: &Url,
    author: &mut Author,
) -> Result<Option<Url>, CrawlError> {
    let feed = opds::fetch_feed(http, author_url, "author description").await?;

    if author.name.is_empty() {
        match extract::author_name_from_feed_title(feed.title.trim()) {
            Some(name) => author.name = name.to_string(),
            None => warn!(
                url = %author_url.path(),
                title = feed.title,
                "failed to find author name in feed title"
            ),
        }
    }

    let mut found_bio = false;
    let mut books_url: Option<Url> = None;

    for entry in &feed.entries {
        if extract::is_author_bio_id(&entry.id) {
            debug!(id = entry.id, "found author bio");
            found_bio = true;

            author.bio = entry
                .content
                .as_ref()
                .map(|c| c.value.clone())
                .unwrap_or_default();

            match link::choose_link(&entry.links, link::image_link, SkipLevel::Silent) {
                None => info!(id = entry.id, "no avatar link"),
                Some(found) => match author_url.join(&found.href) {
                    Ok(url) => author.avatar = Some(url),
                    Err(err) => error!(
                        id = entry.id,
                        href = found.href,
                        "failed to resolve avatar link: {err}"
                    ),
                },
            }
        } else if extract::is_author_books_id(&entry.id) {
            if books_url.is_some() {
                warn!(id = entry.id, "duplicate author books feed");
                continue;
            }

            debug!(id = entry.id, "found author books feed");

            let Some(found) = link::choose_link(&entry.links, link::catalog_link, SkipLevel::Warn)
            else {
                warn!(id = entry.id, "failed to choose link for author books");
                continue;
            };

            match author_url.join(&found.href) {
                Ok(url) => books_url = Some(url),
                Err(err) => error!(
                    id = entry.id,
                    href = found.href,
                    "failed to resolve author books link: {err}"
                ),
            }
        }
    }

    if !found_bio {
        info!(id = author.id, "no bio entry");
    }

    Ok(books_url)
}

/// Hydrates authors referenced by books on consumer request.
///
/// When the requested id is the author whose subtree is being walked, the
/// already-known value is returned without a network round-trip; otherwise
/// the description URL is synthesized from the id and fetched without
/// emitting anything to the consumer.
pub(crate) struct AuthorResolver<'a> {
    pub(crate) author: Option<&'a Author>,
    pub(crate) http: &'a reqwest::Client,
    pub(crate) feed: &'a Url,
}

#[async_trait]
impl AuthorSource for AuthorResolver<'_> {
    async fn fetch_author(&self, id: &str) -> Result<Author, CrawlError> {
        if let Some(author) = self.author {
            if author.id == id {
                return Ok(author.clone());
            }
        }

        let Some(number) = extract::author_id_number(id) else {
            error!(id, "failed to parse author id for hydration");
            return Err(CrawlError::AuthorId(id.to_string()));
        };

        let href = format!("/opds/author/{number}");
        let author_url = self.feed.join(&href).map_err(|source| CrawlError::Href {
            href: href.clone(),
            source,
        })?;

        let mut author = Author::bare(id);
        debug!(id, url = %author_url.path(), "fetching author on consumer request");
        fetch_author_details(self.http, &author_url, &mut author).await?;

        Ok(author)
    }
}
