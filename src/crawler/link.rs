//! Selection of the unique entry link matching a caller predicate.

use tracing::{info, warn};

use crate::opds::{CATALOG_TYPE, IMAGE_REL, Link};

use super::extract;

/// How loudly to report links the predicate rejects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SkipLevel {
    Silent,
    Info,
    Warn,
}

/// Returns the single link for which `matcher` reports no mismatch.
///
/// `matcher` returns `None` on a match or a mismatch reason otherwise.
/// Rejected links are logged at `skip_level`; duplicate matches are warned
/// about and discarded — the first match wins.
pub(crate) fn choose_link<'a, F>(links: &'a [Link], matcher: F, skip_level: SkipLevel) -> Option<&'a Link>
where
    F: Fn(&Link) -> Option<String>,
{
    let mut chosen: Option<&Link> = None;

    for link in links {
        if let Some(reason) = matcher(link) {
            match skip_level {
                SkipLevel::Silent => {}
                SkipLevel::Info => info!(href = %link.href, "skip non-matching link: {reason}"),
                SkipLevel::Warn => warn!(href = %link.href, "skip non-matching link: {reason}"),
            }
            continue;
        }

        if chosen.is_some() {
            warn!(href = %link.href, "skip duplicate matching link");
            continue;
        }

        chosen = Some(link);
    }

    chosen
}

/// Matches catalog navigation links.
pub(crate) fn catalog_link(link: &Link) -> Option<String> {
    (link.media_type != CATALOG_TYPE).then(|| format!("unknown type: {}", link.media_type))
}

/// Matches image links (covers and avatars).
pub(crate) fn image_link(link: &Link) -> Option<String> {
    if link.rel != IMAGE_REL {
        return Some(format!("unknown rel: {}", link.rel));
    }
    if !extract::is_image_type(&link.media_type) {
        return Some(format!("unknown type: {}", link.media_type));
    }
    None
}

/// Matches pagination links (`rel = next`, catalog media type).
pub(crate) fn next_page_link(link: &Link) -> Option<String> {
    if link.rel != crate::opds::NEXT_REL {
        return Some(format!("unknown rel: {}", link.rel));
    }
    catalog_link(link)
}
