//! The resume driver: replays fail records captured by earlier runs.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::info;
use url::Url;

use crate::crawler::{Consumer, CrawlError, Crawler, ErrorHandler};
use crate::storage::{FailRepository, StoreError};

/// Fail rows fetched per round-trip.
const BATCH_SIZE: i64 = 100;

/// A resume run failed. All variants abort the run; recoverable failures
/// inside a replayed subtree are re-recorded by the handler instead.
#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("fetching list of fails: {0}")]
    Fetch(#[source] StoreError),

    #[error("resuming {url}: {source}")]
    Resume {
        url: Url,
        #[source]
        source: CrawlError,
    },

    #[error("deleting fail #{id} ({url}): {source}")]
    Delete {
        id: i64,
        url: Url,
        #[source]
        source: StoreError,
    },
}

/// Replays every fail row with `start_time <= not_after`.
///
/// Rows are fetched in batches of [`BATCH_SIZE`] and deleted one by one
/// after their subtree replayed successfully; the loop ends when a fetch
/// comes back empty. A subtree that fails recoverably again is recorded by
/// `handler` under the current run's start time, so it stays out of this
/// run's threshold.
pub async fn replay_failures(
    crawler: &Crawler,
    fails: &dyn FailRepository,
    consumer: &dyn Consumer,
    handler: &dyn ErrorHandler,
    not_after: DateTime<Utc>,
) -> Result<(), ReplayError> {
    loop {
        let records = fails
            .fails_not_after(not_after, BATCH_SIZE)
            .await
            .map_err(ReplayError::Fetch)?;

        if records.is_empty() {
            return Ok(());
        }

        for record in records {
            let url = record.feed.url.clone();

            crawler
                .resume(record.feed, consumer, handler)
                .await
                .map_err(|source| ReplayError::Resume {
                    url: url.clone(),
                    source,
                })?;

            fails
                .delete(record.id)
                .await
                .map_err(|source| ReplayError::Delete {
                    id: record.id,
                    url: url.clone(),
                    source,
                })?;

            info!(id = record.id, %url, "replayed fail");
        }
    }
}
