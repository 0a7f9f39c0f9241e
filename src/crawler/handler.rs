//! Capture of recoverable failures as persisted fail records.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::model::ResumableFeed;
use crate::storage::FailRepository;

use super::error::{CrawlError, HandlerError};

/// Decides what happens to a recoverable crawl failure.
///
/// Returning `Ok` means the failure is recorded and the crawl continues with
/// sibling entries; a handler error aborts the run.
#[async_trait]
pub trait ErrorHandler: Send + Sync {
    async fn handle(&self, feed: &ResumableFeed, error: &CrawlError) -> Result<(), HandlerError>;
}

/// Persists each failure as a fail row keyed by the run's start time.
pub struct StoringHandler {
    start_time: DateTime<Utc>,
    fails: Arc<dyn FailRepository>,
}

impl StoringHandler {
    /// `start_time` is the run's wall-clock start, set once at process boot.
    pub fn new(start_time: DateTime<Utc>, fails: Arc<dyn FailRepository>) -> Self {
        Self { start_time, fails }
    }
}

#[async_trait]
impl ErrorHandler for StoringHandler {
    async fn handle(&self, feed: &ResumableFeed, error: &CrawlError) -> Result<(), HandlerError> {
        debug!(kind = feed.kind.label(), url = %feed.url, "recording fail");
        Ok(self
            .fails
            .save(self.start_time, feed, &error.to_string())
            .await?)
    }
}
