//! Resumable OPDS catalog crawler.
//!
//! Walks a book catalog's nested authors-index and sequences-index feeds,
//! extracts bibliographic records and reconciles them into PostgreSQL with
//! dedup and differential updates. Every recoverable failure is persisted
//! as a [`ResumableFeed`] descriptor so a later `resume` run replays only
//! the failed subtrees.
//!
//! # Architecture
//!
//! - [`opds`] - feed fetching and Atom document decoding
//! - [`crawler`] - the recursive traversal engine, consumers and the error
//!   handler
//! - [`storage`] - per-entity PostgreSQL repositories and the fail store
//! - [`resume`] - the replay driver for persisted failures

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod crawler;
pub mod logging;
pub mod model;
pub mod opds;
pub mod resume;
pub mod storage;

// Re-export commonly used types
pub use config::{Config, ConfigError, LogFormat, LogLevel};
pub use crawler::{
    AuthorSource, Consumer, ConsumerError, CrawlError, Crawler, ErrorHandler, HandlerError,
    LoggingConsumer, StoringConsumer, StoringHandler,
};
pub use model::{Author, Book, FeedKind, InSeries, ResumableFeed, Series};
pub use storage::{
    AuthorRepository, BookRepository, Database, DbError, FailRecord, FailRepository,
    GenreRepository, PgAuthorRepository, PgBookRepository, PgFailRepository, PgGenreRepository,
    PgSeriesRepository, SeriesRepository, StoreError,
};
