//! CLI entry point for the catalog crawler.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use clap::Parser;
use tracing::{error, info};

use bookcrawler::cli::{Cli, Command};
use bookcrawler::{
    logging, opds, resume, Config, Crawler, Database, FailRepository, PgAuthorRepository,
    PgBookRepository, PgFailRepository, PgGenreRepository, PgSeriesRepository, StoringConsumer,
    StoringHandler,
};

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            // The subscriber may not be installed yet when configuration
            // failed, so report on stderr as well.
            eprintln!("{err:#}");
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;
    logging::init(config.log_level, config.log_format);

    let start_time = Utc::now();

    let db = Database::connect(&config.database_url)
        .await
        .context("connecting to database")?;
    let http = opds::build_http_client().context("building HTTP client")?;
    let crawler = Crawler::new(http);

    let consumer = StoringConsumer::new(
        Arc::new(PgAuthorRepository::new(db.pool().clone())),
        Arc::new(PgBookRepository::new(db.pool().clone())),
        Arc::new(PgGenreRepository::new(db.pool().clone())),
        Arc::new(PgSeriesRepository::new(db.pool().clone())),
    );
    let fails: Arc<dyn FailRepository> = Arc::new(PgFailRepository::new(db.pool().clone()));
    let handler = StoringHandler::new(start_time, fails.clone());

    match cli.command {
        Some(Command::Resume { not_after }) => {
            let threshold = match not_after {
                Some(raw) => parse_resume_threshold(&raw)?,
                None => start_time - Duration::hours(1),
            };

            info!(%threshold, "replaying fails");
            resume::replay_failures(&crawler, fails.as_ref(), &consumer, &handler, threshold)
                .await
                .context("resume failed")?;
        }
        None => {
            info!(
                authors = %config.feed_authors,
                series = %config.feed_series,
                "starting fresh crawl"
            );
            crawler
                .crawl(
                    config.feed_authors.clone(),
                    config.feed_series.clone(),
                    &consumer,
                    &handler,
                )
                .await
                .context("crawl failed")?;
        }
    }

    db.close().await;
    Ok(())
}

fn parse_resume_threshold(raw: &str) -> anyhow::Result<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .with_context(|| format!("invalid resume timestamp {raw:?}, expected YYYY-MM-DD HH:MM:SS"))?;
    Ok(naive.and_utc())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_resume_threshold_valid() {
        let parsed = parse_resume_threshold("2026-08-01 12:30:00").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2026-08-01T12:30:00+00:00");
    }

    #[test]
    fn test_parse_resume_threshold_rejects_garbage() {
        assert!(parse_resume_threshold("yesterday").is_err());
        assert!(parse_resume_threshold("2026-08-01T12:30:00Z").is_err());
    }
}
