//! Process configuration from the environment.

use thiserror::Error;
use url::Url;

/// Invalid or missing environment configuration. Fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid URL in {var}: {source}")]
    InvalidUrl {
        var: &'static str,
        #[source]
        source: url::ParseError,
    },

    #[error("invalid value {value:?} for {var}, expected one of {expected}")]
    InvalidChoice {
        var: &'static str,
        value: String,
        expected: &'static str,
    },
}

/// Log verbosity, from `LOG_LEVEL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// The tracing filter directive for this level.
    pub fn as_filter(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Log output shape, from `LOG_FORMAT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Everything the process reads from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root of the authors-index tree (`FEED_AUTHORS`).
    pub feed_authors: Url,
    /// Root of the sequences-index tree (`FEED_SERIES`).
    pub feed_series: Url,
    /// PostgreSQL connection string (`DATABASE_URL`).
    pub database_url: String,
    pub log_level: LogLevel,
    pub log_format: LogFormat,
}

impl Config {
    /// Reads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |var: &'static str| -> Result<String, ConfigError> {
            match get(var).map(|v| v.trim().to_string()) {
                Some(v) if !v.is_empty() => Ok(v),
                _ => Err(ConfigError::Missing(var)),
            }
        };

        let feed_url = |var: &'static str| -> Result<Url, ConfigError> {
            Url::parse(&required(var)?).map_err(|source| ConfigError::InvalidUrl { var, source })
        };

        let feed_authors = feed_url("FEED_AUTHORS")?;
        let feed_series = feed_url("FEED_SERIES")?;
        let database_url = required("DATABASE_URL")?;

        let log_level = match get("LOG_LEVEL").map(|v| v.trim().to_lowercase()) {
            None => LogLevel::Info,
            Some(v) if v.is_empty() => LogLevel::Info,
            Some(v) => match v.as_str() {
                "debug" => LogLevel::Debug,
                "info" => LogLevel::Info,
                "warn" => LogLevel::Warn,
                "error" => LogLevel::Error,
                _ => {
                    return Err(ConfigError::InvalidChoice {
                        var: "LOG_LEVEL",
                        value: v,
                        expected: "debug, info, warn, error",
                    });
                }
            },
        };

        let log_format = match get("LOG_FORMAT").map(|v| v.trim().to_lowercase()) {
            None => LogFormat::Text,
            Some(v) if v.is_empty() => LogFormat::Text,
            Some(v) => match v.as_str() {
                "text" => LogFormat::Text,
                "json" => LogFormat::Json,
                _ => {
                    return Err(ConfigError::InvalidChoice {
                        var: "LOG_FORMAT",
                        value: v,
                        expected: "text, json",
                    });
                }
            },
        };

        Ok(Self {
            feed_authors,
            feed_series,
            database_url,
            log_level,
            log_format,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup<'a>(vars: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        let map: HashMap<&str, &str> = vars.iter().copied().collect();
        move |key| map.get(key).map(|v| (*v).to_string())
    }

    const BASE: &[(&str, &str)] = &[
        ("FEED_AUTHORS", "https://example.com/opds/authorsindex"),
        ("FEED_SERIES", "https://example.com/opds/sequencesindex"),
        ("DATABASE_URL", "postgres://localhost/books"),
    ];

    #[test]
    fn test_config_minimal_environment() {
        let config = Config::from_lookup(lookup(BASE)).unwrap();
        assert_eq!(
            config.feed_authors.as_str(),
            "https://example.com/opds/authorsindex"
        );
        assert_eq!(config.log_level, LogLevel::Info);
        assert_eq!(config.log_format, LogFormat::Text);
    }

    #[test]
    fn test_config_missing_feed_authors() {
        let vars = &BASE[1..];
        let err = Config::from_lookup(lookup(vars)).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("FEED_AUTHORS")));
    }

    #[test]
    fn test_config_blank_database_url_is_missing() {
        let vars = [BASE[0], BASE[1], ("DATABASE_URL", "   ")];
        let err = Config::from_lookup(lookup(&vars)).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("DATABASE_URL")));
    }

    #[test]
    fn test_config_invalid_feed_url() {
        let vars = [
            ("FEED_AUTHORS", "not a url"),
            BASE[1],
            BASE[2],
        ];
        let err = Config::from_lookup(lookup(&vars)).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidUrl {
                var: "FEED_AUTHORS",
                ..
            }
        ));
    }

    #[test]
    fn test_config_log_level_parsing() {
        let vars = [BASE[0], BASE[1], BASE[2], ("LOG_LEVEL", " WARN ")];
        let config = Config::from_lookup(lookup(&vars)).unwrap();
        assert_eq!(config.log_level, LogLevel::Warn);

        let vars = [BASE[0], BASE[1], BASE[2], ("LOG_LEVEL", "verbose")];
        let err = Config::from_lookup(lookup(&vars)).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidChoice {
                var: "LOG_LEVEL",
                ..
            }
        ));
    }

    #[test]
    fn test_config_log_format_parsing() {
        let vars = [BASE[0], BASE[1], BASE[2], ("LOG_FORMAT", "json")];
        let config = Config::from_lookup(lookup(&vars)).unwrap();
        assert_eq!(config.log_format, LogFormat::Json);

        let vars = [BASE[0], BASE[1], BASE[2], ("LOG_FORMAT", "xml")];
        assert!(Config::from_lookup(lookup(&vars)).is_err());
    }
}
