//! Output configuration for the governed log sink.
//!
//! Filter directives resolve in this order:
//! 1. The `directives` argument to [`LogConfig::from_env`]
//! 2. `LG_LOG`
//! 3. `RUST_LOG`
//! 4. `info`
//!
//! `LG_LOG_FORMAT` picks the line format and `LG_LOG_TIMESTAMPS` turns human
//! timestamps on or off.

use crate::{LoggingError, Result};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

pub const ENV_LOG: &str = "LG_LOG";
pub const ENV_RUST_LOG: &str = "RUST_LOG";
pub const ENV_LOG_FORMAT: &str = "LG_LOG_FORMAT";
pub const ENV_LOG_TIMESTAMPS: &str = "LG_LOG_TIMESTAMPS";

/// Directives used when nothing else is configured.
pub const DEFAULT_DIRECTIVES: &str = "info";

/// Line format written by the governance layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// `LEVEL target: message key=value ...`
    #[default]
    Human,
    /// One JSON object per line.
    Jsonl,
}

impl std::str::FromStr for LogFormat {
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "human" | "text" => Ok(LogFormat::Human),
            "jsonl" | "json" => Ok(LogFormat::Jsonl),
            other => Err(LoggingError::Config(format!("unknown log format: {}", other))),
        }
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            LogFormat::Human => "human",
            LogFormat::Jsonl => "jsonl",
        })
    }
}

/// Settings consumed by [`init_logging`](crate::init_logging).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub format: LogFormat,

    /// `EnvFilter` directives, e.g. `info` or `app=debug,hyper=warn`.
    pub directives: String,

    /// Prefix human lines with an RFC 3339 timestamp.
    pub timestamps: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            format: LogFormat::Human,
            directives: DEFAULT_DIRECTIVES.to_string(),
            timestamps: true,
        }
    }
}

impl LogConfig {
    /// Read the environment, letting explicit arguments win.
    pub fn from_env(directives: Option<&str>, format: Option<LogFormat>) -> Self {
        Self::from_lookup(directives, format, |name| std::env::var(name).ok())
    }

    fn from_lookup(
        directives: Option<&str>,
        format: Option<LogFormat>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let directives = directives
            .map(str::to_string)
            .or_else(|| non_blank(env(ENV_LOG)))
            .or_else(|| non_blank(env(ENV_RUST_LOG)))
            .unwrap_or_else(|| DEFAULT_DIRECTIVES.to_string());

        let format = format
            .or_else(|| env(ENV_LOG_FORMAT).and_then(|value| value.parse().ok()))
            .unwrap_or_default();

        let timestamps = env(ENV_LOG_TIMESTAMPS)
            .and_then(|value| parse_switch(&value))
            .unwrap_or(true);

        LogConfig {
            format,
            directives,
            timestamps,
        }
    }

    /// Build the event filter from [`LogConfig::directives`].
    pub fn env_filter(&self) -> Result<EnvFilter> {
        EnvFilter::try_new(&self.directives).map_err(|err| {
            LoggingError::Config(format!("invalid log directives {:?}: {}", self.directives, err))
        })
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_directives(mut self, directives: impl Into<String>) -> Self {
        self.directives = directives.into();
        self
    }

    pub fn with_timestamps(mut self, enabled: bool) -> Self {
        self.timestamps = enabled;
        self
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_switch(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup<'a>(vars: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |name| {
            vars.iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn test_format_parse() {
        assert_eq!("jsonl".parse::<LogFormat>().unwrap(), LogFormat::Jsonl);
        assert_eq!(" JSON ".parse::<LogFormat>().unwrap(), LogFormat::Jsonl);
        assert_eq!("text".parse::<LogFormat>().unwrap(), LogFormat::Human);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_lg_log_wins_over_rust_log() {
        let vars = [(ENV_LOG, "error"), (ENV_RUST_LOG, "debug")];
        let config = LogConfig::from_lookup(None, None, lookup(&vars));
        assert_eq!(config.directives, "error");
    }

    #[test]
    fn test_rust_log_used_verbatim() {
        let vars = [(ENV_RUST_LOG, "app=debug,hyper=warn")];
        let config = LogConfig::from_lookup(None, None, lookup(&vars));
        assert_eq!(config.directives, "app=debug,hyper=warn");
        assert!(config.env_filter().is_ok());
    }

    #[test]
    fn test_blank_lg_log_falls_through() {
        let vars = [(ENV_LOG, "  "), (ENV_RUST_LOG, "warn")];
        let config = LogConfig::from_lookup(None, None, lookup(&vars));
        assert_eq!(config.directives, "warn");
    }

    #[test]
    fn test_explicit_arguments_win() {
        let vars = [(ENV_LOG, "error"), (ENV_LOG_FORMAT, "jsonl")];
        let config = LogConfig::from_lookup(Some("trace"), Some(LogFormat::Human), lookup(&vars));
        assert_eq!(config.directives, "trace");
        assert_eq!(config.format, LogFormat::Human);
    }

    #[test]
    fn test_defaults_without_env() {
        let config = LogConfig::from_lookup(None, None, lookup(&[]));
        assert_eq!(config, LogConfig::default());
    }

    #[test]
    fn test_env_format_and_timestamps() {
        let vars = [(ENV_LOG_FORMAT, "json"), (ENV_LOG_TIMESTAMPS, "off")];
        let config = LogConfig::from_lookup(None, None, lookup(&vars));
        assert_eq!(config.format, LogFormat::Jsonl);
        assert!(!config.timestamps);

        let vars = [(ENV_LOG_FORMAT, "yaml"), (ENV_LOG_TIMESTAMPS, "maybe")];
        let config = LogConfig::from_lookup(None, None, lookup(&vars));
        assert_eq!(config.format, LogFormat::Human);
        assert!(config.timestamps);
    }

    #[test]
    fn test_invalid_directives_rejected() {
        let config = LogConfig::default().with_directives("app=loudest");
        assert!(matches!(config.env_filter(), Err(LoggingError::Config(_))));
    }
}
