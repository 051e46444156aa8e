//! Tracing subscriber setup.
//!
//! Level filtering follows `RUST_LOG` (default `info`); output format follows
//! `LOG_FORMAT` (`pretty` or `json`).

use std::fmt;
use std::str::FromStr;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt as fmt_layer, EnvFilter};

/// Output format of log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable, one event per line.
    #[default]
    Pretty,
    /// Newline-delimited JSON, for log shipping.
    Json,
}

impl LogFormat {
    /// Load format from `LOG_FORMAT` env var.
    ///
    /// Returns `Pretty` if not set or invalid.
    pub fn from_env() -> Self {
        std::env::var("LOG_FORMAT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default()
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pretty => write!(f, "pretty"),
            Self::Json => write!(f, "json"),
        }
    }
}

impl FromStr for LogFormat {
    type Err = ParseLogFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" | "text" | "plain" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            _ => Err(ParseLogFormatError(s.to_string())),
        }
    }
}

/// Error parsing log format string.
#[derive(Debug, Clone)]
pub struct ParseLogFormatError(String);

impl fmt::Display for ParseLogFormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid log format '{}', expected 'pretty' or 'json'", self.0)
    }
}

impl std::error::Error for ParseLogFormatError {}

/// Install the global subscriber using `LOG_FORMAT` and `RUST_LOG`.
pub fn init_logging() {
    init_logging_with(LogFormat::from_env());
}

/// Install the global subscriber with an explicit format.
///
/// Does nothing if a subscriber is already installed.
pub fn init_logging_with(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    let result = match format {
        LogFormat::Pretty => registry.with(fmt_layer::layer().with_target(true)).try_init(),
        LogFormat::Json => registry.with(fmt_layer::layer().json()).try_init(),
    };

    if result.is_err() {
        tracing::debug!("Global tracing subscriber already installed");
    }
}
