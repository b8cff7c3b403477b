//! Logging and tracing utilities

use std::str::FromStr;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Environment variable selecting the log line format
pub const LOG_FORMAT_ENV: &str = "CHAT_LOG_FORMAT";

/// Output format for log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human readable, one line per event
    #[default]
    Text,
    /// JSON lines
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "text" | "pretty" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format: {other}")),
        }
    }
}

/// Initialize tracing subscriber with default configuration
///
/// The filter comes from `RUST_LOG` (default `info`) and the format from
/// `CHAT_LOG_FORMAT`. Logs are written to stderr so stdout only ever carries
/// program output.
pub fn init_tracing() {
    let format = std::env::var(LOG_FORMAT_ENV)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or_default();
    init_tracing_with(format);
}

/// Initialize tracing subscriber with an explicit format
pub fn init_tracing_with(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init(),
    }
}
