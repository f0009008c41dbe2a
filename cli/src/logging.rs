// Logging module, powered by tracing-subscriber
//
// feed-link logs through the `log` facade; `tracing_log::LogTracer` routes
// those records into the subscriber installed here. Console output goes to
// stderr so stdout carries only feed messages.

use std::fs::{self, OpenOptions};
use std::path::Path;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Log format type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Compact text format: timestamp LEVEL target - message
    Compact,
    /// JSON Lines format for structured logging
    Json,
}

impl LogFormat {
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" | "jsonl" => LogFormat::Json,
            _ => LogFormat::Compact,
        }
    }
}

/// Base level plus quieter defaults for the transport crates.
fn build_env_filter(level: &str) -> anyhow::Result<EnvFilter> {
    let mut directives = vec![level.to_string()];

    let noisy: &[(&str, &str)] = &[
        ("tungstenite", "warn"),
        ("tokio_tungstenite", "warn"),
        ("reqwest", "warn"),
        ("hyper", "warn"),
        ("hyper_util", "warn"),
        ("rustls", "warn"),
    ];
    for (target, lvl) in noisy {
        directives.push(format!("{}={}", target, lvl));
    }

    let filter_str = directives.join(",");
    EnvFilter::try_new(&filter_str)
        .map_err(|e| anyhow::anyhow!("Invalid tracing filter '{}': {}", filter_str, e))
}

/// Initialize logging.
///
/// Sets up `tracing-subscriber` with:
///  - a stderr console layer (compact text or JSON lines)
///  - an optional file layer in the same format
///  - the `tracing_log::LogTracer` bridge so feed-link's `log::*` calls are captured
pub fn init_logging(level: &str, format: &str, file_path: Option<&Path>) -> anyhow::Result<()> {
    let log_format = LogFormat::parse(format);

    tracing_log::LogTracer::init().ok(); // ok() in case already initialized

    let console_layer = if log_format == LogFormat::Json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_filter(build_env_filter(level)?)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_filter(build_env_filter(level)?)
            .boxed()
    };

    let file_layer = match file_path {
        Some(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let log_file = OpenOptions::new().create(true).append(true).open(path)?;
            let layer = if log_format == LogFormat::Json {
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(log_file)
                    .with_target(true)
                    .with_filter(build_env_filter(level)?)
                    .boxed()
            } else {
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(log_file)
                    .with_target(true)
                    .with_filter(build_env_filter(level)?)
                    .boxed()
            };
            Some(layer)
        },
        None => None,
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Logging already initialized: {}", e))?;

    tracing::trace!("Logging initialized: level={}, format={:?}", level, log_format);

    Ok(())
}
