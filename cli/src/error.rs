//! Error types for feed-monitor
//!
//! Provides user-friendly error messages and context for common CLI failures.

use feed_link::FeedLinkError;
use std::fmt;

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CLIError>;

/// Errors that can occur in the CLI
#[derive(Debug)]
pub enum CLIError {
    /// Error from feed-link library
    LinkError(FeedLinkError),

    /// Configuration file or flag error
    ConfigurationError(String),

    /// File I/O error
    FileError(String),

    /// Invalid keys file or flag value
    ParseError(String),

    /// User cancelled operation
    Cancelled,
}

impl CLIError {
    fn format_link_error(err: &FeedLinkError) -> String {
        match err {
            FeedLinkError::NetworkError(msg) | FeedLinkError::WebSocketError(msg) => {
                Self::clean_nested_message(msg)
            },
            FeedLinkError::ConfigurationError(msg)
            | FeedLinkError::TimeoutError(msg)
            | FeedLinkError::SerializationError(msg)
            | FeedLinkError::ProtocolError(msg)
            | FeedLinkError::AuthenticationError(msg)
            | FeedLinkError::InternalError(msg) => msg.clone(),
            FeedLinkError::ConnectionClosed(msg) => format!("Connection closed: {}", msg),
        }
    }

    fn clean_nested_message(message: &str) -> String {
        let mut cleaned = message.trim();
        let prefixes = [
            "Connection failed:",
            "connection failed:",
            "Network error:",
            "network error:",
            "WebSocket error:",
        ];

        loop {
            let mut stripped = false;
            for prefix in &prefixes {
                if let Some(rest) = cleaned.strip_prefix(prefix) {
                    cleaned = rest.trim_start();
                    stripped = true;
                    break;
                }
            }

            if !stripped {
                break;
            }
        }

        cleaned.to_string()
    }
}

impl fmt::Display for CLIError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CLIError::LinkError(e) => write!(f, "{}", Self::format_link_error(e)),
            CLIError::ConfigurationError(msg) => write!(f, "Configuration error: {}", msg),
            CLIError::FileError(msg) => write!(f, "File error: {}", msg),
            CLIError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            CLIError::Cancelled => write!(f, "Operation cancelled"),
        }
    }
}

impl std::error::Error for CLIError {}

impl From<FeedLinkError> for CLIError {
    fn from(err: FeedLinkError) -> Self {
        CLIError::LinkError(err)
    }
}

impl From<std::io::Error> for CLIError {
    fn from(err: std::io::Error) -> Self {
        CLIError::FileError(err.to_string())
    }
}

impl From<toml::de::Error> for CLIError {
    fn from(err: toml::de::Error) -> Self {
        CLIError::ConfigurationError(format!("TOML parse error: {}", err))
    }
}
