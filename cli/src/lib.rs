//! Library entry point for feed-monitor components.
//!
//! Exposes the config, keys-file and session modules so integration tests can
//! drive a monitor session without going through the binary entry point.

pub mod config;
pub mod error;
pub mod keys;
pub mod logging;
pub mod session;

pub use config::CLIConfiguration;
pub use error::{CLIError, Result};
pub use keys::KeysFileWatcher;
pub use session::{ExitReason, MonitorSession, MonitorSettings, OutputFormat, SettingsOverrides};
