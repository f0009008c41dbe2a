//! Configuration file management
//!
//! CLIConfiguration with TOML parsing for ~/.feedlink/config.toml
//!
//! # Configuration Format
//!
//! ```toml
//! [server]
//! url = "wss://feed.example.com/ws"   # http(s) is mapped to ws(s)
//!
//! [connection]
//! auto_reconnect = true          # Auto-reconnect on connection loss
//! reconnect_delay_ms = 1000      # Base reconnect delay
//! max_reconnect_delay_ms = 30000 # Maximum reconnect delay
//! max_reconnect_attempts = 10    # Max reconnect attempts (0 = unlimited)
//! backoff = "linear"             # linear, exponential
//! health_check_url = "https://feed.example.com/health"
//!
//! [heartbeat]
//! interval_secs = 5              # Heartbeat tick
//! stale_timeout_secs = 30        # Close after this long without traffic
//! channel_stale_timeout_secs = 60
//! keepalive = "ping"             # ping, off, or a literal text frame
//!
//! [feed]
//! channel = "twitter"
//! kind = "usernames"             # usernames, groups
//! keys = ["alice", "bob"]
//! keys_file = "~/.feedlink/keys.txt"
//! poll_interval_secs = 5
//!
//! [auth]
//! credential = "license-key"
//! credential_file = "~/.feedlink/license"
//!
//! [logging]
//! level = "info"
//! format = "compact"             # compact, json
//! file = "~/.feedlink/monitor.log"
//! ```

use feed_link::{
    BackoffStrategy, ConnectionOptions, FeedLinkTimeouts, KeepalivePayload, PayloadKind,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{CLIError, Result};

/// CLI configuration loaded from TOML file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CLIConfiguration {
    /// Server endpoint
    pub server: Option<ServerConfig>,

    /// Connection/reconnection settings
    pub connection: Option<ConnectionConfig>,

    /// Liveness settings
    pub heartbeat: Option<HeartbeatConfig>,

    /// Channel and keys to monitor
    pub feed: Option<FeedConfig>,

    /// Credential embedded in subscription messages
    pub auth: Option<AuthConfig>,

    /// Log output
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Endpoint URL (e.g., wss://feed.example.com/ws)
    pub url: Option<String>,
}

/// Connection settings for reconnection behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Enable automatic reconnection on connection loss (default: true)
    #[serde(default = "default_auto_reconnect")]
    pub auto_reconnect: bool,

    /// Base delay between reconnection attempts in milliseconds (default: 1000)
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    /// Maximum delay between reconnection attempts in milliseconds (default: 30000)
    #[serde(default = "default_max_reconnect_delay_ms")]
    pub max_reconnect_delay_ms: u64,

    /// Maximum number of reconnection attempts (0 = unlimited, default: 10)
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,

    /// Delay growth: "linear" or "exponential" (default: "linear")
    #[serde(default = "default_backoff")]
    pub backoff: String,

    /// HTTP endpoint probed before each reconnect attempt
    #[serde(default)]
    pub health_check_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    #[serde(default = "default_heartbeat_interval_secs")]
    pub interval_secs: u64,

    #[serde(default = "default_stale_timeout_secs")]
    pub stale_timeout_secs: u64,

    /// Rejoin a channel silent for this long (0 = never)
    #[serde(default = "default_channel_stale_timeout_secs")]
    pub channel_stale_timeout_secs: u64,

    /// "ping", "off", or a literal text frame such as `{"channel":"ping"}`
    #[serde(default = "default_keepalive")]
    pub keepalive: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    pub channel: Option<String>,

    /// Payload field the keys travel in: "usernames" or "groups"
    #[serde(default = "default_kind")]
    pub kind: String,

    #[serde(default)]
    pub keys: Vec<String>,

    /// File with one key per line, re-read every `poll_interval_secs`
    #[serde(default)]
    pub keys_file: Option<String>,

    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Static license/token
    pub credential: Option<String>,

    /// File holding the credential, re-read on every update cycle
    pub credential_file: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,

    #[serde(default)]
    pub file: Option<String>,
}

fn default_auto_reconnect() -> bool {
    true
}

fn default_reconnect_delay_ms() -> u64 {
    1000
}

fn default_max_reconnect_delay_ms() -> u64 {
    30000
}

fn default_max_reconnect_attempts() -> u32 {
    10
}

fn default_backoff() -> String {
    "linear".to_string()
}

fn default_heartbeat_interval_secs() -> u64 {
    5
}

fn default_stale_timeout_secs() -> u64 {
    30
}

fn default_channel_stale_timeout_secs() -> u64 {
    60
}

fn default_keepalive() -> String {
    "ping".to_string()
}

fn default_kind() -> String {
    "usernames".to_string()
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "compact".to_string()
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            auto_reconnect: default_auto_reconnect(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            max_reconnect_delay_ms: default_max_reconnect_delay_ms(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            backoff: default_backoff(),
            health_check_url: None,
        }
    }
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_heartbeat_interval_secs(),
            stale_timeout_secs: default_stale_timeout_secs(),
            channel_stale_timeout_secs: default_channel_stale_timeout_secs(),
            keepalive: default_keepalive(),
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            channel: None,
            kind: default_kind(),
            keys: Vec::new(),
            keys_file: None,
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
        }
    }
}

pub fn expand_config_path(path: &Path) -> PathBuf {
    let path_str = path.to_str().unwrap_or("~/.feedlink/config.toml");
    if let Some(rest) = path_str.strip_prefix("~/") {
        if let Some(home_dir) = dirs::home_dir() {
            return home_dir.join(rest);
        }
    }
    path.to_path_buf()
}

pub fn default_config_path() -> PathBuf {
    expand_config_path(Path::new("~/.feedlink/config.toml"))
}

pub fn parse_payload_kind(value: &str) -> Result<PayloadKind> {
    match value.trim().to_lowercase().as_str() {
        "usernames" | "username" | "users" => Ok(PayloadKind::Usernames),
        "groups" | "group" => Ok(PayloadKind::Groups),
        other => Err(CLIError::ConfigurationError(format!(
            "Unknown key kind '{}' (expected usernames or groups)",
            other
        ))),
    }
}

fn parse_backoff(value: &str) -> BackoffStrategy {
    match value.trim().to_lowercase().as_str() {
        "exponential" | "exp" => BackoffStrategy::Exponential,
        _ => BackoffStrategy::Linear,
    }
}

fn parse_keepalive(value: &str) -> KeepalivePayload {
    match value.trim() {
        "" | "ping" | "Ping" | "PING" => KeepalivePayload::Ping,
        "off" | "none" | "disabled" => KeepalivePayload::Disabled,
        text => KeepalivePayload::Text(text.to_string()),
    }
}

impl CLIConfiguration {
    /// Load configuration from file
    ///
    /// Returns default configuration if file doesn't exist.
    pub fn load(path: &Path) -> Result<Self> {
        let expanded_path = expand_config_path(path);
        let path = &expanded_path;

        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path).map_err(|e| {
            CLIError::ConfigurationError(format!("Failed to read config file: {}", e))
        })?;

        let config: CLIConfiguration = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let expanded_path = expand_config_path(path);
        let path = &expanded_path;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| CLIError::ConfigurationError(format!("Failed to serialize: {}", e)))?;

        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Build ConnectionOptions from the `[connection]` and `[heartbeat]` sections
    pub fn to_connection_options(&self) -> ConnectionOptions {
        let conn = self.resolved_connection();
        let heartbeat = self.resolved_heartbeat();

        // 0 means unlimited
        let max_attempts = if conn.max_reconnect_attempts == 0 {
            None
        } else {
            Some(conn.max_reconnect_attempts)
        };

        let mut options = ConnectionOptions::default()
            .with_auto_reconnect(conn.auto_reconnect)
            .with_reconnect_delay_ms(conn.reconnect_delay_ms)
            .with_max_reconnect_delay_ms(conn.max_reconnect_delay_ms)
            .with_max_reconnect_attempts(max_attempts)
            .with_backoff(parse_backoff(&conn.backoff))
            .with_keepalive(parse_keepalive(&heartbeat.keepalive));

        if let Some(url) = conn.health_check_url.as_deref().filter(|u| !u.trim().is_empty()) {
            options = options.with_health_check_url(url);
        }

        options
    }

    /// Build FeedLinkTimeouts from the `[heartbeat]` section
    pub fn to_timeouts(&self) -> FeedLinkTimeouts {
        let heartbeat = self.resolved_heartbeat();
        FeedLinkTimeouts::builder()
            .heartbeat_interval_secs(heartbeat.interval_secs)
            .stale_connection_timeout_secs(heartbeat.stale_timeout_secs)
            .channel_stale_timeout_secs(heartbeat.channel_stale_timeout_secs)
            .build()
    }

    pub fn server_url(&self) -> Option<String> {
        self.server.as_ref().and_then(|s| s.url.clone())
    }

    pub fn resolved_connection(&self) -> ConnectionConfig {
        self.connection.clone().unwrap_or_default()
    }

    pub fn resolved_heartbeat(&self) -> HeartbeatConfig {
        self.heartbeat.clone().unwrap_or_default()
    }

    pub fn resolved_feed(&self) -> FeedConfig {
        self.feed.clone().unwrap_or_default()
    }

    pub fn resolved_auth(&self) -> AuthConfig {
        self.auth.clone().unwrap_or_default()
    }

    pub fn resolved_logging(&self) -> LoggingConfig {
        self.logging.clone().unwrap_or_default()
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.resolved_feed().poll_interval_secs.max(1))
    }
}
