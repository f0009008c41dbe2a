use clap::Parser;
use feed_cli::{OutputFormat, SettingsOverrides};
use feed_link::FeedLinkTimeouts;
use std::path::PathBuf;

/// feed-monitor - watch a feed-link channel from the terminal
#[derive(Parser, Debug)]
#[command(name = "feed-monitor")]
#[command(version)]
#[command(about = "Subscribe to a channel and print its messages", long_about = None)]
pub struct Cli {
    /// Server URL (http(s) is mapped to ws(s), e.g. wss://feed.example.com/ws)
    #[arg(short = 'u', long = "url")]
    pub url: Option<String>,

    /// Channel to subscribe on
    #[arg(short = 'c', long = "channel")]
    pub channel: Option<String>,

    /// Payload field the keys travel in: usernames or groups
    #[arg(long = "kind")]
    pub kind: Option<String>,

    /// Key to subscribe (repeatable)
    #[arg(short = 'k', long = "key")]
    pub keys: Vec<String>,

    /// File with one key per line; edits are picked up while running
    #[arg(long = "keys-file")]
    pub keys_file: Option<PathBuf>,

    /// Credential embedded in subscription messages
    #[arg(long = "credential", env = "FEED_CREDENTIAL", hide_env_values = true)]
    pub credential: Option<String>,

    /// File holding the credential, re-read on every update
    #[arg(long = "credential-file", conflicts_with = "credential")]
    pub credential_file: Option<PathBuf>,

    /// Configuration file path
    #[arg(long = "config", default_value = "~/.feedlink/config.toml")]
    pub config: PathBuf,

    /// Output format
    #[arg(long = "format", default_value = "text")]
    pub format: OutputFormat,

    /// Enable JSON output (shorthand for --format=json)
    #[arg(long = "json", conflicts_with = "format")]
    pub json: bool,

    /// Do not print connection status transitions
    #[arg(long = "quiet", short = 'q')]
    pub quiet: bool,

    /// Enable verbose logging (debug level)
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Log level or filter directive (overrides [logging] level)
    #[arg(long = "log-level")]
    pub log_level: Option<String>,

    /// Log format: compact or json
    #[arg(long = "log-format")]
    pub log_format: Option<String>,

    /// Append logs to this file as well as stderr
    #[arg(long = "log-file")]
    pub log_file: Option<PathBuf>,

    /// Maximum consecutive reconnect attempts (0 = unlimited)
    #[arg(long = "max-reconnect-attempts")]
    pub max_reconnect_attempts: Option<u32>,

    /// Disable automatic reconnection
    #[arg(long = "no-reconnect")]
    pub no_reconnect: bool,

    /// Probe this URL before every reconnect attempt
    #[arg(long = "health-check-url")]
    pub health_check_url: Option<String>,

    /// Connection timeout in seconds
    #[arg(long = "connection-timeout", value_name = "SECONDS")]
    pub connection_timeout: Option<u64>,

    /// Heartbeat interval in seconds
    #[arg(long = "heartbeat-interval", value_name = "SECONDS")]
    pub heartbeat_interval: Option<u64>,

    /// Close the connection after this many seconds without traffic
    #[arg(long = "stale-timeout", value_name = "SECONDS")]
    pub stale_timeout: Option<u64>,

    /// Use fast timeout preset (optimized for local development)
    #[arg(long = "fast-timeouts", conflicts_with = "relaxed_timeouts")]
    pub fast_timeouts: bool,

    /// Use relaxed timeout preset (optimized for high-latency networks)
    #[arg(long = "relaxed-timeouts")]
    pub relaxed_timeouts: bool,

    /// Exit after this many seconds (0 = run until Ctrl-C)
    #[arg(long = "duration", value_name = "SECONDS", default_value_t = 0)]
    pub duration: u64,

    /// Exit after this many messages
    #[arg(long = "limit")]
    pub limit: Option<usize>,
}

impl Cli {
    pub fn output_format(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else {
            self.format
        }
    }

    fn preset_timeouts(&self) -> Option<FeedLinkTimeouts> {
        if self.fast_timeouts {
            Some(FeedLinkTimeouts::fast())
        } else if self.relaxed_timeouts {
            Some(FeedLinkTimeouts::relaxed())
        } else {
            None
        }
    }

    pub fn overrides(&self) -> SettingsOverrides {
        SettingsOverrides {
            url: self.url.clone(),
            channel: self.channel.clone(),
            kind: self.kind.clone(),
            keys: self.keys.clone(),
            keys_file: self.keys_file.clone(),
            credential: self.credential.clone(),
            credential_file: self.credential_file.clone(),
            max_reconnect_attempts: self.max_reconnect_attempts,
            no_reconnect: self.no_reconnect,
            health_check_url: self.health_check_url.clone(),
            timeouts: self.preset_timeouts(),
            connection_timeout_secs: self.connection_timeout,
            heartbeat_interval_secs: self.heartbeat_interval,
            stale_timeout_secs: self.stale_timeout,
        }
    }
}
