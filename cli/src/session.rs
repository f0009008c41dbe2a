//! Monitor session: one connection, one feed, printed to the terminal.
//!
//! [`MonitorSettings`] merges the config file with command-line overrides.
//! [`MonitorSession::run`] drives the feed until Ctrl-C, `--duration` or
//! `--limit`, then unbinds (sending the unsubscribe messages) and shuts the
//! connection down.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clap::ValueEnum;
use feed_link::{
    ArcCredentialProvider, ChannelMessage, ConnectionManager, ConnectionOptions, ConnectionState,
    ConnectionStatus, CredentialProvider, FeedLinkError, FeedLinkTimeouts, InterestSet,
    MonitorFeed, PayloadKind, ResolvedCredential,
};

use crate::config::{expand_config_path, parse_payload_kind, CLIConfiguration};
use crate::error::{CLIError, Result};
use crate::keys::{load_keys_file, KeysFileWatcher};

const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// How feed messages are printed on stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// `[channel] {data}`
    Text,
    /// One JSON object per line
    Json,
}

/// Values from the command line that win over the config file.
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub url: Option<String>,
    pub channel: Option<String>,
    pub kind: Option<String>,
    pub keys: Vec<String>,
    pub keys_file: Option<PathBuf>,
    pub credential: Option<String>,
    pub credential_file: Option<PathBuf>,
    pub max_reconnect_attempts: Option<u32>,
    pub no_reconnect: bool,
    pub health_check_url: Option<String>,
    pub timeouts: Option<FeedLinkTimeouts>,
    pub connection_timeout_secs: Option<u64>,
    pub heartbeat_interval_secs: Option<u64>,
    pub stale_timeout_secs: Option<u64>,
}

/// Where the credential comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    Static(String),
    File(PathBuf),
}

/// Everything a [`MonitorSession`] needs, resolved.
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub url: String,
    pub channel: String,
    pub kind: PayloadKind,
    pub keys: BTreeSet<String>,
    pub keys_file: Option<PathBuf>,
    pub poll_interval: Duration,
    pub credential: CredentialSource,
    pub options: ConnectionOptions,
    pub timeouts: FeedLinkTimeouts,
}

impl MonitorSettings {
    /// Merge `config` with `overrides`. Flags win; `keys` are combined.
    pub fn resolve(config: &CLIConfiguration, overrides: SettingsOverrides) -> Result<Self> {
        let feed = config.resolved_feed();
        let auth = config.resolved_auth();

        let url = overrides.url.or_else(|| config.server_url()).ok_or_else(|| {
            CLIError::ConfigurationError(
                "No server URL: pass --url or set [server] url in the config file".into(),
            )
        })?;

        let channel = overrides
            .channel
            .or(feed.channel)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| {
                CLIError::ConfigurationError(
                    "No channel: pass --channel or set [feed] channel in the config file".into(),
                )
            })?;

        let kind = parse_payload_kind(overrides.kind.as_deref().unwrap_or(&feed.kind))?;

        let mut keys: BTreeSet<String> = feed.keys.into_iter().collect();
        keys.extend(overrides.keys);
        keys.retain(|k| !k.trim().is_empty());

        let keys_file = overrides
            .keys_file
            .or_else(|| feed.keys_file.map(PathBuf::from))
            .map(|p| expand_config_path(&p));

        let credential = match (overrides.credential, overrides.credential_file) {
            (Some(value), _) => CredentialSource::Static(value),
            (None, Some(path)) => CredentialSource::File(expand_config_path(&path)),
            (None, None) => match (auth.credential, auth.credential_file) {
                (Some(value), _) => CredentialSource::Static(value),
                (None, Some(path)) => CredentialSource::File(expand_config_path(Path::new(&path))),
                (None, None) => CredentialSource::Static(String::new()),
            },
        };

        let mut options = config.to_connection_options();
        if let Some(max) = overrides.max_reconnect_attempts {
            options = options.with_max_reconnect_attempts(if max == 0 { None } else { Some(max) });
        }
        if overrides.no_reconnect {
            options = options.with_auto_reconnect(false);
        }
        if let Some(url) = overrides.health_check_url {
            options = options.with_health_check_url(url);
        }

        let mut timeouts = overrides.timeouts.unwrap_or_else(|| config.to_timeouts());
        if let Some(secs) = overrides.connection_timeout_secs {
            timeouts.connection_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = overrides.heartbeat_interval_secs {
            timeouts.heartbeat_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = overrides.stale_timeout_secs {
            timeouts.stale_connection_timeout = Duration::from_secs(secs);
        }

        Ok(Self {
            url,
            channel,
            kind,
            keys,
            keys_file,
            poll_interval: config.poll_interval(),
            credential,
            options,
            timeouts,
        })
    }
}

/// Credential read from a file on every update cycle, so a rotated license
/// is picked up without restarting.
pub struct FileCredential {
    path: PathBuf,
}

impl FileCredential {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CredentialProvider for FileCredential {
    async fn credential(&self) -> feed_link::Result<String> {
        let contents = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            FeedLinkError::AuthenticationError(format!(
                "Failed to read credential file {}: {}",
                self.path.display(),
                e
            ))
        })?;
        let value = contents.trim();
        if value.is_empty() {
            return Err(FeedLinkError::AuthenticationError(format!(
                "Credential file {} is empty",
                self.path.display()
            )));
        }
        Ok(value.to_string())
    }
}

pub fn format_message(message: &ChannelMessage, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => serde_json::to_string(message)
            .unwrap_or_else(|e| format!(r#"{{"error":"{}"}}"#, e)),
        OutputFormat::Text => match &message.data {
            Some(data) => format!("[{}] {}", message.channel, data),
            None => format!("[{}] (no data, success={})", message.channel, message.success),
        },
    }
}

pub fn format_status(status: &ConnectionStatus) -> String {
    let mut line = format!("● {}", status.state);
    if status.state == ConnectionState::Reconnecting && status.retry_count > 0 {
        line.push_str(&format!(" (attempt {})", status.retry_count));
    }
    if status.queued_messages > 0 {
        line.push_str(&format!(", {} queued", status.queued_messages));
    }
    if let Some(reason) = &status.last_close_reason {
        if status.state != ConnectionState::Connected {
            line.push_str(&format!(": {}", reason));
        }
    }
    line
}

/// The status line for `status`, or `None` when it reads the same as the
/// last one printed.
pub fn changed_status_line(last: &mut Option<String>, status: &ConnectionStatus) -> Option<String> {
    let line = format_status(status);
    if last.as_deref() == Some(line.as_str()) {
        return None;
    }
    *last = Some(line.clone());
    Some(line)
}

/// Why [`MonitorSession::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    Interrupted,
    DurationElapsed,
    LimitReached,
    FeedClosed,
}

pub struct MonitorSession {
    settings: MonitorSettings,
    format: OutputFormat,
    show_status: bool,
    duration: Option<Duration>,
    limit: Option<usize>,
}

impl MonitorSession {
    pub fn new(settings: MonitorSettings, format: OutputFormat) -> Self {
        Self {
            settings,
            format,
            show_status: true,
            duration: None,
            limit: None,
        }
    }

    /// Print connection transitions on stderr (default: on).
    pub fn with_status(mut self, enabled: bool) -> Self {
        self.show_status = enabled;
        self
    }

    /// Exit after this long. `None` runs until interrupted.
    pub fn with_duration(mut self, duration: Option<Duration>) -> Self {
        self.duration = duration.filter(|d| !d.is_zero());
        self
    }

    /// Exit after this many messages.
    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit.filter(|n| *n > 0);
        self
    }

    pub fn settings(&self) -> &MonitorSettings {
        &self.settings
    }

    fn credential(&self) -> ResolvedCredential {
        match &self.settings.credential {
            CredentialSource::Static(value) => ResolvedCredential::from(value.clone()),
            CredentialSource::File(path) => {
                ResolvedCredential::from(Arc::new(FileCredential::new(path)) as ArcCredentialProvider)
            },
        }
    }

    fn initial_keys(&self) -> BTreeSet<String> {
        let mut keys = self.settings.keys.clone();
        if let Some(path) = &self.settings.keys_file {
            match load_keys_file(path) {
                Ok(from_file) => keys.extend(from_file),
                Err(e) => log::warn!("{}; starting with {} flag key(s)", e, keys.len()),
            }
        }
        keys
    }

    pub async fn run(self) -> Result<ExitReason> {
        let settings = &self.settings;
        let manager = ConnectionManager::builder(settings.url.as_str())
            .options(settings.options.clone())
            .timeouts(settings.timeouts.clone())
            .build()?;

        let interest = InterestSet::from_keys(self.initial_keys());
        if interest.is_empty() {
            eprintln!("No keys yet for '{}'; waiting for the keys file", settings.channel);
        }

        let mut feed = MonitorFeed::builder(manager.handle(), interest.clone())
            .shape(settings.channel.clone(), settings.kind)
            .credential(self.credential())
            .start();

        let watcher = settings.keys_file.as_ref().map(|path| {
            tokio::spawn(
                KeysFileWatcher::new(
                    path,
                    settings.keys.clone(),
                    interest.clone(),
                    settings.poll_interval,
                )
                .run(),
            )
        });

        let mut status_rx = manager.watch_status();
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);
        let deadline = tokio::time::sleep(self.duration.unwrap_or(FAR_FUTURE));
        tokio::pin!(deadline);

        let mut received = 0usize;
        let mut last_status_line: Option<String> = None;
        let reason = loop {
            tokio::select! {
                _ = &mut ctrl_c => break ExitReason::Interrupted,

                _ = &mut deadline, if self.duration.is_some() => break ExitReason::DurationElapsed,

                message = feed.next() => match message {
                    Some(message) => {
                        println!("{}", format_message(&message, self.format));
                        received += 1;
                        if self.limit.is_some_and(|limit| received >= limit) {
                            break ExitReason::LimitReached;
                        }
                    },
                    None => break ExitReason::FeedClosed,
                },

                changed = status_rx.changed() => {
                    if changed.is_err() {
                        break ExitReason::FeedClosed;
                    }
                    let status = status_rx.borrow_and_update().clone();
                    if self.show_status {
                        if let Some(line) = changed_status_line(&mut last_status_line, &status) {
                            eprintln!("{}", line);
                        }
                    }
                    if status.is_abandoned() {
                        log::error!("Giving up on {}", settings.url);
                    }
                }
            }
        };

        if let Some(watcher) = watcher {
            watcher.abort();
        }

        eprintln!("⚠ Unsubscribing...");
        feed.unbind();
        manager.shutdown().await;
        log::info!("Monitor stopped ({:?}) after {} message(s)", reason, received);

        Ok(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AuthConfig, FeedConfig, ServerConfig};
    use serde_json::json;

    fn config() -> CLIConfiguration {
        CLIConfiguration {
            server: Some(ServerConfig {
                url: Some("wss://feed.example.com/ws".into()),
            }),
            feed: Some(FeedConfig {
                channel: Some("twitter".into()),
                keys: vec!["alice".into()],
                ..FeedConfig::default()
            }),
            auth: Some(AuthConfig {
                credential: Some("from-config".into()),
                credential_file: None,
            }),
            ..CLIConfiguration::default()
        }
    }

    #[test]
    fn test_resolve_uses_config_values() {
        let settings = MonitorSettings::resolve(&config(), SettingsOverrides::default()).unwrap();
        assert_eq!(settings.url, "wss://feed.example.com/ws");
        assert_eq!(settings.channel, "twitter");
        assert_eq!(settings.kind, PayloadKind::Usernames);
        assert_eq!(settings.keys.len(), 1);
        assert_eq!(settings.credential, CredentialSource::Static("from-config".into()));
    }

    #[test]
    fn test_flags_override_config() {
        let overrides = SettingsOverrides {
            url: Some("ws://localhost:9000/ws".into()),
            kind: Some("groups".into()),
            keys: vec!["bob".into(), " ".into()],
            credential_file: Some(PathBuf::from("/tmp/license")),
            max_reconnect_attempts: Some(0),
            heartbeat_interval_secs: Some(2),
            ..SettingsOverrides::default()
        };

        let settings = MonitorSettings::resolve(&config(), overrides).unwrap();
        assert_eq!(settings.url, "ws://localhost:9000/ws");
        assert_eq!(settings.kind, PayloadKind::Groups);
        let keys: Vec<&str> = settings.keys.iter().map(String::as_str).collect();
        assert_eq!(keys, vec!["alice", "bob"]);
        // A file flag beats a static credential from the config.
        assert_eq!(settings.credential, CredentialSource::File(PathBuf::from("/tmp/license")));
        assert_eq!(settings.options.max_reconnect_attempts, None);
        assert_eq!(settings.timeouts.heartbeat_interval, Duration::from_secs(2));
    }

    #[test]
    fn test_missing_url_or_channel_is_an_error() {
        let empty = CLIConfiguration::default();
        assert!(matches!(
            MonitorSettings::resolve(&empty, SettingsOverrides::default()),
            Err(CLIError::ConfigurationError(_))
        ));

        let overrides = SettingsOverrides {
            url: Some("ws://localhost/ws".into()),
            ..SettingsOverrides::default()
        };
        assert!(matches!(
            MonitorSettings::resolve(&empty, overrides),
            Err(CLIError::ConfigurationError(_))
        ));
    }

    #[test]
    fn test_format_message() {
        let message = ChannelMessage {
            channel: "twitter".into(),
            success: true,
            data: Some(json!({"user": "alice"})),
            rooms: None,
        };
        assert_eq!(format_message(&message, OutputFormat::Text), r#"[twitter] {"user":"alice"}"#);

        let line = format_message(&message, OutputFormat::Json);
        let parsed: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed["channel"], "twitter");
    }

    #[test]
    fn test_format_status() {
        let status = ConnectionStatus {
            state: ConnectionState::Reconnecting,
            retry_count: 2,
            last_close_reason: Some("WebSocket stream ended".into()),
            ..ConnectionStatus::default()
        };
        assert_eq!(
            format_status(&status),
            "● reconnecting (attempt 2): WebSocket stream ended"
        );

        let status = ConnectionStatus {
            state: ConnectionState::Connected,
            last_close_reason: None,
            ..ConnectionStatus::default()
        };
        assert_eq!(format_status(&status), "● connected");
    }

    #[test]
    fn test_status_line_printed_only_on_change() {
        let mut last = None;
        let connected = ConnectionStatus {
            state: ConnectionState::Connected,
            ..ConnectionStatus::default()
        };
        assert_eq!(changed_status_line(&mut last, &connected).as_deref(), Some("● connected"));

        // Traffic only moves the timestamp.
        for at in 1..=5 {
            let busy = ConnectionStatus {
                last_message_at_ms: Some(at),
                ..connected.clone()
            };
            assert_eq!(changed_status_line(&mut last, &busy), None);
        }

        let dropped = ConnectionStatus {
            state: ConnectionState::Reconnecting,
            retry_count: 1,
            last_close_reason: Some("WebSocket stream ended".into()),
            ..ConnectionStatus::default()
        };
        assert!(changed_status_line(&mut last, &dropped).is_some());
        assert_eq!(changed_status_line(&mut last, &dropped), None);
    }

    #[tokio::test]
    async fn test_file_credential_is_trimmed_and_rejects_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("license");

        std::fs::write(&path, "  key-123\n").unwrap();
        let provider = FileCredential::new(&path);
        assert_eq!(provider.credential().await.unwrap(), "key-123");

        std::fs::write(&path, "\n").unwrap();
        assert!(matches!(
            provider.credential().await,
            Err(FeedLinkError::AuthenticationError(_))
        ));
    }
}
