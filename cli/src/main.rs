//! feed-monitor - terminal monitor for feed-link channels
//!
//! # Usage
//!
//! ```bash
//! # Watch two accounts
//! feed-monitor -u wss://feed.example.com/ws -c twitter -k alice -k bob --credential <LICENSE>
//!
//! # Keys from a file that is re-read while running, JSON output
//! feed-monitor -u wss://feed.example.com/ws -c twitter --keys-file keys.txt --json
//!
//! # Everything from ~/.feedlink/config.toml, stop after 60s
//! feed-monitor --duration 60
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use feed_cli::config::expand_config_path;
use feed_cli::{logging, CLIConfiguration, ExitReason, MonitorSession, MonitorSettings};

mod args;

use args::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = CLIConfiguration::load(&cli.config)?;

    let log_config = config.resolved_logging();
    let level = match (&cli.log_level, cli.verbose) {
        (Some(level), _) => level.clone(),
        (None, true) => "debug".to_string(),
        (None, false) => log_config.level.clone(),
    };
    let log_format = cli.log_format.clone().unwrap_or(log_config.format);
    let log_file = cli
        .log_file
        .clone()
        .or_else(|| log_config.file.map(PathBuf::from))
        .map(|p| expand_config_path(&p));
    logging::init_logging(&level, &log_format, log_file.as_deref())?;

    let settings = MonitorSettings::resolve(&config, cli.overrides())?;
    log::info!(
        "Monitoring '{}' on {} ({} key(s){})",
        settings.channel,
        settings.url,
        settings.keys.len(),
        if settings.keys_file.is_some() { " + keys file" } else { "" }
    );

    let reason = MonitorSession::new(settings, cli.output_format())
        .with_status(!cli.quiet)
        .with_duration(Some(Duration::from_secs(cli.duration)))
        .with_limit(cli.limit)
        .run()
        .await?;

    if reason == ExitReason::FeedClosed {
        anyhow::bail!("Feed closed unexpectedly");
    }
    Ok(())
}
