//! Keys file: the interest set for `feed-monitor`.
//!
//! One key per line (or comma separated). `#` starts a comment. The file is
//! polled, so editing it while the monitor runs changes the subscriptions.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use feed_link::InterestSet;
use tokio::time::MissedTickBehavior;

use crate::config::expand_config_path;
use crate::error::{CLIError, Result};

pub fn parse_keys(contents: &str) -> BTreeSet<String> {
    contents
        .lines()
        .map(|line| line.split('#').next().unwrap_or_default())
        .flat_map(|line| line.split(','))
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn load_keys_file(path: &Path) -> Result<BTreeSet<String>> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        CLIError::FileError(format!("Failed to read keys file {}: {}", path.display(), e))
    })?;
    Ok(parse_keys(&contents))
}

/// Keeps an [`InterestSet`] equal to `fixed` plus the contents of a keys file.
pub struct KeysFileWatcher {
    path: PathBuf,
    fixed: BTreeSet<String>,
    interest: InterestSet,
    interval: Duration,
}

impl KeysFileWatcher {
    pub fn new(
        path: impl AsRef<Path>,
        fixed: BTreeSet<String>,
        interest: InterestSet,
        interval: Duration,
    ) -> Self {
        Self {
            path: expand_config_path(path.as_ref()),
            fixed,
            interest,
            interval,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the file once and publish the result.
    ///
    /// An unreadable file keeps the previous set.
    pub fn refresh(&self) -> Result<()> {
        let mut keys = load_keys_file(&self.path)?;
        keys.extend(self.fixed.iter().cloned());
        if keys != self.interest.snapshot() {
            log::info!(
                "Keys file {} now lists {} key(s)",
                self.path.display(),
                keys.len()
            );
        }
        self.interest.replace(keys);
        Ok(())
    }

    /// Poll until the task is aborted.
    pub async fn run(self) {
        let mut ticks = tokio::time::interval(self.interval);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticks.tick().await;
            if let Err(e) = self.refresh() {
                log::warn!("{}; keeping previous keys", e);
            }
        }
    }
}
