use std::{
    collections::BTreeSet,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use clap::ValueEnum;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Every channel ever confirmed live, persisted as a sorted JSON array
#[derive(Debug)]
pub struct KnownChannels {
    path: PathBuf,
    channels: BTreeSet<String>,
    autosave: bool,
}

impl KnownChannels {
    /// Loads the known set from `path`.
    ///
    /// A missing, blank or malformed file yields `default` instead.
    ///
    /// # Errors
    /// Errors when the file exists but cannot be read
    pub async fn load(
        path: impl Into<PathBuf>,
        default: impl IntoIterator<Item = String>,
    ) -> Result<Self> {
        let path = path.into();
        let channels: Option<BTreeSet<String>> = match tokio::fs::read_to_string(&path).await {
            Ok(s) if s.trim().is_empty() => None,
            Ok(s) => match serde_json::from_str::<Vec<String>>(&s) {
                Ok(list) => Some(list.into_iter().collect()),
                Err(e) => {
                    warn!("{} is malformed ({e}), starting from defaults", path.display());
                    None
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                return Err(e).with_context(|| format!("Reading {}", path.display()));
            }
        };

        let channels = channels.unwrap_or_else(|| default.into_iter().collect());
        debug!("Loaded {} known channels", channels.len());

        Ok(Self {
            path,
            channels,
            autosave: false,
        })
    }

    /// Saves after every successful [`Self::insert`]
    #[must_use]
    pub const fn with_autosave(mut self, autosave: bool) -> Self {
        self.autosave = autosave;
        self
    }

    #[cfg(test)]
    pub fn contains(&self, id: &str) -> bool {
        self.channels.contains(id)
    }

    #[must_use]
    pub const fn channels(&self) -> &BTreeSet<String> {
        &self.channels
    }

    /// Returns whether `id` was new
    ///
    /// # Errors
    /// Errors when autosave is on and saving fails
    pub async fn insert(&mut self, id: &str) -> Result<bool> {
        if !self.channels.insert(id.to_string()) {
            return Ok(false);
        }
        if self.autosave {
            self.save().await?;
        }
        Ok(true)
    }

    /// # Errors
    /// Errors when the file cannot be written
    pub async fn save(&self) -> Result<()> {
        let json = serde_json::to_string(&self.channels).context("Serializing known channels")?;
        write_atomic(&self.path, json.as_bytes()).await
    }
}

/// Writes `contents` to a sibling `<name>.tmp` file, then renames it over `path`.
///
/// Readers see either the old file or the complete new one, never a truncated mix.
///
/// # Errors
/// Errors when the temporary file cannot be written or renamed
pub async fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, contents)
        .await
        .with_context(|| format!("Writing {}", tmp.display()))?;
    tokio::fs::rename(&tmp, path)
        .await
        .with_context(|| format!("Moving {} into place", tmp.display()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum NewLogMode {
    /// Replace the file with this run's discoveries
    Overwrite,
    /// Append a timestamped block per run that found something
    Append,
}

/// Records the channels discovered in this run.
///
/// # Errors
/// Errors when the log file cannot be written
pub async fn write_new_channels(
    path: &Path,
    mode: NewLogMode,
    discovered: &[String],
    now: DateTime<Utc>,
) -> Result<()> {
    match mode {
        NewLogMode::Overwrite => {
            let content: String = discovered.iter().map(|id| format!("{id}\n")).collect();
            write_atomic(path, content.as_bytes()).await
        }
        NewLogMode::Append if discovered.is_empty() => Ok(()),
        NewLogMode::Append => {
            let mut sorted = discovered.to_vec();
            sorted.sort();

            let mut block = format!("# {}\n", now.to_rfc3339_opts(SecondsFormat::Secs, true));
            for id in sorted {
                block.push_str(&id);
                block.push('\n');
            }
            block.push('\n');

            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .await
                .with_context(|| format!("Opening {}", path.display()))?;
            file.write_all(block.as_bytes())
                .await
                .with_context(|| format!("Appending to {}", path.display()))?;
            file.flush().await?;
            Ok(())
        }
    }
}
