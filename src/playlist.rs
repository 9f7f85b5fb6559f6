use std::{collections::BTreeSet, io::ErrorKind, path::Path};

use anyhow::{Context, Result};
use tracing::{debug, instrument};

use crate::{probe::channel_url, store::write_atomic};

pub const HEADER: &str = "#EXTM3U";

#[derive(Debug, Clone)]
pub struct PlaylistStyle<'a> {
    pub host: &'a str,
    pub group_title: &'a str,
}

/// Renders the accepted channels as an extended M3U document.
///
/// Output depends only on `channels` and `style`; a `BTreeSet` keeps entries sorted.
#[must_use]
pub fn render(channels: &BTreeSet<String>, style: &PlaylistStyle<'_>) -> String {
    let mut out = format!("{HEADER}\n");
    for id in channels {
        out.push_str(&format!(
            "#EXTINF:-1 tvg-id=\"{id}\" group-title=\"{}\",{id}\n{}\n",
            style.group_title,
            channel_url(style.host, id)
        ));
    }
    out
}

/// Writes `content` to `path` unless the file already holds exactly that.
///
/// Returns whether the file was written.
///
/// # Errors
/// Errors when the existing file cannot be read or the new one cannot be written
#[instrument(skip(content))]
pub async fn write_if_changed(path: &Path, content: &str) -> Result<bool> {
    match tokio::fs::read(path).await {
        Ok(existing) if existing == content.as_bytes() => {
            debug!("{} is up to date", path.display());
            return Ok(false);
        }
        Ok(_) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(e).with_context(|| format!("Reading {}", path.display())),
    }

    write_atomic(path, content.as_bytes()).await?;
    Ok(true)
}
