use std::collections::BTreeSet;

use anyhow::Result;
use async_trait::async_trait;
use clap::ValueEnum;
use tracing::{debug, info, instrument, warn};

use crate::{
    probe::{ProbeOutcome, Prober},
    scrape::scrape_channel_ids,
    store::KnownChannels,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Probe a generated list of candidate ids
    Probe,
    /// Take the ids linked from a page as live
    Scrape,
}

/// Result of one discovery run
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Discovered {
    /// Confirmed live in this run, drives the playlist
    pub accepted: BTreeSet<String>,
    /// Accepted ids that were not known before, in discovery order
    pub new: Vec<String>,
}

impl Discovered {
    /// Marks `id` live and records it in `known`
    async fn accept(&mut self, known: &mut KnownChannels, id: &str) -> Result<()> {
        self.accepted.insert(id.to_string());
        if known.insert(id).await? {
            info!("NEW: {id}");
            self.new.push(id.to_string());
        } else {
            info!("OK: {id}");
        }
        Ok(())
    }
}

#[async_trait]
pub trait Discovery: Send + Sync {
    /// Produces this run's accepted set, growing `known` with whatever is new.
    ///
    /// # Errors
    /// Only when persisting `known` fails; network failures never surface here
    async fn discover(&self, known: &mut KnownChannels) -> Result<Discovered>;
}

/// Probes every candidate, then every known channel the candidates did not cover
pub struct ProbeDiscovery<'a> {
    pub prober: Prober<'a>,
    pub candidates: Vec<String>,
}

#[async_trait]
impl Discovery for ProbeDiscovery<'_> {
    #[instrument(skip_all)]
    async fn discover(&self, known: &mut KnownChannels) -> Result<Discovered> {
        let mut found = Discovered::default();

        info!("Probing {} candidates", self.candidates.len());
        for id in &self.candidates {
            match self.prober.probe(id).await {
                ProbeOutcome::Live { url } => {
                    debug!("{id} confirmed at {url}");
                    found.accept(known, id).await?;
                }
                _ => info!("MISS: {id}"),
            }
            self.prober.pause().await;
        }

        recheck_known(&self.prober, known, &mut found).await;
        Ok(found)
    }
}

/// Trusts the ids linked from a page, then re-probes the known channels it did not list
pub struct ScrapeDiscovery<'a> {
    pub prober: Prober<'a>,
    pub page_url: String,
}

#[async_trait]
impl Discovery for ScrapeDiscovery<'_> {
    #[instrument(skip_all, fields(page = %self.page_url))]
    async fn discover(&self, known: &mut KnownChannels) -> Result<Discovered> {
        let mut found = Discovered::default();

        let ids = scrape_channel_ids(
            self.prober.transport(),
            self.prober.config(),
            &self.page_url,
        )
        .await;
        info!("Page links {} channels", ids.len());
        for id in &ids {
            found.accept(known, id).await?;
        }

        recheck_known(&self.prober, known, &mut found).await;
        Ok(found)
    }
}

/// Gives every known channel missing from `found` one more probe.
///
/// Channels that stay dark remain known but are left out of the playlist.
async fn recheck_known(prober: &Prober<'_>, known: &KnownChannels, found: &mut Discovered) {
    let missing: Vec<String> = known
        .channels()
        .iter()
        .filter(|id| !found.accepted.contains(*id))
        .cloned()
        .collect();

    for id in missing {
        if prober.probe(&id).await.is_live() {
            info!("OK: {id}");
            found.accepted.insert(id);
        } else {
            warn!("Previously known but currently unreachable: {id}");
        }
        prober.pause().await;
    }
}
