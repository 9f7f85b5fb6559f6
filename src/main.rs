#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::cargo)]
#![warn(clippy::perf)]
#![warn(clippy::complexity)]
#![warn(clippy::style)]
#![allow(clippy::multiple_crate_versions)]

use std::{path::PathBuf, time::Duration};

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use config::{Config, DEFAULT_HOST, HttpConfig, OutputConfig, ProbeConfig};
use discovery::{Discovered, Discovery, Mode, ProbeDiscovery, ScrapeDiscovery};
use http::{ReqwestTransport, Transport};
use playlist::{PlaylistStyle, render, write_if_changed};
use probe::Prober;
use store::{KnownChannels, NewLogMode, write_new_channels};
use tracing::info;

pub mod candidates;
pub mod config;
pub mod discovery;
pub mod http;
pub mod playlist;
pub mod probe;
pub mod scrape;
pub mod store;

/// Discovers live CVTV channels and regenerates the public playlist
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// How candidate channels are found
    #[arg(short, long, value_enum, default_value_t = Mode::Probe)]
    mode: Mode,

    /// Host serving `/hls/<id>/<id>.m3u8`
    #[arg(long, default_value = DEFAULT_HOST)]
    host: String,

    /// Page scraped in `scrape` mode [default: https://<host>/]
    #[arg(long)]
    scrape_url: Option<String>,

    /// Extra channel ids to probe besides the built-in seeds
    #[arg(short, long = "seed")]
    seeds: Vec<String>,

    /// Playlist regenerated from the channels live in this run
    #[arg(long, default_value = "playlist.m3u8")]
    playlist: PathBuf,

    /// JSON array of every channel ever confirmed live
    #[arg(long, default_value = "known_channels.json")]
    known: PathBuf,

    /// Log of the channels first seen in this run
    #[arg(long, default_value = "new_channels.txt")]
    new_log: PathBuf,

    /// Whether the new-channels log is replaced or appended to each run
    #[arg(long, value_enum, default_value_t = NewLogMode::Overwrite)]
    new_log_mode: NewLogMode,

    /// `group-title` attribute of every playlist entry
    #[arg(long, default_value = "CVTV")]
    group_title: String,

    /// Per-request timeout
    #[arg(long, default_value_t = 10)]
    timeout_secs: u64,

    /// Retries after a transient failure (403 / 404 are never retried)
    #[arg(short, long, default_value_t = 2)]
    retries: u32,

    /// Pause between two probes, in milliseconds
    #[arg(long, default_value_t = 300)]
    delay_ms: u64,

    /// Save the known channels after every new discovery
    #[arg(long)]
    persist_each: bool,
}

impl Args {
    fn into_config(self) -> Config {
        let defaults = Config::default();

        let mut candidates = defaults.candidates;
        candidates.seeds.extend(self.seeds);

        Config {
            mode: self.mode,
            scrape_url: self
                .scrape_url
                .unwrap_or_else(|| format!("https://{}/", self.host)),
            host: self.host,
            candidates,
            http: HttpConfig::from_env(Duration::from_secs(self.timeout_secs)),
            probe: ProbeConfig {
                retries: self.retries,
                polite_delay: Duration::from_millis(self.delay_ms),
                ..defaults.probe
            },
            output: OutputConfig {
                playlist_path: self.playlist,
                known_path: self.known,
                new_log_path: self.new_log,
                new_log_mode: self.new_log_mode,
                group_title: self.group_title,
                persist_each: self.persist_each,
            },
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    dotenvy::dotenv().ok();

    let config = Args::parse().into_config();
    info!("Scouting {} in {:?} mode", config.host, config.mode);

    let transport = ReqwestTransport::new(&config.http)?;
    run(&config, &transport).await?;

    info!("All done successfully!");
    Ok(())
}

/// One full pass: load state, discover, write the playlist and both channel files
async fn run(config: &Config, transport: &dyn Transport) -> Result<Discovered> {
    let default_known = match config.mode {
        Mode::Probe => config.candidates.seeds.clone(),
        Mode::Scrape => Vec::new(),
    };
    let mut known = KnownChannels::load(&config.output.known_path, default_known)
        .await?
        .with_autosave(config.output.persist_each);

    let prober = Prober::new(transport, &config.host, &config.probe);
    let discovery: Box<dyn Discovery + '_> = match config.mode {
        Mode::Probe => Box::new(ProbeDiscovery {
            prober,
            candidates: candidates::generate(&config.candidates),
        }),
        Mode::Scrape => Box::new(ScrapeDiscovery {
            prober,
            page_url: config.scrape_url.clone(),
        }),
    };

    let found = discovery.discover(&mut known).await?;

    let content = render(
        &found.accepted,
        &PlaylistStyle {
            host: &config.host,
            group_title: &config.output.group_title,
        },
    );
    if write_if_changed(&config.output.playlist_path, &content).await? {
        info!(
            "Wrote {} ({} channels)",
            config.output.playlist_path.display(),
            found.accepted.len()
        );
    } else {
        info!("No playlist changes.");
    }

    known.save().await?;
    write_new_channels(
        &config.output.new_log_path,
        config.output.new_log_mode,
        &found.new,
        Utc::now(),
    )
    .await?;

    info!("Newly discovered channels: {:?}", found.new);
    Ok(found)
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::{
        candidates::CandidateConfig,
        http::mock::{MockTransport, Reply},
    };

    const MEDIA: &str = "#EXTM3U\n#EXT-X-TARGETDURATION:6\n#EXTINF:6.0,\nseg1.ts\n";

    fn test_config(dir: &Path, seeds: &[&str]) -> Config {
        Config {
            host: "cvtv.test".into(),
            scrape_url: "https://cvtv.test/".into(),
            candidates: CandidateConfig {
                seeds: seeds.iter().map(ToString::to_string).collect(),
                suffix_ranges: Vec::new(),
                alphabet: String::new(),
            },
            probe: ProbeConfig {
                retries: 2,
                backoff_base: Duration::ZERO,
                backoff_step: Duration::ZERO,
                polite_delay: Duration::ZERO,
            },
            output: OutputConfig {
                playlist_path: dir.join("playlist.m3u8"),
                known_path: dir.join("known_channels.json"),
                new_log_path: dir.join("new_channels.txt"),
                ..OutputConfig::default()
            },
            ..Config::default()
        }
    }

    fn live(id: &str) -> (String, [Reply; 1]) {
        (
            probe::channel_url("cvtv.test", id),
            [Reply::Status(200, MEDIA)],
        )
    }

    fn read(path: &Path) -> String {
        std::fs::read_to_string(path).unwrap()
    }

    #[tokio::test]
    async fn first_run_publishes_live_seeds() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path(), &["TNT", "CNN", "GONE"]);
        let (tnt, tnt_replies) = live("TNT");
        let (cnn, cnn_replies) = live("CNN");
        let transport = MockTransport::new()
            .script(&tnt, tnt_replies)
            .script(&cnn, cnn_replies);

        let found = run(&config, &transport).await.unwrap();

        // seeds start out known, so nothing counts as new
        assert!(found.new.is_empty());
        assert_eq!(
            read(&config.output.playlist_path),
            "#EXTM3U\n\
             #EXTINF:-1 tvg-id=\"CNN\" group-title=\"CVTV\",CNN\n\
             https://cvtv.test/hls/CNN/CNN.m3u8\n\
             #EXTINF:-1 tvg-id=\"TNT\" group-title=\"CVTV\",TNT\n\
             https://cvtv.test/hls/TNT/TNT.m3u8\n"
        );
        assert_eq!(
            read(&config.output.known_path),
            r#"["CNN","GONE","TNT"]"#
        );
        assert_eq!(read(&config.output.new_log_path), "");
        // GONE: one 404 in the candidate pass, one in the recheck
        assert_eq!(transport.calls(&probe::channel_url("cvtv.test", "GONE")), 2);
    }

    #[tokio::test]
    async fn discoveries_are_persisted_and_logged() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path(), &["ESPN", "ESPN9"]);
        std::fs::write(&config.output.known_path, r#"["ESPN"]"#).unwrap();

        let (espn9, replies) = live("ESPN9");
        let transport = MockTransport::new().script(&espn9, replies);

        let found = run(&config, &transport).await.unwrap();

        assert_eq!(found.new, ["ESPN9"]);
        assert_eq!(read(&config.output.known_path), r#"["ESPN","ESPN9"]"#);
        assert_eq!(read(&config.output.new_log_path), "ESPN9\n");
        assert!(!read(&config.output.playlist_path).contains("tvg-id=\"ESPN\""));
    }

    #[tokio::test]
    async fn unchanged_playlist_is_not_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path(), &["TNT"]);

        let (tnt, replies) = live("TNT");
        run(&config, &MockTransport::new().script(&tnt, replies))
            .await
            .unwrap();
        let before = std::fs::metadata(&config.output.playlist_path)
            .unwrap()
            .modified()
            .unwrap();

        let (tnt, replies) = live("TNT");
        run(&config, &MockTransport::new().script(&tnt, replies))
            .await
            .unwrap();
        let after = std::fs::metadata(&config.output.playlist_path)
            .unwrap()
            .modified()
            .unwrap();

        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn scrape_mode_starts_from_empty_known_set() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            mode: Mode::Scrape,
            ..test_config(dir.path(), &["NEVER_PROBED"])
        };
        let transport = MockTransport::new().script(
            "https://cvtv.test/",
            [Reply::Status(200, "<a href=\"/hls/KNLJ/KNLJ.m3u8\">KNLJ</a>")],
        );

        let found = run(&config, &transport).await.unwrap();

        assert_eq!(found.new, ["KNLJ"]);
        assert_eq!(read(&config.output.known_path), r#"["KNLJ"]"#);
        assert_eq!(transport.total_calls(), 1);
    }

    #[test]
    fn every_flag_has_help() {
        use clap::CommandFactory;

        let command = Args::command();
        for arg in command.get_arguments() {
            assert!(arg.get_help().is_some(), "--{} has no help", arg.get_id());
        }
    }

    #[test]
    fn args_build_config() {
        let args = Args::parse_from([
            "cvtv-scout",
            "--mode",
            "scrape",
            "--host",
            "example.net",
            "--seed",
            "KNLJ",
            "--retries",
            "5",
            "--new-log-mode",
            "append",
            "--persist-each",
        ]);
        let config = args.into_config();

        assert_eq!(config.mode, Mode::Scrape);
        assert_eq!(config.scrape_url, "https://example.net/");
        assert_eq!(config.candidates.seeds.last().map(String::as_str), Some("KNLJ"));
        assert_eq!(config.probe.retries, 5);
        assert_eq!(config.output.new_log_mode, NewLogMode::Append);
        assert!(config.output.persist_each);
    }
}
