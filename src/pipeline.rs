//! End-to-end run: download, then build the mod
//!
//! [`Pipeline`] wires the [`Downloader`], the [`Tracker`] and the
//! [`ModGenerator`] together the way the command-line tool uses them.

use crate::config::Config;
use crate::downloader::Downloader;
use crate::error::Result;
use crate::modgen::{FaceplateSource, ModGenerator, discover_tracks};
use crate::tracker::{DownloadStatus, DownloadedVideo, Tracker, TrackerStep};
use crate::types::{DownloadRequest, FetchReport};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Inputs of one run
#[derive(Clone, Debug, Default)]
pub struct PipelineOptions {
    /// Video or playlist URL
    pub url: String,
    /// Mod name as typed by the user (normalized for paths and keys)
    pub mod_name: String,
    /// Extra yt-dlp arguments for this run
    pub extra_args: Vec<String>,
    /// Tolerate per-item yt-dlp failures
    pub ignore_errors: bool,
    /// Relay external tool output instead of watching for new files
    pub verbose: bool,
    /// Build the faceplate from the source thumbnail
    pub use_thumbnail: bool,
    /// Clear the tracker before starting
    pub reset_tracker: bool,
}

/// What a successful run produced
#[derive(Clone, Debug)]
pub struct PipelineSummary {
    /// Root folder of the generated mod
    pub mod_root: PathBuf,
    /// Number of tracks packaged
    pub track_count: usize,
    /// Per-stage download outcome
    pub fetch: FetchReport,
}

/// Download plus mod generation
pub struct Pipeline {
    config: Arc<Config>,
    downloader: Downloader,
}

impl Pipeline {
    /// Pipeline backed by real processes
    pub fn new(config: Arc<Config>) -> Self {
        let downloader = Downloader::new(config.clone());
        Self::with_downloader(config, downloader)
    }

    /// Pipeline around an already configured downloader
    pub fn with_downloader(config: Arc<Config>, downloader: Downloader) -> Self {
        Self { config, downloader }
    }

    /// The downloader, e.g. to subscribe to its events before [`Pipeline::run`]
    pub fn downloader(&self) -> &Downloader {
        &self.downloader
    }

    /// Run the whole pipeline
    ///
    /// The URL and mod name are validated before anything is spawned. The
    /// tracker entry for the source is marked `error` if the download fails
    /// and `success` otherwise.
    pub async fn run(&self, options: &PipelineOptions) -> Result<PipelineSummary> {
        let request = DownloadRequest::new(options.url.as_str())?
            .with_extra_args(options.extra_args.iter().cloned())
            .ignore_errors(options.ignore_errors)
            .verbose(options.verbose);
        let generator = ModGenerator::new(
            self.config.clone(),
            &options.mod_name,
            self.downloader.runner(),
            self.downloader.tools().clone(),
        )?;

        let mut tracker = Tracker::load(&self.config.tracker_path).await?;
        debug!(path = %tracker.path().display(), "tracker loaded");
        if options.reset_tracker {
            tracker.reset().await?;
        }

        tracker.set_current_step(TrackerStep::Downloading).await?;
        let source_id = request.source_id();
        tracker
            .add_downloaded(DownloadedVideo::pending(
                source_id.clone(),
                self.config.download.output_template.clone(),
            ))
            .await?;

        let fetch = match self.downloader.fetch(&request).await {
            Ok(report) => {
                tracker
                    .update_status(&source_id, DownloadStatus::Success, None)
                    .await?;
                report
            }
            Err(e) => {
                tracker
                    .update_status(&source_id, DownloadStatus::Error, Some(e.to_string()))
                    .await?;
                return Err(e);
            }
        };

        let sources = discover_tracks(
            self.downloader.downloads_dir(),
            &self.config.download.media_suffix,
        )
        .await?;
        info!(tracks = sources.len(), "download complete, building mod");

        let faceplate = FaceplateSource::resolve(
            &self.downloader,
            Some(request.url()),
            options.use_thumbnail,
            options.verbose,
        )
        .await?;
        let tracks = generator
            .generate(&sources, &faceplate, options.verbose, Some(&mut tracker))
            .await?;

        Ok(PipelineSummary {
            mod_root: generator.layout().mod_root(),
            track_count: tracks.len(),
            fetch,
        })
    }
}
