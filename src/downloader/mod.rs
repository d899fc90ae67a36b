//! Download orchestration
//!
//! [`Downloader`] runs yt-dlp twice per fetch:
//! 1. **Initial** - fetches everything the URL resolves to
//! 2. **Verify** - the identical command again; the download archive turns every
//!    already-fetched item into a no-op, so this pass only picks up items that
//!    appeared in the meantime (a playlist that grew) or that were interrupted
//!
//! Each stage's exit code is judged the same way: `0` succeeds,
//! [`TOLERATED_EXIT_CODE`] is downgraded to a warning when the request opts into
//! `ignore_errors`, anything else fails the fetch immediately.

mod command;
mod thumbnail;


pub use command::{ARCHIVE_FLAG, THUMBNAIL_FORMAT, THUMBNAIL_STEM, download_command, thumbnail_command};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::folder_watcher::{NotifyProgressWatcher, ProgressWatcher, WatchGuard};
use crate::process::{OutputMode, ProcessOutcome, ProcessRunner, ToolCommand, ToolPaths, TokioProcessRunner};
use crate::types::{DownloadRequest, Event, FetchReport, Stage, StageOutcome};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// yt-dlp's exit status when at least one item failed but the run itself completed
///
/// yt-dlp documents 0 for success, 1 for "an error occurred" (per-item failures,
/// which `--ignore-errors` lets the run continue past), 2 for invalid options and
/// 100/101 for update/abort conditions. Only 1 is a soft failure.
pub const TOLERATED_EXIT_CODE: i32 = 1;

/// Label used for relayed yt-dlp output
const YTDLP_LABEL: &str = "yt-dlp";

/// Broadcast channel capacity for fetch events
const EVENT_CAPACITY: usize = 256;

/// Orchestrates yt-dlp runs against a downloads directory and its archive
pub struct Downloader {
    config: Arc<Config>,
    tools: ToolPaths,
    runner: Arc<dyn ProcessRunner>,
    watcher: Arc<dyn ProgressWatcher>,
    event_tx: broadcast::Sender<Event>,
}

impl Downloader {
    /// Create a downloader that spawns real processes and watches with the native notifier
    pub fn new(config: Arc<Config>) -> Self {
        let runner = Arc::new(TokioProcessRunner::with_timeout(
            config.download.stage_timeout,
        ));
        Self::with_components(config, runner, Arc::new(NotifyProgressWatcher))
    }

    /// Create a downloader with explicit process runner and progress watcher
    pub fn with_components(
        config: Arc<Config>,
        runner: Arc<dyn ProcessRunner>,
        watcher: Arc<dyn ProgressWatcher>,
    ) -> Self {
        let tools = ToolPaths::resolve(&config.tools);
        let (event_tx, _rx) = broadcast::channel(EVENT_CAPACITY);
        Self {
            config,
            tools,
            runner,
            watcher,
            event_tx,
        }
    }

    /// Subscribe to fetch events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Directory yt-dlp writes media into
    pub fn downloads_dir(&self) -> &Path {
        self.config.downloads_dir()
    }

    /// Download archive consulted and updated by yt-dlp
    pub fn archive_path(&self) -> PathBuf {
        self.config.download.archive_path()
    }

    /// Resolved tool locations
    pub fn tools(&self) -> &ToolPaths {
        &self.tools
    }

    /// The process runner shared with other collaborators (faceplate processing)
    pub fn runner(&self) -> Arc<dyn ProcessRunner> {
        self.runner.clone()
    }

    /// Fetch the media behind `request` into the downloads directory
    ///
    /// Runs the initial and verify stages in order. The verify stage is skipped if
    /// the initial stage fails. The progress watch (quiet mode only) is released on
    /// every return path.
    ///
    /// # Errors
    ///
    /// - [`Error::SpawnFailed`] if yt-dlp cannot be started
    /// - [`Error::ProcessFailed`] if a stage exits with a non-tolerated status
    /// - [`Error::Timeout`] if a stage exceeds the configured stage timeout
    /// - [`Error::Io`] if the downloads directory cannot be created
    pub async fn fetch(&self, request: &DownloadRequest) -> Result<FetchReport> {
        info!(url = %request.url(), "preparing download");
        tokio::fs::create_dir_all(self.downloads_dir()).await?;

        let command = download_command(&self.tools.ytdlp, &self.config.download, request);
        let _watch = self.start_watch(request.verbose);

        let mut report = FetchReport { stages: Vec::with_capacity(2) };
        for stage in [Stage::Initial, Stage::Verify] {
            let outcome = self
                .run_stage(stage, &command, request.url(), request.verbose)
                .await?;
            let verdict = self.judge(stage, &outcome, request.ignore_errors, &command)?;
            report.stages.push((stage, verdict));
        }

        info!(url = %request.url(), warnings = report.had_warnings(), "download finished");
        Ok(report)
    }

    /// Start the progress watch unless output is relayed or watching is disabled
    ///
    /// Failure to establish the watch is logged and otherwise ignored.
    fn start_watch(&self, verbose: bool) -> WatchGuard {
        if verbose || !self.config.download.watch_progress {
            return WatchGuard::none();
        }

        match self.watcher.watch(
            self.downloads_dir(),
            &self.config.download.media_suffix,
            self.event_tx.clone(),
        ) {
            Ok(probe) => WatchGuard::new(probe),
            Err(e) => {
                warn!(error = %e, "progress watch unavailable, continuing without it");
                WatchGuard::none()
            }
        }
    }

    async fn run_stage(
        &self,
        stage: Stage,
        command: &ToolCommand,
        url: &str,
        verbose: bool,
    ) -> Result<ProcessOutcome> {
        info!(%stage, url, "starting {} stage", stage);
        self.event_tx
            .send(Event::StageStarted {
                stage,
                url: url.to_string(),
            })
            .ok();

        let outcome = self
            .runner
            .run(command, OutputMode::for_verbosity(YTDLP_LABEL, verbose))
            .await
            .inspect_err(|e| error!(%stage, error = %e, "could not run yt-dlp"))?;

        if outcome.timed_out {
            self.event_tx
                .send(Event::StageFailed {
                    stage,
                    exit_code: None,
                })
                .ok();
            error!(%stage, "yt-dlp timed out");
            return Err(Error::Timeout {
                program: command.program_name(),
                after: self.config.download.stage_timeout.unwrap_or_default(),
            });
        }

        Ok(outcome)
    }

    /// Classify a finished stage
    fn judge(
        &self,
        stage: Stage,
        outcome: &ProcessOutcome,
        ignore_errors: bool,
        command: &ToolCommand,
    ) -> Result<StageOutcome> {
        match outcome.exit_code {
            Some(0) => {
                info!(%stage, "stage completed");
                self.event_tx.send(Event::StageCompleted { stage }).ok();
                Ok(StageOutcome::Completed)
            }
            Some(TOLERATED_EXIT_CODE) if ignore_errors => {
                warn!(
                    %stage,
                    exit_code = TOLERATED_EXIT_CODE,
                    "yt-dlp reported errors for some items; continuing because errors are ignored"
                );
                self.event_tx
                    .send(Event::StageTolerated {
                        stage,
                        exit_code: TOLERATED_EXIT_CODE,
                    })
                    .ok();
                Ok(StageOutcome::Tolerated {
                    exit_code: TOLERATED_EXIT_CODE,
                })
            }
            code => {
                for line in &outcome.stderr_tail {
                    error!(%stage, "{}", line);
                }
                error!(%stage, exit_code = ?code, command = %command, "stage failed");
                self.event_tx
                    .send(Event::StageFailed {
                        stage,
                        exit_code: code,
                    })
                    .ok();
                Err(Error::ProcessFailed {
                    stage,
                    exit_code: code,
                })
            }
        }
    }
}
