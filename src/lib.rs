//! # hoi4-radio-dl
//!
//! Turns a video or playlist into a Hearts of Iron IV radio station mod.
//!
//! ## Overview
//!
//! - [`Downloader`] drives yt-dlp: an initial pass, then a verify pass against
//!   the same download archive, with per-request error tolerance
//! - [`process`] isolates process spawning behind the [`ProcessRunner`] trait
//! - [`folder_watcher`] reports new media files while yt-dlp runs quietly
//! - [`modgen`] writes the mod folder, scripts and faceplate
//! - [`tracker`] keeps a JSON trail of what each run did
//! - [`pipeline`] ties it all together for the command-line tool
//!
//! ## Quick Start
//!
//! ```no_run
//! use hoi4_radio_dl::{Config, DownloadRequest, Downloader};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let downloader = Downloader::new(Arc::new(Config::default()));
//!
//!     // Subscribe to events
//!     let mut events = downloader.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let request = DownloadRequest::new("https://www.youtube.com/playlist?list=PL123")?
//!         .ignore_errors(true);
//!     let report = downloader.fetch(&request).await?;
//!     println!("warnings: {}", report.had_warnings());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// yt-dlp orchestration
pub mod downloader;
/// Error types
pub mod error;
/// Progress watching on the downloads directory
pub mod folder_watcher;
/// Tracing subscriber setup
pub mod logging;
/// Radio station mod generation
pub mod modgen;
/// Download plus mod generation
pub mod pipeline;
/// External process execution
pub mod process;
/// Persistent run state
pub mod tracker;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use config::{Config, DownloadConfig, ModConfig, ToolsConfig};
pub use downloader::{Downloader, TOLERATED_EXIT_CODE};
pub use error::{Error, Result};
pub use folder_watcher::{NotifyProgressWatcher, ProgressProbe, ProgressWatcher};
pub use modgen::{ModGenerator, normalize_mod_name};
pub use pipeline::{Pipeline, PipelineOptions, PipelineSummary};
pub use process::{OutputMode, ProcessOutcome, ProcessRunner, TokioProcessRunner, ToolCommand};
pub use tracker::Tracker;
pub use types::{DownloadRequest, Event, FetchReport, Stage, StageOutcome};

/// Run `work` until it finishes or a termination signal arrives
///
/// On a signal the future is dropped, which kills any external process it was
/// waiting on, and [`Error::Interrupted`] is returned.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
pub async fn run_with_shutdown<T, F>(work: F) -> Result<T>
where
    F: std::future::Future<Output = Result<T>>,
{
    tokio::select! {
        result = work => result,
        () = wait_for_signal() => Err(Error::Interrupted),
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) | (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("Received Ctrl+C signal");
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
            std::future::pending::<()>().await;
        }
    }
}
