//! Error types for hoi4-radio-dl
//!
//! This module provides error handling for the library, including:
//! - A single crate-wide [`Error`] enum with contextual fields (stage, exit code, paths)
//! - A distinction between "the tool could not be started" ([`Error::SpawnFailed`])
//!   and "the tool ran and failed" ([`Error::ProcessFailed`], [`Error::ExternalTool`])
//! - Machine-readable error codes and process exit codes for the CLI

use crate::types::Stage;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for hoi4-radio-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for hoi4-radio-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "media_suffix")
        key: Option<String>,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error (config or tracker JSON)
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The source URL could not be parsed
    #[error("invalid URL {url:?}: {reason}")]
    InvalidUrl {
        /// The rejected input
        url: String,
        /// Why parsing failed
        reason: String,
    },

    /// An external binary could not be started (missing executable, permission denied)
    #[error("failed to start {}: {source}", program.display())]
    SpawnFailed {
        /// The program that was being spawned
        program: PathBuf,
        /// The underlying OS error
        #[source]
        source: std::io::Error,
    },

    /// The downloader ran and exited with a non-tolerated status
    #[error("yt-dlp {stage} stage failed with exit code {}", display_code(*exit_code))]
    ProcessFailed {
        /// The stage that failed
        stage: Stage,
        /// Exit code, `None` when the process was terminated by a signal
        exit_code: Option<i32>,
    },

    /// An external process exceeded its time budget and was killed
    #[error("{program} timed out after {after:?}")]
    Timeout {
        /// Name of the program that was killed
        program: String,
        /// The budget that was exceeded
        after: Duration,
    },

    /// An auxiliary tool (ffmpeg, ImageMagick) ran and failed
    #[error("{tool} failed with exit code {}", display_code(*exit_code))]
    ExternalTool {
        /// Which step/tool failed (e.g., "ffmpeg resize")
        tool: String,
        /// Exit code, `None` when terminated by a signal
        exit_code: Option<i32>,
    },

    /// The progress watch could not be established
    ///
    /// Never surfaced by [`crate::Downloader::fetch`]; it is logged and skipped.
    #[error("folder watch error: {0}")]
    FolderWatch(String),

    /// A reported-successful download left no media files behind
    #[error("no *{suffix} files found in {}", dir.display())]
    NoAssetsProduced {
        /// Directory that was scanned
        dir: PathBuf,
        /// Suffix that was expected
        suffix: String,
    },

    /// A required static input file is missing
    #[error("required asset missing: {}", path.display())]
    MissingAsset {
        /// The expected location of the asset
        path: PathBuf,
    },

    /// The run was stopped by SIGINT or SIGTERM
    #[error("interrupted by signal")]
    Interrupted,
}

fn display_code(code: Option<i32>) -> String {
    code.map_or_else(|| "unknown".to_string(), |c| c.to_string())
}

impl Error {
    /// Shorthand for a configuration error tied to a key
    pub fn config(key: &str, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }

    /// Machine-readable error code
    ///
    /// Stable identifiers suitable for scripting around the CLI.
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Io(_) => "io_error",
            Error::Serialization(_) => "serialization_error",
            Error::InvalidUrl { .. } => "invalid_url",
            Error::SpawnFailed { .. } => "spawn_failed",
            Error::ProcessFailed { .. } => "process_failed",
            Error::Timeout { .. } => "timeout",
            Error::ExternalTool { .. } => "external_tool_error",
            Error::FolderWatch(_) => "folder_watch_error",
            Error::NoAssetsProduced { .. } => "no_assets_produced",
            Error::MissingAsset { .. } => "missing_asset",
            Error::Interrupted => "interrupted",
        }
    }

    /// Process exit status the CLI should terminate with
    ///
    /// Usage errors map to 2, missing tools to 127 (shell convention),
    /// timeouts to 124 (coreutils `timeout` convention), signals to 130, everything
    /// else to 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Config { .. } | Error::InvalidUrl { .. } => 2,
            Error::SpawnFailed { .. } => 127,
            Error::Timeout { .. } => 124,
            Error::Interrupted => 130,
            _ => 1,
        }
    }
}
