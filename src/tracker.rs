//! Persistent run state
//!
//! A small JSON file recording which sources were requested, how each fetch
//! ended, and which pipeline step the last run reached. Every mutation is written
//! through immediately so an interrupted run leaves an accurate trail.

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Pipeline step last entered
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackerStep {
    /// yt-dlp is fetching media
    #[serde(rename = "downloading")]
    Downloading,
    /// Creating the mod folder layout and faceplate
    #[serde(rename = "mod:setup")]
    ModSetup,
    /// Copying tracks into the mod
    #[serde(rename = "mod:copy_music")]
    ModCopyMusic,
    /// Writing descriptor files
    #[serde(rename = "mod:descriptor")]
    ModDescriptor,
    /// Writing localisation
    #[serde(rename = "mod:localisation")]
    ModLocalisation,
    /// Writing interface files
    #[serde(rename = "mod:interface")]
    ModInterface,
    /// Writing the music station script and asset
    #[serde(rename = "mod:music_script")]
    ModMusicScript,
    /// Finished
    #[serde(rename = "mod:done")]
    ModDone,
}

/// Outcome of a requested fetch
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadStatus {
    /// Requested, not finished
    Pending,
    /// Finished successfully
    Success,
    /// Failed
    Error,
}

/// One requested source
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadedVideo {
    /// Source identifier (video or playlist id)
    pub id: String,
    /// Output name pattern handed to yt-dlp
    pub filename: String,
    /// Current status
    pub status: DownloadStatus,
    /// Failure description for [`DownloadStatus::Error`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Last status change
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl DownloadedVideo {
    /// New pending entry
    pub fn pending(id: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            filename: filename.into(),
            status: DownloadStatus::Pending,
            error: None,
            updated_at: Utc::now(),
        }
    }
}

/// Serialized tracker contents
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerState {
    /// Requested sources in insertion order
    #[serde(default)]
    pub downloaded: Vec<DownloadedVideo>,
    /// Last step entered, `None` before the first run
    #[serde(default)]
    pub current_step: Option<TrackerStep>,
}

/// File-backed tracker
#[derive(Debug)]
pub struct Tracker {
    path: PathBuf,
    state: TrackerState,
}

impl Tracker {
    /// Load the tracker from `path`
    ///
    /// A missing or unreadable file is not an error: the tracker starts fresh and
    /// writes an empty state so the file exists afterwards.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        info!(path = %path.display(), "loading tracker state");

        let loaded = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => serde_json::from_str::<TrackerState>(&raw).map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };

        match loaded {
            Ok(state) => {
                debug!(entries = state.downloaded.len(), "tracker state loaded");
                Ok(Self { path, state })
            }
            Err(reason) => {
                warn!(
                    path = %path.display(),
                    reason = %reason,
                    "tracker file missing or invalid, starting fresh"
                );
                let tracker = Self {
                    path,
                    state: TrackerState::default(),
                };
                tracker.save().await?;
                Ok(tracker)
            }
        }
    }

    /// Location of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current in-memory state
    pub fn state(&self) -> &TrackerState {
        &self.state
    }

    /// All recorded sources
    pub fn downloaded(&self) -> &[DownloadedVideo] {
        &self.state.downloaded
    }

    /// Record a source; an entry with the same id is left untouched
    pub async fn add_downloaded(&mut self, video: DownloadedVideo) -> Result<()> {
        if self.state.downloaded.iter().any(|v| v.id == video.id) {
            debug!(id = %video.id, "source already tracked");
            return Ok(());
        }
        self.state.downloaded.push(video);
        self.save().await
    }

    /// Update the status of a recorded source
    ///
    /// Unknown ids are ignored. For [`DownloadStatus::Error`] a given `error`
    /// message replaces any previous one; any other status clears it.
    pub async fn update_status(
        &mut self,
        id: &str,
        status: DownloadStatus,
        error: Option<String>,
    ) -> Result<()> {
        let Some(video) = self.state.downloaded.iter_mut().find(|v| v.id == id) else {
            debug!(id, "status update for untracked source ignored");
            return Ok(());
        };

        video.status = status;
        video.updated_at = Utc::now();
        if status != DownloadStatus::Error {
            video.error = None;
        } else if error.is_some() {
            video.error = error;
        }
        if status == DownloadStatus::Error {
            error!(
                id,
                error = video.error.as_deref().unwrap_or("unknown error"),
                "download failed"
            );
        }
        self.save().await
    }

    /// Last step entered
    pub fn current_step(&self) -> Option<TrackerStep> {
        self.state.current_step
    }

    /// Enter a step
    pub async fn set_current_step(&mut self, step: TrackerStep) -> Result<()> {
        debug!(?step, "entering step");
        self.state.current_step = Some(step);
        self.save().await
    }

    /// Forget everything
    pub async fn reset(&mut self) -> Result<()> {
        self.state = TrackerState::default();
        self.save().await?;
        info!("tracker state reset");
        Ok(())
    }

    async fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(&self.state)?;
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }
}
