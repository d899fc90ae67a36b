//! Single-shot thumbnail fetch

use super::{Downloader, thumbnail_command};
use crate::error::{Error, Result};
use crate::types::{Event, Stage};
use std::path::PathBuf;
use tracing::{debug, error, info};

impl Downloader {
    /// Fetch the thumbnail of `url` as a JPEG and return where it was written
    ///
    /// One yt-dlp run in image-only mode: no verify stage, no download archive,
    /// no progress watch and no error tolerance. A thumbnail left by an earlier
    /// run is removed first, so the returned path always holds this URL's image.
    ///
    /// # Errors
    ///
    /// - [`Error::SpawnFailed`] if yt-dlp cannot be started
    /// - [`Error::ProcessFailed`] with [`Stage::Thumbnail`] on any nonzero exit
    /// - [`Error::Timeout`] if the run exceeds the configured stage timeout
    /// - [`Error::MissingAsset`] if yt-dlp exits 0 without writing the image
    pub async fn fetch_thumbnail(&self, url: &str, verbose: bool) -> Result<PathBuf> {
        let stage = Stage::Thumbnail;
        tokio::fs::create_dir_all(self.downloads_dir()).await?;

        let (command, path) = thumbnail_command(&self.tools.ytdlp, self.downloads_dir(), url);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => debug!(path = %path.display(), "removed stale thumbnail"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        let outcome = self.run_stage(stage, &command, url, verbose).await?;

        if !outcome.success() {
            for line in &outcome.stderr_tail {
                error!(%stage, "{}", line);
            }
            error!(url, exit_code = ?outcome.exit_code, "thumbnail download failed");
            self.event_tx
                .send(Event::StageFailed {
                    stage,
                    exit_code: outcome.exit_code,
                })
                .ok();
            return Err(Error::ProcessFailed {
                stage,
                exit_code: outcome.exit_code,
            });
        }

        if !tokio::fs::try_exists(&path).await? {
            error!(url, path = %path.display(), "yt-dlp succeeded but wrote no thumbnail");
            return Err(Error::MissingAsset { path });
        }

        info!(url, path = %path.display(), "thumbnail downloaded");
        self.event_tx
            .send(Event::ThumbnailFetched { path: path.clone() })
            .ok();
        Ok(path)
    }
}
