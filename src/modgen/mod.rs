//! Hearts of Iron IV radio station mod generation
//!
//! Turns the media files left in the downloads directory into a self-contained
//! mod folder: tracks copied under unique names, a faceplate texture, and the
//! descriptor, localisation, interface and music scripts that register the
//! station with the game.

mod faceplate;
mod layout;
pub mod templates;

pub use faceplate::{FRAME_HEIGHT, FRAME_WIDTH, FaceplateProcessor, FaceplateStep, faceplate_steps};
pub use layout::{ModLayout, normalize_mod_name};
pub use templates::Track;

use crate::config::Config;
use crate::downloader::Downloader;
use crate::error::{Error, Result};
use crate::process::{ProcessRunner, ToolPaths};
use crate::tracker::{Tracker, TrackerStep};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Version written into generated descriptors
pub const MOD_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Where the station's faceplate comes from
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FaceplateSource {
    /// Copy the configured default texture
    Default,
    /// Convert a downloaded thumbnail
    Thumbnail(PathBuf),
}

impl FaceplateSource {
    /// Decide the faceplate for a run, fetching the thumbnail when asked to
    ///
    /// `use_thumbnail` without a URL falls back to the default with a warning.
    pub async fn resolve(
        downloader: &Downloader,
        url: Option<&str>,
        use_thumbnail: bool,
        verbose: bool,
    ) -> Result<Self> {
        match (use_thumbnail, url) {
            (true, Some(url)) => Ok(Self::Thumbnail(
                downloader.fetch_thumbnail(url, verbose).await?,
            )),
            (true, None) => {
                warn!("thumbnail requested but no URL given, using the default faceplate");
                Ok(Self::Default)
            }
            (false, _) => Ok(Self::Default),
        }
    }
}

/// List media files in `dir` ending with `suffix`, sorted by name
///
/// yt-dlp's in-progress `.temp<suffix>` files are skipped.
///
/// # Errors
///
/// Returns [`Error::NoAssetsProduced`] if no file matches.
pub async fn discover_tracks(dir: &Path, suffix: &str) -> Result<Vec<PathBuf>> {
    let temp_suffix = format!(".temp{suffix}");
    let mut found = Vec::new();

    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if !name.ends_with(suffix) || name.ends_with(&temp_suffix) {
            continue;
        }
        if entry.file_type().await?.is_file() {
            found.push(entry.path());
        }
    }

    if found.is_empty() {
        return Err(Error::NoAssetsProduced {
            dir: dir.to_path_buf(),
            suffix: suffix.to_string(),
        });
    }
    found.sort();
    debug!(count = found.len(), dir = %dir.display(), "tracks discovered");
    Ok(found)
}

/// Builds one mod under the configured output root
pub struct ModGenerator {
    config: Arc<Config>,
    layout: ModLayout,
    display_name: String,
    faceplate: FaceplateProcessor,
}

impl ModGenerator {
    /// Create a generator for the mod called `mod_name`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the name normalizes to nothing.
    pub fn new(
        config: Arc<Config>,
        mod_name: &str,
        runner: Arc<dyn ProcessRunner>,
        tools: ToolPaths,
    ) -> Result<Self> {
        let name = normalize_mod_name(mod_name)?;
        let layout = ModLayout::new(&config.modding.output_root, name);
        let faceplate = FaceplateProcessor::new(
            runner,
            tools,
            &config.modding.cover_template,
            config.download.stage_timeout,
        );
        Ok(Self {
            display_name: mod_name.trim().to_string(),
            config,
            layout,
            faceplate,
        })
    }

    /// Paths of the generated mod
    pub fn layout(&self) -> &ModLayout {
        &self.layout
    }

    /// Run every generation step in order
    ///
    /// When a tracker is given, each step is recorded before it starts and
    /// [`TrackerStep::ModDone`] after the last one.
    pub async fn generate(
        &self,
        sources: &[PathBuf],
        faceplate: &FaceplateSource,
        verbose: bool,
        mut tracker: Option<&mut Tracker>,
    ) -> Result<Vec<Track>> {
        info!(name = self.layout.name(), tracks = sources.len(), "generating mod");

        enter(&mut tracker, TrackerStep::ModSetup).await?;
        self.prepare_folders().await?;
        self.install_faceplate(faceplate, verbose).await?;

        enter(&mut tracker, TrackerStep::ModCopyMusic).await?;
        let tracks = self.copy_tracks(sources).await?;

        enter(&mut tracker, TrackerStep::ModDescriptor).await?;
        self.write_descriptors().await?;

        enter(&mut tracker, TrackerStep::ModLocalisation).await?;
        self.write_localisation(&tracks).await?;

        enter(&mut tracker, TrackerStep::ModInterface).await?;
        self.write_interface().await?;

        enter(&mut tracker, TrackerStep::ModMusicScript).await?;
        self.write_music_script(&tracks).await?;

        enter(&mut tracker, TrackerStep::ModDone).await?;
        info!(
            mod_root = %self.layout.mod_root().display(),
            output_root = %self.layout.output_root().display(),
            "mod generated"
        );
        Ok(tracks)
    }

    /// Create the folder layout
    pub async fn prepare_folders(&self) -> Result<()> {
        self.layout.create_dirs().await
    }

    /// Put the faceplate texture in place
    pub async fn install_faceplate(&self, source: &FaceplateSource, verbose: bool) -> Result<()> {
        let output = self.layout.faceplate_path();
        match source {
            FaceplateSource::Default => {
                let default = &self.config.modding.default_faceplate;
                if !tokio::fs::try_exists(default).await? {
                    return Err(Error::MissingAsset {
                        path: default.clone(),
                    });
                }
                tokio::fs::copy(default, &output).await?;
                info!(output = %output.display(), "default faceplate installed");
                Ok(())
            }
            FaceplateSource::Thumbnail(thumbnail) => {
                self.faceplate.process(thumbnail, &output, verbose).await
            }
        }
    }

    /// Copy each source into the music directory under a fresh unique name
    pub async fn copy_tracks(&self, sources: &[PathBuf]) -> Result<Vec<Track>> {
        let suffix = &self.config.download.media_suffix;
        let music_dir = self.layout.music_dir();
        let mut tracks = Vec::with_capacity(sources.len());

        for source in sources {
            let original = source
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let display_name = original
                .strip_suffix(suffix.as_str())
                .unwrap_or(&original)
                .to_string();
            let key = Uuid::new_v4().simple().to_string();
            let file_name = format!("{key}{suffix}");
            let dest = music_dir.join(&file_name);

            tokio::fs::copy(source, &dest).await?;
            info!(from = %original, to = %dest.display(), "track copied");

            tracks.push(Track {
                id: format!("music_{key}"),
                display_name,
                file_name,
            });
        }
        Ok(tracks)
    }

    /// Write the in-mod and launcher descriptors
    pub async fn write_descriptors(&self) -> Result<()> {
        let game_version = &self.config.modding.game_version;
        tokio::fs::write(
            self.layout.descriptor_path(),
            templates::mod_descriptor(&self.display_name, game_version, MOD_VERSION),
        )
        .await?;
        tokio::fs::write(
            self.layout.launcher_descriptor_path(),
            templates::launcher_descriptor(
                self.layout.name(),
                &self.display_name,
                game_version,
                MOD_VERSION,
            ),
        )
        .await?;
        Ok(())
    }

    /// Write the English localisation with its byte order mark
    pub async fn write_localisation(&self, tracks: &[Track]) -> Result<()> {
        let name = self.layout.name();
        let mut bytes = templates::UTF8_BOM.to_vec();
        bytes.extend_from_slice(templates::localisation(name, &self.display_name, tracks).as_bytes());
        tokio::fs::write(
            self.layout.localisation_dir().join(format!("{name}_l_english.yml")),
            bytes,
        )
        .await?;
        Ok(())
    }

    /// Write the sprite and window definitions
    pub async fn write_interface(&self) -> Result<()> {
        let name = self.layout.name();
        let dir = self.layout.interface_dir();
        tokio::fs::write(dir.join(format!("{name}.gfx")), templates::gfx(name)).await?;
        tokio::fs::write(dir.join(format!("{name}.gui")), templates::gui(name)).await?;
        Ok(())
    }

    /// Write the station script and the sound asset list
    pub async fn write_music_script(&self, tracks: &[Track]) -> Result<()> {
        let name = self.layout.name();
        let dir = self.layout.music_dir();
        tokio::fs::write(
            dir.join(format!("{name}_music.txt")),
            templates::music_definition(name, tracks),
        )
        .await?;
        tokio::fs::write(
            dir.join(format!("{name}_music.asset")),
            templates::music_asset(tracks, self.config.modding.music_volume),
        )
        .await?;
        Ok(())
    }
}

async fn enter(tracker: &mut Option<&mut Tracker>, step: TrackerStep) -> Result<()> {
    if let Some(tracker) = tracker.as_deref_mut() {
        tracker.set_current_step(step).await?;
    }
    Ok(())
}
