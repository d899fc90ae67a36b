//! Configuration types for hoi4-radio-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Download behavior configuration (directories, yt-dlp arguments, timeouts)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Download directory (default: "./downloads")
    #[serde(default = "default_downloads_dir")]
    pub downloads_dir: PathBuf,

    /// Base name of the download archive kept inside the downloads directory
    /// (default: "archive", giving `<downloads_dir>/.archive.txt`)
    #[serde(default = "default_archive_name")]
    pub archive_name: String,

    /// yt-dlp output template relative to the downloads directory
    #[serde(default = "default_output_template")]
    pub output_template: String,

    /// yt-dlp format selector (default: "bestaudio/best")
    #[serde(default = "default_format_select")]
    pub format_select: String,

    /// Audio codec requested from the extract-audio postprocessor (default: "vorbis")
    #[serde(default = "default_audio_format")]
    pub audio_format: String,

    /// Audio quality passed to the extract-audio postprocessor (default: "192K")
    #[serde(default = "default_audio_quality")]
    pub audio_quality: String,

    /// Extra ffmpeg arguments for the postprocessor (stereo, 44.1 kHz, 32-bit samples)
    #[serde(default = "default_postprocessor_args")]
    pub postprocessor_args: String,

    /// Suffix of finished media files (default: ".ogg")
    #[serde(default = "default_media_suffix")]
    pub media_suffix: String,

    /// Operator-wide yt-dlp arguments (proxy, cookies, ...), placed before per-request arguments
    #[serde(default)]
    pub extra_args: Vec<String>,

    /// Kill the tool if a single stage runs longer than this (None = no limit)
    #[serde(default, with = "optional_duration_serde")]
    pub stage_timeout: Option<Duration>,

    /// Watch the downloads directory for new tracks when output is not relayed (default: true)
    #[serde(default = "default_true")]
    pub watch_progress: bool,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            downloads_dir: default_downloads_dir(),
            archive_name: default_archive_name(),
            output_template: default_output_template(),
            format_select: default_format_select(),
            audio_format: default_audio_format(),
            audio_quality: default_audio_quality(),
            postprocessor_args: default_postprocessor_args(),
            media_suffix: default_media_suffix(),
            extra_args: Vec::new(),
            stage_timeout: None,
            watch_progress: true,
        }
    }
}

impl DownloadConfig {
    /// Path of the download archive (ledger) consulted by yt-dlp
    pub fn archive_path(&self) -> PathBuf {
        self.downloads_dir.join(format!(".{}.txt", self.archive_name))
    }
}

/// External tool paths (yt-dlp, ffmpeg, ImageMagick)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Path to yt-dlp executable (auto-detected if None)
    #[serde(default)]
    pub ytdlp_path: Option<PathBuf>,

    /// Path to ffmpeg executable (auto-detected if None)
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    /// Path to ImageMagick `magick` executable (auto-detected if None)
    #[serde(default)]
    pub magick_path: Option<PathBuf>,

    /// Whether to search PATH for external binaries if explicit paths not set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ytdlp_path: None,
            ffmpeg_path: None,
            magick_path: None,
            search_path: true,
        }
    }
}

/// Mod packaging settings
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModConfig {
    /// Directory the mod folder and its launcher descriptor are written to (default: "./output")
    #[serde(default = "default_output_root")]
    pub output_root: PathBuf,

    /// Game version written to the descriptors (default: "1.16.8")
    #[serde(default = "default_game_version")]
    pub game_version: String,

    /// Faceplate copied when no thumbnail is used (default: "./radio_station.dds")
    #[serde(default = "default_faceplate")]
    pub default_faceplate: PathBuf,

    /// 304x120 overlay applied to processed thumbnails
    /// (default: "./radio_station_cover_template.png")
    #[serde(default = "default_cover_template")]
    pub cover_template: PathBuf,

    /// Playback volume for every track in the music asset (default: 0.65)
    #[serde(default = "default_music_volume")]
    pub music_volume: f64,
}

impl Default for ModConfig {
    fn default() -> Self {
        Self {
            output_root: default_output_root(),
            game_version: default_game_version(),
            default_faceplate: default_faceplate(),
            cover_template: default_cover_template(),
            music_volume: default_music_volume(),
        }
    }
}

/// Main configuration
///
/// Sub-configs are flattened so the JSON file stays a single flat object.
///
/// # Example
///
/// ```
/// use hoi4_radio_dl::Config;
///
/// let config: Config = serde_json::from_str(r#"{ "downloads_dir": "music", "game_version": "1.15" }"#).unwrap();
/// assert_eq!(config.download.downloads_dir.to_str(), Some("music"));
/// assert_eq!(config.modding.game_version, "1.15");
/// assert_eq!(config.download.format_select, "bestaudio/best");
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Download behavior settings
    #[serde(flatten)]
    pub download: DownloadConfig,

    /// External tool paths
    #[serde(flatten)]
    pub tools: ToolsConfig,

    /// Mod packaging settings
    #[serde(flatten)]
    pub modding: ModConfig,

    /// Location of the tracker state file (default: "./tracker.json")
    #[serde(default = "default_tracker_path")]
    pub tracker_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            download: DownloadConfig::default(),
            tools: ToolsConfig::default(),
            modding: ModConfig::default(),
            tracker_path: default_tracker_path(),
        }
    }
}

impl Config {
    /// Download directory
    pub fn downloads_dir(&self) -> &Path {
        &self.download.downloads_dir
    }

    /// Load configuration from a JSON file and validate it
    ///
    /// # Errors
    /// Returns an I/O error if the file cannot be read, a serialization error if it is
    /// not valid JSON, or [`Error::Config`] if a value is out of range.
    pub async fn load(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&raw)?;
        config.validate()?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Check value ranges that serde cannot express
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("archive_name", &self.download.archive_name),
            ("output_template", &self.download.output_template),
            ("format_select", &self.download.format_select),
            ("audio_format", &self.download.audio_format),
            ("media_suffix", &self.download.media_suffix),
            ("game_version", &self.modding.game_version),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(Error::config(key, format!("{key} must not be empty")));
            }
        }

        if self.download.archive_name.contains(['/', '\\']) {
            return Err(Error::config(
                "archive_name",
                "archive_name must be a bare file name",
            ));
        }

        if self.download.stage_timeout == Some(Duration::ZERO) {
            return Err(Error::config(
                "stage_timeout",
                "stage_timeout must be positive (omit it to disable)",
            ));
        }

        let volume = self.modding.music_volume;
        if !(volume > 0.0 && volume <= 1.0) {
            return Err(Error::config(
                "music_volume",
                format!("music_volume must be in (0, 1], got {volume}"),
            ));
        }

        Ok(())
    }
}

fn default_true() -> bool {
    true
}

fn default_downloads_dir() -> PathBuf {
    PathBuf::from("./downloads")
}

fn default_archive_name() -> String {
    "archive".into()
}

fn default_output_template() -> String {
    "%(title)s.%(ext)s".into()
}

fn default_format_select() -> String {
    "bestaudio/best".into()
}

fn default_audio_format() -> String {
    "vorbis".into()
}

fn default_audio_quality() -> String {
    "192K".into()
}

fn default_postprocessor_args() -> String {
    "-ac 2 -ar 44100 -sample_fmt s32".into()
}

fn default_media_suffix() -> String {
    ".ogg".into()
}

fn default_output_root() -> PathBuf {
    PathBuf::from("./output")
}

fn default_game_version() -> String {
    "1.16.8".into()
}

fn default_faceplate() -> PathBuf {
    PathBuf::from("./radio_station.dds")
}

fn default_cover_template() -> PathBuf {
    PathBuf::from("./radio_station_cover_template.png")
}

fn default_music_volume() -> f64 {
    0.65
}

fn default_tracker_path() -> PathBuf {
    PathBuf::from("./tracker.json")
}

// Optional Duration serialization helper (whole seconds)
mod optional_duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&d.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = Option::<u64>::deserialize(deserializer)?;
        Ok(secs.map(Duration::from_secs))
    }
}
