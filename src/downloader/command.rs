//! yt-dlp command lines

use crate::config::DownloadConfig;
use crate::process::ToolCommand;
use crate::types::DownloadRequest;
use std::path::{Path, PathBuf};
use tracing::warn;

/// yt-dlp flag naming the download archive
pub const ARCHIVE_FLAG: &str = "--download-archive";

/// Base name (without extension) the thumbnail is written to inside the downloads directory
pub const THUMBNAIL_STEM: &str = "thumbnail";

/// Image format thumbnails are converted to
pub const THUMBNAIL_FORMAT: &str = "jpg";

/// Build the media download command
///
/// Order: URL, output template, format selector, audio extraction, `--ignore-errors`
/// (when requested), operator extra args, request extra args, then the archive pair.
/// A caller-supplied archive pair is dropped so the ledger appears exactly once.
pub fn download_command(
    ytdlp: &Path,
    config: &DownloadConfig,
    request: &DownloadRequest,
) -> ToolCommand {
    let output = config.downloads_dir.join(&config.output_template);

    let mut cmd = ToolCommand::new(ytdlp)
        .arg(request.url())
        .arg("--output")
        .arg(output.to_string_lossy())
        .args(["--format", config.format_select.as_str()])
        .args([
            "--extract-audio",
            "--audio-format",
            config.audio_format.as_str(),
            "--audio-quality",
            config.audio_quality.as_str(),
        ]);

    if !config.postprocessor_args.trim().is_empty() {
        cmd = cmd.args(["--postprocessor-args", config.postprocessor_args.as_str()]);
    }

    if request.ignore_errors {
        cmd = cmd.arg("--ignore-errors");
    }

    cmd.args(strip_archive_args(&config.extra_args))
        .args(strip_archive_args(&request.extra_args))
        .arg(ARCHIVE_FLAG)
        .arg(config.archive_path().to_string_lossy())
}

/// Build the thumbnail-only command and the path the image will land at
pub fn thumbnail_command(ytdlp: &Path, downloads_dir: &Path, url: &str) -> (ToolCommand, PathBuf) {
    let stem = downloads_dir.join(THUMBNAIL_STEM);
    let output = downloads_dir.join(format!("{THUMBNAIL_STEM}.{THUMBNAIL_FORMAT}"));

    let cmd = ToolCommand::new(ytdlp)
        .arg(url)
        .args([
            "--write-thumbnail",
            "--skip-download",
            "--playlist-items",
            "0",
            "--convert-thumbnails",
            THUMBNAIL_FORMAT,
            "--output",
        ])
        .arg(stem.to_string_lossy());

    (cmd, output)
}

/// Remove `--download-archive <path>` and `--download-archive=<path>` from user args
fn strip_archive_args(args: &[String]) -> Vec<String> {
    let mut kept = Vec::with_capacity(args.len());
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        if arg == ARCHIVE_FLAG {
            let value = iter.next();
            warn!(value = ?value, "ignoring caller-supplied {ARCHIVE_FLAG}; the managed archive is used");
            continue;
        }
        if arg.starts_with(&format!("{ARCHIVE_FLAG}=")) {
            warn!(arg = %arg, "ignoring caller-supplied {ARCHIVE_FLAG}; the managed archive is used");
            continue;
        }
        kept.push(arg.clone());
    }

    kept
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> DownloadConfig {
        DownloadConfig {
            downloads_dir: PathBuf::from("/data/downloads"),
            ..Default::default()
        }
    }

    fn archive_positions(cmd: &ToolCommand) -> Vec<usize> {
        cmd.args
            .iter()
            .enumerate()
            .filter(|(_, a)| a.as_str() == ARCHIVE_FLAG)
            .map(|(i, _)| i)
            .collect()
    }

    #[test]
    fn download_command_layout() {
        let request = DownloadRequest::new("https://video.example/watch?id=abc").unwrap();
        let cmd = download_command(Path::new("yt-dlp"), &config(), &request);

        assert_eq!(
            cmd.args,
            vec![
                "https://video.example/watch?id=abc",
                "--output",
                "/data/downloads/%(title)s.%(ext)s",
                "--format",
                "bestaudio/best",
                "--extract-audio",
                "--audio-format",
                "vorbis",
                "--audio-quality",
                "192K",
                "--postprocessor-args",
                "-ac 2 -ar 44100 -sample_fmt s32",
                "--download-archive",
                "/data/downloads/.archive.txt",
            ]
        );
    }

    #[test]
    fn extra_args_precede_archive_pair() {
        let mut config = config();
        config.extra_args = vec!["--cookies".into(), "cookies.txt".into()];
        let request = DownloadRequest::new("https://video.example/list?id=xyz")
            .unwrap()
            .with_extra_args(["--limit", "5"])
            .ignore_errors(true);

        let cmd = download_command(Path::new("yt-dlp"), &config, &request);
        let args = &cmd.args;
        let pos = |needle: &str| args.iter().position(|a| a == needle).unwrap();

        assert!(pos("--ignore-errors") < pos("--cookies"));
        assert!(pos("--cookies") < pos("--limit"));
        assert_eq!(args[pos("--limit") + 1], "5");
        assert!(pos("--limit") < pos(ARCHIVE_FLAG));
        assert_eq!(args.len() - 2, pos(ARCHIVE_FLAG));
    }

    #[test]
    fn archive_pair_appears_exactly_once() {
        let request = DownloadRequest::new("https://video.example/watch?id=abc")
            .unwrap()
            .with_extra_args([
                "--download-archive",
                "/tmp/other.txt",
                "--download-archive=/tmp/third.txt",
                "--no-mtime",
            ]);

        let cmd = download_command(Path::new("yt-dlp"), &config(), &request);

        let positions = archive_positions(&cmd);
        assert_eq!(positions.len(), 1);
        assert_eq!(cmd.args[positions[0] + 1], "/data/downloads/.archive.txt");
        assert!(cmd.args.contains(&"--no-mtime".to_string()));
        assert!(!cmd.args.iter().any(|a| a.contains("/tmp/")));
    }

    #[test]
    fn empty_postprocessor_args_are_omitted() {
        let mut config = config();
        config.postprocessor_args = String::new();
        let request = DownloadRequest::new("https://video.example/watch?id=abc").unwrap();

        let cmd = download_command(Path::new("yt-dlp"), &config, &request);
        assert!(!cmd.args.contains(&"--postprocessor-args".to_string()));
    }

    #[test]
    fn thumbnail_command_layout() {
        let (cmd, path) = thumbnail_command(
            Path::new("/usr/bin/yt-dlp"),
            Path::new("/data/downloads"),
            "https://video.example/watch?id=abc",
        );

        assert_eq!(cmd.program, PathBuf::from("/usr/bin/yt-dlp"));
        assert_eq!(
            cmd.args,
            vec![
                "https://video.example/watch?id=abc",
                "--write-thumbnail",
                "--skip-download",
                "--playlist-items",
                "0",
                "--convert-thumbnails",
                "jpg",
                "--output",
                "/data/downloads/thumbnail",
            ]
        );
        assert_eq!(path, PathBuf::from("/data/downloads/thumbnail.jpg"));
        assert!(archive_positions(&cmd).is_empty());
    }
}
