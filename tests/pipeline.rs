// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

//! End-to-end pipeline runs against stubbed external tools

use async_trait::async_trait;
use hoi4_radio_dl::config::{DownloadConfig, ModConfig, ToolsConfig};
use hoi4_radio_dl::folder_watcher::{ProgressProbe, ProgressWatcher};
use hoi4_radio_dl::tracker::{DownloadStatus, TrackerState, TrackerStep};
use hoi4_radio_dl::{
    Config, Downloader, Error, Event, OutputMode, Pipeline, PipelineOptions, ProcessOutcome,
    ProcessRunner, Result, ToolCommand,
};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::sync::broadcast;

/// Pretends to be yt-dlp, ffmpeg and ImageMagick
///
/// Media runs drop `tracks` into the downloads directory and exit with the next
/// scripted code. Thumbnail runs write `thumbnail.jpg`. Every other command succeeds.
struct FakeTools {
    downloads: PathBuf,
    tracks: Vec<&'static str>,
    media_exits: Mutex<Vec<i32>>,
    calls: Mutex<Vec<ToolCommand>>,
}

impl FakeTools {
    fn new(downloads: &Path, tracks: Vec<&'static str>, media_exits: Vec<i32>) -> Arc<Self> {
        Arc::new(Self {
            downloads: downloads.to_path_buf(),
            tracks,
            media_exits: Mutex::new(media_exits),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<ToolCommand> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProcessRunner for FakeTools {
    async fn run(&self, command: &ToolCommand, _output: OutputMode) -> Result<ProcessOutcome> {
        self.calls.lock().unwrap().push(command.clone());

        if command.args.iter().any(|a| a == "--extract-audio") {
            for name in &self.tracks {
                tokio::fs::write(self.downloads.join(name), b"OggS").await?;
            }
            let code = {
                let mut exits = self.media_exits.lock().unwrap();
                if exits.is_empty() { 0 } else { exits.remove(0) }
            };
            return Ok(ProcessOutcome::exited(code));
        }
        if command.args.iter().any(|a| a == "--write-thumbnail") {
            tokio::fs::write(self.downloads.join("thumbnail.jpg"), b"JFIF").await?;
        }
        Ok(ProcessOutcome::exited(0))
    }
}

struct NoWatch;

impl ProgressWatcher for NoWatch {
    fn watch(
        &self,
        _dir: &Path,
        _suffix: &str,
        _events: broadcast::Sender<Event>,
    ) -> Result<Box<dyn ProgressProbe>> {
        Err(Error::FolderWatch("disabled in tests".into()))
    }
}

struct Fixture {
    temp: TempDir,
    config: Arc<Config>,
}

impl Fixture {
    async fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let assets = temp.path().join("assets");
        tokio::fs::create_dir_all(&assets).await.unwrap();
        tokio::fs::write(assets.join("radio_station.dds"), b"DDS ").await.unwrap();
        tokio::fs::write(assets.join("template.png"), b"PNG").await.unwrap();

        let config = Arc::new(Config {
            download: DownloadConfig {
                downloads_dir: temp.path().join("downloads"),
                ..Default::default()
            },
            tools: ToolsConfig {
                search_path: false,
                ..Default::default()
            },
            modding: ModConfig {
                output_root: temp.path().join("output"),
                default_faceplate: assets.join("radio_station.dds"),
                cover_template: assets.join("template.png"),
                ..Default::default()
            },
            tracker_path: temp.path().join("tracker.json"),
        });
        Self { temp, config }
    }

    fn pipeline(&self, tools: Arc<FakeTools>) -> Pipeline {
        let downloader =
            Downloader::with_components(self.config.clone(), tools, Arc::new(NoWatch));
        Pipeline::with_downloader(self.config.clone(), downloader)
    }

    fn downloads(&self) -> PathBuf {
        self.config.download.downloads_dir.clone()
    }

    async fn tracker(&self) -> TrackerState {
        let raw = tokio::fs::read_to_string(&self.config.tracker_path)
            .await
            .unwrap();
        serde_json::from_str(&raw).unwrap()
    }
}

fn options(url: &str) -> PipelineOptions {
    PipelineOptions {
        url: url.to_string(),
        mod_name: "Night Drive".to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn playlist_becomes_a_mod() {
    let fx = Fixture::new().await;
    tokio::fs::create_dir_all(fx.downloads()).await.unwrap();
    let tools = FakeTools::new(&fx.downloads(), vec!["Track One.ogg", "Track Two.ogg"], vec![]);
    let pipeline = fx.pipeline(tools.clone());

    let summary = pipeline
        .run(&options("https://www.youtube.com/playlist?list=PLabc"))
        .await
        .unwrap();

    assert_eq!(summary.track_count, 2);
    assert_eq!(summary.mod_root, fx.temp.path().join("output").join("Night_Drive"));
    assert!(!summary.fetch.had_warnings());
    assert!(fx.temp.path().join("output").join("Night_Drive.mod").is_file());

    // initial + verify, no thumbnail, no image tools
    assert_eq!(tools.calls().len(), 2);

    let state = fx.tracker().await;
    assert_eq!(state.current_step, Some(TrackerStep::ModDone));
    assert_eq!(state.downloaded.len(), 1);
    assert_eq!(state.downloaded[0].id, "PLabc");
    assert_eq!(state.downloaded[0].status, DownloadStatus::Success);
}

#[tokio::test]
async fn tolerated_partial_failure_still_builds() {
    let fx = Fixture::new().await;
    tokio::fs::create_dir_all(fx.downloads()).await.unwrap();
    let tools = FakeTools::new(&fx.downloads(), vec!["Only.ogg"], vec![1, 0]);
    let pipeline = fx.pipeline(tools);

    let summary = pipeline
        .run(&PipelineOptions {
            ignore_errors: true,
            ..options("https://www.youtube.com/playlist?list=PLabc")
        })
        .await
        .unwrap();

    assert!(summary.fetch.had_warnings());
    assert_eq!(summary.track_count, 1);
}

#[tokio::test]
async fn fatal_download_marks_tracker_entry_failed() {
    let fx = Fixture::new().await;
    let tools = FakeTools::new(&fx.downloads(), vec![], vec![2]);
    let pipeline = fx.pipeline(tools.clone());

    let err = pipeline
        .run(&options("https://www.youtube.com/watch?v=xyz"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::ProcessFailed { exit_code: Some(2), .. }));
    assert_eq!(tools.calls().len(), 1);

    let state = fx.tracker().await;
    assert_eq!(state.current_step, Some(TrackerStep::Downloading));
    assert_eq!(state.downloaded[0].id, "xyz");
    assert_eq!(state.downloaded[0].status, DownloadStatus::Error);
    assert!(state.downloaded[0].error.as_deref().unwrap().contains("exit code 2"));
    assert!(!fx.temp.path().join("output").exists());
}

#[tokio::test]
async fn successful_run_without_media_is_no_assets() {
    let fx = Fixture::new().await;
    let tools = FakeTools::new(&fx.downloads(), vec![], vec![]);
    let pipeline = fx.pipeline(tools);

    let err = pipeline
        .run(&options("https://www.youtube.com/watch?v=xyz"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::NoAssetsProduced { .. }));
    assert_eq!(fx.tracker().await.downloaded[0].status, DownloadStatus::Success);
}

#[tokio::test]
async fn thumbnail_faceplate_runs_image_tools() {
    let fx = Fixture::new().await;
    tokio::fs::create_dir_all(fx.downloads()).await.unwrap();
    let tools = FakeTools::new(&fx.downloads(), vec!["Song.ogg"], vec![]);
    let pipeline = fx.pipeline(tools.clone());

    pipeline
        .run(&PipelineOptions {
            use_thumbnail: true,
            ..options("https://www.youtube.com/watch?v=xyz")
        })
        .await
        .unwrap();

    let programs: Vec<String> = tools.calls().iter().map(ToolCommand::program_name).collect();
    assert_eq!(
        programs,
        ["yt-dlp", "yt-dlp", "yt-dlp", "ffmpeg", "ffmpeg", "ffmpeg", "magick"]
    );
    let thumbnail = &tools.calls()[2];
    assert!(thumbnail.args.iter().any(|a| a == "--skip-download"));
    assert!(!thumbnail.args.iter().any(|a| a == "--download-archive"));
}

#[tokio::test]
async fn invalid_inputs_fail_before_spawning() {
    let fx = Fixture::new().await;
    let tools = FakeTools::new(&fx.downloads(), vec![], vec![]);
    let pipeline = fx.pipeline(tools.clone());

    let err = pipeline.run(&options("not a url")).await.unwrap_err();
    assert!(matches!(err, Error::InvalidUrl { .. }));

    let err = pipeline
        .run(&PipelineOptions {
            mod_name: "!!!".into(),
            ..options("https://www.youtube.com/watch?v=xyz")
        })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Config { .. }));

    assert!(tools.calls().is_empty());
}

#[tokio::test]
async fn reset_tracker_forgets_previous_runs() {
    let fx = Fixture::new().await;
    tokio::fs::create_dir_all(fx.downloads()).await.unwrap();

    let first = fx.pipeline(FakeTools::new(&fx.downloads(), vec!["a.ogg"], vec![]));
    first
        .run(&options("https://www.youtube.com/watch?v=one"))
        .await
        .unwrap();

    let second = fx.pipeline(FakeTools::new(&fx.downloads(), vec!["b.ogg"], vec![]));
    second
        .run(&PipelineOptions {
            reset_tracker: true,
            ..options("https://www.youtube.com/watch?v=two")
        })
        .await
        .unwrap();

    let state = fx.tracker().await;
    assert_eq!(state.downloaded.len(), 1);
    assert_eq!(state.downloaded[0].id, "two");
}
