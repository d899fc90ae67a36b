//! # hoi4-radio-dl
//!
//! Downloads a video or playlist's audio with yt-dlp and packages it as a
//! Hearts of Iron IV radio station mod.

use clap::Parser;
use hoi4_radio_dl::pipeline::{Pipeline, PipelineOptions};
use hoi4_radio_dl::{Config, Error, Result, logging, run_with_shutdown};
use std::error::Error as StdError;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

/// Command-line interface
#[derive(Debug, Parser)]
#[command(name = "hoi4-radio-dl")]
#[command(version)]
#[command(about = "Turn a YouTube video or playlist into a Hearts of Iron IV radio station mod")]
#[command(long_about = "Downloads audio with yt-dlp and generates a radio station mod:
  hoi4-radio-dl --url <playlist> --mod-name \"Lo-fi Radio\"
  hoi4-radio-dl --url <video> --mod-name synth --use-thumbnail

Extra yt-dlp arguments go last, everything after --ytdlp-args is forwarded:
  hoi4-radio-dl --url <url> --mod-name x --ytdlp-args --cookies cookies.txt")]
struct Cli {
    /// Video or playlist URL
    #[arg(long)]
    url: String,

    /// Name of the mod to generate
    #[arg(long)]
    mod_name: String,

    /// Keep going when yt-dlp reports errors for individual items
    #[arg(long)]
    ignore_errors: bool,

    /// Relay yt-dlp, ffmpeg and ImageMagick output and enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Build the station faceplate from the source thumbnail
    #[arg(long)]
    use_thumbnail: bool,

    /// Game version written into the mod descriptors
    #[arg(long)]
    game_version: Option<String>,

    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Clear the run tracker before starting
    #[arg(long)]
    reset_tracker: bool,

    /// Additional arguments passed to yt-dlp verbatim
    #[arg(long, num_args = 1.., allow_hyphen_values = true)]
    ytdlp_args: Vec<String>,
}

impl Cli {
    fn options(&self) -> PipelineOptions {
        PipelineOptions {
            url: self.url.clone(),
            mod_name: self.mod_name.clone(),
            extra_args: self.ytdlp_args.clone(),
            ignore_errors: self.ignore_errors,
            verbose: self.verbose,
            use_thumbnail: self.use_thumbnail,
            reset_tracker: self.reset_tracker,
        }
    }
}

async fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path).await?,
        None => Config::default(),
    };
    if let Some(version) = &cli.game_version {
        config.modding.game_version = version.clone();
    }
    config.validate()?;
    Ok(config)
}

async fn run(cli: Cli) -> Result<()> {
    let config = Arc::new(load_config(&cli).await?);
    let pipeline = Pipeline::new(config);

    info!(url = %cli.url, "starting download");
    let summary = pipeline.run(&cli.options()).await?;

    if summary.fetch.had_warnings() {
        info!("some items could not be downloaded, see warnings above");
    }
    info!(
        mod_root = %summary.mod_root.display(),
        tracks = summary.track_count,
        "mod generation complete"
    );
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    if let Err(e) = run_with_shutdown(run(cli)).await {
        report(&e);
        std::process::exit(e.exit_code());
    }
}

fn report(e: &Error) {
    error!(code = e.error_code(), "{e}");
    let mut source = StdError::source(e);
    while let Some(cause) = source {
        error!("  caused by: {cause}");
        source = cause.source();
    }
}
