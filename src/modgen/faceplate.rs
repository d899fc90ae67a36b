//! Thumbnail to faceplate conversion
//!
//! The station button in the music player is a 304x120 texture holding two
//! 152x120 frames (idle and selected). A thumbnail is cropped to one frame,
//! duplicated side by side, overlaid with the cover template and converted to
//! an uncompressed DDS with ImageMagick.

use crate::error::{Error, Result};
use crate::process::{OutputMode, ProcessRunner, ToolCommand, ToolPaths};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Width of a single faceplate frame
pub const FRAME_WIDTH: u32 = 152;
/// Height of the faceplate
pub const FRAME_HEIGHT: u32 = 120;

/// One step of the conversion: a human-readable name and the command to run
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FaceplateStep {
    /// Short name used in logs and [`Error::ExternalTool`]
    pub name: &'static str,
    /// Command to run
    pub command: ToolCommand,
}

/// Build the ordered conversion steps
///
/// Intermediate images are written into `work_dir`; only the last step writes
/// to `output`.
pub fn faceplate_steps(
    tools: &ToolPaths,
    thumbnail: &Path,
    template: &Path,
    work_dir: &Path,
    output: &Path,
) -> Vec<FaceplateStep> {
    let resized = work_dir.join("resized.png");
    let combined = work_dir.join("combined.png");
    let overlaid = work_dir.join("overlaid.png");
    let (w, h) = (FRAME_WIDTH, FRAME_HEIGHT);
    let full = FRAME_WIDTH * 2;

    vec![
        FaceplateStep {
            name: "ffmpeg resize",
            command: ToolCommand::new(&tools.ffmpeg)
                .args(["-y", "-i"])
                .arg(path_arg(thumbnail))
                .arg("-vf")
                .arg(format!(
                    "scale={w}:{h}:force_original_aspect_ratio=increase,crop={w}:{h}"
                ))
                .arg(path_arg(&resized)),
        },
        FaceplateStep {
            name: "ffmpeg combine",
            command: ToolCommand::new(&tools.ffmpeg)
                .args(["-y", "-i"])
                .arg(path_arg(&resized))
                .arg("-filter_complex")
                .arg(format!(
                    "[0]split[left][right];[left]pad={full}:{h}[left_pad];\
                     [right]pad={full}:{h}:{w}:0[right_pad];\
                     [left_pad][right_pad]blend=all_mode=addition"
                ))
                .arg(path_arg(&combined)),
        },
        FaceplateStep {
            name: "ffmpeg overlay",
            command: ToolCommand::new(&tools.ffmpeg)
                .args(["-y", "-i"])
                .arg(path_arg(&combined))
                .arg("-i")
                .arg(path_arg(template))
                .args(["-filter_complex", "[0][1]overlay=0:0"])
                .arg(path_arg(&overlaid)),
        },
        FaceplateStep {
            name: "magick convert",
            command: ToolCommand::new(&tools.magick)
                .arg(path_arg(&overlaid))
                .args([
                    "-define",
                    "dds:compression=none",
                    "-define",
                    "dds:mipmaps=0",
                    "-define",
                    "dds:format=dxt5",
                ])
                .arg(path_arg(output)),
        },
    ]
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Runs the conversion steps through a [`ProcessRunner`]
pub struct FaceplateProcessor {
    runner: Arc<dyn ProcessRunner>,
    tools: ToolPaths,
    template: PathBuf,
    timeout: Option<Duration>,
}

impl FaceplateProcessor {
    /// Create a processor overlaying `template` onto thumbnails
    ///
    /// `timeout` is only used to describe [`Error::Timeout`]; enforcing it is
    /// the runner's job.
    pub fn new(
        runner: Arc<dyn ProcessRunner>,
        tools: ToolPaths,
        template: impl Into<PathBuf>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            runner,
            tools,
            template: template.into(),
            timeout,
        }
    }

    /// Convert `thumbnail` into a DDS faceplate at `output`
    ///
    /// Intermediate files live in a temporary directory removed on every return
    /// path.
    ///
    /// # Errors
    ///
    /// - [`Error::MissingAsset`] if the cover template does not exist
    /// - [`Error::SpawnFailed`] if ffmpeg or ImageMagick cannot be started
    /// - [`Error::ExternalTool`] if a step exits nonzero
    /// - [`Error::Timeout`] if a step is killed by the runner
    pub async fn process(&self, thumbnail: &Path, output: &Path, verbose: bool) -> Result<()> {
        if !tokio::fs::try_exists(&self.template).await? {
            return Err(Error::MissingAsset {
                path: self.template.clone(),
            });
        }

        info!(thumbnail = %thumbnail.display(), "processing thumbnail into faceplate");
        let work_dir = tempfile::tempdir()?;

        for step in faceplate_steps(&self.tools, thumbnail, &self.template, work_dir.path(), output)
        {
            debug!(step = step.name, command = %step.command, "running faceplate step");
            let label = step.command.program_name();
            let outcome = self
                .runner
                .run(&step.command, OutputMode::for_verbosity(&label, verbose))
                .await?;

            if outcome.timed_out {
                return Err(Error::Timeout {
                    program: label,
                    after: self.timeout.unwrap_or_default(),
                });
            }
            if !outcome.success() {
                for line in &outcome.stderr_tail {
                    error!(step = step.name, "{}", line);
                }
                return Err(Error::ExternalTool {
                    tool: step.name.to_string(),
                    exit_code: outcome.exit_code,
                });
            }
        }

        info!(output = %output.display(), "faceplate written");
        Ok(())
    }
}
