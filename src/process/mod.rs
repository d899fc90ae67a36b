//! External process execution
//!
//! [`ProcessRunner`] is the seam between orchestration and the operating system:
//! the downloader and the faceplate processor only build [`ToolCommand`]s and judge
//! the resulting [`ProcessOutcome`]. [`TokioProcessRunner`] spawns the real binary,
//! drives both output streams concurrently with the exit wait, and enforces an
//! optional timeout.

mod relay;

pub use relay::{relay_stream, tail_lines};

use crate::config::ToolsConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Number of stderr lines kept for diagnostics in quiet mode
const STDERR_TAIL_LINES: usize = 20;

/// A program plus its ordered argument list
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolCommand {
    /// Executable to spawn
    pub program: PathBuf,
    /// Arguments, passed verbatim (no shell involved)
    pub args: Vec<String>,
}

impl ToolCommand {
    /// Create a command with no arguments
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Append one argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Short program name for log fields and error messages
    pub fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.display().to_string())
    }
}

impl std::fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " {arg:?}")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

/// What to do with the child's stdout and stderr
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutputMode {
    /// Forward both streams to our stdout, each chunk tagged with its label
    Relay {
        /// Label for the child's stdout
        stdout_label: String,
        /// Label for the child's stderr
        stderr_label: String,
    },
    /// Discard stdout, keep the tail of stderr for diagnostics
    Quiet,
}

impl OutputMode {
    /// Relay mode with `<name>` / `<name>-err` labels
    pub fn relay(name: &str) -> Self {
        OutputMode::Relay {
            stdout_label: name.to_string(),
            stderr_label: format!("{name}-err"),
        }
    }

    /// Relay when `verbose`, otherwise quiet
    pub fn for_verbosity(name: &str, verbose: bool) -> Self {
        if verbose {
            Self::relay(name)
        } else {
            OutputMode::Quiet
        }
    }
}

/// Result of a process that ran to completion (or was killed)
#[must_use]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProcessOutcome {
    /// Exit code, `None` if terminated by a signal or killed on timeout
    pub exit_code: Option<i32>,
    /// Set when the runner killed the process after its timeout
    pub timed_out: bool,
    /// Last lines of stderr (quiet mode only)
    pub stderr_tail: Vec<String>,
}

impl ProcessOutcome {
    /// Outcome of a process that exited normally with `code`
    pub fn exited(code: i32) -> Self {
        Self {
            exit_code: Some(code),
            ..Default::default()
        }
    }

    /// True for a normal exit with status 0
    pub fn success(&self) -> bool {
        self.exit_code == Some(0) && !self.timed_out
    }
}

/// Trait for running external commands
///
/// Implementations must report "could not start" as [`Error::SpawnFailed`] and
/// "ran and exited nonzero" as a normal [`ProcessOutcome`], so callers can tell the
/// two apart.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run `command` to completion
    ///
    /// # Errors
    ///
    /// Returns [`Error::SpawnFailed`] if the program cannot be started, or an I/O
    /// error if waiting on the child fails.
    async fn run(&self, command: &ToolCommand, output: OutputMode) -> Result<ProcessOutcome>;
}

/// Runs commands with `tokio::process`
#[derive(Clone, Debug, Default)]
pub struct TokioProcessRunner {
    timeout: Option<Duration>,
}

impl TokioProcessRunner {
    /// Create a runner that waits indefinitely
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a runner that kills any process still running after `timeout`
    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(&self, command: &ToolCommand, output: OutputMode) -> Result<ProcessOutcome> {
        debug!(command = %command, "spawning process");

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .stdin(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        match output {
            OutputMode::Relay { .. } => cmd.stdout(Stdio::piped()),
            OutputMode::Quiet => cmd.stdout(Stdio::null()),
        };

        let mut child = cmd.spawn().map_err(|source| Error::SpawnFailed {
            program: command.program.clone(),
            source,
        })?;
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let drive = async {
            match &output {
                OutputMode::Relay {
                    stdout_label,
                    stderr_label,
                } => {
                    let (out, err, status) = tokio::join!(
                        relay_optional(stdout, stdout_label),
                        relay_optional(stderr, stderr_label),
                        child.wait(),
                    );
                    log_relay_error(out, stdout_label);
                    log_relay_error(err, stderr_label);
                    status.map(|s| (s, Vec::new()))
                }
                OutputMode::Quiet => {
                    let (tail, status) = tokio::join!(tail_optional(stderr), child.wait());
                    let tail = tail.unwrap_or_else(|e| {
                        warn!(error = %e, "failed to read stderr");
                        Vec::new()
                    });
                    status.map(|s| (s, tail))
                }
            }
        };

        let waited = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, drive).await.ok(),
            None => Some(drive.await),
        };

        match waited {
            Some(result) => {
                let (status, stderr_tail) = result?;
                debug!(program = %command.program_name(), code = ?status.code(), "process exited");
                Ok(ProcessOutcome {
                    exit_code: status.code(),
                    timed_out: false,
                    stderr_tail,
                })
            }
            None => {
                warn!(
                    program = %command.program_name(),
                    timeout = ?self.timeout,
                    "process timed out, killing"
                );
                if let Err(e) = child.kill().await {
                    warn!(error = %e, "failed to kill timed out process");
                }
                Ok(ProcessOutcome {
                    exit_code: None,
                    timed_out: true,
                    stderr_tail: Vec::new(),
                })
            }
        }
    }
}

async fn relay_optional<R>(stream: Option<R>, label: &str) -> std::io::Result<u64>
where
    R: tokio::io::AsyncRead + Unpin,
{
    match stream {
        Some(stream) => relay_stream(stream, label, tokio::io::stdout()).await,
        None => Ok(0),
    }
}

async fn tail_optional<R>(stream: Option<R>) -> std::io::Result<Vec<String>>
where
    R: tokio::io::AsyncRead + Unpin,
{
    match stream {
        Some(stream) => tail_lines(stream, STDERR_TAIL_LINES).await,
        None => Ok(Vec::new()),
    }
}

fn log_relay_error(result: std::io::Result<u64>, label: &str) {
    if let Err(e) = result {
        warn!(stream = label, error = %e, "output relay stopped early");
    }
}

/// Resolve an executable: explicit path, then PATH lookup, then the bare name
///
/// Falling back to the bare name defers the "not installed" report to spawn time,
/// where it surfaces as [`Error::SpawnFailed`].
pub fn resolve_tool(explicit: Option<&Path>, name: &str, search_path: bool) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    if search_path {
        if let Ok(found) = which::which(name) {
            return found;
        }
        debug!(tool = name, "not found in PATH");
    }
    PathBuf::from(name)
}

/// Resolved locations of every external tool the crate shells out to
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolPaths {
    /// yt-dlp
    pub ytdlp: PathBuf,
    /// ffmpeg (thumbnail resize/compose)
    pub ffmpeg: PathBuf,
    /// ImageMagick (DDS conversion)
    pub magick: PathBuf,
}

impl ToolPaths {
    /// Resolve all tools from configuration
    pub fn resolve(tools: &ToolsConfig) -> Self {
        Self {
            ytdlp: resolve_tool(tools.ytdlp_path.as_deref(), "yt-dlp", tools.search_path),
            ffmpeg: resolve_tool(tools.ffmpeg_path.as_deref(), "ffmpeg", tools.search_path),
            magick: resolve_tool(tools.magick_path.as_deref(), "magick", tools.search_path),
        }
    }
}
