//! Core types for hoi4-radio-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One invocation-and-wait cycle of the external downloader
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// First pass of a media fetch
    Initial,
    /// Second pass against the download archive (picks up items added since the first pass)
    Verify,
    /// Single-shot thumbnail fetch
    Thumbnail,
}

impl Stage {
    /// Lowercase name used in logs and messages
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Initial => "initial",
            Stage::Verify => "verify",
            Stage::Thumbnail => "thumbnail",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a completed stage was judged
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum StageOutcome {
    /// The tool exited with status 0
    Completed,
    /// The tool exited with the tolerated soft-failure code and `ignore_errors` was set
    Tolerated {
        /// The exit code that was downgraded to a warning
        exit_code: i32,
    },
}

/// Summary of a successful [`crate::Downloader::fetch`] call
#[must_use]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchReport {
    /// Outcome of each stage, in execution order
    pub stages: Vec<(Stage, StageOutcome)>,
}

impl FetchReport {
    /// True when any stage was downgraded from failure to warning
    pub fn had_warnings(&self) -> bool {
        self.stages
            .iter()
            .any(|(_, outcome)| matches!(outcome, StageOutcome::Tolerated { .. }))
    }
}

/// Event emitted while fetching
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A downloader stage is about to spawn the tool
    StageStarted {
        /// Stage being started
        stage: Stage,
        /// Source URL
        url: String,
    },

    /// A stage exited with status 0
    StageCompleted {
        /// Completed stage
        stage: Stage,
    },

    /// A stage exited with the tolerated code and was downgraded to a warning
    StageTolerated {
        /// Affected stage
        stage: Stage,
        /// The tolerated exit code
        exit_code: i32,
    },

    /// A stage failed fatally
    StageFailed {
        /// Failed stage
        stage: Stage,
        /// Exit code, `None` when killed by a signal or timeout
        exit_code: Option<i32>,
    },

    /// The progress watch saw a media file closed after writing or renamed into place
    TrackDetected {
        /// File name (no directory)
        name: String,
    },

    /// A thumbnail was written
    ThumbnailFetched {
        /// Location of the converted image
        path: PathBuf,
    },
}

/// One media fetch: source URL plus per-call options
///
/// Created per invocation and discarded once the fetch returns.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DownloadRequest {
    url: String,
    /// Caller-supplied arguments passed through to yt-dlp
    pub extra_args: Vec<String>,
    /// Downgrade the tool's soft per-item failure code to a warning
    pub ignore_errors: bool,
    /// Relay the tool's output streams live instead of watching for progress
    pub verbose: bool,
}

impl DownloadRequest {
    /// Create a request for `url`
    ///
    /// # Errors
    /// Returns [`Error::InvalidUrl`] if `url` is not an absolute URL.
    ///
    /// # Examples
    ///
    /// ```
    /// use hoi4_radio_dl::DownloadRequest;
    ///
    /// let request = DownloadRequest::new("https://video.example/watch?v=abc")
    ///     .unwrap()
    ///     .with_extra_args(["--limit", "5"])
    ///     .ignore_errors(true);
    /// assert_eq!(request.extra_args, vec!["--limit", "5"]);
    /// assert!(DownloadRequest::new("not a url").is_err());
    /// ```
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let url = url.into();
        url::Url::parse(&url).map_err(|e| Error::InvalidUrl {
            url: url.clone(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            url,
            extra_args: Vec::new(),
            ignore_errors: false,
            verbose: false,
        })
    }

    /// Append pass-through arguments for yt-dlp
    pub fn with_extra_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set whether the tolerated exit code is downgraded to a warning
    pub fn ignore_errors(mut self, ignore: bool) -> Self {
        self.ignore_errors = ignore;
        self
    }

    /// Set whether tool output is relayed live
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// The source URL as given
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Stable identifier for bookkeeping
    ///
    /// Uses the `v` query parameter (single video), then `list` (playlist),
    /// falling back to the whole URL.
    pub fn source_id(&self) -> String {
        url::Url::parse(&self.url)
            .ok()
            .and_then(|parsed| {
                let pairs: Vec<(String, String)> = parsed.query_pairs().into_owned().collect();
                ["v", "list"].iter().find_map(|key| {
                    pairs
                        .iter()
                        .find(|(k, v)| k == key && !v.is_empty())
                        .map(|(_, v)| v.clone())
                })
            })
            .unwrap_or_else(|| self.url.clone())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_display_is_lowercase() {
        assert_eq!(Stage::Initial.to_string(), "initial");
        assert_eq!(Stage::Verify.to_string(), "verify");
        assert_eq!(Stage::Thumbnail.to_string(), "thumbnail");
    }

    #[test]
    fn request_rejects_relative_url() {
        let err = DownloadRequest::new("watch?v=abc").unwrap_err();
        assert!(matches!(err, Error::InvalidUrl { .. }));
    }

    #[test]
    fn request_defaults_are_quiet_and_strict() {
        let request = DownloadRequest::new("https://video.example/watch?id=abc").unwrap();
        assert!(request.extra_args.is_empty());
        assert!(!request.ignore_errors);
        assert!(!request.verbose);
        assert_eq!(request.url(), "https://video.example/watch?id=abc");
    }

    #[test]
    fn source_id_prefers_video_then_list() {
        let video = DownloadRequest::new("https://www.youtube.com/watch?v=dQw4w9WgXcQ&list=PL1")
            .unwrap();
        assert_eq!(video.source_id(), "dQw4w9WgXcQ");

        let playlist = DownloadRequest::new("https://www.youtube.com/playlist?list=PL123").unwrap();
        assert_eq!(playlist.source_id(), "PL123");

        let other = DownloadRequest::new("https://video.example/watch?id=abc").unwrap();
        assert_eq!(other.source_id(), "https://video.example/watch?id=abc");
    }

    #[test]
    fn report_flags_tolerated_stages() {
        let clean = FetchReport {
            stages: vec![
                (Stage::Initial, StageOutcome::Completed),
                (Stage::Verify, StageOutcome::Completed),
            ],
        };
        assert!(!clean.had_warnings());

        let warned = FetchReport {
            stages: vec![
                (Stage::Initial, StageOutcome::Tolerated { exit_code: 1 }),
                (Stage::Verify, StageOutcome::Completed),
            ],
        };
        assert!(warned.had_warnings());
    }

    #[test]
    fn event_serializes_with_type_tag() {
        let json = serde_json::to_value(Event::StageTolerated {
            stage: Stage::Initial,
            exit_code: 1,
        })
        .unwrap();
        assert_eq!(json["type"], "stage_tolerated");
        assert_eq!(json["stage"], "initial");
        assert_eq!(json["exit_code"], 1);
    }
}
