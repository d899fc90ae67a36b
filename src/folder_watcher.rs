//! Folder watching for download progress
//!
//! While yt-dlp runs quietly, the downloads directory is watched so each finished
//! track can be reported as it lands. This is purely informational: if the watch
//! cannot be established the fetch proceeds without it.
//!
//! - Only files with the configured media suffix are reported
//! - A file counts as finished when its writer closes it or when it is renamed
//!   into place; creation alone is not enough since ffmpeg creates the output
//!   before encoding into it
//! - Each file name is reported once, however many notifications the OS sends
//! - Non-recursive (only the downloads directory itself)
//!
//! Watches are handed out as [`ProgressProbe`] trait objects and held by a
//! [`WatchGuard`], which releases the probe when dropped so every exit path of the
//! caller gives the OS watch handle back.

use crate::error::{Error, Result};
use crate::types::Event;
use notify::event::{AccessKind, AccessMode, ModifyKind, RenameMode};
use notify::{
    Config as NotifyConfig, EventKind, RecommendedWatcher, RecursiveMode, Watcher,
};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// An established watch that must be released when the caller is done
pub trait ProgressProbe: Send {
    /// Stop watching and free the underlying OS resources
    fn release(self: Box<Self>);
}

/// Factory for progress probes
pub trait ProgressWatcher: Send + Sync {
    /// Start watching `dir` for new files ending in `suffix`
    ///
    /// Detected files are published as [`Event::TrackDetected`] on `events`.
    ///
    /// # Errors
    /// Returns [`Error::FolderWatch`] if the watch cannot be established
    /// (missing directory, inotify limit, no async runtime, ...).
    fn watch(
        &self,
        dir: &Path,
        suffix: &str,
        events: broadcast::Sender<Event>,
    ) -> Result<Box<dyn ProgressProbe>>;
}

/// Scoped holder for an optional probe
///
/// Dropping the guard releases the probe exactly once.
#[derive(Default)]
pub struct WatchGuard {
    probe: Option<Box<dyn ProgressProbe>>,
}

impl WatchGuard {
    /// Guard that holds nothing (watch disabled or unavailable)
    pub fn none() -> Self {
        Self::default()
    }

    /// Guard that owns `probe`
    pub fn new(probe: Box<dyn ProgressProbe>) -> Self {
        Self { probe: Some(probe) }
    }

    /// Whether a probe is held
    pub fn is_active(&self) -> bool {
        self.probe.is_some()
    }
}

impl Drop for WatchGuard {
    fn drop(&mut self) {
        if let Some(probe) = self.probe.take() {
            probe.release();
        }
    }
}

/// Deduplicating filter for newly created media files
#[derive(Debug)]
pub struct NewFileFilter {
    suffix: String,
    seen: HashSet<String>,
}

impl NewFileFilter {
    /// Create a filter accepting names that end with `suffix`
    pub fn new(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
            seen: HashSet::new(),
        }
    }

    /// Returns the file name the first time a matching path is observed
    ///
    /// Intermediate postprocessor files (`*.temp<suffix>`) are ignored.
    pub fn observe(&mut self, path: &Path) -> Option<String> {
        let name = path.file_name()?.to_str()?;
        if !name.ends_with(&self.suffix) || name.ends_with(&format!(".temp{}", self.suffix)) {
            return None;
        }
        if self.seen.insert(name.to_string()) {
            Some(name.to_string())
        } else {
            None
        }
    }
}

/// Paths a notification marks as fully written
///
/// For a rename carrying both ends only the destination counts.
fn finished_paths(event: &notify::Event) -> &[PathBuf] {
    match event.kind {
        EventKind::Access(AccessKind::Close(AccessMode::Write))
        | EventKind::Modify(ModifyKind::Name(RenameMode::To | RenameMode::Any)) => &event.paths,
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            event.paths.get(1..).unwrap_or_default()
        }
        _ => &[],
    }
}

/// [`ProgressWatcher`] backed by the platform's native notification API
#[derive(Clone, Copy, Debug, Default)]
pub struct NotifyProgressWatcher;

impl ProgressWatcher for NotifyProgressWatcher {
    fn watch(
        &self,
        dir: &Path,
        suffix: &str,
        events: broadcast::Sender<Event>,
    ) -> Result<Box<dyn ProgressProbe>> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::FolderWatch(format!("no async runtime: {}", e)))?;

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut watcher = RecommendedWatcher::new(
            move |res| {
                // Receiver gone means the probe is being released
                let _ = tx.send(res);
            },
            NotifyConfig::default(),
        )
        .map_err(|e| Error::FolderWatch(e.to_string()))?;

        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|e| Error::FolderWatch(format!("failed to watch {}: {}", dir.display(), e)))?;

        let mut filter = NewFileFilter::new(suffix);
        let task = runtime.spawn(async move {
            while let Some(result) = rx.recv().await {
                match result {
                    Ok(event) => {
                        for path in finished_paths(&event) {
                            if let Some(name) = filter.observe(path) {
                                info!(track = %name, "track downloaded");
                                events.send(Event::TrackDetected { name }).ok();
                            }
                        }
                    }
                    Err(e) => debug!(error = %e, "filesystem watcher error"),
                }
            }
        });

        debug!(dir = %dir.display(), suffix, "progress watch started");
        Ok(Box::new(NotifyProbe { watcher, task }))
    }
}

struct NotifyProbe {
    watcher: RecommendedWatcher,
    task: JoinHandle<()>,
}

impl ProgressProbe for NotifyProbe {
    fn release(self: Box<Self>) {
        let NotifyProbe { watcher, task } = *self;
        // Dropping the watcher closes the event channel, which ends the task
        // after it drains whatever is already queued.
        drop(watcher);
        drop(task);
        debug!("progress watch released");
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::{Duration, timeout};

    struct CountingProbe(Arc<AtomicUsize>);

    impl ProgressProbe for CountingProbe {
        fn release(self: Box<Self>) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn filter_reports_each_name_once() {
        let mut filter = NewFileFilter::new(".ogg");
        assert_eq!(
            filter.observe(Path::new("/dl/Song A.ogg")).as_deref(),
            Some("Song A.ogg")
        );
        assert_eq!(filter.observe(Path::new("/dl/Song A.ogg")), None);
        assert_eq!(
            filter.observe(Path::new("/dl/Song B.ogg")).as_deref(),
            Some("Song B.ogg")
        );
    }

    #[test]
    fn filter_ignores_other_suffixes_and_temp_files() {
        let mut filter = NewFileFilter::new(".ogg");
        assert_eq!(filter.observe(Path::new("/dl/Song.webm")), None);
        assert_eq!(filter.observe(Path::new("/dl/Song.webm.part")), None);
        assert_eq!(filter.observe(Path::new("/dl/Song.temp.ogg")), None);
        assert_eq!(filter.observe(Path::new("/dl/.archive.txt")), None);
    }

    #[test]
    fn guard_releases_exactly_once() {
        let released = Arc::new(AtomicUsize::new(0));
        {
            let guard = WatchGuard::new(Box::new(CountingProbe(released.clone())));
            assert!(guard.is_active());
        }
        assert_eq!(released.load(Ordering::SeqCst), 1);

        let empty = WatchGuard::none();
        assert!(!empty.is_active());
        drop(empty);
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn watching_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");
        let (tx, _rx) = broadcast::channel(16);

        let result = NotifyProgressWatcher.watch(&missing, ".ogg", tx);
        assert!(matches!(result, Err(Error::FolderWatch(_))));
    }

    #[test]
    fn watching_without_runtime_fails() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, _rx) = broadcast::channel(16);

        let result = NotifyProgressWatcher.watch(dir.path(), ".ogg", tx);
        assert!(matches!(result, Err(Error::FolderWatch(_))));
    }

    #[test]
    fn creation_alone_is_not_finished() {
        let path = PathBuf::from("/dl/Song.ogg");
        let created = notify::Event::new(EventKind::Create(notify::event::CreateKind::File))
            .add_path(path.clone());
        let written = notify::Event::new(EventKind::Modify(ModifyKind::Data(
            notify::event::DataChange::Content,
        )))
        .add_path(path.clone());
        assert!(finished_paths(&created).is_empty());
        assert!(finished_paths(&written).is_empty());

        let closed = notify::Event::new(EventKind::Access(AccessKind::Close(AccessMode::Write)))
            .add_path(path.clone());
        assert_eq!(finished_paths(&closed), [path]);
    }

    #[test]
    fn rename_reports_destination_only() {
        let from = PathBuf::from("/dl/Song.temp.ogg");
        let to = PathBuf::from("/dl/Song.ogg");
        let both = notify::Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
            .add_path(from.clone())
            .add_path(to.clone());
        assert_eq!(finished_paths(&both), [to.clone()]);

        let renamed_away = notify::Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::From)))
            .add_path(to.clone());
        assert!(finished_paths(&renamed_away).is_empty());

        let renamed_in = notify::Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::To)))
            .add_path(to.clone());
        assert_eq!(finished_paths(&renamed_in), [to]);
    }

    // inotify reports close-after-write; other backends may only report renames
    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn reports_new_track_once() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, mut rx) = broadcast::channel(16);
        let probe = NotifyProgressWatcher.watch(dir.path(), ".ogg", tx).unwrap();

        tokio::fs::write(dir.path().join("ignored.webm"), b"x").await.unwrap();
        tokio::fs::write(dir.path().join("Track.ogg"), b"x").await.unwrap();
        tokio::fs::write(dir.path().join("Track.ogg"), b"xy").await.unwrap();

        let event = timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("no event within 5s")
            .unwrap();
        assert_eq!(
            event,
            Event::TrackDetected {
                name: "Track.ogg".into()
            }
        );

        probe.release();
        // No second report for the rewrite of the same file
        assert!(
            timeout(Duration::from_millis(300), rx.recv())
                .await
                .map(|r| r.is_err())
                .unwrap_or(true)
        );
    }
}
