//! File watching for rebuilds and live reload.

use std::path::{Path, PathBuf};

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::server::ServerError;

/// What happened to a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEventKind {
    Created,
    Modified,
    Removed,
}

/// Events emitted by the file watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub path: PathBuf,
    pub kind: WatchEventKind,
}

/// File watcher for detecting changes.
///
/// Events stop when the watcher is dropped.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
}

impl FileWatcher {
    /// Create a new file watcher for the given directories (recursively).
    ///
    /// Paths that do not exist are skipped. Returns the watcher and a channel
    /// to receive events.
    pub fn new(paths: &[PathBuf]) -> Result<(Self, mpsc::Receiver<WatchEvent>), ServerError> {
        let (tx, rx) = mpsc::channel(256);

        // The callback runs on notify's own thread, outside the runtime
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            match res {
                Ok(event) => {
                    for path in &event.paths {
                        if let Some(e) = classify_event(path, &event.kind) {
                            let _ = tx.blocking_send(e);
                        }
                    }
                }
                Err(e) => tracing::warn!("File watch error: {}", e),
            }
        })
        .map_err(|e| ServerError::WatchError(e.to_string()))?;

        for path in paths {
            if path.exists() {
                tracing::debug!("Watching {}", path.display());
                watcher
                    .watch(path, RecursiveMode::Recursive)
                    .map_err(|e| ServerError::WatchError(format!("{}: {}", path.display(), e)))?;
            } else {
                tracing::debug!("Not watching missing {}", path.display());
            }
        }

        Ok((Self { _watcher: watcher }, rx))
    }
}

/// Classify a notify event into a WatchEvent.
fn classify_event(path: &Path, kind: &notify::EventKind) -> Option<WatchEvent> {
    use notify::EventKind;

    let kind = match kind {
        EventKind::Create(_) => WatchEventKind::Created,
        EventKind::Remove(_) => WatchEventKind::Removed,
        EventKind::Modify(_) => WatchEventKind::Modified,
        _ => return None,
    };

    Some(WatchEvent {
        path: path.to_path_buf(),
        kind,
    })
}

/// Drop directories nested inside other directories in the list.
///
/// Watching both a directory and its child would report each change twice.
pub fn outermost(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut sorted: Vec<PathBuf> = paths.to_vec();
    sorted.sort();
    sorted.dedup();

    let mut result: Vec<PathBuf> = Vec::new();
    for path in sorted {
        if !result.iter().any(|kept| path.starts_with(kept)) {
            result.push(path);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;
    use tempfile::tempdir;

    #[tokio::test]
    async fn watches_file_changes() {
        let temp = tempdir().unwrap();
        let test_file = temp.path().join("main.sass");

        // Create the watcher first (so it catches file creation)
        let (watcher, mut rx) = FileWatcher::new(&[temp.path().to_path_buf()]).unwrap();

        // Give inotify time to set up
        tokio::time::sleep(Duration::from_millis(100)).await;

        fs::write(&test_file, ".a\n  color: red\n").unwrap();

        let event = tokio::time::timeout(Duration::from_secs(3), rx.recv()).await;

        // Keep watcher alive until we're done
        drop(watcher);

        assert!(event.is_ok(), "timeout waiting for file watch event");
        let event = event.unwrap().expect("channel should not be closed");
        assert_eq!(event.path.file_name(), test_file.file_name());
    }

    #[test]
    fn classifies_event_kinds() {
        use notify::event::{AccessKind, CreateKind, ModifyKind, RemoveKind};
        use notify::EventKind;

        let path = Path::new("src/sass/main.sass");

        assert_eq!(
            classify_event(path, &EventKind::Create(CreateKind::File)).map(|e| e.kind),
            Some(WatchEventKind::Created)
        );
        assert_eq!(
            classify_event(path, &EventKind::Modify(ModifyKind::Any)).map(|e| e.kind),
            Some(WatchEventKind::Modified)
        );
        assert_eq!(
            classify_event(path, &EventKind::Remove(RemoveKind::File)).map(|e| e.kind),
            Some(WatchEventKind::Removed)
        );
        assert_eq!(classify_event(path, &EventKind::Access(AccessKind::Any)), None);
    }

    #[test]
    fn keeps_outermost_directories() {
        let paths = vec![
            PathBuf::from("src/img/src"),
            PathBuf::from("src"),
            PathBuf::from("src/sass"),
            PathBuf::from("assets"),
        ];

        assert_eq!(
            outermost(&paths),
            vec![PathBuf::from("assets"), PathBuf::from("src")]
        );
    }
}
