//! Watch coordination: file changes re-run tasks and notify browsers.
//!
//! Every binding owns one worker task fed by a single-slot queue. A change
//! arriving while the worker is busy leaves at most one pending trigger, so a
//! binding's task never runs concurrently with itself and a burst of events
//! collapses into one extra run.

use std::path::{Path, PathBuf};

use kiln_server::watcher::outermost;
use kiln_server::{FileWatcher, ReloadHub, ReloadMessage};
use kiln_transforms::SourceSet;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::error::TaskError;
use crate::task::Task;

/// What a binding does when one of its files changes.
#[derive(Debug, Clone)]
pub enum BindingAction {
    /// Run a task, then send `signal` if it succeeded.
    Run {
        task: Task,
        signal: Option<ReloadMessage>,
    },

    /// Only tell browsers to reload.
    Reload,
}

/// Globs paired with the action their changes trigger.
#[derive(Debug, Clone)]
pub struct WatchBinding {
    pub name: String,
    pub sources: SourceSet,
    pub action: BindingAction,
}

impl WatchBinding {
    pub fn new<S: AsRef<str>>(
        name: impl Into<String>,
        globs: &[S],
        action: BindingAction,
    ) -> Result<Self, TaskError> {
        Ok(Self {
            name: name.into(),
            sources: SourceSet::new(globs)?,
            action,
        })
    }
}

/// Owns the watch bindings for a project root.
#[derive(Debug)]
pub struct WatchCoordinator {
    root: PathBuf,
    bindings: Vec<WatchBinding>,
    hub: ReloadHub,
}

impl WatchCoordinator {
    pub fn new(root: impl Into<PathBuf>, hub: ReloadHub) -> Self {
        Self {
            root: root.into(),
            bindings: Vec::new(),
            hub,
        }
    }

    pub fn bind(&mut self, binding: WatchBinding) {
        self.bindings.push(binding);
    }

    pub fn bindings(&self) -> &[WatchBinding] {
        &self.bindings
    }

    /// Directories to watch: the glob bases, without nested duplicates.
    pub fn watch_dirs(&self) -> Vec<PathBuf> {
        let bases: Vec<PathBuf> = self
            .bindings
            .iter()
            .flat_map(|b| b.sources.bases())
            .map(|base| self.root.join(base))
            .collect();
        outermost(&bases)
    }

    /// Start one worker per binding and return the event router.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(self) -> Dispatcher {
        let root = std::fs::canonicalize(&self.root).unwrap_or_else(|_| self.root.clone());

        let routes = self
            .bindings
            .into_iter()
            .map(|binding| {
                let (tx, rx) = mpsc::channel(1);
                let route = Route {
                    name: binding.name.clone(),
                    sources: binding.sources,
                    trigger: tx,
                };
                tokio::spawn(worker(binding.name, binding.action, self.hub.clone(), rx));
                route
            })
            .collect();

        Dispatcher { root, routes }
    }

    /// Watch the filesystem and dispatch changes until the process ends.
    pub async fn run(self) -> Result<(), TaskError> {
        let dirs = self.watch_dirs();
        let (watcher, mut rx) = FileWatcher::new(&dirs)?;
        tracing::info!("Watching {} director(ies) for changes", dirs.len());

        let dispatcher = self.spawn();
        while let Some(event) = rx.recv().await {
            tracing::debug!("{:?} {}", event.kind, event.path.display());
            dispatcher.dispatch(&event.path);
        }

        drop(watcher);
        Ok(())
    }
}

struct Route {
    name: String,
    sources: SourceSet,
    trigger: mpsc::Sender<()>,
}

/// Routes changed paths to the workers of the bindings that select them.
pub struct Dispatcher {
    root: PathBuf,
    routes: Vec<Route>,
}

impl Dispatcher {
    /// Offer a change to every matching binding. Returns how many matched.
    ///
    /// `path` may be absolute (under the project root) or root-relative.
    pub fn dispatch(&self, path: &Path) -> usize {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);

        let mut matched = 0;
        for route in &self.routes {
            if !route.sources.matches(relative) {
                continue;
            }
            matched += 1;
            match route.trigger.try_send(()) {
                Ok(()) => tracing::debug!("Triggered '{}' by {}", route.name, relative.display()),
                Err(TrySendError::Full(())) => {}
                Err(TrySendError::Closed(())) => {
                    tracing::warn!("Worker for '{}' has stopped", route.name)
                }
            }
        }
        matched
    }
}

async fn worker(
    name: String,
    action: BindingAction,
    hub: ReloadHub,
    mut triggers: mpsc::Receiver<()>,
) {
    while triggers.recv().await.is_some() {
        match &action {
            BindingAction::Run { task, signal } => match task.run().await {
                Ok(()) => {
                    if let Some(signal) = signal {
                        hub.send(signal.clone());
                    }
                }
                Err(e) => tracing::warn!("'{}' failed: {}", name, e),
            },
            BindingAction::Reload => hub.send(ReloadMessage::Reload),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn counting_task(
        runs: &Arc<AtomicUsize>,
        active: &Arc<AtomicUsize>,
        peak: &Arc<AtomicUsize>,
    ) -> Task {
        let (runs, active, peak) = (Arc::clone(runs), Arc::clone(active), Arc::clone(peak));
        Task::leaf("slow", move || {
            let runs = Arc::clone(&runs);
            let active = Arc::clone(&active);
            let peak = Arc::clone(&peak);
            async move {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                active.fetch_sub(1, Ordering::SeqCst);
                runs.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
    }

    #[tokio::test]
    async fn rapid_triggers_never_overlap() {
        let runs = Arc::new(AtomicUsize::new(0));
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let mut coordinator = WatchCoordinator::new("project", ReloadHub::new());
        coordinator.bind(
            WatchBinding::new(
                "styles",
                &["src/sass/**/*.sass"],
                BindingAction::Run {
                    task: counting_task(&runs, &active, &peak),
                    signal: None,
                },
            )
            .unwrap(),
        );
        let dispatcher = coordinator.spawn();
        let changed = Path::new("src/sass/main.sass");

        // Two events before the worker starts collapse into one run
        assert_eq!(dispatcher.dispatch(changed), 1);
        assert_eq!(dispatcher.dispatch(changed), 1);
        tokio::time::sleep(Duration::from_millis(10)).await;

        // One event while running queues exactly one more
        dispatcher.dispatch(changed);
        dispatcher.dispatch(changed);
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unmatched_paths_trigger_nothing() {
        let mut coordinator = WatchCoordinator::new("project", ReloadHub::new());
        coordinator.bind(
            WatchBinding::new("pages", &["src/*.html"], BindingAction::Reload).unwrap(),
        );
        let dispatcher = coordinator.spawn();

        assert_eq!(dispatcher.dispatch(Path::new("src/pages/index.html")), 0);
        assert_eq!(dispatcher.dispatch(Path::new("src/index.html")), 1);
    }

    #[tokio::test]
    async fn signals_after_successful_run() {
        let hub = ReloadHub::new();
        let mut browser = hub.subscribe();
        let mut coordinator = WatchCoordinator::new("project", hub.clone());
        coordinator.bind(
            WatchBinding::new(
                "styles",
                &["src/sass/**/*.sass"],
                BindingAction::Run {
                    task: Task::leaf("styles", || async { Ok(()) }),
                    signal: Some(ReloadMessage::InjectCss {
                        path: "/css/style.min.css".to_string(),
                    }),
                },
            )
            .unwrap(),
        );
        let failures = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&failures);
        coordinator.bind(
            WatchBinding::new(
                "broken",
                &["src/js/*.js"],
                BindingAction::Run {
                    task: Task::leaf("scripts", move || {
                        let counter = Arc::clone(&counter);
                        async move {
                            counter.fetch_add(1, Ordering::SeqCst);
                            Err(TaskError::Server("boom".to_string()))
                        }
                    }),
                    signal: Some(ReloadMessage::Reload),
                },
            )
            .unwrap(),
        );
        let dispatcher = coordinator.spawn();

        dispatcher.dispatch(Path::new("src/js/main.js"));
        dispatcher.dispatch(Path::new("src/sass/main.sass"));

        let msg = tokio::time::timeout(Duration::from_secs(1), browser.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            msg,
            ReloadMessage::InjectCss {
                path: "/css/style.min.css".to_string()
            }
        );
        assert!(browser.try_recv().is_err());

        // The failed binding still accepts changes
        for _ in 0..50 {
            if failures.load(Ordering::SeqCst) == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(dispatcher.dispatch(Path::new("src/js/main.js")), 1);
        for _ in 0..50 {
            if failures.load(Ordering::SeqCst) == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(failures.load(Ordering::SeqCst), 2);
        assert!(browser.try_recv().is_err());
    }

    #[test]
    fn watches_outermost_bases() {
        let mut coordinator = WatchCoordinator::new("site", ReloadHub::new());
        coordinator.bind(
            WatchBinding::new("a", &["src/img/src/**/*.svg"], BindingAction::Reload).unwrap(),
        );
        coordinator.bind(WatchBinding::new("b", &["src/*.html"], BindingAction::Reload).unwrap());

        assert_eq!(coordinator.watch_dirs(), vec![PathBuf::from("site/src")]);
    }
}
