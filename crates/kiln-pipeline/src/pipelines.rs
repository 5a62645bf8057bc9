//! The named pipelines and the tasks they are made of.

use std::path::Path;
use std::sync::Arc;

use kiln_server::{DevServer, DevServerConfig, ReloadHub, ReloadMessage};
use kiln_transforms::{styles, ImageCache, Paths, Transform};

use crate::dist;
use crate::error::TaskError;
use crate::registry::TaskRegistry;
use crate::task::Task;
use crate::watch::{BindingAction, WatchBinding, WatchCoordinator};

/// Everything the tasks of one project share.
#[derive(Clone)]
pub struct Project {
    pub paths: Arc<Paths>,
    pub cache: Arc<dyn ImageCache>,

    /// Listen settings for the dev server; its root comes from the paths
    pub server: DevServerConfig,

    pub hub: ReloadHub,
}

impl Project {
    pub fn new(paths: Paths, cache: Arc<dyn ImageCache>, server: DevServerConfig) -> Self {
        Self {
            paths: Arc::new(paths),
            cache,
            server,
            hub: ReloadHub::new(),
        }
    }
}

/// What a transformation leaf does with its own failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Fail the task
    Strict,

    /// Log a warning and succeed
    Tolerant,
}

/// A leaf running one transformation.
pub fn transform_task(project: &Project, transform: Transform, policy: FailurePolicy) -> Task {
    let paths = Arc::clone(&project.paths);
    let cache = Arc::clone(&project.cache);

    Task::leaf(transform.name(), move || {
        let paths = Arc::clone(&paths);
        let cache = Arc::clone(&cache);
        async move {
            match transform.run(&paths, cache.as_ref()) {
                Ok(report) => {
                    tracing::debug!(
                        "{}: {} input(s), {} output(s)",
                        transform,
                        report.inputs,
                        report.outputs.len()
                    );
                    Ok(())
                }
                Err(e) if policy == FailurePolicy::Tolerant => {
                    tracing::warn!("'{}' failed, continuing: {}", transform, e);
                    Ok(())
                }
                Err(e) => Err(e.into()),
            }
        }
    })
}

pub fn clear_cache_task(project: &Project) -> Task {
    let cache = Arc::clone(&project.cache);
    Task::leaf("clearCache", move || {
        let cache = Arc::clone(&cache);
        async move {
            cache
                .clear()
                .map_err(|e| TaskError::io(Path::new("image cache"), e))
        }
    })
}

pub fn clean_dist_task(project: &Project) -> Task {
    let paths = Arc::clone(&project.paths);
    Task::leaf("cleanDist", move || {
        let paths = Arc::clone(&paths);
        async move { dist::clean_dist(&paths) }
    })
}

pub fn assemble_dist_task(project: &Project) -> Task {
    let paths = Arc::clone(&project.paths);
    Task::leaf("assembleDist", move || {
        let paths = Arc::clone(&paths);
        async move { dist::assemble_dist(&paths).map(|_| ()) }
    })
}

/// One-shot production bundle from an already built working tree.
pub fn build_task(project: &Project) -> Task {
    Task::sequence(vec![
        clear_cache_task(project),
        clean_dist_task(project),
        assemble_dist_task(project),
    ])
}

/// Build everything once, then serve and watch.
pub fn develop_task(project: &Project) -> Task {
    let initial = Transform::ALL
        .iter()
        .map(|&t| transform_task(project, t, FailurePolicy::Tolerant))
        .collect();

    Task::sequence(vec![Task::parallel(initial), watcher_task(project)])
}

/// Dev server plus watch coordinator. Runs until the process is stopped.
pub fn watcher_task(project: &Project) -> Task {
    let project = project.clone();
    Task::leaf("watcher", move || {
        let project = project.clone();
        async move {
            let coordinator = watch_coordinator(&project)?;
            let server = DevServer::new(
                DevServerConfig {
                    root: project.paths.resolve(&project.paths.serve),
                    ..project.server.clone()
                },
                project.hub.clone(),
            );

            tokio::try_join!(
                async { server.start().await.map_err(TaskError::from) },
                coordinator.run(),
            )?;
            Ok(())
        }
    })
}

/// The watch bindings of a project.
pub fn watch_coordinator(project: &Project) -> Result<WatchCoordinator, TaskError> {
    let paths = &project.paths;
    let run = |transform: Transform, signal: Option<ReloadMessage>| BindingAction::Run {
        task: transform_task(project, transform, FailurePolicy::Strict),
        signal,
    };

    let stylesheet = paths
        .served_url(&paths.styles.dest, styles::OUTPUT_FILE)
        .map(|path| ReloadMessage::InjectCss { path })
        .unwrap_or(ReloadMessage::Reload);

    let mut html_sources = vec![glob_under(&paths.components, "**/*")];
    html_sources.extend(paths.html.src.iter().cloned());

    let mut coordinator = WatchCoordinator::new(&paths.root, project.hub.clone());
    coordinator.bind(WatchBinding::new(
        "styles",
        &paths.styles.src,
        run(Transform::Styles, Some(stylesheet)),
    )?);
    coordinator.bind(WatchBinding::new(
        "scripts",
        &paths.scripts.src,
        run(Transform::Scripts, Some(ReloadMessage::Reload)),
    )?);
    // Reload comes from the pages binding once the output lands
    coordinator.bind(WatchBinding::new(
        "html",
        &html_sources,
        run(Transform::Html, None),
    )?);
    coordinator.bind(WatchBinding::new(
        "pages",
        &[glob_under(&paths.html.dest, "*.html")],
        BindingAction::Reload,
    )?);
    coordinator.bind(WatchBinding::new(
        "images",
        &paths.images.src,
        run(Transform::Images, None),
    )?);
    coordinator.bind(WatchBinding::new(
        "sprite",
        &paths.svg.src,
        run(Transform::Sprite, None),
    )?);

    Ok(coordinator)
}

fn glob_under(dir: &Path, pattern: &str) -> String {
    let dir = dir.to_string_lossy().replace('\\', "/");
    let dir = dir.trim_end_matches('/');
    if dir.is_empty() || dir == "." {
        pattern.to_string()
    } else {
        format!("{}/{}", dir, pattern)
    }
}

/// Every task addressable from the command line.
pub fn registry(project: &Project) -> TaskRegistry {
    let mut registry = TaskRegistry::new();

    for transform in Transform::ALL {
        registry.register(
            transform.name(),
            transform_task(project, transform, FailurePolicy::Strict),
        );
    }

    registry.register("cleanDist", clean_dist_task(project));
    registry.register("clearCache", clear_cache_task(project));
    registry.register("build", build_task(project));
    registry.register("develop", develop_task(project));
    registry.register("default", develop_task(project));
    registry.register("watcher", watcher_task(project));

    registry
}
