//! Task trees and their executor.
//!
//! A [`Task`] is either a named leaf wrapping an async function, or a
//! composite that runs its children in order ([`Task::Sequence`]) or all at
//! once ([`Task::Parallel`]).

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use tokio::task::JoinSet;

use crate::error::TaskError;

/// Future produced by one run of a task.
pub type TaskFuture = Pin<Box<dyn Future<Output = Result<(), TaskError>> + Send>>;

/// Body of a leaf task. Called once per run.
pub type TaskFn = Arc<dyn Fn() -> TaskFuture + Send + Sync>;

/// A unit of work.
#[derive(Clone)]
pub enum Task {
    Leaf { name: String, run: TaskFn },
    Sequence(Vec<Task>),
    Parallel(Vec<Task>),
}

impl Task {
    /// Create a leaf task from an async function.
    pub fn leaf<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        Task::Leaf {
            name: name.into(),
            run: Arc::new(move || -> TaskFuture { Box::pin(f()) }),
        }
    }

    pub fn sequence(tasks: Vec<Task>) -> Self {
        Task::Sequence(tasks)
    }

    pub fn parallel(tasks: Vec<Task>) -> Self {
        Task::Parallel(tasks)
    }

    /// Run the task tree.
    ///
    /// A sequence stops at the first failure. A parallel group waits for every
    /// child, then reports the first failure in child order.
    pub fn run(&self) -> TaskFuture {
        match self {
            Task::Leaf { name, run } => {
                let name = name.clone();
                let future = (**run)();
                Box::pin(async move {
                    tracing::info!("Starting '{}'", name);
                    let start = Instant::now();
                    let result = future.await;
                    let elapsed = start.elapsed().as_millis();
                    match &result {
                        Ok(()) => tracing::info!("Finished '{}' after {} ms", name, elapsed),
                        Err(_) => tracing::error!("'{}' errored after {} ms", name, elapsed),
                    }
                    result
                })
            }

            Task::Sequence(children) => {
                let children = children.clone();
                Box::pin(async move {
                    for child in &children {
                        child.run().await?;
                    }
                    Ok(())
                })
            }

            Task::Parallel(children) => {
                let children = children.clone();
                Box::pin(async move {
                    let mut set = JoinSet::new();
                    for (index, child) in children.iter().enumerate() {
                        let future = child.run();
                        set.spawn(async move { (index, future.await) });
                    }

                    let mut failures: Vec<(usize, TaskError)> = Vec::new();
                    let mut aborted = 0;
                    while let Some(joined) = set.join_next().await {
                        match joined {
                            Ok((_, Ok(()))) => {}
                            Ok((index, Err(e))) => failures.push((index, e)),
                            Err(e) => {
                                tracing::error!("Parallel task did not complete: {}", e);
                                aborted += 1;
                            }
                        }
                    }

                    failures.sort_by_key(|(index, _)| *index);
                    if let Some((_, first)) = failures.into_iter().next() {
                        return Err(first);
                    }
                    if aborted > 0 {
                        return Err(TaskError::Aborted(format!("{} parallel task(s)", aborted)));
                    }
                    Ok(())
                })
            }
        }
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Task::Leaf { name, .. } => f.debug_tuple("Leaf").field(name).finish(),
            Task::Sequence(children) => f.debug_tuple("Sequence").field(children).finish(),
            Task::Parallel(children) => f.debug_tuple("Parallel").field(children).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;
    use std::time::Duration;

    type Log = Arc<Mutex<Vec<String>>>;

    fn recording(name: &'static str, log: &Log, delay_ms: u64, fail: bool) -> Task {
        let log = Arc::clone(log);
        Task::leaf(name, move || {
            let log = Arc::clone(&log);
            async move {
                log.lock().unwrap().push(format!("start {}", name));
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                log.lock().unwrap().push(format!("end {}", name));
                if fail {
                    Err(TaskError::Server(format!("{} failed", name)))
                } else {
                    Ok(())
                }
            }
        })
    }

    fn entries(log: &Log) -> Vec<String> {
        log.lock().unwrap().clone()
    }

    #[tokio::test]
    async fn sequence_runs_in_order() {
        let log = Log::default();
        let task = Task::sequence(vec![
            recording("a", &log, 20, false),
            recording("b", &log, 0, false),
        ]);

        task.run().await.unwrap();

        assert_eq!(entries(&log), vec!["start a", "end a", "start b", "end b"]);
    }

    #[tokio::test]
    async fn sequence_stops_at_first_failure() {
        let log = Log::default();
        let task = Task::sequence(vec![
            recording("a", &log, 0, true),
            recording("b", &log, 0, false),
        ]);

        let err = task.run().await.unwrap_err();

        assert_eq!(err.to_string(), "Server error: a failed");
        assert_eq!(entries(&log), vec!["start a", "end a"]);
    }

    #[tokio::test]
    async fn parallel_starts_all_children() {
        let log = Log::default();
        let task = Task::parallel(vec![
            recording("a", &log, 30, false),
            recording("b", &log, 10, false),
        ]);

        task.run().await.unwrap();

        let log = entries(&log);
        assert_eq!(&log[..2], &["start a", "start b"]);
        assert_eq!(&log[2..], &["end b", "end a"]);
    }

    #[tokio::test]
    async fn parallel_finishes_siblings_and_reports_first_failure() {
        let log = Log::default();
        let task = Task::parallel(vec![
            recording("slow", &log, 30, false),
            recording("first", &log, 20, true),
            recording("second", &log, 0, true),
        ]);

        let err = task.run().await.unwrap_err();

        assert_eq!(err.to_string(), "Server error: first failed");
        assert!(entries(&log).contains(&"end slow".to_string()));
    }

    #[tokio::test]
    async fn leaf_runs_every_time() {
        let count = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&count);
        let task = Task::leaf("count", move || {
            let counter = Arc::clone(&counter);
            async move {
                *counter.lock().unwrap() += 1;
                Ok(())
            }
        });

        task.run().await.unwrap();
        task.run().await.unwrap();

        assert_eq!(*count.lock().unwrap(), 2);
    }
}
