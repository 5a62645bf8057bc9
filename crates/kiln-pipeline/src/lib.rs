//! Task orchestration for kiln.
//!
//! Transformations become named [`Task`]s, composed into the `build` and
//! `develop` pipelines and looked up through a [`TaskRegistry`]. In develop
//! mode a [`WatchCoordinator`] re-runs tasks on file changes and signals
//! connected browsers.

pub mod dist;
pub mod error;
pub mod pipelines;
pub mod registry;
pub mod task;
pub mod watch;

pub use error::TaskError;
pub use pipelines::{registry, FailurePolicy, Project};
pub use registry::TaskRegistry;
pub use task::{Task, TaskFn, TaskFuture};
pub use watch::{BindingAction, Dispatcher, WatchBinding, WatchCoordinator};
