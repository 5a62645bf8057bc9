//! Named task lookup.

use std::collections::BTreeMap;

use crate::error::TaskError;
use crate::task::Task;

/// Tasks addressable by name from the command line.
#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: BTreeMap<String, Task>,
}

impl TaskRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Expose `task` under `name`, replacing any earlier registration.
    pub fn register(&mut self, name: impl Into<String>, task: Task) {
        let name = name.into();
        if self.tasks.insert(name.clone(), task).is_some() {
            tracing::debug!("Replaced task '{}'", name);
        }
    }

    /// Look up a task by name.
    pub fn get(&self, name: &str) -> Option<&Task> {
        self.tasks.get(name)
    }

    /// Check if a task exists.
    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    /// Get all registered task names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.tasks.keys().map(String::as_str).collect()
    }

    /// Run the task registered under `name`.
    pub async fn run(&self, name: &str) -> Result<(), TaskError> {
        let task = self
            .get(name)
            .ok_or_else(|| TaskError::NotFound(name.to_string()))?;
        task.run().await
    }
}
