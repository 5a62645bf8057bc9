//! Run a named task.

use std::time::Instant;

use anyhow::{Context, Result};
use kiln_pipeline::{registry, Project};

/// Run the task registered under `name`.
pub async fn run(project: &Project, name: &str) -> Result<()> {
    let registry = registry(project);
    if !registry.contains(name) {
        anyhow::bail!(
            "Task '{}' is not defined. Available tasks: {}",
            name,
            registry.names().join(", ")
        );
    }

    let start = Instant::now();
    registry
        .run(name)
        .await
        .with_context(|| format!("Task '{}' failed", name))?;

    tracing::info!("Completed '{}' in {} ms", name, start.elapsed().as_millis());

    Ok(())
}
