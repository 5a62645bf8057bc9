//! Task listing.

use kiln_pipeline::{registry, Project};

/// Print every task name, one per line.
pub fn run(project: &Project) {
    for name in registry(project).names() {
        println!("{}", name);
    }
}
