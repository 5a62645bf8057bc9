//! Font conversion: one WOFF2 file per source font.

use std::path::Path;

use crate::error::TransformError;
use crate::output::{write_atomic, FileFailures, TransformReport};
use crate::paths::Paths;
use crate::sources::SourceSet;
use crate::woff2;

/// Convert every font source to `<dest>/<stem>.woff2`.
///
/// A font that fails to convert does not stop the others.
pub fn convert(paths: &Paths) -> Result<TransformReport, TransformError> {
    let sources = SourceSet::new(&paths.fonts.src)?.discover(&paths.root)?;
    let dest = paths.resolve(&paths.fonts.dest);

    let mut report = TransformReport::default();
    let mut failures = FileFailures::default();

    for source in &sources {
        report.inputs += 1;
        let output = dest.join(&source.relative).with_extension("woff2");
        match convert_font(&source.path, &output) {
            Ok(()) => report.wrote(output),
            Err(e) => failures.record(e),
        }
    }

    failures.finish(report)
}

fn convert_font(path: &Path, output: &Path) -> Result<(), TransformError> {
    let font = std::fs::read(path).map_err(|e| TransformError::io(path, e))?;
    let encoded = woff2::encode(&font).map_err(|e| TransformError::compile(path, e.to_string()))?;

    tracing::debug!(
        "Converted {} ({} -> {} bytes)",
        path.display(),
        font.len(),
        encoded.len()
    );
    write_atomic(output, &encoded)
}
