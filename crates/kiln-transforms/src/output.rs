//! Output writing shared by every transformation.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::TransformError;

/// Result of a transformation run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformReport {
    /// Number of source files read
    pub inputs: usize,

    /// Files written
    pub outputs: Vec<PathBuf>,
}

impl TransformReport {
    pub(crate) fn wrote(&mut self, path: PathBuf) {
        self.outputs.push(path);
    }
}

/// Failures of individual inputs in a per-file transformation.
///
/// The remaining files are still processed; the first failure is returned
/// when the run finishes and later ones are logged.
#[derive(Debug, Default)]
pub(crate) struct FileFailures {
    first: Option<TransformError>,
    count: usize,
}

impl FileFailures {
    pub(crate) fn record(&mut self, error: TransformError) {
        self.count += 1;
        match self.first {
            None => self.first = Some(error),
            Some(_) => tracing::warn!("{}", error),
        }
    }

    /// `report` when every file succeeded, otherwise the first failure.
    pub(crate) fn finish(self, report: TransformReport) -> Result<TransformReport, TransformError> {
        match self.first {
            None => Ok(report),
            Some(error) => {
                if self.count > 1 {
                    tracing::warn!(
                        "{} input(s) failed, {} output(s) written",
                        self.count,
                        report.outputs.len()
                    );
                }
                Err(error)
            }
        }
    }
}

/// Write `contents` to `path` through a temporary file in the same directory.
///
/// Readers see either the old file or the new one, never a partial write.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), TransformError> {
    let dir = path.parent().unwrap_or(Path::new("."));
    std::fs::create_dir_all(dir).map_err(|e| TransformError::io(dir, e))?;

    let mut file = NamedTempFile::new_in(dir).map_err(|e| TransformError::io(dir, e))?;
    file.write_all(contents)
        .map_err(|e| TransformError::io(file.path(), e))?;
    file.persist(path)
        .map_err(|e| TransformError::io(path, e.error))?;

    Ok(())
}
