//! Source selection with glob patterns.
//!
//! A pattern's base is its literal directory prefix (`src/img/src` for
//! `src/img/src/**/*.png`). Files found under a pattern keep their path
//! relative to that base, which is how outputs preserve subdirectories.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use globset::{Glob, GlobBuilder, GlobMatcher, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

use crate::error::TransformError;

/// A file selected by a [`SourceSet`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Path joined onto the discovery root
    pub path: PathBuf,

    /// Path relative to the matching pattern's base
    pub relative: PathBuf,
}

#[derive(Debug, Clone)]
struct SourcePattern {
    base: PathBuf,
    matcher: GlobMatcher,
}

/// An ordered set of include patterns plus `!`-prefixed excludes.
#[derive(Debug, Clone)]
pub struct SourceSet {
    patterns: Vec<SourcePattern>,
    excludes: GlobSet,
}

impl SourceSet {
    /// Compile a list of patterns.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, TransformError> {
        let mut includes = Vec::new();
        let mut excludes = GlobSetBuilder::new();

        for pattern in patterns {
            let pattern = pattern.as_ref();
            if let Some(negated) = pattern.strip_prefix('!') {
                excludes.add(compile_glob(negated)?);
            } else {
                includes.push(SourcePattern {
                    base: literal_base(pattern),
                    matcher: compile_glob(pattern)?.compile_matcher(),
                });
            }
        }

        let excludes = excludes
            .build()
            .map_err(|e| TransformError::Glob(e.to_string()))?;

        Ok(Self {
            patterns: includes,
            excludes,
        })
    }

    /// Base directories of the include patterns.
    pub fn bases(&self) -> Vec<PathBuf> {
        self.patterns.iter().map(|p| p.base.clone()).collect()
    }

    /// Whether a root-relative path is selected by this set.
    pub fn matches(&self, relative: &Path) -> bool {
        !self.excludes.is_match(relative)
            && self.patterns.iter().any(|p| p.matcher.is_match(relative))
    }

    /// Find every selected file under `root`, sorted by path.
    ///
    /// Missing base directories select nothing.
    pub fn discover(&self, root: &Path) -> Result<Vec<SourceFile>, TransformError> {
        let mut found: BTreeMap<PathBuf, SourceFile> = BTreeMap::new();

        for pattern in &self.patterns {
            let base_dir = root.join(&pattern.base);
            if !base_dir.exists() {
                continue;
            }

            for entry in WalkDir::new(&base_dir).follow_links(true) {
                let entry = entry.map_err(|e| {
                    let path = e.path().unwrap_or(&base_dir).to_path_buf();
                    TransformError::io(&path, e.into())
                })?;
                if !entry.file_type().is_file() {
                    continue;
                }

                let path = entry.path();
                let Ok(relative_to_root) = path.strip_prefix(root) else {
                    continue;
                };
                if !pattern.matcher.is_match(relative_to_root)
                    || self.excludes.is_match(relative_to_root)
                {
                    continue;
                }

                let relative = relative_to_root
                    .strip_prefix(&pattern.base)
                    .unwrap_or(relative_to_root)
                    .to_path_buf();

                found
                    .entry(relative_to_root.to_path_buf())
                    .or_insert_with(|| SourceFile {
                        path: path.to_path_buf(),
                        relative,
                    });
            }
        }

        Ok(found.into_values().collect())
    }
}

fn compile_glob(pattern: &str) -> Result<Glob, TransformError> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map_err(|e| TransformError::Glob(format!("{}: {}", pattern, e)))
}

/// Whether a pattern contains glob syntax.
pub fn is_glob(pattern: &str) -> bool {
    pattern.starts_with('!') || pattern.contains(['*', '?', '[', '{'])
}

/// Literal directory prefix of a pattern.
///
/// For a pattern without glob syntax this is the parent directory.
fn literal_base(pattern: &str) -> PathBuf {
    let mut base = PathBuf::new();
    let components: Vec<Component<'_>> = Path::new(pattern).components().collect();

    for (i, component) in components.iter().enumerate() {
        let text = component.as_os_str().to_string_lossy();
        if is_glob(&text) || i + 1 == components.len() {
            break;
        }
        base.push(component);
    }

    base
}
