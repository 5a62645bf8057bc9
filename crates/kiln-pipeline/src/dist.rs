//! Production bundle: clean and assemble the distribution directory.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use kiln_transforms::sources::is_glob;
use kiln_transforms::{Paths, SourceSet};

use crate::error::TaskError;

/// Remove the distribution directory. A missing directory is not an error.
pub fn clean_dist(paths: &Paths) -> Result<(), TaskError> {
    let dest = paths.resolve(&paths.dist.dest);
    match fs::remove_dir_all(&dest) {
        Ok(()) => {
            tracing::debug!("Removed {}", dest.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(TaskError::io(&dest, e)),
    }
}

/// Copy the whitelisted build outputs into the distribution directory.
///
/// Paths keep their location relative to the dist base. Literal entries must
/// exist; glob entries may match nothing. Returns the copied destinations.
pub fn assemble_dist(paths: &Paths) -> Result<Vec<PathBuf>, TaskError> {
    let base = paths.resolve(&paths.dist.base);
    let dest = paths.resolve(&paths.dist.dest);

    let (globs, literals): (Vec<&String>, Vec<&String>) =
        paths.dist.include.iter().partition(|entry| is_glob(entry));

    let mut manifest: BTreeSet<PathBuf> = BTreeSet::new();

    // Check every literal before copying anything
    for literal in literals {
        let source = base.join(literal);
        if !source.is_file() {
            return Err(TaskError::MissingBuildInput(source.display().to_string()));
        }
        manifest.insert(PathBuf::from(literal));
    }

    for file in SourceSet::new(&globs)?.discover(&base)? {
        if let Ok(relative) = file.path.strip_prefix(&base) {
            manifest.insert(relative.to_path_buf());
        }
    }

    let mut copied = Vec::with_capacity(manifest.len());
    for relative in manifest {
        let from = base.join(&relative);
        let to = dest.join(&relative);
        copy_file(&from, &to)?;
        copied.push(to);
    }

    tracing::info!("Copied {} file(s) to {}", copied.len(), dest.display());
    Ok(copied)
}

fn copy_file(from: &Path, to: &Path) -> Result<(), TaskError> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent).map_err(|e| TaskError::io(parent, e))?;
    }
    fs::copy(from, to).map_err(|e| TaskError::io(from, e))?;
    tracing::debug!("Copied {}", to.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn write(root: &Path, relative: &str, contents: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn built_tree(root: &Path) {
        write(root, "src/css/style.min.css", "a{color:red}");
        write(root, "src/js/main.min.js", "console.log(1);");
        write(root, "src/fonts/body.woff2", "wOF2");
        write(root, "src/fonts/src/body.ttf", "ttf");
        write(root, "src/index.html", "<html></html>");
        write(root, "src/pages/index.html", "<html>@@include('x')</html>");
        write(root, "src/img/photo.png", "png");
        write(root, "src/img/photo.webp", "webp");
        write(root, "src/img/nested/pic.jpg", "jpg");
        write(root, "src/img/sprite.svg", "<svg/>");
        write(root, "src/img/src/photo.png", "raw");
        write(root, "src/img/src/icons/star.svg", "<svg/>");
    }

    fn listing(root: &Path) -> Vec<String> {
        let mut files: Vec<String> = files_under(root)
            .into_iter()
            .map(|p| {
                p.strip_prefix(root)
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect();
        files.sort();
        files
    }

    fn files_under(dir: &Path) -> Vec<PathBuf> {
        let mut out = Vec::new();
        for entry in fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                out.extend(files_under(&path));
            } else {
                out.push(path);
            }
        }
        out
    }

    #[test]
    fn copies_whitelisted_outputs() {
        let temp = tempdir().unwrap();
        built_tree(temp.path());
        let paths = Paths::with_root(temp.path());

        let copied = assemble_dist(&paths).unwrap();

        assert_eq!(copied.len(), 8);
        assert_eq!(
            listing(&temp.path().join("dist")),
            vec![
                "css/style.min.css",
                "fonts/body.woff2",
                "img/nested/pic.jpg",
                "img/photo.png",
                "img/photo.webp",
                "img/sprite.svg",
                "index.html",
                "js/main.min.js",
            ]
        );
    }

    #[test]
    fn missing_literal_input_fails() {
        let temp = tempdir().unwrap();
        built_tree(temp.path());
        fs::remove_file(temp.path().join("src/js/main.min.js")).unwrap();
        let paths = Paths::with_root(temp.path());

        let err = assemble_dist(&paths).unwrap_err();

        assert!(matches!(err, TaskError::MissingBuildInput(ref p) if p.ends_with("main.min.js")));
        assert!(!temp.path().join("dist").exists());
    }

    #[test]
    fn empty_globs_copy_nothing() {
        let temp = tempdir().unwrap();
        write(temp.path(), "src/css/style.min.css", "a{}");
        write(temp.path(), "src/js/main.min.js", "");
        let paths = Paths::with_root(temp.path());

        let copied = assemble_dist(&paths).unwrap();

        assert_eq!(copied.len(), 2);
    }

    #[test]
    fn clean_twice_succeeds() {
        let temp = tempdir().unwrap();
        write(temp.path(), "dist/index.html", "old");
        let paths = Paths::with_root(temp.path());

        clean_dist(&paths).unwrap();
        clean_dist(&paths).unwrap();

        assert!(!temp.path().join("dist").exists());
    }
}
