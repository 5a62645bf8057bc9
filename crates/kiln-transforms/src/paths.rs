//! Project layout: where each asset category is read from and written to.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// A named asset category: source globs and a destination directory.
///
/// Globs and destinations are relative to [`Paths::root`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PathGroup {
    pub src: Vec<String>,
    pub dest: PathBuf,
}

impl PathGroup {
    pub fn new(src: &[&str], dest: &str) -> Self {
        Self {
            src: src.iter().map(|s| s.to_string()).collect(),
            dest: PathBuf::from(dest),
        }
    }
}

/// What the production build copies and where it goes.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DistGroup {
    /// Directory the copied paths are relative to
    pub base: PathBuf,

    /// Distribution directory
    pub dest: PathBuf,

    /// Files and globs (relative to `base`) to copy; `!` prefixes exclude
    pub include: Vec<String>,
}

impl Default for DistGroup {
    fn default() -> Self {
        Self {
            base: PathBuf::from("src"),
            dest: PathBuf::from("dist"),
            include: [
                "css/style.min.css",
                "fonts/*.woff2",
                "js/main.min.js",
                "*.html",
                "img/**/*.{png,jpg,jpeg,svg,webp,avif}",
                "!img/src/**/*",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

/// The full project layout.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Paths {
    /// Project root every other path is resolved against
    pub root: PathBuf,

    pub styles: PathGroup,
    pub scripts: PathGroup,
    pub images: PathGroup,

    /// Any svg change under the image sources rebuilds the sprite
    pub svg: PathGroup,

    /// Icons that make up the sprite
    pub icons: PathGroup,

    pub fonts: PathGroup,

    /// Page templates
    pub html: PathGroup,

    /// Directory `@@include` paths resolve against
    pub components: PathBuf,

    /// Directory served by the dev server
    pub serve: PathBuf,

    pub dist: DistGroup,
}

impl Default for Paths {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            styles: PathGroup::new(&["src/sass/**/*.sass"], "src/css"),
            scripts: PathGroup::new(&["src/js/main.js"], "src/js"),
            images: PathGroup::new(&["src/img/src/**/*.{png,jpg,jpeg}"], "src/img"),
            svg: PathGroup::new(&["src/img/src/**/*.svg"], "src/img"),
            icons: PathGroup::new(&["src/img/src/icons/*.svg"], "src/img"),
            fonts: PathGroup::new(&["src/fonts/src/*.ttf"], "src/fonts"),
            html: PathGroup::new(&["src/pages/*.html"], "src"),
            components: PathBuf::from("src/components"),
            serve: PathBuf::from("src"),
            dist: DistGroup::default(),
        }
    }
}

impl Paths {
    /// Default layout rooted at `root`.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Resolve a project-relative path.
    pub fn resolve(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.root.join(relative)
    }

    /// URL path under which the dev server exposes a file in `dir`.
    ///
    /// Returns `None` when `dir` is outside the served directory.
    pub fn served_url(&self, dir: &Path, file_name: &str) -> Option<String> {
        let relative = dir.strip_prefix(&self.serve).ok()?;
        let mut url = String::from("/");
        for component in relative.components() {
            url.push_str(&component.as_os_str().to_string_lossy());
            url.push('/');
        }
        url.push_str(file_name);
        Some(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout_matches_source_tree() {
        let paths = Paths::default();
        assert_eq!(paths.styles.src, vec!["src/sass/**/*.sass"]);
        assert_eq!(paths.styles.dest, PathBuf::from("src/css"));
        assert_eq!(paths.dist.dest, PathBuf::from("dist"));
        assert_eq!(paths.components, PathBuf::from("src/components"));
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let paths: Paths = toml::from_str(
            r#"
root = "site"

[scripts]
src = ["src/js/app.js"]
dest = "src/js"
"#,
        )
        .unwrap();

        assert_eq!(paths.root, PathBuf::from("site"));
        assert_eq!(paths.scripts.src, vec!["src/js/app.js"]);
        assert_eq!(paths.styles, Paths::default().styles);
    }

    #[test]
    fn builds_served_urls() {
        let paths = Paths::default();
        assert_eq!(
            paths.served_url(Path::new("src/css"), "style.min.css"),
            Some("/css/style.min.css".to_string())
        );
        assert_eq!(paths.served_url(Path::new("other"), "x.css"), None);
    }
}
