//! Style compilation: Sass to one compressed, vendor-prefixed stylesheet.

use std::path::Path;

use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};

use crate::error::TransformError;
use crate::output::{write_atomic, TransformReport};
use crate::paths::Paths;
use crate::sources::SourceSet;

/// Browsers that vendor prefixes are generated for.
pub const BROWSERSLIST: &str = "last 10 versions";

/// Aggregate output file name.
pub const OUTPUT_FILE: &str = "style.min.css";

/// Compile every non-partial style source into `style.min.css`.
///
/// Sources are compiled in path order and joined with newlines. When no
/// source matches, nothing is written.
pub fn compile(paths: &Paths) -> Result<TransformReport, TransformError> {
    let sources = SourceSet::new(&paths.styles.src)?.discover(&paths.root)?;
    let targets = browser_targets()?;

    let mut report = TransformReport::default();
    let mut compiled = Vec::new();

    for source in sources.iter().filter(|s| !is_partial(&s.path)) {
        tracing::debug!("Compiling {}", source.path.display());
        let css = compile_sass(&source.path)?;
        compiled.push(prefix_and_minify(&css, &source.path, targets)?);
        report.inputs += 1;
    }

    if compiled.is_empty() {
        tracing::debug!("No style sources matched");
        return Ok(report);
    }

    let output = paths.resolve(&paths.styles.dest).join(OUTPUT_FILE);
    write_atomic(&output, compiled.join("\n").as_bytes())?;
    report.wrote(output);

    Ok(report)
}

/// Partials (`_name.sass`) are only reachable through `@use` / `@import`.
fn is_partial(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('_'))
}

fn compile_sass(path: &Path) -> Result<String, TransformError> {
    let options = grass::Options::default().style(grass::OutputStyle::Compressed);
    grass::from_path(path, &options).map_err(|e| TransformError::compile(path, e.to_string()))
}

fn browser_targets() -> Result<Targets, TransformError> {
    let browsers = Browsers::from_browserslist([BROWSERSLIST])
        .map_err(|e| TransformError::Config(format!("browserslist: {}", e)))?;

    Ok(Targets {
        browsers,
        ..Targets::default()
    })
}

/// Add vendor prefixes for `targets` and minify.
pub fn prefix_and_minify(
    css: &str,
    path: &Path,
    targets: Targets,
) -> Result<String, TransformError> {
    let mut stylesheet = StyleSheet::parse(
        css,
        ParserOptions {
            filename: path.display().to_string(),
            ..ParserOptions::default()
        },
    )
    .map_err(|e| TransformError::compile(path, format!("CSS parse error: {}", e)))?;

    stylesheet
        .minify(MinifyOptions {
            targets,
            ..MinifyOptions::default()
        })
        .map_err(|e| TransformError::compile(path, format!("CSS minify error: {}", e)))?;

    let printed = stylesheet
        .to_css(PrinterOptions {
            minify: true,
            targets,
            ..PrinterOptions::default()
        })
        .map_err(|e| TransformError::compile(path, format!("CSS print error: {}", e)))?;

    Ok(printed.code)
}
