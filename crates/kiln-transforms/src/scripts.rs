//! Script bundling: downlevel each entry, concatenate, minify.

use std::path::Path;

use oxc_allocator::Allocator;
use oxc_codegen::{Codegen, CodegenOptions};
use oxc_minifier::{Minifier, MinifierOptions};
use oxc_parser::Parser;
use oxc_semantic::SemanticBuilder;
use oxc_span::SourceType;
use oxc_transformer::{TransformOptions, Transformer};

use crate::error::TransformError;
use crate::output::{write_atomic, TransformReport};
use crate::paths::Paths;
use crate::sources::SourceSet;

/// Oldest syntax level the transpiler can lower to.
pub const TARGET: &str = "es2015";

/// Aggregate output file name.
pub const OUTPUT_FILE: &str = "main.min.js";

/// Bundle every script source into `main.min.js`.
pub fn bundle(paths: &Paths) -> Result<TransformReport, TransformError> {
    let sources = SourceSet::new(&paths.scripts.src)?.discover(&paths.root)?;

    let mut report = TransformReport::default();
    let mut lowered = Vec::with_capacity(sources.len());

    for source in &sources {
        let text = std::fs::read_to_string(&source.path)
            .map_err(|e| TransformError::io(&source.path, e))?;
        lowered.push(downlevel(&text, &source.path)?);
        report.inputs += 1;
    }

    if lowered.is_empty() {
        tracing::debug!("No script sources matched");
        return Ok(report);
    }

    let output = paths.resolve(&paths.scripts.dest).join(OUTPUT_FILE);
    let minified = minify(&lowered.join("\n"), &output)?;
    write_atomic(&output, minified.as_bytes())?;
    report.wrote(output);

    Ok(report)
}

/// Lower modern syntax to [`TARGET`].
pub fn downlevel(source: &str, path: &Path) -> Result<String, TransformError> {
    let allocator = Allocator::default();
    let parsed = Parser::new(&allocator, source, SourceType::mjs()).parse();
    if let Some(error) = parsed.errors.first() {
        return Err(TransformError::compile(path, error.to_string()));
    }

    let mut program = parsed.program;
    let scoping = SemanticBuilder::new()
        .build(&program)
        .semantic
        .into_scoping();

    let options = TransformOptions::from_target(TARGET)
        .map_err(|e| TransformError::Config(format!("script target: {}", e)))?;
    let transformed =
        Transformer::new(&allocator, path, &options).build_with_scoping(scoping, &mut program);
    if let Some(error) = transformed.errors.first() {
        return Err(TransformError::compile(path, error.to_string()));
    }

    Ok(Codegen::new().build(&program).code)
}

/// Compress, mangle and print without whitespace.
pub fn minify(source: &str, path: &Path) -> Result<String, TransformError> {
    let allocator = Allocator::default();
    let parsed = Parser::new(&allocator, source, SourceType::mjs()).parse();
    if let Some(error) = parsed.errors.first() {
        return Err(TransformError::compile(path, error.to_string()));
    }

    let mut program = parsed.program;
    let minified = Minifier::new(MinifierOptions::default()).build(&allocator, &mut program);

    Ok(Codegen::new()
        .with_options(CodegenOptions::minify())
        .with_scoping(minified.scoping)
        .build(&program)
        .code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn lowers_optional_chaining() {
        let out = downlevel(
            "const name = user?.profile?.name;\nconsole.log(name);\n",
            Path::new("main.js"),
        )
        .unwrap();

        assert!(!out.contains("?."), "not lowered: {}", out);
        assert!(out.contains("console.log"));
    }

    #[test]
    fn minify_removes_dead_code() {
        let out = minify(
            "if (false) { console.log('never-printed'); }\nconsole.log('kept');\n",
            Path::new("main.js"),
        )
        .unwrap();

        assert!(!out.contains("never-printed"));
        assert!(out.contains("kept"));
    }

    #[test]
    fn bundles_entry_into_min_file() {
        let temp = tempdir().unwrap();
        let js = temp.path().join("src/js");
        fs::create_dir_all(&js).unwrap();
        fs::write(
            js.join("main.js"),
            "function greet(person) {\n  return `hello ${person ?? 'world'}`;\n}\ndocument.title = greet();\n",
        )
        .unwrap();

        let paths = Paths::with_root(temp.path());
        let report = bundle(&paths).unwrap();

        assert_eq!(report.inputs, 1);
        let out = fs::read_to_string(js.join("main.min.js")).unwrap();
        assert!(out.contains("document.title"));
        assert!(out.lines().count() <= 2);

        bundle(&paths).unwrap();
        assert_eq!(out, fs::read_to_string(js.join("main.min.js")).unwrap());
    }

    #[test]
    fn reports_syntax_errors() {
        let temp = tempdir().unwrap();
        let js = temp.path().join("src/js");
        fs::create_dir_all(&js).unwrap();
        fs::write(js.join("main.js"), "function (").unwrap();

        let err = bundle(&Paths::with_root(temp.path())).unwrap_err();

        assert!(matches!(err, TransformError::Compile { .. }));
        assert!(!js.join("main.min.js").exists());
    }
}
