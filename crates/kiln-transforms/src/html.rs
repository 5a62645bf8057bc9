//! HTML assembly: inline `@@include` partials into page templates.
//!
//! ```text
//! @@include('header.html')
//! @@include('card.html', { "title": "Hello" })
//! ```
//!
//! Include paths resolve against the components directory. Inside an
//! included file, `@@title` is replaced by the `title` value from the
//! include's JSON context (dotted names reach into nested objects).

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::Value;

use crate::error::TransformError;
use crate::output::{write_atomic, FileFailures, TransformReport};
use crate::paths::Paths;
use crate::sources::SourceSet;

/// Directive prefix.
pub const PREFIX: &str = "@@";

const MAX_DEPTH: usize = 32;

static INCLUDE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)@@include\(\s*["']([^"']+)["']\s*(?:,\s*(\{.*?\})\s*)?\)"#)
        .expect("valid include regex")
});

static VARIABLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"@@([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)*)")
        .expect("valid variable regex")
});

/// Assemble every page template into the html destination.
pub fn assemble(paths: &Paths) -> Result<TransformReport, TransformError> {
    let sources = SourceSet::new(&paths.html.src)?.discover(&paths.root)?;
    let resolver = IncludeResolver::new(paths.resolve(&paths.components));
    let dest = paths.resolve(&paths.html.dest);

    let mut report = TransformReport::default();
    let mut failures = FileFailures::default();

    for source in &sources {
        report.inputs += 1;
        let output = dest.join(&source.relative);
        match assemble_page(&resolver, &source.path, &output) {
            Ok(()) => report.wrote(output),
            Err(e) => failures.record(e),
        }
    }

    failures.finish(report)
}

fn assemble_page(
    resolver: &IncludeResolver,
    page: &Path,
    output: &Path,
) -> Result<(), TransformError> {
    let template = std::fs::read_to_string(page).map_err(|e| TransformError::io(page, e))?;
    let html = resolver
        .render(&template)
        .map_err(|message| TransformError::compile(page, message))?;
    write_atomic(output, html.as_bytes())
}

/// Expands include directives against a base directory.
#[derive(Debug, Clone)]
pub struct IncludeResolver {
    base: PathBuf,
}

impl IncludeResolver {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Expand all includes in a page template.
    pub fn render(&self, template: &str) -> Result<String, String> {
        self.expand(template, &mut Vec::new())
    }

    fn expand(&self, text: &str, stack: &mut Vec<PathBuf>) -> Result<String, String> {
        if stack.len() > MAX_DEPTH {
            return Err(format!("includes nested deeper than {}", MAX_DEPTH));
        }

        let mut output = String::with_capacity(text.len());
        let mut last = 0;

        for caps in INCLUDE_RE.captures_iter(text) {
            let whole = caps.get(0).expect("match has group 0");
            output.push_str(&text[last..whole.start()]);
            output.push_str(&self.include(&caps, stack)?);
            last = whole.end();
        }
        output.push_str(&text[last..]);

        Ok(output)
    }

    fn include(&self, caps: &Captures<'_>, stack: &mut Vec<PathBuf>) -> Result<String, String> {
        let file = &caps[1];
        let path = self.base.join(file);

        if stack.contains(&path) {
            return Err(format!("include cycle through {}", path.display()));
        }

        let context = match caps.get(2) {
            Some(json) => serde_json::from_str::<Value>(json.as_str())
                .map_err(|e| format!("invalid context for {}: {}", file, e))?,
            None => Value::Object(Default::default()),
        };

        let partial = std::fs::read_to_string(&path)
            .map_err(|e| format!("cannot include {}: {}", path.display(), e))?;
        let partial = substitute(&partial, &context);

        stack.push(path);
        let expanded = self.expand(&partial, stack);
        stack.pop();
        expanded
    }
}

/// Replace `@@name` with values from `context`; unknown names are left as-is.
fn substitute(text: &str, context: &Value) -> String {
    VARIABLE_RE
        .replace_all(text, |caps: &Captures<'_>| {
            match lookup(context, &caps[1]) {
                Some(Value::String(s)) => s.clone(),
                Some(value) if !value.is_object() && !value.is_array() => value.to_string(),
                _ => caps[0].to_string(),
            }
        })
        .into_owned()
}

fn lookup<'v>(context: &'v Value, dotted: &str) -> Option<&'v Value> {
    dotted
        .split('.')
        .try_fold(context, |value, key| value.get(key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::tempdir;

    fn write(root: &Path, relative: &str, contents: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn inlines_partial_at_marker() {
        let temp = tempdir().unwrap();
        write(temp.path(), "src/components/header.html", "<header>Site</header>");
        write(
            temp.path(),
            "src/pages/index.html",
            "<body>\n@@include('header.html')\n<main></main>\n</body>",
        );

        let report = assemble(&Paths::with_root(temp.path())).unwrap();

        assert_eq!(report.inputs, 1);
        let html = fs::read_to_string(temp.path().join("src/index.html")).unwrap();
        assert_eq!(html, "<body>\n<header>Site</header>\n<main></main>\n</body>");
    }

    #[test]
    fn reassembly_is_byte_identical() {
        let temp = tempdir().unwrap();
        write(temp.path(), "src/components/nav.html", "<nav>@@label</nav>");
        write(
            temp.path(),
            "src/pages/index.html",
            r#"<body>@@include('nav.html', { "label": "Home" })</body>"#,
        );
        let paths = Paths::with_root(temp.path());
        let page = temp.path().join("src/index.html");

        assemble(&paths).unwrap();
        let first = fs::read(&page).unwrap();
        assemble(&paths).unwrap();

        assert_eq!(fs::read(&page).unwrap(), first);
    }

    #[test]
    fn broken_page_does_not_block_others() {
        let temp = tempdir().unwrap();
        write(temp.path(), "src/pages/about.html", "@@include('missing.html')");
        write(temp.path(), "src/pages/index.html", "<p>fine</p>");

        let err = assemble(&Paths::with_root(temp.path())).unwrap_err();

        assert!(matches!(err, TransformError::Compile { ref path, .. } if path.ends_with("about.html")));
        assert_eq!(
            fs::read_to_string(temp.path().join("src/index.html")).unwrap(),
            "<p>fine</p>"
        );
        assert!(!temp.path().join("src/about.html").exists());
    }

    #[test]
    fn substitutes_context_values() {
        let temp = tempdir().unwrap();
        write(
            temp.path(),
            "components/card.html",
            "<h2>@@title</h2><p>@@meta.author</p><span>@@missing</span>",
        );

        let resolver = IncludeResolver::new(temp.path().join("components"));
        let html = resolver
            .render(r#"@@include("card.html", { "title": "Hello", "meta": { "author": "Ann" } })"#)
            .unwrap();

        assert_eq!(html, "<h2>Hello</h2><p>Ann</p><span>@@missing</span>");
    }

    #[test]
    fn resolves_nested_includes() {
        let temp = tempdir().unwrap();
        write(temp.path(), "c/outer.html", "[@@include('inner.html')]");
        write(temp.path(), "c/inner.html", "inner");

        let resolver = IncludeResolver::new(temp.path().join("c"));

        assert_eq!(resolver.render("@@include('outer.html')").unwrap(), "[inner]");
    }

    #[test]
    fn rejects_include_cycles() {
        let temp = tempdir().unwrap();
        write(temp.path(), "c/a.html", "@@include('b.html')");
        write(temp.path(), "c/b.html", "@@include('a.html')");

        let resolver = IncludeResolver::new(temp.path().join("c"));
        let err = resolver.render("@@include('a.html')").unwrap_err();

        assert!(err.contains("cycle"));
    }

    #[test]
    fn missing_partial_names_the_page() {
        let temp = tempdir().unwrap();
        write(temp.path(), "src/pages/about.html", "@@include('nope.html')");

        let err = assemble(&Paths::with_root(temp.path())).unwrap_err();

        match err {
            TransformError::Compile { path, message } => {
                assert!(path.ends_with("about.html"));
                assert!(message.contains("nope.html"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
