//! SVG sprite: every icon becomes a `<symbol>` referenced by file stem.
//!
//! ```html
//! <svg><use href="img/sprite.svg#arrow"></use></svg>
//! ```

use std::path::Path;

use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};

use crate::error::TransformError;
use crate::output::{write_atomic, TransformReport};
use crate::paths::Paths;
use crate::sources::SourceSet;

/// Sprite file name inside the icons destination.
pub const OUTPUT_FILE: &str = "sprite.svg";

/// Combine all icons into `sprite.svg`.
pub fn build(paths: &Paths) -> Result<TransformReport, TransformError> {
    let sources = SourceSet::new(&paths.icons.src)?.discover(&paths.root)?;

    let mut report = TransformReport::default();
    if sources.is_empty() {
        tracing::debug!("No icons matched");
        return Ok(report);
    }

    let mut sprite = String::from(
        r#"<?xml version="1.0" encoding="utf-8"?><svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink">"#,
    );

    for source in &sources {
        let svg = std::fs::read_to_string(&source.path)
            .map_err(|e| TransformError::io(&source.path, e))?;
        let id = source
            .path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("icon");
        sprite.push_str(&symbol(id, &svg, &source.path)?);
        report.inputs += 1;
    }
    sprite.push_str("</svg>");

    let output = paths.resolve(&paths.icons.dest).join(OUTPUT_FILE);
    write_atomic(&output, sprite.as_bytes())?;
    report.wrote(output);

    Ok(report)
}

/// Re-wrap the children of an icon's root `<svg>` in a `<symbol>`.
fn symbol(id: &str, svg: &str, path: &Path) -> Result<String, TransformError> {
    let fail = |message: String| TransformError::compile(path, message);

    let mut reader = Reader::from_str(svg);
    reader.config_mut().trim_text(true);
    let mut writer = Writer::new(Vec::new());

    let mut depth = 0usize;
    let mut view_box = None;

    loop {
        let event = reader.read_event().map_err(|e| fail(e.to_string()))?;
        match event {
            Event::Start(e) if depth == 0 => {
                view_box = root_view_box(&e, path)?;
                depth = 1;
            }
            Event::Empty(e) if depth == 0 => {
                view_box = root_view_box(&e, path)?;
                break;
            }
            Event::End(_) if depth == 1 => break,
            Event::Eof => {
                if depth == 0 {
                    return Err(fail("no <svg> element".to_string()));
                }
                return Err(fail("unexpected end of document".to_string()));
            }
            Event::Start(e) => {
                depth += 1;
                writer
                    .write_event(Event::Start(e))
                    .map_err(|e| fail(e.to_string()))?;
            }
            Event::End(e) => {
                depth -= 1;
                writer
                    .write_event(Event::End(e))
                    .map_err(|e| fail(e.to_string()))?;
            }
            event if depth > 0 => {
                writer.write_event(event).map_err(|e| fail(e.to_string()))?;
            }
            // prolog, doctype and comments before the root
            _ => {}
        }
    }

    let body = String::from_utf8(writer.into_inner()).map_err(|e| fail(e.to_string()))?;
    let view_box = view_box
        .map(|v| format!(r#" viewBox="{}""#, escape(v.as_str())))
        .unwrap_or_default();

    Ok(format!(
        r#"<symbol id="{}"{}>{}</symbol>"#,
        escape(id),
        view_box,
        body
    ))
}

/// `viewBox` of the root element, falling back to `0 0 width height`.
fn root_view_box(root: &BytesStart<'_>, path: &Path) -> Result<Option<String>, TransformError> {
    if root.local_name().as_ref() != b"svg" {
        return Err(TransformError::compile(path, "root element is not <svg>"));
    }

    let attribute = |name: &str| {
        root.try_get_attribute(name)
            .ok()
            .flatten()
            .and_then(|a| a.unescape_value().ok())
            .map(|v| v.into_owned())
    };

    if let Some(view_box) = attribute("viewBox") {
        return Ok(Some(view_box));
    }

    let dimension = |name: &str| {
        attribute(name).and_then(|v| v.trim_end_matches("px").parse::<f64>().ok())
    };
    Ok(match (dimension("width"), dimension("height")) {
        (Some(w), Some(h)) => Some(format!("0 0 {} {}", w, h)),
        _ => None,
    })
}
