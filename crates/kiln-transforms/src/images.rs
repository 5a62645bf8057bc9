//! Image optimization.
//!
//! Every source image produces three files in the destination, all next to
//! each other and never replacing the source:
//!
//! - the original format, re-encoded (JPEG q80 progressive, PNG level 5) and
//!   kept byte-identical to the source when re-encoding would not shrink it
//! - a lossy AVIF derivative at quality 50
//! - a lossless WebP derivative

use std::path::{Path, PathBuf};

use image::codecs::avif::AvifEncoder;
use image::codecs::webp::WebPEncoder;
use image::{DynamicImage, GenericImageView};

use crate::cache::{CacheKey, ImageCache};
use crate::error::TransformError;
use crate::output::{write_atomic, FileFailures, TransformReport};
use crate::paths::Paths;
use crate::sources::SourceSet;

pub const JPEG_QUALITY: u8 = 80;
pub const PNG_OPTIMIZATION_LEVEL: u8 = 5;
pub const AVIF_QUALITY: u8 = 50;
pub const AVIF_SPEED: u8 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceFormat {
    Jpeg,
    Png,
}

impl SourceFormat {
    fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "jpg" | "jpeg" => Some(SourceFormat::Jpeg),
            "png" => Some(SourceFormat::Png),
            _ => None,
        }
    }
}

/// Optimize every image source into the images destination.
///
/// An image that fails to decode or encode does not stop the others.
pub fn optimize(paths: &Paths, cache: &dyn ImageCache) -> Result<TransformReport, TransformError> {
    let sources = SourceSet::new(&paths.images.src)?.discover(&paths.root)?;
    let dest = paths.resolve(&paths.images.dest);

    let mut report = TransformReport::default();
    let mut failures = FileFailures::default();

    for source in &sources {
        let Some(format) = SourceFormat::from_path(&source.path) else {
            tracing::debug!("Skipping unsupported image {}", source.path.display());
            continue;
        };

        report.inputs += 1;
        let target = dest.join(&source.relative);
        match optimize_image(&source.path, format, &target, cache) {
            Ok(outputs) => outputs.into_iter().for_each(|o| report.wrote(o)),
            Err(e) => failures.record(e),
        }
    }

    failures.finish(report)
}

/// Write the optimized original and both derivatives for one image.
fn optimize_image(
    path: &Path,
    format: SourceFormat,
    target: &Path,
    cache: &dyn ImageCache,
) -> Result<Vec<PathBuf>, TransformError> {
    let input = std::fs::read(path).map_err(|e| TransformError::io(path, e))?;

    let original = match format {
        SourceFormat::Jpeg => cached(cache, "jpeg", &jpeg_params(), &input, || {
            optimize_jpeg(&input, path)
        })?,
        SourceFormat::Png => cached(cache, "png", &png_params(), &input, || {
            optimize_png(&input, path)
        })?,
    };
    let original = if original.len() < input.len() {
        original
    } else {
        input.clone()
    };

    let avif = cached(cache, "avif", &avif_params(), &input, || encode_avif(&input, path))?;
    let webp = cached(cache, "webp", "lossless", &input, || encode_webp(&input, path))?;

    tracing::debug!(
        "Optimized {} ({} -> {} bytes)",
        path.display(),
        input.len(),
        original.len()
    );

    let mut written = Vec::with_capacity(3);
    for (output, bytes) in [
        (target.to_path_buf(), original),
        (target.with_extension("avif"), avif),
        (target.with_extension("webp"), webp),
    ] {
        write_atomic(&output, &bytes)?;
        written.push(output);
    }
    Ok(written)
}

fn jpeg_params() -> String {
    format!("quality={};progressive=true", JPEG_QUALITY)
}

fn png_params() -> String {
    format!("level={}", PNG_OPTIMIZATION_LEVEL)
}

fn avif_params() -> String {
    format!("quality={};speed={}", AVIF_QUALITY, AVIF_SPEED)
}

/// Look up an encoded value, computing and storing it on a miss.
///
/// Cache write failures only cost a future recompute, so they are logged.
fn cached(
    cache: &dyn ImageCache,
    kind: &str,
    params: &str,
    input: &[u8],
    encode: impl FnOnce() -> Result<Vec<u8>, TransformError>,
) -> Result<Vec<u8>, TransformError> {
    let key = CacheKey::new(kind, params, input);
    if let Some(hit) = cache.get(&key) {
        return Ok(hit);
    }

    let value = encode()?;
    if let Err(e) = cache.put(&key, &value) {
        tracing::warn!("Failed to cache {} output: {}", kind, e);
    }
    Ok(value)
}

fn decode(input: &[u8], path: &Path) -> Result<DynamicImage, TransformError> {
    image::load_from_memory(input).map_err(|e| TransformError::compile(path, e.to_string()))
}

fn optimize_jpeg(input: &[u8], path: &Path) -> Result<Vec<u8>, TransformError> {
    let image = decode(input, path)?;
    let (width, height) = image.dimensions();
    let (Ok(width), Ok(height)) = (u16::try_from(width), u16::try_from(height)) else {
        return Err(TransformError::compile(path, "JPEG dimensions exceed 65535"));
    };
    let rgb = image.to_rgb8();

    let mut buf = Vec::new();
    let mut encoder = jpeg_encoder::Encoder::new(&mut buf, JPEG_QUALITY);
    encoder.set_progressive(true);
    encoder
        .encode(rgb.as_raw(), width, height, jpeg_encoder::ColorType::Rgb)
        .map_err(|e| TransformError::compile(path, e.to_string()))?;

    Ok(buf)
}

fn optimize_png(input: &[u8], path: &Path) -> Result<Vec<u8>, TransformError> {
    let options = oxipng::Options::from_preset(PNG_OPTIMIZATION_LEVEL);
    oxipng::optimize_from_memory(input, &options)
        .map_err(|e| TransformError::compile(path, e.to_string()))
}

fn encode_avif(input: &[u8], path: &Path) -> Result<Vec<u8>, TransformError> {
    let image = decode(input, path)?;
    let mut buf = Vec::new();
    let encoder = AvifEncoder::new_with_speed_quality(&mut buf, AVIF_SPEED, AVIF_QUALITY)
        .with_num_threads(Some(1));
    DynamicImage::ImageRgba8(image.to_rgba8())
        .write_with_encoder(encoder)
        .map_err(|e| TransformError::compile(path, e.to_string()))?;
    Ok(buf)
}

fn encode_webp(input: &[u8], path: &Path) -> Result<Vec<u8>, TransformError> {
    let image = decode(input, path)?;
    let mut buf = Vec::new();
    DynamicImage::ImageRgba8(image.to_rgba8())
        .write_with_encoder(WebPEncoder::new_lossless(&mut buf))
        .map_err(|e| TransformError::compile(path, e.to_string()))?;
    Ok(buf)
}
