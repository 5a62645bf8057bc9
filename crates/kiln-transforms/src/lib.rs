//! Asset transformations for the kiln pipeline.
//!
//! Each transformation reads the files selected by one [`PathGroup`] and
//! writes derived files into that group's destination directory. Outputs are
//! written atomically, so a failed run leaves the previous output in place.

pub mod cache;
pub mod error;
pub mod fonts;
pub mod html;
pub mod images;
pub mod output;
pub mod paths;
pub mod scripts;
pub mod sources;
pub mod sprite;
pub mod styles;
pub mod woff2;

use std::fmt;

pub use cache::{CacheKey, DiskCache, ImageCache, MemoryCache};
pub use error::TransformError;
pub use output::TransformReport;
pub use paths::{DistGroup, PathGroup, Paths};
pub use sources::{SourceFile, SourceSet};

/// The six transformations, addressable by their task names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transform {
    Styles,
    Scripts,
    Html,
    Fonts,
    Sprite,
    Images,
}

impl Transform {
    pub const ALL: [Transform; 6] = [
        Transform::Images,
        Transform::Fonts,
        Transform::Sprite,
        Transform::Styles,
        Transform::Scripts,
        Transform::Html,
    ];

    /// Task name used on the command line.
    pub fn name(self) -> &'static str {
        match self {
            Transform::Styles => "styles",
            Transform::Scripts => "scripts",
            Transform::Html => "html",
            Transform::Fonts => "fonts",
            Transform::Sprite => "sprite",
            Transform::Images => "images",
        }
    }

    /// Run the transformation against a project layout.
    ///
    /// Only [`Transform::Images`] touches the cache.
    pub fn run(
        self,
        paths: &Paths,
        cache: &dyn ImageCache,
    ) -> Result<TransformReport, TransformError> {
        match self {
            Transform::Styles => styles::compile(paths),
            Transform::Scripts => scripts::bundle(paths),
            Transform::Html => html::assemble(paths),
            Transform::Fonts => fonts::convert(paths),
            Transform::Sprite => sprite::build(paths),
            Transform::Images => images::optimize(paths, cache),
        }
    }
}

impl fmt::Display for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
