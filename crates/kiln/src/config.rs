//! Configuration file (kiln.toml).

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use kiln_pipeline::Project;
use kiln_server::DevServerConfig;
use kiln_transforms::{DiskCache, Paths};
use serde::Deserialize;

/// Configuration file structure.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    #[serde(default)]
    pub paths: Paths,
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub cache: CacheSettings,
}

#[derive(Debug, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_open")]
    pub open: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            open: default_open(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct CacheSettings {
    /// Image cache directory; the user cache dir when unset
    pub dir: Option<PathBuf>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    3000
}
fn default_open() -> bool {
    true
}

/// Load configuration from `path` if it exists.
/// Returns an error if the config file exists but is malformed.
pub fn load_config(path: &Path) -> Result<ConfigFile> {
    if path.exists() {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: ConfigFile = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        tracing::info!("Loaded config from {}", path.display());
        return Ok(config);
    }
    tracing::debug!("No {} found, using defaults", path.display());
    Ok(ConfigFile::default())
}

impl ConfigFile {
    /// Assemble the shared task context, applying command-line overrides.
    pub fn into_project(self, port: Option<u16>, no_open: bool) -> Project {
        let cache_dir = self.cache.dir.unwrap_or_else(DiskCache::default_dir);
        tracing::debug!("Image cache at {}", cache_dir.display());

        let server = DevServerConfig {
            host: self.server.host,
            port: port.unwrap_or(self.server.port),
            open: self.server.open && !no_open,
            ..DevServerConfig::default()
        };

        Project::new(self.paths, Arc::new(DiskCache::new(cache_dir)), server)
    }
}
