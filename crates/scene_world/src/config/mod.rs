//! Configuration system
//!
//! Settings are plain serde structs; the [`Config`] trait gives every one of
//! them TOML and RON file support keyed on the file extension.

use crate::foundation::math::Vec3;
use crate::scene::AABB;
use crate::spatial::{OctreeConfig, OctreeError};
pub use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration trait
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from file
    fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;

        match extension(path) {
            Some("toml") => Self::from_toml_str(&contents),
            Some("ron") => ron::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string())),
            _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        }
    }

    /// Save configuration to file
    fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let contents = match extension(path) {
            Some("toml") => {
                toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
            }
            Some("ron") => ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?,
            _ => return Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        };

        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Parse configuration from a TOML document
    fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

fn extension(path: &Path) -> Option<&str> {
    path.extension().and_then(|ext| ext.to_str())
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Values parsed but describe an unusable octree
    #[error("Invalid octree settings: {0}")]
    Invalid(#[from] OctreeError),
}

/// Octree settings as they appear in a config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OctreeSettings {
    /// Centre of the root volume
    pub center: Vec3,
    /// Half-size of the root volume along each axis
    pub extent: f32,
    /// Deepest level a node may subdivide to
    pub max_depth: u32,
    /// Internal nodes collapse once their subtree holds this many items or fewer
    pub min_items: usize,
    /// Leaves subdivide once they hold more than this many items
    pub max_items: usize,
}

impl Default for OctreeSettings {
    fn default() -> Self {
        Self {
            center: Vec3::zeros(),
            extent: 512.0,
            max_depth: 8,
            min_items: 4,
            max_items: 16,
        }
    }
}

impl OctreeSettings {
    /// Root bounds described by these settings
    pub fn bounds(&self) -> AABB {
        AABB::from_center_extents(self.center, Vec3::repeat(self.extent))
    }

    /// Validate and convert into the octree's runtime configuration
    pub fn to_octree_config(&self) -> Result<OctreeConfig, ConfigError> {
        let config = OctreeConfig {
            max_depth: self.max_depth,
            min_items: self.min_items,
            max_items: self.max_items,
        };
        config.validate(&self.bounds())?;
        Ok(config)
    }
}

/// Background loader settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Number of worker threads parsing payloads
    pub worker_threads: usize,
    /// Pending jobs accepted before `submit` blocks
    pub queue_capacity: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            worker_threads: 2,
            queue_capacity: 256,
        }
    }
}

/// Top-level scene configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Spatial index settings
    pub octree: OctreeSettings,
    /// Background loading settings
    pub loader: LoaderConfig,
}

impl Config for SceneConfig {}
