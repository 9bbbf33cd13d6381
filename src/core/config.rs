//! Configuration for map rasterization and tile loading
//!
//! Every field has a default, so a JSON config file only needs to name the
//! values it changes. Presets cover the common trade-offs between output
//! resolution and network load.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::constants::{DEFAULT_MARKER_SCALE, DEFAULT_TILE_URL};
use crate::{MapError, Result};

/// Configuration for the tile loader
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TileLoaderConfig {
    /// Maximum concurrent tile downloads. Requests beyond it queue until a
    /// slot frees up. The default fits the whole coverage of a default-sized
    /// raster (at most 24 tiles) in one wave.
    pub max_concurrent: usize,
    /// Per-request timeout in milliseconds
    pub request_timeout_ms: u64,
    /// User-Agent sent with every tile request. Public tile servers reject
    /// requests without one.
    pub user_agent: String,
}

impl Default for TileLoaderConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 32,
            request_timeout_ms: 10_000,
            user_agent: format!("forensicmap/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl TileLoaderConfig {
    pub fn low_resource() -> Self {
        Self {
            max_concurrent: 4,
            request_timeout_ms: 20_000,
            ..Self::default()
        }
    }

    pub fn for_testing() -> Self {
        Self {
            max_concurrent: 4,
            request_timeout_ms: 500,
            ..Self::default()
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Configuration for a single map rasterization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RasterConfig {
    /// Output width in pixels
    pub width: u32,
    /// Output height in pixels
    pub height: u32,
    /// Fill shown wherever no tile was drawn
    pub background: [u8; 3],
    /// Pixels per meter for measurements without a geographic position
    pub marker_scale: f64,
    /// Tile URL template with `{z}`, `{x}` and `{y}` placeholders
    pub tile_url: String,
    pub loader: TileLoaderConfig,
}

impl Default for RasterConfig {
    fn default() -> Self {
        Self {
            width: 900,
            height: 500,
            background: [230, 230, 230],
            marker_scale: DEFAULT_MARKER_SCALE,
            tile_url: DEFAULT_TILE_URL.to_string(),
            loader: TileLoaderConfig::default(),
        }
    }
}

impl RasterConfig {
    pub fn low_resource() -> Self {
        Self {
            width: 600,
            height: 334,
            loader: TileLoaderConfig::low_resource(),
            ..Self::default()
        }
    }

    pub fn high_resolution() -> Self {
        Self {
            width: 1800,
            height: 1000,
            loader: TileLoaderConfig {
                max_concurrent: 64,
                ..TileLoaderConfig::default()
            },
            ..Self::default()
        }
    }

    pub fn for_testing() -> Self {
        Self {
            width: 360,
            height: 200,
            loader: TileLoaderConfig::for_testing(),
            ..Self::default()
        }
    }

    /// Loads a config from a JSON file; missing fields keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks values that would make every rasterization fail.
    pub fn validate(&self) -> Result<()> {
        if !self.marker_scale.is_finite() || self.marker_scale <= 0.0 {
            return Err(MapError::Render(format!(
                "marker scale must be positive, got {}",
                self.marker_scale
            )));
        }
        if self.loader.max_concurrent == 0 {
            return Err(MapError::Render(
                "loader.max_concurrent must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
