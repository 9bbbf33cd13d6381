use crate::core::constants::DEFAULT_TILE_URL;
use crate::core::geo::TileCoord;
use crate::{MapError, Result};

/// Trait representing anything that can produce tile URLs for a given coordinate.
pub trait TileSource: Send + Sync {
    /// Build a URL for the requested `coord`.
    fn url(&self, coord: TileCoord) -> String;
}

/// Tile source driven by a `{z}/{x}/{y}` URL template.
#[derive(Debug, Clone, PartialEq)]
pub struct UrlTemplateSource {
    template: String,
}

impl UrlTemplateSource {
    pub fn new(template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        for placeholder in ["{z}", "{x}", "{y}"] {
            if !template.contains(placeholder) {
                return Err(MapError::Tile(format!(
                    "tile URL template `{}` is missing {}",
                    template, placeholder
                )));
            }
        }
        Ok(Self { template })
    }

    /// Default OpenStreetMap standard tile layer.
    pub fn openstreetmap() -> Self {
        Self {
            template: DEFAULT_TILE_URL.to_string(),
        }
    }

    pub fn template(&self) -> &str {
        &self.template
    }
}

impl Default for UrlTemplateSource {
    fn default() -> Self {
        Self::openstreetmap()
    }
}

impl TileSource for UrlTemplateSource {
    fn url(&self, coord: TileCoord) -> String {
        self.template
            .replace("{z}", &coord.z.to_string())
            .replace("{x}", &coord.x.to_string())
            .replace("{y}", &coord.y.to_string())
    }
}
