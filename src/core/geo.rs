use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::core::constants::{MAX_TILE_ZOOM, TILE_SIZE};
use crate::{MapError, Result};

/// Represents a geographical coordinate with latitude and longitude
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    /// Creates a new LatLng coordinate
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Checks that the coordinate can be projected.
    ///
    /// Longitude is unbounded (it wraps), latitude must lie strictly inside
    /// (-90, 90) since the Mercator y coordinate diverges at the poles.
    pub fn validate(&self) -> Result<()> {
        if !self.lng.is_finite() {
            return Err(MapError::InvalidCoordinates(format!(
                "longitude {} is not finite",
                self.lng
            )));
        }
        if !self.lat.is_finite() || self.lat <= -90.0 || self.lat >= 90.0 {
            return Err(MapError::InvalidCoordinates(format!(
                "latitude {} is outside (-90, 90)",
                self.lat
            )));
        }
        Ok(())
    }

    /// Projects to world pixel space at `zoom` (which may be fractional).
    pub fn project(&self, zoom: f64) -> Result<Point> {
        self.validate()?;
        Ok(Point::new(project_x(self.lng, zoom), project_y(self.lat, zoom)?))
    }
}

impl Default for LatLng {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// Size of the whole world in pixels at `zoom`.
pub fn world_size(zoom: f64) -> f64 {
    TILE_SIZE as f64 * 2_f64.powf(zoom)
}

/// Folds a longitude into `[-180, 180)`.
pub fn wrap_lng(lng: f64) -> f64 {
    (lng + 180.0).rem_euclid(360.0) - 180.0
}

/// Web Mercator world pixel x for a longitude.
///
/// Linear in `lng`, so `lng` and `lng + 360` differ by exactly one world width.
pub fn project_x(lng: f64, zoom: f64) -> f64 {
    (lng + 180.0) / 360.0 * world_size(zoom)
}

/// Web Mercator world pixel y for a latitude.
///
/// Latitudes at or beyond the poles are rejected instead of clamped.
pub fn project_y(lat: f64, zoom: f64) -> Result<f64> {
    if !lat.is_finite() || lat <= -90.0 || lat >= 90.0 {
        return Err(MapError::InvalidCoordinates(format!(
            "latitude {} is outside (-90, 90)",
            lat
        )));
    }
    let phi = lat.to_radians();
    let merc = (phi.tan() + 1.0 / phi.cos()).ln();
    Ok((1.0 - merc / PI) / 2.0 * world_size(zoom))
}

/// Represents a point in screen or projected coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn add(&self, other: &Point) -> Point {
        Point::new(self.x + other.x, self.y + other.y)
    }

    pub fn subtract(&self, other: &Point) -> Point {
        Point::new(self.x - other.x, self.y - other.y)
    }

    pub fn multiply(&self, scalar: f64) -> Point {
        Point::new(self.x * scalar, self.y * scalar)
    }
}

impl Default for Point {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// Represents a tile coordinate in the slippy map tile system.
///
/// `x` and `y` are signed: a coverage range may step past the antimeridian
/// (`x = -1` or `x = 2^z`) or past the poles. [`TileCoord::wrapped`] folds `x`
/// back into the pyramid; `y` is left alone. Zoom is capped at
/// [`MAX_TILE_ZOOM`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileCoord {
    pub z: u8,
    pub x: i64,
    pub y: i64,
}

impl TileCoord {
    pub fn new(x: i64, y: i64, z: u8) -> Self {
        Self {
            z: z.min(MAX_TILE_ZOOM),
            x,
            y,
        }
    }

    /// Number of tiles along one axis at this zoom.
    pub fn tiles_per_axis(&self) -> i64 {
        1_i64 << self.z.min(MAX_TILE_ZOOM)
    }

    /// Tile enclosing a coordinate at an integer zoom level.
    pub fn from_lat_lng(lat_lng: &LatLng, zoom: u8) -> Result<Self> {
        if zoom > MAX_TILE_ZOOM {
            return Err(MapError::InvalidCoordinates(format!(
                "tile zoom {} exceeds {}",
                zoom, MAX_TILE_ZOOM
            )));
        }
        let px = lat_lng.project(zoom as f64)?;
        let size = TILE_SIZE as f64;
        Ok(Self::new(
            (px.x / size).floor() as i64,
            (px.y / size).floor() as i64,
            zoom,
        ))
    }

    /// Same tile with `x` wrapped modulo `2^z`.
    pub fn wrapped(&self) -> Self {
        Self::new(self.x.rem_euclid(self.tiles_per_axis()), self.y, self.z)
    }

    /// Checks if the tile exists in the pyramid for its zoom level
    pub fn is_valid(&self) -> bool {
        let max_coord = self.tiles_per_axis();
        (0..max_coord).contains(&self.x) && (0..max_coord).contains(&self.y)
    }
}
