use crate::core::constants::{MAX_ZOOM, TILE_SIZE};
use crate::core::geo::{wrap_lng, LatLng, Point, TileCoord};
use crate::{MapError, Result};
use serde::{Deserialize, Serialize};

/// Map center and scale to render. Zoom may be fractional.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct View {
    pub longitude: f64,
    pub latitude: f64,
    pub zoom: f64,
}

impl View {
    pub fn new(longitude: f64, latitude: f64, zoom: f64) -> Self {
        Self {
            longitude,
            latitude,
            zoom,
        }
    }

    /// Builds a view from a project's `[longitude, latitude, zoom]` triple.
    pub fn from_map_center(center: [f64; 3]) -> Self {
        Self::new(center[0], center[1], center[2])
    }

    pub fn to_map_center(&self) -> [f64; 3] {
        [self.longitude, self.latitude, self.zoom]
    }

    pub fn center(&self) -> LatLng {
        LatLng::new(self.latitude, self.longitude)
    }

    /// Rejects views that cannot be rendered: negative or oversized zoom, or
    /// a center outside the projectable latitude range.
    pub fn validate(&self) -> Result<()> {
        if !self.zoom.is_finite() || self.zoom < 0.0 || self.zoom > MAX_ZOOM {
            return Err(MapError::InvalidCoordinates(format!(
                "zoom {} is outside [0, {}]",
                self.zoom, MAX_ZOOM
            )));
        }
        self.center().validate()
    }

    /// Integer zoom used for tile addressing.
    pub fn tile_zoom(&self) -> u8 {
        self.zoom.floor() as u8
    }
}

/// Inclusive range of tile indices at a single zoom level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRange {
    pub z: u8,
    pub start_x: i64,
    pub end_x: i64,
    pub start_y: i64,
    pub end_y: i64,
}

impl TileRange {
    pub fn contains(&self, coord: &TileCoord) -> bool {
        coord.z == self.z
            && (self.start_x..=self.end_x).contains(&coord.x)
            && (self.start_y..=self.end_y).contains(&coord.y)
    }

    pub fn len(&self) -> usize {
        let w = (self.end_x - self.start_x + 1).max(0) as usize;
        let h = (self.end_y - self.start_y + 1).max(0) as usize;
        w * h
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Row-major iteration over the unwrapped coordinates.
    pub fn iter(&self) -> impl Iterator<Item = TileCoord> + '_ {
        (self.start_y..=self.end_y)
            .flat_map(move |y| (self.start_x..=self.end_x).map(move |x| TileCoord::new(x, y, self.z)))
    }
}

/// A view rendered into a fixed-size pixel buffer.
///
/// All pixel math goes through world pixel space at the view's (possibly
/// fractional) zoom; the viewport origin is the world pixel that lands on the
/// buffer's top-left corner.
#[derive(Debug, Clone, PartialEq)]
pub struct Viewport {
    pub view: View,
    /// The size of the viewport in pixels
    pub size: Point,
    world_center: Point,
}

impl Viewport {
    /// The view's longitude is folded into `[-180, 180)`.
    pub fn new(mut view: View, width: u32, height: u32) -> Result<Self> {
        view.validate()?;
        view.longitude = wrap_lng(view.longitude);
        let world_center = view.center().project(view.zoom)?;
        Ok(Self {
            view,
            size: Point::new(width as f64, height as f64),
            world_center,
        })
    }

    /// World pixel coordinate of the view center.
    pub fn world_center(&self) -> Point {
        self.world_center
    }

    /// World pixel coordinate of the buffer's top-left corner.
    pub fn pixel_origin(&self) -> Point {
        self.world_center.subtract(&self.size.multiply(0.5))
    }

    /// Buffer pixel coordinate of the view center.
    pub fn center_pixel(&self) -> Point {
        self.size.multiply(0.5)
    }

    pub fn tile_zoom(&self) -> u8 {
        self.view.tile_zoom()
    }

    /// Scale between the fractional zoom and the tile zoom, in `[1, 2)`.
    pub fn tile_scale(&self) -> f64 {
        2_f64.powf(self.view.zoom - self.tile_zoom() as f64)
    }

    /// Rendered edge length of one tile in buffer pixels.
    pub fn tile_size_px(&self) -> f64 {
        TILE_SIZE as f64 * self.tile_scale()
    }

    /// Tiles overlapping the buffer.
    ///
    /// The left/top edge is floored and the right/bottom edge takes
    /// `floor(..) + 1`, so fractional boundaries always get one tile of slack.
    pub fn tile_range(&self) -> TileRange {
        let origin = self.pixel_origin();
        let ts = self.tile_size_px();
        TileRange {
            z: self.tile_zoom(),
            start_x: (origin.x / ts).floor() as i64,
            end_x: ((origin.x + self.size.x) / ts).floor() as i64 + 1,
            start_y: (origin.y / ts).floor() as i64,
            end_y: ((origin.y + self.size.y) / ts).floor() as i64 + 1,
        }
    }

    /// Buffer position of an (unwrapped) tile's top-left corner.
    pub fn tile_offset(&self, coord: &TileCoord) -> Point {
        let ts = self.tile_size_px();
        Point::new(coord.x as f64 * ts, coord.y as f64 * ts).subtract(&self.pixel_origin())
    }

    /// Converts a geographical coordinate to buffer pixel coordinates.
    ///
    /// The longitude is taken on the copy of the world nearest the view
    /// center.
    pub fn lat_lng_to_pixel(&self, lat_lng: &LatLng) -> Result<Point> {
        lat_lng.validate()?;
        let lng = self.view.longitude + wrap_lng(lat_lng.lng - self.view.longitude);
        Ok(LatLng::new(lat_lng.lat, lng)
            .project(self.view.zoom)?
            .subtract(&self.pixel_origin()))
    }
}
