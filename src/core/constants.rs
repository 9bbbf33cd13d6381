//! Core constants for tile math, marker rendering and report layout.
//! Keeping them in a single place makes it easier to tweak engine-wide magic numbers.

/// Default square tile size in pixels.
pub const TILE_SIZE: u32 = 256;

/// Highest zoom a view may request. Keeps `2^z` tile indices well inside `i64`.
pub const MAX_ZOOM: f64 = 24.0;

/// Highest integer zoom a tile coordinate may address.
pub const MAX_TILE_ZOOM: u8 = 24;

/// Default tile URL template (OpenStreetMap standard layer).
pub const DEFAULT_TILE_URL: &str = "https://tile.openstreetmap.org/{z}/{x}/{y}.png";

/// Default map center for new projects as `[longitude, latitude, zoom]` (Corrientes, AR).
pub const DEFAULT_MAP_CENTER: [f64; 3] = [-58.8344, -27.469213, 16.0];

/// Pixels per meter used when a measurement only has local coordinates.
pub const DEFAULT_MARKER_SCALE: f64 = 5.0;

/// Marker fill colors (RGB).
pub const ZERO_POINT_COLOR: [u8; 3] = [255, 0, 0];
pub const MEASUREMENT_COLOR: [u8; 3] = [0, 150, 255];
pub const ASSET_COLOR: [u8; 3] = [0, 255, 0];

/// Outline drawn around every marker.
pub const MARKER_OUTLINE_COLOR: [u8; 3] = [255, 255, 255];
pub const MARKER_OUTLINE_WIDTH: f32 = 2.0;

/// Marker radii in pixels.
pub const ZERO_POINT_RADIUS: f32 = 15.0;
pub const POINT_RADIUS: f32 = 12.0;

/// Label text color and offset from the marker center (lower-right).
pub const LABEL_COLOR: [u8; 3] = [20, 20, 20];
pub const LABEL_OFFSET: (f64, f64) = (8.0, 8.0);

/// Integer scale applied to the 5x7 label glyphs.
pub const LABEL_GLYPH_SCALE: u32 = 2;

/// Report page geometry in millimeters (A4 portrait).
pub const PAGE_HEIGHT_MM: f64 = 297.0;
pub const PAGE_MARGIN_MM: f64 = 10.0;

/// Width of the content area the map image is scaled to.
pub const CONTENT_WIDTH_MM: f64 = 180.0;

/// Top edge of the map image on the first page.
pub const MAP_TOP_MM: f64 = 30.0;

/// Vertical spacing between point lines in the report.
pub const LINE_SPACING_MM: f64 = 7.0;
