pub mod canvas;
pub mod glyphs;
pub mod rasterizer;

pub use canvas::{encode_png, MarkerStyle, PixelBuffer};
pub use rasterizer::{MapRaster, MarkerKind, PlacedMarker, TileRasterizer};
