//! # forensicmap
//!
//! Scene mapping for forensic and accident reports.
//!
//! A [`Project`] records an optional zero point, local measurements and
//! placed assets. The [`TileRasterizer`] turns a project plus a [`View`]
//! into a static map image by projecting into Web Mercator world pixels,
//! fetching the covering tiles concurrently and overlaying markers. The
//! [`ReportGenerator`] lays that image out together with the point list and
//! hands the drawing primitives to a [`ReportSink`].

pub mod core;
pub mod project;
pub mod rendering;
pub mod report;
pub mod tiles;
pub mod prelude;
pub use crate::core::constants;

// Re-export public API
pub use core::{
    config::{RasterConfig, TileLoaderConfig},
    geo::{LatLng, Point, TileCoord},
    viewport::{TileRange, View, Viewport},
};

pub use project::{
    store::{FileProjectStore, FixedPathPicker, PathPicker, ProjectStore},
    Asset, GeoPosition, IdGenerator, Measurement, MeasurementMode, MeasurementPoint, Project,
    ProjectPoint, SequentialIds, UuidGenerator, ZeroPoint,
};

pub use rendering::{
    canvas::PixelBuffer,
    rasterizer::{MapRaster, TileRasterizer},
};

pub use report::{DrawOp, RecordingSink, ReportGenerator, ReportSink, ReportSummary};

pub use tiles::{HttpTileFetcher, MemoryTileFetcher, TileFetcher, TileLoader, TileSource, UrlTemplateSource};

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, MapError>;

/// Common error types
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Render error: {0}")]
    Render(String),

    #[error("Invalid coordinates: {0}")]
    InvalidCoordinates(String),

    #[error("Invalid project: {0}")]
    InvalidProject(String),

    #[error("Tile error: {0}")]
    Tile(String),

    #[error("Report error: {0}")]
    Report(String),
}

/// Error type alias for convenience
pub type Error = MapError;
