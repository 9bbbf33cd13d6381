//! Prelude module for common forensicmap types and traits
//!
//! This module re-exports the most commonly used types, traits, and functions
//! for easy importing with `use forensicmap::prelude::*;`

pub use crate::core::{
    config::{RasterConfig, TileLoaderConfig},
    geo::{LatLng, Point, TileCoord},
    viewport::{TileRange, View, Viewport},
};

pub use crate::project::{
    store::{FileProjectStore, FixedPathPicker, PathPicker, ProjectStore},
    Asset, GeoPosition, IdGenerator, Measurement, MeasurementPoint, Project, ProjectPoint,
    SequentialIds, UuidGenerator, ZeroPoint,
};

pub use crate::rendering::{
    canvas::PixelBuffer,
    rasterizer::{MapRaster, TileRasterizer},
};

pub use crate::report::{DrawOp, RecordingSink, ReportGenerator, ReportSink, ReportSummary};

pub use crate::tiles::{
    loader::{HttpTileFetcher, MemoryTileFetcher, TileFetcher, TileLoader},
    source::{TileSource, UrlTemplateSource},
};

pub use crate::{Error as MapError, Result};

pub use std::{sync::Arc, time::Duration};
