//! Static map rasterization for reports.
//!
//! One call covers the view with tiles, fetches them all concurrently, waits
//! for every fetch to settle, composites the successful ones and then draws
//! the project's markers on top. Tile failures only leave background showing;
//! the call itself fails only when the view is unusable or no buffer can be
//! allocated.

use std::sync::Arc;

use crate::core::config::RasterConfig;
use crate::core::constants::{
    ASSET_COLOR, LABEL_COLOR, LABEL_GLYPH_SCALE, LABEL_OFFSET, MARKER_OUTLINE_COLOR,
    MARKER_OUTLINE_WIDTH, MEASUREMENT_COLOR, POINT_RADIUS, ZERO_POINT_COLOR, ZERO_POINT_RADIUS,
};
use crate::core::geo::{LatLng, Point};
use crate::core::viewport::{View, Viewport};
use crate::project::Project;
use crate::rendering::canvas::{MarkerStyle, PixelBuffer};
use crate::tiles::loader::{HttpTileFetcher, TileFetcher, TileLoader};
use crate::tiles::source::{TileSource, UrlTemplateSource};
use crate::Result;

/// Which legend entry a marker belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    ZeroPoint,
    Measurement,
    Asset,
}

impl MarkerKind {
    pub fn style(&self) -> MarkerStyle {
        let (fill, radius) = match self {
            Self::ZeroPoint => (ZERO_POINT_COLOR, ZERO_POINT_RADIUS),
            Self::Measurement => (MEASUREMENT_COLOR, POINT_RADIUS),
            Self::Asset => (ASSET_COLOR, POINT_RADIUS),
        };
        MarkerStyle {
            fill,
            outline: MARKER_OUTLINE_COLOR,
            outline_width: MARKER_OUTLINE_WIDTH,
            radius,
        }
    }
}

/// A marker resolved to buffer coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedMarker {
    pub kind: MarkerKind,
    pub label: String,
    pub position: Point,
}

/// Rendered map and what went into it.
#[derive(Debug, Clone)]
pub struct MapRaster {
    pub buffer: PixelBuffer,
    pub tiles_requested: usize,
    pub tiles_drawn: usize,
    pub markers: Vec<PlacedMarker>,
}

impl MapRaster {
    pub fn tiles_failed(&self) -> usize {
        self.tiles_requested - self.tiles_drawn
    }

    pub fn encode_png(&self) -> Result<Vec<u8>> {
        self.buffer.encode_png()
    }

    /// Size of the image when scaled to `content_width`, keeping its aspect ratio.
    pub fn placement(&self, content_width: f64) -> (f64, f64) {
        let height = content_width * self.buffer.height() as f64 / self.buffer.width() as f64;
        (content_width, height)
    }
}

pub struct TileRasterizer {
    config: RasterConfig,
    source: Box<dyn TileSource>,
    loader: TileLoader,
}

impl TileRasterizer {
    /// Rasterizer fetching from the configured URL template over HTTP.
    pub fn new(config: RasterConfig) -> Result<Self> {
        let fetcher = HttpTileFetcher::new(&config.loader)?;
        Self::with_fetcher(config, Arc::new(fetcher))
    }

    pub fn with_fetcher(config: RasterConfig, fetcher: Arc<dyn TileFetcher>) -> Result<Self> {
        config.validate()?;
        let source = UrlTemplateSource::new(config.tile_url.clone())?;
        Ok(Self::with_source(config, Box::new(source), fetcher))
    }

    pub fn with_source(config: RasterConfig, source: Box<dyn TileSource>, fetcher: Arc<dyn TileFetcher>) -> Self {
        let loader = TileLoader::new(fetcher, config.loader.clone());
        Self {
            config,
            source,
            loader,
        }
    }

    pub fn config(&self) -> &RasterConfig {
        &self.config
    }

    /// Renders `view` with the project's markers.
    pub async fn rasterize(&self, view: &View, project: &Project) -> Result<MapRaster> {
        let viewport = Viewport::new(*view, self.config.width, self.config.height)?;
        let mut buffer = PixelBuffer::new(self.config.width, self.config.height, self.config.background)?;

        let range = viewport.tile_range();
        let coords: Vec<_> = range.iter().collect();
        let tiles_requested = coords.len();
        log::debug!(
            "rasterizing {}x{} at zoom {:.2}: tiles x {}..={} y {}..={} z {}",
            self.config.width,
            self.config.height,
            view.zoom,
            range.start_x,
            range.end_x,
            range.start_y,
            range.end_y,
            range.z
        );

        // Every fetch settles before the first draw; the buffer has one writer.
        let outcomes = self.loader.load_all(self.source.as_ref(), coords).await;

        let tile_size = viewport.tile_size_px();
        let mut tiles_drawn = 0;
        for outcome in outcomes {
            let Ok(tile) = outcome.image else {
                continue;
            };
            buffer.draw_tile(&tile, viewport.tile_offset(&outcome.coord), tile_size)?;
            tiles_drawn += 1;
        }

        let markers = self.place_markers(&viewport, project);
        for marker in &markers {
            draw_marker(&mut buffer, marker);
        }

        log::info!(
            "rasterized map: {}/{} tiles, {} markers",
            tiles_drawn,
            tiles_requested,
            markers.len()
        );
        Ok(MapRaster {
            buffer,
            tiles_requested,
            tiles_drawn,
            markers,
        })
    }

    /// Resolves every marker in drawing order: zero point, measurements, assets.
    pub fn place_markers(&self, viewport: &Viewport, project: &Project) -> Vec<PlacedMarker> {
        let mut markers = Vec::new();

        if let Some(zero) = &project.zero_point {
            markers.push(PlacedMarker {
                kind: MarkerKind::ZeroPoint,
                label: "ZERO".to_string(),
                position: self.marker_position(viewport, Some(zero.lat_lng()), None),
            });
        }

        for m in project.measurements() {
            markers.push(PlacedMarker {
                kind: MarkerKind::Measurement,
                label: m.label.clone(),
                position: self.marker_position(
                    viewport,
                    m.position.map(|p| p.lat_lng()),
                    m.measurement.local_offset(),
                ),
            });
        }

        for a in project.assets() {
            markers.push(PlacedMarker {
                kind: MarkerKind::Asset,
                label: a.display_name().to_string(),
                position: self.marker_position(viewport, a.position.map(|p| p.lat_lng()), None),
            });
        }

        markers
    }

    /// Buffer position for an entity.
    ///
    /// Tries the geographic position, then the local offset in meters
    /// (screen y points down, local y points forward), then the buffer center.
    pub fn marker_position(&self, viewport: &Viewport, geo: Option<LatLng>, local: Option<(f64, f64)>) -> Point {
        if let Some(lat_lng) = geo {
            match viewport.lat_lng_to_pixel(&lat_lng) {
                Ok(px) => return px,
                Err(e) => log::warn!("marker position {:?} rejected: {}", lat_lng, e),
            }
        }

        let center = viewport.center_pixel();
        match local {
            Some((x, y)) => center.add(&Point::new(x, -y).multiply(self.config.marker_scale)),
            None => center,
        }
    }
}

fn draw_marker(buffer: &mut PixelBuffer, marker: &PlacedMarker) {
    let style = marker.kind.style();
    buffer.draw_marker(marker.position, &style);
    let label_at = marker.position.add(&Point::new(
        style.radius as f64 * 0.5 + LABEL_OFFSET.0,
        style.radius as f64 * 0.5 + LABEL_OFFSET.1,
    ));
    buffer.draw_label(label_at, &marker.label, LABEL_COLOR, LABEL_GLYPH_SCALE);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::{GeoPosition, Measurement, SequentialIds};
    use crate::rendering::canvas::encode_png;
    use crate::tiles::loader::MemoryTileFetcher;
    use chrono::Utc;
    use image::{Rgba, RgbaImage};

    fn project_with(points: impl FnOnce(&mut Project, &SequentialIds)) -> Project {
        let ids = SequentialIds::new("t");
        let mut project = Project::create("Test", &ids, Utc::now());
        points(&mut project, &ids);
        project
    }

    fn offline(config: RasterConfig) -> (TileRasterizer, Arc<MemoryTileFetcher>) {
        let fetcher = Arc::new(MemoryTileFetcher::new());
        let rasterizer = TileRasterizer::with_fetcher(config, fetcher.clone()).unwrap();
        (rasterizer, fetcher)
    }

    #[test]
    fn test_local_offset_fallback() {
        let (rasterizer, _) = offline(RasterConfig::for_testing());
        let viewport = Viewport::new(View::new(-58.8344, -27.469213, 16.0), 360, 200).unwrap();
        let project = project_with(|p, ids| {
            p.add_measurement("P1", Measurement::Baseline { x: 10.0, y: 5.0 }, None, ids, Utc::now())
                .unwrap();
        });

        let markers = rasterizer.place_markers(&viewport, &project);
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].position, Point::new(180.0 + 50.0, 100.0 - 25.0));
    }

    #[test]
    fn test_marker_order_and_fallbacks() {
        let (rasterizer, _) = offline(RasterConfig::for_testing());
        let view = View::new(-58.8344, -27.469213, 16.0);
        let viewport = Viewport::new(view, 360, 200).unwrap();
        let project = project_with(|p, ids| {
            p.add_asset("sedan", &view, ids, Utc::now()).unwrap();
            p.add_measurement("T", Measurement::Triangulation { dist_a: 3.0, dist_b: 4.0 }, None, ids, Utc::now())
                .unwrap();
            p.add_measurement(
                "Pole",
                Measurement::Baseline { x: 1.0, y: 1.0 },
                Some(GeoPosition::new(0.0, 90.0)),
                ids,
                Utc::now(),
            )
            .unwrap();
            p.set_zero_point(Some(GeoPosition::new(-58.8344, -27.469213)), Utc::now())
                .unwrap();
        });

        let markers = rasterizer.place_markers(&viewport, &project);
        let kinds: Vec<_> = markers.iter().map(|m| m.kind).collect();
        assert_eq!(
            kinds,
            vec![MarkerKind::ZeroPoint, MarkerKind::Measurement, MarkerKind::Measurement, MarkerKind::Asset]
        );
        let center = Point::new(180.0, 100.0);
        let close = |a: Point, b: Point| (a.x - b.x).abs() < 1e-6 && (a.y - b.y).abs() < 1e-6;
        // Zero point and asset sit on the view center
        assert!(close(markers[0].position, center));
        assert!(close(markers[3].position, center));
        assert_eq!(markers[3].label, "Generic Sedan");
        // Triangulation without a position falls back to the center
        assert_eq!(markers[1].position, center);
        // Unprojectable position falls back to the local offset
        assert_eq!(markers[2].position, Point::new(185.0, 95.0));
    }

    #[tokio::test]
    async fn test_all_tiles_failing_still_draws_markers() {
        let config = RasterConfig::for_testing();
        let background = config.background;
        let (rasterizer, fetcher) = offline(config);
        let view = View::new(-58.8344, -27.469213, 16.0);
        let project = project_with(|p, _| {
            p.set_zero_point(Some(GeoPosition::new(-58.8344, -27.469213)), Utc::now())
                .unwrap();
        });

        let raster = rasterizer.rasterize(&view, &project).await.unwrap();

        assert!(raster.tiles_requested > 0);
        assert_eq!(fetcher.request_count(), raster.tiles_requested);
        assert_eq!(raster.tiles_drawn, 0);
        assert_eq!(raster.tiles_failed(), raster.tiles_requested);
        assert_eq!(raster.buffer.pixel(180, 100), Some([255, 0, 0, 255]));
        let [r, g, b] = background;
        assert_eq!(raster.buffer.pixel(2, 2), Some([r, g, b, 255]));
    }

    #[tokio::test]
    async fn test_tiles_are_composited() {
        let mut fetcher = MemoryTileFetcher::new();
        let tile = encode_png(&RgbaImage::from_pixel(256, 256, Rgba([40, 80, 120, 255]))).unwrap();
        // Every tile the zoom-1 world has
        for x in 0..2 {
            for y in 0..2 {
                fetcher.insert(format!("mem://1/{}/{}", x, y), tile.clone());
            }
        }
        let config = RasterConfig {
            width: 300,
            height: 300,
            tile_url: "mem://{z}/{x}/{y}".to_string(),
            ..RasterConfig::for_testing()
        };
        let rasterizer = TileRasterizer::with_fetcher(config, Arc::new(fetcher)).unwrap();

        let raster = rasterizer
            .rasterize(&View::new(0.0, 0.0, 1.0), &project_with(|_, _| {}))
            .await
            .unwrap();

        // Columns 0..=2 (2 wraps to 0) by rows 0..=2; row 2 lies past the pole
        assert_eq!(raster.tiles_requested, 9);
        assert_eq!(raster.tiles_drawn, 6);
        assert_eq!(raster.tiles_failed(), 3);
        assert_eq!(raster.buffer.pixel(0, 0), Some([40, 80, 120, 255]));
        assert_eq!(raster.buffer.pixel(299, 299), Some([40, 80, 120, 255]));
        assert!(raster.markers.is_empty());
    }

    #[tokio::test]
    async fn test_unusable_buffer_is_an_error() {
        let config = RasterConfig {
            width: 0,
            ..RasterConfig::for_testing()
        };
        let (rasterizer, fetcher) = offline(config);
        let result = rasterizer
            .rasterize(&View::new(0.0, 0.0, 3.0), &project_with(|_, _| {}))
            .await;
        assert!(result.is_err());
        assert_eq!(fetcher.request_count(), 0);
    }

    #[test]
    fn test_placement_keeps_aspect_ratio() {
        let raster = MapRaster {
            buffer: PixelBuffer::new(900, 500, [0, 0, 0]).unwrap(),
            tiles_requested: 0,
            tiles_drawn: 0,
            markers: Vec::new(),
        };
        assert_eq!(raster.placement(180.0), (180.0, 100.0));
    }
}
