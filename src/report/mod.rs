//! Report export.
//!
//! The generator lays out a single report as an ordered list of drawing
//! primitives in millimeters and hands them to a [`ReportSink`]. The sink
//! owns the document format; nothing reaches disk before
//! [`ReportSink::finish`].

use chrono::NaiveDate;

use crate::core::constants::{
    CONTENT_WIDTH_MM, LINE_SPACING_MM, MAP_TOP_MM, PAGE_HEIGHT_MM, PAGE_MARGIN_MM,
};
use crate::core::viewport::View;
use crate::project::{Measurement, Project, ProjectPoint};
use crate::rendering::rasterizer::{MapRaster, TileRasterizer};
use crate::Result;

const TITLE_SIZE: f32 = 20.0;
const BODY_SIZE: f32 = 12.0;
const PLACEHOLDER_SIZE: f32 = 10.0;
const PLACEHOLDER_FILL: [u8; 3] = [235, 235, 235];
const TITLE_Y_MM: f64 = 10.0;
const DATE_Y_MM: f64 = 20.0;
/// Gap between the map (or placeholder) and the point list heading.
const HEADING_GAP_MM: f64 = 10.0;

/// One drawing primitive, positioned in millimeters from the page's top-left.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Text {
        x: f64,
        y: f64,
        size: f32,
        text: String,
    },
    FilledRect {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        color: [u8; 3],
    },
    Image {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        png: Vec<u8>,
    },
    NewPage,
}

/// Receives a report's primitives in order, then writes the document.
pub trait ReportSink {
    fn draw(&mut self, op: DrawOp) -> Result<()>;

    /// Writes the document as `file_name`.
    fn finish(&mut self, file_name: &str) -> Result<()>;
}

/// Keeps every primitive in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub ops: Vec<DrawOp>,
    pub file_name: Option<String>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn texts(&self) -> Vec<&str> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn images(&self) -> Vec<&[u8]> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Image { png, .. } => Some(png.as_slice()),
                _ => None,
            })
            .collect()
    }

    pub fn is_finished(&self) -> bool {
        self.file_name.is_some()
    }
}

impl ReportSink for RecordingSink {
    fn draw(&mut self, op: DrawOp) -> Result<()> {
        self.ops.push(op);
        Ok(())
    }

    fn finish(&mut self, file_name: &str) -> Result<()> {
        self.file_name = Some(file_name.to_string());
        Ok(())
    }
}

/// Outcome of an export.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportSummary {
    pub file_name: String,
    /// `false` when the placeholder panel stands in for the map
    pub map_rendered: bool,
    pub tiles_drawn: usize,
    pub tiles_failed: usize,
    /// Point list lines in report order
    pub lines: Vec<String>,
}

pub struct ReportGenerator {
    rasterizer: TileRasterizer,
}

impl ReportGenerator {
    pub fn new(rasterizer: TileRasterizer) -> Self {
        Self { rasterizer }
    }

    pub fn rasterizer(&self) -> &TileRasterizer {
        &self.rasterizer
    }

    /// Exports `project` rendered at `view`, dated `today`.
    ///
    /// A map that cannot be rendered is replaced by the placeholder panel;
    /// only sink failures are returned as errors.
    pub async fn export(
        &self,
        project: &Project,
        view: &View,
        today: NaiveDate,
        sink: &mut dyn ReportSink,
    ) -> Result<ReportSummary> {
        let raster = match self.render_map(view, project).await {
            Ok(rendered) => Some(rendered),
            Err(e) => {
                log::error!("map rendering failed for project {}: {}", project.id, e);
                None
            }
        };

        let mut layout = Layout::default();
        layout.text(PAGE_MARGIN_MM, TITLE_Y_MM, TITLE_SIZE, format!("ForensicMap Report: {}", project.name));
        layout.text(PAGE_MARGIN_MM, DATE_Y_MM, BODY_SIZE, format!("Date: {}", today.format("%Y-%m-%d")));

        let map_bottom = match &raster {
            Some((raster, png)) => {
                let (width, height) = raster.placement(CONTENT_WIDTH_MM);
                layout.push(DrawOp::Image {
                    x: PAGE_MARGIN_MM,
                    y: MAP_TOP_MM,
                    width,
                    height,
                    png: png.clone(),
                });
                MAP_TOP_MM + height
            }
            None => layout.placeholder(project, view, self.placeholder_height()),
        };

        let lines: Vec<String> = project
            .points
            .iter()
            .enumerate()
            .map(|(i, point)| point_line(i + 1, point))
            .collect();

        let mut y = map_bottom + HEADING_GAP_MM;
        layout.text(PAGE_MARGIN_MM, y, BODY_SIZE, "Measurements & Assets:".to_string());
        y += HEADING_GAP_MM;
        for line in &lines {
            if y > PAGE_HEIGHT_MM - PAGE_MARGIN_MM {
                layout.push(DrawOp::NewPage);
                y = PAGE_MARGIN_MM + LINE_SPACING_MM;
            }
            layout.text(PAGE_MARGIN_MM, y, BODY_SIZE, line.clone());
            y += LINE_SPACING_MM;
        }

        let file_name = report_file_name(project);
        for op in layout.ops {
            sink.draw(op)?;
        }
        sink.finish(&file_name)?;
        log::info!("exported report {} ({} points)", file_name, lines.len());

        let (tiles_drawn, tiles_failed) = raster
            .as_ref()
            .map(|(r, _)| (r.tiles_drawn, r.tiles_failed()))
            .unwrap_or((0, 0));
        Ok(ReportSummary {
            file_name,
            map_rendered: raster.is_some(),
            tiles_drawn,
            tiles_failed,
            lines,
        })
    }

    async fn render_map(&self, view: &View, project: &Project) -> Result<(MapRaster, Vec<u8>)> {
        let raster = self.rasterizer.rasterize(view, project).await?;
        let png = raster.encode_png()?;
        Ok((raster, png))
    }

    /// Height the map would have taken at the configured aspect ratio.
    fn placeholder_height(&self) -> f64 {
        let config = self.rasterizer.config();
        if config.width == 0 {
            return CONTENT_WIDTH_MM / 1.8;
        }
        CONTENT_WIDTH_MM * config.height as f64 / config.width as f64
    }
}

#[derive(Default)]
struct Layout {
    ops: Vec<DrawOp>,
}

impl Layout {
    fn push(&mut self, op: DrawOp) {
        self.ops.push(op);
    }

    fn text(&mut self, x: f64, y: f64, size: f32, text: String) {
        self.ops.push(DrawOp::Text { x, y, size, text });
    }

    /// Draws the placeholder panel and returns its bottom edge.
    fn placeholder(&mut self, project: &Project, view: &View, height: f64) -> f64 {
        self.push(DrawOp::FilledRect {
            x: PAGE_MARGIN_MM,
            y: MAP_TOP_MM,
            width: CONTENT_WIDTH_MM,
            height,
            color: PLACEHOLDER_FILL,
        });
        let mut y = MAP_TOP_MM + LINE_SPACING_MM;
        for line in placeholder_lines(project, view) {
            self.text(PAGE_MARGIN_MM + 5.0, y, PLACEHOLDER_SIZE, line);
            y += LINE_SPACING_MM;
        }
        MAP_TOP_MM + height.max(y - MAP_TOP_MM)
    }
}

/// `<name>_report.pdf`
pub fn report_file_name(project: &Project) -> String {
    format!("{}_report.pdf", project.name)
}

/// Report line for the point at 1-based `index`.
pub fn point_line(index: usize, point: &ProjectPoint) -> String {
    match point {
        ProjectPoint::Measurement(m) => match m.measurement {
            Measurement::Baseline { x, y } => {
                format!("{}. {} - baseline: X={}m, Y={}m", index, m.label, x, y)
            }
            Measurement::Triangulation { dist_a, dist_b } => {
                format!("{}. {} - triangulation: A={}m, B={}m", index, m.label, dist_a, dist_b)
            }
        },
        ProjectPoint::Asset(a) => format!("{}. Asset: {}", index, a.asset_type),
    }
}

/// Text shown in place of the map.
pub fn placeholder_lines(project: &Project, view: &View) -> Vec<String> {
    let mut lines = vec![
        "Map image unavailable".to_string(),
        format!("Center: {:.6}, {:.6}", view.latitude, view.longitude),
        format!("Zoom: {:.2}", view.zoom),
    ];
    lines.push(match &project.zero_point {
        Some(zero) => format!("Zero Point: {:.6}, {:.6}", zero.latitude, zero.longitude),
        None => "Zero Point: not set".to_string(),
    });
    lines.push(format!("Points: {}", project.points.len()));
    lines
}
