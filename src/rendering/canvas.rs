//! RGBA pixel buffer that map tiles and markers are drawn into.
//!
//! Drawing goes through tiny-skia; decoding and encoding go through `image`.

use std::io::Cursor;

use image::RgbaImage;
use tiny_skia::{
    Color, FillRule, FilterQuality, IntSize, Paint, PathBuilder, Pixmap, PixmapPaint, Rect,
    Stroke, Transform,
};

use super::glyphs::{self, GLYPH_ADVANCE, GLYPH_HEIGHT, GLYPH_WIDTH};
use crate::core::constants::TILE_SIZE;
use crate::core::geo::Point;
use crate::{MapError, Result};

/// Largest edge length a buffer may have.
pub const MAX_BUFFER_DIMENSION: u32 = 16_384;

/// Fill and outline of a circular marker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkerStyle {
    pub fill: [u8; 3],
    pub outline: [u8; 3],
    pub outline_width: f32,
    pub radius: f32,
}

/// Fixed-size raster canvas owned by a single rasterization.
#[derive(Debug, Clone)]
pub struct PixelBuffer {
    pixmap: Pixmap,
}

impl PixelBuffer {
    /// Allocates a buffer filled with `background`.
    ///
    /// Fails for empty or oversized dimensions; callers treat that as the
    /// drawing surface being unavailable.
    pub fn new(width: u32, height: u32, background: [u8; 3]) -> Result<Self> {
        if width > MAX_BUFFER_DIMENSION || height > MAX_BUFFER_DIMENSION {
            return Err(MapError::Render(format!(
                "buffer {}x{} exceeds {} px",
                width, height, MAX_BUFFER_DIMENSION
            )));
        }
        let mut pixmap = Pixmap::new(width, height).ok_or_else(|| {
            MapError::Render(format!("cannot allocate a {}x{} buffer", width, height))
        })?;
        let [r, g, b] = background;
        pixmap.fill(Color::from_rgba8(r, g, b, 255));
        Ok(Self { pixmap })
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    pub fn center(&self) -> Point {
        Point::new(self.width() as f64 / 2.0, self.height() as f64 / 2.0)
    }

    /// Straight-alpha RGBA value at `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        // Pixmap::pixel only bounds-checks the flat index.
        if x >= self.width() || y >= self.height() {
            return None;
        }
        let c = self.pixmap.pixel(x, y)?.demultiply();
        Some([c.red(), c.green(), c.blue(), c.alpha()])
    }

    /// Draws a tile with its top-left corner at `origin`, scaled to `size` px.
    ///
    /// Edges are snapped to whole pixels so neighbouring tiles abut without
    /// seams.
    pub fn draw_tile(&mut self, tile: &RgbaImage, origin: Point, size: f64) -> Result<()> {
        let tile = to_pixmap(tile)?;
        let x0 = origin.x.round();
        let y0 = origin.y.round();
        let sx = ((origin.x + size).round() - x0) / tile.width() as f64;
        let sy = ((origin.y + size).round() - y0) / tile.height() as f64;

        let quality = if (size - TILE_SIZE as f64).abs() < f64::EPSILON {
            FilterQuality::Nearest
        } else {
            FilterQuality::Bilinear
        };
        let paint = PixmapPaint {
            quality,
            ..PixmapPaint::default()
        };
        let transform = Transform::from_row(sx as f32, 0.0, 0.0, sy as f32, x0 as f32, y0 as f32);
        self.pixmap.draw_pixmap(0, 0, tile.as_ref(), &paint, transform, None);
        Ok(())
    }

    /// Filled circle with an outline, centered at `at`.
    pub fn draw_marker(&mut self, at: Point, style: &MarkerStyle) {
        let Some(path) = PathBuilder::from_circle(at.x as f32, at.y as f32, style.radius) else {
            return;
        };

        let mut paint = Paint::default();
        paint.anti_alias = true;
        let [r, g, b] = style.fill;
        paint.set_color_rgba8(r, g, b, 255);
        self.pixmap
            .fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);

        if style.outline_width > 0.0 {
            let [r, g, b] = style.outline;
            paint.set_color_rgba8(r, g, b, 255);
            let stroke = Stroke {
                width: style.outline_width,
                ..Stroke::default()
            };
            self.pixmap
                .stroke_path(&path, &paint, &stroke, Transform::identity(), None);
        }
    }

    /// Draws `text` with its top-left corner at `at` on a translucent white
    /// backing box. Characters without a glyph advance as blanks.
    pub fn draw_label(&mut self, at: Point, text: &str, color: [u8; 3], scale: u32) {
        if text.is_empty() {
            return;
        }
        let scale = scale.max(1) as f32;
        let x0 = at.x.round() as f32;
        let y0 = at.y.round() as f32;
        let chars = text.chars().count() as f32;

        let mut paint = Paint::default();
        paint.anti_alias = false;
        paint.set_color_rgba8(255, 255, 255, 200);
        if let Some(rect) = Rect::from_xywh(
            x0 - scale,
            y0 - scale,
            (chars * GLYPH_ADVANCE as f32 + 1.0) * scale,
            (GLYPH_HEIGHT as f32 + 2.0) * scale,
        ) {
            self.pixmap.fill_rect(rect, &paint, Transform::identity(), None);
        }

        let [r, g, b] = color;
        paint.set_color_rgba8(r, g, b, 255);
        for (i, ch) in text.chars().enumerate() {
            let Some(rows) = glyphs::glyph(ch) else {
                continue;
            };
            let gx = x0 + (i as u32 * GLYPH_ADVANCE) as f32 * scale;
            for (row, pattern) in rows.iter().enumerate() {
                for col in 0..GLYPH_WIDTH {
                    if (pattern >> (GLYPH_WIDTH - 1 - col)) & 1 == 0 {
                        continue;
                    }
                    if let Some(rect) = Rect::from_xywh(
                        gx + col as f32 * scale,
                        y0 + row as f32 * scale,
                        scale,
                        scale,
                    ) {
                        self.pixmap.fill_rect(rect, &paint, Transform::identity(), None);
                    }
                }
            }
        }
    }

    /// Copies the buffer out as a straight-alpha image.
    pub fn to_image(&self) -> Result<RgbaImage> {
        let data = self
            .pixmap
            .pixels()
            .iter()
            .flat_map(|p| {
                let c = p.demultiply();
                [c.red(), c.green(), c.blue(), c.alpha()]
            })
            .collect();
        RgbaImage::from_raw(self.width(), self.height(), data)
            .ok_or_else(|| MapError::Render("pixel data does not match buffer size".to_string()))
    }

    pub fn encode_png(&self) -> Result<Vec<u8>> {
        encode_png(&self.to_image()?)
    }
}

/// Encodes an image as PNG bytes.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), image::ImageOutputFormat::Png)?;
    Ok(bytes)
}

/// Converts a straight-alpha image into a premultiplied pixmap.
fn to_pixmap(image: &RgbaImage) -> Result<Pixmap> {
    let size = IntSize::from_wh(image.width(), image.height())
        .ok_or_else(|| MapError::Render("tile image is empty".to_string()))?;
    let data = image
        .pixels()
        .flat_map(|p| {
            let [r, g, b, a] = p.0;
            let premul = |c: u8| ((c as u16 * a as u16 + 127) / 255) as u8;
            [premul(r), premul(g), premul(b), a]
        })
        .collect();
    Pixmap::from_vec(data, size)
        .ok_or_else(|| MapError::Render("tile image has an invalid size".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    const GRAY: [u8; 3] = [230, 230, 230];

    #[test]
    fn test_unavailable_buffers() {
        assert!(PixelBuffer::new(0, 100, GRAY).is_err());
        assert!(PixelBuffer::new(100, 0, GRAY).is_err());
        assert!(PixelBuffer::new(MAX_BUFFER_DIMENSION + 1, 10, GRAY).is_err());
    }

    #[test]
    fn test_background_fill() {
        let buffer = PixelBuffer::new(4, 3, GRAY).unwrap();
        assert_eq!(buffer.pixel(3, 2), Some([230, 230, 230, 255]));
        assert_eq!(buffer.pixel(4, 0), None);
        assert_eq!(buffer.pixel(0, 3), None);
        assert_eq!(buffer.pixel(7, 1), None);
        assert_eq!(buffer.center(), Point::new(2.0, 1.5));
    }

    #[test]
    fn test_draw_tile_at_offset() {
        let mut buffer = PixelBuffer::new(512, 512, GRAY).unwrap();
        let tile = RgbaImage::from_pixel(256, 256, Rgba([10, 200, 30, 255]));
        buffer.draw_tile(&tile, Point::new(100.0, -50.0), 256.0).unwrap();

        assert_eq!(buffer.pixel(100, 0), Some([10, 200, 30, 255]));
        assert_eq!(buffer.pixel(355, 205), Some([10, 200, 30, 255]));
        assert_eq!(buffer.pixel(99, 10), Some([230, 230, 230, 255]));
        assert_eq!(buffer.pixel(356, 10), Some([230, 230, 230, 255]));
        assert_eq!(buffer.pixel(200, 206), Some([230, 230, 230, 255]));
    }

    #[test]
    fn test_draw_scaled_tile_covers_scaled_footprint() {
        let mut buffer = PixelBuffer::new(600, 600, GRAY).unwrap();
        let tile = RgbaImage::from_pixel(256, 256, Rgba([0, 0, 0, 255]));
        buffer.draw_tile(&tile, Point::new(0.0, 0.0), 384.0).unwrap();

        assert_eq!(buffer.pixel(380, 380), Some([0, 0, 0, 255]));
        assert_eq!(buffer.pixel(390, 10), Some([230, 230, 230, 255]));
    }

    #[test]
    fn test_marker_fill_and_outline() {
        let mut buffer = PixelBuffer::new(100, 100, GRAY).unwrap();
        let style = MarkerStyle {
            fill: [255, 0, 0],
            outline: [255, 255, 255],
            outline_width: 2.0,
            radius: 15.0,
        };
        buffer.draw_marker(Point::new(50.0, 50.0), &style);

        assert_eq!(buffer.pixel(50, 50), Some([255, 0, 0, 255]));
        let [_, g, b, _] = buffer.pixel(64, 50).unwrap();
        assert!(g > 240 && b > 240, "outline pixel is ({}, {})", g, b);
        assert_eq!(buffer.pixel(90, 90), Some([230, 230, 230, 255]));
    }

    #[test]
    fn test_label_draws_glyph_pixels() {
        let mut buffer = PixelBuffer::new(60, 30, GRAY).unwrap();
        buffer.draw_label(Point::new(2.0, 2.0), "I", [0, 0, 0], 1);
        // Top bar of the I glyph
        assert_eq!(buffer.pixel(3, 2), Some([0, 0, 0, 255]));
        // Untouched background far to the right
        assert_eq!(buffer.pixel(50, 20), Some([230, 230, 230, 255]));
    }

    #[test]
    fn test_encode_png_round_trips_dimensions() {
        let buffer = PixelBuffer::new(32, 16, GRAY).unwrap();
        let png = buffer.encode_png().unwrap();
        assert_eq!(&png[..4], b"\x89PNG");
        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (32, 16));
    }
}
