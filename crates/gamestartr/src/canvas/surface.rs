use std::fmt;

use super::blend::blend_pixel;
use super::TRANSPARENT;

pub type Rgba = [u8; 4];

/// A detached copy of a canvas's pixels, as returned by [`Canvas::get_image_data`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl ImageData {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

/// Software 2D drawing surface with straight-alpha RGBA8 pixels.
///
/// The drawing state mirrors a browser 2D context: a `global_alpha` applied to every draw, and a
/// translation applied to every coordinate. Coordinates are rounded to whole device pixels and
/// sampling is nearest-neighbour, so sprites are never smoothed.
#[derive(Clone)]
pub struct Canvas {
    width: u32,
    height: u32,
    data: Vec<u8>,
    global_alpha: f32,
    translate_x: f64,
    translate_y: f64,
    draw_operations: u64,
}

impl fmt::Debug for Canvas {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Canvas")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("global_alpha", &self.global_alpha)
            .field("translate", &(self.translate_x, self.translate_y))
            .field("draw_operations", &self.draw_operations)
            .finish_non_exhaustive()
    }
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; width as usize * height as usize * 4],
            global_alpha: 1.0,
            translate_x: 0.0,
            translate_y: 0.0,
            draw_operations: 0,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Reallocates to the new size, clearing every pixel and resetting the drawing state.
    pub fn resize(&mut self, width: u32, height: u32) {
        *self = Self {
            draw_operations: self.draw_operations,
            ..Self::new(width, height)
        };
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * 4;
        let mut pixel = TRANSPARENT;
        pixel.copy_from_slice(&self.data[offset..offset + 4]);
        Some(pixel)
    }

    /// Number of draw calls (image, pattern, rect, image-data writes) issued so far.
    pub fn draw_operations(&self) -> u64 {
        self.draw_operations
    }

    pub fn global_alpha(&self) -> f32 {
        self.global_alpha
    }

    pub fn set_global_alpha(&mut self, alpha: f32) {
        if alpha.is_finite() {
            self.global_alpha = alpha.clamp(0.0, 1.0);
        }
    }

    pub fn translation(&self) -> (f64, f64) {
        (self.translate_x, self.translate_y)
    }

    pub fn translate(&mut self, dx: f64, dy: f64) {
        self.translate_x += dx;
        self.translate_y += dy;
    }

    pub fn get_image_data(&self) -> ImageData {
        ImageData {
            width: self.width,
            height: self.height,
            data: self.data.clone(),
        }
    }

    /// Writes pixels verbatim (no blending, no global alpha) with the image's top-left at
    /// `(dx, dy)` in device space.
    pub fn put_image_data(&mut self, image: &ImageData, dx: i64, dy: i64) {
        self.draw_operations += 1;
        let (right, bottom) = (dx + image.width as i64, dy + image.height as i64);
        let Some(span) = self.clip_device_rect(dx, dy, right, bottom) else {
            return;
        };
        let row_bytes = (span.x1 - span.x0) as usize * 4;
        for y in span.y0..span.y1 {
            let src_x = (span.x0 - dx) as usize;
            let src_y = (y - dy) as usize;
            let src_offset = (src_y * image.width as usize + src_x) * 4;
            let dst_offset = self.byte_offset(span.x0, y);
            if src_offset + row_bytes > image.data.len() {
                continue;
            }
            self.data[dst_offset..dst_offset + row_bytes]
                .copy_from_slice(&image.data[src_offset..src_offset + row_bytes]);
        }
    }

    pub fn clear_rect(&mut self, x: f64, y: f64, width: f64, height: f64) {
        self.draw_operations += 1;
        let Some(span) = self.user_rect(x, y, width, height) else {
            return;
        };
        for py in span.y0..span.y1 {
            let start = self.byte_offset(span.x0, py);
            let end = self.byte_offset(span.x1, py);
            self.data[start..end].fill(0);
        }
    }

    pub fn fill_rect(&mut self, color: Rgba, x: f64, y: f64, width: f64, height: f64) {
        self.draw_operations += 1;
        let Some(span) = self.user_rect(x, y, width, height) else {
            return;
        };
        let alpha = self.global_alpha;
        for py in span.y0..span.y1 {
            for px in span.x0..span.x1 {
                let offset = self.byte_offset(px, py);
                blend_pixel(&mut self.data[offset..offset + 4], color, alpha);
            }
        }
    }

    /// Draws `source` at its native size with its top-left at `(x, y)`.
    pub fn draw_image(&mut self, source: &Canvas, x: f64, y: f64) {
        self.draw_image_scaled(source, x, y, source.width as f64, source.height as f64);
    }

    /// Draws all of `source` stretched into the `width` x `height` rectangle at `(x, y)`.
    pub fn draw_image_scaled(&mut self, source: &Canvas, x: f64, y: f64, width: f64, height: f64) {
        self.draw_image_region(
            source,
            0.0,
            0.0,
            source.width as f64,
            source.height as f64,
            x,
            y,
            width,
            height,
        );
    }

    /// Nine-argument `drawImage`: copies the source rectangle `(sx, sy, sw, sh)` into the
    /// destination rectangle `(dx, dy, dw, dh)`, scaling with nearest-neighbour sampling.
    pub fn draw_image_region(
        &mut self,
        source: &Canvas,
        sx: f64,
        sy: f64,
        sw: f64,
        sh: f64,
        dx: f64,
        dy: f64,
        dw: f64,
        dh: f64,
    ) {
        self.draw_operations += 1;
        if source.is_empty() || sw <= 0.0 || sh <= 0.0 {
            return;
        }
        let origin_x = (dx + self.translate_x).round() as i64;
        let origin_y = (dy + self.translate_y).round() as i64;
        let Some(span) = self.user_rect(dx, dy, dw, dh) else {
            return;
        };
        let dest_width = ((dx + dw + self.translate_x).round() as i64 - origin_x).max(1) as f64;
        let dest_height = ((dy + dh + self.translate_y).round() as i64 - origin_y).max(1) as f64;
        let scale_x = sw / dest_width;
        let scale_y = sh / dest_height;
        let alpha = self.global_alpha;

        for py in span.y0..span.y1 {
            let src_y = (sy + ((py - origin_y) as f64 + 0.5) * scale_y).floor();
            if src_y < 0.0 || src_y >= source.height as f64 {
                continue;
            }
            for px in span.x0..span.x1 {
                let src_x = (sx + ((px - origin_x) as f64 + 0.5) * scale_x).floor();
                if src_x < 0.0 || src_x >= source.width as f64 {
                    continue;
                }
                let src_offset = (src_y as usize * source.width as usize + src_x as usize) * 4;
                let mut color = TRANSPARENT;
                color.copy_from_slice(&source.data[src_offset..src_offset + 4]);
                let dst_offset = self.byte_offset(px, py);
                blend_pixel(&mut self.data[dst_offset..dst_offset + 4], color, alpha);
            }
        }
    }

    /// Fills a rectangle with `source` repeated in both directions. The pattern is anchored at
    /// the current translation origin, the way a canvas `"repeat"` pattern is.
    pub fn fill_rect_pattern(&mut self, source: &Canvas, x: f64, y: f64, width: f64, height: f64) {
        self.draw_operations += 1;
        if source.is_empty() {
            return;
        }
        let Some(span) = self.user_rect(x, y, width, height) else {
            return;
        };
        let anchor_x = self.translate_x.round() as i64;
        let anchor_y = self.translate_y.round() as i64;
        let tile_width = source.width as i64;
        let tile_height = source.height as i64;
        let alpha = self.global_alpha;

        for py in span.y0..span.y1 {
            let src_y = (py - anchor_y).rem_euclid(tile_height) as usize;
            for px in span.x0..span.x1 {
                let src_x = (px - anchor_x).rem_euclid(tile_width) as usize;
                let src_offset = (src_y * source.width as usize + src_x) * 4;
                let mut color = TRANSPARENT;
                color.copy_from_slice(&source.data[src_offset..src_offset + 4]);
                let dst_offset = self.byte_offset(px, py);
                blend_pixel(&mut self.data[dst_offset..dst_offset + 4], color, alpha);
            }
        }
    }

    fn byte_offset(&self, x: i64, y: i64) -> usize {
        (y as usize * self.width as usize + x as usize) * 4
    }

    fn user_rect(&self, x: f64, y: f64, width: f64, height: f64) -> Option<DeviceSpan> {
        if !(width > 0.0 && height > 0.0) {
            return None;
        }
        let x0 = (x + self.translate_x).round() as i64;
        let y0 = (y + self.translate_y).round() as i64;
        let x1 = (x + width + self.translate_x).round() as i64;
        let y1 = (y + height + self.translate_y).round() as i64;
        self.clip_device_rect(x0, y0, x1, y1)
    }

    fn clip_device_rect(&self, x0: i64, y0: i64, x1: i64, y1: i64) -> Option<DeviceSpan> {
        let span = DeviceSpan {
            x0: x0.max(0),
            y0: y0.max(0),
            x1: x1.min(self.width as i64),
            y1: y1.min(self.height as i64),
        };
        (span.x0 < span.x1 && span.y0 < span.y1).then_some(span)
    }
}

#[derive(Debug, Clone, Copy)]
struct DeviceSpan {
    x0: i64,
    y0: i64,
    x1: i64,
    y1: i64,
}

/// Source of fresh off-screen canvases for Things, Quadrants, and sprite parts.
pub trait CanvasFactory {
    fn create_canvas(&self, width: u32, height: u32) -> Canvas;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SoftwareCanvasFactory;

impl CanvasFactory for SoftwareCanvasFactory {
    fn create_canvas(&self, width: u32, height: u32) -> Canvas {
        Canvas::new(width, height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Rgba = [255, 0, 0, 255];
    const BLUE: Rgba = [0, 0, 255, 255];

    fn checker_tile() -> Canvas {
        let mut tile = Canvas::new(2, 1);
        tile.fill_rect(RED, 0.0, 0.0, 1.0, 1.0);
        tile.fill_rect(BLUE, 1.0, 0.0, 1.0, 1.0);
        tile
    }

    #[test]
    fn fill_rect_clips_to_surface() {
        let mut canvas = Canvas::new(4, 4);
        canvas.fill_rect(RED, -2.0, 2.0, 10.0, 10.0);
        assert_eq!(canvas.pixel(0, 1), Some(TRANSPARENT));
        assert_eq!(canvas.pixel(0, 2), Some(RED));
        assert_eq!(canvas.pixel(3, 3), Some(RED));
        assert_eq!(canvas.pixel(4, 3), None);
    }

    #[test]
    fn image_data_round_trip_preserves_pixels() {
        let mut canvas = Canvas::new(2, 2);
        let mut image = canvas.get_image_data();
        image.data_mut()[..4].copy_from_slice(&BLUE);
        canvas.put_image_data(&image, 0, 0);
        assert_eq!(canvas.pixel(0, 0), Some(BLUE));
        assert_eq!(canvas.pixel(1, 1), Some(TRANSPARENT));
    }

    #[test]
    fn pattern_is_anchored_at_translation_origin() {
        let tile = checker_tile();
        let mut canvas = Canvas::new(6, 1);
        canvas.translate(1.0, 0.0);
        canvas.fill_rect_pattern(&tile, 0.0, 0.0, 4.0, 1.0);
        canvas.translate(-1.0, 0.0);

        assert_eq!(canvas.pixel(0, 0), Some(TRANSPARENT));
        assert_eq!(canvas.pixel(1, 0), Some(RED));
        assert_eq!(canvas.pixel(2, 0), Some(BLUE));
        assert_eq!(canvas.pixel(3, 0), Some(RED));
        assert_eq!(canvas.pixel(4, 0), Some(BLUE));
        assert_eq!(canvas.pixel(5, 0), Some(TRANSPARENT));
        assert_eq!(canvas.translation(), (0.0, 0.0));
    }

    #[test]
    fn scaled_draw_uses_nearest_neighbour() {
        let tile = checker_tile();
        let mut canvas = Canvas::new(4, 2);
        canvas.draw_image_scaled(&tile, 0.0, 0.0, 4.0, 2.0);
        assert_eq!(canvas.pixel(0, 0), Some(RED));
        assert_eq!(canvas.pixel(1, 1), Some(RED));
        assert_eq!(canvas.pixel(2, 0), Some(BLUE));
        assert_eq!(canvas.pixel(3, 1), Some(BLUE));
    }

    #[test]
    fn region_draw_copies_sub_rectangle() {
        let tile = checker_tile();
        let mut canvas = Canvas::new(3, 1);
        canvas.draw_image_region(&tile, 1.0, 0.0, 1.0, 1.0, 2.0, 0.0, 1.0, 1.0);
        assert_eq!(canvas.pixel(1, 0), Some(TRANSPARENT));
        assert_eq!(canvas.pixel(2, 0), Some(BLUE));
    }

    #[test]
    fn global_alpha_applies_to_image_draws() {
        let mut source = Canvas::new(1, 1);
        source.fill_rect(RED, 0.0, 0.0, 1.0, 1.0);
        let mut canvas = Canvas::new(1, 1);
        canvas.fill_rect([0, 0, 0, 255], 0.0, 0.0, 1.0, 1.0);
        canvas.set_global_alpha(0.5);
        canvas.draw_image(&source, 0.0, 0.0);
        assert_eq!(canvas.pixel(0, 0), Some([128, 0, 0, 255]));
    }

    #[test]
    fn resize_clears_pixels_but_keeps_operation_count() {
        let mut canvas = Canvas::new(2, 2);
        canvas.fill_rect(RED, 0.0, 0.0, 2.0, 2.0);
        canvas.resize(0, 0);
        assert!(canvas.is_empty());
        assert_eq!(canvas.draw_operations(), 1);
    }
}
