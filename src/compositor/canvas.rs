//! Software RGBA canvas
//!
//! The per-frame drawing surface. All coordinates clamp to the canvas
//! bounds: a bad rectangle draws less, never panics, because one failing
//! slot must not take a frame down.

use bytes::Bytes;

use super::layout::Rect;
use crate::media::{Rgba, VideoFrame};

/// Mutable RGBA8 drawing surface for one output frame
pub struct Canvas {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Canvas {
    /// Create a canvas filled with the background color
    pub fn new(width: u32, height: u32, background: Rgba) -> Self {
        let mut data = Vec::with_capacity((width * height * 4) as usize);
        for _ in 0..width * height {
            data.extend_from_slice(&[background.r, background.g, background.b, background.a]);
        }
        Self {
            width,
            height,
            data,
        }
    }

    /// Canvas width in pixels
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Canvas height in pixels
    pub fn height(&self) -> u32 {
        self.height
    }

    fn index(&self, x: u32, y: u32) -> usize {
        ((y * self.width + x) * 4) as usize
    }

    /// Read one pixel (clamped)
    pub fn pixel(&self, x: u32, y: u32) -> Rgba {
        let x = x.min(self.width.saturating_sub(1));
        let y = y.min(self.height.saturating_sub(1));
        let idx = self.index(x, y);
        Rgba::new(
            self.data[idx],
            self.data[idx + 1],
            self.data[idx + 2],
            self.data[idx + 3],
        )
    }

    fn put(&mut self, x: u32, y: u32, color: Rgba) {
        if x >= self.width || y >= self.height {
            return;
        }
        let idx = self.index(x, y);
        self.data[idx] = color.r;
        self.data[idx + 1] = color.g;
        self.data[idx + 2] = color.b;
        self.data[idx + 3] = color.a;
    }

    fn blend(&mut self, x: u32, y: u32, color: Rgba) {
        if x >= self.width || y >= self.height {
            return;
        }
        let idx = self.index(x, y);
        let a = color.a as u32;
        let inv = 255 - a;
        self.data[idx] = ((color.r as u32 * a + self.data[idx] as u32 * inv) / 255) as u8;
        self.data[idx + 1] = ((color.g as u32 * a + self.data[idx + 1] as u32 * inv) / 255) as u8;
        self.data[idx + 2] = ((color.b as u32 * a + self.data[idx + 2] as u32 * inv) / 255) as u8;
        self.data[idx + 3] = self.data[idx + 3].max(color.a);
    }

    /// Fill a rectangle with an opaque color
    pub fn fill_rect(&mut self, rect: Rect, color: Rgba) {
        let x_end = rect.right().min(self.width);
        let y_end = rect.bottom().min(self.height);
        for y in rect.y.min(self.height)..y_end {
            for x in rect.x.min(self.width)..x_end {
                self.put(x, y, color);
            }
        }
    }

    /// Alpha-blend a translucent rectangle over the existing pixels
    pub fn blend_rect(&mut self, rect: Rect, color: Rgba) {
        let x_end = rect.right().min(self.width);
        let y_end = rect.bottom().min(self.height);
        for y in rect.y.min(self.height)..y_end {
            for x in rect.x.min(self.width)..x_end {
                self.blend(x, y, color);
            }
        }
    }

    /// Draw a source frame into a slot rectangle, aspect-fit.
    ///
    /// The frame is scaled (nearest neighbor) to the largest size that fits
    /// the rectangle while preserving aspect ratio; the remainder is
    /// letterboxed with the given color.
    pub fn blit_fit(&mut self, rect: Rect, frame: &VideoFrame, letterbox: Rgba) {
        if rect.width == 0 || rect.height == 0 || frame.width == 0 || frame.height == 0 {
            return;
        }

        self.fill_rect(rect, letterbox);

        // Largest aspect-preserving size inside the slot
        let scale_w = rect.width as f64 / frame.width as f64;
        let scale_h = rect.height as f64 / frame.height as f64;
        let scale = scale_w.min(scale_h);
        let draw_w = ((frame.width as f64 * scale) as u32).max(1);
        let draw_h = ((frame.height as f64 * scale) as u32).max(1);
        let offset_x = rect.x + (rect.width - draw_w) / 2;
        let offset_y = rect.y + (rect.height - draw_h) / 2;

        for dy in 0..draw_h {
            let sy = (dy as u64 * frame.height as u64 / draw_h as u64) as u32;
            for dx in 0..draw_w {
                let sx = (dx as u64 * frame.width as u64 / draw_w as u64) as u32;
                self.put(offset_x + dx, offset_y + dy, frame.pixel(sx, sy));
            }
        }
    }

    /// Finish the frame
    pub fn into_frame(self) -> VideoFrame {
        VideoFrame::new(self.width, self.height, Bytes::from(self.data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_canvas_is_background() {
        let canvas = Canvas::new(8, 8, Rgba::opaque(1, 2, 3));
        assert_eq!(canvas.pixel(0, 0), Rgba::opaque(1, 2, 3));
        assert_eq!(canvas.pixel(7, 7), Rgba::opaque(1, 2, 3));
    }

    #[test]
    fn test_fill_rect_clamps_to_bounds() {
        let mut canvas = Canvas::new(4, 4, Rgba::BLACK);
        // Far oversized rectangle: fills the canvas, no panic
        canvas.fill_rect(Rect::new(2, 2, 100, 100), Rgba::WHITE);

        assert_eq!(canvas.pixel(3, 3), Rgba::WHITE);
        assert_eq!(canvas.pixel(1, 1), Rgba::BLACK);
    }

    #[test]
    fn test_blend_rect_mixes_colors() {
        let mut canvas = Canvas::new(2, 2, Rgba::BLACK);
        canvas.blend_rect(Rect::new(0, 0, 2, 2), Rgba::new(255, 255, 255, 128));

        let px = canvas.pixel(0, 0);
        assert!(px.r > 100 && px.r < 160, "blend produced {px:?}");
    }

    #[test]
    fn test_blit_fit_letterboxes_wide_frame() {
        let mut canvas = Canvas::new(100, 100, Rgba::BLACK);
        // 2:1 frame into a square slot: bars on top and bottom
        let frame = VideoFrame::solid(200, 100, Rgba::WHITE);
        canvas.blit_fit(Rect::new(0, 0, 100, 100), &frame, Rgba::opaque(9, 9, 9));

        assert_eq!(canvas.pixel(50, 50), Rgba::WHITE);
        assert_eq!(canvas.pixel(50, 10), Rgba::opaque(9, 9, 9));
        assert_eq!(canvas.pixel(50, 90), Rgba::opaque(9, 9, 9));
    }

    #[test]
    fn test_blit_zero_sized_inputs_ignored() {
        let mut canvas = Canvas::new(4, 4, Rgba::BLACK);
        let frame = VideoFrame::solid(2, 2, Rgba::WHITE);
        canvas.blit_fit(Rect::new(0, 0, 0, 0), &frame, Rgba::BLACK);
        assert_eq!(canvas.pixel(0, 0), Rgba::BLACK);
    }
}
