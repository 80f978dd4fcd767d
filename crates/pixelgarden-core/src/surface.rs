//! Render surface abstraction.

use crate::color::Color;
use kurbo::Size;

/// Trait for drawing backends.
///
/// Implementations can wrap a 2D canvas context, a window framebuffer or an
/// in-memory buffer. The engine only ever fills axis-aligned rectangles.
pub trait RenderSurface {
    /// Surface size in device pixels.
    fn size(&self) -> Size;

    /// Fill a rectangle given in device pixels.
    fn fill_rect(&mut self, x: f64, y: f64, width: f64, height: f64, color: Color);
}

/// An in-memory RGBA surface.
///
/// Counts fill calls so callers can check how much work a repaint did.
#[derive(Debug, Clone)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
    fills: usize,
}

impl PixelBuffer {
    /// Create a buffer cleared to opaque black.
    pub fn new(width: u32, height: u32) -> Self {
        let mut data = vec![0u8; width as usize * height as usize * 4];
        for px in data.chunks_exact_mut(4) {
            px[3] = 255;
        }
        Self { width, height, data, fills: 0 }
    }

    /// Reallocate for a new size, clearing contents.
    pub fn resize(&mut self, width: u32, height: u32) {
        *self = Self::new(width, height);
    }

    /// Color of the device pixel at `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> Option<Color> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        Some(Color::from_rgb(self.data[i], self.data[i + 1], self.data[i + 2]))
    }

    /// Number of `fill_rect` calls since the last reset.
    pub fn fill_count(&self) -> usize {
        self.fills
    }

    pub fn reset_fill_count(&mut self) {
        self.fills = 0;
    }

    /// Raw RGBA bytes, row-major.
    pub fn as_rgba(&self) -> &[u8] {
        &self.data
    }
}

impl RenderSurface for PixelBuffer {
    fn size(&self) -> Size {
        Size::new(f64::from(self.width), f64::from(self.height))
    }

    fn fill_rect(&mut self, x: f64, y: f64, width: f64, height: f64, color: Color) {
        self.fills += 1;
        let x0 = x.max(0.0).floor() as u32;
        let y0 = y.max(0.0).floor() as u32;
        let x1 = ((x + width).max(0.0).ceil() as u32).min(self.width);
        let y1 = ((y + height).max(0.0).ceil() as u32).min(self.height);
        let rgba = color.to_rgba();
        for py in y0..y1 {
            let row = py as usize * self.width as usize;
            for px in x0..x1 {
                let i = (row + px as usize) * 4;
                self.data[i..i + 4].copy_from_slice(&rgba);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_rect_clips() {
        let mut buffer = PixelBuffer::new(4, 4);
        buffer.fill_rect(2.0, 2.0, 10.0, 10.0, Color::WHITE);
        assert_eq!(buffer.pixel(3, 3), Some(Color::WHITE));
        assert_eq!(buffer.pixel(1, 1), Some(Color::BLACK));
        assert_eq!(buffer.pixel(4, 4), None);
        assert_eq!(buffer.fill_count(), 1);
    }

    #[test]
    fn test_negative_origin() {
        let mut buffer = PixelBuffer::new(4, 4);
        buffer.fill_rect(-2.0, -2.0, 3.0, 3.0, Color::WHITE);
        assert_eq!(buffer.pixel(0, 0), Some(Color::WHITE));
        assert_eq!(buffer.pixel(1, 1), Some(Color::BLACK));
    }
}
