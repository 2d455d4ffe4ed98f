//! Region-of-interest and pixel rectangle types.

use serde::{Deserialize, Serialize};

/// Bounding box in pixel coordinates of the source frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelRect {
    /// Left edge x-coordinate
    pub x: f64,
    /// Top edge y-coordinate
    pub y: f64,
    /// Box width
    pub width: f64,
    /// Box height
    pub height: f64,
}

impl PixelRect {
    /// Create a new pixel rectangle.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// Center x-coordinate.
    #[inline]
    pub fn cx(&self) -> f64 {
        self.x + self.width / 2.0
    }

    /// Center y-coordinate.
    #[inline]
    pub fn cy(&self) -> f64 {
        self.y + self.height / 2.0
    }

    /// Box area in pixels.
    #[inline]
    pub fn area(&self) -> f64 {
        self.width * self.height
    }
}

/// A barcode-like region expressed as percentages of the frame (0-100).
///
/// Values are copied, never shared; every successful detection produces a
/// fresh one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Roi {
    /// Center x as a percentage of frame width
    pub center_x_pct: f64,
    /// Center y as a percentage of frame height
    pub center_y_pct: f64,
    /// Width as a percentage of frame width
    pub width_pct: f64,
    /// Height as a percentage of frame height
    pub height_pct: f64,
    /// Detection confidence (0.0-1.0)
    pub confidence: f64,
}

impl Roi {
    /// Create a new region of interest. Confidence is clamped to [0, 1].
    pub fn new(
        center_x_pct: f64,
        center_y_pct: f64,
        width_pct: f64,
        height_pct: f64,
        confidence: f64,
    ) -> Self {
        Self {
            center_x_pct,
            center_y_pct,
            width_pct,
            height_pct,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// Convert a pixel bounding box into a percentage ROI for a frame of the
    /// given dimensions. Returns `None` for a zero-sized frame.
    pub fn from_pixel_rect(
        rect: &PixelRect,
        frame_width: u32,
        frame_height: u32,
        confidence: f64,
    ) -> Option<Self> {
        if frame_width == 0 || frame_height == 0 {
            return None;
        }

        let fw = frame_width as f64;
        let fh = frame_height as f64;

        Some(Self::new(
            rect.cx() / fw * 100.0,
            rect.cy() / fh * 100.0,
            rect.width / fw * 100.0,
            rect.height / fh * 100.0,
            confidence,
        ))
    }

    /// Interpolate position and size towards `other` by `factor`.
    ///
    /// Confidence follows the newer sample.
    pub fn lerp(&self, other: &Roi, factor: f64) -> Roi {
        let mix = |a: f64, b: f64| a + (b - a) * factor;
        Roi {
            center_x_pct: mix(self.center_x_pct, other.center_x_pct),
            center_y_pct: mix(self.center_y_pct, other.center_y_pct),
            width_pct: mix(self.width_pct, other.width_pct),
            height_pct: mix(self.height_pct, other.height_pct),
            confidence: other.confidence,
        }
    }

    /// Area in squared percentage points.
    #[inline]
    pub fn area(&self) -> f64 {
        self.width_pct * self.height_pct
    }

    /// Whether the center lies inside the `[lo, hi]` band on both axes.
    pub fn is_centered(&self, lo: f64, hi: f64) -> bool {
        (lo..=hi).contains(&self.center_x_pct) && (lo..=hi).contains(&self.center_y_pct)
    }
}
