//! Fallback barcode localization from horizontal contrast edges.
//!
//! Used when no native detector is available. The frame is stretched into a
//! small fixed canvas and sampled on a 2-pixel grid; each sample compares
//! the gray level a few pixels to its left and right. 1-D barcodes are
//! dense vertical stripes, so they light up this horizontal gradient far
//! more than ordinary scene content does.
//!
//! # Algorithm
//!
//! For every sampled interior pixel `(x, y)`:
//!
//! ```text
//! diff = |gray(x - k, y) - gray(x + k, y)|        k = gradient_offset
//! if diff > threshold:
//!     sum_x += x * diff;  sum_y += y * diff;  weight += diff
//!     extend bounding box to (x, y)
//! ```
//!
//! The ROI center is the weighted centroid and its size the bounding box of
//! qualifying pixels. Cost is O(w·h/4) on a 150×150 canvas, well inside one
//! display frame on low-end hardware. It is intentionally not a full Sobel.

use std::time::Instant;

use scanzoom_models::Roi;
use tracing::trace;

use crate::config::AnalyzerConfig;
use crate::frame::{Frame, ScratchCanvas};
use crate::metrics;

/// Edge-statistics analyzer owning its reusable scratch canvas.
pub struct FrameAnalyzer {
    config: AnalyzerConfig,
    canvas: ScratchCanvas,
}

impl FrameAnalyzer {
    /// Create an analyzer. The scratch canvas is allocated once here.
    pub fn new(config: AnalyzerConfig) -> Self {
        let canvas = ScratchCanvas::new(config.canvas_size);
        Self { config, canvas }
    }

    /// Downsample `frame` into the scratch canvas and locate a barcode-like
    /// region in it.
    pub fn analyze(&mut self, frame: &Frame) -> Option<Roi> {
        let start = Instant::now();
        self.canvas.draw(frame);
        let roi = self.analyze_canvas(&self.canvas);
        metrics::record_analyzer_duration(start.elapsed().as_secs_f64());
        roi
    }

    /// Scan an already-drawn canvas.
    pub fn analyze_canvas(&self, canvas: &ScratchCanvas) -> Option<Roi> {
        let cfg = &self.config;
        let size = canvas.size();
        let offset = cfg.gradient_offset;
        if size <= 2 * offset {
            return None;
        }
        let stride = cfg.sample_stride.max(1) as usize;

        let mut sum_x = 0.0_f64;
        let mut sum_y = 0.0_f64;
        let mut weight = 0.0_f64;
        let (mut min_x, mut min_y) = (u32::MAX, u32::MAX);
        let (mut max_x, mut max_y) = (0u32, 0u32);

        for y in (0..size).step_by(stride) {
            for x in (offset..size - offset).step_by(stride) {
                let left = canvas.gray(x - offset, y);
                let right = canvas.gray(x + offset, y);
                let diff = left.abs_diff(right);
                if diff <= cfg.gradient_threshold {
                    continue;
                }

                let d = diff as f64;
                sum_x += x as f64 * d;
                sum_y += y as f64 * d;
                weight += d;

                min_x = min_x.min(x);
                max_x = max_x.max(x);
                min_y = min_y.min(y);
                max_y = max_y.max(y);
            }
        }

        if weight < cfg.min_total_weight {
            trace!(weight, "No structured contrast region");
            return None;
        }

        let scale = 100.0 / size as f64;
        let center_x = sum_x / weight * scale;
        let center_y = sum_y / weight * scale;
        let width = ((max_x - min_x) as f64 * scale).max(cfg.min_size_pct);
        let height = ((max_y - min_y) as f64 * scale).max(cfg.min_size_pct);
        let confidence = (weight / cfg.confidence_scale).min(1.0);

        trace!(center_x, center_y, width, height, confidence, "Edge region found");

        Some(Roi::new(center_x, center_y, width, height, confidence))
    }
}
