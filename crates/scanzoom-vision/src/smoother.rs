//! Temporal smoothing of raw per-frame detections.
//!
//! Two independent exponential moving averages are kept, both seeded by the
//! first detection:
//! - **target**: faster (α = 0.4), drives zoom decisions
//! - **display**: slower (α = 0.2), only used for drawing the tracking box
//!
//! Short gaps in detection are tolerated. After `max_lost_frames`
//! consecutive misses all state is dropped so the next detection reseeds
//! instead of interpolating from a stale position.

use tracing::debug;

use scanzoom_models::Roi;

use crate::config::SmoothingConfig;
use crate::metrics;

/// Linear interpolation `a + (b - a) * factor`.
#[inline]
pub fn lerp(a: f64, b: f64, factor: f64) -> f64 {
    a + (b - a) * factor
}

/// Smoothed boxes after one update.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TrackingUpdate {
    pub target: Option<Roi>,
    pub display: Option<Roi>,
    /// State was cleared on this update after too many misses
    pub reset: bool,
}

/// Dual-rate EMA tracker with loss tolerance.
#[derive(Debug, Clone)]
pub struct TrackingSmoother {
    config: SmoothingConfig,
    target: Option<Roi>,
    display: Option<Roi>,
    lost_frames: u32,
}

impl TrackingSmoother {
    pub fn new(config: SmoothingConfig) -> Self {
        Self {
            config,
            target: None,
            display: None,
            lost_frames: 0,
        }
    }

    /// Feed one tick's detection result.
    pub fn update(&mut self, detection: Option<Roi>) -> TrackingUpdate {
        let Some(roi) = detection else {
            return self.miss();
        };

        self.lost_frames = 0;
        self.target = Some(smooth(self.target, roi, self.config.target_alpha));
        self.display = Some(smooth(self.display, roi, self.config.display_alpha));

        TrackingUpdate {
            target: self.target,
            display: self.display,
            reset: false,
        }
    }

    fn miss(&mut self) -> TrackingUpdate {
        self.lost_frames = self.lost_frames.saturating_add(1);

        if self.lost_frames >= self.config.max_lost_frames && self.is_tracking() {
            debug!(lost_frames = self.lost_frames, "Tracking lost, resetting");
            metrics::record_tracking_reset();
            self.reset();
            return TrackingUpdate {
                reset: true,
                ..Default::default()
            };
        }

        TrackingUpdate {
            target: self.target,
            display: self.display,
            reset: false,
        }
    }

    /// Drop all smoothing state.
    pub fn reset(&mut self) {
        self.target = None;
        self.display = None;
        self.lost_frames = 0;
    }

    pub fn target(&self) -> Option<&Roi> {
        self.target.as_ref()
    }

    pub fn display(&self) -> Option<&Roi> {
        self.display.as_ref()
    }

    pub fn lost_frame_count(&self) -> u32 {
        self.lost_frames
    }

    pub fn is_tracking(&self) -> bool {
        self.target.is_some()
    }
}

fn smooth(previous: Option<Roi>, next: Roi, alpha: f64) -> Roi {
    match previous {
        Some(prev) => prev.lerp(&next, alpha),
        None => next,
    }
}
