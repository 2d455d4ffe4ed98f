//! Configuration for the targeting and zoom pipeline.
//!
//! All numbers here are tunable policy, not protocol. The defaults form one
//! coherent set; presets adjust a handful of them together.

use serde::{Deserialize, Serialize};

use crate::error::{VisionError, VisionResult};

/// Fallback edge analyzer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Side of the square scratch canvas frames are downsampled into (default: 150)
    pub canvas_size: u32,

    /// Sampling stride on both axes (default: 2)
    pub sample_stride: u32,

    /// Horizontal distance to the left/right gradient taps (default: 4)
    pub gradient_offset: u32,

    /// Minimum gradient magnitude for a pixel to contribute, 0-255 (default: 40)
    pub gradient_threshold: u32,

    /// Total weight below which no region is reported (default: 20000)
    pub min_total_weight: f64,

    /// Weight that maps to full confidence (default: 100000)
    pub confidence_scale: f64,

    /// Floor for reported width/height percentages (default: 10)
    pub min_size_pct: f64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            canvas_size: 150,
            sample_stride: 2,
            gradient_offset: 4,
            gradient_threshold: 40,
            min_total_weight: 20_000.0,
            confidence_scale: 100_000.0,
            min_size_pct: 10.0,
        }
    }
}

/// Tracking smoother settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    /// Lerp factor for the control target box (default: 0.4)
    pub target_alpha: f64,

    /// Lerp factor for the on-screen box (default: 0.2)
    pub display_alpha: f64,

    /// Consecutive misses that clear tracking state (default: 10)
    pub max_lost_frames: u32,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            target_alpha: 0.4,
            display_alpha: 0.2,
            max_lost_frames: 10,
        }
    }
}

/// Auto-zoom control policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoomPolicy {
    /// Width percentage the barcode should fill (default: 60)
    pub target_width_pct: f64,

    /// Error magnitude (percentage points) treated as "close enough" (default: 2)
    pub dead_band_pct: f64,

    /// Lower edge of the central band the ROI center must sit in (default: 30)
    pub center_band_min_pct: f64,

    /// Upper edge of the central band (default: 70)
    pub center_band_max_pct: f64,

    /// Stable ticks that must be exceeded before commanding (default: 5)
    pub min_stable_frames: u32,

    /// Proportional gain per percentage point per zoom unit (default: 0.01)
    pub gain: f64,

    /// Largest single zoom step (default: 0.5)
    pub max_step: f64,

    /// Policy ceiling on top of the hardware maximum (default: 5.0)
    pub zoom_ceiling: f64,

    /// Smallest change worth sending to hardware (default: 0.05)
    pub min_zoom_delta: f64,

    /// Auto-zoom hold-off after a manual zoom (default: 2500ms)
    pub manual_cooldown_ms: u64,
}

impl Default for ZoomPolicy {
    fn default() -> Self {
        Self {
            target_width_pct: 60.0,
            dead_band_pct: 2.0,
            center_band_min_pct: 30.0,
            center_band_max_pct: 70.0,
            min_stable_frames: 5,
            gain: 0.01,
            max_step: 0.5,
            zoom_ceiling: 5.0,
            min_zoom_delta: 0.05,
            manual_cooldown_ms: 2_500,
        }
    }
}

/// Touch gesture thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureConfig {
    /// Pinch scale to zoom-range multiplier (default: 0.8)
    pub pinch_sensitivity: f64,

    /// Max gap between taps for a double-tap (default: 300ms)
    pub double_tap_window_ms: u64,

    /// Vertical travel that opens/closes the history panel (default: 50px)
    pub swipe_threshold_px: f64,

    /// Max travel for a tap (default: 10px)
    pub tap_max_movement_px: f64,

    /// Max duration for a tap (default: 300ms)
    pub tap_max_duration_ms: u64,

    /// Lifetime of the tap-to-focus indicator (default: 1000ms)
    pub focus_indicator_ms: u64,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            pinch_sensitivity: 0.8,
            double_tap_window_ms: 300,
            swipe_threshold_px: 50.0,
            tap_max_movement_px: 10.0,
            tap_max_duration_ms: 300,
            focus_indicator_ms: 1_000,
        }
    }
}

/// Capture loop cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    /// Tick interval, aligned to a 60Hz display (default: 16ms)
    pub frame_interval_ms: u64,

    /// Capacity of the command channel into the loop (default: 64)
    pub command_buffer: usize,

    /// A zoom apply that has not resolved by then counts as rejected
    /// (default: 1500ms)
    pub zoom_apply_timeout_ms: u64,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: 16,
            command_buffer: 64,
            zoom_apply_timeout_ms: 1_500,
        }
    }
}

/// Decoded-code acceptance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeConfig {
    /// The same code is not re-emitted within this window (default: 1500ms)
    pub repeat_window_ms: u64,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            repeat_window_ms: 1_500,
        }
    }
}

/// Complete scanner configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    pub analyzer: AnalyzerConfig,
    pub smoothing: SmoothingConfig,
    pub zoom: ZoomPolicy,
    pub gesture: GestureConfig,
    pub cadence: LoopConfig,
    pub decode: DecodeConfig,
}

impl ScannerConfig {
    /// Snappier tracking for handheld scanning of small labels.
    pub fn responsive() -> Self {
        Self {
            smoothing: SmoothingConfig {
                target_alpha: 0.5,
                display_alpha: 0.25,
                ..Default::default()
            },
            zoom: ZoomPolicy {
                min_stable_frames: 3,
                manual_cooldown_ms: 2_000,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Calmer control for mounted cameras and shaky detections.
    pub fn steady() -> Self {
        Self {
            smoothing: SmoothingConfig {
                target_alpha: 0.3,
                display_alpha: 0.2,
                ..Default::default()
            },
            zoom: ZoomPolicy {
                min_stable_frames: 8,
                max_step: 0.3,
                manual_cooldown_ms: 3_000,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Parse a (possibly partial) JSON document; missing fields keep defaults.
    pub fn from_json(json: &str) -> VisionResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by `SCANZOOM_*` environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            smoothing: SmoothingConfig {
                target_alpha: env_or("SCANZOOM_TARGET_ALPHA", defaults.smoothing.target_alpha),
                display_alpha: env_or("SCANZOOM_DISPLAY_ALPHA", defaults.smoothing.display_alpha),
                max_lost_frames: env_or("SCANZOOM_MAX_LOST_FRAMES", defaults.smoothing.max_lost_frames),
            },
            zoom: ZoomPolicy {
                target_width_pct: env_or("SCANZOOM_TARGET_WIDTH_PCT", defaults.zoom.target_width_pct),
                min_stable_frames: env_or("SCANZOOM_MIN_STABLE_FRAMES", defaults.zoom.min_stable_frames),
                zoom_ceiling: env_or("SCANZOOM_ZOOM_CEILING", defaults.zoom.zoom_ceiling),
                manual_cooldown_ms: env_or("SCANZOOM_MANUAL_COOLDOWN_MS", defaults.zoom.manual_cooldown_ms),
                ..defaults.zoom
            },
            cadence: LoopConfig {
                frame_interval_ms: env_or("SCANZOOM_FRAME_INTERVAL_MS", defaults.cadence.frame_interval_ms),
                zoom_apply_timeout_ms: env_or(
                    "SCANZOOM_ZOOM_APPLY_TIMEOUT_MS",
                    defaults.cadence.zoom_apply_timeout_ms,
                ),
                ..defaults.cadence
            },
            decode: DecodeConfig {
                repeat_window_ms: env_or("SCANZOOM_REPEAT_WINDOW_MS", defaults.decode.repeat_window_ms),
            },
            ..defaults
        }
    }

    /// Reject values the pipeline cannot operate with.
    pub fn validate(&self) -> VisionResult<()> {
        let a = &self.analyzer;
        if a.canvas_size <= 2 * a.gradient_offset {
            return Err(VisionError::invalid_config(format!(
                "canvas_size {} leaves no interior for gradient_offset {}",
                a.canvas_size, a.gradient_offset
            )));
        }
        if a.sample_stride == 0 {
            return Err(VisionError::invalid_config("sample_stride must be at least 1"));
        }
        if a.confidence_scale <= 0.0 {
            return Err(VisionError::invalid_config("confidence_scale must be positive"));
        }

        for (name, alpha) in [
            ("target_alpha", self.smoothing.target_alpha),
            ("display_alpha", self.smoothing.display_alpha),
        ] {
            if !(alpha > 0.0 && alpha <= 1.0) {
                return Err(VisionError::invalid_config(format!(
                    "{} must be in (0, 1], got {}",
                    name, alpha
                )));
            }
        }
        if self.smoothing.max_lost_frames == 0 {
            return Err(VisionError::invalid_config("max_lost_frames must be at least 1"));
        }

        let z = &self.zoom;
        if !(0.0..=100.0).contains(&z.center_band_min_pct)
            || !(0.0..=100.0).contains(&z.center_band_max_pct)
            || z.center_band_min_pct >= z.center_band_max_pct
        {
            return Err(VisionError::invalid_config(format!(
                "center band [{}, {}] must be an increasing range inside 0-100",
                z.center_band_min_pct, z.center_band_max_pct
            )));
        }
        if !(z.target_width_pct > 0.0 && z.target_width_pct <= 100.0) {
            return Err(VisionError::invalid_config("target_width_pct must be in (0, 100]"));
        }
        if z.dead_band_pct < 0.0 || z.gain <= 0.0 || z.max_step <= 0.0 {
            return Err(VisionError::invalid_config(
                "dead_band_pct must be non-negative; gain and max_step positive",
            ));
        }
        if z.zoom_ceiling <= 0.0 {
            return Err(VisionError::invalid_config("zoom_ceiling must be positive"));
        }

        if self.cadence.frame_interval_ms == 0 {
            return Err(VisionError::invalid_config("frame_interval_ms must be at least 1"));
        }
        if self.cadence.command_buffer == 0 {
            return Err(VisionError::invalid_config("command_buffer must be at least 1"));
        }
        if self.cadence.zoom_apply_timeout_ms == 0 {
            return Err(VisionError::invalid_config("zoom_apply_timeout_ms must be at least 1"));
        }

        Ok(())
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
