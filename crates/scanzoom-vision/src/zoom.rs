//! Auto-zoom controller.
//!
//! Once per tick the smoothed target box is checked against a chain of
//! gates and, when all pass, a proportional zoom step is commanded:
//!
//! ```text
//! cooldown ─► apply pending? ─► centered? ─► |error| > dead-band? ─► stable? ─► command
//!    │              │               │                │                  │
//!    └──────────────┴───────────────┴────────────────┴──────────────────┴──► no-op
//! ```
//!
//! `error = target_width_pct - roi.width_pct`, and the step is
//! `clamp(error * gain * current_zoom, ±max_step)`. Every level the
//! controller emits lies in `[hardware_min, min(hardware_max, ceiling)]`.
//!
//! The stability counter counts consecutive ticks with a centered target.
//! Any tick without one resets it to zero, as does every command.

use serde::Serialize;
use tracing::{debug, warn};

use scanzoom_models::{Roi, ZoomCapabilities};

use crate::config::ZoomPolicy;
use crate::error::VisionError;
use crate::metrics;

/// Where the controller is in its per-tick cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoomPhase {
    /// Nothing pending
    Idle,
    /// Gates being checked this tick
    Evaluating,
    /// A command was issued and its apply has not reported back
    Commanding,
}

/// Who asked for a zoom change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoomSource {
    Auto,
    Manual,
}

impl ZoomSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ZoomSource::Auto => "auto",
            ZoomSource::Manual => "manual",
        }
    }
}

/// A zoom level to send to the camera.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ZoomCommand {
    pub level: f64,
    pub source: ZoomSource,
}

/// Observable zoom state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ZoomState {
    /// Last level the hardware confirmed
    pub current_zoom: f64,
    pub hardware_min: f64,
    pub hardware_max: f64,
    pub step: f64,
    /// An auto command is converging on the target size
    pub is_auto_adjusting: bool,
    /// Auto-zoom is suppressed until this time
    pub cooldown_until_ms: u64,
    pub stable_frame_count: u32,
}

/// Gate chain and proportional step for automatic zoom.
#[derive(Debug, Clone)]
pub struct ZoomController {
    caps: ZoomCapabilities,
    policy: ZoomPolicy,
    state: ZoomState,
    phase: ZoomPhase,
    pending: Option<f64>,
}

impl ZoomController {
    pub fn new(caps: ZoomCapabilities, initial_zoom: f64, policy: ZoomPolicy) -> Self {
        let current_zoom = caps.clamp(initial_zoom, policy.zoom_ceiling);
        Self {
            state: ZoomState {
                current_zoom,
                hardware_min: caps.min,
                hardware_max: caps.max,
                step: caps.step,
                is_auto_adjusting: false,
                cooldown_until_ms: 0,
                stable_frame_count: 0,
            },
            caps,
            policy,
            phase: ZoomPhase::Idle,
            pending: None,
        }
    }

    pub fn state(&self) -> &ZoomState {
        &self.state
    }

    pub fn phase(&self) -> ZoomPhase {
        self.phase
    }

    /// Highest level the controller will ever command.
    pub fn effective_max(&self) -> f64 {
        self.caps.effective_max(self.policy.zoom_ceiling)
    }

    /// Smallest change worth sending to the hardware.
    fn granularity(&self) -> f64 {
        self.policy.min_zoom_delta.max(self.caps.step)
    }

    pub fn in_cooldown(&self, now_ms: u64) -> bool {
        now_ms < self.state.cooldown_until_ms
    }

    /// Run the gate chain for one tick.
    pub fn evaluate(&mut self, target: Option<&Roi>, now_ms: u64) -> Option<ZoomCommand> {
        let Some(roi) = target else {
            self.state.stable_frame_count = 0;
            self.clear_auto_adjusting("tracking lost");
            self.settle();
            return None;
        };

        if self.in_cooldown(now_ms) {
            self.state.stable_frame_count = 0;
            return None;
        }

        if self.pending.is_some() {
            return None;
        }

        self.phase = ZoomPhase::Evaluating;
        let policy = self.policy.clone();

        if !roi.is_centered(policy.center_band_min_pct, policy.center_band_max_pct) {
            self.state.stable_frame_count = 0;
            self.settle();
            return None;
        }
        self.state.stable_frame_count = self.state.stable_frame_count.saturating_add(1);

        let error = policy.target_width_pct - roi.width_pct;
        if error.abs() <= policy.dead_band_pct {
            self.clear_auto_adjusting("target size reached");
            self.settle();
            return None;
        }

        if self.state.stable_frame_count <= policy.min_stable_frames {
            self.settle();
            return None;
        }

        let current = self.state.current_zoom;
        let delta = (error * policy.gain * current).clamp(-policy.max_step, policy.max_step);
        let level = self.caps.clamp(current + delta, policy.zoom_ceiling);

        if (level - current).abs() < self.granularity() {
            self.settle();
            return None;
        }

        debug!(
            error,
            from = current,
            to = level,
            stable_frames = self.state.stable_frame_count,
            "Auto zoom step"
        );

        self.state.stable_frame_count = 0;
        self.state.is_auto_adjusting = true;
        Some(self.command(level, ZoomSource::Auto))
    }

    /// Start the manual cooldown window. Every manual zoom path calls this.
    pub fn notify_manual_zoom(&mut self, now_ms: u64) {
        self.state.cooldown_until_ms = now_ms.saturating_add(self.policy.manual_cooldown_ms);
        self.state.stable_frame_count = 0;
        self.clear_auto_adjusting("manual zoom");
    }

    /// Keep auto-zoom suppressed until at least `until_ms`.
    pub fn hold_cooldown_until(&mut self, until_ms: u64) {
        self.state.cooldown_until_ms = self.state.cooldown_until_ms.max(until_ms);
    }

    /// Request a user-chosen level. Engages the cooldown and supersedes any
    /// pending auto command.
    pub fn set_manual_zoom(&mut self, level: f64, now_ms: u64) -> Option<ZoomCommand> {
        self.notify_manual_zoom(now_ms);

        let level = self.caps.clamp(level, self.policy.zoom_ceiling);
        // Compare against where the camera is heading, not where it was
        let reference = self.pending.unwrap_or(self.state.current_zoom);
        let delta = (level - reference).abs();
        let at_bound = level <= self.caps.min || level >= self.effective_max();
        if delta < f64::EPSILON || (delta < self.granularity() && !at_bound) {
            return None;
        }

        Some(self.command(level, ZoomSource::Manual))
    }

    /// The camera accepted `level`.
    pub fn confirm_applied(&mut self, level: f64) {
        self.state.current_zoom = level;
        if self.is_pending(level) {
            self.pending = None;
            self.settle();
        }
    }

    /// The camera rejected `level`. The current level stays as it was.
    pub fn reject_applied(&mut self, level: f64, error: &VisionError) {
        warn!(level, current = self.state.current_zoom, "Zoom apply rejected: {}", error);
        metrics::record_zoom_rejection();
        if self.is_pending(level) {
            self.pending = None;
            self.settle();
        }
    }

    fn command(&mut self, level: f64, source: ZoomSource) -> ZoomCommand {
        self.pending = Some(level);
        self.phase = ZoomPhase::Commanding;
        metrics::record_zoom_command(source.as_str(), level);
        ZoomCommand { level, source }
    }

    fn is_pending(&self, level: f64) -> bool {
        self.pending.is_some_and(|p| (p - level).abs() < f64::EPSILON)
    }

    fn settle(&mut self) {
        if self.pending.is_none() {
            self.phase = ZoomPhase::Idle;
        }
    }

    fn clear_auto_adjusting(&mut self, reason: &str) {
        if self.state.is_auto_adjusting {
            debug!(reason, "Auto zoom settled");
            self.state.is_auto_adjusting = false;
        }
    }
}
