//! Touch gesture interpretation.
//!
//! Raw touch events become zoom, focus and panel intents. Each touch
//! sequence runs `Start -> (Pinching | Tapping | Swiping) -> End`.
//!
//! | gesture | intent |
//! |---|---|
//! | two-finger pinch | `SetZoom` relative to the zoom at pinch start |
//! | double tap | `ResetZoom(hardware_min)` |
//! | short still tap | `FocusAt { x, y }` |
//! | vertical swipe | `OpenPanel` / `ClosePanel`, at most once per gesture |
//!
//! Zoom intents are manual: whoever applies them must also engage the
//! auto-zoom cooldown.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::GestureConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TouchPhase {
    Start,
    Move,
    End,
    Cancel,
}

/// A touch point in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TouchPoint {
    pub x: f64,
    pub y: f64,
}

impl TouchPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &TouchPoint) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// One input event with every finger currently on the screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TouchEvent {
    pub phase: TouchPhase,
    pub touches: Vec<TouchPoint>,
    pub timestamp_ms: u64,
}

impl TouchEvent {
    pub fn new(phase: TouchPhase, touches: Vec<TouchPoint>, timestamp_ms: u64) -> Self {
        Self {
            phase,
            touches,
            timestamp_ms,
        }
    }
}

/// Zoom range and level the gesture is interpreted against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomContext {
    pub current_zoom: f64,
    pub min: f64,
    pub max: f64,
}

impl ZoomContext {
    pub fn range(&self) -> f64 {
        (self.max - self.min).max(0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GestureIntent {
    SetZoom { level: f64 },
    ResetZoom { level: f64 },
    FocusAt { x: f64, y: f64 },
    OpenPanel,
    ClosePanel,
}

/// Transient tap-to-focus marker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FocusIndicator {
    pub x: f64,
    pub y: f64,
    pub expires_at_ms: u64,
}

#[derive(Debug, Clone, Copy)]
enum GestureState {
    Idle,
    Pinching {
        initial_distance: f64,
        baseline_zoom: f64,
    },
    Tapping {
        origin: TouchPoint,
        started_ms: u64,
        double_tap: bool,
    },
    Swiping {
        origin: TouchPoint,
        fired: bool,
    },
}

pub struct GestureInterpreter {
    config: GestureConfig,
    state: GestureState,
    last_tap_end_ms: Option<u64>,
    panel_open: bool,
    focus: Option<FocusIndicator>,
}

impl GestureInterpreter {
    pub fn new(config: GestureConfig) -> Self {
        Self {
            config,
            state: GestureState::Idle,
            last_tap_end_ms: None,
            panel_open: false,
            focus: None,
        }
    }

    /// Sync with the panel state the UI actually shows.
    pub fn set_panel_open(&mut self, open: bool) {
        self.panel_open = open;
    }

    pub fn is_panel_open(&self) -> bool {
        self.panel_open
    }

    /// The focus marker, while it is still visible.
    pub fn focus_indicator(&self, now_ms: u64) -> Option<FocusIndicator> {
        self.focus.filter(|f| now_ms < f.expires_at_ms)
    }

    pub fn handle(&mut self, event: &TouchEvent, ctx: &ZoomContext) -> Vec<GestureIntent> {
        match event.phase {
            TouchPhase::Start => self.on_start(event, ctx),
            TouchPhase::Move => self.on_move(event, ctx),
            TouchPhase::End => self.on_end(event),
            TouchPhase::Cancel => {
                self.state = GestureState::Idle;
                Vec::new()
            }
        }
    }

    fn on_start(&mut self, event: &TouchEvent, ctx: &ZoomContext) -> Vec<GestureIntent> {
        let now = event.timestamp_ms;

        match event.touches.as_slice() {
            [a, b, ..] => {
                let initial_distance = a.distance(b);
                self.last_tap_end_ms = None;
                self.state = if initial_distance > f64::EPSILON {
                    GestureState::Pinching {
                        initial_distance,
                        baseline_zoom: ctx.current_zoom,
                    }
                } else {
                    GestureState::Idle
                };
                Vec::new()
            }
            [origin] => {
                let double_tap = self
                    .last_tap_end_ms
                    .is_some_and(|last| now.saturating_sub(last) <= self.config.double_tap_window_ms);

                self.state = GestureState::Tapping {
                    origin: *origin,
                    started_ms: now,
                    double_tap,
                };

                if double_tap {
                    debug!(level = ctx.min, "Double tap, resetting zoom");
                    self.last_tap_end_ms = None;
                    vec![GestureIntent::ResetZoom { level: ctx.min }]
                } else {
                    Vec::new()
                }
            }
            [] => Vec::new(),
        }
    }

    fn on_move(&mut self, event: &TouchEvent, ctx: &ZoomContext) -> Vec<GestureIntent> {
        match self.state {
            GestureState::Pinching {
                initial_distance,
                baseline_zoom,
            } => {
                let [a, b, ..] = event.touches.as_slice() else {
                    return Vec::new();
                };
                let scale = a.distance(b) / initial_distance;
                let level = (baseline_zoom + (scale - 1.0) * ctx.range() * self.config.pinch_sensitivity)
                    .clamp(ctx.min, ctx.max);
                vec![GestureIntent::SetZoom { level }]
            }
            GestureState::Tapping { origin, .. } => {
                let Some(point) = event.touches.first() else {
                    return Vec::new();
                };
                if origin.distance(point) <= self.config.tap_max_movement_px {
                    return Vec::new();
                }
                self.state = GestureState::Swiping { origin, fired: false };
                self.swipe(point)
            }
            GestureState::Swiping { .. } => match event.touches.first() {
                Some(point) => self.swipe(point),
                None => Vec::new(),
            },
            GestureState::Idle => Vec::new(),
        }
    }

    /// Edge-triggered panel toggle; fires at most once per gesture.
    fn swipe(&mut self, point: &TouchPoint) -> Vec<GestureIntent> {
        let GestureState::Swiping { origin, fired } = &mut self.state else {
            return Vec::new();
        };
        if *fired {
            return Vec::new();
        }

        // Positive when the finger moved up
        let rise = origin.y - point.y;
        let threshold = self.config.swipe_threshold_px;

        let intent = if !self.panel_open && rise > threshold {
            GestureIntent::OpenPanel
        } else if self.panel_open && -rise > threshold {
            GestureIntent::ClosePanel
        } else {
            return Vec::new();
        };

        *fired = true;
        self.panel_open = intent == GestureIntent::OpenPanel;
        vec![intent]
    }

    fn on_end(&mut self, event: &TouchEvent) -> Vec<GestureIntent> {
        let now = event.timestamp_ms;
        let state = std::mem::replace(&mut self.state, GestureState::Idle);

        let GestureState::Tapping {
            origin,
            started_ms,
            double_tap,
        } = state
        else {
            return Vec::new();
        };

        if double_tap {
            return Vec::new();
        }

        let quick = now.saturating_sub(started_ms) < self.config.tap_max_duration_ms;
        let still = event
            .touches
            .first()
            .map_or(true, |p| origin.distance(p) < self.config.tap_max_movement_px);

        if !(quick && still) {
            return Vec::new();
        }

        self.last_tap_end_ms = Some(now);
        self.focus = Some(FocusIndicator {
            x: origin.x,
            y: origin.y,
            expires_at_ms: now.saturating_add(self.config.focus_indicator_ms),
        });
        vec![GestureIntent::FocusAt {
            x: origin.x,
            y: origin.y,
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(current_zoom: f64) -> ZoomContext {
        ZoomContext {
            current_zoom,
            min: 1.0,
            max: 8.0,
        }
    }

    fn one(phase: TouchPhase, x: f64, y: f64, t: u64) -> TouchEvent {
        TouchEvent::new(phase, vec![TouchPoint::new(x, y)], t)
    }

    fn two(phase: TouchPhase, spread: f64, t: u64) -> TouchEvent {
        TouchEvent::new(
            phase,
            vec![TouchPoint::new(200.0 - spread / 2.0, 300.0), TouchPoint::new(200.0 + spread / 2.0, 300.0)],
            t,
        )
    }

    fn interpreter() -> GestureInterpreter {
        GestureInterpreter::new(GestureConfig::default())
    }

    #[test]
    fn test_pinch_out_increases_zoom_within_range() {
        let mut gi = interpreter();
        assert!(gi.handle(&two(TouchPhase::Start, 100.0, 0), &ctx(1.0)).is_empty());

        let intents = gi.handle(&two(TouchPhase::Move, 150.0, 16), &ctx(1.0));
        let [GestureIntent::SetZoom { level }] = intents.as_slice() else {
            panic!("expected one SetZoom, got {:?}", intents);
        };
        assert!(*level > 1.0 && *level <= 8.0);
        assert!((level - 3.8).abs() < 1e-9);
    }

    #[test]
    fn test_pinch_uses_baseline_not_live_zoom() {
        let mut gi = interpreter();
        gi.handle(&two(TouchPhase::Start, 100.0, 0), &ctx(2.0));

        // Live zoom moved on, the pinch still maps from its own baseline
        let intents = gi.handle(&two(TouchPhase::Move, 110.0, 16), &ctx(6.0));
        assert_eq!(intents.len(), 1);
        match intents[0] {
            GestureIntent::SetZoom { level } => assert!((level - 2.56).abs() < 1e-9),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_pinch_clamped() {
        let mut gi = interpreter();
        gi.handle(&two(TouchPhase::Start, 100.0, 0), &ctx(4.0));
        let out = gi.handle(&two(TouchPhase::Move, 1000.0, 16), &ctx(4.0));
        assert_eq!(out, vec![GestureIntent::SetZoom { level: 8.0 }]);
        let pinched = gi.handle(&two(TouchPhase::Move, 5.0, 32), &ctx(4.0));
        assert_eq!(pinched, vec![GestureIntent::SetZoom { level: 1.0 }]);
    }

    #[test]
    fn test_tap_emits_focus_and_expires() {
        let mut gi = interpreter();
        gi.handle(&one(TouchPhase::Start, 120.0, 80.0, 1_000), &ctx(1.0));
        let intents = gi.handle(&one(TouchPhase::End, 122.0, 81.0, 1_100), &ctx(1.0));
        assert_eq!(intents, vec![GestureIntent::FocusAt { x: 120.0, y: 80.0 }]);

        assert!(gi.focus_indicator(1_500).is_some());
        assert!(gi.focus_indicator(2_099).is_some());
        assert!(gi.focus_indicator(2_100).is_none());
    }

    #[test]
    fn test_long_press_is_not_a_tap() {
        let mut gi = interpreter();
        gi.handle(&one(TouchPhase::Start, 10.0, 10.0, 0), &ctx(1.0));
        assert!(gi.handle(&one(TouchPhase::End, 10.0, 10.0, 800), &ctx(1.0)).is_empty());
        assert!(gi.focus_indicator(800).is_none());
    }

    #[test]
    fn test_double_tap_resets_to_minimum() {
        for current in [1.0, 2.5, 8.0] {
            let mut gi = interpreter();
            gi.handle(&one(TouchPhase::Start, 50.0, 50.0, 0), &ctx(current));
            gi.handle(&one(TouchPhase::End, 50.0, 50.0, 80), &ctx(current));

            let intents = gi.handle(&one(TouchPhase::Start, 52.0, 50.0, 250), &ctx(current));
            assert_eq!(intents, vec![GestureIntent::ResetZoom { level: 1.0 }]);

            // The second tap does not also focus
            assert!(gi.handle(&one(TouchPhase::End, 52.0, 50.0, 300), &ctx(current)).is_empty());
        }
    }

    #[test]
    fn test_slow_second_tap_is_not_double() {
        let mut gi = interpreter();
        gi.handle(&one(TouchPhase::Start, 50.0, 50.0, 0), &ctx(3.0));
        gi.handle(&one(TouchPhase::End, 50.0, 50.0, 80), &ctx(3.0));
        assert!(gi.handle(&one(TouchPhase::Start, 50.0, 50.0, 500), &ctx(3.0)).is_empty());
    }

    #[test]
    fn test_swipe_up_opens_once() {
        let mut gi = interpreter();
        gi.handle(&one(TouchPhase::Start, 200.0, 600.0, 0), &ctx(1.0));

        let mut opened = 0;
        for (i, y) in [590.0, 560.0, 540.0, 500.0, 400.0, 300.0].iter().enumerate() {
            let out = gi.handle(&one(TouchPhase::Move, 200.0, *y, 16 * (i as u64 + 1)), &ctx(1.0));
            opened += out.iter().filter(|i| **i == GestureIntent::OpenPanel).count();
        }
        assert_eq!(opened, 1);
        assert!(gi.is_panel_open());

        // Swipe is not a tap
        assert!(gi.handle(&one(TouchPhase::End, 200.0, 300.0, 120), &ctx(1.0)).is_empty());
    }

    #[test]
    fn test_swipe_down_closes_open_panel() {
        let mut gi = interpreter();
        gi.set_panel_open(true);
        gi.handle(&one(TouchPhase::Start, 200.0, 100.0, 0), &ctx(1.0));

        // Upward drag does nothing while open
        assert!(gi.handle(&one(TouchPhase::Move, 200.0, 20.0, 16), &ctx(1.0)).is_empty());

        let mut gi = interpreter();
        gi.set_panel_open(true);
        gi.handle(&one(TouchPhase::Start, 200.0, 100.0, 0), &ctx(1.0));
        let out = gi.handle(&one(TouchPhase::Move, 200.0, 200.0, 16), &ctx(1.0));
        assert_eq!(out, vec![GestureIntent::ClosePanel]);
        assert!(gi.handle(&one(TouchPhase::Move, 200.0, 300.0, 32), &ctx(1.0)).is_empty());
        assert!(!gi.is_panel_open());
    }

    #[test]
    fn test_cancel_drops_gesture() {
        let mut gi = interpreter();
        gi.handle(&one(TouchPhase::Start, 10.0, 10.0, 0), &ctx(1.0));
        gi.handle(&TouchEvent::new(TouchPhase::Cancel, vec![], 10), &ctx(1.0));
        assert!(gi.handle(&one(TouchPhase::End, 10.0, 10.0, 20), &ctx(1.0)).is_empty());
    }
}
