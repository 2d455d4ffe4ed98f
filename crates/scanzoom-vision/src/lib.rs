#![deny(unreachable_patterns)]
//! Barcode targeting and auto-zoom for live camera preview.
//!
//! This crate provides:
//! - Barcode localization, native or by contrast-edge statistics
//! - Dual-rate temporal smoothing with loss tolerance
//! - Proportional auto-zoom with cooldown, centering, dead-band and stability gates
//! - Touch gesture interpretation (pinch, double-tap, tap-to-focus, swipe)
//! - A cooperative per-frame capture loop with idempotent teardown
//!
//! # Pipeline
//!
//! ```text
//!  FrameSource ──► DetectionBackend ──► TrackingSmoother ──► ZoomController ──► CameraDevice
//!                  (native | fallback)   (target, display)        ▲
//!                                                                  │ cooldown
//!  TouchEvent ───► GestureInterpreter ───── SetZoom / ResetZoom ───┘
//! ```

pub mod analyzer;
pub mod backend;
pub mod config;
pub mod decode;
pub mod device;
pub mod error;
pub mod frame;
pub mod gesture;
pub mod metrics;
pub mod session;
pub mod smoother;
pub mod zoom;

pub use analyzer::FrameAnalyzer;
pub use backend::{
    largest_candidate, select_backend, BackendKind, DetectedBarcode, Detection, DetectionBackend,
    NativeDetector,
};
pub use config::{
    AnalyzerConfig, DecodeConfig, GestureConfig, LoopConfig, ScannerConfig, SmoothingConfig,
    ZoomPolicy,
};
pub use decode::DecodeGate;
pub use device::CameraDevice;
pub use error::{VisionError, VisionResult};
pub use frame::{Frame, FrameSource, ScratchCanvas, SourceState};
pub use gesture::{
    FocusIndicator, GestureIntent, GestureInterpreter, TouchEvent, TouchPhase, TouchPoint,
    ZoomContext,
};
pub use session::{
    ScannerCommand, ScannerEvent, ScannerHandle, ScannerSession, ScannerView, TickOutcome,
    TickReport,
};
pub use smoother::{lerp, TrackingSmoother, TrackingUpdate};
pub use zoom::{ZoomCommand, ZoomController, ZoomPhase, ZoomSource, ZoomState};

pub use scanzoom_models::{PixelRect, PlatformCaps, PlatformFamily, Roi, ZoomCapabilities};
