//! Detection backend selection and dispatch.
//!
//! Exactly one backend serves a session, chosen once from the platform
//! capability probe:
//!
//! 1. **Native** - platform barcode detector, asynchronous. At most one call
//!    is in flight; a tick that finds one pending contributes nothing.
//! 2. **Fallback** - [`FrameAnalyzer`] edge statistics, synchronous, never
//!    skipped.
//!
//! Native results travel back to the loop over a channel. Every launch and
//! every [`DetectionBackend::shutdown`] bumps a generation counter, and only
//! a result carrying the current generation releases the in-flight guard.
//! Stale results, including those landing after shutdown, are dropped.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use scanzoom_models::{PixelRect, PlatformCaps, Roi};

use crate::analyzer::FrameAnalyzer;
use crate::config::AnalyzerConfig;
use crate::error::VisionResult;
use crate::frame::Frame;
use crate::metrics;

/// A barcode reported by a native detector.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedBarcode {
    /// Bounding box in source-frame pixels
    pub bounding_box: PixelRect,
    /// Symbology name as reported by the platform
    pub format: String,
    /// Decoded text, when the platform decodes as it detects
    pub raw_value: Option<String>,
}

/// Platform-provided barcode detector.
#[async_trait]
pub trait NativeDetector: Send + Sync {
    /// Detect barcodes in a frame.
    async fn detect(&self, frame: Frame) -> VisionResult<Vec<DetectedBarcode>>;

    /// Human-readable name for logging.
    fn name(&self) -> &'static str {
        "native"
    }
}

/// Which backend a session runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Native,
    Fallback,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Native => "native",
            BackendKind::Fallback => "fallback",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of one `detect` call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Detection {
    /// Region found this tick, if any
    pub roi: Option<Roi>,
    /// Texts decoded by the native backend alongside localization
    pub decoded: Vec<String>,
    /// A native call was still pending, so no new one was started
    pub skipped: bool,
}

/// Pick the largest-area candidate.
pub fn largest_candidate(candidates: &[DetectedBarcode]) -> Option<&DetectedBarcode> {
    candidates.iter().max_by(|a, b| {
        a.bounding_box
            .area()
            .partial_cmp(&b.bounding_box.area())
            .unwrap_or(std::cmp::Ordering::Equal)
    })
}

/// Choose the backend for a session.
///
/// Native is used only when the platform advertises it, is not in the
/// known-unsupported set, and a detector handle was actually provided.
pub fn select_backend(
    platform: &PlatformCaps,
    native: Option<Arc<dyn NativeDetector>>,
    analyzer: AnalyzerConfig,
) -> DetectionBackend {
    match native {
        Some(detector) if platform.supports_native_detection() => {
            info!(
                backend = %BackendKind::Native,
                detector = detector.name(),
                platform = %platform.family,
                "Detection backend selected"
            );
            DetectionBackend::Native(NativeBackend::new(detector))
        }
        native => {
            if native.is_some() {
                warn!(
                    platform = %platform.family,
                    "Native detector provided but platform is not eligible, using fallback"
                );
            }
            info!(
                backend = %BackendKind::Fallback,
                platform = %platform.family,
                "Detection backend selected"
            );
            DetectionBackend::Fallback(FallbackBackend::new(analyzer))
        }
    }
}

/// The backend serving a session. Never switches after construction.
pub enum DetectionBackend {
    Native(NativeBackend),
    Fallback(FallbackBackend),
}

impl DetectionBackend {
    pub fn kind(&self) -> BackendKind {
        match self {
            DetectionBackend::Native(_) => BackendKind::Native,
            DetectionBackend::Fallback(_) => BackendKind::Fallback,
        }
    }

    /// Run one detection step for `frame`. Never fails: backend errors are
    /// logged and reported as "nothing found".
    pub fn detect(&mut self, frame: &Frame) -> Detection {
        let detection = match self {
            DetectionBackend::Native(native) => native.detect(frame),
            DetectionBackend::Fallback(fallback) => fallback.detect(frame),
        };
        if !detection.skipped {
            metrics::record_detection(self.kind().as_str(), detection.roi.is_some());
        }
        detection
    }

    /// Whether a native call is pending. Always false for the fallback.
    pub fn in_flight(&self) -> bool {
        match self {
            DetectionBackend::Native(native) => native.in_flight(),
            DetectionBackend::Fallback(_) => false,
        }
    }

    /// Stop accepting results. Idempotent.
    pub fn shutdown(&mut self) {
        if let DetectionBackend::Native(native) = self {
            native.shutdown();
        }
    }
}

/// Synchronous edge-analysis backend.
pub struct FallbackBackend {
    analyzer: FrameAnalyzer,
}

impl FallbackBackend {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self {
            analyzer: FrameAnalyzer::new(config),
        }
    }

    fn detect(&mut self, frame: &Frame) -> Detection {
        Detection {
            roi: self.analyzer.analyze(frame),
            ..Default::default()
        }
    }
}

struct NativeOutcome {
    generation: u64,
    frame_width: u32,
    frame_height: u32,
    result: VisionResult<Vec<DetectedBarcode>>,
}

/// Asynchronous native backend with a single-call in-flight guard.
pub struct NativeBackend {
    detector: Arc<dyn NativeDetector>,
    pending: Option<JoinHandle<()>>,
    generation: u64,
    closed: bool,
    results_tx: mpsc::UnboundedSender<NativeOutcome>,
    results_rx: mpsc::UnboundedReceiver<NativeOutcome>,
}

impl NativeBackend {
    pub fn new(detector: Arc<dyn NativeDetector>) -> Self {
        let (results_tx, results_rx) = mpsc::unbounded_channel();
        Self {
            detector,
            pending: None,
            generation: 0,
            closed: false,
            results_tx,
            results_rx,
        }
    }

    pub fn in_flight(&self) -> bool {
        self.pending.is_some()
    }

    fn detect(&mut self, frame: &Frame) -> Detection {
        if self.closed {
            return Detection::default();
        }

        let mut detection = self.collect_completed();

        if self.pending.is_some() {
            debug!("Native detection still in flight, skipping tick");
            metrics::record_native_skipped();
            detection.skipped = true;
            return detection;
        }

        self.launch(frame.clone());
        detection
    }

    /// Drain completed calls. Only the result of the current call clears
    /// the in-flight guard.
    fn collect_completed(&mut self) -> Detection {
        // Sampled before draining: a finished task has already sent its result
        let finished = self.pending.as_ref().is_some_and(|h| h.is_finished());
        let mut detection = Detection::default();

        while let Ok(outcome) = self.results_rx.try_recv() {
            if outcome.generation != self.generation || self.pending.is_none() {
                continue;
            }
            self.pending = None;

            match outcome.result {
                Ok(candidates) => {
                    detection.roi = largest_candidate(&candidates).and_then(|best| {
                        Roi::from_pixel_rect(
                            &best.bounding_box,
                            outcome.frame_width,
                            outcome.frame_height,
                            1.0,
                        )
                    });
                    detection.decoded = candidates
                        .into_iter()
                        .filter_map(|c| c.raw_value)
                        .filter(|v| !v.is_empty())
                        .collect();
                }
                Err(e) => {
                    warn!(detector = self.detector.name(), "Native detection failed: {}", e);
                    metrics::record_detector_failure();
                    detection = Detection::default();
                }
            }
        }

        // A task that finished without reporting panicked or was aborted
        if finished && self.pending.is_some() {
            warn!(detector = self.detector.name(), "Native detection task ended without a result");
            metrics::record_detector_failure();
            self.pending = None;
        }

        detection
    }

    fn launch(&mut self, frame: Frame) {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!("No async runtime available, native detection disabled for this tick");
                return;
            }
        };

        let detector = Arc::clone(&self.detector);
        let tx = self.results_tx.clone();
        self.generation = self.generation.wrapping_add(1);
        let generation = self.generation;
        let (frame_width, frame_height) = (frame.width(), frame.height());

        self.pending = Some(runtime.spawn(async move {
            let result = detector.detect(frame).await;
            // Receiver gone means the session was torn down
            let _ = tx.send(NativeOutcome {
                generation,
                frame_width,
                frame_height,
                result,
            });
        }));
    }

    fn shutdown(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.generation = self.generation.wrapping_add(1);
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
        self.results_rx.close();
    }
}
