//! Capture loop state.
//!
//! [`ScannerSession`] owns every piece of mutable loop state: the detection
//! backend, both smoothers, the zoom controller, the gesture interpreter and
//! the decode gate. It is driven one synchronous [`ScannerSession::tick`] at
//! a time; nothing in a tick awaits. Camera calls are spawned and report
//! back through an internal channel that the next tick (or the driver)
//! drains, so no background task ever touches loop state directly.
//!
//! [`ScannerSession::spawn`] moves the session onto a tokio task and returns
//! a [`ScannerHandle`] for the UI side.

mod driver;

pub use driver::{ScannerCommand, ScannerHandle};

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, Notify};
use tracing::{debug, info, warn};

use scanzoom_models::{PlatformCaps, Roi, ScanHistory, ZoomCapabilities, DEFAULT_HISTORY_CAPACITY};

use crate::backend::{select_backend, BackendKind, DetectionBackend, NativeDetector};
use crate::config::ScannerConfig;
use crate::decode::DecodeGate;
use crate::device::CameraDevice;
use crate::error::{VisionError, VisionResult};
use crate::frame::{FrameSource, SourceState};
use crate::gesture::{FocusIndicator, GestureIntent, GestureInterpreter, TouchEvent, ZoomContext};
use crate::metrics;
use crate::smoother::TrackingSmoother;
use crate::zoom::{ZoomCommand, ZoomController};

/// State the UI renders, refreshed at loop cadence.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScannerView {
    /// Fast-smoothed box the zoom controller steers on
    pub tracking_box: Option<Roi>,
    /// Slow-smoothed box for drawing
    pub display_box: Option<Roi>,
    pub is_auto_zooming: bool,
    /// `None` when the camera has no zoom
    pub current_zoom: Option<f64>,
    pub focus: Option<FocusIndicator>,
    pub torch_on: bool,
    pub panel_open: bool,
}

/// Notifications for the host application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScannerEvent {
    /// Fired once per accepted decode
    CodeDecoded { code: String },
    PanelOpened,
    PanelClosed,
}

/// What one tick did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// Session was closed
    Closed,
    /// Tracking is disabled on this platform
    Disabled,
    /// Source paused, ended or had no frame
    NoFrame(SourceState),
    Tracked(TickReport),
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TickReport {
    /// A native call was still pending; nothing was fed to the smoother
    pub detection_skipped: bool,
    pub detected: bool,
    /// Tracking was reset after too many misses
    pub tracking_reset: bool,
    pub zoom: Option<ZoomCommand>,
}

enum DeviceOutcome {
    /// `epoch` is the camera epoch the apply was issued under
    Zoom { epoch: u64, level: f64, result: VisionResult<()> },
    Torch { on: bool, result: VisionResult<()> },
    CameraSwitch { result: VisionResult<()> },
}

struct TrackingPipeline {
    backend: DetectionBackend,
    smoother: TrackingSmoother,
}

pub struct ScannerSession {
    config: ScannerConfig,
    source: Box<dyn FrameSource>,
    camera: Arc<dyn CameraDevice>,
    tracking: Option<TrackingPipeline>,
    zoom: Option<ZoomController>,
    gestures: GestureInterpreter,
    decode: DecodeGate,
    history: ScanHistory,
    torch_on: bool,
    /// Bumped on every completed camera switch
    camera_epoch: u64,
    pending_events: Vec<ScannerEvent>,
    device_tx: mpsc::UnboundedSender<DeviceOutcome>,
    device_rx: mpsc::UnboundedReceiver<DeviceOutcome>,
    device_notify: Arc<Notify>,
    closed: bool,
}

impl ScannerSession {
    /// Build a session. Capabilities are probed here, once.
    ///
    /// Without camera introspection no tracking pipeline is created at all;
    /// gestures and manual zoom keep working.
    pub fn new(
        config: ScannerConfig,
        platform: PlatformCaps,
        source: Box<dyn FrameSource>,
        camera: Arc<dyn CameraDevice>,
        native: Option<Arc<dyn NativeDetector>>,
    ) -> VisionResult<Self> {
        config.validate()?;

        let tracking = if platform.camera_introspection {
            Some(TrackingPipeline {
                backend: select_backend(&platform, native, config.analyzer.clone()),
                smoother: TrackingSmoother::new(config.smoothing.clone()),
            })
        } else {
            info!(platform = %platform.family, "Camera introspection unavailable, tracking disabled");
            None
        };

        let zoom = build_zoom(camera.zoom_capabilities(), &config);
        let (device_tx, device_rx) = mpsc::unbounded_channel();

        Ok(Self {
            gestures: GestureInterpreter::new(config.gesture.clone()),
            decode: DecodeGate::new(&config.decode),
            history: ScanHistory::with_capacity(DEFAULT_HISTORY_CAPACITY),
            config,
            source,
            camera,
            tracking,
            zoom,
            torch_on: false,
            camera_epoch: 0,
            pending_events: Vec::new(),
            device_tx,
            device_rx,
            device_notify: Arc::new(Notify::new()),
            closed: false,
        })
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    pub fn is_tracking_enabled(&self) -> bool {
        self.tracking.is_some()
    }

    pub fn backend_kind(&self) -> Option<BackendKind> {
        self.tracking.as_ref().map(|t| t.backend.kind())
    }

    pub fn zoom(&self) -> Option<&ZoomController> {
        self.zoom.as_ref()
    }

    pub fn history(&self) -> &ScanHistory {
        &self.history
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Run one frame: detect, smooth, maybe zoom. Never blocks.
    pub fn tick(&mut self, now_ms: u64) -> TickOutcome {
        if self.closed {
            return TickOutcome::Closed;
        }
        metrics::record_tick();
        self.poll_device_results();

        let Some(tracking) = self.tracking.as_mut() else {
            return TickOutcome::Disabled;
        };

        let state = self.source.state();
        if state != SourceState::Live {
            return TickOutcome::NoFrame(state);
        }
        let Some(frame) = self.source.current_frame() else {
            return TickOutcome::NoFrame(state);
        };

        let detection = tracking.backend.detect(&frame);
        let mut report = TickReport {
            detection_skipped: detection.skipped,
            detected: detection.roi.is_some(),
            ..Default::default()
        };

        if !detection.skipped {
            let update = tracking.smoother.update(detection.roi);
            report.tracking_reset = update.reset;

            if let Some(zoom) = self.zoom.as_mut() {
                report.zoom = zoom.evaluate(update.target.as_ref(), now_ms);
            }
        }

        if let Some(cmd) = report.zoom {
            self.apply_zoom(cmd);
        }
        for code in detection.decoded {
            self.submit_decoded(&code, now_ms);
        }

        TickOutcome::Tracked(report)
    }

    /// Feed a touch event. Zoom intents are applied as manual zoom.
    pub fn handle_touch(&mut self, event: &TouchEvent, now_ms: u64) -> Vec<GestureIntent> {
        if self.closed {
            return Vec::new();
        }

        let ctx = self.zoom_context();
        let intents = self.gestures.handle(event, &ctx);

        for intent in &intents {
            match *intent {
                GestureIntent::SetZoom { level } | GestureIntent::ResetZoom { level } => {
                    self.set_manual_zoom(level, now_ms);
                }
                GestureIntent::OpenPanel => self.pending_events.push(ScannerEvent::PanelOpened),
                GestureIntent::ClosePanel => self.pending_events.push(ScannerEvent::PanelClosed),
                GestureIntent::FocusAt { x, y } => debug!(x, y, "Tap to focus"),
            }
        }
        intents
    }

    /// Hold off auto-zoom after an external manual zoom control was used.
    pub fn notify_manual_zoom(&mut self, now_ms: u64) {
        if let Some(zoom) = self.zoom.as_mut() {
            zoom.notify_manual_zoom(now_ms);
        }
    }

    /// Apply a user-chosen zoom level.
    pub fn set_manual_zoom(&mut self, level: f64, now_ms: u64) {
        let Some(zoom) = self.zoom.as_mut() else {
            debug!(level, "Manual zoom ignored, camera has no zoom");
            return;
        };
        if let Some(cmd) = zoom.set_manual_zoom(level, now_ms) {
            self.apply_zoom(cmd);
        }
    }

    pub fn set_panel_open(&mut self, open: bool) {
        self.gestures.set_panel_open(open);
    }

    /// Report a decoded code. Returns whether it was accepted.
    pub fn submit_decoded(&mut self, code: &str, now_ms: u64) -> bool {
        if self.closed || !self.decode.accept(code, now_ms) {
            return false;
        }

        let code = code.trim();
        let entry = self.history.record(code, None, now_ms as i64);
        info!(code, occurrences = entry.occurrence_count, "Code decoded");
        metrics::record_code_decoded();
        self.pending_events.push(ScannerEvent::CodeDecoded {
            code: code.to_string(),
        });
        true
    }

    /// Turn the torch on or off. Returns false when unsupported.
    pub fn set_torch(&mut self, on: bool) -> bool {
        if self.closed || !self.camera.supports_torch() {
            return false;
        }

        let previous = self.torch_on;
        self.torch_on = on;
        let camera = Arc::clone(&self.camera);
        let dispatched = self.dispatch(async move {
            DeviceOutcome::Torch {
                on,
                result: camera.set_torch(on).await,
            }
        });
        if let Err(e) = dispatched {
            warn!("Torch request dropped: {}", e);
            self.torch_on = previous;
            return false;
        }
        true
    }

    pub fn toggle_torch(&mut self) -> bool {
        self.set_torch(!self.torch_on)
    }

    /// Switch to the next camera. Zoom capabilities are re-probed once the
    /// switch completes.
    pub fn switch_camera(&mut self) -> bool {
        if self.closed || !self.camera.supports_camera_switch() {
            return false;
        }
        let camera = Arc::clone(&self.camera);
        self.dispatch(async move {
            DeviceOutcome::CameraSwitch {
                result: camera.switch_camera().await,
            }
        })
        .is_ok()
    }

    /// Snapshot of the render state.
    pub fn view(&self, now_ms: u64) -> ScannerView {
        let smoother = self.tracking.as_ref().map(|t| &t.smoother);
        ScannerView {
            tracking_box: smoother.and_then(|s| s.target().copied()),
            display_box: smoother.and_then(|s| s.display().copied()),
            is_auto_zooming: self.zoom.as_ref().is_some_and(|z| z.state().is_auto_adjusting),
            current_zoom: self.zoom.as_ref().map(|z| z.state().current_zoom),
            focus: self.gestures.focus_indicator(now_ms),
            torch_on: self.torch_on,
            panel_open: self.gestures.is_panel_open(),
        }
    }

    /// When the visible focus marker expires, if any.
    pub fn focus_deadline(&self, now_ms: u64) -> Option<u64> {
        self.gestures.focus_indicator(now_ms).map(|f| f.expires_at_ms)
    }

    /// Events produced since the last call.
    pub fn take_events(&mut self) -> Vec<ScannerEvent> {
        std::mem::take(&mut self.pending_events)
    }

    /// Apply finished camera calls to loop state.
    pub fn poll_device_results(&mut self) {
        while let Ok(outcome) = self.device_rx.try_recv() {
            match outcome {
                DeviceOutcome::Zoom { epoch, level, result } => {
                    if epoch != self.camera_epoch {
                        debug!(level, "Dropping zoom result from previous camera");
                        continue;
                    }
                    let Some(zoom) = self.zoom.as_mut() else {
                        continue;
                    };
                    match result {
                        Ok(()) => zoom.confirm_applied(level),
                        Err(e) => zoom.reject_applied(level, &e),
                    }
                }
                DeviceOutcome::Torch { on, result } => {
                    if let Err(e) = result {
                        warn!(on, "Torch change failed: {}", e);
                        if self.torch_on == on {
                            self.torch_on = !on;
                        }
                    }
                }
                DeviceOutcome::CameraSwitch { result } => match result {
                    Ok(()) => {
                        info!("Camera switched");
                        let cooldown_until = self.zoom.as_ref().map(|z| z.state().cooldown_until_ms);
                        self.camera_epoch = self.camera_epoch.wrapping_add(1);
                        self.zoom = build_zoom(self.camera.zoom_capabilities(), &self.config);
                        if let (Some(zoom), Some(until)) = (self.zoom.as_mut(), cooldown_until) {
                            zoom.hold_cooldown_until(until);
                        }
                        self.torch_on = false;
                        if let Some(tracking) = self.tracking.as_mut() {
                            tracking.smoother.reset();
                        }
                    }
                    Err(e) => warn!("Camera switch failed: {}", e),
                },
            }
        }
    }

    /// Stop the session. Idempotent; late camera and detector results are
    /// discarded.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Some(tracking) = self.tracking.as_mut() {
            tracking.backend.shutdown();
        }
        self.device_rx.close();
        info!("Scanner session closed");
    }

    /// Run the session on its own task.
    pub fn spawn(self) -> ScannerHandle {
        driver::spawn(self)
    }

    fn device_notifier(&self) -> Arc<Notify> {
        Arc::clone(&self.device_notify)
    }

    fn zoom_context(&self) -> ZoomContext {
        match &self.zoom {
            Some(zoom) => ZoomContext {
                current_zoom: zoom.state().current_zoom,
                min: zoom.state().hardware_min,
                max: zoom.effective_max(),
            },
            None => ZoomContext {
                current_zoom: 1.0,
                min: 1.0,
                max: 1.0,
            },
        }
    }

    /// Send a zoom level to the camera. An apply that does not resolve
    /// within the configured timeout is reported as rejected.
    fn apply_zoom(&mut self, cmd: ZoomCommand) {
        let camera = Arc::clone(&self.camera);
        let level = cmd.level;
        let epoch = self.camera_epoch;
        let timeout = Duration::from_millis(self.config.cadence.zoom_apply_timeout_ms);
        let dispatched = self.dispatch(async move {
            let result = match tokio::time::timeout(timeout, camera.apply_zoom(level)).await {
                Ok(result) => result,
                Err(_) => Err(VisionError::zoom_rejected(format!(
                    "apply did not resolve within {}ms",
                    timeout.as_millis()
                ))),
            };
            DeviceOutcome::Zoom { epoch, level, result }
        });
        if let (Err(e), Some(zoom)) = (dispatched, self.zoom.as_mut()) {
            zoom.reject_applied(level, &e);
        }
    }

    /// Fire-and-forget a camera call; its outcome comes back on the device
    /// channel.
    fn dispatch<F>(&self, call: F) -> VisionResult<()>
    where
        F: Future<Output = DeviceOutcome> + Send + 'static,
    {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| VisionError::internal("no async runtime for camera call"))?;
        let tx = self.device_tx.clone();
        let notify = Arc::clone(&self.device_notify);
        runtime.spawn(async move {
            if tx.send(call.await).is_ok() {
                notify.notify_one();
            }
        });
        Ok(())
    }
}

fn build_zoom(caps: Option<ZoomCapabilities>, config: &ScannerConfig) -> Option<ZoomController> {
    match caps {
        Some(caps) if caps.is_zoomable() => {
            info!(min = caps.min, max = caps.max, step = caps.step, "Zoom available");
            Some(ZoomController::new(caps, caps.min, config.zoom.clone()))
        }
        _ => {
            info!("Camera has no usable zoom, auto-zoom disabled");
            None
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::backend::DetectedBarcode;
    use crate::frame::Frame;
    use crate::gesture::{TouchPhase, TouchPoint};
    use async_trait::async_trait;
    use image::{Rgba, RgbaImage};
    use scanzoom_models::{PixelRect, PlatformFamily};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Frame source with a swappable frame and state.
    #[derive(Clone)]
    pub(crate) struct TestSource {
        inner: Arc<Mutex<(SourceState, Option<Frame>)>>,
    }

    impl TestSource {
        pub(crate) fn new(frame: Option<Frame>) -> Self {
            Self {
                inner: Arc::new(Mutex::new((SourceState::Live, frame))),
            }
        }

        pub(crate) fn set_state(&self, state: SourceState) {
            self.inner.lock().unwrap().0 = state;
        }
    }

    impl FrameSource for TestSource {
        fn state(&self) -> SourceState {
            self.inner.lock().unwrap().0
        }

        fn current_frame(&self) -> Option<Frame> {
            self.inner.lock().unwrap().1.clone()
        }
    }

    /// Camera that records applied levels and can be told to reject or
    /// to never answer.
    #[derive(Default)]
    pub(crate) struct TestCamera {
        pub(crate) caps: Option<ZoomCapabilities>,
        pub(crate) applied: Mutex<Vec<f64>>,
        pub(crate) reject: bool,
        pub(crate) hang: bool,
        pub(crate) torch: bool,
        pub(crate) switchable: bool,
    }

    impl TestCamera {
        pub(crate) fn zoomable() -> Self {
            Self {
                caps: Some(ZoomCapabilities::new(1.0, 8.0, 0.1)),
                torch: true,
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl CameraDevice for TestCamera {
        fn zoom_capabilities(&self) -> Option<ZoomCapabilities> {
            self.caps
        }

        async fn apply_zoom(&self, level: f64) -> VisionResult<()> {
            if self.hang {
                std::future::pending::<()>().await;
            }
            if self.reject {
                return Err(VisionError::zoom_rejected("device busy"));
            }
            self.applied.lock().unwrap().push(level);
            Ok(())
        }

        fn supports_torch(&self) -> bool {
            self.torch
        }

        async fn set_torch(&self, _on: bool) -> VisionResult<()> {
            Ok(())
        }

        fn supports_camera_switch(&self) -> bool {
            self.switchable
        }

        async fn switch_camera(&self) -> VisionResult<()> {
            Ok(())
        }
    }

    /// Native detector reporting a fixed barcode.
    pub(crate) struct FixedDetector(pub(crate) DetectedBarcode);

    #[async_trait]
    impl NativeDetector for FixedDetector {
        async fn detect(&self, _frame: Frame) -> VisionResult<Vec<DetectedBarcode>> {
            Ok(vec![self.0.clone()])
        }
    }

    pub(crate) fn blank_frame() -> Frame {
        Frame::new(RgbaImage::from_pixel(400, 300, Rgba([128, 128, 128, 255])), 0).unwrap()
    }

    /// A centered barcode 20% of the frame wide.
    pub(crate) fn small_centered_barcode() -> DetectedBarcode {
        DetectedBarcode {
            bounding_box: PixelRect::new(160.0, 135.0, 80.0, 30.0),
            format: "code_128".to_string(),
            raw_value: Some("SCAN-0001".to_string()),
        }
    }

    fn blink() -> PlatformCaps {
        PlatformCaps::new(PlatformFamily::Blink, true, true)
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = ScannerConfig::default();
        config.smoothing.target_alpha = 0.0;
        let result = ScannerSession::new(
            config,
            blink(),
            Box::new(TestSource::new(None)),
            Arc::new(TestCamera::zoomable()),
            None,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_no_introspection_disables_tracking() {
        let platform = PlatformCaps::new(PlatformFamily::Gecko, false, false);
        let mut session = ScannerSession::new(
            ScannerConfig::default(),
            platform,
            Box::new(TestSource::new(Some(blank_frame()))),
            Arc::new(TestCamera::zoomable()),
            None,
        )
        .unwrap();

        assert!(!session.is_tracking_enabled());
        assert!(session.backend_kind().is_none());
        assert_eq!(session.tick(0), TickOutcome::Disabled);
        assert!(session.zoom().is_some());
    }

    #[test]
    fn test_paused_source_skips_tick() {
        let source = TestSource::new(Some(blank_frame()));
        let mut session = ScannerSession::new(
            ScannerConfig::default(),
            PlatformCaps::default(),
            Box::new(source.clone()),
            Arc::new(TestCamera::zoomable()),
            None,
        )
        .unwrap();

        source.set_state(SourceState::Paused);
        assert_eq!(session.tick(0), TickOutcome::NoFrame(SourceState::Paused));
        source.set_state(SourceState::Live);
        assert!(matches!(session.tick(16), TickOutcome::Tracked(_)));
    }

    #[test]
    fn test_no_zoom_capabilities_still_tracks() {
        let mut session = ScannerSession::new(
            ScannerConfig::default(),
            PlatformCaps::default(),
            Box::new(TestSource::new(Some(blank_frame()))),
            Arc::new(TestCamera::default()),
            None,
        )
        .unwrap();

        assert!(session.zoom().is_none());
        assert!(matches!(session.tick(0), TickOutcome::Tracked(_)));
        assert_eq!(session.view(0).current_zoom, None);
    }

    #[tokio::test]
    async fn test_native_detection_drives_auto_zoom_and_decode() {
        let camera = Arc::new(TestCamera::zoomable());
        let detector: Arc<dyn NativeDetector> = Arc::new(FixedDetector(small_centered_barcode()));
        let mut session = ScannerSession::new(
            ScannerConfig::default(),
            blink(),
            Box::new(TestSource::new(Some(blank_frame()))),
            camera.clone(),
            Some(detector),
        )
        .unwrap();
        assert_eq!(session.backend_kind(), Some(BackendKind::Native));

        let mut commands = Vec::new();
        for t in 0..40u64 {
            if let TickOutcome::Tracked(report) = session.tick(t * 16) {
                commands.extend(report.zoom);
            }
            settle().await;
        }

        assert!(!commands.is_empty());
        assert!(commands[0].level > 1.0);
        assert!(!camera.applied.lock().unwrap().is_empty());
        assert!(session.view(640).current_zoom.unwrap() > 1.0);

        let events = session.take_events();
        assert_eq!(
            events,
            vec![ScannerEvent::CodeDecoded {
                code: "SCAN-0001".to_string()
            }]
        );
        assert_eq!(session.history().len(), 1);
    }

    #[tokio::test]
    async fn test_rejected_zoom_leaves_level() {
        let camera = Arc::new(TestCamera {
            reject: true,
            ..TestCamera::zoomable()
        });
        let mut session = ScannerSession::new(
            ScannerConfig::default(),
            PlatformCaps::default(),
            Box::new(TestSource::new(None)),
            camera,
            None,
        )
        .unwrap();

        session.set_manual_zoom(3.0, 0);
        settle().await;
        session.poll_device_results();
        assert_eq!(session.view(0).current_zoom, Some(1.0));
    }

    #[tokio::test]
    async fn test_unanswered_apply_times_out_and_auto_zoom_resumes() {
        let camera = Arc::new(TestCamera {
            hang: true,
            ..TestCamera::zoomable()
        });
        let mut config = ScannerConfig::default();
        config.cadence.zoom_apply_timeout_ms = 10;
        let detector: Arc<dyn NativeDetector> = Arc::new(FixedDetector(small_centered_barcode()));
        let mut session = ScannerSession::new(
            config,
            blink(),
            Box::new(TestSource::new(Some(blank_frame()))),
            camera.clone(),
            Some(detector),
        )
        .unwrap();

        let mut commands = Vec::new();
        for t in 0..60u64 {
            if let TickOutcome::Tracked(report) = session.tick(t * 16) {
                commands.extend(report.zoom);
            }
            settle().await;
        }

        // Each timed-out apply is rejected, so the controller commands again
        assert!(commands.len() >= 2, "commands: {:?}", commands);
        assert!(camera.applied.lock().unwrap().is_empty());
        assert_eq!(session.view(960).current_zoom, Some(1.0));
    }

    #[tokio::test]
    async fn test_camera_switch_keeps_cooldown_and_drops_stale_zoom() {
        let camera = Arc::new(TestCamera {
            switchable: true,
            ..TestCamera::zoomable()
        });
        let mut session = ScannerSession::new(
            ScannerConfig::default(),
            PlatformCaps::default(),
            Box::new(TestSource::new(None)),
            camera,
            None,
        )
        .unwrap();

        session.set_manual_zoom(4.0, 1_000);
        settle().await;
        session.poll_device_results();
        assert_eq!(session.view(1_000).current_zoom, Some(4.0));

        assert!(session.switch_camera());
        settle().await;
        session.poll_device_results();
        assert_eq!(session.view(1_100).current_zoom, Some(1.0));
        assert!(session.zoom().unwrap().in_cooldown(3_000));

        // A result for the previous camera landing after the switch
        let sent = session.device_tx.send(DeviceOutcome::Zoom {
            epoch: 0,
            level: 6.0,
            result: Ok(()),
        });
        assert!(sent.is_ok());
        session.poll_device_results();
        assert_eq!(session.view(1_200).current_zoom, Some(1.0));
    }

    #[tokio::test]
    async fn test_double_tap_resets_and_engages_cooldown() {
        let camera = Arc::new(TestCamera::zoomable());
        let mut session = ScannerSession::new(
            ScannerConfig::default(),
            PlatformCaps::default(),
            Box::new(TestSource::new(None)),
            camera.clone(),
            None,
        )
        .unwrap();

        session.set_manual_zoom(4.0, 0);
        settle().await;
        session.poll_device_results();
        assert_eq!(session.view(0).current_zoom, Some(4.0));

        let tap = |phase, t| TouchEvent::new(phase, vec![TouchPoint::new(100.0, 100.0)], t);
        session.handle_touch(&tap(TouchPhase::Start, 5_000), 5_000);
        session.handle_touch(&tap(TouchPhase::End, 5_050), 5_050);
        let intents = session.handle_touch(&tap(TouchPhase::Start, 5_200), 5_200);
        assert_eq!(intents, vec![GestureIntent::ResetZoom { level: 1.0 }]);

        settle().await;
        session.poll_device_results();
        assert_eq!(session.view(5_200).current_zoom, Some(1.0));
        assert!(session.zoom().unwrap().in_cooldown(7_000));
        assert_eq!(*camera.applied.lock().unwrap(), vec![4.0, 1.0]);
    }

    #[test]
    fn test_swipe_emits_panel_events() {
        let mut session = ScannerSession::new(
            ScannerConfig::default(),
            PlatformCaps::default(),
            Box::new(TestSource::new(None)),
            Arc::new(TestCamera::default()),
            None,
        )
        .unwrap();

        let at = |phase, y, t| TouchEvent::new(phase, vec![TouchPoint::new(50.0, y)], t);
        session.handle_touch(&at(TouchPhase::Start, 500.0, 0), 0);
        session.handle_touch(&at(TouchPhase::Move, 400.0, 16), 16);
        session.handle_touch(&at(TouchPhase::End, 400.0, 32), 32);
        assert_eq!(session.take_events(), vec![ScannerEvent::PanelOpened]);
        assert!(session.view(32).panel_open);
    }

    #[test]
    fn test_duplicate_decodes_fire_once() {
        let mut session = ScannerSession::new(
            ScannerConfig::default(),
            PlatformCaps::default(),
            Box::new(TestSource::new(None)),
            Arc::new(TestCamera::default()),
            None,
        )
        .unwrap();

        assert!(session.submit_decoded("ABC", 0));
        assert!(!session.submit_decoded("ABC", 100));
        assert!(session.submit_decoded("XYZ", 200));
        assert_eq!(session.take_events().len(), 2);
        assert_eq!(session.history().get("XYZ").unwrap().last_seen_ms, 200);
        assert!(session.take_events().is_empty());
    }

    #[tokio::test]
    async fn test_torch_toggle() {
        let mut session = ScannerSession::new(
            ScannerConfig::default(),
            PlatformCaps::default(),
            Box::new(TestSource::new(None)),
            Arc::new(TestCamera::zoomable()),
            None,
        )
        .unwrap();

        assert!(session.toggle_torch());
        settle().await;
        session.poll_device_results();
        assert!(session.view(0).torch_on);
        assert!(session.toggle_torch());
        assert!(!session.view(0).torch_on);
    }

    #[test]
    fn test_torch_unsupported() {
        let mut session = ScannerSession::new(
            ScannerConfig::default(),
            PlatformCaps::default(),
            Box::new(TestSource::new(None)),
            Arc::new(TestCamera::default()),
            None,
        )
        .unwrap();
        assert!(!session.toggle_torch());
        assert!(!session.view(0).torch_on);
    }

    #[test]
    fn test_closed_session_is_inert() {
        let mut session = ScannerSession::new(
            ScannerConfig::default(),
            PlatformCaps::default(),
            Box::new(TestSource::new(Some(blank_frame()))),
            Arc::new(TestCamera::zoomable()),
            None,
        )
        .unwrap();

        session.close();
        session.close();
        assert_eq!(session.tick(0), TickOutcome::Closed);
        assert!(!session.submit_decoded("ABC", 0));
        assert!(session.take_events().is_empty());
    }
}
