//! Synthetic scene: a striped barcode drifting around a gray backdrop.
//!
//! The frame source and the simulated camera share one [`Scene`], so zoom
//! applied through the camera makes the barcode grow in later frames.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use image::{Rgba, RgbaImage};
use tracing::{debug, warn};

use scanzoom_models::ZoomCapabilities;
use scanzoom_vision::{CameraDevice, Frame, FrameSource, SourceState, VisionError, VisionResult};

const FRAME_WIDTH: u32 = 320;
const FRAME_HEIGHT: u32 = 240;

/// Barcode width at 1x zoom, percent of frame width
const BASE_WIDTH_PCT: f64 = 14.0;

pub struct Scene {
    started: Instant,
    zoom_bits: AtomicU64,
    torch: AtomicBool,
}

impl Scene {
    pub fn new(initial_zoom: f64) -> Arc<Self> {
        Arc::new(Self {
            started: Instant::now(),
            zoom_bits: AtomicU64::new(initial_zoom.to_bits()),
            torch: AtomicBool::new(false),
        })
    }

    pub fn zoom(&self) -> f64 {
        f64::from_bits(self.zoom_bits.load(Ordering::Relaxed))
    }

    fn set_zoom(&self, level: f64) {
        self.zoom_bits.store(level.to_bits(), Ordering::Relaxed);
    }

    fn render(&self) -> RgbaImage {
        let t = self.started.elapsed().as_secs_f64();
        let zoom = self.zoom();

        let (fw, fh) = (FRAME_WIDTH as f64, FRAME_HEIGHT as f64);
        let cx = fw * (0.5 + 0.08 * (t * 0.7).sin());
        let cy = fh * (0.5 + 0.06 * (t * 0.5).cos());
        let w = (fw * BASE_WIDTH_PCT / 100.0 * zoom).min(fw * 0.95);
        let h = (w * 0.5).min(fh * 0.9);
        let (x0, x1) = (cx - w / 2.0, cx + w / 2.0);
        let (y0, y1) = (cy - h / 2.0, cy + h / 2.0);
        let module = (2.0 * zoom).max(1.0);

        let backdrop = if self.torch.load(Ordering::Relaxed) { 175 } else { 140 };

        RgbaImage::from_fn(FRAME_WIDTH, FRAME_HEIGHT, |x, y| {
            let (px, py) = (x as f64, y as f64);
            if px < x0 || px >= x1 || py < y0 || py >= y1 {
                return Rgba([backdrop, backdrop, backdrop, 255]);
            }
            if (((px - x0) / module) as u32) % 2 == 0 {
                Rgba([15, 15, 15, 255])
            } else {
                Rgba([240, 240, 240, 255])
            }
        })
    }
}

/// Frame source rendering the scene on demand.
pub struct SceneSource {
    scene: Arc<Scene>,
}

impl SceneSource {
    pub fn new(scene: Arc<Scene>) -> Self {
        Self { scene }
    }
}

impl FrameSource for SceneSource {
    fn state(&self) -> SourceState {
        SourceState::Live
    }

    fn current_frame(&self) -> Option<Frame> {
        let timestamp_ms = self.scene.started.elapsed().as_millis() as u64;
        match Frame::new(self.scene.render(), timestamp_ms) {
            Ok(frame) => Some(frame),
            Err(e) => {
                warn!("Failed to render scene frame: {}", e);
                None
            }
        }
    }
}

/// Camera with a zoom range and some apply latency.
pub struct SceneCamera {
    scene: Arc<Scene>,
    caps: ZoomCapabilities,
    apply_latency: Duration,
}

impl SceneCamera {
    pub fn new(scene: Arc<Scene>, caps: ZoomCapabilities, apply_latency: Duration) -> Self {
        Self {
            scene,
            caps,
            apply_latency,
        }
    }
}

#[async_trait]
impl CameraDevice for SceneCamera {
    fn zoom_capabilities(&self) -> Option<ZoomCapabilities> {
        Some(self.caps)
    }

    async fn apply_zoom(&self, level: f64) -> VisionResult<()> {
        tokio::time::sleep(self.apply_latency).await;
        if !(self.caps.min..=self.caps.max).contains(&level) {
            return Err(VisionError::zoom_rejected(format!(
                "level {:.2} outside [{}, {}]",
                level, self.caps.min, self.caps.max
            )));
        }
        debug!(level, "Camera zoom applied");
        self.scene.set_zoom(level);
        Ok(())
    }

    fn supports_torch(&self) -> bool {
        true
    }

    async fn set_torch(&self, on: bool) -> VisionResult<()> {
        self.scene.torch.store(on, Ordering::Relaxed);
        Ok(())
    }
}
