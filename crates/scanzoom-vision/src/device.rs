//! Camera device boundary.
//!
//! Zoom, torch and camera switching all go through the same handle. Only
//! zoom is driven automatically; torch and switching happen on explicit
//! user commands.

use async_trait::async_trait;

use scanzoom_models::ZoomCapabilities;

use crate::error::{VisionError, VisionResult};

/// Hardware camera handle.
#[async_trait]
pub trait CameraDevice: Send + Sync {
    /// Zoom range reported by the hardware, `None` if zoom is unsupported.
    ///
    /// Queried once when a session is built.
    fn zoom_capabilities(&self) -> Option<ZoomCapabilities>;

    /// Apply a zoom level. May reject (device busy, permission revoked).
    async fn apply_zoom(&self, level: f64) -> VisionResult<()>;

    fn supports_torch(&self) -> bool {
        false
    }

    async fn set_torch(&self, _on: bool) -> VisionResult<()> {
        Err(VisionError::TorchUnsupported)
    }

    fn supports_camera_switch(&self) -> bool {
        false
    }

    async fn switch_camera(&self) -> VisionResult<()> {
        Err(VisionError::CameraSwitchFailed(
            "camera switching not supported".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedLens;

    #[async_trait]
    impl CameraDevice for FixedLens {
        fn zoom_capabilities(&self) -> Option<ZoomCapabilities> {
            None
        }

        async fn apply_zoom(&self, _level: f64) -> VisionResult<()> {
            Err(VisionError::ZoomUnsupported)
        }
    }

    #[test]
    fn test_default_torch_and_switch_unsupported() {
        let cam = FixedLens;
        assert!(!cam.supports_torch());
        assert!(!cam.supports_camera_switch());
        assert!(cam.zoom_capabilities().is_none());

        let torch = tokio_test::block_on(cam.set_torch(true));
        assert!(matches!(torch, Err(VisionError::TorchUnsupported)));
        tokio_test::assert_err!(tokio_test::block_on(cam.switch_camera()));
        tokio_test::assert_err!(tokio_test::block_on(cam.apply_zoom(2.0)));
    }
}
