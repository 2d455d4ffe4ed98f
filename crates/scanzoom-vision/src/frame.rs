//! Frame model and the video source boundary.

use image::RgbaImage;
use std::sync::Arc;

use crate::error::{VisionError, VisionResult};

/// A read-only video frame.
///
/// Cloning is cheap (the pixels are shared); the capture loop never keeps a
/// frame past the tick that pulled it.
#[derive(Debug, Clone)]
pub struct Frame {
    image: Arc<RgbaImage>,
    /// Presentation timestamp in milliseconds
    pub timestamp_ms: u64,
}

impl Frame {
    /// Wrap an RGBA image. Rejects empty images.
    pub fn new(image: RgbaImage, timestamp_ms: u64) -> VisionResult<Self> {
        if image.width() == 0 || image.height() == 0 {
            return Err(VisionError::invalid_frame(format!(
                "frame must be non-empty, got {}x{}",
                image.width(),
                image.height()
            )));
        }
        Ok(Self {
            image: Arc::new(image),
            timestamp_ms,
        })
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }
}

/// Playback state of the video source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    /// Frames are flowing
    Live,
    /// Temporarily not producing frames
    Paused,
    /// Stream is over
    Ended,
}

/// The live video element / sensor buffer the loop pulls from.
pub trait FrameSource: Send {
    /// Current playback state.
    fn state(&self) -> SourceState;

    /// The frame currently on screen, if any.
    fn current_frame(&self) -> Option<Frame>;
}

/// Fixed-size square RGBA buffer reused across ticks.
///
/// Frames are stretched into it with nearest-neighbour sampling, so a
/// position in the canvas maps to the same percentage of the source frame.
#[derive(Debug, Clone)]
pub struct ScratchCanvas {
    size: u32,
    image: RgbaImage,
}

impl ScratchCanvas {
    /// Allocate a `size`x`size` canvas. This is the only allocation it makes.
    pub fn new(size: u32) -> Self {
        Self {
            size,
            image: RgbaImage::new(size, size),
        }
    }

    #[inline]
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Downsample `frame` into the canvas in place.
    pub fn draw(&mut self, frame: &Frame) {
        let src = frame.image();
        let (src_w, src_h) = (src.width() as u64, src.height() as u64);
        let size = self.size as u64;
        let src_raw: &[u8] = src.as_raw();
        let dst: &mut [u8] = &mut self.image;

        for y in 0..size {
            let sy = (y * src_h / size) as usize;
            let src_row = sy * src_w as usize;
            let dst_row = (y * size) as usize;
            for x in 0..size {
                let sx = (x * src_w / size) as usize;
                let s = (src_row + sx) * 4;
                let d = (dst_row + x as usize) * 4;
                dst[d..d + 4].copy_from_slice(&src_raw[s..s + 4]);
            }
        }
    }

    /// Grayscale approximation at (x, y): mean of the RGB channels.
    #[inline]
    pub fn gray(&self, x: u32, y: u32) -> u32 {
        let idx = ((y * self.size + x) * 4) as usize;
        let px = &self.image.as_raw()[idx..idx + 3];
        (px[0] as u32 + px[1] as u32 + px[2] as u32) / 3
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_empty_frame_rejected() {
        assert!(Frame::new(RgbaImage::new(0, 10), 0).is_err());
    }

    #[test]
    fn test_draw_stretches_frame() {
        // Left half black, right half white
        let img = RgbaImage::from_fn(600, 300, |x, _| {
            if x < 300 {
                Rgba([0, 0, 0, 255])
            } else {
                Rgba([255, 255, 255, 255])
            }
        });
        let frame = Frame::new(img, 0).unwrap();

        let mut canvas = ScratchCanvas::new(150);
        canvas.draw(&frame);

        assert_eq!(canvas.gray(10, 75), 0);
        assert_eq!(canvas.gray(74, 75), 0);
        assert_eq!(canvas.gray(75, 75), 255);
        assert_eq!(canvas.gray(149, 149), 255);
    }

    #[test]
    fn test_gray_is_channel_mean() {
        let img = RgbaImage::from_pixel(4, 4, Rgba([30, 60, 90, 0]));
        let frame = Frame::new(img, 0).unwrap();
        let mut canvas = ScratchCanvas::new(4);
        canvas.draw(&frame);
        assert_eq!(canvas.gray(1, 1), 60);
    }
}
