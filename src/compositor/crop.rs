//! Vertical-crop sub-pipeline
//!
//! Derives a 9:16 portrait output from the 16:9 composite for platforms
//! that want vertical video. An optional, independent consumer of composite
//! frames: it never feeds back into the program output.
//!
//! The crop center comes from a pluggable [`CropTargetProvider`] (center
//! crop by default; a speaker/motion follower implements the same trait).
//! The center is smoothed every frame with
//! `current += (target - current) * smoothing`, so the crop pans, never
//! jumps.

use super::layout::Rect;
use crate::media::VideoFrame;

/// Supplies the horizontal center of interest for each frame
pub trait CropTargetProvider: Send {
    /// Normalized center x in [0, 1] for this frame
    fn target(&mut self, frame: &VideoFrame, sequence: u64) -> f32;
}

/// Fixed center crop
pub struct CenterCrop;

impl CropTargetProvider for CenterCrop {
    fn target(&mut self, _frame: &VideoFrame, _sequence: u64) -> f32 {
        0.5
    }
}

/// Vertical crop options
#[derive(Debug, Clone)]
pub struct CropConfig {
    /// Smoothing factor in (0, 1]: 1 snaps immediately, small values pan
    /// slowly
    pub smoothing: f32,

    /// Output aspect ratio numerator (width)
    pub aspect_width: u32,

    /// Output aspect ratio denominator (height)
    pub aspect_height: u32,
}

impl Default for CropConfig {
    fn default() -> Self {
        Self {
            smoothing: 0.25,
            aspect_width: 9,
            aspect_height: 16,
        }
    }
}

impl CropConfig {
    /// Set the smoothing factor (clamped into (0, 1])
    pub fn smoothing(mut self, factor: f32) -> Self {
        self.smoothing = factor.clamp(f32::EPSILON, 1.0);
        self
    }
}

/// Stateful portrait cropper over composite frames
pub struct VerticalCropper {
    config: CropConfig,
    provider: Box<dyn CropTargetProvider>,
    current: f32,
    initialized: bool,
}

impl VerticalCropper {
    /// Create a cropper with a custom target provider
    pub fn new(config: CropConfig, provider: Box<dyn CropTargetProvider>) -> Self {
        Self {
            config,
            provider,
            current: 0.5,
            initialized: false,
        }
    }

    /// Create a center-cropping cropper
    pub fn centered(config: CropConfig) -> Self {
        Self::new(config, Box::new(CenterCrop))
    }

    /// Current smoothed center in [0, 1]
    pub fn current_center(&self) -> f32 {
        self.current
    }

    /// Advance the smoothed center and compute this frame's crop rectangle.
    ///
    /// The rectangle always lies within the frame; the first frame snaps to
    /// the target so a session never starts with a pan.
    pub fn crop_rect(&mut self, frame: &VideoFrame, sequence: u64) -> Rect {
        let target = self.provider.target(frame, sequence).clamp(0.0, 1.0);

        if self.initialized {
            self.current += (target - self.current) * self.config.smoothing;
        } else {
            self.current = target;
            self.initialized = true;
        }

        let crop_w = (frame.height * self.config.aspect_width / self.config.aspect_height.max(1))
            .min(frame.width)
            .max(1);
        let center_px = self.current * frame.width as f32;
        let half = crop_w as f32 / 2.0;
        let max_x = (frame.width - crop_w) as f32;
        let x = (center_px - half).clamp(0.0, max_x) as u32;

        Rect::new(x, 0, crop_w, frame.height)
    }

    /// Crop one frame to portrait
    pub fn apply(&mut self, frame: &VideoFrame, sequence: u64) -> VideoFrame {
        let rect = self.crop_rect(frame, sequence);
        let mut data = Vec::with_capacity((rect.width * rect.height * 4) as usize);

        for y in 0..rect.height {
            let row_start = (((y + rect.y) * frame.width + rect.x) * 4) as usize;
            let row_end = row_start + (rect.width * 4) as usize;
            match frame.data.get(row_start..row_end) {
                Some(row) => data.extend_from_slice(row),
                // Truncated source frame: pad the row rather than fail
                None => data.extend(std::iter::repeat(0u8).take((rect.width * 4) as usize)),
            }
        }

        VideoFrame::new(rect.width, rect.height, data.into())
    }
}
