//! Raw media frame types
//!
//! Video frames carry RGBA8 pixels in `bytes::Bytes`, so cloning a frame for
//! fan-out to multiple consumers only bumps a reference count. Audio blocks
//! share their sample buffer through an `Arc` for the same reason.

use std::sync::Arc;

use bytes::Bytes;

/// A packed RGBA color
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    /// Create an opaque color
    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Create a color with an explicit alpha
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Opaque black
    pub const BLACK: Rgba = Rgba::opaque(0, 0, 0);

    /// Opaque white
    pub const WHITE: Rgba = Rgba::opaque(255, 255, 255);
}

/// A single decoded video frame (RGBA8, row-major)
///
/// Cheap to clone: the pixel payload is reference-counted.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// RGBA8 pixel data, `width * height * 4` bytes
    pub data: Bytes,
}

impl VideoFrame {
    /// Wrap existing pixel data.
    ///
    /// Truncated or oversized buffers are rejected by debug assertion only;
    /// accessors clamp instead of panicking.
    pub fn new(width: u32, height: u32, data: Bytes) -> Self {
        debug_assert_eq!(data.len(), (width * height * 4) as usize);
        Self {
            width,
            height,
            data,
        }
    }

    /// A frame filled with a single color
    pub fn solid(width: u32, height: u32, color: Rgba) -> Self {
        let mut data = Vec::with_capacity((width * height * 4) as usize);
        for _ in 0..width * height {
            data.extend_from_slice(&[color.r, color.g, color.b, color.a]);
        }
        Self {
            width,
            height,
            data: Bytes::from(data),
        }
    }

    /// Read one pixel, clamping out-of-range coordinates to the edge
    pub fn pixel(&self, x: u32, y: u32) -> Rgba {
        let x = x.min(self.width.saturating_sub(1));
        let y = y.min(self.height.saturating_sub(1));
        let idx = ((y * self.width + x) * 4) as usize;
        match self.data.get(idx..idx + 4) {
            Some(px) => Rgba::new(px[0], px[1], px[2], px[3]),
            None => Rgba::BLACK,
        }
    }

    /// Size of the pixel payload in bytes
    pub fn byte_len(&self) -> usize {
        self.data.len()
    }
}

/// A block of interleaved f32 audio samples
///
/// Cheap to clone: the sample buffer is reference-counted.
#[derive(Debug, Clone)]
pub struct AudioBlock {
    /// Interleaved samples in [-1.0, 1.0]
    pub samples: Arc<Vec<f32>>,
    /// Channel count (1 = mono, 2 = stereo)
    pub channels: u16,
    /// Samples per second per channel
    pub sample_rate: u32,
}

impl AudioBlock {
    /// Wrap a sample buffer
    pub fn new(samples: Vec<f32>, channels: u16, sample_rate: u32) -> Self {
        Self {
            samples: Arc::new(samples),
            channels,
            sample_rate,
        }
    }

    /// A silent block of the given length in frames
    pub fn silent(frames: usize, channels: u16, sample_rate: u32) -> Self {
        Self::new(vec![0.0; frames * channels as usize], channels, sample_rate)
    }

    /// Number of sample frames (samples per channel)
    pub fn frame_count(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels as usize
    }
}
