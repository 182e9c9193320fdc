//! Media acquisition: frames, tracks, and the capture seam
//!
//! The compositor consumes whatever the [`FrameStore`] holds; producers
//! (local capture, remote participant feeds) push frames into
//! [`TrackHandle`] slots at their own pace. A slow producer never blocks a
//! frame tick: the compositor reuses the last available frame.

pub mod frame;
pub mod source;

pub use frame::{AudioBlock, Rgba, VideoFrame};
pub use source::{
    CaptureBackend, FrameStore, SourceId, SourceKind, TestPatternBackend, TrackConstraints,
    TrackHandle,
};
