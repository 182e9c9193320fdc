//! Media source acquisition and track handles
//!
//! Wraps camera/microphone/screen capture behind the [`CaptureBackend`]
//! seam. The actual device stack lives in the embedding application; this
//! crate owns the track lifecycle: latest-frame slots the compositor reads
//! every tick, and a synchronous `stop()` that halts production
//! deterministically so hardware indicator lights turn off when expected.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use super::frame::{AudioBlock, Rgba, VideoFrame};
use crate::error::{Error, Result};

/// Kind of media source a track was acquired from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// Local camera
    Camera,
    /// Local microphone
    Microphone,
    /// Screen or window capture
    Screen,
}

/// Requested track parameters
#[derive(Debug, Clone)]
pub struct TrackConstraints {
    /// Requested frame width
    pub width: u32,
    /// Requested frame height
    pub height: u32,
    /// Requested frame rate
    pub frame_rate: u32,
    /// Requested audio sample rate
    pub sample_rate: u32,
    /// Requested audio channel count
    pub channels: u16,
}

impl Default for TrackConstraints {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            frame_rate: 30,
            sample_rate: 48_000,
            channels: 2,
        }
    }
}

/// Identifier for an acquired track within one session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(pub u64);

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "source-{}", self.0)
    }
}

/// Seam to the platform capture stack.
///
/// Implementations open a device and keep the returned [`TrackHandle`] fed
/// with frames until the handle is stopped. Acquisition failures map to
/// [`Error::MediaAcquisition`] and are surfaced immediately; the broadcast
/// may proceed audio- or video-degraded.
pub trait CaptureBackend: Send + Sync {
    /// Open a source and return its track handle
    fn open(&self, kind: SourceKind, constraints: &TrackConstraints) -> Result<TrackHandle>;
}

/// Shared handle to one acquired track.
///
/// Producers push frames in; the compositor reads the latest frame each tick
/// and reuses the previous one when no new frame has arrived. Clones share
/// the same underlying slots.
#[derive(Clone)]
pub struct TrackHandle {
    inner: Arc<TrackInner>,
}

struct TrackInner {
    kind: SourceKind,
    video: RwLock<Option<VideoFrame>>,
    audio: RwLock<Option<AudioBlock>>,
    ended: AtomicBool,
}

impl TrackHandle {
    /// Create an empty track handle
    pub fn new(kind: SourceKind) -> Self {
        Self {
            inner: Arc::new(TrackInner {
                kind,
                video: RwLock::new(None),
                audio: RwLock::new(None),
                ended: AtomicBool::new(false),
            }),
        }
    }

    /// Kind of source this track came from
    pub fn kind(&self) -> SourceKind {
        self.inner.kind
    }

    /// Replace the latest video frame. Ignored once the track has ended.
    pub fn push_video(&self, frame: VideoFrame) {
        if self.is_ended() {
            return;
        }
        if let Ok(mut slot) = self.inner.video.write() {
            *slot = Some(frame);
        }
    }

    /// Replace the latest audio block. Ignored once the track has ended.
    pub fn push_audio(&self, block: AudioBlock) {
        if self.is_ended() {
            return;
        }
        if let Ok(mut slot) = self.inner.audio.write() {
            *slot = Some(block);
        }
    }

    /// Latest video frame, if any has been produced and the track is live
    pub fn latest_video(&self) -> Option<VideoFrame> {
        if self.is_ended() {
            return None;
        }
        self.inner.video.read().ok().and_then(|slot| slot.clone())
    }

    /// Latest audio block, if any has been produced and the track is live
    pub fn latest_audio(&self) -> Option<AudioBlock> {
        if self.is_ended() {
            return None;
        }
        self.inner.audio.read().ok().and_then(|slot| slot.clone())
    }

    /// Stop the track synchronously.
    ///
    /// After this returns, `is_ended` is true, producers' pushes are
    /// discarded, and the compositor renders the placeholder for this source
    /// on its next frame.
    pub fn stop(&self) {
        self.inner.ended.store(true, Ordering::SeqCst);
        if let Ok(mut slot) = self.inner.video.write() {
            *slot = None;
        }
        if let Ok(mut slot) = self.inner.audio.write() {
            *slot = None;
        }
        tracing::debug!(kind = ?self.inner.kind, "Track stopped");
    }

    /// Whether the track has been stopped or its device went away
    pub fn is_ended(&self) -> bool {
        self.inner.ended.load(Ordering::SeqCst)
    }
}

/// Owns every acquired track for one session.
///
/// Shared read-only with the compositor; the store allocates source ids and
/// is the only place that releases tracks.
pub struct FrameStore {
    tracks: RwLock<HashMap<SourceId, TrackHandle>>,
    next_id: AtomicU64,
}

impl FrameStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            tracks: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Acquire a source through the backend and register its track
    pub fn acquire(
        &self,
        backend: &dyn CaptureBackend,
        kind: SourceKind,
        constraints: &TrackConstraints,
    ) -> Result<SourceId> {
        let track = backend.open(kind, constraints)?;
        let id = SourceId(self.next_id.fetch_add(1, Ordering::Relaxed));

        if let Ok(mut tracks) = self.tracks.write() {
            tracks.insert(id, track);
        }

        tracing::info!(source = %id, kind = ?kind, "Track acquired");
        Ok(id)
    }

    /// Register an externally created track (e.g. a remote participant feed)
    pub fn register(&self, track: TrackHandle) -> SourceId {
        let id = SourceId(self.next_id.fetch_add(1, Ordering::Relaxed));
        if let Ok(mut tracks) = self.tracks.write() {
            tracks.insert(id, track);
        }
        id
    }

    /// Look up a track handle
    pub fn get(&self, id: SourceId) -> Option<TrackHandle> {
        self.tracks.read().ok().and_then(|t| t.get(&id).cloned())
    }

    /// Stop and remove one track
    pub fn release(&self, id: SourceId) {
        let track = self
            .tracks
            .write()
            .ok()
            .and_then(|mut tracks| tracks.remove(&id));
        if let Some(track) = track {
            track.stop();
            tracing::info!(source = %id, "Track released");
        }
    }

    /// Stop every track synchronously and clear the store
    pub fn release_all(&self) {
        if let Ok(mut tracks) = self.tracks.write() {
            for (id, track) in tracks.drain() {
                track.stop();
                tracing::debug!(source = %id, "Track released");
            }
        }
    }

    /// Number of registered tracks
    pub fn len(&self) -> usize {
        self.tracks.read().map(|t| t.len()).unwrap_or(0)
    }

    /// Whether the store holds no tracks
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for FrameStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Synthetic capture backend producing color bars and a sine tone.
///
/// Keeps the whole pipeline runnable headless; tests and local monitoring
/// use it in place of real devices.
pub struct TestPatternBackend;

impl TestPatternBackend {
    const BARS: [Rgba; 7] = [
        Rgba::opaque(192, 192, 192),
        Rgba::opaque(192, 192, 0),
        Rgba::opaque(0, 192, 192),
        Rgba::opaque(0, 192, 0),
        Rgba::opaque(192, 0, 192),
        Rgba::opaque(192, 0, 0),
        Rgba::opaque(0, 0, 192),
    ];

    /// Render one color-bar frame
    pub fn bars_frame(width: u32, height: u32) -> VideoFrame {
        let mut data = Vec::with_capacity((width * height * 4) as usize);
        for _y in 0..height {
            for x in 0..width {
                let bar = (x as usize * Self::BARS.len()) / width.max(1) as usize;
                let color = Self::BARS[bar.min(Self::BARS.len() - 1)];
                data.extend_from_slice(&[color.r, color.g, color.b, color.a]);
            }
        }
        VideoFrame::new(width, height, data.into())
    }

    /// Render one block of a 440 Hz tone
    pub fn tone_block(constraints: &TrackConstraints) -> AudioBlock {
        let frames = (constraints.sample_rate / constraints.frame_rate.max(1)) as usize;
        let mut samples = Vec::with_capacity(frames * constraints.channels as usize);
        for i in 0..frames {
            let t = i as f32 / constraints.sample_rate as f32;
            let value = (t * 440.0 * std::f32::consts::TAU).sin() * 0.2;
            for _ in 0..constraints.channels {
                samples.push(value);
            }
        }
        AudioBlock::new(samples, constraints.channels, constraints.sample_rate)
    }
}

impl CaptureBackend for TestPatternBackend {
    fn open(&self, kind: SourceKind, constraints: &TrackConstraints) -> Result<TrackHandle> {
        if constraints.width == 0 || constraints.height == 0 {
            return Err(Error::MediaAcquisition {
                kind,
                reason: "zero-sized frame constraints".into(),
            });
        }

        let track = TrackHandle::new(kind);
        match kind {
            SourceKind::Camera | SourceKind::Screen => {
                track.push_video(Self::bars_frame(constraints.width, constraints.height));
                track.push_audio(Self::tone_block(constraints));
            }
            SourceKind::Microphone => {
                track.push_audio(Self::tone_block(constraints));
            }
        }
        Ok(track)
    }
}
