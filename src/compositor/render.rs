//! The compositor: N sources in, one stream out
//!
//! Produces a continuous stream of [`CompositeFrame`]s at the configured
//! rate from the current live participant set, the active layout, and the
//! overlay state. The compositor is the sole writer of the output channel;
//! every other component (destination manager, recorder, preview) holds a
//! read-only receiver.
//!
//! Failure semantics: a source that has ended, errored, or simply produced
//! nothing yet renders the placeholder on the next frame. One bad slot never
//! stops the others, and nothing in the render path panics.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, watch, RwLock};

use super::audio::{mix, MixInput};
use super::canvas::Canvas;
use super::config::CompositorConfig;
use super::layout::{resolve_slots, Layout, ResolvedSlot, SlotSource};
use super::overlay::{draw_overlays, ChatLine, OverlayState};
use crate::media::{AudioBlock, FrameStore, VideoFrame};
use crate::registry::{Participant, ParticipantRegistry};

/// Which surface a frame is rendered for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderTarget {
    /// The broadcast output; never carries studio-only overlays
    Program,
    /// The interactive studio preview
    Preview,
}

/// One composited output frame
///
/// Cheap to clone: pixel and sample payloads are reference-counted, so
/// fan-out to N destination sessions shares one allocation.
#[derive(Debug, Clone)]
pub struct CompositeFrame {
    /// Monotonic frame number
    pub sequence: u64,
    /// Milliseconds since the compositor was created
    pub timestamp_ms: u64,
    /// Composited video
    pub video: VideoFrame,
    /// Mixed audio for this tick
    pub audio: AudioBlock,
}

/// The compositor for one session
pub struct Compositor {
    config: CompositorConfig,
    registry: Arc<ParticipantRegistry>,
    frames: Arc<FrameStore>,
    layout: RwLock<Layout>,
    overlays: RwLock<OverlayState>,
    output: broadcast::Sender<CompositeFrame>,
    sequence: AtomicU64,
    epoch: Instant,
}

impl Compositor {
    /// Create a compositor over the given registry and frame store
    pub fn new(
        config: CompositorConfig,
        registry: Arc<ParticipantRegistry>,
        frames: Arc<FrameStore>,
    ) -> Self {
        let (output, _) = broadcast::channel(config.output_capacity);
        Self {
            config,
            registry,
            frames,
            layout: RwLock::new(Layout::default()),
            overlays: RwLock::new(OverlayState::default()),
            output,
            sequence: AtomicU64::new(0),
            epoch: Instant::now(),
        }
    }

    /// Get the compositor configuration
    pub fn config(&self) -> &CompositorConfig {
        &self.config
    }

    /// Read-only handle to the composite output
    pub fn subscribe(&self) -> broadcast::Receiver<CompositeFrame> {
        self.output.subscribe()
    }

    /// Swap the active layout; the next frame uses it in full
    pub async fn set_layout(&self, layout: Layout) {
        let mut current = self.layout.write().await;
        tracing::info!(kind = ?layout.kind, slots = layout.slots.len(), "Layout updated");
        *current = layout;
    }

    /// The active layout
    pub async fn layout(&self) -> Layout {
        self.layout.read().await.clone()
    }

    /// Mutate overlay state (toggles, captions, banner, teleprompter)
    pub async fn update_overlays<F>(&self, update: F)
    where
        F: FnOnce(&mut OverlayState),
    {
        let mut overlays = self.overlays.write().await;
        update(&mut overlays);
    }

    /// Append a chat line to the overlay ring
    pub async fn push_chat(&self, from: impl Into<String>, text: impl Into<String>) {
        let mut overlays = self.overlays.write().await;
        overlays.push_chat(ChatLine {
            from: from.into(),
            text: text.into(),
        });
    }

    /// Resolve the video frame a slot should show, or `None` for placeholder
    fn source_frame(&self, slot: &ResolvedSlot, live: &[Participant]) -> Option<VideoFrame> {
        let source = slot.source.as_ref()?;
        let participant = live.iter().find(|p| &p.id == source.participant_id())?;

        let source_id = match source {
            SlotSource::Participant { .. } => {
                if !participant.media.video_enabled {
                    return None;
                }
                participant.source?
            }
            SlotSource::Screenshare { .. } => participant.screen_source?,
        };

        self.frames.get(source_id)?.latest_video()
    }

    /// Render one frame for the given surface.
    ///
    /// Pure with respect to the output channel; `publish_frame` is the tick
    /// path that also fans the frame out.
    pub async fn render_frame(&self, target: RenderTarget) -> CompositeFrame {
        let live = self.registry.live_participants().await;
        let layout = self.layout.read().await.clone();
        let slots = resolve_slots(&layout, &live, self.config.width, self.config.height);

        let mut canvas = Canvas::new(self.config.width, self.config.height, self.config.background);
        for slot in &slots {
            match self.source_frame(slot, &live) {
                Some(frame) => canvas.blit_fit(slot.rect, &frame, self.config.background),
                None => canvas.fill_rect(slot.rect, self.config.placeholder),
            }
        }

        {
            let overlays = self.overlays.read().await;
            draw_overlays(
                &mut canvas,
                &overlays,
                &slots,
                &live,
                target == RenderTarget::Preview,
            );
        }

        // Gather latest audio from every audible live source
        let blocks: Vec<(f32, AudioBlock)> = live
            .iter()
            .filter_map(|p| {
                let gain = p.media.effective_gain();
                if gain <= 0.0 {
                    return None;
                }
                let block = self.frames.get(p.source?)?.latest_audio()?;
                Some((gain, block))
            })
            .collect();
        let inputs: Vec<MixInput<'_>> = blocks
            .iter()
            .map(|(gain, block)| MixInput { gain: *gain, block })
            .collect();
        let audio = mix(
            &inputs,
            self.config.samples_per_tick(),
            self.config.channels,
            self.config.sample_rate,
            self.config.master_volume,
        );

        CompositeFrame {
            sequence: self.sequence.fetch_add(1, Ordering::Relaxed),
            timestamp_ms: self.epoch.elapsed().as_millis() as u64,
            video: canvas.into_frame(),
            audio,
        }
    }

    /// Render the program frame and fan it out to all output receivers
    pub async fn publish_frame(&self) -> CompositeFrame {
        let frame = self.render_frame(RenderTarget::Program).await;
        // No receivers is fine; the frame still advanced the sequence
        let _ = self.output.send(frame.clone());
        frame
    }

    /// Spawn the frame tick loop.
    ///
    /// Runs until the shutdown signal flips; a missed tick is skipped, never
    /// bursted, so a slow frame cannot snowball.
    pub fn spawn_loop(self: &Arc<Self>, mut shutdown: watch::Receiver<bool>) -> tokio::task::JoinHandle<()> {
        let compositor = Arc::clone(self);
        let period = Duration::from_micros(1_000_000 / compositor.config.frame_rate.max(1) as u64);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            tracing::info!(
                fps = compositor.config.frame_rate,
                "Compositor loop started"
            );

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        compositor.publish_frame().await;
                    }
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }

            tracing::info!("Compositor loop stopped");
        })
    }
}
