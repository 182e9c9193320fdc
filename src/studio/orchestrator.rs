//! Session orchestrator
//!
//! The top-level controller the embedding application drives. Every
//! component is an explicitly constructed, owned instance wired together
//! here; there are no module-level singletons, and lifecycle (`connect`,
//! `start_broadcast`, `stop_broadcast`, `shutdown`) is explicit.
//!
//! Two background tasks keep the session converged:
//! - the **event pump** applies inbound signaling events to the registry,
//!   layout and overlays (idempotently, so echoes and duplicates are
//!   harmless);
//! - the **forwarder** turns local registry events into signaling events so
//!   every peer sees host decisions.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, watch, Mutex};

use super::status::BroadcastStatus;
use crate::compositor::{CompositeFrame, Compositor, CompositorConfig, Layout};
use crate::destination::{
    Destination, DestinationId, DestinationManager, IngestNegotiator, StreamingConfig,
    StreamingEvent,
};
use crate::error::Result;
use crate::media::{CaptureBackend, FrameStore, SourceId, SourceKind, TrackConstraints};
use crate::registry::{
    ParticipantId, ParticipantRegistry, ParticipantRole, RegistryConfig, RegistryEvent,
};
use crate::signaling::{
    SignalingChannel, SignalingConfig, SignalingEvent, SignalingTransport,
};

/// Top-level studio configuration
#[derive(Debug, Clone, Default)]
pub struct StudioConfig {
    /// Participant registry limits
    pub registry: RegistryConfig,
    /// Compositor canvas and audio options
    pub compositor: CompositorConfig,
    /// Destination streaming options
    pub streaming: StreamingConfig,
    /// Signaling reconnect options
    pub signaling: SignalingConfig,
    /// Destinations to publish to when the broadcast starts
    pub destinations: Vec<Destination>,
}

impl StudioConfig {
    /// Replace the destination list
    pub fn destinations(mut self, destinations: Vec<Destination>) -> Self {
        self.destinations = destinations;
        self
    }

    /// Replace the compositor options
    pub fn compositor(mut self, compositor: CompositorConfig) -> Self {
        self.compositor = compositor;
        self
    }

    /// Replace the streaming options
    pub fn streaming(mut self, streaming: StreamingConfig) -> Self {
        self.streaming = streaming;
        self
    }

    /// Replace the signaling options
    pub fn signaling(mut self, signaling: SignalingConfig) -> Self {
        self.signaling = signaling;
        self
    }

    /// Replace the registry options
    pub fn registry(mut self, registry: RegistryConfig) -> Self {
        self.registry = registry;
        self
    }
}

struct RenderLoop {
    shutdown_tx: watch::Sender<bool>,
    task: tokio::task::JoinHandle<()>,
}

/// One live-broadcast studio session
pub struct Studio {
    registry: Arc<ParticipantRegistry>,
    frames: Arc<FrameStore>,
    compositor: Arc<Compositor>,
    destinations: Arc<DestinationManager>,
    signaling: SignalingChannel,
    configured_destinations: Mutex<Vec<Destination>>,
    render_loop: Mutex<Option<RenderLoop>>,
    is_live: AtomicBool,
    is_preview: AtomicBool,
    is_recording: AtomicBool,
    pump_task: tokio::task::JoinHandle<()>,
    forward_task: tokio::task::JoinHandle<()>,
}

impl Studio {
    /// Construct the studio and establish its signaling connection
    pub async fn connect(
        config: StudioConfig,
        negotiator: Arc<dyn IngestNegotiator>,
        transport: Arc<dyn SignalingTransport>,
    ) -> Result<Self> {
        let registry = Arc::new(ParticipantRegistry::with_config(config.registry.clone()));
        let frames = Arc::new(FrameStore::new());
        let compositor = Arc::new(Compositor::new(
            config.compositor.clone(),
            Arc::clone(&registry),
            Arc::clone(&frames),
        ));
        let destinations = Arc::new(DestinationManager::new(
            config.streaming.clone(),
            negotiator,
        ));

        let (signaling, inbound) =
            SignalingChannel::connect(transport, config.signaling.clone()).await?;

        let pump_task = tokio::spawn(event_pump(
            inbound,
            Arc::clone(&registry),
            Arc::clone(&compositor),
        ));
        let forward_task = tokio::spawn(forward_registry_events(
            registry.subscribe(),
            signaling.sender(),
        ));

        tracing::info!(
            destinations = config.destinations.len(),
            "Studio session connected"
        );

        Ok(Self {
            registry,
            frames,
            compositor,
            destinations,
            signaling,
            configured_destinations: Mutex::new(config.destinations),
            render_loop: Mutex::new(None),
            is_live: AtomicBool::new(false),
            is_preview: AtomicBool::new(false),
            is_recording: AtomicBool::new(false),
            pump_task,
            forward_task,
        })
    }

    /// The participant registry (transition operations and reads)
    pub fn registry(&self) -> &Arc<ParticipantRegistry> {
        &self.registry
    }

    /// The compositor (layout, overlays, preview rendering)
    pub fn compositor(&self) -> &Arc<Compositor> {
        &self.compositor
    }

    /// The frame store (track acquisition)
    pub fn frame_store(&self) -> &Arc<FrameStore> {
        &self.frames
    }

    /// Subscribe to destination streaming events
    pub fn streaming_events(&self) -> broadcast::Receiver<StreamingEvent> {
        self.destinations.subscribe()
    }

    /// Whether the broadcast is live
    pub fn is_live(&self) -> bool {
        self.is_live.load(Ordering::SeqCst)
    }

    /// Acquire a local source and bind it to a participant
    pub async fn acquire_source(
        &self,
        participant: &ParticipantId,
        backend: &dyn CaptureBackend,
        kind: SourceKind,
        constraints: &TrackConstraints,
    ) -> Result<SourceId> {
        let source = self.frames.acquire(backend, kind, constraints)?;
        match kind {
            SourceKind::Screen => {
                self.registry
                    .bind_screen_source(participant, Some(source))
                    .await?
            }
            _ => self.registry.bind_source(participant, source).await?,
        }
        Ok(source)
    }

    /// Start the broadcast: spin up the render loop and one session per
    /// configured destination. Idempotent.
    pub async fn start_broadcast(&self) -> Result<()> {
        if self.is_live.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        self.ensure_render_loop().await;

        let configured = self.configured_destinations.lock().await.clone();
        for destination in configured {
            self.destinations
                .start(destination, self.compositor.subscribe())
                .await?;
        }

        tracing::info!("Broadcast started");
        Ok(())
    }

    /// Stop the broadcast: terminate every destination session (cancelling
    /// in-flight attempts), stop the render loop, and release all hardware
    /// tracks synchronously.
    pub async fn stop_broadcast(&self) {
        if !self.is_live.swap(false, Ordering::SeqCst) {
            return;
        }

        self.destinations.stop_all().await;
        self.stop_render_loop_if_idle().await;
        self.frames.release_all();
        self.is_recording.store(false, Ordering::SeqCst);
        tracing::info!("Broadcast stopped");
    }

    /// Start rendering composite output without publishing anywhere
    pub async fn start_preview(&self) {
        self.is_preview.store(true, Ordering::SeqCst);
        self.ensure_render_loop().await;
    }

    /// Stop the preview render (the loop keeps running while live)
    pub async fn stop_preview(&self) {
        self.is_preview.store(false, Ordering::SeqCst);
        self.stop_render_loop_if_idle().await;
    }

    /// Add one destination mid-broadcast.
    ///
    /// Starts a new independent session immediately when live; existing
    /// sessions are untouched.
    pub async fn add_destination(&self, destination: Destination) -> Result<()> {
        self.configured_destinations
            .lock()
            .await
            .push(destination.clone());
        if self.is_live() {
            self.destinations
                .start(destination, self.compositor.subscribe())
                .await?;
        }
        Ok(())
    }

    /// Stop one destination's session
    pub async fn remove_destination(&self, id: &DestinationId) -> Result<()> {
        self.configured_destinations
            .lock()
            .await
            .retain(|d| &d.id != id);
        self.destinations.stop(id).await
    }

    /// Attach the recording consumer; frames are handed off as an opaque
    /// stream, storage is not owned here
    pub async fn start_recording(&self) -> broadcast::Receiver<CompositeFrame> {
        self.is_recording.store(true, Ordering::SeqCst);
        self.compositor.subscribe()
    }

    /// Detach the recording consumer
    pub fn stop_recording(&self) {
        self.is_recording.store(false, Ordering::SeqCst);
    }

    /// Swap the active layout and propagate it to every peer
    pub async fn set_layout(&self, layout: Layout) -> Result<()> {
        self.compositor.set_layout(layout.clone()).await;
        self.signaling
            .send(SignalingEvent::LayoutUpdated { layout })
            .await
    }

    /// Send a chat message. The overlay picks it up when the coordinator
    /// fans the event back, so every surface shows the same history.
    pub async fn send_chat(&self, from: &ParticipantId, text: impl Into<String>) -> Result<()> {
        self.signaling
            .send(SignalingEvent::ChatMessage {
                from: from.clone(),
                text: text.into(),
            })
            .await
    }

    /// Join a participant into the greenroom
    pub async fn join(
        &self,
        id: ParticipantId,
        display_name: impl Into<String>,
        role: ParticipantRole,
    ) -> Result<()> {
        self.registry.join(id, display_name, role).await
    }

    /// Promote a participant on stage
    pub async fn promote(&self, id: &ParticipantId) -> Result<()> {
        self.registry.promote(id).await
    }

    /// Demote a participant to backstage
    pub async fn demote(&self, id: &ParticipantId) -> Result<()> {
        self.registry.demote(id).await
    }

    /// Ban a participant. The coordinator force-disconnects the banned
    /// participant's signaling session when the transition reaches it.
    pub async fn ban(&self, id: &ParticipantId) -> Result<()> {
        self.registry.ban(id).await
    }

    /// One status snapshot for the UI and analytics
    pub async fn status(&self) -> BroadcastStatus {
        BroadcastStatus::from_counts(
            self.is_live(),
            self.is_recording.load(Ordering::SeqCst),
            self.registry.counts().await,
            self.signaling.state(),
            self.destinations.status().await,
        )
    }

    async fn ensure_render_loop(&self) {
        let mut render_loop = self.render_loop.lock().await;
        if render_loop.is_some() {
            return;
        }
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = self.compositor.spawn_loop(shutdown_rx);
        *render_loop = Some(RenderLoop { shutdown_tx, task });
    }

    /// The composite output exists only while live or previewing
    async fn stop_render_loop_if_idle(&self) {
        if self.is_live.load(Ordering::SeqCst) || self.is_preview.load(Ordering::SeqCst) {
            return;
        }
        let taken = self.render_loop.lock().await.take();
        if let Some(render_loop) = taken {
            let _ = render_loop.shutdown_tx.send(true);
            let _ = render_loop.task.await;
        }
    }

    /// Tear the whole session down
    pub async fn shutdown(self) {
        self.stop_broadcast().await;
        self.is_preview.store(false, Ordering::SeqCst);
        self.stop_render_loop_if_idle().await;
        self.signaling.close().await;
        self.pump_task.abort();
        self.forward_task.abort();
        tracing::info!("Studio session shut down");
    }
}

/// Apply inbound signaling events to local state.
///
/// Every application here is idempotent, so the coordinator echoing our own
/// events back is harmless.
async fn event_pump(
    mut inbound: mpsc::Receiver<SignalingEvent>,
    registry: Arc<ParticipantRegistry>,
    compositor: Arc<Compositor>,
) {
    while let Some(event) = inbound.recv().await {
        match event {
            SignalingEvent::JoinStudio {
                participant_id,
                display_name,
                role,
            } => {
                registry
                    .apply_remote_join(participant_id, &display_name, role)
                    .await;
            }
            SignalingEvent::LeaveStudio { participant_id } => {
                registry.apply_remote_leave(&participant_id).await;
            }
            SignalingEvent::StageTransition {
                participant_id,
                new_state,
            } => {
                registry
                    .apply_remote_transition(&participant_id, new_state)
                    .await;
            }
            SignalingEvent::MediaStateChanged {
                participant_id,
                media,
            } => {
                registry.apply_remote_media(&participant_id, media).await;
            }
            SignalingEvent::LayoutUpdated { layout } => {
                compositor.set_layout(layout).await;
            }
            SignalingEvent::ChatMessage { from, text } => {
                compositor.push_chat(from.to_string(), text).await;
            }
            SignalingEvent::BannerUpdated { text } => {
                compositor.update_overlays(|o| o.banner = text).await;
            }
            SignalingEvent::Teleprompter { control } => {
                compositor
                    .update_overlays(|o| o.apply_teleprompter(&control))
                    .await;
            }
            SignalingEvent::SyncSnapshot {
                participants,
                layout,
            } => {
                registry.apply_snapshot(&participants).await;
                compositor.set_layout(layout).await;
            }
            SignalingEvent::SyncRequest => {}
        }
    }
    tracing::warn!("Signaling inbound closed; session is offline");
}

/// Forward local registry transitions to the coordinator
async fn forward_registry_events(
    mut events: broadcast::Receiver<RegistryEvent>,
    outbound: mpsc::Sender<SignalingEvent>,
) {
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Registry event forwarder lagged");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => return,
        };

        let signal = match event {
            RegistryEvent::Joined { participant } => SignalingEvent::JoinStudio {
                participant_id: participant.id,
                display_name: participant.display_name,
                role: participant.role,
            },
            RegistryEvent::Left { id } => SignalingEvent::LeaveStudio { participant_id: id },
            RegistryEvent::StageChanged { id, to, .. } => SignalingEvent::StageTransition {
                participant_id: id,
                new_state: to,
            },
            RegistryEvent::MediaChanged { id, media } => SignalingEvent::MediaStateChanged {
                participant_id: id,
                media,
            },
        };

        if outbound.send(signal).await.is_err() {
            return;
        }
    }
}
