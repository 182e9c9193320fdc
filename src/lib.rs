//! # stagecast
//!
//! The real-time core of a live-broadcast studio: participant staging,
//! N-source compositing into one output stream, and independent publishing
//! sessions to multiple external destinations.
//!
//! # Architecture
//!
//! ```text
//!   Media Acquisition          Participant Registry ◄── Signaling Channel
//!   (FrameStore, tracks)       (stage state machine)     (reconnect + resync)
//!          │                           │
//!          └──────────┬────────────────┘
//!                     ▼
//!               Compositor ──► CompositeFrame broadcast (sole writer)
//!                     │              │            │           │
//!                     ▼              ▼            ▼           ▼
//!               studio preview  destinations   recorder   vertical crop
//!                                    │
//!                                    ▼
//!                      Destination Streaming Manager
//!                      (per-destination session tasks,
//!                       backoff retry, health monitor)
//! ```
//!
//! The [`studio::Studio`] orchestrator constructs and wires these
//! components; nothing here is a global. Failure isolation is the central
//! design rule: a failed source renders a placeholder, a failed destination
//! retries or terminates alone, and a dropped signaling connection resyncs
//! from a snapshot. None of them stop the frame loop.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use stagecast::destination::{Destination, LoopbackNegotiator, PlatformKind};
//! use stagecast::registry::{ParticipantId, ParticipantRole};
//! use stagecast::signaling::StudioHub;
//! use stagecast::studio::{Studio, StudioConfig};
//!
//! # async fn example() -> stagecast::error::Result<()> {
//! let config = StudioConfig::default().destinations(vec![Destination::new(
//!     "main",
//!     PlatformKind::RelayPush,
//!     "rtmp://ingest.example/live/key",
//! )]);
//!
//! let studio = Studio::connect(
//!     config,
//!     Arc::new(LoopbackNegotiator::new()),
//!     Arc::new(StudioHub::new()),
//! )
//! .await?;
//!
//! let host = ParticipantId::new("host");
//! studio.join(host.clone(), "Host", ParticipantRole::Host).await?;
//! studio.promote(&host).await?;
//! studio.start_broadcast().await?;
//! # Ok(())
//! # }
//! ```

pub mod backoff;
pub mod compositor;
pub mod destination;
pub mod error;
pub mod media;
pub mod registry;
pub mod signaling;
pub mod studio;

pub use backoff::BackoffConfig;
pub use compositor::{CompositeFrame, Compositor, CompositorConfig, Layout, LayoutKind};
pub use destination::{
    ConnectionState, Destination, DestinationId, DestinationManager, PlatformKind,
};
pub use error::{Error, Result};
pub use media::{FrameStore, SourceId, SourceKind};
pub use registry::{ParticipantId, ParticipantRegistry, ParticipantRole, StageState};
pub use signaling::{SignalingChannel, SignalingEvent, StudioHub};
pub use studio::{BroadcastStatus, Studio, StudioConfig};
