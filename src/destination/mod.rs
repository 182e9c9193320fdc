//! Destination streaming: one independent publishing session per platform
//!
//! # Architecture
//!
//! ```text
//!   Compositor output (broadcast)
//!        │ resubscribe() per session
//!        ├────────────────┬────────────────┐
//!        ▼                ▼                ▼
//!   [session task A] [session task B] [session task C]
//!    negotiate ►       negotiate ►      negotiate ►
//!    pump + health     pump + health    pump + health
//!    retry w/ backoff  retry w/ backoff retry w/ backoff
//!        │                │                │
//!        ▼                ▼                ▼
//!    platform A        platform B       platform C
//! ```
//!
//! Sessions share nothing but the frame source; a reconnect cycle on one
//! never pauses the others. Ingest protocol differences live behind the
//! [`IngestNegotiator`] seam.

pub mod config;
pub mod manager;
pub mod negotiator;
pub mod session;

pub use config::StreamingConfig;
pub use manager::{DestinationManager, StreamingEvent};
pub use negotiator::{IngestNegotiator, IngestSession, LoopbackNegotiator, LoopbackSession};
pub use session::{
    ConnectionState, Destination, DestinationId, DestinationSession, DestinationStatus,
    HealthSample, PlatformKind,
};
