//! Participant registry: who is connected and who is on stage
//!
//! The registry is the single source of truth for stage state. Components
//! never mutate a participant directly; they call transition operations,
//! which validate the state machine, then broadcast a [`RegistryEvent`] so
//! every connected peer converges on the same view.
//!
//! # Architecture
//!
//! ```text
//!   host actions ──► ParticipantRegistry ──► broadcast::Sender<RegistryEvent>
//!                        │    ▲                      │
//!       (read-only)      │    │ apply_remote_*       ├──► signaling (to peers)
//!   Compositor ◄─────────┘    │                      └──► UI / status
//!                       SignalingChannel (from peers)
//! ```
//!
//! Remote events apply idempotently: a duplicate `promote` is a no-op, not
//! an error, so reordered delivery across senders cannot corrupt state.

pub mod config;
pub mod participant;
pub mod store;

pub use config::RegistryConfig;
pub use participant::{
    MediaFlags, Participant, ParticipantId, ParticipantRole, ParticipantSnapshot, StageState,
};
pub use store::{ParticipantRegistry, RegistryEvent, StageCounts};
