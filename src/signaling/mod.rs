//! Signaling: the control-plane connection between studio members
//!
//! Carries join/leave, stage transitions, layout changes and chat between
//! each member and the shared session coordinator. Transport is a seam
//! ([`SignalingTransport`]); the crate ships an in-memory [`StudioHub`]
//! coordinator, and real deployments plug their own connection in.
//!
//! Delivery guarantees are deliberately weak: per-sender ordering only, no
//! ordering across a disconnect. Consumers reconcile through idempotent
//! event application plus full snapshot resync after every reconnect.

pub mod channel;
pub mod event;
pub mod hub;

pub use channel::{
    ChannelState, SignalingChannel, SignalingConfig, SignalingConnection, SignalingTransport,
};
pub use event::{SignalingEvent, TeleprompterAction};
pub use hub::{HubConnection, StudioHub};
