//! Session orchestration: wiring the pipeline together
//!
//! The [`Studio`] owns one of everything (registry, frame store,
//! compositor, destination manager, signaling channel) and drives the
//! broadcast lifecycle end to end.

pub mod orchestrator;
pub mod status;

pub use orchestrator::{Studio, StudioConfig};
pub use status::BroadcastStatus;
