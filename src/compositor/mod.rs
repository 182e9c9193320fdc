//! Compositor: merges N live sources into one output stream
//!
//! # Architecture
//!
//! ```text
//!  ParticipantRegistry (live set)      FrameStore (latest frames)
//!              │                              │
//!              ▼                              ▼
//!        resolve_slots() ──► Canvas blits ──► overlays ──► CompositeFrame
//!              │                                               │
//!        (same function)                          broadcast::Sender (sole writer)
//!              │                                   │         │         │
//!              ▼                                   ▼         ▼         ▼
//!       preview render                      destinations  recorder  vertical crop
//! ```
//!
//! A participant is composited if and only if its stage state is `live`;
//! the slot set is recomputed from the registry every frame. Program and
//! preview renders share the slot-resolution function so the two surfaces
//! cannot drift.

pub mod audio;
pub mod canvas;
pub mod config;
pub mod crop;
pub mod layout;
pub mod overlay;
pub mod render;

pub use audio::{mix, MixInput};
pub use canvas::Canvas;
pub use config::CompositorConfig;
pub use crop::{CenterCrop, CropConfig, CropTargetProvider, VerticalCropper};
pub use layout::{resolve_slots, Layout, LayoutKind, Rect, ResolvedSlot, SlotSource};
pub use overlay::{ChatLine, OverlayState, Teleprompter};
pub use render::{CompositeFrame, Compositor, RenderTarget};
