//! Overlay state and rendering
//!
//! Overlays draw over the base composite in a fixed z-order: name tags and
//! the lower-third banner first, then the chat column, then captions, then
//! the teleprompter. The teleprompter is studio-only: it renders on the
//! preview surface and never on the program output.
//!
//! Overlay text content travels with the frame metadata consumed by the
//! embedding UI; the compositor reserves and paints the overlay regions.

use std::collections::VecDeque;

use super::canvas::Canvas;
use super::layout::{Rect, ResolvedSlot};
use crate::media::Rgba;
use crate::registry::Participant;
use crate::signaling::TeleprompterAction;

/// Retained chat lines for the overlay
const CHAT_OVERLAY_LINES: usize = 6;

/// One chat line shown in the overlay
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatLine {
    /// Display name of the sender
    pub from: String,
    /// Message text
    pub text: String,
}

/// Teleprompter panel state (studio preview only)
#[derive(Debug, Clone, PartialEq)]
pub struct Teleprompter {
    /// Whether the panel is shown on the preview
    pub visible: bool,
    /// Script text
    pub text: String,
    /// Scroll speed in lines per second
    pub lines_per_second: f32,
}

impl Default for Teleprompter {
    fn default() -> Self {
        Self {
            visible: false,
            text: String::new(),
            lines_per_second: 1.0,
        }
    }
}

/// All toggleable overlay state for one session
#[derive(Debug, Clone)]
pub struct OverlayState {
    /// Draw per-slot name tags
    pub name_tags: bool,
    /// Draw the chat column
    pub chat_enabled: bool,
    /// Draw the caption band
    pub captions_enabled: bool,
    /// Current caption text
    pub caption: Option<String>,
    /// Lower-third banner text; `None` hides the band
    pub banner: Option<String>,
    /// Teleprompter panel
    pub teleprompter: Teleprompter,
    chat: VecDeque<ChatLine>,
}

impl Default for OverlayState {
    fn default() -> Self {
        Self {
            name_tags: true,
            chat_enabled: false,
            captions_enabled: false,
            caption: None,
            banner: None,
            teleprompter: Teleprompter::default(),
            chat: VecDeque::new(),
        }
    }
}

impl OverlayState {
    /// Append a chat line, keeping only the most recent few
    pub fn push_chat(&mut self, line: ChatLine) {
        if self.chat.len() == CHAT_OVERLAY_LINES {
            self.chat.pop_front();
        }
        self.chat.push_back(line);
    }

    /// Recent chat lines, oldest first
    pub fn chat_lines(&self) -> impl Iterator<Item = &ChatLine> {
        self.chat.iter()
    }

    /// Apply a teleprompter control message
    pub fn apply_teleprompter(&mut self, action: &TeleprompterAction) {
        match action {
            TeleprompterAction::Show => self.teleprompter.visible = true,
            TeleprompterAction::Hide => self.teleprompter.visible = false,
            TeleprompterAction::SetText { text } => self.teleprompter.text = text.clone(),
            TeleprompterAction::SetSpeed { lines_per_second } => {
                self.teleprompter.lines_per_second = lines_per_second.max(0.0)
            }
        }
    }
}

const TAG_FILL: Rgba = Rgba::new(12, 12, 16, 200);
const TAG_ACCENT: Rgba = Rgba::opaque(64, 160, 255);
const BANNER_FILL: Rgba = Rgba::new(20, 20, 28, 220);
const CHAT_FILL: Rgba = Rgba::new(24, 24, 32, 180);
const CAPTION_FILL: Rgba = Rgba::new(0, 0, 0, 210);
const PROMPTER_FILL: Rgba = Rgba::new(8, 8, 8, 170);

/// Draw all enabled overlays in z-order.
///
/// `studio_view` selects the preview surface; it is the only surface the
/// teleprompter may appear on.
pub fn draw_overlays(
    canvas: &mut Canvas,
    state: &OverlayState,
    slots: &[ResolvedSlot],
    live: &[Participant],
    studio_view: bool,
) {
    let width = canvas.width();
    let height = canvas.height();

    // Name tags over each occupied slot
    if state.name_tags {
        for slot in slots {
            let Some(source) = &slot.source else { continue };
            if !live.iter().any(|p| &p.id == source.participant_id()) {
                continue;
            }
            let tag_h = (slot.rect.height / 10).clamp(14, 32);
            if slot.rect.height <= tag_h {
                continue;
            }
            let tag = Rect::new(
                slot.rect.x,
                slot.rect.bottom() - tag_h,
                (slot.rect.width / 3).max(1),
                tag_h,
            );
            canvas.blend_rect(tag, TAG_FILL);
            canvas.fill_rect(Rect::new(tag.x, tag.y, 3.min(tag.width), tag.height), TAG_ACCENT);
        }
    }

    // Lower-third banner
    if state.banner.is_some() {
        let band_h = height / 8;
        canvas.blend_rect(
            Rect::new(0, height - band_h - height / 12, width, band_h),
            BANNER_FILL,
        );
    }

    // Chat column on the right edge
    if state.chat_enabled {
        let line_h = (height / 18).max(12);
        let col_w = width / 4;
        for (i, _line) in state.chat_lines().enumerate() {
            let y = height
                .saturating_sub((state.chat.len() - i) as u32 * (line_h + 4))
                .saturating_sub(height / 6);
            canvas.blend_rect(
                Rect::new(width - col_w - 8, y, col_w, line_h),
                CHAT_FILL,
            );
        }
    }

    // Caption band
    if state.captions_enabled && state.caption.is_some() {
        let band_h = height / 10;
        canvas.blend_rect(
            Rect::new(width / 8, height - band_h - 8, width - width / 4, band_h),
            CAPTION_FILL,
        );
    }

    // Teleprompter: studio preview only, never on the program output
    if studio_view && state.teleprompter.visible {
        canvas.blend_rect(Rect::new(0, 0, width, height / 3), PROMPTER_FILL);
    }
}
