//! Layout descriptors and slot resolution
//!
//! A [`Layout`] is a declarative mapping from visual slots to sources.
//! [`resolve_slots`] is the single source of truth for slot geometry: the
//! program render and the studio preview both call it, so the two surfaces
//! can never drift apart. Exactly one layout is active per session; the
//! compositor swaps it atomically between frames.

use serde::{Deserialize, Serialize};

use crate::registry::{Participant, ParticipantId};

/// Axis-aligned pixel rectangle on the canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    /// Construct a rectangle
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Right edge (exclusive)
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    /// Bottom edge (exclusive)
    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    /// Whether this rectangle lies fully inside a canvas of the given size
    pub fn fits_in(&self, width: u32, height: u32) -> bool {
        self.right() <= width && self.bottom() <= height
    }
}

/// Shape of the active layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LayoutKind {
    /// Equal-sized tiles
    Grid,
    /// One dominant tile over a bottom strip
    Spotlight,
    /// One dominant tile with a right-hand rail
    Sidebar,
    /// Full-canvas primary with small floating tiles
    PictureInPicture,
    /// Screenshare dominant, cameras in the rail
    ScreenShareEmphasis,
}

/// What occupies a visual slot
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "kebab-case")]
pub enum SlotSource {
    /// A live participant's camera feed
    Participant { id: ParticipantId },
    /// A live participant's screenshare feed
    Screenshare { id: ParticipantId },
}

impl SlotSource {
    /// The participant behind this source
    pub fn participant_id(&self) -> &ParticipantId {
        match self {
            SlotSource::Participant { id } | SlotSource::Screenshare { id } => id,
        }
    }
}

/// Declarative layout: a kind plus an ordered slot assignment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    /// Geometry family
    pub kind: LayoutKind,
    /// Ordered stage slots. May be empty: live participants then fill
    /// slots in promotion order. Declared slots whose participant is not
    /// live render a placeholder.
    pub slots: Vec<SlotSource>,
}

impl Layout {
    /// Auto-filling grid layout
    pub fn grid() -> Self {
        Self {
            kind: LayoutKind::Grid,
            slots: Vec::new(),
        }
    }

    /// Spotlight with an explicit primary participant
    pub fn spotlight(primary: ParticipantId) -> Self {
        Self {
            kind: LayoutKind::Spotlight,
            slots: vec![SlotSource::Participant { id: primary }],
        }
    }

    /// Screenshare-emphasis layout for one sharing participant
    pub fn screenshare(sharer: ParticipantId) -> Self {
        Self {
            kind: LayoutKind::ScreenShareEmphasis,
            slots: vec![SlotSource::Screenshare { id: sharer }],
        }
    }

    /// Replace the slot assignment
    pub fn with_slots(mut self, slots: Vec<SlotSource>) -> Self {
        self.slots = slots;
        self
    }
}

impl Default for Layout {
    fn default() -> Self {
        Self::grid()
    }
}

/// One resolved visual position for the current frame
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSlot {
    /// Where on the canvas to draw
    pub rect: Rect,
    /// What to draw; `None` renders the placeholder
    pub source: Option<SlotSource>,
}

/// Gap between tiles in pixels
const GUTTER: u32 = 4;

/// Resolve the ordered visible source list and its geometry.
///
/// The visible participant set equals exactly the live set, every frame:
/// declared slots bound to non-live participants are skipped (their position
/// renders a placeholder), and live participants without a declared slot are
/// appended in promotion order.
pub fn resolve_slots(
    layout: &Layout,
    live: &[Participant],
    canvas_width: u32,
    canvas_height: u32,
) -> Vec<ResolvedSlot> {
    let mut ordered: Vec<SlotSource> = Vec::new();

    // Declared slots first, keeping only sources whose participant is live
    for slot in &layout.slots {
        let is_live = live.iter().any(|p| &p.id == slot.participant_id());
        if is_live && !ordered.contains(slot) {
            ordered.push(slot.clone());
        }
    }

    // Then every live participant not yet covered, in promotion order
    for participant in live {
        let covered = ordered.iter().any(
            |s| matches!(s, SlotSource::Participant { id } if id == &participant.id),
        );
        if !covered {
            ordered.push(SlotSource::Participant {
                id: participant.id.clone(),
            });
        }
    }

    // Screenshare-emphasis puts the first screenshare source up front
    if layout.kind == LayoutKind::ScreenShareEmphasis {
        if let Some(pos) = ordered
            .iter()
            .position(|s| matches!(s, SlotSource::Screenshare { .. }))
        {
            let share = ordered.remove(pos);
            ordered.insert(0, share);
        }
    }

    // Declared-but-unfilled slots still occupy a placeholder position
    let count = ordered.len().max(layout.slots.len()).max(1);
    let rects = slot_rects(layout.kind, count, canvas_width, canvas_height);

    rects
        .into_iter()
        .enumerate()
        .map(|(i, rect)| ResolvedSlot {
            rect,
            source: ordered.get(i).cloned(),
        })
        .collect()
}

/// Geometry for `count` slots of the given kind
fn slot_rects(kind: LayoutKind, count: usize, width: u32, height: u32) -> Vec<Rect> {
    match kind {
        LayoutKind::Grid => grid_rects(count, Rect::new(0, 0, width, height)),
        LayoutKind::Spotlight => {
            if count <= 1 {
                return vec![Rect::new(0, 0, width, height)];
            }
            let strip_h = height / 4;
            let main = Rect::new(0, 0, width, height - strip_h);
            let mut rects = vec![main];
            rects.extend(row_rects(
                count - 1,
                Rect::new(0, height - strip_h, width, strip_h),
            ));
            rects
        }
        LayoutKind::Sidebar | LayoutKind::ScreenShareEmphasis => {
            if count <= 1 {
                return vec![Rect::new(0, 0, width, height)];
            }
            let rail_w = width / 4;
            let main = Rect::new(0, 0, width - rail_w, height);
            let mut rects = vec![main];
            rects.extend(column_rects(
                count - 1,
                Rect::new(width - rail_w, 0, rail_w, height),
            ));
            rects
        }
        LayoutKind::PictureInPicture => {
            let mut rects = vec![Rect::new(0, 0, width, height)];
            let tile_w = width / 5;
            let tile_h = height / 5;
            for i in 0..count.saturating_sub(1) {
                let offset = (i as u32 + 1) * (tile_w + GUTTER);
                let x = width.saturating_sub(offset);
                let y = height.saturating_sub(tile_h + GUTTER);
                rects.push(Rect::new(x, y, tile_w, tile_h));
            }
            rects
        }
    }
}

fn grid_rects(count: usize, area: Rect) -> Vec<Rect> {
    let cols = (count as f64).sqrt().ceil() as u32;
    let rows = (count as u32).div_ceil(cols);
    let cell_w = (area.width.saturating_sub((cols - 1) * GUTTER)) / cols;
    let cell_h = (area.height.saturating_sub((rows - 1) * GUTTER)) / rows;

    (0..count as u32)
        .map(|i| {
            let col = i % cols;
            let row = i / cols;
            Rect::new(
                area.x + col * (cell_w + GUTTER),
                area.y + row * (cell_h + GUTTER),
                cell_w,
                cell_h,
            )
        })
        .collect()
}

fn row_rects(count: usize, area: Rect) -> Vec<Rect> {
    let cols = count as u32;
    let cell_w = (area.width.saturating_sub((cols - 1) * GUTTER)) / cols.max(1);
    (0..cols)
        .map(|i| Rect::new(area.x + i * (cell_w + GUTTER), area.y, cell_w, area.height))
        .collect()
}

fn column_rects(count: usize, area: Rect) -> Vec<Rect> {
    let rows = count as u32;
    let cell_h = (area.height.saturating_sub((rows - 1) * GUTTER)) / rows.max(1);
    (0..rows)
        .map(|i| Rect::new(area.x, area.y + i * (cell_h + GUTTER), area.width, cell_h))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ParticipantRole, StageState};

    fn live(name: &str, order: u64) -> Participant {
        let mut p = Participant::new(
            ParticipantId::new(name),
            name,
            ParticipantRole::Guest,
            StageState::Live,
        );
        p.live_order = Some(order);
        p
    }

    #[test]
    fn test_visible_set_equals_live_set() {
        let layout = Layout::grid().with_slots(vec![
            SlotSource::Participant {
                id: ParticipantId::new("gone"),
            },
            SlotSource::Participant {
                id: ParticipantId::new("a"),
            },
        ]);
        let live = vec![live("a", 1), live("b", 2)];

        let slots = resolve_slots(&layout, &live, 1280, 720);
        let visible: Vec<&str> = slots
            .iter()
            .filter_map(|s| s.source.as_ref())
            .map(|s| s.participant_id().as_str())
            .collect();

        // "gone" is skipped, "b" is appended; visible == live exactly
        assert_eq!(visible, vec!["a", "b"]);
    }

    #[test]
    fn test_declared_slots_render_placeholders() {
        let layout = Layout::grid().with_slots(vec![
            SlotSource::Participant {
                id: ParticipantId::new("a"),
            },
            SlotSource::Participant {
                id: ParticipantId::new("absent"),
            },
        ]);
        let live = vec![live("a", 1)];

        let slots = resolve_slots(&layout, &live, 1280, 720);
        assert_eq!(slots.len(), 2);
        assert!(slots[0].source.is_some());
        assert!(slots[1].source.is_none());
    }

    #[test]
    fn test_grid_of_four_is_two_by_two() {
        let live: Vec<Participant> = (0..4).map(|i| live(&format!("p{i}"), i as u64)).collect();
        let slots = resolve_slots(&Layout::grid(), &live, 1280, 720);

        assert_eq!(slots.len(), 4);
        // Two distinct x positions and two distinct y positions
        assert_eq!(slots[0].rect.y, slots[1].rect.y);
        assert_eq!(slots[0].rect.x, slots[2].rect.x);
        assert!(slots[2].rect.y > slots[0].rect.y);
    }

    #[test]
    fn test_all_rects_fit_canvas() {
        for kind in [
            LayoutKind::Grid,
            LayoutKind::Spotlight,
            LayoutKind::Sidebar,
            LayoutKind::PictureInPicture,
            LayoutKind::ScreenShareEmphasis,
        ] {
            for n in 1..=9 {
                let live: Vec<Participant> =
                    (0..n).map(|i| live(&format!("p{i}"), i as u64)).collect();
                let layout = Layout {
                    kind,
                    slots: Vec::new(),
                };
                for slot in resolve_slots(&layout, &live, 1280, 720) {
                    assert!(
                        slot.rect.fits_in(1280, 720),
                        "{kind:?} with {n} slots produced {:?}",
                        slot.rect
                    );
                }
            }
        }
    }

    #[test]
    fn test_screenshare_moves_to_front() {
        let layout = Layout {
            kind: LayoutKind::ScreenShareEmphasis,
            slots: vec![
                SlotSource::Participant {
                    id: ParticipantId::new("a"),
                },
                SlotSource::Screenshare {
                    id: ParticipantId::new("b"),
                },
            ],
        };
        let live = vec![live("a", 1), live("b", 2)];

        let slots = resolve_slots(&layout, &live, 1280, 720);
        assert!(matches!(
            slots[0].source,
            Some(SlotSource::Screenshare { .. })
        ));
        // Primary tile is the large one
        assert!(slots[0].rect.width > slots[1].rect.width);
    }

    #[test]
    fn test_spotlight_primary_dominates() {
        let live = vec![live("a", 1), live("b", 2), live("c", 3)];
        let slots = resolve_slots(
            &Layout::spotlight(ParticipantId::new("b")),
            &live,
            1280,
            720,
        );

        assert_eq!(
            slots[0].source.as_ref().unwrap().participant_id().as_str(),
            "b"
        );
        assert!(slots[0].rect.height > slots[1].rect.height);
    }

    #[test]
    fn test_layout_serde_round_trip() {
        let layout = Layout::spotlight(ParticipantId::new("a"));
        let json = serde_json::to_string(&layout).unwrap();
        let back: Layout = serde_json::from_str(&json).unwrap();
        assert_eq!(back, layout);
    }
}
