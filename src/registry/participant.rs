//! Participant records and stage states
//!
//! The stage state machine:
//!
//! ```text
//!   invited ──► greenroom ──► backstage ──► live
//!                   ▲              │          │
//!                   └──────────────┘◄─────────┘
//!                        (host-initiated reversals)
//!
//!   any state ──► banned (terminal)
//! ```

use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::media::SourceId;

/// Unique identifier for a participant.
///
/// Doubles as the identity fingerprint for ban enforcement: a banned id
/// cannot rejoin within the session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
    /// Create a new participant id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ParticipantId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Role of a connected participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParticipantRole {
    /// Session owner; drives stage transitions and layout
    Host,
    /// Invited on-stage participant
    Guest,
    /// Server-side stand-in for an audience member (counted, never staged)
    ViewerProxy,
}

/// Where a participant stands in the stage lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StageState {
    /// Invite issued, participant has not joined yet
    Invited,
    /// Joined; testing devices before going on stage
    Greenroom,
    /// Stage-eligible but not currently composited
    Backstage,
    /// Visible and audible in the composite output
    Live,
    /// Removed from the session; terminal
    Banned,
}

impl StageState {
    /// Whether `promote` is legal from this state
    pub fn can_go_live(self) -> bool {
        matches!(self, StageState::Greenroom | StageState::Backstage)
    }

    /// Whether no further transition may leave this state
    pub fn is_terminal(self) -> bool {
        self == StageState::Banned
    }
}

/// Per-participant media flags
///
/// Mutable in any stage state; the compositor picks changes up on its next
/// frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MediaFlags {
    /// Whether the audio track contributes to the mix
    pub audio_enabled: bool,
    /// Whether the video track is drawn
    pub video_enabled: bool,
    /// Source volume in [0.0, 1.0]
    pub volume: f32,
    /// Hard mute, independent of `volume`
    pub muted: bool,
}

impl Default for MediaFlags {
    fn default() -> Self {
        Self {
            audio_enabled: true,
            video_enabled: true,
            volume: 1.0,
            muted: false,
        }
    }
}

impl MediaFlags {
    /// Gain this source contributes to the mix, before the master multiplier
    pub fn effective_gain(&self) -> f32 {
        if self.muted || !self.audio_enabled {
            0.0
        } else {
            self.volume.clamp(0.0, 1.0)
        }
    }
}

/// One participant record, owned by the registry
#[derive(Debug, Clone)]
pub struct Participant {
    /// Unique id within the session
    pub id: ParticipantId,

    /// Name shown on lower-third overlays
    pub display_name: String,

    /// Role within the session
    pub role: ParticipantRole,

    /// Current stage state
    pub stage: StageState,

    /// Media flags
    pub media: MediaFlags,

    /// Bound camera/mic source, absent until the greenroom camera test binds one
    pub source: Option<SourceId>,

    /// Bound screenshare source, present only while sharing
    pub screen_source: Option<SourceId>,

    /// When the record was created
    pub joined_at: Instant,

    /// Monotonic promotion order, set while `Live` (drives slot ordering)
    pub live_order: Option<u64>,
}

impl Participant {
    /// Create a record in the given initial stage state
    pub fn new(
        id: ParticipantId,
        display_name: impl Into<String>,
        role: ParticipantRole,
        stage: StageState,
    ) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            role,
            stage,
            media: MediaFlags::default(),
            source: None,
            screen_source: None,
            joined_at: Instant::now(),
            live_order: None,
        }
    }

    /// Whether this participant is composited
    pub fn is_live(&self) -> bool {
        self.stage == StageState::Live
    }

    /// Serializable view for signaling snapshots
    pub fn snapshot(&self) -> ParticipantSnapshot {
        ParticipantSnapshot {
            id: self.id.clone(),
            display_name: self.display_name.clone(),
            role: self.role,
            stage: self.stage,
            media: self.media,
        }
    }
}

/// Wire-format view of a participant, used in resync snapshots
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantSnapshot {
    /// Unique id within the session
    pub id: ParticipantId,
    /// Display name
    pub display_name: String,
    /// Role within the session
    pub role: ParticipantRole,
    /// Stage state at snapshot time
    pub stage: StageState,
    /// Media flags at snapshot time
    pub media: MediaFlags,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_state_guards() {
        assert!(StageState::Greenroom.can_go_live());
        assert!(StageState::Backstage.can_go_live());
        assert!(!StageState::Invited.can_go_live());
        assert!(!StageState::Live.can_go_live());
        assert!(!StageState::Banned.can_go_live());
        assert!(StageState::Banned.is_terminal());
    }

    #[test]
    fn test_effective_gain() {
        let mut media = MediaFlags::default();
        media.volume = 0.5;
        assert_eq!(media.effective_gain(), 0.5);

        media.muted = true;
        assert_eq!(media.effective_gain(), 0.0);

        media.muted = false;
        media.audio_enabled = false;
        assert_eq!(media.effective_gain(), 0.0);
    }

    #[test]
    fn test_volume_clamped() {
        let media = MediaFlags {
            volume: 3.0,
            ..Default::default()
        };
        assert_eq!(media.effective_gain(), 1.0);
    }

    #[test]
    fn test_snapshot_round_trip() {
        let participant = Participant::new(
            ParticipantId::new("alice"),
            "Alice",
            ParticipantRole::Guest,
            StageState::Greenroom,
        );

        let snapshot = participant.snapshot();
        let json = serde_json::to_string(&snapshot).unwrap();
        let back: ParticipantSnapshot = serde_json::from_str(&json).unwrap();

        assert_eq!(back, snapshot);
        assert_eq!(back.stage, StageState::Greenroom);
    }
}
