//! Signaling wire events
//!
//! Transport-agnostic event types carried between each connected browser and
//! the session coordinator. Encoded as internally tagged JSON; decoding
//! failures map to [`Error::MalformedEvent`] and drop the one message, never
//! the connection.

use serde::{Deserialize, Serialize};

use crate::compositor::Layout;
use crate::error::{Error, Result};
use crate::registry::{MediaFlags, ParticipantId, ParticipantRole, ParticipantSnapshot, StageState};

/// Teleprompter control actions (studio-side only, never rendered to output)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum TeleprompterAction {
    /// Show the teleprompter panel
    Show,
    /// Hide the teleprompter panel
    Hide,
    /// Replace the script text
    SetText {
        /// New script contents
        text: String,
    },
    /// Change the scroll speed
    SetSpeed {
        /// Lines per second
        lines_per_second: f32,
    },
}

/// One signaling message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SignalingEvent {
    /// A participant asks to join the studio session
    JoinStudio {
        participant_id: ParticipantId,
        display_name: String,
        role: ParticipantRole,
    },

    /// A participant left or disconnected
    LeaveStudio { participant_id: ParticipantId },

    /// A stage transition decided by the registry's owner
    StageTransition {
        participant_id: ParticipantId,
        new_state: StageState,
    },

    /// The active layout changed
    LayoutUpdated { layout: Layout },

    /// A participant's media flags changed
    MediaStateChanged {
        participant_id: ParticipantId,
        media: MediaFlags,
    },

    /// Chat line, also feeds the chat overlay when enabled
    ChatMessage {
        from: ParticipantId,
        text: String,
    },

    /// Banner text shown as a lower-third; `None` clears it
    BannerUpdated { text: Option<String> },

    /// Teleprompter control
    Teleprompter { control: TeleprompterAction },

    /// Ask the coordinator for a full state snapshot (sent after reconnect)
    SyncRequest,

    /// Full authoritative state, replacing the local view
    SyncSnapshot {
        participants: Vec<ParticipantSnapshot>,
        layout: Layout,
    },
}

impl SignalingEvent {
    /// Encode to the JSON wire format
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::MalformedEvent(e.to_string()))
    }

    /// Decode from the JSON wire format
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| Error::MalformedEvent(e.to_string()))
    }

    /// The participant this event is about, when there is exactly one
    pub fn participant_id(&self) -> Option<&ParticipantId> {
        match self {
            SignalingEvent::JoinStudio { participant_id, .. }
            | SignalingEvent::LeaveStudio { participant_id }
            | SignalingEvent::StageTransition { participant_id, .. }
            | SignalingEvent::MediaStateChanged { participant_id, .. } => Some(participant_id),
            SignalingEvent::ChatMessage { from, .. } => Some(from),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_transition_wire_format() {
        let event = SignalingEvent::StageTransition {
            participant_id: ParticipantId::new("alice"),
            new_state: StageState::Live,
        };

        let json = event.to_json().unwrap();
        assert!(json.contains("\"type\":\"stage-transition\""));
        assert!(json.contains("\"new_state\":\"live\""));

        let back = SignalingEvent::from_json(&json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_malformed_event_is_an_error() {
        let result = SignalingEvent::from_json("{\"type\":\"no-such-event\"}");
        assert!(matches!(result, Err(Error::MalformedEvent(_))));
    }

    #[test]
    fn test_sync_request_round_trip() {
        let json = SignalingEvent::SyncRequest.to_json().unwrap();
        let back = SignalingEvent::from_json(&json).unwrap();
        assert_eq!(back, SignalingEvent::SyncRequest);
    }
}
