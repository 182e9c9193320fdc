//! Status surface for the embedding UI

use crate::destination::DestinationStatus;
use crate::registry::StageCounts;
use crate::signaling::ChannelState;

/// One status snapshot of the whole broadcast
#[derive(Debug, Clone)]
pub struct BroadcastStatus {
    /// Whether the broadcast is publishing
    pub is_live: bool,
    /// Whether the recording consumer is attached
    pub is_recording: bool,
    /// Connected participants (viewers excluded)
    pub participant_count: usize,
    /// Participants currently on stage
    pub live_count: usize,
    /// Audience size
    pub viewer_count: usize,
    /// Signaling connection state
    pub signaling: ChannelState,
    /// Per-destination connection state and health, ordered by id
    pub destinations: Vec<DestinationStatus>,
}

impl BroadcastStatus {
    pub(crate) fn from_counts(
        is_live: bool,
        is_recording: bool,
        counts: StageCounts,
        signaling: ChannelState,
        destinations: Vec<DestinationStatus>,
    ) -> Self {
        Self {
            is_live,
            is_recording,
            participant_count: counts.invited + counts.greenroom + counts.backstage + counts.live,
            live_count: counts.live,
            viewer_count: counts.viewers,
            signaling,
            destinations,
        }
    }
}
