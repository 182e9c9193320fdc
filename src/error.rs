//! Crate-wide error types
//!
//! Errors here follow a strict isolation rule: nothing is fatal to the whole
//! studio. An illegal stage transition is a local no-op, a failed destination
//! is retried or terminated on its own, and a dropped signaling connection is
//! resynchronized. Compositing and the remaining destinations keep running.

use thiserror::Error;

use crate::destination::DestinationId;
use crate::media::SourceKind;
use crate::registry::{ParticipantId, StageState};

/// Convenience result type used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for all studio operations
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Illegal participant stage transition. The registry leaves the record
    /// untouched; callers log and continue.
    #[error("invalid transition for {participant}: {from:?} -> {attempted:?}")]
    InvalidTransition {
        /// Participant the transition was attempted on
        participant: ParticipantId,
        /// Stage state at the time of the attempt
        from: StageState,
        /// Stage state the caller asked for
        attempted: StageState,
    },

    /// Operation referenced a participant the registry does not know
    #[error("unknown participant: {0}")]
    UnknownParticipant(ParticipantId),

    /// Join rejected: the session already holds the configured maximum
    #[error("session at capacity ({0} participants)")]
    SessionAtCapacity(usize),

    /// Promote rejected: the stage already holds the configured maximum
    #[error("stage full ({0} live participants)")]
    StageFull(usize),

    /// Join rejected: this identity was banned earlier in the session
    #[error("identity banned from this session: {0}")]
    BannedIdentity(ParticipantId),

    /// Camera, microphone or screen capture could not be acquired.
    /// Surfaced to the user immediately; the broadcast may proceed degraded.
    #[error("media acquisition failed for {kind:?}: {reason}")]
    MediaAcquisition {
        /// Kind of source that failed to open
        kind: SourceKind,
        /// Backend-specific failure description
        reason: String,
    },

    /// Ingest handshake with a destination failed. Retried with backoff;
    /// surfaced as a non-fatal, destination-scoped warning.
    #[error("negotiation with destination {destination} failed: {reason}")]
    Negotiation {
        /// Destination the handshake was against
        destination: DestinationId,
        /// Negotiator-specific failure description
        reason: String,
    },

    /// Operation referenced a destination the manager does not know
    #[error("unknown destination: {0}")]
    UnknownDestination(DestinationId),

    /// A destination session gave up after exhausting its retry budget.
    /// User-visible and destination-scoped; other destinations are unaffected.
    #[error("destination {destination} exhausted after {attempts} attempts")]
    DestinationExhausted {
        /// Destination that ran out of attempts
        destination: DestinationId,
        /// Number of attempts made before giving up
        attempts: u32,
    },

    /// The signaling channel could not be re-established within its retry
    /// budget. Surfaced as a session-health warning.
    #[error("signaling disconnected after {attempts} reconnect attempts")]
    SignalingDisconnected {
        /// Number of reconnect attempts made before giving up
        attempts: u32,
    },

    /// A signaling wire message could not be decoded
    #[error("malformed signaling event: {0}")]
    MalformedEvent(String),

    /// An internal channel or session handle was used after shutdown
    #[error("channel closed: {0}")]
    ChannelClosed(&'static str),
}

impl Error {
    /// Whether this error is scoped to a single destination
    pub fn is_destination_scoped(&self) -> bool {
        matches!(
            self,
            Error::Negotiation { .. } | Error::DestinationExhausted { .. }
        )
    }
}
