//! Destination session state
//!
//! One session per external streaming destination. The connection state
//! machine:
//!
//! ```text
//!   idle ──► connecting ──► connected ⇄ degraded
//!                │              │           │
//!                ▼              ▼           ▼
//!           disconnected ◄──────┴───────────┘
//!                │ ▲
//!     (retry)    ▼ │
//!            connecting ... ──► terminated (stop, or retries exhausted)
//! ```
//!
//! Only the streaming manager mutates this state, and only through
//! [`DestinationSession::try_transition`], so an illegal jump (such as
//! `idle → connected`) cannot happen.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use super::config::StreamingConfig;

/// Unique identifier for a configured destination
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DestinationId(String);

impl DestinationId {
    /// Create a destination id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DestinationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DestinationId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// How a destination ingests the stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlatformKind {
    /// Peer-based ingest negotiation directly against the platform
    DirectPeer,
    /// Hand-off through a relay speaking a legacy push protocol
    RelayPush,
}

/// A configured streaming destination, immutable for the session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Destination {
    /// Destination id
    pub id: DestinationId,
    /// Ingest protocol family
    pub platform: PlatformKind,
    /// Ingest endpoint URL
    pub endpoint: String,
    /// Reference to stored credentials, resolved by the negotiator
    pub credential_ref: Option<String>,
}

impl Destination {
    /// Create a destination
    pub fn new(
        id: impl Into<String>,
        platform: PlatformKind,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            id: DestinationId::new(id),
            platform,
            endpoint: endpoint.into(),
            credential_ref: None,
        }
    }

    /// Attach a credential reference
    pub fn with_credential(mut self, credential_ref: impl Into<String>) -> Self {
        self.credential_ref = Some(credential_ref.into());
        self
    }
}

/// Connection state of one destination session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConnectionState {
    /// Created, not yet started
    Idle,
    /// Ingest negotiation in progress
    Connecting,
    /// Publishing normally
    Connected,
    /// Still publishing, but health crossed the degradation threshold
    Degraded,
    /// Connection lost; retry pending
    Disconnected,
    /// Released; terminal
    Terminated,
}

impl ConnectionState {
    /// Whether the state machine allows `self → to`
    pub fn can_transition(self, to: ConnectionState) -> bool {
        use ConnectionState::*;
        match (self, to) {
            // Stop is legal from any non-terminal state
            (s, Terminated) => s != Terminated,
            (Idle, Connecting) => true,
            (Connecting, Connected) | (Connecting, Disconnected) => true,
            (Connected, Degraded) | (Connected, Disconnected) => true,
            (Degraded, Connected) | (Degraded, Disconnected) => true,
            (Disconnected, Connecting) => true,
            _ => false,
        }
    }

    /// Whether the session is currently publishing frames
    pub fn is_publishing(self) -> bool {
        matches!(self, ConnectionState::Connected | ConnectionState::Degraded)
    }

    /// Whether no further transition may leave this state
    pub fn is_terminal(self) -> bool {
        self == ConnectionState::Terminated
    }
}

/// One health measurement from the transport
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HealthSample {
    /// Outgoing bitrate estimate in bits per second
    pub bitrate_bps: u64,
    /// Round-trip latency estimate
    pub rtt: Duration,
    /// Packet loss estimate in [0, 1]
    pub packet_loss: f32,
}

impl HealthSample {
    /// A nominal healthy sample
    pub fn healthy() -> Self {
        Self {
            bitrate_bps: 2_500_000,
            rtt: Duration::from_millis(40),
            packet_loss: 0.0,
        }
    }

    /// Whether this sample crosses the degradation thresholds
    pub fn is_degraded(&self, config: &StreamingConfig) -> bool {
        self.packet_loss > config.degraded_max_loss
            || self.bitrate_bps < config.degraded_min_bitrate
    }
}

/// Mutable per-destination session state
#[derive(Debug)]
pub struct DestinationSession {
    /// The configured destination
    pub destination: Destination,
    /// Current connection state
    pub state: ConnectionState,
    /// Consecutive failed attempts since the last successful connect
    pub retry_count: u32,
    /// Most recent health sample
    pub last_health: Option<HealthSample>,
    /// When the current connection was established
    pub connected_at: Option<Instant>,
    /// Frames published over the session lifetime
    pub frames_sent: u64,
    /// Bytes published over the session lifetime
    pub bytes_sent: u64,
}

impl DestinationSession {
    /// Create an idle session for a destination
    pub fn new(destination: Destination) -> Self {
        Self {
            destination,
            state: ConnectionState::Idle,
            retry_count: 0,
            last_health: None,
            connected_at: None,
            frames_sent: 0,
            bytes_sent: 0,
        }
    }

    /// Attempt a guarded state transition.
    ///
    /// Returns whether the transition was applied; illegal transitions are
    /// logged and refused.
    pub fn try_transition(&mut self, to: ConnectionState) -> bool {
        if self.state == to {
            return false;
        }
        if !self.state.can_transition(to) {
            tracing::warn!(
                destination = %self.destination.id,
                from = ?self.state,
                to = ?to,
                "Illegal destination state transition refused"
            );
            return false;
        }

        tracing::info!(
            destination = %self.destination.id,
            from = ?self.state,
            to = ?to,
            "Destination state transition"
        );
        self.state = to;
        match to {
            ConnectionState::Connected => {
                if self.connected_at.is_none() {
                    self.connected_at = Some(Instant::now());
                }
            }
            ConnectionState::Disconnected | ConnectionState::Terminated => {
                self.connected_at = None;
            }
            _ => {}
        }
        true
    }

    /// Record a health sample
    pub fn record_health(&mut self, sample: HealthSample) {
        self.last_health = Some(sample);
    }

    /// Record one published frame
    pub fn record_frame(&mut self, bytes: usize) {
        self.frames_sent += 1;
        self.bytes_sent += bytes as u64;
    }

    /// Snapshot for the status surface
    pub fn status(&self) -> DestinationStatus {
        DestinationStatus {
            id: self.destination.id.clone(),
            platform: self.destination.platform,
            state: self.state,
            retry_count: self.retry_count,
            frames_sent: self.frames_sent,
            health: self.last_health,
        }
    }
}

/// Read-only session snapshot surfaced to the UI
#[derive(Debug, Clone, PartialEq)]
pub struct DestinationStatus {
    /// Destination id
    pub id: DestinationId,
    /// Ingest protocol family
    pub platform: PlatformKind,
    /// Connection state at snapshot time
    pub state: ConnectionState,
    /// Consecutive failed attempts
    pub retry_count: u32,
    /// Frames published so far
    pub frames_sent: u64,
    /// Most recent health sample
    pub health: Option<HealthSample>,
}
