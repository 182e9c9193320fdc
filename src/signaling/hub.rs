//! In-memory session coordinator
//!
//! A single-process stand-in for the shared coordinator every browser
//! connects to. One `tokio::sync::broadcast` channel fans every event out to
//! all connections; the hub additionally keeps the authoritative
//! participant/layout state so it can answer `SyncRequest` with a full
//! snapshot instead of replaying missed events. Tests and local sessions use
//! it as their [`SignalingTransport`]; production deployments implement the
//! same trait over their real coordinator connection.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc, Mutex};

use super::channel::{SignalingConnection, SignalingTransport};
use super::event::SignalingEvent;
use crate::compositor::Layout;
use crate::error::{Error, Result};
use crate::registry::{ParticipantId, ParticipantSnapshot, StageState};

/// Capacity of the fan-out channel. Receivers that fall behind skip
/// messages and heal via snapshot resync.
const FANOUT_CAPACITY: usize = 1024;

struct HubEntry {
    snapshot: ParticipantSnapshot,
    live_seq: Option<u64>,
}

struct ConnectionEntry {
    direct_tx: mpsc::UnboundedSender<SignalingEvent>,
    closed_tx: tokio::sync::watch::Sender<bool>,
    participant: Option<ParticipantId>,
}

struct HubState {
    entries: HashMap<ParticipantId, HubEntry>,
    layout: Layout,
    next_live_seq: u64,
    connections: HashMap<u64, ConnectionEntry>,
    next_conn_id: u64,
    /// Scripted connect failures remaining (test hook)
    refuse_connects: u32,
}

struct HubInner {
    fanout: broadcast::Sender<SignalingEvent>,
    state: Mutex<HubState>,
}

/// In-memory coordinator hub
#[derive(Clone)]
pub struct StudioHub {
    inner: Arc<HubInner>,
}

impl StudioHub {
    /// Create an empty hub
    pub fn new() -> Self {
        let (fanout, _) = broadcast::channel(FANOUT_CAPACITY);
        Self {
            inner: Arc::new(HubInner {
                fanout,
                state: Mutex::new(HubState {
                    entries: HashMap::new(),
                    layout: Layout::default(),
                    next_live_seq: 1,
                    connections: HashMap::new(),
                    next_conn_id: 1,
                    refuse_connects: 0,
                }),
            }),
        }
    }

    /// Refuse the next `n` connection attempts (reconnect testing)
    pub async fn refuse_next_connects(&self, n: u32) {
        self.inner.state.lock().await.refuse_connects = n;
    }

    /// Drop every open connection, simulating a network blip
    pub async fn drop_all_connections(&self) {
        let mut state = self.inner.state.lock().await;
        for (id, conn) in state.connections.drain() {
            let _ = conn.closed_tx.send(true);
            tracing::debug!(connection = id, "Hub dropped connection");
        }
    }

    /// Number of open connections
    pub async fn connection_count(&self) -> usize {
        self.inner.state.lock().await.connections.len()
    }

    /// Remove a participant coordinator-side (presence timeout).
    ///
    /// Connected peers see a `LeaveStudio`; disconnected peers pick the
    /// removal up from their next resync snapshot.
    pub async fn leave_participant(&self, id: &ParticipantId) {
        let mut state = self.inner.state.lock().await;
        state.entries.remove(id);
        drop(state);
        let _ = self.inner.fanout.send(SignalingEvent::LeaveStudio {
            participant_id: id.clone(),
        });
    }

    /// Authoritative snapshot, live entries first in promotion order
    pub async fn snapshot(&self) -> (Vec<ParticipantSnapshot>, Layout) {
        let state = self.inner.state.lock().await;
        (Self::snapshot_locked(&state), state.layout.clone())
    }

    fn snapshot_locked(state: &HubState) -> Vec<ParticipantSnapshot> {
        let mut entries: Vec<(&Option<u64>, &ParticipantSnapshot)> = state
            .entries
            .values()
            .map(|e| (&e.live_seq, &e.snapshot))
            .collect();
        entries.sort_by_key(|(seq, snap)| (seq.unwrap_or(u64::MAX), snap.id.to_string()));
        entries.into_iter().map(|(_, s)| s.clone()).collect()
    }

    /// Apply an event to the authoritative state and fan it out
    async fn handle(&self, conn_id: u64, event: SignalingEvent) -> Result<()> {
        let mut state = self.inner.state.lock().await;

        match &event {
            SignalingEvent::SyncRequest => {
                let snapshot = SignalingEvent::SyncSnapshot {
                    participants: Self::snapshot_locked(&state),
                    layout: state.layout.clone(),
                };
                if let Some(conn) = state.connections.get(&conn_id) {
                    let _ = conn.direct_tx.send(snapshot);
                }
                // Answered directly, never fanned out
                return Ok(());
            }
            SignalingEvent::JoinStudio {
                participant_id,
                display_name,
                role,
            } => {
                if let Some(conn) = state.connections.get_mut(&conn_id) {
                    conn.participant = Some(participant_id.clone());
                }
                state
                    .entries
                    .entry(participant_id.clone())
                    .or_insert_with(|| HubEntry {
                        snapshot: ParticipantSnapshot {
                            id: participant_id.clone(),
                            display_name: display_name.clone(),
                            role: *role,
                            stage: StageState::Greenroom,
                            media: Default::default(),
                        },
                        live_seq: None,
                    });
            }
            SignalingEvent::LeaveStudio { participant_id } => {
                state.entries.remove(participant_id);
            }
            SignalingEvent::StageTransition {
                participant_id,
                new_state,
            } => {
                let next_seq = state.next_live_seq;
                let mut seq_consumed = false;
                if let Some(entry) = state.entries.get_mut(participant_id) {
                    entry.snapshot.stage = *new_state;
                    if *new_state == StageState::Live {
                        if entry.live_seq.is_none() {
                            entry.live_seq = Some(next_seq);
                            seq_consumed = true;
                        }
                    } else {
                        entry.live_seq = None;
                    }
                }
                if seq_consumed {
                    state.next_live_seq += 1;
                }
                if *new_state == StageState::Banned {
                    // Force-disconnect every connection of the banned identity
                    let doomed: Vec<u64> = state
                        .connections
                        .iter()
                        .filter(|(_, c)| c.participant.as_ref() == Some(participant_id))
                        .map(|(id, _)| *id)
                        .collect();
                    for id in doomed {
                        if let Some(conn) = state.connections.remove(&id) {
                            let _ = conn.closed_tx.send(true);
                            tracing::info!(
                                connection = id,
                                participant = %participant_id,
                                "Connection closed on ban"
                            );
                        }
                    }
                }
            }
            SignalingEvent::MediaStateChanged {
                participant_id,
                media,
            } => {
                if let Some(entry) = state.entries.get_mut(participant_id) {
                    entry.snapshot.media = *media;
                }
            }
            SignalingEvent::LayoutUpdated { layout } => {
                state.layout = layout.clone();
            }
            // Chat, banner and teleprompter messages carry no coordinator state
            _ => {}
        }

        drop(state);
        let _ = self.inner.fanout.send(event);
        Ok(())
    }
}

impl Default for StudioHub {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SignalingTransport for StudioHub {
    async fn connect(&self) -> Result<Box<dyn SignalingConnection>> {
        let mut state = self.inner.state.lock().await;

        if state.refuse_connects > 0 {
            state.refuse_connects -= 1;
            return Err(Error::ChannelClosed("hub refused connection"));
        }

        let id = state.next_conn_id;
        state.next_conn_id += 1;

        let (direct_tx, direct_rx) = mpsc::unbounded_channel();
        let (closed_tx, closed_rx) = tokio::sync::watch::channel(false);
        state.connections.insert(
            id,
            ConnectionEntry {
                direct_tx,
                closed_tx,
                participant: None,
            },
        );
        drop(state);

        tracing::debug!(connection = id, "Hub connection opened");
        Ok(Box::new(HubConnection {
            id,
            hub: self.clone(),
            fanout_rx: self.inner.fanout.subscribe(),
            direct_rx,
            closed_rx,
        }))
    }
}

/// One open connection to the hub
pub struct HubConnection {
    id: u64,
    hub: StudioHub,
    fanout_rx: broadcast::Receiver<SignalingEvent>,
    direct_rx: mpsc::UnboundedReceiver<SignalingEvent>,
    closed_rx: tokio::sync::watch::Receiver<bool>,
}

#[async_trait]
impl SignalingConnection for HubConnection {
    async fn send(&mut self, event: SignalingEvent) -> Result<()> {
        if *self.closed_rx.borrow() {
            return Err(Error::ChannelClosed("signaling connection"));
        }
        self.hub.handle(self.id, event).await
    }

    async fn recv(&mut self) -> Result<SignalingEvent> {
        loop {
            if *self.closed_rx.borrow() {
                return Err(Error::ChannelClosed("signaling connection"));
            }
            tokio::select! {
                // Direct replies (snapshots) take priority over the fan-out
                direct = self.direct_rx.recv() => {
                    match direct {
                        Some(event) => return Ok(event),
                        None => return Err(Error::ChannelClosed("signaling connection")),
                    }
                }
                fanned = self.fanout_rx.recv() => {
                    match fanned {
                        Ok(event) => return Ok(event),
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "Signaling receiver lagged");
                            continue;
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            return Err(Error::ChannelClosed("signaling connection"));
                        }
                    }
                }
                _ = self.closed_rx.changed() => {
                    return Err(Error::ChannelClosed("signaling connection"));
                }
            }
        }
    }

    async fn close(&mut self) {
        let mut state = self.hub.inner.state.lock().await;
        state.connections.remove(&self.id);
        tracing::debug!(connection = self.id, "Hub connection closed");
    }
}
