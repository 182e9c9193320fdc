//! Participant registry implementation
//!
//! The registry is the single writer of stage state. Every mutation goes
//! through a transition operation here; each successful local transition
//! emits a [`RegistryEvent`] on a broadcast channel that the signaling layer
//! forwards to peers. Emission is fire-and-forget: the registry never waits
//! for acknowledgement, peers converge eventually.
//!
//! Remote transitions arrive through the `apply_remote_*` operations, which
//! are idempotent and silent (no re-emission, no echo loops): duplicate or
//! reordered events are absorbed, never errors.

use std::collections::{HashMap, HashSet};

use tokio::sync::{broadcast, RwLock};

use super::config::RegistryConfig;
use super::participant::{
    MediaFlags, Participant, ParticipantId, ParticipantRole, ParticipantSnapshot, StageState,
};
use crate::error::{Error, Result};
use crate::media::SourceId;

/// Event emitted on every successful local transition
#[derive(Debug, Clone)]
pub enum RegistryEvent {
    /// A participant record was created
    Joined {
        /// Snapshot of the new record
        participant: ParticipantSnapshot,
    },
    /// A participant record was destroyed
    Left {
        /// Id of the removed participant
        id: ParticipantId,
    },
    /// A stage transition was applied
    StageChanged {
        /// Id of the participant
        id: ParticipantId,
        /// State before the transition
        from: StageState,
        /// State after the transition
        to: StageState,
    },
    /// Media flags changed
    MediaChanged {
        /// Id of the participant
        id: ParticipantId,
        /// Flags after the change
        media: MediaFlags,
    },
}

/// Per-stage participant counts for the status surface
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageCounts {
    pub invited: usize,
    pub greenroom: usize,
    pub backstage: usize,
    pub live: usize,
    pub banned: usize,
    /// Audience members represented by viewer-proxy records
    pub viewers: usize,
}

struct Inner {
    participants: HashMap<ParticipantId, Participant>,
    /// Identity fingerprints banned this session; joins are rejected
    banned_identities: HashSet<ParticipantId>,
    /// Monotonic counter driving slot ordering for live participants
    next_live_seq: u64,
}

/// Authoritative set of participants for one broadcast session
pub struct ParticipantRegistry {
    inner: RwLock<Inner>,
    config: RegistryConfig,
    events: broadcast::Sender<RegistryEvent>,
}

impl ParticipantRegistry {
    /// Create a registry with default limits
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a registry with custom limits
    pub fn with_config(config: RegistryConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity);
        Self {
            inner: RwLock::new(Inner {
                participants: HashMap::new(),
                banned_identities: HashSet::new(),
                next_live_seq: 1,
            }),
            config,
            events,
        }
    }

    /// Get the registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Subscribe to registry events
    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: RegistryEvent) {
        // No receivers is fine
        let _ = self.events.send(event);
    }

    /// Issue an invite: creates a record in `Invited`
    pub async fn invite(
        &self,
        id: ParticipantId,
        display_name: impl Into<String>,
        role: ParticipantRole,
    ) -> Result<()> {
        self.create(id, display_name.into(), role, StageState::Invited)
            .await
    }

    /// Handle a join request: creates a record in `Greenroom`, or moves a
    /// previously invited participant there.
    ///
    /// Rejected when the session is at capacity or the identity was banned.
    pub async fn join(
        &self,
        id: ParticipantId,
        display_name: impl Into<String>,
        role: ParticipantRole,
    ) -> Result<()> {
        let display_name = display_name.into();
        let mut inner = self.inner.write().await;

        if inner.banned_identities.contains(&id) {
            return Err(Error::BannedIdentity(id));
        }

        if let Some(existing) = inner.participants.get_mut(&id) {
            return match existing.stage {
                StageState::Invited => {
                    existing.stage = StageState::Greenroom;
                    existing.display_name = display_name;
                    drop(inner);
                    tracing::info!(participant = %id, "Invited participant joined greenroom");
                    self.emit(RegistryEvent::StageChanged {
                        id,
                        from: StageState::Invited,
                        to: StageState::Greenroom,
                    });
                    Ok(())
                }
                // Duplicate join is a no-op, not an error
                StageState::Greenroom => Ok(()),
                from => Err(Error::InvalidTransition {
                    participant: id,
                    from,
                    attempted: StageState::Greenroom,
                }),
            };
        }

        if inner.participants.len() >= self.config.capacity {
            return Err(Error::SessionAtCapacity(self.config.capacity));
        }

        let participant = Participant::new(id.clone(), display_name, role, StageState::Greenroom);
        let snapshot = participant.snapshot();
        inner.participants.insert(id.clone(), participant);
        drop(inner);

        tracing::info!(participant = %id, role = ?role, "Participant joined greenroom");
        self.emit(RegistryEvent::Joined {
            participant: snapshot,
        });
        Ok(())
    }

    async fn create(
        &self,
        id: ParticipantId,
        display_name: String,
        role: ParticipantRole,
        stage: StageState,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;

        if inner.banned_identities.contains(&id) {
            return Err(Error::BannedIdentity(id));
        }
        if inner.participants.contains_key(&id) {
            return Ok(());
        }
        if inner.participants.len() >= self.config.capacity {
            return Err(Error::SessionAtCapacity(self.config.capacity));
        }

        let participant = Participant::new(id.clone(), display_name, role, stage);
        let snapshot = participant.snapshot();
        inner.participants.insert(id.clone(), participant);
        drop(inner);

        tracing::info!(participant = %id, stage = ?stage, "Participant record created");
        self.emit(RegistryEvent::Joined {
            participant: snapshot,
        });
        Ok(())
    }

    /// Promote to `Live` from `Greenroom` or `Backstage`.
    ///
    /// Idempotent when already `Live`. Fails with `StageFull` when the
    /// configured on-stage maximum is reached.
    pub async fn promote(&self, id: &ParticipantId) -> Result<()> {
        let mut inner = self.inner.write().await;

        let live_count = inner.participants.values().filter(|p| p.is_live()).count();

        let participant = inner
            .participants
            .get(id)
            .ok_or_else(|| Error::UnknownParticipant(id.clone()))?;

        let from = participant.stage;
        if from == StageState::Live {
            return Ok(());
        }
        if !from.can_go_live() {
            return Err(Error::InvalidTransition {
                participant: id.clone(),
                from,
                attempted: StageState::Live,
            });
        }
        if live_count >= self.config.max_on_stage {
            return Err(Error::StageFull(self.config.max_on_stage));
        }

        let seq = inner.next_live_seq;
        inner.next_live_seq += 1;
        if let Some(p) = inner.participants.get_mut(id) {
            p.stage = StageState::Live;
            p.live_order = Some(seq);
        }
        drop(inner);

        tracing::info!(participant = %id, from = ?from, "Promoted to live");
        self.emit(RegistryEvent::StageChanged {
            id: id.clone(),
            from,
            to: StageState::Live,
        });
        Ok(())
    }

    /// Demote from `Live` to `Backstage`. Idempotent when already backstage.
    pub async fn demote(&self, id: &ParticipantId) -> Result<()> {
        self.transition(id, StageState::Backstage, |from| {
            matches!(from, StageState::Live | StageState::Backstage)
        })
        .await
    }

    /// Send a backstage participant back to the greenroom
    pub async fn return_to_greenroom(&self, id: &ParticipantId) -> Result<()> {
        self.transition(id, StageState::Greenroom, |from| {
            matches!(from, StageState::Backstage | StageState::Greenroom)
        })
        .await
    }

    async fn transition(
        &self,
        id: &ParticipantId,
        to: StageState,
        allowed_from: impl Fn(StageState) -> bool,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;

        let participant = inner
            .participants
            .get_mut(id)
            .ok_or_else(|| Error::UnknownParticipant(id.clone()))?;

        let from = participant.stage;
        if from == to {
            return Ok(());
        }
        if !allowed_from(from) {
            return Err(Error::InvalidTransition {
                participant: id.clone(),
                from,
                attempted: to,
            });
        }

        participant.stage = to;
        if to != StageState::Live {
            participant.live_order = None;
        }
        drop(inner);

        tracing::info!(participant = %id, from = ?from, to = ?to, "Stage transition");
        self.emit(RegistryEvent::StageChanged {
            id: id.clone(),
            from,
            to,
        });
        Ok(())
    }

    /// Ban a participant: any state → `Banned`, terminal.
    ///
    /// Records the identity fingerprint so re-joining requires a new
    /// identity. Idempotent on an already banned participant. The
    /// orchestrator force-disconnects the banned participant's signaling
    /// session when it sees the emitted event.
    pub async fn ban(&self, id: &ParticipantId) -> Result<()> {
        let mut inner = self.inner.write().await;

        let participant = inner
            .participants
            .get_mut(id)
            .ok_or_else(|| Error::UnknownParticipant(id.clone()))?;

        let from = participant.stage;
        if from == StageState::Banned {
            return Ok(());
        }

        participant.stage = StageState::Banned;
        participant.live_order = None;
        inner.banned_identities.insert(id.clone());
        drop(inner);

        tracing::warn!(participant = %id, from = ?from, "Participant banned");
        self.emit(RegistryEvent::StageChanged {
            id: id.clone(),
            from,
            to: StageState::Banned,
        });
        Ok(())
    }

    /// Destroy a participant record (disconnect or explicit leave)
    pub async fn leave(&self, id: &ParticipantId) -> Result<()> {
        let removed = {
            let mut inner = self.inner.write().await;
            inner.participants.remove(id)
        };

        match removed {
            Some(_) => {
                tracing::info!(participant = %id, "Participant left");
                self.emit(RegistryEvent::Left { id: id.clone() });
                Ok(())
            }
            None => Err(Error::UnknownParticipant(id.clone())),
        }
    }

    /// Mutate media flags; legal in any stage state
    pub async fn update_media<F>(&self, id: &ParticipantId, update: F) -> Result<MediaFlags>
    where
        F: FnOnce(&mut MediaFlags),
    {
        let media = {
            let mut inner = self.inner.write().await;
            let participant = inner
                .participants
                .get_mut(id)
                .ok_or_else(|| Error::UnknownParticipant(id.clone()))?;
            update(&mut participant.media);
            participant.media.volume = participant.media.volume.clamp(0.0, 1.0);
            participant.media
        };

        tracing::debug!(participant = %id, ?media, "Media flags changed");
        self.emit(RegistryEvent::MediaChanged {
            id: id.clone(),
            media,
        });
        Ok(media)
    }

    /// Hard-mute a participant
    pub async fn mute(&self, id: &ParticipantId) -> Result<()> {
        self.update_media(id, |m| m.muted = true).await.map(|_| ())
    }

    /// Clear a hard mute
    pub async fn unmute(&self, id: &ParticipantId) -> Result<()> {
        self.update_media(id, |m| m.muted = false).await.map(|_| ())
    }

    /// Set the source volume (clamped to [0, 1])
    pub async fn set_volume(&self, id: &ParticipantId, volume: f32) -> Result<()> {
        self.update_media(id, |m| m.volume = volume)
            .await
            .map(|_| ())
    }

    /// Enable or disable the audio track
    pub async fn set_audio_enabled(&self, id: &ParticipantId, enabled: bool) -> Result<()> {
        self.update_media(id, |m| m.audio_enabled = enabled)
            .await
            .map(|_| ())
    }

    /// Enable or disable the video track
    pub async fn set_video_enabled(&self, id: &ParticipantId, enabled: bool) -> Result<()> {
        self.update_media(id, |m| m.video_enabled = enabled)
            .await
            .map(|_| ())
    }

    /// Bind a media source to a participant (greenroom camera test)
    pub async fn bind_source(&self, id: &ParticipantId, source: SourceId) -> Result<()> {
        let mut inner = self.inner.write().await;
        let participant = inner
            .participants
            .get_mut(id)
            .ok_or_else(|| Error::UnknownParticipant(id.clone()))?;
        participant.source = Some(source);
        Ok(())
    }

    /// Remove a participant's source binding
    pub async fn clear_source(&self, id: &ParticipantId) -> Result<()> {
        let mut inner = self.inner.write().await;
        let participant = inner
            .participants
            .get_mut(id)
            .ok_or_else(|| Error::UnknownParticipant(id.clone()))?;
        participant.source = None;
        Ok(())
    }

    /// Bind or clear a participant's screenshare source
    pub async fn bind_screen_source(
        &self,
        id: &ParticipantId,
        source: Option<SourceId>,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        let participant = inner
            .participants
            .get_mut(id)
            .ok_or_else(|| Error::UnknownParticipant(id.clone()))?;
        participant.screen_source = source;
        Ok(())
    }

    /// Apply a join observed from a peer. Idempotent, no re-emission.
    pub async fn apply_remote_join(
        &self,
        id: ParticipantId,
        display_name: &str,
        role: ParticipantRole,
    ) {
        let mut inner = self.inner.write().await;
        if inner.banned_identities.contains(&id) || inner.participants.contains_key(&id) {
            return;
        }
        let participant = Participant::new(
            id.clone(),
            display_name.to_string(),
            role,
            StageState::Greenroom,
        );
        inner.participants.insert(id.clone(), participant);
        tracing::debug!(participant = %id, "Remote join applied");
    }

    /// Apply a stage transition observed from a peer.
    ///
    /// Idempotent and tolerant: duplicates and reordered events are
    /// absorbed; transitions for unknown participants are ignored (the next
    /// snapshot resync heals any divergence). Never re-emits.
    pub async fn apply_remote_transition(&self, id: &ParticipantId, new_state: StageState) {
        let mut inner = self.inner.write().await;

        let Some(participant) = inner.participants.get(id) else {
            tracing::debug!(participant = %id, ?new_state, "Remote transition for unknown participant ignored");
            return;
        };

        let from = participant.stage;
        if from == new_state || from.is_terminal() {
            return;
        }

        if new_state == StageState::Live {
            let seq = inner.next_live_seq;
            inner.next_live_seq += 1;
            if let Some(p) = inner.participants.get_mut(id) {
                p.stage = StageState::Live;
                p.live_order = Some(seq);
            }
        } else if let Some(p) = inner.participants.get_mut(id) {
            p.stage = new_state;
            p.live_order = None;
            if new_state == StageState::Banned {
                inner.banned_identities.insert(id.clone());
            }
        }

        tracing::debug!(participant = %id, from = ?from, to = ?new_state, "Remote transition applied");
    }

    /// Apply media flags observed from a peer. Idempotent, no re-emission.
    pub async fn apply_remote_media(&self, id: &ParticipantId, media: MediaFlags) {
        let mut inner = self.inner.write().await;
        if let Some(participant) = inner.participants.get_mut(id) {
            participant.media = media;
            participant.media.volume = participant.media.volume.clamp(0.0, 1.0);
        }
    }

    /// Apply a departure observed from a peer
    pub async fn apply_remote_leave(&self, id: &ParticipantId) {
        let mut inner = self.inner.write().await;
        inner.participants.remove(id);
    }

    /// Replace all local records with a coordinator snapshot.
    ///
    /// Used after a signaling reconnect: no stale local state survives.
    /// Source bindings and join times are preserved for ids present in
    /// both; live ordering follows the snapshot's order.
    pub async fn apply_snapshot(&self, snapshot: &[ParticipantSnapshot]) {
        let mut inner = self.inner.write().await;

        let mut old = std::mem::take(&mut inner.participants);
        let mut seq = 1u64;

        for snap in snapshot {
            let mut participant = match old.remove(&snap.id) {
                Some(mut existing) => {
                    existing.display_name = snap.display_name.clone();
                    existing.role = snap.role;
                    existing.media = snap.media;
                    existing
                }
                None => Participant::new(
                    snap.id.clone(),
                    snap.display_name.clone(),
                    snap.role,
                    snap.stage,
                ),
            };
            participant.stage = snap.stage;
            participant.live_order = if snap.stage == StageState::Live {
                let order = seq;
                seq += 1;
                Some(order)
            } else {
                None
            };
            if snap.stage == StageState::Banned {
                inner.banned_identities.insert(snap.id.clone());
            }
            inner.participants.insert(snap.id.clone(), participant);
        }

        inner.next_live_seq = seq;
        let replaced = snapshot.len();
        let dropped = old.len();
        drop(inner);

        tracing::info!(replaced, dropped, "Registry snapshot applied");
    }

    /// Snapshot of every record, for answering sync requests
    pub async fn snapshot(&self) -> Vec<ParticipantSnapshot> {
        let inner = self.inner.read().await;
        let mut snaps: Vec<(Option<u64>, ParticipantSnapshot)> = inner
            .participants
            .values()
            .map(|p| (p.live_order, p.snapshot()))
            .collect();
        // Live entries first in promotion order, so applying the snapshot
        // reconstructs the same slot ordering
        snaps.sort_by_key(|(order, _)| order.unwrap_or(u64::MAX));
        snaps.into_iter().map(|(_, s)| s).collect()
    }

    /// Look up a participant by id
    pub async fn participant(&self, id: &ParticipantId) -> Option<Participant> {
        self.inner.read().await.participants.get(id).cloned()
    }

    /// All `Live` participants in promotion order
    pub async fn live_participants(&self) -> Vec<Participant> {
        let inner = self.inner.read().await;
        let mut live: Vec<Participant> = inner
            .participants
            .values()
            .filter(|p| p.is_live())
            .cloned()
            .collect();
        live.sort_by_key(|p| p.live_order.unwrap_or(u64::MAX));
        live
    }

    /// Per-stage counts for the status surface
    pub async fn counts(&self) -> StageCounts {
        let inner = self.inner.read().await;
        let mut counts = StageCounts::default();
        for p in inner.participants.values() {
            if p.role == ParticipantRole::ViewerProxy {
                counts.viewers += 1;
                continue;
            }
            match p.stage {
                StageState::Invited => counts.invited += 1,
                StageState::Greenroom => counts.greenroom += 1,
                StageState::Backstage => counts.backstage += 1,
                StageState::Live => counts.live += 1,
                StageState::Banned => counts.banned += 1,
            }
        }
        counts
    }

    /// Number of participant records
    pub async fn len(&self) -> usize {
        self.inner.read().await.participants.len()
    }

    /// Whether the registry holds no records
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for ParticipantRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> ParticipantId {
        ParticipantId::new(s)
    }

    async fn join_guest(registry: &ParticipantRegistry, name: &str) {
        registry
            .join(id(name), name, ParticipantRole::Guest)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_join_lands_in_greenroom() {
        let registry = ParticipantRegistry::new();
        join_guest(&registry, "alice").await;

        let alice = registry.participant(&id("alice")).await.unwrap();
        assert_eq!(alice.stage, StageState::Greenroom);
    }

    #[tokio::test]
    async fn test_promote_is_idempotent() {
        let registry = ParticipantRegistry::new();
        join_guest(&registry, "alice").await;

        registry.promote(&id("alice")).await.unwrap();
        let first_order = registry.participant(&id("alice")).await.unwrap().live_order;

        // Second promote: still live, same slot order, no error
        registry.promote(&id("alice")).await.unwrap();
        let alice = registry.participant(&id("alice")).await.unwrap();
        assert_eq!(alice.stage, StageState::Live);
        assert_eq!(alice.live_order, first_order);
        assert_eq!(registry.live_participants().await.len(), 1);
    }

    #[tokio::test]
    async fn test_ban_is_terminal() {
        let registry = ParticipantRegistry::new();
        join_guest(&registry, "alice").await;
        registry.ban(&id("alice")).await.unwrap();

        assert!(registry.promote(&id("alice")).await.is_err());
        assert!(registry.demote(&id("alice")).await.is_err());
        assert!(registry.return_to_greenroom(&id("alice")).await.is_err());

        let alice = registry.participant(&id("alice")).await.unwrap();
        assert_eq!(alice.stage, StageState::Banned);

        // Re-join under the banned identity is rejected
        let rejoin = registry
            .join(id("alice"), "alice", ParticipantRole::Guest)
            .await;
        assert!(matches!(rejoin, Err(Error::BannedIdentity(_))));
    }

    #[tokio::test]
    async fn test_capacity_rejection() {
        let registry = ParticipantRegistry::with_config(RegistryConfig::default().capacity(2));
        join_guest(&registry, "a").await;
        join_guest(&registry, "b").await;

        let result = registry.join(id("c"), "c", ParticipantRole::Guest).await;
        assert!(matches!(result, Err(Error::SessionAtCapacity(2))));
    }

    #[tokio::test]
    async fn test_stage_full() {
        let registry = ParticipantRegistry::with_config(RegistryConfig::default().max_on_stage(1));
        join_guest(&registry, "a").await;
        join_guest(&registry, "b").await;

        registry.promote(&id("a")).await.unwrap();
        let result = registry.promote(&id("b")).await;
        assert!(matches!(result, Err(Error::StageFull(1))));

        // Demoting frees the slot
        registry.demote(&id("a")).await.unwrap();
        registry.promote(&id("b")).await.unwrap();
    }

    #[tokio::test]
    async fn test_demote_and_return_to_greenroom() {
        let registry = ParticipantRegistry::new();
        join_guest(&registry, "alice").await;

        registry.promote(&id("alice")).await.unwrap();
        registry.demote(&id("alice")).await.unwrap();
        assert_eq!(
            registry.participant(&id("alice")).await.unwrap().stage,
            StageState::Backstage
        );

        registry.return_to_greenroom(&id("alice")).await.unwrap();
        assert_eq!(
            registry.participant(&id("alice")).await.unwrap().stage,
            StageState::Greenroom
        );

        // Greenroom participants cannot be demoted
        assert!(registry.demote(&id("alice")).await.is_err());
    }

    #[tokio::test]
    async fn test_live_ordering_follows_promotion() {
        let registry = ParticipantRegistry::new();
        for name in ["a", "b", "c"] {
            join_guest(&registry, name).await;
        }

        registry.promote(&id("b")).await.unwrap();
        registry.promote(&id("a")).await.unwrap();
        registry.promote(&id("c")).await.unwrap();

        let order: Vec<String> = registry
            .live_participants()
            .await
            .iter()
            .map(|p| p.id.to_string())
            .collect();
        assert_eq!(order, vec!["b", "a", "c"]);
    }

    #[tokio::test]
    async fn test_transitions_emit_events() {
        let registry = ParticipantRegistry::new();
        let mut events = registry.subscribe();

        join_guest(&registry, "alice").await;
        registry.promote(&id("alice")).await.unwrap();

        assert!(matches!(
            events.recv().await.unwrap(),
            RegistryEvent::Joined { .. }
        ));
        assert!(matches!(
            events.recv().await.unwrap(),
            RegistryEvent::StageChanged {
                to: StageState::Live,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_remote_transition_idempotent() {
        let registry = ParticipantRegistry::new();
        join_guest(&registry, "alice").await;

        registry
            .apply_remote_transition(&id("alice"), StageState::Live)
            .await;
        registry
            .apply_remote_transition(&id("alice"), StageState::Live)
            .await;

        assert_eq!(registry.live_participants().await.len(), 1);

        // Unknown participant: silently ignored
        registry
            .apply_remote_transition(&id("ghost"), StageState::Live)
            .await;
        assert_eq!(registry.live_participants().await.len(), 1);
    }

    #[tokio::test]
    async fn test_snapshot_replaces_stale_state() {
        let registry = ParticipantRegistry::new();
        join_guest(&registry, "stale").await;
        join_guest(&registry, "alice").await;

        let snapshot = vec![ParticipantSnapshot {
            id: id("alice"),
            display_name: "Alice".into(),
            role: ParticipantRole::Guest,
            stage: StageState::Live,
            media: MediaFlags::default(),
        }];
        registry.apply_snapshot(&snapshot).await;

        assert!(registry.participant(&id("stale")).await.is_none());
        let alice = registry.participant(&id("alice")).await.unwrap();
        assert_eq!(alice.stage, StageState::Live);
        assert_eq!(alice.display_name, "Alice");
        assert_eq!(registry.live_participants().await.len(), 1);
    }

    #[tokio::test]
    async fn test_media_flags_mutable_in_any_state() {
        let registry = ParticipantRegistry::new();
        join_guest(&registry, "alice").await;

        registry.set_volume(&id("alice"), 0.3).await.unwrap();
        registry.mute(&id("alice")).await.unwrap();

        let media = registry.participant(&id("alice")).await.unwrap().media;
        assert!(media.muted);
        assert_eq!(media.volume, 0.3);

        registry.unmute(&id("alice")).await.unwrap();
        assert!(!registry.participant(&id("alice")).await.unwrap().media.muted);
    }
}
