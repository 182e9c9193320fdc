//! Destination streaming manager
//!
//! Runs one fully independent task per destination: negotiate (time-boxed),
//! pump composite frames, sample health, and on failure retry with bounded
//! exponential backoff. A destination that fails, degrades, or cycles
//! through reconnects never blocks publishing to the others.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{broadcast, watch, Mutex};

use super::config::StreamingConfig;
use super::negotiator::{IngestNegotiator, IngestSession};
use super::session::{
    ConnectionState, Destination, DestinationId, DestinationSession, DestinationStatus,
    HealthSample,
};
use crate::compositor::CompositeFrame;
use crate::error::{Error, Result};

/// Events surfaced to the UI and status collectors
#[derive(Debug, Clone)]
pub enum StreamingEvent {
    /// A session changed connection state
    StateChanged {
        id: DestinationId,
        state: ConnectionState,
    },
    /// A health sample was taken while publishing
    HealthSampled {
        id: DestinationId,
        sample: HealthSample,
    },
    /// A session ran out of retry attempts; user-visible failure
    Exhausted { id: DestinationId, attempts: u32 },
}

struct SessionHandle {
    shared: Arc<Mutex<DestinationSession>>,
    shutdown_tx: watch::Sender<bool>,
    task: Option<tokio::task::JoinHandle<()>>,
}

/// Owns every destination session for one broadcast
pub struct DestinationManager {
    config: StreamingConfig,
    negotiator: Arc<dyn IngestNegotiator>,
    sessions: Mutex<HashMap<DestinationId, SessionHandle>>,
    events: broadcast::Sender<StreamingEvent>,
}

impl DestinationManager {
    /// Create a manager using the given negotiator
    pub fn new(config: StreamingConfig, negotiator: Arc<dyn IngestNegotiator>) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity);
        Self {
            config,
            negotiator,
            sessions: Mutex::new(HashMap::new()),
            events,
        }
    }

    /// Subscribe to streaming events
    pub fn subscribe(&self) -> broadcast::Receiver<StreamingEvent> {
        self.events.subscribe()
    }

    /// Start an independent session for a destination.
    ///
    /// `frames` is a read-only composite output receiver. Starting an
    /// already-running destination is a no-op; starting one whose previous
    /// session terminated spins up a fresh session.
    pub async fn start(
        &self,
        destination: Destination,
        frames: broadcast::Receiver<CompositeFrame>,
    ) -> Result<()> {
        let mut sessions = self.sessions.lock().await;

        if let Some(existing) = sessions.get(&destination.id) {
            if !existing.shared.lock().await.state.is_terminal() {
                tracing::debug!(destination = %destination.id, "Session already running");
                return Ok(());
            }
        }

        let id = destination.id.clone();
        let shared = Arc::new(Mutex::new(DestinationSession::new(destination)));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(run_session(
            self.config.clone(),
            Arc::clone(&self.negotiator),
            Arc::clone(&shared),
            frames,
            self.events.clone(),
            shutdown_rx,
        ));

        sessions.insert(
            id.clone(),
            SessionHandle {
                shared,
                shutdown_tx,
                task: Some(task),
            },
        );
        tracing::info!(destination = %id, "Destination session started");
        Ok(())
    }

    /// Stop one destination: cancels any in-flight attempt and waits for the
    /// session task to finish in `Terminated`.
    pub async fn stop(&self, id: &DestinationId) -> Result<()> {
        let task = {
            let mut sessions = self.sessions.lock().await;
            let handle = sessions
                .get_mut(id)
                .ok_or_else(|| Error::UnknownDestination(id.clone()))?;
            let _ = handle.shutdown_tx.send(true);
            handle.task.take()
        };

        if let Some(task) = task {
            let _ = task.await;
        }
        tracing::info!(destination = %id, "Destination session stopped");
        Ok(())
    }

    /// Stop every session; in-flight connection attempts cancel immediately
    pub async fn stop_all(&self) {
        let tasks: Vec<(DestinationId, Option<tokio::task::JoinHandle<()>>)> = {
            let mut sessions = self.sessions.lock().await;
            sessions
                .iter_mut()
                .map(|(id, handle)| {
                    let _ = handle.shutdown_tx.send(true);
                    (id.clone(), handle.task.take())
                })
                .collect()
        };

        for (id, task) in tasks {
            if let Some(task) = task {
                let _ = task.await;
            }
            tracing::debug!(destination = %id, "Destination session stopped");
        }
    }

    /// Connection state of one destination
    pub async fn state_of(&self, id: &DestinationId) -> Option<ConnectionState> {
        let sessions = self.sessions.lock().await;
        match sessions.get(id) {
            Some(handle) => Some(handle.shared.lock().await.state),
            None => None,
        }
    }

    /// Status snapshots for every destination, ordered by id
    pub async fn status(&self) -> Vec<DestinationStatus> {
        let sessions = self.sessions.lock().await;
        let mut statuses = Vec::with_capacity(sessions.len());
        for handle in sessions.values() {
            statuses.push(handle.shared.lock().await.status());
        }
        statuses.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
        statuses
    }

    /// Number of tracked sessions
    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Whether no sessions are tracked
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Resolves once shutdown is signalled (or the manager went away)
async fn wait_shutdown(rx: &mut watch::Receiver<bool>) {
    while !*rx.borrow() {
        if rx.changed().await.is_err() {
            return;
        }
    }
}

async fn set_state(
    shared: &Arc<Mutex<DestinationSession>>,
    events: &broadcast::Sender<StreamingEvent>,
    to: ConnectionState,
) {
    let (id, changed, state) = {
        let mut session = shared.lock().await;
        let changed = session.try_transition(to);
        (session.destination.id.clone(), changed, session.state)
    };
    if changed {
        let _ = events.send(StreamingEvent::StateChanged { id, state });
    }
}

enum PumpExit {
    /// Shutdown was signalled
    Shutdown,
    /// The transport failed mid-publish
    Lost,
    /// The composite output closed; the broadcast is over
    SourceClosed,
}

async fn run_session(
    config: StreamingConfig,
    negotiator: Arc<dyn IngestNegotiator>,
    shared: Arc<Mutex<DestinationSession>>,
    mut frames: broadcast::Receiver<CompositeFrame>,
    events: broadcast::Sender<StreamingEvent>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let destination = shared.lock().await.destination.clone();
    let mut attempt: u32 = 0;

    loop {
        set_state(&shared, &events, ConnectionState::Connecting).await;

        let negotiated = tokio::select! {
            _ = wait_shutdown(&mut shutdown_rx) => {
                set_state(&shared, &events, ConnectionState::Terminated).await;
                return;
            }
            result = tokio::time::timeout(
                config.connect_timeout,
                negotiator.negotiate(&destination),
            ) => result,
        };

        match negotiated {
            Ok(Ok(mut ingest)) => {
                attempt = 0;
                shared.lock().await.retry_count = 0;
                set_state(&shared, &events, ConnectionState::Connected).await;

                // Drop frames that piled up while disconnected
                frames = frames.resubscribe();

                let exit = pump(
                    &config,
                    &shared,
                    &events,
                    ingest.as_mut(),
                    &mut frames,
                    &mut shutdown_rx,
                )
                .await;
                ingest.close().await;

                match exit {
                    PumpExit::Shutdown | PumpExit::SourceClosed => {
                        set_state(&shared, &events, ConnectionState::Terminated).await;
                        return;
                    }
                    PumpExit::Lost => {
                        set_state(&shared, &events, ConnectionState::Disconnected).await;
                    }
                }
            }
            Ok(Err(error)) => {
                tracing::warn!(destination = %destination.id, error = %error, "Ingest negotiation failed");
                set_state(&shared, &events, ConnectionState::Disconnected).await;
            }
            Err(_) => {
                tracing::warn!(
                    destination = %destination.id,
                    timeout = ?config.connect_timeout,
                    "Ingest negotiation timed out"
                );
                set_state(&shared, &events, ConnectionState::Disconnected).await;
            }
        }

        attempt += 1;
        shared.lock().await.retry_count = attempt;

        if !config.backoff.attempt_allowed(attempt) {
            let error = Error::DestinationExhausted {
                destination: destination.id.clone(),
                attempts: attempt,
            };
            tracing::error!(destination = %destination.id, attempts = attempt, error = %error, "Destination retries exhausted");
            let _ = events.send(StreamingEvent::Exhausted {
                id: destination.id.clone(),
                attempts: attempt,
            });
            set_state(&shared, &events, ConnectionState::Terminated).await;
            return;
        }

        let delay = config.backoff.jittered_delay_for(attempt - 1);
        tracing::info!(destination = %destination.id, attempt, ?delay, "Retry scheduled");
        tokio::select! {
            _ = wait_shutdown(&mut shutdown_rx) => {
                set_state(&shared, &events, ConnectionState::Terminated).await;
                return;
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

async fn pump(
    config: &StreamingConfig,
    shared: &Arc<Mutex<DestinationSession>>,
    events: &broadcast::Sender<StreamingEvent>,
    ingest: &mut dyn IngestSession,
    frames: &mut broadcast::Receiver<CompositeFrame>,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> PumpExit {
    let id = shared.lock().await.destination.id.clone();
    let mut health = tokio::time::interval(config.health_interval);
    health.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = wait_shutdown(shutdown_rx) => return PumpExit::Shutdown,
            frame = frames.recv() => {
                match frame {
                    Ok(frame) => {
                        if let Err(error) = ingest.send_frame(&frame).await {
                            tracing::warn!(destination = %id, error = %error, "Publish failed");
                            return PumpExit::Lost;
                        }
                        shared.lock().await.record_frame(frame.video.byte_len());
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(destination = %id, skipped, "Frame receiver lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::info!(destination = %id, "Composite output closed");
                        return PumpExit::SourceClosed;
                    }
                }
            }
            _ = health.tick() => {
                let sample = ingest.health_sample().await;
                let degraded = sample.is_degraded(config);
                let (changed, state) = {
                    let mut session = shared.lock().await;
                    session.record_health(sample);
                    let to = if degraded {
                        ConnectionState::Degraded
                    } else {
                        ConnectionState::Connected
                    };
                    (session.try_transition(to), session.state)
                };
                let _ = events.send(StreamingEvent::HealthSampled { id: id.clone(), sample });
                if changed {
                    let _ = events.send(StreamingEvent::StateChanged { id: id.clone(), state });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backoff::BackoffConfig;
    use crate::destination::negotiator::LoopbackNegotiator;
    use crate::destination::session::PlatformKind;
    use crate::media::{AudioBlock, Rgba, VideoFrame};
    use std::time::Duration;

    fn fast_config() -> StreamingConfig {
        StreamingConfig::default()
            .backoff(
                BackoffConfig::default()
                    .base_delay(Duration::from_millis(5))
                    .max_delay(Duration::from_millis(20))
                    .jitter(false)
                    .max_attempts(5),
            )
            .connect_timeout(Duration::from_millis(500))
            .health_interval(Duration::from_millis(20))
    }

    fn destination(id: &str) -> Destination {
        Destination::new(id, PlatformKind::DirectPeer, format!("loopback://{id}"))
    }

    fn frame(sequence: u64) -> CompositeFrame {
        CompositeFrame {
            sequence,
            timestamp_ms: sequence * 33,
            video: VideoFrame::solid(16, 9, Rgba::BLACK),
            audio: AudioBlock::silent(8, 2, 48_000),
        }
    }

    /// Wait until `predicate` matches an event or time out
    async fn wait_for_event<F>(
        events: &mut broadcast::Receiver<StreamingEvent>,
        mut predicate: F,
    ) -> StreamingEvent
    where
        F: FnMut(&StreamingEvent) -> bool,
    {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                match events.recv().await {
                    Ok(event) if predicate(&event) => return event,
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => panic!("event stream closed"),
                }
            }
        })
        .await
        .expect("timed out waiting for event")
    }

    #[tokio::test]
    async fn test_connects_and_pumps_frames() {
        let negotiator = LoopbackNegotiator::new();
        let manager = DestinationManager::new(fast_config(), Arc::new(negotiator.clone()));
        let mut events = manager.subscribe();
        let (tx, _) = broadcast::channel(16);
        let dest = destination("a");

        manager.start(dest.clone(), tx.subscribe()).await.unwrap();
        wait_for_event(&mut events, |e| {
            matches!(e, StreamingEvent::StateChanged { state: ConnectionState::Connected, .. })
        })
        .await;

        for seq in 0..5 {
            let _ = tx.send(frame(seq));
            tokio::task::yield_now().await;
        }

        tokio::time::timeout(Duration::from_secs(5), async {
            while negotiator.frames_received(&dest.id).await < 1 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("no frames reached the destination");

        manager.stop_all().await;
        assert_eq!(
            manager.state_of(&dest.id).await,
            Some(ConnectionState::Terminated)
        );
    }

    #[tokio::test]
    async fn test_retries_then_connects() {
        let negotiator = LoopbackNegotiator::new();
        let manager = DestinationManager::new(fast_config(), Arc::new(negotiator.clone()));
        let mut events = manager.subscribe();
        let (tx, _) = broadcast::channel::<CompositeFrame>(16);
        let dest = destination("flaky");

        negotiator.fail_connects(&dest.id, 3).await;
        manager.start(dest.clone(), tx.subscribe()).await.unwrap();

        wait_for_event(&mut events, |e| {
            matches!(e, StreamingEvent::StateChanged { state: ConnectionState::Connected, .. })
        })
        .await;

        // Connected after exactly three failures; counter reset on success
        let status = manager.status().await;
        assert_eq!(status[0].retry_count, 0);
        assert_eq!(status[0].state, ConnectionState::Connected);

        manager.stop_all().await;
    }

    #[tokio::test]
    async fn test_exhausted_after_max_attempts() {
        let negotiator = LoopbackNegotiator::new();
        let config = fast_config().backoff(
            BackoffConfig::default()
                .base_delay(Duration::from_millis(2))
                .jitter(false)
                .max_attempts(3),
        );
        let manager = DestinationManager::new(config, Arc::new(negotiator.clone()));
        let mut events = manager.subscribe();
        let (tx, _) = broadcast::channel::<CompositeFrame>(16);
        let dest = destination("dead");

        negotiator.fail_connects(&dest.id, 100).await;
        manager.start(dest.clone(), tx.subscribe()).await.unwrap();

        let exhausted = wait_for_event(&mut events, |e| {
            matches!(e, StreamingEvent::Exhausted { .. })
        })
        .await;
        match exhausted {
            StreamingEvent::Exhausted { attempts, .. } => assert_eq!(attempts, 3),
            _ => unreachable!(),
        }

        wait_for_event(&mut events, |e| {
            matches!(e, StreamingEvent::StateChanged { state: ConnectionState::Terminated, .. })
        })
        .await;
    }

    #[tokio::test]
    async fn test_sessions_are_independent() {
        let negotiator = LoopbackNegotiator::new();
        let manager = DestinationManager::new(fast_config(), Arc::new(negotiator.clone()));
        let mut events = manager.subscribe();
        let (tx, _) = broadcast::channel(16);

        let good = destination("good");
        let bad = destination("bad");
        negotiator.fail_connects(&bad.id, 100).await;

        manager.start(good.clone(), tx.subscribe()).await.unwrap();
        manager.start(bad.clone(), tx.subscribe()).await.unwrap();

        wait_for_event(&mut events, |e| {
            matches!(e, StreamingEvent::StateChanged { id, state: ConnectionState::Connected }
                if id == &good.id)
        })
        .await;

        // The failing destination keeps cycling while the good one publishes
        for seq in 0..3 {
            let _ = tx.send(frame(seq));
        }
        tokio::time::timeout(Duration::from_secs(5), async {
            while negotiator.frames_received(&good.id).await < 1 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("good destination stopped publishing");

        assert_eq!(negotiator.frames_received(&bad.id).await, 0);
        manager.stop_all().await;
    }

    #[tokio::test]
    async fn test_mid_broadcast_drop_reconnects() {
        let negotiator = LoopbackNegotiator::new();
        let manager = DestinationManager::new(fast_config(), Arc::new(negotiator.clone()));
        let mut events = manager.subscribe();
        let (tx, _) = broadcast::channel(16);
        let dest = destination("drop");

        negotiator.fail_after_frames(&dest.id, 2).await;
        manager.start(dest.clone(), tx.subscribe()).await.unwrap();

        wait_for_event(&mut events, |e| {
            matches!(e, StreamingEvent::StateChanged { state: ConnectionState::Connected, .. })
        })
        .await;

        // Keep frames flowing until the scripted drop and reconnect happen
        let feeder = tokio::spawn({
            let tx = tx.clone();
            async move {
                for seq in 0..1000 {
                    let _ = tx.send(frame(seq));
                    tokio::time::sleep(Duration::from_millis(2)).await;
                }
            }
        });

        wait_for_event(&mut events, |e| {
            matches!(e, StreamingEvent::StateChanged { state: ConnectionState::Disconnected, .. })
        })
        .await;
        wait_for_event(&mut events, |e| {
            matches!(e, StreamingEvent::StateChanged { state: ConnectionState::Connected, .. })
        })
        .await;

        feeder.abort();
        manager.stop_all().await;
    }

    #[tokio::test]
    async fn test_degraded_and_recovered() {
        let negotiator = LoopbackNegotiator::new();
        let manager = DestinationManager::new(fast_config(), Arc::new(negotiator.clone()));
        let mut events = manager.subscribe();
        let (tx, _) = broadcast::channel::<CompositeFrame>(16);
        let dest = destination("shaky");

        manager.start(dest.clone(), tx.subscribe()).await.unwrap();
        wait_for_event(&mut events, |e| {
            matches!(e, StreamingEvent::StateChanged { state: ConnectionState::Connected, .. })
        })
        .await;

        negotiator
            .set_health(
                &dest.id,
                HealthSample {
                    packet_loss: 0.2,
                    ..HealthSample::healthy()
                },
            )
            .await;
        wait_for_event(&mut events, |e| {
            matches!(e, StreamingEvent::StateChanged { state: ConnectionState::Degraded, .. })
        })
        .await;

        negotiator.set_health(&dest.id, HealthSample::healthy()).await;
        wait_for_event(&mut events, |e| {
            matches!(e, StreamingEvent::StateChanged { state: ConnectionState::Connected, .. })
        })
        .await;

        manager.stop_all().await;
    }

    #[tokio::test]
    async fn test_stop_cancels_inflight_retry() {
        let negotiator = LoopbackNegotiator::new();
        let config = fast_config().backoff(
            BackoffConfig::default()
                .base_delay(Duration::from_secs(60))
                .jitter(false)
                .max_attempts(5),
        );
        let manager = DestinationManager::new(config, Arc::new(negotiator.clone()));
        let (tx, _) = broadcast::channel::<CompositeFrame>(16);
        let dest = destination("slow");

        negotiator.fail_connects(&dest.id, 100).await;
        manager.start(dest.clone(), tx.subscribe()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        // Stop while the session sits in its 60 s retry sleep
        tokio::time::timeout(Duration::from_secs(1), manager.stop(&dest.id))
            .await
            .expect("stop did not cancel the retry sleep")
            .unwrap();

        assert_eq!(
            manager.state_of(&dest.id).await,
            Some(ConnectionState::Terminated)
        );
    }
}
