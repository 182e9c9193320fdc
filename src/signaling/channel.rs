//! Signaling channel with automatic reconnect and state resync
//!
//! One logical connection per studio member to the session coordinator. On
//! transport failure the channel reconnects with capped exponential backoff
//! and randomized jitter (so a coordinator restart does not trigger a
//! synchronized reconnect storm across every viewer), then asks for a full
//! `SyncSnapshot` instead of replaying missed events: there is no ordering
//! guarantee across a disconnect boundary.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};

use super::event::SignalingEvent;
use crate::backoff::BackoffConfig;
use crate::error::{Error, Result};

/// Transport seam: how a connection to the coordinator is established
#[async_trait]
pub trait SignalingTransport: Send + Sync {
    /// Open a fresh connection
    async fn connect(&self) -> Result<Box<dyn SignalingConnection>>;
}

/// One open, bidirectional coordinator connection
#[async_trait]
pub trait SignalingConnection: Send {
    /// Send one event
    async fn send(&mut self, event: SignalingEvent) -> Result<()>;

    /// Receive the next event; errors indicate a dropped connection
    async fn recv(&mut self) -> Result<SignalingEvent>;

    /// Close cleanly
    async fn close(&mut self);
}

/// Signaling channel configuration
#[derive(Debug, Clone)]
pub struct SignalingConfig {
    /// Reconnect policy. Jitter stays on so simultaneous viewers spread
    /// their reconnects out.
    pub reconnect: BackoffConfig,

    /// Outbound queue depth while disconnected
    pub outbound_capacity: usize,

    /// Inbound queue depth toward the event pump
    pub inbound_capacity: usize,
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            reconnect: BackoffConfig::default()
                .base_delay(Duration::from_millis(500))
                .max_delay(Duration::from_secs(15))
                .multiplier(2.0)
                .jitter(true)
                .max_attempts(10),
            outbound_capacity: 256,
            inbound_capacity: 256,
        }
    }
}

impl SignalingConfig {
    /// Replace the reconnect policy
    pub fn reconnect(mut self, reconnect: BackoffConfig) -> Self {
        self.reconnect = reconnect;
        self
    }
}

/// Connection state visible to the rest of the studio
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// Live connection to the coordinator
    Connected,
    /// Connection lost; backoff reconnect in progress
    Reconnecting,
    /// Closed for good (explicit close or retry budget exhausted)
    Closed,
}

/// Reconnecting signaling channel.
///
/// Inbound events (including post-reconnect snapshots) arrive on the
/// receiver returned by [`SignalingChannel::connect`]; outbound events queue
/// through [`SignalingChannel::send`] and drain once a connection is up. An
/// event in flight when the connection drops is not retried; the snapshot
/// resync reconciles any divergence it caused.
pub struct SignalingChannel {
    outbound_tx: mpsc::Sender<SignalingEvent>,
    state_rx: watch::Receiver<ChannelState>,
    shutdown_tx: watch::Sender<bool>,
    reconnects: Arc<AtomicU32>,
    task: tokio::task::JoinHandle<()>,
}

impl SignalingChannel {
    /// Establish the initial connection and start the run loop.
    ///
    /// Returns the channel handle and the inbound event receiver. The
    /// receiver closing signals that the channel gave up
    /// (`SignalingDisconnected`) or was closed.
    pub async fn connect(
        transport: Arc<dyn SignalingTransport>,
        config: SignalingConfig,
    ) -> Result<(Self, mpsc::Receiver<SignalingEvent>)> {
        let conn = transport.connect().await?;

        let (outbound_tx, outbound_rx) = mpsc::channel(config.outbound_capacity);
        let (inbound_tx, inbound_rx) = mpsc::channel(config.inbound_capacity);
        let (state_tx, state_rx) = watch::channel(ChannelState::Connected);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let reconnects = Arc::new(AtomicU32::new(0));

        let task = tokio::spawn(run_loop(
            conn,
            transport,
            config,
            outbound_rx,
            inbound_tx,
            state_tx,
            shutdown_rx,
            Arc::clone(&reconnects),
        ));

        Ok((
            Self {
                outbound_tx,
                state_rx,
                shutdown_tx,
                reconnects,
                task,
            },
            inbound_rx,
        ))
    }

    /// Queue an event for the coordinator
    pub async fn send(&self, event: SignalingEvent) -> Result<()> {
        self.outbound_tx
            .send(event)
            .await
            .map_err(|_| Error::ChannelClosed("signaling outbound"))
    }

    /// Cloneable outbound sender, for tasks that forward events
    pub fn sender(&self) -> mpsc::Sender<SignalingEvent> {
        self.outbound_tx.clone()
    }

    /// Current connection state
    pub fn state(&self) -> ChannelState {
        *self.state_rx.borrow()
    }

    /// Watch for connection state changes
    pub fn state_watch(&self) -> watch::Receiver<ChannelState> {
        self.state_rx.clone()
    }

    /// Total successful reconnects performed so far
    pub fn reconnect_count(&self) -> u32 {
        self.reconnects.load(Ordering::Relaxed)
    }

    /// Close the channel and wait for the run loop to finish
    pub async fn close(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.task.await;
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_loop(
    mut conn: Box<dyn SignalingConnection>,
    transport: Arc<dyn SignalingTransport>,
    config: SignalingConfig,
    mut outbound_rx: mpsc::Receiver<SignalingEvent>,
    inbound_tx: mpsc::Sender<SignalingEvent>,
    state_tx: watch::Sender<ChannelState>,
    mut shutdown_rx: watch::Receiver<bool>,
    reconnects: Arc<AtomicU32>,
) {
    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    conn.close().await;
                    let _ = state_tx.send(ChannelState::Closed);
                    tracing::info!("Signaling channel closed");
                    return;
                }
            }
            outbound = outbound_rx.recv() => {
                let Some(event) = outbound else {
                    conn.close().await;
                    let _ = state_tx.send(ChannelState::Closed);
                    return;
                };
                if let Err(e) = conn.send(event).await {
                    tracing::warn!(error = %e, "Signaling send failed, reconnecting");
                    match reconnect(&transport, &config, &state_tx, &mut shutdown_rx, &reconnects).await {
                        Some(new_conn) => conn = new_conn,
                        None => return,
                    }
                }
            }
            inbound = conn.recv() => {
                match inbound {
                    Ok(event) => {
                        if inbound_tx.send(event).await.is_err() {
                            // Event pump dropped its receiver; nothing left to do
                            conn.close().await;
                            let _ = state_tx.send(ChannelState::Closed);
                            return;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Signaling connection lost, reconnecting");
                        match reconnect(&transport, &config, &state_tx, &mut shutdown_rx, &reconnects).await {
                            Some(new_conn) => conn = new_conn,
                            None => return,
                        }
                    }
                }
            }
        }
    }
}

/// Backoff reconnect. Returns the fresh connection with a `SyncRequest`
/// already sent, or `None` when the budget is exhausted or shutdown came.
async fn reconnect(
    transport: &Arc<dyn SignalingTransport>,
    config: &SignalingConfig,
    state_tx: &watch::Sender<ChannelState>,
    shutdown_rx: &mut watch::Receiver<bool>,
    reconnects: &Arc<AtomicU32>,
) -> Option<Box<dyn SignalingConnection>> {
    let _ = state_tx.send(ChannelState::Reconnecting);

    let mut attempt = 0u32;
    while config.reconnect.attempt_allowed(attempt) {
        let delay = config.reconnect.jittered_delay_for(attempt);
        tracing::debug!(attempt = attempt + 1, ?delay, "Signaling reconnect scheduled");

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    let _ = state_tx.send(ChannelState::Closed);
                    return None;
                }
            }
        }

        match transport.connect().await {
            Ok(mut conn) => {
                // Full state resync instead of replaying a missed-event log
                if let Err(e) = conn.send(SignalingEvent::SyncRequest).await {
                    tracing::warn!(error = %e, "Resync request failed, retrying");
                    attempt += 1;
                    continue;
                }
                reconnects.fetch_add(1, Ordering::Relaxed);
                let _ = state_tx.send(ChannelState::Connected);
                tracing::info!(attempt = attempt + 1, "Signaling reconnected");
                return Some(conn);
            }
            Err(e) => {
                tracing::warn!(attempt = attempt + 1, error = %e, "Signaling reconnect failed");
                attempt += 1;
            }
        }
    }

    let error = Error::SignalingDisconnected { attempts: attempt };
    tracing::error!(error = %error, "Signaling reconnect budget exhausted");
    let _ = state_tx.send(ChannelState::Closed);
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ParticipantId, ParticipantRole};
    use crate::signaling::hub::StudioHub;

    fn fast_config() -> SignalingConfig {
        SignalingConfig::default().reconnect(
            BackoffConfig::default()
                .base_delay(Duration::from_millis(5))
                .max_delay(Duration::from_millis(20))
                .jitter(false)
                .max_attempts(5),
        )
    }

    fn join(name: &str) -> SignalingEvent {
        SignalingEvent::JoinStudio {
            participant_id: ParticipantId::new(name),
            display_name: name.to_string(),
            role: ParticipantRole::Guest,
        }
    }

    #[tokio::test]
    async fn test_send_and_receive_through_hub() {
        let hub = StudioHub::new();
        let transport: Arc<dyn SignalingTransport> = Arc::new(hub.clone());
        let (channel, mut inbound) = SignalingChannel::connect(transport, fast_config())
            .await
            .unwrap();

        channel.send(join("alice")).await.unwrap();

        let event = inbound.recv().await.unwrap();
        assert!(matches!(event, SignalingEvent::JoinStudio { .. }));
        assert_eq!(channel.state(), ChannelState::Connected);

        channel.close().await;
    }

    #[tokio::test]
    async fn test_reconnect_after_drop_resyncs() {
        let hub = StudioHub::new();
        let transport: Arc<dyn SignalingTransport> = Arc::new(hub.clone());
        let (channel, mut inbound) = SignalingChannel::connect(transport, fast_config())
            .await
            .unwrap();

        // Seed coordinator state through a second connection
        let mut seeder = hub.connect().await.unwrap();
        seeder.send(join("alice")).await.unwrap();
        let _ = inbound.recv().await.unwrap();

        // Refuse three attempts, then let the fourth through
        hub.refuse_next_connects(3).await;
        hub.drop_all_connections().await;

        // The first event after reconnect is the full snapshot
        let event = loop {
            match inbound.recv().await {
                Some(SignalingEvent::SyncSnapshot { participants, .. }) => break participants,
                Some(_) => continue,
                None => panic!("channel gave up unexpectedly"),
            }
        };
        assert_eq!(event.len(), 1);
        assert_eq!(channel.reconnect_count(), 1);
        assert_eq!(channel.state(), ChannelState::Connected);

        channel.close().await;
    }

    #[tokio::test]
    async fn test_exhausted_reconnect_closes_channel() {
        let hub = StudioHub::new();
        let transport: Arc<dyn SignalingTransport> = Arc::new(hub.clone());
        let (channel, mut inbound) = SignalingChannel::connect(transport, fast_config())
            .await
            .unwrap();

        // Refuse more attempts than the budget allows
        hub.refuse_next_connects(100).await;
        hub.drop_all_connections().await;

        // Inbound closes once the budget is exhausted
        while inbound.recv().await.is_some() {}
        assert_eq!(channel.state(), ChannelState::Closed);
    }
}
