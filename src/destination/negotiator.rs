//! Ingest negotiation seam
//!
//! How a publishing session is established varies per platform: a direct
//! peer-based negotiation for destinations that support it, or a hand-off to
//! a relay speaking a legacy push protocol. Both live behind
//! [`IngestNegotiator`]; the streaming manager only sees the trait.
//!
//! The crate ships [`LoopbackNegotiator`], an in-memory implementation with
//! scriptable failures, used by tests and local monitoring. Real protocol
//! integrations plug in from the embedding application.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::session::{Destination, DestinationId, HealthSample};
use crate::compositor::CompositeFrame;
use crate::error::{Error, Result};

/// Establishes publishing sessions against a destination's ingest endpoint
#[async_trait]
pub trait IngestNegotiator: Send + Sync {
    /// Negotiate one publishing session
    async fn negotiate(&self, destination: &Destination) -> Result<Box<dyn IngestSession>>;
}

/// One negotiated publishing session
#[async_trait]
pub trait IngestSession: Send {
    /// Publish one composite frame
    async fn send_frame(&mut self, frame: &CompositeFrame) -> Result<()>;

    /// Sample current transport health
    async fn health_sample(&mut self) -> HealthSample;

    /// Release the session and its network resources
    async fn close(&mut self);
}

#[derive(Default)]
struct Script {
    /// Remaining negotiations to refuse
    fail_connects: u32,
    /// Drop the live session after this many more frames
    fail_after_frames: Option<u64>,
    /// Health reported by live sessions; `None` reports nominal health
    health: Option<HealthSample>,
}

struct Shared {
    scripts: Mutex<HashMap<DestinationId, Script>>,
    counters: Mutex<HashMap<DestinationId, Arc<AtomicU64>>>,
}

/// In-memory negotiator with scriptable failures
#[derive(Clone)]
pub struct LoopbackNegotiator {
    shared: Arc<Shared>,
}

impl LoopbackNegotiator {
    /// Create a negotiator that accepts everything
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                scripts: Mutex::new(HashMap::new()),
                counters: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Refuse the next `n` negotiations for a destination
    pub async fn fail_connects(&self, id: &DestinationId, n: u32) {
        let mut scripts = self.shared.scripts.lock().await;
        scripts.entry(id.clone()).or_default().fail_connects = n;
    }

    /// Drop the destination's live session after `n` more frames
    pub async fn fail_after_frames(&self, id: &DestinationId, n: u64) {
        let mut scripts = self.shared.scripts.lock().await;
        scripts.entry(id.clone()).or_default().fail_after_frames = Some(n);
    }

    /// Override the health reported by the destination's sessions
    pub async fn set_health(&self, id: &DestinationId, sample: HealthSample) {
        let mut scripts = self.shared.scripts.lock().await;
        scripts.entry(id.clone()).or_default().health = Some(sample);
    }

    /// Total frames accepted for a destination across all its sessions
    pub async fn frames_received(&self, id: &DestinationId) -> u64 {
        let counters = self.shared.counters.lock().await;
        counters
            .get(id)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }
}

impl Default for LoopbackNegotiator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IngestNegotiator for LoopbackNegotiator {
    async fn negotiate(&self, destination: &Destination) -> Result<Box<dyn IngestSession>> {
        {
            let mut scripts = self.shared.scripts.lock().await;
            if let Some(script) = scripts.get_mut(&destination.id) {
                if script.fail_connects > 0 {
                    script.fail_connects -= 1;
                    return Err(Error::Negotiation {
                        destination: destination.id.clone(),
                        reason: "scripted negotiation failure".into(),
                    });
                }
            }
        }

        let counter = {
            let mut counters = self.shared.counters.lock().await;
            Arc::clone(counters.entry(destination.id.clone()).or_default())
        };

        tracing::debug!(destination = %destination.id, endpoint = %destination.endpoint, "Loopback session negotiated");
        Ok(Box::new(LoopbackSession {
            id: destination.id.clone(),
            shared: Arc::clone(&self.shared),
            counter,
            frames_this_session: 0,
        }))
    }
}

/// In-memory sink standing in for a negotiated publishing session
pub struct LoopbackSession {
    id: DestinationId,
    shared: Arc<Shared>,
    counter: Arc<AtomicU64>,
    frames_this_session: u64,
}

#[async_trait]
impl IngestSession for LoopbackSession {
    async fn send_frame(&mut self, _frame: &CompositeFrame) -> Result<()> {
        {
            let mut scripts = self.shared.scripts.lock().await;
            if let Some(script) = scripts.get_mut(&self.id) {
                if let Some(remaining) = script.fail_after_frames {
                    if remaining == 0 {
                        script.fail_after_frames = None;
                        return Err(Error::ChannelClosed("ingest session"));
                    }
                    script.fail_after_frames = Some(remaining - 1);
                }
            }
        }

        self.frames_this_session += 1;
        self.counter.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn health_sample(&mut self) -> HealthSample {
        let scripts = self.shared.scripts.lock().await;
        scripts
            .get(&self.id)
            .and_then(|s| s.health)
            .unwrap_or_else(HealthSample::healthy)
    }

    async fn close(&mut self) {
        tracing::debug!(
            destination = %self.id,
            frames = self.frames_this_session,
            "Loopback session closed"
        );
    }
}
