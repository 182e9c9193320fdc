//! End-to-end broadcast scenarios
//!
//! Drives a full studio session (registry + compositor + destinations +
//! signaling) over the in-memory hub and loopback negotiator.

use std::sync::Arc;
use std::time::Duration;

use stagecast::backoff::BackoffConfig;
use stagecast::compositor::{resolve_slots, RenderTarget};
use stagecast::destination::{
    ConnectionState, Destination, LoopbackNegotiator, PlatformKind, StreamingConfig,
    StreamingEvent,
};
use stagecast::media::{SourceKind, TestPatternBackend, TrackConstraints};
use stagecast::registry::{ParticipantId, ParticipantRole, StageState};
use stagecast::signaling::{ChannelState, SignalingConfig, StudioHub};
use stagecast::studio::{Studio, StudioConfig};

/// Poll a condition until it holds or the test times out
macro_rules! wait_until {
    ($what:expr, $cond:expr) => {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if $cond {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {}", $what))
    };
}

fn fast_config(destinations: Vec<Destination>) -> StudioConfig {
    StudioConfig::default()
        .destinations(destinations)
        .streaming(
            StreamingConfig::default()
                .backoff(
                    BackoffConfig::default()
                        .base_delay(Duration::from_millis(5))
                        .max_delay(Duration::from_millis(40))
                        .jitter(false)
                        .max_attempts(5),
                )
                .connect_timeout(Duration::from_millis(500))
                .health_interval(Duration::from_millis(20)),
        )
        .signaling(SignalingConfig::default().reconnect(
            BackoffConfig::default()
                .base_delay(Duration::from_millis(5))
                .max_delay(Duration::from_millis(20))
                .jitter(false)
                .max_attempts(10),
        ))
}

fn destination(id: &str) -> Destination {
    Destination::new(id, PlatformKind::DirectPeer, format!("loopback://{id}"))
}

/// Host starts a broadcast with two destinations; A fails negotiation three
/// times then succeeds, B succeeds immediately. Both end connected, and the
/// compositor output is unaffected by A's delay.
#[tokio::test]
async fn two_destinations_with_flaky_negotiation() {
    let hub = StudioHub::new();
    let negotiator = LoopbackNegotiator::new();
    let a = destination("a");
    let b = destination("b");
    negotiator.fail_connects(&a.id, 3).await;

    let studio = Studio::connect(
        fast_config(vec![a.clone(), b.clone()]),
        Arc::new(negotiator.clone()),
        Arc::new(hub),
    )
    .await
    .unwrap();

    let mut output = studio.compositor().subscribe();
    studio.start_broadcast().await.unwrap();

    wait_until!("both destinations connected", {
        let status = studio.status().await;
        status.destinations.len() == 2
            && status
                .destinations
                .iter()
                .all(|d| d.state == ConnectionState::Connected)
    });

    // Output kept flowing throughout A's retry cycle
    let first = output.recv().await.unwrap();
    let second = output.recv().await.unwrap();
    assert!(second.sequence > first.sequence);

    // B received frames while A was still retrying
    wait_until!(
        "frames reached b",
        negotiator.frames_received(&b.id).await > 0
    );

    studio.stop_broadcast().await;
    studio.shutdown().await;
}

/// Retries never exceed the configured cap; the session terminates with a
/// destination-scoped failure and the other destination is unaffected.
#[tokio::test]
async fn exhausted_destination_is_isolated() {
    let hub = StudioHub::new();
    let negotiator = LoopbackNegotiator::new();
    let dead = destination("dead");
    let good = destination("good");
    negotiator.fail_connects(&dead.id, 1000).await;

    let studio = Studio::connect(
        fast_config(vec![dead.clone(), good.clone()]),
        Arc::new(negotiator.clone()),
        Arc::new(hub),
    )
    .await
    .unwrap();

    let mut events = studio.streaming_events();
    studio.start_broadcast().await.unwrap();

    let attempts = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match events.recv().await {
                Ok(StreamingEvent::Exhausted { id, attempts }) => {
                    assert_eq!(id, dead.id);
                    return attempts;
                }
                Ok(_) => continue,
                Err(e) => panic!("event stream failed: {e}"),
            }
        }
    })
    .await
    .expect("destination never exhausted");
    assert_eq!(attempts, 5);

    wait_until!("dead terminated, good connected", {
        let status = studio.status().await;
        status
            .destinations
            .iter()
            .any(|d| d.id == dead.id && d.state == ConnectionState::Terminated)
            && status
                .destinations
                .iter()
                .any(|d| d.id == good.id && d.state == ConnectionState::Connected)
    });

    studio.stop_broadcast().await;
    studio.shutdown().await;
}

/// A promoted greenroom participant appears in the next composited frame at
/// the slot the layout dictates; demoting removes them without disturbing
/// the other slots.
#[tokio::test]
async fn promotion_changes_next_frame() {
    let hub = StudioHub::new();
    let studio = Studio::connect(
        fast_config(Vec::new()),
        Arc::new(LoopbackNegotiator::new()),
        Arc::new(hub),
    )
    .await
    .unwrap();

    let host = ParticipantId::new("host");
    let guest = ParticipantId::new("guest");
    for (id, role) in [
        (&host, ParticipantRole::Host),
        (&guest, ParticipantRole::Guest),
    ] {
        studio.join(id.clone(), id.as_str(), role).await.unwrap();
        studio
            .acquire_source(
                id,
                &TestPatternBackend,
                SourceKind::Camera,
                &TrackConstraints::default(),
            )
            .await
            .unwrap();
    }
    studio.promote(&host).await.unwrap();

    let frame = studio.compositor().render_frame(RenderTarget::Program).await;
    let layout = studio.compositor().layout().await;
    let live = studio.registry().live_participants().await;
    let slots = resolve_slots(&layout, &live, frame.video.width, frame.video.height);
    assert_eq!(slots.len(), 1);

    // Promote the guest: the next frame gains a second slot
    studio.promote(&guest).await.unwrap();
    let live = studio.registry().live_participants().await;
    let slots = resolve_slots(&layout, &live, 1280, 720);
    assert_eq!(slots.len(), 2);
    assert_eq!(slots[0].source.as_ref().unwrap().participant_id(), &host);
    assert_eq!(slots[1].source.as_ref().unwrap().participant_id(), &guest);

    // Demote the guest: the host keeps slot zero
    studio.demote(&guest).await.unwrap();
    let live = studio.registry().live_participants().await;
    let slots = resolve_slots(&layout, &live, 1280, 720);
    assert_eq!(slots.len(), 1);
    assert_eq!(slots[0].source.as_ref().unwrap().participant_id(), &host);
    assert_eq!(
        studio.registry().participant(&guest).await.unwrap().stage,
        StageState::Backstage
    );

    studio.shutdown().await;
}

/// The signaling channel drops mid-broadcast and reconnects after three
/// refused attempts; registry state fully resyncs from the coordinator
/// snapshot, with no stale local state surviving.
#[tokio::test]
async fn signaling_reconnect_resyncs_state() {
    let hub = StudioHub::new();
    let studio = Studio::connect(
        fast_config(Vec::new()),
        Arc::new(LoopbackNegotiator::new()),
        Arc::new(hub.clone()),
    )
    .await
    .unwrap();

    // A peer the studio only knows about via signaling
    let peer = Studio::connect(
        fast_config(Vec::new()),
        Arc::new(LoopbackNegotiator::new()),
        Arc::new(hub.clone()),
    )
    .await
    .unwrap();
    let alice = ParticipantId::new("alice");
    peer.join(alice.clone(), "Alice", ParticipantRole::Guest)
        .await
        .unwrap();

    wait_until!(
        "studio learned about alice",
        studio.registry().participant(&alice).await.is_some()
    );

    // Drop every connection; the studio's next three attempts are refused
    hub.refuse_next_connects(3).await;
    hub.drop_all_connections().await;
    peer.shutdown().await;

    // While the studio is offline, the coordinator times alice out; only the
    // resync snapshot can tell the studio about it
    hub.leave_participant(&alice).await;

    wait_until!(
        "studio resynced without stale state",
        studio.registry().participant(&alice).await.is_none()
    );
    assert_eq!(studio.status().await.signaling, ChannelState::Connected);

    studio.shutdown().await;
}

/// Banning is terminal: the banned participant leaves the live set and
/// cannot rejoin under the same identity.
#[tokio::test]
async fn ban_removes_and_blocks_rejoin() {
    let hub = StudioHub::new();
    let studio = Studio::connect(
        fast_config(Vec::new()),
        Arc::new(LoopbackNegotiator::new()),
        Arc::new(hub),
    )
    .await
    .unwrap();

    let mallory = ParticipantId::new("mallory");
    studio
        .join(mallory.clone(), "Mallory", ParticipantRole::Guest)
        .await
        .unwrap();
    studio.promote(&mallory).await.unwrap();
    assert_eq!(studio.registry().live_participants().await.len(), 1);

    studio.ban(&mallory).await.unwrap();
    assert!(studio.registry().live_participants().await.is_empty());
    assert!(studio.promote(&mallory).await.is_err());
    assert!(studio
        .join(mallory.clone(), "Mallory", ParticipantRole::Guest)
        .await
        .is_err());

    studio.shutdown().await;
}
