//! Integration tests for the fan-out core, driven through mock feed
//! transports.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use maildrop_fanout::{
    Distributor, FeedError, FeedSink, FeedStream, Hub, HubHandle, Pipeline, PONG_WAIT,
    SubscriptionId,
};
use maildrop_message::{CapturedMessage, MailPath, MessageContent, MessageId, ROUTING_HEADER};
use tokio::sync::mpsc;
use tokio::time::timeout;

/// Everything a mock feed wrote, in order.
#[derive(Debug)]
enum Frame {
    Event(CapturedMessage),
    Ping,
    Close,
}

struct MockSink {
    frames: mpsc::UnboundedSender<Frame>,
}

#[async_trait]
impl FeedSink for MockSink {
    async fn send_event(&mut self, event: &CapturedMessage) -> Result<(), FeedError> {
        self.frames
            .send(Frame::Event(event.clone()))
            .map_err(|_| FeedError::Transport("peer gone".to_string()))
    }

    async fn send_ping(&mut self) -> Result<(), FeedError> {
        self.frames
            .send(Frame::Ping)
            .map_err(|_| FeedError::Transport("peer gone".to_string()))
    }

    async fn send_close(&mut self) -> Result<(), FeedError> {
        self.frames
            .send(Frame::Close)
            .map_err(|_| FeedError::Transport("peer gone".to_string()))
    }
}

struct MockStream {
    liveness: mpsc::UnboundedReceiver<()>,
}

#[async_trait]
impl FeedStream for MockStream {
    async fn next_frame(&mut self) -> Result<(), FeedError> {
        self.liveness.recv().await.ok_or(FeedError::Closed)
    }
}

/// Open a feed on `hub` and return its id, the frames it writes, and the
/// sender that simulates inbound peer activity (dropping it simulates a peer
/// close).
fn open_feed(
    hub: &HubHandle,
    namespace: &str,
) -> (
    SubscriptionId,
    mpsc::UnboundedReceiver<Frame>,
    mpsc::UnboundedSender<()>,
) {
    let (frames_tx, frames_rx) = mpsc::unbounded_channel();
    let (liveness_tx, liveness_rx) = mpsc::unbounded_channel();

    let id = hub.accept(
        namespace.to_string(),
        Box::new(MockSink { frames: frames_tx }),
        Box::new(MockStream {
            liveness: liveness_rx,
        }),
    );

    (id, frames_rx, liveness_tx)
}

fn event_for(namespace: &str, marker: &str) -> CapturedMessage {
    let mut headers = HashMap::new();
    if !namespace.is_empty() {
        headers.insert(
            ROUTING_HEADER.to_string(),
            vec![format!(r#"{{"ms":"{namespace}"}}"#)],
        );
    }

    let mut message = CapturedMessage::new(
        "test.local",
        MailPath::new("sender", "example.com"),
        vec![MailPath::new("inbox", "example.com")],
        MessageContent {
            headers,
            body: marker.to_string(),
            size: marker.len(),
        },
    );
    message.id = MessageId::from(format!("{marker}@test.local"));
    message
}

async fn wait_for_feed_count(hub: &HubHandle, expected: usize) {
    timeout(Duration::from_secs(120), async {
        while hub.feed_count().await != expected {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await
    .expect("feed count never reached expected value");
}

#[tokio::test(start_paused = true)]
async fn event_reaches_only_matching_namespace() {
    let _ = tracing_subscriber::fmt::try_init();

    let (hub, handle) = Hub::new();
    tokio::spawn(hub.run());

    let (_s1, mut s1_frames, _s1_live) = open_feed(&handle, "a");
    let (_s2, mut s2_frames, _s2_live) = open_feed(&handle, "b");
    wait_for_feed_count(&handle, 2).await;

    handle.broadcast(Arc::new(event_for("a", "e1")));

    let frame = timeout(Duration::from_secs(5), s1_frames.recv())
        .await
        .expect("matching feed timed out")
        .expect("matching feed closed");
    match frame {
        Frame::Event(event) => assert_eq!(event.content.body, "e1"),
        other => panic!("expected event frame, got {other:?}"),
    }

    // The non-matching feed is closed by the mismatch policy rather than
    // skipping the event.
    let closed = timeout(Duration::from_secs(5), async {
        loop {
            match s2_frames.recv().await {
                Some(Frame::Event(event)) => {
                    panic!("non-matching feed received {}", event.content.body)
                }
                Some(_) => {}
                None => break,
            }
        }
    })
    .await;
    assert!(closed.is_ok(), "non-matching feed never closed");

    wait_for_feed_count(&handle, 1).await;
}

#[tokio::test(start_paused = true)]
async fn empty_namespace_event_matches_nobody_and_closes_bound_feeds() {
    let (hub, handle) = Hub::new();
    tokio::spawn(hub.run());

    let (_s1, mut s1_frames, _s1_live) = open_feed(&handle, "a");
    let (_s2, mut s2_frames, _s2_live) = open_feed(&handle, "b");
    wait_for_feed_count(&handle, 2).await;

    handle.broadcast(Arc::new(event_for("", "untagged")));

    for frames in [&mut s1_frames, &mut s2_frames] {
        let closed = timeout(Duration::from_secs(5), async {
            loop {
                match frames.recv().await {
                    Some(Frame::Event(_)) => panic!("untagged event was delivered"),
                    Some(_) => {}
                    None => break,
                }
            }
        })
        .await;
        assert!(closed.is_ok(), "feed not closed by empty-namespace event");
    }

    wait_for_feed_count(&handle, 0).await;
}

#[tokio::test(start_paused = true)]
async fn silent_peer_is_closed_within_one_keepalive_cycle() {
    let (hub, handle) = Hub::new();
    tokio::spawn(hub.run());

    // Keep the liveness sender alive but never send: the peer is connected
    // yet silent past the read deadline.
    let (_id, mut frames, _liveness_tx) = open_feed(&handle, "a");
    wait_for_feed_count(&handle, 1).await;

    let start = tokio::time::Instant::now();
    wait_for_feed_count(&handle, 0).await;
    assert!(start.elapsed() <= PONG_WAIT + Duration::from_secs(5));

    // The probe fired before the peer was given up on.
    let mut saw_ping = false;
    while let Ok(Some(frame)) = timeout(Duration::from_secs(1), frames.recv()).await {
        if matches!(frame, Frame::Ping) {
            saw_ping = true;
        }
    }
    assert!(saw_ping, "no keepalive probe observed before close");
}

#[tokio::test(start_paused = true)]
async fn peer_close_terminates_only_that_feed() {
    let (hub, handle) = Hub::new();
    tokio::spawn(hub.run());

    let (_s1, mut s1_frames, _s1_live) = open_feed(&handle, "a");
    let (_s2, _s2_frames, s2_live) = open_feed(&handle, "a");
    wait_for_feed_count(&handle, 2).await;

    drop(s2_live); // peer-initiated close
    wait_for_feed_count(&handle, 1).await;

    handle.broadcast(Arc::new(event_for("a", "after-close")));

    let frame = timeout(Duration::from_secs(5), s1_frames.recv())
        .await
        .expect("surviving feed timed out")
        .expect("surviving feed closed");
    assert!(matches!(frame, Frame::Event(event) if event.content.body == "after-close"));
}

#[tokio::test(start_paused = true)]
async fn write_failure_closes_feed() {
    let (hub, handle) = Hub::new();
    tokio::spawn(hub.run());

    let (_id, frames, _live) = open_feed(&handle, "a");
    wait_for_feed_count(&handle, 1).await;

    drop(frames); // every subsequent write fails
    handle.broadcast(Arc::new(event_for("a", "doomed")));

    wait_for_feed_count(&handle, 0).await;
}

#[tokio::test]
async fn saturated_feed_does_not_delay_others() {
    let (hub, handle) = Hub::new();
    tokio::spawn(hub.run());

    // A raw registration with a single-slot queue stands in for a subscriber
    // whose delivery loop has stopped draining.
    let stuck = SubscriptionId::new();
    let (stuck_tx, mut stuck_rx) = mpsc::channel(1);
    handle.register(stuck, stuck_tx);

    let (_s2, mut s2_frames, _s2_live) = open_feed(&handle, "a");
    wait_for_feed_count(&handle, 2).await;

    for n in 0..3 {
        handle.broadcast(Arc::new(event_for("a", &format!("e{n}"))));
    }

    // The healthy feed sees every event promptly despite the full queue.
    for n in 0..3 {
        let frame = timeout(Duration::from_secs(1), s2_frames.recv())
            .await
            .expect("healthy feed delayed by saturated peer")
            .expect("healthy feed closed");
        assert!(matches!(frame, Frame::Event(event) if event.content.body == format!("e{n}")));
    }

    // The saturated feed kept its slot and its first event; the rest were
    // dropped for it alone.
    assert_eq!(handle.feed_count().await, 2);
    assert!(stuck_rx.recv().await.is_some());
    assert!(stuck_rx.try_recv().is_err());
}

#[tokio::test]
async fn distributor_preserves_order_for_healthy_pipeline() {
    let (hub_v1, v1_handle) = Hub::new();
    let (hub_v2, v2_handle) = Hub::new();
    tokio::spawn(hub_v1.run());
    tokio::spawn(hub_v2.run());

    // v1's pipeline is never run: its inbound queue buffers but drains
    // nothing, standing in for a slow generation.
    let (_v1_pipeline, v1_inbound) = Pipeline::new("v1", v1_handle);
    let (v2_pipeline, v2_inbound) = Pipeline::new("v2", v2_handle.clone());
    tokio::spawn(v2_pipeline.run());

    let (_sub, mut frames, _live) = open_feed(&v2_handle, "a");

    let (ingest_tx, ingest_rx) = mpsc::channel(16);
    tokio::spawn(Distributor::new(ingest_rx, vec![v1_inbound, v2_inbound]).run());

    for n in 0..3 {
        ingest_tx
            .send(event_for("a", &format!("e{n}")))
            .await
            .unwrap();
    }

    for n in 0..3 {
        let frame = timeout(Duration::from_secs(5), frames.recv())
            .await
            .expect("delivery timed out")
            .expect("feed closed");
        assert!(
            matches!(frame, Frame::Event(event) if event.content.body == format!("e{n}")),
            "events reordered at position {n}"
        );
    }
}

#[tokio::test(start_paused = true)]
async fn stalled_pipeline_bounds_throughput_without_reordering() {
    let (hub_v1, v1_handle) = Hub::new();
    let (hub_v2, v2_handle) = Hub::new();
    tokio::spawn(hub_v1.run());
    tokio::spawn(hub_v2.run());

    // v1 never drains; its 64-slot inbound queue fills, after which every
    // handoff times out and aborts the rest of that distribution step.
    let (_v1_pipeline, v1_inbound) = Pipeline::new("v1", v1_handle);
    let (v2_pipeline, v2_inbound) = Pipeline::new("v2", v2_handle.clone());
    tokio::spawn(v2_pipeline.run());

    let (_sub, mut frames, _live) = open_feed(&v2_handle, "a");

    let (ingest_tx, ingest_rx) = mpsc::channel(128);
    tokio::spawn(Distributor::new(ingest_rx, vec![v1_inbound, v2_inbound]).run());

    let total = 70;
    for n in 0..total {
        ingest_tx.send(event_for("a", &format!("e{n:03}"))).await.unwrap();
    }

    // Only the events accepted by the stalled v1 make it to v2, in order;
    // the rest are dropped for v2 when each handoff deadline expires.
    let mut received = Vec::new();
    let collect = timeout(Duration::from_secs(600), async {
        loop {
            match frames.recv().await {
                Some(Frame::Event(event)) => {
                    received.push(event.content.body.clone());
                    if received.len() == 64 {
                        break;
                    }
                }
                Some(_) => {}
                None => break,
            }
        }
    })
    .await;
    assert!(collect.is_ok(), "timed out collecting v2 deliveries");

    let expected: Vec<String> = (0..64).map(|n| format!("e{n:03}")).collect();
    assert_eq!(received, expected, "v2 deliveries reordered or truncated");
}
