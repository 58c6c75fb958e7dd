//! One client's live feed, bound to a single namespace.
//!
//! A subscription runs two tasks while active: the delivery loop (outbound
//! queue plus keepalive pings) and the liveness detector (inbound reads with
//! a peer read deadline). Either task finishing aborts the other, the
//! subscription unregisters itself from its hub, and dropping the transport
//! halves releases the connection.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use maildrop_message::CapturedMessage;
use tokio::sync::mpsc;
use tokio::time::{self, Instant};
use tracing::debug;
use uuid::Uuid;

use crate::hub::HubHandle;
use crate::transport::{FeedSink, FeedStream};

/// Time allowed for one write to the peer.
pub const WRITE_WAIT: Duration = Duration::from_secs(10);

/// Maximum idle time before the peer is presumed dead. Any inbound frame,
/// including a pong, refreshes the deadline.
pub const PONG_WAIT: Duration = Duration::from_secs(60);

/// Keepalive ping cadence. Must be shorter than [`PONG_WAIT`]; 9/10 of it.
pub const PING_PERIOD: Duration = Duration::from_secs(54);

/// Outbound delivery queue capacity per subscription.
pub(crate) const OUTBOUND_CAPACITY: usize = 256;

/// Identity of one subscription within a hub.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Start both subscription tasks plus the supervisor that couples them.
///
/// The supervisor waits for either task to finish, aborts the other, and
/// unregisters the subscription from the hub.
pub(crate) fn spawn(
    id: SubscriptionId,
    namespace: String,
    hub: HubHandle,
    outbound: mpsc::Receiver<Arc<CapturedMessage>>,
    sink: Box<dyn FeedSink>,
    stream: Box<dyn FeedStream>,
) {
    let mut delivery = tokio::spawn(delivery_loop(id, namespace, outbound, sink));
    let mut liveness = tokio::spawn(liveness_loop(stream));

    tokio::spawn(async move {
        tokio::select! {
            _ = &mut delivery => liveness.abort(),
            _ = &mut liveness => delivery.abort(),
        }

        hub.unregister(id);
        debug!(%id, "subscription closed");
    });
}

/// Deliver matching events and keepalive pings until the feed fails, the
/// outbound queue closes, or an event arrives for a different namespace.
async fn delivery_loop(
    id: SubscriptionId,
    namespace: String,
    mut outbound: mpsc::Receiver<Arc<CapturedMessage>>,
    mut sink: Box<dyn FeedSink>,
) {
    let mut ping = time::interval_at(Instant::now() + PING_PERIOD, PING_PERIOD);

    loop {
        tokio::select! {
            item = outbound.recv() => match item {
                Some(event) => {
                    let event_namespace = event.namespace();
                    if event_namespace != namespace {
                        // Mismatch terminates the feed rather than skipping
                        // the event.
                        debug!(
                            %id,
                            subscribed = %namespace,
                            event = %event_namespace,
                            "namespace mismatch, closing feed"
                        );
                        break;
                    }

                    match time::timeout(WRITE_WAIT, sink.send_event(&event)).await {
                        Ok(Ok(())) => {}
                        Ok(Err(error)) => {
                            debug!(%id, %error, "event write failed");
                            break;
                        }
                        Err(_) => {
                            debug!(%id, "event write deadline expired");
                            break;
                        }
                    }
                }
                None => {
                    // Queue closed by the hub; tell the peer we are done.
                    let _ = time::timeout(WRITE_WAIT, sink.send_close()).await;
                    break;
                }
            },
            _ = ping.tick() => {
                let sent = time::timeout(WRITE_WAIT, sink.send_ping()).await;
                if !matches!(sent, Ok(Ok(()))) {
                    debug!(%id, "keepalive probe failed");
                    break;
                }
            }
        }
    }
}

/// Read inbound frames purely to detect peer close or silence past the read
/// deadline. Frame content is discarded.
async fn liveness_loop(mut stream: Box<dyn FeedStream>) {
    loop {
        match time::timeout(PONG_WAIT, stream.next_frame()).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) | Err(_) => break,
        }
    }
}
