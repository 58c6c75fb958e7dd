//! Registry and broadcaster of live feeds for one API generation.
//!
//! The registry is mutated only by the hub's own command loop; registration,
//! removal, and broadcasts from any number of tasks are serialized through a
//! single channel rather than a locked container.

use std::collections::HashMap;
use std::sync::Arc;

use maildrop_message::CapturedMessage;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::subscription::{self, OUTBOUND_CAPACITY, SubscriptionId};
use crate::transport::{FeedSink, FeedStream};

enum Command {
    Register {
        id: SubscriptionId,
        feed: mpsc::Sender<Arc<CapturedMessage>>,
    },
    Unregister {
        id: SubscriptionId,
    },
    Broadcast {
        event: Arc<CapturedMessage>,
    },
    FeedCount {
        reply: oneshot::Sender<usize>,
    },
}

/// Per-generation registry of active subscriptions.
pub struct Hub {
    commands: mpsc::UnboundedReceiver<Command>,
    feeds: HashMap<SubscriptionId, mpsc::Sender<Arc<CapturedMessage>>>,
}

impl Hub {
    /// Create a hub and the handle used to talk to it.
    #[must_use]
    pub fn new() -> (Self, HubHandle) {
        let (tx, rx) = mpsc::unbounded_channel();

        (
            Self {
                commands: rx,
                feeds: HashMap::new(),
            },
            HubHandle { commands: tx },
        )
    }

    /// Run the registry loop until every handle has been dropped.
    pub async fn run(mut self) {
        while let Some(command) = self.commands.recv().await {
            match command {
                Command::Register { id, feed } => {
                    self.feeds.insert(id, feed);
                    debug!(%id, feeds = self.feeds.len(), "subscription registered");
                }
                Command::Unregister { id } => {
                    // Safe to receive more than once for the same id.
                    if self.feeds.remove(&id).is_some() {
                        debug!(%id, feeds = self.feeds.len(), "subscription unregistered");
                    }
                }
                Command::Broadcast { event } => self.broadcast(&event),
                Command::FeedCount { reply } => {
                    let _ = reply.send(self.feeds.len());
                }
            }
        }
    }

    /// Enqueue the event on every registered subscription's outbound queue.
    /// A full queue drops the event for that subscriber only; the broadcast
    /// never blocks on any single feed.
    fn broadcast(&mut self, event: &Arc<CapturedMessage>) {
        let mut closed = Vec::new();

        for (id, feed) in &self.feeds {
            match feed.try_send(Arc::clone(event)) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    debug!(%id, "outbound queue full, dropping event for this feed");
                }
                Err(TrySendError::Closed(_)) => closed.push(*id),
            }
        }

        for id in closed {
            self.feeds.remove(&id);
        }
    }
}

/// Cloneable handle for registering feeds and broadcasting into a [`Hub`].
#[derive(Clone, Debug)]
pub struct HubHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl HubHandle {
    /// Add a subscription's outbound queue to the registry. Never blocks.
    pub fn register(&self, id: SubscriptionId, feed: mpsc::Sender<Arc<CapturedMessage>>) {
        let _ = self.commands.send(Command::Register { id, feed });
    }

    /// Remove a subscription if present. Safe to call more than once.
    pub fn unregister(&self, id: SubscriptionId) {
        let _ = self.commands.send(Command::Unregister { id });
    }

    /// Deliver an event to every registered subscription.
    pub fn broadcast(&self, event: Arc<CapturedMessage>) {
        let _ = self.commands.send(Command::Broadcast { event });
    }

    /// Upgrade a raw feed transport into a registered subscription scoped to
    /// `namespace` and start its two tasks. Returns once the subscription is
    /// on its way; it continues independently until its transport closes.
    pub fn accept(
        &self,
        namespace: String,
        sink: Box<dyn FeedSink>,
        stream: Box<dyn FeedStream>,
    ) -> SubscriptionId {
        let id = SubscriptionId::new();
        let (feed_tx, feed_rx) = mpsc::channel(OUTBOUND_CAPACITY);

        self.register(id, feed_tx);
        subscription::spawn(id, namespace, self.clone(), feed_rx, sink, stream);

        id
    }

    /// Number of currently registered subscriptions. Zero once the hub has
    /// stopped running.
    pub async fn feed_count(&self) -> usize {
        let (reply, rx) = oneshot::channel();

        if self.commands.send(Command::FeedCount { reply }).is_err() {
            return 0;
        }

        rx.await.unwrap_or(0)
    }
}
