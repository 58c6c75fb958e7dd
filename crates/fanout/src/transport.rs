//! Seam between the fan-out core and the wire. A live feed is split into a
//! write half and a read half so the two subscription tasks can each own one.

use async_trait::async_trait;
use maildrop_message::CapturedMessage;
use thiserror::Error;

/// Failure on a feed transport.
#[derive(Debug, Error)]
pub enum FeedError {
    /// The peer closed the feed.
    #[error("feed closed by peer")]
    Closed,

    /// Underlying transport failure.
    #[error("transport error: {0}")]
    Transport(String),
}

/// Write half of a live feed.
#[async_trait]
pub trait FeedSink: Send + 'static {
    /// Serialize and push one captured message to the peer.
    async fn send_event(&mut self, event: &CapturedMessage) -> std::result::Result<(), FeedError>;

    /// Send a keepalive probe.
    async fn send_ping(&mut self) -> std::result::Result<(), FeedError>;

    /// Send a close frame.
    async fn send_close(&mut self) -> std::result::Result<(), FeedError>;
}

/// Read half of a live feed, consumed only to detect peer liveness. The
/// protocol expects no application data from the peer; implementations cap
/// inbound frames at the minimum size their wire format allows.
#[async_trait]
pub trait FeedStream: Send + 'static {
    /// Wait for the next inbound frame. Any `Ok` counts as liveness; the
    /// frame content is discarded. `Err` on peer close or transport failure.
    async fn next_frame(&mut self) -> std::result::Result<(), FeedError>;
}
