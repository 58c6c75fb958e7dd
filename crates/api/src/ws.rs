//! Adapts an axum websocket into the fan-out feed transport seam.

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use maildrop_fanout::{FeedError, FeedSink, FeedStream, HubHandle};
use maildrop_message::CapturedMessage;
use tracing::debug;

use crate::error::{Error, Result};

/// Maximum inbound message size. The protocol expects no application data
/// from the peer, so this is the minimum allowed value.
const MAX_INBOUND_FRAME: usize = 1;

struct WsFeedSink {
    sink: SplitSink<WebSocket, Message>,
}

#[async_trait]
impl FeedSink for WsFeedSink {
    async fn send_event(&mut self, event: &CapturedMessage) -> std::result::Result<(), FeedError> {
        let payload = serde_json::to_string(event)
            .map_err(|error| FeedError::Transport(error.to_string()))?;

        self.sink
            .send(Message::Text(payload.into()))
            .await
            .map_err(|error| FeedError::Transport(error.to_string()))
    }

    async fn send_ping(&mut self) -> std::result::Result<(), FeedError> {
        self.sink
            .send(Message::Ping(Bytes::new()))
            .await
            .map_err(|error| FeedError::Transport(error.to_string()))
    }

    async fn send_close(&mut self) -> std::result::Result<(), FeedError> {
        self.sink
            .send(Message::Close(None))
            .await
            .map_err(|error| FeedError::Transport(error.to_string()))
    }
}

struct WsFeedStream {
    stream: SplitStream<WebSocket>,
}

#[async_trait]
impl FeedStream for WsFeedStream {
    async fn next_frame(&mut self) -> std::result::Result<(), FeedError> {
        match self.stream.next().await {
            Some(Ok(Message::Close(_))) | None => Err(FeedError::Closed),
            Some(Ok(_)) => Ok(()),
            Some(Err(error)) => Err(FeedError::Transport(error.to_string())),
        }
    }
}

/// Upgrade an inbound request into a live feed on `hub`, scoped to
/// `namespace`.
///
/// # Errors
///
/// Returns [`Error::BlankNamespace`] without upgrading if the namespace is
/// blank.
pub(crate) fn subscribe(
    hub: &HubHandle,
    namespace: String,
    ws: WebSocketUpgrade,
) -> Result<Response> {
    if namespace.trim().is_empty() {
        return Err(Error::BlankNamespace);
    }

    let hub = hub.clone();

    Ok(ws
        .max_message_size(MAX_INBOUND_FRAME)
        .on_upgrade(move |socket| async move {
            let (sink, stream) = socket.split();
            let id = hub.accept(
                namespace,
                Box::new(WsFeedSink { sink }),
                Box::new(WsFeedStream { stream }),
            );
            debug!(%id, "live feed opened");
        }))
}
