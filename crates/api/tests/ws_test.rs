//! Live-feed tests over real websocket connections.

mod common;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use maildrop_store_memory::MemoryStore;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

const PUSH_WAIT: Duration = Duration::from_secs(5);

async fn connect(addr: SocketAddr, path: &str) -> Socket {
    let (socket, _) = connect_async(format!("ws://{addr}{path}"))
        .await
        .expect("websocket connect failed");
    socket
}

async fn next_text(socket: &mut Socket) -> serde_json::Value {
    let frame = timeout(PUSH_WAIT, socket.next())
        .await
        .expect("no push within deadline")
        .expect("stream ended")
        .expect("websocket error");
    let text = frame.into_text().expect("expected a text frame");
    serde_json::from_str(&text).expect("push was not valid json")
}

#[tokio::test]
async fn arrival_is_replicated_to_every_generation() {
    let (addr, ingest) = common::start_api(Arc::new(MemoryStore::new())).await;

    let mut sockets = Vec::new();
    for generation in ["v1", "v2", "v3"] {
        sockets.push(connect(addr, &format!("/api/{generation}/dev/websocket")).await);
    }

    let message = common::tagged_message("dev", "replicated");
    let id = message.id.clone();
    ingest.send(message).await.expect("ingest closed");

    for socket in &mut sockets {
        let pushed = next_text(socket).await;
        assert_eq!(pushed["ID"], serde_json::json!(id.as_str()));
        assert_eq!(pushed["Content"]["Body"], serde_json::json!("replicated"));
    }
}

#[tokio::test]
async fn mismatched_namespace_closes_the_feed() {
    let (addr, ingest) = common::start_api(Arc::new(MemoryStore::new())).await;

    let mut matching = connect(addr, "/api/v3/alpha/websocket").await;
    let mut other = connect(addr, "/api/v3/beta/websocket").await;

    ingest
        .send(common::tagged_message("alpha", "only-alpha"))
        .await
        .expect("ingest closed");

    let pushed = next_text(&mut matching).await;
    assert_eq!(pushed["Content"]["Body"], serde_json::json!("only-alpha"));

    // The beta feed saw a message for alpha and must be torn down without
    // delivering it.
    let closed = timeout(PUSH_WAIT, async {
        loop {
            match other.next().await {
                None | Some(Ok(Message::Close(_))) | Some(Err(_)) => break,
                Some(Ok(Message::Text(text))) => {
                    panic!("mismatched feed received a push: {text}")
                }
                Some(Ok(_)) => {}
            }
        }
    })
    .await;
    assert!(closed.is_ok(), "mismatched feed was not closed");
}

#[tokio::test]
async fn blank_namespace_is_rejected_at_upgrade() {
    let (addr, _ingest) = common::start_api(Arc::new(MemoryStore::new())).await;

    let result = connect_async(format!("ws://{addr}/api/v3/%20/websocket")).await;
    match result {
        Err(tungstenite::Error::Http(response)) => {
            assert_eq!(response.status(), 400);
        }
        other => panic!("expected an http 400 rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn untagged_arrival_reaches_no_feed_and_closes_it() {
    let (addr, ingest) = common::start_api(Arc::new(MemoryStore::new())).await;

    let mut socket = connect(addr, "/api/v1/dev/websocket").await;

    ingest
        .send(common::tagged_message("", "untagged"))
        .await
        .expect("ingest closed");

    // An untagged message derives the empty namespace, which matches no
    // subscriber, so the feed is closed rather than served.
    let closed = timeout(PUSH_WAIT, async {
        loop {
            match socket.next().await {
                None | Some(Ok(Message::Close(_))) | Some(Err(_)) => break,
                Some(Ok(Message::Text(text))) => {
                    panic!("untagged message was pushed: {text}")
                }
                Some(Ok(_)) => {}
            }
        }
    })
    .await;
    assert!(closed.is_ok(), "feed survived an untagged arrival");
}
