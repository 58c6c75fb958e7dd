//! Shared helpers for API integration tests.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use maildrop_api::{Api, ApiOptions};
use maildrop_message::{CapturedMessage, MailPath, MessageContent, ROUTING_HEADER};
use maildrop_store::MessageStore;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// Serve a fresh API over `store` on an OS-assigned port. Returns the bound
/// address and the ingestion sender feeding the distributor.
pub async fn start_api(store: Arc<dyn MessageStore>) -> (SocketAddr, mpsc::Sender<CapturedMessage>) {
    let _ = tracing_subscriber::fmt::try_init();

    let (ingest_tx, ingest_rx) = mpsc::channel(16);
    let api = Api::new(ApiOptions {
        store,
        ingest: ingest_rx,
    });

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind");
    let addr = listener.local_addr().expect("no local addr");

    tokio::spawn(async move {
        api.serve(listener).await.expect("server failed");
    });

    (addr, ingest_tx)
}

/// A captured message tagged with `namespace` through its routing header.
/// An empty namespace produces an untagged message.
pub fn tagged_message(namespace: &str, body: &str) -> CapturedMessage {
    let mut headers = HashMap::new();
    if !namespace.is_empty() {
        headers.insert(
            ROUTING_HEADER.to_string(),
            vec![format!(r#"{{"ms":"{namespace}"}}"#)],
        );
    }

    CapturedMessage::new(
        "test.local",
        MailPath::new("sender", "example.com"),
        vec![MailPath::new("inbox", "example.com")],
        MessageContent {
            headers,
            body: body.to_string(),
            size: body.len(),
        },
    )
}
