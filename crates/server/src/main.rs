//! Server binary: serves the versioned capture APIs over an in-memory store.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use maildrop_api::{Api, ApiOptions};
use maildrop_store_memory::MemoryStore;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::info;

/// Server-specific error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// API error
    #[error(transparent)]
    Api(#[from] maildrop_api::Error),

    /// Listener setup error
    #[error("failed to bind api listener: {0}")]
    Bind(std::io::Error),
}

#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// Address the HTTP and websocket APIs listen on
    #[arg(
        long,
        default_value = "127.0.0.1:8025",
        env = "MAILDROP_API_BIND_ADDR"
    )]
    api_bind_addr: SocketAddr,

    /// Capacity of the ingestion channel feeding the distributor
    #[arg(long, default_value_t = 64, env = "MAILDROP_INGEST_CAPACITY")]
    ingest_capacity: usize,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    // The sender side belongs to whatever produces captures. The binary
    // holds it for the process lifetime so the distributor stays up.
    let (_ingest_tx, ingest_rx) = mpsc::channel(args.ingest_capacity);

    let api = Api::new(ApiOptions {
        store: Arc::new(MemoryStore::new()),
        ingest: ingest_rx,
    });

    let listener = TcpListener::bind(args.api_bind_addr)
        .await
        .map_err(Error::Bind)?;
    info!(addr = %args.api_bind_addr, "serving capture apis");

    tokio::select! {
        result = api.serve(listener) => result?,
        _ = shutdown_signal() => {}
    }

    api.shutdown().await;

    Ok(())
}

async fn shutdown_signal() {
    if cfg!(unix) {
        use tokio::signal::unix::{SignalKind, signal};

        match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => info!("received SIGTERM"),
                    _ = sigint.recv() => info!("received SIGINT"),
                }
            }
            _ => {
                let _ = tokio::signal::ctrl_c().await;
                info!("received interrupt signal");
            }
        }
    } else {
        let _ = tokio::signal::ctrl_c().await;
        info!("received interrupt signal");
    }
}
