//! HTTP and websocket surface of the mail-capture platform.
//!
//! Three independently-versioned API generations are served side by side.
//! Each owns a fan-out hub and a generation pipeline; a single distributor
//! replicates every arrival event from the ingestion stream to all three, in
//! order, so every generation observes the same sequence of captures.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod error;
mod faults;
mod paging;
mod v1;
mod v2;
mod v3;
mod ws;

pub use error::{Error, Result};
pub use faults::{FaultInjector, FaultPolicy};

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use maildrop_fanout::{Distributor, Hub, HubHandle, Pipeline, PipelineHandle};
use maildrop_message::CapturedMessage;
use maildrop_store::MessageStore;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::info;

/// Options for creating a new API.
pub struct ApiOptions {
    /// Store backing the message handlers.
    pub store: Arc<dyn MessageStore>,

    /// Stream of arrival events from the ingestion collaborator.
    pub ingest: mpsc::Receiver<CapturedMessage>,
}

/// The assembled API: routers for every generation plus the background
/// fan-out tasks feeding their hubs.
pub struct Api {
    router: Router,
    shutdown_token: CancellationToken,
    task_tracker: TaskTracker,
}

impl Api {
    /// Create the API and start its fan-out tasks.
    #[must_use]
    pub fn new(ApiOptions { store, ingest }: ApiOptions) -> Self {
        let shutdown_token = CancellationToken::new();
        let task_tracker = TaskTracker::new();
        let faults = FaultInjector::new();

        let (v1_hub, v1_pipeline) = generation("v1", &task_tracker, &shutdown_token);
        let (v2_hub, v2_pipeline) = generation("v2", &task_tracker, &shutdown_token);
        let (v3_hub, v3_pipeline) = generation("v3", &task_tracker, &shutdown_token);

        let distributor = Distributor::new(ingest, vec![v1_pipeline, v2_pipeline, v3_pipeline]);
        spawn_until_cancelled(&task_tracker, &shutdown_token, distributor.run());

        let router = Router::new()
            .merge(v1::router(v1_hub, Arc::clone(&store), faults.clone()))
            .merge(v2::router(v2_hub, Arc::clone(&store), faults.clone()))
            .merge(v3::router(v3_hub, store, faults));

        Self {
            router,
            shutdown_token,
            task_tracker,
        }
    }

    /// Router serving every API generation.
    #[must_use]
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve the API on `listener` until shutdown.
    ///
    /// # Errors
    ///
    /// Returns an error if serving fails.
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let token = self.shutdown_token.clone();

        axum::serve(listener, self.router.clone())
            .with_graceful_shutdown(async move { token.cancelled().await })
            .await?;

        Ok(())
    }

    /// Stop the fan-out tasks and close all open feeds.
    pub async fn shutdown(&self) {
        info!("shutting down api");

        self.shutdown_token.cancel();
        self.task_tracker.close();
        self.task_tracker.wait().await;
    }
}

/// Build one generation's hub and pipeline and start their loops.
fn generation(
    label: &'static str,
    tracker: &TaskTracker,
    token: &CancellationToken,
) -> (HubHandle, PipelineHandle) {
    let (hub, handle) = Hub::new();
    let (pipeline, inbound) = Pipeline::new(label, handle.clone());

    spawn_until_cancelled(tracker, token, hub.run());
    spawn_until_cancelled(tracker, token, pipeline.run());

    (handle, inbound)
}

fn spawn_until_cancelled<F>(tracker: &TaskTracker, token: &CancellationToken, future: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    let token = token.clone();

    tracker.spawn(async move {
        tokio::select! {
            () = token.cancelled() => {}
            () = future => {}
        }
    });
}
