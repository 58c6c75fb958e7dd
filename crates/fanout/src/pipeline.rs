//! One API generation's independent copy of the fan-out path: a bounded
//! inbound queue drained into the generation's hub.

use std::sync::Arc;

use maildrop_message::CapturedMessage;
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::{Error, Result};
use crate::hub::HubHandle;

/// Inbound queue capacity per generation pipeline.
const INBOUND_CAPACITY: usize = 64;

/// Consumption side of a generation pipeline. Created at process start and
/// runs for the life of the process.
pub struct Pipeline {
    generation: &'static str,
    inbound: mpsc::Receiver<Arc<CapturedMessage>>,
    hub: HubHandle,
}

impl Pipeline {
    /// Create a pipeline feeding `hub`, labelled with its API generation.
    #[must_use]
    pub fn new(generation: &'static str, hub: HubHandle) -> (Self, PipelineHandle) {
        let (tx, rx) = mpsc::channel(INBOUND_CAPACITY);

        (
            Self {
                generation,
                inbound: rx,
                hub,
            },
            PipelineHandle {
                generation,
                inbound: tx,
            },
        )
    }

    /// Drain the inbound queue into the hub until the queue closes. Events
    /// are re-broadcast in the order they were accepted.
    pub async fn run(mut self) {
        while let Some(event) = self.inbound.recv().await {
            self.hub.broadcast(event);
        }

        debug!(generation = self.generation, "pipeline inbound queue closed");
    }
}

/// Producer side of a generation pipeline, held by the distributor.
#[derive(Clone, Debug)]
pub struct PipelineHandle {
    generation: &'static str,
    inbound: mpsc::Sender<Arc<CapturedMessage>>,
}

impl PipelineHandle {
    /// Hand one event to this pipeline, waiting until the inbound queue
    /// accepts it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PipelineClosed`] if the pipeline is no longer
    /// consuming.
    pub async fn send(&self, event: Arc<CapturedMessage>) -> Result<()> {
        self.inbound
            .send(event)
            .await
            .map_err(|_| Error::PipelineClosed)
    }

    /// The API generation this pipeline feeds.
    #[must_use]
    pub fn generation(&self) -> &'static str {
        self.generation
    }
}
