//! Replicates each arrival event across every API generation.
//!
//! Handoffs are ordered and synchronous: pipeline k+1 is not offered an
//! event until pipeline k has accepted it, so every generation observes the
//! same global order. The cost is isolation — the slowest pipeline bounds
//! overall throughput. Each handoff is bounded by [`HANDOFF_WAIT`]; a
//! timed-out or rejected handoff aborts the remainder of that distribution
//! step (the event is dropped for the pipelines after the stalled one,
//! never reordered).

use std::sync::Arc;
use std::time::Duration;

use maildrop_message::CapturedMessage;
use tokio::sync::mpsc;
use tokio::time;
use tracing::{error, info, warn};

use crate::pipeline::PipelineHandle;

/// Longest the distributor waits for one pipeline to accept an event.
pub const HANDOFF_WAIT: Duration = Duration::from_secs(30);

/// Single consumer of the ingestion stream; forwards a copy of every arrival
/// event to each generation pipeline.
pub struct Distributor {
    inbound: mpsc::Receiver<CapturedMessage>,
    pipelines: Vec<PipelineHandle>,
}

impl Distributor {
    /// Create a distributor fed by `inbound`, fanning out to `pipelines` in
    /// the order given.
    #[must_use]
    pub fn new(inbound: mpsc::Receiver<CapturedMessage>, pipelines: Vec<PipelineHandle>) -> Self {
        Self { inbound, pipelines }
    }

    /// Consume arrival events until the ingestion stream closes.
    pub async fn run(mut self) {
        while let Some(message) = self.inbound.recv().await {
            self.distribute(Arc::new(message)).await;
        }

        info!("ingestion stream closed, distributor stopping");
    }

    async fn distribute(&self, event: Arc<CapturedMessage>) {
        for pipeline in &self.pipelines {
            match time::timeout(HANDOFF_WAIT, pipeline.send(Arc::clone(&event))).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    warn!(
                        generation = pipeline.generation(),
                        %err,
                        "pipeline rejected handoff, aborting distribution step"
                    );
                    return;
                }
                Err(_) => {
                    error!(
                        generation = pipeline.generation(),
                        "pipeline stalled past the handoff deadline, \
                         aborting distribution step"
                    );
                    return;
                }
            }
        }
    }
}
