//! Real-time fan-out of captured mail to live subscriber feeds.
//!
//! Arrival events flow through a two-tier pipeline: a [`Distributor`]
//! replicates each event, in order, to one [`Pipeline`] per API generation;
//! each pipeline forwards into its [`Hub`], which pushes the event onto every
//! registered subscription's outbound queue. A subscription delivers events
//! that match its namespace over its feed transport and keeps the peer alive
//! with periodic pings.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod distributor;
mod error;
mod hub;
mod pipeline;
mod subscription;
mod transport;

pub use distributor::{Distributor, HANDOFF_WAIT};
pub use error::{Error, Result};
pub use hub::{Hub, HubHandle};
pub use pipeline::{Pipeline, PipelineHandle};
pub use subscription::{PING_PERIOD, PONG_WAIT, SubscriptionId, WRITE_WAIT};
pub use transport::{FeedError, FeedSink, FeedStream};
