use thiserror::Error;

/// The result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// A pipeline's inbound queue is closed.
    #[error("pipeline is no longer running")]
    PipelineClosed,
}
