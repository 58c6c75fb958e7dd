//! Abstract interface for captured-message storage.
//!
//! Namespace-scoped queries are an optional capability: backends that can
//! filter by namespace expose it through [`MessageStore::namespaced`], and
//! callers branch on the returned `Result` rather than probing the concrete
//! type.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

use async_trait::async_trait;
use maildrop_message::{CapturedMessage, MessageId};
use thiserror::Error;

/// The result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when talking to a message store.
#[derive(Debug, Error)]
pub enum Error {
    /// Store backend failure.
    #[error("storage backend error: {0}")]
    Backend(String),

    /// This store cannot answer namespace-scoped queries.
    #[error("store does not support namespace-scoped queries")]
    NamespaceUnsupported,

    /// No message with the given identifier.
    #[error("message not found: {0}")]
    NotFound(MessageId),
}

/// A store of captured messages.
#[async_trait]
pub trait MessageStore: Send + Sync + 'static {
    /// Persist one captured message, returning its identifier.
    async fn store(&self, message: CapturedMessage) -> Result<MessageId>;

    /// Fetch one message by identifier.
    async fn get(&self, id: &MessageId) -> Result<Option<CapturedMessage>>;

    /// List messages in capture order, starting at offset `start`, at most
    /// `limit` of them.
    async fn list(&self, start: usize, limit: usize) -> Result<Vec<CapturedMessage>>;

    /// Total number of stored messages.
    async fn count(&self) -> Result<usize>;

    /// Delete one message by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no such message exists.
    async fn delete(&self, id: &MessageId) -> Result<()>;

    /// Delete every stored message.
    async fn delete_all(&self) -> Result<()>;

    /// Adapt this store to its namespace-scoped view.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NamespaceUnsupported`] if the backend cannot filter
    /// by namespace.
    fn namespaced(&self) -> Result<&dyn NamespacedStore> {
        Err(Error::NamespaceUnsupported)
    }
}

/// Namespace-scoped queries over a message store.
#[async_trait]
pub trait NamespacedStore: Send + Sync {
    /// List messages belonging to `namespace`, in capture order, starting at
    /// offset `start`, at most `limit` of them.
    async fn list_namespace(
        &self,
        namespace: &str,
        start: usize,
        limit: usize,
    ) -> Result<Vec<CapturedMessage>>;

    /// Number of stored messages belonging to `namespace`.
    async fn count_namespace(&self, namespace: &str) -> Result<usize>;
}
