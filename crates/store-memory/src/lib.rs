//! In-memory (single process) implementation of captured-message storage for
//! local development and tests. Supports the namespace capability.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

use std::sync::Arc;

use async_trait::async_trait;
use maildrop_message::{CapturedMessage, MessageId};
use maildrop_store::{Error, MessageStore, NamespacedStore, Result};
use tokio::sync::Mutex;

/// In-memory message store, kept in capture order.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    messages: Arc<Mutex<Vec<CapturedMessage>>>,
}

impl MemoryStore {
    /// Creates a new empty `MemoryStore`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn page(messages: &[CapturedMessage], start: usize, limit: usize) -> Vec<CapturedMessage> {
    messages.iter().skip(start).take(limit).cloned().collect()
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn store(&self, message: CapturedMessage) -> Result<MessageId> {
        let id = message.id.clone();
        self.messages.lock().await.push(message);
        Ok(id)
    }

    async fn get(&self, id: &MessageId) -> Result<Option<CapturedMessage>> {
        let messages = self.messages.lock().await;
        Ok(messages.iter().find(|message| &message.id == id).cloned())
    }

    async fn list(&self, start: usize, limit: usize) -> Result<Vec<CapturedMessage>> {
        let messages = self.messages.lock().await;
        Ok(page(&messages, start, limit))
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.messages.lock().await.len())
    }

    async fn delete(&self, id: &MessageId) -> Result<()> {
        let mut messages = self.messages.lock().await;
        let before = messages.len();
        messages.retain(|message| &message.id != id);

        if messages.len() == before {
            return Err(Error::NotFound(id.clone()));
        }
        Ok(())
    }

    async fn delete_all(&self) -> Result<()> {
        self.messages.lock().await.clear();
        Ok(())
    }

    fn namespaced(&self) -> Result<&dyn NamespacedStore> {
        Ok(self)
    }
}

#[async_trait]
impl NamespacedStore for MemoryStore {
    async fn list_namespace(
        &self,
        namespace: &str,
        start: usize,
        limit: usize,
    ) -> Result<Vec<CapturedMessage>> {
        let messages = self.messages.lock().await;
        let matching: Vec<CapturedMessage> = messages
            .iter()
            .filter(|message| message.namespace() == namespace)
            .cloned()
            .collect();

        Ok(page(&matching, start, limit))
    }

    async fn count_namespace(&self, namespace: &str) -> Result<usize> {
        let messages = self.messages.lock().await;
        Ok(messages
            .iter()
            .filter(|message| message.namespace() == namespace)
            .count())
    }
}
