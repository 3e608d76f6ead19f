//! Driver boundary for document stores.
//!
//! Connections are acquired per operation and closed on every path, success
//! or failure — the service layer owns that discipline, implementations only
//! have to make `close` safe to call once.

use async_trait::async_trait;
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("connect failed: {0}")]
    Connect(String),
    #[error("query failed: {0}")]
    Query(String),
}

/// One live connection to a document store.
#[async_trait]
pub trait DocumentConnection: Send + Sync {
    /// Fetch documents matching `condition`, skipping `skip` rows and
    /// returning at most `limit` (0 = unbounded).
    async fn select(
        &self,
        collection: &str,
        condition: &Value,
        skip: u64,
        limit: u64,
    ) -> Result<Vec<Value>, StoreError>;

    /// Count documents matching `condition`.
    async fn count(&self, collection: &str, condition: &Value) -> Result<u64, StoreError>;

    /// Insert documents, creating the collection on first use. Returns the
    /// number inserted.
    async fn insert(&self, collection: &str, documents: Vec<Value>) -> Result<u64, StoreError>;

    /// Merge `document`'s fields into every match. Returns the number
    /// updated.
    async fn update(
        &self,
        collection: &str,
        condition: &Value,
        document: &Value,
    ) -> Result<u64, StoreError>;

    /// Release the connection.
    async fn close(&self);
}

/// Hands out connections; never caches them across calls.
#[async_trait]
pub trait DocumentPool: Send + Sync {
    async fn acquire(&self) -> Result<Box<dyn DocumentConnection>, StoreError>;
}
