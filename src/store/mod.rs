use async_trait::async_trait;
use serde_json::Value;

use crate::Result;

pub mod elasticsearch;

pub use elasticsearch::ElasticsearchStore;

/// A stored document together with its identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: String,
    pub source: Value,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch one document by id. `None` when the document or the index is absent.
    async fn get(&self, index: &str, id: &str) -> Result<Option<Value>>;

    /// List up to `limit` documents of an index. A missing index lists as empty.
    async fn list(&self, index: &str, limit: usize) -> Result<Vec<StoredDocument>>;

    /// Create or replace a document.
    async fn put(&self, index: &str, id: &str, document: &Value) -> Result<()>;

    async fn index_exists(&self, index: &str) -> Result<bool>;

    /// Run a search body against one or more indices and return the raw response.
    /// Indices missing from the cluster are skipped.
    async fn search(&self, indices: &[String], body: &Value) -> Result<Value>;
}
