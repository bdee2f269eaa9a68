use crate::error::Result;
use crate::models::{DocumentRecord, FileSummary};

/// Trait for remote document stores the router reads from and writes to
#[async_trait::async_trait]
pub trait DocumentFetcher: Send + Sync {
    /// List every indexable document with its content
    async fn list_all(&self) -> Result<Vec<DocumentRecord>>;

    /// Fetch one document with its content
    async fn read(&self, document_id: &str) -> Result<DocumentRecord>;

    /// Create a new document
    async fn create(&self, title: &str, body: &str) -> Result<DocumentRecord>;

    /// List up to `limit` files without fetching their content, optionally
    /// only those of one MIME type
    async fn list_files(&self, limit: usize, mime_type: Option<&str>) -> Result<Vec<FileSummary>>;
}
