use crate::error::{Error, Result};
use crate::models::{DocumentRecord, FileSummary};
use crate::store::DocumentFetcher;
use chrono::Utc;
use std::path::Path;
use tokio::sync::RwLock;

const PLAIN_TEXT_MIME: &str = "text/plain";

/// Process-local document store, seeded from memory or a JSON file
#[derive(Default)]
pub struct InMemoryDocumentStore {
    documents: RwLock<Vec<DocumentRecord>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_documents(documents: Vec<DocumentRecord>) -> Self {
        Self {
            documents: RwLock::new(documents),
        }
    }

    /// Load a JSON array of documents
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::Fetch(format!("Failed to read {}: {}", path.as_ref().display(), e))
        })?;
        let documents: Vec<DocumentRecord> = serde_json::from_str(&raw)?;
        Ok(Self::with_documents(documents))
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl DocumentFetcher for InMemoryDocumentStore {
    async fn list_all(&self) -> Result<Vec<DocumentRecord>> {
        Ok(self.documents.read().await.clone())
    }

    async fn read(&self, document_id: &str) -> Result<DocumentRecord> {
        self.documents
            .read()
            .await
            .iter()
            .find(|d| d.id == document_id)
            .cloned()
            .ok_or_else(|| Error::Fetch(format!("Document {} not found", document_id)))
    }

    async fn create(&self, title: &str, body: &str) -> Result<DocumentRecord> {
        if title.trim().is_empty() {
            return Err(Error::Write("Document title must not be empty".to_string()));
        }

        let mut documents = self.documents.write().await;
        let id = format!("mem-{}", documents.len() + 1);
        let record = DocumentRecord {
            source_uri: format!("memory://{}", id),
            id,
            title: title.to_string(),
            content: body.to_string(),
            updated_at: Utc::now(),
        };
        documents.push(record.clone());
        Ok(record)
    }

    async fn list_files(&self, limit: usize, mime_type: Option<&str>) -> Result<Vec<FileSummary>> {
        if mime_type.is_some_and(|mime| mime != PLAIN_TEXT_MIME) {
            return Ok(Vec::new());
        }
        Ok(self
            .documents
            .read()
            .await
            .iter()
            .take(limit)
            .map(|d| FileSummary {
                id: d.id.clone(),
                name: d.title.clone(),
                mime_type: PLAIN_TEXT_MIME.to_string(),
                modified_at: Some(d.updated_at),
            })
            .collect())
    }
}
