use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A document as held by the remote document store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentRecord {
    /// Store identifier, stable across reindex
    pub id: String,
    pub title: String,
    /// Plain-text body
    pub content: String,
    pub updated_at: DateTime<Utc>,
    /// Link back to the document in the store
    pub source_uri: String,
}

impl DocumentRecord {
    /// Create a new DocumentRecord instance
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
        updated_at: DateTime<Utc>,
        source_uri: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            content: content.into(),
            updated_at,
            source_uri: source_uri.into(),
        }
    }
}

/// A bounded span of a document's text together with its embedding
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexedChunk {
    pub document_id: String,
    /// `{document_id}:{ordinal:04}`
    pub chunk_id: String,
    /// Title of the owning document
    pub title: String,
    pub text: String,
    pub embedding: Vec<f32>,
}

/// Build the chunk id for the `ordinal`-th window of a document
pub fn chunk_id(document_id: &str, ordinal: usize) -> String {
    format!("{}:{:04}", document_id, ordinal)
}

/// Lightweight listing entry returned by the store's file listing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileSummary {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    pub modified_at: Option<DateTime<Utc>>,
}

/// Provenance for one retrieved document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Source {
    pub document_id: String,
    pub title: String,
    pub score: f32,
}

/// Characters of chunk text kept in a search preview
pub const PREVIEW_CHARS: usize = 200;

/// One ranked chunk returned by a direct document search
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchHit {
    pub chunk_id: String,
    pub document_id: String,
    pub title: String,
    pub score: f32,
    /// Leading text of the chunk, ellipsized when cut
    pub preview: String,
}

/// Cut `text` to `PREVIEW_CHARS` characters, appending "..." when anything was dropped
pub fn preview(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

/// Final answer handed to the serving layer
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RouterResponse {
    pub answer: String,
    pub sources: Vec<Source>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Intent the router acted on, if classification got that far
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
}

impl RouterResponse {
    pub fn answer(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            ..Self::default()
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn with_sources(mut self, sources: Vec<Source>) -> Self {
        self.sources = sources;
        self
    }

    pub fn with_intent(mut self, intent: impl Into<String>) -> Self {
        self.intent = Some(intent.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Chunk that could not be embedded during a reindex
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkFailure {
    pub chunk_id: String,
    pub reason: String,
}

/// Outcome of a full reindex
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReindexSummary {
    pub document_count: usize,
    pub chunk_count: usize,
    pub skipped_chunks: usize,
    pub failures: Vec<ChunkFailure>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexStats {
    pub document_count: usize,
    pub chunk_count: usize,
}

/// Index introspection with a per-document breakdown
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexDebug {
    pub document_count: usize,
    pub chunk_count: usize,
    pub per_document_chunk_counts: BTreeMap<String, usize>,
}
