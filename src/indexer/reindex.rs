use crate::config::{IndexerConfig, RouterConfig};
use crate::embeddings::EmbeddingProvider;
use crate::error::{Error, Result};
use crate::index::EmbeddingIndex;
use crate::indexer::ChunkingPolicy;
use crate::models::{chunk_id, ChunkFailure, DocumentRecord, IndexedChunk, ReindexSummary};
use crate::store::DocumentFetcher;
use crate::timeout::spawn_bounded;
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// A chunk waiting for its embedding
#[derive(Debug, Clone)]
struct ChunkDraft {
    document_id: String,
    chunk_id: String,
    title: String,
    text: String,
}

impl ChunkDraft {
    /// Text sent to the embedder: the document title followed by the window
    fn embedding_input(&self) -> String {
        if self.title.is_empty() || self.title == self.text {
            self.text.clone()
        } else {
            format!("{}\n{}", self.title, self.text)
        }
    }
}

/// Drives full index reconstruction: fetch, chunk, embed, publish
pub struct Indexer {
    fetcher: Arc<dyn DocumentFetcher>,
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<EmbeddingIndex>,
    policy: ChunkingPolicy,
    concurrency: usize,
    timeout: Duration,
    running: Mutex<()>,
}

impl Indexer {
    pub fn new(
        fetcher: Arc<dyn DocumentFetcher>,
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<EmbeddingIndex>,
        policy: ChunkingPolicy,
    ) -> Self {
        Self {
            fetcher,
            embedder,
            index,
            policy,
            concurrency: 4,
            timeout: Duration::from_secs(30),
            running: Mutex::new(()),
        }
    }

    /// Build an indexer from the `[indexer]` and `[router]` settings
    pub fn from_config(
        fetcher: Arc<dyn DocumentFetcher>,
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<EmbeddingIndex>,
        indexer: &IndexerConfig,
        router: &RouterConfig,
    ) -> Result<Self> {
        let policy = ChunkingPolicy::new(indexer.chunk_size, indexer.chunk_overlap)?;
        Ok(Self::new(fetcher, embedder, index, policy)
            .with_concurrency(indexer.concurrency)
            .with_timeout(Duration::from_secs(router.timeout_secs)))
    }

    /// Maximum number of embedding requests in flight
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Upper bound for each external call
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn index(&self) -> &Arc<EmbeddingIndex> {
        &self.index
    }

    /// Rebuild the index from every document in the store
    ///
    /// A failed listing aborts and leaves the current index in place. Chunks
    /// whose embedding fails are skipped and reported in the summary. Only one
    /// reindex runs at a time; a concurrent call gets `ReindexInProgress`.
    pub async fn reindex(&self) -> Result<ReindexSummary> {
        let _guard = self.running.try_lock().map_err(|_| Error::ReindexInProgress)?;

        let fetcher = self.fetcher.clone();
        let documents = spawn_bounded("document listing", self.timeout, async move {
            fetcher.list_all().await
        })
        .await?;
        info!("Reindexing {} documents", documents.len());

        let drafts: Vec<ChunkDraft> = documents
            .iter()
            .flat_map(|doc| self.chunk_document(doc))
            .collect();

        let embedded: Vec<(ChunkDraft, Result<Vec<f32>>)> = stream::iter(drafts)
            .map(|draft| {
                let embedder = self.embedder.clone();
                let input = draft.embedding_input();
                let timeout = self.timeout;
                async move {
                    let result = spawn_bounded("embedding", timeout, async move {
                        embedder.compute_checked_embedding(&input).await
                    })
                    .await;
                    (draft, result)
                }
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut summary = ReindexSummary::default();
        let mut chunks = Vec::with_capacity(embedded.len());
        for (draft, result) in embedded {
            match result {
                Ok(embedding) => chunks.push(IndexedChunk {
                    document_id: draft.document_id,
                    chunk_id: draft.chunk_id,
                    title: draft.title,
                    text: draft.text,
                    embedding,
                }),
                Err(e) => {
                    warn!("Skipping chunk {}: {}", draft.chunk_id, e);
                    summary.failures.push(ChunkFailure {
                        chunk_id: draft.chunk_id,
                        reason: e.to_string(),
                    });
                }
            }
        }

        summary.skipped_chunks = summary.failures.len();
        summary.chunk_count = chunks.len();
        summary.document_count = chunks
            .iter()
            .map(|c| c.document_id.as_str())
            .collect::<HashSet<_>>()
            .len();
        self.index.rebuild(chunks)?;

        info!(
            "Reindex complete: {} documents, {} chunks, {} skipped",
            summary.document_count, summary.chunk_count, summary.skipped_chunks
        );
        Ok(summary)
    }

    fn chunk_document(&self, doc: &DocumentRecord) -> Vec<ChunkDraft> {
        let mut windows = self.policy.split(&doc.content);
        if windows.is_empty() {
            // Title-only documents are still searchable by name
            let fallback = if doc.title.trim().is_empty() {
                doc.id.clone()
            } else {
                doc.title.trim().to_string()
            };
            windows.push(fallback);
        }

        windows
            .into_iter()
            .enumerate()
            .map(|(ordinal, text)| ChunkDraft {
                document_id: doc.id.clone(),
                chunk_id: chunk_id(&doc.id, ordinal),
                title: doc.title.clone(),
                text,
            })
            .collect()
    }
}
