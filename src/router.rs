use crate::classifier::{
    Classification, Intent, IntentClassifier, PARAM_DOCUMENT_BODY, PARAM_DOCUMENT_TITLE,
    PARAM_LIMIT, PARAM_MIME_TYPE, PARAM_QUERY,
};
use crate::config::Config;
use crate::embeddings::EmbeddingProvider;
use crate::error::{Error, Result};
use crate::index::{EmbeddingIndex, IndexSnapshot};
use crate::indexer::Indexer;
use crate::llm::CompletionProvider;
use crate::models::{
    preview, DocumentRecord, IndexDebug, ReindexSummary, RouterResponse, SearchHit, Source,
};
use crate::store::DocumentFetcher;
use crate::timeout::{spawn_bounded, spawn_bounded_with_retry};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const NO_DOCUMENTS_ANSWER: &str = "No documents indexed. Run a reindex first.";
const DEFAULT_FILE_LIMIT: usize = 10;
const MAX_FILE_LIMIT: usize = 100;

/// Classifies requests and dispatches them to search, completion or the store
pub struct Router {
    classifier: IntentClassifier,
    store: Arc<dyn DocumentFetcher>,
    embedder: Arc<dyn EmbeddingProvider>,
    completion: Arc<dyn CompletionProvider>,
    index: Arc<EmbeddingIndex>,
    indexer: Indexer,
    top_k: usize,
    timeout: Duration,
    max_context_chars: usize,
}

impl Router {
    /// Wire a router over an empty index sized for `embedder`
    pub fn new(
        store: Arc<dyn DocumentFetcher>,
        embedder: Arc<dyn EmbeddingProvider>,
        completion: Arc<dyn CompletionProvider>,
        config: &Config,
    ) -> Result<Self> {
        let settings = &config.router;
        if settings.top_k == 0 {
            return Err(Error::Config("router.top_k must be at least 1".to_string()));
        }
        if settings.timeout_secs == 0 {
            return Err(Error::Config(
                "router.timeout_secs must be at least 1".to_string(),
            ));
        }

        let index = Arc::new(EmbeddingIndex::new(embedder.dimension()));
        let indexer = Indexer::from_config(
            store.clone(),
            embedder.clone(),
            index.clone(),
            &config.indexer,
            settings,
        )?;

        Ok(Self {
            classifier: IntentClassifier::new(completion.clone()),
            store,
            embedder,
            completion,
            index,
            indexer,
            top_k: settings.top_k,
            timeout: Duration::from_secs(settings.timeout_secs),
            max_context_chars: settings.max_context_chars,
        })
    }

    /// Override the per-call timeout for routing and indexing
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self.indexer = self.indexer.with_timeout(timeout);
        self
    }

    pub fn index(&self) -> &Arc<EmbeddingIndex> {
        &self.index
    }

    /// Rebuild the index from the store
    pub async fn reindex(&self) -> Result<ReindexSummary> {
        self.indexer.reindex().await
    }

    pub fn debug_index(&self) -> IndexDebug {
        self.index.debug()
    }

    /// Classify `text` under the router's timeout and retry policy
    pub async fn classify(&self, text: &str) -> Result<Classification> {
        let classifier = self.classifier.clone();
        let text = text.to_string();
        spawn_bounded_with_retry("classification", self.timeout, move || {
            let classifier = classifier.clone();
            let text = text.clone();
            async move { classifier.classify(&text).await }
        })
        .await
    }

    /// Rank indexed chunks against `query` without asking the model
    ///
    /// Returns the `k` best chunks with a short preview of each. An empty
    /// index yields no hits and makes no external call.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        if k == 0 {
            return Err(Error::InvalidArgument("k must be at least 1".to_string()));
        }
        let query = query.trim();
        if query.is_empty() {
            return Err(Error::InvalidArgument("search query is empty".to_string()));
        }

        let snapshot = self.index.snapshot();
        if snapshot.is_empty() {
            return Ok(Vec::new());
        }

        let query_embedding = self.embed_query(query.to_string()).await?;
        let hits = snapshot
            .search(&query_embedding, k)
            .into_iter()
            .filter_map(|(chunk_id, score)| {
                let chunk = snapshot.chunk(&chunk_id)?;
                Some(SearchHit {
                    document_id: chunk.document_id.clone(),
                    title: chunk.title.clone(),
                    preview: preview(&chunk.text),
                    chunk_id,
                    score,
                })
            })
            .collect();
        Ok(hits)
    }

    /// Fetch one document from the store, bounded but not retried
    pub async fn read(&self, document_id: &str) -> Result<DocumentRecord> {
        let document_id = document_id.trim().to_string();
        if document_id.is_empty() {
            return Err(Error::InvalidArgument("document id is empty".to_string()));
        }

        let store = self.store.clone();
        spawn_bounded("document read", self.timeout, async move {
            store.read(&document_id).await
        })
        .await
    }

    /// Answer one request
    ///
    /// Never fails: any error is reported in `RouterResponse::error`.
    pub async fn resolve(&self, text: &str) -> RouterResponse {
        let text = text.trim();
        if text.is_empty() {
            return RouterResponse::failure(
                Error::InvalidArgument("request text is empty".to_string()).to_string(),
            );
        }

        let classification = match self.classify(text).await {
            Ok(classification) => classification,
            Err(e) => {
                warn!("Classification failed: {}", e);
                return RouterResponse::failure(e.to_string());
            }
        };
        let intent = classification.intent;
        info!("Routing request as {}", intent);

        let result = match intent {
            Intent::SearchDocs => self.search_docs(text, &classification).await,
            Intent::GeneralQa | Intent::Unknown => self.general_answer(text).await,
            Intent::CreateDocument => self.create_document(&classification).await,
            Intent::ListFiles => self.list_files(&classification).await,
        };

        match result {
            Ok(response) => response.with_intent(intent.as_str()),
            Err(e) => {
                warn!("{} request failed: {}", intent, e);
                RouterResponse::failure(e.to_string()).with_intent(intent.as_str())
            }
        }
    }

    async fn search_docs(&self, text: &str, classification: &Classification) -> Result<RouterResponse> {
        // One snapshot for both ranking and chunk lookup
        let snapshot = self.index.snapshot();
        if snapshot.is_empty() {
            return Ok(RouterResponse::answer(NO_DOCUMENTS_ANSWER));
        }

        let query = classification.param(PARAM_QUERY).unwrap_or(text).to_string();
        debug!("Searching for {:?}", query);
        let query_embedding = self.embed_query(query).await?;
        let results = snapshot.search(&query_embedding, self.top_k);

        let context = self.build_context(&snapshot, &results);
        let sources = collect_sources(&snapshot, &results);
        let system = format!(
            "You are a helpful assistant. Answer the question using only the documents below. \
             If they do not contain the answer, say so.\n\nDocuments:\n{}",
            context
        );

        let answer = self.complete(text, Some(system)).await?;
        Ok(RouterResponse::answer(answer).with_sources(sources))
    }

    async fn general_answer(&self, text: &str) -> Result<RouterResponse> {
        let answer = self.complete(text, None).await?;
        Ok(RouterResponse::answer(answer))
    }

    async fn create_document(&self, classification: &Classification) -> Result<RouterResponse> {
        let title = classification
            .param(PARAM_DOCUMENT_TITLE)
            .ok_or(Error::MissingParameter(PARAM_DOCUMENT_TITLE))?
            .to_string();
        let body = classification
            .param(PARAM_DOCUMENT_BODY)
            .unwrap_or_default()
            .to_string();

        // Bounded but never retried
        let store = self.store.clone();
        let record = spawn_bounded("document creation", self.timeout, async move {
            store.create(&title, &body).await
        })
        .await?;

        debug!("Created document {} ({})", record.title, record.id);
        Ok(RouterResponse::answer(format!(
            "Created document \"{}\": {}",
            record.title, record.source_uri
        )))
    }

    async fn list_files(&self, classification: &Classification) -> Result<RouterResponse> {
        let limit = classification
            .param(PARAM_LIMIT)
            .and_then(|raw| raw.parse::<usize>().ok())
            .unwrap_or(DEFAULT_FILE_LIMIT)
            .clamp(1, MAX_FILE_LIMIT);
        let mime_type = classification.param(PARAM_MIME_TYPE).map(str::to_string);

        let store = self.store.clone();
        let files = spawn_bounded("file listing", self.timeout, async move {
            store.list_files(limit, mime_type.as_deref()).await
        })
        .await?;

        if files.is_empty() {
            return Ok(RouterResponse::answer("No files found."));
        }
        let lines: Vec<String> = files
            .iter()
            .map(|file| match file.modified_at {
                Some(modified) => format!(
                    "- {} ({}, modified {})",
                    file.name,
                    file.mime_type,
                    modified.format("%Y-%m-%d")
                ),
                None => format!("- {} ({})", file.name, file.mime_type),
            })
            .collect();
        Ok(RouterResponse::answer(format!(
            "Found {} files:\n{}",
            files.len(),
            lines.join("\n")
        )))
    }

    async fn embed_query(&self, query: String) -> Result<Vec<f32>> {
        let embedder = self.embedder.clone();
        spawn_bounded_with_retry("query embedding", self.timeout, move || {
            let embedder = embedder.clone();
            let query = query.clone();
            async move { embedder.compute_checked_embedding(&query).await }
        })
        .await
    }

    async fn complete(&self, prompt: &str, context: Option<String>) -> Result<String> {
        let completion = self.completion.clone();
        let prompt = prompt.to_string();
        spawn_bounded_with_retry("completion", self.timeout, move || {
            let completion = completion.clone();
            let prompt = prompt.clone();
            let context = context.clone();
            async move { completion.complete(&prompt, context.as_deref()).await }
        })
        .await
    }

    /// Retrieved chunk texts, best first, up to `max_context_chars`
    fn build_context(&self, snapshot: &IndexSnapshot, results: &[(String, f32)]) -> String {
        let mut context = String::new();
        let mut used = 0;
        for (chunk_id, _) in results {
            let Some(chunk) = snapshot.chunk(chunk_id) else {
                continue;
            };
            let entry = format!("{}:\n{}\n\n", chunk.title, chunk.text);
            let len = entry.chars().count();
            if used + len > self.max_context_chars {
                if context.is_empty() {
                    // Always give the model at least part of the best chunk
                    context.extend(entry.chars().take(self.max_context_chars));
                }
                break;
            }
            context.push_str(&entry);
            used += len;
        }
        context.trim_end().to_string()
    }
}

/// One source per document, in rank order, keeping the best score
fn collect_sources(snapshot: &IndexSnapshot, results: &[(String, f32)]) -> Vec<Source> {
    let mut seen = HashSet::new();
    results
        .iter()
        .filter_map(|(chunk_id, score)| snapshot.chunk(chunk_id).map(|chunk| (chunk, *score)))
        .filter(|(chunk, _)| seen.insert(chunk.document_id.clone()))
        .map(|(chunk, score)| Source {
            document_id: chunk.document_id.clone(),
            title: chunk.title.clone(),
            score,
        })
        .collect()
}
