pub mod classifier;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod index;
pub mod indexer;
pub mod llm;
pub mod models;
pub mod router;
pub mod store;
pub(crate) mod timeout;

#[cfg(test)]
mod testing;

pub use classifier::{Classification, Intent, IntentClassifier};
pub use embeddings::EmbeddingProvider;
pub use error::{Error, Result};
pub use index::EmbeddingIndex;
pub use indexer::Indexer;
pub use llm::CompletionProvider;
pub use models::{
    DocumentRecord, IndexedChunk, ReindexSummary, RouterResponse, SearchHit, Source,
};
pub use router::Router;
pub use store::DocumentFetcher;
