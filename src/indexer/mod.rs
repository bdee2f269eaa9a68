pub mod chunker;
pub mod reindex;

pub use chunker::ChunkingPolicy;
pub use reindex::Indexer;
