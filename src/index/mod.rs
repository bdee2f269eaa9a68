pub mod embedding_index;
pub mod similarity;

pub use embedding_index::{EmbeddingIndex, IndexSnapshot};
pub use similarity::cosine_similarity;
