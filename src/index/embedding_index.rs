use crate::error::{Error, Result};
use crate::index::similarity::{cosine_similarity_with_norms, l2_norm};
use crate::models::{IndexDebug, IndexStats, IndexedChunk};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::info;

/// One immutable generation of the index
#[derive(Debug, Default)]
pub struct IndexSnapshot {
    chunks: Vec<IndexedChunk>,
    norms: Vec<f32>,
    positions: HashMap<String, usize>,
    by_document: BTreeMap<String, Vec<String>>,
}

impl IndexSnapshot {
    fn build(chunks: Vec<IndexedChunk>, dimension: usize) -> Result<Self> {
        let mut positions = HashMap::with_capacity(chunks.len());
        let mut by_document: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut norms = Vec::with_capacity(chunks.len());

        for (position, chunk) in chunks.iter().enumerate() {
            if chunk.embedding.len() != dimension {
                return Err(Error::IndexBuild(format!(
                    "chunk {} has dimension {}, expected {}",
                    chunk.chunk_id,
                    chunk.embedding.len(),
                    dimension
                )));
            }
            if chunk.embedding.iter().any(|v| !v.is_finite()) {
                return Err(Error::IndexBuild(format!(
                    "chunk {} has a non-finite embedding component",
                    chunk.chunk_id
                )));
            }
            if positions.insert(chunk.chunk_id.clone(), position).is_some() {
                return Err(Error::IndexBuild(format!(
                    "duplicate chunk id {}",
                    chunk.chunk_id
                )));
            }
            by_document
                .entry(chunk.document_id.clone())
                .or_default()
                .push(chunk.chunk_id.clone());
            norms.push(l2_norm(&chunk.embedding));
        }

        Ok(Self {
            chunks,
            norms,
            positions,
            by_document,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Top `k` chunks by cosine similarity, ties broken by ascending chunk id
    pub fn search(&self, query: &[f32], k: usize) -> Vec<(String, f32)> {
        let query_norm = l2_norm(query);
        let mut scored: Vec<(&str, f32)> = self
            .chunks
            .iter()
            .zip(self.norms.iter())
            .map(|(chunk, &norm)| {
                let score = cosine_similarity_with_norms(query, &chunk.embedding, query_norm, norm);
                (chunk.chunk_id.as_str(), score)
            })
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        scored.truncate(k);

        scored
            .into_iter()
            .map(|(id, score)| (id.to_string(), score))
            .collect()
    }

    pub fn chunk(&self, chunk_id: &str) -> Option<&IndexedChunk> {
        self.positions.get(chunk_id).map(|&i| &self.chunks[i])
    }

    /// Chunk ids belonging to a document, in chunk order
    pub fn chunk_ids_for(&self, document_id: &str) -> &[String] {
        self.by_document
            .get(document_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            document_count: self.by_document.len(),
            chunk_count: self.chunks.len(),
        }
    }

    pub fn debug(&self) -> IndexDebug {
        IndexDebug {
            document_count: self.by_document.len(),
            chunk_count: self.chunks.len(),
            per_document_chunk_counts: self
                .by_document
                .iter()
                .map(|(id, chunks)| (id.clone(), chunks.len()))
                .collect(),
        }
    }
}

/// In-memory vector index with whole-snapshot replacement
///
/// Readers clone the active `Arc` and search it without holding any lock;
/// `rebuild` builds the next snapshot off to the side and publishes it with a
/// single pointer swap, so a reader sees either the old or the new generation.
pub struct EmbeddingIndex {
    dimension: usize,
    active: RwLock<Arc<IndexSnapshot>>,
}

impl EmbeddingIndex {
    /// Create an empty index accepting embeddings of exactly `dimension` floats
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            active: RwLock::new(Arc::new(IndexSnapshot::default())),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Current snapshot, stable for as long as the caller holds it
    pub fn snapshot(&self) -> Arc<IndexSnapshot> {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the whole index; on error the previous snapshot stays active
    pub fn rebuild(&self, chunks: Vec<IndexedChunk>) -> Result<()> {
        let next = Arc::new(IndexSnapshot::build(chunks, self.dimension)?);
        let stats = next.stats();

        let previous = {
            let mut active = self.active.write().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *active, next)
        };
        // The old generation is freed outside the lock once its last reader is done
        drop(previous);

        info!(
            "Index rebuilt: {} documents, {} chunks",
            stats.document_count, stats.chunk_count
        );
        Ok(())
    }

    /// Search the current snapshot
    pub fn search(&self, query_embedding: &[f32], k: usize) -> Result<Vec<(String, f32)>> {
        if k == 0 {
            return Err(Error::InvalidArgument("k must be at least 1".to_string()));
        }

        let snapshot = self.snapshot();
        if snapshot.is_empty() {
            return Ok(Vec::new());
        }
        if query_embedding.len() != self.dimension {
            return Err(Error::DimensionMismatch {
                got: query_embedding.len(),
                expected: self.dimension,
            });
        }
        if query_embedding.iter().any(|v| !v.is_finite()) {
            return Err(Error::InvalidArgument(
                "query embedding has a non-finite component".to_string(),
            ));
        }

        Ok(snapshot.search(query_embedding, k))
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    pub fn describe(&self) -> IndexStats {
        self.snapshot().stats()
    }

    pub fn debug(&self) -> IndexDebug {
        self.snapshot().debug()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chunk_id;

    fn chunk(document_id: &str, ordinal: usize, embedding: Vec<f32>) -> IndexedChunk {
        IndexedChunk {
            document_id: document_id.to_string(),
            chunk_id: chunk_id(document_id, ordinal),
            title: format!("Title {}", document_id),
            text: format!("text {} {}", document_id, ordinal),
            embedding,
        }
    }

    #[test]
    fn test_rebuild_then_describe_counts_chunks() {
        let index = EmbeddingIndex::new(3);
        let chunks = vec![
            chunk("a", 0, vec![1.0, 0.0, 0.0]),
            chunk("a", 1, vec![0.0, 1.0, 0.0]),
            chunk("b", 0, vec![0.0, 0.0, 1.0]),
        ];
        index.rebuild(chunks).unwrap();

        let stats = index.describe();
        assert_eq!(stats.chunk_count, 3);
        assert_eq!(stats.document_count, 2);
    }

    #[test]
    fn test_rebuild_rejects_wrong_dimension_and_keeps_previous() {
        let index = EmbeddingIndex::new(3);
        index.rebuild(vec![chunk("a", 0, vec![1.0, 0.0, 0.0])]).unwrap();

        let result = index.rebuild(vec![
            chunk("b", 0, vec![1.0, 0.0, 0.0]),
            chunk("b", 1, vec![1.0, 0.0]),
        ]);
        assert!(matches!(result, Err(Error::IndexBuild(_))));

        let debug = index.debug();
        assert_eq!(debug.chunk_count, 1);
        assert!(debug.per_document_chunk_counts.contains_key("a"));
    }

    #[test]
    fn test_rebuild_rejects_duplicate_chunk_ids() {
        let index = EmbeddingIndex::new(2);
        let result = index.rebuild(vec![
            chunk("a", 0, vec![1.0, 0.0]),
            chunk("a", 0, vec![0.0, 1.0]),
        ]);
        assert!(matches!(result, Err(Error::IndexBuild(_))));
        assert!(index.is_empty());
    }

    #[test]
    fn test_rebuild_rejects_non_finite_embeddings_and_keeps_previous() {
        let index = EmbeddingIndex::new(2);
        index.rebuild(vec![chunk("good", 0, vec![1.0, 0.0])]).unwrap();

        let result = index.rebuild(vec![
            chunk("good", 0, vec![1.0, 0.0]),
            chunk("bad", 0, vec![f32::NAN, 0.0]),
        ]);
        assert!(matches!(result, Err(Error::IndexBuild(_))));

        let results = index.search(&[1.0, 0.0], 2).unwrap();
        assert_eq!(results, vec![("good:0000".to_string(), 1.0)]);
        assert!(results.iter().all(|(_, score)| (-1.0..=1.0).contains(score)));
    }

    #[test]
    fn test_search_rejects_non_finite_query() {
        let index = EmbeddingIndex::new(2);
        index.rebuild(vec![chunk("a", 0, vec![1.0, 0.0])]).unwrap();
        let result = index.search(&[f32::INFINITY, 0.0], 1);
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_search_empty_index_returns_nothing() {
        let index = EmbeddingIndex::new(3);
        let results = index.search(&[1.0, 0.0, 0.0], 5).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_search_rejects_zero_k() {
        let index = EmbeddingIndex::new(3);
        assert!(matches!(
            index.search(&[1.0, 0.0, 0.0], 0),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_search_rejects_wrong_query_dimension() {
        let index = EmbeddingIndex::new(3);
        index.rebuild(vec![chunk("a", 0, vec![1.0, 0.0, 0.0])]).unwrap();
        assert!(matches!(
            index.search(&[1.0, 0.0], 1),
            Err(Error::DimensionMismatch { got: 2, expected: 3 })
        ));
    }

    #[test]
    fn test_search_orders_by_score_and_truncates() {
        let index = EmbeddingIndex::new(2);
        index
            .rebuild(vec![
                chunk("far", 0, vec![0.0, 1.0]),
                chunk("near", 0, vec![1.0, 0.1]),
                chunk("mid", 0, vec![1.0, 1.0]),
                chunk("opposite", 0, vec![-1.0, 0.0]),
            ])
            .unwrap();

        let results = index.search(&[1.0, 0.0], 3).unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].0, "near:0000");
        assert_eq!(results[1].0, "mid:0000");
        assert_eq!(results[2].0, "far:0000");
        for pair in results.windows(2) {
            assert!(pair[0].1 >= pair[1].1);
        }
        for (_, score) in &results {
            assert!((-1.0..=1.0).contains(score));
        }
    }

    #[test]
    fn test_search_breaks_ties_by_chunk_id() {
        let index = EmbeddingIndex::new(2);
        index
            .rebuild(vec![
                chunk("c", 0, vec![1.0, 0.0]),
                chunk("a", 0, vec![2.0, 0.0]),
                chunk("b", 0, vec![3.0, 0.0]),
            ])
            .unwrap();

        let ids: Vec<String> = index
            .search(&[1.0, 0.0], 3)
            .unwrap()
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        assert_eq!(ids, vec!["a:0000", "b:0000", "c:0000"]);
    }

    #[test]
    fn test_zero_norm_chunk_scores_zero() {
        let index = EmbeddingIndex::new(2);
        index
            .rebuild(vec![chunk("zero", 0, vec![0.0, 0.0]), chunk("one", 0, vec![1.0, 0.0])])
            .unwrap();

        let results = index.search(&[1.0, 0.0], 2).unwrap();
        assert_eq!(results[0].0, "one:0000");
        assert_eq!(results[1], ("zero:0000".to_string(), 0.0));
    }

    #[test]
    fn test_snapshot_survives_rebuild() {
        let index = EmbeddingIndex::new(2);
        index.rebuild(vec![chunk("old", 0, vec![1.0, 0.0])]).unwrap();

        let held = index.snapshot();
        index.rebuild(vec![chunk("new", 0, vec![1.0, 0.0])]).unwrap();

        assert!(held.chunk("old:0000").is_some());
        assert!(held.chunk("new:0000").is_none());
        assert!(index.snapshot().chunk("new:0000").is_some());
    }

    #[test]
    fn test_debug_lists_chunks_per_document() {
        let index = EmbeddingIndex::new(1);
        index
            .rebuild(vec![chunk("a", 0, vec![1.0]), chunk("a", 1, vec![1.0]), chunk("b", 0, vec![1.0])])
            .unwrap();

        let debug = index.debug();
        assert_eq!(debug.per_document_chunk_counts.get("a"), Some(&2));
        assert_eq!(debug.per_document_chunk_counts.get("b"), Some(&1));
        assert_eq!(
            index.snapshot().chunk_ids_for("a"),
            &["a:0000".to_string(), "a:0001".to_string()]
        );
        assert!(index.snapshot().chunk_ids_for("missing").is_empty());
    }
}
