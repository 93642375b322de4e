use tracing::info;

use crate::embed_chunks::{embed_texts, Embedder};
use crate::error::{RagError, Result};

/// A query hit: the chunk position and its squared Euclidean distance.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Neighbor {
    pub position: usize,
    pub distance: f32,
}

/// Exact nearest-neighbor index over the corpus chunks.
///
/// Chunk `i` and vector `i` always describe the same text; both live in this
/// struct and are never reordered after construction.
#[derive(Debug)]
pub struct EmbeddingIndex {
    chunks: Vec<String>,
    vectors: Vec<Vec<f32>>,
    dims: usize,
}

impl EmbeddingIndex {
    /// Encodes every chunk and builds the index.
    pub fn build(embedder: &dyn Embedder, chunks: Vec<String>, batch_size: usize) -> Result<Self> {
        if chunks.is_empty() {
            return Err(RagError::Data("cannot build an index over zero chunks".to_string()));
        }
        let vectors = embed_texts(embedder, &chunks, batch_size)?;
        let index = Self::from_parts(chunks, vectors)?;
        info!(
            chunks = index.len(),
            dims = index.dims,
            "loaded text chunks and built embedding index"
        );
        Ok(index)
    }

    /// Builds the index from vectors that were already computed for `chunks`.
    pub fn from_parts(chunks: Vec<String>, vectors: Vec<Vec<f32>>) -> Result<Self> {
        if chunks.is_empty() {
            return Err(RagError::Data("cannot build an index over zero chunks".to_string()));
        }
        if vectors.len() != chunks.len() {
            return Err(RagError::Model(format!(
                "got {} embeddings for {} chunks",
                vectors.len(),
                chunks.len()
            )));
        }
        let dims = vectors[0].len();
        if dims == 0 {
            return Err(RagError::Model("embedding model returned empty vectors".to_string()));
        }
        if let Some((position, v)) = vectors.iter().enumerate().find(|(_, v)| v.len() != dims) {
            return Err(RagError::Model(format!(
                "chunk {} has dimension {}, expected {}",
                position,
                v.len(),
                dims
            )));
        }
        Ok(Self {
            chunks,
            vectors,
            dims,
        })
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn chunk(&self, position: usize) -> Option<&str> {
        self.chunks.get(position).map(String::as_str)
    }

    pub fn chunks(&self) -> &[String] {
        &self.chunks
    }

    /// Returns the `k` closest chunks by ascending squared Euclidean distance.
    ///
    /// `k` is clamped to the corpus size. Equal distances are ordered by
    /// position so repeated queries give identical results.
    pub fn query(&self, vector: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if vector.len() != self.dims {
            return Err(RagError::Configuration(format!(
                "query vector has dimension {} but the index was built with {}; \
                 the same embedding model must be used for indexing and questions",
                vector.len(),
                self.dims
            )));
        }
        let mut neighbors: Vec<Neighbor> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(position, v)| Neighbor {
                position,
                distance: squared_l2(vector, v),
            })
            .collect();
        neighbors.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then(a.position.cmp(&b.position))
        });
        neighbors.truncate(k.min(self.len()));
        Ok(neighbors)
    }
}

pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn index() -> EmbeddingIndex {
        EmbeddingIndex::from_parts(
            vec!["a".into(), "b".into(), "c".into(), "d".into()],
            vec![
                vec![0.0, 0.0],
                vec![1.0, 0.0],
                vec![0.0, 1.0],
                vec![3.0, 3.0],
            ],
        )
        .unwrap()
    }

    #[test]
    fn orders_by_distance_then_position() {
        let hits = index().query(&[0.0, 0.0], 4).unwrap();
        let positions: Vec<usize> = hits.iter().map(|n| n.position).collect();
        // b and c are both at distance 1.0; the lower position wins.
        assert_eq!(positions, vec![0, 1, 2, 3]);
        assert_eq!(hits[0].distance, 0.0);
        assert_eq!(hits[1].distance, 1.0);
        assert_eq!(hits[3].distance, 18.0);
    }

    #[test]
    fn clamps_k_to_corpus_size() {
        let hits = index().query(&[1.0, 1.0], 50).unwrap();
        assert_eq!(hits.len(), 4);
        let unique: HashSet<usize> = hits.iter().map(|n| n.position).collect();
        assert_eq!(unique.len(), 4);
        assert!(hits.iter().all(|n| n.position < 4));
    }

    #[test]
    fn zero_k_is_empty() {
        assert!(index().query(&[1.0, 1.0], 0).unwrap().is_empty());
    }

    #[test]
    fn repeated_queries_are_identical() {
        let idx = index();
        let first = idx.query(&[0.4, 0.6], 3).unwrap();
        let second = idx.query(&[0.4, 0.6], 3).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn dimension_mismatch_on_query_is_a_configuration_error() {
        assert!(matches!(
            index().query(&[0.0, 0.0, 0.0], 1),
            Err(RagError::Configuration(_))
        ));
    }

    #[test]
    fn rejects_inconsistent_dimensions() {
        let err = EmbeddingIndex::from_parts(
            vec!["a".into(), "b".into()],
            vec![vec![1.0, 2.0], vec![1.0]],
        )
        .unwrap_err();
        assert!(matches!(err, RagError::Model(_)));
    }

    #[test]
    fn rejects_empty_corpus() {
        assert!(matches!(
            EmbeddingIndex::from_parts(vec![], vec![]),
            Err(RagError::Data(_))
        ));
    }
}
