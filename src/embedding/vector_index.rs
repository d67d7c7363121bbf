/// HNSW vector index for similarity search
use hnsw_rs::prelude::*;
use std::sync::RwLock;
use thiserror::Error;

/// Maximum number of HNSW layers
const MAX_LAYERS: usize = 16;

/// Starting capacity when the final size is not known up front
const DEFAULT_CAPACITY: usize = 10_000;

#[derive(Error, Debug)]
pub enum VectorIndexError {
    #[error("Insert failed: {0}")]
    InsertError(String),

    #[error("Search failed: {0}")]
    SearchError(String),

    #[error("Invalid dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },
}

/// Search result with ID and similarity score
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// Passage id in the store
    pub id: u64,
    /// Cosine similarity (higher is more similar)
    pub score: f32,
}

/// HNSW vector index wrapper
///
/// The index lives in memory and is rebuilt from the embeddings kept in the
/// passage store each time the retrieval stack is opened.
pub struct VectorIndex {
    index: RwLock<Hnsw<'static, f32, DistCosine>>,
    dimension: usize,
    count: RwLock<u64>,
}

impl VectorIndex {
    /// Create an empty vector index
    ///
    /// # Arguments
    /// * `dimension` - Vector dimension (must match embedding dimension)
    /// * `ef_construction` - HNSW construction parameter
    /// * `m` - HNSW M parameter (number of connections per layer)
    pub fn new(dimension: usize, ef_construction: usize, m: usize) -> Self {
        Self::with_capacity(dimension, ef_construction, m, DEFAULT_CAPACITY)
    }

    fn with_capacity(dimension: usize, ef_construction: usize, m: usize, capacity: usize) -> Self {
        let index = Hnsw::<f32, DistCosine>::new(
            m,
            capacity.max(1),
            MAX_LAYERS,
            ef_construction,
            DistCosine,
        );

        Self {
            index: RwLock::new(index),
            dimension,
            count: RwLock::new(0),
        }
    }

    /// Build an index from stored `(id, embedding)` pairs
    pub fn build(
        dimension: usize,
        ef_construction: usize,
        m: usize,
        items: &[(i64, Vec<f32>)],
    ) -> Result<Self, VectorIndexError> {
        let index = Self::with_capacity(dimension, ef_construction, m, items.len());
        for (id, vector) in items {
            index.insert(*id as u64, vector)?;
        }
        tracing::debug!("Built vector index with {} vectors", items.len());
        Ok(index)
    }

    /// Insert a vector into the index
    pub fn insert(&self, id: u64, vector: &[f32]) -> Result<(), VectorIndexError> {
        if vector.len() != self.dimension {
            return Err(VectorIndexError::InvalidDimension {
                expected: self.dimension,
                actual: vector.len(),
            });
        }

        let index = self
            .index
            .write()
            .map_err(|e| VectorIndexError::InsertError(e.to_string()))?;
        index.insert((vector, id as usize));

        let mut count = self
            .count
            .write()
            .map_err(|e| VectorIndexError::InsertError(e.to_string()))?;
        *count += 1;

        Ok(())
    }

    /// Search for k nearest neighbors, most similar first
    pub fn search(
        &self,
        query: &[f32],
        k: usize,
        ef_search: usize,
    ) -> Result<Vec<SearchResult>, VectorIndexError> {
        if query.len() != self.dimension {
            return Err(VectorIndexError::InvalidDimension {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let index = self
            .index
            .read()
            .map_err(|e| VectorIndexError::SearchError(e.to_string()))?;

        let mut results: Vec<SearchResult> = index
            .search(query, k, ef_search.max(k))
            .into_iter()
            .map(|neighbor| SearchResult {
                id: neighbor.d_id as u64,
                score: 1.0 - neighbor.distance,
            })
            .collect();

        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        Ok(results)
    }

    /// Get the number of vectors in the index
    pub fn len(&self) -> u64 {
        self.count.read().map(|c| *c).unwrap_or(0)
    }

    /// Check if index is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get vector dimension
    pub fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn axis(dim: usize, hot: &[(usize, f32)]) -> Vec<f32> {
        let mut v = vec![0.0; dim];
        for (i, x) in hot {
            v[*i] = *x;
        }
        v
    }

    #[test]
    fn test_index_creation() {
        let index = VectorIndex::new(384, 200, 16);
        assert_eq!(index.dimension(), 384);
        assert!(index.is_empty());
        assert!(index.search(&vec![0.5; 384], 3, 50).unwrap().is_empty());
    }

    #[test]
    fn test_build_and_search() {
        let items = vec![
            (1, axis(8, &[(0, 1.0)])),
            (2, axis(8, &[(1, 1.0)])),
            (3, axis(8, &[(0, 0.9), (1, 0.1)])),
        ];
        let index = VectorIndex::build(8, 200, 16, &items).unwrap();
        assert_eq!(index.len(), 3);

        let results = index.search(&axis(8, &[(0, 1.0)]), 2, 50).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, 1);
        assert!(results[0].score >= results[1].score);
        assert!(results[0].score > 0.8);
    }

    #[test]
    fn test_dimension_validation() {
        let index = VectorIndex::new(384, 200, 16);
        assert!(index.insert(1, &[1.0; 128]).is_err());
        assert!(index.search(&[1.0; 128], 1, 10).is_err());
    }
}
