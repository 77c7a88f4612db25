/// Dense vector store contract and an HNSW-backed implementation
use crate::corpus::Fields;
use ahash::AHashSet;
use hnsw_rs::prelude::*;
use std::sync::{PoisonError, RwLock};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VectorStoreError {
    #[error("Query failed: {0}")]
    QueryError(String),

    #[error("Invalid dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },

    #[error("Duplicate id: {0}")]
    DuplicateId(String),
}

/// A vector with the document it was computed from
#[derive(Debug, Clone)]
pub struct VectorEntry {
    pub id: String,
    pub vector: Vec<f32>,
    pub metadata: Fields,
}

/// One nearest-neighbor hit
#[derive(Debug, Clone)]
pub struct VectorHit {
    pub id: String,
    pub metadata: Fields,
    /// Unbounded distance, lower is closer
    pub distance: f32,
}

/// Dense nearest-neighbor index consumed by the searcher
///
/// Implementations may block on network or compute.
pub trait VectorStore: Send + Sync {
    /// Up to `k` nearest entries, closest first
    fn query(&self, vector: &[f32], k: usize) -> Result<Vec<VectorHit>, VectorStoreError>;

    /// Add entries to the store
    fn add(&self, entries: Vec<VectorEntry>) -> Result<(), VectorStoreError>;

    /// Number of stored entries
    fn count(&self) -> Result<usize, VectorStoreError>;
}

/// HNSW construction parameters
#[derive(Debug, Clone, Copy)]
pub struct HnswParams {
    /// Maximum connections per node per layer
    pub max_connections: usize,
    /// Expected number of elements
    pub capacity: usize,
    /// Construction-time candidate list size
    pub ef_construction: usize,
    /// Query-time candidate list size
    pub ef_search: usize,
}

impl Default for HnswParams {
    fn default() -> Self {
        Self {
            max_connections: 16,
            capacity: 10_000,
            ef_construction: 200,
            ef_search: 64,
        }
    }
}

const MAX_LAYERS: usize = 16;

/// HNSW vector store using L2 distance
///
/// HNSW works with numeric ids, so string ids and metadata live alongside
/// the graph, indexed by insertion position.
pub struct HnswVectorStore {
    index: RwLock<Hnsw<'static, f32, DistL2>>,
    entries: RwLock<Vec<(String, Fields)>>,
    dimension: usize,
    params: HnswParams,
}

impl HnswVectorStore {
    /// Create a new empty store
    ///
    /// # Arguments
    /// * `dimension` - Vector dimension (must match embedding dimension)
    /// * `params` - HNSW construction and search parameters
    pub fn new(dimension: usize, params: HnswParams) -> Self {
        let index = Hnsw::<f32, DistL2>::new(
            params.max_connections,
            params.capacity,
            MAX_LAYERS,
            params.ef_construction,
            DistL2,
        );

        Self {
            index: RwLock::new(index),
            entries: RwLock::new(Vec::new()),
            dimension,
            params,
        }
    }

    /// Get vector dimension
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<(), VectorStoreError> {
        if vector.len() != self.dimension {
            return Err(VectorStoreError::InvalidDimension {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

impl VectorStore for HnswVectorStore {
    fn query(&self, vector: &[f32], k: usize) -> Result<Vec<VectorHit>, VectorStoreError> {
        self.check_dimension(vector)?;

        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        if k == 0 || entries.is_empty() {
            return Ok(Vec::new());
        }

        let index = self.index.read().unwrap_or_else(PoisonError::into_inner);
        let ef_search = self.params.ef_search.max(k);
        let mut neighbours = index.search(vector, k, ef_search);
        neighbours.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        neighbours
            .into_iter()
            .map(|neighbour| {
                let (id, metadata) = entries.get(neighbour.d_id).ok_or_else(|| {
                    VectorStoreError::QueryError(format!(
                        "Unknown vector position {}",
                        neighbour.d_id
                    ))
                })?;
                Ok(VectorHit {
                    id: id.clone(),
                    metadata: metadata.clone(),
                    distance: neighbour.distance,
                })
            })
            .collect()
    }

    fn add(&self, new_entries: Vec<VectorEntry>) -> Result<(), VectorStoreError> {
        for entry in &new_entries {
            self.check_dimension(&entry.vector)?;
        }

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let mut seen: AHashSet<&str> = entries.iter().map(|(id, _)| id.as_str()).collect();
        for entry in &new_entries {
            if !seen.insert(entry.id.as_str()) {
                return Err(VectorStoreError::DuplicateId(entry.id.clone()));
            }
        }
        drop(seen);

        let index = self.index.write().unwrap_or_else(PoisonError::into_inner);
        for entry in new_entries {
            let position = entries.len();
            index.insert((&entry.vector, position));
            entries.push((entry.id, entry.metadata));
        }

        Ok(())
    }

    fn count(&self) -> Result<usize, VectorStoreError> {
        Ok(self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len())
    }
}
