//! Exact (flat) nearest-neighbor index over embedding vectors.
//!
//! A brute-force L2 index: every search compares the query against every
//! stored vector. Repositories produce thousands of chunks, not millions,
//! so exactness and simplicity win over sub-linear search structures.
//!
//! The index is append-only during [`FlatVectorIndex::build`] and immutable
//! afterwards; `search` takes `&self` and is safe to call from any number of
//! concurrent readers. Vector position i corresponds to document i in the
//! accompanying store.

use crate::vector::types::{DocumentId, VectorDimension, VectorError};

/// Flat L2-distance index with positional document alignment.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatVectorIndex {
    dimension: VectorDimension,
    /// Row-major storage: vector i occupies `[i * dim, (i + 1) * dim)`.
    data: Vec<f32>,
    count: usize,
}

impl FlatVectorIndex {
    /// Creates an empty index for the given dimension.
    #[must_use]
    pub fn empty(dimension: VectorDimension) -> Self {
        Self {
            dimension,
            data: Vec::new(),
            count: 0,
        }
    }

    /// Builds an index over all vectors in insertion order.
    ///
    /// Every vector must have exactly `dimension` components; a mixed-provider
    /// batch fails with `DimensionMismatch` rather than being coerced.
    pub fn build(
        dimension: VectorDimension,
        vectors: &[Vec<f32>],
    ) -> Result<Self, VectorError> {
        let dim = dimension.get();
        let mut data = Vec::with_capacity(vectors.len() * dim);
        for vector in vectors {
            dimension.validate_vector(vector)?;
            data.extend_from_slice(vector);
        }
        Ok(Self {
            dimension,
            data,
            count: vectors.len(),
        })
    }

    /// Reconstructs an index from raw row-major data, as read from storage.
    ///
    /// Fails if `data` is not a whole number of `dimension`-sized rows.
    pub fn from_raw(dimension: VectorDimension, data: Vec<f32>) -> Result<Self, VectorError> {
        let dim = dimension.get();
        if data.len() % dim != 0 {
            return Err(VectorError::InvalidFormat(format!(
                "raw vector data length {} is not a multiple of dimension {dim}",
                data.len()
            )));
        }
        let count = data.len() / dim;
        Ok(Self {
            dimension,
            data,
            count,
        })
    }

    /// Returns up to `k` nearest neighbors by ascending L2 distance.
    ///
    /// Returns an empty vector when the index holds no vectors; returns all
    /// stored vectors (ordered) when `k` exceeds the count. Fails with
    /// `DimensionMismatch` if the query dimension differs from the index
    /// dimension.
    pub fn search(
        &self,
        query: &[f32],
        k: usize,
    ) -> Result<Vec<(DocumentId, f32)>, VectorError> {
        self.dimension.validate_vector(query)?;

        if self.count == 0 || k == 0 {
            return Ok(Vec::new());
        }

        let dim = self.dimension.get();
        let mut results: Vec<(DocumentId, f32)> = (0..self.count)
            .map(|i| {
                let row = &self.data[i * dim..(i + 1) * dim];
                (DocumentId::new(i), l2_distance(query, row))
            })
            .collect();

        results.sort_by(|a, b| a.1.total_cmp(&b.1));
        results.truncate(k);
        Ok(results)
    }

    /// Returns the vector at position `i`, or `None` past the end.
    #[must_use]
    pub fn vector(&self, id: DocumentId) -> Option<&[f32]> {
        let dim = self.dimension.get();
        let i = id.get();
        if i < self.count {
            Some(&self.data[i * dim..(i + 1) * dim])
        } else {
            None
        }
    }

    /// Number of stored vectors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.count
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// The uniform dimension of all stored vectors.
    #[must_use]
    pub fn dimension(&self) -> VectorDimension {
        self.dimension
    }

    /// Raw row-major data, for serialization.
    #[must_use]
    pub fn as_raw(&self) -> &[f32] {
        &self.data
    }
}

/// Euclidean distance between two equal-length vectors.
fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum::<f32>()
        .sqrt()
}
