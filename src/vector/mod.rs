//! Exact vector search over repository chunk embeddings.
//!
//! # Architecture
//! A flat (brute-force) L2 index positionally aligned with the document
//! store: vector i always belongs to document i. The index is built once per
//! pipeline run, immutable afterwards, and persisted in a versioned binary
//! file that memory-maps on reload.

mod index;
mod storage;
mod types;

pub use index::FlatVectorIndex;
pub use storage::{read_index, write_index};
pub use types::{DocumentId, HASH_DIMENSION, VectorDimension, VectorError};
