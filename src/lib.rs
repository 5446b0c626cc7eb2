//! Retrieval core for code-repository question answering.
//!
//! Scans a repository, splits files into overlapping chunks, embeds each
//! chunk, and serves nearest-neighbor searches over the result. The flow:
//!
//! ```text
//! scanning -> chunking -> embedding -> vector index
//!                  \________________________/
//!                       persisted as one index directory
//! ```
//!
//! [`RepositorySession`] owns the whole lifecycle; see its module docs for
//! the load-else-rebuild policy and concurrency model.

pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod persist;
pub mod scanning;
pub mod session;
pub mod vector;

// Explicit exports for better API clarity
pub use config::Settings;
pub use document::{Document, DocumentMetadata, DocumentStore};
pub use embedding::{EmbeddingProvider, HashProvider, ProviderIdentity, ProviderKind};
pub use error::{IndexError, IndexResult};
pub use persist::IndexPersistence;
pub use session::{IndexSource, InitSummary, RepositorySession, SearchResult};
pub use vector::{DocumentId, FlatVectorIndex, VectorDimension, VectorError};
