//! Embedding generation for repository chunks.
//!
//! A closed set of provider kinds: the configured primary fastembed model,
//! a smaller fallback model, and a deterministic hash-based local provider
//! that needs no network and cannot fail. Resolution walks the tiers in that
//! order with bounded retries, so `encode` is always available even when the
//! model backends are unreachable (at the cost of semantic quality).

mod hash;
mod provider;

pub use hash::HashProvider;
pub use provider::{
    EmbeddingProvider, ModelProvider, ModelUnavailable, ProviderIdentity, ProviderKind,
};
