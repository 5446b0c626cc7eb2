//! Deterministic local embedding fallback.
//!
//! Used only when no network-backed model can be loaded. Each text is
//! reduced to a SHA-256 digest; the digest is chained until 128 bytes are
//! available, each byte becomes one vector component, and the result is
//! L2-normalized. Two identical texts always produce identical vectors,
//! across processes and runs. The vectors carry no semantic meaning beyond
//! exact-content identity, which is the availability trade the degraded
//! mode makes.

use rayon::prelude::*;
use sha2::{Digest, Sha256};

use crate::vector::{HASH_DIMENSION, VectorDimension};

/// Deterministic hash-based provider. Construction and encoding never fail.
#[derive(Debug, Clone, Copy)]
pub struct HashProvider {
    dimension: VectorDimension,
}

impl Default for HashProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl HashProvider {
    #[must_use]
    pub fn new() -> Self {
        Self {
            dimension: VectorDimension::hash_fallback(),
        }
    }

    /// Encodes all texts, one vector per text, order preserved.
    ///
    /// Batched across threads; output order is fixed by the input order
    /// regardless of scheduling.
    #[must_use]
    pub fn encode(&self, texts: &[String]) -> Vec<Vec<f32>> {
        texts.par_iter().map(|text| hash_embed(text)).collect()
    }

    #[must_use]
    pub fn dimension(&self) -> VectorDimension {
        self.dimension
    }
}

/// Maps one text to a normalized 128-dimension vector via chained SHA-256.
fn hash_embed(text: &str) -> Vec<f32> {
    let mut values = Vec::with_capacity(HASH_DIMENSION);
    let mut block: [u8; 32] = Sha256::digest(text.as_bytes()).into();

    while values.len() < HASH_DIMENSION {
        for &byte in &block {
            if values.len() == HASH_DIMENSION {
                break;
            }
            values.push(f32::from(byte));
        }
        block = Sha256::digest(block).into();
    }

    let norm = values.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in &mut values {
            *value /= norm;
        }
    }
    values
}
