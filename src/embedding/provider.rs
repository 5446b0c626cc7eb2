//! Embedding provider resolution and encoding.
//!
//! Resolution is tiered: the configured primary model, then the configured
//! fallback model, each with bounded retries and exponential backoff, then
//! the deterministic [`HashProvider`]. Only model loading touches the
//! network; `encode` itself performs no network I/O.

use std::sync::Mutex;
use std::time::Duration;

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use tracing::{debug, info, warn};

use crate::config::EmbeddingConfig;
use crate::embedding::HashProvider;
use crate::vector::{VectorDimension, VectorError};

/// A single model-load attempt failed. Transient by assumption: retried up
/// to the configured bound, then the next tier takes over. Never surfaced
/// to callers as fatal.
#[derive(Debug, thiserror::Error)]
#[error("embedding model '{model}' unavailable: {reason}")]
pub struct ModelUnavailable {
    pub model: String,
    pub reason: String,
}

/// Which resolution tier produced the active provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    /// The configured primary network model
    Primary,
    /// The configured smaller fallback network model
    Fallback,
    /// The deterministic local hash provider (degraded mode)
    Local,
}

/// Recorded name of the backend that actually produced a set of vectors.
///
/// Persisted alongside the index; on reload the session re-resolves a
/// provider and compares identities rather than assuming old vectors remain
/// comparable to freshly encoded queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderIdentity(String);

impl ProviderIdentity {
    #[must_use]
    pub fn for_model(model_name: &str) -> Self {
        Self(format!("fastembed:{model_name}"))
    }

    #[must_use]
    pub fn local_hash() -> Self {
        Self("hash:sha256-128".to_string())
    }

    /// Restores an identity from its persisted text form.
    #[must_use]
    pub fn from_persisted(value: &str) -> Self {
        Self(value.trim().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProviderIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A loaded fastembed model.
pub struct ModelProvider {
    model: Mutex<TextEmbedding>,
    identity: ProviderIdentity,
    kind: ProviderKind,
    dimension: VectorDimension,
}

impl std::fmt::Debug for ModelProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelProvider")
            .field("identity", &self.identity)
            .field("kind", &self.kind)
            .field("dimension", &self.dimension.get())
            .finish()
    }
}

impl ModelProvider {
    /// Loads `model_name` with bounded retries and exponential backoff.
    ///
    /// An unrecognized model name fails immediately: retrying cannot make a
    /// name valid. Transient load failures sleep and retry up to
    /// `max_retries` attempts.
    pub fn load(
        model_name: &str,
        kind: ProviderKind,
        config: &EmbeddingConfig,
    ) -> Result<Self, ModelUnavailable> {
        let model_kind = parse_embedding_model(model_name).ok_or_else(|| ModelUnavailable {
            model: model_name.to_string(),
            reason: "unknown model name".to_string(),
        })?;

        let attempts = config.max_retries.max(1);
        let mut delay = Duration::from_millis(config.retry_delay_ms);
        let mut last_reason = String::new();

        for attempt in 1..=attempts {
            debug!(model = model_name, attempt, "loading embedding model");
            match TextEmbedding::try_new(
                InitOptions::new(model_kind.clone())
                    .with_cache_dir(config.cache_dir.clone())
                    .with_show_download_progress(false),
            ) {
                Ok(mut model) => match probe_dimension(&mut model) {
                    Ok(dimension) => {
                        info!(
                            model = model_name,
                            dimension = dimension.get(),
                            "embedding model ready"
                        );
                        return Ok(Self {
                            model: Mutex::new(model),
                            identity: ProviderIdentity::for_model(model_name),
                            kind,
                            dimension,
                        });
                    }
                    Err(reason) => last_reason = reason,
                },
                Err(e) => last_reason = e.to_string(),
            }

            warn!(
                model = model_name,
                attempt,
                max = attempts,
                reason = %last_reason,
                "embedding model load failed"
            );
            if attempt < attempts {
                std::thread::sleep(delay);
                delay = delay.saturating_mul(2);
            }
        }

        Err(ModelUnavailable {
            model: model_name.to_string(),
            reason: last_reason,
        })
    }

    fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, VectorError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let embeddings = self
            .model
            .lock()
            .map_err(|_| {
                VectorError::EmbeddingFailed(
                    "embedding model lock poisoned by a panic in another thread".to_string(),
                )
            })?
            .embed(texts.to_vec(), None)
            .map_err(|e| VectorError::EmbeddingFailed(e.to_string()))?;

        for embedding in &embeddings {
            self.dimension.validate_vector(embedding)?;
        }
        Ok(embeddings)
    }
}

/// Determines the output dimension by encoding one probe text.
fn probe_dimension(model: &mut TextEmbedding) -> Result<VectorDimension, String> {
    let probe = model
        .embed(vec!["dimension probe".to_string()], None)
        .map_err(|e| e.to_string())?;
    let len = probe.first().map(Vec::len).unwrap_or(0);
    VectorDimension::new(len).map_err(|e| e.to_string())
}

/// Maps a configured model name onto the supported fastembed models.
fn parse_embedding_model(name: &str) -> Option<EmbeddingModel> {
    match name {
        "AllMiniLML6V2" => Some(EmbeddingModel::AllMiniLML6V2),
        "AllMiniLML6V2Q" => Some(EmbeddingModel::AllMiniLML6V2Q),
        "AllMiniLML12V2" => Some(EmbeddingModel::AllMiniLML12V2),
        "AllMiniLML12V2Q" => Some(EmbeddingModel::AllMiniLML12V2Q),
        "BGESmallENV15" => Some(EmbeddingModel::BGESmallENV15),
        "BGESmallENV15Q" => Some(EmbeddingModel::BGESmallENV15Q),
        "ParaphraseMLMiniLML12V2" => Some(EmbeddingModel::ParaphraseMLMiniLML12V2),
        _ => None,
    }
}

/// The active embedding backend: a closed set of provider kinds.
#[derive(Debug)]
pub enum EmbeddingProvider {
    Model(ModelProvider),
    Hash(HashProvider),
}

impl EmbeddingProvider {
    /// Resolves a provider through the tiered attempt policy.
    ///
    /// Never fails: when both network tiers are exhausted (or `offline` is
    /// set) the deterministic hash provider is used, and building proceeds
    /// in degraded mode.
    #[must_use]
    pub fn resolve(config: &EmbeddingConfig) -> Self {
        if config.offline {
            info!("offline mode: using deterministic local embeddings");
            return Self::Hash(HashProvider::new());
        }

        let tiers = [
            (ProviderKind::Primary, config.model.as_str()),
            (ProviderKind::Fallback, config.fallback_model.as_str()),
        ];
        for (kind, model_name) in tiers {
            match ModelProvider::load(model_name, kind, config) {
                Ok(provider) => return Self::Model(provider),
                Err(e) => warn!(tier = ?kind, error = %e, "embedding tier exhausted"),
            }
        }

        warn!("all embedding models unavailable, using deterministic local fallback");
        Self::Hash(HashProvider::new())
    }

    /// Encodes texts into vectors, one per input, order-preserving.
    ///
    /// Every vector from one provider instance has the same dimension.
    pub fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, VectorError> {
        match self {
            Self::Model(provider) => provider.encode(texts),
            Self::Hash(provider) => Ok(provider.encode(texts)),
        }
    }

    #[must_use]
    pub fn dimension(&self) -> VectorDimension {
        match self {
            Self::Model(provider) => provider.dimension,
            Self::Hash(provider) => provider.dimension(),
        }
    }

    #[must_use]
    pub fn identity(&self) -> ProviderIdentity {
        match self {
            Self::Model(provider) => provider.identity.clone(),
            Self::Hash(_) => ProviderIdentity::local_hash(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> ProviderKind {
        match self {
            Self::Model(provider) => provider.kind,
            Self::Hash(_) => ProviderKind::Local,
        }
    }

    /// True when running on the non-semantic local fallback.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Hash(_))
    }
}
