//! Repository session: the lifecycle owner for one indexed repository.
//!
//! A session ties together scanning, chunking, embedding, the flat vector
//! index, and persistence. All state lives in the session instance; nothing
//! is global, so independent sessions over different repositories coexist in
//! one process.
//!
//! Initialization is load-else-rebuild: a persisted index whose embedding
//! identity matches the resolved provider is reused as-is; anything else
//! (missing, corrupt, or built by a different backend) triggers a full
//! rebuild. Searches read a snapshot behind an `RwLock<Arc<_>>`, so a
//! concurrent rebuild swaps state atomically and readers never observe a
//! half-updated index.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::chunking::chunk_file;
use crate::config::Settings;
use crate::document::{Document, DocumentStore};
use crate::embedding::{EmbeddingProvider, ProviderIdentity};
use crate::error::{IndexError, IndexResult};
use crate::persist::IndexPersistence;
use crate::scanning::{RepositoryScanner, ScanItem, read_file_text};
use crate::vector::{FlatVectorIndex, VectorError};

/// Texts per embedding call. Bounds peak memory for large repositories
/// while keeping model batching effective.
const EMBED_BATCH_SIZE: usize = 256;

/// How an initialized session obtained its index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexSource {
    /// Restored from disk without re-embedding
    Loaded,
    /// Built from the repository contents during this call
    Rebuilt,
}

/// Outcome of [`RepositorySession::initialize`].
#[derive(Debug, Clone)]
pub struct InitSummary {
    /// Total chunks in the index
    pub documents: usize,
    /// Files whose content entered the index (0 when loaded from disk)
    pub files_indexed: usize,
    /// Files skipped during the rebuild (oversize, unreadable, or not UTF-8)
    pub files_skipped: usize,
    /// True when the deterministic local provider produced the vectors
    pub degraded: bool,
    pub source: IndexSource,
}

/// One search hit, resolved back to its document.
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// L2 distance to the query; smaller is closer
    pub distance: f32,
    pub document: Document,
}

/// Everything a search needs, published as one immutable snapshot.
struct SessionState {
    index: FlatVectorIndex,
    store: DocumentStore,
    provider: EmbeddingProvider,
}

/// Session over a single repository's index.
pub struct RepositorySession {
    settings: Arc<Settings>,
    persistence: IndexPersistence,
    state: RwLock<Option<Arc<SessionState>>>,
}

impl RepositorySession {
    /// Creates an uninitialized session. The index directory comes from
    /// `settings.index_path`; nothing is read or written yet.
    #[must_use]
    pub fn new(settings: Arc<Settings>) -> Self {
        let persistence = IndexPersistence::new(settings.index_path.clone());
        Self {
            settings,
            persistence,
            state: RwLock::new(None),
        }
    }

    /// Creates a session with an explicit index directory, overriding the
    /// configured path.
    #[must_use]
    pub fn with_index_path(settings: Arc<Settings>, index_path: PathBuf) -> Self {
        Self {
            settings,
            persistence: IndexPersistence::new(index_path),
            state: RwLock::new(None),
        }
    }

    /// Loads the persisted index if it is intact and was built by the same
    /// embedding backend, otherwise rebuilds from the repository. `force`
    /// skips the load attempt entirely.
    pub fn initialize(&self, repo_root: &Path, force: bool) -> IndexResult<InitSummary> {
        let provider = EmbeddingProvider::resolve(&self.settings.embedding);
        if provider.is_degraded() {
            warn!("running in degraded mode: results reflect content identity, not meaning");
        }

        let provider = if force {
            provider
        } else {
            match self.try_load(provider)? {
                Ok(summary) => return Ok(summary),
                Err(provider) => provider,
            }
        };

        self.rebuild(repo_root, provider)
    }

    /// Attempts to restore persisted state compatible with `provider`.
    ///
    /// On success the provider is published with the loaded state; when a
    /// rebuild is needed the provider is handed back so it is resolved only
    /// once per initialization. Load corruption is logged and treated as
    /// "rebuild needed", never surfaced as fatal.
    fn try_load(
        &self,
        provider: EmbeddingProvider,
    ) -> IndexResult<Result<InitSummary, EmbeddingProvider>> {
        let persisted = match self.persistence.load() {
            Ok(Some(persisted)) => persisted,
            Ok(None) => return Ok(Err(provider)),
            Err(e @ IndexError::LoadFailed { .. }) => {
                warn!(error = %e, "persisted index unusable, rebuilding");
                return Ok(Err(provider));
            }
            Err(e) => return Err(e),
        };

        if persisted.identity != provider.identity() {
            info!(
                persisted = %persisted.identity,
                resolved = %provider.identity(),
                "embedding backend changed since last build, rebuilding"
            );
            return Ok(Err(provider));
        }

        let documents = persisted.store.len();
        let degraded = provider.is_degraded();
        self.publish(SessionState {
            index: persisted.index,
            store: persisted.store,
            provider,
        });

        info!(documents, "index loaded from disk");
        Ok(Ok(InitSummary {
            documents,
            files_indexed: 0,
            files_skipped: 0,
            degraded,
            source: IndexSource::Loaded,
        }))
    }

    /// Scans, chunks, embeds, persists, and publishes a fresh index.
    fn rebuild(&self, repo_root: &Path, provider: EmbeddingProvider) -> IndexResult<InitSummary> {
        info!(root = %repo_root.display(), "building index");
        let scanner = RepositoryScanner::new(Arc::clone(&self.settings));

        let mut store = DocumentStore::new();
        let mut files_indexed = 0usize;
        let mut files_skipped = 0usize;

        for item in scanner.scan(repo_root) {
            let path = match item {
                ScanItem::Eligible(path) => path,
                ScanItem::Oversize(path) => {
                    warn!(path = %path.display(), "skipping file over the size limit");
                    files_skipped += 1;
                    continue;
                }
            };
            let text = match read_file_text(&path) {
                Ok(Some(text)) => text,
                Ok(None) => {
                    files_skipped += 1;
                    continue;
                }
                Err(e) => {
                    warn!(error = %e, "skipping unreadable file");
                    files_skipped += 1;
                    continue;
                }
            };

            let documents = chunk_file(&path, &text, &self.settings.chunking);
            if documents.is_empty() {
                continue;
            }
            files_indexed += 1;
            for document in documents {
                store.push(document);
            }
        }

        debug!(
            files_indexed,
            files_skipped,
            chunks = store.len(),
            "repository scan complete"
        );

        let vectors = embed_store(&provider, &store)?;
        let index = FlatVectorIndex::build(provider.dimension(), &vectors)?;

        self.persistence.save(&index, &store, &provider.identity())?;

        let summary = InitSummary {
            documents: store.len(),
            files_indexed,
            files_skipped,
            degraded: provider.is_degraded(),
            source: IndexSource::Rebuilt,
        };

        self.publish(SessionState {
            index,
            store,
            provider,
        });

        info!(documents = summary.documents, "index built and persisted");
        Ok(summary)
    }

    /// Finds the `k` chunks nearest to `query`.
    ///
    /// An empty result means nothing matched (for instance an empty index);
    /// [`IndexError::NotInitialized`] means `initialize` was never called.
    pub fn search(&self, query: &str, k: usize) -> IndexResult<Vec<SearchResult>> {
        let state = self
            .state
            .read()
            .clone()
            .ok_or(IndexError::NotInitialized)?;

        if state.index.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let query_vectors = state.provider.encode(&[query.to_string()])?;
        let query_vector = query_vectors
            .first()
            .ok_or_else(|| VectorError::EmbeddingFailed("no query vector produced".to_string()))?;

        let hits = state.index.search(query_vector, k)?;
        let mut results = Vec::with_capacity(hits.len());
        for (id, distance) in hits {
            // Positional alignment is validated on save and load.
            let document = state.store.get(id).ok_or(IndexError::Misaligned {
                vectors: state.index.len(),
                documents: state.store.len(),
            })?;
            results.push(SearchResult {
                distance,
                document: document.clone(),
            });
        }
        Ok(results)
    }

    /// Whether the session currently holds a searchable index.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.state.read().is_some()
    }

    /// Number of indexed chunks, or `None` before initialization.
    #[must_use]
    pub fn document_count(&self) -> Option<usize> {
        self.state.read().as_ref().map(|s| s.store.len())
    }

    /// Whether the active provider is the degraded local fallback, or
    /// `None` before initialization.
    #[must_use]
    pub fn is_degraded(&self) -> Option<bool> {
        self.state.read().as_ref().map(|s| s.provider.is_degraded())
    }

    /// Identity of the backend behind the active index, or `None` before
    /// initialization.
    #[must_use]
    pub fn provider_identity(&self) -> Option<ProviderIdentity> {
        self.state.read().as_ref().map(|s| s.provider.identity())
    }

    #[must_use]
    pub fn index_path(&self) -> &Path {
        self.persistence.base_path()
    }

    fn publish(&self, state: SessionState) {
        *self.state.write() = Some(Arc::new(state));
    }
}

/// Embeds every document in batches, preserving store order.
fn embed_store(
    provider: &EmbeddingProvider,
    store: &DocumentStore,
) -> IndexResult<Vec<Vec<f32>>> {
    let texts: Vec<String> = store.iter().map(|d| d.content.clone()).collect();

    let mut vectors = Vec::with_capacity(texts.len());
    for batch in texts.chunks(EMBED_BATCH_SIZE) {
        vectors.extend(provider.encode(batch)?);
    }

    if vectors.len() != store.len() {
        return Err(IndexError::Misaligned {
            vectors: vectors.len(),
            documents: store.len(),
        });
    }
    Ok(vectors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn offline_settings(index_path: PathBuf) -> Arc<Settings> {
        let mut settings = Settings::default();
        settings.index_path = index_path;
        settings.embedding.offline = true;
        Arc::new(settings)
    }

    fn sample_repo() -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join("auth.py"), "def login(user):\n    return user.token\n").unwrap();
        fs::write(root.join("db.rs"), "fn connect(url: &str) -> Pool { Pool::new(url) }").unwrap();
        fs::create_dir(root.join(".git")).unwrap();
        fs::write(root.join(".git/config.py"), "ignored = True").unwrap();
        temp_dir
    }

    fn session_in(dir: &TempDir) -> RepositorySession {
        RepositorySession::new(offline_settings(dir.path().join("index")))
    }

    #[test]
    fn test_search_before_initialize_is_not_initialized() {
        let index_dir = TempDir::new().unwrap();
        let session = session_in(&index_dir);

        assert!(!session.is_initialized());
        assert!(matches!(
            session.search("anything", 3),
            Err(IndexError::NotInitialized)
        ));
    }

    #[test]
    fn test_initialize_builds_and_searches() {
        let repo = sample_repo();
        let index_dir = TempDir::new().unwrap();
        let session = session_in(&index_dir);

        let summary = session.initialize(repo.path(), false).unwrap();
        assert_eq!(summary.source, IndexSource::Rebuilt);
        assert_eq!(summary.files_indexed, 2);
        assert_eq!(summary.documents, 2);
        assert!(summary.degraded);
        assert_eq!(session.document_count(), Some(2));

        // The hash provider is exact-content: querying a chunk's own text
        // must rank that chunk first with distance ~0.
        let results = session
            .search("def login(user):\n    return user.token\n", 2)
            .unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].distance.abs() < 1e-6);
        assert_eq!(results[0].document.metadata.file_name, "auth.py");
        assert!(results[0].distance <= results[1].distance);
    }

    #[test]
    fn test_second_initialize_loads_from_disk() {
        let repo = sample_repo();
        let index_dir = TempDir::new().unwrap();

        let first = session_in(&index_dir);
        first.initialize(repo.path(), false).unwrap();

        let second = session_in(&index_dir);
        let summary = second.initialize(repo.path(), false).unwrap();
        assert_eq!(summary.source, IndexSource::Loaded);
        assert_eq!(summary.documents, 2);
        assert_eq!(summary.files_indexed, 0);
        assert!(second.search("fn connect", 1).unwrap().len() == 1);
    }

    #[test]
    fn test_force_skips_load() {
        let repo = sample_repo();
        let index_dir = TempDir::new().unwrap();
        let session = session_in(&index_dir);

        session.initialize(repo.path(), false).unwrap();
        let summary = session.initialize(repo.path(), true).unwrap();
        assert_eq!(summary.source, IndexSource::Rebuilt);
    }

    #[test]
    fn test_corrupt_index_falls_back_to_rebuild() {
        let repo = sample_repo();
        let index_dir = TempDir::new().unwrap();
        let session = session_in(&index_dir);
        session.initialize(repo.path(), false).unwrap();

        fs::write(session.index_path().join("vectors.bin"), b"garbage").unwrap();

        let recovered = session_in(&index_dir);
        let summary = recovered.initialize(repo.path(), false).unwrap();
        assert_eq!(summary.source, IndexSource::Rebuilt);
        assert_eq!(summary.documents, 2);
    }

    #[test]
    fn test_identity_mismatch_triggers_rebuild() {
        let repo = sample_repo();
        let index_dir = TempDir::new().unwrap();
        let session = session_in(&index_dir);
        session.initialize(repo.path(), false).unwrap();

        // Pretend a different backend produced the persisted vectors.
        fs::write(
            session.index_path().join("provider.txt"),
            "fastembed:SomeOtherModel\n",
        )
        .unwrap();

        let recovered = session_in(&index_dir);
        let summary = recovered.initialize(repo.path(), false).unwrap();
        assert_eq!(summary.source, IndexSource::Rebuilt);
        assert_eq!(
            recovered.provider_identity().unwrap(),
            ProviderIdentity::local_hash()
        );
    }

    #[test]
    fn test_oversize_files_count_as_skipped() {
        let repo = sample_repo();
        let index_dir = TempDir::new().unwrap();

        let mut settings = Settings::default();
        settings.index_path = index_dir.path().join("index");
        settings.embedding.offline = true;
        settings.scanning.max_file_size = 64;
        let session = RepositorySession::new(Arc::new(settings));

        // db.rs (46 bytes) stays under the cap; this one does not.
        fs::write(repo.path().join("huge.py"), "x".repeat(1000)).unwrap();

        let summary = session.initialize(repo.path(), false).unwrap();
        assert_eq!(summary.files_indexed, 2);
        assert_eq!(summary.files_skipped, 1);
    }

    #[test]
    fn test_empty_repository_yields_empty_results() {
        let repo = TempDir::new().unwrap();
        let index_dir = TempDir::new().unwrap();
        let session = session_in(&index_dir);

        let summary = session.initialize(repo.path(), false).unwrap();
        assert_eq!(summary.documents, 0);
        assert!(session.search("anything", 5).unwrap().is_empty());
    }

    #[test]
    fn test_k_zero_returns_empty() {
        let repo = sample_repo();
        let index_dir = TempDir::new().unwrap();
        let session = session_in(&index_dir);
        session.initialize(repo.path(), false).unwrap();

        assert!(session.search("def login", 0).unwrap().is_empty());
    }
}
