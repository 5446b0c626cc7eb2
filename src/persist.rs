//! Persistence of the built index set to a directory.
//!
//! # On-disk layout
//!
//! One directory per repository index, holding three artifacts:
//! - `vectors.bin` — the flat vector index (see [`crate::vector`])
//! - `documents.json` — versioned, order-preserving document list
//! - `provider.txt` — identity of the embedding backend that built it
//!
//! # Atomicity
//!
//! `save` writes all three artifacts into a `<dir>.tmp` sibling and then
//! publishes by rename: the previous generation moves to `<dir>.old`, the
//! temp directory takes its place, and the old generation is removed. A
//! failure at any step leaves the previous published directory intact; a
//! crash between the two renames can leave only a `.old` leftover, which
//! `load` never reads. A missing directory is "no prior state", not an
//! error; a present but partial or corrupt directory is a recoverable
//! [`IndexError::LoadFailed`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::document::{Document, DocumentStore};
use crate::embedding::ProviderIdentity;
use crate::error::{IndexError, IndexResult};
use crate::vector::FlatVectorIndex;

const VECTORS_FILE: &str = "vectors.bin";
const DOCUMENTS_FILE: &str = "documents.json";
const PROVIDER_FILE: &str = "provider.txt";

/// Current version of the document list format.
const DOCUMENT_FORMAT_VERSION: u32 = 1;

/// Versioned envelope for the persisted document list.
#[derive(Serialize, Deserialize)]
struct DocumentFile {
    version: u32,
    documents: Vec<Document>,
}

/// Everything a saved index restores to.
#[derive(Debug)]
pub struct PersistedIndex {
    pub index: FlatVectorIndex,
    pub store: DocumentStore,
    pub identity: ProviderIdentity,
}

/// Manages one repository's persisted index directory.
#[derive(Debug, Clone)]
pub struct IndexPersistence {
    base_path: PathBuf,
}

impl IndexPersistence {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    #[must_use]
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Whether a published index directory exists.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.base_path.join(VECTORS_FILE).exists()
    }

    /// Saves a fully built index set, replacing any prior generation only
    /// after every artifact has been written.
    #[must_use = "Save errors should be handled to ensure data is persisted"]
    pub fn save(
        &self,
        index: &FlatVectorIndex,
        store: &DocumentStore,
        identity: &ProviderIdentity,
    ) -> IndexResult<()> {
        if index.len() != store.len() {
            return Err(IndexError::Misaligned {
                vectors: index.len(),
                documents: store.len(),
            });
        }

        let tmp_path = self.sibling("tmp");
        let result = self.write_artifacts(&tmp_path, index, store, identity);
        if let Err(e) = result {
            // Best effort: never leave a half-written temp directory behind.
            let _ = std::fs::remove_dir_all(&tmp_path);
            return Err(e);
        }

        self.publish(&tmp_path)
    }

    fn write_artifacts(
        &self,
        tmp_path: &Path,
        index: &FlatVectorIndex,
        store: &DocumentStore,
        identity: &ProviderIdentity,
    ) -> IndexResult<()> {
        if tmp_path.exists() {
            std::fs::remove_dir_all(tmp_path).map_err(|e| self.persist_err(e))?;
        }
        std::fs::create_dir_all(tmp_path).map_err(|e| self.persist_err(e))?;

        crate::vector::write_index(&tmp_path.join(VECTORS_FILE), index)
            .map_err(|e| self.persist_err(e))?;

        let document_file = DocumentFile {
            version: DOCUMENT_FORMAT_VERSION,
            documents: store.documents().to_vec(),
        };
        let json =
            serde_json::to_string(&document_file).map_err(|e| self.persist_err(e))?;
        std::fs::write(tmp_path.join(DOCUMENTS_FILE), json).map_err(|e| self.persist_err(e))?;

        std::fs::write(
            tmp_path.join(PROVIDER_FILE),
            format!("{}\n", identity.as_str()),
        )
        .map_err(|e| self.persist_err(e))?;

        Ok(())
    }

    /// Swaps the temp directory into place.
    fn publish(&self, tmp_path: &Path) -> IndexResult<()> {
        let old_path = self.sibling("old");
        if old_path.exists() {
            std::fs::remove_dir_all(&old_path).map_err(|e| self.persist_err(e))?;
        }

        if self.base_path.exists() {
            std::fs::rename(&self.base_path, &old_path).map_err(|e| self.persist_err(e))?;
        }
        if let Err(e) = std::fs::rename(tmp_path, &self.base_path) {
            // Restore the previous generation before reporting.
            if old_path.exists() {
                let _ = std::fs::rename(&old_path, &self.base_path);
            }
            return Err(self.persist_err(e));
        }

        if old_path.exists()
            && let Err(e) = std::fs::remove_dir_all(&old_path)
        {
            warn!(path = %old_path.display(), error = %e, "could not remove previous index generation");
        }

        debug!(path = %self.base_path.display(), "index published");
        Ok(())
    }

    /// Loads the published index set.
    ///
    /// `Ok(None)` when nothing was ever saved; `LoadFailed` when the
    /// directory exists but any artifact is missing, unreadable, or
    /// internally inconsistent. Never mutates on-disk state.
    #[must_use = "Load errors should be handled appropriately"]
    pub fn load(&self) -> IndexResult<Option<PersistedIndex>> {
        if !self.base_path.exists() {
            return Ok(None);
        }

        let index = crate::vector::read_index(&self.base_path.join(VECTORS_FILE))
            .map_err(|e| self.load_err(format!("vector index: {e}")))?;

        let documents_path = self.base_path.join(DOCUMENTS_FILE);
        let json = std::fs::read_to_string(&documents_path)
            .map_err(|e| self.load_err(format!("document list: {e}")))?;
        let document_file: DocumentFile = serde_json::from_str(&json)
            .map_err(|e| self.load_err(format!("document list: {e}")))?;
        if document_file.version > DOCUMENT_FORMAT_VERSION {
            return Err(self.load_err(format!(
                "document list version {} is newer than supported version {}",
                document_file.version, DOCUMENT_FORMAT_VERSION
            )));
        }
        let store = DocumentStore::from_documents(document_file.documents);

        let provider_path = self.base_path.join(PROVIDER_FILE);
        let identity_text = std::fs::read_to_string(&provider_path)
            .map_err(|e| self.load_err(format!("provider identity: {e}")))?;
        let identity = ProviderIdentity::from_persisted(&identity_text);

        if index.len() != store.len() {
            return Err(self.load_err(format!(
                "vector count {} does not match document count {}",
                index.len(),
                store.len()
            )));
        }

        Ok(Some(PersistedIndex {
            index,
            store,
            identity,
        }))
    }

    /// Deletes the published index directory, if present.
    pub fn clear(&self) -> std::io::Result<()> {
        if self.base_path.exists() {
            std::fs::remove_dir_all(&self.base_path)?;
        }
        Ok(())
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let name = self
            .base_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "index".to_string());
        self.base_path.with_file_name(format!("{name}.{suffix}"))
    }

    fn persist_err(&self, source: impl std::error::Error + Send + Sync + 'static) -> IndexError {
        IndexError::PersistFailed {
            path: self.base_path.clone(),
            source: Box::new(source),
        }
    }

    fn load_err(&self, reason: String) -> IndexError {
        IndexError::LoadFailed {
            path: self.base_path.clone(),
            reason,
        }
    }
}
