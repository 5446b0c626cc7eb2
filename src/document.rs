//! Chunk documents and their positional store.
//!
//! A [`Document`] is one bounded-size slice of a source file plus the
//! metadata needed to point a reader back at the file. The [`DocumentStore`]
//! is the canonical home for chunk content; the vector index holds only the
//! numeric projections and refers back here by position.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::vector::DocumentId;

/// Provenance of a chunk within the scanned repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Path of the source file, as produced by the scanner
    pub source_path: PathBuf,

    /// File name component, for display
    pub file_name: String,

    /// File extension without the leading dot (empty if none)
    pub extension: String,

    /// Zero-based position of this chunk within its file
    pub chunk_index: usize,

    /// Total number of chunks the file was split into
    pub total_chunks: usize,
}

/// One chunk of source text with its metadata. Immutable after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub content: String,
    pub metadata: DocumentMetadata,
}

impl Document {
    /// A short excerpt of the content for display, truncated on a char
    /// boundary.
    #[must_use]
    pub fn snippet(&self, max_chars: usize) -> &str {
        match self.content.char_indices().nth(max_chars) {
            Some((byte_idx, _)) => &self.content[..byte_idx],
            None => &self.content,
        }
    }
}

/// Ordered collection of documents; the positional index doubles as the
/// document ID, matching the vector index row for the same position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentStore {
    documents: Vec<Document>,
}

impl DocumentStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_documents(documents: Vec<Document>) -> Self {
        Self { documents }
    }

    /// Appends a document, assigning it the next positional ID.
    pub fn push(&mut self, document: Document) -> DocumentId {
        let id = DocumentId::new(self.documents.len());
        self.documents.push(document);
        id
    }

    #[must_use]
    pub fn get(&self, id: DocumentId) -> Option<&Document> {
        self.documents.get(id.get())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Document> {
        self.documents.iter()
    }

    #[must_use]
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }
}
