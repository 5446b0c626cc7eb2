//! Recursive character splitting of source text into overlapping chunks.
//!
//! The splitter walks the text left to right. For each chunk it takes a
//! window of at most `chunk_size` characters and cuts at the last occurrence
//! of the highest-priority separator inside the window: paragraph break
//! first, then line break, then space, then a hard character cut. Each chunk
//! after the first starts `overlap` characters before the end of its
//! predecessor so context survives the split point.
//!
//! All sizes are in characters, and every cut lands on a char boundary, so
//! multi-byte input never produces invalid slices. The split is
//! deterministic: identical input always yields the identical chunk
//! sequence.

use std::path::Path;

use crate::config::ChunkingConfig;
use crate::document::{Document, DocumentMetadata};

/// Separators in priority order; the empty hard cut is implicit.
const SEPARATORS: &[&str] = &["\n\n", "\n", " "];

/// Splits `text` into chunks of at most `chunk_size` characters with
/// `overlap` characters shared between consecutive chunks.
///
/// Text shorter than `chunk_size` comes back as a single chunk equal to the
/// input; empty text produces no chunks.
#[must_use]
pub fn split_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    if text.is_empty() || chunk_size == 0 {
        return Vec::new();
    }

    // Byte offset of every char boundary, plus the end of the text.
    let boundaries: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let total_chars = boundaries.len() - 1;

    if total_chars <= chunk_size {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < total_chars {
        let limit = (start + chunk_size).min(total_chars);
        let end = if limit == total_chars {
            total_chars
        } else {
            find_break(text, &boundaries, start, limit)
        };

        chunks.push(text[boundaries[start]..boundaries[end]].to_string());
        if end == total_chars {
            break;
        }

        // Step back by the overlap, but always make forward progress even
        // when a chunk came out shorter than the overlap itself.
        let next = end.saturating_sub(overlap);
        start = if next > start { next } else { end };
    }

    chunks
}

/// Picks the cut position (exclusive char index) for the window
/// `(start, limit]`, preferring the largest separator present.
fn find_break(text: &str, boundaries: &[usize], start: usize, limit: usize) -> usize {
    let window = &text[boundaries[start]..boundaries[limit]];
    for sep in SEPARATORS {
        if let Some(byte_pos) = window.rfind(sep) {
            let char_pos = window[..byte_pos].chars().count();
            let end = start + char_pos + sep.chars().count();
            if end > start && end <= limit {
                return end;
            }
        }
    }
    limit
}

/// Splits one file's content into [`Document`]s carrying chunk metadata.
#[must_use]
pub fn chunk_file(path: &Path, content: &str, config: &ChunkingConfig) -> Vec<Document> {
    let chunks = split_text(content, config.chunk_size, config.chunk_overlap);
    let total_chunks = chunks.len();

    chunks
        .into_iter()
        .enumerate()
        .map(|(chunk_index, chunk)| Document {
            content: chunk,
            metadata: DocumentMetadata {
                source_path: path.to_path_buf(),
                file_name: path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                extension: path
                    .extension()
                    .map(|e| e.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                chunk_index,
                total_chunks,
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_empty_text_yields_no_chunks() {
        assert!(split_text("", 100, 20).is_empty());
    }

    #[test]
    fn test_short_text_is_single_chunk() {
        let text = "fn main() {}";
        let chunks = split_text(text, 100, 20);
        assert_eq!(chunks, vec![text.to_string()]);
    }

    #[test]
    fn test_text_exactly_chunk_size_is_single_chunk() {
        let text = "a".repeat(50);
        let chunks = split_text(&text, 50, 10);
        assert_eq!(chunks, vec![text]);
    }

    #[test]
    fn test_chunks_respect_size_limit() {
        let text = "word ".repeat(200);
        let chunks = split_text(&text, 40, 10);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 40, "chunk too long: {chunk:?}");
        }
    }

    #[test]
    fn test_prefers_paragraph_break_over_space() {
        let text = format!("{}\n\n{}", "a ".repeat(10).trim_end(), "b ".repeat(30));
        let chunks = split_text(&text, 30, 5);
        // The first chunk should cut at the paragraph break, not mid-word.
        assert!(chunks[0].ends_with("\n\n"), "got {:?}", chunks[0]);
    }

    #[test]
    fn test_overlap_carries_context() {
        let text: String = ('a'..='z').cycle().take(300).collect();
        let overlap = 10;
        let chunks = split_text(&text, 50, overlap);
        assert!(chunks.len() > 1);

        for pair in chunks.windows(2) {
            let prev: Vec<char> = pair[0].chars().collect();
            let next: Vec<char> = pair[1].chars().collect();
            let tail: String = prev[prev.len() - overlap..].iter().collect();
            let head: String = next[..overlap].iter().collect();
            assert_eq!(tail, head, "overlap region must match");
        }
    }

    #[test]
    fn test_concatenation_minus_overlap_reconstructs_text() {
        // No separators, so every cut is a hard cut and every overlap is
        // exactly the configured overlap.
        let text: String = ('0'..='9').cycle().take(487).collect();
        let overlap = 25;
        let chunks = split_text(&text, 100, overlap);

        let mut rebuilt: String = chunks[0].clone();
        for chunk in &chunks[1..] {
            rebuilt.extend(chunk.chars().skip(overlap));
        }
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn test_deterministic() {
        let text = "The quick brown fox\njumps over the lazy dog\n\n".repeat(40);
        let a = split_text(&text, 120, 30);
        let b = split_text(&text, 120, 30);
        assert_eq!(a, b);
    }

    #[test]
    fn test_multibyte_input_splits_on_char_boundaries() {
        let text = "héllo wörld ünïcode ".repeat(50);
        let chunks = split_text(&text, 37, 7);
        // Slicing inside a UTF-8 sequence would have panicked; also verify
        // char counts stay within the limit.
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 37);
        }
    }

    #[test]
    fn test_chunk_file_metadata() {
        let config = ChunkingConfig {
            chunk_size: 30,
            chunk_overlap: 5,
        };
        let path = PathBuf::from("src/utils/helpers.py");
        let content = "def add(a, b):\n    return a + b\n\ndef sub(a, b):\n    return a - b\n";

        let documents = chunk_file(&path, content, &config);
        assert!(documents.len() > 1);

        let total = documents.len();
        for (i, doc) in documents.iter().enumerate() {
            assert_eq!(doc.metadata.source_path, path);
            assert_eq!(doc.metadata.file_name, "helpers.py");
            assert_eq!(doc.metadata.extension, "py");
            assert_eq!(doc.metadata.chunk_index, i);
            assert_eq!(doc.metadata.total_chunks, total);
        }
    }

    #[test]
    fn test_chunk_file_empty_content() {
        let config = ChunkingConfig {
            chunk_size: 100,
            chunk_overlap: 10,
        };
        let documents = chunk_file(&PathBuf::from("a.rs"), "", &config);
        assert!(documents.is_empty());
    }
}
