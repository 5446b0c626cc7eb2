//! Repository scanning: discovering files eligible for indexing.
//!
//! The scanner walks a directory tree lazily and yields only regular files
//! that pass every filter: supported extension, size cap, no hidden path
//! segment, and none of the conventional dependency/VCS directories.
//! Re-scanning is just re-walking; no state is cached between scans.

use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

use crate::config::Settings;
use crate::error::{IndexError, IndexResult};

/// Directories never descended into, regardless of extension filters.
const IGNORED_DIRS: &[&str] = &[".git", "__pycache__", "node_modules", ".venv", "venv", "env"];

/// A file the scanner looked at: eligible for indexing, or skipped for a
/// reason the caller wants to count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanItem {
    /// Passes every filter and should be read
    Eligible(PathBuf),
    /// Supported extension, but larger than the configured size cap
    Oversize(PathBuf),
}

/// Walks a repository and yields files to index.
#[derive(Debug, Clone)]
pub struct RepositoryScanner {
    settings: Arc<Settings>,
}

impl RepositoryScanner {
    pub fn new(settings: Arc<Settings>) -> Self {
        Self { settings }
    }

    /// Lazily yields every file under `root` with a supported extension,
    /// tagged eligible or oversize. Files with other extensions, hidden
    /// paths, and ignored directories are not yielded at all. Unreadable
    /// directory entries are skipped, not fatal.
    pub fn scan(&self, root: &Path) -> impl Iterator<Item = ScanItem> + use<> {
        let extensions = self.settings.scanning.extensions.clone();
        let max_file_size = self.settings.scanning.max_file_size;

        WalkBuilder::new(root)
            .standard_filters(false)
            .follow_links(false)
            .filter_entry(|entry| {
                // The root itself is exempt so scans of dot-directories work.
                if entry.depth() == 0 {
                    return true;
                }
                let name = entry.file_name().to_string_lossy();
                !name.starts_with('.') && !IGNORED_DIRS.contains(&name.as_ref())
            })
            .build()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_some_and(|ft| ft.is_file()))
            .filter_map(move |entry| {
                let path = entry.path();

                let extension = path.extension()?.to_str()?;
                if !extensions.iter().any(|ext| ext == extension) {
                    return None;
                }

                let size = entry.metadata().ok()?.len();
                if size > max_file_size {
                    return Some(ScanItem::Oversize(path.to_path_buf()));
                }

                Some(ScanItem::Eligible(path.to_path_buf()))
            })
    }
}

/// Reads a file as UTF-8 text.
///
/// Returns `Ok(None)` for files that are not valid UTF-8; those are skipped
/// with a warning rather than aborting the run. I/O failures are reported so
/// the caller can count them.
pub fn read_file_text(path: &Path) -> IndexResult<Option<String>> {
    let bytes = std::fs::read(path).map_err(|source| IndexError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;

    match String::from_utf8(bytes) {
        Ok(text) => Ok(Some(text)),
        Err(_) => {
            warn!(path = %path.display(), "skipping file that is not valid UTF-8");
            Ok(None)
        }
    }
}
