//! End-to-end tests for the scan -> chunk -> embed -> index -> search
//! pipeline, run entirely with the deterministic offline provider so no
//! network or model download is involved.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use codequery::{
    IndexError, IndexPersistence, IndexSource, ProviderIdentity, RepositorySession, Settings,
};
use tempfile::TempDir;

fn offline_settings(index_path: PathBuf) -> Arc<Settings> {
    let mut settings = Settings::default();
    settings.index_path = index_path;
    settings.embedding.offline = true;
    Arc::new(settings)
}

/// A small fixture repository with nested directories, ignored trees, a
/// binary file, and one file large enough to split into several chunks.
fn fixture_repo() -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();

    fs::create_dir_all(root.join("src/handlers")).unwrap();
    fs::write(
        root.join("src/handlers/auth.py"),
        "def authenticate(request):\n    token = request.headers.get('Authorization')\n    return verify(token)\n",
    )
    .unwrap();
    fs::write(
        root.join("src/main.rs"),
        "fn main() {\n    let pool = db::connect(\"postgres://localhost\");\n    serve(pool);\n}\n",
    )
    .unwrap();

    // Long enough to need multiple chunks at the default 1000/200 split.
    let paragraphs: Vec<String> = (0..40)
        .map(|i| format!("Section {i}: this paragraph describes configuration option number {i} in enough words to take up space."))
        .collect();
    fs::write(root.join("README.md"), paragraphs.join("\n\n")).unwrap();

    // All of these must be invisible to the scanner.
    fs::create_dir_all(root.join("node_modules/lodash")).unwrap();
    fs::write(root.join("node_modules/lodash/index.js"), "module.exports = {}").unwrap();
    fs::create_dir(root.join(".git")).unwrap();
    fs::write(root.join(".git/HEAD"), "ref: refs/heads/main").unwrap();
    fs::write(root.join("logo.png"), [0x89, 0x50, 0x4e, 0x47]).unwrap();

    temp_dir
}

#[test]
fn build_index_search_round_trip() {
    let repo = fixture_repo();
    let index_dir = TempDir::new().unwrap();
    let session = RepositorySession::new(offline_settings(index_dir.path().join("index")));

    let summary = session.initialize(repo.path(), false).unwrap();
    assert_eq!(summary.source, IndexSource::Rebuilt);
    assert_eq!(summary.files_indexed, 3);
    assert!(summary.documents > 3, "README.md should produce multiple chunks");
    assert!(summary.degraded);

    // Exact chunk content must come back as the top hit with distance ~0.
    let auth_text =
        "def authenticate(request):\n    token = request.headers.get('Authorization')\n    return verify(token)\n";
    let results = session.search(auth_text, 3).unwrap();
    assert_eq!(results.len(), 3);
    assert!(results[0].distance.abs() < 1e-6);
    assert_eq!(results[0].document.metadata.file_name, "auth.py");
    assert_eq!(results[0].document.content, auth_text);

    // Distances come back sorted ascending.
    for pair in results.windows(2) {
        assert!(pair[0].distance <= pair[1].distance);
    }
}

#[test]
fn persisted_index_survives_process_restart() {
    let repo = fixture_repo();
    let index_dir = TempDir::new().unwrap();
    let index_path = index_dir.path().join("index");

    let built = {
        let session = RepositorySession::new(offline_settings(index_path.clone()));
        session.initialize(repo.path(), false).unwrap()
    };

    // A new session over the same directory restores without rebuilding.
    let session = RepositorySession::new(offline_settings(index_path.clone()));
    let summary = session.initialize(repo.path(), false).unwrap();
    assert_eq!(summary.source, IndexSource::Loaded);
    assert_eq!(summary.documents, built.documents);
    assert_eq!(summary.files_indexed, 0);

    let results = session.search("fn main", 1).unwrap();
    assert_eq!(results.len(), 1);

    // The on-disk artifacts carry the provider identity that built them.
    let persisted = IndexPersistence::new(index_path).load().unwrap().unwrap();
    assert_eq!(persisted.identity, ProviderIdentity::local_hash());
    assert_eq!(persisted.index.len(), persisted.store.len());
}

#[test]
fn force_rebuild_picks_up_new_files() {
    let repo = fixture_repo();
    let index_dir = TempDir::new().unwrap();
    let session = RepositorySession::new(offline_settings(index_dir.path().join("index")));

    let before = session.initialize(repo.path(), false).unwrap();
    fs::write(
        repo.path().join("src/metrics.go"),
        "func RecordLatency(ms float64) { histogram.Observe(ms) }",
    )
    .unwrap();

    // Without force the persisted index is reused and misses the new file.
    let reloaded = RepositorySession::new(offline_settings(session.index_path().to_path_buf()));
    let loaded = reloaded.initialize(repo.path(), false).unwrap();
    assert_eq!(loaded.source, IndexSource::Loaded);
    assert_eq!(loaded.documents, before.documents);

    let summary = reloaded.initialize(repo.path(), true).unwrap();
    assert_eq!(summary.source, IndexSource::Rebuilt);
    assert_eq!(summary.documents, before.documents + 1);

    let results = reloaded.search("func RecordLatency(ms float64)", 1).unwrap();
    assert_eq!(results[0].document.metadata.extension, "go");
}

#[test]
fn corrupted_artifacts_trigger_clean_rebuild() {
    let repo = fixture_repo();
    let index_dir = TempDir::new().unwrap();
    let index_path = index_dir.path().join("index");

    let session = RepositorySession::new(offline_settings(index_path.clone()));
    let before = session.initialize(repo.path(), false).unwrap();

    fs::write(index_path.join("documents.json"), "not json at all").unwrap();

    let recovered = RepositorySession::new(offline_settings(index_path.clone()));
    let summary = recovered.initialize(repo.path(), false).unwrap();
    assert_eq!(summary.source, IndexSource::Rebuilt);
    assert_eq!(summary.documents, before.documents);

    // The rebuild republished a consistent generation.
    let persisted = IndexPersistence::new(index_path).load().unwrap().unwrap();
    assert_eq!(persisted.index.len(), persisted.store.len());
}

#[test]
fn chunk_metadata_points_back_into_the_repository() {
    let repo = fixture_repo();
    let index_dir = TempDir::new().unwrap();
    let session = RepositorySession::new(offline_settings(index_dir.path().join("index")));
    session.initialize(repo.path(), false).unwrap();

    let results = session.search("Section 7: this paragraph describes", 5).unwrap();
    let readme_hit = results
        .iter()
        .find(|r| r.document.metadata.file_name == "README.md")
        .expect("a README chunk should be retrievable");

    let meta = &readme_hit.document.metadata;
    assert!(meta.source_path.starts_with(repo.path()));
    assert_eq!(meta.extension, "md");
    assert!(meta.total_chunks > 1);
    assert!(meta.chunk_index < meta.total_chunks);
    assert!(fs::read_to_string(&meta.source_path)
        .unwrap()
        .contains(readme_hit.document.content.trim()));
}

#[test]
fn search_without_initialize_reports_missing_session_state() {
    let index_dir = TempDir::new().unwrap();
    let session = RepositorySession::new(offline_settings(index_dir.path().join("index")));

    let err = session.search("anything", 5).unwrap_err();
    assert!(matches!(err, IndexError::NotInitialized));
    assert!(!err.recovery_suggestions().is_empty());
}
