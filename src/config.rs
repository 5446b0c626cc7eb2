//! Configuration module for the retrieval core.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file
//! - Environment variable overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `CQ_` and use double underscores
//! to separate nested levels:
//! - `CQ_CHUNKING__CHUNK_SIZE=1500` sets `chunking.chunk_size`
//! - `CQ_EMBEDDING__OFFLINE=true` sets `embedding.offline`
//! - `CQ_SCANNING__MAX_FILE_SIZE=524288` sets `scanning.max_file_size`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{IndexError, IndexResult};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Path to the persisted index directory
    #[serde(default = "default_index_path")]
    pub index_path: PathBuf,

    /// Text chunking settings
    #[serde(default)]
    pub chunking: ChunkingConfig,

    /// Embedding provider settings
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Repository scanning settings
    #[serde(default)]
    pub scanning: ScanningConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ChunkingConfig {
    /// Maximum chunk size in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Overlap between consecutive chunks in characters
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EmbeddingConfig {
    /// Primary embedding model name
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Smaller, faster model tried when the primary cannot be loaded
    #[serde(default = "default_fallback_model")]
    pub fallback_model: String,

    /// Maximum load attempts per model tier
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay between retries in milliseconds (doubles per attempt)
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Skip network-backed models entirely and use the deterministic
    /// local provider. Intended for tests and air-gapped environments.
    #[serde(default = "default_false")]
    pub offline: bool,

    /// Cache directory for downloaded models
    #[serde(default = "default_model_cache_dir")]
    pub cache_dir: PathBuf,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ScanningConfig {
    /// Maximum file size to process, in bytes
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    /// File extensions (without leading dot) eligible for indexing
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

// Default value functions
fn default_version() -> u32 {
    1
}
fn default_index_path() -> PathBuf {
    PathBuf::from(".codequery/index")
}
fn default_chunk_size() -> usize {
    1000
}
fn default_chunk_overlap() -> usize {
    200
}
fn default_embedding_model() -> String {
    "AllMiniLML6V2".to_string()
}
fn default_fallback_model() -> String {
    "AllMiniLML6V2Q".to_string()
}
fn default_max_retries() -> u32 {
    3
}
fn default_retry_delay_ms() -> u64 {
    5000
}
fn default_false() -> bool {
    false
}
fn default_model_cache_dir() -> PathBuf {
    PathBuf::from(".codequery/models")
}
fn default_max_file_size() -> u64 {
    1024 * 1024
}
fn default_extensions() -> Vec<String> {
    [
        "py", "js", "ts", "java", "cpp", "c", "h", "hpp", "cs", "php", "rb", "go", "rs", "swift",
        "kt", "scala", "r", "m", "mm", "sh", "bash", "zsh", "sql", "html", "css", "scss", "sass",
        "xml", "json", "yaml", "yml", "toml", "ini", "cfg", "md", "txt", "rst", "tex",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            index_path: default_index_path(),
            chunking: ChunkingConfig::default(),
            embedding: EmbeddingConfig::default(),
            scanning: ScanningConfig::default(),
        }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            fallback_model: default_fallback_model(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            offline: false,
            cache_dir: default_model_cache_dir(),
        }
    }
}

impl Default for ScanningConfig {
    fn default() -> Self {
        Self {
            max_file_size: default_max_file_size(),
            extensions: default_extensions(),
        }
    }
}

impl Settings {
    /// Load settings from defaults, `codequery.toml`, and `CQ_*` env vars.
    pub fn load() -> IndexResult<Self> {
        Self::load_from(PathBuf::from("codequery.toml"))
    }

    /// Load settings with an explicit config file path.
    pub fn load_from(config_path: PathBuf) -> IndexResult<Self> {
        let settings: Settings = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(config_path))
            .merge(Env::prefixed("CQ_").split("__"))
            .extract()
            .map_err(|e| IndexError::ConfigError {
                reason: e.to_string(),
            })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check cross-field constraints figment cannot express.
    pub fn validate(&self) -> IndexResult<()> {
        if self.chunking.chunk_size == 0 {
            return Err(IndexError::ConfigError {
                reason: "chunking.chunk_size must be greater than zero".to_string(),
            });
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(IndexError::ConfigError {
                reason: format!(
                    "chunking.chunk_overlap ({}) must be smaller than chunking.chunk_size ({})",
                    self.chunking.chunk_overlap, self.chunking.chunk_size
                ),
            });
        }
        if self.scanning.extensions.is_empty() {
            return Err(IndexError::ConfigError {
                reason: "scanning.extensions must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.chunking.chunk_size, 1000);
        assert_eq!(settings.chunking.chunk_overlap, 200);
        assert_eq!(settings.embedding.max_retries, 3);
        assert!(!settings.embedding.offline);
        assert!(settings.scanning.extensions.iter().any(|e| e == "py"));
    }

    #[test]
    fn test_overlap_must_be_smaller_than_chunk_size() {
        let mut settings = Settings::default();
        settings.chunking.chunk_overlap = settings.chunking.chunk_size;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let mut settings = Settings::default();
        settings.chunking.chunk_size = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let settings = Settings::load_from(PathBuf::from("/nonexistent/codequery.toml")).unwrap();
        assert_eq!(settings.chunking.chunk_size, 1000);
    }
}
