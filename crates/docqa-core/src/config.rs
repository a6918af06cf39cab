//! Runtime config: which PDF, which models, chunking and retrieval settings.
//!
//! Read from `config.toml` (app data directory or an explicit path), then
//! overridden by `DOCQA_*` environment variables.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::app_data;
use crate::chunks::{ChunkConfig, ChunkError, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use crate::ollama::{DEFAULT_BASE_URL, DEFAULT_EMBED_MODEL, DEFAULT_GENERATE_MODEL};
use crate::store::{DEFAULT_BATCH_SIZE, DEFAULT_TOP_K};

const CONFIG_FILENAME: &str = "config.toml";

pub const DEFAULT_DOCUMENT_PATH: &str = "document.pdf";

pub const ENV_DOCUMENT: &str = "DOCQA_DOCUMENT";
pub const ENV_OLLAMA_URL: &str = "DOCQA_OLLAMA_URL";
pub const ENV_EMBED_MODEL: &str = "DOCQA_EMBED_MODEL";
pub const ENV_GENERATE_MODEL: &str = "DOCQA_GENERATE_MODEL";
pub const ENV_TOP_K: &str = "DOCQA_TOP_K";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// The single PDF that is ingested at startup.
    pub document_path: PathBuf,
    pub ollama_url: String,
    pub embed_model: String,
    pub generate_model: String,
    /// Target characters per chunk.
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks.
    pub chunk_overlap: usize,
    /// Chunks retrieved per question.
    pub top_k: usize,
    /// Chunks sent per embedding request while building the index.
    pub embed_batch_size: usize,
    /// Expected embedding dimension. Inferred from the first vector when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_dimension: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            document_path: PathBuf::from(DEFAULT_DOCUMENT_PATH),
            ollama_url: DEFAULT_BASE_URL.to_string(),
            embed_model: DEFAULT_EMBED_MODEL.to_string(),
            generate_model: DEFAULT_GENERATE_MODEL.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            top_k: DEFAULT_TOP_K,
            embed_batch_size: DEFAULT_BATCH_SIZE,
            embedding_dimension: None,
        }
    }
}

impl Config {
    /// Validated chunking parameters.
    pub fn chunk_config(&self) -> Result<ChunkConfig, ChunkError> {
        ChunkConfig::new(self.chunk_size, self.chunk_overlap)
    }

    /// Apply `DOCQA_*` overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup. Empty values are ignored.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get(ENV_DOCUMENT) {
            self.document_path = PathBuf::from(v);
        }
        if let Some(v) = get(ENV_OLLAMA_URL) {
            self.ollama_url = v;
        }
        if let Some(v) = get(ENV_EMBED_MODEL) {
            self.embed_model = v;
        }
        if let Some(v) = get(ENV_GENERATE_MODEL) {
            self.generate_model = v;
        }
        if let Some(v) = get(ENV_TOP_K) {
            self.top_k = v.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                var: ENV_TOP_K,
                value: v.clone(),
            })?;
        }
        Ok(())
    }
}

/// Path of the default config file, if the app data directory is available.
pub fn config_path() -> Option<PathBuf> {
    app_data::app_data_dir().map(|dir| dir.join(CONFIG_FILENAME))
}

/// Load config from the app data directory. Missing directory or file gives the defaults.
pub fn load_config() -> Result<Config, ConfigError> {
    match config_path() {
        Some(path) => load_config_from(&path),
        None => Ok(Config::default()),
    }
}

/// Load config from `path`. A missing file gives the defaults; a malformed one is an error.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let s = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Config::default()),
        Err(e) => return Err(ConfigError::Read(path.to_path_buf(), e)),
    };
    toml::from_str(&s).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))
}

/// Save config to the app data directory. Returns the path written.
pub fn save_config(config: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path().ok_or(ConfigError::NoDataDir)?;
    save_config_to(&path, config)?;
    Ok(path)
}

pub fn save_config_to(path: &Path, config: &Config) -> Result<(), ConfigError> {
    let s = toml::to_string_pretty(config).map_err(ConfigError::Serialize)?;
    std::fs::write(path, s).map_err(ConfigError::Write)
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not determine app data directory")]
    NoDataDir,
    #[error("failed to read config {0}: {1}")]
    Read(PathBuf, std::io::Error),
    #[error("invalid config {0}: {1}")]
    Parse(PathBuf, toml::de::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(toml::ser::Error),
    #[error("failed to write config: {0}")]
    Write(std::io::Error),
    #[error("invalid value for {var}: {value:?}")]
    InvalidEnv { var: &'static str, value: String },
}
