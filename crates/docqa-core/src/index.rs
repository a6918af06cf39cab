//! Startup pipeline: load → chunk → embed → store. Runs once, before any question.

use tracing::info;

use crate::chunks::{chunk_pages, Chunk, ChunkError};
use crate::config::Config;
use crate::document::{load_pdf, DocumentLoadError};
use crate::pipeline::Pipeline;
use crate::provider::{Embedder, Generator};
use crate::store::{IndexError, VectorIndex};

/// Loads the configured PDF and chunks it. No provider calls.
pub fn load_chunks(config: &Config) -> Result<Vec<Chunk>, InitError> {
    let chunk_config = config.chunk_config()?;
    let pages = load_pdf(&config.document_path)?;
    let chunks = chunk_pages(&pages, &chunk_config);
    info!(
        pages = pages.len(),
        chunks = chunks.len(),
        chunk_size = chunk_config.chunk_size(),
        chunk_overlap = chunk_config.chunk_overlap(),
        "Chunked document"
    );
    Ok(chunks)
}

/// Runs the full startup pipeline and returns the built index.
pub async fn build_index<E: Embedder>(config: &Config, embedder: E) -> Result<VectorIndex<E>, InitError> {
    let chunks = load_chunks(config)?;
    let mut index = match config.embedding_dimension {
        Some(dim) => VectorIndex::with_dimension(embedder, dim),
        None => VectorIndex::new(embedder),
    }
    .with_batch_size(config.embed_batch_size);
    index.build(chunks).await?;
    Ok(index)
}

impl<E: Embedder, G: Generator> Pipeline<E, G> {
    /// Build everything a question needs. Succeeds only once the index is built;
    /// any error here means no question can be answered.
    pub async fn initialize(config: &Config, embedder: E, generator: G) -> Result<Self, InitError> {
        let index = build_index(config, embedder).await?;
        info!(records = index.len(), top_k = config.top_k, "Pipeline ready");
        Ok(Pipeline::new(index, generator).with_top_k(config.top_k))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("config error: {0}")]
    Config(#[from] ChunkError),
    #[error("document error: {0}")]
    Document(#[from] DocumentLoadError),
    #[error("index error: {0}")]
    Index(#[from] IndexError),
}
