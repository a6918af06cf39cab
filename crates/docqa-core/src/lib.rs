//! All pipeline logic independent of how the app is run.
//!
//! One PDF is loaded, chunked and embedded into an in-memory index at startup
//! ([`Pipeline::initialize`]); afterwards each question is answered by retrieving
//! the nearest chunks and asking the generator ([`Pipeline::answer`]).

pub mod app_data;
pub mod chunks;
pub mod config;
pub mod document;
pub mod index;
pub mod ollama;
pub mod pipeline;
pub mod prompt;
pub mod provider;
pub mod store;

#[cfg(test)]
mod test_support;

pub use app_data::app_data_dir;
pub use chunks::{chunk_pages, split_text, Chunk, ChunkConfig, ChunkError, Span};
pub use config::{config_path, load_config, load_config_from, save_config, save_config_to, Config, ConfigError};
pub use document::{load_pdf, DocumentLoadError, Page};
pub use index::{build_index, load_chunks, InitError};
pub use ollama::{OllamaClient, OllamaError};
pub use pipeline::{Pipeline, PipelineError, QueryState, Retrieval};
pub use prompt::{format_context, PromptTemplate, QA_PROMPT};
pub use provider::{Embedder, EmbeddingError, GenerationError, Generator};
pub use store::{IndexError, SearchHit, VectorIndex, VectorRecord, DEFAULT_TOP_K};
