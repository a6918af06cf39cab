//! The two external collaborators: something that embeds text and something that answers a prompt.

use async_trait::async_trait;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Maps text to fixed-dimension vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// One vector per input, in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;
}

/// Produces natural-language text for a rendered prompt.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}

#[async_trait]
impl<T: Embedder + ?Sized> Embedder for &T {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        (**self).embed(text).await
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        (**self).embed_batch(texts).await
    }
}

#[async_trait]
impl<T: Generator + ?Sized> Generator for &T {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        (**self).generate(prompt).await
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("embedding request failed: {0}")]
    Request(#[source] BoxError),
    #[error("embedding provider returned {got} vectors for {expected} inputs")]
    CountMismatch { expected: usize, got: usize },
    #[error("embedding provider returned an empty vector")]
    Empty,
    #[error("embedding has dimension {got}, index expects {expected}")]
    DimensionMismatch { expected: usize, got: usize },
    #[error("embedding contains NaN or infinite values")]
    NonFinite,
}

impl EmbeddingError {
    pub fn request(err: impl Into<BoxError>) -> Self {
        Self::Request(err.into())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("generation request failed: {0}")]
    Request(#[source] BoxError),
}

impl GenerationError {
    pub fn request(err: impl Into<BoxError>) -> Self {
        Self::Request(err.into())
    }
}
