//! In-memory vector index for chunk embeddings. Built once, then only queried.
//! No persistence; the index is discarded when the process exits.
//!
//! Similarity is cosine: vectors are normalized on the way in, and the reported
//! distance is `1 - cosine similarity` (0 = same direction, 2 = opposite).

use std::cmp::Ordering;

use tracing::{debug, info};

use crate::chunks::Chunk;
use crate::provider::{Embedder, EmbeddingError};

/// Chunks returned per query when the caller has no preference.
pub const DEFAULT_TOP_K: usize = 4;
/// Chunks per embedding request during [`VectorIndex::build`].
pub const DEFAULT_BATCH_SIZE: usize = 32;

/// A chunk with its embedding, stored for similarity search.
#[derive(Debug, Clone)]
pub struct VectorRecord {
    pub chunk: Chunk,
    /// Unit-length embedding.
    embedding: Vec<f32>,
}

impl VectorRecord {
    pub fn embedding(&self) -> &[f32] {
        &self.embedding
    }
}

/// A query result: the matched chunk and its cosine distance to the query.
#[derive(Debug, Clone, Copy)]
pub struct SearchHit<'a> {
    pub chunk: &'a Chunk,
    pub distance: f32,
}

/// Records plus the dimension they all share.
#[derive(Debug)]
struct Built {
    dimension: Option<usize>,
    records: Vec<VectorRecord>,
}

/// In-memory vector index over one document's chunks.
#[derive(Debug)]
pub struct VectorIndex<E> {
    embedder: E,
    dimension: Option<usize>,
    batch_size: usize,
    built: Option<Built>,
}

impl<E: Embedder> VectorIndex<E> {
    /// Empty, unbuilt index. The dimension is taken from the first embedding.
    pub fn new(embedder: E) -> Self {
        Self {
            embedder,
            dimension: None,
            batch_size: DEFAULT_BATCH_SIZE,
            built: None,
        }
    }

    /// Empty, unbuilt index that only accepts vectors of `dimension`.
    pub fn with_dimension(embedder: E, dimension: usize) -> Self {
        Self {
            dimension: Some(dimension),
            ..Self::new(embedder)
        }
    }

    /// How many chunks go into one embedding request. Zero is treated as one.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Embed and store all chunks. Must be called exactly once before [`query`](Self::query).
    ///
    /// Either every chunk is stored or, on error, nothing is and the index stays unbuilt.
    /// Returns the number of stored records.
    pub async fn build(&mut self, chunks: Vec<Chunk>) -> Result<usize, IndexError> {
        if self.built.is_some() {
            return Err(IndexError::AlreadyBuilt);
        }
        let mut dimension = self.dimension;
        let mut records = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let embeddings = self.embedder.embed_batch(&texts).await?;
            if embeddings.len() != batch.len() {
                return Err(EmbeddingError::CountMismatch {
                    expected: batch.len(),
                    got: embeddings.len(),
                }
                .into());
            }
            for (chunk, embedding) in batch.iter().zip(embeddings) {
                let expected = *dimension.get_or_insert(embedding.len());
                validate(&embedding, expected)?;
                records.push(VectorRecord {
                    chunk: chunk.clone(),
                    embedding: normalize(&embedding),
                });
            }
            debug!(stored = records.len(), total = chunks.len(), "Embedded batch");
        }
        info!(records = records.len(), dimension = ?dimension, "Vector index built");
        let n = records.len();
        self.built = Some(Built { dimension, records });
        Ok(n)
    }

    /// The `k` records nearest to `text`, nearest first. Ties keep insertion order.
    pub async fn query(&self, text: &str, k: usize) -> Result<Vec<SearchHit<'_>>, IndexError> {
        let built = self.built.as_ref().ok_or(IndexError::NotBuilt)?;
        if built.records.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        let query = self.embedder.embed(text).await?;
        if let Some(expected) = built.dimension {
            validate(&query, expected)?;
        }
        let q_norm = normalize(&query);
        let mut hits: Vec<SearchHit<'_>> = built
            .records
            .iter()
            .map(|r| SearchHit {
                chunk: &r.chunk,
                distance: 1.0 - dot(&q_norm, &r.embedding),
            })
            .collect();
        // sort_by is stable, so equal distances stay in insertion order.
        hits.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(Ordering::Equal));
        hits.truncate(k);
        Ok(hits)
    }

    pub fn embedder(&self) -> &E {
        &self.embedder
    }

    /// Whether [`build`](Self::build) has completed successfully.
    pub fn is_built(&self) -> bool {
        self.built.is_some()
    }

    /// Dimension of the stored vectors, once known.
    pub fn dimension(&self) -> Option<usize> {
        self.built.as_ref().and_then(|b| b.dimension).or(self.dimension)
    }

    /// Stored records; empty until built.
    pub fn records(&self) -> &[VectorRecord] {
        match &self.built {
            Some(b) => &b.records,
            None => &[],
        }
    }

    /// Number of indexed chunks.
    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records().is_empty()
    }
}

fn validate(v: &[f32], expected: usize) -> Result<(), EmbeddingError> {
    if v.is_empty() {
        return Err(EmbeddingError::Empty);
    }
    if v.len() != expected {
        return Err(EmbeddingError::DimensionMismatch {
            expected,
            got: v.len(),
        });
    }
    if v.iter().any(|x| !x.is_finite()) {
        return Err(EmbeddingError::NonFinite);
    }
    Ok(())
}

fn normalize(v: &[f32]) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm <= 0.0 {
        return v.to_vec();
    }
    v.iter().map(|x| x / norm).collect()
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("vector index has not been built")]
    NotBuilt,
    #[error("vector index is already built")]
    AlreadyBuilt,
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
}
