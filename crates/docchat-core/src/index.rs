//! In-memory vector index over embedded segments.
//!
//! The index owns the [`Embedder`] it was built with, so queries are
//! always embedded by the same model (and compared with the same metric)
//! as the stored segments. Search is brute-force cosine similarity over all
//! stored vectors; an index is built once per ingestion batch and is
//! read-only afterwards.

use std::cmp::Ordering;
use std::sync::Arc;

use tracing::debug;

use crate::embedding::{cosine_similarity, Embedder};
use crate::error::{AnswerError, EmbeddingError, NotReadyError};
use crate::models::{EmbeddedSegment, ScoredSegment, TextSegment};

/// Default number of segments retrieved per question.
pub const DEFAULT_TOP_K: usize = 4;

/// Queryable set of embedded segments with uniform dimensionality.
pub struct VectorIndex {
    embedder: Arc<dyn Embedder>,
    entries: Vec<EmbeddedSegment>,
    dims: usize,
}

impl std::fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndex")
            .field("model", &self.embedder.model_name())
            .field("entries", &self.entries.len())
            .field("dims", &self.dims)
            .finish()
    }
}

impl VectorIndex {
    /// Embed `segments` in batches of `batch_size` and index the vectors.
    ///
    /// Fails if the provider errors, returns the wrong number of vectors,
    /// or returns vectors of differing (or zero) dimensionality.
    pub async fn build(
        embedder: Arc<dyn Embedder>,
        segments: Vec<TextSegment>,
        batch_size: usize,
    ) -> Result<Self, EmbeddingError> {
        let batch_size = batch_size.max(1);
        let mut entries = Vec::with_capacity(segments.len());
        let mut dims = 0usize;

        for batch in segments.chunks(batch_size) {
            let texts: Vec<String> = batch.iter().map(|s| s.content.clone()).collect();
            let vectors = embedder.embed(&texts).await?;
            if vectors.len() != texts.len() {
                return Err(EmbeddingError::CountMismatch {
                    expected: texts.len(),
                    got: vectors.len(),
                });
            }
            for (segment, vector) in batch.iter().zip(vectors) {
                if dims == 0 {
                    if vector.is_empty() {
                        return Err(EmbeddingError::Malformed("empty embedding vector".into()));
                    }
                    dims = vector.len();
                } else if vector.len() != dims {
                    return Err(EmbeddingError::DimensionMismatch {
                        expected: dims,
                        got: vector.len(),
                    });
                }
                entries.push(EmbeddedSegment {
                    segment: segment.clone(),
                    vector,
                });
            }
        }

        debug!(
            segments = entries.len(),
            dims,
            model = embedder.model_name(),
            "built vector index"
        );

        Ok(Self {
            embedder,
            entries,
            dims,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Vector dimensionality shared by every entry (0 when empty).
    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn model_name(&self) -> &str {
        self.embedder.model_name()
    }

    /// Return the `k` segments most similar to `query`, best first.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<TextSegment>, AnswerError> {
        Ok(self
            .search_scored(query, k)
            .await?
            .into_iter()
            .map(|hit| hit.segment)
            .collect())
    }

    /// Like [`search`](Self::search), keeping the cosine score of each hit.
    ///
    /// Ties keep build order, so results are stable for a fixed index.
    pub async fn search_scored(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<ScoredSegment>, AnswerError> {
        if self.entries.is_empty() {
            return Err(NotReadyError.into());
        }
        let query_vec = self.embedder.embed_query(query).await?;
        if query_vec.len() != self.dims {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dims,
                got: query_vec.len(),
            }
            .into());
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (i, cosine_similarity(&query_vec, &e.vector)))
            .collect();
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(i, score)| ScoredSegment {
                segment: self.entries[i].segment.clone(),
                score,
            })
            .collect())
    }
}
