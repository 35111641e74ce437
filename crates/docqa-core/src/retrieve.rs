//! Top-K retrieval: embed the query, ask the index.

use tracing::debug;

use crate::chunk::Chunk;
use crate::embedding::Embedder;
use crate::error::PipelineError;
use crate::index::{Hit, VectorIndex};

/// Pairs an [`Embedder`] with the [`VectorIndex`] built by it.
pub struct Retriever<'a> {
    embedder: &'a dyn Embedder,
    index: &'a dyn VectorIndex,
}

impl<'a> Retriever<'a> {
    pub fn new(embedder: &'a dyn Embedder, index: &'a dyn VectorIndex) -> Self {
        Self { embedder, index }
    }

    /// Top `k` chunks with their similarity scores, best first.
    ///
    /// An empty index yields an empty result without calling the embedder.
    pub fn retrieve_scored(&self, query: &str, k: usize) -> Result<Vec<Hit<'a>>, PipelineError> {
        if self.index.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let query_vec = self
            .embedder
            .embed_query(query)
            .map_err(PipelineError::embedding)?;
        let index: &'a dyn VectorIndex = self.index;
        let hits = index
            .query(&query_vec, k)
            .map_err(PipelineError::embedding)?;

        debug!(
            k,
            returned = hits.len(),
            top_score = hits.first().map(|h| h.score),
            "retrieved chunks"
        );
        Ok(hits)
    }

    /// Top `k` chunks, best first, scores stripped.
    pub fn retrieve(&self, query: &str, k: usize) -> Result<Vec<&'a Chunk>, PipelineError> {
        Ok(self
            .retrieve_scored(query, k)?
            .into_iter()
            .map(|h| h.chunk)
            .collect())
    }
}
