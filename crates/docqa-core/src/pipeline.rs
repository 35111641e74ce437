//! Build-once, query-many RAG pipeline.
//!
//! # Build phase
//!
//! 1. Validate the [`PipelineConfig`].
//! 2. Reject blank text before any model call.
//! 3. Chunk the text; zero chunks is also an empty document.
//! 4. Embed every chunk in one batch call and check the vectors.
//! 5. Build the [`VectorIndex`].
//!
//! # Query phase
//!
//! Retrieve the top-K chunks, assemble the prompt under the generator's
//! input budget, and generate. Queries take `&self`, carry no memory of
//! earlier queries, and a failed query leaves the pipeline usable.
//!
//! Models are loaded by the caller and passed in as [`Models`], so a
//! process loads each model once and reuses it for every document.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::chunk::{chunk_text, Chunk};
use crate::embedding::Embedder;
use crate::error::PipelineError;
use crate::generation::{GenerationModel, GenerationParams};
use crate::index::{is_finite, FlatIndex, Hit, VectorIndex};
use crate::prompt;
use crate::retrieve::Retriever;

/// Tuning for chunking, retrieval, and generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Maximum characters per chunk.
    pub chunk_size: usize,
    /// Characters shared by consecutive chunks.
    pub chunk_overlap: usize,
    /// Chunks retrieved per question.
    pub top_k: usize,
    pub generation: GenerationParams,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_size: 800,
            chunk_overlap: 100,
            top_k: 3,
            generation: GenerationParams::default(),
        }
    }
}

impl PipelineConfig {
    /// Check value ranges.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.chunk_size == 0 {
            return Err(PipelineError::InvalidConfig(
                "chunk_size must be > 0".to_string(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(PipelineError::InvalidConfig(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.top_k == 0 {
            return Err(PipelineError::InvalidConfig(
                "top_k must be >= 1".to_string(),
            ));
        }
        if self.generation.max_new_tokens == 0 {
            return Err(PipelineError::InvalidConfig(
                "max_new_tokens must be >= 1".to_string(),
            ));
        }
        if !self.generation.temperature.is_finite() || self.generation.temperature < 0.0 {
            return Err(PipelineError::InvalidConfig(
                "temperature must be a finite value >= 0.0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Loaded models shared by every pipeline in the process.
#[derive(Clone)]
pub struct Models {
    pub embedder: Arc<dyn Embedder>,
    pub generator: Arc<dyn GenerationModel>,
}

impl Models {
    pub fn new(embedder: Arc<dyn Embedder>, generator: Arc<dyn GenerationModel>) -> Self {
        Self {
            embedder,
            generator,
        }
    }
}

/// A generated answer and the chunks it was conditioned on.
#[derive(Debug, Clone)]
pub struct Answer<'a> {
    pub text: String,
    /// Retrieved chunks, best first.
    pub sources: Vec<Hit<'a>>,
    /// How many of `sources` fit into the prompt.
    pub chunks_used: usize,
}

/// A document indexed and ready for questions.
pub struct Pipeline<I: VectorIndex = FlatIndex> {
    index: I,
    models: Models,
    config: PipelineConfig,
}

/// Fail with [`PipelineError::EmptyDocument`] if `text` has nothing to index.
///
/// Callers that load models lazily can use this to fail before loading.
pub fn ensure_document(text: &str) -> Result<(), PipelineError> {
    if text.trim().is_empty() {
        return Err(PipelineError::EmptyDocument);
    }
    Ok(())
}

/// Build a pipeline over `text` using the in-memory [`FlatIndex`].
pub fn build_pipeline(
    text: &str,
    config: &PipelineConfig,
    models: &Models,
) -> Result<Pipeline, PipelineError> {
    Pipeline::build(text, config.clone(), models.clone())
}

/// Answer one question against a built pipeline.
pub fn answer_query<I: VectorIndex>(
    pipeline: &Pipeline<I>,
    question: &str,
) -> Result<String, PipelineError> {
    pipeline.answer(question).map(|a| a.text)
}

impl<I: VectorIndex> Pipeline<I> {
    /// Chunk, embed, and index `text`.
    pub fn build(text: &str, config: PipelineConfig, models: Models) -> Result<Self, PipelineError> {
        config.validate()?;
        ensure_document(text)?;

        let started = Instant::now();
        let chunks: Vec<Chunk> = chunk_text(text, config.chunk_size, config.chunk_overlap).collect();
        if chunks.is_empty() {
            return Err(PipelineError::EmptyDocument);
        }
        debug!(chunks = chunks.len(), "chunked document");

        let embedder = models.embedder.as_ref();
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = embedder.embed(&texts).map_err(PipelineError::embedding)?;
        check_vectors(embedder, chunks.len(), &vectors)?;

        let entries: Vec<(Chunk, Vec<f32>)> = chunks.into_iter().zip(vectors).collect();
        let index = I::build(entries).map_err(PipelineError::embedding)?;

        info!(
            chunks = index.len(),
            dims = index.dims(),
            model = embedder.model_name(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "pipeline built"
        );

        Ok(Self {
            index,
            models,
            config,
        })
    }

    /// Retrieve the top-K chunks for `question`.
    pub fn retrieve(&self, question: &str) -> Result<Vec<Hit<'_>>, PipelineError> {
        Retriever::new(self.models.embedder.as_ref(), &self.index)
            .retrieve_scored(question, self.config.top_k)
    }

    /// Retrieve, assemble the prompt, and generate.
    pub fn answer(&self, question: &str) -> Result<Answer<'_>, PipelineError> {
        let started = Instant::now();
        let sources = self.retrieve(question)?;
        let ranked: Vec<&Chunk> = sources.iter().map(|h| h.chunk).collect();

        let generator = self.models.generator.as_ref();
        let prompt = prompt::assemble(&ranked, question, generator)?;
        debug!(
            chunks_used = prompt.chunks_used,
            prompt_tokens = generator.count_tokens(&prompt.text),
            "prompt assembled"
        );

        let text = generator
            .generate(&prompt.text, &self.config.generation)
            .map_err(PipelineError::generation)?;

        info!(
            retrieved = sources.len(),
            model = generator.model_name(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "answered question"
        );

        Ok(Answer {
            text: text.trim().to_string(),
            sources,
            chunks_used: prompt.chunks_used,
        })
    }

    /// Number of indexed chunks.
    pub fn chunk_count(&self) -> usize {
        self.index.len()
    }
}

/// Reject embedder output that does not line up with the chunks.
fn check_vectors(
    embedder: &dyn Embedder,
    expected: usize,
    vectors: &[Vec<f32>],
) -> Result<(), PipelineError> {
    if vectors.len() != expected {
        return Err(PipelineError::Embedding(format!(
            "expected {} vectors, embedder returned {}",
            expected,
            vectors.len()
        )));
    }
    let dims = embedder.dims();
    if let Some((i, v)) = vectors.iter().enumerate().find(|(_, v)| v.len() != dims) {
        return Err(PipelineError::Embedding(format!(
            "vector {} has {} dimensions, {} expects {}",
            i,
            v.len(),
            embedder.model_name(),
            dims
        )));
    }
    if let Some(i) = vectors.iter().position(|v| !is_finite(v)) {
        return Err(PipelineError::Embedding(format!(
            "vector {} from {} has a non-finite component",
            i,
            embedder.model_name()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedEmbedder {
        dims: usize,
        returned_dims: usize,
        fill: f32,
    }

    impl Embedder for FixedEmbedder {
        fn model_name(&self) -> &str {
            "fixed"
        }
        fn dims(&self) -> usize {
            self.dims
        }
        fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![self.fill; self.returned_dims]).collect())
        }
    }

    struct Silent;

    impl GenerationModel for Silent {
        fn model_name(&self) -> &str {
            "silent"
        }
        fn max_input_tokens(&self) -> usize {
            4096
        }
        fn generate(&self, _prompt: &str, _params: &GenerationParams) -> anyhow::Result<String> {
            Ok("  ok \n".to_string())
        }
    }

    fn models(dims: usize, returned_dims: usize) -> Models {
        Models::new(
            Arc::new(FixedEmbedder {
                dims,
                returned_dims,
                fill: 1.0,
            }),
            Arc::new(Silent),
        )
    }

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.chunk_size, 800);
        assert_eq!(config.chunk_overlap, 100);
        assert_eq!(config.top_k, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_overlap_not_below_size() {
        let config = PipelineConfig {
            chunk_size: 100,
            chunk_overlap: 100,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn test_validate_rejects_zero_top_k_and_negative_temperature() {
        let mut config = PipelineConfig {
            top_k: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        config.top_k = 3;
        config.generation.temperature = -0.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_blank_document_is_empty() {
        let result = build_pipeline(" \n\t ", &PipelineConfig::default(), &models(4, 4));
        assert!(matches!(result, Err(PipelineError::EmptyDocument)));
    }

    #[test]
    fn test_wrong_vector_dims_is_embedding_failure() {
        let result = build_pipeline("some text", &PipelineConfig::default(), &models(4, 3));
        assert!(matches!(result, Err(PipelineError::Embedding(_))));
    }

    #[test]
    fn test_nan_vectors_are_embedding_failure() {
        let models = Models::new(
            Arc::new(FixedEmbedder {
                dims: 2,
                returned_dims: 2,
                fill: f32::NAN,
            }),
            Arc::new(Silent),
        );
        let result = build_pipeline("hello world", &PipelineConfig::default(), &models);
        match result {
            Err(PipelineError::Embedding(msg)) => assert!(msg.contains("non-finite"), "{}", msg),
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("NaN vectors were accepted"),
        }
    }

    #[test]
    fn test_answer_is_trimmed() {
        let pipeline = build_pipeline("some text", &PipelineConfig::default(), &models(4, 4)).unwrap();
        assert_eq!(pipeline.chunk_count(), 1);
        assert_eq!(answer_query(&pipeline, "q").unwrap(), "ok");
    }

    #[test]
    fn test_pipeline_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Pipeline>();
    }
}
