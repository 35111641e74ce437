//! Error taxonomy for pipeline builds and queries.
//!
//! Build-phase errors abort construction, so no partially built
//! [`Pipeline`](crate::pipeline::Pipeline) is ever handed out. Query-phase
//! errors are scoped to the one query and leave the pipeline usable.
//!
//! An empty retrieval result is not an error.

use thiserror::Error;

/// Failure of a pipeline build or a single query.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The source document could not be converted to text.
    #[error("text extraction failed: {0}")]
    Extraction(String),

    /// The extracted text was blank or produced zero chunks.
    #[error("document is empty: nothing to index")]
    EmptyDocument,

    /// The embedding model failed or returned malformed vectors.
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// The generation model failed, or the prompt cannot fit its input
    /// limit even after truncation.
    #[error("generation failed: {0}")]
    Generation(String),

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl PipelineError {
    /// Wrap a backend error as an embedding failure, keeping its context chain.
    pub fn embedding(err: anyhow::Error) -> Self {
        PipelineError::Embedding(format!("{:#}", err))
    }

    /// Wrap a backend error as a generation failure, keeping its context chain.
    pub fn generation(err: anyhow::Error) -> Self {
        PipelineError::Generation(format!("{:#}", err))
    }
}
