//! Embedding backends.
//!
//! Concrete [`Embedder`] implementations selected by `embedding.provider`:
//! - **[`LocalEmbedder`]**: runs a sentence-transformer locally via
//!   fastembed; no network calls after the first model download.
//! - **[`OllamaEmbedder`]**: calls a running Ollama instance's `/api/embed`.
//! - **[`OpenAIEmbedder`]**: calls the OpenAI embeddings API.
//!
//! Construction is the load step. [`create_embedder`] is called once per
//! process and the result is shared through an `Arc`.
//!
//! The HTTP backends send texts in batches of `embedding.batch_size` and
//! retry transient failures (see [`crate::http`]).

use anyhow::{bail, Result};
use docqa_core::embedding::Embedder;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::EmbeddingConfig;
use crate::http::{openai_api_key, JsonEndpoint};

pub const DEFAULT_LOCAL_MODEL: &str = "all-minilm-l6-v2";
pub const DEFAULT_OLLAMA_MODEL: &str = "nomic-embed-text";
pub const DEFAULT_OPENAI_MODEL: &str = "text-embedding-3-small";
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const OPENAI_EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";

/// Model id and vector size for `config`, filling in provider defaults.
///
/// `dims` is inferred for well-known models and required otherwise.
pub fn resolve_model(config: &EmbeddingConfig) -> Result<(String, usize)> {
    let model = config.model.clone().unwrap_or_else(|| {
        match config.provider.as_str() {
            "ollama" => DEFAULT_OLLAMA_MODEL,
            "openai" => DEFAULT_OPENAI_MODEL,
            _ => DEFAULT_LOCAL_MODEL,
        }
        .to_string()
    });

    let dims = match config.dims.or_else(|| known_dims(&model)) {
        Some(d) => d,
        None => bail!(
            "embedding.dims required for model '{}' ({} provider)",
            model,
            config.provider
        ),
    };

    Ok((model, dims))
}

fn known_dims(model: &str) -> Option<usize> {
    match model {
        "all-minilm-l6-v2" | "all-minilm" => Some(384),
        "bge-small-en-v1.5" => Some(384),
        "bge-base-en-v1.5" => Some(768),
        "bge-large-en-v1.5" => Some(1024),
        "nomic-embed-text" | "nomic-embed-text-v1" | "nomic-embed-text-v1.5" => Some(768),
        "multilingual-e5-small" => Some(384),
        "multilingual-e5-base" => Some(768),
        "multilingual-e5-large" => Some(1024),
        "text-embedding-3-small" | "text-embedding-ada-002" => Some(1536),
        "text-embedding-3-large" => Some(3072),
        _ => None,
    }
}

/// Load the embedder named by `config.provider`.
///
/// # Errors
///
/// Unknown provider names, missing API keys, unknown local models, and
/// builds without the `local-embeddings-fastembed` feature when
/// `provider = "local"`.
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    let embedder: Arc<dyn Embedder> = match config.provider.as_str() {
        "ollama" => Arc::new(OllamaEmbedder::new(config)?),
        "openai" => Arc::new(OpenAIEmbedder::new(config)?),
        #[cfg(feature = "local-embeddings-fastembed")]
        "local" => Arc::new(LocalEmbedder::new(config)?),
        #[cfg(not(feature = "local-embeddings-fastembed"))]
        "local" => bail!(
            "Local embedding provider requires --features local-embeddings-fastembed"
        ),
        other => bail!("Unknown embedding provider: {}", other),
    };

    info!(
        provider = %config.provider,
        model = embedder.model_name(),
        dims = embedder.dims(),
        "embedding model loaded"
    );
    Ok(embedder)
}

// ============ Local Embedder (fastembed) ============

/// Sentence embeddings computed in-process with fastembed.
///
/// The ONNX model is downloaded from Hugging Face on first use and cached.
/// `TextEmbedding::embed` needs `&mut self`, so the model sits behind a
/// mutex; concurrent queries take turns on it.
#[cfg(feature = "local-embeddings-fastembed")]
pub struct LocalEmbedder {
    model: std::sync::Mutex<fastembed::TextEmbedding>,
    model_name: String,
    dims: usize,
    batch_size: usize,
}

#[cfg(feature = "local-embeddings-fastembed")]
impl LocalEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let (model_name, dims) = resolve_model(config)?;
        let fastembed_model = config_to_fastembed_model(&model_name)?;

        let model = fastembed::TextEmbedding::try_new(
            fastembed::InitOptions::new(fastembed_model).with_show_download_progress(true),
        )
        .map_err(|e| anyhow::anyhow!("Failed to initialize local embedding model: {}", e))?;

        Ok(Self {
            model: std::sync::Mutex::new(model),
            model_name,
            dims,
            batch_size: config.batch_size,
        })
    }
}

#[cfg(feature = "local-embeddings-fastembed")]
impl Embedder for LocalEmbedder {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn dims(&self) -> usize {
        self.dims
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut model = self
            .model
            .lock()
            .map_err(|_| anyhow::anyhow!("local embedding model lock poisoned"))?;
        model
            .embed(texts.to_vec(), Some(self.batch_size))
            .map_err(|e| anyhow::anyhow!("Local embedding failed: {}", e))
    }
}

#[cfg(feature = "local-embeddings-fastembed")]
fn config_to_fastembed_model(name: &str) -> Result<fastembed::EmbeddingModel> {
    match name {
        "all-minilm-l6-v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
        "bge-small-en-v1.5" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" => Ok(fastembed::EmbeddingModel::BGEBaseENV15),
        "bge-large-en-v1.5" => Ok(fastembed::EmbeddingModel::BGELargeENV15),
        "nomic-embed-text-v1" => Ok(fastembed::EmbeddingModel::NomicEmbedTextV1),
        "nomic-embed-text-v1.5" => Ok(fastembed::EmbeddingModel::NomicEmbedTextV15),
        "multilingual-e5-small" => Ok(fastembed::EmbeddingModel::MultilingualE5Small),
        "multilingual-e5-base" => Ok(fastembed::EmbeddingModel::MultilingualE5Base),
        "multilingual-e5-large" => Ok(fastembed::EmbeddingModel::MultilingualE5Large),
        other => bail!(
            "Unknown local embedding model: '{}'. Supported models: \
             all-minilm-l6-v2, bge-small-en-v1.5, bge-base-en-v1.5, bge-large-en-v1.5, \
             nomic-embed-text-v1, nomic-embed-text-v1.5, \
             multilingual-e5-small, multilingual-e5-base, multilingual-e5-large",
            other
        ),
    }
}

// ============ Ollama Embedder ============

/// Embeddings from a local Ollama instance.
///
/// Requires Ollama to be running with the model pulled
/// (e.g. `ollama pull nomic-embed-text`).
pub struct OllamaEmbedder {
    endpoint: JsonEndpoint,
    model: String,
    dims: usize,
    batch_size: usize,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let (model, dims) = resolve_model(config)?;
        let base = config.url.as_deref().unwrap_or(DEFAULT_OLLAMA_URL);
        let endpoint = JsonEndpoint::new(
            "Ollama",
            format!("{}/api/embed", base.trim_end_matches('/')),
            config.timeout_secs,
            config.max_retries,
        )?;
        Ok(Self {
            endpoint,
            model,
            dims,
            batch_size: config.batch_size,
        })
    }
}

impl Embedder for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size.max(1)) {
            let body = serde_json::json!({
                "model": self.model,
                "input": batch,
            });
            let json = self.endpoint.post(&body)?;
            out.extend(parse_ollama_response(&json)?);
            debug!(embedded = out.len(), total = texts.len(), "ollama batch done");
        }
        Ok(out)
    }
}

fn parse_ollama_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: missing embeddings array"))?;

    embeddings
        .iter()
        .map(|embedding| {
            embedding
                .as_array()
                .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: embedding is not an array"))
                .and_then(|values| to_f32_vec(values, "Ollama"))
        })
        .collect()
}

// ============ OpenAI Embedder ============

/// Embeddings from `POST https://api.openai.com/v1/embeddings`.
///
/// Requires the `OPENAI_API_KEY` environment variable.
pub struct OpenAIEmbedder {
    endpoint: JsonEndpoint,
    model: String,
    dims: usize,
    batch_size: usize,
}

impl OpenAIEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let (model, dims) = resolve_model(config)?;
        let api_key = openai_api_key()?;
        let endpoint = JsonEndpoint::new(
            "OpenAI",
            OPENAI_EMBEDDINGS_URL,
            config.timeout_secs,
            config.max_retries,
        )?
        .with_bearer(api_key);
        Ok(Self {
            endpoint,
            model,
            dims,
            batch_size: config.batch_size,
        })
    }
}

impl Embedder for OpenAIEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size.max(1)) {
            let body = serde_json::json!({
                "model": self.model,
                "input": batch,
            });
            let json = self.endpoint.post(&body)?;
            out.extend(parse_openai_response(&json)?);
            debug!(embedded = out.len(), total = texts.len(), "openai batch done");
        }
        Ok(out)
    }
}

/// Extract `data[].embedding`, ordered by each item's `index`.
fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing data array"))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (position, item) in data.iter().enumerate() {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing embedding"))?;
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(position);
        indexed.push((index, to_f32_vec(embedding, "OpenAI")?));
    }

    indexed.sort_by_key(|(i, _)| *i);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

fn to_f32_vec(values: &[serde_json::Value], service: &str) -> Result<Vec<f32>> {
    values
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| anyhow::anyhow!("Invalid {} response: non-numeric value", service))
        })
        .collect()
}
