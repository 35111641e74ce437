//! TOML configuration.
//!
//! Every section and field is optional. Missing values take these
//! defaults: 800-character chunks with 100 characters of overlap, top-3
//! retrieval, local `all-minilm-l6-v2` embeddings, and local
//! `google/flan-t5-small` generation capped at 256 new tokens with
//! temperature 0.4. HTTP backends make a single attempt per request
//! unless `max_retries` is raised.
//!
//! ```toml
//! [chunking]
//! chunk_size = 800
//! chunk_overlap = 100
//!
//! [retrieval]
//! top_k = 3
//!
//! [embedding]
//! provider = "local"   # local | ollama | openai
//!
//! [generation]
//! provider = "local"   # local | ollama | openai
//! max_new_tokens = 256
//! temperature = 0.4
//! ```

use anyhow::{bail, Context, Result};
use docqa_core::generation::GenerationParams;
use docqa_core::pipeline::PipelineConfig;
use serde::Deserialize;
use std::path::Path;

/// Backends accepted for `embedding.provider` and `generation.provider`.
pub const PROVIDERS: &[&str] = &["local", "ollama", "openai"];

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    800
}
fn default_chunk_overlap() -> usize {
    100
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Model id; each provider has its own default.
    #[serde(default)]
    pub model: Option<String>,
    /// Vector size; inferred for known models.
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Extra attempts after a retryable HTTP failure; zero means one try.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_embedding_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_embedding_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Model id; each provider has its own default.
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_max_new_tokens")]
    pub max_new_tokens: usize,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Prompt token limit; each provider has its own default.
    #[serde(default)]
    pub max_input_tokens: Option<usize>,
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            max_new_tokens: default_max_new_tokens(),
            temperature: default_temperature(),
            seed: default_seed(),
            max_input_tokens: None,
            url: None,
            max_retries: default_max_retries(),
            timeout_secs: default_generation_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "local".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    0
}
fn default_embedding_timeout_secs() -> u64 {
    30
}
fn default_generation_timeout_secs() -> u64 {
    120
}
fn default_max_new_tokens() -> usize {
    256
}
fn default_temperature() -> f64 {
    0.4
}
fn default_seed() -> u64 {
    299_792_458
}

impl Config {
    /// The chunking, retrieval, and sampling settings the pipeline needs.
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            chunk_size: self.chunking.chunk_size,
            chunk_overlap: self.chunking.chunk_overlap,
            top_k: self.retrieval.top_k,
            generation: GenerationParams {
                max_new_tokens: self.generation.max_new_tokens,
                temperature: self.generation.temperature,
                seed: self.generation.seed,
            },
        }
    }

    /// Check every value the pipeline and the backends depend on.
    pub fn validate(&self) -> Result<()> {
        self.pipeline_config()
            .validate()
            .map_err(|e| anyhow::anyhow!("{}", e))?;

        for (section, provider) in [
            ("embedding", &self.embedding.provider),
            ("generation", &self.generation.provider),
        ] {
            if !PROVIDERS.contains(&provider.as_str()) {
                bail!(
                    "Unknown {} provider: '{}'. Must be local, ollama, or openai.",
                    section,
                    provider
                );
            }
        }

        if self.embedding.batch_size == 0 {
            bail!("embedding.batch_size must be > 0");
        }
        if self.embedding.dims == Some(0) {
            bail!("embedding.dims must be > 0");
        }
        if self.generation.max_input_tokens == Some(0) {
            bail!("generation.max_input_tokens must be > 0");
        }

        Ok(())
    }
}

/// Read, parse, and validate a TOML config file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config = parse_config(&content)
        .with_context(|| format!("Invalid config file: {}", path.display()))?;

    Ok(config)
}

/// Parse and validate config text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config")?;
    config.validate()?;
    Ok(config)
}
