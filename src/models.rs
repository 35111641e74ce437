//! The explicit model-loading step.
//!
//! [`load_models`] builds the configured embedder and generator once. The
//! resulting [`Models`] handle is cloned into every pipeline the process
//! builds, so switching documents never reloads a model.

use anyhow::{Context, Result};
use docqa_core::pipeline::Models;

use crate::config::Config;
use crate::embedding::create_embedder;
use crate::generation::create_generator;

/// Load the embedding and generation models named in `config`.
pub fn load_models(config: &Config) -> Result<Models> {
    let embedder = create_embedder(&config.embedding)
        .with_context(|| format!("Failed to load {} embedder", config.embedding.provider))?;
    let generator = create_generator(&config.generation)
        .with_context(|| format!("Failed to load {} generator", config.generation.provider))?;
    Ok(Models::new(embedder, generator))
}

/// Human-readable names of the models `config` will load, for progress
/// output before the (possibly slow) load starts.
pub fn model_labels(config: &Config) -> (String, String) {
    let embedder = crate::embedding::resolve_model(&config.embedding)
        .map(|(model, _)| model)
        .unwrap_or_else(|_| config.embedding.provider.clone());
    let (generator, _) = crate::generation::resolve_model(&config.generation);
    (embedder, generator)
}
