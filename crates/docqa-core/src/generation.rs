//! Text generation trait and sampling parameters.
//!
//! Concrete models (candle T5, Ollama, OpenAI) live in the `docqa` app
//! crate. A model is loaded once and shared behind an `Arc`.

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Approximate characters-per-token ratio for models without a tokenizer.
pub const CHARS_PER_TOKEN: usize = 4;

/// Sampling limits applied to every generation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Upper bound on generated tokens.
    pub max_new_tokens: usize,
    /// Sampling temperature; `0.0` means greedy decoding.
    pub temperature: f64,
    /// Seed for sampling backends that accept one.
    pub seed: u64,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_new_tokens: 256,
            temperature: 0.4,
            seed: 299_792_458,
        }
    }
}

/// Trait for text generation backends.
pub trait GenerationModel: Send + Sync {
    /// Returns the model identifier (e.g. `"google/flan-t5-small"`).
    fn model_name(&self) -> &str;

    /// Maximum prompt length the model accepts, in tokens.
    fn max_input_tokens(&self) -> usize;

    /// Count the tokens `text` occupies in a prompt.
    ///
    /// Defaults to a 4 chars ≈ 1 token estimate, rounded up; backends with
    /// a tokenizer should override it.
    fn count_tokens(&self, text: &str) -> usize {
        text.chars().count().div_ceil(CHARS_PER_TOKEN)
    }

    /// Generate an answer for `prompt`.
    fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String>;
}
