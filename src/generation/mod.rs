//! Generation backends.
//!
//! Concrete [`GenerationModel`] implementations selected by
//! `generation.provider`:
//!
//! | Provider | Backend | Default model | Prompt limit |
//! |----------|---------|---------------|--------------|
//! | `local`  | candle T5 on CPU | `google/flan-t5-small` | 512 tokens |
//! | `ollama` | `POST {url}/api/generate` | `llama3.2` | 4096 tokens |
//! | `openai` | `POST /v1/chat/completions` | `gpt-4o-mini` | 16000 tokens |
//!
//! `generation.max_input_tokens` overrides the prompt limit. The HTTP
//! backends estimate prompt size with the 4-characters-per-token
//! heuristic; the local backend counts with the model's own tokenizer.

#[cfg(feature = "local-generation-candle")]
mod local_t5;

#[cfg(feature = "local-generation-candle")]
pub use local_t5::LocalT5Generator;

use anyhow::{bail, Result};
use docqa_core::generation::{GenerationModel, GenerationParams};
use std::sync::Arc;
use tracing::info;

use crate::config::GenerationConfig;
use crate::http::{openai_api_key, JsonEndpoint};

pub const DEFAULT_LOCAL_MODEL: &str = "google/flan-t5-small";
pub const DEFAULT_OLLAMA_MODEL: &str = "llama3.2";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Model id and prompt token limit for `config`, filling in provider
/// defaults.
pub fn resolve_model(config: &GenerationConfig) -> (String, usize) {
    let (model, limit) = match config.provider.as_str() {
        "ollama" => (DEFAULT_OLLAMA_MODEL, 4096),
        "openai" => (DEFAULT_OPENAI_MODEL, 16_000),
        _ => (DEFAULT_LOCAL_MODEL, 512),
    };
    (
        config.model.clone().unwrap_or_else(|| model.to_string()),
        config.max_input_tokens.unwrap_or(limit),
    )
}

/// Load the generator named by `config.provider`.
pub fn create_generator(config: &GenerationConfig) -> Result<Arc<dyn GenerationModel>> {
    let generator: Arc<dyn GenerationModel> = match config.provider.as_str() {
        "ollama" => Arc::new(OllamaGenerator::new(config)?),
        "openai" => Arc::new(OpenAIGenerator::new(config)?),
        #[cfg(feature = "local-generation-candle")]
        "local" => Arc::new(LocalT5Generator::new(config)?),
        #[cfg(not(feature = "local-generation-candle"))]
        "local" => bail!("Local generation provider requires --features local-generation-candle"),
        other => bail!("Unknown generation provider: {}", other),
    };

    info!(
        provider = %config.provider,
        model = generator.model_name(),
        max_input_tokens = generator.max_input_tokens(),
        "generation model loaded"
    );
    Ok(generator)
}

// ============ Ollama Generator ============

/// Completions from a local Ollama instance, non-streaming.
pub struct OllamaGenerator {
    endpoint: JsonEndpoint,
    model: String,
    max_input_tokens: usize,
}

impl OllamaGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let (model, max_input_tokens) = resolve_model(config);
        let base = config.url.as_deref().unwrap_or(DEFAULT_OLLAMA_URL);
        let endpoint = JsonEndpoint::new(
            "Ollama",
            format!("{}/api/generate", base.trim_end_matches('/')),
            config.timeout_secs,
            config.max_retries,
        )?;
        Ok(Self {
            endpoint,
            model,
            max_input_tokens,
        })
    }
}

impl GenerationModel for OllamaGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn max_input_tokens(&self) -> usize {
        self.max_input_tokens
    }

    fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "options": {
                "num_predict": params.max_new_tokens,
                "temperature": params.temperature,
                "seed": params.seed,
            },
        });
        let json = self.endpoint.post(&body)?;
        parse_ollama_response(&json)
    }
}

fn parse_ollama_response(json: &serde_json::Value) -> Result<String> {
    if let Some(err) = json.get("error").and_then(|e| e.as_str()) {
        bail!("Ollama error: {}", err);
    }
    json.get("response")
        .and_then(|r| r.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: missing response field"))
}

// ============ OpenAI Generator ============

/// Completions from the OpenAI chat API, the prompt sent as one user
/// message.
///
/// Requires the `OPENAI_API_KEY` environment variable.
pub struct OpenAIGenerator {
    endpoint: JsonEndpoint,
    model: String,
    max_input_tokens: usize,
}

impl OpenAIGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let (model, max_input_tokens) = resolve_model(config);
        let api_key = openai_api_key()?;
        let endpoint = JsonEndpoint::new(
            "OpenAI",
            OPENAI_CHAT_URL,
            config.timeout_secs,
            config.max_retries,
        )?
        .with_bearer(api_key);
        Ok(Self {
            endpoint,
            model,
            max_input_tokens,
        })
    }
}

impl GenerationModel for OpenAIGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn max_input_tokens(&self) -> usize {
        self.max_input_tokens
    }

    fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "max_tokens": params.max_new_tokens,
            "temperature": params.temperature,
            "seed": params.seed,
        });
        let json = self.endpoint.post(&body)?;
        parse_openai_response(&json)
    }
}

fn parse_openai_response(json: &serde_json::Value) -> Result<String> {
    let choice = json
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: no choices"))?;

    choice
        .get("message")
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing message content"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(provider: &str) -> GenerationConfig {
        GenerationConfig {
            provider: provider.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_resolve_provider_defaults() {
        assert_eq!(
            resolve_model(&config("local")),
            ("google/flan-t5-small".to_string(), 512)
        );
        assert_eq!(resolve_model(&config("ollama")).0, "llama3.2");
        assert_eq!(resolve_model(&config("openai")).1, 16_000);
    }

    #[test]
    fn test_resolve_overrides() {
        let mut cfg = config("local");
        cfg.model = Some("google/flan-t5-base".to_string());
        cfg.max_input_tokens = Some(256);
        assert_eq!(
            resolve_model(&cfg),
            ("google/flan-t5-base".to_string(), 256)
        );
    }

    #[test]
    fn test_unknown_provider() {
        let err = create_generator(&config("gpt2-cli")).err().unwrap();
        assert!(err.to_string().contains("Unknown generation provider"));
    }

    #[test]
    fn test_ollama_generator_uses_char_heuristic() {
        let generator = OllamaGenerator::new(&config("ollama")).unwrap();
        assert_eq!(generator.count_tokens("abcdefgh"), 2);
        assert_eq!(generator.max_input_tokens(), 4096);
    }

    #[test]
    fn test_parse_ollama_response() {
        let json = json!({"model": "llama3.2", "response": "Cats are mammals.", "done": true});
        assert_eq!(parse_ollama_response(&json).unwrap(), "Cats are mammals.");
    }

    #[test]
    fn test_parse_ollama_error_body() {
        let json = json!({"error": "model 'llama3.2' not found"});
        let err = parse_ollama_response(&json).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_parse_openai_response() {
        let json = json!({
            "id": "chatcmpl-1",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "I don't know."},
                "finish_reason": "stop"
            }]
        });
        assert_eq!(parse_openai_response(&json).unwrap(), "I don't know.");
    }

    #[test]
    fn test_parse_openai_without_choices() {
        assert!(parse_openai_response(&json!({"choices": []})).is_err());
        assert!(parse_openai_response(&json!({})).is_err());
    }
}
