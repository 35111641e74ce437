//! Local seq2seq generation with candle's T5 (flan-t5 family) on CPU.
//!
//! `config.json`, `tokenizer.json` and `model.safetensors` are fetched from
//! the Hugging Face Hub once, on construction, and cached by `hf-hub`.
//! Later loads read from the cache without network access.

use anyhow::{Context, Result};
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::generation::LogitsProcessor;
use candle_transformers::models::t5;
use docqa_core::generation::{GenerationModel, GenerationParams};
use hf_hub::api::sync::Api;
use std::sync::Mutex;
use tokenizers::Tokenizer;
use tracing::debug;

use super::resolve_model;
use crate::config::GenerationConfig;

/// A T5 encoder-decoder loaded into memory.
///
/// Encoding and decoding mutate the model's KV cache, so the model sits
/// behind a mutex. The tokenizer is read-only and shared freely.
pub struct LocalT5Generator {
    model: Mutex<t5::T5ForConditionalGeneration>,
    tokenizer: Tokenizer,
    device: Device,
    model_name: String,
    max_input_tokens: usize,
    decoder_start_token_id: u32,
    eos_token_id: u32,
}

impl LocalT5Generator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let (model_name, max_input_tokens) = resolve_model(config);
        let device = Device::Cpu;

        let api = Api::new().context("Failed to initialize Hugging Face Hub client")?;
        let repo = api.model(model_name.clone());
        let config_path = repo
            .get("config.json")
            .with_context(|| format!("Failed to fetch config.json for {}", model_name))?;
        let tokenizer_path = repo
            .get("tokenizer.json")
            .with_context(|| format!("Failed to fetch tokenizer.json for {}", model_name))?;
        let weights_path = repo
            .get("model.safetensors")
            .with_context(|| format!("Failed to fetch model.safetensors for {}", model_name))?;

        let raw = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;
        let mut t5_config: t5::Config =
            serde_json::from_str(&raw).context("Invalid T5 config.json")?;
        t5_config.use_cache = true;

        let tokenizer = Tokenizer::from_file(&tokenizer_path).map_err(anyhow::Error::msg)?;

        // SAFETY: the weights file is owned by the hf-hub cache and is not
        // modified while mapped.
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path], DType::F32, &device)?
        };
        let model = t5::T5ForConditionalGeneration::load(vb, &t5_config)
            .with_context(|| format!("Failed to load T5 weights for {}", model_name))?;

        let decoder_start_token_id = t5_config
            .decoder_start_token_id
            .unwrap_or(t5_config.pad_token_id) as u32;

        Ok(Self {
            model: Mutex::new(model),
            tokenizer,
            device,
            model_name,
            max_input_tokens,
            decoder_start_token_id,
            eos_token_id: t5_config.eos_token_id as u32,
        })
    }
}

impl GenerationModel for LocalT5Generator {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn max_input_tokens(&self) -> usize {
        self.max_input_tokens
    }

    fn count_tokens(&self, text: &str) -> usize {
        match self.tokenizer.encode(text, true) {
            Ok(encoding) => encoding.len(),
            Err(_) => text
                .chars()
                .count()
                .div_ceil(docqa_core::generation::CHARS_PER_TOKEN),
        }
    }

    fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        let encoding = self
            .tokenizer
            .encode(prompt, true)
            .map_err(anyhow::Error::msg)?;
        let mut prompt_ids = encoding.get_ids().to_vec();
        // Keep the trailing </s> when clipping an over-long prompt.
        if prompt_ids.len() > self.max_input_tokens {
            prompt_ids.truncate(self.max_input_tokens.saturating_sub(1));
            prompt_ids.push(self.eos_token_id);
        }

        let mut model = self
            .model
            .lock()
            .map_err(|_| anyhow::anyhow!("T5 model lock poisoned"))?;

        let output_ids = with_fresh_cache(&mut *model, |model| {
            let input_ids = Tensor::new(prompt_ids.as_slice(), &self.device)?.unsqueeze(0)?;
            let encoder_output = model.encode(&input_ids)?;

            let mut logits_processor =
                LogitsProcessor::new(params.seed, sampling_temperature(params.temperature), None);
            let mut output_ids = vec![self.decoder_start_token_id];

            for step in 0..params.max_new_tokens {
                let decoder_ids = if step == 0 {
                    Tensor::new(output_ids.as_slice(), &self.device)?.unsqueeze(0)?
                } else {
                    let last = output_ids[output_ids.len() - 1];
                    Tensor::new(&[last], &self.device)?.unsqueeze(0)?
                };
                let logits = model
                    .decode(&decoder_ids, &encoder_output)?
                    .squeeze(0)?
                    .to_dtype(DType::F32)?;
                let next = logits_processor.sample(&logits)?;
                if next == self.eos_token_id {
                    break;
                }
                output_ids.push(next);
            }
            Ok(output_ids)
        })?;
        drop(model);

        debug!(
            prompt_tokens = prompt_ids.len(),
            new_tokens = output_ids.len() - 1,
            "t5 generation finished"
        );

        self.tokenizer
            .decode(&output_ids[1..], true)
            .map_err(anyhow::Error::msg)
    }
}

/// A model holding decoder state between calls.
trait KvCache {
    fn clear_kv_cache(&mut self);
}

impl KvCache for t5::T5ForConditionalGeneration {
    fn clear_kv_cache(&mut self) {
        t5::T5ForConditionalGeneration::clear_kv_cache(self)
    }
}

/// Run `f` on a model with an empty KV cache, and leave the cache empty
/// afterwards whether `f` succeeded or not.
fn with_fresh_cache<M, T>(model: &mut M, f: impl FnOnce(&mut M) -> Result<T>) -> Result<T>
where
    M: KvCache,
{
    model.clear_kv_cache();
    let result = f(model);
    model.clear_kv_cache();
    result
}

/// Greedy decoding for a zero temperature, sampling otherwise.
fn sampling_temperature(temperature: f64) -> Option<f64> {
    if temperature <= 0.0 {
        None
    } else {
        Some(temperature)
    }
}
