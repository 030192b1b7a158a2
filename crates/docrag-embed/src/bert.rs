use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Context as _, Result};
use async_trait::async_trait;
use candle_core::{Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig, DTYPE};
use tokenizers::Tokenizer;

use docrag_core::traits::Embedder;

use crate::device::select_device;
use crate::pool::masked_mean_l2;
use crate::tokenize::tokenize_on_device;

const BACKEND: &str = "local-embedder";

/// Sentence-transformer (BERT family, e.g. all-MiniLM-L6-v2) running locally on candle.
pub struct BertEmbedder {
    model_id: String,
    inner: Arc<Inner>,
}

struct Inner {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    max_len: usize,
}

impl BertEmbedder {
    /// Load `config.json`, `tokenizer.json` and weights from `model_dir`.
    ///
    /// Weights are read from `model.safetensors`, falling back to `pytorch_model.bin`.
    pub fn load(model_id: impl Into<String>, model_dir: &Path, max_len: usize) -> docrag_core::Result<Self> {
        let model_id = model_id.into();
        let inner = Inner::load(model_dir, max_len.max(1)).map_err(|e| {
            docrag_core::Error::InvalidConfig(format!(
                "failed to load embedding model from {}: {e:#}",
                model_dir.display()
            ))
        })?;
        Ok(Self { model_id, inner: Arc::new(inner) })
    }
}

impl Inner {
    fn load(model_dir: &Path, max_len: usize) -> Result<Self> {
        let device = select_device();
        let start = Instant::now();

        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("failed to load tokenizer from {}: {e}", tokenizer_path.display()))?;

        let config_path = model_dir.join("config.json");
        let raw = std::fs::read_to_string(&config_path)
            .with_context(|| format!("reading {}", config_path.display()))?;
        let config: BertConfig = serde_json::from_str(&raw)
            .with_context(|| format!("parsing {}", config_path.display()))?;

        let weights = load_weights(model_dir, &device)?;
        let vb = VarBuilder::from_tensors(weights, DTYPE, &device);
        let model = BertModel::load(vb, &config)?;

        tracing::info!(
            model_dir = %model_dir.display(),
            hidden_size = config.hidden_size,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "embedding model loaded"
        );
        Ok(Self { model, tokenizer, device, max_len })
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let enc = tokenize_on_device(&self.tokenizer, text, self.max_len, &self.device)?;
        let hidden = self.model.forward(&enc.input_ids, &enc.token_type_ids, Some(&enc.attention_mask))?;
        let pooled: Tensor = masked_mean_l2(&hidden, &enc.attention_mask)?;
        Ok(pooled.to_device(&Device::Cpu)?.squeeze(0)?.to_vec1()?)
    }
}

fn load_weights(model_dir: &Path, device: &Device) -> Result<HashMap<String, Tensor>> {
    let safetensors: PathBuf = model_dir.join("model.safetensors");
    if safetensors.exists() {
        return Ok(candle_core::safetensors::load(&safetensors, device)?);
    }
    let pickle = model_dir.join("pytorch_model.bin");
    if pickle.exists() {
        let tensors = candle_core::pickle::read_all(&pickle)?;
        return Ok(tensors.into_iter().collect());
    }
    Err(anyhow!("no model.safetensors or pytorch_model.bin in {}", model_dir.display()))
}

#[async_trait]
impl Embedder for BertEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn embed(&self, text: &str) -> docrag_core::Result<Vec<f32>> {
        let inner = Arc::clone(&self.inner);
        let text = text.to_owned();
        let start = Instant::now();
        let vector = tokio::task::spawn_blocking(move || inner.embed(&text))
            .await
            .map_err(|e| docrag_core::Error::fatal(BACKEND, format!("embedding task failed: {e}")))?
            .map_err(|e| docrag_core::Error::fatal(BACKEND, format!("{e:#}")))?;
        tracing::debug!(dim = vector.len(), elapsed_ms = start.elapsed().as_millis() as u64, "embedded text");
        Ok(vector)
    }
}
