//! Local ONNX Runtime embedding provider (all-MiniLM-L6-v2).
//!
//! Tokenizes with the model's `tokenizer.json`, runs the ONNX graph, then
//! mean-pools token embeddings under the attention mask and L2-normalizes.

use std::sync::Mutex;

use anyhow::{Context, Result};
use ort::session::Session;
use ort::value::Tensor;
use tokenizers::Tokenizer;

use super::{EmbeddingProvider, EMBEDDING_DIM};
use crate::config::EmbeddingConfig;

/// all-MiniLM-L6-v2 was trained with 256-token sequences.
const MAX_SEQ_LEN: usize = 256;

pub struct LocalEmbeddingProvider {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
}

// Safety: Tokenizer is Send+Sync and the Session is only touched behind the Mutex.
unsafe impl Send for LocalEmbeddingProvider {}
unsafe impl Sync for LocalEmbeddingProvider {}

impl LocalEmbeddingProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let cache_dir = crate::config::expand_tilde(&config.cache_dir);
        let model_path = cache_dir.join("model.onnx");
        let tokenizer_path = cache_dir.join("tokenizer.json");

        for (what, path) in [("ONNX model", &model_path), ("tokenizer", &tokenizer_path)] {
            anyhow::ensure!(
                path.exists(),
                "{what} not found at {}. Run `concierge model download` first.",
                path.display()
            );
        }

        let session = Session::builder()?
            .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)?
            .with_intra_threads(2)?
            .commit_from_file(&model_path)
            .context("failed to load ONNX model")?;
        tracing::info!(model = %model_path.display(), "ONNX model loaded");

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow::anyhow!("failed to load tokenizer: {e}"))?;
        tokenizer
            .with_truncation(Some(tokenizers::TruncationParams {
                max_length: MAX_SEQ_LEN,
                ..Default::default()
            }))
            .map_err(|e| anyhow::anyhow!("failed to set truncation: {e}"))?;
        tokenizer.with_padding(Some(tokenizers::PaddingParams {
            strategy: tokenizers::PaddingStrategy::BatchLongest,
            ..Default::default()
        }));
        tracing::info!(tokenizer = %tokenizer_path.display(), "tokenizer loaded");

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
        })
    }
}

impl EmbeddingProvider for LocalEmbeddingProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text])?
            .pop()
            .context("embedding batch returned no vectors")
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| anyhow::anyhow!("tokenization failed: {e}"))?;

        let batch_size = encodings.len();
        let seq_len = encodings[0].get_ids().len();

        let input_ids: Vec<i64> = encodings
            .iter()
            .flat_map(|e| e.get_ids().iter().map(|&id| id as i64))
            .collect();
        let attention_mask: Vec<i64> = encodings
            .iter()
            .flat_map(|e| e.get_attention_mask().iter().map(|&m| m as i64))
            .collect();
        // Single-segment input: token types are all zero
        let token_type_ids = vec![0i64; batch_size * seq_len];

        let shape = vec![batch_size as i64, seq_len as i64];
        let input_ids_tensor = Tensor::from_array((shape.clone(), input_ids.into_boxed_slice()))?;
        let attention_mask_tensor =
            Tensor::from_array((shape.clone(), attention_mask.clone().into_boxed_slice()))?;
        let token_type_ids_tensor =
            Tensor::from_array((shape, token_type_ids.into_boxed_slice()))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| anyhow::anyhow!("embedding session lock poisoned: {e}"))?;

        let outputs = session.run(ort::inputs! {
            "input_ids" => input_ids_tensor,
            "attention_mask" => attention_mask_tensor,
            "token_type_ids" => token_type_ids_tensor,
        })?;

        // Output naming differs between ONNX exports
        let token_embeddings = outputs
            .get("token_embeddings")
            .or_else(|| outputs.get("last_hidden_state"))
            .unwrap_or_else(|| &outputs[0]);

        let (dims, data) = token_embeddings
            .try_extract_tensor::<f32>()
            .context("failed to extract token embeddings")?;
        let dims: &[i64] = &dims;
        anyhow::ensure!(
            dims.len() == 3 && dims[2] == EMBEDDING_DIM as i64,
            "unexpected token embedding shape {dims:?}, expected [batch, seq, {EMBEDDING_DIM}]"
        );

        let pooled = mean_pool(data, &attention_mask, batch_size, dims[1] as usize, seq_len);
        Ok(pooled.iter().map(|v| l2_normalize(v)).collect())
    }
}

/// Average token vectors per sequence, weighting each by its attention mask.
///
/// `data` is `[batch, out_seq, EMBEDDING_DIM]` row-major; `mask` is `[batch, mask_seq]`.
fn mean_pool(
    data: &[f32],
    mask: &[i64],
    batch_size: usize,
    out_seq: usize,
    mask_seq: usize,
) -> Vec<Vec<f32>> {
    (0..batch_size)
        .map(|b| {
            let mut sum = vec![0.0f32; EMBEDDING_DIM];
            let mut weight = 0.0f32;
            for s in 0..out_seq.min(mask_seq) {
                let m = mask[b * mask_seq + s] as f32;
                if m == 0.0 {
                    continue;
                }
                let offset = (b * out_seq + s) * EMBEDDING_DIM;
                for (acc, x) in sum.iter_mut().zip(&data[offset..offset + EMBEDDING_DIM]) {
                    *acc += x * m;
                }
                weight += m;
            }
            if weight > 0.0 {
                sum.iter_mut().for_each(|x| *x /= weight);
            }
            sum
        })
        .collect()
}

/// L2-normalize a vector. A zero vector is returned unchanged.
fn l2_normalize(v: &[f32]) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter().map(|x| x / norm).collect()
    } else {
        v.to_vec()
    }
}
