use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use std::path::Path;

use crate::bert::{linear, EncoderLayer, FeedForward, LayerNorm, SelfAttention};
use crate::embed::EmbeddingProvider;
use crate::error::{QaError, Result};

// ---------------------------------------------------------------------------
// Config (hardcoded for all-MiniLM-L6-v2)
// ---------------------------------------------------------------------------

struct MiniLmConfig {
    hidden_size: usize,
    intermediate_size: usize,
    num_attention_heads: usize,
    head_dim: usize,
    num_hidden_layers: usize,
    vocab_size: usize,
    max_position_embeddings: usize,
    type_vocab_size: usize,
    layer_norm_eps: f64,
}

impl MiniLmConfig {
    fn all_minilm_l6_v2() -> Self {
        Self {
            hidden_size: 384,
            intermediate_size: 1536,
            num_attention_heads: 12,
            head_dim: 32,
            num_hidden_layers: 6,
            vocab_size: 30522,
            max_position_embeddings: 512,
            type_vocab_size: 2,
            layer_norm_eps: 1e-12,
        }
    }
}

fn load_layer(vb: VarBuilder, config: &MiniLmConfig) -> Result<EncoderLayer> {
    let h = config.hidden_size;
    let attn_vb = vb.pp("attention");

    let attention = SelfAttention {
        query: linear(h, h, attn_vb.pp("self").pp("query"))?,
        key: linear(h, h, attn_vb.pp("self").pp("key"))?,
        value: linear(h, h, attn_vb.pp("self").pp("value"))?,
        output: linear(h, h, attn_vb.pp("output").pp("dense"))?,
        num_heads: config.num_attention_heads,
        head_dim: config.head_dim,
    };
    let attention_norm = LayerNorm::load(
        attn_vb.pp("output").pp("LayerNorm"),
        h,
        config.layer_norm_eps,
    )?;
    let ffn = FeedForward {
        up: linear(h, config.intermediate_size, vb.pp("intermediate").pp("dense"))?,
        down: linear(config.intermediate_size, h, vb.pp("output").pp("dense"))?,
    };
    let output_norm = LayerNorm::load(vb.pp("output").pp("LayerNorm"), h, config.layer_norm_eps)?;

    Ok(EncoderLayer {
        attention,
        attention_norm,
        ffn,
        output_norm,
    })
}

// ---------------------------------------------------------------------------
// Full model
// ---------------------------------------------------------------------------

struct MiniLmModel {
    word_embeddings: Tensor,
    position_embeddings: Tensor,
    token_type_embeddings: Tensor,
    embedding_norm: LayerNorm,
    layers: Vec<EncoderLayer>,
    config: MiniLmConfig,
}

impl MiniLmModel {
    fn load(path: &Path, device: &Device) -> Result<Self> {
        let config = MiniLmConfig::all_minilm_l6_v2();

        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[path], DType::F32, device)? };

        let emb_vb = vb.pp("embeddings");
        let word_embeddings = emb_vb
            .pp("word_embeddings")
            .get((config.vocab_size, config.hidden_size), "weight")?;
        let position_embeddings = emb_vb.pp("position_embeddings").get(
            (config.max_position_embeddings, config.hidden_size),
            "weight",
        )?;
        let token_type_embeddings = emb_vb
            .pp("token_type_embeddings")
            .get((config.type_vocab_size, config.hidden_size), "weight")?;
        let embedding_norm = LayerNorm::load(
            emb_vb.pp("LayerNorm"),
            config.hidden_size,
            config.layer_norm_eps,
        )?;

        let mut layers = Vec::with_capacity(config.num_hidden_layers);
        for i in 0..config.num_hidden_layers {
            layers.push(load_layer(
                vb.pp("encoder").pp("layer").pp(i.to_string()),
                &config,
            )?);
        }

        Ok(Self {
            word_embeddings,
            position_embeddings,
            token_type_embeddings,
            embedding_norm,
            layers,
            config,
        })
    }

    fn forward(&self, token_ids: &[u32]) -> Result<Vec<f32>> {
        let device = self.word_embeddings.device();
        let token_ids = if token_ids.len() > self.config.max_position_embeddings {
            tracing::warn!(
                tokens = token_ids.len(),
                max = self.config.max_position_embeddings,
                "truncating embedder input"
            );
            &token_ids[..self.config.max_position_embeddings]
        } else {
            token_ids
        };
        let seq_len = token_ids.len();

        let ids = Tensor::new(token_ids, device)?;
        let word_emb = self.word_embeddings.index_select(&ids, 0)?;

        let position_ids: Vec<u32> = (0..seq_len as u32).collect();
        let position_ids = Tensor::new(position_ids.as_slice(), device)?;
        let pos_emb = self.position_embeddings.index_select(&position_ids, 0)?;

        let token_type_ids = Tensor::zeros(seq_len, DType::U32, device)?;
        let type_emb = self
            .token_type_embeddings
            .index_select(&token_type_ids, 0)?;

        let mut hidden = ((word_emb + pos_emb)? + type_emb)?;
        hidden = self.embedding_norm.forward(&hidden)?;
        hidden = hidden.unsqueeze(0)?;

        for layer in &self.layers {
            hidden = layer.forward(&hidden)?;
        }

        // Mean pooling + L2 normalize
        let pooled = hidden.mean(1)?.squeeze(0)?;
        let norm_val: f32 = pooled.sqr()?.sum_all()?.sqrt()?.to_scalar()?;
        let normalized = if norm_val > 0.0 {
            pooled.affine(1.0 / norm_val as f64, 0.0)?
        } else {
            pooled
        };

        Ok(normalized.to_vec1::<f32>()?)
    }
}

// ---------------------------------------------------------------------------
// Public MiniLmEmbeddingProvider
// ---------------------------------------------------------------------------

pub struct MiniLmEmbeddingProvider {
    model: MiniLmModel,
    tokenizer: tokenizers::Tokenizer,
}

impl MiniLmEmbeddingProvider {
    pub fn load(model_path: &Path, tokenizer_path: &Path) -> Result<Self> {
        let device = Device::Cpu;
        let model = MiniLmModel::load(model_path, &device)
            .map_err(|e| QaError::ModelLoad(format!("{}: {e}", model_path.display())))?;

        let tokenizer = tokenizers::Tokenizer::from_file(tokenizer_path)
            .map_err(|e| QaError::Tokenizer(format!("load {}: {e}", tokenizer_path.display())))?;

        tracing::info!(model = %model_path.display(), "loaded MiniLM embedder");
        Ok(Self { model, tokenizer })
    }
}

impl EmbeddingProvider for MiniLmEmbeddingProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| QaError::Tokenizer(format!("encode: {e}")))?;
        self.model.forward(encoding.get_ids())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model_dir() -> std::path::PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .parent()
            .unwrap()
            .parent()
            .unwrap()
            .join("models")
    }

    fn load_or_skip() -> Option<MiniLmEmbeddingProvider> {
        let base = model_dir();
        let model_path = base.join("all-MiniLM-L6-v2.safetensors");
        let tokenizer_path = base.join("all-MiniLM-L6-v2-tokenizer.json");
        if !model_path.exists() || !tokenizer_path.exists() {
            eprintln!("Skipping: all-MiniLM-L6-v2 model or tokenizer not found");
            return None;
        }
        Some(MiniLmEmbeddingProvider::load(&model_path, &tokenizer_path).unwrap())
    }

    #[test]
    fn test_minilm_embed_basic() {
        let Some(provider) = load_or_skip() else {
            return;
        };
        let embedding = provider.embed("Which cities hire ML engineers?").unwrap();

        assert_eq!(embedding.len(), 384);
        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!(
            (norm - 1.0).abs() < 0.01,
            "L2 norm should be ~1.0, got {norm}"
        );
    }

    #[test]
    fn test_minilm_embed_similarity() {
        let Some(provider) = load_or_skip() else {
            return;
        };

        let e1 = provider.embed("Where are fintech jobs in Germany?").unwrap();
        let e2 = provider
            .embed("Frankfurt is Germany's finance hub for fintech roles.")
            .unwrap();
        let e3 = provider.embed("How do I bake sourdough bread?").unwrap();

        let sim_related: f32 = e1.iter().zip(e2.iter()).map(|(a, b)| a * b).sum();
        let sim_unrelated: f32 = e1.iter().zip(e3.iter()).map(|(a, b)| a * b).sum();

        assert!(
            sim_related > sim_unrelated,
            "related texts should have higher similarity"
        );
    }
}
