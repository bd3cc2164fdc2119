use candle_core::{DType, Device, Module, Tensor, D};
use candle_nn::{Linear, VarBuilder};
use std::path::Path;

use crate::bert::{linear, EncoderLayer, FeedForward, LayerNorm, SelfAttention};
use crate::error::{QaError, Result};
use crate::qa::{QueryResult, QuestionAnswerer};

/// Longest answer span considered, in tokens.
pub const MAX_ANSWER_TOKENS: usize = 15;

// ---------------------------------------------------------------------------
// Config (hardcoded for distilbert-base-cased-distilled-squad)
// ---------------------------------------------------------------------------

struct DistilBertConfig {
    dim: usize,
    hidden_dim: usize,
    n_heads: usize,
    n_layers: usize,
    vocab_size: usize,
    max_position_embeddings: usize,
    layer_norm_eps: f64,
}

impl DistilBertConfig {
    fn base_cased_squad() -> Self {
        Self {
            dim: 768,
            hidden_dim: 3072,
            n_heads: 12,
            n_layers: 6,
            vocab_size: 28996,
            max_position_embeddings: 512,
            layer_norm_eps: 1e-12,
        }
    }
}

fn load_layer(vb: VarBuilder, config: &DistilBertConfig) -> Result<EncoderLayer> {
    let d = config.dim;
    let attn_vb = vb.pp("attention");

    let attention = SelfAttention {
        query: linear(d, d, attn_vb.pp("q_lin"))?,
        key: linear(d, d, attn_vb.pp("k_lin"))?,
        value: linear(d, d, attn_vb.pp("v_lin"))?,
        output: linear(d, d, attn_vb.pp("out_lin"))?,
        num_heads: config.n_heads,
        head_dim: d / config.n_heads,
    };
    let attention_norm = LayerNorm::load(vb.pp("sa_layer_norm"), d, config.layer_norm_eps)?;
    let ffn = FeedForward {
        up: linear(d, config.hidden_dim, vb.pp("ffn").pp("lin1"))?,
        down: linear(config.hidden_dim, d, vb.pp("ffn").pp("lin2"))?,
    };
    let output_norm = LayerNorm::load(vb.pp("output_layer_norm"), d, config.layer_norm_eps)?;

    Ok(EncoderLayer {
        attention,
        attention_norm,
        ffn,
        output_norm,
    })
}

struct DistilBertForQa {
    word_embeddings: Tensor,
    position_embeddings: Tensor,
    embedding_norm: LayerNorm,
    layers: Vec<EncoderLayer>,
    qa_outputs: Linear,
    config: DistilBertConfig,
}

impl DistilBertForQa {
    fn load(path: &Path, device: &Device) -> Result<Self> {
        let config = DistilBertConfig::base_cased_squad();

        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[path], DType::F32, device)? };
        let base = vb.pp("distilbert");

        let emb_vb = base.pp("embeddings");
        let word_embeddings = emb_vb
            .pp("word_embeddings")
            .get((config.vocab_size, config.dim), "weight")?;
        let position_embeddings = emb_vb
            .pp("position_embeddings")
            .get((config.max_position_embeddings, config.dim), "weight")?;
        let embedding_norm =
            LayerNorm::load(emb_vb.pp("LayerNorm"), config.dim, config.layer_norm_eps)?;

        let mut layers = Vec::with_capacity(config.n_layers);
        for i in 0..config.n_layers {
            layers.push(load_layer(
                base.pp("transformer").pp("layer").pp(i.to_string()),
                &config,
            )?);
        }

        let qa_outputs = linear(config.dim, 2, vb.pp("qa_outputs"))?;

        Ok(Self {
            word_embeddings,
            position_embeddings,
            embedding_norm,
            layers,
            qa_outputs,
            config,
        })
    }

    /// `(seq_len, 2)` tensor of start and end logits.
    fn forward(&self, token_ids: &[u32]) -> Result<Tensor> {
        let device = self.word_embeddings.device();
        let seq_len = token_ids.len();

        let ids = Tensor::new(token_ids, device)?;
        let word_emb = self.word_embeddings.index_select(&ids, 0)?;

        let position_ids: Vec<u32> = (0..seq_len as u32).collect();
        let position_ids = Tensor::new(position_ids.as_slice(), device)?;
        let pos_emb = self.position_embeddings.index_select(&position_ids, 0)?;

        let mut hidden = self.embedding_norm.forward(&(word_emb + pos_emb)?)?;
        hidden = hidden.unsqueeze(0)?;

        for layer in &self.layers {
            hidden = layer.forward(&hidden)?;
        }

        Ok(self.qa_outputs.forward(&hidden)?.squeeze(0)?)
    }
}

/// Picks `(s, e)` over positions of `start_probs`/`end_probs` maximising
/// `start_probs[s] * end_probs[e]` with `s <= e < s + max_len`.
pub(crate) fn best_span(
    start_probs: &[f32],
    end_probs: &[f32],
    max_len: usize,
) -> (usize, usize, f32) {
    let n = start_probs.len().min(end_probs.len());
    let mut best = (0, 0, f32::NEG_INFINITY);
    for s in 0..n {
        for e in s..(s + max_len).min(n) {
            let score = start_probs[s] * end_probs[e];
            if score > best.2 {
                best = (s, e, score);
            }
        }
    }
    best
}

/// Maps `(rows, 2)` logits back onto `context`. `sequence_ids` and `offsets`
/// describe the full encoding; `logits` may cover only a truncated prefix.
pub(crate) fn extract_span(
    logits: &Tensor,
    sequence_ids: &[Option<usize>],
    offsets: &[(usize, usize)],
    context: &str,
) -> Result<QueryResult> {
    let rows = logits.dim(0)?;

    // Only context tokens may start or end an answer.
    let context_positions: Vec<u32> = (0..rows.min(sequence_ids.len()))
        .filter(|&i| sequence_ids[i] == Some(1))
        .map(|i| i as u32)
        .collect();
    if context_positions.is_empty() {
        if sequence_ids.iter().any(|id| *id == Some(1)) {
            return Err(QaError::Tokenizer(
                "question exceeds reader input".to_string(),
            ));
        }
        return Err(QaError::EmptyContext);
    }

    let index = Tensor::new(context_positions.as_slice(), logits.device())?;
    let context_logits = logits.index_select(&index, 0)?;
    let probs = |column: usize| -> Result<Vec<f32>> {
        let col = context_logits.narrow(1, column, 1)?.squeeze(1)?;
        Ok(candle_nn::ops::softmax(&col, D::Minus1)?.to_vec1::<f32>()?)
    };

    let (s, e, score) = best_span(&probs(0)?, &probs(1)?, MAX_ANSWER_TOKENS);
    let start = offsets[context_positions[s] as usize].0;
    let end = offsets[context_positions[e] as usize].1;
    let answer = context
        .get(start..end)
        .ok_or_else(|| QaError::Tokenizer(format!("offsets {start}..{end} outside context")))?
        .to_string();
    tracing::debug!(start, end, score, "reader span selected");

    Ok(QueryResult {
        answer,
        score,
        start,
        end,
    })
}

// ---------------------------------------------------------------------------
// Public DistilBertQa
// ---------------------------------------------------------------------------

pub struct DistilBertQa {
    model: DistilBertForQa,
    tokenizer: tokenizers::Tokenizer,
}

impl DistilBertQa {
    pub fn load(model_path: &Path, tokenizer_path: &Path) -> Result<Self> {
        let device = Device::Cpu;
        let model = DistilBertForQa::load(model_path, &device)
            .map_err(|e| QaError::ModelLoad(format!("{}: {e}", model_path.display())))?;

        let tokenizer = tokenizers::Tokenizer::from_file(tokenizer_path)
            .map_err(|e| QaError::Tokenizer(format!("load {}: {e}", tokenizer_path.display())))?;

        tracing::info!(model = %model_path.display(), "loaded DistilBERT reader");
        Ok(Self { model, tokenizer })
    }
}

impl QuestionAnswerer for DistilBertQa {
    fn answer(&self, question: &str, context: &str) -> Result<QueryResult> {
        if context.trim().is_empty() {
            return Err(QaError::EmptyContext);
        }

        let encoding = self
            .tokenizer
            .encode((question, context), true)
            .map_err(|e| QaError::Tokenizer(format!("encode: {e}")))?;

        let max_len = self.model.config.max_position_embeddings;
        let mut ids = encoding.get_ids();
        if ids.len() > max_len {
            tracing::warn!(tokens = ids.len(), max = max_len, "truncating reader input");
            ids = &ids[..max_len];
        }

        let logits = self.model.forward(ids)?;
        extract_span(
            &logits,
            &encoding.get_sequence_ids(),
            encoding.get_offsets(),
            context,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTEXT: &str = "Frankfurt is Germany’s finance hub";

    // [CLS] which city [SEP] Frankfurt is Germany ’ s finance hub [SEP]
    fn encoding() -> (Vec<Option<usize>>, Vec<(usize, usize)>) {
        let sequence_ids = vec![
            None,
            Some(0),
            Some(0),
            None,
            Some(1),
            Some(1),
            Some(1),
            Some(1),
            Some(1),
            Some(1),
            Some(1),
            None,
        ];
        let offsets = vec![
            (0, 0),
            (0, 5),
            (6, 10),
            (0, 0),
            (0, 9),
            (10, 12),
            (13, 20),
            (20, 23),
            (23, 24),
            (25, 32),
            (33, 36),
            (0, 0),
        ];
        (sequence_ids, offsets)
    }

    fn logits(rows: &[(f32, f32)]) -> Tensor {
        let flat: Vec<f32> = rows.iter().flat_map(|&(s, e)| [s, e]).collect();
        Tensor::from_vec(flat, (rows.len(), 2), &Device::Cpu).unwrap()
    }

    #[test]
    fn best_span_respects_order_and_length() {
        // The best end precedes the best start, so the span must settle elsewhere.
        let start = [0.1, 0.1, 0.7, 0.1];
        let end = [0.6, 0.1, 0.2, 0.1];
        let (s, e, score) = best_span(&start, &end, 15);
        assert!(s <= e);
        assert_eq!((s, e), (2, 2));
        assert!((score - 0.14).abs() < 1e-6);

        let start = [0.9, 0.1, 0.0];
        let end = [0.0, 0.0, 1.0];
        let (s, e, _) = best_span(&start, &end, 2);
        assert!(e - s < 2);
    }

    #[test]
    fn span_is_sliced_across_multibyte_apostrophe() {
        let (sequence_ids, offsets) = encoding();
        let mut rows = vec![(0.0, 0.0); 12];
        rows[6].0 = 8.0; // "Germany"
        rows[8].1 = 8.0; // "s"

        let result = extract_span(&logits(&rows), &sequence_ids, &offsets, CONTEXT).unwrap();
        assert_eq!(result.answer, "Germany’s");
        assert_eq!((result.start, result.end), (13, 24));
        assert_eq!(&CONTEXT[result.start..result.end], result.answer);
        assert!(result.score > 0.0 && result.score <= 1.0);
    }

    #[test]
    fn question_tokens_never_win() {
        let (sequence_ids, offsets) = encoding();
        let mut rows = vec![(0.0, 0.0); 12];
        rows[0] = (50.0, 50.0);
        rows[1] = (40.0, 40.0);
        rows[2] = (40.0, 40.0);
        rows[4] = (1.0, 1.0); // "Frankfurt"

        let result = extract_span(&logits(&rows), &sequence_ids, &offsets, CONTEXT).unwrap();
        assert_eq!(result.answer, "Frankfurt");
        assert_eq!(result.start, 0);
    }

    #[test]
    fn truncated_logits_only_consider_covered_tokens() {
        let (sequence_ids, offsets) = encoding();
        // Rows stop after "Germany"; the later context tokens were cut off.
        let mut rows = vec![(0.0, 0.0); 7];
        rows[5] = (5.0, 0.0); // "is"
        rows[6] = (0.0, 5.0); // "Germany"

        let result = extract_span(&logits(&rows), &sequence_ids, &offsets, CONTEXT).unwrap();
        assert_eq!(result.answer, "is Germany");
    }

    #[test]
    fn question_filling_the_input_is_reported() {
        let (sequence_ids, offsets) = encoding();
        let err = extract_span(&logits(&[(0.0, 0.0); 3]), &sequence_ids, &offsets, CONTEXT)
            .unwrap_err();
        assert!(
            matches!(&err, QaError::Tokenizer(msg) if msg == "question exceeds reader input"),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn encoding_without_context_is_empty_context() {
        let sequence_ids = vec![None, Some(0), None];
        let offsets = vec![(0, 0), (0, 5), (0, 0)];
        let err = extract_span(&logits(&[(0.0, 0.0); 3]), &sequence_ids, &offsets, "")
            .unwrap_err();
        assert!(matches!(err, QaError::EmptyContext));
    }

    #[test]
    fn distilbert_answers_from_context() {
        let base = Path::new(env!("CARGO_MANIFEST_DIR"))
            .parent()
            .unwrap()
            .parent()
            .unwrap()
            .join("models");
        let model_path = base.join("distilbert-base-cased-distilled-squad.safetensors");
        let tokenizer_path = base.join("distilbert-base-cased-distilled-squad-tokenizer.json");
        if !model_path.exists() || !tokenizer_path.exists() {
            eprintln!("Skipping: distilbert-base-cased-distilled-squad not found");
            return;
        }

        let reader = DistilBertQa::load(&model_path, &tokenizer_path).unwrap();
        let context = "Frankfurt is Germany’s finance hub; fintech and quantitative roles \
                       are concentrated there and in Berlin.";
        let a = reader.answer("Which city is the finance hub?", context).unwrap();
        let b = reader.answer("Which city is the finance hub?", context).unwrap();

        assert_eq!(a, b);
        assert!(a.answer.contains("Frankfurt"));
        assert!((0.0..=1.0).contains(&a.score));
    }
}
