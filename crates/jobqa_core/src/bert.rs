//! Encoder building blocks shared by the MiniLM embedder and the DistilBERT
//! reader. Both are post-norm BERT encoders; only the tensor names differ.

use candle_core::{DType, Module, Tensor, D};
use candle_nn::{Linear, VarBuilder};

use crate::error::Result;

// ---------------------------------------------------------------------------
// Layer norm (with bias)
// ---------------------------------------------------------------------------

pub(crate) struct LayerNorm {
    weight: Tensor,
    bias: Tensor,
    eps: f64,
}

impl LayerNorm {
    pub(crate) fn load(vb: VarBuilder, hidden_size: usize, eps: f64) -> Result<Self> {
        let weight = vb.get(hidden_size, "weight")?;
        let bias = vb.get(hidden_size, "bias")?;
        Ok(Self { weight, bias, eps })
    }

    pub(crate) fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let x_dtype = x.dtype();
        let x = x.to_dtype(DType::F32)?;
        let mean = x.mean_keepdim(D::Minus1)?;
        let diff = x.broadcast_sub(&mean)?;
        let var = diff.sqr()?.mean_keepdim(D::Minus1)?;
        let std = (var + self.eps)?.sqrt()?;
        let normed = diff.broadcast_div(&std)?;
        let out = normed
            .broadcast_mul(&self.weight)?
            .broadcast_add(&self.bias)?;
        Ok(out.to_dtype(x_dtype)?)
    }
}

// ---------------------------------------------------------------------------
// Multi-head self-attention (separate Q/K/V with biases, no mask)
// ---------------------------------------------------------------------------

pub(crate) struct SelfAttention {
    pub(crate) query: Linear,
    pub(crate) key: Linear,
    pub(crate) value: Linear,
    pub(crate) output: Linear,
    pub(crate) num_heads: usize,
    pub(crate) head_dim: usize,
}

impl SelfAttention {
    /// Single-sequence attention; inputs are never padded so no mask is needed.
    pub(crate) fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let (batch, seq_len, _) = x.dims3()?;

        let split_heads = |t: Tensor| -> Result<Tensor> {
            Ok(t.reshape((batch, seq_len, self.num_heads, self.head_dim))?
                .transpose(1, 2)?
                .contiguous()?)
        };

        let q = split_heads(self.query.forward(x)?)?;
        let k = split_heads(self.key.forward(x)?)?;
        let v = split_heads(self.value.forward(x)?)?;

        let scale = (self.head_dim as f64).sqrt();
        let attn_weights = q.matmul(&k.t()?)?.affine(1.0 / scale, 0.0)?;
        let attn_weights = candle_nn::ops::softmax(&attn_weights, D::Minus1)?;
        let attn_out = attn_weights.matmul(&v)?;

        let attn_out = attn_out.transpose(1, 2)?.contiguous()?.reshape((
            batch,
            seq_len,
            self.num_heads * self.head_dim,
        ))?;

        Ok(self.output.forward(&attn_out)?)
    }
}

// ---------------------------------------------------------------------------
// Feed-forward (up + GELU + down)
// ---------------------------------------------------------------------------

pub(crate) struct FeedForward {
    pub(crate) up: Linear,
    pub(crate) down: Linear,
}

impl FeedForward {
    pub(crate) fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let h = self.up.forward(x)?.gelu_erf()?;
        Ok(self.down.forward(&h)?)
    }
}

// ---------------------------------------------------------------------------
// Encoder layer: attention + norm, FFN + norm (residual, post-norm)
// ---------------------------------------------------------------------------

pub(crate) struct EncoderLayer {
    pub(crate) attention: SelfAttention,
    pub(crate) attention_norm: LayerNorm,
    pub(crate) ffn: FeedForward,
    pub(crate) output_norm: LayerNorm,
}

impl EncoderLayer {
    pub(crate) fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let attn = self.attention.forward(x)?;
        let x = self.attention_norm.forward(&(x + attn)?)?;
        let h = self.ffn.forward(&x)?;
        self.output_norm.forward(&(x + h)?)
    }
}

pub(crate) fn linear(in_dim: usize, out_dim: usize, vb: VarBuilder) -> Result<Linear> {
    Ok(candle_nn::linear(in_dim, out_dim, vb)?)
}
