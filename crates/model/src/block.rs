use std::fmt;

use candle_core::{bail, Result, Tensor};
use candle_nn::{ops::softmax_last_dim, VarBuilder};
use layers::{checks, FeedForward, FeedForwardConfig, LayerNorm, Linear, PrecisionPolicy};

use crate::config::EncoderConfig;

/// Post-norm encoder layer: `norm(x + attn(x))` followed by
/// `norm(h + ffn(h))`, the BERT/ELECTRA layout.
pub struct EncoderBlock {
    hidden_size: usize,
    heads: usize,
    head_dim: usize,
    policy: PrecisionPolicy,
    query: Linear,
    key: Linear,
    value: Linear,
    attn_out: Linear,
    attn_norm: LayerNorm,
    ffn: FeedForward,
    ffn_norm: LayerNorm,
}

impl fmt::Debug for EncoderBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncoderBlock")
            .field("hidden_size", &self.hidden_size)
            .field("heads", &self.heads)
            .field("head_dim", &self.head_dim)
            .finish()
    }
}

impl EncoderBlock {
    /// Loads one `encoder.layer.{i}` entry of a checkpoint.
    pub fn load(config: &EncoderConfig, vb: VarBuilder, policy: PrecisionPolicy) -> Result<Self> {
        let hidden = config.hidden_size;
        let eps = config.layer_norm_eps;

        let attention = vb.pp("attention");
        let self_attn = attention.pp("self");
        let query = Linear::load(self_attn.pp("query"), hidden, hidden)?;
        let key = Linear::load(self_attn.pp("key"), hidden, hidden)?;
        let value = Linear::load(self_attn.pp("value"), hidden, hidden)?;
        let attn_out = Linear::load(attention.pp("output").pp("dense"), hidden, hidden)?;
        let attn_norm = LayerNorm::load(attention.pp("output").pp("LayerNorm"), hidden, eps)?;

        let ff_config =
            FeedForwardConfig::new(hidden, config.intermediate_size, config.activation()?);
        let ffn = FeedForward::load(
            ff_config,
            vb.pp("intermediate").pp("dense"),
            vb.pp("output").pp("dense"),
        )?;
        let ffn_norm = LayerNorm::load(vb.pp("output").pp("LayerNorm"), hidden, eps)?;

        Ok(Self {
            hidden_size: hidden,
            heads: config.num_attention_heads,
            head_dim: config.head_dim(),
            policy,
            query,
            key,
            value,
            attn_out,
            attn_norm,
            ffn,
            ffn_norm,
        })
    }

    fn expand_to_heads(&self, tensor: &Tensor) -> Result<Tensor> {
        let (batch, seq, _) = tensor.dims3()?;
        tensor
            .reshape((batch, seq, self.heads, self.head_dim))?
            .permute((0, 2, 1, 3))?
            .contiguous()
    }

    fn merge_from_heads(&self, tensor: &Tensor) -> Result<Tensor> {
        let dims = tensor.dims();
        if dims.len() != 4 {
            bail!(
                "attention output expected [batch, heads, seq, head_dim] got {:?}",
                dims
            );
        }
        let (batch, seq) = (dims[0], dims[2]);
        tensor
            .permute((0, 2, 1, 3))?
            .reshape((batch, seq, self.hidden_size))
    }

    fn self_attention(&self, hidden: &Tensor, mask: &Tensor) -> Result<Tensor> {
        let q = self.expand_to_heads(&self.query.forward(hidden, &self.policy)?)?;
        let k = self.expand_to_heads(&self.key.forward(hidden, &self.policy)?)?;
        let v = self.expand_to_heads(&self.value.forward(hidden, &self.policy)?)?;

        let q = self.policy.cast_for_reduction(&q)?;
        let k_t = self.policy.cast_for_reduction(&k)?.t()?.contiguous()?;
        let v = self.policy.cast_for_reduction(&v)?;

        let scale = 1.0 / (self.head_dim as f64).sqrt();
        let scores = (q.matmul(&k_t)? * scale)?;
        let scores = scores.broadcast_add(&mask.to_dtype(scores.dtype())?)?;
        let probs = softmax_last_dim(&scores)?;
        let context = probs.matmul(&v)?;

        let merged = self.merge_from_heads(&context)?;
        self.policy.cast_to_storage(&merged)
    }

    /// `mask` is an additive `(batch, 1, 1, seq)` padding mask.
    pub fn forward(&self, hidden: &Tensor, mask: &Tensor) -> Result<Tensor> {
        checks::expect_batch_seq_hidden("encoder.input", hidden, self.hidden_size)?;

        let attended = self.self_attention(hidden, mask)?;
        let projected = self.attn_out.forward(&attended, &self.policy)?;
        let after_attn = self.attn_norm.forward(&(projected + hidden)?, &self.policy)?;

        let ffn_out = self.ffn.forward(&after_attn, &self.policy)?;
        self.ffn_norm.forward(&(ffn_out + &after_attn)?, &self.policy)
    }
}
