//! Additive padding masks for bidirectional self-attention.
//!
//! Masks are `f32` tensors shaped `(batch, 1, 1, k_len)` holding `0.0` for
//! valid keys and `-inf` for padded ones, so they broadcast over heads and
//! query positions when added to attention scores.

use candle_core::{DType, Device, Error, Result, Tensor};

pub const MASK_DTYPE: DType = DType::F32;

/// Construct padding masks from per-row valid key lengths.
///
/// Every row must keep at least one key, otherwise softmax over the row is
/// undefined.
pub fn padding_mask_from_lengths(
    device: &Device,
    key_lengths: &[usize],
    k_len: usize,
) -> Result<Tensor> {
    let batch = key_lengths.len();
    let mut data = vec![0f32; batch * k_len];

    for (b, &valid) in key_lengths.iter().enumerate() {
        if valid == 0 {
            return Err(Error::Msg(format!("row {b} has no valid positions")));
        }
        let valid = valid.min(k_len);
        let row_start = b * k_len;
        for value in &mut data[row_start + valid..row_start + k_len] {
            *value = f32::NEG_INFINITY;
        }
    }

    Tensor::from_vec(data, (batch, 1, 1, k_len), device)
}

/// Valid lengths from an attention mask where `1` marks real tokens.
pub fn lengths_from_attention_mask(rows: &[&[u32]]) -> Vec<usize> {
    rows.iter()
        .map(|row| row.iter().filter(|&&flag| flag != 0).count())
        .collect()
}
