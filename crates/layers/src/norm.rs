//! LayerNorm with unified shape and dtype handling.
//!
//! Inputs follow the `(batch, seq, hidden)` convention. Normalisation happens
//! along the last axis while the mean and variance are computed in
//! [`PrecisionPolicy::reduction`] before the output is cast back to storage.

use candle_core::{DType, Result, Tensor, D};
use candle_nn::{Init, VarBuilder};

use crate::{checks, dtypes::PrecisionPolicy};

const PARAMETER_DTYPES: &[DType] = &[DType::F16, DType::BF16, DType::F32];

/// Standard LayerNorm with learnable scale and bias.
#[derive(Debug, Clone)]
pub struct LayerNorm {
    hidden_size: usize,
    epsilon: f64,
    weight: Tensor,
    bias: Tensor,
}

impl LayerNorm {
    pub fn new(weight: Tensor, bias: Tensor, epsilon: f64) -> Result<Self> {
        let hidden_size = weight.dims1()?;
        checks::expect_shape("norm.weight", &weight, &[hidden_size])?;
        checks::expect_shape("norm.bias", &bias, &[hidden_size])?;
        checks::expect_dtype_in("norm.weight", &weight, PARAMETER_DTYPES)?;
        checks::expect_dtype_in("norm.bias", &bias, PARAMETER_DTYPES)?;
        Ok(Self {
            hidden_size,
            epsilon,
            weight,
            bias,
        })
    }

    /// Loads `weight` and `bias` under the builder's current prefix.
    pub fn load(vb: VarBuilder, hidden_size: usize, epsilon: f64) -> Result<Self> {
        let weight = vb.get_with_hints(hidden_size, "weight", Init::Const(1.0))?;
        let bias = vb.get_with_hints(hidden_size, "bias", Init::Const(0.0))?;
        Self::new(weight, bias, epsilon)
    }

    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    pub fn forward(&self, hidden: &Tensor, policy: &PrecisionPolicy) -> Result<Tensor> {
        checks::expect_batch_seq_hidden("norm.input", hidden, self.hidden_size)?;

        let hidden_size = self.hidden_size as f64;
        let compute = policy.cast_for_reduction(hidden)?;

        let mean = (compute.sum_keepdim(D::Minus1)? / hidden_size)?;
        let centered = compute.broadcast_sub(&mean)?;
        let variance = (centered.sqr()?.sum_keepdim(D::Minus1)? / hidden_size)?;
        let denom = (variance + self.epsilon)?.sqrt()?;
        let normalized = centered.broadcast_div(&denom)?;

        let weight = self.weight.to_dtype(normalized.dtype())?;
        let bias = self.bias.to_dtype(normalized.dtype())?;
        let affine = normalized.broadcast_mul(&weight)?.broadcast_add(&bias)?;

        policy.cast_to_storage(&affine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;
    use candle_nn::ops;

    fn build_input(
        device: &Device,
        dtype: DType,
        batch: usize,
        seq: usize,
        hidden: usize,
    ) -> Result<Tensor> {
        let total = batch * seq * hidden;
        let data = (0..total)
            .map(|i| (i as f32 * 0.25_f32) - 1.5_f32)
            .collect::<Vec<_>>();
        Tensor::from_vec(data, (batch, seq, hidden), device)?.to_dtype(dtype)
    }

    fn max_diff(a: &Tensor, b: &Tensor) -> Result<f32> {
        a.to_dtype(DType::F32)?
            .sub(&b.to_dtype(DType::F32)?)?
            .abs()?
            .max_all()?
            .to_vec0::<f32>()
    }

    #[test]
    fn layer_norm_matches_reference_across_dtypes() -> Result<()> {
        let device = Device::Cpu;
        let hidden = 4;
        let epsilon = 1e-12;

        let weight_f32 = Tensor::from_vec(vec![1.0f32, 0.5, -0.25, 1.5], (hidden,), &device)?;
        let bias_f32 = Tensor::from_vec(vec![0.1f32, -0.2, 0.05, 0.0], (hidden,), &device)?;

        for &dtype in PARAMETER_DTYPES {
            let input = build_input(&device, dtype, 2, 3, hidden)?;
            let weight = weight_f32.to_dtype(dtype)?;
            let bias = bias_f32.to_dtype(dtype)?;
            let layer = LayerNorm::new(weight.clone(), bias.clone(), epsilon)?;
            let policy = PrecisionPolicy::from_parameter_dtype(dtype);
            let output = layer.forward(&input, &policy)?;

            assert_eq!(output.dims(), input.dims());
            assert_eq!(output.dtype(), dtype);

            let reference = ops::layer_norm(
                &input.to_dtype(DType::F32)?,
                &weight_f32,
                &bias_f32,
                epsilon as f32,
            )?;
            let tol = match dtype {
                DType::F16 => 5e-3,
                DType::BF16 => 3e-2,
                _ => 5e-4,
            };
            let diff = max_diff(&output, &reference)?;
            assert!(diff < tol, "max diff {} for dtype {:?}", diff, dtype);
        }

        Ok(())
    }

    #[test]
    fn load_reads_named_parameters() -> Result<()> {
        let device = Device::Cpu;
        let mut tensors = std::collections::HashMap::new();
        tensors.insert(
            "LayerNorm.weight".to_string(),
            Tensor::from_vec(vec![2.0f32, 2.0], (2,), &device)?,
        );
        tensors.insert(
            "LayerNorm.bias".to_string(),
            Tensor::from_vec(vec![1.0f32, 1.0], (2,), &device)?,
        );
        let vb = VarBuilder::from_tensors(tensors, DType::F32, &device);
        let layer = LayerNorm::load(vb.pp("LayerNorm"), 2, 1e-12)?;
        assert_eq!(layer.hidden_size(), 2);

        let input = Tensor::from_vec(vec![-1.0f32, 1.0], (1, 1, 2), &device)?;
        let policy = PrecisionPolicy::from_parameter_dtype(DType::F32);
        let output = layer.forward(&input, &policy)?.flatten_all()?.to_vec1::<f32>()?;
        assert!((output[0] + 1.0).abs() < 1e-4);
        assert!((output[1] - 3.0).abs() < 1e-4);
        Ok(())
    }

    #[test]
    fn rejects_mismatched_hidden_size() -> Result<()> {
        let device = Device::Cpu;
        let layer = LayerNorm::new(
            Tensor::ones(4, DType::F32, &device)?,
            Tensor::zeros(4, DType::F32, &device)?,
            1e-12,
        )?;
        let input = build_input(&device, DType::F32, 1, 2, 3)?;
        let policy = PrecisionPolicy::from_parameter_dtype(DType::F32);
        assert!(layer.forward(&input, &policy).is_err());
        assert!(LayerNorm::new(
            Tensor::ones(4, DType::F32, &device)?,
            Tensor::zeros(3, DType::F32, &device)?,
            1e-12,
        )
        .is_err());
        Ok(())
    }
}
