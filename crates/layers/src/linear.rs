//! Dense affine projections.
//!
//! Linear layers accept `(batch, seq, in_dim)` or `(rows, in_dim)` inputs and
//! keep the leading layout. Weights follow the checkpoint convention
//! `(out_dim, in_dim)`. Matmuls run in [`PrecisionPolicy::compute`] and the
//! result is cast back to storage.

use candle_core::{DType, Error, Result, Tensor};
use candle_nn::VarBuilder;

use crate::{checks, dtypes::PrecisionPolicy};

const PARAMETER_DTYPES: &[DType] = &[DType::F16, DType::BF16, DType::F32];

/// Dense affine projection with an optional bias.
#[derive(Debug, Clone)]
pub struct Linear {
    input_dim: usize,
    output_dim: usize,
    weight: Tensor,
    bias: Option<Tensor>,
}

impl Linear {
    /// Constructs a linear layer from pre-existing parameters.
    pub fn new(weight: Tensor, bias: Option<Tensor>) -> Result<Self> {
        let (output_dim, input_dim) = weight.dims2()?;
        checks::expect_dtype_in("linear.weight", &weight, PARAMETER_DTYPES)?;
        if let Some(bias) = &bias {
            checks::expect_shape("linear.bias", bias, &[output_dim])?;
            checks::expect_dtype_in("linear.bias", bias, PARAMETER_DTYPES)?;
        }
        Ok(Self {
            input_dim,
            output_dim,
            weight,
            bias,
        })
    }

    /// Loads `weight` and `bias` under the builder's current prefix.
    pub fn load(vb: VarBuilder, input_dim: usize, output_dim: usize) -> Result<Self> {
        let weight = vb.get((output_dim, input_dim), "weight")?;
        let bias = vb.get(output_dim, "bias")?;
        Self::new(weight, Some(bias))
    }

    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    pub fn output_dim(&self) -> usize {
        self.output_dim
    }

    pub fn forward(&self, hidden: &Tensor, policy: &PrecisionPolicy) -> Result<Tensor> {
        let input = policy.cast_for_compute(hidden)?;
        let weight_t = policy.cast_for_compute(&self.weight)?.t()?;

        let mut output = match *input.dims() {
            [batch, seq, dim] if dim == self.input_dim => input
                .reshape((batch * seq, dim))?
                .matmul(&weight_t)?
                .reshape((batch, seq, self.output_dim))?,
            [_, dim] if dim == self.input_dim => input.matmul(&weight_t)?,
            ref dims => {
                return Err(Error::Msg(format!(
                    "linear.input: expected [.., {}] got {:?}",
                    self.input_dim, dims
                )))
            }
        };

        if let Some(bias) = &self.bias {
            output = output.broadcast_add(&policy.cast_for_compute(bias)?)?;
        }

        policy.cast_to_storage(&output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;
    use std::collections::HashMap;

    #[test]
    fn projects_rank_three_inputs() -> Result<()> {
        let device = Device::Cpu;
        let weight = Tensor::from_vec(vec![1f32, 0., 0., 1., 1., 1.], (3, 2), &device)?;
        let bias = Tensor::from_vec(vec![0.5f32, 0., -1.], 3, &device)?;
        let layer = Linear::new(weight, Some(bias))?;
        assert_eq!((layer.input_dim(), layer.output_dim()), (2, 3));

        let input = Tensor::from_vec(vec![1f32, 2., 3., 4.], (1, 2, 2), &device)?;
        let policy = PrecisionPolicy::from_parameter_dtype(DType::F32);
        let output = layer.forward(&input, &policy)?;
        assert_eq!(output.dims(), &[1, 2, 3]);
        assert_eq!(
            output.flatten_all()?.to_vec1::<f32>()?,
            vec![1.5, 2., 2., 3.5, 4., 6.]
        );
        Ok(())
    }

    #[test]
    fn half_precision_output_stays_in_storage_dtype() -> Result<()> {
        let device = Device::Cpu;
        let mut tensors = HashMap::new();
        tensors.insert("dense.weight".to_string(), Tensor::ones((4, 2), DType::F32, &device)?);
        tensors.insert("dense.bias".to_string(), Tensor::zeros(4, DType::F32, &device)?);
        let vb = VarBuilder::from_tensors(tensors, DType::F16, &device);
        let layer = Linear::load(vb.pp("dense"), 2, 4)?;

        let policy = PrecisionPolicy::from_parameter_dtype(DType::F16);
        let input = Tensor::ones((3, 2), DType::F16, &device)?;
        let output = layer.forward(&input, &policy)?;
        assert_eq!(output.dtype(), DType::F16);
        assert_eq!(output.dims(), &[3, 4]);
        Ok(())
    }

    #[test]
    fn rejects_mismatched_inputs() -> Result<()> {
        let device = Device::Cpu;
        let layer = Linear::new(Tensor::ones((3, 2), DType::F32, &device)?, None)?;
        let policy = PrecisionPolicy::from_parameter_dtype(DType::F32);
        let input = Tensor::ones((1, 2, 5), DType::F32, &device)?;
        assert!(layer.forward(&input, &policy).is_err());
        assert!(Linear::new(
            Tensor::ones((3, 2), DType::F32, &device)?,
            Some(Tensor::ones(2, DType::F32, &device)?)
        )
        .is_err());
        Ok(())
    }
}
