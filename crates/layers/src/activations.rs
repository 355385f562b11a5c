//! Activation catalogue for encoder feed-forward stacks.
//!
//! Activations consume tensors shaped `(batch, seq, hidden)` and return
//! tensors with identical layout. Inputs are promoted to the compute dtype
//! requested by [`PrecisionPolicy`] before the non-linearity is evaluated and
//! cast back to the storage dtype afterwards.
//!
//! * **gelu** uses the exact erf formula `0.5 * x * (1 + erf(x / sqrt(2)))`,
//!   which is what BERT and ELECTRA checkpoints were trained with.
//! * **gelu_new** / **gelu_pytorch_tanh** use the tanh approximation.

use std::str::FromStr;

use candle_core::{Result, Tensor};

use crate::{dtypes::PrecisionPolicy, LayerError};

/// Non-linearities named by the `hidden_act` field of a checkpoint config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationKind {
    Gelu,
    GeluTanh,
    Relu,
}

impl ActivationKind {
    pub fn forward(&self, input: &Tensor, policy: &PrecisionPolicy) -> Result<Tensor> {
        let compute = policy.cast_for_compute(input)?;
        let activated = match self {
            ActivationKind::Gelu => compute.gelu_erf()?,
            ActivationKind::GeluTanh => compute.gelu()?,
            ActivationKind::Relu => compute.relu()?,
        };
        policy.cast_to_storage(&activated)
    }
}

impl FromStr for ActivationKind {
    type Err = LayerError;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value {
            "gelu" => Ok(ActivationKind::Gelu),
            "gelu_new" | "gelu_fast" | "gelu_pytorch_tanh" => Ok(ActivationKind::GeluTanh),
            "relu" => Ok(ActivationKind::Relu),
            other => Err(LayerError::UnsupportedActivation(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use std::f64::consts::SQRT_2;

    #[test]
    fn gelu_matches_reference_formula() -> Result<()> {
        let device = Device::Cpu;
        let input = Tensor::from_slice(&[-2.5f32, -0.5, 0.0, 1.0, 3.0], (5,), &device)?;
        let policy = PrecisionPolicy::from_parameter_dtype(DType::F32);
        let output = ActivationKind::Gelu.forward(&input, &policy)?;

        let reference = {
            let scaled = input.affine(1.0 / SQRT_2, 0.0)?;
            let inner = (scaled.erf()? + 1.0)?;
            input.affine(0.5, 0.0)?.mul(&inner)?
        };

        let diff = output.sub(&reference)?.abs()?.max_all()?.to_vec0::<f32>()?;
        assert!(diff < 5e-6);
        Ok(())
    }

    #[test]
    fn reduced_precision_input_keeps_storage_dtype() -> Result<()> {
        let device = Device::Cpu;
        let input = Tensor::from_slice(&[-1.0f32, 0.25, 2.0], (3,), &device)?.to_dtype(DType::F16)?;
        let policy = PrecisionPolicy::from_parameter_dtype(DType::F16);
        let output = ActivationKind::Gelu.forward(&input, &policy)?;
        assert_eq!(output.dtype(), DType::F16);
        Ok(())
    }

    #[test]
    fn parses_hidden_act_names() {
        assert_eq!("gelu".parse::<ActivationKind>().unwrap(), ActivationKind::Gelu);
        assert_eq!("gelu_new".parse::<ActivationKind>().unwrap(), ActivationKind::GeluTanh);
        assert!("swish".parse::<ActivationKind>().is_err());
    }
}
