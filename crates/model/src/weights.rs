//! Checkpoint weights held independently of any compute device.
//!
//! Tensors are read on the CPU and cast to the requested [`Precision`] once.
//! [`ModelWeights::build`] then instantiates a [`TokenClassifier`] on any
//! device from the same tensors, so moving inference to another device does
//! not re-read the checkpoint.

use std::collections::HashMap;
use std::path::Path;

use candle_core::{DType, Device, Error, Result, Tensor};
use candle_nn::VarBuilder;
use layers::Precision;

use crate::{config::EncoderConfig, model::TokenClassifier};

#[derive(Debug, Clone)]
pub struct ModelWeights {
    config: EncoderConfig,
    precision: Precision,
    tensors: HashMap<String, Tensor>,
}

impl ModelWeights {
    /// Reads `model.safetensors` (or a legacy `pytorch_model.bin`) from disk.
    pub fn load(config: EncoderConfig, weights: &Path, precision: Precision) -> Result<Self> {
        let is_pickle = weights
            .extension()
            .is_some_and(|ext| ext == "bin" || ext == "pt" || ext == "pth");
        let tensors: HashMap<String, Tensor> = if is_pickle {
            candle_core::pickle::read_all(weights)?.into_iter().collect()
        } else {
            candle_core::safetensors::load(weights, &Device::Cpu)?
        };
        log::info!(
            "read {} tensors from {} (precision={precision})",
            tensors.len(),
            weights.display()
        );
        Self::from_tensors(config, tensors, precision)
    }

    /// Normalises checkpoint names and casts floating tensors to `precision`.
    pub fn from_tensors(
        config: EncoderConfig,
        tensors: HashMap<String, Tensor>,
        precision: Precision,
    ) -> Result<Self> {
        config.validate()?;
        let prefix = format!("{}.", config.model_type);
        let has_prefix = tensors.keys().any(|name| name.starts_with(&prefix));

        let dtype = precision.dtype();
        let mut normalized = HashMap::with_capacity(tensors.len());
        for (name, tensor) in tensors {
            if !tensor.dtype().is_float() {
                continue;
            }
            let mut name = rename_legacy_norm(&name);
            if !has_prefix && is_encoder_tensor(&name) {
                name = format!("{prefix}{name}");
            }
            let tensor = tensor.to_device(&Device::Cpu)?.to_dtype(dtype)?;
            normalized.insert(name, tensor);
        }

        let probe = format!("{prefix}embeddings.word_embeddings.weight");
        if !normalized.contains_key(&probe) {
            return Err(Error::Msg(format!(
                "checkpoint does not contain '{probe}'; is model_type '{}' correct?",
                config.model_type
            )));
        }

        Ok(Self {
            config,
            precision,
            tensors: normalized,
        })
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    pub fn precision(&self) -> Precision {
        self.precision
    }

    pub fn dtype(&self) -> DType {
        self.precision.dtype()
    }

    pub fn check_max_length(&self, max_length: usize) -> Result<()> {
        self.config.check_max_length(max_length)
    }

    /// Instantiates a classifier whose parameters live on `device`.
    pub fn build(&self, device: &Device) -> Result<TokenClassifier> {
        let vb = VarBuilder::from_tensors(self.tensors.clone(), self.dtype(), device);
        TokenClassifier::new(&self.config, vb)
    }
}

/// TF-converted checkpoints name LayerNorm parameters `gamma`/`beta`.
fn rename_legacy_norm(name: &str) -> String {
    if let Some(stem) = name.strip_suffix(".gamma") {
        format!("{stem}.weight")
    } else if let Some(stem) = name.strip_suffix(".beta") {
        format!("{stem}.bias")
    } else {
        name.to_string()
    }
}

fn is_encoder_tensor(name: &str) -> bool {
    name.starts_with("embeddings.")
        || name.starts_with("embeddings_project.")
        || name.starts_with("encoder.")
}
