//! Position-wise feed-forward stack of an encoder layer.
//!
//! Hidden states `(batch, seq, hidden)` are expanded to the intermediate
//! width, passed through the activation and contracted back.

use candle_core::{Result, Tensor};
use candle_nn::VarBuilder;

use crate::{activations::ActivationKind, dtypes::PrecisionPolicy, linear::Linear};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedForwardConfig {
    pub hidden_size: usize,
    pub intermediate_size: usize,
    pub activation: ActivationKind,
}

impl FeedForwardConfig {
    pub fn new(hidden_size: usize, intermediate_size: usize, activation: ActivationKind) -> Self {
        Self {
            hidden_size,
            intermediate_size,
            activation,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FeedForward {
    config: FeedForwardConfig,
    expand: Linear,
    contract: Linear,
}

impl FeedForward {
    pub fn new(config: FeedForwardConfig, expand: Linear, contract: Linear) -> Result<Self> {
        if expand.input_dim() != config.hidden_size
            || expand.output_dim() != config.intermediate_size
            || contract.input_dim() != config.intermediate_size
            || contract.output_dim() != config.hidden_size
        {
            return Err(candle_core::Error::Msg(format!(
                "feed-forward projections do not match {}->{}->{}",
                config.hidden_size, config.intermediate_size, config.hidden_size
            )));
        }
        Ok(Self {
            config,
            expand,
            contract,
        })
    }

    /// Loads the two projections from their own builders, since checkpoints
    /// keep them under unrelated prefixes.
    pub fn load(
        config: FeedForwardConfig,
        expand_vb: VarBuilder,
        contract_vb: VarBuilder,
    ) -> Result<Self> {
        let expand = Linear::load(expand_vb, config.hidden_size, config.intermediate_size)?;
        let contract = Linear::load(contract_vb, config.intermediate_size, config.hidden_size)?;
        Self::new(config, expand, contract)
    }

    pub fn config(&self) -> &FeedForwardConfig {
        &self.config
    }

    pub fn forward(&self, hidden: &Tensor, policy: &PrecisionPolicy) -> Result<Tensor> {
        let expanded = self.expand.forward(hidden, policy)?;
        let activated = self.config.activation.forward(&expanded, policy)?;
        self.contract.forward(&activated, policy)
    }
}
