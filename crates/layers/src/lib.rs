//! Encoder building blocks shared by the token-classification model.
//!
//! The crate keeps the numerically sensitive pieces in one place: the
//! precision policy deciding when reduced-precision parameters are promoted,
//! a LayerNorm that computes its statistics in `f32`, and the dense
//! projections and activations that make up encoder feed-forward stacks.

pub mod activations;
pub mod checks;
pub mod dtypes;
pub mod linear;
pub mod mlp;
pub mod norm;

use thiserror::Error;

pub use activations::ActivationKind;
pub use dtypes::{Precision, PrecisionPolicy};
pub use linear::Linear;
pub use mlp::{FeedForward, FeedForwardConfig};
pub use norm::LayerNorm;

/// Errors raised while interpreting layer configuration values.
#[derive(Debug, Error)]
pub enum LayerError {
    #[error("unsupported precision '{0}' (expected float32, float16 or bfloat16)")]
    UnsupportedPrecision(String),

    #[error("unsupported activation '{0}'")]
    UnsupportedActivation(String),
}
