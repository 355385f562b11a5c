//! BERT-family encoder for token classification, written against candle.
//!
//! [`EncoderConfig`] mirrors a checkpoint's `config.json`, [`ModelWeights`]
//! keeps its tensors on the CPU at a chosen precision and
//! [`TokenClassifier`] runs the forward pass on a device.

pub mod block;
pub mod config;
pub mod mask;
pub mod model;
pub mod weights;

pub use block::EncoderBlock;
pub use config::EncoderConfig;
pub use model::TokenClassifier;
pub use weights::ModelWeights;
