//! WordPiece tokenizer assembly for token-classification checkpoints.
//!
//! This crate turns the tokenizer artifacts shipped with a pretrained
//! checkpoint into a ready-to-use [`tokenizers::Tokenizer`] configured for
//! batched inference: truncation at a maximum sequence length (optional),
//! batch-longest padding and the `[CLS] $A [SEP]` template.
//!
//! # Artifacts
//!
//! A bundled `tokenizer.json` is preferred when present. Otherwise a
//! `vocab.txt` is required and a BERT-style WordPiece pipeline is assembled
//! around it. An optional `tokenizer_config.json` supplies casing and the
//! special token spellings.
//!
//! # Diacritics
//!
//! The assembled normaliser never strips accents, even when lowercasing.
//! Vietnamese tone marks distinguish otherwise identical syllables.
//!
//! # Thread Safety
//!
//! Built tokenizers are `Send + Sync` and can be shared behind an `Arc`.

pub mod config;
pub mod errors;

mod artifacts;
mod types;
mod validate;
mod wordpiece;

pub use config::{ArtifactsCfg, Config};
pub use errors::{Error, Result};
pub use types::TokenizerSettings;

pub fn build_from_artifacts(cfg: &Config) -> Result<tokenizers::Tokenizer> {
    validate::validate_config(cfg)?;
    let tokenizer = wordpiece::build_from_artifacts(cfg)?;
    validate::validate_tokenizer(&tokenizer, cfg)?;
    Ok(tokenizer)
}
