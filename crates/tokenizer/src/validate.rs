use crate::config::Config;
use crate::errors::{Error, Result};
use tokenizers::Tokenizer;

/// `[CLS]` and `[SEP]` occupy two positions of every encoding.
const MIN_MAX_LENGTH: usize = 3;

pub fn validate_config(cfg: &Config) -> Result<()> {
    if cfg.max_length == 0 {
        return Err(Error::InvalidConfig("max_length must be greater than zero"));
    }

    if cfg.truncate && cfg.max_length < MIN_MAX_LENGTH {
        return Err(Error::Validation(format!(
            "max_length {} leaves no room for text next to the special tokens (minimum {MIN_MAX_LENGTH})",
            cfg.max_length
        )));
    }

    if !cfg.artifacts.dir.is_dir() {
        return Err(Error::Artifact(format!(
            "artifact directory not found at {}",
            cfg.artifacts.dir.display()
        )));
    }

    Ok(())
}

pub fn validate_tokenizer(tok: &Tokenizer, cfg: &Config) -> Result<()> {
    if tok.get_vocab_size(true) == 0 {
        return Err(Error::Validation("tokenizer vocabulary is empty".into()));
    }

    match (cfg.truncate, tok.get_truncation()) {
        (true, Some(params)) if params.max_length == cfg.max_length => {}
        (false, None) => {}
        _ => {
            return Err(Error::Validation(
                "tokenizer truncation does not match the requested configuration".into(),
            ))
        }
    }

    let padding = tok
        .get_padding()
        .ok_or_else(|| Error::Validation("tokenizer is missing batch padding".into()))?;
    if tok.id_to_token(padding.pad_id).as_deref() != Some(padding.pad_token.as_str()) {
        return Err(Error::Validation(format!(
            "pad token '{}' does not map to id {}",
            padding.pad_token, padding.pad_id
        )));
    }

    Ok(())
}
