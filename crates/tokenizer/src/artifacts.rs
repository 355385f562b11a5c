use crate::config::ArtifactsCfg;
use crate::errors::{Error, Result};
use crate::types::{ArtifactPaths, RawTokenizerConfig, TokenizerSettings};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tokenizers::models::wordpiece::WordPiece;
use tokenizers::Tokenizer;

const TOKENIZER_JSON_ERR: &str = "tokenizer json not found at";
const VOCAB_TXT_ERR: &str = "vocab txt not found at";
const TOKENIZER_CONFIG_ERR: &str = "tokenizer config not found at";

pub fn load_tokenizer_from_json(path: &Path) -> Result<Tokenizer> {
    ensure_file(path, TOKENIZER_JSON_ERR)?;
    Tokenizer::from_file(path).map_err(Error::from)
}

pub fn load_wordpiece_from_vocab(vocab: &Path, unk_token: &str) -> Result<WordPiece> {
    ensure_file(vocab, VOCAB_TXT_ERR)?;
    let vocab_str = path_to_string(vocab)?;

    WordPiece::from_file(&vocab_str)
        .unk_token(unk_token.to_string())
        .build()
        .map_err(Error::from)
}

pub fn read_settings(path: Option<&Path>) -> Result<TokenizerSettings> {
    let Some(path) = path else {
        return Ok(TokenizerSettings::default());
    };
    ensure_file(path, TOKENIZER_CONFIG_ERR)?;
    let file = File::open(path)?;
    let raw: RawTokenizerConfig = serde_json::from_reader(BufReader::new(file))?;
    Ok(raw.into())
}

pub fn resolve_paths(cfg: &ArtifactsCfg) -> Result<ArtifactPaths> {
    let dir = cfg.dir.as_path();
    if !dir.is_dir() {
        return Err(Error::Artifact(format!(
            "artifact directory not found at {}",
            dir.display()
        )));
    }

    let resolve = |value: &Option<PathBuf>| -> Option<PathBuf> {
        value.as_ref().map(|path| {
            if path.is_absolute() {
                path.clone()
            } else {
                dir.join(path)
            }
        })
    };

    let tokenizer_json = resolve(&cfg.tokenizer_json);
    let vocab_txt = resolve(&cfg.vocab_txt);
    let tokenizer_config = resolve(&cfg.tokenizer_config);

    if let Some(ref path) = tokenizer_json {
        ensure_file(path, TOKENIZER_JSON_ERR)?;
    }
    if let Some(ref path) = vocab_txt {
        ensure_file(path, VOCAB_TXT_ERR)?;
    }
    if let Some(ref path) = tokenizer_config {
        ensure_file(path, TOKENIZER_CONFIG_ERR)?;
    }

    if tokenizer_json.is_none() && vocab_txt.is_none() {
        return Err(Error::Artifact(format!(
            "artifacts in {} must provide either tokenizer.json or vocab.txt",
            dir.display()
        )));
    }

    Ok(ArtifactPaths {
        json: tokenizer_json,
        vocab: vocab_txt,
        tokenizer_config,
    })
}

fn ensure_file(path: &Path, context: &str) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(Error::Artifact(format!("{context} {}", path.display())))
    }
}

fn path_to_string(path: &Path) -> Result<String> {
    path.to_str()
        .map(|s| s.to_owned())
        .ok_or_else(|| Error::Artifact(format!("path is not valid UTF-8: {}", path.display())))
}
