use serde::Deserialize;
use serde_json::Value;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    pub json: Option<PathBuf>,
    pub vocab: Option<PathBuf>,
    pub tokenizer_config: Option<PathBuf>,
}

/// The subset of `tokenizer_config.json` that shapes the assembled pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenizerSettings {
    pub do_lower_case: bool,
    pub unk_token: String,
    pub cls_token: String,
    pub sep_token: String,
    pub pad_token: String,
    pub model_max_length: Option<usize>,
}

impl Default for TokenizerSettings {
    fn default() -> Self {
        Self {
            do_lower_case: false,
            unk_token: "[UNK]".to_string(),
            cls_token: "[CLS]".to_string(),
            sep_token: "[SEP]".to_string(),
            pad_token: "[PAD]".to_string(),
            model_max_length: None,
        }
    }
}

/// Raw file shape. Special tokens are either plain strings or serialized
/// `AddedToken` objects carrying a `content` field.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawTokenizerConfig {
    #[serde(default)]
    do_lower_case: Option<bool>,
    #[serde(default)]
    unk_token: Option<Value>,
    #[serde(default)]
    cls_token: Option<Value>,
    #[serde(default)]
    sep_token: Option<Value>,
    #[serde(default)]
    pad_token: Option<Value>,
    #[serde(default)]
    model_max_length: Option<f64>,
}

impl From<RawTokenizerConfig> for TokenizerSettings {
    fn from(raw: RawTokenizerConfig) -> Self {
        let defaults = TokenizerSettings::default();
        let token = |value: Option<Value>, fallback: String| {
            value
                .as_ref()
                .and_then(special_token_content)
                .unwrap_or(fallback)
        };
        // Checkpoints without a limit store a huge sentinel (1e30).
        let model_max_length = raw
            .model_max_length
            .filter(|len| *len > 0.0 && *len < 1e9)
            .map(|len| len as usize);
        Self {
            do_lower_case: raw.do_lower_case.unwrap_or(defaults.do_lower_case),
            unk_token: token(raw.unk_token, defaults.unk_token),
            cls_token: token(raw.cls_token, defaults.cls_token),
            sep_token: token(raw.sep_token, defaults.sep_token),
            pad_token: token(raw.pad_token, defaults.pad_token),
            model_max_length,
        }
    }
}

fn special_token_content(value: &Value) -> Option<String> {
    match value {
        Value::String(content) => Some(content.clone()),
        Value::Object(map) => map
            .get("content")
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    }
}
