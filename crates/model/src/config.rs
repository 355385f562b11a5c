//! Encoder hyper-parameters as stored in a checkpoint's `config.json`.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use candle_core::{Error, Result};
use layers::ActivationKind;
use serde::{Deserialize, Serialize};

fn default_model_type() -> String {
    "bert".to_string()
}

fn default_hidden_act() -> String {
    "gelu".to_string()
}

fn default_type_vocab_size() -> usize {
    2
}

fn default_layer_norm_eps() -> f64 {
    1e-12
}

/// BERT-family encoder configuration (BERT, ELECTRA discriminators).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncoderConfig {
    /// Also the prefix under which encoder weights are stored.
    #[serde(default = "default_model_type")]
    pub model_type: String,
    pub vocab_size: usize,
    pub hidden_size: usize,
    pub num_hidden_layers: usize,
    pub num_attention_heads: usize,
    pub intermediate_size: usize,
    #[serde(default = "default_hidden_act")]
    pub hidden_act: String,
    pub max_position_embeddings: usize,
    #[serde(default = "default_type_vocab_size")]
    pub type_vocab_size: usize,
    /// ELECTRA factorises embeddings when this differs from `hidden_size`.
    #[serde(default)]
    pub embedding_size: Option<usize>,
    #[serde(default = "default_layer_norm_eps")]
    pub layer_norm_eps: f64,
    #[serde(default)]
    pub id2label: BTreeMap<String, String>,
}

impl EncoderConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let config: Self = serde_json::from_reader(BufReader::new(file)).map_err(Error::wrap)?;
        config.validate()?;
        Ok(config)
    }

    pub fn embedding_size(&self) -> usize {
        self.embedding_size.unwrap_or(self.hidden_size)
    }

    pub fn head_dim(&self) -> usize {
        self.hidden_size / self.num_attention_heads.max(1)
    }

    pub fn activation(&self) -> Result<ActivationKind> {
        self.hidden_act
            .parse()
            .map_err(|err: layers::LayerError| Error::Msg(err.to_string()))
    }

    /// Label names ordered by class index.
    pub fn labels(&self) -> Result<Vec<String>> {
        let mut indexed = Vec::with_capacity(self.id2label.len());
        for (key, label) in &self.id2label {
            let index: usize = key
                .parse()
                .map_err(|_| Error::Msg(format!("id2label key '{key}' is not an index")))?;
            indexed.push((index, label.clone()));
        }
        indexed.sort_by_key(|(index, _)| *index);
        for (position, (index, _)) in indexed.iter().enumerate() {
            if position != *index {
                return Err(Error::Msg(format!(
                    "id2label must cover 0..{} without gaps (missing {position})",
                    indexed.len()
                )));
            }
        }
        Ok(indexed.into_iter().map(|(_, label)| label).collect())
    }

    /// Validate structural invariants before any weight is read.
    pub fn validate(&self) -> Result<()> {
        if self.vocab_size == 0 {
            return Err(Error::Msg("vocab_size must be greater than zero".into()));
        }
        if self.hidden_size == 0 {
            return Err(Error::Msg("hidden_size must be greater than zero".into()));
        }
        if self.num_hidden_layers == 0 {
            return Err(Error::Msg("num_hidden_layers must be greater than zero".into()));
        }
        if self.num_attention_heads == 0 {
            return Err(Error::Msg("num_attention_heads must be greater than zero".into()));
        }
        if self.hidden_size % self.num_attention_heads != 0 {
            return Err(Error::Msg(format!(
                "hidden_size ({}) must be divisible by num_attention_heads ({})",
                self.hidden_size, self.num_attention_heads
            )));
        }
        if self.intermediate_size == 0 {
            return Err(Error::Msg("intermediate_size must be greater than zero".into()));
        }
        if self.max_position_embeddings == 0 {
            return Err(Error::Msg(
                "max_position_embeddings must be greater than zero".into(),
            ));
        }
        if self.embedding_size == Some(0) {
            return Err(Error::Msg("embedding_size must be greater than zero".into()));
        }
        self.activation()?;
        if self.labels()?.is_empty() {
            return Err(Error::Msg("id2label must name at least one label".into()));
        }
        Ok(())
    }

    /// Sequences longer than the position table cannot be embedded.
    pub fn check_max_length(&self, max_length: usize) -> Result<()> {
        if max_length > self.max_position_embeddings {
            return Err(Error::Msg(format!(
                "max_length {max_length} exceeds max_position_embeddings {}; \
                 inputs longer than {} tokens could not be embedded by this model",
                self.max_position_embeddings, self.max_position_embeddings
            )));
        }
        Ok(())
    }
}
