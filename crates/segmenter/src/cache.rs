//! Lazily built, selectively invalidated inference artifacts.
//!
//! The cache owns one tokenizer, one model and one pipeline, each tagged
//! with the configuration fields it was built from:
//!
//! | artifact  | rebuilt when                                   |
//! |-----------|------------------------------------------------|
//! | tokenizer | `truncate` or `max_length` changes             |
//! | model     | `precision` or `max_length` changes            |
//! | pipeline  | `device` changes, or tokenizer/model rebuilt   |
//!
//! Unchanged fields never trigger a reload.

use layers::Precision;
use serde::{Deserialize, Serialize};

use crate::device::DeviceSpec;
use crate::error::{Result, SegmentError};
use crate::loader::ArtifactLoader;

/// Configuration fields that decide whether cached artifacts are valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactConfig {
    pub truncate: bool,
    pub max_length: usize,
    pub precision: Precision,
    pub device: DeviceSpec,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TokenizerKey {
    truncate: bool,
    max_length: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ModelKey {
    precision: Precision,
    max_length: usize,
}

impl ArtifactConfig {
    fn tokenizer_key(&self) -> TokenizerKey {
        TokenizerKey {
            truncate: self.truncate,
            max_length: self.max_length,
        }
    }

    fn model_key(&self) -> ModelKey {
        ModelKey {
            precision: self.precision,
            max_length: self.max_length,
        }
    }
}

struct Cached<T, K> {
    value: T,
    key: K,
}

impl<T, K: PartialEq> Cached<T, K> {
    fn is_valid_for(slot: &Option<Self>, key: &K) -> bool {
        slot.as_ref().is_some_and(|cached| cached.key == *key)
    }
}

/// Which artifacts a [`ModelCache::refresh`] call rebuilt.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Refresh {
    pub tokenizer: bool,
    pub model: bool,
    pub pipeline: bool,
}

impl Refresh {
    pub fn any(&self) -> bool {
        self.tokenizer || self.model || self.pipeline
    }
}

pub struct ModelCache<L: ArtifactLoader> {
    loader: L,
    tokenizer: Option<Cached<L::Tokenizer, TokenizerKey>>,
    model: Option<Cached<L::Model, ModelKey>>,
    pipeline: Option<Cached<L::Pipeline, DeviceSpec>>,
}

impl<L: ArtifactLoader> ModelCache<L> {
    pub fn new(loader: L) -> Self {
        Self {
            loader,
            tokenizer: None,
            model: None,
            pipeline: None,
        }
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    /// Brings every artifact in line with `config`, loading only what is
    /// missing or stale.
    ///
    /// A stale artifact is dropped before its replacement is loaded, and the
    /// pipeline is dropped whenever one of its parts is, so an error part-way
    /// leaves the cache holding only artifacts that match their keys.
    pub fn refresh(&mut self, config: &ArtifactConfig) -> Result<Refresh> {
        let mut report = Refresh::default();

        let tokenizer_key = config.tokenizer_key();
        if !Cached::is_valid_for(&self.tokenizer, &tokenizer_key) {
            self.pipeline = None;
            self.tokenizer = None;
            log::info!(
                "loading tokenizer (truncate={}, max_length={})",
                config.truncate,
                config.max_length
            );
            let value = self
                .loader
                .load_tokenizer(config.truncate, config.max_length)?;
            self.tokenizer = Some(Cached {
                value,
                key: tokenizer_key,
            });
            report.tokenizer = true;
        }

        let model_key = config.model_key();
        if !Cached::is_valid_for(&self.model, &model_key) {
            self.pipeline = None;
            self.model = None;
            log::info!(
                "loading model (precision={}, max_length={})",
                config.precision,
                config.max_length
            );
            let value = self.loader.load_model(config.precision, config.max_length)?;
            self.model = Some(Cached {
                value,
                key: model_key,
            });
            report.model = true;
        }

        if !Cached::is_valid_for(&self.pipeline, &config.device) {
            self.pipeline = None;
            let (Some(tokenizer), Some(model)) = (&self.tokenizer, &self.model) else {
                return Err(SegmentError::Artifact(
                    "pipeline requested before tokenizer and model were loaded".into(),
                ));
            };
            log::info!("building pipeline (device={})", config.device);
            let value = self
                .loader
                .build_pipeline(&tokenizer.value, &model.value, &config.device)?;
            self.pipeline = Some(Cached {
                value,
                key: config.device,
            });
            report.pipeline = true;
        }

        if !report.any() {
            log::debug!("model cache hit for {config:?}");
        }
        Ok(report)
    }

    /// Refreshes the cache and returns the pipeline matching `config`.
    pub fn ensure(&mut self, config: &ArtifactConfig) -> Result<&L::Pipeline> {
        self.refresh(config)?;
        self.pipeline
            .as_ref()
            .map(|cached| &cached.value)
            .ok_or_else(|| SegmentError::Artifact("pipeline missing after refresh".into()))
    }

    pub fn tokenizer(&self) -> Option<&L::Tokenizer> {
        self.tokenizer.as_ref().map(|cached| &cached.value)
    }

    pub fn model(&self) -> Option<&L::Model> {
        self.model.as_ref().map(|cached| &cached.value)
    }

    pub fn pipeline(&self) -> Option<&L::Pipeline> {
        self.pipeline.as_ref().map(|cached| &cached.value)
    }

    pub fn is_warm(&self) -> bool {
        self.pipeline.is_some()
    }

    /// Drops every cached artifact; the next refresh reloads all of them.
    pub fn clear(&mut self) {
        self.pipeline = None;
        self.model = None;
        self.tokenizer = None;
    }
}
