//! Artifact loading behind the model cache.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use hf_hub::api::sync::{ApiBuilder, ApiError, ApiRepo};
use hf_hub::{Repo, RepoType};
use layers::Precision;
use model::{EncoderConfig, ModelWeights};
use serde::{Deserialize, Serialize};
use tokenizers::Tokenizer;

use crate::device::DeviceSpec;
use crate::error::{Result, SegmentError};
use crate::language::Language;
use crate::pipeline::{ClassifyTokens, TokenClassificationPipeline};

const CONFIG_FILE: &str = "config.json";
const TOKENIZER_JSON: &str = "tokenizer.json";
const VOCAB_TXT: &str = "vocab.txt";
const TOKENIZER_CONFIG: &str = "tokenizer_config.json";
const WEIGHT_FILES: [&str; 2] = ["model.safetensors", "pytorch_model.bin"];

/// Produces the three artifacts the model cache manages.
///
/// The cache decides *when* each method is called; implementations only
/// decide *how* an artifact is produced for the given fields.
pub trait ArtifactLoader {
    type Tokenizer;
    type Model;
    type Pipeline: ClassifyTokens;

    fn load_tokenizer(&self, truncate: bool, max_length: usize) -> Result<Self::Tokenizer>;

    fn load_model(&self, precision: Precision, max_length: usize) -> Result<Self::Model>;

    fn build_pipeline(
        &self,
        tokenizer: &Self::Tokenizer,
        model: &Self::Model,
        device: &DeviceSpec,
    ) -> Result<Self::Pipeline>;
}

/// Where checkpoint files come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelSource {
    Hub {
        repo_id: String,
        #[serde(default)]
        revision: Option<String>,
        #[serde(default)]
        cache_dir: Option<PathBuf>,
    },
    Local(PathBuf),
}

impl ModelSource {
    pub fn hub(repo_id: impl Into<String>) -> Self {
        ModelSource::Hub {
            repo_id: repo_id.into(),
            revision: None,
            cache_dir: None,
        }
    }

    pub fn for_language(language: Language) -> Self {
        Self::hub(language.default_model_id())
    }
}

impl Default for ModelSource {
    fn default() -> Self {
        Self::for_language(Language::Vietnamese)
    }
}

/// Loads pretrained checkpoints from a local directory or the model hub.
#[derive(Debug, Clone, Default)]
pub struct PretrainedLoader {
    source: ModelSource,
}

enum Fetcher {
    Local(PathBuf),
    Hub(ApiRepo),
}

impl Fetcher {
    fn fetch(&self, name: &str) -> Result<Option<PathBuf>> {
        match self {
            Fetcher::Local(dir) => {
                let path = dir.join(name);
                Ok(path.is_file().then_some(path))
            }
            Fetcher::Hub(repo) => match repo.get(name) {
                Ok(path) => Ok(Some(path)),
                Err(err) if is_not_found(&err) => {
                    log::debug!("{name} not present in hub repository");
                    Ok(None)
                }
                Err(err) => Err(err.into()),
            },
        }
    }

    fn require(&self, name: &str) -> Result<PathBuf> {
        match self {
            Fetcher::Hub(repo) => Ok(repo.get(name)?),
            Fetcher::Local(_) => self
                .fetch(name)?
                .ok_or_else(|| SegmentError::Artifact(format!("checkpoint is missing {name}"))),
        }
    }
}

/// Only a 404 means the repository lacks a file; transport, auth and
/// server failures are real errors.
fn is_not_found(err: &ApiError) -> bool {
    match err {
        ApiError::RequestError(inner) => matches!(**inner, ureq::Error::Status(404, _)),
        _ => false,
    }
}

impl PretrainedLoader {
    pub fn new(source: ModelSource) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &ModelSource {
        &self.source
    }

    fn fetcher(&self) -> Result<Fetcher> {
        match &self.source {
            ModelSource::Local(dir) => {
                if !dir.is_dir() {
                    return Err(SegmentError::Artifact(format!(
                        "model directory not found at {}",
                        dir.display()
                    )));
                }
                Ok(Fetcher::Local(dir.clone()))
            }
            ModelSource::Hub {
                repo_id,
                revision,
                cache_dir,
            } => {
                let mut builder = ApiBuilder::new().with_progress(false);
                if let Some(dir) = cache_dir {
                    builder = builder.with_cache_dir(dir.clone());
                }
                let api = builder.build()?;
                let repo = match revision {
                    Some(revision) => {
                        Repo::with_revision(repo_id.clone(), RepoType::Model, revision.clone())
                    }
                    None => Repo::new(repo_id.clone(), RepoType::Model),
                };
                Ok(Fetcher::Hub(api.repo(repo)))
            }
        }
    }

    fn read_config(fetcher: &Fetcher) -> Result<EncoderConfig> {
        let path = fetcher.require(CONFIG_FILE)?;
        Ok(EncoderConfig::from_file(&path)?)
    }
}

impl ArtifactLoader for PretrainedLoader {
    type Tokenizer = Arc<Tokenizer>;
    type Model = Arc<ModelWeights>;
    type Pipeline = TokenClassificationPipeline;

    fn load_tokenizer(&self, truncate: bool, max_length: usize) -> Result<Self::Tokenizer> {
        let fetcher = self.fetcher()?;
        let tokenizer_json = fetcher.fetch(TOKENIZER_JSON)?;
        let vocab_txt = match tokenizer_json {
            Some(_) => None,
            None => fetcher.fetch(VOCAB_TXT)?,
        };
        let tokenizer_config = fetcher.fetch(TOKENIZER_CONFIG)?;

        let dir = tokenizer_json
            .as_deref()
            .or(vocab_txt.as_deref())
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .ok_or_else(|| {
                SegmentError::Artifact(format!(
                    "checkpoint provides neither {TOKENIZER_JSON} nor {VOCAB_TXT}"
                ))
            })?;

        let config = tokenizer::Config::new(tokenizer::ArtifactsCfg {
            dir,
            tokenizer_json,
            vocab_txt,
            tokenizer_config,
        })
        .with_truncation(truncate, max_length);
        let tokenizer = tokenizer::build_from_artifacts(&config)?;
        log::info!("tokenizer loaded (truncate={truncate}, max_length={max_length})");
        Ok(Arc::new(tokenizer))
    }

    fn load_model(&self, precision: Precision, max_length: usize) -> Result<Self::Model> {
        let fetcher = self.fetcher()?;
        let config = Self::read_config(&fetcher)?;
        config.check_max_length(max_length)?;

        let mut weights_path = None;
        for name in WEIGHT_FILES {
            if let Some(path) = fetcher.fetch(name)? {
                weights_path = Some(path);
                break;
            }
        }
        let weights_path = weights_path.ok_or_else(|| {
            SegmentError::Artifact(format!(
                "checkpoint provides none of {}",
                WEIGHT_FILES.join(", ")
            ))
        })?;

        let weights = ModelWeights::load(config, &weights_path, precision)?;
        log::info!("model loaded (precision={precision}, max_length={max_length})");
        Ok(Arc::new(weights))
    }

    fn build_pipeline(
        &self,
        tokenizer: &Self::Tokenizer,
        model: &Self::Model,
        device: &DeviceSpec,
    ) -> Result<Self::Pipeline> {
        let resolved = device.resolve()?;
        let classifier = model.build(&resolved)?;
        log::info!("inference pipeline built (device={device})");
        Ok(TokenClassificationPipeline::new(Arc::clone(tokenizer), classifier))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_error(status: u16, text: &str) -> ApiError {
        let response = ureq::Response::new(status, text, "").unwrap();
        ApiError::RequestError(Box::new(ureq::Error::Status(status, response)))
    }

    #[test]
    fn only_missing_files_count_as_absent() {
        assert!(is_not_found(&status_error(404, "Not Found")));
        for (status, text) in [
            (401, "Unauthorized"),
            (403, "Forbidden"),
            (429, "Too Many Requests"),
            (503, "Service Unavailable"),
        ] {
            assert!(!is_not_found(&status_error(status, text)), "{status}");
        }
    }

    #[test]
    fn hub_failures_surface_as_hub_errors() {
        let err: SegmentError = status_error(503, "Service Unavailable").into();
        assert!(matches!(err, SegmentError::Hub(_)), "unexpected error: {err}");
    }

    #[test]
    fn local_fetch_reports_absent_files() -> Result<()> {
        let dir = std::env::temp_dir();
        let fetcher = Fetcher::Local(dir.clone());
        assert_eq!(fetcher.fetch("vwsegment-no-such-file.json")?, None);
        assert!(matches!(
            fetcher.require("vwsegment-no-such-file.json"),
            Err(SegmentError::Artifact(_))
        ));
        Ok(())
    }
}
