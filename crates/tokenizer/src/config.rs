use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_MAX_LENGTH: usize = 512;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub truncate: bool,
    pub max_length: usize,
    /// Overrides `do_lower_case` from `tokenizer_config.json` when set.
    #[serde(default)]
    pub lowercase: Option<bool>,
    pub artifacts: ArtifactsCfg,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactsCfg {
    pub dir: PathBuf,
    pub tokenizer_json: Option<PathBuf>,
    pub vocab_txt: Option<PathBuf>,
    pub tokenizer_config: Option<PathBuf>,
}

impl Config {
    pub fn new(artifacts: ArtifactsCfg) -> Self {
        Self {
            truncate: true,
            max_length: DEFAULT_MAX_LENGTH,
            lowercase: None,
            artifacts,
        }
    }

    pub fn with_truncation(mut self, truncate: bool, max_length: usize) -> Self {
        self.truncate = truncate;
        self.max_length = max_length;
        self
    }

    pub fn expects_single_file(&self) -> bool {
        self.artifacts.tokenizer_json.is_some()
    }
}

impl ArtifactsCfg {
    /// Uses the conventional file names inside `dir`, keeping only the files
    /// that exist.
    pub fn discover(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let existing = |name: &str| {
            let path = dir.join(name);
            path.is_file().then_some(path)
        };
        Self {
            tokenizer_json: existing("tokenizer.json"),
            vocab_txt: existing("vocab.txt"),
            tokenizer_config: existing("tokenizer_config.json"),
            dir,
        }
    }
}
