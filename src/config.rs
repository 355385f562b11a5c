//! File configuration for the `vwsegment` binary.
//!
//! Configs are TOML (`.toml` or no extension) or JSON (`.json`). Every
//! section is optional; missing values fall back to the library defaults.
//!
//! ```toml
//! lang = "vi"
//!
//! [model]
//! repo_id = "NlpHUST/vi-word-segmentation"
//! cache_dir = "models"          # relative to this file
//!
//! [segment]
//! device = "cpu"
//! precision = "float32"
//! batch_size = 32
//!
//! [output]
//! format = "json"
//! ```

use std::{
    fmt, fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use segmenter::{Language, ModelSource, SegmentOptions};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub lang: String,
    pub model: ModelConfig,
    pub segment: SegmentOptions,
    pub output: OutputConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            lang: Language::Vietnamese.code().to_string(),
            model: ModelConfig::default(),
            segment: SegmentOptions::default(),
            output: OutputConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelConfig {
    /// Hub repository, used unless `local_dir` is set.
    pub repo_id: String,
    pub revision: Option<String>,
    pub cache_dir: Option<PathBuf>,
    /// Directory holding `config.json`, tokenizer files and weights.
    pub local_dir: Option<PathBuf>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            repo_id: Language::Vietnamese.default_model_id().to_string(),
            revision: None,
            cache_dir: None,
            local_dir: None,
        }
    }
}

impl ModelConfig {
    pub fn source(&self) -> ModelSource {
        match &self.local_dir {
            Some(dir) => ModelSource::Local(dir.clone()),
            None => ModelSource::Hub {
                repo_id: self.repo_id.clone(),
                revision: self.revision.clone(),
                cache_dir: self.cache_dir.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One line per document, words separated by spaces.
    #[default]
    Text,
    /// A JSON array with one array of words per document.
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub format: OutputFormat,
}

impl AppConfig {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let mut config: AppConfig = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::from_str(&contents)?,
            Some("toml") | None => toml::from_str(&contents)?,
            Some(other) => {
                return Err(ConfigError::ConfigFormat(format!(
                    "unsupported configuration extension '{}'",
                    other
                )));
            }
        };

        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        config.apply_base_path(base_dir);
        log::debug!("loaded configuration from {}", path.display());
        Ok(config)
    }

    fn apply_base_path(&mut self, base: &Path) {
        let resolve = |value: &mut Option<PathBuf>| {
            if let Some(path) = value {
                if path.is_relative() {
                    *path = base.join(&*path);
                }
            }
        };
        resolve(&mut self.model.local_dir);
        resolve(&mut self.model.cache_dir);
    }

    /// Checks every field and reports all problems at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if let Err(err) = self.lang.parse::<Language>() {
            errors.push(err.to_string());
        }
        if let Err(err) = self.segment.validate() {
            errors.push(err.to_string());
        }
        match &self.model.local_dir {
            Some(dir) if !dir.is_dir() => {
                errors.push(format!("model.local_dir {} is not a directory", dir.display()))
            }
            Some(_) => {}
            None if self.model.repo_id.trim().is_empty() => {
                errors.push("model.repo_id must not be empty".into())
            }
            None => {}
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

/// `key.path=value` edit applied to a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigOverride {
    pub path: String,
    pub value: String,
}

impl FromStr for ConfigOverride {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (path, value) = s
            .split_once('=')
            .ok_or_else(|| "override must be in the form key=value".to_string())?;
        if path.trim().is_empty() {
            return Err("override key must not be empty".into());
        }
        Ok(Self {
            path: path.trim().to_string(),
            value: value.trim().to_string(),
        })
    }
}

/// Applies overrides to the serialised config, then deserialises it again so
/// the usual type checks run on the edited values.
pub fn apply_overrides(
    config: AppConfig,
    overrides: &[ConfigOverride],
) -> Result<AppConfig, ConfigError> {
    let mut value = serde_json::to_value(config)?;

    for override_arg in overrides {
        let new_value = parse_override_value(&override_arg.value);
        set_value_at_path(&mut value, &override_arg.path, new_value)?;
    }

    serde_json::from_value(value).map_err(|err| {
        ConfigError::Override(format!("config is invalid after overrides: {err}"))
    })
}

fn parse_override_value(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if trimmed.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }
    if trimmed.eq_ignore_ascii_case("null") {
        return Value::Null;
    }
    if let Ok(int_val) = trimmed.parse::<i64>() {
        return Value::Number(Number::from(int_val));
    }
    if let Ok(float_val) = trimmed.parse::<f64>() {
        if let Some(number) = Number::from_f64(float_val) {
            return Value::Number(number);
        }
    }
    if trimmed.starts_with('[') || trimmed.starts_with('{') {
        if let Ok(json_val) = serde_json::from_str::<Value>(trimmed) {
            return json_val;
        }
    }
    Value::String(trimmed.to_string())
}

fn set_value_at_path(value: &mut Value, path: &str, new_value: Value) -> Result<(), ConfigError> {
    let segments: Vec<&str> = path.split('.').map(str::trim).collect();
    if segments.iter().any(|segment| segment.is_empty()) {
        return Err(ConfigError::Override(format!(
            "override path '{path}' has an empty segment"
        )));
    }

    let (last, parents) = segments
        .split_last()
        .ok_or_else(|| ConfigError::Override("override path must not be empty".into()))?;

    let mut current = value;
    for segment in parents {
        let map = current.as_object_mut().ok_or_else(|| {
            ConfigError::Override(format!(
                "override path segment '{segment}' points into a non-object value"
            ))
        })?;
        current = map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(serde_json::Map::new()));
        if current.is_null() {
            *current = Value::Object(serde_json::Map::new());
        }
    }

    let map = current.as_object_mut().ok_or_else(|| {
        ConfigError::Override(format!("cannot set '{last}' on a non-object value"))
    })?;
    map.insert(last.to_string(), new_value);
    Ok(())
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    ConfigFormat(String),
    Validation(Vec<String>),
    Override(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "failed to read config: {}", err),
            ConfigError::ConfigFormat(err) => write!(f, "failed to parse config: {}", err),
            ConfigError::Validation(messages) => {
                write!(f, "invalid configuration: {}", messages.join("; "))
            }
            ConfigError::Override(msg) => write!(f, "failed to apply override: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(err) => Some(err),
            ConfigError::ConfigFormat(_) | ConfigError::Validation(_) | ConfigError::Override(_) => {
                None
            }
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        ConfigError::Io(value)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(value: toml::de::Error) -> Self {
        ConfigError::ConfigFormat(value.to_string())
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        ConfigError::ConfigFormat(value.to_string())
    }
}
