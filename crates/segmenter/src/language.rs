use std::fmt;
use std::str::FromStr;

use crate::error::SegmentError;

/// Checkpoint used when no other model source is configured.
pub const VIETNAMESE_MODEL_ID: &str = "NlpHUST/vi-word-segmentation";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Vietnamese,
}

impl Language {
    pub fn code(&self) -> &'static str {
        match self {
            Language::Vietnamese => "vi",
        }
    }

    pub fn default_model_id(&self) -> &'static str {
        match self {
            Language::Vietnamese => VIETNAMESE_MODEL_ID,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = SegmentError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "vi" => Ok(Language::Vietnamese),
            other => Err(SegmentError::UnsupportedLanguage(other.to_string())),
        }
    }
}
