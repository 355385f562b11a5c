use thiserror::Error;

pub type Result<T> = std::result::Result<T, SegmentError>;

#[derive(Debug, Error)]
pub enum SegmentError {
    #[error("unsupported language '{0}' (only \"vi\" is available)")]
    UnsupportedLanguage(String),

    #[error("invalid option: {0}")]
    InvalidOption(String),

    #[error("tokenizer error: {0}")]
    Tokenizer(#[from] tokenizer::Error),

    #[error("model error: {0}")]
    Model(#[from] candle_core::Error),

    #[error("model hub error: {0}")]
    Hub(#[from] hf_hub::api::sync::ApiError),

    #[error("artifact error: {0}")]
    Artifact(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("shared model cache is poisoned by an earlier panic")]
    CachePoisoned,
}

impl From<tokenizers::Error> for SegmentError {
    fn from(err: tokenizers::Error) -> Self {
        SegmentError::Tokenizer(tokenizer::Error::Tokenizer(err))
    }
}
