use serde::{Serialize, Serializer};

/// Word-boundary label predicted for a sub-word token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityLabel {
    /// Starts a word.
    Begin,
    /// Continues the word started by the previous token.
    Inside,
    Other(String),
}

impl EntityLabel {
    pub fn as_str(&self) -> &str {
        match self {
            EntityLabel::Begin => "B",
            EntityLabel::Inside => "I",
            EntityLabel::Other(label) => label,
        }
    }
}

impl From<&str> for EntityLabel {
    fn from(label: &str) -> Self {
        match label {
            "B" => EntityLabel::Begin,
            "I" => EntityLabel::Inside,
            other => EntityLabel::Other(other.to_string()),
        }
    }
}

impl Serialize for EntityLabel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// One classified token as produced by the inference pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationToken {
    /// Sub-word fragment as spelled in the vocabulary (`##` markers kept).
    pub word: String,
    pub entity: EntityLabel,
    pub score: f32,
    /// Position in the encoded sequence, special tokens included.
    pub index: usize,
    /// Byte offsets into the source text.
    pub start: usize,
    pub end: usize,
}

impl ClassificationToken {
    /// Shorthand for tokens whose score and offsets do not matter.
    pub fn labelled(word: impl Into<String>, entity: impl Into<EntityLabel>) -> Self {
        Self {
            word: word.into(),
            entity: entity.into(),
            score: 1.0,
            index: 0,
            start: 0,
            end: 0,
        }
    }
}
