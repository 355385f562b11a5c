//! Segmented documents and their constructors.

use std::ops::Index;
use std::slice::{Iter, SliceIndex};
use std::sync::{LazyLock, Mutex};

use serde::Serialize;

use crate::cache::ModelCache;
use crate::error::{Result, SegmentError};
use crate::language::Language;
use crate::loader::{ArtifactLoader, PretrainedLoader};
use crate::options::SegmentOptions;
use crate::pipeline::ClassifyTokens;
use crate::reconstruct::{apply_case, reconstruct_words};
use crate::token::ClassificationToken;

static SHARED_CACHE: LazyLock<Mutex<ModelCache<PretrainedLoader>>> =
    LazyLock::new(|| Mutex::new(ModelCache::new(PretrainedLoader::default())));

/// Input accepted by the constructors: one text or an ordered batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Texts {
    One(String),
    Many(Vec<String>),
}

impl Texts {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            Texts::One(text) => vec![text],
            Texts::Many(texts) => texts,
        }
    }
}

impl From<&str> for Texts {
    fn from(text: &str) -> Self {
        Texts::One(text.to_string())
    }
}

impl From<String> for Texts {
    fn from(text: String) -> Self {
        Texts::One(text)
    }
}

impl From<Vec<String>> for Texts {
    fn from(texts: Vec<String>) -> Self {
        Texts::Many(texts)
    }
}

impl From<Vec<&str>> for Texts {
    fn from(texts: Vec<&str>) -> Self {
        Texts::Many(texts.into_iter().map(str::to_string).collect())
    }
}

impl From<&[&str]> for Texts {
    fn from(texts: &[&str]) -> Self {
        Texts::Many(texts.iter().map(|text| text.to_string()).collect())
    }
}

impl From<&[String]> for Texts {
    fn from(texts: &[String]) -> Self {
        Texts::Many(texts.to_vec())
    }
}

impl<const N: usize> From<[&str; N]> for Texts {
    fn from(texts: [&str; N]) -> Self {
        Texts::Many(texts.iter().map(|text| text.to_string()).collect())
    }
}

/// Word lists for a batch of texts, in input order.
///
/// Multi-syllable words are joined with `_`. Indexing follows slice rules:
/// `segments[0]` is the first document's words, `segments[1..3]` a slice of
/// documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WordSegments {
    texts: Vec<String>,
    segments: Vec<Vec<String>>,
}

impl WordSegments {
    /// Segments `texts` with the process-wide cache and the default
    /// checkpoint for `lang`.
    pub fn new(texts: impl Into<Texts>, lang: &str, options: &SegmentOptions) -> Result<Self> {
        let language: Language = lang.parse()?;
        options.validate()?;
        let mut cache = SHARED_CACHE
            .lock()
            .map_err(|_| SegmentError::CachePoisoned)?;
        Self::segment(&mut *cache, texts.into(), language, options)
    }

    /// Segments `texts` with an explicitly owned cache.
    pub fn with_cache<L: ArtifactLoader>(
        cache: &mut ModelCache<L>,
        texts: impl Into<Texts>,
        lang: &str,
        options: &SegmentOptions,
    ) -> Result<Self> {
        let language: Language = lang.parse()?;
        options.validate()?;
        Self::segment(cache, texts.into(), language, options)
    }

    fn segment<L: ArtifactLoader>(
        cache: &mut ModelCache<L>,
        texts: Texts,
        language: Language,
        options: &SegmentOptions,
    ) -> Result<Self> {
        let texts = texts.into_vec();
        let pipeline = cache.ensure(&options.artifact_config())?;
        let tokens = pipeline.classify(&texts, options.batch_size)?;
        if tokens.len() != texts.len() {
            return Err(SegmentError::Artifact(format!(
                "pipeline returned {} results for {} texts",
                tokens.len(),
                texts.len()
            )));
        }
        log::debug!("segmented {} {language} texts", texts.len());
        Ok(Self::from_tokens(texts, tokens, options.preserve_case))
    }

    /// Builds the result from already classified tokens.
    pub fn from_tokens(
        texts: Vec<String>,
        tokens: Vec<Vec<ClassificationToken>>,
        preserve_case: bool,
    ) -> Self {
        let segments = tokens
            .iter()
            .map(|doc| apply_case(reconstruct_words(doc), preserve_case))
            .collect();
        Self { texts, segments }
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&[String]> {
        self.segments.get(index).map(Vec::as_slice)
    }

    pub fn iter(&self) -> Iter<'_, Vec<String>> {
        self.segments.iter()
    }

    /// The input texts, in the order they were segmented.
    pub fn texts(&self) -> &[String] {
        &self.texts
    }

    pub fn as_slice(&self) -> &[Vec<String>] {
        &self.segments
    }
}

impl<I: SliceIndex<[Vec<String>]>> Index<I> for WordSegments {
    type Output = I::Output;

    fn index(&self, index: I) -> &Self::Output {
        &self.segments[index]
    }
}

impl<'a> IntoIterator for &'a WordSegments {
    type Item = &'a Vec<String>;
    type IntoIter = Iter<'a, Vec<String>>;

    fn into_iter(self) -> Self::IntoIter {
        self.segments.iter()
    }
}
