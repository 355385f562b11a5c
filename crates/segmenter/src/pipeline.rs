//! Batched token classification over a tokenizer and an encoder.

use std::sync::Arc;

use candle_core::{DType, Tensor};
use candle_nn::ops::softmax_last_dim;
use model::{mask::lengths_from_attention_mask, TokenClassifier};
use tokenizers::{Encoding, Tokenizer};

use crate::error::{Result, SegmentError};
use crate::token::{ClassificationToken, EntityLabel};

/// Labels whose tokens are not reported, as in the usual token
/// classification pipelines.
pub const DEFAULT_IGNORE_LABELS: &[&str] = &["O"];

/// Anything that classifies every sub-word token of a batch of texts.
pub trait ClassifyTokens {
    /// Returns, per text and in input order, the classified tokens in
    /// sequence order. Special and padding tokens are never reported.
    fn classify(
        &self,
        texts: &[String],
        batch_size: usize,
    ) -> Result<Vec<Vec<ClassificationToken>>>;
}

pub struct TokenClassificationPipeline {
    tokenizer: Arc<Tokenizer>,
    classifier: TokenClassifier,
    ignore_labels: Vec<String>,
}

impl TokenClassificationPipeline {
    pub fn new(tokenizer: Arc<Tokenizer>, classifier: TokenClassifier) -> Self {
        Self {
            tokenizer,
            classifier,
            ignore_labels: DEFAULT_IGNORE_LABELS.iter().map(|l| l.to_string()).collect(),
        }
    }

    pub fn classifier(&self) -> &TokenClassifier {
        &self.classifier
    }

    fn classify_batch(&self, texts: &[String]) -> Result<Vec<Vec<ClassificationToken>>> {
        let encodings = self.tokenizer.encode_batch(texts.to_vec(), true)?;
        let Some(width) = encodings.first().map(Encoding::len) else {
            return Ok(Vec::new());
        };
        if encodings.iter().any(|encoding| encoding.len() != width) {
            return Err(SegmentError::Artifact(
                "tokenizer returned ragged encodings; batch padding is not configured".into(),
            ));
        }

        let device = self.classifier.device();
        let rows = encodings.len();
        let ids: Vec<u32> = encodings.iter().flat_map(|e| e.get_ids().to_vec()).collect();
        let type_ids: Vec<u32> = encodings
            .iter()
            .flat_map(|e| e.get_type_ids().to_vec())
            .collect();
        let input_ids = Tensor::from_vec(ids, (rows, width), device)?;
        let token_type_ids = Tensor::from_vec(type_ids, (rows, width), device)?;

        let masks: Vec<&[u32]> = encodings.iter().map(Encoding::get_attention_mask).collect();
        let lengths = lengths_from_attention_mask(&masks);

        let logits = self
            .classifier
            .forward(&input_ids, Some(&token_type_ids), &lengths)?;
        let probs = softmax_last_dim(&logits.to_dtype(DType::F32)?)?.to_vec3::<f32>()?;

        let labels = self.classifier.labels();
        let mut out = Vec::with_capacity(rows);
        for ((encoding, row), &length) in encodings.iter().zip(probs).zip(&lengths) {
            out.push(self.decode_row(encoding, &row, length, labels));
        }
        Ok(out)
    }

    fn decode_row(
        &self,
        encoding: &Encoding,
        probs: &[Vec<f32>],
        length: usize,
        labels: &[String],
    ) -> Vec<ClassificationToken> {
        let tokens = encoding.get_tokens();
        let special = encoding.get_special_tokens_mask();
        let offsets = encoding.get_offsets();

        let mut out = Vec::new();
        for index in 0..length.min(probs.len()) {
            if special[index] != 0 {
                continue;
            }
            let Some((label_id, score)) = argmax(&probs[index]) else {
                continue;
            };
            let label = labels[label_id].as_str();
            if self.ignore_labels.iter().any(|ignored| ignored == label) {
                continue;
            }
            let (start, end) = offsets[index];
            out.push(ClassificationToken {
                word: tokens[index].clone(),
                entity: EntityLabel::from(label),
                score,
                index,
                start,
                end,
            });
        }
        out
    }
}

impl ClassifyTokens for TokenClassificationPipeline {
    fn classify(
        &self,
        texts: &[String],
        batch_size: usize,
    ) -> Result<Vec<Vec<ClassificationToken>>> {
        if batch_size == 0 {
            return Err(SegmentError::InvalidOption(
                "batch_size must be greater than zero".into(),
            ));
        }

        let mut results = Vec::with_capacity(texts.len());
        for (batch_index, chunk) in texts.chunks(batch_size).enumerate() {
            log::debug!(
                "classifying batch {} ({} texts)",
                batch_index,
                chunk.len()
            );
            results.extend(self.classify_batch(chunk)?);
        }
        Ok(results)
    }
}

fn argmax(values: &[f32]) -> Option<(usize, f32)> {
    values
        .iter()
        .copied()
        .enumerate()
        .fold(None, |best, (index, value)| match best {
            Some((_, best_value)) if best_value >= value => best,
            _ => Some((index, value)),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argmax_prefers_first_maximum() {
        assert_eq!(argmax(&[0.2, 0.7, 0.1]), Some((1, 0.7)));
        assert_eq!(argmax(&[0.5, 0.5]), Some((0, 0.5)));
        assert_eq!(argmax(&[]), None);
    }
}
