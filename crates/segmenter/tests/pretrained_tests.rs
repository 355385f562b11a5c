//! End-to-end runs against a tiny checkpoint written to a temp directory.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::Result;
use candle_core::{DType, Device, Tensor};
use segmenter::{
    ClassifyTokens, DeviceSpec, EntityLabel, ModelCache, ModelSource, Precision, PretrainedLoader,
    SegmentError, SegmentOptions, WordSegments,
};
use tempfile::TempDir;

const VOCAB: [&str; 16] = [
    "[PAD]", "[UNK]", "[CLS]", "[SEP]", "tôi", "là", "sinh", "viên", "việt", "nam", "hà",
    "nội", "học", "##s", ".", "đẹp",
];
const HIDDEN: usize = 8;
const EMBEDDING: usize = 6;
const INTERMEDIATE: usize = 16;
const LAYERS: usize = 2;
const MAX_POSITIONS: usize = 32;

/// Classifier head: `None` draws random weights, `Some(bias)` zeroes the
/// weights so every token gets the label with the largest bias.
fn write_checkpoint(dir: &Path, labels: &[&str], head_bias: Option<&[f32]>) -> Result<()> {
    let id2label: serde_json::Map<String, serde_json::Value> = labels
        .iter()
        .enumerate()
        .map(|(i, label)| (i.to_string(), serde_json::Value::from(*label)))
        .collect();
    let config = serde_json::json!({
        "model_type": "electra",
        "vocab_size": VOCAB.len(),
        "embedding_size": EMBEDDING,
        "hidden_size": HIDDEN,
        "num_hidden_layers": LAYERS,
        "num_attention_heads": 2,
        "intermediate_size": INTERMEDIATE,
        "hidden_act": "gelu",
        "max_position_embeddings": MAX_POSITIONS,
        "type_vocab_size": 2,
        "id2label": id2label,
    });
    fs::write(dir.join("config.json"), serde_json::to_string_pretty(&config)?)?;
    fs::write(dir.join("vocab.txt"), VOCAB.join("\n") + "\n")?;
    fs::write(
        dir.join("tokenizer_config.json"),
        r#"{"do_lower_case": true, "model_max_length": 32}"#,
    )?;

    let device = Device::Cpu;
    let mut tensors = HashMap::new();
    let mut random = |name: String, shape: &[usize]| -> Result<()> {
        tensors.insert(name, Tensor::randn(0f32, 0.3, shape, &device)?);
        Ok(())
    };
    random("electra.embeddings.word_embeddings.weight".into(), &[VOCAB.len(), EMBEDDING])?;
    random("electra.embeddings.position_embeddings.weight".into(), &[MAX_POSITIONS, EMBEDDING])?;
    random("electra.embeddings.token_type_embeddings.weight".into(), &[2, EMBEDDING])?;
    random("electra.embeddings.LayerNorm.gamma".into(), &[EMBEDDING])?;
    random("electra.embeddings.LayerNorm.beta".into(), &[EMBEDDING])?;
    random("electra.embeddings_project.weight".into(), &[HIDDEN, EMBEDDING])?;
    random("electra.embeddings_project.bias".into(), &[HIDDEN])?;
    for layer in 0..LAYERS {
        let base = format!("electra.encoder.layer.{layer}");
        for name in [
            "attention.self.query",
            "attention.self.key",
            "attention.self.value",
            "attention.output.dense",
        ] {
            random(format!("{base}.{name}.weight"), &[HIDDEN, HIDDEN])?;
            random(format!("{base}.{name}.bias"), &[HIDDEN])?;
        }
        random(format!("{base}.intermediate.dense.weight"), &[INTERMEDIATE, HIDDEN])?;
        random(format!("{base}.intermediate.dense.bias"), &[INTERMEDIATE])?;
        random(format!("{base}.output.dense.weight"), &[HIDDEN, INTERMEDIATE])?;
        random(format!("{base}.output.dense.bias"), &[HIDDEN])?;
        for norm in ["attention.output.LayerNorm", "output.LayerNorm"] {
            random(format!("{base}.{norm}.weight"), &[HIDDEN])?;
            random(format!("{base}.{norm}.bias"), &[HIDDEN])?;
        }
    }
    match head_bias {
        Some(bias) => {
            tensors.insert(
                "classifier.weight".into(),
                Tensor::zeros((labels.len(), HIDDEN), DType::F32, &device)?,
            );
            tensors.insert("classifier.bias".into(), Tensor::new(bias, &device)?);
        }
        None => {
            tensors.insert(
                "classifier.weight".into(),
                Tensor::randn(0f32, 1.0, (labels.len(), HIDDEN), &device)?,
            );
            tensors.insert(
                "classifier.bias".into(),
                Tensor::zeros(labels.len(), DType::F32, &device)?,
            );
        }
    }
    candle_core::safetensors::save(&tensors, dir.join("model.safetensors"))?;
    Ok(())
}

fn cpu_options() -> SegmentOptions {
    SegmentOptions {
        device: DeviceSpec::Cpu,
        precision: Precision::Float32,
        max_length: MAX_POSITIONS,
        ..SegmentOptions::default()
    }
}

fn local_cache(dir: &Path) -> ModelCache<PretrainedLoader> {
    ModelCache::new(PretrainedLoader::new(ModelSource::Local(dir.to_path_buf())))
}

#[test]
fn begin_only_head_splits_every_syllable() -> Result<()> {
    let tmp = TempDir::new()?;
    write_checkpoint(tmp.path(), &["B", "I"], Some(&[2.0, -2.0]))?;
    let mut cache = local_cache(tmp.path());

    let segments = WordSegments::with_cache(
        &mut cache,
        vec!["Tôi là sinh viên", "", "Hà Nội đẹp"],
        "vi",
        &cpu_options(),
    )?;
    assert_eq!(segments.len(), 3);
    assert_eq!(segments[0], vec!["tôi", "là", "sinh", "viên"]);
    assert!(segments[1].is_empty());
    assert_eq!(segments[2], vec!["hà", "nội", "đẹp"]);
    Ok(())
}

#[test]
fn inside_head_joins_syllables() -> Result<()> {
    let tmp = TempDir::new()?;
    write_checkpoint(tmp.path(), &["B", "I"], Some(&[-2.0, 2.0]))?;
    let mut cache = local_cache(tmp.path());

    let segments = WordSegments::with_cache(&mut cache, "Việt Nam", "vi", &cpu_options())?;
    assert_eq!(segments[0], vec!["_việt_nam"]);
    Ok(())
}

#[test]
fn ignored_label_tokens_are_dropped() -> Result<()> {
    let tmp = TempDir::new()?;
    write_checkpoint(tmp.path(), &["B", "I", "O"], Some(&[-1.0, -1.0, 3.0]))?;
    let mut cache = local_cache(tmp.path());

    let segments =
        WordSegments::with_cache(&mut cache, "tôi là sinh viên", "vi", &cpu_options())?;
    assert!(segments[0].is_empty());
    Ok(())
}

#[test]
fn batching_does_not_change_predictions() -> Result<()> {
    let tmp = TempDir::new()?;
    write_checkpoint(tmp.path(), &["B", "I"], None)?;
    let mut cache = local_cache(tmp.path());
    let pipeline = cache.ensure(&cpu_options().artifact_config())?;

    let texts: Vec<String> = ["tôi là sinh viên việt nam .", "hà nội", "học"]
        .iter()
        .map(|t| t.to_string())
        .collect();
    let batched = pipeline.classify(&texts, 3)?;
    let single = pipeline.classify(&texts, 1)?;
    assert_eq!(batched.len(), 3);

    for (left, right) in batched.iter().zip(&single) {
        assert_eq!(left.len(), right.len());
        for (a, b) in left.iter().zip(right) {
            assert_eq!((&a.word, &a.entity, a.index), (&b.word, &b.entity, b.index));
            assert!((a.score - b.score).abs() < 1e-4);
            assert!(matches!(a.entity, EntityLabel::Begin | EntityLabel::Inside));
        }
    }

    let first = &batched[0];
    assert_eq!(first.len(), 7);
    assert_eq!(first[0].index, 1);
    assert_eq!((first[0].start, first[0].end), (0, "tôi".len()));
    Ok(())
}

#[test]
fn identical_inputs_segment_identically() -> Result<()> {
    let tmp = TempDir::new()?;
    write_checkpoint(tmp.path(), &["B", "I"], None)?;
    let texts = vec!["Tôi là sinh viên Việt Nam .", "Hà Nội đẹp", "học"];
    let options = cpu_options();

    let mut cache = local_cache(tmp.path());
    let first = WordSegments::with_cache(&mut cache, texts.clone(), "vi", &options)?;
    let again = WordSegments::with_cache(&mut cache, texts.clone(), "vi", &options)?;
    assert_eq!(first, again);

    let mut cache_a = local_cache(tmp.path());
    let mut cache_b = local_cache(tmp.path());
    let fresh_a = WordSegments::with_cache(&mut cache_a, texts.clone(), "vi", &options)?;
    let fresh_b = WordSegments::with_cache(&mut cache_b, texts, "vi", &options)?;
    assert_eq!(fresh_a, fresh_b);
    assert_eq!(first, fresh_a);
    assert_eq!(first.len(), 3);
    Ok(())
}

#[test]
fn truncation_limits_classified_tokens() -> Result<()> {
    let tmp = TempDir::new()?;
    write_checkpoint(tmp.path(), &["B", "I"], Some(&[2.0, -2.0]))?;
    let mut cache = local_cache(tmp.path());

    let short = SegmentOptions {
        max_length: 4,
        ..cpu_options()
    };
    let segments = WordSegments::with_cache(&mut cache, "tôi là sinh viên", "vi", &short)?;
    assert_eq!(segments[0], vec!["tôi", "là"]);

    let full = SegmentOptions {
        max_length: 4,
        truncate: false,
        ..cpu_options()
    };
    let segments = WordSegments::with_cache(&mut cache, "tôi là sinh viên", "vi", &full)?;
    assert_eq!(segments[0].len(), 4);
    Ok(())
}

#[test]
fn max_length_beyond_position_table_is_rejected() -> Result<()> {
    let tmp = TempDir::new()?;
    write_checkpoint(tmp.path(), &["B", "I"], Some(&[1.0, 0.0]))?;
    let mut cache = local_cache(tmp.path());

    let opts = SegmentOptions {
        max_length: MAX_POSITIONS + 1,
        ..cpu_options()
    };
    let err = WordSegments::with_cache(&mut cache, "tôi", "vi", &opts).unwrap_err();
    assert!(matches!(err, SegmentError::Model(_)), "unexpected error: {err}");
    assert!(
        err.to_string()
            .contains(&format!("inputs longer than {MAX_POSITIONS} tokens")),
        "unexpected message: {err}"
    );
    assert!(!cache.is_warm());
    Ok(())
}

#[test]
fn missing_checkpoint_directory_is_an_artifact_error() {
    let tmp = TempDir::new().unwrap();
    let mut cache = local_cache(&tmp.path().join("absent"));
    let err = WordSegments::with_cache(&mut cache, "tôi", "vi", &cpu_options()).unwrap_err();
    assert!(matches!(err, SegmentError::Artifact(_)), "unexpected error: {err}");
}
