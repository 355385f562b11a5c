use std::fs;

use anyhow::Result;
use tempfile::tempdir;
use vwsegment::{
    apply_overrides, AppConfig, ConfigError, ConfigOverride, DeviceSpec, ModelSource,
    OutputFormat, Precision,
};

fn overrides(items: &[&str]) -> Vec<ConfigOverride> {
    items
        .iter()
        .map(|item| item.parse().expect("valid override"))
        .collect()
}

#[test]
fn defaults_point_at_the_vietnamese_checkpoint() -> Result<()> {
    let config = AppConfig::default();
    config.validate()?;
    assert_eq!(config.lang, "vi");
    assert_eq!(config.output.format, OutputFormat::Text);
    assert_eq!(
        config.model.source(),
        ModelSource::hub("NlpHUST/vi-word-segmentation")
    );
    Ok(())
}

#[test]
fn toml_config_resolves_paths_relative_to_file() -> Result<()> {
    let dir = tempdir()?;
    fs::create_dir(dir.path().join("checkpoint"))?;
    let path = dir.path().join("segment.toml");
    fs::write(
        &path,
        r#"
lang = "vi"

[model]
local_dir = "checkpoint"

[segment]
device = "cpu"
precision = "float32"
batch_size = 4
preserve_case = true

[output]
format = "json"
"#,
    )?;

    let config = AppConfig::from_path(&path)?;
    config.validate()?;
    assert_eq!(config.segment.device, DeviceSpec::Cpu);
    assert_eq!(config.segment.precision, Precision::Float32);
    assert_eq!(config.segment.batch_size, 4);
    assert!(config.segment.preserve_case);
    assert!(config.segment.truncate);
    assert_eq!(config.output.format, OutputFormat::Json);
    assert_eq!(
        config.model.source(),
        ModelSource::Local(dir.path().join("checkpoint"))
    );
    Ok(())
}

#[test]
fn json_config_accepts_integer_devices() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("segment.json");
    fs::write(
        &path,
        r#"{"segment": {"device": -1, "max_length": 256}, "model": {"cache_dir": "hub"}}"#,
    )?;

    let config = AppConfig::from_path(&path)?;
    assert_eq!(config.segment.device, DeviceSpec::Cpu);
    assert_eq!(config.segment.max_length, 256);
    match config.model.source() {
        ModelSource::Hub { cache_dir, .. } => {
            assert_eq!(cache_dir, Some(dir.path().join("hub")))
        }
        other => panic!("unexpected source {other:?}"),
    }
    Ok(())
}

#[test]
fn unknown_keys_and_extensions_are_rejected() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("segment.toml");
    fs::write(&path, "[segment]\nbatchsize = 4\n")?;
    assert!(matches!(
        AppConfig::from_path(&path),
        Err(ConfigError::ConfigFormat(_))
    ));

    let yaml = dir.path().join("segment.yaml");
    fs::write(&yaml, "lang: vi\n")?;
    assert!(matches!(
        AppConfig::from_path(&yaml),
        Err(ConfigError::ConfigFormat(_))
    ));

    assert!(matches!(
        AppConfig::from_path(dir.path().join("missing.toml")),
        Err(ConfigError::Io(_))
    ));
    Ok(())
}

#[test]
fn overrides_edit_nested_values() -> Result<()> {
    let config = apply_overrides(
        AppConfig::default(),
        &overrides(&[
            "segment.batch_size=8",
            "segment.truncate=false",
            "segment.device=cuda:1",
            "segment.precision=bf16",
            "model.revision=main",
            "output.format=json",
        ]),
    )?;

    assert_eq!(config.segment.batch_size, 8);
    assert!(!config.segment.truncate);
    assert_eq!(config.segment.device, DeviceSpec::Cuda(1));
    assert_eq!(config.segment.precision, Precision::BFloat16);
    assert_eq!(config.model.revision.as_deref(), Some("main"));
    assert_eq!(config.output.format, OutputFormat::Json);
    Ok(())
}

#[test]
fn overrides_that_break_the_schema_fail() {
    let err = apply_overrides(AppConfig::default(), &overrides(&["segment.batch_size=many"]))
        .unwrap_err();
    assert!(matches!(err, ConfigError::Override(_)));

    let err = apply_overrides(AppConfig::default(), &overrides(&["segment.unknown=1"]))
        .unwrap_err();
    assert!(matches!(err, ConfigError::Override(_)));

    let err = apply_overrides(AppConfig::default(), &overrides(&["lang.code=vi"])).unwrap_err();
    assert!(matches!(err, ConfigError::Override(_)));
}

#[test]
fn validation_collects_every_problem() {
    let mut config = AppConfig::default();
    config.lang = "en".into();
    config.segment.batch_size = 0;
    config.model.repo_id = " ".into();

    match config.validate() {
        Err(ConfigError::Validation(messages)) => {
            assert_eq!(messages.len(), 3, "{messages:?}");
            let rendered = ConfigError::Validation(messages).to_string();
            assert!(rendered.starts_with("invalid configuration: "));
            assert!(rendered.contains("batch_size"));
        }
        other => panic!("expected validation error, got {other:?}"),
    }

    let mut config = AppConfig::default();
    config.model.local_dir = Some("/definitely/not/here".into());
    assert!(config.validate().is_err());
}
