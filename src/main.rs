use std::{
    fs,
    io::{self, BufRead, Write},
    path::PathBuf,
};

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;
use vwsegment::{
    apply_overrides, AppConfig, ConfigOverride, DeviceSpec, ModelCache, OutputFormat, Precision,
    PretrainedLoader, WordSegments,
};

#[derive(Parser, Debug)]
#[command(
    name = "vwsegment",
    about = "Segment Vietnamese text into words with a pretrained token classifier"
)]
struct Args {
    /// Texts to segment. Read from --input or stdin (one text per line) when empty.
    texts: Vec<String>,

    /// File with one text per line, `-` for stdin.
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// TOML or JSON configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override configuration values (e.g. segment.batch_size=8).
    #[arg(long = "override", value_name = "KEY=VALUE")]
    overrides: Vec<ConfigOverride>,

    #[arg(long)]
    lang: Option<String>,

    /// auto, cpu, cuda[:N], metal[:N] or a device index (-1 for cpu).
    #[arg(long, allow_hyphen_values = true)]
    device: Option<String>,

    /// float32, float16 or bfloat16.
    #[arg(long)]
    precision: Option<String>,

    #[arg(long)]
    max_length: Option<usize>,

    #[arg(long)]
    batch_size: Option<usize>,

    /// Keep texts longer than the model's maximum length untruncated.
    #[arg(long)]
    no_truncate: bool,

    /// Keep the original casing of words.
    #[arg(long)]
    preserve_case: bool,

    /// Hub repository id or local checkpoint directory.
    #[arg(long)]
    model: Option<String>,

    #[arg(long)]
    revision: Option<String>,

    #[arg(long, value_enum)]
    format: Option<OutputFormat>,

    /// Log progress to stderr.
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();
    setup_logging(args.verbose);

    if let Err(err) = run(args) {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn setup_logging(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn run(args: Args) -> Result<()> {
    let config = resolve_config(&args)?;
    let texts = read_texts(&args)?;
    if texts.is_empty() {
        log::warn!("no input texts");
        return Ok(());
    }

    let source = config.model.source();
    log::info!("segmenting {} texts with {:?}", texts.len(), source);
    let mut cache = ModelCache::new(PretrainedLoader::new(source));
    let segments = WordSegments::with_cache(&mut cache, texts, &config.lang, &config.segment)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match config.output.format {
        OutputFormat::Text => {
            for words in &segments {
                writeln!(out, "{}", words.join(" "))?;
            }
        }
        OutputFormat::Json => {
            serde_json::to_writer(&mut out, segments.as_slice())?;
            writeln!(out)?;
        }
    }
    Ok(())
}

/// Config file, then `--override` edits, then dedicated flags.
fn resolve_config(args: &Args) -> Result<AppConfig> {
    let config = match &args.config {
        Some(path) => AppConfig::from_path(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => AppConfig::default(),
    };
    let mut config = apply_overrides(config, &args.overrides)?;

    if let Some(lang) = &args.lang {
        config.lang = lang.clone();
    }
    if let Some(device) = &args.device {
        config.segment.device = device.parse::<DeviceSpec>()?;
    }
    if let Some(precision) = &args.precision {
        config.segment.precision = precision.parse::<Precision>()?;
    }
    if let Some(max_length) = args.max_length {
        config.segment.max_length = max_length;
    }
    if let Some(batch_size) = args.batch_size {
        config.segment.batch_size = batch_size;
    }
    if args.no_truncate {
        config.segment.truncate = false;
    }
    if args.preserve_case {
        config.segment.preserve_case = true;
    }
    if let Some(model) = &args.model {
        let path = PathBuf::from(model);
        if path.is_dir() {
            config.model.local_dir = Some(path);
        } else {
            config.model.local_dir = None;
            config.model.repo_id = model.clone();
        }
    }
    if let Some(revision) = &args.revision {
        config.model.revision = Some(revision.clone());
    }
    if let Some(format) = args.format {
        config.output.format = format;
    }

    config.validate()?;
    Ok(config)
}

fn read_texts(args: &Args) -> Result<Vec<String>> {
    if !args.texts.is_empty() {
        if args.input.is_some() {
            bail!("pass texts either as arguments or with --input, not both");
        }
        return Ok(args.texts.clone());
    }

    let lines: Vec<String> = match &args.input {
        Some(path) if path.as_os_str() != "-" => fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?
            .lines()
            .map(str::to_string)
            .collect(),
        _ => io::stdin()
            .lock()
            .lines()
            .collect::<io::Result<_>>()
            .context("failed to read stdin")?,
    };
    Ok(lines
        .into_iter()
        .filter(|line| !line.trim().is_empty())
        .collect())
}
