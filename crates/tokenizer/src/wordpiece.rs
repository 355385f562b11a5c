use crate::artifacts;
use crate::config::Config;
use crate::errors::{Error, Result};
use crate::types::TokenizerSettings;
use tokenizers::decoders::wordpiece::WordPiece as WordPieceDecoder;
use tokenizers::normalizers::bert::BertNormalizer;
use tokenizers::pre_tokenizers::bert::BertPreTokenizer;
use tokenizers::processors::bert::BertProcessing;
use tokenizers::{PaddingParams, PaddingStrategy, Tokenizer, TruncationParams};

pub fn build_from_artifacts(cfg: &Config) -> Result<Tokenizer> {
    let paths = artifacts::resolve_paths(&cfg.artifacts)?;
    let settings = artifacts::read_settings(paths.tokenizer_config.as_deref())?;

    let mut tokenizer = match (&paths.json, &paths.vocab) {
        (Some(json), _) => {
            log::debug!("loading tokenizer from {}", json.display());
            artifacts::load_tokenizer_from_json(json)?
        }
        (None, Some(vocab)) => {
            log::debug!("assembling WordPiece tokenizer from {}", vocab.display());
            assemble_bert_pipeline(cfg, vocab, &settings)?
        }
        (None, None) => {
            return Err(Error::Artifact(
                "no tokenizer artifacts were resolved".into(),
            ))
        }
    };

    apply_length_policy(&mut tokenizer, cfg, &settings)?;
    Ok(tokenizer)
}

fn assemble_bert_pipeline(
    cfg: &Config,
    vocab: &std::path::Path,
    settings: &TokenizerSettings,
) -> Result<Tokenizer> {
    let model = artifacts::load_wordpiece_from_vocab(vocab, &settings.unk_token)?;
    let mut tokenizer = Tokenizer::new(model);

    let cls_id = special_token_id(&tokenizer, &settings.cls_token)?;
    let sep_id = special_token_id(&tokenizer, &settings.sep_token)?;

    let lowercase = cfg.lowercase.unwrap_or(settings.do_lower_case);
    // strip_accents is pinned off: tone marks are part of the syllable.
    tokenizer.with_normalizer(Some(BertNormalizer::new(true, true, Some(false), lowercase)));
    tokenizer.with_pre_tokenizer(Some(BertPreTokenizer));
    tokenizer.with_post_processor(Some(BertProcessing::new(
        (settings.sep_token.clone(), sep_id),
        (settings.cls_token.clone(), cls_id),
    )));
    tokenizer.with_decoder(Some(WordPieceDecoder::default()));
    Ok(tokenizer)
}

fn apply_length_policy(
    tokenizer: &mut Tokenizer,
    cfg: &Config,
    settings: &TokenizerSettings,
) -> Result<()> {
    if let Some(limit) = declared_limit_exceeded(cfg.max_length, settings) {
        log::warn!(
            "max_length {} exceeds the checkpoint's model_max_length {limit}; longer inputs may not fit the model",
            cfg.max_length
        );
    }
    let truncation = cfg.truncate.then(|| TruncationParams {
        max_length: cfg.max_length,
        ..Default::default()
    });
    tokenizer.with_truncation(truncation)?;

    // A bundled tokenizer.json may already name its pad token.
    let (pad_token, pad_id) = match tokenizer.get_padding() {
        Some(existing) => (existing.pad_token.clone(), existing.pad_id),
        None => {
            let id = special_token_id(tokenizer, &settings.pad_token)?;
            (settings.pad_token.clone(), id)
        }
    };
    tokenizer.with_padding(Some(PaddingParams {
        strategy: PaddingStrategy::BatchLongest,
        pad_id,
        pad_token,
        ..Default::default()
    }));
    Ok(())
}

/// The checkpoint's declared sequence limit, when `max_length` goes past it.
fn declared_limit_exceeded(max_length: usize, settings: &TokenizerSettings) -> Option<usize> {
    settings
        .model_max_length
        .filter(|limit| max_length > *limit)
}

fn special_token_id(tokenizer: &Tokenizer, token: &str) -> Result<u32> {
    tokenizer.token_to_id(token).ok_or_else(|| {
        Error::Validation(format!(
            "expected special token '{token}' to be present in tokenizer vocab"
        ))
    })
}
