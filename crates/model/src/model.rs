use candle_core::{DType, Device, Error, Result, Tensor};
use candle_nn::{embedding, Embedding, Module, VarBuilder};
use layers::{checks, LayerNorm, Linear, PrecisionPolicy};

use crate::{block::EncoderBlock, config::EncoderConfig, mask::padding_mask_from_lengths};

/// Encoder with a per-token classification head.
pub struct TokenClassifier {
    config: EncoderConfig,
    labels: Vec<String>,
    policy: PrecisionPolicy,
    device: Device,
    word_embeddings: Embedding,
    position_embeddings: Embedding,
    token_type_embeddings: Embedding,
    embeddings_norm: LayerNorm,
    embeddings_project: Option<Linear>,
    blocks: Vec<EncoderBlock>,
    classifier: Linear,
}

impl TokenClassifier {
    /// Builds the classifier from weights laid out as
    /// `{model_type}.embeddings.*`, `{model_type}.encoder.layer.{i}.*` and
    /// `classifier.*`. Parameters land on the builder's device and dtype.
    pub fn new(config: &EncoderConfig, vb: VarBuilder) -> Result<Self> {
        config.validate()?;
        let labels = config.labels()?;
        let policy = PrecisionPolicy::from_parameter_dtype(vb.dtype());
        let device = vb.device().clone();

        let encoder_vb = vb.pp(&config.model_type);
        let emb_vb = encoder_vb.pp("embeddings");
        let emb_size = config.embedding_size();
        let word_embeddings =
            embedding(config.vocab_size, emb_size, emb_vb.pp("word_embeddings"))?;
        let position_embeddings = embedding(
            config.max_position_embeddings,
            emb_size,
            emb_vb.pp("position_embeddings"),
        )?;
        let token_type_embeddings = embedding(
            config.type_vocab_size,
            emb_size,
            emb_vb.pp("token_type_embeddings"),
        )?;
        let embeddings_norm =
            LayerNorm::load(emb_vb.pp("LayerNorm"), emb_size, config.layer_norm_eps)?;

        let embeddings_project = if emb_size != config.hidden_size {
            Some(Linear::load(
                encoder_vb.pp("embeddings_project"),
                emb_size,
                config.hidden_size,
            )?)
        } else {
            None
        };

        let layers_vb = encoder_vb.pp("encoder").pp("layer");
        let mut blocks = Vec::with_capacity(config.num_hidden_layers);
        for layer in 0..config.num_hidden_layers {
            blocks.push(EncoderBlock::load(config, layers_vb.pp(layer), policy)?);
        }

        let classifier = Linear::load(vb.pp("classifier"), config.hidden_size, labels.len())?;

        log::debug!(
            "token classifier ready: type={} layers={} hidden={} labels={:?} dtype={:?} device={:?}",
            config.model_type,
            config.num_hidden_layers,
            config.hidden_size,
            labels,
            vb.dtype(),
            device.location()
        );

        Ok(Self {
            config: config.clone(),
            labels,
            policy,
            device,
            word_embeddings,
            position_embeddings,
            token_type_embeddings,
            embeddings_norm,
            embeddings_project,
            blocks,
            classifier,
        })
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    /// Label names indexed by logit position.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn dtype(&self) -> DType {
        self.policy.storage()
    }

    /// Produces logits shaped `(batch, seq, num_labels)`.
    ///
    /// `input_ids` and `token_type_ids` are `u32` tensors shaped
    /// `(batch, seq)`; `lengths[b]` is the number of non-padding positions in
    /// row `b`. Padding never influences the logits of valid positions.
    pub fn forward(
        &self,
        input_ids: &Tensor,
        token_type_ids: Option<&Tensor>,
        lengths: &[usize],
    ) -> Result<Tensor> {
        let (batch, seq) = input_ids.dims2()?;
        if lengths.len() != batch {
            return Err(Error::Msg(format!(
                "expected {batch} sequence lengths, got {}",
                lengths.len()
            )));
        }
        if seq > self.config.max_position_embeddings {
            return Err(Error::Msg(format!(
                "sequence length {seq} exceeds max_position_embeddings {}",
                self.config.max_position_embeddings
            )));
        }

        let mut hidden = self.embed(input_ids, token_type_ids)?;
        if let Some(project) = &self.embeddings_project {
            hidden = project.forward(&hidden, &self.policy)?;
        }
        checks::expect_batch_seq_hidden("encoder.embeddings", &hidden, self.config.hidden_size)?;

        let mask = padding_mask_from_lengths(&self.device, lengths, seq)?;
        for block in &self.blocks {
            hidden = block.forward(&hidden, &mask)?;
        }

        self.classifier.forward(&hidden, &self.policy)
    }

    fn embed(&self, input_ids: &Tensor, token_type_ids: Option<&Tensor>) -> Result<Tensor> {
        let (_, seq) = input_ids.dims2()?;
        let words = self.word_embeddings.forward(input_ids)?;

        let positions = Tensor::arange(0u32, seq as u32, &self.device)?.unsqueeze(0)?;
        let positions = self.position_embeddings.forward(&positions)?;

        let token_types = match token_type_ids {
            Some(ids) => ids.clone(),
            None => input_ids.zeros_like()?,
        };
        let token_types = self.token_type_embeddings.forward(&token_types)?;

        let summed = words.broadcast_add(&positions)?.add(&token_types)?;
        self.embeddings_norm.forward(&summed, &self.policy)
    }
}
