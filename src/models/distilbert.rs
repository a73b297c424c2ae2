use candle_core::{DType, Device, IndexOp, Tensor, D};
use candle_nn::{linear, ops::softmax, Linear, Module, VarBuilder};
use candle_transformers::models::distilbert::{Config, DistilBertModel};
use tokenizers::Tokenizer;

use crate::error::{PipelineError, Result};
use crate::loaders::{ConfigLoader, TokenizerLoader, WeightsLoader};
use crate::pipelines::sentiment::model::{ClassScores, SentimentAnalysisModel};

/// Hub checkpoint the sentiment pipeline loads.
///
/// Any repository holding a `DistilBertForSequenceClassification` export works; the label set
/// comes from its `config.json`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistilBertCheckpoint {
    /// Hub repository id, e.g. `distilbert-base-uncased-finetuned-sst-2-english`.
    pub repo_id: String,
    /// Branch, tag or commit to pin.
    pub revision: String,
}

impl DistilBertCheckpoint {
    /// English SST-2 checkpoint with `NEGATIVE` / `POSITIVE` labels.
    pub const SST2_ENGLISH: &'static str = "distilbert-base-uncased-finetuned-sst-2-english";

    /// Checkpoint at the `main` revision.
    pub fn new(repo_id: impl Into<String>) -> Self {
        Self {
            repo_id: repo_id.into(),
            revision: "main".into(),
        }
    }

    /// Pin a branch, tag or commit.
    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = revision.into();
        self
    }
}

impl Default for DistilBertCheckpoint {
    fn default() -> Self {
        Self::new(Self::SST2_ENGLISH)
    }
}

impl std::fmt::Display for DistilBertCheckpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.repo_id, self.revision)
    }
}

/// `DistilBertForSequenceClassification`: encoder, then `pre_classifier` → ReLU → `classifier`
/// over the first token.
pub struct SentimentDistilBertModel {
    encoder: DistilBertModel,
    pre_classifier: Linear,
    classifier: Linear,
    device: Device,
    labels: Vec<String>,
}

impl SentimentDistilBertModel {
    /// Fetch config and weights for `checkpoint` and build the classifier on `device`.
    pub fn new(checkpoint: DistilBertCheckpoint, device: Device) -> Result<Self> {
        let (config_str, class_cfg) =
            ConfigLoader::new(&checkpoint.repo_id, &checkpoint.revision).load()?;
        let labels = class_cfg.labels()?;
        let config: Config = serde_json::from_str(&config_str)?;

        let vb = WeightsLoader::new(&checkpoint.repo_id, &checkpoint.revision).load(&device)?;

        let (encoder, pre_classifier, classifier) =
            load_classifier(vb, &config, class_cfg.dim, labels.len()).map_err(|e| {
                PipelineError::Config(format!(
                    "'{checkpoint}' is not a DistilBERT sequence classifier: {e}"
                ))
            })?;

        tracing::info!(
            checkpoint = %checkpoint,
            labels = ?labels,
            "sentiment model loaded"
        );

        Ok(Self {
            encoder,
            pre_classifier,
            classifier,
            device,
            labels,
        })
    }

    fn logits(&self, input_ids: &Tensor) -> candle_core::Result<Tensor> {
        let (batch, seq_len) = input_ids.dims2()?;
        // Non-zero entries hide a position; a lone unpadded sequence hides nothing.
        let mask = Tensor::zeros((batch, seq_len), DType::U8, &self.device)?;

        let hidden = self.encoder.forward(input_ids, &mask)?;
        let pooled = hidden.i((.., 0))?;
        let pooled = self.pre_classifier.forward(&pooled)?.relu()?;
        self.classifier.forward(&pooled)
    }

    /// Tokenizer truncating at the checkpoint's `max_position_embeddings`.
    pub fn get_tokenizer(checkpoint: DistilBertCheckpoint) -> Result<Tokenizer> {
        let (_, class_cfg) = ConfigLoader::new(&checkpoint.repo_id, &checkpoint.revision).load()?;
        TokenizerLoader::new(
            &checkpoint.repo_id,
            &checkpoint.revision,
            class_cfg.max_position_embeddings,
        )
        .load()
    }
}

impl SentimentAnalysisModel for SentimentDistilBertModel {
    type Options = DistilBertCheckpoint;

    fn new(options: Self::Options, device: Device) -> Result<Self> {
        SentimentDistilBertModel::new(options, device)
    }

    fn predict_scores(&self, tokenizer: &Tokenizer, text: &str) -> Result<ClassScores> {
        let tokens = tokenizer.encode(text, true).map_err(|e| {
            PipelineError::Tokenization(format!(
                "Tokenization failed on '{}': {}",
                &text.chars().take(50).collect::<String>(),
                e
            ))
        })?;

        let input_ids = Tensor::new(tokens.get_ids(), &self.device)?.unsqueeze(0)?;
        let logits = self.logits(&input_ids)?;

        let probs = softmax(&logits, D::Minus1)?;
        let probabilities = probs.squeeze(0)?.to_vec1::<f32>()?;

        Ok(ClassScores {
            probabilities,
            input_tokens: tokens.len(),
        })
    }

    fn labels(&self) -> &[String] {
        &self.labels
    }

    fn get_tokenizer(options: Self::Options) -> Result<Tokenizer> {
        Self::get_tokenizer(options)
    }

    fn device(&self) -> &Device {
        &self.device
    }
}

fn load_classifier(
    vb: VarBuilder<'static>,
    config: &Config,
    dim: usize,
    num_labels: usize,
) -> candle_core::Result<(DistilBertModel, Linear, Linear)> {
    let encoder = DistilBertModel::load(vb.pp("distilbert"), config)?;
    let pre_classifier = linear(dim, dim, vb.pp("pre_classifier"))?;
    let classifier = linear(dim, num_labels, vb.pp("classifier"))?;
    Ok((encoder, pre_classifier, classifier))
}
