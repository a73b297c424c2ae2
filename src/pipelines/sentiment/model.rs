use crate::error::Result;
use tokenizers::Tokenizer;

/// Raw output of one forward pass: class probabilities plus how many tokens were used.
#[derive(Debug, Clone)]
pub struct ClassScores {
    /// Probability per class index, same order as [`SentimentAnalysisModel::labels`].
    pub probabilities: Vec<f32>,
    /// Tokens fed to the encoder after truncation, special tokens included.
    pub input_tokens: usize,
}

pub trait SentimentAnalysisModel {
    type Options: std::fmt::Debug + Clone;

    fn new(options: Self::Options, device: candle_core::Device) -> Result<Self>
    where
        Self: Sized;

    /// Softmax scores for every class of the model.
    fn predict_scores(&self, tokenizer: &Tokenizer, text: &str) -> Result<ClassScores>;

    /// Fixed label set, indexed by class id.
    fn labels(&self) -> &[String];

    fn get_tokenizer(options: Self::Options) -> Result<Tokenizer>;

    fn device(&self) -> &candle_core::Device;
}
