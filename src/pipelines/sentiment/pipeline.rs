use super::model::SentimentAnalysisModel;
use crate::error::{PipelineError, Result};
use crate::pipelines::stats::PipelineStats;
use serde::{Deserialize, Serialize};
use tokenizers::Tokenizer;

// ============ Output types ============

/// A sentiment prediction with label and confidence score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// The predicted sentiment (e.g., "POSITIVE", "NEGATIVE").
    pub label: String,
    /// Confidence score (0.0 to 1.0).
    pub score: f32,
}

/// Output from [`SentimentAnalysisPipeline::run`].
#[derive(Debug)]
pub struct Output {
    /// Every label of the model, highest score first.
    pub predictions: Vec<Prediction>,
    /// Execution statistics.
    pub stats: PipelineStats,
}

// ============ Classifier seam ============

/// Anything that can turn text into ranked sentiment predictions.
///
/// The HTTP layer only talks to this trait, so a loaded pipeline and a test double are
/// interchangeable behind an `Arc<dyn Classifier>`.
pub trait Classifier: Send + Sync {
    /// Ranked predictions for `text`, highest score first.
    ///
    /// The list is not guaranteed to be non-empty; callers decide how to treat that.
    fn classify(&self, text: &str) -> Result<Vec<Prediction>>;

    /// The fixed label set predictions are drawn from.
    fn labels(&self) -> &[String];
}

// ============ Pipeline ============

/// Classifies text sentiment with a sequence-classification checkpoint.
///
/// Construct with [`SentimentAnalysisPipelineBuilder`](super::SentimentAnalysisPipelineBuilder).
///
/// # Examples
///
/// ```rust,no_run
/// # use candle_sentiment_api::sentiment::{SentimentAnalysisPipelineBuilder, DistilBertCheckpoint};
/// # fn main() -> candle_sentiment_api::error::Result<()> {
/// let pipeline =
///     SentimentAnalysisPipelineBuilder::distilbert(DistilBertCheckpoint::default()).build()?;
///
/// let output = pipeline.run("I love this product!")?;
/// let top = &output.predictions[0];
/// println!("{}: {:.2}", top.label, top.score);
/// # Ok(())
/// # }
/// ```
pub struct SentimentAnalysisPipeline<M: SentimentAnalysisModel> {
    pub(crate) model: M,
    pub(crate) tokenizer: Tokenizer,
}

impl<M: SentimentAnalysisModel> SentimentAnalysisPipeline<M> {
    /// Score `text` against every label of the model.
    pub fn run(&self, text: &str) -> Result<Output> {
        let stats_builder = PipelineStats::start();

        let scores = self.model.predict_scores(&self.tokenizer, text)?;
        let labels = self.model.labels();

        if scores.probabilities.len() != labels.len() {
            return Err(PipelineError::Inference(format!(
                "Model produced {} scores for {} labels",
                scores.probabilities.len(),
                labels.len()
            )));
        }

        let mut predictions: Vec<Prediction> = labels
            .iter()
            .zip(scores.probabilities)
            .map(|(label, score)| Prediction {
                label: label.clone(),
                score,
            })
            .collect();
        predictions.sort_by(|a, b| b.score.total_cmp(&a.score));

        Ok(Output {
            predictions,
            stats: stats_builder.finish(scores.input_tokens),
        })
    }

    /// Returns the device (CPU/GPU) the model is running on.
    pub fn device(&self) -> &candle_core::Device {
        self.model.device()
    }
}

impl<M> Classifier for SentimentAnalysisPipeline<M>
where
    M: SentimentAnalysisModel + Send + Sync,
{
    fn classify(&self, text: &str) -> Result<Vec<Prediction>> {
        let output = self.run(text)?;
        tracing::debug!(
            input_tokens = output.stats.input_tokens,
            elapsed_ms = output.stats.total_time.as_secs_f64() * 1000.0,
            "classified text"
        );
        Ok(output.predictions)
    }

    fn labels(&self) -> &[String] {
        self.model.labels()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipelines::sentiment::model::ClassScores;
    use tokenizers::models::wordlevel::WordLevel;

    #[derive(Clone)]
    struct FixedScores {
        labels: Vec<String>,
        probabilities: Vec<f32>,
        device: candle_core::Device,
    }

    impl SentimentAnalysisModel for FixedScores {
        type Options = Vec<f32>;

        fn new(options: Self::Options, device: candle_core::Device) -> Result<Self> {
            Ok(Self {
                labels: vec!["NEGATIVE".into(), "POSITIVE".into()],
                probabilities: options,
                device,
            })
        }

        fn predict_scores(&self, _tokenizer: &Tokenizer, text: &str) -> Result<ClassScores> {
            Ok(ClassScores {
                probabilities: self.probabilities.clone(),
                input_tokens: text.split_whitespace().count() + 2,
            })
        }

        fn labels(&self) -> &[String] {
            &self.labels
        }

        fn get_tokenizer(_options: Self::Options) -> Result<Tokenizer> {
            Ok(Tokenizer::new(WordLevel::default()))
        }

        fn device(&self) -> &candle_core::Device {
            &self.device
        }
    }

    fn pipeline(probabilities: Vec<f32>) -> SentimentAnalysisPipeline<FixedScores> {
        SentimentAnalysisPipeline {
            model: FixedScores::new(probabilities.clone(), candle_core::Device::Cpu).unwrap(),
            tokenizer: FixedScores::get_tokenizer(probabilities).unwrap(),
        }
    }

    #[test]
    fn ranks_labels_by_descending_score() {
        let output = pipeline(vec![0.1, 0.9]).run("great stuff").unwrap();

        assert_eq!(output.predictions[0].label, "POSITIVE");
        assert_eq!(output.predictions[1].label, "NEGATIVE");
        assert_eq!(output.stats.input_tokens, 4);
    }

    #[test]
    fn score_count_must_match_label_count() {
        let err = pipeline(vec![1.0]).run("anything").unwrap_err();
        assert!(matches!(err, PipelineError::Inference(_)));
    }

    #[test]
    fn classifier_exposes_model_labels() {
        let p = pipeline(vec![0.7, 0.3]);
        let classifier: &dyn Classifier = &p;

        assert_eq!(classifier.labels(), ["NEGATIVE", "POSITIVE"]);
        assert_eq!(classifier.classify("meh").unwrap()[0].label, "NEGATIVE");
    }

    #[test]
    fn reports_model_device() {
        assert!(pipeline(vec![0.5, 0.5]).device().is_cpu());
    }
}
