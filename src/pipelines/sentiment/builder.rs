use super::model::SentimentAnalysisModel;
use super::pipeline::SentimentAnalysisPipeline;
use crate::error::Result;
use crate::pipelines::utils::DeviceRequest;

crate::pipelines::utils::impl_device_methods!(direct: SentimentAnalysisPipelineBuilder<M: SentimentAnalysisModel>);

/// Builder for creating [`SentimentAnalysisPipeline`] instances.
///
/// Use [`Self::distilbert`] as the entry point.
///
/// # Examples
///
/// ```rust,no_run
/// # use candle_sentiment_api::sentiment::{SentimentAnalysisPipelineBuilder, DistilBertCheckpoint};
/// # fn main() -> candle_sentiment_api::error::Result<()> {
/// let pipeline = SentimentAnalysisPipelineBuilder::distilbert(DistilBertCheckpoint::default())
///     .cuda(0)
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct SentimentAnalysisPipelineBuilder<M: SentimentAnalysisModel> {
    options: M::Options,
    device_request: DeviceRequest,
}

impl<M: SentimentAnalysisModel> SentimentAnalysisPipelineBuilder<M> {
    pub(crate) fn new(options: M::Options) -> Self {
        Self {
            options,
            device_request: DeviceRequest::Cpu,
        }
    }

    /// Loads the model and tokenizer.
    ///
    /// Blocks on hub downloads and weight loading; call it once, before serving.
    ///
    /// # Errors
    ///
    /// Returns an error if downloading, model loading or device initialization fails.
    pub fn build(self) -> Result<SentimentAnalysisPipeline<M>> {
        let device = self.device_request.resolve()?;
        tracing::info!(options = ?self.options, device = %self.device_request, "loading sentiment model");

        let model = M::new(self.options.clone(), device)?;
        let tokenizer = M::get_tokenizer(self.options)?;

        Ok(SentimentAnalysisPipeline { model, tokenizer })
    }
}

impl SentimentAnalysisPipelineBuilder<super::SentimentDistilBert> {
    /// Creates a builder for a DistilBERT sequence-classification checkpoint.
    pub fn distilbert(checkpoint: crate::models::DistilBertCheckpoint) -> Self {
        Self::new(checkpoint)
    }
}
