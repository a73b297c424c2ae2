//! Sentiment analysis pipeline.
//!
//! Classify text into the label set of a fine-tuned checkpoint (`POSITIVE` / `NEGATIVE` for the
//! default SST-2 model). Every call returns all labels ranked by confidence.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use candle_sentiment_api::sentiment::{DistilBertCheckpoint, SentimentAnalysisPipelineBuilder};
//!
//! # fn main() -> candle_sentiment_api::error::Result<()> {
//! let pipeline =
//!     SentimentAnalysisPipelineBuilder::distilbert(DistilBertCheckpoint::default()).build()?;
//!
//! let output = pipeline.run("I absolutely love this product!")?;
//! let top = &output.predictions[0];
//! println!("sentiment: {} (confidence: {:.2})", top.label, top.score);
//! # Ok(())
//! # }
//! ```
//!
//! # Supported Models
//!
//! | Model | Checkpoints | Builder Method |
//! |-------|-------------|----------------|
//! | DistilBERT | any `DistilBertForSequenceClassification` repo | [`SentimentAnalysisPipelineBuilder::distilbert`] |

// ============ Internal API ============

pub(crate) mod builder;
pub(crate) mod model;
pub(crate) mod pipeline;

// ============ Public API ============

pub use crate::models::DistilBertCheckpoint;
pub use crate::pipelines::stats::PipelineStats;
pub use builder::SentimentAnalysisPipelineBuilder;
pub use pipeline::{Classifier, Output, Prediction, SentimentAnalysisPipeline};

/// Only for generic annotations. Use [`SentimentAnalysisPipelineBuilder::distilbert`].
pub type SentimentDistilBert = crate::models::distilbert::SentimentDistilBertModel;
