//! Error types for this crate.
//!
//! All fallible library operations return [`Result<T>`] which uses [`PipelineError`] as the error type.
//! Startup code treats every variant as fatal; the HTTP layer maps request-time failures onto
//! `500` through [`crate::server::ApiError`].

use thiserror::Error;

/// A [`Result`](std::result::Result) alias using [`PipelineError`] as the error type.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// The unified error type for model loading and inference.
///
/// # Example
///
/// ```rust
/// use candle_sentiment_api::error::PipelineError;
///
/// fn happens_at_startup(e: &PipelineError) -> bool {
///     matches!(
///         e,
///         PipelineError::Download(_) | PipelineError::Config(_) | PipelineError::Device(_)
///     )
/// }
///
/// assert!(happens_at_startup(&PipelineError::Download("timeout".into())));
/// assert!(!happens_at_startup(&PipelineError::Inference("shape mismatch".into())));
/// ```
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum PipelineError {
    /// Network or hub cache failure while fetching model files. Retry may help.
    #[error("{0}")]
    Download(String),

    /// `config.json` or the weights did not describe a usable classifier.
    #[error("{0}")]
    Config(String),

    /// Device initialization failure. Fall back to CPU.
    #[error("{0}")]
    Device(String),

    /// Tokenizer could not be loaded or rejected the input text.
    #[error("{0}")]
    Tokenization(String),

    /// Forward pass or post-processing failed.
    #[error("{0}")]
    Inference(String),
}

impl From<hf_hub::api::sync::ApiError> for PipelineError {
    fn from(value: hf_hub::api::sync::ApiError) -> Self {
        PipelineError::Download(format!("HuggingFace API error: {value}"))
    }
}

impl From<candle_core::Error> for PipelineError {
    fn from(value: candle_core::Error) -> Self {
        PipelineError::Inference(value.to_string())
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(value: std::io::Error) -> Self {
        PipelineError::Config(format!("Failed to read model file: {value}"))
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(value: serde_json::Error) -> Self {
        PipelineError::Config(format!("Malformed model config: {value}"))
    }
}
