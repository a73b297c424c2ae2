//! Sentiment analysis over HTTP, powered by candle pipelines.
//!
//! A DistilBERT sequence classifier is loaded once through
//! [`SentimentAnalysisPipelineBuilder`](sentiment::SentimentAnalysisPipelineBuilder) and shared
//! by every request of the [`server`] router.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use candle_sentiment_api::sentiment::{DistilBertCheckpoint, SentimentAnalysisPipelineBuilder};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let pipeline =
//!     SentimentAnalysisPipelineBuilder::distilbert(DistilBertCheckpoint::default()).build()?;
//! let app = candle_sentiment_api::server::router(Arc::new(pipeline));
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8000").await?;
//! candle_sentiment_api::server::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]

// ============ Internal API ============

pub(crate) mod loaders;
pub(crate) mod models;
pub(crate) mod pipelines;

// ============ Public API ============

pub mod config;
pub mod error;
pub mod server;

pub use pipelines::sentiment;
