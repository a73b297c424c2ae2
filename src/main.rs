use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use candle_sentiment_api::config::ServerConfig;
use candle_sentiment_api::sentiment::{Classifier, SentimentAnalysisPipelineBuilder};
use candle_sentiment_api::server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::parse();
    let checkpoint = config.checkpoint();

    // The model must be ready before the socket is bound; any failure here ends the process.
    let build_checkpoint = checkpoint.clone();
    let cuda = config.cuda;
    let pipeline = tokio::task::spawn_blocking(move || {
        SentimentAnalysisPipelineBuilder::distilbert(build_checkpoint)
            .device(cuda)
            .build()
    })
    .await
    .context("model loading task panicked")?
    .with_context(|| format!("failed to load sentiment model '{checkpoint}'"))?;

    tracing::info!(device = ?pipeline.device(), "model ready");
    let classifier: Arc<dyn Classifier> = Arc::new(pipeline);
    tracing::info!(labels = ?classifier.labels(), "serving labels");

    let addr = config.bind_addr().context("invalid bind address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "serving sentiment analysis API");

    server::serve(listener, server::router(classifier))
        .await
        .context("server error")?;

    Ok(())
}
