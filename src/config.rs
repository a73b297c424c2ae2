//! Command line / environment configuration of the server binary.

use std::net::SocketAddr;

use clap::Parser;

use crate::models::DistilBertCheckpoint;

/// Serve a sentiment classifier over HTTP.
#[derive(Parser, Debug, Clone)]
#[command(name = "sentiment-api", version)]
#[command(about = "Sentiment analysis over HTTP, powered by candle")]
#[command(after_help = r#"Examples:
    # Serve the default SST-2 model on 0.0.0.0:8000
    sentiment-api

    # Another DistilBERT classifier, pinned revision, on GPU 0
    sentiment-api --model org/distilbert-reviews --revision v2 --cuda 0

    # Verbose logs
    RUST_LOG=candle_sentiment_api=debug sentiment-api
"#)]
pub struct ServerConfig {
    /// Address to bind
    #[arg(long, env = "SENTIMENT_API_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to bind
    #[arg(short, long, env = "SENTIMENT_API_PORT", default_value_t = 8000)]
    pub port: u16,

    /// Hub repository of a DistilBERT sequence-classification checkpoint
    #[arg(long, env = "SENTIMENT_API_MODEL", default_value = DistilBertCheckpoint::SST2_ENGLISH)]
    pub model: String,

    /// Branch, tag or commit of the checkpoint
    #[arg(long, env = "SENTIMENT_API_REVISION", default_value = "main")]
    pub revision: String,

    /// Run inference on this CUDA device instead of the CPU
    #[arg(long, env = "SENTIMENT_API_CUDA", value_name = "INDEX")]
    pub cuda: Option<usize>,
}

impl ServerConfig {
    /// The checkpoint to load.
    pub fn checkpoint(&self) -> DistilBertCheckpoint {
        DistilBertCheckpoint::new(&self.model).with_revision(&self.revision)
    }

    /// `host:port`, resolved to a socket address.
    pub fn bind_addr(&self) -> std::io::Result<SocketAddr> {
        use std::net::ToSocketAddrs;

        (self.host.as_str(), self.port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::AddrNotAvailable,
                    format!("'{}' did not resolve to an address", self.host),
                )
            })
    }
}
