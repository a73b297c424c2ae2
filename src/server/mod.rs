//! HTTP surface: health check, prediction and metrics exposition.
//!
//! | Method | Path | Handler |
//! |--------|------|---------|
//! | `GET`  | `/` | [`handlers::health`] |
//! | `POST` | `/predict`, `/predict/` | [`handlers::predict`] |
//! | `GET`  | `/metrics` | [`handlers::metrics`] |
//!
//! Every route is wrapped by [`metrics::track`].

use std::sync::Arc;

use axum::extract::FromRef;
use axum::routing::{get, post};
use axum::{middleware, Router};
use tokio::net::TcpListener;

use crate::pipelines::sentiment::Classifier;

pub mod error;
pub mod handlers;
pub mod input;
pub mod metrics;

pub use error::{ApiError, FieldError};
pub use handlers::{HealthResponse, PredictResponse, HEALTH_MESSAGE};
pub use input::TextInput;
pub use metrics::HttpMetrics;

/// Shared, read-only state handed to every request.
#[derive(Clone)]
pub struct AppState {
    /// The process-wide model instance.
    pub classifier: Arc<dyn Classifier>,
    /// Registry the instrumentation middleware writes to.
    pub metrics: Arc<HttpMetrics>,
}

impl FromRef<AppState> for Arc<HttpMetrics> {
    fn from_ref(state: &AppState) -> Self {
        Arc::clone(&state.metrics)
    }
}

/// Router over `classifier` with a fresh metrics registry.
pub fn router(classifier: Arc<dyn Classifier>) -> Router {
    router_with_metrics(classifier, Arc::new(HttpMetrics::new()))
}

/// Router over `classifier` recording into `registry`.
pub fn router_with_metrics(classifier: Arc<dyn Classifier>, registry: Arc<HttpMetrics>) -> Router {
    let state = AppState {
        classifier,
        metrics: Arc::clone(&registry),
    };

    Router::new()
        .route("/", get(handlers::health))
        .route("/predict", post(handlers::predict))
        .route("/predict/", post(handlers::predict))
        .route("/metrics", get(handlers::metrics))
        .layer(middleware::from_fn_with_state(registry, metrics::track))
        .with_state(state)
}

/// Serve `app` on `listener` until Ctrl-C or SIGTERM.
pub async fn serve(listener: TcpListener, app: Router) -> std::io::Result<()> {
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutting down");
}
