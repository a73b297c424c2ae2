//! Route handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::error::ApiError;
use super::input::TextInput;
use super::metrics::{HttpMetrics, PROMETHEUS_CONTENT_TYPE};
use super::AppState;
use crate::pipelines::sentiment::Prediction;

/// Fixed payload of the health check.
pub const HEALTH_MESSAGE: &str = "Sentiment Analysis API is running!";

/// Smallest and largest score a response may carry; scores stay inside the open interval.
const MIN_SCORE: f32 = f32::EPSILON;
const MAX_SCORE: f32 = 1.0 - f32::EPSILON;

/// Body of `GET /`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always [`HEALTH_MESSAGE`].
    pub message: String,
}

/// Body of a successful `POST /predict`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictResponse {
    /// The submitted text, unchanged.
    pub input_text: String,
    /// Top-ranked prediction.
    pub prediction: Prediction,
}

/// `GET /`
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        message: HEALTH_MESSAGE.to_owned(),
    })
}

/// `POST /predict`
pub async fn predict(
    State(state): State<AppState>,
    input: TextInput,
) -> Result<Json<PredictResponse>, ApiError> {
    let classifier = Arc::clone(&state.classifier);
    let text = input.text;

    // Inference is CPU bound; keep it off the async workers.
    let (text, ranked) = tokio::task::spawn_blocking(move || {
        let ranked = classifier.classify(&text);
        (text, ranked)
    })
    .await
    .map_err(|e| ApiError::Inference(format!("inference task did not complete: {e}")))?;

    let prediction = top_prediction(ranked?, state.classifier.labels())?;
    state.metrics.record_prediction(&prediction.label);

    Ok(Json(PredictResponse {
        input_text: text,
        prediction,
    }))
}

/// `GET /metrics`
pub async fn metrics(State(metrics): State<Arc<HttpMetrics>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)],
        metrics.export_prometheus(),
    )
}

/// Take the first entry of a ranked result and check it before it reaches a client.
///
/// An empty list, a label outside the model's set or a non-finite / out-of-range score is an
/// inference error. Scores that saturate to exactly 0 or 1 in `f32` are nudged inward.
pub(crate) fn top_prediction(
    ranked: Vec<Prediction>,
    labels: &[String],
) -> Result<Prediction, ApiError> {
    let Some(first) = ranked.into_iter().next() else {
        return Err(ApiError::Inference(
            "classifier returned no predictions".into(),
        ));
    };

    if !labels.contains(&first.label) {
        return Err(ApiError::Inference(format!(
            "classifier returned label '{}' outside its label set [{}]",
            first.label,
            labels.join(", ")
        )));
    }

    if !first.score.is_finite() || !(0.0..=1.0).contains(&first.score) {
        return Err(ApiError::Inference(format!(
            "classifier returned score {} for '{}'",
            first.score, first.label
        )));
    }

    Ok(Prediction {
        score: first.score.clamp(MIN_SCORE, MAX_SCORE),
        label: first.label,
    })
}
