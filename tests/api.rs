//! HTTP contract tests against an in-process router with stub classifiers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use candle_sentiment_api::error::{PipelineError, Result};
use candle_sentiment_api::sentiment::{Classifier, Prediction};
use candle_sentiment_api::server::metrics::OTHER_METHOD;
use candle_sentiment_api::server::{
    self, HealthResponse, HttpMetrics, PredictResponse, HEALTH_MESSAGE,
};

/// Scores text by counting a few cue words; records every input it sees.
struct KeywordClassifier {
    labels: Vec<String>,
    seen: Mutex<Vec<String>>,
}

impl KeywordClassifier {
    fn new() -> Self {
        Self {
            labels: vec!["NEGATIVE".into(), "POSITIVE".into()],
            seen: Mutex::new(Vec::new()),
        }
    }

    fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

impl Classifier for KeywordClassifier {
    fn classify(&self, text: &str) -> Result<Vec<Prediction>> {
        self.seen.lock().unwrap().push(text.to_owned());

        let lower = text.to_lowercase();
        let positive = ["lovely", "love", "great"]
            .iter()
            .filter(|w| lower.contains(*w))
            .count();
        let score = if positive > 0 { 0.98 } else { 0.7 };
        let (top, other) = if positive > 0 {
            ("POSITIVE", "NEGATIVE")
        } else {
            ("NEGATIVE", "POSITIVE")
        };

        Ok(vec![
            Prediction {
                label: top.into(),
                score,
            },
            Prediction {
                label: other.into(),
                score: 1.0 - score,
            },
        ])
    }

    fn labels(&self) -> &[String] {
        &self.labels
    }
}

/// Returns a fixed outcome regardless of input.
struct FixedClassifier {
    labels: Vec<String>,
    outcome: fn() -> Result<Vec<Prediction>>,
    calls: AtomicUsize,
}

impl FixedClassifier {
    fn new(outcome: fn() -> Result<Vec<Prediction>>) -> Self {
        Self {
            labels: vec!["NEGATIVE".into(), "POSITIVE".into()],
            outcome,
            calls: AtomicUsize::new(0),
        }
    }
}

impl Classifier for FixedClassifier {
    fn classify(&self, _text: &str) -> Result<Vec<Prediction>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.outcome)()
    }

    fn labels(&self) -> &[String] {
        &self.labels
    }
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, body.to_vec())
}

fn post_predict(body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/predict")
        .header(header::CONTENT_TYPE, "application/json")
        .body(body.into())
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn health_check_is_fixed_and_idempotent() {
    let app = server::router(Arc::new(KeywordClassifier::new()));

    let mut bodies = Vec::new();
    for _ in 0..3 {
        let (status, body) = send(&app, get("/")).await;
        assert_eq!(status, StatusCode::OK);
        bodies.push(body);
    }

    assert!(bodies.windows(2).all(|w| w[0] == w[1]));
    let health: HealthResponse = serde_json::from_slice(&bodies[0]).unwrap();
    assert_eq!(health.message, HEALTH_MESSAGE);
    assert_eq!(
        serde_json::from_slice::<Value>(&bodies[0]).unwrap(),
        json!({"message": "Sentiment Analysis API is running!"})
    );
}

#[tokio::test]
async fn health_check_does_not_touch_the_model() {
    let classifier = Arc::new(FixedClassifier::new(|| {
        Err(PipelineError::Inference("should not be called".into()))
    }));
    let app = server::router(classifier.clone());

    let (status, _) = send(&app, get("/")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn predict_lovely_day() {
    let app = server::router(Arc::new(KeywordClassifier::new()));

    let (status, body) = send(&app, post_predict(r#"{"text": "What a lovely day!"}"#)).await;

    assert_eq!(status, StatusCode::OK);
    let res: PredictResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(res.input_text, "What a lovely day!");
    assert!(["POSITIVE", "NEGATIVE"].contains(&res.prediction.label.as_str()));
    assert!(0.0 < res.prediction.score && res.prediction.score < 1.0);
}

#[tokio::test]
async fn predict_response_shape() {
    let app = server::router(Arc::new(KeywordClassifier::new()));

    let (_, body) = send(&app, post_predict(r#"{"text": "I love it"}"#)).await;
    let value: Value = serde_json::from_slice(&body).unwrap();

    let object = value.as_object().unwrap();
    assert_eq!(object.len(), 2);
    assert_eq!(value["input_text"], "I love it");
    assert_eq!(value["prediction"]["label"], "POSITIVE");
    assert!(value["prediction"]["score"].is_f64());
}

#[tokio::test]
async fn input_text_is_echoed_verbatim() {
    let classifier = Arc::new(KeywordClassifier::new());
    let app = server::router(classifier.clone());

    let texts = [
        "  leading and trailing  ",
        "multi\nline\ttext",
        "émojis 🎉 and ünïcödé",
        r#"quotes " and \ backslashes"#,
    ];
    for text in texts {
        let body = serde_json::to_vec(&json!({ "text": text })).unwrap();
        let (status, body) = send(&app, post_predict(body)).await;

        assert_eq!(status, StatusCode::OK);
        let res: PredictResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(res.input_text, text);
    }

    // The model saw exactly what was submitted.
    assert_eq!(classifier.seen(), texts);
}

#[tokio::test]
async fn empty_text_still_reaches_the_model() {
    let classifier = Arc::new(KeywordClassifier::new());
    let app = server::router(classifier.clone());

    let (status, body) = send(&app, post_predict(r#"{"text": ""}"#)).await;

    assert_eq!(status, StatusCode::OK);
    let res: PredictResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(res.input_text, "");
    assert_eq!(classifier.seen(), vec![String::new()]);
}

#[tokio::test]
async fn wrong_field_name_is_422() {
    let classifier = Arc::new(KeywordClassifier::new());
    let app = server::router(classifier.clone());

    let (status, body) = send(&app, post_predict(r#"{"txt": "hello"}"#)).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let value: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(
        value,
        json!({"detail": [{"loc": ["body", "text"], "msg": "Field required", "type": "missing"}]})
    );
    assert!(classifier.seen().is_empty());
}

#[tokio::test]
async fn malformed_bodies_are_client_errors() {
    let app = server::router(Arc::new(KeywordClassifier::new()));

    let cases = [
        ("", "missing"),
        ("{}", "missing"),
        (r#"{"text": 5}"#, "string_type"),
        (r#"{"text": null}"#, "string_type"),
        ("[1, 2]", "model_attributes_type"),
        ("not json", "json_invalid"),
    ];
    for (body, kind) in cases {
        let (status, response) = send(&app, post_predict(body)).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "body {body:?}");
        let value: Value = serde_json::from_slice(&response).unwrap();
        assert_eq!(value["detail"][0]["type"], kind, "body {body:?}");
    }
}

#[tokio::test]
async fn trailing_slash_is_accepted() {
    let app = server::router(Arc::new(KeywordClassifier::new()));

    let request = Request::builder()
        .method(Method::POST)
        .uri("/predict/")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"text": "great"}"#))
        .unwrap();
    let (status, _) = send(&app, request).await;

    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn model_failure_is_opaque_500() {
    let app = server::router(Arc::new(FixedClassifier::new(|| {
        Err(PipelineError::Tokenization(
            "secret internal path /models/x".into(),
        ))
    })));

    let (status, body) = send(&app, post_predict(r#"{"text": "hi"}"#)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let text = String::from_utf8(body).unwrap();
    assert!(!text.contains("secret"), "{text}");
    assert_eq!(
        serde_json::from_str::<Value>(&text).unwrap(),
        json!({"detail": "Internal Server Error"})
    );
}

#[tokio::test]
async fn empty_result_list_is_500() {
    let app = server::router(Arc::new(FixedClassifier::new(|| Ok(vec![]))));

    let (status, _) = send(&app, post_predict(r#"{"text": "hi"}"#)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn off_set_label_is_500() {
    let app = server::router(Arc::new(FixedClassifier::new(|| {
        Ok(vec![Prediction {
            label: "MIXED".into(),
            score: 0.6,
        }])
    })));

    let (status, _) = send(&app, post_predict(r#"{"text": "hi"}"#)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn metrics_count_every_request() {
    let registry = Arc::new(HttpMetrics::new());
    let app = server::router_with_metrics(Arc::new(KeywordClassifier::new()), registry.clone());

    send(&app, get("/")).await;
    send(&app, post_predict(r#"{"text": "lovely"}"#)).await;
    send(&app, post_predict(r#"{"txt": "lovely"}"#)).await;
    send(&app, get("/does-not-exist")).await;

    assert_eq!(registry.requests_total("/", "GET", StatusCode::OK), 1);
    assert_eq!(registry.requests_total("/predict", "POST", StatusCode::OK), 1);
    assert_eq!(
        registry.requests_total("/predict", "POST", StatusCode::UNPROCESSABLE_ENTITY),
        1
    );
    assert_eq!(
        registry.requests_total("none", "GET", StatusCode::NOT_FOUND),
        1
    );
    assert_eq!(registry.predictions_total("POSITIVE"), 1);
    assert_eq!(registry.in_progress.get(), 0);
}

#[tokio::test]
async fn custom_methods_share_one_series() {
    let registry = Arc::new(HttpMetrics::new());
    let app = server::router_with_metrics(Arc::new(KeywordClassifier::new()), registry.clone());

    for i in 0..200 {
        let method = Method::from_bytes(format!("X{i}").as_bytes()).unwrap();
        let request = Request::builder()
            .method(method)
            .uri("/nope")
            .body(Body::empty())
            .unwrap();
        send(&app, request).await;
    }

    assert_eq!(
        registry.requests_total("none", OTHER_METHOD, StatusCode::NOT_FOUND),
        200
    );

    let text = registry.export_prometheus();
    assert!(!text.contains("method=\"X0\""));
    let buckets = text
        .lines()
        .filter(|l| l.starts_with("http_request_duration_seconds_count"))
        .count();
    assert_eq!(buckets, 1);
}

#[tokio::test]
async fn metrics_endpoint_exposes_prometheus_text() {
    let app = server::router(Arc::new(KeywordClassifier::new()));

    send(&app, post_predict(r#"{"text": "great"}"#)).await;

    let response = app.clone().oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/plain"));

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains(
        "http_requests_total{handler=\"/predict\",method=\"POST\",status=\"2xx\"} 1"
    ));
    assert!(text.contains("sentiment_predictions_total{label=\"POSITIVE\"} 1"));
}

#[tokio::test]
async fn instrumentation_does_not_alter_responses() {
    let bare = Router::new().route("/", axum::routing::get(server::handlers::health));
    let instrumented = server::router(Arc::new(KeywordClassifier::new()));

    let (bare_status, bare_body) = send(&bare, get("/")).await;
    let (status, body) = send(&instrumented, get("/")).await;

    assert_eq!(status, bare_status);
    assert_eq!(body, bare_body);
}

#[tokio::test]
async fn concurrent_predictions_share_one_model() {
    let classifier = Arc::new(KeywordClassifier::new());
    let app = server::router(classifier.clone());

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let app = app.clone();
            tokio::spawn(async move {
                let body = serde_json::to_vec(&json!({ "text": format!("great {i}") })).unwrap();
                send(&app, post_predict(body)).await
            })
        })
        .collect();

    for handle in handles {
        let (status, _) = handle.await.unwrap();
        assert_eq!(status, StatusCode::OK);
    }
    assert_eq!(classifier.seen().len(), 16);
}
