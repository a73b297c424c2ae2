//! Error responses of the HTTP layer.

use axum::extract::rejection::BytesRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

/// Message sent with every `500`; the real cause only goes to the log.
pub const INTERNAL_ERROR_DETAIL: &str = "Internal Server Error";

/// One violated constraint in a request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Path to the offending value, starting at `"body"`.
    pub loc: Vec<String>,
    /// Human readable description.
    pub msg: String,
    /// Machine readable tag (`missing`, `string_type`, ...).
    #[serde(rename = "type")]
    pub kind: String,
}

impl FieldError {
    fn new(loc: &[&str], msg: impl Into<String>, kind: &str) -> Self {
        Self {
            loc: loc.iter().map(|s| (*s).to_owned()).collect(),
            msg: msg.into(),
            kind: kind.to_owned(),
        }
    }

    /// A required field (or the whole body) is absent.
    pub fn missing(loc: &[&str]) -> Self {
        Self::new(loc, "Field required", "missing")
    }

    /// A field is present but is not a string.
    pub fn not_a_string(loc: &[&str]) -> Self {
        Self::new(loc, "Input should be a valid string", "string_type")
    }

    /// The body is JSON, but not an object.
    pub fn not_an_object() -> Self {
        Self::new(
            &["body"],
            "Input should be a valid dictionary or object to extract fields from",
            "model_attributes_type",
        )
    }

    /// The body is not JSON at all.
    pub fn invalid_json(err: &serde_json::Error) -> Self {
        Self::new(&["body"], format!("JSON decode error: {err}"), "json_invalid")
    }
}

/// Body of every non-2xx JSON response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody<T> {
    /// Field errors for `422`, an opaque message for `500`.
    pub detail: T,
}

/// Failures a request handler can end with.
#[derive(Debug)]
pub enum ApiError {
    /// The request body did not match the expected shape. Maps to `422`.
    Validation(Vec<FieldError>),
    /// The body could not be read at all (too large, aborted, ...). Keeps axum's status.
    Body(BytesRejection),
    /// Classification failed or produced an unusable result. Maps to `500`.
    Inference(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(errors) => {
                tracing::debug!(?errors, "rejected request body");
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    Json(ErrorBody { detail: errors }),
                )
                    .into_response()
            }
            ApiError::Body(rejection) => rejection.into_response(),
            ApiError::Inference(cause) => {
                tracing::error!(%cause, "inference failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorBody {
                        detail: INTERNAL_ERROR_DETAIL,
                    }),
                )
                    .into_response()
            }
        }
    }
}

impl From<crate::error::PipelineError> for ApiError {
    fn from(value: crate::error::PipelineError) -> Self {
        ApiError::Inference(value.to_string())
    }
}
