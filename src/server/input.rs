//! Request body extraction for `POST /predict`.

use axum::body::Bytes;
use axum::extract::{FromRequest, Request};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::{ApiError, FieldError};

/// Body of `POST /predict`.
///
/// Extraction validates by hand instead of going through `Json<T>` so that a bad body yields
/// field-level detail (`loc`, `type`) rather than a plain-text rejection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextInput {
    /// Text to classify, forwarded to the model verbatim.
    pub text: String,
}

impl TextInput {
    /// Validate a raw request body. Unknown fields are ignored.
    pub fn from_json_bytes(body: &[u8]) -> Result<Self, Vec<FieldError>> {
        if body.is_empty() {
            return Err(vec![FieldError::missing(&["body"])]);
        }

        let value: Value =
            serde_json::from_slice(body).map_err(|e| vec![FieldError::invalid_json(&e)])?;

        let Value::Object(mut fields) = value else {
            return Err(vec![FieldError::not_an_object()]);
        };

        match fields.remove("text") {
            Some(Value::String(text)) => Ok(Self { text }),
            Some(_) => Err(vec![FieldError::not_a_string(&["body", "text"])]),
            None => Err(vec![FieldError::missing(&["body", "text"])]),
        }
    }
}

impl<S> FromRequest<S> for TextInput
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let body = Bytes::from_request(req, state)
            .await
            .map_err(ApiError::Body)?;
        Self::from_json_bytes(&body).map_err(ApiError::Validation)
    }
}
