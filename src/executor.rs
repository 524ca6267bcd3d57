//! Single-request execution against the prediction endpoint.
//!
//! [`execute`] sends one POST, times it, and classifies the response. It holds
//! no state of its own, so any number of workers can call it concurrently with
//! clones of one pooled `reqwest::Client`.

use std::error::Error as StdError;
use std::time::{Duration, Instant};

use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::errors::ErrorCategory;
use crate::utils::lossy_prefix;

/// Response field that must hold the model's 0/1 decision.
pub const PREDICTION_FIELD: &str = "prediction";

/// How much of a non-200 body is kept in the failure detail.
pub const ERROR_BODY_PREVIEW_BYTES: usize = 100;

/// Result of one request attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestOutcome {
    pub success: bool,

    /// Send-to-last-body-byte wall time. Zero when nothing was sent.
    pub latency: Duration,

    /// Why the request failed. None on success.
    pub error_detail: Option<String>,

    /// Failure category for metrics. None on success.
    pub category: Option<ErrorCategory>,
}

impl RequestOutcome {
    pub fn success(latency: Duration) -> Self {
        Self {
            success: true,
            latency,
            error_detail: None,
            category: None,
        }
    }

    pub fn failure(latency: Duration, category: ErrorCategory, detail: impl Into<String>) -> Self {
        Self {
            success: false,
            latency,
            error_detail: Some(detail.into()),
            category: Some(category),
        }
    }
}

/// Ways a 200 response can fail the prediction contract.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PredictionError {
    #[error("invalid JSON response: {0}")]
    InvalidJson(String),

    #[error("invalid JSON response: expected an object, got {0}")]
    NotAnObject(&'static str),

    #[error("response missing 'prediction' field")]
    MissingField,

    #[error("invalid prediction type: {0}")]
    InvalidType(&'static str),

    #[error("prediction value is {0}, expected 0 or 1")]
    UnexpectedValue(String),
}

/// Sends `payload` as a JSON POST to `url` and classifies the response.
///
/// Exactly one outcome is produced per call; nothing is retried.
pub async fn execute<P>(client: &reqwest::Client, url: &str, payload: &P) -> RequestOutcome
where
    P: Serialize + ?Sized,
{
    let body = match serde_json::to_vec(payload) {
        Ok(body) => body,
        Err(e) => {
            return RequestOutcome::failure(
                Duration::ZERO,
                ErrorCategory::SerializationError,
                format!("serialization error: {}", e),
            )
        }
    };

    let start = Instant::now();

    let response = match client
        .post(url)
        .header(CONTENT_TYPE, "application/json")
        .body(body)
        .send()
        .await
    {
        Ok(response) => response,
        Err(e) => return request_error(start.elapsed(), &e),
    };

    let status = response.status().as_u16();

    let bytes = match response.bytes().await {
        Ok(bytes) => bytes,
        Err(e) => return request_error(start.elapsed(), &e),
    };
    let latency = start.elapsed();

    if let Some(category) = ErrorCategory::from_status_code(status) {
        return RequestOutcome::failure(
            latency,
            category,
            format!(
                "HTTP {}: {}",
                status,
                lossy_prefix(&bytes, ERROR_BODY_PREVIEW_BYTES)
            ),
        );
    }

    match validate_prediction(&bytes) {
        Ok(()) => RequestOutcome::success(latency),
        Err(e) => RequestOutcome::failure(latency, ErrorCategory::InvalidResponse, e.to_string()),
    }
}

/// Checks that `body` is a JSON object whose `prediction` is numerically 0 or 1.
///
/// Integer and floating-point encodings are both accepted; other fields are
/// ignored.
pub fn validate_prediction(body: &[u8]) -> Result<(), PredictionError> {
    let value: Value =
        serde_json::from_slice(body).map_err(|e| PredictionError::InvalidJson(e.to_string()))?;

    let fields = match value {
        Value::Object(fields) => fields,
        other => return Err(PredictionError::NotAnObject(json_type_name(&other))),
    };

    match fields.get(PREDICTION_FIELD) {
        None => Err(PredictionError::MissingField),
        Some(Value::Number(n)) => match n.as_f64() {
            Some(v) if v == 0.0 || v == 1.0 => Ok(()),
            _ => Err(PredictionError::UnexpectedValue(n.to_string())),
        },
        Some(other) => Err(PredictionError::InvalidType(json_type_name(other))),
    }
}

fn request_error(latency: Duration, error: &reqwest::Error) -> RequestOutcome {
    RequestOutcome::failure(
        latency,
        ErrorCategory::from_reqwest_error(error),
        format!("request error: {}", error_chain(error)),
    )
}

/// Joins an error and its sources, e.g. "error sending request: connection refused".
fn error_chain(error: &dyn StdError) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let cause_text = cause.to_string();
        if !message.contains(&cause_text) {
            message.push_str(": ");
            message.push_str(&cause_text);
        }
        source = cause.source();
    }
    message
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
