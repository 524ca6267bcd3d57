//! Error types and failure categorization.
//!
//! Run-level errors (`ConfigError`, `LoadTestError`) stop the tool before or
//! instead of a run. Per-request failures never do: they are folded into the
//! statistics as a detail string and tagged with an [`ErrorCategory`] so the
//! Prometheus counters can break them down.

use std::path::PathBuf;

use thiserror::Error;

/// Categories of per-request failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// The request body could not be serialized to JSON
    SerializationError,

    /// HTTP 4xx responses
    ClientError,

    /// HTTP 5xx responses
    ServerError,

    /// Any other non-200 status (1xx, 2xx other than 200, 3xx)
    UnexpectedStatus,

    /// HTTP 200 whose body is not a valid prediction
    InvalidResponse,

    /// Network connectivity errors (DNS, connection refused, reset)
    NetworkError,

    /// Request timeout errors
    TimeoutError,

    /// TLS/SSL certificate errors
    TlsError,

    /// Other/unknown errors
    OtherError,
}

impl ErrorCategory {
    /// Categorize a non-200 HTTP status code.
    ///
    /// Returns None for 200, the only status that can carry a valid prediction.
    pub fn from_status_code(status_code: u16) -> Option<Self> {
        match status_code {
            200 => None,
            400..=499 => Some(ErrorCategory::ClientError),
            500..=599 => Some(ErrorCategory::ServerError),
            _ => Some(ErrorCategory::UnexpectedStatus),
        }
    }

    /// Categorize a reqwest error.
    pub fn from_reqwest_error(error: &reqwest::Error) -> Self {
        if error.is_timeout() {
            ErrorCategory::TimeoutError
        } else if error.is_connect() || error.is_request() || error.is_body() {
            ErrorCategory::NetworkError
        } else if error.is_decode() {
            ErrorCategory::InvalidResponse
        } else {
            let error_msg = error.to_string().to_lowercase();

            if error_msg.contains("certificate")
                || error_msg.contains("tls")
                || error_msg.contains("ssl")
            {
                ErrorCategory::TlsError
            } else if error_msg.contains("timeout") || error_msg.contains("timed out") {
                ErrorCategory::TimeoutError
            } else if error_msg.contains("dns")
                || error_msg.contains("resolve")
                || error_msg.contains("connect")
            {
                ErrorCategory::NetworkError
            } else {
                ErrorCategory::OtherError
            }
        }
    }

    /// Get the Prometheus label for this error category.
    pub fn label(&self) -> &'static str {
        match self {
            ErrorCategory::SerializationError => "serialization_error",
            ErrorCategory::ClientError => "client_error",
            ErrorCategory::ServerError => "server_error",
            ErrorCategory::UnexpectedStatus => "unexpected_status",
            ErrorCategory::InvalidResponse => "invalid_response",
            ErrorCategory::NetworkError => "network_error",
            ErrorCategory::TimeoutError => "timeout_error",
            ErrorCategory::TlsError => "tls_error",
            ErrorCategory::OtherError => "other_error",
        }
    }
}

/// Invalid command-line or environment configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid target URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    #[error("Field '{field}': value {value} is out of range (must be at least {min})")]
    OutOfRange {
        field: &'static str,
        value: String,
        min: String,
    },

    #[error("Field '{field}': value {value} is out of range (must be at most {max})")]
    TooLarge {
        field: &'static str,
        value: String,
        max: String,
    },

    #[error("Failed to read payload file '{}': {source}", .path.display())]
    PayloadFileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Payload file '{}' is not a JSON array of objects: {message}", .path.display())]
    PayloadFileFormat { path: PathBuf, message: String },

    #[error("Payload file '{}' contains no payloads", .path.display())]
    EmptyPayloads { path: PathBuf },
}

/// Errors that prevent a run from starting or completing.
#[derive(Error, Debug)]
pub enum LoadTestError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Health check against {url} failed")]
    HealthCheckFailed { url: String },

    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(#[from] reqwest::Error),

    #[error("Failed to register metrics: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("Load test run has already been started")]
    AlreadyStarted,

    #[error("{holders} reference(s) to the run statistics outlived the worker drain")]
    WorkersStillRunning { holders: usize },
}

impl LoadTestError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            LoadTestError::Config(_) => 2,
            _ => 1,
        }
    }
}
