//! Error handling for the gateway core
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for the gateway
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Main error type for the gateway
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP client errors
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Quota store errors (remote or local backend)
    #[error("Quota store error: {0}")]
    Store(String),

    /// Analysis submission failures, already classified for display
    #[error(transparent)]
    Submission(#[from] SubmissionError),
}

impl GatewayError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        GatewayError::Config(msg.into())
    }

    /// Create a quota store error
    pub fn store(msg: impl Into<String>) -> Self {
        GatewayError::Store(msg.into())
    }
}

/// Classified failure of an analysis submission.
///
/// Every variant maps to one user-facing message; raw error detail is kept
/// for logs only. Quota is never consumed on any of these.
#[derive(Error, Debug)]
pub enum SubmissionError {
    /// The webhook did not answer within the cancellation timeout
    #[error("analysis request timed out after {0}s")]
    Timeout(u64),

    /// Connection-level failure reaching the webhook
    #[error("network error: {0}")]
    Network(String),

    /// The webhook answered with a 5xx status
    #[error("server error: status {0}")]
    ServerStatus(u16),

    /// 2xx response with an empty body
    #[error("empty response body")]
    EmptyResponse,

    /// Response body was not the expected JSON shape
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Anything that does not fit the categories above
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl SubmissionError {
    /// Classify a reqwest transport error.
    ///
    /// Status-based classification happens at the call site, where the
    /// response object is still available.
    pub fn from_transport(err: reqwest::Error, timeout_secs: u64) -> Self {
        if err.is_timeout() {
            SubmissionError::Timeout(timeout_secs)
        } else if err.is_connect() || err.is_request() {
            SubmissionError::Network(err.to_string())
        } else {
            SubmissionError::Unexpected(err.to_string())
        }
    }

    /// The message shown to the visitor, in the product's voice.
    pub fn user_message(&self) -> &'static str {
        match self {
            SubmissionError::Timeout(_) => {
                "El análisis está tardando más de lo habitual.\n\nPor favor, vuelve a intentarlo en unos minutos."
            }
            SubmissionError::Network(_) => {
                "No hemos podido conectar con el servidor.\n\nPor favor, verifica tu conexión a internet e inténtalo de nuevo."
            }
            SubmissionError::ServerStatus(_) => {
                "El servidor está experimentando problemas temporales.\n\nPor favor, inténtalo de nuevo en unos minutos."
            }
            SubmissionError::EmptyResponse
            | SubmissionError::MalformedResponse(_)
            | SubmissionError::Unexpected(_) => {
                "Ha ocurrido un error inesperado.\n\nPor favor, inténtalo de nuevo."
            }
        }
    }

    /// Whether retrying without changing anything is reasonable
    pub fn is_retryable(&self) -> bool {
        !matches!(self, SubmissionError::MalformedResponse(_))
    }
}
