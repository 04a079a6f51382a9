//! Error types for the GenAI client
//!
//! Conversion-layer failures (unsupported fields, schema problems, function
//! resolution) are always surfaced immediately and never retried. Backend
//! failures arrive as two different JSON error envelopes and are normalized
//! into one [`ApiError`] shape here.

use serde_json::Value;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for all client operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required argument was missing or malformed.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A field was set that has no equivalent on the active backend.
    #[error("{field} parameter is not supported in {backend}.")]
    UnsupportedField {
        field: &'static str,
        backend: &'static str,
    },

    /// A type cannot be expressed as a response/function schema.
    #[error("Schema error: {0}")]
    Schema(String),

    /// The model called a function that was never registered.
    #[error("No registered function named {0}")]
    UnknownFunction(String),

    /// A function cannot be invoked from the current calling context.
    #[error("Unsupported function: {0}")]
    UnsupportedFunction(String),

    /// Response body could not be parsed.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Transport-level failure (connect, TLS, timeout).
    #[error("HTTP error: {0}")]
    Http(String),

    /// Non-2xx response from the backend.
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl Error {
    pub(crate) fn unsupported_field(field: &'static str, backend: crate::converters::Backend) -> Self {
        Error::UnsupportedField {
            field,
            backend: backend.api_name(),
        }
    }

    /// Whether a retry could plausibly succeed. Only transient backend
    /// statuses qualify; conversion errors never do.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Api(api) => matches!(api.code, 408 | 429 | 500 | 502 | 503 | 504),
            Error::Http(_) => true,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Http(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Parse(e.to_string())
    }
}

/// Structured error returned by either backend.
///
/// Both backends wrap errors in JSON, but the envelope shape varies: `code`,
/// `message` and `status` may appear at the top level or nested under an
/// `error` key. The normalization rules here are a contract, not a cleanup:
/// nested wins for `message`/`status`, an outer `code` wins when present.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{code} {status}. {message}", status = self.status.as_deref().unwrap_or("UNKNOWN"))]
pub struct ApiError {
    /// HTTP-style status code.
    pub code: u16,
    /// Human-readable message, empty when the body was not decodable.
    pub message: String,
    /// Canonical status string, e.g. `INVALID_ARGUMENT`.
    pub status: Option<String>,
    /// Backend-specific detail payload.
    pub details: Option<Value>,
}

impl ApiError {
    /// Build an error from an HTTP status and the raw response body,
    /// tolerating both envelope shapes and non-JSON bodies.
    pub fn from_response(http_status: u16, body: &str) -> Self {
        let parsed: Option<Value> = serde_json::from_str(body).ok();
        let Some(parsed) = parsed else {
            return ApiError {
                code: http_status,
                message: String::new(),
                status: None,
                details: None,
            };
        };
        let nested = parsed.get("error");

        let outer_code = parsed.get("code").and_then(Value::as_u64);
        let nested_code = nested.and_then(|e| e.get("code")).and_then(Value::as_u64);
        let code = outer_code.or(nested_code).unwrap_or(http_status as u64) as u16;

        let nested_message = nested
            .and_then(|e| e.get("message"))
            .and_then(Value::as_str);
        let outer_message = parsed.get("message").and_then(Value::as_str);
        let message = nested_message.or(outer_message).unwrap_or_default().to_string();

        let nested_status = nested.and_then(|e| e.get("status")).and_then(Value::as_str);
        let outer_status = parsed.get("status").and_then(Value::as_str);
        let status = nested_status.or(outer_status).map(str::to_string);

        let details = nested.and_then(|e| e.get("details")).cloned();

        ApiError {
            code,
            message,
            status,
            details,
        }
    }

    /// 4xx responses are caller mistakes; never retried.
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.code)
    }

    /// 5xx responses are backend failures.
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.code)
    }
}
