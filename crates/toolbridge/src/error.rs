//! Error types for the tool invocation bridge.

use std::time::Duration;

use thiserror::Error;

/// Result type used throughout the bridge.
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Every way a bridge operation can fail.
///
/// Components return these as values; `Bridge` is the only place that
/// turns them into the caller-facing `{"error": ...}` shape.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The backend answered with an HTML page (login redirect, gateway error).
    #[error("backend returned HTML content, re-authentication may be required")]
    AuthenticationOrRouting,

    /// An event-stream response carried no `data:` lines.
    #[error("no data frames found in event-stream response")]
    EmptyStream,

    /// The payload could not be parsed as JSON.
    #[error("backend returned a non-JSON response: {0}")]
    NonJson(String),

    /// Non-2xx HTTP status.
    #[error("HTTP request error: {code} - {body}")]
    HttpStatus { code: u16, body: String },

    /// The backend call did not finish within the configured timeout.
    #[error("backend request timed out after {:.1}s", .0.as_secs_f64())]
    Timeout(Duration),

    /// Connection-level failure (DNS, TLS, refused, reset).
    #[error("request sending failed: {0}")]
    Transport(String),

    #[error("TOOL_ID must not be empty")]
    MissingIdentifier,

    #[error("no parameter schema cached for tool '{0}'; call get_tool_details before use_tool")]
    SchemaNotFound(String),

    /// The schema store backing failed.
    #[error("schema store error: {0}")]
    Store(String),
}

impl From<rusqlite::Error> for BridgeError {
    fn from(err: rusqlite::Error) -> Self {
        BridgeError::Store(err.to_string())
    }
}

impl BridgeError {
    /// Short machine-friendly name of the failure class, used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            BridgeError::AuthenticationOrRouting => "authentication_or_routing",
            BridgeError::EmptyStream => "empty_stream",
            BridgeError::NonJson(_) => "non_json",
            BridgeError::HttpStatus { .. } => "http_status",
            BridgeError::Timeout(_) => "timeout",
            BridgeError::Transport(_) => "transport",
            BridgeError::MissingIdentifier => "missing_identifier",
            BridgeError::SchemaNotFound(_) => "schema_not_found",
            BridgeError::Store(_) => "store",
        }
    }
}
