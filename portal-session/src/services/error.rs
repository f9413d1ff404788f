use reqwest::StatusCode;
use serde_json::Value;

/// Coarse classification of a failed portal API call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    /// The request budget elapsed.
    Timeout,
    /// Connect or transport failure, no HTTP response.
    Network,
    /// HTTP 401.
    Unauthorized,
    /// HTTP 403.
    Forbidden,
    /// Any other 4xx.
    Rejected,
    /// 5xx.
    Server,
    /// The body could not be decoded into the expected shape.
    Malformed,
    /// The access token expired and could not be refreshed.
    SessionExpired,
}

/// The one error shape every portal API call fails with.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct ApiError {
    pub kind: ApiErrorKind,
    pub message: String,
    pub status: Option<u16>,
    /// Human-readable reason reported by the backend, if any.
    pub detail: Option<String>,
}

impl ApiError {
    pub fn new(kind: ApiErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            detail: None,
        }
    }

    /// Normalize a non-success HTTP response.
    pub fn from_status(status: StatusCode, body: &[u8]) -> Self {
        let kind = match status {
            StatusCode::UNAUTHORIZED => ApiErrorKind::Unauthorized,
            StatusCode::FORBIDDEN => ApiErrorKind::Forbidden,
            s if s.is_server_error() => ApiErrorKind::Server,
            _ => ApiErrorKind::Rejected,
        };
        let detail = extract_detail(body);
        let message = match &detail {
            Some(detail) => detail.clone(),
            None => format!("Request failed with status {}", status.as_u16()),
        };

        Self {
            kind,
            message,
            status: Some(status.as_u16()),
            detail,
        }
    }

    /// Normalize a transport-level failure from reqwest.
    pub fn from_transport(error: reqwest::Error) -> Self {
        let kind = if error.is_timeout() {
            ApiErrorKind::Timeout
        } else if error.is_decode() {
            ApiErrorKind::Malformed
        } else {
            ApiErrorKind::Network
        };
        let message = match kind {
            ApiErrorKind::Timeout => "Request timed out".to_string(),
            _ => format!("Request failed: {error}"),
        };

        Self {
            kind,
            message,
            status: error.status().map(|s| s.as_u16()),
            detail: None,
        }
    }

    pub fn malformed(error: impl std::fmt::Display) -> Self {
        Self::new(
            ApiErrorKind::Malformed,
            format!("Unexpected response body: {error}"),
        )
    }

    pub fn session_expired(reason: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::SessionExpired, reason)
    }

    pub fn is_unauthorized(&self) -> bool {
        self.kind == ApiErrorKind::Unauthorized
    }

    /// Backend detail when present, otherwise `fallback`.
    pub fn user_message(&self, fallback: &str) -> String {
        self.detail
            .clone()
            .unwrap_or_else(|| fallback.to_string())
    }
}

/// Pull the `detail` field out of an error body.
///
/// A string is used verbatim; a validation list is flattened by joining each
/// entry's `msg`.
fn extract_detail(body: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(body).ok()?;
    match value.get("detail")? {
        Value::String(detail) if !detail.is_empty() => Some(detail.clone()),
        Value::Array(items) => {
            let messages: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(Value::as_str))
                .collect();
            (!messages.is_empty()).then(|| messages.join("; "))
        }
        _ => None,
    }
}
