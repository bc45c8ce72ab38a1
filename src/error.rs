/// Message used when the service returned an error without a body
pub const FALLBACK_MESSAGE: &str = "Internal Error";

/// The one error every client operation returns.
///
/// Authentication failures, missing items, validation errors and server faults
/// all collapse into this type. The human readable `message` is derived from
/// the response body, and `status` carries the HTTP status code when a
/// response was received at all (transport failures have none).
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteError {
    pub message: String,
    pub status: Option<u16>,
}

impl RemoteError {
    /// An error for a response that came back with a non-success status
    pub fn from_response(status: u16, body: &str) -> Self {
        Self {
            message: message_from_body(body),
            status: Some(status),
        }
    }

    /// An error that happened before (or instead of) getting a response
    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self {
            message: err.to_string(),
            status: None,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }
}

impl std::fmt::Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} (status: {})", self.message, status),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for RemoteError {}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        Self {
            message: err.to_string(),
            status: err.status().map(|s| s.as_u16()),
        }
    }
}

impl From<std::io::Error> for RemoteError {
    fn from(err: std::io::Error) -> Self {
        Self::transport(err)
    }
}

/// Picks the error message out of a response body.
///
/// `detail` from a JSON object wins, then the raw body, then [`FALLBACK_MESSAGE`].
pub fn message_from_body(body: &str) -> String {
    if body.is_empty() {
        return FALLBACK_MESSAGE.to_string();
    }

    let detail = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| match value.get("detail")? {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) if s.is_empty() => None,
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        });

    detail.unwrap_or_else(|| body.to_string())
}
