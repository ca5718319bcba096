use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Polling gave up: {0}")]
    PollTimeout(String),

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Aggregation error: {0}")]
    Aggregation(String),
}

impl ClientError {
    /// Whether the request client should retry this failure.
    /// 429 and 5xx are transient; other HTTP statuses are not.
    pub fn is_transient(&self) -> bool {
        match self {
            ClientError::Api { status, .. } => *status == 429 || *status >= 500,
            ClientError::Network(_) | ClientError::Timeout => true,
            _ => false,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// User-facing notification emitted by the request client on failure.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UserNotice {
    pub title: String,
    pub message: String,
}

impl UserNotice {
    /// Static HTTP status → human message mapping.
    pub fn for_status(status: u16) -> Self {
        let (title, message) = match status {
            400 => ("Bad request", "The server rejected the request."),
            401 => ("Signed out", "You must sign in to continue."),
            403 => ("Forbidden", "You do not have access to this resource."),
            404 => ("Not found", "The requested resource does not exist."),
            429 => ("Slow down", "Too many requests. Please wait a moment."),
            500 => ("Server error", "The server encountered an error."),
            503 => ("Maintenance", "The service is temporarily unavailable."),
            _ => ("Request failed", "Something went wrong. Please try again."),
        };
        UserNotice {
            title: title.to_string(),
            message: message.to_string(),
        }
    }

    pub fn network() -> Self {
        UserNotice {
            title: "Connection problem".to_string(),
            message: "Could not reach the grading service.".to_string(),
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
