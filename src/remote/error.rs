use thiserror::Error;

#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Unauthorized - token may be expired")]
    Unauthorized,

    #[error("Remote object not found: {0}")]
    NotFound(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Body reasons Drive attaches to a 403 that is quota pressure rather
/// than a permissions problem.
const DRIVE_RATE_LIMIT_REASONS: [&str; 2] = ["userRateLimitExceeded", "rateLimitExceeded"];

impl RemoteError {
    /// Truncate a response body so error messages stay loggable.
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            return body.to_string();
        }
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        match status.as_u16() {
            401 => RemoteError::Unauthorized,
            // Drive reports quota exhaustion as 403 with a rate-limit
            // reason in the body; only a plain 403 is a permissions issue.
            403 if DRIVE_RATE_LIMIT_REASONS.iter().any(|r| body.contains(r)) => {
                RemoteError::RateLimited
            }
            403 => RemoteError::AccessDenied(Self::truncate_body(body)),
            404 => RemoteError::NotFound(Self::truncate_body(body)),
            429 => RemoteError::RateLimited,
            500..=599 => RemoteError::ServerError(Self::truncate_body(body)),
            _ => RemoteError::InvalidResponse(format!(
                "Status {}: {}",
                status,
                Self::truncate_body(body)
            )),
        }
    }
}
