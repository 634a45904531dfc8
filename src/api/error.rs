use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("not signed in")]
    NotSignedIn,
    /// 401 from the backend: bad credentials, or an expired or revoked token.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("advisory API returned {status}: {detail}")]
    Status { status: StatusCode, detail: String },
    #[error("advisory API request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ApiError {
    /// Errors after which the stored token must be discarded.
    pub fn is_auth(&self) -> bool {
        matches!(self, ApiError::NotSignedIn | ApiError::Unauthorized(_))
    }

    /// Builds the error for a non-success response. Prefers the `detail`
    /// field of a JSON error body and falls back to the raw body text.
    pub fn from_response(status: StatusCode, body: &str) -> Self {
        let detail = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(str::to_string))
            .unwrap_or_else(|| body.trim().to_string());

        if status == StatusCode::UNAUTHORIZED {
            ApiError::Unauthorized(detail)
        } else {
            ApiError::Status { status, detail }
        }
    }
}
