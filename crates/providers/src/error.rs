use thiserror::Error;

/// Failure of a language-model backend call (network, quota, model).
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("backend returned HTTP {status}: {body}")]
    Api { status: u16, body: String },

    #[error("backend response is unusable: {message}")]
    InvalidResponse { message: String },
}

impl BackendError {
    #[must_use]
    pub fn invalid(message: impl std::fmt::Display) -> Self {
        Self::InvalidResponse {
            message: message.to_string(),
        }
    }

    /// True for rate limiting and server-side failures that may succeed later.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            Self::InvalidResponse { .. } => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, BackendError>;
