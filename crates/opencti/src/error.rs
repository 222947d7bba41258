//! Error types for OpenCTI API calls.
//!
//! Errors are categorized so callers can give appropriate feedback. Nothing in
//! this crate retries; the category only says whether a retry could help.

use declarative::Interrupted;
use std::fmt;

/// Result type alias for API calls.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of API errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Connection, DNS or timeout problems (transient).
    Network,
    /// The token was rejected or lacks a capability.
    Auth,
    /// The entity does not exist.
    NotFound,
    /// The platform rejected the request.
    Validation,
    /// The caller cancelled or ran out of time.
    Interrupted,
    /// The response could not be decoded.
    Format,
    /// Other/unknown errors.
    Other,
}

impl ErrorCategory {
    /// Whether this error category is typically transient and worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network)
    }

    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Network => "Network connectivity issue",
            Self::Auth => "Authentication failed",
            Self::NotFound => "Entity not found",
            Self::Validation => "Request rejected by the platform",
            Self::Interrupted => "Operation interrupted",
            Self::Format => "Invalid API response",
            Self::Other => "Unexpected error",
        }
    }

    /// Get actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Network => "Check that the OpenCTI URL is reachable and try again",
            Self::Auth => "Check that the token is valid and belongs to an administrator",
            Self::NotFound => "The entity may have been deleted outside of this provider",
            Self::Validation => "Check the attribute values against the platform's constraints",
            Self::Interrupted => "Re-run the operation; changes made so far were kept",
            Self::Format => "Check that the URL points to an OpenCTI platform",
            Self::Other => "Check the error details for more information",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur during API calls.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// HTTP request failed.
    #[error("HTTP request failed: {message}")]
    HttpError {
        /// Error message.
        message: String,
        /// HTTP status code if available.
        status: Option<u16>,
    },

    /// The GraphQL layer answered with errors.
    #[error("{operation} failed: {}", messages.join("; "))]
    GraphQl {
        /// Top-level query or mutation field.
        operation: String,
        /// Messages from the `errors` array.
        messages: Vec<String>,
    },

    /// The entity does not exist.
    #[error("{kind} {id} not found")]
    NotFound {
        /// Entity kind, e.g. "role".
        kind: String,
        /// Identifier that was looked up.
        id: String,
    },

    /// Invalid response from the API.
    #[error("invalid API response: {0}")]
    InvalidResponse(String),

    /// Cancelled or past its deadline before the call was issued.
    #[error(transparent)]
    Interrupted(#[from] Interrupted),

    /// Generic error.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an HTTP error.
    pub fn http(message: impl Into<String>, status: Option<u16>) -> Self {
        Self::HttpError {
            message: message.into(),
            status,
        }
    }

    /// Create a not-found error.
    pub fn not_found(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            id: id.into(),
        }
    }

    /// Get the error category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::HttpError {
                status: Some(401 | 403),
                ..
            } => ErrorCategory::Auth,
            Error::HttpError {
                status: Some(404), ..
            } => ErrorCategory::NotFound,
            Error::HttpError { .. } => ErrorCategory::Network,
            Error::GraphQl { messages, .. } => {
                if messages.iter().any(|m| {
                    let m = m.to_lowercase();
                    m.contains("auth") || m.contains("forbidden")
                }) {
                    ErrorCategory::Auth
                } else if messages.iter().any(|m| m.to_lowercase().contains("not found")) {
                    ErrorCategory::NotFound
                } else {
                    ErrorCategory::Validation
                }
            }
            Error::NotFound { .. } => ErrorCategory::NotFound,
            Error::InvalidResponse(_) => ErrorCategory::Format,
            Error::Interrupted(_) => ErrorCategory::Interrupted,
            Error::Other(_) => ErrorCategory::Other,
        }
    }

    /// Whether this error is typically transient and worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }
}

impl From<ureq::Error> for Error {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(code) => Self::HttpError {
                message: format!("HTTP {}", code),
                status: Some(code),
            },
            ureq::Error::Timeout(_) => Self::HttpError {
                message: "request timed out".to_string(),
                status: None,
            },
            other => Self::HttpError {
                message: other.to_string(),
                status: None,
            },
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse(err.to_string())
    }
}
