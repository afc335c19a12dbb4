//! Error types for Compute Engine calls.

/// Errors returned by a [`ComputeApi`](crate::ComputeApi) backend.
#[derive(Debug, thiserror::Error)]
pub enum ComputeError {
    /// The addressed resource does not exist.
    #[error("Resource not found: {resource}")]
    NotFound {
        /// API path of the missing resource.
        resource: String,
    },

    /// The API answered with a non-success status.
    #[error("Compute API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Message extracted from the error body.
        message: String,
    },

    /// The request never produced a response.
    #[error("Transport error: {message}")]
    Transport { message: String },

    /// A response body could not be decoded.
    #[error("Decode error: {message}")]
    Decode { message: String },

    /// No access token could be obtained.
    #[error("Authentication error: {message}")]
    Auth { message: String },
}

impl ComputeError {
    /// Creates a new `NotFound` error.
    #[must_use]
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Creates a new `Api` error.
    #[must_use]
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    /// Returns `true` if the resource did not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Short label attached to failure logs as `error.category`.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Api { .. } => "api",
            Self::Transport { .. } => "transport",
            Self::Decode { .. } => "decode",
            Self::Auth { .. } => "auth",
        }
    }
}
