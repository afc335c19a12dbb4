use thiserror::Error;

/// Core error types for lbsweep operations
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid self link '{link}': {reason}")]
    InvalidSelfLink { link: String, reason: String },

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Missing field {field} on {resource}")]
    MissingField { resource: String, field: String },

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl CoreError {
    /// Create a new InvalidSelfLink error
    pub fn invalid_self_link(link: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSelfLink {
            link: link.into(),
            reason: reason.into(),
        }
    }

    /// Create a new InvalidTimestamp error
    pub fn invalid_timestamp(message: impl Into<String>) -> Self {
        Self::InvalidTimestamp(message.into())
    }

    /// Create a new MissingField error
    pub fn missing_field(resource: impl Into<String>, field: impl Into<String>) -> Self {
        Self::MissingField {
            resource: resource.into(),
            field: field.into(),
        }
    }
}

/// Convenience result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_self_link_message() {
        let err = CoreError::invalid_self_link("global/foo", "keyword urlMaps not found");
        assert_eq!(
            err.to_string(),
            "Invalid self link 'global/foo': keyword urlMaps not found"
        );
    }

    #[test]
    fn test_missing_field_message() {
        let err = CoreError::missing_field("targetHttpProxies/k8s-tp-a", "urlMap");
        assert_eq!(
            err.to_string(),
            "Missing field urlMap on targetHttpProxies/k8s-tp-a"
        );
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{ nope").unwrap_err();
        let core_err: CoreError = json_err.into();
        assert!(matches!(core_err, CoreError::JsonError(_)));
    }
}
