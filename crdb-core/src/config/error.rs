//! Error types for configuration loading

use thiserror::Error;

/// Errors that can occur while loading or validating configuration
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// An environment variable held an unparseable value
    #[error("Invalid value for {variable}: {reason}")]
    InvalidValue { variable: String, reason: String },

    /// Configuration failed a cross-field validation check
    #[error("Configuration validation failed: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::InvalidValue {
            variable: "CRDB_BIND_ADDRESS".to_string(),
            reason: "not a socket address: nope".to_string(),
        };
        assert!(err.to_string().contains("CRDB_BIND_ADDRESS"));
    }
}
