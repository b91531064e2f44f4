//! Error types for Ouroboros
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

/// All error types that can occur in Ouroboros
#[derive(Debug, Error)]
pub enum OuroborosError {
    /// LLM completion call failed
    #[error("LLM error: {0}")]
    Llm(String),

    /// Build toolchain could not be run (missing binary, spawn failure)
    #[error("Toolchain error: {0}")]
    Toolchain(String),

    /// Invalid or unreadable configuration
    #[error("Config error: {0}")]
    Config(String),

    /// Prompt template failed to render
    #[error("Template error: {0}")]
    Template(String),

    /// The caller cancelled the operation
    #[error("Operation cancelled")]
    Cancelled,

    /// Input rejected before any work was done
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl OuroborosError {
    /// Infrastructure errors are failures of the environment rather than of a candidate tool
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, OuroborosError::Toolchain(_) | OuroborosError::Io(_))
    }
}

/// Result type alias for Ouroboros operations
pub type Result<T> = std::result::Result<T, OuroborosError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_llm_error() {
        let err = OuroborosError::Llm("rate limited".to_string());
        assert_eq!(err.to_string(), "LLM error: rate limited");
    }

    #[test]
    fn test_toolchain_error() {
        let err = OuroborosError::Toolchain("rustc not found".to_string());
        assert_eq!(err.to_string(), "Toolchain error: rustc not found");
        assert!(err.is_infrastructure());
    }

    #[test]
    fn test_config_error() {
        let err = OuroborosError::Config("bad regex".to_string());
        assert_eq!(err.to_string(), "Config error: bad regex");
        assert!(!err.is_infrastructure());
    }

    #[test]
    fn test_cancelled_error() {
        assert_eq!(OuroborosError::Cancelled.to_string(), "Operation cancelled");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        let err: OuroborosError = io_err.into();
        assert!(matches!(err, OuroborosError::Io(_)));
        assert!(err.is_infrastructure());
        assert!(err.to_string().contains("read-only"));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid").unwrap_err();
        let err: OuroborosError = json_err.into();
        assert!(matches!(err, OuroborosError::Json(_)));
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_ok() -> Result<i32> {
            Ok(42)
        }

        fn returns_err() -> Result<i32> {
            Err(OuroborosError::InvalidInput("empty".to_string()))
        }

        assert!(returns_ok().is_ok());
        assert!(returns_err().is_err());
    }
}
