use thiserror::Error;

/// Top-level error type for the Cadence system.
///
/// Subsystem crates define their own error types and implement
/// `From<CadenceError>` so that the `?` operator works across crate
/// boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CadenceError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for CadenceError {
    fn from(err: toml::de::Error) -> Self {
        CadenceError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for CadenceError {
    fn from(err: toml::ser::Error) -> Self {
        CadenceError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for CadenceError {
    fn from(err: serde_json::Error) -> Self {
        CadenceError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Cadence operations.
pub type Result<T> = std::result::Result<T, CadenceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CadenceError::Config("hashtags must not be empty".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration error: hashtags must not be empty"
        );

        let err = CadenceError::Storage("disk full".to_string());
        assert_eq!(err.to_string(), "Storage error: disk full");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: CadenceError = io_err.into();
        assert!(matches!(err, CadenceError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_toml_error_conversion() {
        let parse_err = toml::from_str::<toml::Value>("[[[not toml").unwrap_err();
        let err: CadenceError = parse_err.into();
        assert!(matches!(err, CadenceError::Config(_)));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{oops").unwrap_err();
        let err: CadenceError = json_err.into();
        assert!(matches!(err, CadenceError::Serialization(_)));
        assert!(err.to_string().starts_with("Serialization error: "));
    }
}
