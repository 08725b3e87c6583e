//! Error types and the classified taxonomy for colloquy.

use serde::Serialize;
use thiserror::Error;

/// Result type alias using colloquy's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for colloquy operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Remote analysis call faulted (non-success response, provider-side failure)
    #[error("API error: {0}")]
    Api(String),

    /// Provider returned a success envelope that is empty or malformed
    #[error("Validation error: {0}")]
    Validation(String),

    /// Raw analysis payload could not be parsed into any insight block
    #[error("Parse error: {0}")]
    Parse(String),

    /// Transport-level failure reaching the provider
    #[error("Network error: {0}")]
    Network(String),

    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() || e.is_timeout() {
            Error::Network(e.to_string())
        } else {
            Error::Api(e.to_string())
        }
    }
}

/// The classified error kinds surfaced to observers.
///
/// Both the job path and the extraction path report failures through this
/// taxonomy. Enrichment-step failures (tag/provenance attachment) are logged
/// only and never classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ApiError,
    ValidationError,
    ParseError,
    NetworkError,
    DbError,
}

impl ErrorKind {
    /// Stable string form used in events and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ApiError => "api_error",
            ErrorKind::ValidationError => "validation_error",
            ErrorKind::ParseError => "parse_error",
            ErrorKind::NetworkError => "network_error",
            ErrorKind::DbError => "db_error",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    /// Classify this error into the surfaced taxonomy.
    ///
    /// Returns `None` for errors outside the taxonomy (`Internal`, `Config`,
    /// `NotFound`, `Io`); callers reporting to observers fall back to
    /// [`ErrorKind::ApiError`] so the observer contract stays closed.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Error::Api(_) => Some(ErrorKind::ApiError),
            Error::Validation(_) | Error::Serialization(_) => Some(ErrorKind::ValidationError),
            Error::Parse(_) => Some(ErrorKind::ParseError),
            Error::Network(_) => Some(ErrorKind::NetworkError),
            Error::Database(_) => Some(ErrorKind::DbError),
            _ => None,
        }
    }

    /// Classify with the observer-facing fallback applied.
    pub fn kind_or_default(&self) -> ErrorKind {
        self.kind().unwrap_or(ErrorKind::ApiError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_api() {
        let err = Error::Api("provider returned 500".to_string());
        assert_eq!(err.to_string(), "API error: provider returned 500");
    }

    #[test]
    fn test_error_display_validation() {
        let err = Error::Validation("empty response".to_string());
        assert_eq!(err.to_string(), "Validation error: empty response");
    }

    #[test]
    fn test_error_display_parse() {
        let err = Error::Parse("no blocks".to_string());
        assert_eq!(err.to_string(), "Parse error: no blocks");
    }

    #[test]
    fn test_error_display_network() {
        let err = Error::Network("connection refused".to_string());
        assert_eq!(err.to_string(), "Network error: connection refused");
    }

    #[test]
    fn test_error_kind_taxonomy() {
        assert_eq!(
            Error::Api("x".into()).kind(),
            Some(ErrorKind::ApiError)
        );
        assert_eq!(
            Error::Validation("x".into()).kind(),
            Some(ErrorKind::ValidationError)
        );
        assert_eq!(Error::Parse("x".into()).kind(), Some(ErrorKind::ParseError));
        assert_eq!(
            Error::Network("x".into()).kind(),
            Some(ErrorKind::NetworkError)
        );
    }

    #[test]
    fn test_error_kind_unclassified() {
        assert_eq!(Error::Internal("x".into()).kind(), None);
        assert_eq!(Error::Config("x".into()).kind(), None);
        assert_eq!(Error::NotFound("x".into()).kind(), None);
    }

    #[test]
    fn test_error_kind_fallback() {
        assert_eq!(
            Error::Internal("x".into()).kind_or_default(),
            ErrorKind::ApiError
        );
        assert_eq!(
            Error::Parse("x".into()).kind_or_default(),
            ErrorKind::ParseError
        );
    }

    #[test]
    fn test_error_kind_strings() {
        assert_eq!(ErrorKind::ApiError.as_str(), "api_error");
        assert_eq!(ErrorKind::ValidationError.as_str(), "validation_error");
        assert_eq!(ErrorKind::ParseError.as_str(), "parse_error");
        assert_eq!(ErrorKind::NetworkError.as_str(), "network_error");
        assert_eq!(ErrorKind::DbError.as_str(), "db_error");
    }

    #[test]
    fn test_error_kind_strings_are_unique() {
        let kinds = [
            ErrorKind::ApiError,
            ErrorKind::ValidationError,
            ErrorKind::ParseError,
            ErrorKind::NetworkError,
            ErrorKind::DbError,
        ];
        let mut strings: Vec<&str> = kinds.iter().map(|k| k.as_str()).collect();
        strings.sort();
        strings.dedup();
        assert_eq!(strings.len(), kinds.len());
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: Error = json_err.into();
        match err {
            Error::Serialization(msg) => assert!(!msg.is_empty()),
            _ => panic!("Expected Serialization error"),
        }
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }

    #[test]
    fn test_error_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::ParseError).unwrap();
        assert_eq!(json, "\"parse_error\"");
    }
}
