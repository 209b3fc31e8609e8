//! Error types for depot

use hyper::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Can not parse form: {0}")]
    Parse(String),

    #[error("Unsupported upload file type {0}")]
    UnsupportedType(String),

    #[error("Upload file too large, the max upload limit is {limit} bytes (got {size})")]
    TooLarge { size: u64, limit: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported thumbnail format {0}")]
    UnsupportedFormat(String),

    #[error("Decode failed: {0}")]
    Decode(String),

    #[error("Encode failed: {0}")]
    Encode(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl StoreError {
    /// HTTP status for this error.
    ///
    /// Codec variants map to 500: they are only ever surfaced when a caller
    /// explicitly chose not to recover them, which for thumbnailing never
    /// happens on the upload path.
    pub fn status(&self) -> StatusCode {
        match self {
            StoreError::Parse(_)
            | StoreError::UnsupportedType(_)
            | StoreError::TooLarge { .. } => StatusCode::BAD_REQUEST,
            StoreError::NotFound(_) => StatusCode::NOT_FOUND,
            StoreError::Io(_)
            | StoreError::UnsupportedFormat(_)
            | StoreError::Decode(_)
            | StoreError::Encode(_)
            | StoreError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to return to clients. 4xx errors carry their own text;
    /// 5xx errors never leak paths or internals.
    pub fn public_message(&self) -> String {
        match self.status() {
            StatusCode::INTERNAL_SERVER_ERROR => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_are_400() {
        assert_eq!(
            StoreError::UnsupportedType(".exe".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            StoreError::TooLarge { size: 11, limit: 10 }.status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            StoreError::Parse("no boundary".into()).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn io_errors_are_500_and_opaque() {
        let err = StoreError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "/secret/path denied",
        ));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.public_message().contains("/secret/path"));
    }

    #[test]
    fn not_found_is_404() {
        assert_eq!(
            StoreError::NotFound("abc.png".into()).status(),
            StatusCode::NOT_FOUND
        );
    }
}
