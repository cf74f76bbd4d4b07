//! Error types for bgtimer documents and identifiers.

use thiserror::Error;

/// Errors that can occur when parsing identifiers or converting documents.
#[derive(Debug, Error)]
pub enum TypesError {
    /// Session code was empty after trimming
    #[error("session code is empty")]
    EmptySessionCode,

    /// Session code contained characters outside A-Z and 0-9
    #[error("invalid session code: {0}")]
    InvalidSessionCode(String),

    /// Unknown timer mode name
    #[error("invalid timer mode: {0} (expected countup or countdown)")]
    InvalidMode(String),

    /// Document could not be converted to or from JSON
    #[error("document conversion failed: {0}")]
    Document(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = TypesError::InvalidMode("sideways".into());
        assert_eq!(
            err.to_string(),
            "invalid timer mode: sideways (expected countup or countdown)"
        );
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<TypesError>();
    }
}
