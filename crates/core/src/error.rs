//! Unified error types for reducer.

use tokio_rusqlite::rusqlite;

/// Unified error types for the reducer pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Aggregated content was empty after trimming.
    #[error("No data to parse!")]
    NoData,

    /// Invalid input (e.g., a malformed multipart body).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// Invalid remote reference.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// Remote host resolves to a private or reserved address.
    #[error("PRIVATE_ADDRESS: {0}")]
    PrivateAddress(String),

    /// Fetch timeout.
    #[error("FETCH_TIMEOUT: {0}")]
    FetchTimeout(String),

    /// Fetch response too large.
    #[error("FETCH_TOO_LARGE: {0}")]
    FetchTooLarge(String),

    /// HTTP error response or transport failure.
    #[error("HTTP_ERROR: {0}")]
    HttpError(String),

    /// A processor task panicked or was cancelled.
    #[error("PROCESSOR_FAILED: {0}")]
    ProcessorFailed(String),
}

impl Error {
    /// Whether the error was caused by the client's request rather than by processing it.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::NoData | Error::InvalidInput(_))
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_data_display() {
        assert_eq!(Error::NoData.to_string(), "No data to parse!");
    }

    #[test]
    fn test_error_display() {
        let err = Error::InvalidUrl("htp:/nope".to_string());
        assert!(err.to_string().contains("INVALID_URL"));
        assert!(err.to_string().contains("htp:/nope"));
    }

    #[test]
    fn test_client_errors() {
        assert!(Error::NoData.is_client_error());
        assert!(Error::InvalidInput("bad multipart".into()).is_client_error());
        assert!(!Error::HttpError("status 500".into()).is_client_error());
        assert!(!Error::MigrationFailed("boom".into()).is_client_error());
        assert!(!Error::ProcessorFailed("panicked".into()).is_client_error());
    }
}
