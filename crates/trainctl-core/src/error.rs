//! Error taxonomy for the training session.
//!
//! Every error here is recovered locally: it either becomes a state value
//! (`UploadState::Failed`, `StreamConnection::Errored`) or is surfaced once to
//! the user. None of them tears the session down.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for session operations.
pub type SessionResult<T> = std::result::Result<T, SessionError>;

/// Rejections raised while staging a dataset archive.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StagingError {
    /// The declared container type is not an accepted archive type.
    #[error("Invalid file type '{declared}': please select a zip archive")]
    InvalidFormat {
        /// The content type the selection declared.
        declared: String,
    },
}

/// Synchronous precondition failures of an upload submission.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadError {
    /// One or both dataset slots are empty.
    #[error("Please select both training and validation datasets")]
    MissingDataset,

    /// A previous upload has not resolved yet.
    #[error("An upload is already in progress")]
    AlreadyInFlight,
}

/// Asynchronous failure of an upload exchange, kept in `UploadState::Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum UploadFailure {
    /// The request never produced a response.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// The backend answered with a non-success status code.
    #[error("Server rejected the upload (status {0})")]
    ServerRejected(u16),

    /// The backend answered 2xx but the body could not be decoded.
    #[error("Malformed upload response: {0}")]
    MalformedResponse(String),
}

/// Streaming channel errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    /// A command was issued while the channel was not open. The command is lost.
    #[error("The training channel is not open")]
    ChannelNotReady,

    /// An inbound message could not be decoded and was dropped.
    #[error("Dropped undecodable message: {0}")]
    DecodeError(String),
}

/// Validation failures of a start-training command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// The epoch count is zero or negative.
    #[error("Please enter a valid number of epochs (got {0})")]
    InvalidEpochCount(i64),

    /// The dataset or validation directory is empty.
    #[error("Please enter both dataset and validation directory paths")]
    MissingPath,
}

/// Any error surfaced by the session orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error(transparent)]
    Staging(#[from] StagingError),

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error(transparent)]
    Stream(#[from] StreamError),

    #[error(transparent)]
    Command(#[from] CommandError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_error_wraps_without_changing_message() {
        let err: SessionError = StreamError::ChannelNotReady.into();
        assert_eq!(err.to_string(), "The training channel is not open");
        assert!(matches!(err, SessionError::Stream(StreamError::ChannelNotReady)));
    }

    #[test]
    fn test_upload_failure_serializes_tagged() {
        let json = serde_json::to_value(UploadFailure::ServerRejected(413)).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "server_rejected", "detail": 413}));
    }
}
