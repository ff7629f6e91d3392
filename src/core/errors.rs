//! Error types for the chat client.

use thiserror::Error;

use crate::core::ids::ConversationId;

/// Wording shown when a request got no response at all.
pub const CONNECTION_FAILURE_TEXT: &str =
    "No response received from the server. Please check your connection and try again.";

/// Failures of a single remote call.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The server rejected the credential (HTTP 401).
    #[error("authentication rejected")]
    AuthRejected {
        /// `message` field of the error body, when present.
        message: Option<String>,
    },
    /// The request was issued but no response arrived.
    #[error("no response received: {0}")]
    NetworkUnreachable(String),
    /// A response arrived with a failure status.
    #[error("server error {status}")]
    Server {
        /// HTTP status code.
        status: u16,
        /// Canonical reason phrase, when known.
        reason: Option<String>,
        /// `message` field of the error body, when present.
        message: Option<String>,
    },
    /// A success response whose body could not be used at all.
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    /// The request could not be built (bad URL, client setup).
    #[error("request error: {0}")]
    Request(String),
}

impl ApiError {
    /// Build a server error from a status and optional body message.
    #[must_use]
    pub fn server(status: reqwest::StatusCode, message: Option<String>) -> Self {
        Self::Server {
            status: status.as_u16(),
            reason: status.canonical_reason().map(str::to_string),
            message,
        }
    }

    /// Whether the failure was an authentication rejection.
    #[must_use]
    pub const fn is_auth_rejected(&self) -> bool {
        matches!(self, Self::AuthRejected { .. })
    }

    /// Human-readable text for inline display.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::AuthRejected { .. } => "Your session has expired. Please sign in again.".to_string(),
            Self::NetworkUnreachable(_) => CONNECTION_FAILURE_TEXT.to_string(),
            Self::Server { status, reason, .. } => match reason {
                Some(reason) => {
                    format!("The server returned an error ({status} {reason}). Please try again.")
                }
                None => format!("The server returned an error ({status}). Please try again."),
            },
            Self::MalformedResponse(_) => {
                "The server sent a response that could not be read.".to_string()
            }
            Self::Request(detail) => format!("The request could not be sent: {detail}"),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::MalformedResponse(err.to_string())
        } else if err.is_builder() {
            Self::Request(err.to_string())
        } else if let Some(status) = err.status() {
            Self::server(status, None)
        } else {
            Self::NetworkUnreachable(err.to_string())
        }
    }
}

/// Convenience result alias for remote calls.
pub type ApiResult<T> = Result<T, ApiError>;

/// Durable storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// `SQLite` storage error (sync).
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// `SQLite` storage error (async).
    #[error("tokio-rusqlite error: {0}")]
    TokioSqlite(#[from] tokio_rusqlite::Error),
    /// Stored value could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors surfaced by directory and exchange actions.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Empty or unchanged input; nothing was sent.
    #[error("nothing to send")]
    EmptyInput,
    /// The conversation is not in the directory.
    #[error("unknown conversation {0}")]
    UnknownConversation(ConversationId),
    /// A send is already awaiting a reply in this conversation.
    #[error("a message is already being sent in conversation {0}")]
    SendInFlight(ConversationId),
    /// Remote call failure.
    #[error(transparent)]
    Api(#[from] ApiError),
    /// The attachment upload failed; the chat call was not attempted.
    #[error("upload failed: {0}")]
    Upload(#[source] ApiError),
    /// The attachment was refused before upload.
    #[error("attachment rejected: {0}")]
    AttachmentRejected(String),
    /// Durable storage failure.
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ChatError {
    /// Whether the failure was an authentication rejection.
    #[must_use]
    pub const fn is_auth_rejected(&self) -> bool {
        matches!(
            self,
            Self::Api(ApiError::AuthRejected { .. }) | Self::Upload(ApiError::AuthRejected { .. })
        )
    }

    /// Whether the failure happened while uploading an attachment.
    #[must_use]
    pub const fn is_upload_failure(&self) -> bool {
        matches!(self, Self::Upload(_) | Self::AttachmentRejected(_))
    }
}

impl From<url::ParseError> for ChatError {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidConfig(err.to_string())
    }
}

/// Convenience result alias for client actions.
pub type ChatResult<T> = Result<T, ChatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_wording_differs_from_server_wording() {
        let network = ApiError::NetworkUnreachable("refused".to_string()).user_message();
        let server = ApiError::server(reqwest::StatusCode::INTERNAL_SERVER_ERROR, None)
            .user_message();

        assert!(network.contains("check your connection"));
        assert!(server.contains("500 Internal Server Error"));
        assert_ne!(network, server);
    }

    #[test]
    fn test_auth_rejected_flag() {
        assert!(ChatError::from(ApiError::AuthRejected { message: None }).is_auth_rejected());
        assert!(!ChatError::EmptyInput.is_auth_rejected());
        assert!(ChatError::Upload(ApiError::AuthRejected { message: None }).is_upload_failure());
    }

    #[test]
    fn test_server_display() {
        let err = ApiError::server(reqwest::StatusCode::BAD_GATEWAY, None);
        assert_eq!(err.to_string(), "server error 502");
    }
}
