//! Client-level error types.

use std::fmt;

use thiserror::Error;

/// Errors that can occur anywhere in the feed client and its collaborators.
#[derive(Debug, Error)]
pub enum FeedError {
    /// The transport could not be established (refused, DNS, TLS, timeout).
    #[error("failed to open transport to {endpoint}: {reason}")]
    TransportOpen { endpoint: String, reason: String },

    /// An established transport reported a send/receive failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// An inbound frame was not a valid envelope, or a payload did not
    /// match the requested shape.
    #[error("decode error: {0}")]
    Decode(String),

    /// `send()` was called while the client was not connected.
    #[error("not connected (state: {state})")]
    NotConnected { state: String },

    /// Configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// HTTP request failed before a response was received.
    #[error("HTTP error: {0}")]
    Http(String),

    /// HTTP response carried a non-success status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// An operation that spawns work was called outside a Tokio runtime.
    #[error("no async runtime: {0}")]
    Runtime(String),

    /// Key-value store I/O failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// Value could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl FeedError {
    /// Map this error into the client's error taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::TransportOpen { .. } => ErrorKind::TransportOpenFailure,
            Self::Transport(_) | Self::Http(_) | Self::Status { .. } => ErrorKind::Transport,
            Self::Decode(_) | Self::Serialization(_) => ErrorKind::DecodeError,
            Self::NotConnected { .. } => ErrorKind::SendWhileDisconnected,
            Self::InvalidConfig(_) | Self::Runtime(_) | Self::Storage(_) => ErrorKind::Other,
        }
    }

    /// Returns `true` if the failure is recovered by the reconnection policy.
    pub fn is_connection_failure(&self) -> bool {
        matches!(self, Self::TransportOpen { .. } | Self::Transport(_))
    }
}

/// Error taxonomy surfaced on `error` events and in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The underlying connection could not be established.
    TransportOpenFailure,
    /// An open transport failed while sending or receiving.
    Transport,
    /// An inbound frame was not valid envelope data.
    DecodeError,
    /// An inbound `type` outside the known vocabulary.
    UnrecognizedType,
    /// A subscriber failed during dispatch.
    SubscriberFailure,
    /// `send()` outside `Connected`.
    SendWhileDisconnected,
    /// Reconnection attempts exhausted.
    RetryExhausted,
    Other,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::TransportOpenFailure => "transport-open-failure",
            Self::Transport => "transport",
            Self::DecodeError => "decode-error",
            Self::UnrecognizedType => "unrecognized-type",
            Self::SubscriberFailure => "subscriber-failure",
            Self::SendWhileDisconnected => "send-while-disconnected",
            Self::RetryExhausted => "retry-exhausted",
            Self::Other => "other",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_mapping() {
        let open = FeedError::TransportOpen {
            endpoint: "ws://localhost:8080".into(),
            reason: "refused".into(),
        };
        assert_eq!(open.kind(), ErrorKind::TransportOpenFailure);
        assert!(open.is_connection_failure());

        let decode = FeedError::Decode("expected value".into());
        assert_eq!(decode.kind(), ErrorKind::DecodeError);
        assert!(!decode.is_connection_failure());

        let send = FeedError::NotConnected { state: "disconnected".into() };
        assert_eq!(send.kind(), ErrorKind::SendWhileDisconnected);

        let runtime = FeedError::Runtime("no reactor running".into());
        assert_eq!(runtime.kind(), ErrorKind::Other);
        assert!(!runtime.is_connection_failure());
    }

    #[test]
    fn display_includes_endpoint() {
        let err = FeedError::TransportOpen {
            endpoint: "ws://node:9000".into(),
            reason: "connection refused".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("ws://node:9000"));
        assert!(msg.contains("connection refused"));
    }
}
