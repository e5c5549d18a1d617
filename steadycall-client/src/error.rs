//! Client-side error type.
//!
//! This module provides [`ClientError`], the failure half of every call's
//! [`Outcome`](crate::Outcome).

use std::time::Duration;

use steadycall_core::{Classification, ErrorKind, FrameError, TransportOutcome, classify};

use crate::response::local_request_id;

/// A terminal failure of a logical call.
///
/// Every error carries:
/// - [`kind`](Self::kind): exactly one [`ErrorKind`]
/// - [`message`](Self::message): human-readable detail
/// - [`request_id`](Self::request_id): correlation id of the final attempt,
///   or a locally generated `local-…` placeholder when the remote side never
///   answered
/// - [`is_retryable`](Self::is_retryable): whether the kind permits retrying
#[derive(Clone, Debug, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ClientError {
    kind: ErrorKind,
    message: String,
    request_id: String,
    retryable: bool,
    attempts: u32,
    retry_after: Option<Duration>,
}

impl ClientError {
    /// Create a new error with a kind and message.
    ///
    /// The request id starts as a local placeholder.
    pub fn new<S: Into<String>>(kind: ErrorKind, message: S) -> Self {
        Self::classified(
            Classification {
                kind,
                retryable: kind.is_retryable(),
            },
            message,
        )
    }

    fn classified<S: Into<String>>(classification: Classification, message: S) -> Self {
        ClientError {
            kind: classification.kind,
            message: message.into(),
            request_id: local_request_id(),
            retryable: classification.retryable,
            attempts: 1,
            retry_after: None,
        }
    }

    /// Create an error for a non-success HTTP status.
    pub fn from_status<S: Into<String>>(status: u16, message: S) -> Self {
        Self::classified(classify(TransportOutcome::Status(status)), message)
    }

    /// Create a connection error (no response received).
    pub fn connection<S: Into<String>>(message: S) -> Self {
        Self::classified(classify(TransportOutcome::ConnectionFailed), message)
    }

    /// Create a local timeout error.
    pub fn timed_out(after: Duration) -> Self {
        Self::classified(
            classify(TransportOutcome::TimedOut),
            format!("attempt timed out after {}ms", after.as_millis()),
        )
    }

    /// Create a cancellation error.
    pub fn canceled() -> Self {
        Self::classified(classify(TransportOutcome::Canceled), "call canceled")
    }

    /// Create a decode error. These are never retried.
    pub fn decode<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::Unknown, format!("decode error: {}", message.into()))
    }

    /// Get the error kind.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Get the error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the correlation id of the attempt that produced this error.
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Returns whether the error kind permits retrying.
    ///
    /// The client has already retried retryable failures up to its limit by
    /// the time an error reaches the caller.
    pub fn is_retryable(&self) -> bool {
        self.retryable
    }

    /// Number of physical attempts made by the logical call.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Delay the server asked for via `Retry-After`, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        self.retry_after
    }

    pub(crate) fn with_request_id<S: Into<String>>(mut self, request_id: S) -> Self {
        self.request_id = request_id.into();
        self
    }

    pub(crate) fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    pub(crate) fn with_retry_after(mut self, retry_after: Option<Duration>) -> Self {
        self.retry_after = retry_after;
        self
    }
}

impl From<FrameError> for ClientError {
    fn from(err: FrameError) -> Self {
        ClientError::decode(err.to_string())
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::decode(format!("JSON decoding failed: {}", err))
    }
}
