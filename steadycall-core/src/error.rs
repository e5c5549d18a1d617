//! Error taxonomy for remote calls.
//!
//! This module provides the closed set of failure kinds a call can end with:
//! - [`ErrorKind`]: The failure kinds
//! - [`TransportOutcome`]: What the transport observed for one attempt
//! - [`classify`]: The fixed mapping from outcome to kind

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Failure kinds surfaced by the client.
///
/// The set is closed: conditions that fit no other kind map to
/// [`ErrorKind::Unknown`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    BadRequest,
    AuthenticationError,
    PermissionDenied,
    NotFound,
    UnprocessableEntity,
    RateLimited,
    ServerError,
    ConnectionError,
    TimeoutError,
    Canceled,
    Unknown,
}

impl ErrorKind {
    /// All kinds, in declaration order.
    pub const ALL: [ErrorKind; 11] = [
        ErrorKind::BadRequest,
        ErrorKind::AuthenticationError,
        ErrorKind::PermissionDenied,
        ErrorKind::NotFound,
        ErrorKind::UnprocessableEntity,
        ErrorKind::RateLimited,
        ErrorKind::ServerError,
        ErrorKind::ConnectionError,
        ErrorKind::TimeoutError,
        ErrorKind::Canceled,
        ErrorKind::Unknown,
    ];

    /// Get the string representation of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "bad_request",
            ErrorKind::AuthenticationError => "authentication_error",
            ErrorKind::PermissionDenied => "permission_denied",
            ErrorKind::NotFound => "not_found",
            ErrorKind::UnprocessableEntity => "unprocessable_entity",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::ServerError => "server_error",
            ErrorKind::ConnectionError => "connection_error",
            ErrorKind::TimeoutError => "timeout_error",
            ErrorKind::Canceled => "canceled",
            ErrorKind::Unknown => "unknown",
        }
    }

    /// Returns whether a failure of this kind may be resolved by retrying.
    ///
    /// The following kinds are retryable:
    /// - [`RateLimited`](ErrorKind::RateLimited)
    /// - [`ServerError`](ErrorKind::ServerError) (including 409 conflicts)
    /// - [`ConnectionError`](ErrorKind::ConnectionError)
    /// - [`TimeoutError`](ErrorKind::TimeoutError)
    ///
    /// # Example
    ///
    /// ```
    /// use steadycall_core::ErrorKind;
    ///
    /// assert!(ErrorKind::RateLimited.is_retryable());
    /// assert!(!ErrorKind::NotFound.is_retryable());
    /// assert!(!ErrorKind::Canceled.is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::RateLimited
                | ErrorKind::ServerError
                | ErrorKind::ConnectionError
                | ErrorKind::TimeoutError
        )
    }

    /// Map an HTTP status code to a kind.
    ///
    /// Total over `u16`; success codes are not failures and map to `Unknown`
    /// if they are ever passed here.
    pub fn from_status(status: u16) -> Self {
        classify(TransportOutcome::Status(status)).kind
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an [`ErrorKind`] from a string fails.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseErrorKindError(());

impl std::fmt::Display for ParseErrorKindError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown error kind")
    }
}

impl std::error::Error for ParseErrorKindError {}

impl FromStr for ErrorKind {
    type Err = ParseErrorKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bad_request" => Ok(ErrorKind::BadRequest),
            "authentication_error" => Ok(ErrorKind::AuthenticationError),
            "permission_denied" => Ok(ErrorKind::PermissionDenied),
            "not_found" => Ok(ErrorKind::NotFound),
            "unprocessable_entity" => Ok(ErrorKind::UnprocessableEntity),
            "rate_limited" => Ok(ErrorKind::RateLimited),
            "server_error" => Ok(ErrorKind::ServerError),
            "connection_error" => Ok(ErrorKind::ConnectionError),
            "timeout_error" => Ok(ErrorKind::TimeoutError),
            "canceled" | "cancelled" => Ok(ErrorKind::Canceled),
            "unknown" => Ok(ErrorKind::Unknown),
            _ => Err(ParseErrorKindError(())),
        }
    }
}

/// What the transport observed for a single attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportOutcome {
    /// The remote side answered with this status code.
    Status(u16),
    /// No response: the connection could not be established or was lost.
    ConnectionFailed,
    /// The local per-attempt timeout elapsed first.
    TimedOut,
    /// The caller canceled the call.
    Canceled,
}

/// Result of [`classify`]: one kind plus its retry eligibility.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Classification {
    pub kind: ErrorKind,
    pub retryable: bool,
}

impl Classification {
    fn of(kind: ErrorKind) -> Self {
        Self {
            kind,
            retryable: kind.is_retryable(),
        }
    }
}

/// Classify a failed attempt.
///
/// The mapping is fixed and total:
///
/// | Outcome | Kind | Retryable |
/// |---------|------|-----------|
/// | 400 | `BadRequest` | no |
/// | 401 | `AuthenticationError` | no |
/// | 403 | `PermissionDenied` | no |
/// | 404 | `NotFound` | no |
/// | 408 | `TimeoutError` | yes |
/// | 409 | `ServerError` | yes |
/// | 422 | `UnprocessableEntity` | no |
/// | 429 | `RateLimited` | yes |
/// | >= 500 | `ServerError` | yes |
/// | connection failure | `ConnectionError` | yes |
/// | local timeout | `TimeoutError` | yes |
/// | cancellation | `Canceled` | no |
/// | anything else | `Unknown` | no |
pub fn classify(outcome: TransportOutcome) -> Classification {
    let kind = match outcome {
        TransportOutcome::Status(status) => match status {
            400 => ErrorKind::BadRequest,
            401 => ErrorKind::AuthenticationError,
            403 => ErrorKind::PermissionDenied,
            404 => ErrorKind::NotFound,
            408 => ErrorKind::TimeoutError,
            // Conflicts are usually lock contention on the remote side.
            409 => ErrorKind::ServerError,
            422 => ErrorKind::UnprocessableEntity,
            429 => ErrorKind::RateLimited,
            500.. => ErrorKind::ServerError,
            _ => ErrorKind::Unknown,
        },
        TransportOutcome::ConnectionFailed => ErrorKind::ConnectionError,
        TransportOutcome::TimedOut => ErrorKind::TimeoutError,
        TransportOutcome::Canceled => ErrorKind::Canceled,
    };
    Classification::of(kind)
}
