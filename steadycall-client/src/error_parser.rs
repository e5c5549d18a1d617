//! Error response parsing.
//!
//! Turns a non-success response into a [`ClientError`]. The kind always
//! comes from the status code; the body only supplies the message.

use std::time::Duration;

use http::{HeaderMap, StatusCode};
use serde::Deserialize;

use crate::ClientError;

/// Build the error for a non-success response.
///
/// The message is taken from the first of:
/// - a JSON body `{"message": "..."}`
/// - a JSON body `{"error": {"message": "..."}}` or `{"error": "..."}`
/// - the body itself, if it is non-empty UTF-8
/// - the canonical reason phrase of the status
pub(crate) fn parse_error_response(
    status: StatusCode,
    headers: &HeaderMap,
    body: &[u8],
) -> ClientError {
    let message = json_message(body)
        .or_else(|| {
            std::str::from_utf8(body)
                .ok()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        })
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("unknown error")
                .to_string()
        });

    ClientError::from_status(status.as_u16(), message).with_retry_after(retry_after(headers))
}

/// JSON shapes commonly used for error bodies.
#[derive(Deserialize)]
#[serde(untagged)]
enum ErrorBodyJson {
    Flat { message: String },
    Nested { error: NestedError },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NestedError {
    Object { message: String },
    Text(String),
}

fn json_message(body: &[u8]) -> Option<String> {
    let message = match serde_json::from_slice::<ErrorBodyJson>(body).ok()? {
        ErrorBodyJson::Flat { message } => message,
        ErrorBodyJson::Nested {
            error: NestedError::Object { message } | NestedError::Text(message),
        } => message,
    };
    (!message.is_empty()).then_some(message)
}

/// Parse a `Retry-After` header given in whole seconds.
///
/// HTTP-date values are ignored.
pub(crate) fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(http::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}
