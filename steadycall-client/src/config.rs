//! Client configuration.
//!
//! - [`ClientConfig`]: Immutable client-wide settings, fixed at build time
//! - [`CallOptions`]: Per-call overrides
//! - [`RetryPolicy`]: Retry limit and backoff schedule
//! - [`Credential`]: Pre-acquired credential material

mod options;
mod retry;

use std::time::Duration;

use http::{HeaderMap, HeaderName, HeaderValue};
use steadycall_core::frame::StreamFormat;

pub use options::CallOptions;
pub use retry::{FixedJitter, Jitter, NoJitter, RandomJitter, RetryPolicy, defaults};

/// Credential material attached to every request.
///
/// Acquiring or refreshing credentials is the application's job; the client
/// only sends what it is given. `Debug` output never includes the secret.
#[derive(Clone)]
pub enum Credential {
    /// Sent as `authorization: Bearer <token>`.
    Bearer(String),
    /// Sent verbatim under a custom header, e.g. `x-api-key`.
    Header { name: String, value: String },
}

impl Credential {
    pub fn bearer<S: Into<String>>(token: S) -> Self {
        Credential::Bearer(token.into())
    }

    pub fn header<N: Into<String>, V: Into<String>>(name: N, value: V) -> Self {
        Credential::Header {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Convert into a header, marked sensitive.
    pub(crate) fn to_header(&self) -> Result<(HeaderName, HeaderValue), String> {
        let (name, value) = match self {
            Credential::Bearer(token) => (
                http::header::AUTHORIZATION,
                HeaderValue::try_from(format!("Bearer {}", token)),
            ),
            Credential::Header { name, value } => (
                HeaderName::try_from(name.as_str())
                    .map_err(|_| format!("invalid credential header name {:?}", name))?,
                HeaderValue::try_from(value.as_str()),
            ),
        };
        let mut value = value.map_err(|_| "credential is not a valid header value".to_string())?;
        value.set_sensitive(true);
        Ok((name, value))
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credential::Bearer(_) => f.write_str("Credential::Bearer(<redacted>)"),
            Credential::Header { name, .. } => f
                .debug_struct("Credential::Header")
                .field("name", name)
                .field("value", &"<redacted>")
                .finish(),
        }
    }
}

/// Client-wide settings.
///
/// Built once by [`ClientBuilder`](crate::ClientBuilder) and shared
/// read-only by every call.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub(crate) base_address: String,
    pub(crate) credential: Option<(HeaderName, HeaderValue)>,
    pub(crate) timeout: Duration,
    pub(crate) retry: RetryPolicy,
    pub(crate) request_id_header: HeaderName,
    pub(crate) page_token_param: String,
    pub(crate) max_pages: usize,
    pub(crate) stream_format: StreamFormat,
    pub(crate) default_headers: HeaderMap,
}

impl ClientConfig {
    /// Base address, without a trailing slash.
    pub fn base_address(&self) -> &str {
        &self.base_address
    }

    /// Default per-attempt timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Default retry policy.
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Header the correlation id is read from.
    pub fn request_id_header(&self) -> &HeaderName {
        &self.request_id_header
    }

    /// Query parameter continuation tokens are sent in.
    pub fn page_token_param(&self) -> &str {
        &self.page_token_param
    }

    /// Page limit of one traversal.
    pub fn max_pages(&self) -> usize {
        self.max_pages
    }

    /// Wire format of event streams.
    pub fn stream_format(&self) -> &StreamFormat {
        &self.stream_format
    }

    /// Headers sent with every request.
    pub fn default_headers(&self) -> &HeaderMap {
        &self.default_headers
    }

    /// Returns whether a credential is configured.
    pub fn has_credential(&self) -> bool {
        self.credential.is_some()
    }
}
