//! Client builder.
//!
//! Provides a fluent API for configuring and building a [`Client`].

use std::sync::Arc;
use std::time::Duration;

use http::{HeaderMap, HeaderName, HeaderValue, Uri};
use steadycall_core::frame::StreamFormat;

use crate::client::Client;
use crate::config::{ClientConfig, Credential, Jitter, RetryPolicy, defaults};
use crate::transport::{HyperTransport, Transport};

/// Builder for creating a [`Client`].
///
/// Every option has a documented default (see [`defaults`]); only the base
/// address is required.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use steadycall_client::{ClientBuilder, Credential};
///
/// let client = ClientBuilder::new("http://localhost:3000/api")
///     .credential(Credential::bearer("token"))
///     .timeout(Duration::from_secs(30))
///     .max_retries(4)
///     .build()
///     .unwrap();
///
/// assert_eq!(client.config().base_address(), "http://localhost:3000/api");
/// ```
pub struct ClientBuilder<T = HyperTransport> {
    base_address: String,
    credential: Option<Credential>,
    timeout: Duration,
    max_retries: u32,
    retry_base_delay: Duration,
    retry_ceiling: Duration,
    jitter: Option<Arc<dyn Jitter>>,
    request_id_header: String,
    page_token_param: String,
    max_pages: usize,
    stream_format: StreamFormat,
    default_headers: Vec<(String, String)>,
    transport: T,
}

impl<T> std::fmt::Debug for ClientBuilder<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("base_address", &self.base_address)
            .field("credential", &self.credential)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .field("retry_base_delay", &self.retry_base_delay)
            .field("retry_ceiling", &self.retry_ceiling)
            .field("jitter", &self.jitter)
            .field("request_id_header", &self.request_id_header)
            .field("page_token_param", &self.page_token_param)
            .field("max_pages", &self.max_pages)
            .field("stream_format", &self.stream_format)
            .field("default_headers", &self.default_headers.len())
            .finish_non_exhaustive()
    }
}

impl ClientBuilder<HyperTransport> {
    /// Create a new ClientBuilder with the given base address.
    ///
    /// The base address includes scheme and host and may include a path
    /// prefix, e.g. `"https://api.example.com/v2"`.
    pub fn new<S: Into<String>>(base_address: S) -> Self {
        Self {
            base_address: base_address.into(),
            credential: None,
            timeout: defaults::TIMEOUT,
            max_retries: defaults::MAX_RETRIES,
            retry_base_delay: defaults::RETRY_BASE_DELAY,
            retry_ceiling: defaults::RETRY_CEILING,
            jitter: None,
            request_id_header: defaults::REQUEST_ID_HEADER.to_string(),
            page_token_param: defaults::PAGE_TOKEN_PARAM.to_string(),
            max_pages: defaults::MAX_PAGES,
            stream_format: StreamFormat::default(),
            default_headers: Vec::new(),
            transport: HyperTransport::default(),
        }
    }
}

impl<T> ClientBuilder<T> {
    /// Use a different transport.
    pub fn transport<U: Transport>(self, transport: U) -> ClientBuilder<U> {
        ClientBuilder {
            base_address: self.base_address,
            credential: self.credential,
            timeout: self.timeout,
            max_retries: self.max_retries,
            retry_base_delay: self.retry_base_delay,
            retry_ceiling: self.retry_ceiling,
            jitter: self.jitter,
            request_id_header: self.request_id_header,
            page_token_param: self.page_token_param,
            max_pages: self.max_pages,
            stream_format: self.stream_format,
            default_headers: self.default_headers,
            transport,
        }
    }

    /// Attach a credential to every request.
    pub fn credential(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        self
    }

    /// Set the default per-attempt timeout.
    ///
    /// Default: 10 minutes. Individual calls can override it with
    /// [`CallOptions::timeout`](crate::CallOptions::timeout).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the default maximum number of retries.
    ///
    /// Default: 2.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the default base delay of the backoff schedule.
    ///
    /// Default: 500ms.
    pub fn retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    /// Set the default upper bound of a single backoff delay.
    ///
    /// Default: 8 seconds.
    pub fn retry_ceiling(mut self, ceiling: Duration) -> Self {
        self.retry_ceiling = ceiling;
        self
    }

    /// Replace the jitter source.
    pub fn jitter<J: Jitter + 'static>(mut self, jitter: J) -> Self {
        self.jitter = Some(Arc::new(jitter));
        self
    }

    /// Set the response header the correlation id is read from.
    ///
    /// Default: `x-request-id`.
    pub fn request_id_header<S: Into<String>>(mut self, header: S) -> Self {
        self.request_id_header = header.into();
        self
    }

    /// Set the query parameter continuation tokens are sent in.
    ///
    /// Default: `page_token`.
    pub fn page_token_param<S: Into<String>>(mut self, param: S) -> Self {
        self.page_token_param = param.into();
        self
    }

    /// Set the page limit of one list traversal.
    ///
    /// Must be at least 1. Default: 10 000.
    pub fn max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Set the event stream wire format.
    pub fn stream_format(mut self, format: StreamFormat) -> Self {
        self.stream_format = format;
        self
    }

    /// Add a header sent with every request.
    pub fn default_header<K: Into<String>, V: Into<String>>(mut self, name: K, value: V) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    /// Build the Client.
    ///
    /// # Errors
    ///
    /// Returns an error if the base address is not an absolute `http`/`https`
    /// address, a header or credential is invalid, or the retry settings are
    /// inconsistent.
    pub fn build(self) -> Result<Client<T>, ClientBuildError>
    where
        T: Transport,
    {
        let base_address = validate_base_address(&self.base_address)?;

        let mut retry = RetryPolicy::new()
            .max_retries(self.max_retries)
            .base_delay(self.retry_base_delay)
            .max_delay(self.retry_ceiling);
        if let Some(jitter) = self.jitter {
            retry = retry.shared_jitter(jitter);
        }
        retry.validate().map_err(ClientBuildError::InvalidRetryPolicy)?;

        let credential = self
            .credential
            .as_ref()
            .map(Credential::to_header)
            .transpose()
            .map_err(ClientBuildError::InvalidCredential)?;

        let request_id_header = HeaderName::try_from(self.request_id_header.as_str())
            .map_err(|_| ClientBuildError::InvalidHeader(self.request_id_header.clone()))?;

        let mut default_headers = HeaderMap::new();
        for (name, value) in &self.default_headers {
            let name = HeaderName::try_from(name.as_str())
                .map_err(|_| ClientBuildError::InvalidHeader(name.clone()))?;
            let value = HeaderValue::try_from(value.as_str())
                .map_err(|_| ClientBuildError::InvalidHeader(name.to_string()))?;
            default_headers.insert(name, value);
        }

        if self.page_token_param.is_empty() {
            return Err(ClientBuildError::InvalidPageTokenParam);
        }
        if self.max_pages == 0 {
            return Err(ClientBuildError::InvalidMaxPages);
        }

        let config = ClientConfig {
            base_address,
            credential,
            timeout: self.timeout,
            retry,
            request_id_header,
            page_token_param: self.page_token_param,
            max_pages: self.max_pages,
            stream_format: self.stream_format,
            default_headers,
        };

        Ok(Client::new(self.transport, config))
    }
}

fn validate_base_address(raw: &str) -> Result<String, ClientBuildError> {
    let trimmed = raw.trim().trim_end_matches('/');
    let invalid = || ClientBuildError::InvalidBaseAddress(raw.to_string());

    let uri: Uri = trimmed.parse().map_err(|_| invalid())?;
    match uri.scheme_str() {
        Some("http") | Some("https") => {}
        _ => return Err(invalid()),
    }
    if uri.authority().is_none() || uri.query().is_some() {
        return Err(invalid());
    }
    Ok(trimmed.to_string())
}

/// Error type for client building failures.
#[derive(Debug, thiserror::Error)]
pub enum ClientBuildError {
    #[error("invalid base address {0:?}: expected an absolute http or https address")]
    InvalidBaseAddress(String),

    #[error("invalid credential: {0}")]
    InvalidCredential(String),

    #[error("invalid header {0:?}")]
    InvalidHeader(String),

    #[error("invalid retry policy: {0}")]
    InvalidRetryPolicy(&'static str),

    #[error("page token parameter must not be empty")]
    InvalidPageTokenParam,

    #[error("page limit must be at least 1")]
    InvalidMaxPages,
}
