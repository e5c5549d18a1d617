//! Client implementation.
//!
//! This module provides the main [`Client`] type.

use bytes::Bytes;
use serde::de::DeserializeOwned;

use crate::builder::ClientBuilder;
use crate::config::ClientConfig;
use crate::executor::{CallKind, RequestExecutor, RetryState};
use crate::paginator::{Page, PageToken, Pages, Paginator};
use crate::request::RequestSpec;
use crate::response::Response;
use crate::streaming::EventStream;
use crate::transport::{HyperTransport, Transport};
use crate::{ClientError, Outcome};

use std::sync::Arc;

/// Resilient client for one remote service.
///
/// Every operation is a logical call: the client retries transient failures
/// with backoff, applies a per-attempt timeout and observes cancellation, so
/// callers see either one result or one terminal [`ClientError`].
///
/// The client is cheap to clone and safe to share across tasks. Its
/// configuration is fixed at build time; per-call changes go through
/// [`CallOptions`](crate::CallOptions).
///
/// Use [`ClientBuilder`] or [`Client::builder`] to create an instance.
///
/// # Example
///
/// ```ignore
/// use steadycall_client::{Client, Credential, RequestSpec};
///
/// let client = Client::builder("https://api.example.com/v1")
///     .credential(Credential::bearer(token))
///     .build()?;
///
/// let user: User = client
///     .call(RequestSpec::get("/users/7"))
///     .await?
///     .into_inner();
/// ```
#[derive(Debug, Clone)]
pub struct Client<T = HyperTransport> {
    executor: RequestExecutor<T>,
}

impl Client<HyperTransport> {
    /// Create a new ClientBuilder with the given base address.
    ///
    /// This is a convenience method equivalent to `ClientBuilder::new(base_address)`.
    pub fn builder<S: Into<String>>(base_address: S) -> ClientBuilder {
        ClientBuilder::new(base_address)
    }
}

impl<T: Transport> Client<T> {
    /// Called by [`ClientBuilder::build`].
    pub(crate) fn new(transport: T, config: ClientConfig) -> Self {
        Self {
            executor: RequestExecutor::new(transport, Arc::new(config)),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        self.executor.config()
    }

    /// The executor behind this client, for callers that want the raw body
    /// or the retry bookkeeping.
    pub fn executor(&self) -> &RequestExecutor<T> {
        &self.executor
    }

    /// Make a call and decode the JSON response body.
    ///
    /// An empty body decodes as JSON `null`, so `()` and `Option<_>` accept
    /// bodiless responses. A body that does not decode fails with kind
    /// [`Unknown`](steadycall_core::ErrorKind::Unknown) and is not retried.
    pub async fn call<R: DeserializeOwned>(&self, spec: RequestSpec) -> Outcome<R> {
        let response = self.executor.execute(&spec).await?;
        decode_json(response)
    }

    /// Make a call and return the raw response body.
    pub async fn call_bytes(&self, spec: RequestSpec) -> Outcome<Bytes> {
        self.executor.execute(&spec).await
    }

    /// Walk a paginated collection item by item.
    ///
    /// Nothing is sent until the returned stream is polled. Each page is a
    /// logical call of its own with the full retry behavior; the first error
    /// ends the traversal. Calling `list` again starts over from the first
    /// page.
    pub fn list<I>(&self, spec: RequestSpec) -> Paginator<I>
    where
        I: DeserializeOwned + Send + 'static,
    {
        self.list_pages(spec).items()
    }

    /// Walk a paginated collection page by page.
    ///
    /// The continuation token of each page is sent back in the query
    /// parameter named by [`ClientConfig::page_token_param`].
    pub fn list_pages<I>(&self, spec: RequestSpec) -> Pages<I>
    where
        I: DeserializeOwned + Send + 'static,
    {
        let executor = self.executor.clone();
        let param = self.config().page_token_param.clone();

        Pages::new(move |token: Option<PageToken>| {
            let executor = executor.clone();
            let spec = match &token {
                Some(token) => spec.with_query(&param, token.as_str()),
                None => spec.clone(),
            };
            async move {
                let response = executor
                    .execute_as(&spec, CallKind::Page, &mut RetryState::new())
                    .await?;
                decode_json::<Page<I>>(response).map(Response::into_inner)
            }
        })
        .max_pages(self.config().max_pages)
    }

    /// Open an event stream.
    ///
    /// Retries cover only failures before the first byte of the body. Once
    /// the stream is returned, a failure ends it and is not retried.
    pub async fn stream(&self, spec: RequestSpec) -> Result<EventStream, ClientError> {
        let response = self.executor.open_stream(&spec).await?;
        Ok(EventStream::new(
            response,
            self.config().stream_format.clone(),
            spec.get_options().get_cancellation().cloned(),
        ))
    }
}

/// Decode a JSON body, treating an empty body as `null`.
fn decode_json<R: DeserializeOwned>(response: Response<Bytes>) -> Outcome<R> {
    let body: &[u8] = if response.is_empty() {
        b"null"
    } else {
        response.get_ref()
    };
    match serde_json::from_slice::<R>(body) {
        Ok(value) => Ok(response.map(|_| value)),
        Err(e) => Err(ClientError::from(e)
            .with_request_id(response.request_id())
            .with_attempts(response.attempts())),
    }
}
