//! Request execution with timeout, retry and cancellation.
//!
//! [`RequestExecutor`] runs one logical call as a sequence of physical
//! attempts:
//!
//! ```text
//! Building -> Dispatching -> Succeeded
//!                 |  ^
//!                 v  |
//!              Retrying        (retryable failure, budget left)
//!                 |
//!                 +----------> Failed / Canceled
//! ```
//!
//! Every failure is classified and handed to the [`RetryPolicy`]; a returned
//! delay is slept without blocking other tasks, then the request is sent
//! again. A [`CancellationSignal`] is observed before each dispatch, while an
//! attempt is in flight and while sleeping.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::Uri;
use http::header::HeaderMap;
use steadycall_core::ErrorKind;

use crate::ClientError;
use crate::Outcome;
use crate::cancel::CancellationSignal;
use crate::config::ClientConfig;
use crate::error_parser::parse_error_response;
use crate::request::RequestSpec;
use crate::response::{Metadata, Response, request_id_from};
use crate::transport::{ResponseBody, Transport};

/// State of a logical call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CallState {
    #[default]
    Building,
    Dispatching,
    Retrying,
    Succeeded,
    Failed,
    Canceled,
}

impl CallState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallState::Building => "building",
            CallState::Dispatching => "dispatching",
            CallState::Retrying => "retrying",
            CallState::Succeeded => "succeeded",
            CallState::Failed => "failed",
            CallState::Canceled => "canceled",
        }
    }

    /// Returns whether no further transitions can happen.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CallState::Succeeded | CallState::Failed | CallState::Canceled
        )
    }
}

impl std::fmt::Display for CallState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bookkeeping of one logical call across its attempts.
#[derive(Clone, Debug, Default)]
pub struct RetryState {
    attempt: u32,
    dispatched: u32,
    total_delay: Duration,
    last_error_kind: Option<ErrorKind>,
    request_ids: Vec<String>,
    state: CallState,
}

impl RetryState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of the current (or last) attempt, starting at 0.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Number of attempts handed to the transport.
    pub fn dispatched(&self) -> u32 {
        self.dispatched
    }

    /// Total time spent sleeping between attempts.
    pub fn total_delay(&self) -> Duration {
        self.total_delay
    }

    pub fn last_error_kind(&self) -> Option<ErrorKind> {
        self.last_error_kind
    }

    /// Correlation ids of every completed attempt, in order.
    pub fn request_ids(&self) -> &[String] {
        &self.request_ids
    }

    pub fn state(&self) -> CallState {
        self.state
    }

    fn transition(&mut self, next: CallState) {
        #[cfg(feature = "tracing")]
        tracing::trace!(from = %self.state, to = %next, "call state transition");
        self.state = next;
    }

    fn last_request_id(&self) -> Option<&str> {
        self.request_ids.last().map(String::as_str)
    }
}

/// Kind of logical call, reported in the tracing span.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum CallKind {
    Single,
    Page,
    Stream,
}

impl CallKind {
    #[cfg(feature = "tracing")]
    fn as_str(&self) -> &'static str {
        match self {
            CallKind::Single => "single",
            CallKind::Page => "page",
            CallKind::Stream => "stream",
        }
    }
}

/// A successful attempt.
struct Delivered<P> {
    headers: HeaderMap,
    request_id: String,
    payload: P,
}

/// Runs logical calls against a [`Transport`].
///
/// Cloning is cheap: the configuration is shared and the transport is
/// expected to be a handle.
#[derive(Clone, Debug)]
pub struct RequestExecutor<T> {
    transport: T,
    config: Arc<ClientConfig>,
}

impl<T: Transport> RequestExecutor<T> {
    pub fn new(transport: T, config: Arc<ClientConfig>) -> Self {
        Self { transport, config }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Run a call and read the full response body.
    pub async fn execute(&self, spec: &RequestSpec) -> Outcome<Bytes> {
        self.execute_with_state(spec, &mut RetryState::new()).await
    }

    /// Like [`execute`](Self::execute), exposing the call's bookkeeping.
    pub async fn execute_with_state(
        &self,
        spec: &RequestSpec,
        state: &mut RetryState,
    ) -> Outcome<Bytes> {
        self.execute_as(spec, CallKind::Single, state).await
    }

    pub(crate) async fn execute_as(
        &self,
        spec: &RequestSpec,
        kind: CallKind,
        state: &mut RetryState,
    ) -> Outcome<Bytes> {
        let delivered = self
            .instrumented(spec, kind, state, ResponseBody::collect)
            .await?;
        Ok(Response::new(
            delivered.payload,
            Metadata::new(delivered.headers),
            delivered.request_id,
            state.dispatched,
        ))
    }

    /// Run a call up to the response head and return the body unread.
    ///
    /// Retries cover only failures before the body is handed over; the
    /// timeout covers only the response head.
    pub async fn open_stream(&self, spec: &RequestSpec) -> Outcome<ResponseBody> {
        let mut state = RetryState::new();
        let delivered = self
            .instrumented(spec, CallKind::Stream, &mut state, |body| {
                std::future::ready(Ok(body))
            })
            .await?;
        Ok(Response::new(
            delivered.payload,
            Metadata::new(delivered.headers),
            delivered.request_id,
            state.dispatched,
        ))
    }

    async fn instrumented<P, F, Fut>(
        &self,
        spec: &RequestSpec,
        kind: CallKind,
        state: &mut RetryState,
        read: F,
    ) -> Result<Delivered<P>, ClientError>
    where
        F: Fn(ResponseBody) -> Fut,
        Fut: Future<Output = Result<P, ClientError>>,
    {
        let fut = self.run(spec, state, read);

        #[cfg(feature = "tracing")]
        let fut = {
            use tracing::Instrument;
            fut.instrument(tracing::info_span!(
                "http.call",
                http.method = %spec.method(),
                http.path = spec.path(),
                call.kind = kind.as_str(),
                otel.kind = "client",
            ))
        };
        #[cfg(not(feature = "tracing"))]
        let _ = kind;

        fut.await
    }

    async fn run<P, F, Fut>(
        &self,
        spec: &RequestSpec,
        state: &mut RetryState,
        read: F,
    ) -> Result<Delivered<P>, ClientError>
    where
        F: Fn(ResponseBody) -> Fut,
        Fut: Future<Output = Result<P, ClientError>>,
    {
        let options = spec.get_options();
        let timeout = options.timeout.unwrap_or(self.config.timeout);
        let policy = self.config.retry.with_overrides(options);
        let cancellation = options.cancellation.as_ref();

        state.transition(CallState::Building);

        loop {
            if cancellation.is_some_and(CancellationSignal::is_canceled) {
                return Err(self.canceled(state));
            }

            let request = match self.build_request(spec) {
                Ok(request) => request,
                Err(err) => {
                    state.transition(CallState::Failed);
                    return Err(err.with_attempts(state.dispatched));
                }
            };

            state.transition(CallState::Dispatching);
            state.dispatched += 1;

            #[cfg(feature = "tracing")]
            tracing::debug!(attempt = state.attempt, "dispatching request");

            let result = tokio::select! {
                biased;
                _ = wait_canceled(cancellation) => return Err(self.canceled(state)),
                result = tokio::time::timeout(timeout, self.attempt(request, &read)) => {
                    result.unwrap_or_else(|_| Err(ClientError::timed_out(timeout)))
                }
            };

            let err = match result {
                Ok(delivered) => {
                    state.request_ids.push(delivered.request_id.clone());
                    state.transition(CallState::Succeeded);

                    #[cfg(feature = "tracing")]
                    tracing::debug!(
                        attempt = state.attempt,
                        request_id = %delivered.request_id,
                        "request succeeded"
                    );

                    return Ok(delivered);
                }
                Err(err) => err,
            };

            state.request_ids.push(err.request_id().to_string());
            state.last_error_kind = Some(err.kind());

            let delay = policy
                .next_delay(state.attempt, err.kind())
                .map(|delay| match err.retry_after() {
                    Some(requested) => delay.max(requested).min(policy.max_delay),
                    None => delay,
                });

            let Some(delay) = delay else {
                state.transition(CallState::Failed);

                #[cfg(feature = "tracing")]
                tracing::warn!(
                    error = %err,
                    attempts = state.dispatched,
                    request_id = %err.request_id(),
                    "call failed"
                );

                return Err(err.with_attempts(state.dispatched));
            };

            state.transition(CallState::Retrying);

            #[cfg(feature = "tracing")]
            tracing::debug!(
                kind = %err.kind(),
                attempt = state.attempt,
                delay_ms = delay.as_millis() as u64,
                request_id = %err.request_id(),
                "retrying after transient error"
            );

            tokio::select! {
                biased;
                _ = wait_canceled(cancellation) => return Err(self.canceled(state)),
                _ = tokio::time::sleep(delay) => {}
            }

            state.total_delay += delay;
            state.attempt += 1;
        }
    }

    /// One physical attempt. `read` turns a success body into the payload.
    async fn attempt<P, F, Fut>(
        &self,
        request: http::Request<Bytes>,
        read: &F,
    ) -> Result<Delivered<P>, ClientError>
    where
        F: Fn(ResponseBody) -> Fut,
        Fut: Future<Output = Result<P, ClientError>>,
    {
        let response = self.transport.send(request).await?;
        let (parts, body) = response.into_parts();
        let request_id = request_id_from(&parts.headers, self.config.request_id_header.as_str());

        if !parts.status.is_success() {
            // A failed read leaves only the status to go on.
            let bytes = body.collect().await.unwrap_or_default();
            return Err(parse_error_response(parts.status, &parts.headers, &bytes)
                .with_request_id(request_id));
        }

        let payload = read(body)
            .await
            .map_err(|e| e.with_request_id(request_id.clone()))?;

        Ok(Delivered {
            headers: parts.headers,
            request_id,
            payload,
        })
    }

    /// Assemble the HTTP request.
    ///
    /// Headers are layered, later layers replacing earlier ones: client
    /// defaults, credential, request headers, per-call headers.
    fn build_request(&self, spec: &RequestSpec) -> Result<http::Request<Bytes>, ClientError> {
        let mut uri = self.config.base_address.clone();
        if !spec.path().starts_with('/') {
            uri.push('/');
        }
        uri.push_str(spec.path());
        if let Some(query) = spec.encoded_query()? {
            uri.push(if spec.path().contains('?') { '&' } else { '?' });
            uri.push_str(&query);
        }
        let uri: Uri = uri.parse().map_err(|e| {
            ClientError::new(ErrorKind::BadRequest, format!("invalid request path: {}", e))
        })?;

        let mut request = http::Request::new(spec.get_body().clone());
        *request.method_mut() = spec.method().clone();
        *request.uri_mut() = uri;

        let headers = request.headers_mut();
        for (name, value) in &self.config.default_headers {
            headers.insert(name.clone(), value.clone());
        }
        if let Some((name, value)) = &self.config.credential {
            headers.insert(name.clone(), value.clone());
        }
        for (name, value) in spec.headers() {
            headers.insert(name.clone(), value.clone());
        }
        for (name, value) in spec.get_options().get_headers() {
            headers.insert(name.clone(), value.clone());
        }

        Ok(request)
    }

    fn canceled(&self, state: &mut RetryState) -> ClientError {
        state.last_error_kind = Some(ErrorKind::Canceled);
        state.transition(CallState::Canceled);

        #[cfg(feature = "tracing")]
        tracing::debug!(attempts = state.dispatched, "call canceled");

        let err = ClientError::canceled().with_attempts(state.dispatched);
        match state.last_request_id() {
            Some(id) => err.with_request_id(id),
            None => err,
        }
    }
}

/// Complete when `signal` is canceled; never complete without one.
async fn wait_canceled(signal: Option<&CancellationSignal>) {
    match signal {
        Some(signal) => signal.canceled().await,
        None => std::future::pending().await,
    }
}
