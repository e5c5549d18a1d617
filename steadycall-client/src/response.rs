//! Response types.
//!
//! This module provides:
//! - [`Response`]: A decoded value plus the final attempt's request id and
//!   response headers
//! - [`Metadata`]: Read access to response headers
//! - [`EventDecoder`] and [`StreamEvent`]: Incremental decoding of event
//!   streams

mod decoder;

use http::HeaderMap;
use std::ops::Deref;

pub use decoder::{EventDecoder, StreamEvent};

/// Successful result of a logical call.
///
/// # Example
///
/// ```ignore
/// let response = client.call::<User>(RequestSpec::get("/users/7")).await?;
///
/// println!("served by attempt {} ({})", response.attempts(), response.request_id());
/// let user = response.into_inner();
/// ```
#[derive(Debug, Clone)]
pub struct Response<T> {
    inner: T,
    metadata: Metadata,
    request_id: String,
    attempts: u32,
}

impl<T> Response<T> {
    /// Create a new Response.
    pub fn new(inner: T, metadata: Metadata, request_id: String, attempts: u32) -> Self {
        Self {
            inner,
            metadata,
            request_id,
            attempts,
        }
    }

    /// Extract the inner value, discarding metadata.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Get a reference to the response metadata.
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Correlation id of the attempt that succeeded.
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Number of physical attempts the call took.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Transform the inner value, preserving everything else.
    pub fn map<U, F>(self, f: F) -> Response<U>
    where
        F: FnOnce(T) -> U,
    {
        Response {
            inner: f(self.inner),
            metadata: self.metadata,
            request_id: self.request_id,
            attempts: self.attempts,
        }
    }

    /// Get a reference to the inner value.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Decompose into inner value and metadata.
    pub fn into_parts(self) -> (T, Metadata) {
        (self.inner, self.metadata)
    }
}

impl<T> Deref for Response<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<T> AsRef<T> for Response<T> {
    fn as_ref(&self) -> &T {
        &self.inner
    }
}

/// Response metadata wrapper around HTTP headers.
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    headers: HeaderMap,
}

impl Metadata {
    /// Create new metadata from HTTP headers.
    pub fn new(headers: HeaderMap) -> Self {
        Self { headers }
    }

    /// Get a header value by name.
    ///
    /// Returns `None` if the header is not present or is not valid UTF-8.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.headers.get(key).and_then(|v| v.to_str().ok())
    }

    /// Check if a header exists.
    pub fn contains(&self, key: &str) -> bool {
        self.headers.contains_key(key)
    }

    /// Get the underlying HeaderMap.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Consume self and return the underlying HeaderMap.
    pub fn into_headers(self) -> HeaderMap {
        self.headers
    }

    /// Returns true if there are no headers.
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}

impl From<HeaderMap> for Metadata {
    fn from(headers: HeaderMap) -> Self {
        Self::new(headers)
    }
}

/// Generate a placeholder correlation id for attempts the remote side never
/// identified.
pub(crate) fn local_request_id() -> String {
    format!("local-{}", uuid::Uuid::new_v4())
}

/// Read the correlation id from response headers, falling back to a local
/// placeholder.
pub(crate) fn request_id_from(headers: &HeaderMap, header: &str) -> String {
    headers
        .get(header)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(local_request_id)
}
