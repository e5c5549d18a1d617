//! Call options for per-call configuration.
//!
//! [`CallOptions`] overrides client defaults for one logical call. Every
//! override is optional; unset fields fall back to the client's
//! configuration, and nothing here ever changes that shared configuration.

use http::{HeaderMap, HeaderName, HeaderValue};
use std::time::Duration;

use crate::cancel::CancellationSignal;

/// Options for configuring one logical call.
///
/// # Example
///
/// ```
/// use steadycall_client::{CallOptions, CancellationSignal};
/// use std::time::Duration;
///
/// let signal = CancellationSignal::new();
/// let options = CallOptions::new()
///     .timeout(Duration::from_secs(5))
///     .max_retries(4)
///     .header("x-trace", "abc-123")
///     .cancellation(signal.clone());
///
/// assert_eq!(options.get_timeout(), Some(Duration::from_secs(5)));
/// ```
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    pub(crate) timeout: Option<Duration>,
    pub(crate) max_retries: Option<u32>,
    pub(crate) retry_base_delay: Option<Duration>,
    pub(crate) retry_ceiling: Option<Duration>,
    pub(crate) headers: HeaderMap,
    pub(crate) cancellation: Option<CancellationSignal>,
}

impl CallOptions {
    /// Create new default call options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-attempt timeout for this call.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Get the configured timeout, if any.
    pub fn get_timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Set the maximum number of retries for this call.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Get the configured retry limit, if any.
    pub fn get_max_retries(&self) -> Option<u32> {
        self.max_retries
    }

    /// Set the base backoff delay for this call.
    pub fn retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = Some(delay);
        self
    }

    /// Set the backoff ceiling for this call.
    pub fn retry_ceiling(mut self, ceiling: Duration) -> Self {
        self.retry_ceiling = Some(ceiling);
        self
    }

    /// Attach a cancellation signal.
    pub fn cancellation(mut self, signal: CancellationSignal) -> Self {
        self.cancellation = Some(signal);
        self
    }

    /// Get the attached cancellation signal, if any.
    pub fn get_cancellation(&self) -> Option<&CancellationSignal> {
        self.cancellation.as_ref()
    }

    /// Add a custom header for this call.
    ///
    /// Setting `authorization` here replaces the client credential for this
    /// call only.
    ///
    /// # Panics
    ///
    /// Panics if the header name or value is invalid.
    pub fn header<K, V>(mut self, name: K, value: V) -> Self
    where
        K: TryInto<HeaderName>,
        K::Error: std::fmt::Debug,
        V: TryInto<HeaderValue>,
        V::Error: std::fmt::Debug,
    {
        let name = name.try_into().expect("invalid header name");
        let value = value.try_into().expect("invalid header value");
        self.headers.insert(name, value);
        self
    }

    /// Try to add a custom header for this call.
    ///
    /// Returns `None` if the header name or value is invalid.
    pub fn try_header<K, V>(mut self, name: K, value: V) -> Option<Self>
    where
        K: TryInto<HeaderName>,
        V: TryInto<HeaderValue>,
    {
        let name = name.try_into().ok()?;
        let value = value.try_into().ok()?;
        self.headers.insert(name, value);
        Some(self)
    }

    /// Get a reference to the custom headers.
    pub fn get_headers(&self) -> &HeaderMap {
        &self.headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_options_default() {
        let options = CallOptions::new();
        assert!(options.timeout.is_none());
        assert!(options.max_retries.is_none());
        assert!(options.retry_base_delay.is_none());
        assert!(options.retry_ceiling.is_none());
        assert!(options.headers.is_empty());
        assert!(options.get_cancellation().is_none());
    }

    #[test]
    fn test_call_options_overrides() {
        let options = CallOptions::new()
            .timeout(Duration::from_secs(30))
            .max_retries(0)
            .retry_base_delay(Duration::from_millis(20))
            .retry_ceiling(Duration::from_secs(1));
        assert_eq!(options.get_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(options.get_max_retries(), Some(0));
        assert_eq!(options.retry_base_delay, Some(Duration::from_millis(20)));
        assert_eq!(options.retry_ceiling, Some(Duration::from_secs(1)));
    }

    #[test]
    fn test_call_options_header_replaces() {
        let options = CallOptions::new()
            .header("x-custom", "one")
            .header("x-custom", "two");
        assert_eq!(options.get_headers().get("x-custom").unwrap(), "two");
        assert_eq!(options.get_headers().len(), 1);
    }

    #[test]
    fn test_call_options_try_header_invalid() {
        assert!(CallOptions::new().try_header("bad header", "v").is_none());
        assert!(CallOptions::new().try_header("x-ok", "line\nbreak").is_none());
    }

    #[test]
    fn test_cancellation_is_shared() {
        let signal = CancellationSignal::new();
        let options = CallOptions::new().cancellation(signal.clone());
        signal.cancel();
        assert!(options.get_cancellation().unwrap().is_canceled());
    }
}
