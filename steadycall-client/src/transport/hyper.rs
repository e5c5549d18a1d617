//! Hyper-based HTTP transport.
//!
//! [`HyperTransport`] sends requests with hyper_util's legacy client over
//! plain TCP (HTTP/1.1, or HTTP/2 with prior knowledge).

use std::time::Duration;

use bytes::Bytes;
use http_body_util::Full;
use hyper_util::client::legacy::{Client, connect::HttpConnector};
use hyper_util::rt::{TokioExecutor, TokioTimer};

use super::Transport;
use super::body::ResponseBody;
use crate::ClientError;

type HyperClient = Client<HttpConnector, Full<Bytes>>;

/// HTTP transport using hyper_util's legacy client.
///
/// Cloning is cheap; clones share the connection pool.
///
/// # Example
///
/// ```
/// use steadycall_client::transport::HyperTransport;
/// use std::time::Duration;
///
/// let transport = HyperTransport::builder()
///     .pool_idle_timeout(Duration::from_secs(30))
///     .connect_timeout(Duration::from_secs(5))
///     .build();
/// assert!(!transport.is_http2_only());
/// ```
#[derive(Clone)]
pub struct HyperTransport {
    client: HyperClient,
    http2_only: bool,
}

impl std::fmt::Debug for HyperTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyperTransport")
            .field("http2_only", &self.http2_only)
            .finish_non_exhaustive()
    }
}

impl HyperTransport {
    /// Create a new transport builder.
    pub fn builder() -> HyperTransportBuilder {
        HyperTransportBuilder::new()
    }

    /// Create a new transport with default settings.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Check if this transport is configured for HTTP/2 only.
    pub fn is_http2_only(&self) -> bool {
        self.http2_only
    }
}

impl Default for HyperTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for HyperTransport {
    async fn send(
        &self,
        request: http::Request<Bytes>,
    ) -> Result<http::Response<ResponseBody>, ClientError> {
        let request = request.map(Full::new);
        let response = self
            .client
            .request(request)
            .await
            .map_err(|e| ClientError::connection(format!("request failed: {}", e)))?;
        Ok(response.map(ResponseBody::from_incoming))
    }
}

/// Builder for [`HyperTransport`].
pub struct HyperTransportBuilder {
    /// Force HTTP/2 (h2c prior knowledge).
    http2_only: bool,
    /// Connection pool idle timeout.
    pool_idle_timeout: Option<Duration>,
    /// Maximum idle connections per host.
    pool_max_idle_per_host: usize,
    /// TCP connect timeout.
    connect_timeout: Option<Duration>,
    /// TCP keep-alive interval.
    tcp_keepalive: Option<Duration>,
}

impl Default for HyperTransportBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HyperTransportBuilder {
    /// Create a new transport builder with default settings.
    pub fn new() -> Self {
        Self {
            http2_only: false,
            pool_idle_timeout: Some(Duration::from_secs(90)),
            pool_max_idle_per_host: 32,
            connect_timeout: None,
            tcp_keepalive: None,
        }
    }

    /// Enable HTTP/2 only mode (prior knowledge, no upgrade handshake).
    pub fn http2_only(mut self, enabled: bool) -> Self {
        self.http2_only = enabled;
        self
    }

    /// Set the connection pool idle timeout.
    ///
    /// Default: 90 seconds.
    pub fn pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.pool_idle_timeout = Some(timeout);
        self
    }

    /// Set the maximum number of idle connections per host.
    ///
    /// Default: 32.
    pub fn pool_max_idle_per_host(mut self, max: usize) -> Self {
        self.pool_max_idle_per_host = max;
        self
    }

    /// Set the TCP connect timeout.
    ///
    /// A connect that exceeds it fails the attempt with a connection error.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Set the TCP keep-alive interval.
    pub fn tcp_keepalive(mut self, interval: Duration) -> Self {
        self.tcp_keepalive = Some(interval);
        self
    }

    /// Build the transport.
    pub fn build(self) -> HyperTransport {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(self.connect_timeout);
        connector.set_keepalive(self.tcp_keepalive);
        connector.set_nodelay(true);

        let mut builder = Client::builder(TokioExecutor::new());

        // Required for pool_idle_timeout to take effect.
        builder.pool_timer(TokioTimer::new());

        if let Some(timeout) = self.pool_idle_timeout {
            builder.pool_idle_timeout(timeout);
        }
        builder.pool_max_idle_per_host(self.pool_max_idle_per_host);

        if self.http2_only {
            builder.http2_only(true);
        }

        HyperTransport {
            client: builder.build(connector),
            http2_only: self.http2_only,
        }
    }
}

impl std::fmt::Debug for HyperTransportBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyperTransportBuilder")
            .field("http2_only", &self.http2_only)
            .field("pool_idle_timeout", &self.pool_idle_timeout)
            .field("pool_max_idle_per_host", &self.pool_max_idle_per_host)
            .field("connect_timeout", &self.connect_timeout)
            .field("tcp_keepalive", &self.tcp_keepalive)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use steadycall_core::ErrorKind;

    #[test]
    fn test_builder_defaults() {
        let builder = HyperTransportBuilder::new();
        assert!(!builder.http2_only);
        assert_eq!(builder.pool_max_idle_per_host, 32);
        assert_eq!(builder.pool_idle_timeout, Some(Duration::from_secs(90)));
        assert!(builder.connect_timeout.is_none());
    }

    #[test]
    fn test_builder_settings() {
        let builder = HyperTransportBuilder::new()
            .http2_only(true)
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(10)
            .connect_timeout(Duration::from_secs(3))
            .tcp_keepalive(Duration::from_secs(30));
        assert!(builder.http2_only);
        assert_eq!(builder.pool_idle_timeout, Some(Duration::from_secs(60)));
        assert_eq!(builder.pool_max_idle_per_host, 10);
        assert_eq!(builder.connect_timeout, Some(Duration::from_secs(3)));
        assert_eq!(builder.tcp_keepalive, Some(Duration::from_secs(30)));
    }

    #[tokio::test]
    async fn test_build_transport_http2_only() {
        let transport = HyperTransportBuilder::new().http2_only(true).build();
        assert!(transport.is_http2_only());
    }

    #[tokio::test]
    async fn test_connection_refused_is_connection_error() {
        // Bind then drop to get a port nothing listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transport = HyperTransport::new();
        let request = http::Request::get(format!("http://{addr}/"))
            .body(Bytes::new())
            .unwrap();
        let err = transport.send(request).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConnectionError);
        assert!(err.is_retryable());
    }
}
