//! HTTP transport layer.
//!
//! The executor talks to the remote side only through the [`Transport`]
//! trait. [`HyperTransport`] is the shipped implementation; applications
//! that need TLS, proxies or a custom stack implement the trait themselves.
//!
//! A transport performs exactly one physical attempt per [`send`] call and
//! never retries: retries, timeouts and cancellation belong to the executor.
//! A missing response (refused connection, reset, DNS failure) is reported
//! as an error of kind [`ConnectionError`]; any response that did arrive,
//! whatever its status, is returned as `Ok`.
//!
//! [`send`]: Transport::send
//! [`ConnectionError`]: steadycall_core::ErrorKind::ConnectionError

mod body;
mod hyper;
#[cfg(test)]
pub(crate) mod mock;

use std::future::Future;

use bytes::Bytes;

use crate::ClientError;

pub use body::ResponseBody;
pub use hyper::{HyperTransport, HyperTransportBuilder};

/// One physical request/response exchange.
pub trait Transport: Clone + Send + Sync + 'static {
    /// Send a request and return the response head with a streaming body.
    fn send(
        &self,
        request: http::Request<Bytes>,
    ) -> impl Future<Output = Result<http::Response<ResponseBody>, ClientError>> + Send;
}
