//! Resilient HTTP client for remote services.
//!
//! This crate wraps a remote service behind a [`Client`] whose calls survive
//! transient failures. Every call is a *logical call*: one or more physical
//! attempts, retried with capped exponential backoff when the failure is
//! transient, each bounded by a timeout and all of them observing an
//! optional [`CancellationSignal`]. The caller sees one result or one
//! [`ClientError`] carrying a closed [`ErrorKind`] and the request id of the
//! final attempt.
//!
//! ## Features
//!
//! - Single-value JSON calls ([`Client::call`])
//! - Lazy traversal of paginated collections ([`Client::list`])
//! - Incrementally decoded event streams ([`Client::stream`])
//! - Pluggable [`Transport`], with a hyper-based default
//!
//! ## Example
//!
//! ```ignore
//! use std::time::Duration;
//! use futures::TryStreamExt;
//! use steadycall_client::{CallOptions, Client, Credential, RequestSpec};
//!
//! let client = Client::builder("https://api.example.com/v1")
//!     .credential(Credential::bearer(token))
//!     .max_retries(3)
//!     .build()?;
//!
//! // Single value
//! let user: User = client.call(RequestSpec::get("/users/7")).await?.into_inner();
//!
//! // Every item of every page
//! let users: Vec<User> = client.list(RequestSpec::get("/users")).try_collect().await?;
//!
//! // Per-call overrides
//! let spec = RequestSpec::post("/reports")
//!     .json(&request)?
//!     .options(CallOptions::new().timeout(Duration::from_secs(30)).max_retries(0));
//! let report: Report = client.call(spec).await?.into_inner();
//! ```
//!
//! ## Cargo features
//!
//! | Feature   | Default | Description                                    |
//! |-----------|---------|------------------------------------------------|
//! | `tracing` | yes     | Spans per logical call and events per attempt |

mod builder;
mod cancel;
mod client;
pub mod config;
mod error;
mod error_parser;
mod executor;
mod paginator;
pub mod request;
pub mod response;
mod streaming;
pub mod transport;

pub use builder::{ClientBuildError, ClientBuilder};
pub use cancel::CancellationSignal;
pub use client::Client;
pub use config::{
    CallOptions, ClientConfig, Credential, FixedJitter, Jitter, NoJitter, RandomJitter,
    RetryPolicy, defaults,
};
pub use error::ClientError;
pub use executor::{CallState, RequestExecutor, RetryState};
pub use paginator::{Page, PageToken, Pages, Paginator};
pub use request::RequestSpec;
pub use response::{EventDecoder, Metadata, Response, StreamEvent};
pub use streaming::{EventStream, TypedEvent, TypedEvents};
pub use transport::{HyperTransport, HyperTransportBuilder, ResponseBody, Transport};

pub use bytes::Bytes;
pub use steadycall_core::{Classification, ErrorKind, TransportOutcome, classify, frame};

/// Result of a logical call.
pub type Outcome<T> = Result<Response<T>, ClientError>;
