//! Response body type for the transport boundary.
//!
//! [`ResponseBody`] is a boxed stream of raw chunks. The hyper transport
//! produces one from [`Incoming`]; tests build one from static chunks.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use hyper::body::Incoming;

use crate::ClientError;

type ChunkStream = Pin<Box<dyn Stream<Item = Result<Bytes, ClientError>> + Send>>;

/// The body of a response as an incremental chunk feed.
///
/// Empty chunks are never yielded. An `Err` item means the connection failed
/// mid-body.
pub struct ResponseBody {
    stream: ChunkStream,
}

impl ResponseBody {
    /// Create an empty body.
    pub fn empty() -> Self {
        Self::from_stream(futures::stream::empty())
    }

    /// Create a body with the given data.
    pub fn full(data: impl Into<Bytes>) -> Self {
        let data = data.into();
        Self::from_stream(futures::stream::iter(
            (!data.is_empty()).then_some(Ok(data)),
        ))
    }

    /// Create a body from an arbitrary chunk stream.
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, ClientError>> + Send + 'static,
    {
        let stream = stream.filter(|result| {
            futures::future::ready(match result {
                Ok(bytes) => !bytes.is_empty(),
                Err(_) => true,
            })
        });
        Self {
            stream: Box::pin(stream),
        }
    }

    /// Wrap a hyper response body.
    pub fn from_incoming(body: Incoming) -> Self {
        use http_body_util::BodyExt;

        Self::from_stream(futures::stream::unfold(body, |mut body| async move {
            match body.frame().await {
                // Trailer frames carry no data.
                Some(Ok(frame)) => Some((Ok(frame.into_data().unwrap_or_default()), body)),
                Some(Err(e)) => Some((
                    Err(ClientError::connection(format!("body read failed: {}", e))),
                    body,
                )),
                None => None,
            }
        }))
    }

    /// Read the whole body into memory.
    pub async fn collect(mut self) -> Result<Bytes, ClientError> {
        let mut buf = BytesMut::new();
        while let Some(chunk) = self.stream.next().await {
            buf.extend_from_slice(&chunk?);
        }
        Ok(buf.freeze())
    }
}

impl Stream for ResponseBody {
    type Item = Result<Bytes, ClientError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.stream.as_mut().poll_next(cx)
    }
}

impl Default for ResponseBody {
    fn default() -> Self {
        Self::empty()
    }
}

impl std::fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseBody").finish_non_exhaustive()
    }
}
