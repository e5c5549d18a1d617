//! Event stream returned by [`Client::stream`](crate::Client::stream).
//!
//! [`EventStream`] wraps an [`EventDecoder`] over the response body and
//! keeps the response's request id and headers at hand.
//!
//! # Cancellation
//!
//! Dropping an [`EventStream`] closes the underlying connection. A
//! [`CancellationSignal`] set in the call's options also ends the stream:
//! the next poll yields one [`Canceled`](steadycall_core::ErrorKind::Canceled)
//! error, then `None`.

use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use futures::{Stream, StreamExt, TryStreamExt};
use serde::de::DeserializeOwned;
use steadycall_core::frame::StreamFormat;

use crate::ClientError;
use crate::cancel::CancellationSignal;
use crate::response::{EventDecoder, Metadata, Response, StreamEvent};
use crate::transport::ResponseBody;

/// Live stream of events from one response.
///
/// # Example
///
/// ```ignore
/// use futures::StreamExt;
///
/// let mut events = client.stream(RequestSpec::get("/jobs/7/events")).await?;
/// while let Some(event) = events.next().await {
///     let event = event?;
///     println!("{} #{}: {:?}", event.tag, event.position, event.text()?);
/// }
/// ```
pub struct EventStream {
    decoder: EventDecoder<ResponseBody>,
    metadata: Metadata,
    request_id: String,
    canceled: Option<Pin<Box<dyn Future<Output = ()> + Send>>>,
    done: bool,
}

impl EventStream {
    pub(crate) fn new(
        response: Response<ResponseBody>,
        format: StreamFormat,
        cancellation: Option<CancellationSignal>,
    ) -> Self {
        let request_id = response.request_id().to_string();
        let (body, metadata) = response.into_parts();
        let canceled = cancellation.map(|signal| {
            Box::pin(async move { signal.canceled().await })
                as Pin<Box<dyn Future<Output = ()> + Send>>
        });
        Self {
            decoder: EventDecoder::new(body, format).with_request_id(request_id.clone()),
            metadata,
            request_id,
            canceled,
            done: false,
        }
    }

    /// Correlation id of the response.
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Response headers.
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Decode every event payload as JSON.
    ///
    /// A payload that fails to decode ends the stream with the error.
    pub fn typed<T: DeserializeOwned>(self) -> TypedEvents<T> {
        TypedEvents {
            inner: self,
            _marker: PhantomData,
        }
    }

    /// Read the stream to its terminal frame.
    pub async fn collect_events(self) -> Result<Vec<StreamEvent>, ClientError> {
        self.try_collect().await
    }

    fn finish(&mut self, err: ClientError) -> Poll<Option<Result<StreamEvent, ClientError>>> {
        self.done = true;
        self.canceled = None;
        Poll::Ready(Some(Err(err)))
    }
}

impl Stream for EventStream {
    type Item = Result<StreamEvent, ClientError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        if this.done {
            return Poll::Ready(None);
        }

        if let Some(canceled) = this.canceled.as_mut() {
            if canceled.as_mut().poll(cx).is_ready() {
                #[cfg(feature = "tracing")]
                tracing::debug!(request_id = %this.request_id, "event stream canceled");

                let err = ClientError::canceled().with_request_id(this.request_id.clone());
                return this.finish(err);
            }
        }

        match ready!(this.decoder.poll_next_unpin(cx)) {
            Some(Ok(event)) => Poll::Ready(Some(Ok(event))),
            Some(Err(err)) => this.finish(err),
            None => {
                this.done = true;
                this.canceled = None;
                Poll::Ready(None)
            }
        }
    }
}

impl std::fmt::Debug for EventStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStream")
            .field("request_id", &self.request_id)
            .field("events_seen", &self.decoder.events_seen())
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

/// An event with its payload decoded.
#[derive(Clone, Debug, PartialEq)]
pub struct TypedEvent<T> {
    pub position: u64,
    pub tag: String,
    pub value: T,
}

/// Stream returned by [`EventStream::typed`].
pub struct TypedEvents<T> {
    inner: EventStream,
    _marker: PhantomData<fn() -> T>,
}

impl<T> TypedEvents<T> {
    pub fn request_id(&self) -> &str {
        self.inner.request_id()
    }

    pub fn metadata(&self) -> &Metadata {
        self.inner.metadata()
    }
}

impl<T: DeserializeOwned> Stream for TypedEvents<T> {
    type Item = Result<TypedEvent<T>, ClientError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let Some(event) = ready!(this.inner.poll_next_unpin(cx)) else {
            return Poll::Ready(None);
        };
        let typed = event.and_then(|event| {
            let value = event
                .json()
                .map_err(|e| e.with_request_id(this.inner.request_id.clone()))?;
            Ok(TypedEvent {
                position: event.position,
                tag: event.tag,
                value,
            })
        });
        if typed.is_err() {
            this.inner.done = true;
        }
        Poll::Ready(Some(typed))
    }
}

impl<T> std::fmt::Debug for TypedEvents<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("TypedEvents").field(&self.inner).finish()
    }
}
