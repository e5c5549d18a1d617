//! Event stream decoding.
//!
//! This module provides [`EventDecoder`]: a stream adapter that splits a raw
//! chunk feed into frames (see [`steadycall_core::frame`]) and yields
//! [`StreamEvent`]s.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use futures::Stream;
use serde::de::DeserializeOwned;
use steadycall_core::frame::{Frame, FrameError, StreamFormat, find_frame_end, parse_frame};
use steadycall_core::ErrorKind;

use crate::ClientError;

/// One decoded event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamEvent {
    /// Sequence position within the stream, starting at 0.
    pub position: u64,
    /// Event tag.
    pub tag: String,
    /// Raw payload.
    pub data: Bytes,
}

impl StreamEvent {
    /// Decode the payload as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ClientError> {
        serde_json::from_slice(&self.data).map_err(|e| {
            ClientError::decode(format!(
                "event {} ({}) is not valid JSON: {}",
                self.position, self.tag, e
            ))
        })
    }

    /// View the payload as UTF-8 text.
    pub fn text(&self) -> Result<&str, ClientError> {
        std::str::from_utf8(&self.data).map_err(|e| {
            ClientError::decode(format!(
                "event {} ({}) is not valid UTF-8: {}",
                self.position, self.tag, e
            ))
        })
    }
}

/// Stream adapter that decodes delimiter-separated event frames.
///
/// Chunks may split or merge frames arbitrarily; an event is yielded only
/// once its delimiter has been seen. The underlying feed is polled only when
/// the buffer holds no complete frame, so a slow consumer throttles the
/// producer.
///
/// The sequence ends with `None` at the terminal frame. Any failure (I/O
/// error, malformed frame, position gap, error trailer, or end of feed
/// without a terminal frame) is yielded once as `Err`, after which the
/// decoder only yields `None`.
///
/// # Example
///
/// ```
/// use bytes::Bytes;
/// use futures::{StreamExt, stream};
/// use steadycall_client::{ClientError, EventDecoder};
/// use steadycall_client::frame::StreamFormat;
///
/// # futures::executor::block_on(async {
/// let feed = stream::iter(vec![
///     Ok::<_, ClientError>(Bytes::from("ev:A|ev:")),
///     Ok(Bytes::from("B|end:|")),
/// ]);
/// let events: Vec<_> = EventDecoder::new(feed, StreamFormat::default())
///     .map(|e| e.unwrap().data)
///     .collect()
///     .await;
/// assert_eq!(events, vec![Bytes::from("A"), Bytes::from("B")]);
/// # });
/// ```
pub struct EventDecoder<S> {
    /// The underlying chunk feed.
    stream: S,
    /// Bytes received but not yet decoded.
    buffer: BytesMut,
    /// Length of the buffer prefix already searched for a delimiter.
    scanned: usize,
    format: StreamFormat,
    /// Position the next event must have.
    next_position: u64,
    /// Set after the terminal frame or any error.
    finished: bool,
    /// Correlation id attached to every error.
    request_id: Option<String>,
}

impl<S> EventDecoder<S> {
    /// Create a new decoder over a chunk feed.
    pub fn new(stream: S, format: StreamFormat) -> Self {
        Self {
            stream,
            buffer: BytesMut::new(),
            scanned: 0,
            format,
            next_position: 0,
            finished: false,
            request_id: None,
        }
    }

    /// Attach the correlation id of the response being decoded.
    pub fn with_request_id<I: Into<String>>(mut self, request_id: I) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Check if the stream has finished.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Number of events yielded so far.
    pub fn events_seen(&self) -> u64 {
        self.next_position
    }

    fn fail(&mut self, err: ClientError) -> Poll<Option<Result<StreamEvent, ClientError>>> {
        self.finished = true;
        self.buffer.clear();
        self.scanned = 0;
        let err = match &self.request_id {
            Some(id) => err.with_request_id(id.clone()),
            None => err,
        };
        Poll::Ready(Some(Err(err)))
    }

    /// Try to decode one frame from the buffer.
    ///
    /// Returns `Ok(None)` if more data is needed.
    fn try_parse_frame(&mut self) -> Result<Option<Frame>, FrameError> {
        let delimiter = self.format.get_delimiter();
        let Some(end) = find_frame_end(&self.buffer[self.scanned..], delimiter) else {
            self.scanned = self.buffer.len();
            return Ok(None);
        };
        let end = self.scanned + end;
        self.scanned = 0;
        let frame = self.buffer.split_to(end + 1).freeze().slice(..end);
        parse_frame(frame, &self.format).map(Some)
    }

    /// Bytes searched so far without finding a delimiter.
    #[cfg(test)]
    fn scanned(&self) -> usize {
        self.scanned
    }
}

impl<S> Stream for EventDecoder<S>
where
    S: Stream<Item = Result<Bytes, ClientError>> + Unpin,
{
    type Item = Result<StreamEvent, ClientError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            if this.finished {
                return Poll::Ready(None);
            }

            match this.try_parse_frame() {
                Ok(Some(Frame::Event {
                    tag,
                    position,
                    data,
                })) => {
                    let expected = this.next_position;
                    if let Some(actual) = position.filter(|p| *p != expected) {
                        return this.fail(FrameError::PositionGap { expected, actual }.into());
                    }
                    this.next_position += 1;
                    return Poll::Ready(Some(Ok(StreamEvent {
                        position: expected,
                        tag,
                        data,
                    })));
                }
                Ok(Some(Frame::End { error })) => {
                    if let Some(error) = error {
                        let message = error
                            .message
                            .unwrap_or_else(|| "stream ended with an error".to_string());
                        return this.fail(ClientError::new(error.kind, message));
                    }
                    this.finished = true;
                    this.buffer.clear();
                    this.scanned = 0;
                    return Poll::Ready(None);
                }
                Ok(None) => {}
                Err(e) => return this.fail(e.into()),
            }

            match Pin::new(&mut this.stream).poll_next(cx) {
                Poll::Ready(Some(Ok(chunk))) => {
                    this.buffer.extend_from_slice(&chunk);
                }
                Poll::Ready(Some(Err(e))) => return this.fail(e),
                Poll::Ready(None) => {
                    let pending = this.buffer.len();
                    let message = if pending == 0 {
                        "stream ended before terminal frame".to_string()
                    } else {
                        format!(
                            "stream ended before terminal frame ({} bytes of incomplete data)",
                            pending
                        )
                    };
                    return this.fail(ClientError::new(ErrorKind::ConnectionError, message));
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
