//! Scripted transport for unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use http::{Method, StatusCode};

use super::{ResponseBody, Transport};
use crate::ClientError;

/// One scripted reply.
#[derive(Clone, Debug)]
pub(crate) enum MockReply {
    /// A complete response.
    Respond {
        status: StatusCode,
        headers: Vec<(&'static str, String)>,
        body: Bytes,
    },
    /// A 200 response whose body arrives in the given chunks, optionally
    /// followed by a mid-body failure.
    Chunks {
        request_id: Option<String>,
        chunks: Vec<Bytes>,
        fail_after: bool,
    },
    /// No response at all.
    ConnectionFailure,
    /// A response that arrives only after the delay.
    Delayed(Duration, Box<MockReply>),
}

impl MockReply {
    pub(crate) fn status(status: u16, request_id: &str) -> Self {
        Self::json(status, request_id, "")
    }

    pub(crate) fn json(status: u16, request_id: &str, body: &str) -> Self {
        MockReply::Respond {
            status: StatusCode::from_u16(status).expect("valid status"),
            headers: vec![("x-request-id", request_id.to_string())],
            body: Bytes::copy_from_slice(body.as_bytes()),
        }
    }

    pub(crate) fn with_header(mut self, name: &'static str, value: &str) -> Self {
        if let MockReply::Respond { headers, .. } = &mut self {
            headers.push((name, value.to_string()));
        }
        self
    }

    pub(crate) fn chunks(request_id: &str, chunks: &[&'static str]) -> Self {
        MockReply::Chunks {
            request_id: Some(request_id.to_string()),
            chunks: chunks.iter().map(|c| Bytes::from_static(c.as_bytes())).collect(),
            fail_after: false,
        }
    }

    pub(crate) fn delayed(self, delay: Duration) -> Self {
        MockReply::Delayed(delay, Box::new(self))
    }
}

/// A request as the transport saw it.
#[derive(Clone, Debug)]
pub(crate) struct RecordedRequest {
    pub method: Method,
    pub uri: String,
    pub headers: http::HeaderMap,
    pub body: Bytes,
}

#[derive(Debug, Default)]
struct State {
    script: VecDeque<MockReply>,
    requests: Vec<RecordedRequest>,
}

/// Transport that replays a script of replies and records every request.
#[derive(Clone, Debug, Default)]
pub(crate) struct MockTransport {
    state: Arc<Mutex<State>>,
}

impl MockTransport {
    pub(crate) fn new(script: impl IntoIterator<Item = MockReply>) -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                script: script.into_iter().collect(),
                requests: Vec::new(),
            })),
        }
    }

    pub(crate) fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    pub(crate) fn request_count(&self) -> usize {
        self.state.lock().unwrap().requests.len()
    }
}

impl Transport for MockTransport {
    async fn send(
        &self,
        request: http::Request<Bytes>,
    ) -> Result<http::Response<ResponseBody>, ClientError> {
        let reply = {
            let mut state = self.state.lock().unwrap();
            let (parts, body) = request.into_parts();
            state.requests.push(RecordedRequest {
                method: parts.method,
                uri: parts.uri.to_string(),
                headers: parts.headers,
                body,
            });
            state.script.pop_front()
        };

        let mut reply = reply.expect("mock transport script exhausted");
        while let MockReply::Delayed(delay, inner) = reply {
            tokio::time::sleep(delay).await;
            reply = *inner;
        }

        match reply {
            MockReply::Respond {
                status,
                headers,
                body,
            } => {
                let mut builder = http::Response::builder().status(status);
                for (name, value) in headers {
                    builder = builder.header(name, value);
                }
                Ok(builder.body(ResponseBody::full(body)).unwrap())
            }
            MockReply::Chunks {
                request_id,
                chunks,
                fail_after,
            } => {
                let mut items: Vec<Result<Bytes, ClientError>> =
                    chunks.into_iter().map(Ok).collect();
                if fail_after {
                    items.push(Err(ClientError::connection("connection reset")));
                }
                let mut builder = http::Response::builder().status(StatusCode::OK);
                if let Some(id) = request_id {
                    builder = builder.header("x-request-id", id);
                }
                Ok(builder
                    .body(ResponseBody::from_stream(futures::stream::iter(items)))
                    .unwrap())
            }
            MockReply::ConnectionFailure => Err(ClientError::connection("connection refused")),
            MockReply::Delayed(..) => unreachable!(),
        }
    }
}
