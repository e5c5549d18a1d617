//! End-to-end tests: `HyperTransport` against a local axum server.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use serde::Deserialize;
use serde_json::json;
use steadycall_client::frame::{StreamFormat, encode_end, encode_frame};
use steadycall_client::{
    CallOptions, CancellationSignal, Client, ClientBuilder, Credential, ErrorKind, RequestSpec,
};

async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

fn builder(base: &str) -> ClientBuilder {
    Client::builder(base)
        .retry_base_delay(Duration::from_millis(10))
        .retry_ceiling(Duration::from_millis(50))
}

#[derive(Debug, Deserialize, PartialEq)]
struct User {
    id: u32,
    name: String,
}

#[tokio::test]
async fn test_json_call_with_credential() {
    let router = Router::new().route(
        "/api/users/7",
        get(|headers: HeaderMap| async move {
            let auth = headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default();
            if auth != "Bearer s3cret" {
                return (StatusCode::UNAUTHORIZED, Json(json!({"message": "bad token"})))
                    .into_response();
            }
            (
                [("x-request-id", "req-user")],
                Json(json!({"id": 7, "name": "Ada"})),
            )
                .into_response()
        }),
    );
    let base = serve(router).await;

    let client = builder(&format!("{}/api/", base))
        .credential(Credential::bearer("s3cret"))
        .build()
        .unwrap();
    let response = client.call::<User>(RequestSpec::get("/users/7")).await.unwrap();

    assert_eq!(response.request_id(), "req-user");
    assert_eq!(response.attempts(), 1);
    assert_eq!(
        response.metadata().get("content-type"),
        Some("application/json")
    );
    assert_eq!(
        response.into_inner(),
        User {
            id: 7,
            name: "Ada".into()
        }
    );
}

#[tokio::test]
async fn test_unavailable_then_success() {
    let hits = Arc::new(AtomicUsize::new(0));
    let router = Router::new()
        .route(
            "/flaky",
            get(|State(hits): State<Arc<AtomicUsize>>| async move {
                let n = hits.fetch_add(1, Ordering::SeqCst) + 1;
                let id = format!("req-{}", n);
                if n < 3 {
                    (StatusCode::SERVICE_UNAVAILABLE, [("x-request-id", id)], "busy")
                        .into_response()
                } else {
                    ([("x-request-id", id)], Json(json!({"ok": true}))).into_response()
                }
            }),
        )
        .with_state(hits.clone());
    let base = serve(router).await;

    let client = builder(&base).build().unwrap();
    let response = client
        .call::<serde_json::Value>(RequestSpec::get("/flaky"))
        .await
        .unwrap();

    assert_eq!(response.request_id(), "req-3");
    assert_eq!(response.attempts(), 3);
    assert_eq!(*response, json!({"ok": true}));
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_not_found_is_not_retried() {
    let hits = Arc::new(AtomicUsize::new(0));
    let router = Router::new()
        .route(
            "/missing",
            get(|State(hits): State<Arc<AtomicUsize>>| async move {
                hits.fetch_add(1, Ordering::SeqCst);
                (
                    StatusCode::NOT_FOUND,
                    [("x-request-id", "req-404")],
                    Json(json!({"error": {"message": "no such thing"}})),
                )
            }),
        )
        .with_state(hits.clone());
    let base = serve(router).await;

    let client = builder(&base).build().unwrap();
    let err = client
        .call::<serde_json::Value>(RequestSpec::get("/missing"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(!err.is_retryable());
    assert_eq!(err.message(), "no such thing");
    assert_eq!(err.request_id(), "req-404");
    assert_eq!(err.attempts(), 1);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_paginated_list() {
    let router = Router::new().route(
        "/numbers",
        get(|Query(params): Query<HashMap<String, String>>| async move {
            assert_eq!(params.get("limit").map(String::as_str), Some("2"));
            match params.get("page_token").map(String::as_str) {
                None => Json(json!({"items": [1, 2], "next_page_token": "t1"})),
                Some("t1") => Json(json!({"items": [3], "next_page_token": "t2"})),
                Some(_) => Json(json!({"items": [], "next_page_token": null})),
            }
        }),
    );
    let base = serve(router).await;

    let client = builder(&base).build().unwrap();
    let items: Vec<u32> = client
        .list::<u32>(RequestSpec::get("/numbers").query("limit", 2))
        .try_collect()
        .await
        .unwrap();
    assert_eq!(items, vec![1, 2, 3]);
}

fn event_body(frames: Vec<Vec<u8>>) -> Body {
    let chunks = frames
        .into_iter()
        .map(|frame| Ok::<_, std::io::Error>(Bytes::from(frame)));
    Body::from_stream(futures::stream::iter(chunks))
}

#[tokio::test]
async fn test_event_stream() {
    let router = Router::new().route(
        "/events",
        get(|| async {
            let format = StreamFormat::default();
            let frames = vec![
                b"ev:A|ev:".to_vec(),
                b"B|".to_vec(),
                encode_frame("progress", Some(2), br#"{"done":3}"#, &format).unwrap(),
                encode_end(None, &format).unwrap(),
            ];
            ([("x-request-id", "req-stream")], event_body(frames))
        }),
    );
    let base = serve(router).await;

    let client = builder(&base).build().unwrap();
    let stream = client.stream(RequestSpec::get("/events")).await.unwrap();
    assert_eq!(stream.request_id(), "req-stream");

    let events = stream.collect_events().await.unwrap();
    let tags: Vec<&str> = events.iter().map(|e| e.tag.as_str()).collect();
    assert_eq!(tags, vec!["ev", "ev", "progress"]);
    assert_eq!(events[1].text().unwrap(), "B");
    assert_eq!(events[2].json::<serde_json::Value>().unwrap(), json!({"done": 3}));
}

#[tokio::test]
async fn test_event_stream_error_trailer() {
    let router = Router::new().route(
        "/events",
        get(|| async {
            let format = StreamFormat::default();
            event_body(vec![
                encode_frame("ev", None, b"A", &format).unwrap(),
                encode_end(Some((ErrorKind::RateLimited, "retry in 5s | quota")), &format)
                    .unwrap(),
            ])
        }),
    );
    let base = serve(router).await;

    let client = builder(&base).build().unwrap();
    let mut stream = client.stream(RequestSpec::get("/events")).await.unwrap();

    assert!(stream.next().await.unwrap().is_ok());
    let err = stream.next().await.unwrap().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RateLimited);
    assert_eq!(err.message(), "retry in 5s | quota");
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn test_attempt_timeout() {
    let router = Router::new().route(
        "/slow",
        get(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            "late"
        }),
    );
    let base = serve(router).await;

    let client = builder(&base)
        .timeout(Duration::from_millis(100))
        .max_retries(1)
        .build()
        .unwrap();
    let err = client
        .call_bytes(RequestSpec::get("/slow"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::TimeoutError);
    assert!(err.is_retryable());
    assert_eq!(err.attempts(), 2);
    assert!(err.request_id().starts_with("local-"));
}

#[tokio::test]
async fn test_cancel_in_flight_call() {
    let router = Router::new().route(
        "/slow",
        get(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            "late"
        }),
    );
    let base = serve(router).await;

    let client = builder(&base).build().unwrap();
    let signal = CancellationSignal::new();
    let spec = RequestSpec::get("/slow").options(CallOptions::new().cancellation(signal.clone()));

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        signal.cancel();
    });
    let err = client.call_bytes(spec).await.unwrap_err();
    canceller.await.unwrap();

    assert_eq!(err.kind(), ErrorKind::Canceled);
    assert!(!err.is_retryable());
    assert_eq!(err.attempts(), 1);
}

#[tokio::test]
async fn test_connection_refused() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = builder(&format!("http://{}", addr))
        .max_retries(2)
        .build()
        .unwrap();
    let err = client
        .call_bytes(RequestSpec::get("/"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ConnectionError);
    assert!(err.is_retryable());
    assert_eq!(err.attempts(), 3);
    assert!(err.request_id().starts_with("local-"));
}
