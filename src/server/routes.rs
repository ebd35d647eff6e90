//! Route handlers

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, StatusCode, Uri};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use bytes::{BufMut, BytesMut};

use crate::registry::Broker;

use super::sse;
use super::stream::EventStream;

/// Page served at `/` when no file is configured
const INDEX_HTML: &str = include_str!("../../static/index.html");

/// Shared state available to all route handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    pub broker: Broker,
    pub index_path: Option<Arc<PathBuf>>,
}

impl AppState {
    pub fn new(broker: Broker, index_path: Option<PathBuf>) -> Self {
        Self {
            broker,
            index_path: index_path.map(Arc::new),
        }
    }
}

/// Build the complete router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/events", get(events))
        .route("/send/{event}", get(send_event))
        .fallback(not_found)
        .with_state(state)
}

/// `GET /` — static home page
async fn home(State(state): State<AppState>) -> Response {
    let Some(path) = state.index_path else {
        return Html(INDEX_HTML).into_response();
    };

    match tokio::fs::read_to_string(path.as_ref()).await {
        Ok(page) => Html(page).into_response(),
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "Failed to read home page");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// `GET /events` — long-lived SSE stream
async fn events(State(state): State<AppState>) -> Response {
    let stream = match EventStream::connect(&state.broker) {
        Ok(stream) => stream,
        Err(e) => {
            tracing::error!(error = %e, "Cannot open event stream");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Streaming unsupported!\n").into_response();
        }
    };

    (
        [
            (header::CONTENT_TYPE, sse::CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
        ],
        Body::from_stream(stream),
    )
        .into_response()
}

/// `GET /send/{event}` — publish one event
///
/// The segment is percent-decoded to raw bytes and published as is; it does
/// not have to be valid UTF-8.
async fn send_event(State(state): State<AppState>, uri: Uri) -> Response {
    let raw = uri.path().rsplit('/').next().unwrap_or_default();
    let payload = urlencoding::decode_binary(raw.as_bytes()).into_owned();

    let mut body = BytesMut::with_capacity(payload.len() + 16);
    body.put_slice(b"Event sent: ");
    body.put_slice(&payload);
    body.put_slice(b"\n\n");

    match state.broker.publish(payload).await {
        Ok(_) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            body.freeze(),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Cannot publish event");
            (StatusCode::INTERNAL_SERVER_ERROR, "Broker unavailable\n").into_response()
        }
    }
}

async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::time::Duration;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    use super::*;

    async fn serve(state: AppState) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, build_router(state)).await.unwrap();
        });
        addr
    }

    /// One-shot request; the server closes the connection after responding.
    async fn get(addr: SocketAddr, path: &str) -> String {
        let mut socket = TcpStream::connect(addr).await.unwrap();
        let request = format!(
            "GET {} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
            path
        );
        socket.write_all(request.as_bytes()).await.unwrap();

        let mut response = Vec::new();
        socket.read_to_end(&mut response).await.unwrap();
        String::from_utf8_lossy(&response).into_owned()
    }

    /// Open an event stream and return the socket once headers arrive.
    async fn open_stream(addr: SocketAddr) -> (TcpStream, String) {
        let mut socket = TcpStream::connect(addr).await.unwrap();
        socket
            .write_all(b"GET /events HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .await
            .unwrap();

        let head = read_until(&mut socket, String::new(), "\r\n\r\n").await;
        (socket, head)
    }

    async fn read_until(socket: &mut TcpStream, mut seen: String, needle: &str) -> String {
        let mut buf = [0u8; 1024];
        tokio::time::timeout(Duration::from_secs(5), async {
            while !seen.contains(needle) {
                let n = socket.read(&mut buf).await.unwrap();
                assert!(n > 0, "connection closed before {:?}", needle);
                seen.push_str(&String::from_utf8_lossy(&buf[..n]));
            }
        })
        .await
        .unwrap();
        seen
    }

    async fn wait_for_subscribers(broker: &Broker, expected: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while broker.stats().await.unwrap().active_subscribers != expected {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_stream_receives_then_disconnects() {
        let (broker, _task) = Broker::spawn();
        let addr = serve(AppState::new(broker.clone(), None)).await;

        let (mut client, head) = open_stream(addr).await;
        assert!(head.starts_with("HTTP/1.1 200 OK"));
        assert!(head.to_lowercase().contains("content-type: text/event-stream"));
        assert!(head.to_lowercase().contains("cache-control: no-cache"));
        wait_for_subscribers(&broker, 1).await;

        let response = get(addr, "/send/hello").await;
        assert!(response.starts_with("HTTP/1.1 200 OK"));
        assert!(response.ends_with("Event sent: hello\n\n"));

        read_until(&mut client, head, "data: Event: hello\n\n").await;

        drop(client);
        wait_for_subscribers(&broker, 0).await;

        let response = get(addr, "/send/world").await;
        assert!(response.ends_with("Event sent: world\n\n"));

        let stats = broker.stats().await.unwrap();
        assert_eq!(stats.registrations, 1);
        assert_eq!(stats.deregistrations, 1);
    }

    #[tokio::test]
    async fn test_send_without_subscribers() {
        let (broker, _task) = Broker::spawn();
        let addr = serve(AppState::new(broker.clone(), None)).await;

        let response = get(addr, "/send/hello%20there").await;
        assert!(response.starts_with("HTTP/1.1 200 OK"));
        assert!(response.ends_with("Event sent: hello there\n\n"));
        assert_eq!(broker.stats().await.unwrap().events_published, 1);
    }

    #[tokio::test]
    async fn test_send_non_utf8_payload() {
        let (broker, _task) = Broker::spawn();
        let addr = serve(AppState::new(broker.clone(), None)).await;

        let mut subscription = broker.register().unwrap();
        let reader = tokio::spawn(async move { subscription.recv().await });

        let response = get(addr, "/send/%FF").await;
        assert!(response.starts_with("HTTP/1.1 200 OK"));
        assert!(response.contains("Event sent: "));

        let event = reader.await.unwrap().unwrap();
        assert_eq!(event.data().as_ref(), b"\xff");
        assert_eq!(broker.stats().await.unwrap().events_published, 1);
    }

    #[tokio::test]
    async fn test_stream_unavailable_when_broker_stopped() {
        let (broker, task) = Broker::spawn();
        broker.shutdown();
        task.await.unwrap();
        let addr = serve(AppState::new(broker, None)).await;

        let response = get(addr, "/events").await;
        assert!(response.starts_with("HTTP/1.1 500"));
        assert!(response.ends_with("Streaming unsupported!\n"));

        let response = get(addr, "/send/x").await;
        assert!(response.starts_with("HTTP/1.1 500"));
    }

    #[tokio::test]
    async fn test_home_page() {
        let (broker, _task) = Broker::spawn();
        let addr = serve(AppState::new(broker, None)).await;

        let response = get(addr, "/").await;
        assert!(response.starts_with("HTTP/1.1 200 OK"));
        assert!(response.contains("EventSource(\"/events\")"));
    }

    #[tokio::test]
    async fn test_home_page_from_file() {
        let path = std::env::temp_dir().join(format!("howler-index-{}.html", std::process::id()));
        tokio::fs::write(&path, "<p>custom</p>").await.unwrap();

        let (broker, _task) = Broker::spawn();
        let addr = serve(AppState::new(broker, Some(path.clone()))).await;

        let response = get(addr, "/").await;
        assert!(response.ends_with("<p>custom</p>"));

        tokio::fs::remove_file(&path).await.unwrap();
        let response = get(addr, "/").await;
        assert!(response.starts_with("HTTP/1.1 500"));
    }

    #[tokio::test]
    async fn test_unknown_path() {
        let (broker, _task) = Broker::spawn();
        let addr = serve(AppState::new(broker, None)).await;

        let response = get(addr, "/nope").await;
        assert!(response.starts_with("HTTP/1.1 404"));
    }
}
