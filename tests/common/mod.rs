//! Shared utilities for integration tests: a programmable mock deployment
//! and a router running on an ephemeral port.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};
use futures_util::StreamExt;
use model_router::config::{BackendConfig, ModelConfig, RouterConfig};
use model_router::{HttpServer, LoadBalancer, Shutdown};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// What the mock answers with.
#[derive(Debug, Clone)]
pub enum Reply {
    Json { status: u16, body: serde_json::Value },
    /// `text/event-stream` body, each chunk preceded by `delay`.
    Stream { chunks: Vec<String>, delay: Duration },
    /// Never answer.
    Hang,
    /// Send headers and `prefix`, then go quiet without finishing the body.
    Stall {
        content_type: &'static str,
        prefix: String,
        content_length: Option<usize>,
    },
}

impl Reply {
    pub fn ok(content: &str) -> Self {
        Reply::Json {
            status: 200,
            body: serde_json::json!({
                "object": "chat.completion",
                "choices": [{"index": 0, "message": {"role": "assistant", "content": content}}]
            }),
        }
    }

    pub fn status(status: u16) -> Self {
        Reply::Json {
            status,
            body: serde_json::json!({"error": {"message": format!("mock status {status}")}}),
        }
    }
}

/// A request as the mock saw it.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Recorded {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap()
    }
}

struct MockState {
    scripted: Mutex<VecDeque<Reply>>,
    fallback: Reply,
    requests: Mutex<Vec<Recorded>>,
}

/// Mock model deployment. Scripted replies are used first, in order, then
/// the fallback for every later request.
pub struct MockBackend {
    addr: SocketAddr,
    state: Arc<MockState>,
    shutdown: CancellationToken,
}

impl MockBackend {
    pub async fn start(fallback: Reply) -> Self {
        Self::scripted(Vec::new(), fallback).await
    }

    pub async fn scripted(replies: Vec<Reply>, fallback: Reply) -> Self {
        let state = Arc::new(MockState {
            scripted: Mutex::new(replies.into()),
            fallback,
            requests: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .fallback(handle)
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = CancellationToken::new();
        let token = shutdown.clone();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await
                .ok();
        });

        Self { addr, state, shutdown }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn count(&self) -> usize {
        self.state.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn last(&self) -> Recorded {
        self.requests().pop().expect("mock received no requests")
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn handle(
    State(state): State<Arc<MockState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    state.requests.lock().unwrap().push(Recorded {
        method,
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        headers,
        body,
    });

    let reply = state
        .scripted
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or_else(|| state.fallback.clone());

    match reply {
        Reply::Json { status, body } => {
            let status = StatusCode::from_u16(status).unwrap();
            (status, axum::Json(body)).into_response()
        }
        Reply::Stream { chunks, delay } => {
            let stream = futures_util::stream::iter(chunks).then(move |chunk| async move {
                tokio::time::sleep(delay).await;
                Ok::<_, Infallible>(Bytes::from(chunk))
            });
            Response::builder()
                .status(StatusCode::OK)
                .header("content-type", "text/event-stream")
                .body(Body::from_stream(stream))
                .unwrap()
        }
        Reply::Hang => std::future::pending::<Response>().await,
        Reply::Stall {
            content_type,
            prefix,
            content_length,
        } => {
            let stream = futures_util::stream::once(async move { Ok::<_, Infallible>(Bytes::from(prefix)) })
                .chain(futures_util::stream::pending());
            let mut builder = Response::builder()
                .status(StatusCode::OK)
                .header("content-type", content_type);
            if let Some(len) = content_length {
                builder = builder.header("content-length", len);
            }
            builder.body(Body::from_stream(stream)).unwrap()
        }
    }
}

/// Router config with one model served by `backends`, in order.
///
/// Backend `i` uses deployment `dep-{i}` and key `sk-backend-{i}`.
pub fn config_for(model: &str, backends: &[&str]) -> RouterConfig {
    let mut config = RouterConfig::default();
    config.retry.max_attempts = 3;
    config.retry.timeout_secs = 2;
    config.retry.connect_timeout_secs = 1;
    config.models.insert(
        model.to_string(),
        ModelConfig {
            backends: backends
                .iter()
                .enumerate()
                .map(|(i, url)| BackendConfig::new(*url, format!("sk-backend-{i}"), format!("dep-{i}")))
                .collect(),
        },
    );
    config
}

/// The router under test, serving on an ephemeral port.
pub struct TestRouter {
    addr: SocketAddr,
    balancer: Arc<LoadBalancer>,
    shutdown: Shutdown,
    client: reqwest::Client,
}

impl TestRouter {
    pub async fn start(config: RouterConfig) -> Self {
        let server = HttpServer::new(config).unwrap();
        let balancer = server.balancer().clone();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Shutdown::new();

        let handle = shutdown.clone();
        tokio::spawn(async move {
            server.run(listener, handle).await.ok();
        });

        Self {
            addr,
            balancer,
            shutdown,
            client: reqwest::Client::new(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    pub fn balancer(&self) -> &Arc<LoadBalancer> {
        &self.balancer
    }

    /// Trigger the router's graceful shutdown.
    pub fn shutdown(&self) {
        self.shutdown.trigger();
    }

    pub async fn chat(&self, body: serde_json::Value) -> reqwest::Response {
        self.client
            .post(self.url("/v1/chat/completions"))
            .json(&body)
            .send()
            .await
            .unwrap()
    }
}

impl Drop for TestRouter {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

pub fn chat_body(model: &str) -> serde_json::Value {
    serde_json::json!({
        "model": model,
        "messages": [{"role": "user", "content": "Hello"}]
    })
}
