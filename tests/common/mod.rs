//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{ConnectInfo, Path as UrlPath, Request},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use edge_proxy::config::{ProxyConfig, StaticFilesConfig};
use edge_proxy::net::Listener;
use edge_proxy::{HttpServer, ProxyContext, Shutdown};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing_subscriber::fmt::MakeWriter;

pub const LOGO: &[u8] = &[
    0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, b'I', b'H', b'D', b'R',
];

/// A running proxy and the trigger that stops it.
pub struct TestProxy {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub handle: tokio::task::JoinHandle<Result<(), std::io::Error>>,
}

impl TestProxy {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Start the proxy on an ephemeral port.
pub async fn start_proxy(config: ProxyConfig) -> TestProxy {
    let context = Arc::new(ProxyContext::init(&config).await.unwrap());
    let socket = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let listener = Listener::from_tcp(socket, config.listener.max_connections);
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let handle = tokio::spawn(HttpServer::new(context).run(listener, server_shutdown));

    TestProxy {
        addr,
        shutdown,
        handle,
    }
}

/// Proxy configuration pointing at `upstream`, with `/static/` served from `root`.
pub fn proxy_config(upstream: SocketAddr, root: Option<&Path>) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.listener.host = "127.0.0.1".into();
    config.listener.port = 0;
    config.upstream.address = upstream.to_string();
    config.upstream.connect_timeout_secs = 1;
    config.upstream.response_timeout_secs = 2;
    config.lifecycle.drain_timeout_secs = 5;
    if let Some(root) = root {
        config.static_files.push(StaticFilesConfig {
            prefix: "/static/".into(),
            root: root.display().to_string(),
            index: Some("index.html".into()),
        });
    }
    config
}

/// A static root holding a small fixture tree, plus a secret file beside it.
///
/// ```text
/// <tmp>/public/logo.png
/// <tmp>/public/index.html
/// <tmp>/public/a.txt
/// <tmp>/public/b.txt
/// <tmp>/public/docs/readme.txt
/// <tmp>/secret.txt
/// ```
pub struct StaticFixture {
    pub dir: TempDir,
}

impl StaticFixture {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let public = dir.path().join("public");
        std::fs::create_dir_all(public.join("docs")).unwrap();
        std::fs::write(public.join("logo.png"), LOGO).unwrap();
        std::fs::write(public.join("index.html"), "<h1>home</h1>").unwrap();
        std::fs::write(public.join("a.txt"), "AAAA").unwrap();
        std::fs::write(public.join("b.txt"), "BBBB").unwrap();
        std::fs::write(public.join("docs/readme.txt"), "read me").unwrap();
        std::fs::write(dir.path().join("secret.txt"), "top secret").unwrap();
        Self { dir }
    }

    pub fn root(&self) -> std::path::PathBuf {
        self.dir.path().join("public")
    }
}

/// HTTP client that never goes through an environment proxy.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

/// Start an Axum backend that reports what it received.
///
/// - `/slow/{ms}` waits before answering
/// - `/status/{code}` answers with that status and no body
/// - `/redirect` answers 302 with a Location naming the backend itself
/// - `/chunked` streams its body in several pieces
/// - anything else echoes method, URI, headers, body and peer as JSON
pub async fn start_echo_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let app = Router::new()
        .route(
            "/slow/{ms}",
            get(|UrlPath(ms): UrlPath<u64>| async move {
                tokio::time::sleep(Duration::from_millis(ms)).await;
                "slow"
            }),
        )
        .route(
            "/status/{code}",
            axum::routing::any(|UrlPath(code): UrlPath<u16>| async move {
                StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }),
        )
        .route(
            "/redirect",
            get(move || async move {
                (
                    StatusCode::FOUND,
                    [(header::LOCATION, format!("http://{addr}/landing"))],
                )
            }),
        )
        .route("/chunked", get(chunked))
        .fallback(echo);

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });
    addr
}

async fn echo(ConnectInfo(peer): ConnectInfo<SocketAddr>, request: Request) -> Json<Value> {
    let (parts, body) = request.into_parts();
    let mut headers: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in &parts.headers {
        headers
            .entry(name.as_str().to_string())
            .or_default()
            .push(value.to_str().unwrap_or("<binary>").to_string());
    }
    let body: Bytes = axum::body::to_bytes(body, 1 << 20).await.unwrap_or_default();

    Json(json!({
        "method": parts.method.as_str(),
        "uri": parts.uri.to_string(),
        "headers": headers,
        "body": String::from_utf8_lossy(&body),
        "peer": peer.to_string(),
    }))
}

async fn chunked() -> Response {
    let pieces: Vec<Result<&'static str, std::io::Error>> = vec![Ok("one,"), Ok("two,"), Ok("three")];
    axum::body::Body::from_stream(futures_util::stream::iter(pieces)).into_response()
}

/// Start a raw backend that writes `response` to every connection and closes it.
pub async fn start_raw_backend(response: &'static [u8]) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let _ = socket.write_all(response).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    addr
}

/// Start a raw backend that counts accepted connections and closes each one
/// after reading the request, without answering.
pub async fn start_counting_backend() -> (SocketAddr, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepted = Arc::new(AtomicUsize::new(0));

    let counter = accepted.clone();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let _ = socket.set_linger(Some(Duration::ZERO));
            });
        }
    });
    (addr, accepted)
}

/// Formatted log output collected in memory.
///
/// Installed as the thread's default subscriber, so it sees everything the
/// proxy logs from tasks on a current-thread test runtime.
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    pub fn install() -> (Self, tracing::subscriber::DefaultGuard) {
        let logs = Self::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_ansi(false)
            .finish();
        let guard = tracing::subscriber::set_default(subscriber);
        (logs, guard)
    }

    /// Lines that contain every one of `needles`.
    pub fn lines_with(&self, needles: &[&str]) -> Vec<String> {
        String::from_utf8_lossy(&self.0.lock().unwrap())
            .lines()
            .filter(|line| needles.iter().all(|needle| line.contains(needle)))
            .map(str::to_string)
            .collect()
    }
}

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// An address with nothing listening on it.
pub async fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Write raw bytes to `addr` and read until the peer closes.
pub async fn raw_exchange(addr: SocketAddr, request: &[u8]) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(request).await.unwrap();
    let mut response = Vec::new();
    let read = tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut response)).await;
    assert!(read.is_ok(), "proxy did not close the connection");
    String::from_utf8_lossy(&response).into_owned()
}

/// Status code of the first response in a raw exchange.
pub fn status_of(raw: &str) -> u16 {
    raw.split_whitespace()
        .nth(1)
        .and_then(|code| code.parse().ok())
        .unwrap_or(0)
}
