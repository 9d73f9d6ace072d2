//! HTTP server setup and request dispatch.
//!
//! # Responsibilities
//! - Build the Axum app (request ID, tracing span, dispatch fallback)
//! - Accept connections, run the optional TLS handshake, serve HTTP/1.1 or HTTP/2
//! - Attach the client's address and scheme to every request
//! - Send each request to the static handler or the upstream forwarder
//! - Drain in-flight connections on shutdown

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{Extension, Request, State},
    response::{IntoResponse, Response},
    Router,
};
use axum_server::accept::Accept;
use hyper::body::Incoming;
use hyper_util::{
    rt::{TokioExecutor, TokioIo, TokioTimer},
    server::conn::auto,
    service::TowerToHyperService,
};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::error::ProxyError;
use crate::http::request::{RequestIdExt, UuidRequestId, X_REQUEST_ID};
use crate::lifecycle::{ProxyContext, Shutdown};
use crate::net::{ClientConnection, ConnectionPermit, ConnectionTracker, Listener, ListenerError, ListenerScheme};
use crate::observability::access::{self, AccessRecord};
use crate::observability::metrics;
use crate::routing::Handler;

/// Pause after a failed accept so a full fd table does not spin the loop.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// HTTP server for the edge proxy.
pub struct HttpServer {
    app: Router,
    context: Arc<ProxyContext>,
    tracker: ConnectionTracker,
}

impl HttpServer {
    pub fn new(context: Arc<ProxyContext>) -> Self {
        let app = Self::build_router(Arc::clone(&context));
        Self {
            app,
            context,
            tracker: ConnectionTracker::new(),
        }
    }

    fn build_router(context: Arc<ProxyContext>) -> Router {
        Router::new()
            .fallback(dispatch)
            .with_state(context)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::new(X_REQUEST_ID, UuidRequestId))
                    .layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
                        tracing::info_span!(
                            "request",
                            request_id = request.request_id().unwrap_or("-"),
                            method = %request.method(),
                            path = %request.uri().path(),
                        )
                    }))
                    .layer(PropagateRequestIdLayer::new(X_REQUEST_ID)),
            )
    }

    /// Serve `listener` until `shutdown` fires, then drain open connections.
    pub async fn run(self, listener: Listener, mut shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        let scheme = if self.context.tls.is_some() {
            ListenerScheme::Https
        } else {
            ListenerScheme::Http
        };
        tracing::info!(address = %addr, scheme = scheme.as_str(), "HTTP server starting");

        let drain = Shutdown::new();
        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer, permit)) => {
                        if let Err(error) = stream.set_nodelay(true) {
                            tracing::debug!(peer_addr = %peer, error = %error, "Failed to set TCP_NODELAY");
                        }
                        self.spawn_connection(stream, peer, scheme, permit, drain.subscribe());
                    }
                    Err(ListenerError::Closed) => break,
                    Err(error) => {
                        tracing::warn!(error = %error, "Accept failed");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                },
            }
        }

        drop(listener);
        tracing::info!(
            active_connections = self.tracker.active_count(),
            drain_timeout_secs = self.context.drain_timeout.as_secs(),
            "Stopped accepting, draining connections"
        );
        drain.trigger();

        let remaining = self.tracker.drain(self.context.drain_timeout).await;
        if remaining > 0 {
            tracing::warn!(remaining, "Drain deadline passed, abandoning open connections");
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    fn spawn_connection(
        &self,
        stream: tokio::net::TcpStream,
        peer: SocketAddr,
        scheme: ListenerScheme,
        permit: ConnectionPermit,
        drain: broadcast::Receiver<()>,
    ) {
        let guard = self.tracker.track();
        let client = ClientConnection {
            id: guard.id(),
            peer,
            scheme,
        };
        let app = self.app.clone();
        let tls = self.context.tls.clone();

        tokio::spawn(async move {
            let _permit = permit;
            let _guard = guard;

            match tls {
                Some(acceptor) => match acceptor.accept(stream, ()).await {
                    Ok((stream, ())) => serve_connection(stream, app, client, drain).await,
                    Err(error) => {
                        tracing::debug!(
                            connection_id = %client.id,
                            peer_addr = %peer,
                            error = %error,
                            "TLS handshake failed"
                        );
                    }
                },
                None => serve_connection(stream, app, client, drain).await,
            }
        });
    }
}

/// Serve HTTP on one accepted connection until it closes or is drained.
async fn serve_connection<I>(io: I, app: Router, client: ClientConnection, mut drain: broadcast::Receiver<()>)
where
    I: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let service = tower::ServiceExt::<hyper::Request<Incoming>>::map_request(
        app,
        move |mut request: hyper::Request<Incoming>| {
            request.extensions_mut().insert(client);
            request
        },
    );
    let service = TowerToHyperService::new(service);

    let mut builder = auto::Builder::new(TokioExecutor::new());
    builder.http1().timer(TokioTimer::new());

    let connection = builder.serve_connection(TokioIo::new(io), service);
    tokio::pin!(connection);

    let mut draining = false;
    loop {
        tokio::select! {
            result = connection.as_mut() => {
                if let Err(error) = result {
                    tracing::debug!(
                        connection_id = %client.id,
                        peer_addr = %client.peer,
                        error = %error,
                        "Connection closed with error"
                    );
                }
                break;
            }
            _ = drain.recv(), if !draining => {
                connection.as_mut().graceful_shutdown();
                draining = true;
            }
        }
    }
}

/// Route one request and produce its response.
async fn dispatch(
    State(context): State<Arc<ProxyContext>>,
    Extension(client): Extension<ClientConnection>,
    request: Request,
) -> Response {
    let started = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let request_id = request.request_id().unwrap_or("-").to_owned();

    let (route, result) = match context.router.route(&path) {
        Ok(matched) => {
            let handler = matched.rule.handler();
            let result = match handler {
                Handler::StaticFile(files) => files.serve(&method, matched.remainder).await,
                Handler::ProxyUpstream(target) => {
                    context.forwarder.forward(target, request, &client).await
                }
            };
            (handler.label(), result)
        }
        Err(error) => ("none", Err(error)),
    };

    let response = match result {
        Ok(response) => response,
        Err(error) => {
            report_failure(&error, &method, &path, &client, &request_id);
            error.into_response()
        }
    };

    metrics::record_request(route, &method, response.status().as_u16(), started);
    access::instrument(
        response,
        AccessRecord::new(request_id, method, path, route, client.peer, started),
    )
}

fn report_failure(
    error: &ProxyError,
    method: &axum::http::Method,
    path: &str,
    client: &ClientConnection,
    request_id: &str,
) {
    if error.is_upstream() {
        metrics::record_upstream_error(error.kind());
    }

    if error.is_server_fault() {
        tracing::error!(
            request_id,
            kind = error.kind(),
            method = %method,
            path,
            client = %client.peer,
            error = %error,
            "Request failed"
        );
    } else {
        tracing::warn!(
            request_id,
            kind = error.kind(),
            method = %method,
            path,
            client = %client.peer,
            error = %error,
            "Request rejected"
        );
    }
}
