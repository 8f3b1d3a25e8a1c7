//! HTTP front
//!
//! Accepts client connections and feeds every request through the worker.
//! Origin-form targets (`GET /path`) are resolved against the worker
//! origin; absolute-form targets (`GET http://host/path`, as sent to a
//! forward proxy) are kept as is, so cross-origin traffic can flow through
//! the same listener and is passed through untouched.

use crate::error::{StowawayError, StowawayResult};
use crate::network::{is_hop_by_hop, Fetcher};
use crate::request::{parse_url, Request, Response};
use crate::strategy::FetchOutcome;
use crate::worker::Worker;
use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::IntoResponse;
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};
use url::Url;

/// Response header naming where the body came from
pub const SOURCE_HEADER: &str = "x-stowaway-source";

#[derive(Clone)]
struct ProxyState {
    worker: Arc<Worker>,
    fetcher: Arc<dyn Fetcher>,
}

/// Build the router; `fetcher` performs pass-through requests
pub fn router(worker: Arc<Worker>, fetcher: Arc<dyn Fetcher>) -> Router {
    Router::new()
        .fallback(proxy)
        .with_state(ProxyState { worker, fetcher })
}

/// Bind `listen` and serve until Ctrl-C
pub async fn serve(
    listen: &str,
    worker: Arc<Worker>,
    fetcher: Arc<dyn Fetcher>,
) -> StowawayResult<()> {
    let listener = TcpListener::bind(listen)
        .await
        .map_err(|e| StowawayError::io(format!("binding {}", listen), e))?;
    serve_on(listener, worker, fetcher).await
}

/// Serve on an already bound listener until Ctrl-C
pub async fn serve_on(
    listener: TcpListener,
    worker: Arc<Worker>,
    fetcher: Arc<dyn Fetcher>,
) -> StowawayResult<()> {
    let addr = listener
        .local_addr()
        .map_err(|e| StowawayError::io("reading listener address", e))?;
    info!("Serving {} on http://{}", worker.version(), addr);

    axum::serve(listener, router(worker, fetcher))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| StowawayError::Server(e.to_string()))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

async fn proxy(
    State(state): State<ProxyState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> axum::response::Response {
    let origin = state.worker.dispatcher().origin();
    let request = match build_request(origin, &method, &uri, &headers, body) {
        Ok(request) => request,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &e),
    };

    match handle(&state, request).await {
        Ok((response, source)) => into_http(response, &source),
        Err(e) => {
            warn!("{} {} failed: {}", method, uri, e);
            error_response(StatusCode::BAD_GATEWAY, &e)
        }
    }
}

async fn handle(state: &ProxyState, request: Request) -> StowawayResult<(Response, String)> {
    match state.worker.fetch(request).await? {
        FetchOutcome::Served(served) => Ok((served.response, served.source.to_string())),
        FetchOutcome::PassThrough(request) => {
            debug!("Passing through {} {}", request.method, request.url);
            let response = state.fetcher.fetch(&request).await?;
            Ok((response, "passthrough".to_string()))
        }
    }
}

/// Convert an incoming HTTP request into a worker request
fn build_request(
    origin: &Url,
    method: &Method,
    uri: &Uri,
    headers: &HeaderMap,
    body: Bytes,
) -> StowawayResult<Request> {
    let url = if uri.scheme().is_some() && uri.authority().is_some() {
        parse_url(&uri.to_string())?
    } else {
        let target = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
        origin.join(target).map_err(|e| StowawayError::InvalidUrl {
            url: target.to_string(),
            reason: e.to_string(),
        })?
    };

    let mut request = Request::new(method.as_str(), url).with_body(body);
    for (name, value) in headers {
        match value.to_str() {
            Ok(value) => request = request.with_header(name.as_str(), value),
            Err(_) => debug!("Dropping non-UTF-8 value of header {}", name),
        }
    }
    Ok(request)
}

fn into_http(response: Response, source: &str) -> axum::response::Response {
    let mut builder = axum::http::Response::builder().status(response.status);
    for (name, value) in &response.headers {
        if !is_hop_by_hop(name) {
            builder = builder.header(name.as_str(), value.as_str());
        }
    }

    builder
        .header(SOURCE_HEADER, source)
        .body(Body::from(response.body))
        .unwrap_or_else(|e| {
            warn!("Dropping malformed response: {}", e);
            StatusCode::BAD_GATEWAY.into_response()
        })
}

fn error_response(status: StatusCode, error: &StowawayError) -> axum::response::Response {
    (status, format!("{}\n", error)).into_response()
}
