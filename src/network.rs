//! Network boundary
//!
//! [`Fetcher`] is the only way the core reaches the network. The HTTP
//! implementation runs a blocking `ureq` agent on tokio's blocking pool
//! and returns HTTP error statuses as ordinary responses: only a missing
//! response (refused connection, DNS failure, timeout) is an error.

use crate::config::Config;
use crate::error::{StowawayError, StowawayResult};
use crate::request::{Request, Response};
use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use tracing::debug;
use ureq::Agent;
use url::Url;

/// Headers that describe a single connection and must not be forwarded
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "content-length",
    "host",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Whether a header is connection-specific
pub fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP.iter().any(|h| h.eq_ignore_ascii_case(name))
}

/// Performs network requests on behalf of the worker
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch a request; `Err` means no response was received at all
    async fn fetch(&self, request: &Request) -> StowawayResult<Response>;
}

/// Fetcher backed by a `ureq` agent
#[derive(Clone)]
pub struct HttpFetcher {
    agent: Agent,
    origin: Url,
    upstream: Option<Url>,
    max_body_bytes: u64,
}

impl HttpFetcher {
    /// Create a fetcher for requests made from `origin`
    ///
    /// When `upstream` is set, same-origin requests are sent there instead.
    pub fn new(
        origin: Url,
        upstream: Option<Url>,
        timeout: Option<Duration>,
        max_body_bytes: u64,
    ) -> Self {
        let agent: Agent = Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(timeout)
            .build()
            .into();

        Self {
            agent,
            origin,
            upstream,
            max_body_bytes,
        }
    }

    /// Create a fetcher from configuration
    pub fn from_config(config: &Config) -> StowawayResult<Self> {
        let timeout = match config.network.timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        Ok(Self::new(
            config.origin()?,
            config.upstream()?,
            timeout,
            config.network.max_body_bytes,
        ))
    }

    /// Where a request is actually sent
    pub fn target(&self, url: &Url) -> Url {
        match &self.upstream {
            Some(upstream) if url.origin() == self.origin.origin() => {
                upstream_target(upstream, url)
            }
            _ => url.clone(),
        }
    }
}

/// Map a same-origin URL onto the upstream, keeping any upstream path prefix
fn upstream_target(upstream: &Url, url: &Url) -> Url {
    let mut target = upstream.clone();
    let path = format!("{}{}", upstream.path().trim_end_matches('/'), url.path());
    target.set_path(&path);
    target.set_query(url.query());
    target.set_fragment(None);
    target
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &Request) -> StowawayResult<Response> {
        let target = self.target(&request.url);
        debug!("{} {} -> {}", request.method, request.url, target);

        let agent = self.agent.clone();
        let method = request.method.clone();
        let headers = request.headers.clone();
        let body = request.body.clone();
        let limit = self.max_body_bytes;
        let url = target.to_string();

        tokio::task::spawn_blocking(move || {
            blocking_fetch(&agent, &method, &url, &headers, body, limit)
        })
        .await
        .map_err(|e| StowawayError::Internal(format!("fetch task failed: {}", e)))?
    }
}

fn blocking_fetch(
    agent: &Agent,
    method: &str,
    url: &str,
    headers: &[(String, String)],
    body: Bytes,
    limit: u64,
) -> StowawayResult<Response> {
    let mut builder = ureq::http::Request::builder().method(method).uri(url);
    for (name, value) in headers {
        if !is_hop_by_hop(name) {
            builder = builder.header(name.as_str(), value.as_str());
        }
    }

    let result = if body.is_empty() {
        let request = builder
            .body(())
            .map_err(|e| StowawayError::network(url, e))?;
        agent.run(request)
    } else {
        let request = builder
            .body(body.to_vec())
            .map_err(|e| StowawayError::network(url, e))?;
        agent.run(request)
    };
    let response = result.map_err(|e| StowawayError::network(url, e))?;

    let (parts, mut body) = response.into_parts();
    let bytes = body
        .with_config()
        .limit(limit)
        .read_to_vec()
        .map_err(|e| match e {
            ureq::Error::BodyExceedsLimit(_) => StowawayError::ResponseTooLarge {
                url: url.to_string(),
                limit,
            },
            other => StowawayError::network(url, other),
        })?;

    let headers = parts
        .headers
        .iter()
        .filter(|(name, _)| !is_hop_by_hop(name.as_str()))
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();

    Ok(Response {
        status: parts.status.as_u16(),
        headers,
        body: Bytes::from(bytes),
    })
}
