//! Request classification and strategy dispatch
//!
//! Every intercepted request lands in exactly one route, decided before
//! any I/O and evaluated in this order:
//!
//! 1. non-GET methods pass through
//! 2. cross-origin requests pass through
//! 3. `Accept: text/html` goes network-first, everything else cache-first

pub mod cache_first;
pub mod network_first;

use crate::error::StowawayResult;
use crate::network::Fetcher;
use crate::request::{Request, RequestKey, Response};
use crate::store::{CacheHandle, CacheStore};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;
use url::Url;

/// Where the dispatcher sends a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Not intercepted; the host forwards it untouched
    PassThrough,
    /// Navigational content
    NetworkFirst,
    /// Static assets
    CacheFirst,
}

/// Where a served response came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Cache,
    Network,
    Offline,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cache => write!(f, "cache"),
            Self::Network => write!(f, "network"),
            Self::Offline => write!(f, "offline"),
        }
    }
}

/// A response supplied by an executor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Served {
    pub response: Response,
    pub source: Source,
}

/// Result of handling one intercepted request
#[derive(Debug)]
pub enum FetchOutcome {
    /// The worker declined; the host performs its default handling
    PassThrough(Request),
    /// The worker supplied a response
    Served(Served),
}

/// Classifies requests and runs the matching executor
pub struct Dispatcher {
    origin: Url,
    version: String,
    offline: RequestKey,
    store: Arc<dyn CacheStore>,
    fetcher: Arc<dyn Fetcher>,
    cache: OnceCell<Box<dyn CacheHandle>>,
}

impl Dispatcher {
    /// Create a dispatcher bound to one origin and cache version
    pub fn new(
        origin: Url,
        version: impl Into<String>,
        offline_page: &Url,
        store: Arc<dyn CacheStore>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Self {
        Self {
            origin,
            version: version.into(),
            offline: RequestKey::get(offline_page),
            store,
            fetcher,
            cache: OnceCell::new(),
        }
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Decide the route for a request
    pub fn classify(&self, request: &Request) -> Route {
        if !request.is_retrieval() {
            Route::PassThrough
        } else if !request.is_same_origin(&self.origin) {
            Route::PassThrough
        } else if request.accepts_html() {
            Route::NetworkFirst
        } else {
            Route::CacheFirst
        }
    }

    /// Handle one intercepted request
    pub async fn handle(&self, request: Request) -> StowawayResult<FetchOutcome> {
        let route = self.classify(&request);
        debug!("{} {} -> {:?}", request.method, request.url, route);

        let served = match route {
            Route::PassThrough => return Ok(FetchOutcome::PassThrough(request)),
            Route::CacheFirst => {
                let cache = self.cache().await?;
                cache_first::serve(cache, self.fetcher.as_ref(), &request).await?
            }
            Route::NetworkFirst => {
                let cache = self.cache().await?;
                network_first::serve(cache, self.fetcher.as_ref(), &request, &self.offline)
                    .await?
            }
        };

        Ok(FetchOutcome::Served(served))
    }

    async fn cache(&self) -> StowawayResult<&dyn CacheHandle> {
        let handle = self
            .cache
            .get_or_try_init(|| self.store.open(&self.version))
            .await?;
        Ok(&**handle)
    }
}
