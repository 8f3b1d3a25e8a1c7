//! Scripted collaborators for unit tests

use crate::error::{StowawayError, StowawayResult};
use crate::network::Fetcher;
use crate::request::{Request, RequestKey, Response};
use crate::store::{CacheHandle, CacheStore, MemoryStore};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use url::Url;

pub const ORIGIN: &str = "http://app.test/";

pub fn origin() -> Url {
    Url::parse(ORIGIN).unwrap()
}

pub fn url(path: &str) -> Url {
    origin().join(path).unwrap()
}

pub fn html(path: &str) -> Request {
    Request::get(url(path)).with_header("Accept", "text/html")
}

pub fn asset(path: &str) -> Request {
    Request::get(url(path)).with_header("Accept", "*/*")
}

pub fn page(status: u16, body: &'static str) -> Response {
    Response::new(status)
        .with_header("Content-Type", "text/html")
        .with_body(body)
}

/// Network double answering from a route table
#[derive(Default)]
pub struct ScriptedFetcher {
    routes: Mutex<HashMap<String, Response>>,
    oversize: Mutex<Vec<String>>,
    offline: AtomicBool,
    calls: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Answer `path` with `response`; unrouted paths get a 404
    pub fn route(&self, path: &str, response: Response) {
        self.routes
            .lock()
            .unwrap()
            .insert(url(path).to_string(), response);
    }

    /// Answer `path` with a body over the size limit
    pub fn route_oversize(&self, path: &str) {
        self.oversize.lock().unwrap().push(url(path).to_string());
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, request: &Request) -> StowawayResult<Response> {
        let key = request.key();
        self.calls.lock().unwrap().push(key.url.clone());

        if self.offline.load(Ordering::SeqCst) {
            return Err(StowawayError::network(key.url, "network unreachable"));
        }

        if self.oversize.lock().unwrap().contains(&key.url) {
            return Err(StowawayError::ResponseTooLarge {
                url: key.url,
                limit: 1024,
            });
        }

        Ok(self
            .routes
            .lock()
            .unwrap()
            .get(&key.url)
            .cloned()
            .unwrap_or_else(|| Response::new(404)))
    }
}

/// Store wrapper counting every operation, optionally failing deletes and writes
#[derive(Default)]
pub struct CountingStore {
    inner: MemoryStore,
    ops: Arc<AtomicUsize>,
    fail_delete: Mutex<Vec<String>>,
    fail_put: Arc<AtomicBool>,
}

impl CountingStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn ops(&self) -> usize {
        self.ops.load(Ordering::SeqCst)
    }

    pub fn fail_delete_of(&self, namespace: &str) {
        self.fail_delete.lock().unwrap().push(namespace.to_string());
    }

    /// Make every `put` through any handle fail
    pub fn fail_puts(&self, fail: bool) {
        self.fail_put.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl CacheStore for CountingStore {
    async fn open(&self, namespace: &str) -> StowawayResult<Box<dyn CacheHandle>> {
        self.ops.fetch_add(1, Ordering::SeqCst);
        let inner = self.inner.open(namespace).await?;
        Ok(Box::new(CountingHandle {
            inner,
            ops: Arc::clone(&self.ops),
            fail_put: Arc::clone(&self.fail_put),
        }))
    }

    async fn namespaces(&self) -> StowawayResult<Vec<String>> {
        self.ops.fetch_add(1, Ordering::SeqCst);
        self.inner.namespaces().await
    }

    async fn delete_namespace(&self, namespace: &str) -> StowawayResult<bool> {
        self.ops.fetch_add(1, Ordering::SeqCst);
        if self.fail_delete.lock().unwrap().iter().any(|n| n == namespace) {
            return Err(StowawayError::store(namespace, "permission denied"));
        }
        self.inner.delete_namespace(namespace).await
    }

    fn backend_name(&self) -> &'static str {
        "counting"
    }
}

struct CountingHandle {
    inner: Box<dyn CacheHandle>,
    ops: Arc<AtomicUsize>,
    fail_put: Arc<AtomicBool>,
}

#[async_trait]
impl CacheHandle for CountingHandle {
    fn namespace(&self) -> &str {
        self.inner.namespace()
    }

    async fn get(&self, key: &RequestKey) -> StowawayResult<Option<Response>> {
        self.ops.fetch_add(1, Ordering::SeqCst);
        self.inner.get(key).await
    }

    async fn put(&self, key: &RequestKey, response: &Response) -> StowawayResult<()> {
        self.ops.fetch_add(1, Ordering::SeqCst);
        if self.fail_put.load(Ordering::SeqCst) {
            return Err(StowawayError::store(self.inner.namespace(), "disk full"));
        }
        self.inner.put(key, response).await
    }

    async fn keys(&self) -> StowawayResult<Vec<RequestKey>> {
        self.inner.keys().await
    }
}
