//! In-memory cache store

use super::{validate_namespace, CacheHandle, CacheStore};
use crate::error::{StowawayError, StowawayResult};
use crate::request::{RequestKey, Response};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

type Namespaces = HashMap<String, HashMap<RequestKey, Response>>;

/// Cache store kept in process memory
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    namespaces: Arc<RwLock<Namespaces>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn open(&self, namespace: &str) -> StowawayResult<Box<dyn CacheHandle>> {
        validate_namespace(namespace)?;
        self.namespaces
            .write()
            .await
            .entry(namespace.to_string())
            .or_default();

        Ok(Box::new(MemoryHandle {
            namespace: namespace.to_string(),
            namespaces: Arc::clone(&self.namespaces),
        }))
    }

    async fn namespaces(&self) -> StowawayResult<Vec<String>> {
        let mut names: Vec<String> = self.namespaces.read().await.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn delete_namespace(&self, namespace: &str) -> StowawayResult<bool> {
        Ok(self.namespaces.write().await.remove(namespace).is_some())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

struct MemoryHandle {
    namespace: String,
    namespaces: Arc<RwLock<Namespaces>>,
}

#[async_trait]
impl CacheHandle for MemoryHandle {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    async fn get(&self, key: &RequestKey) -> StowawayResult<Option<Response>> {
        let namespaces = self.namespaces.read().await;
        Ok(namespaces
            .get(&self.namespace)
            .and_then(|entries| entries.get(key))
            .cloned())
    }

    async fn put(&self, key: &RequestKey, response: &Response) -> StowawayResult<()> {
        let mut namespaces = self.namespaces.write().await;
        let entries = namespaces
            .get_mut(&self.namespace)
            .ok_or_else(|| StowawayError::store(&self.namespace, "namespace was deleted"))?;
        entries.insert(key.clone(), response.clone());
        Ok(())
    }

    async fn keys(&self) -> StowawayResult<Vec<RequestKey>> {
        let namespaces = self.namespaces.read().await;
        let mut keys: Vec<RequestKey> = namespaces
            .get(&self.namespace)
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort_by(|a, b| a.url.cmp(&b.url).then_with(|| a.method.cmp(&b.method)));
        Ok(keys)
    }
}
