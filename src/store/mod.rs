//! Namespaced response cache
//!
//! A store holds any number of namespaces (cache generations). Each
//! namespace maps a [`RequestKey`] to a [`Response`] snapshot with
//! last-write-wins semantics.
//!
//! Namespace creation and deletion belong to the lifecycle manager;
//! strategies only ever `get` and `put` through a handle.

mod disk;
mod memory;

pub use disk::DiskStore;
pub use memory::MemoryStore;

use crate::config::{schema::StoreConfig, StoreBackend};
use crate::error::{StowawayError, StowawayResult};
use crate::request::{RequestKey, Response};
use async_trait::async_trait;
use std::sync::Arc;

/// Storage holding every cache namespace
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Open a namespace, creating it if it does not exist
    async fn open(&self, namespace: &str) -> StowawayResult<Box<dyn CacheHandle>>;

    /// List all namespaces, sorted by name
    async fn namespaces(&self) -> StowawayResult<Vec<String>>;

    /// Delete a namespace and every entry in it
    ///
    /// Returns `false` when the namespace did not exist.
    async fn delete_namespace(&self, namespace: &str) -> StowawayResult<bool>;

    /// Human-readable backend name for display
    fn backend_name(&self) -> &'static str;
}

/// An open namespace
#[async_trait]
pub trait CacheHandle: Send + Sync {
    /// Name of the namespace this handle reads and writes
    fn namespace(&self) -> &str;

    /// Look up a stored response
    async fn get(&self, key: &RequestKey) -> StowawayResult<Option<Response>>;

    /// Store a response, replacing any previous entry for the key
    ///
    /// Fails if the namespace was deleted after it was opened.
    async fn put(&self, key: &RequestKey, response: &Response) -> StowawayResult<()>;

    /// All stored keys, sorted
    async fn keys(&self) -> StowawayResult<Vec<RequestKey>>;
}

/// Check that a namespace name is safe to use as a directory name
pub fn validate_namespace(name: &str) -> StowawayResult<()> {
    let valid = !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));

    if valid {
        Ok(())
    } else {
        Err(StowawayError::InvalidNamespace(name.to_string()))
    }
}

/// Create the store selected by configuration
pub fn create_store(config: &StoreConfig) -> Arc<dyn CacheStore> {
    match config.backend {
        StoreBackend::Disk => Arc::new(DiskStore::new(config.root())),
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
    }
}
