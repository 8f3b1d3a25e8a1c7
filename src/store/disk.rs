//! On-disk cache store
//!
//! Layout: `<root>/<namespace>/<sha256(key)>.json`. Each file holds one
//! complete response snapshot. Writes go to a temp file in the same
//! directory and are renamed into place, so a reader sees either the old
//! or the new entry, never a partial one.

use super::{validate_namespace, CacheHandle, CacheStore};
use crate::error::{StowawayError, StowawayResult};
use crate::request::{RequestKey, Response};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tracing::debug;

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Serialized form of a cache entry
#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    key: RequestKey,
    status: u16,
    headers: Vec<(String, String)>,
    #[serde(with = "hex_body")]
    body: Bytes,
    stored_at: DateTime<Utc>,
}

mod hex_body {
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(body: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(body))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        hex::decode(encoded)
            .map(Bytes::from)
            .map_err(serde::de::Error::custom)
    }
}

/// Cache store persisted under a root directory
#[derive(Debug, Clone)]
pub struct DiskStore {
    root: PathBuf,
}

impl DiskStore {
    /// Create a store rooted at `root` (created lazily)
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory of the store
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn namespace_dir(&self, namespace: &str) -> PathBuf {
        self.root.join(namespace)
    }
}

#[async_trait]
impl CacheStore for DiskStore {
    async fn open(&self, namespace: &str) -> StowawayResult<Box<dyn CacheHandle>> {
        validate_namespace(namespace)?;
        let dir = self.namespace_dir(namespace);
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| StowawayError::io(format!("creating namespace {}", dir.display()), e))?;

        Ok(Box::new(DiskHandle {
            namespace: namespace.to_string(),
            dir,
        }))
    }

    async fn namespaces(&self) -> StowawayResult<Vec<String>> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(StowawayError::io("reading cache store root", e)),
        };

        let mut names = vec![];
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StowawayError::io("reading cache store entry", e))?
        {
            let is_dir = entry
                .file_type()
                .await
                .map(|t| t.is_dir())
                .unwrap_or(false);
            if !is_dir {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if validate_namespace(name).is_ok() {
                    names.push(name.to_string());
                }
            }
        }

        names.sort();
        Ok(names)
    }

    async fn delete_namespace(&self, namespace: &str) -> StowawayResult<bool> {
        validate_namespace(namespace)?;
        let dir = self.namespace_dir(namespace);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => {
                debug!("Removed namespace directory {}", dir.display());
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StowawayError::store(namespace, e)),
        }
    }

    fn backend_name(&self) -> &'static str {
        "disk"
    }
}

struct DiskHandle {
    namespace: String,
    dir: PathBuf,
}

impl DiskHandle {
    fn entry_path(&self, key: &RequestKey) -> PathBuf {
        self.dir.join(format!("{}.json", key.digest()))
    }
}

#[async_trait]
impl CacheHandle for DiskHandle {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    async fn get(&self, key: &RequestKey) -> StowawayResult<Option<Response>> {
        let path = self.entry_path(key);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StowawayError::store(&self.namespace, e)),
        };

        let entry: StoredEntry = serde_json::from_str(&content)?;
        if entry.key != *key {
            return Ok(None);
        }

        Ok(Some(Response {
            status: entry.status,
            headers: entry.headers,
            body: entry.body,
        }))
    }

    async fn put(&self, key: &RequestKey, response: &Response) -> StowawayResult<()> {
        if !fs::try_exists(&self.dir).await.unwrap_or(false) {
            return Err(StowawayError::store(&self.namespace, "namespace was deleted"));
        }

        let entry = StoredEntry {
            key: key.clone(),
            status: response.status,
            headers: response.headers.clone(),
            body: response.body.clone(),
            stored_at: Utc::now(),
        };
        let content = serde_json::to_string(&entry)?;

        let path = self.entry_path(key);
        let tmp = self.dir.join(format!(
            "{}.{}.tmp",
            key.digest(),
            TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));

        fs::write(&tmp, content)
            .await
            .map_err(|e| StowawayError::store(&self.namespace, e))?;
        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(StowawayError::store(&self.namespace, e));
        }

        debug!("Stored {} in {}", key, self.namespace);
        Ok(())
    }

    async fn keys(&self) -> StowawayResult<Vec<RequestKey>> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(StowawayError::store(&self.namespace, e)),
        };

        let mut keys = vec![];
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StowawayError::store(&self.namespace, e))?
        {
            let path = entry.path();
            if !path.extension().is_some_and(|ext| ext == "json") {
                continue;
            }
            if let Ok(content) = fs::read_to_string(&path).await {
                if let Ok(stored) = serde_json::from_str::<StoredEntry>(&content) {
                    keys.push(stored.key);
                }
            }
        }

        keys.sort_by(|a, b| a.url.cmp(&b.url).then_with(|| a.method.cmp(&b.method)));
        Ok(keys)
    }
}
