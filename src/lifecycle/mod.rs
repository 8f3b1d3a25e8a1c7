//! Worker lifecycle: install and activate
//!
//! Install fetches the whole precache manifest into the namespace named by
//! the version tag. Activate removes every other namespace and claims the
//! open clients.
//!
//! # States
//!
//! | State | Entered by |
//! |-------|------------|
//! | installing | creation, or a new install pass |
//! | waiting | successful install |
//! | activating | activation start (skip-waiting or external signal) |
//! | active | activation complete, or resuming an installed version |
//! | redundant | failed install (terminal) |

mod clients;
mod manifest;

pub use clients::ClientRegistry;
pub use manifest::PrecacheManifest;

use crate::error::{StowawayError, StowawayResult};
use crate::network::Fetcher;
use crate::request::{Request, RequestKey, Response};
use crate::store::CacheStore;
use futures_util::future::{join_all, try_join_all};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use url::Url;

/// Lifecycle state of a worker version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    Installing,
    Waiting,
    Activating,
    Active,
    Redundant,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Installing => write!(f, "installing"),
            Self::Waiting => write!(f, "waiting"),
            Self::Activating => write!(f, "activating"),
            Self::Active => write!(f, "active"),
            Self::Redundant => write!(f, "redundant"),
        }
    }
}

/// Result of a successful install
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallReport {
    pub version: String,
    pub cached: Vec<RequestKey>,
}

/// Result of an activation pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ActivationReport {
    pub version: String,
    /// Stale namespaces removed
    pub deleted: Vec<String>,
    /// Stale namespaces that could not be removed, with the reason
    pub failed: Vec<(String, String)>,
}

/// Drives one worker version through install and activate
pub struct LifecycleManager {
    version: String,
    manifest: PrecacheManifest,
    store: Arc<dyn CacheStore>,
    fetcher: Arc<dyn Fetcher>,
    clients: ClientRegistry,
    skip_waiting: bool,
    state: watch::Sender<LifecycleState>,
}

impl LifecycleManager {
    pub fn new(
        version: impl Into<String>,
        manifest: PrecacheManifest,
        store: Arc<dyn CacheStore>,
        fetcher: Arc<dyn Fetcher>,
        clients: ClientRegistry,
    ) -> Self {
        let (state, _rx) = watch::channel(LifecycleState::Installing);
        Self {
            version: version.into(),
            manifest,
            store,
            fetcher,
            clients,
            skip_waiting: true,
            state,
        }
    }

    /// Whether activation follows a successful install without waiting
    pub fn with_skip_waiting(mut self, skip_waiting: bool) -> Self {
        self.skip_waiting = skip_waiting;
        self
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn manifest(&self) -> &PrecacheManifest {
        &self.manifest
    }

    pub fn skip_waiting(&self) -> bool {
        self.skip_waiting
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    fn transition(&self, next: LifecycleState) {
        let prev = self.state.send_replace(next);
        if prev != next {
            info!("Worker {}: {} -> {}", self.version, prev, next);
        }
    }

    /// Fetch and store every manifest entry into the current namespace
    ///
    /// All fetches must return a 2xx response before anything is written.
    /// Any failure leaves the worker redundant for good; other namespaces
    /// are not touched, so the previous version keeps serving.
    pub async fn install(&self) -> StowawayResult<InstallReport> {
        match self.state() {
            LifecycleState::Installing | LifecycleState::Waiting => {
                self.transition(LifecycleState::Installing)
            }
            LifecycleState::Activating | LifecycleState::Active | LifecycleState::Redundant => {
                return Err(StowawayError::InvalidState {
                    expected: "installing or waiting".to_string(),
                    actual: self.state().to_string(),
                });
            }
        }

        match self.precache().await {
            Ok(cached) => {
                self.transition(LifecycleState::Waiting);
                Ok(InstallReport {
                    version: self.version.clone(),
                    cached,
                })
            }
            Err(e) => {
                warn!("Install of {} failed: {}", self.version, e);
                self.transition(LifecycleState::Redundant);
                Err(e)
            }
        }
    }

    async fn precache(&self) -> StowawayResult<Vec<RequestKey>> {
        let responses =
            try_join_all(self.manifest.entries().iter().map(|url| self.fetch_entry(url))).await?;

        let cache = self
            .store
            .open(&self.version)
            .await
            .map_err(|e| self.install_error(&self.version, e))?;

        let mut cached = Vec::with_capacity(responses.len());
        for (key, response) in responses {
            cache
                .put(&key, &response)
                .await
                .map_err(|e| self.install_error(&key.url, e))?;
            debug!("Precached {}", key);
            cached.push(key);
        }

        info!("Precached {} resource(s) into {}", cached.len(), self.version);
        Ok(cached)
    }

    async fn fetch_entry(&self, url: &Url) -> StowawayResult<(RequestKey, Response)> {
        let request = Request::get(url.clone());
        let response = self
            .fetcher
            .fetch(&request)
            .await
            .map_err(|e| self.install_error(url.as_str(), e))?;

        if !response.is_success() {
            return Err(self.install_error(
                url.as_str(),
                format!("unexpected status {}", response.status),
            ));
        }

        Ok((request.key(), response))
    }

    fn install_error(&self, resource: &str, reason: impl ToString) -> StowawayError {
        StowawayError::Install {
            version: self.version.clone(),
            resource: resource.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Remove stale namespaces, claim clients, and become active
    pub async fn activate(&self) -> StowawayResult<ActivationReport> {
        if self.state() != LifecycleState::Waiting {
            return Err(StowawayError::InvalidState {
                expected: LifecycleState::Waiting.to_string(),
                actual: self.state().to_string(),
            });
        }

        self.transition(LifecycleState::Activating);
        let report = self.collect_garbage().await;
        self.clients.claim(&self.version);
        self.transition(LifecycleState::Active);

        Ok(report)
    }

    /// Take control with a version installed by an earlier run
    ///
    /// Skips install and garbage collection. The current namespace must
    /// already exist in the store.
    pub async fn resume(&self) -> StowawayResult<()> {
        if self.state() != LifecycleState::Installing {
            return Err(StowawayError::InvalidState {
                expected: LifecycleState::Installing.to_string(),
                actual: self.state().to_string(),
            });
        }

        if !self.store.namespaces().await?.contains(&self.version) {
            return Err(StowawayError::InvalidState {
                expected: format!("{} installed", self.version),
                actual: "not installed".to_string(),
            });
        }

        self.clients.claim(&self.version);
        self.transition(LifecycleState::Active);
        Ok(())
    }

    /// Delete every namespace other than the current version
    ///
    /// Each deletion runs independently; failures are logged and reported,
    /// never propagated.
    pub async fn collect_garbage(&self) -> ActivationReport {
        let mut report = ActivationReport {
            version: self.version.clone(),
            ..Default::default()
        };

        let namespaces = match self.store.namespaces().await {
            Ok(names) => names,
            Err(e) => {
                warn!("Could not list cache namespaces: {}", e);
                return report;
            }
        };

        let stale: Vec<String> = namespaces
            .into_iter()
            .filter(|name| *name != self.version)
            .collect();

        let results = join_all(
            stale
                .iter()
                .map(|name| self.store.delete_namespace(name)),
        )
        .await;

        for (name, result) in stale.into_iter().zip(results) {
            match result {
                Ok(_) => {
                    info!("Deleted stale cache namespace {}", name);
                    report.deleted.push(name);
                }
                Err(e) => {
                    warn!("Failed to delete stale cache namespace {}: {}", name, e);
                    report.failed.push((name, e.to_string()));
                }
            }
        }

        report
    }
}
