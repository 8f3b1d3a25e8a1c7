//! Worker event router
//!
//! The host delivers three kinds of events. Each maps to exactly one
//! component operation:
//!
//! | Event | Handler |
//! |-------|---------|
//! | `Install` | [`LifecycleManager::install`] |
//! | `Activate` | [`LifecycleManager::activate`] |
//! | `Fetch` | [`Dispatcher::handle`] |

use crate::config::Config;
use crate::error::{StowawayError, StowawayResult};
use crate::lifecycle::{
    ActivationReport, ClientRegistry, InstallReport, LifecycleManager, LifecycleState,
    PrecacheManifest,
};
use crate::network::Fetcher;
use crate::request::{resolve, Request};
use crate::store::CacheStore;
use crate::strategy::{Dispatcher, FetchOutcome};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// An event delivered by the host
#[derive(Debug)]
pub enum WorkerEvent {
    Install,
    Activate,
    Fetch(Request),
}

/// Result of handling a [`WorkerEvent`]
#[derive(Debug)]
pub enum EventOutcome {
    Installed(InstallReport),
    Activated(ActivationReport),
    Fetched(FetchOutcome),
}

/// How [`Worker::launch`] brought a worker into service
#[derive(Debug)]
pub enum Startup {
    /// Installed and activated now
    Activated(ActivationReport),
    /// Installed; waits for [`WorkerEvent::Activate`]
    Waiting,
    /// Install failed and the copy left by an earlier run took control
    Resumed(StowawayError),
}

/// One worker version: lifecycle plus request handling
pub struct Worker {
    lifecycle: LifecycleManager,
    dispatcher: Dispatcher,
    clients: ClientRegistry,
    /// Serializes install and activate
    transitions: Mutex<()>,
}

impl Worker {
    /// Assemble a worker from configuration and its two boundaries
    pub fn new(
        config: &Config,
        store: Arc<dyn CacheStore>,
        fetcher: Arc<dyn Fetcher>,
    ) -> StowawayResult<Self> {
        let origin = config.origin()?;
        let manifest = PrecacheManifest::resolve(&origin, &config.precache.manifest)?;
        let offline_page = resolve(&origin, &config.worker.offline_page)?;
        let clients = ClientRegistry::new();

        let lifecycle = LifecycleManager::new(
            config.worker.version.clone(),
            manifest,
            Arc::clone(&store),
            Arc::clone(&fetcher),
            clients.clone(),
        )
        .with_skip_waiting(config.worker.skip_waiting);

        let dispatcher = Dispatcher::new(
            origin,
            config.worker.version.clone(),
            &offline_page,
            store,
            fetcher,
        );

        Ok(Self {
            lifecycle,
            dispatcher,
            clients,
            transitions: Mutex::new(()),
        })
    }

    pub fn lifecycle(&self) -> &LifecycleManager {
        &self.lifecycle
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn clients(&self) -> &ClientRegistry {
        &self.clients
    }

    pub fn version(&self) -> &str {
        self.lifecycle.version()
    }

    /// Route an event to its handler
    pub async fn handle(&self, event: WorkerEvent) -> StowawayResult<EventOutcome> {
        match event {
            WorkerEvent::Install => {
                let _guard = self.transitions.lock().await;
                self.lifecycle.install().await.map(EventOutcome::Installed)
            }
            WorkerEvent::Activate => {
                let _guard = self.transitions.lock().await;
                self.lifecycle.activate().await.map(EventOutcome::Activated)
            }
            WorkerEvent::Fetch(request) => self.fetch(request).await.map(EventOutcome::Fetched),
        }
    }

    /// Handle a request; uncontrolled clients are not intercepted
    pub async fn fetch(&self, request: Request) -> StowawayResult<FetchOutcome> {
        if !self.clients.is_controlled() {
            debug!("No controlling worker yet, passing {} through", request.url);
            return Ok(FetchOutcome::PassThrough(request));
        }
        self.dispatcher.handle(request).await
    }

    /// Install, then activate immediately when skip-waiting is enabled
    ///
    /// Without skip-waiting the worker stays in `waiting` until
    /// [`WorkerEvent::Activate`] is delivered.
    pub async fn start(&self) -> StowawayResult<Option<ActivationReport>> {
        self.handle(WorkerEvent::Install).await?;

        if !self.lifecycle.skip_waiting() {
            return Ok(None);
        }

        match self.handle(WorkerEvent::Activate).await? {
            EventOutcome::Activated(report) => Ok(Some(report)),
            _ => Ok(None),
        }
    }

    /// Take control with the namespace an earlier run installed
    pub async fn resume(&self) -> StowawayResult<()> {
        let _guard = self.transitions.lock().await;
        self.lifecycle.resume().await
    }

    /// Start a worker, keeping an installed version serving when install fails
    ///
    /// A failed install leaves its worker redundant, so a fresh worker over
    /// the same store adopts the existing namespace instead.
    pub async fn launch(
        config: &Config,
        store: Arc<dyn CacheStore>,
        fetcher: Arc<dyn Fetcher>,
    ) -> StowawayResult<(Self, Startup)> {
        let worker = Self::new(config, Arc::clone(&store), Arc::clone(&fetcher))?;

        let error = match worker.start().await {
            Ok(Some(report)) => return Ok((worker, Startup::Activated(report))),
            Ok(None) => return Ok((worker, Startup::Waiting)),
            Err(e) => e,
        };

        let installed = matches!(
            store.namespaces().await,
            Ok(names) if names.contains(&config.worker.version)
        );
        if !installed {
            return Err(error);
        }

        warn!(
            "Install of {} failed, serving the installed copy: {}",
            config.worker.version, error
        );
        let worker = Self::new(config, store, fetcher)?;
        worker.resume().await?;
        Ok((worker, Startup::Resumed(error)))
    }

    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }
}
