//! Client control
//!
//! Tracks which worker version controls already-open client sessions.
//! Until a version claims them, requests are not intercepted.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

/// Shared record of the controlling version
#[derive(Debug, Clone)]
pub struct ClientRegistry {
    controller: Arc<watch::Sender<Option<String>>>,
}

impl ClientRegistry {
    /// Registry with no controlling version
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            controller: Arc::new(tx),
        }
    }

    /// Take control of all clients for `version`
    pub fn claim(&self, version: &str) {
        let previous = self.controller.send_replace(Some(version.to_string()));
        match previous {
            Some(prev) if prev != version => {
                info!("Clients claimed by {} (was {})", version, prev)
            }
            Some(_) => {}
            None => info!("Clients claimed by {}", version),
        }
    }

    /// Version currently controlling clients
    pub fn controller(&self) -> Option<String> {
        self.controller.borrow().clone()
    }

    pub fn is_controlled(&self) -> bool {
        self.controller.borrow().is_some()
    }
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new()
    }
}
