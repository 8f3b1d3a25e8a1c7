//! Configuration schema for Stowaway
//!
//! Configuration is stored at `~/.config/stowaway/config.toml`, with an
//! optional project-local `stowaway.toml` layered on top.

use crate::error::{StowawayError, StowawayResult};
use crate::request::{parse_url, resolve};
use crate::store::validate_namespace;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Worker identity and lifecycle
    pub worker: WorkerConfig,

    /// Resources that must be cached before activation
    pub precache: PrecacheConfig,

    /// Outbound network settings
    pub network: NetworkConfig,

    /// Cache store settings
    pub store: StoreConfig,

    /// HTTP front settings
    pub server: ServerConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// Worker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Version tag; doubles as the current cache namespace
    pub version: String,

    /// The worker's own origin (scheme://host:port)
    pub origin: String,

    /// Page served to navigations when the network is unreachable
    pub offline_page: String,

    /// Activate right after a successful install instead of waiting
    pub skip_waiting: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            version: "v1".to_string(),
            origin: "http://127.0.0.1:8080".to_string(),
            offline_page: "/offline.html".to_string(),
            skip_waiting: true,
        }
    }
}

/// Precache manifest configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrecacheConfig {
    /// Resource references, resolved against `worker.origin`
    pub manifest: Vec<String>,
}

impl Default for PrecacheConfig {
    fn default() -> Self {
        Self {
            manifest: vec!["/".to_string(), "/offline.html".to_string()],
        }
    }
}

/// Network configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Base URL same-origin requests are forwarded to
    pub upstream: Option<String>,

    /// Per-request timeout in seconds (0 = none)
    pub timeout_secs: u64,

    /// Largest response body read from the network
    pub max_body_bytes: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            upstream: None,
            timeout_secs: 30,
            max_body_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Cache store backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// One directory per namespace on disk
    #[default]
    Disk,
    /// Process memory, lost on exit
    Memory,
}

/// Cache store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Backend to use
    pub backend: StoreBackend,

    /// Root directory for the disk backend
    pub path: Option<PathBuf>,
}

impl StoreConfig {
    /// Effective root directory for the disk backend
    pub fn root(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("stowaway")
        })
    }
}

/// HTTP front configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to listen on
    pub listen: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:8080".to_string(),
        }
    }
}

impl Config {
    /// Parsed worker origin
    pub fn origin(&self) -> StowawayResult<Url> {
        parse_url(&self.worker.origin)
    }

    /// Parsed upstream, if configured
    pub fn upstream(&self) -> StowawayResult<Option<Url>> {
        self.network.upstream.as_deref().map(parse_url).transpose()
    }

    /// Check the values the core depends on
    ///
    /// `path` is only used for error messages.
    pub fn validate(&self, path: &Path) -> StowawayResult<()> {
        let invalid = |reason: String| StowawayError::ConfigInvalid {
            path: path.to_path_buf(),
            reason,
        };

        validate_namespace(&self.worker.version)
            .map_err(|e| invalid(format!("worker.version: {}", e)))?;

        let origin = self
            .origin()
            .map_err(|e| invalid(format!("worker.origin: {}", e)))?;
        if origin.cannot_be_a_base() {
            return Err(invalid(format!(
                "worker.origin: '{}' is not a base URL",
                self.worker.origin
            )));
        }

        self.upstream()
            .map_err(|e| invalid(format!("network.upstream: {}", e)))?;

        if !matches!(self.general.log_format.as_str(), "text" | "json") {
            return Err(invalid(format!(
                "general.log_format: unknown format '{}', expected text or json",
                self.general.log_format
            )));
        }

        resolve(&origin, &self.worker.offline_page)
            .map_err(|e| invalid(format!("worker.offline_page: {}", e)))?;
        for entry in &self.precache.manifest {
            resolve(&origin, entry).map_err(|e| invalid(format!("precache.manifest: {}", e)))?;
        }

        Ok(())
    }

    /// Settings that are valid but probably not what was meant
    ///
    /// Call after [`Config::validate`]; unparsable values are skipped here.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        let Ok(origin) = self.origin() else {
            return warnings;
        };

        let offline = resolve(&origin, &self.worker.offline_page).ok();
        let in_manifest = self
            .precache
            .manifest
            .iter()
            .filter_map(|entry| resolve(&origin, entry).ok())
            .any(|url| Some(url) == offline);
        if !in_manifest {
            warnings.push(format!(
                "Offline page {} is not in the precache manifest; offline navigations will fail",
                self.worker.offline_page
            ));
        }

        if self.proxies_to_itself() {
            warnings.push(format!(
                "worker.origin {} is the listen address and network.upstream is unset; \
                 same-origin requests will loop back into the proxy",
                self.worker.origin
            ));
        }

        warnings
    }

    /// Whether same-origin traffic would be sent back to our own listener
    pub fn proxies_to_itself(&self) -> bool {
        if self.network.upstream.is_some() {
            return false;
        }
        let Ok(origin) = self.origin() else {
            return false;
        };
        let (Some(host), Some(port)) = (origin.host_str(), origin.port_or_known_default()) else {
            return false;
        };

        let normalize = |host: &str| match host {
            "localhost" => "127.0.0.1".to_string(),
            other => other.to_string(),
        };
        let target = format!("{}:{}", normalize(host), port);

        match self.server.listen.rsplit_once(':') {
            Some((listen_host, listen_port)) => {
                format!("{}:{}", normalize(listen_host), listen_port) == target
            }
            None => false,
        }
    }
}
