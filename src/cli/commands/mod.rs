//! CLI command implementations

pub mod activate;
pub mod cache;
pub mod config;
pub mod fetch;
pub mod install;
pub mod serve;

pub use activate::execute as activate;
pub use cache::execute as cache;
pub use config::execute as config;
pub use fetch::execute as fetch;
pub use install::execute as install;
pub use serve::execute as serve;

use crate::config::Config;
use crate::error::StowawayResult;
use crate::network::{Fetcher, HttpFetcher};
use crate::store::CacheStore;
use crate::worker::Worker;
use std::sync::Arc;

/// Assemble a worker over `store` and the real network
///
/// The fetcher is returned alongside so pass-through traffic uses the
/// same agent.
fn build_worker(
    config: &Config,
    store: Arc<dyn CacheStore>,
) -> StowawayResult<(Arc<Worker>, Arc<dyn Fetcher>)> {
    let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::from_config(config)?);
    let worker = Worker::new(config, store, Arc::clone(&fetcher))?;
    Ok((Arc::new(worker), fetcher))
}
