//! Cache-first executor for static assets

use super::{Served, Source};
use crate::error::StowawayResult;
use crate::network::Fetcher;
use crate::request::Request;
use crate::store::CacheHandle;
use tracing::{debug, warn};

/// Serve from cache; on a miss fetch, storing only 2xx responses
///
/// A network failure on a miss propagates: there is no fallback for assets.
pub async fn serve(
    cache: &dyn CacheHandle,
    fetcher: &dyn Fetcher,
    request: &Request,
) -> StowawayResult<Served> {
    let key = request.key();

    match cache.get(&key).await {
        Ok(Some(response)) => {
            debug!("Cache hit: {}", key);
            return Ok(Served {
                response,
                source: Source::Cache,
            });
        }
        Ok(None) => debug!("Cache miss: {}", key),
        Err(e) => warn!("Cache read failed for {}, treating as miss: {}", key, e),
    }

    let response = fetcher.fetch(request).await?;

    if response.is_success() {
        if let Err(e) = cache.put(&key, &response).await {
            warn!("Failed to cache {} in {}: {}", key, cache.namespace(), e);
        }
    } else {
        debug!("Not caching {} (status {})", key, response.status);
    }

    Ok(Served {
        response,
        source: Source::Network,
    })
}
