//! Network-first executor for navigations

use super::{Served, Source};
use crate::error::{StowawayError, StowawayResult};
use crate::network::Fetcher;
use crate::request::{Request, RequestKey};
use crate::store::CacheHandle;
use tracing::{debug, warn};

/// Fetch first; on network failure serve the offline page
///
/// Only 2xx responses are written back. The fallback is always the
/// offline page, never a cached copy of the requested URL, and is only
/// used when no response arrived at all.
pub async fn serve(
    cache: &dyn CacheHandle,
    fetcher: &dyn Fetcher,
    request: &Request,
    offline: &RequestKey,
) -> StowawayResult<Served> {
    let key = request.key();

    let error = match fetcher.fetch(request).await {
        Ok(response) => {
            if response.is_success() {
                if let Err(e) = cache.put(&key, &response).await {
                    warn!("Failed to cache {} in {}: {}", key, cache.namespace(), e);
                }
            } else {
                debug!("Not caching {} (status {})", key, response.status);
            }
            return Ok(Served {
                response,
                source: Source::Network,
            });
        }
        // Only a missing response falls back; an oversized body propagates
        Err(e) if !e.is_network() => return Err(e),
        Err(e) => e,
    };

    debug!("Network failed for {}, serving {}: {}", key, offline.url, error);

    let fallback = match cache.get(offline).await {
        Ok(found) => found,
        Err(e) => {
            warn!("Cache read failed for {}: {}", offline, e);
            None
        }
    };

    fallback
        .map(|response| Served {
            response,
            source: Source::Offline,
        })
        .ok_or_else(|| StowawayError::OfflineFallbackMissing {
            page: offline.url.clone(),
            reason: error.to_string(),
        })
}
