//! Cached episode source implementation
//!
//! This module provides a caching wrapper for episode sources that
//! automatically stores and retrieves episode lists from a local cache.

use super::{EpisodeRecord, EpisodeSource, MetadataRetrievalError, OrderingScheme};
use crate::cache::CacheStorage;
use tracing::debug;

/// A caching wrapper for episode sources
///
/// This source wraps another episode source and caches the results to avoid
/// redundant network requests. The cache is persistent across application
/// runs; its expiry is governed by the TTL of the given `CacheStorage`.
pub struct CachedEpisodeSource<S>
where
    S: EpisodeSource,
{
    /// The underlying episode source
    source: S,
    /// Cache storage for episode lists
    cache: CacheStorage<Vec<EpisodeRecord>>,
}

impl<S> CachedEpisodeSource<S>
where
    S: EpisodeSource,
{
    /// Creates a new cached episode source wrapping the given source
    pub fn new(source: S, cache: CacheStorage<Vec<EpisodeRecord>>) -> Self {
        Self { source, cache }
    }

    fn cache_key(series_id: u64, ordering: OrderingScheme) -> String {
        format!("series_{}_{}", series_id, ordering.api_name())
    }
}

impl<S> EpisodeSource for CachedEpisodeSource<S>
where
    S: EpisodeSource,
{
    fn list_episodes(
        &self,
        series_id: u64,
        ordering: OrderingScheme,
    ) -> Result<Vec<EpisodeRecord>, MetadataRetrievalError> {
        let cache_key = Self::cache_key(series_id, ordering);

        // Cache read errors fall through to the underlying source
        if let Ok(Some(episodes)) = self.cache.load(&cache_key) {
            debug!("using cached {} episodes for series {}", ordering, series_id);
            return Ok(episodes);
        }

        let episodes = self.source.list_episodes(series_id, ordering)?;

        // Store in cache (ignore errors to avoid failing the request)
        let _ = self.cache.store(&cache_key, &episodes);

        Ok(episodes)
    }
}
