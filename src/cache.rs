//! Time-bounded memoization of expensive builds.
//!
//! Each key owns its own slot lock, so a rebuild of one collection blocks only
//! callers of that collection. A caller arriving during a rebuild waits on the
//! slot and then receives the freshly published value.
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::config::{CollectionConfig, Config};
use crate::error::RagError;
use crate::indexer::collection::{CollectionBuild, load_collection};
use crate::indexer::extract::TextExtractor;
use crate::lexical::Bm25Params;

struct Entry<V> {
    value: Arc<V>,
    built_at: Instant,
}

type Slot<V> = Arc<Mutex<Option<Entry<V>>>>;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Map of `key -> (value, built_at)` with per-key build serialization.
pub struct TtlCache<V> {
    slots: Mutex<HashMap<String, Slot<V>>>,
}

impl<V> Default for TtlCache<V> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }
}

impl<V> TtlCache<V> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: &str) -> Slot<V> {
        let mut slots = lock(&self.slots);
        slots.entry(key.to_string()).or_default().clone()
    }

    /// Return the cached value for `key` if it is younger than `ttl`,
    /// otherwise run `build` and publish its result.
    ///
    /// A failed build leaves the previous entry (if any) in place.
    pub fn get_or_build<F, E>(&self, key: &str, ttl: Duration, build: F) -> Result<Arc<V>, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        let slot = self.slot(key);
        let mut guard = lock(&slot);

        if let Some(entry) = guard.as_ref() {
            if entry.built_at.elapsed() < ttl {
                debug!("cache hit: {key}");
                return Ok(Arc::clone(&entry.value));
            }
            info!("cache entry expired: {key}");
        }

        let value = Arc::new(build()?);
        *guard = Some(Entry {
            value: Arc::clone(&value),
            built_at: Instant::now(),
        });
        Ok(value)
    }

    /// Cached value if present and fresh; never builds.
    pub fn get(&self, key: &str, ttl: Duration) -> Option<Arc<V>> {
        let slot = self.slot(key);
        let guard = lock(&slot);
        guard
            .as_ref()
            .filter(|entry| entry.built_at.elapsed() < ttl)
            .map(|entry| Arc::clone(&entry.value))
    }

    /// Drop every entry. Slots are kept, so a build running during the
    /// clear still serializes later callers of its key.
    pub fn clear(&self) {
        let slots: Vec<Slot<V>> = lock(&self.slots).values().cloned().collect();
        for slot in slots {
            *lock(&slot) = None;
        }
    }
}

/// Per-process cache of collection builds (chunks + BM25 index).
pub struct CollectionCache {
    builds: TtlCache<CollectionBuild>,
    collections: HashMap<String, CollectionConfig>,
    chunk_size: usize,
    bm25: Bm25Params,
    extractor: Arc<dyn TextExtractor>,
}

impl CollectionCache {
    /// Cache over the configured collections, chunk size and BM25 tuning.
    pub fn from_config(config: &Config, extractor: Arc<dyn TextExtractor>) -> Self {
        Self::new(&config.collections, config.chunk_size, extractor).with_bm25(config.bm25)
    }

    pub fn new(
        collections: &[CollectionConfig],
        chunk_size: usize,
        extractor: Arc<dyn TextExtractor>,
    ) -> Self {
        Self {
            builds: TtlCache::new(),
            collections: collections
                .iter()
                .map(|c| (c.name.clone(), c.clone()))
                .collect(),
            chunk_size,
            bm25: Bm25Params::default(),
            extractor,
        }
    }

    #[must_use]
    pub fn with_bm25(mut self, params: Bm25Params) -> Self {
        self.bm25 = params;
        self
    }

    #[must_use]
    pub fn collection(&self, name: &str) -> Option<&CollectionConfig> {
        self.collections.get(name)
    }

    /// Cached build for `name`, rebuilt in full once older than `ttl`.
    ///
    /// Unknown collection names are `IndexUnavailable`; a missing or empty
    /// directory is an empty build, not an error.
    pub fn get_or_build(&self, name: &str, ttl: Duration) -> Result<Arc<CollectionBuild>, RagError> {
        let collection = self
            .collections
            .get(name)
            .ok_or_else(|| RagError::IndexUnavailable(name.to_string()))?;

        self.builds.get_or_build(name, ttl, || {
            load_collection(
                collection,
                self.chunk_size,
                self.bm25,
                self.extractor.as_ref(),
            )
        })
    }

    /// Forget every build; the next retrieval of each collection reloads it.
    pub fn clear(&self) {
        self.builds.clear();
    }
}
