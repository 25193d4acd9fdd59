use std::num::NonZeroUsize;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use lru::LruCache;

use crate::PostsPage;
use crate::keys::QueryKey;
use crate::lock::{rw_read, rw_write};

pub const DEFAULT_STALE_TIME: Duration = Duration::from_secs(5);
const DEFAULT_CAPACITY: usize = 64;
const LOCK_TARGET: &str = "postboard_client::cache";

#[derive(Debug, Clone)]
struct CacheEntry {
    page: Arc<PostsPage>,
    fetched_at: Instant,
}

/// Snapshot of a cached page and whether it is still inside the stale window.
#[derive(Debug, Clone)]
pub struct CachedPage {
    pub page: Arc<PostsPage>,
    pub fresh: bool,
}

/// LRU of fetched pages keyed by [`QueryKey`].
pub struct QueryCache {
    entries: RwLock<LruCache<QueryKey, CacheEntry>>,
    stale_time: Duration,
}

impl QueryCache {
    pub fn new(capacity: NonZeroUsize, stale_time: Duration) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(capacity)),
            stale_time,
        }
    }

    pub fn with_stale_time(stale_time: Duration) -> Self {
        Self::new(
            NonZeroUsize::new(DEFAULT_CAPACITY).unwrap_or(NonZeroUsize::MIN),
            stale_time,
        )
    }

    pub fn get(&self, key: &QueryKey) -> Option<CachedPage> {
        let mut entries = rw_write(&self.entries, LOCK_TARGET, "get");
        entries.get(key).map(|entry| CachedPage {
            page: entry.page.clone(),
            fresh: entry.fetched_at.elapsed() < self.stale_time,
        })
    }

    pub fn is_fresh(&self, key: &QueryKey) -> bool {
        let entries = rw_read(&self.entries, LOCK_TARGET, "is_fresh");
        entries
            .peek(key)
            .is_some_and(|entry| entry.fetched_at.elapsed() < self.stale_time)
    }

    pub fn insert(&self, key: QueryKey, page: Arc<PostsPage>) {
        let mut entries = rw_write(&self.entries, LOCK_TARGET, "insert");
        entries.put(
            key,
            CacheEntry {
                page,
                fetched_at: Instant::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        rw_read(&self.entries, LOCK_TARGET, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::with_stale_time(DEFAULT_STALE_TIME)
    }
}
