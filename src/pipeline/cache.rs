use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use super::{SignatureKey, Verdict};

struct CacheEntry {
    verdict: Verdict,
    inserted_at: Instant,
}

/// Bounded, time-expiring verdict store shared by all in-flight requests.
///
/// Entries are evicted least-recently-used on overflow and become invisible
/// once older than the TTL. Callers hold no external lock; a `set` racing a
/// `get` for the same key is benign either way (the loser re-classifies).
pub struct VerdictCache {
    entries: Mutex<LruCache<SignatureKey, CacheEntry>>,
    ttl: Duration,
}

impl VerdictCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    pub fn get(&self, key: &SignatureKey) -> Option<Verdict> {
        let mut entries = self.entries.lock();
        let expired = match entries.get(key) {
            Some(entry) if entry.inserted_at.elapsed() <= self.ttl => {
                return Some(entry.verdict.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.pop(key);
        }
        None
    }

    pub fn set(&self, key: SignatureKey, verdict: Verdict) {
        self.entries.lock().put(
            key,
            CacheEntry {
                verdict,
                inserted_at: Instant::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
