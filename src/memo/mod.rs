//! Memoization for repeat computation within a single page view.
//!
//! Entries live for the lifetime of the process and are never invalidated:
//! match identity, rosters, and ratings are immutable while a match room is
//! open, so a cached value can never go stale. The cache is a
//! correctness-preserving optimization only: removing it repeats work but
//! changes no output.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::models::{NicknameMap, RatingChangeEstimate, RoomId};

/// A map-backed memo cache with a computation counter.
///
/// Completed values are stored, not in-flight futures; two callers racing on
/// the same missing key both compute, which is duplicate work but never a
/// correctness issue.
pub struct MemoCache<K, V> {
    entries: Mutex<HashMap<K, V>>,
    computations: AtomicU64,
}

impl<K, V> MemoCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            computations: AtomicU64::new(0),
        }
    }

    /// Return the cached value for `key`, computing and storing it on a miss.
    pub fn get_or_insert_with<F>(&self, key: K, compute: F) -> V
    where
        F: FnOnce() -> V,
    {
        if let Some(hit) = self.get(&key) {
            return hit;
        }

        self.computations.fetch_add(1, Ordering::Relaxed);
        let value = compute();
        self.entries
            .lock()
            .expect("memo cache mutex poisoned")
            .entry(key)
            .or_insert(value)
            .clone()
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.entries
            .lock()
            .expect("memo cache mutex poisoned")
            .get(key)
            .cloned()
    }

    /// How many times a value was actually computed (cache misses).
    /// Test probe for the "repeat calls skip recomputation" contract.
    pub fn computations(&self) -> u64 {
        self.computations.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .expect("memo cache mutex poisoned")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, V> Default for MemoCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

/// The caches one pipeline instance carries for its page view.
#[derive(Default)]
pub struct PipelineCaches {
    /// Nickname → participant map, keyed by room.
    pub nickname_maps: MemoCache<RoomId, NicknameMap>,

    /// Heuristic estimates, keyed by (own average, opponent average).
    pub estimates: MemoCache<(i64, i64), RatingChangeEstimate>,
}

impl PipelineCaches {
    pub fn new() -> Self {
        Self::default()
    }
}
