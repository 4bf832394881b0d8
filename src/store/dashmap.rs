use std::collections::hash_map::RandomState;
use std::fmt;
use std::hash::BuildHasher;

use dashmap::DashMap;

use crate::clock;
use crate::nanos::Nanos;
use crate::store::{ShrinkableQuotaStore, SubjectMap, SubjectState, Sweeper};
use crate::{FixedWindow, RateLimiter};

/// A concurrent, thread-safe and fairly performant quota store based on [`DashMap`].
///
/// Operations on one key hold that key's shard lock for their duration,
/// which is what makes increment-and-check and prune-count-insert atomic.
pub struct DashMapQuotaStore<S = RandomState> {
    map: DashMap<String, SubjectState, S>,
    sweeper: Sweeper,
}

impl DashMapQuotaStore {
    /// Constructs an empty store with the default hasher.
    pub fn new() -> Self {
        Self::default()
    }
}

impl<S: BuildHasher + Clone> DashMapQuotaStore<S> {
    /// Constructs an empty store using `hasher` to hash keys.
    pub fn with_hasher(hasher: S) -> Self {
        DashMapQuotaStore {
            map: DashMap::with_hasher(hasher),
            sweeper: Sweeper::default(),
        }
    }
}

impl<S: BuildHasher + Default + Clone> Default for DashMapQuotaStore<S> {
    fn default() -> Self {
        Self::with_hasher(S::default())
    }
}

impl<S: BuildHasher + Clone> fmt::Debug for DashMapQuotaStore<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DashMapQuotaStore")
            .field("map", &self.map)
            .field("sweeper", &self.sweeper)
            .finish()
    }
}

impl<S: BuildHasher + Clone> SubjectMap for DashMapQuotaStore<S> {
    fn with_subject<T>(&self, key: &str, f: impl FnOnce(&mut SubjectState) -> T) -> T {
        if let Some(mut v) = self.map.get_mut(key) {
            // fast path: update the existing entry
            return f(v.value_mut());
        }
        // make an entry and update that:
        let mut entry = self.map.entry(key.to_owned()).or_default();
        f(entry.value_mut())
    }

    fn read_subject<T>(&self, key: &str, f: impl FnOnce(Option<&SubjectState>) -> T) -> T {
        let entry = self.map.get(key);
        f(entry.as_deref())
    }

    fn forget(&self, key: &str) {
        self.map.remove(key);
    }

    fn drop_expired(&self, now: Nanos) {
        self.map.retain(|_, v| !v.is_expired(now));
    }

    fn sweeper(&self) -> &Sweeper {
        &self.sweeper
    }
}

impl<S: BuildHasher + Clone> ShrinkableQuotaStore for DashMapQuotaStore<S> {
    fn retain_unexpired(&self, now: Nanos) {
        self.drop_expired(now);
    }

    fn shrink_to_fit(&self) {
        self.map.shrink_to_fit();
    }

    fn len(&self) -> usize {
        self.map.len()
    }

    fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// # Keyed rate limiters - [`DashMap`]-backed with a default hasher
impl<C> RateLimiter<DashMapQuotaStore, C, FixedWindow>
where
    C: clock::Clock,
{
    /// Constructs a new fixed-window rate limiter with a custom clock,
    /// backed by a [`DashMap`] with the default hasher.
    pub fn dashmap_with_clock(clock: C) -> Self {
        RateLimiter::new(DashMapQuotaStore::new(), clock)
    }
}

/// # Keyed rate limiters - [`DashMap`]-backed with a custom hasher
impl<S, C> RateLimiter<DashMapQuotaStore<S>, C, FixedWindow>
where
    S: BuildHasher + Default + Clone,
    C: clock::Clock,
{
    /// Constructs a new fixed-window rate limiter with a custom clock and
    /// hasher, backed by a [`DashMap`].
    pub fn dashmap_with_clock_and_hasher(clock: C, hasher: S) -> Self {
        RateLimiter::new(DashMapQuotaStore::with_hasher(hasher), clock)
    }
}
