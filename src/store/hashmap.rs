use std::collections::HashMap;

use parking_lot::Mutex;

use crate::clock;
use crate::nanos::Nanos;
use crate::store::{ShrinkableQuotaStore, SubjectMap, SubjectState, Sweeper};
use crate::{FixedWindow, RateLimiter};

/// A thread-safe (but not very performant) quota store using a [`HashMap`].
///
/// Every operation holds a single lock over the whole map, so decisions for
/// unrelated keys serialize. Use the
/// [`DashMapQuotaStore`][crate::store::DashMapQuotaStore] for better
/// throughput under contention.
#[derive(Debug, Default)]
pub struct HashMapQuotaStore {
    map: Mutex<HashMap<String, SubjectState>>,
    sweeper: Sweeper,
}

impl HashMapQuotaStore {
    /// Constructs an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl SubjectMap for HashMapQuotaStore {
    fn with_subject<T>(&self, key: &str, f: impl FnOnce(&mut SubjectState) -> T) -> T {
        let mut map = self.map.lock();
        if let Some(state) = map.get_mut(key) {
            return f(state);
        }
        f(map.entry(key.to_owned()).or_default())
    }

    fn read_subject<T>(&self, key: &str, f: impl FnOnce(Option<&SubjectState>) -> T) -> T {
        let map = self.map.lock();
        f(map.get(key))
    }

    fn forget(&self, key: &str) {
        self.map.lock().remove(key);
    }

    fn drop_expired(&self, now: Nanos) {
        self.map.lock().retain(|_, v| !v.is_expired(now));
    }

    fn sweeper(&self) -> &Sweeper {
        &self.sweeper
    }
}

impl ShrinkableQuotaStore for HashMapQuotaStore {
    fn retain_unexpired(&self, now: Nanos) {
        self.drop_expired(now);
    }

    fn shrink_to_fit(&self) {
        self.map.lock().shrink_to_fit();
    }

    fn len(&self) -> usize {
        self.map.lock().len()
    }

    fn is_empty(&self) -> bool {
        self.map.lock().is_empty()
    }
}

/// # Keyed rate limiters - [`HashMap`]-backed
impl<C> RateLimiter<HashMapQuotaStore, C, FixedWindow>
where
    C: clock::Clock,
{
    /// Constructs a new fixed-window rate limiter with a custom clock, backed by a [`HashMap`].
    pub fn hashmap_with_clock(clock: C) -> Self {
        RateLimiter::new(HashMapQuotaStore::new(), clock)
    }
}
