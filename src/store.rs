//! Quota stores: where rate limiters keep their counters and logs.
//!
//! A quota store owns all rate-limiting state. Rate limiters never cache a
//! count between calls; every decision re-reads (and updates) the store in a
//! single atomic operation, so concurrent callers sharing a key can not both
//! take the last slot of a window.
//!
//! The two write paths rate limiters rely on are:
//!
//! * [`QuotaStore::increment_and_expire`] for fixed windows, and
//! * [`QuotaStore::prune_count_and_insert`] for sliding window logs.
//!
//! Both must be indivisible: an implementation backed by a remote service
//! would run them as a transaction or a server-side script. The in-memory
//! stores in this module hold a per-key lock for their duration.
//!
//! Fixed-window counters and sliding-window logs are kept per window
//! length: quotas with different windows checked against the same key
//! never see each other's state.
//!
//! Expiry is the only garbage collection mechanism: every write refreshes
//! the expiry of what it touched, and expired state reads as absent. The
//! in-memory stores also remove expired keys as they go, so a store that
//! keeps being written to stays bounded by the keys active within one
//! expiry period.

use crate::errors::StoreUnavailable;
use crate::nanos::Nanos;

pub mod in_memory;
pub use in_memory::{SubjectState, Sweeper};

mod hashmap;
pub use hashmap::HashMapQuotaStore;

#[cfg(feature = "dashmap")]
mod dashmap;
#[cfg(feature = "dashmap")]
pub use self::dashmap::DashMapQuotaStore;

/// The outcome of an atomic prune-count-insert operation on a timestamp log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogSnapshot {
    /// Number of entries that survived pruning, not counting an insertion
    /// made by this operation.
    pub count: u64,

    /// The oldest entry in the log after the operation completed.
    pub oldest: Option<Nanos>,

    /// Whether the operation recorded a new entry.
    pub inserted: bool,
}

/// A way for rate limiters to keep state.
///
/// Keys are opaque strings identifying the subject being limited, such as
/// `"user:42"` or `"endpoint:search:user:42"`. All times are offsets from the
/// epoch of the rate limiter's [`Clock`][crate::clock::Clock].
///
/// Every method is fallible: a store that lives across a network can time
/// out or go away, and that must be reported distinctly from any
/// rate-limiting decision.
pub trait QuotaStore {
    /// Atomically increments the counter for `(key, window, window_start)`
    /// and sets its expiry to `now + ttl`, returning the count after
    /// incrementing.
    ///
    /// The increment and the expiry update must happen in one step, or a
    /// counter could be left behind that never expires.
    fn increment_and_expire(
        &self,
        key: &str,
        window: Nanos,
        window_start: Nanos,
        ttl: Nanos,
        now: Nanos,
    ) -> Result<u64, StoreUnavailable>;

    /// Returns the count for `(key, window, window_start)` without changing it.
    fn current_count(
        &self,
        key: &str,
        window: Nanos,
        window_start: Nanos,
        now: Nanos,
    ) -> Result<u64, StoreUnavailable>;

    /// Removes all entries of the `window`-length timestamp log at `key`
    /// that are strictly older than `cutoff`, and returns the number of
    /// entries remaining.
    fn prune_and_count(
        &self,
        key: &str,
        window: Nanos,
        cutoff: Nanos,
        now: Nanos,
    ) -> Result<u64, StoreUnavailable>;

    /// Records `at` in the `window`-length timestamp log at `key` and sets
    /// the log's expiry to `at + ttl`.
    fn insert_timestamp(
        &self,
        key: &str,
        window: Nanos,
        at: Nanos,
        ttl: Nanos,
    ) -> Result<(), StoreUnavailable>;

    /// Returns the oldest entry of the `window`-length timestamp log at
    /// `key`, if any.
    fn peek_oldest(&self, key: &str, window: Nanos, now: Nanos)
        -> Result<Option<Nanos>, StoreUnavailable>;

    /// Atomically prunes the `window`-length timestamp log at `key` (as
    /// [`prune_and_count`](QuotaStore::prune_and_count)), counts the
    /// surviving entries and, if fewer than `limit` remain, records `at` with
    /// an expiry of `at + ttl`.
    fn prune_count_and_insert(
        &self,
        key: &str,
        window: Nanos,
        cutoff: Nanos,
        limit: u64,
        at: Nanos,
        ttl: Nanos,
    ) -> Result<LogSnapshot, StoreUnavailable>;

    /// Forgets all counters and timestamp logs for `key`.
    fn reset(&self, key: &str) -> Result<(), StoreUnavailable>;
}

/// A quota store that can drop expired state on request.
///
/// Expired state is already invisible to rate limiting decisions; this
/// trait only allows reclaiming the memory it occupies.
pub trait ShrinkableQuotaStore: QuotaStore {
    /// Removes every key whose counters and log have all expired at `now`.
    fn retain_unexpired(&self, now: Nanos);

    /// Shrinks the capacity of the store, if possible.
    fn shrink_to_fit(&self);

    /// Returns the number of keys in the store.
    fn len(&self) -> usize;

    /// Returns `true` if the store contains no keys.
    fn is_empty(&self) -> bool;
}

/// Per-key access to in-memory [`SubjectState`]s.
///
/// Every `SubjectMap` is a [`QuotaStore`]: the store operations are
/// implemented on [`SubjectState`] and only need a way to lock one key.
/// After each write, the store asks its [`Sweeper`] whether expired keys
/// are due to be dropped.
pub trait SubjectMap {
    /// Runs `f` on the state for `key`, creating it if necessary.
    ///
    /// Implementations must guarantee that no other caller can observe or
    /// modify the same key's state while `f` runs.
    fn with_subject<T>(&self, key: &str, f: impl FnOnce(&mut SubjectState) -> T) -> T;

    /// Runs `f` on the state for `key`, if there is one, without creating it.
    fn read_subject<T>(&self, key: &str, f: impl FnOnce(Option<&SubjectState>) -> T) -> T;

    /// Drops the state for `key`.
    fn forget(&self, key: &str);

    /// Drops every key whose state has expired at `now`.
    ///
    /// Called without any key's state being held.
    fn drop_expired(&self, now: Nanos);

    /// The schedule on which this map drops expired keys.
    fn sweeper(&self) -> &Sweeper;

    /// Drops expired keys if a sweep is due. `ttl` is the expiry period of
    /// the write that just happened.
    fn sweep_if_due(&self, now: Nanos, ttl: Nanos) {
        if self.sweeper().due(now, ttl) {
            self.drop_expired(now);
        }
    }
}

impl<M: SubjectMap> QuotaStore for M {
    fn increment_and_expire(
        &self,
        key: &str,
        window: Nanos,
        window_start: Nanos,
        ttl: Nanos,
        now: Nanos,
    ) -> Result<u64, StoreUnavailable> {
        let count = self.with_subject(key, |s| s.increment_and_expire(window, window_start, ttl, now));
        self.sweep_if_due(now, ttl);
        Ok(count)
    }

    fn current_count(
        &self,
        key: &str,
        window: Nanos,
        window_start: Nanos,
        now: Nanos,
    ) -> Result<u64, StoreUnavailable> {
        Ok(self.read_subject(key, |s| {
            s.map_or(0, |s| s.current_count(window, window_start, now))
        }))
    }

    fn prune_and_count(
        &self,
        key: &str,
        window: Nanos,
        cutoff: Nanos,
        now: Nanos,
    ) -> Result<u64, StoreUnavailable> {
        Ok(self.with_subject(key, |s| s.prune_and_count(window, cutoff, now)))
    }

    fn insert_timestamp(
        &self,
        key: &str,
        window: Nanos,
        at: Nanos,
        ttl: Nanos,
    ) -> Result<(), StoreUnavailable> {
        self.with_subject(key, |s| s.insert_timestamp(window, at, ttl));
        self.sweep_if_due(at, ttl);
        Ok(())
    }

    fn peek_oldest(
        &self,
        key: &str,
        window: Nanos,
        now: Nanos,
    ) -> Result<Option<Nanos>, StoreUnavailable> {
        Ok(self.read_subject(key, |s| s.and_then(|s| s.peek_oldest(window, now))))
    }

    fn prune_count_and_insert(
        &self,
        key: &str,
        window: Nanos,
        cutoff: Nanos,
        limit: u64,
        at: Nanos,
        ttl: Nanos,
    ) -> Result<LogSnapshot, StoreUnavailable> {
        let snapshot = self.with_subject(key, |s| s.prune_count_and_insert(window, cutoff, limit, at, ttl));
        self.sweep_if_due(at, ttl);
        Ok(snapshot)
    }

    fn reset(&self, key: &str) -> Result<(), StoreUnavailable> {
        self.forget(key);
        Ok(())
    }
}
