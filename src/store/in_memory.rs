//! The state kept per subject by the in-memory quota stores.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use smallvec::SmallVec;

use crate::nanos::Nanos;
use crate::store::LogSnapshot;

/// A fixed-window counter: the number of requests seen in the window of
/// length `window` that started at `window_start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowCounter {
    window: Nanos,
    window_start: Nanos,
    count: u64,
    expires_at: Nanos,
}

impl WindowCounter {
    /// The length of the window this counter belongs to.
    pub fn window(&self) -> Nanos {
        self.window
    }

    /// The start of the window this counter belongs to.
    pub fn window_start(&self) -> Nanos {
        self.window_start
    }

    /// The number of requests counted so far.
    pub fn count(&self) -> u64 {
        self.count
    }

    fn is(&self, window: Nanos, window_start: Nanos) -> bool {
        self.window == window && self.window_start == window_start
    }

    fn is_expired(&self, now: Nanos) -> bool {
        self.expires_at <= now
    }
}

/// An ordered log of request timestamps for sliding windows of one length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampLog {
    window: Nanos,
    entries: VecDeque<Nanos>,
    expires_at: Nanos,
}

impl TimestampLog {
    fn new(window: Nanos) -> Self {
        TimestampLog {
            window,
            entries: VecDeque::new(),
            expires_at: Nanos::ZERO,
        }
    }

    fn is_expired(&self, now: Nanos) -> bool {
        self.expires_at <= now
    }

    /// Drops every entry strictly older than `cutoff`.
    fn prune(&mut self, cutoff: Nanos) {
        while self.entries.front().map_or(false, |t| *t < cutoff) {
            self.entries.pop_front();
        }
    }

    fn insert(&mut self, at: Nanos, ttl: Nanos) {
        // Concurrent callers can read their clocks in one order and reach
        // the store in another.
        let pos = self.entries.partition_point(|t| *t <= at);
        self.entries.insert(pos, at);
        self.expires_at = self.expires_at.max(at.saturating_add(ttl));
    }

    /// The window length this log serves.
    pub fn window(&self) -> Nanos {
        self.window
    }

    /// The number of entries in the log.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the log holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The oldest entry in the log.
    pub fn oldest(&self) -> Option<Nanos> {
        self.entries.front().copied()
    }
}

/// Everything an in-memory quota store keeps for one key: the fixed-window
/// counters and the sliding-window timestamp logs that have not expired
/// yet, one of each per window length.
///
/// Expired counters and logs read as absent, and are dropped by the next
/// write to the key.
#[derive(Debug, Clone, Default)]
pub struct SubjectState {
    counters: SmallVec<[WindowCounter; 2]>,
    logs: SmallVec<[TimestampLog; 1]>,
}

impl SubjectState {
    fn drop_expired(&mut self, now: Nanos) {
        self.counters.retain(|c| !c.is_expired(now));
        self.logs.retain(|l| !l.is_expired(now));
    }

    fn log(&self, window: Nanos, now: Nanos) -> Option<&TimestampLog> {
        self.logs
            .iter()
            .find(|l| l.window == window && !l.is_expired(now))
    }

    fn log_mut(&mut self, window: Nanos) -> &mut TimestampLog {
        let pos = match self.logs.iter().position(|l| l.window == window) {
            Some(pos) => pos,
            None => {
                self.logs.push(TimestampLog::new(window));
                self.logs.len() - 1
            }
        };
        &mut self.logs[pos]
    }

    pub(crate) fn increment_and_expire(
        &mut self,
        window: Nanos,
        window_start: Nanos,
        ttl: Nanos,
        now: Nanos,
    ) -> u64 {
        self.drop_expired(now);
        let expires_at = now.saturating_add(ttl);
        match self
            .counters
            .iter_mut()
            .find(|c| c.is(window, window_start))
        {
            Some(counter) => {
                counter.count += 1;
                counter.expires_at = expires_at;
                counter.count
            }
            None => {
                self.counters.push(WindowCounter {
                    window,
                    window_start,
                    count: 1,
                    expires_at,
                });
                1
            }
        }
    }

    pub(crate) fn current_count(&self, window: Nanos, window_start: Nanos, now: Nanos) -> u64 {
        self.counters
            .iter()
            .find(|c| c.is(window, window_start) && !c.is_expired(now))
            .map_or(0, |c| c.count)
    }

    pub(crate) fn prune_and_count(&mut self, window: Nanos, cutoff: Nanos, now: Nanos) -> u64 {
        self.drop_expired(now);
        match self.logs.iter_mut().find(|l| l.window == window) {
            Some(log) => {
                log.prune(cutoff);
                log.len() as u64
            }
            None => 0,
        }
    }

    pub(crate) fn insert_timestamp(&mut self, window: Nanos, at: Nanos, ttl: Nanos) {
        self.drop_expired(at);
        self.log_mut(window).insert(at, ttl);
    }

    pub(crate) fn peek_oldest(&self, window: Nanos, now: Nanos) -> Option<Nanos> {
        self.log(window, now).and_then(TimestampLog::oldest)
    }

    pub(crate) fn prune_count_and_insert(
        &mut self,
        window: Nanos,
        cutoff: Nanos,
        limit: u64,
        at: Nanos,
        ttl: Nanos,
    ) -> LogSnapshot {
        self.drop_expired(at);
        let log = self.log_mut(window);
        log.prune(cutoff);
        let count = log.len() as u64;
        let inserted = count < limit;
        if inserted {
            log.insert(at, ttl);
        }
        LogSnapshot {
            count,
            oldest: log.oldest(),
            inserted,
        }
    }

    /// Returns `true` if neither a counter nor a log is still live at `now`.
    pub fn is_expired(&self, now: Nanos) -> bool {
        self.counters.iter().all(|c| c.is_expired(now)) && self.logs.iter().all(|l| l.is_expired(now))
    }

    /// The fixed-window counters kept for this subject, including expired
    /// ones that have not been dropped yet.
    pub fn counters(&self) -> &[WindowCounter] {
        &self.counters
    }

    /// The sliding-window logs kept for this subject, one per window length.
    pub fn logs(&self) -> &[TimestampLog] {
        &self.logs
    }
}

/// Decides when an in-memory store drops its expired keys.
///
/// Stores consult the sweeper on every write. It asks for a sweep at most
/// once per `ttl` of the writes it sees, so a key that expired is removed
/// no later than one such period after its expiry, as long as the store is
/// written to at all.
#[derive(Debug, Default)]
pub struct Sweeper {
    next: AtomicU64,
}

impl Sweeper {
    /// Returns `true` if the caller should sweep expired keys now. Only
    /// one of several concurrent callers is told to.
    pub(crate) fn due(&self, now: Nanos, ttl: Nanos) -> bool {
        let next = self.next.load(Ordering::Acquire);
        if now.as_u64() < next {
            return false;
        }
        self.next
            .compare_exchange(
                next,
                now.saturating_add(ttl).as_u64(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }
}
