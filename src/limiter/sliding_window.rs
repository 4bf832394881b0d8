use crate::errors::StoreUnavailable;
use crate::limiter::{Algorithm, RateLimitResult};
use crate::nanos::Nanos;
use crate::store::QuotaStore;
use crate::Quota;

/// Keeps a log of admitted request times and counts the ones younger than
/// one window.
///
/// A logged request counts against the quota until it is exactly one window
/// old; at that instant it is pruned. Only admitted requests are logged, so
/// a subject that keeps retrying while denied does not push its own
/// recovery further out. A denied caller is told to retry when the oldest
/// logged request slides out of the window.
///
/// The sliding window enforces the limit over every window-length interval,
/// at the cost of storing up to `limit` timestamps per key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SlidingWindow;

impl SlidingWindow {
    /// Entries older than the returned cutoff are pruned. An entry sitting
    /// exactly one window before `now` is older than the cutoff.
    fn cutoff(quota: &Quota, now: Nanos) -> Nanos {
        (now + Nanos::new(1)).saturating_sub(quota.window_nanos())
    }

    fn denied(quota: &Quota, oldest: Option<Nanos>, now: Nanos) -> RateLimitResult<Nanos> {
        let window = quota.window_nanos();
        let retry_after = oldest.map_or(window, |oldest| oldest.saturating_add(window).saturating_sub(now));
        if retry_after == Nanos::ZERO {
            // An entry can only be this old if the clock moved backwards
            // between the prune and this computation.
            return RateLimitResult::denied(*quota, now, window);
        }
        RateLimitResult::denied(*quota, now, retry_after)
    }
}

impl Algorithm for SlidingWindow {
    const NAME: &'static str = "sliding_window";

    fn decide<S: QuotaStore>(
        store: &S,
        key: &str,
        quota: &Quota,
        now: Nanos,
    ) -> Result<RateLimitResult<Nanos>, StoreUnavailable> {
        let limit = u64::from(quota.limit().get());
        let cutoff = Self::cutoff(quota, now);
        let snapshot = store.prune_count_and_insert(
            key,
            quota.window_nanos(),
            cutoff,
            limit,
            now,
            quota.ttl().into(),
        )?;
        tracing::trace!(
            key,
            count = snapshot.count,
            limit,
            allowed = snapshot.inserted,
            "sliding window decision"
        );
        if !snapshot.inserted {
            return Ok(Self::denied(quota, snapshot.oldest, now));
        }
        let oldest = snapshot.oldest.unwrap_or(now);
        Ok(RateLimitResult::allowed(
            *quota,
            limit.saturating_sub(snapshot.count).saturating_sub(1),
            now,
            oldest.saturating_add(quota.window_nanos()),
        ))
    }

    fn peek<S: QuotaStore>(
        store: &S,
        key: &str,
        quota: &Quota,
        now: Nanos,
    ) -> Result<RateLimitResult<Nanos>, StoreUnavailable> {
        let limit = u64::from(quota.limit().get());
        let window = quota.window_nanos();
        let count = store.prune_and_count(key, window, Self::cutoff(quota, now), now)?;
        let oldest = store.peek_oldest(key, window, now)?;
        if count >= limit {
            return Ok(Self::denied(quota, oldest, now));
        }
        Ok(RateLimitResult::allowed(
            *quota,
            limit.saturating_sub(count).saturating_sub(1),
            now,
            oldest.unwrap_or(now).saturating_add(window),
        ))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::store::{HashMapQuotaStore, LogSnapshot};
    use nonzero_ext::nonzero;
    use std::time::Duration;

    fn secs(s: u64) -> Nanos {
        Nanos::new(s * 1_000_000_000)
    }

    #[test]
    fn admits_up_to_limit_then_denies() {
        let store = HashMapQuotaStore::default();
        let quota = Quota::per_minute(nonzero!(3u32));

        for (i, t) in [0, 10, 20].into_iter().enumerate() {
            let r = SlidingWindow::decide(&store, "k", &quota, secs(t)).unwrap();
            assert!(r.is_allowed());
            assert_eq!(r.remaining(), 2 - i as u32);
            assert_eq!(r.reset_at(), secs(60));
        }

        let denied = SlidingWindow::decide(&store, "k", &quota, secs(30)).unwrap();
        assert!(!denied.is_allowed());
        assert_eq!(denied.retry_after(), Some(Duration::from_secs(30)));
        assert_eq!(denied.reset_at(), secs(60));
    }

    #[test]
    fn entry_exactly_one_window_old_is_pruned() {
        let store = HashMapQuotaStore::default();
        let quota = Quota::per_minute(nonzero!(1u32));
        assert!(SlidingWindow::decide(&store, "k", &quota, secs(0)).unwrap().is_allowed());

        let almost = secs(60) - Nanos::new(1);
        let denied = SlidingWindow::decide(&store, "k", &quota, almost).unwrap();
        assert!(!denied.is_allowed());
        assert_eq!(denied.retry_after(), Some(Duration::from_nanos(1)));

        let r = SlidingWindow::decide(&store, "k", &quota, secs(60)).unwrap();
        assert!(r.is_allowed());
        assert_eq!(r.reset_at(), secs(120));
    }

    #[test]
    fn denied_requests_are_not_logged() {
        let store = HashMapQuotaStore::default();
        let quota = Quota::per_minute(nonzero!(1u32));
        SlidingWindow::decide(&store, "k", &quota, secs(0)).unwrap();
        for t in 1..10 {
            assert!(!SlidingWindow::decide(&store, "k", &quota, secs(t)).unwrap().is_allowed());
        }
        assert_eq!(store.prune_and_count("k", secs(60), Nanos::ZERO, secs(10)), Ok(1));
    }

    #[test]
    fn peek_does_not_log() {
        let store = HashMapQuotaStore::default();
        let quota = Quota::per_minute(nonzero!(2u32));
        SlidingWindow::decide(&store, "k", &quota, secs(5)).unwrap();

        let peeked = SlidingWindow::peek(&store, "k", &quota, secs(6)).unwrap();
        assert!(peeked.is_allowed());
        assert_eq!(peeked.remaining(), 0);
        assert_eq!(peeked.reset_at(), secs(65));
        assert_eq!(store.peek_oldest("k", secs(60), secs(6)), Ok(Some(secs(5))));
        assert_eq!(store.prune_and_count("k", secs(60), Nanos::ZERO, secs(6)), Ok(1));
    }

    #[test]
    fn windows_of_different_lengths_keep_separate_logs() {
        let store = HashMapQuotaStore::default();
        let minute = Quota::per_minute(nonzero!(1u32));
        let two_minutes = Quota::with_window(nonzero!(1u32), Duration::from_secs(120)).unwrap();

        assert!(SlidingWindow::decide(&store, "k", &two_minutes, secs(0)).unwrap().is_allowed());
        assert!(SlidingWindow::decide(&store, "k", &minute, secs(0)).unwrap().is_allowed());
        // The one-minute log forgets the request at 0s; the two-minute one must not:
        assert!(SlidingWindow::decide(&store, "k", &minute, secs(90)).unwrap().is_allowed());
        let denied = SlidingWindow::decide(&store, "k", &two_minutes, secs(90)).unwrap();
        assert!(!denied.is_allowed());
        assert_eq!(denied.retry_after(), Some(Duration::from_secs(30)));
    }

    /// A store that reports a fixed log snapshot no matter what it is asked.
    #[derive(Debug)]
    struct Misreporting {
        count: u64,
        inserted: bool,
    }

    impl QuotaStore for Misreporting {
        fn increment_and_expire(&self, _: &str, _: Nanos, _: Nanos, _: Nanos, _: Nanos) -> Result<u64, StoreUnavailable> {
            unimplemented!()
        }

        fn current_count(&self, _: &str, _: Nanos, _: Nanos, _: Nanos) -> Result<u64, StoreUnavailable> {
            unimplemented!()
        }

        fn prune_and_count(&self, _: &str, _: Nanos, _: Nanos, _: Nanos) -> Result<u64, StoreUnavailable> {
            Ok(self.count)
        }

        fn insert_timestamp(&self, _: &str, _: Nanos, _: Nanos, _: Nanos) -> Result<(), StoreUnavailable> {
            unimplemented!()
        }

        fn peek_oldest(&self, _: &str, _: Nanos, _: Nanos) -> Result<Option<Nanos>, StoreUnavailable> {
            Ok(None)
        }

        fn prune_count_and_insert(
            &self,
            _: &str,
            _: Nanos,
            _: Nanos,
            _: u64,
            _: Nanos,
            _: Nanos,
        ) -> Result<LogSnapshot, StoreUnavailable> {
            Ok(LogSnapshot {
                count: self.count,
                oldest: None,
                inserted: self.inserted,
            })
        }

        fn reset(&self, _: &str) -> Result<(), StoreUnavailable> {
            Ok(())
        }
    }

    #[test]
    fn empty_log_denial_waits_one_window() {
        let store = Misreporting {
            count: 5,
            inserted: false,
        };
        let quota = Quota::per_minute(nonzero!(5u32));
        let r = SlidingWindow::decide(&store, "k", &quota, secs(1)).unwrap();
        assert!(!r.is_allowed());
        assert_eq!(r.retry_after(), Some(Duration::from_secs(60)));
        let r = SlidingWindow::peek(&store, "k", &quota, secs(1)).unwrap();
        assert_eq!(r.retry_after_secs(), Some(60));
    }

    #[test]
    fn overfull_insertion_reports_nothing_remaining() {
        let store = Misreporting {
            count: 7,
            inserted: true,
        };
        let quota = Quota::per_minute(nonzero!(5u32));
        let r = SlidingWindow::decide(&store, "k", &quota, secs(1)).unwrap();
        assert!(r.is_allowed());
        assert_eq!(r.remaining(), 0);
        assert_eq!(r.reset_at(), secs(61));
    }
}
