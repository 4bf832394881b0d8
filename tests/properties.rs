use std::num::NonZeroU32;
use std::time::Duration;

use proptest::prelude::*;
use ratewindow::{
    clock::{Clock, FakeRelativeClock},
    store::HashMapQuotaStore,
    Algorithm, FixedWindow, Quota, RateLimiter, SlidingWindow,
};

#[derive(Debug)]
struct Count(NonZeroU32);
impl Arbitrary for Count {
    type Parameters = ();
    fn arbitrary_with(_args: ()) -> Self::Strategy {
        (1..50u32)
            .prop_map(|x| Count(NonZeroU32::new(x).unwrap()))
            .boxed()
    }

    type Strategy = BoxedStrategy<Count>;
}

/// Replays requests at the given millisecond gaps and returns the times
/// (in ms since the epoch) at which requests were admitted.
fn replay<A: Algorithm>(quota: &Quota, gaps: &[u64]) -> Vec<u64> {
    let clock = FakeRelativeClock::default();
    let lim: RateLimiter<HashMapQuotaStore, _, A> =
        RateLimiter::new(HashMapQuotaStore::default(), clock.clone());
    let limit = quota.limit().get();
    let mut admitted = vec![];
    for gap in gaps {
        clock.advance(Duration::from_millis(*gap));
        let r = lim.evaluate("user:1", quota).unwrap();
        assert!(r.reset_at() > r.decided_at());
        if r.is_allowed() {
            assert!(r.remaining() < limit);
            assert_eq!(r.retry_after(), None);
            admitted.push(u64::from(clock.elapsed()) / 1_000_000);
        } else {
            assert_eq!(r.remaining(), 0);
            assert!(r.retry_after().unwrap() > Duration::ZERO);
            assert_eq!(r.retry_after(), Some(r.time_to_reset()));
        }
    }
    admitted
}

#[test]
fn results_are_well_formed() {
    proptest!(ProptestConfig::default(), |(limit in 1..50u64, window_secs in 1..120u64, gaps in prop::collection::vec(0..5_000u64, 1..200))| {
        let quota = Quota::new(limit, window_secs).unwrap();
        replay::<FixedWindow>(&quota, &gaps);
        replay::<SlidingWindow>(&quota, &gaps);
    })
}

#[test]
fn fixed_windows_never_admit_more_than_the_limit() {
    proptest!(ProptestConfig::default(), |(limit in 1..50u64, window_secs in 1..120u64, gaps in prop::collection::vec(0..5_000u64, 1..200))| {
        let quota = Quota::new(limit, window_secs).unwrap();
        let window_ms = window_secs * 1000;
        let admitted = replay::<FixedWindow>(&quota, &gaps);
        let mut per_window = std::collections::HashMap::new();
        for t in admitted {
            *per_window.entry(t / window_ms).or_insert(0u64) += 1;
        }
        prop_assert!(per_window.values().all(|n| *n <= limit));
    })
}

#[test]
fn sliding_windows_never_admit_more_than_the_limit() {
    proptest!(ProptestConfig::default(), |(limit in 1..50u64, window_secs in 1..120u64, gaps in prop::collection::vec(0..5_000u64, 1..200))| {
        let quota = Quota::new(limit, window_secs).unwrap();
        let window_ms = window_secs * 1000;
        let admitted = replay::<SlidingWindow>(&quota, &gaps);
        let limit = limit as usize;
        // Any `limit + 1` consecutive admissions span at least one window.
        for w in admitted.windows(limit + 1) {
            prop_assert!(w[limit] - w[0] >= window_ms);
        }
    })
}

#[test]
fn the_request_after_the_limit_is_denied() {
    proptest!(ProptestConfig::default(), |(limit: Count)| {
        let clock = FakeRelativeClock::default();
        let lim = RateLimiter::hashmap_with_clock(clock);
        let quota = Quota::per_hour(limit.0);
        for _ in 0..limit.0.get() {
            prop_assert!(lim.check("user:1", &quota).unwrap().is_ok());
        }
        prop_assert!(lim.check("user:1", &quota).unwrap().is_err());
    })
}
