//! Time sources for rate limiters.
//!
//! The time sources contained in this module allow the rate limiter
//! to align its windows to a well-known epoch, and additionally
//! allow mocking the passage of time.
//!
//! Every rate-limiting decision reads its clock exactly once: window
//! alignment, log pruning, insertion and the `reset_at` / `retry_after`
//! metadata are all computed from that single measurement.

use std::fmt::Debug;
use std::ops::Add;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::nanos::Nanos;

/// A measurement from a clock.
pub trait Reference:
    Sized + Add<Nanos, Output = Self> + PartialEq + Eq + Ord + Copy + Clone + Send + Sync + Debug
{
    /// Determines the time that separates two measurements of a
    /// clock. Implementations of this must perform a saturating
    /// subtraction - if the `earlier` timestamp should be later,
    /// `duration_since` must return the zero duration.
    fn duration_since(&self, earlier: Self) -> Nanos;
}

/// A time source used by rate limiters.
pub trait Clock: Clone {
    /// A measurement of a monotonically increasing clock.
    type Instant: Reference;

    /// Returns a measurement of the clock.
    fn now(&self) -> Self::Instant;

    /// Returns the reference point that fixed windows are aligned to.
    ///
    /// Rate limiters that share a quota store must agree on this value,
    /// or their windows will not line up. The [`SystemClock`] uses the
    /// Unix epoch for exactly that reason.
    fn epoch(&self) -> Self::Instant;

    /// Returns the current time as an offset from [`Clock::epoch`].
    fn elapsed(&self) -> Nanos {
        self.now().duration_since(self.epoch())
    }
}

/// A clock that returns times that correspond to real time.
///
/// Only clocks implementing this trait can be used to wait on a rate
/// limiter asynchronously: waiting on a fake clock would sleep in real
/// time without that clock ever advancing.
pub trait ReasonablyRealtime: Clock {
    /// Returns the amount of real time between `earlier` and now.
    fn wait_time_from(&self, earlier: Self::Instant) -> Duration {
        self.now().duration_since(earlier).into()
    }
}

impl Reference for Duration {
    fn duration_since(&self, earlier: Self) -> Nanos {
        self.checked_sub(earlier)
            .unwrap_or_else(|| Duration::new(0, 0))
            .into()
    }
}

impl Add<Nanos> for Duration {
    type Output = Self;

    fn add(self, other: Nanos) -> Self {
        let other: Duration = other.into();
        self + other
    }
}

impl Reference for Nanos {
    fn duration_since(&self, earlier: Self) -> Nanos {
        Nanos::duration_since(self, earlier)
    }
}

/// A mock implementation of a clock. All it does is keep track of
/// what "now" is (relative to some point meaningful to the program),
/// and returns that.
///
/// Its epoch is the zero point, so a freshly constructed clock sits
/// exactly on a window boundary for every window length.
///
/// # Thread safety
/// The mock time is represented as an atomic u64 count of nanoseconds, behind an [`Arc`].
/// Clones of this clock will all show the same time, even if the original advances.
#[derive(Debug, Clone, Default)]
pub struct FakeRelativeClock {
    now: Arc<AtomicU64>,
}

impl FakeRelativeClock {
    /// Advances the fake clock by the given amount.
    pub fn advance(&self, by: Duration) {
        let by: u64 = Nanos::from(by).into();
        self.now.fetch_add(by, Ordering::AcqRel);
    }
}

impl PartialEq for FakeRelativeClock {
    fn eq(&self, other: &Self) -> bool {
        self.now.load(Ordering::Relaxed) == other.now.load(Ordering::Relaxed)
    }
}

impl Clock for FakeRelativeClock {
    type Instant = Nanos;

    fn now(&self) -> Self::Instant {
        self.now.load(Ordering::Relaxed).into()
    }

    fn epoch(&self) -> Self::Instant {
        Nanos::ZERO
    }
}

mod with_std;
pub use with_std::*;

#[cfg(feature = "quanta")]
mod quanta;
#[cfg(feature = "quanta")]
pub use self::quanta::*;

/// The default clock: wall-clock time, aligned to the Unix epoch.
pub type DefaultClock = SystemClock;

#[cfg(test)]
mod test {
    use super::*;
    use std::iter::repeat;
    use std::thread;

    #[test]
    fn fake_clock_parallel_advances() {
        let clock = Arc::new(FakeRelativeClock::default());
        let threads = repeat(())
            .take(10)
            .map(move |_| {
                let clock = Arc::clone(&clock);
                thread::spawn(move || {
                    for _ in 0..100_000 {
                        let now = clock.now();
                        clock.advance(Duration::from_nanos(1));
                        assert!(clock.now() > now);
                    }
                })
            })
            .collect::<Vec<_>>();
        for t in threads {
            t.join().unwrap();
        }
    }

    #[test]
    fn fake_clock_impls_coverage() {
        let one = FakeRelativeClock::default();
        let two = FakeRelativeClock::default();
        assert_eq!(one, two);
        one.advance(Duration::from_secs(61));
        assert_ne!(one, two);
        assert_eq!(one.elapsed(), Nanos::from(Duration::from_secs(61)));
        assert_eq!(two.epoch(), Nanos::ZERO);
    }

    #[test]
    fn duration_reference() {
        let d = Duration::from_secs(2);
        assert_eq!(Reference::duration_since(&d, Duration::from_secs(3)), Nanos::ZERO);
        assert_eq!(
            Reference::duration_since(&d, Duration::from_secs(1)),
            Nanos::from(Duration::from_secs(1))
        );
        assert_eq!(d + Nanos::new(1), Duration::new(2, 1));
    }
}
