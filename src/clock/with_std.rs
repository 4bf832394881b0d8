use super::{Clock, ReasonablyRealtime, Reference};

use crate::nanos::Nanos;
use std::ops::Add;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// The monotonic clock implemented by [`Instant`].
///
/// Instants have no portable epoch, so this clock aligns its windows
/// to the moment it was constructed. Clones share that epoch.
#[derive(Clone, Debug)]
pub struct MonotonicClock {
    epoch: Instant,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        MonotonicClock {
            epoch: Instant::now(),
        }
    }
}

impl Add<Nanos> for Instant {
    type Output = Instant;

    fn add(self, other: Nanos) -> Instant {
        let other: Duration = other.into();
        self + other
    }
}

impl Reference for Instant {
    fn duration_since(&self, earlier: Self) -> Nanos {
        if earlier < *self {
            (*self - earlier).into()
        } else {
            Nanos::from(Duration::new(0, 0))
        }
    }
}

impl Clock for MonotonicClock {
    type Instant = Instant;

    fn now(&self) -> Self::Instant {
        Instant::now()
    }

    fn epoch(&self) -> Self::Instant {
        self.epoch
    }
}

impl ReasonablyRealtime for MonotonicClock {}

/// The non-monotonic clock implemented by [`SystemTime`].
///
/// Windows are aligned to the Unix epoch, so independent processes
/// sharing one quota store agree on window boundaries.
#[derive(Clone, Debug, Default)]
pub struct SystemClock();

impl Reference for SystemTime {
    /// Returns the difference in times between the two
    /// SystemTimes. Due to the fallible nature of SystemTimes,
    /// returns the zero duration if a negative duration would
    /// result (e.g. due to system clock adjustments).
    fn duration_since(&self, earlier: Self) -> Nanos {
        self.duration_since(earlier)
            .unwrap_or_else(|_| Duration::new(0, 0))
            .into()
    }
}

impl Add<Nanos> for SystemTime {
    type Output = SystemTime;

    fn add(self, other: Nanos) -> SystemTime {
        let other: Duration = other.into();
        self + other
    }
}

impl Clock for SystemClock {
    type Instant = SystemTime;

    fn now(&self) -> Self::Instant {
        SystemTime::now()
    }

    fn epoch(&self) -> Self::Instant {
        UNIX_EPOCH
    }
}

impl ReasonablyRealtime for SystemClock {}

#[cfg(test)]
mod test {
    use super::*;
    use crate::clock::{Clock, Reference};
    use std::time::Duration;

    #[test]
    fn instant_impls_coverage() {
        let one = Instant::now();
        let later = one + Nanos::from(Duration::from_secs(1));
        assert!(one < later);
        assert_eq!(
            Reference::duration_since(&later, one),
            Nanos::from(Duration::from_secs(1))
        );
        assert_eq!(Reference::duration_since(&one, later), Nanos::ZERO);
    }

    #[test]
    fn system_clock_impls_coverage() {
        let clock = SystemClock::default();
        let now = clock.now();
        assert_eq!(clock.epoch(), UNIX_EPOCH);
        assert!(Reference::duration_since(&now, clock.epoch()) > Nanos::ZERO);
        assert_eq!(
            Reference::duration_since(&clock.epoch(), now),
            Nanos::ZERO,
            "saturates instead of going negative"
        );
        assert!(clock.elapsed() > Nanos::from(Duration::from_secs(1_500_000_000)));
    }

    #[test]
    fn monotonic_clock_epoch_is_shared_by_clones() {
        let clock = MonotonicClock::default();
        let clone = clock.clone();
        assert_eq!(clock.epoch(), clone.epoch());
        assert!(clock.now() >= clock.epoch());
        assert!(clock.wait_time_from(clock.epoch()) >= Duration::new(0, 0));
    }
}
