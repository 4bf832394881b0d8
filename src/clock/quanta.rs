use crate::clock::{Clock, ReasonablyRealtime, Reference};
use crate::nanos::Nanos;
use std::ops::Add;

/// A clock using the default [`quanta::Clock`] structure.
///
/// This clock uses [`quanta::Clock::now`], which does retrieve the time synchronously.
/// Measurements are taken relative to the moment the clock was constructed, which is
/// also its epoch: like the [`MonotonicClock`][crate::clock::MonotonicClock], it is only
/// suitable for quota stores that live inside one process.
#[derive(Debug, Clone)]
pub struct QuantaClock {
    clock: quanta::Clock,
    reference: quanta::Instant,
}

impl Default for QuantaClock {
    fn default() -> Self {
        let clock = quanta::Clock::new();
        let reference = clock.now();
        QuantaClock { clock, reference }
    }
}

impl Clock for QuantaClock {
    type Instant = QuantaInstant;

    fn now(&self) -> Self::Instant {
        let nowish = self.clock.now();
        QuantaInstant(Nanos::from(nowish.duration_since(self.reference)))
    }

    fn epoch(&self) -> Self::Instant {
        QuantaInstant(Nanos::ZERO)
    }
}

impl ReasonablyRealtime for QuantaClock {}

/// A nanosecond-scale opaque instant (already scaled to reference time) returned from a
/// [`QuantaClock`].
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct QuantaInstant(Nanos);

impl Add<Nanos> for QuantaInstant {
    type Output = QuantaInstant;

    fn add(self, other: Nanos) -> QuantaInstant {
        QuantaInstant(self.0 + other)
    }
}

impl Reference for QuantaInstant {
    fn duration_since(&self, earlier: Self) -> Nanos {
        self.0.duration_since(earlier.0)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::time::Duration;

    #[test]
    fn quanta_impls_coverage() {
        let clock = QuantaClock::default();
        let now = clock.now();
        assert!(now >= clock.epoch());
        let later = now + Nanos::from(Duration::from_millis(5));
        assert_eq!(
            later.duration_since(now),
            Nanos::from(Duration::from_millis(5))
        );
        assert_eq!(now.duration_since(later), Nanos::ZERO);
        assert!(!format!("{:?}", clock).is_empty());
    }
}
