//! A time-keeping abstraction (nanoseconds) that works for storing in an atomic integer.

use std::convert::TryInto;
use std::fmt;
use std::ops::{Add, Sub};
use std::time::Duration;

/// A number of nanoseconds from a reference point.
///
/// Nanos can not represent durations >584 years, but hopefully that
/// should not be a problem in real-world applications.
///
/// Quota stores keep all of their timestamps (window starts, log
/// entries, expiry deadlines) as `Nanos` relative to the epoch of the
/// [`Clock`][crate::clock::Clock] that drives the rate limiter.
#[derive(PartialEq, Eq, Default, Clone, Copy, PartialOrd, Ord, Hash)]
pub struct Nanos(u64);

impl Nanos {
    /// The zero point of a clock's epoch.
    pub const ZERO: Nanos = Nanos(0);

    /// Constructs a `Nanos` from a raw count of nanoseconds.
    pub const fn new(u: u64) -> Self {
        Nanos(u)
    }

    /// Returns the raw count of nanoseconds.
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the amount of time elapsed between `earlier` and `self`,
    /// or zero if `earlier` lies after `self`.
    pub fn duration_since(&self, earlier: Self) -> Nanos {
        self.saturating_sub(earlier)
    }

    /// Subtracts, clamping to zero.
    pub fn saturating_sub(self, rhs: Nanos) -> Nanos {
        Nanos(self.0.saturating_sub(rhs.0))
    }

    /// Adds, clamping to the largest representable value.
    pub fn saturating_add(self, rhs: Nanos) -> Nanos {
        Nanos(self.0.saturating_add(rhs.0))
    }

    /// Rounds `self` down to a multiple of `interval`.
    ///
    /// `interval` must not be zero; [`Quota`][crate::Quota] guarantees that for windows.
    pub(crate) fn align_down(self, interval: Nanos) -> Nanos {
        Nanos(self.0 - self.0 % interval.0)
    }
}

/// Nanos as used by Jitter and other std-only features.
impl From<Duration> for Nanos {
    fn from(d: Duration) -> Self {
        // This will panic:
        Nanos(
            d.as_nanos()
                .try_into()
                .expect("Duration is longer than 584 years"),
        )
    }
}

impl fmt::Debug for Nanos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        let d = Duration::from_nanos(self.0);
        write!(f, "Nanos({:?})", d)
    }
}

impl From<u64> for Nanos {
    fn from(u: u64) -> Self {
        Nanos(u)
    }
}

impl From<Nanos> for u64 {
    fn from(n: Nanos) -> Self {
        n.0
    }
}

impl From<Nanos> for Duration {
    fn from(n: Nanos) -> Self {
        Duration::from_nanos(n.0)
    }
}

/// Saturates at the largest representable value.
impl Add<Nanos> for Nanos {
    type Output = Nanos;

    fn add(self, rhs: Nanos) -> Self::Output {
        self.saturating_add(rhs)
    }
}

impl Sub<Nanos> for Nanos {
    type Output = Nanos;

    fn sub(self, rhs: Nanos) -> Self::Output {
        Nanos(self.0 - rhs.0)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::time::Duration;

    #[test]
    fn nanos_impls() {
        let n = Nanos::new(20);
        assert_eq!("Nanos(20ns)", format!("{:?}", n));
        assert_eq!(u64::from(n), 20);
        assert_eq!(Nanos::from(Duration::from_secs(1)), Nanos::new(1_000_000_000));
    }

    #[test]
    fn nanos_arith() {
        let n = Nanos::new(20);
        let n2 = Nanos::new(25);
        assert_eq!(n + n2, Nanos::new(45));
        assert_eq!(n2 - n, Nanos::new(5));
        assert_eq!(n.saturating_sub(n2), Nanos::ZERO);
        assert_eq!(n2.duration_since(n), Nanos::new(5));
        assert_eq!(n.duration_since(n2), Nanos::ZERO);
        assert_eq!(Nanos::new(u64::MAX).saturating_add(n), Nanos::new(u64::MAX));
        assert_eq!(Nanos::new(u64::MAX - 1) + n, Nanos::new(u64::MAX));
    }

    #[test]
    fn aligns_down_to_window() {
        let window = Nanos::new(60);
        assert_eq!(Nanos::new(0).align_down(window), Nanos::new(0));
        assert_eq!(Nanos::new(59).align_down(window), Nanos::new(0));
        assert_eq!(Nanos::new(60).align_down(window), Nanos::new(60));
        assert_eq!(Nanos::new(121).align_down(window), Nanos::new(120));
    }
}
