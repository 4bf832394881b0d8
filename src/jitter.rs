use std::ops::Add;
use std::time::Duration;

use crate::nanos::Nanos;

#[cfg(feature = "jitter")]
use rand::Rng;

/// An interval specification for deviating from the nominal wait time.
///
/// Jitter can be added to wait time `Duration`s to ensure that multiple tasks waiting on the same
/// rate limit don't wake up at the same time and attempt to measure at the same time.
///
/// Methods on rate limiters that work asynchronously like
/// [`until_ready_with_jitter`](crate::RateLimiter::until_ready_with_jitter)
/// exist to automatically apply jitter to wait periods, thereby reducing the chance of a
/// thundering herd problem.
///
/// # Examples
///
/// Jitter can be added manually to a `Duration`:
///
/// ```rust
/// # use ratewindow::Jitter;
/// # use std::time::Duration;
/// let reference = Duration::from_secs(24);
/// let jitter = Jitter::new(Duration::from_secs(1), Duration::from_secs(1));
/// let result = jitter + reference;
/// assert!(result >= reference + Duration::from_secs(1));
/// assert!(result < reference + Duration::from_secs(2));
/// ```
///
/// A jitter with only an upper bound:
///
/// ```rust
/// # use ratewindow::Jitter;
/// # use std::time::Duration;
/// let reference = Duration::from_secs(24);
/// let jitter = Jitter::up_to(Duration::from_secs(1));
/// let result = jitter + reference;
/// assert!(result >= reference);
/// assert!(result < reference + Duration::from_secs(1));
/// ```
#[derive(Debug, PartialEq, Eq, Default, Clone, Copy)]
pub struct Jitter {
    min: Nanos,
    max: Nanos,
}

impl Jitter {
    /// A jitter that adds nothing.
    pub const NONE: Jitter = Jitter {
        min: Nanos::ZERO,
        max: Nanos::ZERO,
    };

    /// Constructs a new Jitter interval, waiting at most a duration of `max`.
    ///
    /// ```rust
    /// # use ratewindow::Jitter;
    /// # use std::time::Duration;
    /// let jitter = Jitter::up_to(Duration::from_secs(20));
    /// let now = Duration::from_secs(0);
    /// assert!(jitter + now <= Duration::from_secs(20)); // always.
    /// ```
    pub fn up_to(max: Duration) -> Jitter {
        Jitter {
            min: Nanos::ZERO,
            max: max.into(),
        }
    }

    /// Constructs a new Jitter interval, waiting at least `min` and at most `min+interval`.
    pub fn new(min: Duration, interval: Duration) -> Jitter {
        let min: Nanos = min.into();
        let max: Nanos = min + Nanos::from(interval);
        Jitter { min, max }
    }

    /// Returns a random amount of jitter within the configured interval.
    #[cfg(feature = "jitter")]
    pub(crate) fn get(&self) -> Nanos {
        if self.min == self.max {
            return self.min;
        }
        let range = rand::thread_rng().gen_range(self.min.as_u64()..self.max.as_u64());
        Nanos::new(range)
    }

    /// Without the `jitter` feature, jitter always adds its minimum.
    #[cfg(not(feature = "jitter"))]
    pub(crate) fn get(&self) -> Nanos {
        self.min
    }
}

impl Add<Duration> for Jitter {
    type Output = Duration;

    fn add(self, rhs: Duration) -> Duration {
        let amount: Duration = self.get().into();
        rhs + amount
    }
}
