use std::num::NonZeroU32;
use std::time::Duration;

use crate::errors::InvalidConfiguration;
use crate::nanos::Nanos;

/// How long counters and logs outlive their window, to tolerate clock skew
/// between the processes sharing a store.
pub const EXPIRY_GRACE: Duration = Duration::from_secs(1);

/// A rate-limiting quota.
///
/// Quotas are expressed as a positive number of admitted requests (the
/// "limit") per window of time. Neither the limit nor the window may be
/// zero; the constructors in this module make it impossible to build a
/// quota that would always allow or always deny.
///
/// # Examples
///
/// Construct a quota that allows 10 requests per minute:
/// ```rust
/// # use ratewindow::Quota;
/// # use nonzero_ext::nonzero;
/// # use std::time::Duration;
/// let q = Quota::per_minute(nonzero!(10u32));
/// assert_eq!(q.limit().get(), 10);
/// assert_eq!(q.window(), Duration::from_secs(60));
/// ```
///
/// Quotas that arrive as plain numbers (e.g. from a policy table) are
/// validated when they are constructed:
/// ```rust
/// # use ratewindow::{Quota, InvalidConfiguration};
/// assert!(Quota::new(100, 3600).is_ok());
/// assert_eq!(Quota::new(0, 60), Err(InvalidConfiguration::ZeroLimit));
/// assert_eq!(Quota::new(10, 0), Err(InvalidConfiguration::ZeroWindow));
/// ```
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub struct Quota {
    pub(crate) limit: NonZeroU32,
    pub(crate) window: Duration,
}

/// Constructors for Quotas
impl Quota {
    /// Construct a quota for a number of requests per second.
    pub const fn per_second(limit: NonZeroU32) -> Quota {
        Quota {
            limit,
            window: Duration::from_secs(1),
        }
    }

    /// Construct a quota for a number of requests per 60-second window.
    pub const fn per_minute(limit: NonZeroU32) -> Quota {
        Quota {
            limit,
            window: Duration::from_secs(60),
        }
    }

    /// Construct a quota for a number of requests per 60-minute (3600-second) window.
    pub const fn per_hour(limit: NonZeroU32) -> Quota {
        Quota {
            limit,
            window: Duration::from_secs(60 * 60),
        }
    }

    /// The longest window a quota can have, about 292 years.
    ///
    /// Windows are kept as nanoseconds on the rate limiter's clock, and a
    /// window plus its expiry must stay representable from any point in
    /// the clock's range.
    pub const MAX_WINDOW: Duration = Duration::from_nanos(u64::MAX / 2);

    /// Construct a quota for a number of requests per arbitrary window.
    ///
    /// Returns an error if the window is zero or longer than
    /// [`MAX_WINDOW`](Quota::MAX_WINDOW).
    pub fn with_window(limit: NonZeroU32, window: Duration) -> Result<Quota, InvalidConfiguration> {
        if window.as_nanos() == 0 {
            return Err(InvalidConfiguration::ZeroWindow);
        }
        if window > Quota::MAX_WINDOW {
            return Err(InvalidConfiguration::WindowTooLarge(window));
        }
        Ok(Quota { limit, window })
    }

    /// Construct a quota from a raw limit and a window length in seconds.
    ///
    /// This is the shape policy tables usually hand out. Zero limits and
    /// zero windows are rejected, as are limits that do not fit in a `u32`
    /// and windows longer than [`MAX_WINDOW`](Quota::MAX_WINDOW).
    pub fn new(limit: u64, window_seconds: u64) -> Result<Quota, InvalidConfiguration> {
        let limit = u32::try_from(limit).map_err(|_| InvalidConfiguration::LimitTooLarge(limit))?;
        let limit = NonZeroU32::new(limit).ok_or(InvalidConfiguration::ZeroLimit)?;
        Quota::with_window(limit, Duration::from_secs(window_seconds))
    }

    /// Adjusts the limit of a quota, keeping its window.
    pub const fn with_limit(self, limit: NonZeroU32) -> Quota {
        Quota { limit, ..self }
    }
}

/// Retrieving information about a quota
impl Quota {
    /// The maximum number of requests admitted per window.
    pub const fn limit(&self) -> NonZeroU32 {
        self.limit
    }

    /// The length of the window.
    pub const fn window(&self) -> Duration {
        self.window
    }

    /// The length of the window in whole seconds, rounded up.
    pub fn window_secs(&self) -> u64 {
        crate::limiter::ceil_secs(self.window)
    }

    /// How long a counter or log written under this quota must be kept:
    /// one window plus [`EXPIRY_GRACE`].
    pub fn ttl(&self) -> Duration {
        self.window + EXPIRY_GRACE
    }

    pub(crate) fn window_nanos(&self) -> Nanos {
        self.window.into()
    }
}
