//! Additional, customizable behavior for rate limiters.
//!
//! Rate-limiting middleware follows the principle that basic
//! rate-limiting should be very cheap, and unless users desire more
//! behavior, they should not pay any extra price.
//!
//! However, if you do desire more information about what the
//! rate-limiter does (or the ability to install hooks in the
//! decision-making process), you can. The [`RateLimitingMiddleware`]
//! trait in this module allows you to customize:
//!
//! * Any additional code that gets run when a rate-limiting decision is made.
//! * What value is returned in the positive or negative case.
//!
//! Writing middleware does **not** let you override rate-limiting
//! decisions: They remain either positive (returning `Ok`) or negative
//! (returning `Err`). However, you can override the values returned
//! inside the Result for either decision.
//!
//! This crate ships two middlewares (named after their behavior in the
//! positive outcome):
//!
//! * The cheapest still-useful one, [`NoOpMiddleware`]. In the positive
//!   case it returns `Ok(())`; in the negative case, `Err(`[`NotUntil`]`)`.
//!
//! * A more informative middleware, [`StateInformationMiddleware`], which
//!   returns `Ok(`[`RateLimitResult`]`)`, or `Err(`[`NotUntil`]`)`. Use
//!   this one to fill in response headers for admitted requests.
//!
//! ## Using a custom middleware
//!
//! Middlewares are attached to the
//! [`RateLimiter`][crate::RateLimiter] at construction time using
//! [`RateLimiter::with_middleware`][crate::RateLimiter::with_middleware]:
//!
//! ```rust
//! # use nonzero_ext::nonzero;
//! use ratewindow::{RateLimiter, Quota, clock::FakeRelativeClock, middleware::StateInformationMiddleware};
//! let lim = RateLimiter::hashmap_with_clock(FakeRelativeClock::default())
//!     .with_middleware::<StateInformationMiddleware>();
//! let quota = Quota::per_hour(nonzero!(1_u32));
//!
//! // A positive outcome with additional information:
//! let outcome = lim.check("user:1", &quota).unwrap();
//! assert_eq!(outcome.map(|r| r.remaining()), Ok(0));
//!
//! // The negative case:
//! let outcome = lim.check("user:1", &quota).unwrap();
//! assert_eq!(outcome.map_err(|n| n.quota().limit().get()), Err(1));
//! ```
//!
//! You can define your own middleware by `impl`ing [`RateLimitingMiddleware`].

use std::fmt;
use std::marker::PhantomData;
use std::time::Duration;

use crate::clock;
use crate::limiter::RateLimitResult;
use crate::Quota;

/// A negative rate-limiting outcome.
///
/// `NotUntil`'s methods indicate when a caller can expect the next positive
/// rate-limiting result.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct NotUntil<P: clock::Reference> {
    result: RateLimitResult<P>,
}

impl<P: clock::Reference> NotUntil<P> {
    /// Create a `NotUntil` as a negative rate-limiting result.
    #[inline]
    pub(crate) fn new(result: RateLimitResult<P>) -> Self {
        Self { result }
    }

    /// Returns the earliest time at which a decision could be
    /// conforming (excluding conforming decisions made by other callers
    /// in the meantime).
    #[inline]
    pub fn earliest_possible(&self) -> P {
        self.result.reset_at()
    }

    /// Returns the minimum amount of time from `from` that must pass
    /// before a decision can be conforming.
    ///
    /// If the time of the next expected positive result is in the past,
    /// `wait_time_from` returns a zero `Duration`.
    #[inline]
    pub fn wait_time_from(&self, from: P) -> Duration {
        let earliest = self.earliest_possible();
        earliest.duration_since(earliest.min(from)).into()
    }

    /// Returns the rate limiting [`Quota`] used to reach the decision.
    #[inline]
    pub fn quota(&self) -> Quota {
        self.result.quota()
    }

    /// Returns the full decision.
    #[inline]
    pub fn result(&self) -> &RateLimitResult<P> {
        &self.result
    }
}

impl<P: clock::Reference> fmt::Display for NotUntil<P> {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        write!(f, "rate-limited until {:?}", self.earliest_possible())
    }
}

/// Defines the behavior and return values of rate limiting decisions.
///
/// While the rate limiter defines whether a decision is positive, the
/// middleware defines what additional values (other than `Ok` or `Err`)
/// are returned from the [`RateLimiter`][crate::RateLimiter]'s check methods.
///
/// The default middleware in this crate is [`NoOpMiddleware`] (which does
/// nothing in the positive case and returns [`NotUntil`] in the
/// negative) - so it does only the smallest amount of work it needs to do
/// in order to be useful to users.
///
/// # Defining your own middleware
///
/// Here's an example of a rate limiting middleware that does no
/// computations at all on positive and negative outcomes: All the
/// information that a caller will receive is that a request should be
/// allowed or disallowed.
///
/// ```rust
/// # use nonzero_ext::*;
/// use ratewindow::{middleware::RateLimitingMiddleware, clock::{FakeRelativeClock, Reference},
///                  Quota, RateLimitResult, RateLimiter};
/// #[derive(Debug)]
/// struct NullMiddleware;
///
/// impl<P: Reference> RateLimitingMiddleware<P> for NullMiddleware {
///     type PositiveOutcome = ();
///     type NegativeOutcome = ();
///
///     fn allow(_key: &str, _result: RateLimitResult<P>) -> Self::PositiveOutcome {}
///     fn disallow(_key: &str, _result: RateLimitResult<P>) -> Self::NegativeOutcome {}
/// }
///
/// let lim = RateLimiter::hashmap_with_clock(FakeRelativeClock::default())
///     .with_middleware::<NullMiddleware>();
/// let quota = Quota::per_hour(nonzero!(1_u32));
///
/// assert_eq!(lim.check("user:1", &quota), Ok(Ok(())));
/// assert_eq!(lim.check("user:1", &quota), Ok(Err(())));
/// ```
pub trait RateLimitingMiddleware<P: clock::Reference>: fmt::Debug {
    /// The type that's returned by the rate limiter when a request is allowed.
    type PositiveOutcome: Sized;

    /// The type that's returned by the rate limiter when a request is *not* allowed.
    ///
    /// By default, rate limiters return `Err(NotUntil)`, which
    /// allows interrogating the minimum amount of time to wait until
    /// a client can expect to have a request allowed again.
    type NegativeOutcome: Sized;

    /// Called when a positive rate-limiting decision is made.
    ///
    /// The result reflects the state *after* the request was recorded:
    /// if one request was left in the window before the decision, its
    /// [`remaining`](RateLimitResult::remaining) count is 0.
    fn allow(key: &str, result: RateLimitResult<P>) -> Self::PositiveOutcome;

    /// Called when a negative rate-limiting decision is made.
    fn disallow(key: &str, result: RateLimitResult<P>) -> Self::NegativeOutcome;
}

/// A middleware that does nothing and returns `()` in the positive outcome.
pub struct NoOpMiddleware<P: clock::Reference = <clock::DefaultClock as clock::Clock>::Instant> {
    phantom: PhantomData<P>,
}

impl<P: clock::Reference> Default for NoOpMiddleware<P> {
    fn default() -> Self {
        Self {
            phantom: PhantomData,
        }
    }
}

impl<P: clock::Reference> fmt::Debug for NoOpMiddleware<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NoOpMiddleware")
    }
}

impl<P: clock::Reference> RateLimitingMiddleware<P> for NoOpMiddleware<P> {
    /// By default, rate limiters return nothing other than an
    /// indicator that the request should be let through.
    type PositiveOutcome = ();

    type NegativeOutcome = NotUntil<P>;

    #[inline]
    /// Returns `()` and has no side-effects.
    fn allow(_key: &str, _result: RateLimitResult<P>) -> Self::PositiveOutcome {}

    #[inline]
    /// Returns when the request can be retried.
    fn disallow(_key: &str, result: RateLimitResult<P>) -> Self::NegativeOutcome {
        NotUntil::new(result)
    }
}

/// Middleware that returns the full decision if a positive decision is
/// reached.
#[derive(Debug, Default)]
pub struct StateInformationMiddleware;

impl<P: clock::Reference> RateLimitingMiddleware<P> for StateInformationMiddleware {
    /// The decision reached by the limiter.
    type PositiveOutcome = RateLimitResult<P>;

    type NegativeOutcome = NotUntil<P>;

    fn allow(_key: &str, result: RateLimitResult<P>) -> Self::PositiveOutcome {
        result
    }

    fn disallow(_key: &str, result: RateLimitResult<P>) -> Self::NegativeOutcome {
        NotUntil::new(result)
    }
}
