//! Rate limiters and the decisions they make.
//!
//! A [`RateLimiter`] pairs a [`QuotaStore`] with a [`Clock`][clock::Clock]
//! and an [`Algorithm`]. It keeps no rate-limiting state of its own: the
//! same limiter serves any number of keys and quotas, and every call to
//! [`check`](RateLimiter::check) re-reads the store.

use std::fmt;
use std::marker::PhantomData;
use std::time::Duration;

use crate::clock::{self, Clock, Reference};
use crate::errors::StoreUnavailable;
use crate::middleware::{NoOpMiddleware, RateLimitingMiddleware};
use crate::nanos::Nanos;
use crate::store::{QuotaStore, ShrinkableQuotaStore};
use crate::Quota;

mod fixed_window;
pub use fixed_window::FixedWindow;

mod sliding_window;
pub use sliding_window::SlidingWindow;

mod future;

/// Rounds a duration up to whole seconds.
pub(crate) fn ceil_secs(d: Duration) -> u64 {
    d.as_secs() + u64::from(d.subsec_nanos() > 0)
}

/// The outcome of evaluating one request against one quota.
///
/// Times are measurements of the rate limiter's clock. A result always
/// satisfies:
///
/// * `reset_at` lies after `decided_at`;
/// * when allowed, `remaining` is in `0..limit` and there is no `retry_after`;
/// * when denied, `remaining` is 0 and `retry_after` is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitResult<P: Reference> {
    allowed: bool,
    quota: Quota,
    remaining: u32,
    decided_at: P,
    reset_at: P,
    retry_after: Option<Duration>,
}

impl<P: Reference> RateLimitResult<P> {
    pub(crate) fn allowed(quota: Quota, remaining: u64, decided_at: P, reset_at: P) -> Self {
        RateLimitResult {
            allowed: true,
            quota,
            remaining: remaining.min(u64::from(quota.limit().get() - 1)) as u32,
            decided_at,
            reset_at,
            retry_after: None,
        }
    }

    pub(crate) fn denied(quota: Quota, decided_at: P, retry_after: Nanos) -> Self {
        RateLimitResult {
            allowed: false,
            quota,
            remaining: 0,
            decided_at,
            reset_at: decided_at + retry_after,
            retry_after: Some(retry_after.into()),
        }
    }

    /// Moves the result's times onto another time line.
    pub(crate) fn rebase<Q: Reference>(self, f: impl Fn(P) -> Q) -> RateLimitResult<Q> {
        RateLimitResult {
            allowed: self.allowed,
            quota: self.quota,
            remaining: self.remaining,
            decided_at: f(self.decided_at),
            reset_at: f(self.reset_at),
            retry_after: self.retry_after,
        }
    }

    /// Whether the request was admitted.
    pub fn is_allowed(&self) -> bool {
        self.allowed
    }

    /// The quota the request was evaluated against.
    pub fn quota(&self) -> Quota {
        self.quota
    }

    /// The maximum number of requests per window.
    pub fn limit(&self) -> u32 {
        self.quota.limit().get()
    }

    /// How many more requests the current window admits.
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// When the decision was made.
    pub fn decided_at(&self) -> P {
        self.decided_at
    }

    /// When the quota replenishes: the end of the fixed window, or the time
    /// the oldest logged request slides out of the window.
    pub fn reset_at(&self) -> P {
        self.reset_at
    }

    /// The time from the decision until [`reset_at`](RateLimitResult::reset_at).
    pub fn time_to_reset(&self) -> Duration {
        self.reset_at.duration_since(self.decided_at).into()
    }

    /// [`time_to_reset`](RateLimitResult::time_to_reset), rounded up to
    /// whole seconds.
    pub fn seconds_to_reset(&self) -> u64 {
        ceil_secs(self.time_to_reset())
    }

    /// For denied requests, the minimum time to wait before retrying.
    pub fn retry_after(&self) -> Option<Duration> {
        self.retry_after
    }

    /// [`retry_after`](RateLimitResult::retry_after) in whole seconds,
    /// rounded up and never less than one.
    pub fn retry_after_secs(&self) -> Option<u64> {
        self.retry_after.map(|d| ceil_secs(d).max(1))
    }
}

/// A rate-limiting algorithm.
///
/// Algorithms are stateless: they describe how to turn one atomic
/// [`QuotaStore`] operation into a decision. All times they see are offsets
/// from the clock's epoch, measured once per decision.
pub trait Algorithm: fmt::Debug + Default {
    /// A short name for the algorithm, used in logs.
    const NAME: &'static str;

    /// Evaluates a request and records it in the store.
    fn decide<S: QuotaStore>(
        store: &S,
        key: &str,
        quota: &Quota,
        now: Nanos,
    ) -> Result<RateLimitResult<Nanos>, StoreUnavailable>;

    /// Evaluates what a request would be told right now, without recording it.
    fn peek<S: QuotaStore>(
        store: &S,
        key: &str,
        quota: &Quota,
        now: Nanos,
    ) -> Result<RateLimitResult<Nanos>, StoreUnavailable>;
}

/// What a rate limiter decides when its store is unavailable.
///
/// Failing closed (denying) is the safer default for abuse protection;
/// failing open keeps a service up when its limiter's store goes away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FailurePolicy {
    /// Admit the request.
    FailOpen,

    /// Deny the request, asking the caller to retry after one window.
    #[default]
    FailClosed,
}

impl FailurePolicy {
    fn resolve<P: Reference>(self, quota: Quota, now: P) -> RateLimitResult<P> {
        let window = quota.window_nanos();
        match self {
            FailurePolicy::FailOpen => RateLimitResult::allowed(
                quota,
                u64::from(quota.limit().get() - 1),
                now,
                now + window,
            ),
            FailurePolicy::FailClosed => RateLimitResult::denied(quota, now, window),
        }
    }
}

/// A rate limiter.
///
/// This is the structure that ties together the parameters (how to count
/// and where to keep the counts) and the current state of the clock, and
/// makes rate-limiting decisions for any key and [`Quota`] handed to it.
///
/// The algorithm is a type parameter: [`FixedWindow`] (the default) or
/// [`SlidingWindow`]. Switch with
/// [`with_algorithm`](RateLimiter::with_algorithm).
pub struct RateLimiter<S, C = clock::DefaultClock, A = FixedWindow, MW = NoOpMiddleware<<C as clock::Clock>::Instant>>
where
    S: QuotaStore,
    C: clock::Clock,
    A: Algorithm,
    MW: RateLimitingMiddleware<C::Instant>,
{
    store: S,
    clock: C,
    epoch: C::Instant,
    failure_policy: FailurePolicy,
    algorithm: PhantomData<A>,
    middleware: PhantomData<MW>,
}

/// # Constructors
impl<S, C, A> RateLimiter<S, C, A, NoOpMiddleware<C::Instant>>
where
    S: QuotaStore,
    C: clock::Clock,
    A: Algorithm,
{
    /// Creates a new rate limiter from components.
    ///
    /// This is the most generic way to construct a rate-limiter; most users should prefer
    /// [`keyed`](RateLimiter::keyed) or other methods instead.
    pub fn new(store: S, clock: C) -> Self {
        let epoch = clock.epoch();
        RateLimiter {
            store,
            clock,
            epoch,
            failure_policy: FailurePolicy::default(),
            algorithm: PhantomData,
            middleware: PhantomData,
        }
    }
}

#[cfg(feature = "dashmap")]
impl RateLimiter<crate::store::DashMapQuotaStore, clock::DefaultClock, FixedWindow> {
    /// Constructs a new fixed-window rate limiter backed by a
    /// [`DashMap`][dashmap::DashMap], using the wall clock.
    pub fn keyed() -> Self {
        Self::dashmap_with_clock(clock::DefaultClock::default())
    }
}

#[cfg(not(feature = "dashmap"))]
impl RateLimiter<crate::store::HashMapQuotaStore, clock::DefaultClock, FixedWindow> {
    /// Constructs a new fixed-window rate limiter backed by a
    /// [`HashMap`][std::collections::HashMap], using the wall clock.
    pub fn keyed() -> Self {
        Self::hashmap_with_clock(clock::DefaultClock::default())
    }
}

impl RateLimiter<crate::store::HashMapQuotaStore, clock::DefaultClock, FixedWindow> {
    /// Constructs a new fixed-window rate limiter backed by a
    /// [`HashMap`][std::collections::HashMap], using the wall clock.
    pub fn hashmap() -> Self {
        Self::hashmap_with_clock(clock::DefaultClock::default())
    }
}

/// # Configuration
impl<S, C, A, MW> RateLimiter<S, C, A, MW>
where
    S: QuotaStore,
    C: clock::Clock,
    A: Algorithm,
    MW: RateLimitingMiddleware<C::Instant>,
{
    /// Convert the given rate limiter into one that uses a different middleware.
    pub fn with_middleware<Outer: RateLimitingMiddleware<C::Instant>>(
        self,
    ) -> RateLimiter<S, C, A, Outer> {
        RateLimiter {
            store: self.store,
            clock: self.clock,
            epoch: self.epoch,
            failure_policy: self.failure_policy,
            algorithm: PhantomData,
            middleware: PhantomData,
        }
    }

    /// Convert the given rate limiter into one that uses a different algorithm.
    ///
    /// Fixed-window counters and sliding-window logs live side by side in a
    /// store, so switching does not carry usage over from one to the other.
    pub fn with_algorithm<B: Algorithm>(self) -> RateLimiter<S, C, B, MW> {
        RateLimiter {
            store: self.store,
            clock: self.clock,
            epoch: self.epoch,
            failure_policy: self.failure_policy,
            algorithm: PhantomData,
            middleware: PhantomData,
        }
    }

    /// Sets what [`check_or_fallback`](RateLimiter::check_or_fallback)
    /// decides when the store is unavailable.
    pub fn with_failure_policy(mut self, failure_policy: FailurePolicy) -> Self {
        self.failure_policy = failure_policy;
        self
    }

    /// The failure policy in effect.
    pub fn failure_policy(&self) -> FailurePolicy {
        self.failure_policy
    }

    /// The store holding this limiter's counters and logs.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The clock this limiter reads.
    pub fn clock(&self) -> &C {
        &self.clock
    }
}

/// # Making decisions
impl<S, C, A, MW> RateLimiter<S, C, A, MW>
where
    S: QuotaStore,
    C: clock::Clock,
    A: Algorithm,
    MW: RateLimitingMiddleware<C::Instant>,
{
    fn now(&self) -> (C::Instant, Nanos) {
        let now = self.clock.now();
        (now, now.duration_since(self.epoch))
    }

    fn on_clock(&self, result: RateLimitResult<Nanos>) -> RateLimitResult<C::Instant> {
        let epoch = self.epoch;
        result.rebase(|n| epoch + n)
    }

    /// Evaluates a request for `key` against `quota` and records it,
    /// returning the full decision.
    ///
    /// The clock is read once; the store is updated in one atomic
    /// operation. A fixed-window decision counts the request even when it is
    /// denied, so the window reflects attempted load.
    pub fn evaluate(
        &self,
        key: &str,
        quota: &Quota,
    ) -> Result<RateLimitResult<C::Instant>, StoreUnavailable> {
        let (_, now) = self.now();
        A::decide(&self.store, key, quota, now).map(|r| self.on_clock(r))
    }

    /// Allow a single request through the rate limiter for the given key.
    ///
    /// The outer `Result` reports store failures; the inner one is the
    /// rate-limiting decision, shaped by the middleware. With the default
    /// middleware, a denial carries a [`NotUntil`][crate::NotUntil]
    /// that tells when to try again.
    pub fn check(
        &self,
        key: &str,
        quota: &Quota,
    ) -> Result<Result<MW::PositiveOutcome, MW::NegativeOutcome>, StoreUnavailable> {
        self.evaluate(key, quota).map(|r| Self::outcome(key, r))
    }

    /// Like [`check`](RateLimiter::check), but resolves store failures with
    /// the limiter's [`FailurePolicy`].
    pub fn check_or_fallback(
        &self,
        key: &str,
        quota: &Quota,
    ) -> Result<MW::PositiveOutcome, MW::NegativeOutcome> {
        let result = self.evaluate(key, quota).unwrap_or_else(|error| {
            tracing::warn!(
                key,
                algorithm = A::NAME,
                failure_policy = ?self.failure_policy,
                %error,
                "quota store unavailable, applying failure policy"
            );
            self.failure_policy.resolve(*quota, self.clock.now())
        });
        Self::outcome(key, result)
    }

    /// Tests whether a request for the given key would be allowed, without
    /// recording it.
    ///
    /// Peeking never changes the outcome of later checks.
    pub fn peek(
        &self,
        key: &str,
        quota: &Quota,
    ) -> Result<Result<MW::PositiveOutcome, MW::NegativeOutcome>, StoreUnavailable> {
        let (_, now) = self.now();
        let result = A::peek(&self.store, key, quota, now).map(|r| self.on_clock(r))?;
        Ok(Self::outcome(key, result))
    }

    /// Forgets all accounting for `key`.
    pub fn reset(&self, key: &str) -> Result<(), StoreUnavailable> {
        tracing::trace!(key, "resetting rate limit state");
        self.store.reset(key)
    }

    fn outcome(
        key: &str,
        result: RateLimitResult<C::Instant>,
    ) -> Result<MW::PositiveOutcome, MW::NegativeOutcome> {
        if result.is_allowed() {
            Ok(MW::allow(key, result))
        } else {
            Err(MW::disallow(key, result))
        }
    }
}

/// # Keyed rate limiters - Housekeeping of keys
impl<S, C, A, MW> RateLimiter<S, C, A, MW>
where
    S: ShrinkableQuotaStore,
    C: clock::Clock,
    A: Algorithm,
    MW: RateLimitingMiddleware<C::Instant>,
{
    /// Drops all keys whose counters and logs have expired.
    ///
    /// Expired state already has no influence on decisions. The in-memory
    /// stores also drop expired keys while they are being written to, at
    /// most once per expiry period; this sweeps right away.
    pub fn retain_unexpired(&self) {
        let (_, now) = self.now();
        self.store.retain_unexpired(now);
    }

    /// Shrinks the capacity of the rate limiter's store if possible.
    pub fn shrink_to_fit(&self) {
        self.store.shrink_to_fit();
    }

    /// Returns the number of keys in the store.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Returns `true` if there are currently no keys in the store.
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

impl<S, C, A, MW> fmt::Debug for RateLimiter<S, C, A, MW>
where
    S: QuotaStore + fmt::Debug,
    C: clock::Clock + fmt::Debug,
    A: Algorithm,
    MW: RateLimitingMiddleware<C::Instant>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiter")
            .field("algorithm", &A::NAME)
            .field("store", &self.store)
            .field("clock", &self.clock)
            .field("failure_policy", &self.failure_policy)
            .finish()
    }
}
