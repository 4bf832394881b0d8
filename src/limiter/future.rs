use futures_timer::Delay;

use crate::clock::{self, Clock};
use crate::errors::StoreUnavailable;
use crate::limiter::{Algorithm, RateLimiter};
use crate::middleware::{NotUntil, RateLimitingMiddleware};
use crate::store::QuotaStore;
use crate::{Jitter, Quota};

/// # Rate limiters - `async`/`await`
impl<S, C, A, MW> RateLimiter<S, C, A, MW>
where
    S: QuotaStore,
    C: clock::ReasonablyRealtime,
    A: Algorithm,
    MW: RateLimitingMiddleware<C::Instant, NegativeOutcome = NotUntil<C::Instant>>,
{
    /// Asynchronously resolves as soon as the rate limiter allows a request
    /// for `key`.
    ///
    /// When polled, the returned future either resolves immediately (in the case where the rate
    /// limiter allows it), or else triggers an asynchronous delay, after which the rate limiter
    /// is polled again. This means that the future might resolve at some later time (depending
    /// on what other measurements are made on the rate limiter).
    ///
    /// With a fixed window, every poll counts against the window, so waiting
    /// callers use up capacity in the window they wake up in. If multiple
    /// futures are dispatched against the rate limiter, it is advisable to use
    /// [`until_ready_with_jitter`](#method.until_ready_with_jitter), to avoid
    /// thundering herds.
    ///
    /// The future resolves to an error as soon as the store fails.
    pub async fn until_ready(
        &self,
        key: &str,
        quota: &Quota,
    ) -> Result<MW::PositiveOutcome, StoreUnavailable> {
        self.until_ready_with_jitter(key, quota, Jitter::NONE).await
    }

    /// Asynchronously resolves as soon as the rate limiter allows a request
    /// for `key`, with a randomized wait period.
    ///
    /// This method allows for a randomized additional delay between polls of the rate limiter,
    /// which can help reduce the likelihood of thundering herd effects if multiple tasks try to
    /// wait on the same rate limiter.
    pub async fn until_ready_with_jitter(
        &self,
        key: &str,
        quota: &Quota,
        jitter: Jitter,
    ) -> Result<MW::PositiveOutcome, StoreUnavailable> {
        loop {
            match self.check(key, quota)? {
                Ok(outcome) => return Ok(outcome),
                Err(negative) => {
                    let delay = Delay::new(jitter + negative.wait_time_from(self.clock().now()));
                    delay.await;
                }
            }
        }
    }
}
