use std::{fmt::Debug, marker::PhantomData};

use ratewindow::{clock, middleware::RateLimitingMiddleware, RateLimitResult};
use tracing::{event, span, Level};

/// Middleware that emits `TRACE` level events whenever a rate-limiting
/// decision is made, then defers to the inner middleware `I`.
pub struct TracingMiddleware<P: clock::Reference, I: RateLimitingMiddleware<P>> {
    _phantom: PhantomData<(I, P)>,
}

impl<P: clock::Reference, I: RateLimitingMiddleware<P>> core::fmt::Debug for TracingMiddleware<P, I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TracingMiddleware").finish()
    }
}

impl<P: clock::Reference, I: RateLimitingMiddleware<P>> RateLimitingMiddleware<P> for TracingMiddleware<P, I>
where
    I::PositiveOutcome: Debug,
    I::NegativeOutcome: Debug,
{
    type PositiveOutcome = I::PositiveOutcome;

    type NegativeOutcome = I::NegativeOutcome;

    fn allow(key: &str, result: RateLimitResult<P>) -> Self::PositiveOutcome {
        let span = span!(Level::TRACE, "allow", key, remaining = result.remaining(), limit = result.limit());
        let _enter = span.enter();
        let outcome = I::allow(key, result);
        event!(Level::TRACE, ?outcome);
        outcome
    }

    fn disallow(key: &str, result: RateLimitResult<P>) -> Self::NegativeOutcome {
        let span = span!(Level::TRACE, "disallow", key, retry_after = ?result.retry_after());
        let _enter = span.enter();
        let outcome = I::disallow(key, result);
        event!(Level::TRACE, ?outcome);
        outcome
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use nonzero_ext::nonzero;
    use ratewindow::{
        clock::{Clock, FakeRelativeClock},
        middleware::{NoOpMiddleware, StateInformationMiddleware},
        nanos::Nanos,
        Quota, RateLimiter,
    };
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };
    use tracing::{Event, Subscriber};
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

    #[derive(Clone, Default)]
    struct CountEvents(Arc<AtomicUsize>);

    impl<S: Subscriber> Layer<S> for CountEvents {
        fn on_event(&self, _event: &Event<'_>, _ctx: Context<'_, S>) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn passes_outcomes_through() {
        let events = CountEvents::default();
        let subscriber = tracing_subscriber::registry().with(events.clone());
        let clock = FakeRelativeClock::default();
        let lim = RateLimiter::hashmap_with_clock(clock.clone())
            .with_middleware::<TracingMiddleware<Nanos, StateInformationMiddleware>>();
        let quota = Quota::per_minute(nonzero!(1u32));

        tracing::subscriber::with_default(subscriber, || {
            let allowed = lim.check("user:1", &quota).unwrap().unwrap();
            assert_eq!(allowed.remaining(), 0);
            let denied = lim.check("user:1", &quota).unwrap().unwrap_err();
            assert_eq!(denied.earliest_possible(), clock.now() + Nanos::from(quota.window()));
        });
        assert!(events.0.load(Ordering::SeqCst) >= 2);
    }

    #[test]
    fn wraps_the_default_middleware() {
        let lim = RateLimiter::hashmap_with_clock(FakeRelativeClock::default())
            .with_middleware::<TracingMiddleware<Nanos, NoOpMiddleware<Nanos>>>();
        let quota = Quota::per_minute(nonzero!(1u32));
        assert_eq!(lim.check("user:1", &quota), Ok(Ok(())));
        assert!(lim.check("user:1", &quota).unwrap().is_err());
        assert!(format!("{:?}", lim).contains("RateLimiter"));
    }
}
