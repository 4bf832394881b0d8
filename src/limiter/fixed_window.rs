use crate::errors::StoreUnavailable;
use crate::limiter::{Algorithm, RateLimitResult};
use crate::nanos::Nanos;
use crate::store::QuotaStore;
use crate::Quota;

/// Counts requests in fixed windows aligned to the clock's epoch.
///
/// A window covers `[window_start, window_start + window)`, where
/// `window_start` is the current time rounded down to a multiple of the
/// window length. Every evaluation increments the window's counter, whether
/// it is admitted or not; a request is denied once the counter exceeds the
/// limit. All denied callers in a window are told to retry when the window
/// ends.
///
/// Fixed windows are cheap (one counter per key) but admit up to twice the
/// limit across a window boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FixedWindow;

impl FixedWindow {
    fn bounds(quota: &Quota, now: Nanos) -> (Nanos, Nanos) {
        let window = quota.window_nanos();
        let window_start = now.align_down(window);
        (window_start, window_start.saturating_add(window))
    }

    fn result(quota: &Quota, count: u64, now: Nanos, reset_at: Nanos) -> RateLimitResult<Nanos> {
        let limit = u64::from(quota.limit().get());
        if count > limit {
            RateLimitResult::denied(*quota, now, reset_at - now)
        } else {
            RateLimitResult::allowed(*quota, limit - count, now, reset_at)
        }
    }
}

impl Algorithm for FixedWindow {
    const NAME: &'static str = "fixed_window";

    fn decide<S: QuotaStore>(
        store: &S,
        key: &str,
        quota: &Quota,
        now: Nanos,
    ) -> Result<RateLimitResult<Nanos>, StoreUnavailable> {
        let (window_start, reset_at) = Self::bounds(quota, now);
        let count = store.increment_and_expire(key, quota.window_nanos(), window_start, quota.ttl().into(), now)?;
        let result = Self::result(quota, count, now, reset_at);
        tracing::trace!(
            key,
            count,
            limit = quota.limit().get(),
            allowed = result.is_allowed(),
            "fixed window decision"
        );
        Ok(result)
    }

    fn peek<S: QuotaStore>(
        store: &S,
        key: &str,
        quota: &Quota,
        now: Nanos,
    ) -> Result<RateLimitResult<Nanos>, StoreUnavailable> {
        let (window_start, reset_at) = Self::bounds(quota, now);
        let count = store.current_count(key, quota.window_nanos(), window_start, now)?;
        Ok(Self::result(quota, count + 1, now, reset_at))
    }
}
