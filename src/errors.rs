//! Error types produced by rate limiters, quota stores and policy tables.

use std::fmt;
use std::time::Duration;

/// Error indicating that a quota could not be constructed from the
/// parameters it was given.
///
/// Quotas are validated when they are built, so a configuration error
/// surfaces once, at configuration time, and never from a rate-limiting
/// decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidConfiguration {
    /// The number of admitted requests per window was zero.
    ZeroLimit,

    /// The window was zero seconds long.
    ZeroWindow,

    /// The limit does not fit the range the store can count to.
    LimitTooLarge(u64),

    /// The window is longer than [`Quota::MAX_WINDOW`][crate::Quota::MAX_WINDOW].
    WindowTooLarge(Duration),

    /// A policy table names a tier it has no policy for.
    UnknownTier(String),
}

impl fmt::Display for InvalidConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidConfiguration::ZeroLimit => write!(f, "rate limit must admit at least one request"),
            InvalidConfiguration::ZeroWindow => write!(f, "rate limit window must not be empty"),
            InvalidConfiguration::LimitTooLarge(limit) => {
                write!(f, "rate limit {} exceeds the maximum of {}", limit, u32::MAX)
            }
            InvalidConfiguration::WindowTooLarge(window) => write!(
                f,
                "rate limit window of {}s exceeds the maximum of {}s",
                window.as_secs(),
                crate::Quota::MAX_WINDOW.as_secs()
            ),
            InvalidConfiguration::UnknownTier(tier) => write!(f, "no policy for tier {:?}", tier),
        }
    }
}

impl std::error::Error for InvalidConfiguration {}

/// Error indicating that the quota store could not answer.
///
/// This is not a rate-limiting decision: whether the request in question
/// should be admitted is up to the caller's
/// [`FailurePolicy`][crate::FailurePolicy].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreUnavailable {
    reason: String,
}

impl StoreUnavailable {
    /// Constructs an error with a human-readable reason.
    pub fn new(reason: impl Into<String>) -> Self {
        StoreUnavailable {
            reason: reason.into(),
        }
    }

    /// The reason the store gave for failing.
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl fmt::Display for StoreUnavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "quota store unavailable: {}", self.reason)
    }
}

impl std::error::Error for StoreUnavailable {}

/// Error indicating that one or more rate-limiting policies refused a
/// request.
///
/// The caller can always recover by waiting `retry_after` and trying again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaExceeded {
    policies: Vec<String>,
    retry_after: Duration,
}

impl QuotaExceeded {
    /// Constructs the error for a set of violated policy names.
    pub fn new(policies: Vec<String>, retry_after: Duration) -> Self {
        QuotaExceeded {
            policies,
            retry_after,
        }
    }

    /// Names of the policies that were violated.
    pub fn policies(&self) -> &[String] {
        &self.policies
    }

    /// Minimum amount of time to wait before retrying.
    pub fn retry_after(&self) -> Duration {
        self.retry_after
    }
}

impl fmt::Display for QuotaExceeded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "quota exceeded for {}; retry after {:?}",
            self.policies.join(", "),
            self.retry_after
        )
    }
}

impl std::error::Error for QuotaExceeded {}

/// Any of the errors a rate-limited call site can run into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitError {
    /// A policy refused the request.
    QuotaExceeded(QuotaExceeded),

    /// The quota store failed, and the failure policy did not resolve it.
    StoreUnavailable(StoreUnavailable),

    /// A policy was configured with degenerate parameters.
    InvalidConfiguration(InvalidConfiguration),
}

impl fmt::Display for RateLimitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateLimitError::QuotaExceeded(e) => e.fmt(f),
            RateLimitError::StoreUnavailable(e) => e.fmt(f),
            RateLimitError::InvalidConfiguration(e) => e.fmt(f),
        }
    }
}

impl std::error::Error for RateLimitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RateLimitError::QuotaExceeded(e) => Some(e),
            RateLimitError::StoreUnavailable(e) => Some(e),
            RateLimitError::InvalidConfiguration(e) => Some(e),
        }
    }
}

impl From<QuotaExceeded> for RateLimitError {
    fn from(e: QuotaExceeded) -> Self {
        RateLimitError::QuotaExceeded(e)
    }
}

impl From<StoreUnavailable> for RateLimitError {
    fn from(e: StoreUnavailable) -> Self {
        RateLimitError::StoreUnavailable(e)
    }
}

impl From<InvalidConfiguration> for RateLimitError {
    fn from(e: InvalidConfiguration) -> Self {
        RateLimitError::InvalidConfiguration(e)
    }
}
