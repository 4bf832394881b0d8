//! Response metadata for rate-limited requests.
//!
//! This module turns decisions into what a client gets to see: the
//! policy and usage descriptors of the IETF `RateLimit-Policy` and
//! `RateLimit` header fields, the legacy `X-RateLimit-*` headers, and a
//! structured [`Refusal`] body for denied requests. Nothing here knows
//! about HTTP libraries; headers come out as name/value string pairs.
//!
//! ```rust
//! # use nonzero_ext::nonzero;
//! use ratewindow::{clock::FakeRelativeClock, headers::RateLimitHeaders, Quota, RateLimiter};
//! let lim = RateLimiter::hashmap_with_clock(FakeRelativeClock::default());
//! let quota = Quota::per_hour(nonzero!(100u32));
//! let result = lim.evaluate("user:1", &quota).unwrap();
//!
//! let headers = RateLimitHeaders::from_result("free", &result);
//! assert_eq!(headers.get("RateLimit-Policy"), Some("\"free\";q=100;w=3600"));
//! assert_eq!(headers.get("RateLimit"), Some("\"free\";r=99;t=3600"));
//! assert_eq!(headers.get("Retry-After"), None);
//! ```

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::clock;
use crate::errors::QuotaExceeded;
use crate::limiter::{ceil_secs, RateLimitResult};
use crate::policy::ChainOutcome;
use crate::Quota;

/// Header carrying the policy descriptors.
pub const RATELIMIT_POLICY: &str = "RateLimit-Policy";
/// Header carrying the usage descriptor.
pub const RATELIMIT: &str = "RateLimit";
/// Legacy header carrying the limit.
pub const X_RATELIMIT_LIMIT: &str = "X-RateLimit-Limit";
/// Legacy header carrying the remaining requests.
pub const X_RATELIMIT_REMAINING: &str = "X-RateLimit-Remaining";
/// Legacy header carrying the seconds until the quota resets.
pub const X_RATELIMIT_RESET: &str = "X-RateLimit-Reset";
/// Header carrying the seconds to wait before retrying a denied request.
pub const RETRY_AFTER: &str = "Retry-After";

/// A quota policy, as advertised to clients: `"<name>";q=<quota>;w=<window>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PolicyDescriptor {
    /// The policy's name.
    pub name: String,
    /// Requests admitted per window.
    pub quota: u32,
    /// Window length in whole seconds.
    pub window_secs: u64,
}

impl PolicyDescriptor {
    /// Describes `quota` under the name `name`.
    pub fn new(name: impl Into<String>, quota: &Quota) -> Self {
        PolicyDescriptor {
            name: name.into(),
            quota: quota.limit().get(),
            window_secs: quota.window_secs(),
        }
    }
}

impl fmt::Display for PolicyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\";q={};w={}", self.name, self.quota, self.window_secs)
    }
}

/// A subject's current standing under a policy:
/// `"<name>";r=<remaining>;t=<reset>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct UsageDescriptor {
    /// The policy's name.
    pub name: String,
    /// Requests left in the current window.
    pub remaining: u32,
    /// Whole seconds until the quota replenishes, rounded up.
    pub reset_secs: u64,
}

impl UsageDescriptor {
    /// Describes the standing reported by `result`.
    pub fn from_result<P: clock::Reference>(name: impl Into<String>, result: &RateLimitResult<P>) -> Self {
        UsageDescriptor {
            name: name.into(),
            remaining: result.remaining(),
            reset_secs: result.seconds_to_reset(),
        }
    }
}

impl fmt::Display for UsageDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\";r={};t={}", self.name, self.remaining, self.reset_secs)
    }
}

/// Machine-readable classification of a refusal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RefusalReason {
    /// A rate-limiting quota was exhausted.
    #[cfg_attr(feature = "serde", serde(rename = "rate_limit_exceeded"))]
    QuotaExceeded,
}

impl RefusalReason {
    /// The reason as it appears in refusal bodies.
    pub fn as_str(&self) -> &'static str {
        match self {
            RefusalReason::QuotaExceeded => "rate_limit_exceeded",
        }
    }
}

impl fmt::Display for RefusalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The body of a response refusing a request.
///
/// `retry_after` always carries the same number of seconds as the
/// `Retry-After` header produced for the same decision.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Refusal {
    /// Always [`RefusalReason::QuotaExceeded`].
    pub error: RefusalReason,
    /// A human-readable explanation.
    pub message: String,
    /// Names of the violated policies.
    pub policies: Vec<String>,
    /// Whole seconds to wait before retrying.
    pub retry_after: u64,
}

impl Refusal {
    fn new(policies: Vec<String>, retry_after: u64) -> Self {
        let message = format!(
            "Rate limit exceeded for {}. Try again in {} seconds.",
            policies.join(", "),
            retry_after
        );
        Refusal {
            error: RefusalReason::QuotaExceeded,
            message,
            policies,
            retry_after,
        }
    }

    /// Describes a denial by the policy `name`. Returns `None` if `result`
    /// admitted the request.
    pub fn from_result<P: clock::Reference>(name: &str, result: &RateLimitResult<P>) -> Option<Self> {
        result
            .retry_after_secs()
            .map(|secs| Refusal::new(vec![name.to_owned()], secs))
    }
}

impl From<&QuotaExceeded> for Refusal {
    fn from(e: &QuotaExceeded) -> Self {
        Refusal::new(e.policies().to_vec(), ceil_secs(e.retry_after()).max(1))
    }
}

impl From<QuotaExceeded> for Refusal {
    fn from(e: QuotaExceeded) -> Self {
        Refusal::from(&e)
    }
}

/// Rate-limiting response headers, as name/value pairs in a stable order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RateLimitHeaders {
    pairs: Vec<(&'static str, String)>,
}

impl RateLimitHeaders {
    /// The headers describing one policy's decision.
    ///
    /// `Retry-After` is only present for denials.
    pub fn from_result<P: clock::Reference>(name: &str, result: &RateLimitResult<P>) -> Self {
        let policy = PolicyDescriptor::new(name, &result.quota());
        Self::build(policy.to_string(), name, result)
    }

    /// The headers describing every policy a [`PolicyChain`][crate::PolicyChain]
    /// evaluated.
    ///
    /// `RateLimit-Policy` lists every evaluated policy; the usage and legacy
    /// headers report the binding one (see [`ChainOutcome::binding`]).
    pub fn from_outcome<P: clock::Reference>(outcome: &ChainOutcome<P>) -> Self {
        let policies = outcome
            .results()
            .iter()
            .map(|(name, r)| PolicyDescriptor::new(name.as_str(), &r.quota()).to_string())
            .collect::<Vec<_>>()
            .join(", ");
        let (name, result) = outcome.binding();
        Self::build(policies, name, result)
    }

    fn build<P: clock::Reference>(policies: String, name: &str, result: &RateLimitResult<P>) -> Self {
        let usage = UsageDescriptor::from_result(name, result);
        let mut pairs = vec![
            (RATELIMIT_POLICY, policies),
            (RATELIMIT, usage.to_string()),
            (X_RATELIMIT_LIMIT, result.limit().to_string()),
            (X_RATELIMIT_REMAINING, result.remaining().to_string()),
            (X_RATELIMIT_RESET, result.seconds_to_reset().to_string()),
        ];
        if let Some(secs) = result.retry_after_secs() {
            pairs.push((RETRY_AFTER, secs.to_string()));
        }
        RateLimitHeaders { pairs }
    }

    /// Looks up a header value by exact name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Iterates over the header pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.pairs.iter().map(|(n, v)| (*n, v.as_str()))
    }
}

impl IntoIterator for RateLimitHeaders {
    type Item = (&'static str, String);
    type IntoIter = std::vec::IntoIter<(&'static str, String)>;

    fn into_iter(self) -> Self::IntoIter {
        self.pairs.into_iter()
    }
}
