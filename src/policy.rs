//! Naming subjects, resolving their quotas, and composing general and
//! per-endpoint limits.
//!
//! A request is typically subject to two policies: the general policy of
//! its subject's tier, and optionally a stricter policy for the endpoint it
//! calls. [`PolicyChain`] evaluates them in that order against one
//! [`RateLimiter`], so endpoint counters never see requests that the general
//! policy already refused.
//!
//! ```rust
//! # use nonzero_ext::nonzero;
//! use ratewindow::{clock::FakeRelativeClock, Policy, PolicyChain, Quota, RateLimitKey, RateLimiter};
//!
//! let lim = RateLimiter::hashmap_with_clock(FakeRelativeClock::default());
//! let chain = PolicyChain::new(Policy::new("free", Quota::per_minute(nonzero!(100u32))))
//!     .with_endpoint("search", Policy::new("search", Quota::per_minute(nonzero!(1u32))));
//! let user = RateLimitKey::user(42);
//!
//! assert!(chain.check(&lim, &user, Some("search")).unwrap().is_allowed());
//! let outcome = chain.check(&lim, &user, Some("search")).unwrap();
//! assert_eq!(outcome.denied_by(), Some("search"));
//! // Other endpoints only answer to the general policy:
//! assert!(chain.check(&lim, &user, Some("profile")).unwrap().is_allowed());
//! ```

use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use std::time::Duration;

use crate::clock;
use crate::errors::{InvalidConfiguration, QuotaExceeded, StoreUnavailable};
use crate::limiter::{Algorithm, RateLimitResult, RateLimiter};
use crate::middleware::RateLimitingMiddleware;
use crate::store::QuotaStore;
use crate::Quota;

/// The name of a rate-limited subject, as used for keys in a
/// [`QuotaStore`].
///
/// Distinct keys never share accounting. The constructors produce the
/// conventional namespaced forms, and any other string can be wrapped with
/// [`From`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RateLimitKey(String);

impl RateLimitKey {
    /// The key for an authenticated user: `user:<id>`.
    pub fn user(id: impl fmt::Display) -> Self {
        RateLimitKey(format!("user:{}", id))
    }

    /// The key for an anonymous client address: `ip:<addr>`.
    pub fn ip(addr: impl fmt::Display) -> Self {
        RateLimitKey(format!("ip:{}", addr))
    }

    /// The key for a subject's use of one endpoint:
    /// `endpoint:<name>:<identity>`.
    pub fn endpoint(name: &str, identity: &str) -> Self {
        RateLimitKey(format!("endpoint:{}:{}", name, identity))
    }

    /// The key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for RateLimitKey {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for RateLimitKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for RateLimitKey {
    fn from(s: String) -> Self {
        RateLimitKey(s)
    }
}

impl From<&str> for RateLimitKey {
    fn from(s: &str) -> Self {
        RateLimitKey(s.to_owned())
    }
}

impl From<RateLimitKey> for String {
    fn from(k: RateLimitKey) -> Self {
        k.0
    }
}

impl fmt::Display for RateLimitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A named quota.
///
/// The name identifies the policy in response metadata and refusals, e.g.
/// `"free"` or `"search"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Policy {
    name: String,
    quota: Quota,
}

impl Policy {
    /// Constructs a named policy.
    pub fn new(name: impl Into<String>, quota: Quota) -> Self {
        Policy {
            name: name.into(),
            quota,
        }
    }

    /// The policy's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The quota the policy enforces.
    pub fn quota(&self) -> &Quota {
        &self.quota
    }
}

/// Maps an identity (a tier name, an API key, a request...) to the policy
/// that applies to it.
///
/// Closures of the right shape are resolvers:
///
/// ```rust
/// # use nonzero_ext::nonzero;
/// use ratewindow::{InvalidConfiguration, Policy, PolicyResolver, Quota};
/// let resolver = |admin: &bool| -> Result<Policy, InvalidConfiguration> {
///     let limit = if *admin { nonzero!(1000u32) } else { nonzero!(10u32) };
///     Ok(Policy::new("default", Quota::per_minute(limit)))
/// };
/// assert_eq!(resolver.resolve(&true).unwrap().quota().limit().get(), 1000);
/// ```
pub trait PolicyResolver<I: ?Sized> {
    /// Returns the policy for `identity`.
    fn resolve(&self, identity: &I) -> Result<Policy, InvalidConfiguration>;
}

impl<I, F> PolicyResolver<I> for F
where
    I: ?Sized,
    F: Fn(&I) -> Result<Policy, InvalidConfiguration>,
{
    fn resolve(&self, identity: &I) -> Result<Policy, InvalidConfiguration> {
        self(identity)
    }
}

/// A fixed table of policies by tier name, with a fallback tier.
///
/// ```rust
/// use ratewindow::{PolicyResolver, StaticPolicies};
/// let tiers = StaticPolicies::from_table("free", [("free", 100, 3600), ("pro", 1000, 3600)]).unwrap();
/// assert_eq!(tiers.resolve("pro").unwrap().quota().limit().get(), 1000);
/// assert_eq!(tiers.resolve("unheard-of").unwrap().name(), "free");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticPolicies {
    tiers: HashMap<String, Policy>,
    default_tier: String,
}

impl StaticPolicies {
    /// Constructs a table holding only the fallback tier. The fallback tier
    /// is named after its policy.
    pub fn new(default: Policy) -> Self {
        let default_tier = default.name().to_owned();
        let mut tiers = HashMap::new();
        tiers.insert(default_tier.clone(), default);
        StaticPolicies {
            tiers,
            default_tier,
        }
    }

    /// Adds (or replaces) the policy for a tier.
    pub fn with_tier(mut self, tier: impl Into<String>, policy: Policy) -> Self {
        self.tiers.insert(tier.into(), policy);
        self
    }

    /// Builds a table from `(tier, limit, window_seconds)` rows. Every policy
    /// is named after its tier.
    ///
    /// Fails on the first row that does not make a valid [`Quota`], or if
    /// `default_tier` has no row.
    pub fn from_table<I, T>(default_tier: &str, rows: I) -> Result<Self, InvalidConfiguration>
    where
        I: IntoIterator<Item = (T, u64, u64)>,
        T: Into<String>,
    {
        let mut tiers = HashMap::new();
        for (tier, limit, window_seconds) in rows {
            let tier: String = tier.into();
            let policy = Policy::new(tier.clone(), Quota::new(limit, window_seconds)?);
            tiers.insert(tier, policy);
        }
        if !tiers.contains_key(default_tier) {
            return Err(InvalidConfiguration::UnknownTier(default_tier.to_owned()));
        }
        Ok(StaticPolicies {
            tiers,
            default_tier: default_tier.to_owned(),
        })
    }

    /// The name of the tier used for identities without a row.
    pub fn default_tier(&self) -> &str {
        &self.default_tier
    }
}

impl PolicyResolver<str> for StaticPolicies {
    fn resolve(&self, tier: &str) -> Result<Policy, InvalidConfiguration> {
        self.tiers
            .get(tier)
            .or_else(|| self.tiers.get(&self.default_tier))
            .cloned()
            .ok_or_else(|| InvalidConfiguration::UnknownTier(self.default_tier.clone()))
    }
}

/// A general policy plus stricter per-endpoint policies, evaluated in that
/// order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyChain {
    general: Policy,
    endpoints: HashMap<String, Policy>,
}

impl PolicyChain {
    /// Constructs a chain that applies `general` to every request.
    pub fn new(general: Policy) -> Self {
        PolicyChain {
            general,
            endpoints: HashMap::new(),
        }
    }

    /// Additionally applies `policy` to requests for the endpoint `name`.
    pub fn with_endpoint(mut self, name: impl Into<String>, policy: Policy) -> Self {
        self.endpoints.insert(name.into(), policy);
        self
    }

    /// The policy applied to every request.
    pub fn general(&self) -> &Policy {
        &self.general
    }

    /// The additional policy for an endpoint, if there is one.
    pub fn endpoint(&self, name: &str) -> Option<&Policy> {
        self.endpoints.get(name)
    }

    /// Evaluates a request by `identity`, optionally for `endpoint`.
    ///
    /// The general policy is checked against `identity` first. Only if it
    /// admits the request, and the endpoint has a policy of its own, is that
    /// policy checked against [`RateLimitKey::endpoint`]. Both must admit
    /// the request for it to be admitted.
    pub fn check<S, C, A, MW>(
        &self,
        limiter: &RateLimiter<S, C, A, MW>,
        identity: &str,
        endpoint: Option<&str>,
    ) -> Result<ChainOutcome<C::Instant>, StoreUnavailable>
    where
        S: QuotaStore,
        C: clock::Clock,
        A: Algorithm,
        MW: RateLimitingMiddleware<C::Instant>,
    {
        let general = limiter.evaluate(identity, self.general.quota())?;
        let mut results = vec![(self.general.name.clone(), general)];
        if general.is_allowed() {
            if let Some((name, policy)) =
                endpoint.and_then(|name| self.endpoints.get(name).map(|p| (name, p)))
            {
                let key = RateLimitKey::endpoint(name, identity);
                let result = limiter.evaluate(&key, policy.quota())?;
                results.push((policy.name.clone(), result));
            }
        }
        Ok(ChainOutcome { results })
    }
}

/// The results of every policy a [`PolicyChain`] evaluated for one request,
/// in evaluation order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainOutcome<P: clock::Reference> {
    results: Vec<(String, RateLimitResult<P>)>,
}

impl<P: clock::Reference> ChainOutcome<P> {
    /// Whether every evaluated policy admitted the request.
    pub fn is_allowed(&self) -> bool {
        self.results.iter().all(|(_, r)| r.is_allowed())
    }

    /// The policy names and results, in evaluation order.
    pub fn results(&self) -> &[(String, RateLimitResult<P>)] {
        &self.results
    }

    /// The name of the policy that refused the request, if any.
    pub fn denied_by(&self) -> Option<&str> {
        self.results
            .iter()
            .find(|(_, r)| !r.is_allowed())
            .map(|(name, _)| name.as_str())
    }

    /// The result to report to the client: the refusal if there was one,
    /// otherwise the result with the fewest remaining requests.
    pub fn binding(&self) -> (&str, &RateLimitResult<P>) {
        let (name, result) = self
            .results
            .iter()
            .find(|(_, r)| !r.is_allowed())
            .or_else(|| self.results.iter().min_by_key(|(_, r)| r.remaining()))
            .unwrap_or(&self.results[0]);
        (name, result)
    }

    /// Converts a refusal into a [`QuotaExceeded`] error.
    pub fn into_result(self) -> Result<Self, QuotaExceeded> {
        let denied: Vec<_> = self.results.iter().filter(|(_, r)| !r.is_allowed()).collect();
        if denied.is_empty() {
            return Ok(self);
        }
        let retry_after = denied
            .iter()
            .filter_map(|(_, r)| r.retry_after())
            .max()
            .unwrap_or(Duration::ZERO);
        let policies = denied.into_iter().map(|(name, _)| name.clone()).collect();
        Err(QuotaExceeded::new(policies, retry_after))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use nonzero_ext::nonzero;

    #[test]
    fn key_forms() {
        assert_eq!(RateLimitKey::user(42).as_str(), "user:42");
        assert_eq!(RateLimitKey::ip("10.0.0.1").as_str(), "ip:10.0.0.1");
        assert_eq!(
            RateLimitKey::endpoint("search", "user:42").to_string(),
            "endpoint:search:user:42"
        );
        assert_eq!(String::from(RateLimitKey::from("custom")), "custom");
        assert_ne!(RateLimitKey::user(1), RateLimitKey::ip(1));
    }

    #[test]
    fn static_policies_fall_back_to_default() {
        let free = Policy::new("free", Quota::per_hour(nonzero!(100u32)));
        let pro = Policy::new("pro", Quota::per_hour(nonzero!(1000u32)));
        let tiers = StaticPolicies::new(free.clone()).with_tier("pro", pro.clone());
        assert_eq!(tiers.default_tier(), "free");
        assert_eq!(tiers.resolve("pro"), Ok(pro));
        assert_eq!(tiers.resolve("enterprise"), Ok(free));
    }

    #[test]
    fn static_policies_validate_rows() {
        assert_eq!(
            StaticPolicies::from_table("free", [("free", 0, 60)]),
            Err(InvalidConfiguration::ZeroLimit)
        );
        assert_eq!(
            StaticPolicies::from_table("free", [("pro", 10, 60)]),
            Err(InvalidConfiguration::UnknownTier("free".to_string()))
        );
        let tiers = StaticPolicies::from_table("free", vec![("free".to_string(), 10, 60)]).unwrap();
        assert_eq!(tiers.resolve("free").unwrap().quota(), &Quota::new(10, 60).unwrap());
    }

    #[test]
    fn closures_resolve() {
        let resolver = |tier: &str| Quota::new(tier.len() as u64, 60).map(|q| Policy::new(tier, q));
        assert_eq!(resolver.resolve("abc").unwrap().quota().limit().get(), 3);
        assert_eq!(resolver.resolve(""), Err(InvalidConfiguration::ZeroLimit));
    }
}
