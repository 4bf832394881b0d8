use nonzero_ext::nonzero;
use ratewindow::{
    clock::FakeRelativeClock, headers::RateLimitHeaders, Policy, PolicyChain, PolicyResolver,
    Quota, RateLimitKey, RateLimiter, StaticPolicies,
};
use std::time::Duration;

fn chain() -> PolicyChain {
    PolicyChain::new(Policy::new("free", Quota::per_minute(nonzero!(3u32))))
        .with_endpoint("search", Policy::new("search", Quota::per_minute(nonzero!(1u32))))
}

#[test]
fn general_then_endpoint() {
    let lim = RateLimiter::hashmap_with_clock(FakeRelativeClock::default());
    let user = RateLimitKey::user(7);
    let chain = chain();

    let first = chain.check(&lim, &user, Some("search")).unwrap();
    assert!(first.is_allowed());
    let names: Vec<_> = first.results().iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, ["free", "search"]);

    let second = chain.check(&lim, &user, Some("search")).unwrap();
    assert!(!second.is_allowed());
    assert_eq!(second.denied_by(), Some("search"));
    let e = second.into_result().unwrap_err();
    assert_eq!(e.policies(), ["search"]);
    assert_eq!(e.retry_after(), Duration::from_secs(60));
}

#[test]
fn general_denials_do_not_touch_endpoint_counters() {
    let lim = RateLimiter::hashmap_with_clock(FakeRelativeClock::default());
    let user = RateLimitKey::user(7);
    let chain = chain();

    for _ in 0..3 {
        assert!(chain.check(&lim, &user, None).unwrap().is_allowed());
    }
    for _ in 0..5 {
        let outcome = chain.check(&lim, &user, Some("search")).unwrap();
        assert_eq!(outcome.denied_by(), Some("free"));
        assert_eq!(outcome.results().len(), 1);
    }

    let endpoint_key = RateLimitKey::endpoint("search", &user);
    let peeked = lim
        .peek(&endpoint_key, chain.endpoint("search").unwrap().quota())
        .unwrap();
    assert_eq!(peeked, Ok(()), "endpoint counter is still untouched");
}

#[test]
fn endpoints_without_policy_use_general_only() {
    let lim = RateLimiter::hashmap_with_clock(FakeRelativeClock::default());
    let chain = chain();
    for _ in 0..3 {
        let outcome = chain.check(&lim, "ip:192.0.2.1", Some("profile")).unwrap();
        assert!(outcome.is_allowed());
        assert_eq!(outcome.results().len(), 1);
    }
    assert!(chain.endpoint("profile").is_none());
    assert_eq!(chain.general().name(), "free");
}

#[test]
fn binding_result_drives_headers() {
    let lim = RateLimiter::hashmap_with_clock(FakeRelativeClock::default());
    let user = RateLimitKey::user(7);
    let chain = chain();

    let outcome = chain.check(&lim, &user, Some("search")).unwrap();
    let (name, result) = outcome.binding();
    assert_eq!(name, "search");
    assert_eq!(result.remaining(), 0);

    let headers = RateLimitHeaders::from_outcome(&outcome);
    assert_eq!(
        headers.get("RateLimit-Policy"),
        Some("\"free\";q=3;w=60, \"search\";q=1;w=60")
    );
    assert_eq!(headers.get("RateLimit"), Some("\"search\";r=0;t=60"));

    let denied = chain.check(&lim, &user, Some("search")).unwrap();
    let headers = RateLimitHeaders::from_outcome(&denied);
    assert_eq!(headers.get("Retry-After"), Some("60"));
}

#[test]
fn tiers_resolve_into_chains() {
    let tiers = StaticPolicies::from_table("free", [("free", 2, 60), ("pro", 100, 60)]).unwrap();
    let lim = RateLimiter::hashmap_with_clock(FakeRelativeClock::default());
    let search = Policy::new("search", Quota::per_minute(nonzero!(50u32)));

    let pro = PolicyChain::new(tiers.resolve("pro").unwrap()).with_endpoint("search", search.clone());
    let free = PolicyChain::new(tiers.resolve("free").unwrap()).with_endpoint("search", search);

    for _ in 0..10 {
        assert!(pro.check(&lim, "user:pro", Some("search")).unwrap().is_allowed());
    }
    assert!(free.check(&lim, "user:free", Some("search")).unwrap().is_allowed());
    assert!(free.check(&lim, "user:free", Some("search")).unwrap().is_allowed());
    assert_eq!(
        free.check(&lim, "user:free", Some("search")).unwrap().denied_by(),
        Some("free")
    );
}
