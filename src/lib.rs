//! # ratewindow - fixed-window and sliding-window-log rate limiting
//!
//! This crate decides whether a request may proceed, given how many requests
//! the same subject made recently. It implements two algorithms:
//!
//! * [`FixedWindow`] counts requests in windows aligned to the clock's
//!   epoch. It is cheap (one counter per subject and window), but admits up
//!   to twice the limit across a window boundary.
//! * [`SlidingWindow`] keeps a log of admitted request times and enforces
//!   the limit over every window-length interval, at the cost of storing up
//!   to `limit` timestamps per subject.
//!
//! Both keep all of their state in a [`QuotaStore`][store::QuotaStore], and
//! every decision is a single atomic store operation: no two concurrent
//! callers can take the last slot of a window. The in-memory stores shipped
//! here ([`DashMapQuotaStore`][store::DashMapQuotaStore] and
//! [`HashMapQuotaStore`][store::HashMapQuotaStore]) serve a single process;
//! implement the trait over a shared service to limit across processes.
//!
//! # Quick example
//!
//! ```rust
//! # use nonzero_ext::nonzero;
//! use ratewindow::{Quota, RateLimiter};
//!
//! let lim = RateLimiter::keyed();
//! let quota = Quota::per_hour(nonzero!(2u32));
//! assert_eq!(lim.check("user:42", &quota), Ok(Ok(())));
//! assert_eq!(lim.check("user:42", &quota), Ok(Ok(())));
//! assert!(lim.check("user:42", &quota).unwrap().is_err());
//! // Other subjects are unaffected:
//! assert_eq!(lim.check("user:43", &quota), Ok(Ok(())));
//! ```
//!
//! # Decisions and their metadata
//!
//! [`RateLimiter::check`] returns a nested `Result`: the outer one reports
//! whether the store could be consulted at all, the inner one is the
//! decision. Denials carry a [`NotUntil`] telling when to retry; use the
//! [`StateInformationMiddleware`][middleware::StateInformationMiddleware]
//! or [`RateLimiter::evaluate`] to get the full [`RateLimitResult`] for
//! admitted requests as well. The [`headers`] module turns results into
//! response headers and refusal bodies.
//!
//! Limiters hold no quota of their own: the quota is passed on every call,
//! typically resolved from the caller's tier with a [`PolicyResolver`].
//! [`PolicyChain`] composes a general policy with stricter per-endpoint
//! policies.
//!
//! # Store failures
//!
//! A store that can not be reached yields a [`StoreUnavailable`] error
//! rather than a decision. [`RateLimiter::check_or_fallback`] resolves
//! those errors according to the limiter's [`FailurePolicy`], which denies
//! by default.
//!
//! # Usage with `async`
//!
//! [`RateLimiter::until_ready`] returns a future that resolves once a
//! request for a key is admitted, waiting out denials on a timer.
//!
//! # Feature flags
//!
//! * `dashmap` (default): the [`DashMap`][dashmap::DashMap]-backed store.
//! * `jitter` (default): randomized [`Jitter`] for `until_ready_with_jitter`.
//! * `quanta` (default): the [`QuantaClock`][clock::QuantaClock].
//! * `serde`: `Serialize`/`Deserialize` for the [`headers`] types.

#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod clock;
pub mod errors;
pub mod headers;
mod jitter;
pub mod limiter;
pub mod middleware;
pub mod nanos;
pub mod policy;
mod quota;
pub mod store;

pub mod _guide;

pub use errors::*;
pub use jitter::Jitter;
pub use limiter::{Algorithm, FailurePolicy, FixedWindow, RateLimitResult, RateLimiter, SlidingWindow};
pub use middleware::NotUntil;
pub use policy::{ChainOutcome, Policy, PolicyChain, PolicyResolver, RateLimitKey, StaticPolicies};
pub use quota::{Quota, EXPIRY_GRACE};
