//! # A more in-depth guide to `ratewindow`
//!
//! This guide walks through the pieces a service needs to put a rate limit
//! in front of its endpoints: quotas, keys, limiters, and the metadata that
//! goes back to the client.
//!
//! # Constructing a rate limiter
//!
//! Construction of rate limiters is designed to be mostly infallible,
//! given correctly-constructed parameters. To that end, `ratewindow`
//! makes heavy use of the [`NonZeroU32`][std::num::NonZeroU32] type.
//!
//! To conveniently construct these nonzero numbers, use the
//! [`nonzero!`](../../nonzero_ext/macro.nonzero.html) macro.
//!
//! #### Quotas
//!
//! A quota is a number of requests admitted per window of time. Specify
//! these in a [`Quota`][crate::Quota] object like so:
//!
//! ```rust
//! # use nonzero_ext::*;
//! use ratewindow::Quota;
//! Quota::per_minute(nonzero!(20u32));
//! ```
//!
//! Quotas read from configuration are validated when they are built:
//!
//! ```rust
//! use ratewindow::{InvalidConfiguration, Quota};
//! assert_eq!(Quota::new(0, 60), Err(InvalidConfiguration::ZeroLimit));
//! ```
//!
//! #### Constructing a rate limiter
//!
//! A rate limiter needs a store to keep its counters in, and a clock. The
//! easiest way to get both is [`RateLimiter::keyed`][crate::RateLimiter::keyed],
//! which uses the wall clock and an in-memory store. For tests, use the
//! [`FakeRelativeClock`][crate::clock::FakeRelativeClock], which only moves
//! when told to:
//!
//! ```rust
//! # use nonzero_ext::*;
//! # use std::time::Duration;
//! use ratewindow::{clock::FakeRelativeClock, Quota, RateLimiter};
//! let clock = FakeRelativeClock::default();
//! let lim = RateLimiter::dashmap_with_clock(clock.clone());
//! let quota = Quota::per_second(nonzero!(1u32));
//!
//! assert_eq!(lim.check("ip:10.0.0.1", &quota), Ok(Ok(())));
//! assert!(lim.check("ip:10.0.0.1", &quota).unwrap().is_err());
//! clock.advance(Duration::from_secs(1));
//! assert_eq!(lim.check("ip:10.0.0.1", &quota), Ok(Ok(())));
//! ```
//!
//! #### Choosing an algorithm
//!
//! Rate limiters count in fixed windows by default. Switch to a sliding
//! window log with
//! [`with_algorithm`][crate::RateLimiter::with_algorithm]:
//!
//! ```rust
//! # use nonzero_ext::*;
//! # use std::time::Duration;
//! use ratewindow::{clock::FakeRelativeClock, Quota, RateLimiter, SlidingWindow};
//! let clock = FakeRelativeClock::default();
//! let lim = RateLimiter::hashmap_with_clock(clock.clone()).with_algorithm::<SlidingWindow>();
//! let quota = Quota::per_minute(nonzero!(1u32));
//!
//! clock.advance(Duration::from_secs(59));
//! assert_eq!(lim.check("user:1", &quota), Ok(Ok(())));
//! // A fixed window would have started over at the minute mark:
//! clock.advance(Duration::from_secs(1));
//! assert!(lim.check("user:1", &quota).unwrap().is_err());
//! ```
//!
//! # Sharing a rate limiter
//!
//! All of a rate limiter's methods take `&self`, so a limiter can be
//! shared between threads by wrapping it in an [`Arc`][std::sync::Arc].
//! Decisions for the same key made on different threads never admit more
//! requests than the quota allows.
//!
//! # Keeping memory bounded
//!
//! State for a key expires one window (plus a second of grace) after its
//! last write. Expired state is ignored by every decision, and the
//! in-memory stores drop expired keys while they are being written to, at
//! most once per expiry period. Call
//! [`retain_unexpired`][crate::RateLimiter::retain_unexpired] to drop them
//! right away, e.g. before a quiet period.
//!
//! # Telling clients about limits
//!
//! The [`headers`][crate::headers] module renders decisions as response
//! headers and, for denials, a structured refusal body:
//!
//! ```rust
//! # use nonzero_ext::*;
//! use ratewindow::{clock::FakeRelativeClock, headers::{RateLimitHeaders, Refusal}, Quota, RateLimiter};
//! let lim = RateLimiter::hashmap_with_clock(FakeRelativeClock::default());
//! let quota = Quota::per_minute(nonzero!(1u32));
//! lim.evaluate("user:1", &quota).unwrap();
//!
//! let denied = lim.evaluate("user:1", &quota).unwrap();
//! let headers = RateLimitHeaders::from_result("free", &denied);
//! let refusal = Refusal::from_result("free", &denied).unwrap();
//! assert_eq!(headers.get("Retry-After"), Some("60"));
//! assert_eq!(refusal.retry_after, 60);
//! ```
