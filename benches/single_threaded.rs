use criterion::{black_box, BenchmarkId, Criterion, Throughput};
use nonzero_ext::*;
use ratewindow::{clock, Algorithm, FixedWindow, Quota, RateLimiter, SlidingWindow};
use std::any::type_name;
use std::time::Duration;

pub fn bench_all(c: &mut Criterion) {
    bench_algorithm::<FixedWindow>(c);
    bench_algorithm::<SlidingWindow>(c);
}

fn bench_algorithm<A: Algorithm>(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_threaded");
    group.throughput(Throughput::Elements(1));
    group.bench_function(BenchmarkId::new("check", type_name::<A>()), |b| {
        let clock = clock::FakeRelativeClock::default();
        let lim = RateLimiter::hashmap_with_clock(clock.clone()).with_algorithm::<A>();
        let quota = Quota::per_second(nonzero!(1_000u32));
        let us = Duration::from_micros(1);
        b.iter(|| {
            clock.advance(us);
            black_box(lim.check("user:1", &quota).is_ok());
        });
    });
    group.finish();
}
