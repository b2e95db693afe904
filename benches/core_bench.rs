use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rug::Integer;

use eisensieve::atkin;
use eisensieve::eisenstein;
use eisensieve::qs::{quadratic_sieve, QsParams};
use eisensieve::sieve;

fn bench_generate_primes_1m(c: &mut Criterion) {
    c.bench_function("generate_primes(1_000_000)", |b| {
        b.iter(|| sieve::generate_primes(black_box(1_000_000)));
    });
}

fn bench_atkin_segment_1m(c: &mut Criterion) {
    c.bench_function("atkin::sieve_segment(0, 1_000_000)", |b| {
        b.iter(|| atkin::sieve_segment(black_box(0), black_box(1_000_000)));
    });
}

fn bench_atkin_high_segment(c: &mut Criterion) {
    c.bench_function("atkin::sieve_segment(10^9, 100_000)", |b| {
        b.iter(|| atkin::sieve_segment(black_box(1_000_000_000), black_box(100_000)));
    });
}

fn bench_qs_small_semiprime(c: &mut Criterion) {
    let params = QsParams {
        fb_bound: 30,
        sieve_len: 200,
        ..QsParams::default()
    };
    c.bench_function("quadratic_sieve(15347, b=30, t=200)", |b| {
        b.iter(|| quadratic_sieve(black_box(&Integer::from(15347u32)), &params, None));
    });
}

fn bench_qs_medium_semiprime(c: &mut Criterion) {
    // 1009·1013
    let n = Integer::from(1_022_117u32);
    let params = QsParams {
        fb_bound: 200,
        sieve_len: 4_000,
        ..QsParams::default()
    };
    c.bench_function("quadratic_sieve(1022117, b=200, t=4000)", |b| {
        b.iter(|| quadratic_sieve(black_box(&n), &params, None));
    });
}

fn bench_eisenstein_primes(c: &mut Criterion) {
    c.bench_function("eisenstein::primes(norm ≤ 10_000)", |b| {
        b.iter(|| eisenstein::primes(black_box(10_000)).count());
    });
}

criterion_group!(
    benches,
    bench_generate_primes_1m,
    bench_atkin_segment_1m,
    bench_atkin_high_segment,
    bench_qs_small_semiprime,
    bench_qs_medium_semiprime,
    bench_eisenstein_primes,
);
criterion_main!(benches);
