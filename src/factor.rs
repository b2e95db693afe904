//! # Rational-integer factorisation
//!
//! Trial division over the small primes, then Pollard's rho with Floyd cycle
//! detection and Miller–Rabin recursion for what remains. This is the
//! workhorse for moderate inputs — Eisenstein norms and the p − 1 orders of
//! the primitive-root test — not a competitor to the quadratic sieve, which
//! handles the inputs this method would stall on.

use rug::Integer;
use tracing::debug;

/// Trial-division depth before handing the remainder to rho.
const TRIAL_LIMIT: u64 = 10_000;

/// Miller–Rabin rounds used to classify rho split products.
const MR_ROUNDS: u32 = 30;

/// Iteration cap for one rho polynomial before reseeding.
const RHO_ITERATIONS: u32 = 1 << 22;

/// Factor a positive integer into ascending (prime, exponent) pairs.
///
/// # Panics
/// Panics if `n < 1` — the caller owns that check.
pub fn factorise(n: &Integer) -> Vec<(Integer, u32)> {
    assert!(*n >= 1u32, "factorise requires a positive integer");
    let mut out: Vec<(Integer, u32)> = Vec::new();
    let mut m = n.clone();
    if m == 1u32 {
        return out;
    }

    for p in crate::sieve::generate_primes(TRIAL_LIMIT) {
        let pb = Integer::from(p);
        if Integer::from(&pb * &pb) > m {
            break;
        }
        let mut e = 0u32;
        while m.is_divisible(&pb) {
            m = Integer::from(&m / &pb);
            e += 1;
        }
        if e > 0 {
            out.push((pb, e));
        }
    }

    if m > 1u32 {
        let mut stack = vec![m];
        let mut large: Vec<Integer> = Vec::new();
        while let Some(c) = stack.pop() {
            if c.is_probably_prime(MR_ROUNDS) != rug::integer::IsPrime::No {
                large.push(c);
                continue;
            }
            let f = rho_split(&c);
            let g = Integer::from(&c / &f);
            stack.push(f);
            stack.push(g);
        }
        large.sort();
        for p in large {
            match out.iter_mut().find(|(q, _)| *q == p) {
                Some((_, e)) => *e += 1,
                None => out.push((p, 1)),
            }
        }
    }

    out.sort_by(|a, b| a.0.cmp(&b.0));
    out
}

/// True when `n` is one of the (prime, exponent) products, i.e. prime.
pub fn is_prime(n: &Integer) -> bool {
    *n > 1u32 && n.is_probably_prime(MR_ROUNDS) != rug::integer::IsPrime::No
}

/// Find one nontrivial factor of an odd composite with no small factors.
///
/// Pollard rho, x ← x² + c (mod n), Floyd tortoise-and-hare, retrying with
/// successive increments c when a cycle closes without a factor.
fn rho_split(n: &Integer) -> Integer {
    debug_assert!(n.is_odd() && *n > 1u32);
    // A square slips through rho's gcd trick; peel it directly.
    if n.is_perfect_square() {
        return n.clone().sqrt();
    }

    for c in 1u32.. {
        let cb = Integer::from(c);
        let mut x = Integer::from(2u32);
        let mut y = Integer::from(2u32);
        let step = |v: &Integer| -> Integer {
            (Integer::from(v * v) + &cb) % n
        };
        for _ in 0..RHO_ITERATIONS {
            x = step(&x);
            y = step(&step(&y));
            let d = Integer::from(&x - &y).abs().gcd(n);
            if d != 1u32 {
                if d != *n {
                    return d;
                }
                break; // cycle collapsed; new increment
            }
        }
        debug!(c, "rho cycle closed without a factor, reseeding");
    }
    unreachable!("rho increments are unbounded")
}
