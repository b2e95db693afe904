//! # Modular square roots
//!
//! Tonelli–Shanks in two widths: a u64 variant on Montgomery arithmetic for
//! factor-base primes (the quadratic sieve calls it once per prime per run),
//! and an arbitrary-precision variant used when splitting rational primes
//! over Z[ω]. Hensel lifting extends a root mod p to roots mod p^e for the
//! sieve's prime-power lanes.
//!
//! ## Reference
//!
//! - Daniel Shanks, "Five Number-Theoretic Algorithms", Proc. 2nd Manitoba
//!   Conference on Numerical Mathematics, 1972.

use crate::sieve::MontgomeryCtx;
use rug::ops::RemRounding;
use rug::Integer;

/// Square root of `a` modulo an odd prime `p` (or p = 2).
///
/// Returns either of ±√a mod p, or `None` when `a` is a non-residue.
/// Requires `p` prime.
pub fn sqrt_mod_u64(a: u64, p: u64) -> Option<u64> {
    if p == 2 {
        return Some(a % 2);
    }
    let a = a % p;
    if a == 0 {
        return Some(0);
    }

    let ctx = MontgomeryCtx::new(p);
    let a_mont = ctx.to_mont(a);
    let one = ctx.one();

    // Euler's criterion: a^((p−1)/2) must be 1
    if ctx.pow_mod(a_mont, (p - 1) / 2) != one {
        return None;
    }

    if p % 4 == 3 {
        return Some(ctx.from_mont(ctx.pow_mod(a_mont, (p + 1) / 4)));
    }

    // Write p − 1 = q·2^s with q odd
    let s = (p - 1).trailing_zeros();
    let q = (p - 1) >> s;

    // Find a quadratic non-residue z
    let mut z = 2u64;
    while ctx.pow_mod(ctx.to_mont(z), (p - 1) / 2) == one {
        z += 1;
    }

    let mut c = ctx.pow_mod(ctx.to_mont(z), q);
    let mut t = ctx.pow_mod(a_mont, q);
    let mut r = ctx.pow_mod(a_mont, (q + 1) / 2);
    let mut m = s;

    while t != one {
        // Least i with t^(2^i) = 1
        let mut i = 0u32;
        let mut t2 = t;
        while t2 != one {
            t2 = ctx.sqr(t2);
            i += 1;
        }
        debug_assert!(i < m, "non-residue slipped past Euler's criterion");

        let mut b = c;
        for _ in 0..(m - i - 1) {
            b = ctx.sqr(b);
        }
        m = i;
        c = ctx.sqr(b);
        t = ctx.mul(t, c);
        r = ctx.mul(r, b);
    }

    Some(ctx.from_mont(r))
}

/// Arbitrary-precision Tonelli–Shanks: √a mod p for odd prime p.
///
/// Returns either root, or `None` for a non-residue. Requires `p` prime.
pub fn sqrt_mod(a: &Integer, p: &Integer) -> Option<Integer> {
    if *p == 2u32 {
        return Some(Integer::from(a.rem_euc(&Integer::from(2u32))));
    }
    let a = Integer::from(a.rem_euc(p));
    if a == 0u32 {
        return Some(Integer::new());
    }

    let p_minus_1 = Integer::from(p - 1u32);
    let half = Integer::from(&p_minus_1 >> 1u32);
    let legendre = a.clone().pow_mod(&half, p).expect("modulus is positive");
    if legendre != 1u32 {
        return None;
    }

    if p.mod_u(4) == 3 {
        let e = Integer::from(p + 1u32) >> 2u32;
        return Some(a.pow_mod(&e, p).expect("modulus is positive"));
    }

    // p − 1 = q·2^s with q odd
    let s = p_minus_1.find_one(0).expect("p > 1");
    let q = Integer::from(&p_minus_1 >> s);

    // Smallest non-residue; two multiplications per candidate keep this cheap
    let mut z = Integer::from(2u32);
    loop {
        let l = z.clone().pow_mod(&half, p).expect("modulus is positive");
        if l != 1u32 {
            break;
        }
        z += 1u32;
    }

    let mut c = z.pow_mod(&q, p).expect("modulus is positive");
    let mut t = a.clone().pow_mod(&q, p).expect("modulus is positive");
    let q_plus = Integer::from(&q + 1u32) >> 1u32;
    let mut r = a.pow_mod(&q_plus, p).expect("modulus is positive");
    let mut m = s;

    while t != 1u32 {
        let mut i = 0u32;
        let mut t2 = t.clone();
        while t2 != 1u32 {
            t2 = t2.clone().pow_mod(&Integer::from(2u32), p).expect("modulus is positive");
            i += 1;
        }
        debug_assert!(i < m, "non-residue slipped past Euler's criterion");

        let mut b = c.clone();
        for _ in 0..(m - i - 1) {
            b = b.clone().pow_mod(&Integer::from(2u32), p).expect("modulus is positive");
        }
        m = i;
        c = b.clone().pow_mod(&Integer::from(2u32), p).expect("modulus is positive");
        t = Integer::from(&t * &c).rem_euc(p).into();
        r = Integer::from(&r * &b).rem_euc(p).into();
    }

    Some(r)
}

/// Modular inverse by extended Euclid; works for any modulus m > 1.
pub fn inv_mod_u64(a: u64, m: u64) -> Option<u64> {
    let (mut r0, mut r1) = (a as i128 % m as i128, m as i128);
    let (mut s0, mut s1) = (1i128, 0i128);
    while r1 != 0 {
        let q = r0 / r1;
        (r0, r1) = (r1, r0 - q * r1);
        (s0, s1) = (s1, s0 - q * s1);
    }
    if r0.abs() != 1 {
        return None;
    }
    // r0 = ±1; fold the sign into the cofactor
    let s = if r0 < 0 { -s0 } else { s0 };
    Some(s.rem_euclid(m as i128) as u64)
}

/// Lift a root of x² ≡ n (mod pe) to a root mod pe·p, for odd p ∤ 2n.
///
/// `r` must satisfy r² ≡ n (mod pe) with r ≢ 0 (mod p); the lifted root is
/// unique in its ± class.
pub fn lift_sqrt(r: u64, n: &Integer, pe: u64, p: u64) -> u64 {
    let pe_next = pe * p;
    let n_red = mod_u64(n, pe_next);
    // r' = r − (r² − n)·(2r)⁻¹  (mod pe·p)
    let f = (r as i128 * r as i128 - n_red as i128).rem_euclid(pe_next as i128) as u64;
    let inv2r = inv_mod_u64(2 * r % pe_next, pe_next)
        .expect("2r is a unit: p is odd and p does not divide n");
    let delta = (f as u128 * inv2r as u128 % pe_next as u128) as u64;
    (r + pe_next - delta) % pe_next
}

/// Nonnegative residue of an `Integer` modulo a u64.
pub fn mod_u64(n: &Integer, m: u64) -> u64 {
    Integer::from(n.rem_euc(&Integer::from(m)))
        .to_u64()
        .expect("euclidean remainder fits the modulus")
}
