//! # Chinese remainder combinator
//!
//! Combines two congruences x ≡ n₁ (mod m₁), x ≡ n₂ (mod m₂) into a single
//! congruence modulo lcm(m₁, m₂), handling non-coprime moduli: when
//! d = gcd(m₁, m₂) > 1 a solution exists iff d | (n₁ − n₂).
//!
//! Two carriers: `chinese` over arbitrary-precision integers (used by the
//! discrete-log lift, which combines residues modulo p − 1 and p^(k−1)), and
//! `chinese_u64` over machine words (used by the Atkin cross-out phase to
//! locate the first multiple of p² in a wheel residue class).

use rug::ops::RemRounding;
use rug::Integer;

/// Combine x ≡ n₁ (mod m₁) and x ≡ n₂ (mod m₂).
///
/// Returns `Some((n, L))` with L = lcm(m₁, m₂) and n the canonical
/// representative in [0, L), or `None` when the congruences are
/// incompatible. Moduli must be positive.
pub fn chinese(c1: (&Integer, &Integer), c2: (&Integer, &Integer)) -> Option<(Integer, Integer)> {
    let (n1, m1) = c1;
    let (n2, m2) = c2;
    assert!(*m1 > 0u32 && *m2 > 0u32, "chinese: moduli must be positive");

    // d = u·m₁ + v·m₂
    let (d, u, v) = m1.clone().extended_gcd(m2.clone(), Integer::new());

    if d == 1u32 {
        let l = Integer::from(m1 * m2);
        let x = Integer::from(&v * m2) * n1 + Integer::from(&u * m1) * n2;
        return Some((Integer::from(x.rem_euc(&l)), l));
    }

    if !Integer::from(n1 - n2).is_divisible(&d) {
        return None;
    }

    let m1_d = Integer::from(m1 / &d);
    let m2_d = Integer::from(m2 / &d);
    let l = Integer::from(&m1_d * m2);
    let x = Integer::from(&v * &m2_d) * n1 + Integer::from(&u * &m1_d) * n2;
    Some((Integer::from(x.rem_euc(&l)), l))
}

/// Extended Euclid on signed 128-bit words: returns (d, u, v) with
/// d = u·a + v·b and d ≥ 0 for a, b ≥ 0.
fn extended_gcd_i128(a: i128, b: i128) -> (i128, i128, i128) {
    let (mut r0, mut r1) = (a, b);
    let (mut u0, mut u1) = (1i128, 0i128);
    let (mut v0, mut v1) = (0i128, 1i128);
    while r1 != 0 {
        let q = r0 / r1;
        (r0, r1) = (r1, r0 - q * r1);
        (u0, u1) = (u1, u0 - q * u1);
        (v0, v1) = (v1, v0 - q * v1);
    }
    (r0, u0, v0)
}

/// Machine-word twin of [`chinese`].
///
/// Intermediates use i128; suitable when lcm(m₁, m₂)² · max(m₁, m₂) fits in
/// 127 bits, which holds for every sieve-segment use.
pub fn chinese_u64(c1: (u64, u64), c2: (u64, u64)) -> Option<(u64, u64)> {
    let (n1, m1) = (c1.0 as i128, c1.1 as i128);
    let (n2, m2) = (c2.0 as i128, c2.1 as i128);
    assert!(m1 > 0 && m2 > 0, "chinese_u64: moduli must be positive");

    let (d, u, v) = extended_gcd_i128(m1, m2);

    let (l, x) = if d == 1 {
        let l = m1 * m2;
        (l, (v * m2 % l) * (n1 % l) + (u * m1 % l) * (n2 % l))
    } else {
        if (n1 - n2) % d != 0 {
            return None;
        }
        let l = (m1 / d) * m2;
        (l, (v * (m2 / d) % l) * (n1 % l) + (u * (m1 / d) % l) * (n2 % l))
    };

    let x = x.rem_euclid(l);
    Some((x as u64, l as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn big(n: u64) -> Integer {
        Integer::from(n)
    }

    /// x ≡ 1 (mod 2), x ≡ 2 (mod 3) → x ≡ 5 (mod 6).
    #[test]
    fn coprime_moduli() {
        let r = chinese((&big(1), &big(2)), (&big(2), &big(3)));
        assert_eq!(r, Some((big(5), big(6))));
    }

    /// x ≡ 3 (mod 4), x ≡ 5 (mod 6): gcd 2 divides 3 − 5 → x ≡ 11 (mod 12).
    #[test]
    fn compatible_non_coprime_moduli() {
        let r = chinese((&big(3), &big(4)), (&big(5), &big(6)));
        assert_eq!(r, Some((big(11), big(12))));
    }

    /// x ≡ 3 (mod 4), x ≡ 2 (mod 6): gcd 2 does not divide 3 − 2 → no solution.
    #[test]
    fn incompatible_congruences() {
        let r = chinese((&big(3), &big(4)), (&big(2), &big(6)));
        assert_eq!(r, None);
    }

    /// The result is the canonical representative: in [0, L).
    #[test]
    fn result_is_canonical() {
        for n1 in 0u64..6 {
            for n2 in 0u64..10 {
                if let Some((x, l)) = chinese((&big(n1), &big(6)), (&big(n2), &big(10))) {
                    assert!(x >= 0u32 && x < l, "x={} not in [0, {})", x, l);
                    assert_eq!(Integer::from(&x % &big(6)), big(n1));
                    assert_eq!(Integer::from(&x % &big(10)), big(n2));
                    assert_eq!(l, big(30));
                }
            }
        }
    }

    /// Trivial modulus 1 on one side collapses to the other congruence.
    #[test]
    fn unit_modulus() {
        let r = chinese((&big(0), &big(1)), (&big(4), &big(7)));
        assert_eq!(r, Some((big(4), big(7))));
    }

    /// Negative residues are still reduced into [0, L).
    #[test]
    fn negative_residue_input() {
        let minus_one = Integer::from(-1);
        let r = chinese((&minus_one, &big(5)), (&big(2), &big(3)));
        let (x, l) = r.unwrap();
        assert_eq!(l, big(15));
        assert_eq!(x, big(14)); // ≡ −1 (mod 5), ≡ 2 (mod 3)
    }

    // ── u64 twin ─────────────────────────────────────────────────────

    #[test]
    fn u64_matches_bignum_scenarios() {
        assert_eq!(chinese_u64((1, 2), (2, 3)), Some((5, 6)));
        assert_eq!(chinese_u64((3, 4), (5, 6)), Some((11, 12)));
        assert_eq!(chinese_u64((3, 4), (2, 6)), None);
    }

    /// The Atkin cross-out shape: x ≡ δ (mod 60), x ≡ 0 (mod p²).
    #[test]
    fn u64_wheel_times_prime_square() {
        let p = 7u64;
        let (x, l) = chinese_u64((13, 60), (0, p * p)).unwrap();
        assert_eq!(l, 60 * p * p);
        assert_eq!(x % 60, 13);
        assert_eq!(x % (p * p), 0);
        // 2893 = 59·49 ≡ 13 (mod 60)
        assert_eq!(x, 2893);
    }

    #[test]
    fn u64_exhaustive_against_search() {
        // Cross-check against brute force over a small box of moduli.
        for m1 in 1u64..=12 {
            for m2 in 1u64..=12 {
                for n1 in 0..m1 {
                    for n2 in 0..m2 {
                        let expected = (0..m1 * m2).find(|x| x % m1 == n1 && x % m2 == n2);
                        let got = chinese_u64((n1, m1), (n2, m2));
                        match (expected, got) {
                            (None, None) => {}
                            (Some(x), Some((y, l))) => {
                                assert_eq!(x, y, "m1={} m2={} n1={} n2={}", m1, m2, n1, n2);
                                assert_eq!(l, m1 / gcd(m1, m2) * m2);
                            }
                            other => panic!(
                                "mismatch for m1={} m2={} n1={} n2={}: {:?}",
                                m1, m2, n1, n2, other
                            ),
                        }
                    }
                }
            }
        }
    }

    fn gcd(a: u64, b: u64) -> u64 {
        crate::sieve::gcd(a, b)
    }
}
