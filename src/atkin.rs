//! # Segmented sieve of Atkin
//!
//! Prime generation over `[lo, lo + len)` by lattice-point toggles on the
//! wheel-30 residue classes coprime to 60. Each of the 16 classes δ owns one
//! packed bit vector per segment; bit k means "60·(lo/60 + k) + δ is prime".
//!
//! Atkin's characterisation (for squarefree n coprime to 60):
//!
//! - n ≡ 1 (mod 4): n prime iff #{(x, y) : x, y > 0, 4x² + y² = n} is odd
//! - n ≡ 7 (mod 12): n prime iff #{(x, y) : x, y > 0, 3x² + y² = n} is odd
//! - n ≡ 11 (mod 12): n prime iff #{(x, y) : x > y > 0, 3x² − y² = n} is odd
//!
//! The toggle phase walks each form's solution lattice per residue class:
//! base solutions (f, g) with x-period 15 (first form) or 10 (the 3x² forms)
//! and y-period 30, advancing k by the constant increment Δk = y + 15 per
//! y-step. The cross-out phase then clears the non-squarefree survivors:
//! multiples of p² for 7 ≤ p ≤ ⌊√high⌋, with the first hit per class found
//! by the Chinese remainder combinator on (δ, 60) and (0, p²). Squares of
//! 2, 3, 5 never land on the wheel, and the seed primes come from the
//! wheel-30 Eratosthenes sieve.
//!
//! ## Reference
//!
//! - A. O. L. Atkin, D. J. Bernstein, "Prime sieves using binary quadratic
//!   forms", Mathematics of Computation, 73(246):1023–1030, 2004.

use crate::bits::BitVec;
use crate::crt::chinese_u64;
use crate::sieve::{generate_primes, isqrt};

/// The 16 residues mod 60 coprime to 60, ascending.
pub const WHEEL: [u64; 16] = [
    1, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 49, 53, 59,
];

/// Residue mod 60 → wheel index, or −1 off the wheel.
const WHEEL_IDX: [i8; 60] = [
    -1, 0, -1, -1, -1, -1, -1, 1, -1, -1, // 0..9
    -1, 2, -1, 3, -1, -1, -1, 4, -1, 5, // 10..19
    -1, -1, -1, 6, -1, -1, -1, -1, -1, 7, // 20..29
    -1, 8, -1, -1, -1, -1, -1, 9, -1, -1, // 30..39
    -1, 10, -1, 11, -1, -1, -1, 12, -1, 13, // 40..49
    -1, -1, -1, 14, -1, -1, -1, -1, -1, 15, // 50..59
];

/// One sieved segment: 16 frozen bit vectors plus the requested bounds.
pub struct AtkinSieve {
    /// Requested lower bound (not rounded).
    lo: u64,
    /// Requested length.
    len: u64,
    /// lo / 60 — index of the first covered 60-block.
    seg_low: u64,
    /// Number of covered 60-blocks.
    segs: u64,
    /// One vector per wheel residue, each `segs` bits long.
    vectors: Vec<BitVec>,
}

/// Sieve the segment `[lo, lo + len)`.
///
/// The bit vectors cover the enclosing 60-aligned range; enumeration filters
/// back down to the requested half-open interval.
pub fn sieve_segment(lo: u64, len: u64) -> AtkinSieve {
    let end = lo.checked_add(len).expect("segment end overflows");
    assert!(end < u64::MAX / 64, "segment end too large to sieve");

    let seg_low = lo / 60;
    let segs = end.div_ceil(60).saturating_sub(seg_low);
    let low = 60 * seg_low;
    let high = 60 * (seg_low + segs);

    let mut vectors: Vec<BitVec> = (0..16).map(|_| BitVec::new(segs as usize)).collect();

    if segs > 0 {
        for (di, &delta) in WHEEL.iter().enumerate() {
            let vec = &mut vectors[di];
            if delta % 4 == 1 {
                toggle_4xx_yy(vec, delta, seg_low, low, high);
            } else if delta % 6 == 1 {
                toggle_3xx_yy(vec, delta, seg_low, low, high);
            } else {
                debug_assert_eq!(delta % 12, 11);
                toggle_3xx_minus_yy(vec, delta, seg_low, low, high);
            }
        }
        cross_out_squares(&mut vectors, seg_low, low, high);
    }

    AtkinSieve {
        lo,
        len,
        seg_low,
        segs,
        vectors,
    }
}

impl AtkinSieve {
    /// The primes of `[lo, lo + len)` in strictly ascending order.
    ///
    /// 2, 3 and 5 are supplied up front when in range; everything else reads
    /// the wheel vectors block by block, residues ascending within a block.
    pub fn primes(&self) -> impl Iterator<Item = u64> + '_ {
        let lo = self.lo;
        let end = self.lo + self.len;
        let seg_low = self.seg_low;

        let small = [2u64, 3, 5]
            .into_iter()
            .filter(move |&q| q >= lo && q < end);

        let wheel = (0..self.segs).flat_map(move |k| {
            WHEEL.iter().enumerate().filter_map(move |(di, &delta)| {
                if self.vectors[di].get(k as usize) {
                    let n = 60 * (seg_low + k) + delta;
                    if n >= lo && n < end {
                        return Some(n);
                    }
                }
                None
            })
        });

        small.chain(wheel)
    }

    /// Requested lower bound.
    pub fn lo(&self) -> u64 {
        self.lo
    }

    /// Requested segment length.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Smallest r with r² ≥ v.
fn ceil_sqrt(v: u64) -> u64 {
    let r = isqrt(v);
    if r * r == v {
        r
    } else {
        r + 1
    }
}

/// Smallest member of the class `g (mod m)` that is ≥ v.
fn align_up(v: u64, g: u64, m: u64) -> u64 {
    v + (g % m + m - v % m) % m
}

/// Toggle solutions of 4x² + y² = 60k + δ (δ ≡ 1 mod 4).
///
/// Base solutions (f, g) ∈ [1,15]×[1,30]; 4x² mod 60 depends only on
/// x mod 15 and y² mod 60 only on y mod 30, so each base pair spans a full
/// sublattice. Within a fixed x the y-walk advances k by y + 15 per step.
fn toggle_4xx_yy(vec: &mut BitVec, delta: u64, seg_low: u64, low: u64, high: u64) {
    for f in 1..=15u64 {
        for g in 1..=30u64 {
            if (4 * f * f + g * g) % 60 != delta {
                continue;
            }
            let mut x = f;
            while 4 * x * x < high {
                let n0 = 4 * x * x;
                let y0 = if n0 + g * g >= low {
                    g
                } else {
                    align_up(ceil_sqrt(low - n0), g, 30)
                };
                let mut y = y0;
                let mut n = n0 + y * y;
                while n < high {
                    debug_assert!(n >= low && n % 60 == delta);
                    vec.flip((n / 60 - seg_low) as usize);
                    // Δn = (y+30)² − y² = 60(y + 15)
                    n += 60 * (y + 15);
                    y += 30;
                }
                x += 15;
            }
        }
    }
}

/// Toggle solutions of 3x² + y² = 60k + δ (δ ≡ 7 mod 12).
///
/// 3x² mod 60 depends only on x mod 10, so the x-period drops to 10.
fn toggle_3xx_yy(vec: &mut BitVec, delta: u64, seg_low: u64, low: u64, high: u64) {
    for f in 1..=10u64 {
        for g in 1..=30u64 {
            if (3 * f * f + g * g) % 60 != delta {
                continue;
            }
            let mut x = f;
            while 3 * x * x < high {
                let n0 = 3 * x * x;
                let y0 = if n0 + g * g >= low {
                    g
                } else {
                    align_up(ceil_sqrt(low - n0), g, 30)
                };
                let mut y = y0;
                let mut n = n0 + y * y;
                while n < high {
                    debug_assert!(n >= low && n % 60 == delta);
                    vec.flip((n / 60 - seg_low) as usize);
                    n += 60 * (y + 15);
                    y += 30;
                }
                x += 10;
            }
        }
    }
}

/// Toggle solutions of 3x² − y² = 60k + δ with x > y > 0 (δ ≡ 11 mod 12).
///
/// The y-walk now *decreases* n (Δk = −(y + 15)); the loop runs y upward
/// through (the class of) the window instead.
fn toggle_3xx_minus_yy(vec: &mut BitVec, delta: u64, seg_low: u64, low: u64, high: u64) {
    for f in 1..=10u64 {
        for g in 1..=30u64 {
            if (3 * f * f % 60 + 60 - g * g % 60) % 60 != delta {
                continue;
            }
            // Smallest useful x: 3x² − 1 ≥ low, i.e. x² ≥ (low + 1)/3.
            let xs = ceil_sqrt((low + 1).div_ceil(3)).max(f);
            let mut x = if xs == f { f } else { align_up(xs, f, 10) };
            // Largest useful x: even y = x − 1 leaves n = 2x² + 2x − 1 < high.
            while 2 * x * x + 2 * x - 1 < high {
                let n0 = 3 * x * x;
                // y² ∈ (n0 − high, n0 − low] and 1 ≤ y < x
                let y_max = std::cmp::min(x - 1, isqrt(n0 - low));
                let y_lo = if n0 >= high { isqrt(n0 - high) + 1 } else { 1 };
                let mut y = align_up(y_lo, g, 30);
                while y <= y_max {
                    let n = n0 - y * y;
                    debug_assert!(n >= low && n < high && n % 60 == delta);
                    vec.flip((n / 60 - seg_low) as usize);
                    y += 30;
                }
                x += 10;
            }
        }
    }
}

/// Clear every 60k + δ divisible by p² for 7 ≤ p ≤ ⌊√high⌋.
///
/// The first index in each class comes from combining n ≡ δ (mod 60) with
/// n ≡ 0 (mod p²); gcd(60, p²) = 1 for p ≥ 7, so the combination always
/// exists and repeats with period 60p².
fn cross_out_squares(vectors: &mut [BitVec], seg_low: u64, low: u64, high: u64) {
    if high <= low {
        return;
    }
    for p in generate_primes(isqrt(high - 1)) {
        if p < 7 {
            continue;
        }
        let p2 = p * p;
        for (di, &delta) in WHEEL.iter().enumerate() {
            let (x0, step) =
                chinese_u64((delta, 60), (0, p2)).expect("60 and p² are coprime for p ≥ 7");
            let mut n = if x0 >= low {
                x0
            } else {
                x0 + (low - x0).div_ceil(step) * step
            };
            while n < high {
                debug_assert!(n % 60 == delta && n % p2 == 0);
                vectors[di].clear((n / 60 - seg_low) as usize);
                n += step;
            }
        }
    }
}

/// Wheel index of a residue mod 60, if coprime to 60.
pub fn wheel_index(residue: u64) -> Option<usize> {
    let i = WHEEL_IDX[(residue % 60) as usize];
    (i >= 0).then_some(i as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn atkin_primes(lo: u64, len: u64) -> Vec<u64> {
        sieve_segment(lo, len).primes().collect()
    }

    fn reference_primes(lo: u64, len: u64) -> Vec<u64> {
        generate_primes(lo + len)
            .into_iter()
            .filter(|&p| p >= lo && p < lo + len)
            .collect()
    }

    /// The 25 primes below 100.
    #[test]
    fn first_hundred() {
        assert_eq!(
            atkin_primes(0, 100),
            vec![
                2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59, 61, 67, 71,
                73, 79, 83, 89, 97
            ]
        );
    }

    #[test]
    fn matches_eratosthenes_from_zero() {
        assert_eq!(atkin_primes(0, 1000), reference_primes(0, 1000));
        assert_eq!(atkin_primes(0, 10_000), reference_primes(0, 10_000));
    }

    #[test]
    fn matches_eratosthenes_on_interior_segments() {
        for &(lo, len) in &[
            (60u64, 60u64),
            (61, 60),       // unaligned lower bound
            (97, 5),        // tiny window
            (1000, 1000),
            (9999, 123),
            (50_000, 2_500),
        ] {
            assert_eq!(
                atkin_primes(lo, len),
                reference_primes(lo, len),
                "segment [{}, {})",
                lo,
                lo + len
            );
        }
    }

    #[test]
    fn squares_and_squareful_values_are_cleared() {
        // 121 = 11², 169 = 13², 539 = 7²·11, 847 = 7²·... = 7·11², all on the wheel
        let primes = atkin_primes(0, 1000);
        for composite in [49u64, 121, 169, 343, 539, 847, 961] {
            assert!(
                !primes.contains(&composite),
                "{} wrongly marked prime",
                composite
            );
        }
    }

    #[test]
    fn small_primes_only_when_in_range() {
        assert_eq!(atkin_primes(0, 3), vec![2]);
        assert_eq!(atkin_primes(2, 2), vec![2, 3]);
        assert_eq!(atkin_primes(3, 3), vec![3, 5]);
        assert_eq!(atkin_primes(6, 10), vec![7, 11, 13]);
    }

    #[test]
    fn empty_and_degenerate_segments() {
        assert_eq!(atkin_primes(100, 0), Vec::<u64>::new());
        assert_eq!(atkin_primes(0, 1), Vec::<u64>::new());
        assert_eq!(atkin_primes(0, 2), Vec::<u64>::new());
        assert_eq!(atkin_primes(24, 5), Vec::<u64>::new()); // [24, 29) has no primes
    }

    #[test]
    fn ascending_order() {
        let primes = atkin_primes(0, 20_000);
        for w in primes.windows(2) {
            assert!(w[0] < w[1], "{} !< {}", w[0], w[1]);
        }
    }

    #[test]
    fn segment_boundary_straddles_sixty_block() {
        // [119, 122) contains 60·2 + 1 = 121 (composite) and nothing else prime
        assert_eq!(atkin_primes(119, 3), Vec::<u64>::new());
        // [112, 20) contains 113
        assert_eq!(atkin_primes(112, 20), vec![113, 127, 131]);
    }

    #[test]
    fn large_segment_spot_check() {
        // π(10^6) = 78498
        let primes = atkin_primes(0, 1_000_000);
        assert_eq!(primes.len(), 78_498);
        assert_eq!(primes.last(), Some(&999_983));
    }

    #[test]
    fn wheel_index_roundtrip() {
        for (i, &w) in WHEEL.iter().enumerate() {
            assert_eq!(wheel_index(w), Some(i));
        }
        for off in [0u64, 2, 3, 5, 6, 25, 35, 57] {
            assert_eq!(wheel_index(off), None);
        }
    }
}
