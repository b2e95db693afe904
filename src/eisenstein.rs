//! # Eisenstein integers
//!
//! Arithmetic, Euclidean division, primality and factorisation in Z[ω],
//! ω = e^(2πi/3). An element a + bω is stored as its coordinate pair; the
//! ring law follows from ω² = −1 − ω, the norm is N(a, b) = a² − ab + b²,
//! and the six units are the powers of 1 + ω.
//!
//! Rational primes behave in three ways over Z[ω]: 3 ramifies as the square
//! of (an associate of) 2 + ω, primes ≡ 2 (mod 3) stay inert, and primes
//! ≡ 1 (mod 3) split into a conjugate pair of norm p found by `find_prime`.
//! `factorise` leans on the rational factoriser applied to the norm and
//! returns primary primes (2 + ω standing in for the ramified prime, which
//! has no primary associate).
//!
//! Canonical forms: `abs` rotates into the first sextant (0 ≤ arg < π/3,
//! equivalently b ≥ 0 and a > b for nonzero elements); `primary` picks the
//! associate ≡ 2 (mod 3), which exists exactly when 3 ∤ N(z).

use crate::euclidean::{gcd, Euclidean};
use crate::residue::sqrt_mod;
use crate::sieve::{generate_primes, isqrt};
use rug::ops::Pow;
use rug::Integer;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fmt;

/// a + bω with arbitrary-precision coordinates.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Eisenstein {
    a: Integer,
    b: Integer,
}

impl Eisenstein {
    pub fn new(a: impl Into<Integer>, b: impl Into<Integer>) -> Self {
        Eisenstein {
            a: a.into(),
            b: b.into(),
        }
    }

    /// Embed a rational integer as a + 0ω.
    pub fn from_integer(a: impl Into<Integer>) -> Self {
        Eisenstein::new(a, 0u32)
    }

    pub fn a(&self) -> &Integer {
        &self.a
    }

    pub fn b(&self) -> &Integer {
        &self.b
    }

    pub fn is_zero(&self) -> bool {
        self.a == 0u32 && self.b == 0u32
    }

    /// N(a + bω) = a² − ab + b². Multiplicative, nonnegative, zero only at 0.
    pub fn norm(&self) -> Integer {
        Integer::from(&self.a * &self.a) - Integer::from(&self.a * &self.b)
            + Integer::from(&self.b * &self.b)
    }

    /// Complex conjugate: a + bω ↦ (a − b) − bω.
    pub fn conjugate(&self) -> Eisenstein {
        Eisenstein {
            a: Integer::from(&self.a - &self.b),
            b: Integer::from(-self.b.clone()),
        }
    }

    pub fn is_unit(&self) -> bool {
        self.norm() == 1u32
    }

    /// The six units: powers of 1 + ω.
    pub fn units() -> [Eisenstein; 6] {
        [
            Eisenstein::new(1, 0),
            Eisenstein::new(1, 1),
            Eisenstein::new(0, 1),
            Eisenstein::new(-1, 0),
            Eisenstein::new(-1, -1),
            Eisenstein::new(0, -1),
        ]
    }

    /// Multiply by 1 + ω — a 60° rotation: (a, b) ↦ (a − b, a).
    fn rotate60(&self) -> Eisenstein {
        Eisenstein {
            a: Integer::from(&self.a - &self.b),
            b: self.a.clone(),
        }
    }

    /// The six associates, starting from self, by successive 60° rotations.
    pub fn associates(&self) -> [Eisenstein; 6] {
        let mut out: [Eisenstein; 6] = Default::default();
        let mut z = self.clone();
        for slot in &mut out {
            *slot = z.clone();
            z = z.rotate60();
        }
        out
    }

    /// The unique associate in the first sextant: b ≥ 0 and a > b (0 maps
    /// to itself). `abs(abs(z)) = abs(z)`.
    pub fn abs(&self) -> Eisenstein {
        if self.is_zero() {
            return self.clone();
        }
        let mut z = self.clone();
        for _ in 0..6 {
            if z.b >= 0u32 && z.a > z.b {
                return z;
            }
            z = z.rotate60();
        }
        unreachable!("six rotations cover every sextant")
    }

    /// The unique associate ≡ 2 (mod 3), when 3 ∤ N(z).
    pub fn primary(&self) -> Option<Eisenstein> {
        if self.is_zero() {
            return None;
        }
        let mut z = self.clone();
        for _ in 0..6 {
            if z.a.mod_u(3) == 2 && z.b.mod_u(3) == 0 {
                return Some(z);
            }
            z = z.rotate60();
        }
        None
    }

    /// Whether z is prime in Z[ω]: an associate of 2 + ω, an inert rational
    /// prime p ≡ 2 (mod 3), or an element whose norm is a rational prime
    /// (necessarily ≡ 1 (mod 3), since norms avoid 2 mod 3).
    pub fn is_prime(&self) -> bool {
        let n = self.norm();
        if n <= 1u32 {
            return false;
        }
        if n == 3u32 {
            return true;
        }
        if crate::factor::is_prime(&n) {
            return true;
        }
        if n.is_perfect_square() {
            let s = n.sqrt();
            return s.mod_u(3) == 2 && crate::factor::is_prime(&s);
        }
        false
    }
}

impl Default for Eisenstein {
    fn default() -> Self {
        Eisenstein::new(0, 0)
    }
}

impl fmt::Display for Eisenstein {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.b == 0u32 {
            return write!(f, "{}", self.a);
        }
        if self.a == 0u32 {
            return write!(f, "{}ω", self.b);
        }
        if self.b < 0u32 {
            write!(f, "{}{}ω", self.a, self.b)
        } else {
            write!(f, "{}+{}ω", self.a, self.b)
        }
    }
}

impl fmt::Debug for Eisenstein {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({} + {}ω)", self.a, self.b)
    }
}

// ── ring operators ───────────────────────────────────────────────────

impl std::ops::Add for &Eisenstein {
    type Output = Eisenstein;
    fn add(self, rhs: &Eisenstein) -> Eisenstein {
        Eisenstein {
            a: Integer::from(&self.a + &rhs.a),
            b: Integer::from(&self.b + &rhs.b),
        }
    }
}

impl std::ops::Sub for &Eisenstein {
    type Output = Eisenstein;
    fn sub(self, rhs: &Eisenstein) -> Eisenstein {
        Eisenstein {
            a: Integer::from(&self.a - &rhs.a),
            b: Integer::from(&self.b - &rhs.b),
        }
    }
}

impl std::ops::Neg for &Eisenstein {
    type Output = Eisenstein;
    fn neg(self) -> Eisenstein {
        Eisenstein {
            a: Integer::from(-self.a.clone()),
            b: Integer::from(-self.b.clone()),
        }
    }
}

impl std::ops::Mul for &Eisenstein {
    type Output = Eisenstein;
    /// (a + bω)(c + dω) = (ac − bd) + (bc + ad − bd)ω, from ω² = −1 − ω.
    fn mul(self, rhs: &Eisenstein) -> Eisenstein {
        let ac = Integer::from(&self.a * &rhs.a);
        let bd = Integer::from(&self.b * &rhs.b);
        let bc = Integer::from(&self.b * &rhs.a);
        let ad = Integer::from(&self.a * &rhs.b);
        Eisenstein {
            a: ac - &bd,
            b: bc + ad - bd,
        }
    }
}

impl std::ops::Add for Eisenstein {
    type Output = Eisenstein;
    fn add(self, rhs: Eisenstein) -> Eisenstein {
        &self + &rhs
    }
}

impl std::ops::Sub for Eisenstein {
    type Output = Eisenstein;
    fn sub(self, rhs: Eisenstein) -> Eisenstein {
        &self - &rhs
    }
}

impl std::ops::Mul for Eisenstein {
    type Output = Eisenstein;
    fn mul(self, rhs: Eisenstein) -> Eisenstein {
        &self * &rhs
    }
}

// ── Euclidean division ───────────────────────────────────────────────

/// Shared division core: q has the rounded coordinates of g·h̄ / N(h),
/// r = g − q·h.
fn divide(
    g: &Eisenstein,
    h: &Eisenstein,
    round: fn(&Integer, &Integer) -> Integer,
) -> (Eisenstein, Eisenstein) {
    assert!(!h.is_zero(), "Eisenstein division by zero");
    let num = g * &h.conjugate();
    let d = h.norm();
    let q = Eisenstein {
        a: round(&num.a, &d),
        b: round(&num.b, &d),
    };
    let r = g - &(&q * h);
    (q, r)
}

fn round_trunc(a: &Integer, d: &Integer) -> Integer {
    a.clone().div_rem(d.clone()).0
}

fn round_floor(a: &Integer, d: &Integer) -> Integer {
    a.clone().div_rem_floor(d.clone()).0
}

impl Euclidean for Eisenstein {
    fn quot_rem(&self, divisor: &Self) -> (Self, Self) {
        divide(self, divisor, round_trunc)
    }

    /// Flooring division; N(remainder) < N(divisor) always holds because
    /// the fractional part lies in the half-open unit square, where the
    /// norm form stays below 1.
    fn div_mod_floor(&self, divisor: &Self) -> (Self, Self) {
        divide(self, divisor, round_floor)
    }

    fn is_zero(&self) -> bool {
        Eisenstein::is_zero(self)
    }
}

/// The quotient when `d` divides `z` exactly, else `None`.
fn try_div(z: &Eisenstein, d: &Eisenstein) -> Option<Eisenstein> {
    let (q, r) = z.div_mod_floor(d);
    r.is_zero().then_some(q)
}

// ── splitting and factorisation ──────────────────────────────────────

/// A prime of norm p over a rational prime p ≡ 1 (mod 6), in the first
/// sextant.
///
/// With k = p/6, s = √(9k² − 1) mod p satisfies s ≡ √−3/2, so u = s − 3k is
/// a primitive sixth root of unity mod p and N(u + ω) = u² − u + 1 ≡ 0
/// (mod p); the Euclidean gcd of p and u + ω is the sought prime.
///
/// # Panics
/// Panics if `p ≢ 1 (mod 6)` (caller bug) or if the gcd fails to have norm
/// p (invariant breach).
pub fn find_prime(p: &Integer) -> Eisenstein {
    assert!(
        p.mod_u(6) == 1,
        "find_prime requires a rational prime ≡ 1 (mod 6), got {}",
        p
    );
    let k = Integer::from(p / 6u32);
    let target = Integer::from(&k * &k) * 9u32 - 1u32;
    let s = sqrt_mod(&target, p).expect("9k² − 1 is a quadratic residue mod p ≡ 1 (mod 6)");
    let u = s - Integer::from(3u32 * &k);

    let g = gcd(
        &Eisenstein::from_integer(p.clone()),
        &Eisenstein::new(u, 1),
    );
    let g = g.abs();
    assert!(
        g.norm() == *p,
        "gcd with the cyclotomic root must have norm {}, got {}",
        p,
        g.norm()
    );
    g
}

/// Prime factorisation over Z[ω]: primary primes with multiplicity, the
/// unit quotient discarded. 2 + ω stands in for the ramified prime above 3.
///
/// # Panics
/// Panics on zero input (caller bug) and on any internal inconsistency
/// between the norm's rational factorisation and the divisions it predicts
/// (invariant breach).
pub fn factorise(z: &Eisenstein) -> Vec<(Eisenstein, u32)> {
    assert!(!z.is_zero(), "factorise requires a nonzero element");
    let mut out: Vec<(Eisenstein, u32)> = Vec::new();
    let norm = z.norm();
    if norm == 1u32 {
        return out;
    }

    let mut rem = z.clone();
    for (p, e) in crate::factor::factorise(&norm) {
        if p == 3u32 {
            // ramified: N(z) carries 3^e, z carries (1 − ω)^e ~ (2 + ω)^e
            let pi = Eisenstein::new(2, 1);
            for _ in 0..e {
                rem = try_div(&rem, &pi)
                    .expect("invariant breach: 3^e in the norm but 2+ω does not divide");
            }
            out.push((pi, e));
        } else if p.mod_u(3) == 2 {
            assert!(
                e % 2 == 0,
                "invariant breach: inert prime {} has odd exponent {} in a norm",
                p,
                e
            );
            let half = e / 2;
            let d = Eisenstein::from_integer(p.clone().pow(half));
            rem = try_div(&rem, &d)
                .expect("invariant breach: inert power predicted by the norm must divide");
            out.push((Eisenstein::from_integer(p), half));
        } else {
            // split: π and its conjugate class share the exponent e = k + k′
            let pi = find_prime(&p)
                .primary()
                .expect("split prime has a primary associate");
            let pi_bar = pi
                .conjugate()
                .primary()
                .expect("conjugate of a split prime has a primary associate");

            // dividing by p removes one π and one π′ at a time
            let p_elem = Eisenstein::from_integer(p.clone());
            let mut both = 0u32;
            while let Some(q) = try_div(&rem, &p_elem) {
                rem = q;
                both += 1;
            }
            let mut extra_pi = 0u32;
            while let Some(q) = try_div(&rem, &pi) {
                rem = q;
                extra_pi += 1;
            }
            let mut extra_bar = 0u32;
            while let Some(q) = try_div(&rem, &pi_bar) {
                rem = q;
                extra_bar += 1;
            }
            assert!(
                2 * both + extra_pi + extra_bar == e,
                "invariant breach: split exponents {}+{}+2·{} disagree with norm exponent {}",
                extra_pi,
                extra_bar,
                both,
                e
            );
            if both + extra_pi > 0 {
                out.push((pi, both + extra_pi));
            }
            if both + extra_bar > 0 {
                out.push((pi_bar, both + extra_bar));
            }
        }
    }

    assert!(
        rem.is_unit(),
        "invariant breach: non-unit quotient {:?} after factorisation",
        rem
    );
    out
}

// ── prime enumeration ────────────────────────────────────────────────

/// Heap entry ordered by (norm, insertion sequence); the element itself
/// does not participate in the ordering.
struct Entry {
    norm: u64,
    seq: u64,
    value: Eisenstein,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.norm == other.norm && self.seq == other.seq
    }
}
impl Eq for Entry {}
impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Entry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.norm, self.seq).cmp(&(other.norm, other.seq))
    }
}

/// Eisenstein primes of norm ≤ `norm_bound`, ascending by norm; within a
/// split pair, (x, y) is yielded before its sibling class (x, x − y).
///
/// A pull iterator: rational primes feed a two-stream merge (split primes
/// at norm p, inert primes at norm p²) through a priority queue, so the
/// caller pays only for what it consumes.
pub fn primes(norm_bound: u64) -> EisensteinPrimes {
    EisensteinPrimes {
        rational: generate_primes(norm_bound).into_iter().peekable(),
        pending: BinaryHeap::new(),
        bound: norm_bound,
        seq: 0,
    }
}

pub struct EisensteinPrimes {
    rational: std::iter::Peekable<std::vec::IntoIter<u64>>,
    pending: BinaryHeap<Reverse<Entry>>,
    bound: u64,
    seq: u64,
}

impl EisensteinPrimes {
    fn push(&mut self, norm: u64, value: Eisenstein) {
        if norm <= self.bound {
            self.pending.push(Reverse(Entry {
                norm,
                seq: self.seq,
                value,
            }));
            self.seq += 1;
        }
    }

    fn feed(&mut self, p: u64) {
        if p == 3 {
            self.push(3, Eisenstein::new(2, 1));
        } else if p % 3 == 2 {
            // inert: contributes at norm p²
            if p <= isqrt(self.bound) {
                self.push(p * p, Eisenstein::from_integer(p));
            }
        } else {
            // split: the conjugate pair of norm p, left class first
            let pi = find_prime(&Integer::from(p));
            let x = pi.a().to_u64().expect("coordinates of a norm-p prime fit u64");
            let y = pi.b().to_u64().expect("coordinates of a norm-p prime fit u64");
            self.push(p, pi);
            self.push(p, Eisenstein::new(x, x - y));
        }
    }
}

impl Iterator for EisensteinPrimes {
    type Item = Eisenstein;

    fn next(&mut self) -> Option<Eisenstein> {
        // Feed rational primes until the heap head is guaranteed minimal:
        // an unconsumed rational prime p only contributes norms ≥ p.
        while let Some(&p) = self.rational.peek() {
            if self.pending.peek().map_or(true, |Reverse(e)| e.norm >= p) {
                self.rational.next();
                self.feed(p);
            } else {
                break;
            }
        }
        self.pending.pop().map(|Reverse(e)| e.value)
    }
}
