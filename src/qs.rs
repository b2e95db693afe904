//! # Quadratic sieve factoriser
//!
//! Factors an odd composite n by collecting smooth relations around √n and
//! extracting a congruence of squares from a GF(2) dependency.
//!
//! Pipeline per window of length t, windows ordered k = 0, 1, −1, 2, −2, …
//! around s = ⌊√n⌋:
//!
//! 1. every slot j starts at log|j² − n| with the sign bit of j² − n;
//! 2. each factor-base prime p (and its Hensel-lifted powers) subtracts
//!    log p and toggles p at the arithmetic progressions j ≡ ±√n (mod p^e);
//! 3. slots whose residue drops below the smoothness threshold are
//!    confirmed by exact trial division over the factor base — the sieve is
//!    a filter, the division is the proof — and stored as relations;
//! 4. singleton primes are pruned to a fixed point; once relations
//!    outnumber the surviving parity indices by two (or a relation's parity
//!    vector is already zero), the parity matrix goes to the linear solver;
//! 5. a null vector selects S: X = ∏ j, Y = ∏ p^(Σe/2); gcd(X − Y, n) is
//!    the answer when nontrivial, and further dependencies are tried when
//!    the caller asked for that.
//!
//! The factor base comes from the Atkin sieve, restricted to p = 2 and odd
//! primes with (n|p) = 1 — an inert prime would never hit anyway. Progress
//! is surfaced through [`SieveObserver`]; failures (window budget spent
//! without a usable dependency) surface as `None`, while X² ≢ Y² (mod n)
//! after construction is an implementation bug and aborts.

use crate::atkin;
use crate::gf2::{self, SparseMatrix};
use crate::primeset::SignedPrimeSet;
use crate::residue::{lift_sqrt, mod_u64, sqrt_mod_u64};
use rug::ops::RemRounding;
use rug::Integer;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// Residual log threshold for declaring a slot smooth: anything below a
/// single uncancelled factor of 2 is rounding noise.
const SMOOTH_THRESHOLD: f64 = 0.6;

/// Largest prime-power exponent sieved per odd prime.
const MAX_POWER: u32 = 6;

/// Null vectors examined per solve when dependency retry is enabled.
const DEPENDENCY_BUDGET: usize = 8;

/// Tuning for one factorisation run.
#[derive(Clone, Debug)]
pub struct QsParams {
    /// Factor-base bound b: the base holds primes ≤ b.
    pub fb_bound: u64,
    /// Sieve window length t.
    pub sieve_len: u64,
    /// Window budget: how many windows may be sieved before giving up.
    pub max_windows: u32,
    /// After a dependency yields only trivial factors, walk further null
    /// vectors instead of giving up on the solve.
    pub retry_dependencies: bool,
    /// Seed for the linear solver's probe vectors.
    pub seed: u64,
}

impl Default for QsParams {
    fn default() -> Self {
        QsParams {
            fb_bound: 1000,
            sieve_len: 20_000,
            max_windows: 64,
            retry_dependencies: true,
            seed: 1,
        }
    }
}

impl QsParams {
    /// Size-based tuning for callers without better knowledge.
    pub fn tuned_for(n: &Integer) -> QsParams {
        let bits = n.significant_bits();
        let (fb_bound, sieve_len) = match bits {
            0..=39 => (200, 4_000),
            40..=59 => (2_000, 50_000),
            60..=79 => (10_000, 200_000),
            80..=99 => (40_000, 500_000),
            _ => (120_000, 1_000_000),
        };
        QsParams {
            fb_bound,
            sieve_len,
            ..QsParams::default()
        }
    }
}

/// Caller-supplied progress hook; replaces a global trace flag.
pub trait SieveObserver {
    /// One window finished: its index (0, 1, −1, …), the relation count so
    /// far, and the count that guarantees a dependency.
    fn on_window(&mut self, window: i64, relations: usize, needed: usize);
}

/// Observer that ignores everything.
pub struct NullObserver;

impl SieveObserver for NullObserver {
    fn on_window(&mut self, _window: i64, _relations: usize, _needed: usize) {}
}

/// A smooth relation: x² − n = ±∏ p^e over the factor base.
#[derive(Clone, Debug)]
struct Relation {
    x: Integer,
    /// Exponent parities, sign included.
    parity: SignedPrimeSet,
    /// Exact exponents from the confirming trial division.
    exponents: Vec<(u64, u32)>,
}

/// Factor an odd composite with at least two distinct odd prime factors.
///
/// Returns a nontrivial factor, or `None` when the window budget was spent
/// without producing one. Preconditions — n > 1, odd, composite — fail
/// loudly; X² ≢ Y² (mod n) after square construction is an invariant breach
/// and panics.
pub fn quadratic_sieve(
    n: &Integer,
    params: &QsParams,
    mut observer: Option<&mut dyn SieveObserver>,
) -> Option<Integer> {
    assert!(*n > 1u32, "quadratic sieve needs n > 1");
    assert!(n.is_odd(), "quadratic sieve needs an odd n");
    assert!(
        n.is_probably_prime(25) == rug::integer::IsPrime::No,
        "quadratic sieve needs a composite n"
    );

    if n.is_perfect_square() {
        return Some(n.clone().sqrt());
    }

    // Factor base: p = 2 plus odd p ≤ b with (n|p) = 1. A prime dividing n
    // is already an answer.
    let mut fb: Vec<u64> = Vec::new();
    for p in atkin::sieve_segment(0, params.fb_bound + 1).primes() {
        if n.is_divisible(&Integer::from(p)) {
            return Some(Integer::from(p));
        }
        if p == 2 || n.legendre(&Integer::from(p)) == 1 {
            fb.push(p);
        }
    }
    debug!(fb_len = fb.len(), "factor base assembled");

    // Roots of x² ≡ n for every factor-base prime power we will sieve.
    let roots = prime_power_roots(n, &fb, params.sieve_len);

    let s = n.clone().sqrt();
    let t = params.sieve_len;
    let mut relations: Vec<Relation> = Vec::new();

    for wi in 0..params.max_windows {
        let k = window_order(wi);
        let start = Integer::from(&s - t / 2) + Integer::from(k) * t;
        sieve_window(n, &start, t, &fb, &roots, &mut relations);

        prune_singletons(&mut relations);
        let indices = parity_indices(&relations);
        let needed = indices.len() + 2;
        if let Some(obs) = observer.as_deref_mut() {
            obs.on_window(k, relations.len(), needed);
        }
        debug!(
            window = k,
            relations = relations.len(),
            needed,
            "window sieved"
        );

        let guaranteed = relations.len() > indices.len() + 1;
        let free_square = relations.iter().any(|r| r.parity.is_empty());
        if guaranteed || free_square {
            if let Some(f) = solve(n, &relations, params) {
                return Some(f);
            }
        }
    }

    // Last-ditch: the budget is gone, but a dependency may exist anyway.
    if !relations.is_empty() {
        if let Some(f) = solve(n, &relations, params) {
            return Some(f);
        }
    }
    warn!(
        windows = params.max_windows,
        relations = relations.len(),
        "window budget exhausted without a factor"
    );
    None
}

/// k for the wi-th window: 0, 1, −1, 2, −2, …
fn window_order(wi: u32) -> i64 {
    let half = i64::from(wi / 2) + i64::from(wi % 2);
    if wi % 2 == 1 {
        half
    } else {
        -half
    }
}

/// Roots of x² ≡ n (mod p^e) for each sieved prime power.
///
/// For p = 2 the entry records the fixed 2-adic valuation of j² − n over
/// odd j instead (n mod 8 decides it). For odd p, Hensel lifting walks the
/// base Tonelli root up to `MAX_POWER` or the window's value magnitude.
struct PowerRoots {
    /// (p, p^e, the two roots mod p^e) for odd p.
    odd: Vec<(u64, u64, [u64; 2])>,
    /// Fixed valuation of 2 in j² − n for odd j, if 2 is in the base.
    two_valuation: Option<u32>,
}

fn prime_power_roots(n: &Integer, fb: &[u64], sieve_len: u64) -> PowerRoots {
    // Prime powers beyond the window's value scale cannot divide a slot
    // more often than the threshold tolerates.
    let value_scale = {
        let s = n.clone().sqrt();
        (Integer::from(&s * sieve_len) + sieve_len * sieve_len)
            .to_u64()
            .unwrap_or(u64::MAX)
    };

    let mut odd = Vec::new();
    let mut two_valuation = None;
    for &p in fb {
        if p == 2 {
            two_valuation = Some(match mod_u64(n, 8) {
                1 => 3,
                5 => 2,
                _ => 1,
            });
            continue;
        }
        let r = sqrt_mod_u64(mod_u64(n, p), p)
            .expect("factor-base primes are chosen with (n|p) = 1");
        let mut pe = p;
        let mut root = r;
        for e in 1..=MAX_POWER {
            odd.push((p, pe, [root, pe - root]));
            if e == MAX_POWER || pe > value_scale / p {
                break;
            }
            root = lift_sqrt(root, n, pe, p);
            pe *= p;
        }
    }
    PowerRoots { odd, two_valuation }
}

/// Sieve one window of t slots starting at `start`, appending confirmed
/// relations.
fn sieve_window(
    n: &Integer,
    start: &Integer,
    t: u64,
    fb: &[u64],
    roots: &PowerRoots,
    relations: &mut Vec<Relation>,
) {
    let t = t as usize;
    let ln2 = std::f64::consts::LN_2;

    // Slot initialisation: log|f(j)| and the sign of f(j).
    let mut slots: Vec<(f64, SignedPrimeSet)> = Vec::with_capacity(t);
    for i in 0..t {
        let j = Integer::from(start + i as u64);
        let f = Integer::from(&j * &j) - n;
        let mut set = SignedPrimeSet::new();
        if f < 0u32 {
            set.toggle_sign();
        }
        let logres = if f == 0u32 {
            f64::INFINITY // j = √n; the caller already peeled perfect squares
        } else {
            f.to_f64().abs().ln()
        };
        slots.push((logres, set));
    }

    // p = 2: every odd j gets the fixed valuation.
    if let Some(v2) = roots.two_valuation {
        let first_odd = if mod_u64(start, 2) == 1 { 0 } else { 1 };
        let mut i = first_odd;
        while i < t {
            slots[i].0 -= f64::from(v2) * ln2;
            if v2 % 2 == 1 {
                slots[i].1.toggle(2);
            }
            i += 2;
        }
    }

    // Odd prime powers: subtract log p and toggle parity per hit.
    for &(p, pe, ref rs) in &roots.odd {
        let logp = (p as f64).ln();
        let start_mod = mod_u64(start, pe);
        debug_assert_ne!(rs[0], rs[1], "±root coincide only when p divides n");
        for &r in rs {
            let mut i = ((r + pe - start_mod) % pe) as usize;
            while i < t {
                slots[i].0 -= logp;
                slots[i].1.toggle(p);
                i += pe as usize;
            }
        }
    }

    // Smoothness filter + exact confirmation.
    for (i, (logres, sieved)) in slots.into_iter().enumerate() {
        if logres >= SMOOTH_THRESHOLD {
            continue;
        }
        let j = Integer::from(start + i as u64);
        let f = Integer::from(&j * &j) - n;
        if let Some((parity, exponents)) = confirm_smooth(&f, fb) {
            debug_assert_eq!(parity, sieved, "sieve parity must match trial division");
            relations.push(Relation {
                x: j,
                parity,
                exponents,
            });
        }
    }
}

/// Exact trial division of f over the factor base; `None` when a cofactor
/// survives (the log filter admitted rounding noise).
fn confirm_smooth(f: &Integer, fb: &[u64]) -> Option<(SignedPrimeSet, Vec<(u64, u32)>)> {
    let mut parity = SignedPrimeSet::new();
    if *f < 0u32 {
        parity.toggle_sign();
    }
    let mut m = f.clone().abs();
    let mut exponents = Vec::new();
    for &p in fb {
        let pb = Integer::from(p);
        let mut e = 0u32;
        while m.is_divisible(&pb) {
            m = Integer::from(&m / &pb);
            e += 1;
        }
        if e > 0 {
            exponents.push((p, e));
            if e % 2 == 1 {
                parity.toggle(p);
            }
        }
    }
    (m == 1u32).then_some((parity, exponents))
}

/// Remove relations carrying a parity index present in exactly one
/// relation, repeating until none remain.
fn prune_singletons(relations: &mut Vec<Relation>) {
    loop {
        let mut counts: BTreeMap<u64, usize> = BTreeMap::new();
        let mut sign_count = 0usize;
        for r in relations.iter() {
            if r.parity.is_negative() {
                sign_count += 1;
            }
            for p in r.parity.iter() {
                *counts.entry(p).or_insert(0) += 1;
            }
        }
        let before = relations.len();
        relations.retain(|r| {
            if r.parity.is_negative() && sign_count == 1 {
                return false;
            }
            r.parity.iter().all(|p| counts[&p] != 1)
        });
        if relations.len() == before {
            return;
        }
    }
}

/// The distinct parity indices across surviving relations (sign = index 0).
fn parity_indices(relations: &[Relation]) -> BTreeSet<u64> {
    let mut set = BTreeSet::new();
    for r in relations {
        if r.parity.is_negative() {
            set.insert(0);
        }
        for p in r.parity.iter() {
            set.insert(p + 1);
        }
    }
    set
}

/// Build the parity matrix, walk its null vectors, and extract a factor.
fn solve(n: &Integer, relations: &[Relation], params: &QsParams) -> Option<Integer> {
    if relations.is_empty() {
        return None;
    }

    // Row numbering over the surviving parity indices.
    let indices = parity_indices(relations);
    let row_of: BTreeMap<u64, usize> = indices
        .iter()
        .enumerate()
        .map(|(row, &idx)| (idx, row))
        .collect();

    // Square matrix: relation columns, padded with zero columns when the
    // rows outnumber them. Padding bits are stripped from every kernel
    // vector (zero columns add nothing to Mv), so a vector surviving the
    // strip is a genuine dependency among relations.
    let dim = relations.len().max(row_of.len());
    let mut cols: Vec<Vec<usize>> = Vec::with_capacity(dim);
    for r in relations {
        let mut col = Vec::with_capacity(r.parity.len() + 1);
        if r.parity.is_negative() {
            col.push(row_of[&0]);
        }
        for p in r.parity.iter() {
            col.push(row_of[&(p + 1)]);
        }
        col.sort_unstable();
        cols.push(col);
    }
    cols.resize(dim, Vec::new());
    let matrix = SparseMatrix::new(dim, cols);

    let padding = dim - relations.len();
    let budget = if params.retry_dependencies {
        DEPENDENCY_BUDGET
    } else {
        1
    };
    let vectors = gf2::null_vectors(&matrix, params.seed, budget + padding);

    let mut tried = 0usize;
    let mut seen: Vec<Vec<usize>> = Vec::new();
    for v in vectors {
        if tried >= budget {
            break;
        }
        let selected: Vec<usize> = v
            .iter_set_bits()
            .filter(|&i| i < relations.len())
            .collect();
        if selected.is_empty() || seen.contains(&selected) {
            continue; // padding-only vector, or a duplicate after stripping
        }
        seen.push(selected.clone());
        tried += 1;
        if let Some(f) = extract_factor(n, relations, &selected) {
            return Some(f);
        }
        debug!(dependency = tried, "dependency gave a trivial factor");
    }
    None
}

/// Congruence of squares from a dependency: X = ∏x, Y = ∏p^(Σe/2).
///
/// # Panics
/// Panics when the selected exponent sums are odd or X² ≢ Y² (mod n) —
/// both mean the relation bookkeeping is broken, not a bad input.
fn extract_factor(n: &Integer, relations: &[Relation], selected: &[usize]) -> Option<Integer> {
    let mut x = Integer::from(1u32);
    let mut exp_sum: BTreeMap<u64, u64> = BTreeMap::new();
    let mut negatives = 0u64;
    for &i in selected {
        let r = &relations[i];
        x = Integer::from(&x * &r.x).rem_euc(n).into();
        if r.parity.is_negative() {
            negatives += 1;
        }
        for &(p, e) in &r.exponents {
            *exp_sum.entry(p).or_insert(0) += u64::from(e);
        }
    }
    assert!(
        negatives % 2 == 0,
        "invariant breach: dependency selects an odd number of negative values"
    );

    let mut y = Integer::from(1u32);
    for (&p, &count) in &exp_sum {
        assert!(
            count % 2 == 0,
            "invariant breach: prime {} has odd total multiplicity {}",
            p,
            count
        );
        let half = Integer::from(count / 2);
        let term = Integer::from(p).pow_mod(&half, n).expect("n > 0");
        y = Integer::from(&y * &term).rem_euc(n).into();
    }

    // X² ≡ Y² (mod n) by construction; anything else is a bug.
    let x2 = x.clone().pow_mod(&Integer::from(2u32), n).expect("n > 0");
    let y2 = y.clone().pow_mod(&Integer::from(2u32), n).expect("n > 0");
    assert!(
        x2 == y2,
        "invariant breach: X² ≢ Y² (mod n) for X={}, Y={}",
        x,
        y
    );

    let g = Integer::from(&x - &y).gcd(n);
    if g > 1u32 && g < *n {
        return Some(g);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn factor_of(n: u64, b: u64, t: u64) -> Option<u64> {
        let params = QsParams {
            fb_bound: b,
            sieve_len: t,
            ..QsParams::default()
        };
        quadratic_sieve(&Integer::from(n), &params, None).map(|f| f.to_u64().unwrap())
    }

    fn assert_splits(n: u64, b: u64, t: u64) {
        let f = factor_of(n, b, t).unwrap_or_else(|| panic!("no factor of {}", n));
        assert!(f > 1 && f < n, "factor {} of {} is trivial", f, n);
        assert_eq!(n % f, 0, "{} does not divide {}", f, n);
    }

    /// The textbook small case: 15347 = 103·149 with (b, t) = (30, 200).
    #[test]
    fn splits_15347_with_tiny_factor_base() {
        let f = factor_of(15347, 30, 200).expect("15347 must split");
        assert!(f == 103 || f == 149, "got {}", f);
    }

    #[test]
    fn splits_various_semiprimes() {
        assert_splits(8051, 50, 400); // 83·97
        assert_splits(10_403, 50, 400); // 101·103
        assert_splits(87_463, 100, 2_000); // 149·587
        assert_splits(1_022_117, 200, 4_000); // 1009·1013
    }

    #[test]
    fn splits_larger_semiprime() {
        // 1000003 · 1000033
        let n = Integer::from(1000003u64) * Integer::from(1000033u64);
        let params = QsParams {
            fb_bound: 3000,
            sieve_len: 60_000,
            ..QsParams::default()
        };
        let f = quadratic_sieve(&n, &params, None).expect("12-digit semiprime must split");
        assert!(f == 1000003u64 || f == 1000033u64);
    }

    #[test]
    fn perfect_square_short_circuits() {
        // 103² — returns the square root before sieving
        let f = factor_of(103 * 103, 30, 200);
        assert_eq!(f, Some(103));
    }

    #[test]
    fn small_prime_in_base_is_found_directly() {
        // 3·10007: the factor base sees 3 divides n
        let f = factor_of(3 * 10007, 100, 500);
        assert_eq!(f, Some(3));
    }

    #[test]
    fn budget_exhaustion_is_a_distinguished_failure() {
        // A hopeless configuration: factor base {2}, two windows
        let params = QsParams {
            fb_bound: 2,
            sieve_len: 50,
            max_windows: 2,
            ..QsParams::default()
        };
        // 104723·104729 is far beyond what this base can smooth out
        let n = Integer::from(104_723u64) * Integer::from(104_729u64);
        assert_eq!(quadratic_sieve(&n, &params, None), None);
    }

    #[test]
    #[should_panic(expected = "composite")]
    fn prime_input_fails_loudly() {
        factor_of(104_729, 30, 200);
    }

    #[test]
    #[should_panic(expected = "odd")]
    fn even_input_fails_loudly() {
        factor_of(15_346, 30, 200);
    }

    #[test]
    fn observer_sees_windows() {
        struct Count(Vec<(i64, usize)>);
        impl SieveObserver for Count {
            fn on_window(&mut self, window: i64, relations: usize, _needed: usize) {
                self.0.push((window, relations));
            }
        }
        let mut obs = Count(Vec::new());
        let params = QsParams {
            fb_bound: 30,
            sieve_len: 200,
            ..QsParams::default()
        };
        let _ = quadratic_sieve(&Integer::from(15347u32), &params, Some(&mut obs));
        assert!(!obs.0.is_empty(), "observer must see at least one window");
        assert_eq!(obs.0[0].0, 0, "first window is k = 0");
    }

    #[test]
    fn window_order_alternates() {
        let ks: Vec<i64> = (0..7).map(window_order).collect();
        assert_eq!(ks, vec![0, 1, -1, 2, -2, 3, -3]);
    }

    // ── internals ────────────────────────────────────────────────────

    #[test]
    fn confirm_smooth_exact_exponents() {
        let fb = vec![2u64, 17, 23, 29];
        // 782 = 2·17·23
        let (parity, exps) = confirm_smooth(&Integer::from(782u32), &fb).unwrap();
        assert_eq!(exps, vec![(2, 1), (17, 1), (23, 1)]);
        assert!(!parity.is_negative());
        assert_eq!(parity.iter().collect::<Vec<_>>(), vec![2, 17, 23]);
        // 529 = 23²: even parity, nonempty exponents
        let (parity, exps) = confirm_smooth(&Integer::from(529u32), &fb).unwrap();
        assert!(parity.is_empty());
        assert_eq!(exps, vec![(23, 2)]);
        // −218 = −2·109: 109 is outside the base
        assert!(confirm_smooth(&Integer::from(-218), &fb).is_none());
    }

    #[test]
    fn pruning_removes_singletons_transitively() {
        let rel = |primes: &[u64]| {
            let mut parity = SignedPrimeSet::new();
            for &p in primes {
                parity.toggle(p);
            }
            Relation {
                x: Integer::from(1u32),
                parity,
                exponents: Vec::new(),
            }
        };
        // 3 appears only in r2; removing r2 leaves 5 a singleton in r3.
        let mut relations = vec![rel(&[2]), rel(&[3, 5]), rel(&[5]), rel(&[2])];
        prune_singletons(&mut relations);
        let left: Vec<Vec<u64>> = relations
            .iter()
            .map(|r| r.parity.iter().collect())
            .collect();
        assert_eq!(left, vec![vec![2], vec![2]]);
    }
}
