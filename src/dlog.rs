//! # Discrete logarithms in cyclic groups mod m
//!
//! (Z/mZ)* is cyclic for exactly four shapes of modulus: 2, 4, p^k and 2p^k
//! with p an odd prime. `CyclicGroup` classifies the modulus, `MultMod`
//! carries a unit residue, `PrimitiveRoot` a verified generator, and
//! `discrete_log` finds the unique e ∈ [0, ord) with a^e ≡ b (mod m).
//!
//! The prime-power case is reduced by Bach's method: one discrete log in
//! F_p plus an explicit additive lift. θ(x) = (x^φ(p^k) − 1)/p^k, read off
//! modulo p^(2k−1), is a homomorphism from (Z/p^k)* onto Z/p^(k−1) — the
//! (1 + a)(1 + b) = 1 + a + b + ab expansion kills the cross term because
//! a, b ≡ 0 (mod p^k). The two congruences on e are glued with the Chinese
//! remainder combinator; their moduli p − 1 and p^(k−1) are coprime.
//!
//! The F_p base case is baby-step giant-step below 10^8 (meet-in-the-middle
//! on Montgomery u64 arithmetic, smallest exponent wins) and Pollard rho
//! above (the classic three-region walk with a tortoise-and-hare collision
//! and a gcd-prechecked linear-congruence solve, restarted from fresh
//! exponent pairs when the gcd is unusable).
//!
//! ## References
//!
//! - E. Bach, "Discrete Logarithms and Factoring", UCB/CSD-84-186, 1984.
//! - J. Pollard, "Monte Carlo methods for index computation (mod p)",
//!   Mathematics of Computation, 32(143):918–924, 1978.

use crate::crt::chinese;
use crate::factor;
use crate::sieve::{isqrt, MontgomeryCtx};
use rug::ops::{Pow, RemRounding};
use rug::Integer;
use std::collections::HashMap;
use tracing::debug;

/// Primes below this use BSGS; at or above, Pollard rho.
pub const BSGS_LIMIT: u64 = 100_000_000;

/// Default cap on rho starting-pair restarts.
pub const DEFAULT_RHO_ATTEMPTS: u32 = 32;

/// A collision whose exponent gcd exceeds this is discarded as useless.
const RHO_GCD_CAP: u64 = 64;

/// Per-attempt cap on rho iterations.
const RHO_STEP_CAP: u64 = 1 << 26;

/// The four moduli shapes whose unit group is cyclic.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CyclicGroup {
    Two,
    Four,
    OddPrimePower { p: Integer, k: u32 },
    TwiceOddPrimePower { p: Integer, k: u32 },
}

impl CyclicGroup {
    /// Classify m, or `None` when (Z/mZ)* is not cyclic.
    pub fn classify(m: &Integer) -> Option<CyclicGroup> {
        if *m == 2u32 {
            return Some(CyclicGroup::Two);
        }
        if *m == 4u32 {
            return Some(CyclicGroup::Four);
        }
        if *m < 3u32 {
            return None;
        }
        let (odd, doubled) = if m.is_even() {
            let half = Integer::from(m >> 1u32);
            if half.is_even() {
                return None; // divisible by 4 and larger than 4
            }
            (half, true)
        } else {
            (m.clone(), false)
        };
        if odd == 1u32 {
            return None;
        }
        let factors = factor::factorise(&odd);
        if factors.len() != 1 {
            return None;
        }
        let (p, k) = factors.into_iter().next().expect("one factor");
        Some(if doubled {
            CyclicGroup::TwiceOddPrimePower { p, k }
        } else {
            CyclicGroup::OddPrimePower { p, k }
        })
    }

    /// The modulus m the group lives in.
    pub fn modulus(&self) -> Integer {
        match self {
            CyclicGroup::Two => Integer::from(2u32),
            CyclicGroup::Four => Integer::from(4u32),
            CyclicGroup::OddPrimePower { p, k } => p.clone().pow(*k),
            CyclicGroup::TwiceOddPrimePower { p, k } => p.clone().pow(*k) * 2u32,
        }
    }

    /// The group order φ(m).
    pub fn order(&self) -> Integer {
        match self {
            CyclicGroup::Two => Integer::from(1u32),
            CyclicGroup::Four => Integer::from(2u32),
            CyclicGroup::OddPrimePower { p, k } | CyclicGroup::TwiceOddPrimePower { p, k } => {
                Integer::from(p - 1u32) * p.clone().pow(*k - 1)
            }
        }
    }
}

/// A residue in [0, m) together with the fact gcd(value, m) = 1.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MultMod {
    value: Integer,
    modulus: Integer,
}

impl MultMod {
    /// Reduce into [0, m) and check invertibility; `None` for non-units.
    pub fn new(value: &Integer, modulus: &Integer) -> Option<MultMod> {
        assert!(*modulus >= 1u32, "modulus must be positive");
        let v = Integer::from(value.rem_euc(modulus));
        if v.clone().gcd(modulus) != 1u32 {
            return None;
        }
        Some(MultMod {
            value: v,
            modulus: modulus.clone(),
        })
    }

    pub fn value(&self) -> &Integer {
        &self.value
    }

    pub fn modulus(&self) -> &Integer {
        &self.modulus
    }

    /// value^e mod m for e ≥ 0.
    pub fn pow(&self, e: &Integer) -> Integer {
        self.value
            .clone()
            .pow_mod(e, &self.modulus)
            .expect("nonnegative exponent")
    }
}

/// A verified generator of a cyclic group.
#[derive(Clone, Debug)]
pub struct PrimitiveRoot {
    residue: MultMod,
}

impl PrimitiveRoot {
    /// Run the primitive-root test for r in the given group.
    ///
    /// r generates (Z/p^kZ)* iff gcd(r, p) = 1, r^((p−1)/q) ≢ 1 (mod p) for
    /// every prime q | p − 1, and — for k ≥ 2 — r^(p−1) ≢ 1 (mod p²). For
    /// 2p^k, r must additionally be odd, which the unit check subsumes.
    pub fn new(r: &Integer, group: &CyclicGroup) -> Option<PrimitiveRoot> {
        let m = group.modulus();
        let residue = MultMod::new(r, &m)?;
        match group {
            CyclicGroup::Two => {} // the trivial group: every unit generates
            CyclicGroup::Four => {
                if residue.value != 3u32 {
                    return None;
                }
            }
            CyclicGroup::OddPrimePower { p, k }
            | CyclicGroup::TwiceOddPrimePower { p, k } => {
                let p_minus_1 = Integer::from(p - 1u32);
                for (q, _) in factor::factorise(&p_minus_1) {
                    let e = Integer::from(&p_minus_1 / &q);
                    let power = r.clone().pow_mod(&e, p).expect("positive modulus");
                    if power == 1u32 {
                        return None;
                    }
                }
                if *k >= 2 {
                    let p2 = Integer::from(p * p);
                    let power = r.clone().pow_mod(&p_minus_1, &p2).expect("positive modulus");
                    if power == 1u32 {
                        return None;
                    }
                }
            }
        }
        Some(PrimitiveRoot { residue })
    }

    pub fn residue(&self) -> &MultMod {
        &self.residue
    }
}

/// The smallest primitive root of the group.
///
/// # Panics
/// Panics if the search runs past the modulus — impossible for a genuinely
/// cyclic group.
pub fn find_primitive_root(group: &CyclicGroup) -> PrimitiveRoot {
    let m = group.modulus();
    let mut r = Integer::from(1u32);
    while r < m {
        if let Some(root) = PrimitiveRoot::new(&r, group) {
            return root;
        }
        r += 1u32;
    }
    panic!("no primitive root below {} — group is not cyclic", m);
}

/// The unique e ∈ [0, ord(a)) with a^e ≡ b (mod m).
///
/// # Panics
/// Panics if base and target belong to different moduli, or when the rho
/// restart budget is exhausted (see [`discrete_log_with_budget`] for the
/// recoverable form).
pub fn discrete_log(group: &CyclicGroup, base: &PrimitiveRoot, target: &MultMod) -> Integer {
    discrete_log_with_budget(group, base, target, DEFAULT_RHO_ATTEMPTS)
        .expect("rho restart budget exhausted; retry with a larger budget")
}

/// [`discrete_log`] with an explicit cap on Pollard-rho starting pairs;
/// `None` when every restart was spent without a usable collision.
pub fn discrete_log_with_budget(
    group: &CyclicGroup,
    base: &PrimitiveRoot,
    target: &MultMod,
    rho_attempts: u32,
) -> Option<Integer> {
    let m = group.modulus();
    assert_eq!(
        *base.residue().modulus(),
        m,
        "base belongs to a different group"
    );
    assert_eq!(*target.modulus(), m, "target belongs to a different group");

    match group {
        CyclicGroup::Two => Some(Integer::new()),
        CyclicGroup::Four => Some(if *target.value() == 1u32 {
            Integer::new()
        } else {
            Integer::from(1u32)
        }),
        CyclicGroup::OddPrimePower { p, k } => bach_dlog(
            p,
            *k,
            base.residue().value(),
            target.value(),
            rho_attempts,
        ),
        CyclicGroup::TwiceOddPrimePower { p, k } => {
            // t ↦ t mod p^k is an isomorphism onto (Z/p^kZ)*
            let pk = p.clone().pow(*k);
            let a = Integer::from(base.residue().value().rem_euc(&pk));
            let b = Integer::from(target.value().rem_euc(&pk));
            bach_dlog(p, *k, &a, &b, rho_attempts)
        }
    }
}

/// Discrete log mod p^k by Bach reduction.
fn bach_dlog(p: &Integer, k: u32, a: &Integer, b: &Integer, rho_attempts: u32) -> Option<Integer> {
    let a1 = Integer::from(a.rem_euc(p));
    let b1 = Integer::from(b.rem_euc(p));
    let e0 = fp_dlog(p, &a1, &b1, rho_attempts)?;
    if k == 1 {
        return Some(e0);
    }

    let pk = p.clone().pow(k);
    let pk1 = p.clone().pow(k - 1);
    let p2k1 = p.clone().pow(2 * k - 1);
    let phi = Integer::from(&pk - &pk1);

    let theta = |x: &Integer| -> Integer {
        let xe = x.clone().pow_mod(&phi, &p2k1).expect("positive modulus");
        // x^φ ≡ 1 (mod p^k), so the division is exact; the quotient is a
        // well-defined element of Z/p^(k−1)
        Integer::from(&xe - 1u32) / &pk
    };

    let ta = theta(a);
    let tb = theta(b);
    let ta_inv = ta
        .invert(&pk1)
        .expect("θ(a) is a unit mod p^(k−1) for a primitive root a");
    let c = Integer::from(&ta_inv * &tb).rem_euc(&pk1);

    let p_minus_1 = Integer::from(p - 1u32);
    let (e, _lcm) = chinese((&e0, &p_minus_1), (&Integer::from(c), &pk1))
        .expect("p − 1 and p^(k−1) are coprime");
    Some(e)
}

/// Base case: a^e ≡ b (mod p) for an odd prime p and primitive root a.
fn fp_dlog(p: &Integer, a: &Integer, b: &Integer, rho_attempts: u32) -> Option<Integer> {
    if *b == 1u32 {
        return Some(Integer::new());
    }
    match p.to_u64() {
        Some(pu) if pu < BSGS_LIMIT => {
            let au = a.to_u64().expect("reduced residue fits");
            let bu = b.to_u64().expect("reduced residue fits");
            let e = bsgs(au, bu, pu, pu - 1)
                .expect("a primitive root reaches every unit residue");
            Some(Integer::from(e))
        }
        _ => rho_dlog(p, a, b, rho_attempts),
    }
}

/// Baby-step giant-step: smallest x in [0, order) with base^x ≡ target.
///
/// Montgomery arithmetic throughout; the baby-step table keeps the first
/// (smallest) exponent per value, so the returned collision is minimal.
fn bsgs(base: u64, target: u64, p: u64, order: u64) -> Option<u64> {
    let m = isqrt(order.saturating_sub(1)) + 1; // ⌈√order⌉
    let ctx = MontgomeryCtx::new(p);
    let base_mont = ctx.to_mont(base % p);
    let target_mont = ctx.to_mont(target % p);

    let mut table = HashMap::with_capacity(m as usize);
    let mut power = ctx.one();
    for j in 0..m {
        table.entry(power).or_insert(j);
        power = ctx.mul(power, base_mont);
    }

    let base_inv = ctx.mod_inverse(base_mont)?;
    let giant = ctx.pow_mod(base_inv, m);

    let mut gamma = target_mont;
    for i in 0..=m {
        if let Some(&j) = table.get(&gamma) {
            let x = i * m + j;
            if x < order {
                return Some(x);
            }
        }
        gamma = ctx.mul(gamma, giant);
    }
    None
}

/// Pollard rho with the standard three-region walk.
///
/// State x = a^α·b^β advances by x², a·x or b·x according to x mod 3; a
/// Floyd collision yields α₁ + eβ₁ ≡ α₂ + eβ₂ (mod p−1), solved as a linear
/// congruence after a gcd precheck. Starting pairs (α₀, β₀) vary per
/// attempt, deterministically.
fn rho_dlog(p: &Integer, a: &Integer, b: &Integer, attempts: u32) -> Option<Integer> {
    let n_ord = Integer::from(p - 1u32);

    for attempt in 0..attempts {
        let alpha0 = Integer::from(attempt + 1);
        let beta0 = Integer::from(2 * attempt + 1);
        let x0 = Integer::from(
            a.clone().pow_mod(&alpha0, p).expect("positive modulus")
                * b.clone().pow_mod(&beta0, p).expect("positive modulus"),
        ) % p;

        let mut slow = (x0.clone(), alpha0.clone(), beta0.clone());
        let mut fast = (x0, alpha0, beta0);

        let mut found = None;
        for _ in 0..RHO_STEP_CAP {
            slow = rho_step(slow, a, b, p, &n_ord);
            fast = rho_step(rho_step(fast, a, b, p, &n_ord), a, b, p, &n_ord);
            if slow.0 == fast.0 {
                found = Some((slow.clone(), fast.clone()));
                break;
            }
        }
        let Some(((_, a1, b1), (_, a2, b2))) = found else {
            debug!(attempt, "rho walk hit the step cap without colliding");
            continue;
        };

        // e·(β₁ − β₂) ≡ α₂ − α₁ (mod p − 1)
        let dbeta = Integer::from(&b1 - &b2).rem_euc(&n_ord);
        let dalpha = Integer::from(&a2 - &a1).rem_euc(&n_ord);
        let dbeta = Integer::from(dbeta);
        let dalpha = Integer::from(dalpha);
        if dbeta == 0u32 {
            debug!(attempt, "degenerate collision (Δβ = 0), restarting");
            continue;
        }
        let g = dbeta.clone().gcd(&n_ord);
        let g_small = match g.to_u64() {
            Some(v) if v <= RHO_GCD_CAP => v,
            _ => {
                debug!(attempt, "collision gcd too large, restarting");
                continue;
            }
        };

        if !dalpha.is_divisible(&g) {
            debug!(attempt, "inconsistent collision, restarting");
            continue;
        }
        let n_g = Integer::from(&n_ord / &g);
        let db_g = Integer::from(&dbeta / &g);
        let da_g = Integer::from(&dalpha / &g);
        let inv = db_g
            .invert(&n_g)
            .expect("Δβ/g is a unit mod (p−1)/g by construction");
        let e_base = Integer::from(&da_g * &inv).rem_euc(&n_g);
        let e_base = Integer::from(e_base);

        // one of the g lifts is the true exponent
        for i in 0..g_small {
            let cand = Integer::from(&e_base + Integer::from(&n_g * i));
            let check = a.clone().pow_mod(&cand, p).expect("positive modulus");
            if check == *b {
                return Some(cand);
            }
        }
        debug!(attempt, "no lift verified, restarting");
    }
    None
}

type RhoState = (Integer, Integer, Integer);

fn rho_step(state: RhoState, a: &Integer, b: &Integer, p: &Integer, n_ord: &Integer) -> RhoState {
    let (x, alpha, beta) = state;
    match x.mod_u(3) {
        0 => (
            Integer::from(&x * &x) % p,
            Integer::from(&alpha * 2u32) % n_ord,
            Integer::from(&beta * 2u32) % n_ord,
        ),
        1 => (
            Integer::from(&x * a) % p,
            Integer::from(&alpha + 1u32) % n_ord,
            beta,
        ),
        _ => (
            Integer::from(&x * b) % p,
            alpha,
            Integer::from(&beta + 1u32) % n_ord,
        ),
    }
}
