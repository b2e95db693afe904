//! # Sparse GF(2) linear algebra
//!
//! Null-space vectors of the sparse binary matrices produced by smooth-
//! relation sieving. A matrix is stored column-major: each column is the
//! ascending list of row indices where the bit is 1, which is exactly the
//! shape a parity vector arrives in.
//!
//! The solver runs three stages, cheapest first:
//!
//! 1. **Zero columns** — an all-zero column is already a kernel unit vector.
//! 2. **Scalar Wiedemann** — computes the sequence a_i = uᵀMⁱb for random
//!    u, b, recovers its minimal polynomial with Berlekamp–Massey over
//!    GF(2), strips the λ^s factor, and walks g(M)b down to the kernel.
//!    Deterministic for a given seed; a bounded number of (u, b) probes.
//! 3. **Structured Gaussian elimination** — pivot-per-row column reduction
//!    tracking combination masks. Slower but guaranteed: whenever the
//!    columns outnumber the distinct occupied rows, a dependency exists and
//!    is found.
//!
//! ## References
//!
//! - D. Wiedemann, "Solving Sparse Linear Equations Over Finite Fields",
//!   IEEE Trans. Information Theory, 32(1):54–62, 1986.
//! - J. Massey, "Shift-Register Synthesis and BCH Decoding", IEEE Trans.
//!   Information Theory, 15(1):122–127, 1969.

use crate::bits::BitVec;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

/// How many (u, b) probe pairs Wiedemann tries before the Gaussian fallback.
const WIEDEMANN_ATTEMPTS: u64 = 8;

/// Square sparse matrix over GF(2), column-major.
///
/// The constructor pairs the column count with the row-index bound, so a
/// vector of length `dim` is the only shape `apply` accepts.
pub struct SparseMatrix {
    dim: usize,
    cols: Vec<Vec<usize>>,
}

impl SparseMatrix {
    /// Build a `dim × dim` matrix from its columns.
    ///
    /// # Panics
    /// Panics if `cols.len() != dim` or any row index is out of range —
    /// mismatched matrix/vector shapes are a caller bug, not a recoverable
    /// condition.
    pub fn new(dim: usize, cols: Vec<Vec<usize>>) -> Self {
        assert_eq!(cols.len(), dim, "a square matrix needs dim columns");
        for (j, col) in cols.iter().enumerate() {
            for &r in col {
                assert!(r < dim, "row index {} out of range in column {}", r, j);
            }
        }
        SparseMatrix { dim, cols }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Matrix-vector product Mv: the XOR of the columns selected by v.
    ///
    /// # Panics
    /// Panics if `v.len() != dim`.
    pub fn apply(&self, v: &BitVec) -> BitVec {
        assert_eq!(v.len(), self.dim, "vector length must match matrix dimension");
        let mut out = BitVec::new(self.dim);
        for j in v.iter_set_bits() {
            for &r in &self.cols[j] {
                out.flip(r);
            }
        }
        out
    }
}

/// A nonzero v with Mv = 0, or `None` when no dependency was found.
///
/// Deterministic given `seed`. When the matrix genuinely has a nontrivial
/// kernel (the caller's guarantee once relations outnumber occupied rows),
/// the Gaussian stage finds it, so `None` means the kernel is trivial.
pub fn null_vector(m: &SparseMatrix, seed: u64) -> Option<BitVec> {
    null_vectors(m, seed, 1).into_iter().next()
}

/// Up to `max` distinct nonzero kernel vectors, cheapest discoveries first.
pub fn null_vectors(m: &SparseMatrix, seed: u64, max: usize) -> Vec<BitVec> {
    let mut found: Vec<BitVec> = Vec::new();
    if m.dim == 0 || max == 0 {
        return found;
    }

    // Stage 1: zero columns are kernel unit vectors outright.
    for (j, col) in m.cols.iter().enumerate() {
        if col.is_empty() {
            let mut v = BitVec::new(m.dim);
            v.set(j);
            found.push(v);
            if found.len() >= max {
                return found;
            }
        }
    }

    // Stage 2: seeded Wiedemann probes.
    for attempt in 0..WIEDEMANN_ATTEMPTS {
        if found.len() >= max {
            return found;
        }
        if let Some(v) = wiedemann_probe(m, seed.wrapping_add(attempt)) {
            debug_assert!(m.apply(&v).is_zero());
            if !found.contains(&v) {
                debug!(attempt, "wiedemann probe found a kernel vector");
                found.push(v);
            }
        }
    }

    // Stage 3: Gaussian elimination enumerates the rest.
    if found.len() < max {
        for v in gaussian_null_vectors(m, max) {
            if !found.contains(&v) {
                found.push(v);
                if found.len() >= max {
                    break;
                }
            }
        }
    }
    found.truncate(max);
    found
}

/// One Wiedemann probe: random u, b; Berlekamp–Massey on uᵀMⁱb; kernel walk.
fn wiedemann_probe(m: &SparseMatrix, seed: u64) -> Option<BitVec> {
    let n = m.dim;
    let mut rng = StdRng::seed_from_u64(seed);

    let u = random_nonzero(&mut rng, n);
    let b = random_nonzero(&mut rng, n);

    // a_i = uᵀ Mⁱ b for i = 0 .. 2n−1
    let mut seq = Vec::with_capacity(2 * n);
    let mut krylov = b.clone();
    for _ in 0..2 * n {
        seq.push(dot(&u, &krylov));
        krylov = m.apply(&krylov);
    }

    let conn = berlekamp_massey(&seq);
    let l = conn.len() - 1;
    if l == 0 {
        return None; // zero sequence: the probe saw nothing
    }

    // Minimal polynomial μ(λ) = λ^l·C(1/λ): coefficient of λ^j is conn[l−j].
    // Strip λ^s so that g(0) = 1.
    let s = (0..=l).find(|&j| conn[l - j])?;
    if s == 0 {
        return None; // μ(0) = 1: M acts invertibly on this Krylov space
    }

    // w = g(M)·b with g_j = μ_{s+j}
    let mut w = BitVec::new(n);
    let mut krylov = b;
    for j in 0..=(l - s) {
        if conn[l - (s + j)] {
            w.xor_assign(&krylov);
        }
        if j < l - s {
            krylov = m.apply(&krylov);
        }
    }
    if w.is_zero() {
        return None;
    }

    // μ(M)b = M^s·w = 0 when μ is the true minimal polynomial of b, so some
    // M^j·w with j < s is the last nonzero iterate — a kernel vector.
    let mut v = w;
    for _ in 0..=s {
        let next = m.apply(&v);
        if next.is_zero() {
            return Some(v);
        }
        v = next;
    }
    None
}

fn random_nonzero(rng: &mut StdRng, n: usize) -> BitVec {
    loop {
        let mut v = BitVec::new(n);
        for i in 0..n {
            if rng.random::<bool>() {
                v.set(i);
            }
        }
        if !v.is_zero() {
            return v;
        }
    }
}

/// Parity of ⟨u, v⟩ over GF(2).
fn dot(u: &BitVec, v: &BitVec) -> bool {
    u.iter_set_bits().filter(|&i| v.get(i)).count() % 2 == 1
}

/// Berlekamp–Massey over GF(2): the shortest connection polynomial
/// C(x) = 1 + c₁x + … + c_Lx^L with sₙ = Σᵢ cᵢ·sₙ₋ᵢ for all n ≥ L.
///
/// Returns the coefficient vector `[1, c₁, …, c_L]`.
fn berlekamp_massey(s: &[bool]) -> Vec<bool> {
    let n = s.len();
    let mut c = vec![false; n + 1];
    let mut b = vec![false; n + 1];
    c[0] = true;
    b[0] = true;
    let mut l = 0usize;
    let mut m = 1usize;

    for i in 0..n {
        // discrepancy
        let mut d = s[i];
        for j in 1..=l {
            if c[j] && s[i - j] {
                d = !d;
            }
        }
        if !d {
            m += 1;
        } else if 2 * l <= i {
            let t = c.clone();
            for j in 0..=(n - m) {
                if b[j] {
                    c[j + m] ^= true;
                }
            }
            l = i + 1 - l;
            b = t;
            m = 1;
        } else {
            for j in 0..=(n - m) {
                if b[j] {
                    c[j + m] ^= true;
                }
            }
            m += 1;
        }
    }

    c.truncate(l + 1);
    c
}

/// Column reduction with combination tracking. Every column that reduces to
/// zero yields the XOR-combination that produced it — a kernel vector.
fn gaussian_null_vectors(m: &SparseMatrix, max: usize) -> Vec<BitVec> {
    let n = m.dim;
    let mut pivots: Vec<Option<usize>> = vec![None; n]; // row → pivot column
    let mut work: Vec<BitVec> = Vec::with_capacity(n);
    let mut combos: Vec<BitVec> = Vec::with_capacity(n);
    let mut kernel = Vec::new();

    for j in 0..n {
        let mut col = BitVec::new(n);
        for &r in &m.cols[j] {
            col.flip(r);
        }
        let mut combo = BitVec::new(n);
        combo.set(j);

        // Reduce by established pivots
        while let Some(row) = col.first_set() {
            match pivots[row] {
                Some(pj) => {
                    col.xor_assign(&work[pj]);
                    combo.xor_assign(&combos[pj]);
                }
                None => break,
            }
        }

        match col.first_set() {
            None => {
                kernel.push(combo.clone());
                if kernel.len() >= max {
                    // keep bookkeeping consistent even on early exit
                    work.push(col);
                    combos.push(combo);
                    break;
                }
            }
            Some(row) => {
                pivots[row] = Some(j);
            }
        }
        work.push(col);
        combos.push(combo);
    }
    kernel
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix(dim: usize, cols: &[&[usize]]) -> SparseMatrix {
        SparseMatrix::new(dim, cols.iter().map(|c| c.to_vec()).collect())
    }

    fn check_kernel(m: &SparseMatrix, v: &BitVec) {
        assert!(!v.is_zero(), "kernel vector must be nonzero");
        assert!(m.apply(v).is_zero(), "Mv must be zero");
    }

    // ── constructor pairing ──────────────────────────────────────────

    #[test]
    #[should_panic(expected = "dim columns")]
    fn constructor_rejects_wrong_column_count() {
        SparseMatrix::new(3, vec![vec![0], vec![1]]);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn constructor_rejects_row_overflow() {
        SparseMatrix::new(2, vec![vec![0], vec![2]]);
    }

    #[test]
    #[should_panic(expected = "vector length")]
    fn apply_rejects_mismatched_vector() {
        let m = matrix(2, &[&[0], &[1]]);
        let v = BitVec::new(3);
        m.apply(&v);
    }

    // ── solving ──────────────────────────────────────────────────────

    #[test]
    fn identity_has_trivial_kernel() {
        let m = matrix(4, &[&[0], &[1], &[2], &[3]]);
        assert!(null_vector(&m, 1).is_none());
    }

    #[test]
    fn zero_column_is_found_immediately() {
        let m = matrix(3, &[&[0, 1], &[], &[1, 2]]);
        let v = null_vector(&m, 1).unwrap();
        check_kernel(&m, &v);
        assert_eq!(v.iter_set_bits().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn duplicate_columns_form_a_dependency() {
        let m = matrix(4, &[&[0, 2], &[1], &[0, 2], &[3]]);
        let v = null_vector(&m, 7).unwrap();
        check_kernel(&m, &v);
        assert_eq!(v.iter_set_bits().collect::<Vec<_>>(), vec![0, 2]);
    }

    #[test]
    fn three_way_dependency() {
        // c0 ^ c1 = c2
        let m = matrix(5, &[&[0, 1], &[1, 2], &[0, 2], &[3], &[4]]);
        let v = null_vector(&m, 42).unwrap();
        check_kernel(&m, &v);
        assert_eq!(v.iter_set_bits().collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn deterministic_for_fixed_seed() {
        let cols: Vec<Vec<usize>> = vec![
            vec![0, 3],
            vec![1, 2],
            vec![0, 1],
            vec![2, 3],
            vec![0, 1, 2, 3],
            vec![4],
        ];
        let m = SparseMatrix::new(6, cols.clone());
        let a = null_vector(&m, 99).unwrap();
        let m2 = SparseMatrix::new(6, cols);
        let b = null_vector(&m2, 99).unwrap();
        assert_eq!(a, b);
        check_kernel(&m, &a);
    }

    #[test]
    fn multiple_distinct_dependencies() {
        // Two independent dependencies: {0,1} and {2,3}
        let m = matrix(6, &[&[0], &[0], &[1, 2], &[1, 2], &[3], &[4]]);
        let vs = null_vectors(&m, 5, 4);
        assert!(vs.len() >= 2, "expected at least two kernel vectors");
        for v in &vs {
            check_kernel(&m, v);
        }
        for (i, a) in vs.iter().enumerate() {
            for b in &vs[i + 1..] {
                assert_ne!(a, b, "kernel vectors must be distinct");
            }
        }
    }

    #[test]
    fn wide_sieve_shaped_matrix() {
        // More columns with support than occupied rows → dependency must exist.
        // Rows 0..4 occupied, 8 columns, padded square to dim 8.
        let cols: Vec<Vec<usize>> = vec![
            vec![0, 1],
            vec![1, 2],
            vec![2, 3],
            vec![3, 4],
            vec![0, 4],
            vec![0, 1, 2],
            vec![1, 3, 4],
            vec![2, 4],
        ];
        let m = SparseMatrix::new(8, cols);
        let v = null_vector(&m, 2026).expect("kernel is guaranteed");
        check_kernel(&m, &v);
    }

    // ── Berlekamp–Massey ─────────────────────────────────────────────

    #[test]
    fn bm_recovers_short_lfsr() {
        // s_n = s_{n-1} ^ s_{n-2} (Fibonacci over GF(2)): 1,1,0,1,1,0,...
        let seq: Vec<bool> = [1u8, 1, 0, 1, 1, 0, 1, 1, 0, 1]
            .iter()
            .map(|&x| x == 1)
            .collect();
        let c = berlekamp_massey(&seq);
        assert_eq!(c, vec![true, true, true]); // 1 + x + x²
    }

    #[test]
    fn bm_constant_sequence() {
        let seq = vec![true; 8];
        let c = berlekamp_massey(&seq);
        assert_eq!(c, vec![true, true]); // s_n = s_{n-1}
    }

    #[test]
    fn bm_zero_sequence() {
        let seq = vec![false; 8];
        let c = berlekamp_massey(&seq);
        assert_eq!(c, vec![true]); // degree 0
    }
}
