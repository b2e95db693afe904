//! # Euclidean division capability
//!
//! The two division surfaces the crate's carriers share: truncating
//! `quot_rem` and flooring `div_mod_floor`. Rational integers and Eisenstein
//! integers implement it directly; the generic `gcd` below runs on either
//! with static dispatch.
//!
//! Only the flooring form guarantees a remainder strictly smaller than the
//! divisor under the carrier's size measure (absolute value, or the field
//! norm on Z[ω]); `gcd` therefore reduces with `div_mod_floor`.

use rug::Integer;

/// Division with remainder, in the two roundings callers distinguish.
pub trait Euclidean: Sized + Clone {
    /// Quotient rounded toward zero.
    fn quot_rem(&self, divisor: &Self) -> (Self, Self);

    /// Quotient rounded toward −∞ (componentwise for Z[ω]); the remainder
    /// measure strictly decreases, so repeated reduction terminates.
    fn div_mod_floor(&self, divisor: &Self) -> (Self, Self);

    fn is_zero(&self) -> bool;
}

impl Euclidean for Integer {
    fn quot_rem(&self, divisor: &Self) -> (Self, Self) {
        self.clone().div_rem(divisor.clone())
    }

    fn div_mod_floor(&self, divisor: &Self) -> (Self, Self) {
        self.clone().div_rem_floor(divisor.clone())
    }

    fn is_zero(&self) -> bool {
        *self == 0u32
    }
}

/// Euclidean gcd by repeated flooring reduction.
///
/// For Z this agrees with the usual gcd up to sign; for Z[ω] the result is
/// determined up to a unit, as any gcd in a non-ordered ring is.
pub fn gcd<T: Euclidean>(a: &T, b: &T) -> T {
    let mut a = a.clone();
    let mut b = b.clone();
    while !b.is_zero() {
        let (_, r) = a.div_mod_floor(&b);
        a = b;
        b = r;
    }
    a
}
