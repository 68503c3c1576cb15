// Copyright (c) 2025 Felix Kahle.
//
// Permission is hereby granted, free of charge, to any person obtaining
// a copy of this software and associated documentation files (the
// "Software"), to deal in the Software without restriction, including
// without limitation the rights to use, copy, modify, merge, publish,
// distribute, sublicense, and/or sell copies of the Software, and to
// permit persons to whom the Software is furnished to do so, subject to
// the following conditions:
//
// The above copyright notice and this permission notice shall be
// included in all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND,
// EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF
// MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND
// NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE
// LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION
// OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN CONNECTION
// WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

//! # Precision-Aware Comparisons
//!
//! Every solver in the engine compares against a single threshold. Values
//! that are not strictly above the threshold count as zero; subtractions that
//! would leave a residue below the threshold snap to exactly zero.
//!
//! ## Highlights
//!
//! - `Precision`: validated, strictly positive and finite threshold with a
//!   default of `1e-5` (the historical max-min precision).
//! - `double_positive`, `double_equals`, `double_update`: free helpers generic
//!   over `num_traits::Float`, usable with either `f32` or `f64`.
//!
//! ## Usage
//!
//! ```rust
//! use fairshare_core::num::precision::{double_update, Precision};
//!
//! let precision = Precision::default();
//! let mut remaining = 10.0_f64;
//! double_update(&mut remaining, 10.0 - 1e-7, precision.get());
//! assert_eq!(remaining, 0.0);
//! assert!(!precision.is_positive(1e-6));
//! ```

use num_traits::Float;

/// The default threshold under which quantities are considered zero.
pub const DEFAULT_MAXMIN_PRECISION: f64 = 1e-5;

/// Returns `true` if `value` is strictly greater than `precision`.
///
/// # Examples
///
/// ```rust
/// # use fairshare_core::num::precision::double_positive;
/// assert!(double_positive(1.0_f64, 1e-5));
/// assert!(!double_positive(1e-6_f64, 1e-5));
/// assert!(!double_positive(-3.0_f64, 1e-5));
/// ```
#[inline(always)]
pub fn double_positive<F>(value: F, precision: F) -> bool
where
    F: Float,
{
    value > precision
}

/// Returns `true` if `a` and `b` differ by strictly less than `precision`.
///
/// # Examples
///
/// ```rust
/// # use fairshare_core::num::precision::double_equals;
/// assert!(double_equals(5.0_f64, 5.000001, 1e-5));
/// assert!(!double_equals(5.0_f64, 5.1, 1e-5));
/// ```
#[inline(always)]
pub fn double_equals<F>(a: F, b: F, precision: F) -> bool
where
    F: Float,
{
    (b - a).abs() < precision
}

/// Subtracts `delta` from `value`, flooring the result to zero whenever it
/// falls below `precision`.
///
/// # Examples
///
/// ```rust
/// # use fairshare_core::num::precision::double_update;
/// let mut v = 3.0_f64;
/// double_update(&mut v, 1.0, 1e-5);
/// assert_eq!(v, 2.0);
/// double_update(&mut v, 2.0 - 1e-9, 1e-5);
/// assert_eq!(v, 0.0);
/// ```
#[inline(always)]
pub fn double_update<F>(value: &mut F, delta: F, precision: F)
where
    F: Float,
{
    *value = *value - delta;
    if *value < precision {
        *value = F::zero();
    }
}

/// A strictly positive, finite precision threshold.
///
/// The threshold is either used as is (absolute comparisons) or scaled by the
/// magnitude of the quantity being compared (relative comparisons, e.g. a
/// constraint's remaining capacity against `bound * precision`).
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, PartialOrd)]
pub struct Precision(f64);

impl Precision {
    /// Creates a new precision threshold.
    ///
    /// Returns `None` if `value` is not finite or not strictly positive.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use fairshare_core::num::precision::Precision;
    /// assert!(Precision::new(1e-9).is_some());
    /// assert!(Precision::new(0.0).is_none());
    /// assert!(Precision::new(f64::NAN).is_none());
    /// ```
    #[inline]
    pub fn new(value: f64) -> Option<Self> {
        if value.is_finite() && value > 0.0 {
            Some(Self(value))
        } else {
            None
        }
    }

    /// Returns the raw threshold.
    #[inline(always)]
    pub const fn get(self) -> f64 {
        self.0
    }

    /// Returns the threshold scaled by `magnitude`.
    #[inline(always)]
    pub fn scaled(self, magnitude: f64) -> f64 {
        magnitude * self.0
    }

    /// Returns `true` if `value` is above the absolute threshold.
    #[inline(always)]
    pub fn is_positive(self, value: f64) -> bool {
        double_positive(value, self.0)
    }

    /// Returns `true` if `value` is above the threshold scaled by `magnitude`.
    #[inline(always)]
    pub fn is_positive_relative(self, value: f64, magnitude: f64) -> bool {
        double_positive(value, self.scaled(magnitude))
    }

    /// Returns `true` if `a` and `b` are equal up to the absolute threshold.
    #[inline(always)]
    pub fn equals(self, a: f64, b: f64) -> bool {
        double_equals(a, b, self.0)
    }

    /// Subtracts `delta` from `value`, flooring to zero under the threshold
    /// scaled by `magnitude`.
    #[inline(always)]
    pub fn update_relative(self, value: &mut f64, delta: f64, magnitude: f64) {
        double_update(value, delta, self.scaled(magnitude));
    }
}

impl Default for Precision {
    fn default() -> Self {
        Self(DEFAULT_MAXMIN_PRECISION)
    }
}

impl std::fmt::Debug for Precision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Precision({:e})", self.0)
    }
}

impl std::fmt::Display for Precision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:e}", self.0)
    }
}

impl From<Precision> for f64 {
    fn from(precision: Precision) -> Self {
        precision.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_double_positive_is_strict() {
        assert!(!double_positive(1e-5_f64, 1e-5));
        assert!(double_positive(2e-5_f64, 1e-5));
        assert!(!double_positive(0.0_f64, 1e-5));
    }

    #[test]
    fn test_double_equals_symmetric() {
        assert!(double_equals(1.0_f64, 1.0 + 5e-6, 1e-5));
        assert!(double_equals(1.0 + 5e-6, 1.0_f64, 1e-5));
        assert!(!double_equals(1.0_f64, 1.0 + 2e-5, 1e-5));
    }

    #[test]
    fn test_double_update_floors_noise() {
        let mut v = 1.0_f64;
        double_update(&mut v, 0.999_999_9, 1e-5);
        assert_eq!(v, 0.0);

        let mut w = 1.0_f64;
        double_update(&mut w, 2.0, 1e-5);
        assert_eq!(w, 0.0, "negative residues are floored as well");
    }

    #[test]
    fn test_double_update_keeps_significant_values() {
        let mut v = 10.0_f64;
        double_update(&mut v, 4.0, 1e-5);
        assert_eq!(v, 6.0);
    }

    #[test]
    fn test_double_update_generic_f32() {
        let mut v = 1.0_f32;
        double_update(&mut v, 0.5, 1e-3);
        assert_eq!(v, 0.5);
    }

    #[test]
    fn test_precision_rejects_invalid() {
        assert!(Precision::new(-1.0).is_none());
        assert!(Precision::new(f64::INFINITY).is_none());
        assert_eq!(Precision::new(1e-7).map(Precision::get), Some(1e-7));
    }

    #[test]
    fn test_precision_default_value() {
        assert_eq!(Precision::default().get(), DEFAULT_MAXMIN_PRECISION);
    }

    #[test]
    fn test_precision_relative_comparisons() {
        let p = Precision::default();
        // 1e-3 is significant in absolute terms but not relative to 1e3.
        assert!(p.is_positive(1e-3));
        assert!(!p.is_positive_relative(1e-3, 1e3));

        let mut remaining = 1000.0;
        p.update_relative(&mut remaining, 999.995, 1000.0);
        assert_eq!(remaining, 0.0);
    }

    #[test]
    fn test_precision_display() {
        let p = Precision::default();
        assert_eq!(format!("{}", p), "1e-5");
        assert_eq!(format!("{:?}", p), "Precision(1e-5)");
    }
}
