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

//! # Utility Functions
//!
//! The Lagrangian solver maximizes `sum_i f(w_i, x_i)` and only needs three
//! views of each utility: the function itself, its derivative `fp` and the
//! inverse of the derivative `fpi`. The three families below model the
//! steady-state throughput of TCP congestion-control variants, with `w`
//! standing for the flow's round-trip weight.
//!
//! Calling a function outside its domain is a programming error and panics.

/// A concave utility family `f(w, x)` with an invertible derivative.
pub trait Utility {
    /// A short name used in logs.
    fn name(&self) -> &str;

    /// The utility of value `x` for weight `w`.
    fn f(&self, weight: f64, x: f64) -> f64;

    /// The derivative `df/dx` at `x`.
    fn fp(&self, weight: f64, x: f64) -> f64;

    /// The inverse of `fp`: the value whose marginal utility is `x`.
    fn fpi(&self, weight: f64, x: f64) -> f64;
}

/// Keeps Vegas' logarithm away from the flat part of its curve.
pub const VEGAS_SCALING: f64 = 1000.0;

/// TCP Vegas: `f(x) = a * w * ln(x)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Vegas;

impl Utility for Vegas {
    fn name(&self) -> &str {
        "Vegas"
    }

    #[inline]
    fn f(&self, weight: f64, x: f64) -> f64 {
        assert!(x > 0.0, "called `Vegas::f` with non-positive value {}", x);
        VEGAS_SCALING * weight * x.ln()
    }

    #[inline]
    fn fp(&self, weight: f64, x: f64) -> f64 {
        assert!(x > 0.0, "called `Vegas::fp` with non-positive value {}", x);
        VEGAS_SCALING * weight / x
    }

    #[inline]
    fn fpi(&self, weight: f64, x: f64) -> f64 {
        assert!(x > 0.0, "called `Vegas::fpi` with non-positive value {}", x);
        weight / (x / VEGAS_SCALING)
    }
}

/// TCP Reno: `f(x) = sqrt(3/2) / w * atan(sqrt(3/2) * w * x)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Reno;

impl Utility for Reno {
    fn name(&self) -> &str {
        "Reno"
    }

    #[inline]
    fn f(&self, weight: f64, x: f64) -> f64 {
        assert!(
            weight > 0.0,
            "called `Reno::f` with non-positive weight {}",
            weight
        );
        let k = 1.5f64.sqrt();
        k / weight * (k * weight * x).atan()
    }

    #[inline]
    fn fp(&self, weight: f64, x: f64) -> f64 {
        3.0 / (3.0 * weight * weight * x * x + 2.0)
    }

    #[inline]
    fn fpi(&self, weight: f64, x: f64) -> f64 {
        assert!(x > 0.0, "called `Reno::fpi` with non-positive value {}", x);
        let res = 1.0 / (weight * weight * x) - 2.0 / (3.0 * weight * weight);
        if res <= 0.0 {
            0.0
        } else {
            res.sqrt()
        }
    }
}

/// A variant of Reno: `f(x) = ln(x w / (2 x w + 3)) / w`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Reno2;

impl Utility for Reno2 {
    fn name(&self) -> &str {
        "Reno2"
    }

    #[inline]
    fn f(&self, weight: f64, x: f64) -> f64 {
        assert!(
            weight > 0.0,
            "called `Reno2::f` with non-positive weight {}",
            weight
        );
        (x * weight / (2.0 * x * weight + 3.0)).ln() / weight
    }

    #[inline]
    fn fp(&self, weight: f64, x: f64) -> f64 {
        3.0 / (weight * x * (2.0 * weight * x + 3.0))
    }

    #[inline]
    fn fpi(&self, weight: f64, x: f64) -> f64 {
        // positive root of 2 w^2 x y^2 + 3 w x y - 3 = 0
        if x <= 0.0 || weight <= 0.0 {
            return 0.0;
        }
        let res = x * (9.0 * x + 24.0);
        (-3.0 * x + res.sqrt()) / (4.0 * weight * x)
    }
}

/// The built-in utility families, selectable by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum UtilityKind {
    #[default]
    Vegas,
    Reno,
    Reno2,
}

impl UtilityKind {
    #[inline]
    fn as_utility(&self) -> &'static dyn Utility {
        match self {
            UtilityKind::Vegas => &Vegas,
            UtilityKind::Reno => &Reno,
            UtilityKind::Reno2 => &Reno2,
        }
    }
}

impl Utility for UtilityKind {
    fn name(&self) -> &str {
        self.as_utility().name()
    }

    #[inline]
    fn f(&self, weight: f64, x: f64) -> f64 {
        self.as_utility().f(weight, x)
    }

    #[inline]
    fn fp(&self, weight: f64, x: f64) -> f64 {
        self.as_utility().fp(weight, x)
    }

    #[inline]
    fn fpi(&self, weight: f64, x: f64) -> f64 {
        self.as_utility().fpi(weight, x)
    }
}

impl std::fmt::Display for UtilityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_utility().name())
    }
}
