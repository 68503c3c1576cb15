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

//! Bracketing search for the root of a partial derivative.
//!
//! The derivative of the dual objective along one multiplier is increasing
//! in that multiplier. The search starts from the multiplier's current
//! value, grows or shrinks the bracket geometrically until it straddles
//! zero, then bisects.

use tracing::{error, trace, warn};

/// Below this magnitude, a derivative or a bracket width counts as zero.
const DICHOTOMY_RESOLUTION: f64 = 1e-20;

/// Where the derivative is sampled to decide whether zero is optimal, and
/// the smallest multiplier the search returns.
pub(crate) const DICHOTOMY_FLOOR: f64 = 1e-16;

/// Returns the non-negative root of `diff`, starting from `init`.
///
/// Returns `DICHOTOMY_FLOOR` when the derivative is already non-negative
/// at the origin. Stops early, with a warning, when the bracket cannot be split
/// any further.
///
/// # Panics
///
/// Panics if the bracket ends up with the signs inverted or the derivative
/// returns NaN; both mean the derivative is not monotone.
pub(crate) fn dichotomy<F>(init: f64, mut diff: F, min_error: f64) -> f64
where
    F: FnMut(f64) -> f64,
{
    let (mut min, mut max) = if init.abs() < DICHOTOMY_RESOLUTION {
        (0.5, 0.5)
    } else {
        (init, init)
    };

    if diff(DICHOTOMY_FLOOR) >= 0.0 {
        trace!("derivative non-negative at the origin");
        return DICHOTOMY_FLOOR;
    }

    let mut min_diff = diff(min);
    let mut max_diff = diff(max);
    let mut overall_error = 1.0;

    while overall_error > min_error {
        trace!(min, max, min_diff, max_diff, overall_error, "dichotomy step");
        if min_diff > 0.0 && max_diff > 0.0 {
            if min == max {
                min /= 2.0;
                min_diff = diff(min);
            } else {
                max = min;
                max_diff = min_diff;
            }
        } else if min_diff < 0.0 && max_diff < 0.0 {
            if min == max {
                max *= 2.0;
                max_diff = diff(max);
            } else {
                min = max;
                min_diff = max_diff;
            }
        } else if min_diff < 0.0 && max_diff > 0.0 {
            let middle = (max + min) / 2.0;
            if (min - middle).abs() < DICHOTOMY_RESOLUTION
                || (max - middle).abs() < DICHOTOMY_RESOLUTION
            {
                warn!(min, max, "cannot improve the convergence");
                break;
            }
            let middle_diff = diff(middle);
            if middle_diff < 0.0 {
                min = middle;
                overall_error = max_diff - middle_diff;
                min_diff = middle_diff;
            } else if middle_diff > 0.0 {
                max = middle;
                overall_error = max_diff - middle_diff;
                max_diff = middle_diff;
            } else {
                overall_error = 0.0;
            }
        } else if min_diff.abs() < DICHOTOMY_RESOLUTION {
            max = min;
            overall_error = 0.0;
        } else if max_diff.abs() < DICHOTOMY_RESOLUTION {
            min = max;
            overall_error = 0.0;
        } else if min_diff > 0.0 && max_diff < 0.0 {
            error!(min, max, min_diff, max_diff, "dichotomy bracket is inverted");
            panic!(
                "called `dichotomy` with a decreasing derivative: diff({}) = {} > 0 > diff({}) = {}",
                min, min_diff, max, max_diff
            );
        } else {
            error!(min, max, min_diff, max_diff, "dichotomy lost its bracket");
            panic!(
                "called `dichotomy` with a derivative that is not comparable: diff({}) = {}, diff({}) = {}",
                min, min_diff, max, max_diff
            );
        }
    }

    (min + max) / 2.0
}
