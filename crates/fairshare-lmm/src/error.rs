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

//! Recoverable errors of the resource-sharing system.
//!
//! Programming errors (negative weights, broken concurrency accounting,
//! a bracketing search that lost its root) are not represented here: they
//! are logged and abort through a panic.

use crate::index::{ConstraintIndex, VariableIndex};
use thiserror::Error;

/// Errors returned by fallible `System` and configuration operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LmmError {
    /// The variable has no element on the given constraint.
    #[error("variable {variable} is not attached to constraint {constraint}")]
    ElementNotFound {
        constraint: ConstraintIndex,
        variable: VariableIndex,
    },

    /// A concurrency limit below the maximum concurrency already observed.
    #[error("concurrency limit {limit} is below the observed maximum concurrency {maximum}")]
    ConcurrencyLimitBelowMaximum { limit: usize, maximum: usize },

    /// An algorithm name that does not denote a known solver.
    #[error("unknown sharing algorithm `{0}`")]
    UnknownAlgorithm(String),

    /// A precision threshold that is not finite and strictly positive.
    #[error("invalid precision {0}: expected a finite, strictly positive value")]
    InvalidPrecision(f64),
}
