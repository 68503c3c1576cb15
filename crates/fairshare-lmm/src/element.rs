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

use crate::index::{ConstraintIndex, VariableIndex};

/// The incidence of a variable on a constraint.
///
/// `consumption_weight` is the coefficient with which the variable's value
/// loads the constraint. An element lives in its constraint's enabled list
/// while the variable has a positive weight and in the disabled list
/// otherwise.
#[derive(Debug, Clone)]
pub struct Element {
    constraint: ConstraintIndex,
    variable: VariableIndex,
    pub(crate) consumption_weight: f64,
    pub(crate) max_consumption_weight: f64,
    /// Still contributes to its constraint's usage in the current max-min pass.
    pub(crate) active: bool,
}

impl Element {
    #[inline]
    pub(crate) fn new(
        constraint: ConstraintIndex,
        variable: VariableIndex,
        consumption_weight: f64,
    ) -> Self {
        Self {
            constraint,
            variable,
            consumption_weight,
            max_consumption_weight: consumption_weight,
            active: false,
        }
    }

    /// Returns the constraint this element loads.
    #[inline]
    pub fn constraint(&self) -> ConstraintIndex {
        self.constraint
    }

    /// Returns the variable this element belongs to.
    #[inline]
    pub fn variable(&self) -> VariableIndex {
        self.variable
    }

    /// Returns the coefficient of the variable in the constraint.
    #[inline]
    pub fn consumption_weight(&self) -> f64 {
        self.consumption_weight
    }

    /// Returns the largest coefficient this element ever carried.
    #[inline]
    pub fn max_consumption_weight(&self) -> f64 {
        self.max_consumption_weight
    }

    /// Returns how many concurrency slots the element occupies.
    ///
    /// Only elements with a coefficient of at least one count; lighter
    /// elements ride along for free.
    #[inline]
    pub fn concurrency(&self) -> usize {
        Self::concurrency_of(self.consumption_weight)
    }

    #[inline]
    pub(crate) fn concurrency_of(consumption_weight: f64) -> usize {
        usize::from(consumption_weight >= 1.0)
    }
}
