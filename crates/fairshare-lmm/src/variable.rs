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

use crate::index::ElementIndex;
use smallvec::SmallVec;

/// Most variables touch a handful of constraints (a route of a few links,
/// a host and its disk).
pub(crate) type ElementList = SmallVec<[ElementIndex; 4]>;

/// A quantity to be allocated, typically the rate of one activity.
///
/// A variable with a zero weight is disabled: it takes no capacity and its
/// value is zero. A variable whose weight is parked in `staged_weight`
/// waits for concurrency slack on its constraints before it is enabled.
#[derive(Debug, Clone)]
pub struct Variable {
    pub(crate) weight: f64,
    pub(crate) staged_weight: f64,
    pub(crate) bound: Option<f64>,
    pub(crate) value: f64,
    pub(crate) concurrency_share: usize,
    pub(crate) elements: ElementList,

    pub(crate) visited: u32,
    pub(crate) mu: f64,
    pub(crate) new_mu: f64,
    pub(crate) saturated: bool,
    pub(crate) in_modified_set: bool,
}

impl Variable {
    pub(crate) fn new(weight: f64, bound: Option<f64>, capacity: usize, visited: u32) -> Self {
        Self {
            weight,
            staged_weight: 0.0,
            bound,
            value: 0.0,
            concurrency_share: 1,
            elements: ElementList::with_capacity(capacity),
            visited,
            mu: 0.0,
            new_mu: 0.0,
            saturated: false,
            in_modified_set: false,
        }
    }

    /// Returns the allocation computed by the last solve.
    #[inline]
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Returns the sharing weight; larger weights receive smaller shares.
    #[inline]
    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Returns the weight waiting for concurrency slack, or zero.
    #[inline]
    pub fn staged_weight(&self) -> f64 {
        self.staged_weight
    }

    /// Returns the upper bound of the value, `None` when unbounded.
    #[inline]
    pub fn bound(&self) -> Option<f64> {
        self.bound
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.weight > 0.0
    }

    /// Returns `true` if the variable waits for concurrency slack.
    #[inline]
    pub fn is_staged(&self) -> bool {
        self.staged_weight > 0.0
    }

    /// Returns how many concurrency slots the variable needs on each constraint.
    #[inline]
    pub fn concurrency_share(&self) -> usize {
        self.concurrency_share
    }

    /// Returns the elements of this variable, in attach order.
    #[inline]
    pub fn elements(&self) -> &[ElementIndex] {
        &self.elements
    }

    /// The value of an enabled variable that loads none of its constraints.
    #[inline]
    pub(crate) fn unconstrained_value(&self) -> f64 {
        self.bound.map_or(1.0, |bound| bound.min(1.0))
    }

    /// Returns the bound multiplier of the last Lagrangian solve.
    #[inline]
    pub fn mu(&self) -> f64 {
        self.mu
    }
}
