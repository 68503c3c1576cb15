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

/// How the variables of a constraint share its capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SharingPolicy {
    /// The load is the sum of `coefficient * value` over all variables.
    #[default]
    Shared,
    /// The load is the maximum of `coefficient * value`; every variable may
    /// use the full bound on its own.
    Fatpipe,
}

impl std::fmt::Display for SharingPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SharingPolicy::Shared => write!(f, "Shared"),
            SharingPolicy::Fatpipe => write!(f, "Fatpipe"),
        }
    }
}

/// A capacity-limited resource.
///
/// Besides its bound, a constraint owns the lists of elements of the
/// variables that use it and the scratch state the solvers work on.
#[derive(Debug, Clone)]
pub struct Constraint {
    pub(crate) bound: f64,
    pub(crate) policy: SharingPolicy,
    pub(crate) enabled: Vec<ElementIndex>,
    pub(crate) disabled: Vec<ElementIndex>,

    pub(crate) concurrency_limit: Option<usize>,
    pub(crate) concurrency_current: usize,
    pub(crate) concurrency_maximum: usize,

    // solver scratch
    pub(crate) remaining: f64,
    pub(crate) usage: f64,
    pub(crate) lambda: f64,
    pub(crate) new_lambda: f64,

    // set membership
    pub(crate) in_active_set: bool,
    pub(crate) dirty: bool,
    pub(crate) light: Option<usize>,
}

impl Constraint {
    pub(crate) fn new(bound: f64, concurrency_limit: Option<usize>) -> Self {
        Self {
            bound,
            policy: SharingPolicy::Shared,
            enabled: Vec::new(),
            disabled: Vec::new(),
            concurrency_limit,
            concurrency_current: 0,
            concurrency_maximum: 0,
            remaining: 0.0,
            usage: 0.0,
            lambda: 0.0,
            new_lambda: 0.0,
            in_active_set: false,
            dirty: false,
            light: None,
        }
    }

    /// Returns the capacity of the constraint.
    #[inline]
    pub fn bound(&self) -> f64 {
        self.bound
    }

    #[inline]
    pub fn sharing_policy(&self) -> SharingPolicy {
        self.policy
    }

    /// Returns the elements of variables with a positive weight.
    #[inline]
    pub fn enabled_elements(&self) -> &[ElementIndex] {
        &self.enabled
    }

    /// Returns the elements of variables with a zero weight.
    #[inline]
    pub fn disabled_elements(&self) -> &[ElementIndex] {
        &self.disabled
    }

    /// Returns `true` if no element references this constraint.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.enabled.is_empty() && self.disabled.is_empty()
    }

    /// Returns the limit on concurrently enabled variables, if any.
    #[inline]
    pub fn concurrency_limit(&self) -> Option<usize> {
        self.concurrency_limit
    }

    /// Returns the concurrency currently accounted to enabled elements.
    #[inline]
    pub fn concurrency_current(&self) -> usize {
        self.concurrency_current
    }

    /// Returns the highest concurrency observed since the last reset.
    #[inline]
    pub fn concurrency_maximum(&self) -> usize {
        self.concurrency_maximum
    }

    /// Returns how many more concurrency slots may be taken.
    ///
    /// Unlimited constraints report `usize::MAX`.
    #[inline]
    pub fn concurrency_slack(&self) -> usize {
        match self.concurrency_limit {
            Some(limit) => limit.saturating_sub(self.concurrency_current),
            None => usize::MAX,
        }
    }

    /// Returns the capacity left over by the last solve.
    ///
    /// Only meaningful for the solver that ran last.
    #[inline]
    pub fn remaining(&self) -> f64 {
        self.remaining
    }

    /// Returns the Lagrange multiplier of the last Lagrangian solve.
    #[inline]
    pub fn lambda(&self) -> f64 {
        self.lambda
    }

    /// Returns `true` if the constraint is in the active set.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.in_active_set
    }

    /// Returns `true` if the constraint is scheduled for the next selective solve.
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}
