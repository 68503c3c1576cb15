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
use crate::system::System;
use tracing::warn;

/// A capacity or bound exceeded by the current values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Violation {
    /// The load of a constraint is above its bound.
    ConstraintOverused {
        constraint: ConstraintIndex,
        usage: f64,
        bound: f64,
    },
    /// The value of a variable is above its bound.
    VariableAboveBound {
        variable: VariableIndex,
        value: f64,
        bound: f64,
    },
}

impl Violation {
    /// Returns by how much the bound is exceeded.
    #[inline]
    pub fn overshoot(&self) -> f64 {
        match *self {
            Violation::ConstraintOverused { usage, bound, .. } => usage - bound,
            Violation::VariableAboveBound { value, bound, .. } => value - bound,
        }
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Violation::ConstraintOverused {
                constraint,
                usage,
                bound,
            } => write!(
                f,
                "{} uses {} of {} (overshoot {})",
                constraint,
                usage,
                bound,
                self.overshoot()
            ),
            Violation::VariableAboveBound {
                variable,
                value,
                bound,
            } => write!(
                f,
                "{} has value {} above its bound {} (overshoot {})",
                variable,
                value,
                bound,
                self.overshoot()
            ),
        }
    }
}

impl System {
    /// Lists the constraints and variables whose bounds the current values
    /// exceed.
    ///
    /// A bound `b` counts as exceeded once the overshoot passes
    /// `precision * max(b, 1)`.
    pub fn violations(&self) -> Vec<Violation> {
        let precision = self.config.precision();
        let mut violations = Vec::new();
        for &constraint in &self.active_constraints {
            let bound = self.constraints[constraint].bound;
            let usage = self.constraint_usage(constraint);
            if precision.is_positive_relative(usage - bound, bound.max(1.0)) {
                violations.push(Violation::ConstraintOverused {
                    constraint,
                    usage,
                    bound,
                });
            }
        }
        for (variable, var) in self.variables.iter() {
            if var.weight <= 0.0 {
                continue;
            }
            if let Some(bound) = var.bound {
                if precision.is_positive_relative(var.value - bound, bound.max(1.0)) {
                    violations.push(Violation::VariableAboveBound {
                        variable,
                        value: var.value,
                        bound,
                    });
                }
            }
        }
        violations
    }

    /// Returns `true` if no bound is exceeded.
    #[inline]
    pub fn is_feasible(&self) -> bool {
        self.violations().is_empty()
    }

    /// Logs every violation as a warning; returns `true` if there was none.
    pub(crate) fn report_violations(&self) -> bool {
        let violations = self.violations();
        for violation in &violations {
            match violation {
                Violation::ConstraintOverused { constraint, .. } => warn!(
                    %constraint,
                    overshoot = violation.overshoot(),
                    "infeasible allocation: {}",
                    violation
                ),
                Violation::VariableAboveBound { variable, .. } => warn!(
                    %variable,
                    overshoot = violation.overshoot(),
                    "infeasible allocation: {}",
                    violation
                ),
            }
        }
        violations.is_empty()
    }
}
