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

//! # Lagrangian Solver
//!
//! Maximizes `sum_i f(w_i, x_i)` for a concave utility `f` subject to the
//! capacity of every constraint and the bound of every variable, by
//! coordinate descent on the dual problem.
//!
//! Each constraint `j` carries a multiplier `lambda_j >= 0` and each
//! bounded variable a multiplier `mu_i >= 0`. For fixed multipliers the
//! optimal value of a variable is `fpi(w_i, sigma_i)` with
//! `sigma_i = sum_j a_ij * lambda_j + mu_i`. One iteration minimizes the
//! dual along every `mu_i` (in closed form) and every `lambda_j` (by a
//! dichotomy on the partial derivative), then recomputes all values. The
//! loop stops once no value moves by more than `EPSILON_MIN_ERROR` and the
//! values are feasible, or after `MAX_ITERATIONS`.
//!
//! ## Usage
//!
//! ```rust
//! use fairshare_lmm::lagrange::utility::Vegas;
//! use fairshare_lmm::system::System;
//!
//! let mut system = System::new(false);
//! let link = system.create_constraint(10.0);
//! let a = system.create_variable(1.0, None);
//! let b = system.create_variable(1.0, None);
//! system.attach(link, a, 1.0);
//! system.attach(link, b, 1.0);
//! let report = system.lagrange_solve(&Vegas);
//! assert!(report.is_converged());
//! assert!((system.variable_value(a) - 5.0).abs() < 1e-6);
//! # system.free_all_variables();
//! ```

mod dichotomy;
pub mod utility;

use self::dichotomy::dichotomy;
use self::utility::Utility;
use crate::index::{ConstraintIndex, VariableIndex};
use crate::report::{SolveReport, Termination};
use crate::stats::SolveStatistics;
use crate::system::System;
use fixedbitset::FixedBitSet;
use tracing::{debug, error, trace, warn};

/// The iteration cap of one Lagrangian solve.
pub const MAX_ITERATIONS: u64 = 100;

/// Convergence threshold on the largest value change of an iteration, also
/// the tolerance of the dual descent check.
pub const EPSILON_MIN_ERROR: f64 = 1e-5;

/// Convergence threshold of the multiplier dichotomy.
pub const DICHOTOMY_MIN_ERROR: f64 = 1e-14;

/// The constraints and variables one solve works on.
struct DualScope {
    constraints: Vec<ConstraintIndex>,
    variables: Vec<VariableIndex>,
    participating: FixedBitSet,
}

impl System {
    /// Solves the system by Lagrangian relaxation with the given utility.
    pub fn lagrange_solve(&mut self, utility: &dyn Utility) -> SolveReport {
        let solver = format!("lagrange-{}", utility.name().to_ascii_lowercase());
        if !self.modified {
            return SolveReport::skipped(solver);
        }
        let start = std::time::Instant::now();
        let mut stats = SolveStatistics::default();

        debug!(
            utility = utility.name(),
            max_iterations = MAX_ITERATIONS,
            epsilon = EPSILON_MIN_ERROR,
            dichotomy_epsilon = DICHOTOMY_MIN_ERROR,
            "lagrange solve"
        );

        let scope = self.init_dual_scope(utility);
        stats.set_scope(scope.constraints.len(), scope.variables.len());

        let mut obj = self.dual_objective(utility, &scope);
        let mut overall_modification = 1.0;
        let mut iteration = 0;
        while overall_modification > EPSILON_MIN_ERROR && iteration < MAX_ITERATIONS {
            iteration += 1;
            stats.on_iteration();

            for &variable in &scope.variables {
                let Some(bound) = self.variables[variable].bound else {
                    continue;
                };
                let new_mu = (utility.fp(self.variables[variable].weight, bound)
                    - self.sigma(variable, None))
                .max(0.0);
                let var = &mut self.variables[variable];
                var.new_mu = new_mu;
                var.mu = new_mu;
                obj = self.check_descent(obj, utility, &scope);
            }

            for &constraint in &scope.constraints {
                let init = self.constraints[constraint].lambda;
                let new_lambda = dichotomy(
                    init,
                    |lambda| self.partial_diff_lambda(lambda, constraint, utility, &scope),
                    DICHOTOMY_MIN_ERROR,
                );
                trace!(%constraint, old = init, new = new_lambda, "lambda updated");
                let cnst = &mut self.constraints[constraint];
                cnst.new_lambda = new_lambda;
                cnst.lambda = new_lambda;
                obj = self.check_descent(obj, utility, &scope);
            }

            overall_modification = 0.0;
            for &variable in &scope.variables {
                let value = self.optimal_value(variable, utility);
                let var = &mut self.variables[variable];
                overall_modification = f64::max(overall_modification, (var.value - value).abs());
                var.value = value;
            }
            if !self.is_feasible() {
                overall_modification = 1.0;
            }
            debug!(iteration, overall_modification, "lagrange iteration");
        }

        let termination = if overall_modification <= EPSILON_MIN_ERROR {
            debug!(iterations = iteration, "lagrange solve converged");
            Termination::Converged
        } else {
            warn!(
                iterations = iteration,
                overall_modification,
                "lagrange solve reached the iteration limit"
            );
            Termination::IterationLimit
        };

        self.finish_solve(true);
        stats.set_total_time(start.elapsed());
        SolveReport::new(solver, termination, stats)
    }

    /// Resets multipliers and values and picks the variables to optimize.
    ///
    /// Disabled variables and variables bounded at zero get zero; enabled
    /// variables that load no constraint get their unconstrained value.
    fn init_dual_scope(&mut self, utility: &dyn Utility) -> DualScope {
        let constraints = self.active_constraints.clone();
        for &constraint in &constraints {
            let cnst = &mut self.constraints[constraint];
            cnst.lambda = 1.0;
            cnst.new_lambda = 2.0;
        }

        let mut variables = Vec::new();
        let mut participating = FixedBitSet::with_capacity(self.variables.slot_count());
        for (index, var) in self.variables.iter_mut() {
            var.value = 0.0;
            if var.weight <= 0.0 || var.bound == Some(0.0) {
                continue;
            }
            let loaded = var
                .elements
                .iter()
                .any(|&e| self.elements[e].consumption_weight != 0.0);
            if !loaded {
                var.value = var.unconstrained_value();
                continue;
            }
            if var.bound.is_some() {
                var.mu = 1.0;
                var.new_mu = 2.0;
            } else {
                var.mu = -1.0;
            }
            variables.push(index);
            participating.insert(index.get());
        }

        for &variable in &variables {
            let value = self.optimal_value(variable, utility);
            self.variables[variable].value = value;
        }

        DualScope {
            constraints,
            variables,
            participating,
        }
    }

    /// Returns `sum_j a_ij * lambda_j`, optionally with one constraint's
    /// multiplier replaced.
    fn sigma(&self, variable: VariableIndex, replaced: Option<(ConstraintIndex, f64)>) -> f64 {
        self.variables[variable]
            .elements
            .iter()
            .map(|&e| {
                let elem = &self.elements[e];
                let lambda = match replaced {
                    Some((constraint, lambda)) if constraint == elem.constraint() => lambda,
                    _ => self.constraints[elem.constraint()].lambda,
                };
                elem.consumption_weight * lambda
            })
            .sum()
    }

    /// Adds the bound multiplier of a bounded variable to its sigma.
    #[inline]
    fn with_mu(&self, variable: VariableIndex, sigma: f64) -> f64 {
        let var = &self.variables[variable];
        match var.bound {
            Some(bound) if bound > 0.0 => sigma + var.mu,
            _ => sigma,
        }
    }

    #[inline]
    fn optimal_value(&self, variable: VariableIndex, utility: &dyn Utility) -> f64 {
        let sigma = self.with_mu(variable, self.sigma(variable, None));
        utility.fpi(self.variables[variable].weight, sigma)
    }

    fn dual_objective(&self, utility: &dyn Utility, scope: &DualScope) -> f64 {
        let mut obj = 0.0;
        for &variable in &scope.variables {
            let var = &self.variables[variable];
            let sigma = self.with_mu(variable, self.sigma(variable, None));
            let x = utility.fpi(var.weight, sigma);
            obj += utility.f(var.weight, x) - sigma * x;
            if let Some(bound) = var.bound {
                if bound > 0.0 {
                    obj += var.mu * bound;
                }
            }
        }
        for &constraint in &scope.constraints {
            let cnst = &self.constraints[constraint];
            obj += cnst.lambda * cnst.bound;
        }
        obj
    }

    /// The derivative of the dual along `lambda` of one constraint.
    fn partial_diff_lambda(
        &self,
        lambda: f64,
        constraint: ConstraintIndex,
        utility: &dyn Utility,
        scope: &DualScope,
    ) -> f64 {
        let cnst = &self.constraints[constraint];
        let mut diff = 0.0;
        for &element in &cnst.enabled {
            let elem = &self.elements[element];
            let variable = elem.variable();
            if elem.consumption_weight <= 0.0 || !scope.participating.contains(variable.get()) {
                continue;
            }
            let sigma = self.with_mu(variable, self.sigma(variable, Some((constraint, lambda))));
            diff -= elem.consumption_weight * utility.fpi(self.variables[variable].weight, sigma);
        }
        diff + cnst.bound
    }

    /// Recomputes the dual objective and aborts if it went up.
    fn check_descent(&self, obj: f64, utility: &dyn Utility, scope: &DualScope) -> f64 {
        let new_obj = self.dual_objective(utility, scope);
        trace!(obj, new_obj, improvement = obj - new_obj, "dual objective");
        if obj - new_obj < -EPSILON_MIN_ERROR {
            error!(obj, new_obj, "dual objective increased");
            panic!(
                "called `System::lagrange_solve` with a utility whose dual objective increased: {} -> {}",
                obj, new_obj
            );
        }
        new_obj
    }
}
