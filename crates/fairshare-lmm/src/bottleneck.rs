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

//! # Fair Bottleneck Solver
//!
//! A simpler fairness model than max-min: in every round, each constraint
//! still in play divides its remaining capacity evenly among its
//! unsaturated variables, and every variable grows by the smallest share
//! it is offered. Weights only decide whether a variable participates.
//! Constraints that run out of capacity retire together with their
//! variables; variables that reach their bound retire on their own.
//!
//! The solver always covers the full active set.

use crate::config::Algorithm;
use crate::constraint::SharingPolicy;
use crate::index::{ConstraintIndex, VariableIndex};
use crate::report::{SolveReport, Termination};
use crate::stats::SolveStatistics;
use crate::system::System;
use fairshare_core::num::precision::double_update;
use fixedbitset::FixedBitSet;
use tracing::{debug, trace};

impl System {
    /// Solves the system for bottleneck fairness.
    pub fn bottleneck_solve(&mut self) -> SolveReport {
        if !self.modified {
            return SolveReport::skipped(Algorithm::FairBottleneck);
        }
        let start = std::time::Instant::now();
        let precision = self.config.precision();
        let mut stats = SolveStatistics::default();

        let mut var_list: Vec<VariableIndex> = Vec::new();
        let mut unsaturated = FixedBitSet::with_capacity(self.variables.slot_count());
        for (index, var) in self.variables.iter_mut() {
            var.value = 0.0;
            var.mu = 0.0;
            if var.weight <= 0.0 || var.bound.is_some_and(|bound| !precision.is_positive(bound)) {
                continue;
            }
            let loaded = var
                .elements
                .iter()
                .any(|&e| self.elements[e].consumption_weight != 0.0);
            if loaded {
                var_list.push(index);
                unsaturated.insert(index.get());
            } else {
                var.value = var.unconstrained_value();
            }
        }

        let mut cnst_list: Vec<ConstraintIndex> = self.active_constraints.clone();
        for &constraint in &cnst_list {
            let cnst = &mut self.constraints[constraint];
            cnst.remaining = cnst.bound;
            cnst.usage = 0.0;
        }
        stats.set_scope(cnst_list.len(), var_list.len());
        debug!(
            constraints = cnst_list.len(),
            variables = var_list.len(),
            "bottleneck solve"
        );

        while !var_list.is_empty() {
            stats.on_iteration();

            // fair share offered by each constraint
            cnst_list.retain(|&constraint| {
                let cnst = &mut self.constraints[constraint];
                let mut nb = cnst
                    .enabled
                    .iter()
                    .map(|&e| &self.elements[e])
                    .filter(|e| {
                        e.consumption_weight > 0.0 && unsaturated.contains(e.variable().get())
                    })
                    .count();
                if nb > 0 && cnst.policy == SharingPolicy::Fatpipe {
                    nb = 1;
                }
                if nb == 0 {
                    cnst.remaining = 0.0;
                    cnst.usage = 0.0;
                    return false;
                }
                cnst.usage = cnst.remaining / nb as f64;
                trace!(%constraint, remaining = cnst.remaining, usage = cnst.usage, "fair share");
                true
            });

            // grow every unsaturated variable by its smallest offer
            let growing = unsaturated.clone();
            var_list.retain(|&variable| {
                let var = &mut self.variables[variable];
                let mut increment = f64::MAX;
                for &element in &var.elements {
                    let elem = &self.elements[element];
                    if elem.consumption_weight > 0.0 {
                        let offer =
                            self.constraints[elem.constraint()].usage / elem.consumption_weight;
                        increment = increment.min(offer);
                    }
                }
                if let Some(bound) = var.bound {
                    increment = increment.min(bound - var.value);
                }
                var.mu = increment;
                var.value += increment;
                match var.bound {
                    Some(bound) if !precision.is_positive(bound - var.value) => {
                        trace!(%variable, value = var.value, "variable reached its bound");
                        unsaturated.set(variable.get(), false);
                        false
                    }
                    _ => true,
                }
            });

            // charge the increments and retire exhausted constraints
            let mut exhausted: Vec<ConstraintIndex> = Vec::new();
            cnst_list.retain(|&constraint| {
                let cnst = &mut self.constraints[constraint];
                let increments = cnst
                    .enabled
                    .iter()
                    .map(|&e| &self.elements[e])
                    .filter(|e| growing.contains(e.variable().get()))
                    .map(|e| e.consumption_weight * self.variables[e.variable()].mu);
                match cnst.policy {
                    SharingPolicy::Shared => {
                        let charge: f64 = increments.sum();
                        double_update(&mut cnst.remaining, charge, precision.get());
                    }
                    SharingPolicy::Fatpipe => {
                        // the largest grant bounds every later one
                        let charge = increments.fold(0.0, f64::max);
                        double_update(&mut cnst.remaining, charge, precision.get());
                    }
                }
                if cnst.remaining <= 0.0 {
                    exhausted.push(constraint);
                    false
                } else {
                    true
                }
            });

            for constraint in exhausted {
                stats.on_constraint_saturated();
                trace!(%constraint, "constraint exhausted");
                for &element in &self.constraints[constraint].enabled {
                    let elem = &self.elements[element];
                    if elem.consumption_weight > 0.0 {
                        unsaturated.set(elem.variable().get(), false);
                    }
                }
            }
            var_list.retain(|&variable| unsaturated.contains(variable.get()));
        }

        self.finish_solve(true);
        stats.set_total_time(start.elapsed());
        debug!(iterations = stats.iterations, "bottleneck solve done");
        SolveReport::new(Algorithm::FairBottleneck, Termination::Converged, stats)
    }
}
