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

//! # Max-Min Solver
//!
//! Weighted max-min fairness by progressive saturation. Each constraint
//! with capacity left is kept in a light table together with the ratio
//! `remaining / usage`, where `usage` sums `coefficient / weight` over the
//! variables not fixed yet. Every round fixes the variables of the
//! constraints with the smallest ratio (or their bound, if that is lower)
//! and charges their consumption to all constraints they cross.
//!
//! Under selective update, only the dirty constraints are revisited; the
//! dirty set is closed under connectivity, so the variables of the pass
//! never reach outside of it.

use crate::config::Algorithm;
use crate::constraint::SharingPolicy;
use crate::index::{ConstraintIndex, ConstraintIndexTag, VariableIndex};
use crate::report::{SolveReport, Termination};
use crate::stats::SolveStatistics;
use crate::system::System;
use fairshare_core::num::precision::double_update;
use fairshare_core::utils::arena::Arena;
use fixedbitset::FixedBitSet;
use tracing::{debug, trace, warn};

/// An entry of the light table.
#[derive(Debug, Clone, Copy)]
struct ConstraintLight {
    remaining_over_usage: f64,
    constraint: ConstraintIndex,
}

/// The constraints with the smallest `remaining / usage` ratio.
#[derive(Debug, Default)]
struct Saturation {
    min_usage: f64,
    positions: Vec<usize>,
}

impl Saturation {
    fn reset(&mut self) {
        self.min_usage = -1.0;
        self.positions.clear();
    }

    /// Records light table entry `position`, keeping only the minimal ratios.
    fn update(&mut self, ratio: f64, position: usize) {
        debug_assert!(ratio > 0.0, "saturation ratio must be positive");
        if self.min_usage < 0.0 || self.min_usage > ratio {
            self.min_usage = ratio;
            self.positions.clear();
            self.positions.push(position);
        } else if self.min_usage == ratio {
            self.positions.push(position);
        }
    }
}

/// Removes a constraint from the light table, patching the moved entry.
fn remove_light(
    light: &mut Vec<ConstraintLight>,
    constraints: &mut Arena<ConstraintIndexTag, crate::constraint::Constraint>,
    constraint: ConstraintIndex,
) {
    if let Some(position) = constraints[constraint].light.take() {
        light.swap_remove(position);
        if let Some(moved) = light.get(position) {
            constraints[moved.constraint].light = Some(position);
        }
    }
}

impl System {
    /// Solves the system for weighted max-min fairness.
    pub fn maxmin_solve(&mut self) -> SolveReport {
        if !self.modified {
            return SolveReport::skipped(Algorithm::MaxMin);
        }
        let start = std::time::Instant::now();
        let precision = self.config.precision();
        let mut stats = SolveStatistics::default();

        let scope = self.solve_scope();
        debug!(constraints = scope.len(), "max-min solve");

        // Reset the variables in play. Variables bounded at zero or sitting
        // on a constraint without capacity are pinned to zero and kept out
        // of the usage sums.
        let mut pinned = FixedBitSet::with_capacity(self.variables.slot_count());
        let mut touched = FixedBitSet::with_capacity(self.variables.slot_count());
        for &constraint in &scope {
            let cnst = &self.constraints[constraint];
            let exhausted = !precision.is_positive_relative(cnst.bound, cnst.bound);
            for &element in &cnst.enabled {
                let elem = &mut self.elements[element];
                elem.active = false;
                touched.insert(elem.variable().get());
                let var = &mut self.variables[elem.variable()];
                var.value = 0.0;
                var.saturated = false;
                let closed = var.bound.is_some_and(|bound| !precision.is_positive(bound));
                if closed || (exhausted && elem.consumption_weight > 0.0) {
                    pinned.insert(elem.variable().get());
                }
            }
        }
        for &constraint in &scope {
            for &element in &self.constraints[constraint].enabled {
                let variable = self.elements[element].variable();
                let var = &mut self.variables[variable];
                let loaded = var
                    .elements
                    .iter()
                    .any(|&e| self.elements[e].consumption_weight > 0.0);
                if !loaded {
                    var.value = var.unconstrained_value();
                }
            }
        }

        let mut light: Vec<ConstraintLight> = Vec::with_capacity(scope.len());
        let mut saturation = Saturation::default();
        saturation.reset();
        for &constraint in &scope {
            let cnst = &mut self.constraints[constraint];
            cnst.light = None;
            cnst.remaining = cnst.bound;
            cnst.usage = 0.0;
            if !precision.is_positive_relative(cnst.remaining, cnst.bound) {
                continue;
            }
            for &element in &cnst.enabled {
                let elem = &mut self.elements[element];
                if elem.consumption_weight <= 0.0 || pinned.contains(elem.variable().get()) {
                    continue;
                }
                let var = &self.variables[elem.variable()];
                debug_assert!(var.weight > 0.0);
                let share = elem.consumption_weight / var.weight;
                match cnst.policy {
                    SharingPolicy::Shared => cnst.usage += share,
                    SharingPolicy::Fatpipe => cnst.usage = cnst.usage.max(share),
                }
                elem.active = true;
            }
            if cnst.usage > 0.0 {
                let ratio = cnst.remaining / cnst.usage;
                cnst.light = Some(light.len());
                saturation.update(ratio, light.len());
                light.push(ConstraintLight {
                    remaining_over_usage: ratio,
                    constraint,
                });
            }
        }
        stats.set_scope(scope.len(), touched.count_ones(..));

        let mut saturated_variables: Vec<VariableIndex> = Vec::new();
        self.collect_saturated_variables(
            &mut light,
            &saturation,
            &mut saturated_variables,
            &mut stats,
        );

        while !light.is_empty() {
            stats.on_iteration();
            let min_usage = saturation.min_usage;

            // a bound below the fair share caps the round
            let mut min_bound = -1.0;
            for &variable in &saturated_variables {
                let var = &self.variables[variable];
                if let Some(bound) = var.bound {
                    let capped = bound * var.weight;
                    if bound > 0.0 && capped < min_usage {
                        min_bound = if min_bound < 0.0 {
                            capped
                        } else {
                            f64::min(min_bound, capped)
                        };
                    }
                }
            }
            trace!(min_usage, min_bound, "saturation round");

            for variable in std::mem::take(&mut saturated_variables) {
                let var = &mut self.variables[variable];
                var.saturated = false;
                let value = if min_bound < 0.0 {
                    Some(min_usage / var.weight)
                } else {
                    var.bound
                        .filter(|&bound| precision.equals(min_bound, bound * var.weight))
                };
                let Some(value) = value else {
                    // fixed in a later round
                    continue;
                };
                var.value = value;
                trace!(%variable, value = var.value, "variable fixed");
                self.charge_fixed_variable(variable, &mut light, &mut stats);
            }

            saturation.reset();
            for (position, entry) in light.iter().enumerate() {
                saturation.update(entry.remaining_over_usage, position);
            }
            self.collect_saturated_variables(
                &mut light,
                &saturation,
                &mut saturated_variables,
                &mut stats,
            );
        }

        for &constraint in &scope {
            for &element in &self.constraints[constraint].enabled {
                self.elements[element].active = false;
            }
        }

        self.finish_solve(true);
        stats.set_total_time(start.elapsed());
        debug!(
            iterations = stats.iterations,
            saturated = stats.saturated_constraints,
            "max-min solve done"
        );
        SolveReport::new(Algorithm::MaxMin, Termination::Converged, stats)
    }

    /// Charges the consumption of a freshly fixed variable to its constraints.
    fn charge_fixed_variable(
        &mut self,
        variable: VariableIndex,
        light: &mut Vec<ConstraintLight>,
        stats: &mut SolveStatistics,
    ) {
        let precision = self.config.precision();
        let var = &self.variables[variable];
        let (value, weight) = (var.value, var.weight);
        let elements = var.elements.clone();

        for element in elements {
            let elem = &mut self.elements[element];
            if !elem.active {
                continue;
            }
            elem.active = false;
            let (constraint, consumption_weight) = (elem.constraint(), elem.consumption_weight);
            let cnst = &mut self.constraints[constraint];

            match cnst.policy {
                SharingPolicy::Shared => {
                    precision.update_relative(
                        &mut cnst.remaining,
                        consumption_weight * value,
                        cnst.bound,
                    );
                    double_update(
                        &mut cnst.usage,
                        consumption_weight / weight,
                        precision.get(),
                    );
                }
                SharingPolicy::Fatpipe => {
                    cnst.usage = 0.0;
                    for &other in &cnst.enabled {
                        let elem = &self.elements[other];
                        if elem.active {
                            let share =
                                elem.consumption_weight / self.variables[elem.variable()].weight;
                            cnst.usage = cnst.usage.max(share);
                        }
                    }
                }
            }

            if !precision.is_positive(cnst.usage)
                || !precision.is_positive_relative(cnst.remaining, cnst.bound)
            {
                if cnst.light.is_some() {
                    stats.on_constraint_saturated();
                }
                remove_light(light, &mut self.constraints, constraint);
            } else if let Some(position) = cnst.light {
                light[position].remaining_over_usage = cnst.remaining / cnst.usage;
            }
        }
    }

    /// Gathers the unfixed variables of the minimal-ratio constraints.
    ///
    /// A saturated constraint that has no unfixed variable left only carries
    /// rounding residue; it is dropped from the light table.
    fn collect_saturated_variables(
        &mut self,
        light: &mut Vec<ConstraintLight>,
        saturation: &Saturation,
        saturated_variables: &mut Vec<VariableIndex>,
        stats: &mut SolveStatistics,
    ) {
        let mut stale = Vec::new();
        for &position in &saturation.positions {
            let constraint = light[position].constraint;
            let mut found = false;
            for &element in &self.constraints[constraint].enabled {
                let elem = &self.elements[element];
                if !elem.active || elem.consumption_weight <= 0.0 {
                    continue;
                }
                found = true;
                let var = &mut self.variables[elem.variable()];
                if !var.saturated {
                    var.saturated = true;
                    saturated_variables.push(elem.variable());
                }
            }
            if !found {
                stale.push(constraint);
            }
        }
        for constraint in stale {
            warn!(
                %constraint,
                usage = self.constraints[constraint].usage,
                "saturated constraint has no active element left, dropping it"
            );
            stats.on_constraint_saturated();
            remove_light(light, &mut self.constraints, constraint);
        }
    }
}
