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

//! # Resource-Sharing System
//!
//! A `System` holds a bipartite graph of constraints (resources with a
//! capacity) and variables (activities with a weight and an optional
//! bound), connected through elements that carry a consumption
//! coefficient. The solvers in this crate assign every variable a value so
//! that each constraint's load stays within its bound.
//!
//! ## Highlights
//!
//! - Entities live in slot arenas and are addressed by typed handles.
//! - Each constraint splits its elements into an enabled list (variables
//!   with a positive weight) and a disabled list.
//! - Constraints may cap how many variables use them at once. A variable
//!   that would exceed a cap is staged: its weight is parked until every
//!   constraint it touches has slack again.
//! - With selective update enabled, mutations mark the affected connected
//!   component dirty and max-min solves only revisit that part.
//!
//! ## Usage
//!
//! ```rust
//! use fairshare_lmm::system::System;
//!
//! let mut system = System::new(false);
//! let link = system.create_constraint(10.0);
//! let a = system.create_variable(1.0, None);
//! let b = system.create_variable(1.0, Some(3.0));
//! system.attach(link, a, 1.0);
//! system.attach(link, b, 1.0);
//! system.solve();
//! assert!((system.variable_value(a) - 7.0).abs() < 1e-9);
//! assert!((system.variable_value(b) - 3.0).abs() < 1e-9);
//! ```

use crate::config::SystemConfig;
use crate::constraint::{Constraint, SharingPolicy};
use crate::element::Element;
use crate::error::LmmError;
use crate::index::{
    ConstraintIndex, ConstraintIndexTag, ElementIndex, ElementIndexTag, VariableIndex,
    VariableIndexTag,
};
use crate::report::SolveReport;
use crate::selective::SelectiveUpdate;
use crate::variable::Variable;
use fairshare_core::utils::arena::Arena;
use tracing::{debug, error, trace, warn, Level};

/// A linear resource-sharing system.
#[derive(Debug)]
pub struct System {
    pub(crate) config: SystemConfig,
    pub(crate) constraints: Arena<ConstraintIndexTag, Constraint>,
    pub(crate) variables: Arena<VariableIndexTag, Variable>,
    pub(crate) elements: Arena<ElementIndexTag, Element>,
    pub(crate) active_constraints: Vec<ConstraintIndex>,
    pub(crate) selective: SelectiveUpdate,
    pub(crate) modified: bool,
    pub(crate) modified_variables: Vec<VariableIndex>,
}

impl Default for System {
    fn default() -> Self {
        Self::with_config(SystemConfig::default())
    }
}

#[inline]
fn remove_item<T: PartialEq>(items: &mut Vec<T>, item: &T) -> bool {
    match items.iter().position(|x| x == item) {
        Some(pos) => {
            items.remove(pos);
            true
        }
        None => false,
    }
}

impl System {
    /// Creates an empty system with the default configuration.
    pub fn new(selective_update: bool) -> Self {
        let mut config = SystemConfig::default();
        config.selective_update = selective_update;
        Self::with_config(config)
    }

    /// Creates an empty system with the given configuration.
    pub fn with_config(config: SystemConfig) -> Self {
        debug!(
            selective_update = config.selective_update(),
            algorithm = %config.algorithm(),
            "creating sharing system"
        );
        Self {
            config,
            constraints: Arena::new(),
            variables: Arena::new(),
            elements: Arena::new(),
            active_constraints: Vec::new(),
            selective: SelectiveUpdate::new(config.selective_update()),
            modified: false,
            modified_variables: Vec::new(),
        }
    }

    #[inline]
    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    /// Returns `true` if a mutation happened since the last solve.
    #[inline]
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    #[inline]
    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    #[inline]
    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    /// Returns the constraint behind `constraint`.
    ///
    /// # Panics
    ///
    /// Panics if the handle does not address a live constraint.
    #[inline]
    pub fn constraint(&self, constraint: ConstraintIndex) -> &Constraint {
        &self.constraints[constraint]
    }

    #[inline]
    pub fn get_constraint(&self, constraint: ConstraintIndex) -> Option<&Constraint> {
        self.constraints.get(constraint)
    }

    /// Returns the variable behind `variable`.
    ///
    /// # Panics
    ///
    /// Panics if the handle does not address a live variable.
    #[inline]
    pub fn variable(&self, variable: VariableIndex) -> &Variable {
        &self.variables[variable]
    }

    #[inline]
    pub fn get_variable(&self, variable: VariableIndex) -> Option<&Variable> {
        self.variables.get(variable)
    }

    #[inline]
    pub fn element(&self, element: ElementIndex) -> &Element {
        &self.elements[element]
    }

    /// Iterates over all live constraints in creation order.
    pub fn constraints(&self) -> impl Iterator<Item = (ConstraintIndex, &Constraint)> + '_ {
        self.constraints.iter()
    }

    /// Iterates over all live variables in creation order.
    pub fn variables(&self) -> impl Iterator<Item = (VariableIndex, &Variable)> + '_ {
        self.variables.iter()
    }

    /// Returns the constraints that currently have elements.
    #[inline]
    pub fn active_constraints(&self) -> &[ConstraintIndex] {
        &self.active_constraints
    }

    /// Creates a constraint with capacity `bound`.
    ///
    /// The constraint starts with the concurrency limit of the configuration.
    ///
    /// # Panics
    ///
    /// Panics if `bound` is negative or NaN.
    pub fn create_constraint(&mut self, bound: f64) -> ConstraintIndex {
        assert!(
            bound >= 0.0,
            "called `System::create_constraint` with invalid bound {}",
            bound
        );
        let index = self
            .constraints
            .insert(Constraint::new(bound, self.config.concurrency_limit()));
        trace!(constraint = %index, bound, "constraint created");
        index
    }

    /// Creates a variable with the given weight and optional upper bound.
    ///
    /// A negative bound is read as unbounded.
    ///
    /// # Panics
    ///
    /// Panics if `weight` is negative or NaN.
    pub fn create_variable(&mut self, weight: f64, bound: Option<f64>) -> VariableIndex {
        self.create_variable_with_capacity(weight, bound, 1)
    }

    /// Like `create_variable`, reserving room for `num_constraints` elements.
    pub fn create_variable_with_capacity(
        &mut self,
        weight: f64,
        bound: Option<f64>,
        num_constraints: usize,
    ) -> VariableIndex {
        assert!(
            weight >= 0.0,
            "called `System::create_variable` with invalid weight {}",
            weight
        );
        let bound = bound.filter(|b| *b >= 0.0);
        let visited = self.selective.unvisited_stamp();
        let index = self
            .variables
            .insert(Variable::new(weight, bound, num_constraints, visited));
        trace!(variable = %index, weight, ?bound, "variable created");
        index
    }

    /// Attaches `variable` to `constraint` with the given coefficient.
    ///
    /// Attaching a variable twice to the same constraint creates a second
    /// element; see `attach_add` for accumulating into the existing one. If
    /// the constraint lacks the concurrency slack for an enabled variable,
    /// the variable is staged.
    ///
    /// # Panics
    ///
    /// Panics if `consumption_weight` is negative or NaN.
    pub fn attach(
        &mut self,
        constraint: ConstraintIndex,
        variable: VariableIndex,
        consumption_weight: f64,
    ) -> ElementIndex {
        assert!(
            consumption_weight >= 0.0,
            "called `System::attach` with invalid consumption weight {}",
            consumption_weight
        );
        self.modified = true;

        let var = &self.variables[variable];
        let current_share: usize = if var.concurrency_share > 1 {
            var.elements
                .iter()
                .map(|&e| &self.elements[e])
                .filter(|e| e.constraint() == constraint && var.weight > 0.0)
                .map(Element::concurrency)
                .sum()
        } else {
            0
        };
        let required = var.concurrency_share.saturating_sub(current_share);
        if var.weight > 0.0 && required > self.constraints[constraint].concurrency_slack() {
            debug!(
                %variable,
                %constraint,
                "no concurrency slack, staging variable"
            );
            self.stage_variable(variable);
        }

        let element = self
            .elements
            .insert(Element::new(constraint, variable, consumption_weight));
        self.variables[variable].elements.push(element);
        if self.variables[variable].weight > 0.0 {
            self.constraints[constraint].enabled.push(element);
            self.increase_concurrency(element);
        } else {
            self.constraints[constraint].disabled.push(element);
        }

        self.make_constraint_active(constraint);
        if self.selective.is_enabled()
            && (consumption_weight > 0.0 || self.variables[variable].weight > 0.0)
        {
            self.mark_dirty(constraint);
            // the new element may join two components that were independent
            let var = &self.variables[variable];
            if var.elements.len() > 1 {
                let first = self.elements[var.elements[0]].constraint();
                self.mark_dirty(first);
            }
        }
        self.debug_check_consistency();
        element
    }

    /// Adds `value` to the coefficient of `variable` in `constraint`.
    ///
    /// On a fatpipe constraint the coefficient becomes the maximum of both
    /// values instead. The first element on the constraint is updated if
    /// there are several; without one, this behaves like `attach`.
    pub fn attach_add(
        &mut self,
        constraint: ConstraintIndex,
        variable: VariableIndex,
        value: f64,
    ) -> ElementIndex {
        let Some(element) = self.find_element(constraint, variable) else {
            return self.attach(constraint, variable, value);
        };
        self.modified = true;
        let current = self.elements[element].consumption_weight;
        let updated = match self.constraints[constraint].policy {
            SharingPolicy::Shared => current + value,
            SharingPolicy::Fatpipe => current.max(value),
        };
        self.reweight_element(element, updated);
        self.mark_dirty(constraint);
        self.debug_check_consistency();
        element
    }

    /// Sets the coefficient of `variable` in `constraint`.
    ///
    /// # Errors
    ///
    /// Returns `LmmError::ElementNotFound` if the variable is not attached
    /// to the constraint.
    pub fn set_element_value(
        &mut self,
        constraint: ConstraintIndex,
        variable: VariableIndex,
        value: f64,
    ) -> Result<ElementIndex, LmmError> {
        assert!(
            value >= 0.0,
            "called `System::set_element_value` with invalid value {}",
            value
        );
        let element = self
            .find_element(constraint, variable)
            .ok_or(LmmError::ElementNotFound {
                constraint,
                variable,
            })?;
        self.modified = true;
        self.reweight_element(element, value);
        self.mark_dirty(constraint);
        Ok(element)
    }

    /// Returns the first element of `variable` on `constraint`.
    pub fn find_element(
        &self,
        constraint: ConstraintIndex,
        variable: VariableIndex,
    ) -> Option<ElementIndex> {
        self.variables[variable]
            .elements
            .iter()
            .copied()
            .find(|&e| self.elements[e].constraint() == constraint)
    }

    /// Changes a coefficient, keeping the concurrency accounting balanced.
    fn reweight_element(&mut self, element: ElementIndex, consumption_weight: f64) {
        let (constraint, variable, old) = {
            let elem = &self.elements[element];
            (elem.constraint(), elem.variable(), elem.concurrency())
        };
        let new = Element::concurrency_of(consumption_weight);
        let enabled = self.variables[variable].weight > 0.0;

        if enabled && new > old && new - old > self.constraints[constraint].concurrency_slack() {
            debug!(
                %variable,
                %constraint,
                "coefficient exceeds concurrency slack, staging variable"
            );
            self.stage_variable(variable);
            self.set_consumption_weight(element, consumption_weight);
        } else if enabled {
            self.decrease_concurrency(element);
            self.set_consumption_weight(element, consumption_weight);
            self.increase_concurrency(element);
            if new < old {
                self.on_disabled_var(constraint);
            }
        } else {
            self.set_consumption_weight(element, consumption_weight);
        }
    }

    #[inline]
    fn set_consumption_weight(&mut self, element: ElementIndex, consumption_weight: f64) {
        let elem = &mut self.elements[element];
        elem.consumption_weight = consumption_weight;
        elem.max_consumption_weight = elem.max_consumption_weight.max(consumption_weight);
    }

    /// Parks the weight of an enabled variable and releases its slots.
    fn stage_variable(&mut self, variable: VariableIndex) {
        let weight = self.variables[variable].weight;
        self.disable_var(variable);
        let constraints: Vec<ConstraintIndex> = self.variables[variable]
            .elements
            .iter()
            .map(|&e| self.elements[e].constraint())
            .collect();
        for constraint in constraints {
            self.on_disabled_var(constraint);
        }
        self.variables[variable].staged_weight = weight;
    }

    /// Sets the sharing policy of a constraint.
    pub fn set_sharing_policy(&mut self, constraint: ConstraintIndex, policy: SharingPolicy) {
        self.constraints[constraint].policy = policy;
        self.modified = true;
        self.mark_dirty(constraint);
    }

    /// Sets the concurrency limit of a constraint; `None` lifts it.
    ///
    /// # Errors
    ///
    /// Returns `LmmError::ConcurrencyLimitBelowMaximum` if the constraint has
    /// already seen more concurrent variables than `limit`.
    pub fn set_concurrency_limit(
        &mut self,
        constraint: ConstraintIndex,
        limit: Option<usize>,
    ) -> Result<(), LmmError> {
        let cnst = &mut self.constraints[constraint];
        if let Some(limit) = limit {
            if cnst.concurrency_maximum > limit {
                return Err(LmmError::ConcurrencyLimitBelowMaximum {
                    limit,
                    maximum: cnst.concurrency_maximum,
                });
            }
        }
        cnst.concurrency_limit = limit;
        self.enable_staged(constraint);
        Ok(())
    }

    /// Forgets the maximum concurrency observed on a constraint.
    pub fn reset_concurrency_maximum(&mut self, constraint: ConstraintIndex) {
        let cnst = &mut self.constraints[constraint];
        cnst.concurrency_maximum = cnst.concurrency_current;
    }

    /// Sets how many concurrency slots the variable takes on each constraint.
    pub fn set_concurrency_share(&mut self, variable: VariableIndex, share: usize) {
        self.variables[variable].concurrency_share = share;
    }

    /// Sets the upper bound of a variable's value; `None` removes it.
    pub fn update_variable_bound(&mut self, variable: VariableIndex, bound: Option<f64>) {
        self.modified = true;
        self.variables[variable].bound = bound.filter(|b| *b >= 0.0);
        let constraints: Vec<ConstraintIndex> = self.variables[variable]
            .elements
            .iter()
            .map(|&e| self.elements[e].constraint())
            .collect();
        for constraint in constraints {
            self.mark_dirty(constraint);
        }
    }

    /// Changes the sharing weight of a variable.
    ///
    /// A zero weight disables the variable. Re-enabling a variable stages it
    /// if one of its constraints lacks concurrency slack.
    ///
    /// # Panics
    ///
    /// Panics if `weight` is negative or NaN.
    pub fn update_variable_weight(&mut self, variable: VariableIndex, weight: f64) {
        assert!(
            weight >= 0.0,
            "called `System::update_variable_weight` with invalid weight {}",
            weight
        );
        let var = &mut self.variables[variable];
        if weight == 0.0 && var.staged_weight > 0.0 {
            var.staged_weight = 0.0;
        }
        if weight == var.weight {
            return;
        }

        let enabling = weight > 0.0 && var.weight <= 0.0;
        let disabling = weight <= 0.0 && var.weight > 0.0;
        trace!(%variable, old = var.weight, new = weight, "updating variable weight");

        self.modified = true;
        if enabling {
            self.variables[variable].staged_weight = weight;
            let slack = self.min_concurrency_slack(variable);
            if slack < self.variables[variable].concurrency_share {
                debug!(%variable, slack, "not enough concurrency slack, staying staged");
                return;
            }
            self.enable_var(variable);
        } else if disabling {
            self.disable_var(variable);
            let constraints: Vec<ConstraintIndex> = self.variables[variable]
                .elements
                .iter()
                .map(|&e| self.elements[e].constraint())
                .collect();
            for constraint in constraints {
                self.on_disabled_var(constraint);
            }
        } else {
            self.variables[variable].weight = weight;
            self.mark_dirty_from_variable(variable);
        }
        self.debug_check_consistency();
    }

    /// Changes the capacity of a constraint.
    ///
    /// # Panics
    ///
    /// Panics if `bound` is negative or NaN.
    pub fn update_constraint_bound(&mut self, constraint: ConstraintIndex, bound: f64) {
        assert!(
            bound >= 0.0,
            "called `System::update_constraint_bound` with invalid bound {}",
            bound
        );
        self.modified = true;
        self.mark_dirty(constraint);
        self.constraints[constraint].bound = bound;
    }

    /// Detaches a variable from every constraint and disables it.
    ///
    /// Constraints left without elements leave the active set; the others
    /// may enable staged variables with the released slots. The variable
    /// itself stays allocated and can be attached again.
    pub fn disable_variable(&mut self, variable: VariableIndex) {
        self.modified = true;
        self.mark_dirty_from_variable(variable);

        let enabled = self.variables[variable].weight > 0.0;
        self.variables[variable].staged_weight = 0.0;
        let elements = std::mem::take(&mut self.variables[variable].elements);
        for element in elements {
            let constraint = self.elements[element].constraint();
            if enabled {
                self.decrease_concurrency(element);
            }
            let cnst = &mut self.constraints[constraint];
            if !remove_item(&mut cnst.enabled, &element) {
                remove_item(&mut cnst.disabled, &element);
            }
            self.elements.remove(element);
            if self.constraints[constraint].is_empty() {
                self.make_constraint_inactive(constraint);
            } else {
                self.on_disabled_var(constraint);
            }
        }

        let var = &mut self.variables[variable];
        var.weight = 0.0;
        var.staged_weight = 0.0;
        var.value = 0.0;
        self.debug_check_consistency();
    }

    /// Detaches and releases a variable. The handle becomes invalid.
    pub fn free_variable(&mut self, variable: VariableIndex) {
        self.disable_variable(variable);
        if self.variables[variable].in_modified_set {
            remove_item(&mut self.modified_variables, &variable);
        }
        self.variables.remove(variable);
        trace!(%variable, "variable freed");
    }

    /// Releases every variable of the system.
    pub fn free_all_variables(&mut self) {
        let variables: Vec<VariableIndex> = self.variables.indices().collect();
        for variable in variables {
            self.free_variable(variable);
        }
    }

    /// Releases a constraint, detaching the variables that still use it.
    pub fn free_constraint(&mut self, constraint: ConstraintIndex) {
        self.modified = true;
        self.mark_dirty(constraint);
        let cnst = &mut self.constraints[constraint];
        let elements: Vec<ElementIndex> = cnst
            .enabled
            .drain(..)
            .chain(cnst.disabled.drain(..))
            .collect();
        let mut detached = Vec::with_capacity(elements.len());
        for element in elements {
            let variable = self.elements[element].variable();
            self.variables[variable].elements.retain(|e| *e != element);
            self.elements.remove(element);
            detached.push(variable);
        }
        self.make_constraint_inactive(constraint);
        self.constraints.remove(constraint);
        // staged variables may have been waiting on this constraint only
        for variable in detached {
            if self.can_enable(variable) {
                self.enable_var(variable);
            }
        }
        self.debug_check_consistency();
        trace!(%constraint, "constraint freed");
    }

    /// Returns the value of a variable computed by the last solve.
    #[inline]
    pub fn variable_value(&self, variable: VariableIndex) -> f64 {
        self.variables[variable].value
    }

    /// Returns the current load of a constraint.
    ///
    /// The load is the sum (shared) or the maximum (fatpipe) of
    /// `coefficient * value` over the enabled elements.
    pub fn constraint_usage(&self, constraint: ConstraintIndex) -> f64 {
        let cnst = &self.constraints[constraint];
        let loads = cnst
            .enabled
            .iter()
            .map(|&e| &self.elements[e])
            .filter(|e| e.consumption_weight > 0.0)
            .map(|e| e.consumption_weight * self.variables[e.variable()].value);
        match cnst.policy {
            SharingPolicy::Shared => loads.sum(),
            SharingPolicy::Fatpipe => loads.fold(0.0, f64::max),
        }
    }

    /// Returns how many enabled variables load the constraint.
    pub fn constraint_variable_amount(&self, constraint: ConstraintIndex) -> usize {
        self.constraints[constraint]
            .enabled
            .iter()
            .filter(|&&e| self.elements[e].consumption_weight > 0.0)
            .count()
    }

    /// Returns `true` if any variable, enabled or not, uses the constraint.
    #[inline]
    pub fn is_constraint_used(&self, constraint: ConstraintIndex) -> bool {
        !self.constraints[constraint].is_empty()
    }

    /// Iterates over the variables attached to a constraint, enabled first.
    pub fn constraint_variables(
        &self,
        constraint: ConstraintIndex,
    ) -> impl Iterator<Item = VariableIndex> + '_ {
        let cnst = &self.constraints[constraint];
        cnst.enabled
            .iter()
            .chain(cnst.disabled.iter())
            .map(|&e| self.elements[e].variable())
    }

    /// Iterates over the constraints a variable uses with their coefficients.
    pub fn variable_constraints(
        &self,
        variable: VariableIndex,
    ) -> impl Iterator<Item = (ConstraintIndex, f64)> + '_ {
        self.variables[variable].elements.iter().map(|&e| {
            let elem = &self.elements[e];
            (elem.constraint(), elem.consumption_weight)
        })
    }

    /// Takes the variables whose value a selective solve recomputed.
    pub fn take_modified_variables(&mut self) -> Vec<VariableIndex> {
        let taken = std::mem::take(&mut self.modified_variables);
        for &variable in &taken {
            if let Some(var) = self.variables.get_mut(variable) {
                var.in_modified_set = false;
            }
        }
        taken
    }

    /// Solves the system with the configured algorithm.
    pub fn solve(&mut self) -> SolveReport {
        match self.config.algorithm() {
            crate::config::Algorithm::MaxMin => self.maxmin_solve(),
            crate::config::Algorithm::FairBottleneck => self.bottleneck_solve(),
            crate::config::Algorithm::Lagrange(kind) => self.lagrange_solve(&kind),
        }
    }

    pub(crate) fn make_constraint_active(&mut self, constraint: ConstraintIndex) {
        let cnst = &mut self.constraints[constraint];
        if !cnst.in_active_set {
            cnst.in_active_set = true;
            self.active_constraints.push(constraint);
        }
    }

    pub(crate) fn make_constraint_inactive(&mut self, constraint: ConstraintIndex) {
        let cnst = &mut self.constraints[constraint];
        if cnst.in_active_set {
            cnst.in_active_set = false;
            remove_item(&mut self.active_constraints, &constraint);
        }
        if self.constraints[constraint].dirty {
            self.constraints[constraint].dirty = false;
            self.selective.forget(constraint);
        }
    }

    fn increase_concurrency(&mut self, element: ElementIndex) {
        let elem = &self.elements[element];
        let constraint = elem.constraint();
        let cnst = &mut self.constraints[constraint];
        cnst.concurrency_current += elem.concurrency();
        cnst.concurrency_maximum = cnst.concurrency_maximum.max(cnst.concurrency_current);
        if let Some(limit) = cnst.concurrency_limit {
            if cnst.concurrency_current > limit {
                error!(
                    %constraint,
                    current = cnst.concurrency_current,
                    limit,
                    "concurrency limit overflow"
                );
                panic!(
                    "called `System::increase_concurrency` with {} over its concurrency limit: {} > {}",
                    constraint, cnst.concurrency_current, limit
                );
            }
        }
    }

    fn decrease_concurrency(&mut self, element: ElementIndex) {
        let elem = &self.elements[element];
        let cnst = &mut self.constraints[elem.constraint()];
        debug_assert!(
            cnst.concurrency_current >= elem.concurrency(),
            "concurrency underflow on {}",
            elem.constraint()
        );
        cnst.concurrency_current = cnst.concurrency_current.saturating_sub(elem.concurrency());
    }

    /// Returns the smallest concurrency slack over the variable's constraints.
    fn min_concurrency_slack(&self, variable: VariableIndex) -> usize {
        self.variables[variable]
            .elements
            .iter()
            .map(|&e| self.constraints[self.elements[e].constraint()].concurrency_slack())
            .min()
            .unwrap_or(usize::MAX)
    }

    #[inline]
    fn can_enable(&self, variable: VariableIndex) -> bool {
        let var = &self.variables[variable];
        var.staged_weight > 0.0 && self.min_concurrency_slack(variable) >= var.concurrency_share
    }

    /// Moves a staged variable's weight in and its elements to the enabled lists.
    fn enable_var(&mut self, variable: VariableIndex) {
        let var = &mut self.variables[variable];
        debug_assert!(var.staged_weight > 0.0, "enabling {} without a staged weight", variable);
        var.weight = var.staged_weight;
        var.staged_weight = 0.0;

        let elements = var.elements.clone();
        for element in elements {
            let constraint = self.elements[element].constraint();
            let cnst = &mut self.constraints[constraint];
            remove_item(&mut cnst.disabled, &element);
            cnst.enabled.push(element);
            self.increase_concurrency(element);
        }
        self.mark_dirty_from_variable(variable);
        trace!(%variable, "variable enabled");
    }

    fn disable_var(&mut self, variable: VariableIndex) {
        debug_assert!(
            self.variables[variable].staged_weight == 0.0,
            "disabling {} with a staged weight",
            variable
        );
        // propagate while the variable still links its constraints
        self.mark_dirty_from_variable(variable);

        let elements = self.variables[variable].elements.clone();
        for element in elements {
            let constraint = self.elements[element].constraint();
            let cnst = &mut self.constraints[constraint];
            remove_item(&mut cnst.enabled, &element);
            cnst.disabled.push(element);
            self.elements[element].active = false;
            self.decrease_concurrency(element);
        }

        let var = &mut self.variables[variable];
        var.weight = 0.0;
        var.staged_weight = 0.0;
        var.value = 0.0;
        trace!(%variable, "variable disabled");
    }

    /// Enables staged variables of a constraint while slots are free.
    fn on_disabled_var(&mut self, constraint: ConstraintIndex) {
        let Some(limit) = self.constraints[constraint].concurrency_limit else {
            return;
        };
        let disabled = self.constraints[constraint].disabled.clone();
        for element in disabled {
            let variable = self.elements[element].variable();
            if self.can_enable(variable) {
                self.enable_var(variable);
            }
            let current = self.constraints[constraint].concurrency_current;
            debug_assert!(current <= limit);
            if current >= limit {
                break;
            }
        }
    }

    /// Enables every staged variable of a constraint that fits.
    fn enable_staged(&mut self, constraint: ConstraintIndex) {
        let disabled = self.constraints[constraint].disabled.clone();
        for element in disabled {
            let variable = self.elements[element].variable();
            if self.can_enable(variable) {
                self.enable_var(variable);
            }
        }
    }

    /// Returns the constraints the next max-min pass covers.
    pub(crate) fn solve_scope(&self) -> Vec<ConstraintIndex> {
        if self.selective.is_enabled() {
            self.selective.dirty().to_vec()
        } else {
            self.active_constraints.clone()
        }
    }

    /// Bookkeeping shared by all solvers once values are final.
    pub(crate) fn finish_solve(&mut self, check_feasibility: bool) {
        self.modified = false;
        if self.selective.is_enabled() {
            for &constraint in self.selective.dirty() {
                for &element in &self.constraints[constraint].enabled {
                    let elem = &self.elements[element];
                    if elem.consumption_weight <= 0.0 {
                        continue;
                    }
                    let var = &mut self.variables[elem.variable()];
                    if !var.in_modified_set {
                        var.in_modified_set = true;
                        self.modified_variables.push(elem.variable());
                    }
                }
            }
            self.clear_dirty();
        }

        if check_feasibility {
            let feasible = self.report_violations();
            debug!(feasible, "feasibility checked");
        }
        if tracing::enabled!(Level::DEBUG) {
            debug!("solved system:\n{}", self);
        }
        self.debug_check_consistency();
    }

    #[inline]
    fn debug_check_consistency(&self) {
        if tracing::enabled!(Level::DEBUG) {
            self.check_consistency();
        }
    }

    /// Verifies the element lists and the concurrency accounting.
    ///
    /// # Panics
    ///
    /// Panics on the first inconsistency found.
    pub fn check_consistency(&self) {
        for (index, cnst) in self.constraints.iter() {
            let mut concurrency = 0;
            for &element in &cnst.enabled {
                let elem = &self.elements[element];
                let var = &self.variables[elem.variable()];
                assert!(
                    var.weight > 0.0,
                    "{} lists disabled {} as enabled",
                    index,
                    elem.variable()
                );
                concurrency += elem.concurrency();
            }
            for &element in &cnst.disabled {
                let elem = &self.elements[element];
                let var = &self.variables[elem.variable()];
                assert!(
                    var.weight <= 0.0,
                    "{} lists enabled {} as disabled",
                    index,
                    elem.variable()
                );
                assert!(
                    cnst.concurrency_limit.is_none()
                        || var.staged_weight == 0.0
                        || self.min_concurrency_slack(elem.variable()) < var.concurrency_share,
                    "staged {} could be enabled",
                    elem.variable()
                );
            }
            if let Some(limit) = cnst.concurrency_limit {
                assert!(
                    concurrency <= limit,
                    "{} concurrency {} over limit {}",
                    index,
                    concurrency,
                    limit
                );
            }
            assert_eq!(
                cnst.concurrency_current, concurrency,
                "{} concurrency accounting drifted",
                index
            );
            assert_eq!(
                cnst.in_active_set,
                self.active_constraints.contains(&index),
                "{} active flag out of sync",
                index
            );
        }
        for (index, var) in self.variables.iter() {
            for &element in &var.elements {
                let elem = &self.elements[element];
                assert_eq!(elem.variable(), index, "{} owns a foreign element", index);
                let cnst = &self.constraints[elem.constraint()];
                let listed = if var.weight > 0.0 {
                    &cnst.enabled
                } else {
                    &cnst.disabled
                };
                assert!(
                    listed.contains(&element),
                    "{} missing from the element lists of {}",
                    element,
                    elem.constraint()
                );
            }
        }
    }
}

impl Drop for System {
    fn drop(&mut self) {
        if !self.variables.is_empty() {
            warn!(
                count = self.variables.len(),
                "variables still allocated when the system is dropped"
            );
        }
    }
}

impl std::fmt::Display for System {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MAX-MIN (")?;
        for (index, var) in self.variables.iter() {
            write!(f, " '{}'({})", index.get(), var.weight)?;
        }
        writeln!(f, " )")?;
        writeln!(f, "Constraints")?;
        for &constraint in &self.active_constraints {
            let cnst = &self.constraints[constraint];
            let separator = match cnst.policy {
                SharingPolicy::Shared => " + ",
                SharingPolicy::Fatpipe => " , ",
            };
            write!(f, "\t")?;
            if cnst.policy == SharingPolicy::Fatpipe {
                write!(f, "max(")?;
            }
            for (i, &element) in cnst.enabled.iter().chain(cnst.disabled.iter()).enumerate() {
                let elem = &self.elements[element];
                let var = &self.variables[elem.variable()];
                if i > 0 {
                    write!(f, "{}", separator)?;
                }
                write!(
                    f,
                    "{}.'{}'({})",
                    elem.consumption_weight,
                    elem.variable().get(),
                    var.value
                )?;
            }
            if cnst.policy == SharingPolicy::Fatpipe {
                write!(f, ")")?;
            }
            writeln!(
                f,
                " = {} <= {} ('{}')",
                self.constraint_usage(constraint),
                cnst.bound,
                constraint.get()
            )?;
        }
        writeln!(f, "Variables")?;
        for (index, var) in self.variables.iter() {
            match var.bound {
                Some(bound) => writeln!(
                    f,
                    "\t'{}'({}) : {} (<={})",
                    index.get(),
                    var.weight,
                    var.value,
                    bound
                )?,
                None => writeln!(f, "\t'{}'({}) : {}", index.get(), var.weight, var.value)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SystemConfigBuilder;

    const EPS: f64 = 1e-6;

    fn limited(limit: usize) -> System {
        let config = SystemConfigBuilder::new()
            .with_concurrency_limit(limit)
            .build()
            .unwrap();
        System::with_config(config)
    }

    #[test]
    fn test_negative_bound_means_unbounded() {
        let mut system = System::new(false);
        let v = system.create_variable(1.0, Some(-1.0));
        assert_eq!(system.variable(v).bound(), None);
        system.update_variable_bound(v, Some(2.0));
        assert_eq!(system.variable(v).bound(), Some(2.0));
        system.update_variable_bound(v, Some(-3.0));
        assert_eq!(system.variable(v).bound(), None);
        system.free_all_variables();
    }

    #[test]
    #[should_panic(expected = "called `System::update_variable_weight` with invalid weight")]
    fn test_negative_weight_panics() {
        let mut system = System::new(false);
        let v = system.create_variable(1.0, None);
        system.update_variable_weight(v, -1.0);
    }

    #[test]
    fn test_attach_activates_constraint_and_marks_modified() {
        let mut system = System::new(false);
        let c = system.create_constraint(5.0);
        let v = system.create_variable(1.0, None);
        assert!(!system.is_modified());
        assert!(!system.constraint(c).is_active());
        system.attach(c, v, 1.0);
        assert!(system.is_modified());
        assert!(system.constraint(c).is_active());
        assert_eq!(system.active_constraints(), &[c]);
        assert_eq!(system.constraint(c).enabled_elements().len(), 1);
        system.check_consistency();
        system.free_all_variables();
    }

    #[test]
    fn test_zero_weight_goes_to_disabled_list() {
        let mut system = System::new(false);
        let c = system.create_constraint(5.0);
        let v = system.create_variable(0.0, None);
        system.attach(c, v, 1.0);
        assert!(system.constraint(c).enabled_elements().is_empty());
        assert_eq!(system.constraint(c).disabled_elements().len(), 1);

        system.update_variable_weight(v, 1.0);
        assert_eq!(system.constraint(c).enabled_elements().len(), 1);
        assert!(system.constraint(c).disabled_elements().is_empty());

        system.update_variable_weight(v, 0.0);
        assert!(system.constraint(c).enabled_elements().is_empty());
        assert!(!system.variable(v).is_enabled());
        system.check_consistency();
        system.free_all_variables();
    }

    #[test]
    fn test_weight_change_changes_shares() {
        let mut system = System::new(false);
        let c = system.create_constraint(9.0);
        let a = system.create_variable(1.0, None);
        let b = system.create_variable(1.0, None);
        system.attach(c, a, 1.0);
        system.attach(c, b, 1.0);
        system.solve();
        assert!((system.variable_value(a) - 4.5).abs() < EPS);

        system.update_variable_weight(b, 2.0);
        system.solve();
        assert!((system.variable_value(a) - 6.0).abs() < EPS);
        assert!((system.variable_value(b) - 3.0).abs() < EPS);

        system.update_variable_weight(b, 0.0);
        system.solve();
        assert!((system.variable_value(a) - 9.0).abs() < EPS);
        assert_eq!(system.variable_value(b), 0.0);
        system.free_all_variables();
    }

    #[test]
    fn test_attach_add_accumulates_on_shared() {
        let mut system = System::new(false);
        let c = system.create_constraint(10.0);
        let v = system.create_variable(1.0, None);
        let first = system.attach(c, v, 1.0);
        let same = system.attach_add(c, v, 2.0);
        assert_eq!(first, same);
        assert_eq!(system.element(first).consumption_weight(), 3.0);
        assert_eq!(system.element(first).max_consumption_weight(), 3.0);
        system.free_all_variables();
    }

    #[test]
    fn test_attach_add_takes_maximum_on_fatpipe() {
        let mut system = System::new(false);
        let c = system.create_constraint(10.0);
        system.set_sharing_policy(c, SharingPolicy::Fatpipe);
        let v = system.create_variable(1.0, None);
        let e = system.attach(c, v, 2.0);
        system.attach_add(c, v, 1.0);
        assert_eq!(system.element(e).consumption_weight(), 2.0);
        system.attach_add(c, v, 5.0);
        assert_eq!(system.element(e).consumption_weight(), 5.0);
        system.free_all_variables();
    }

    #[test]
    fn test_attach_add_without_element_attaches() {
        let mut system = System::new(false);
        let c = system.create_constraint(10.0);
        let v = system.create_variable(1.0, None);
        let e = system.attach_add(c, v, 1.5);
        assert_eq!(system.find_element(c, v), Some(e));
        assert_eq!(system.element(e).consumption_weight(), 1.5);
        system.free_all_variables();
    }

    #[test]
    fn test_set_element_value() {
        let mut system = System::new(false);
        let c = system.create_constraint(10.0);
        let a = system.create_variable(1.0, None);
        let b = system.create_variable(1.0, None);
        system.attach(c, a, 1.0);
        system.attach(c, b, 1.0);
        system.solve();

        system.set_element_value(c, b, 4.0).unwrap();
        system.solve();
        assert!((system.variable_value(a) - 2.0).abs() < EPS);
        assert!((system.variable_value(b) - 2.0).abs() < EPS);
        assert!((system.constraint_usage(c) - 10.0).abs() < EPS);
        system.free_all_variables();
    }

    #[test]
    fn test_set_element_value_unknown_pair() {
        let mut system = System::new(false);
        let c = system.create_constraint(10.0);
        let other = system.create_constraint(10.0);
        let v = system.create_variable(1.0, None);
        system.attach(c, v, 1.0);
        let err = system.set_element_value(other, v, 2.0).unwrap_err();
        assert_eq!(
            err,
            LmmError::ElementNotFound {
                constraint: other,
                variable: v
            }
        );
        system.free_all_variables();
    }

    #[test]
    fn test_concurrency_limit_stages_and_releases() {
        let mut system = limited(1);
        let c = system.create_constraint(10.0);
        let first = system.create_variable(1.0, None);
        let second = system.create_variable(1.0, None);
        system.attach(c, first, 1.0);
        system.attach(c, second, 1.0);

        assert!(system.variable(first).is_enabled());
        assert!(system.variable(second).is_staged());
        assert!(!system.variable(second).is_enabled());
        assert_eq!(system.constraint(c).concurrency_current(), 1);
        system.check_consistency();

        system.solve();
        assert!((system.variable_value(first) - 10.0).abs() < EPS);
        assert_eq!(system.variable_value(second), 0.0);

        system.free_variable(first);
        assert!(system.variable(second).is_enabled());
        assert!(!system.variable(second).is_staged());
        assert_eq!(system.constraint(c).concurrency_current(), 1);
        system.check_consistency();

        system.solve();
        assert!((system.variable_value(second) - 10.0).abs() < EPS);
        system.free_all_variables();
    }

    #[test]
    fn test_light_elements_do_not_count_towards_concurrency() {
        let mut system = limited(1);
        let c = system.create_constraint(10.0);
        let light = system.create_variable(1.0, None);
        let heavy = system.create_variable(1.0, None);
        system.attach(c, light, 0.5);
        assert_eq!(system.constraint(c).concurrency_current(), 0);
        system.attach(c, heavy, 1.0);
        assert!(system.variable(light).is_enabled());
        assert!(system.variable(heavy).is_enabled());
        assert_eq!(system.constraint(c).concurrency_current(), 1);
        assert_eq!(system.constraint(c).concurrency_maximum(), 1);
        system.check_consistency();
        system.free_all_variables();
    }

    #[test]
    fn test_reenabling_without_slack_stays_staged() {
        let mut system = limited(1);
        let c = system.create_constraint(10.0);
        let busy = system.create_variable(1.0, None);
        let waiting = system.create_variable(0.0, None);
        system.attach(c, busy, 1.0);
        system.attach(c, waiting, 1.0);
        system.update_variable_weight(waiting, 2.0);
        assert!(system.variable(waiting).is_staged());
        assert_eq!(system.variable(waiting).staged_weight(), 2.0);

        system.update_variable_weight(busy, 0.0);
        assert!(system.variable(waiting).is_enabled());
        assert_eq!(system.variable(waiting).weight(), 2.0);
        system.check_consistency();
        system.free_all_variables();
    }

    #[test]
    fn test_attach_add_over_limit_stages() {
        let mut system = limited(1);
        let c = system.create_constraint(10.0);
        let growing = system.create_variable(1.0, None);
        let other = system.create_variable(1.0, None);
        system.attach(c, growing, 0.5);
        system.attach(c, other, 1.0);
        assert_eq!(system.constraint(c).concurrency_current(), 1);

        system.attach_add(c, growing, 0.5);
        assert!(system.variable(growing).is_staged());
        assert_eq!(system.constraint(c).concurrency_current(), 1);
        system.check_consistency();
        system.free_all_variables();
    }

    #[test]
    fn test_raising_limit_enables_staged() {
        let mut system = limited(1);
        let c = system.create_constraint(10.0);
        let a = system.create_variable(1.0, None);
        let b = system.create_variable(1.0, None);
        system.attach(c, a, 1.0);
        system.attach(c, b, 1.0);
        assert!(system.variable(b).is_staged());

        system.set_concurrency_limit(c, Some(2)).unwrap();
        assert!(system.variable(b).is_enabled());
        assert_eq!(system.constraint(c).concurrency_current(), 2);
        system.check_consistency();
        system.free_all_variables();
    }

    #[test]
    fn test_lowering_coefficient_releases_slot() {
        let mut system = limited(1);
        let c = system.create_constraint(10.0);
        let a = system.create_variable(1.0, None);
        let b = system.create_variable(1.0, None);
        system.attach(c, a, 1.0);
        system.attach(c, b, 1.0);
        assert!(system.variable(b).is_staged());

        system.set_element_value(c, a, 0.5).unwrap();
        assert!(system.variable(b).is_enabled());
        assert_eq!(system.constraint(c).concurrency_current(), 1);
        system.check_consistency();
        system.free_all_variables();
    }

    #[test]
    fn test_freeing_blocking_constraint_enables_staged() {
        let mut system = limited(1);
        let full = system.create_constraint(10.0);
        let open = system.create_constraint(10.0);
        let a = system.create_variable(1.0, None);
        let b = system.create_variable(1.0, None);
        system.attach(full, a, 1.0);
        system.attach(open, b, 1.0);
        system.attach(full, b, 1.0);
        assert!(system.variable(b).is_staged());

        system.free_constraint(full);
        assert!(system.variable(b).is_enabled());
        assert_eq!(system.constraint(open).concurrency_current(), 1);
        system.check_consistency();

        system.solve();
        assert!((system.variable_value(b) - 10.0).abs() < EPS);
        system.free_all_variables();
    }

    #[test]
    fn test_concurrency_limit_below_maximum_is_rejected() {
        let mut system = System::new(false);
        let c = system.create_constraint(10.0);
        let a = system.create_variable(1.0, None);
        let b = system.create_variable(1.0, None);
        system.attach(c, a, 1.0);
        system.attach(c, b, 1.0);
        assert_eq!(system.constraint(c).concurrency_maximum(), 2);
        assert_eq!(
            system.set_concurrency_limit(c, Some(1)),
            Err(LmmError::ConcurrencyLimitBelowMaximum {
                limit: 1,
                maximum: 2
            })
        );
        system.free_variable(b);
        system.reset_concurrency_maximum(c);
        assert_eq!(system.set_concurrency_limit(c, Some(1)), Ok(()));
        assert_eq!(system.constraint(c).concurrency_limit(), Some(1));
        assert_eq!(system.set_concurrency_limit(c, None), Ok(()));
        system.free_all_variables();
    }

    #[test]
    fn test_concurrency_share_requires_more_slack() {
        let mut system = limited(2);
        let c = system.create_constraint(10.0);
        let a = system.create_variable(1.0, None);
        system.attach(c, a, 1.0);
        let wide = system.create_variable(0.0, None);
        system.set_concurrency_share(wide, 2);
        system.attach(c, wide, 1.0);
        system.update_variable_weight(wide, 1.0);
        assert!(system.variable(wide).is_staged());
        system.free_all_variables();
    }

    #[test]
    fn test_disable_variable_detaches_everything() {
        let mut system = System::new(false);
        let c1 = system.create_constraint(10.0);
        let c2 = system.create_constraint(10.0);
        let a = system.create_variable(1.0, None);
        let b = system.create_variable(1.0, None);
        system.attach(c1, a, 1.0);
        system.attach(c2, a, 1.0);
        system.attach(c2, b, 1.0);
        system.solve();

        system.disable_variable(a);
        assert!(system.variable(a).elements().is_empty());
        assert_eq!(system.variable_value(a), 0.0);
        assert!(!system.is_constraint_used(c1));
        assert!(!system.constraint(c1).is_active());
        assert!(system.constraint(c2).is_active());
        system.check_consistency();

        system.solve();
        assert!((system.variable_value(b) - 10.0).abs() < EPS);
        system.free_all_variables();
    }

    #[test]
    fn test_free_constraint_detaches_variables() {
        let mut system = System::new(false);
        let c1 = system.create_constraint(4.0);
        let c2 = system.create_constraint(10.0);
        let v = system.create_variable(1.0, None);
        system.attach(c1, v, 1.0);
        system.attach(c2, v, 1.0);
        system.solve();
        assert!((system.variable_value(v) - 4.0).abs() < EPS);

        system.free_constraint(c1);
        assert_eq!(system.num_constraints(), 1);
        assert_eq!(system.variable(v).elements().len(), 1);
        assert!(system.get_constraint(c1).is_none());
        system.check_consistency();

        system.solve();
        assert!((system.variable_value(v) - 10.0).abs() < EPS);
        system.free_all_variables();
    }

    #[test]
    fn test_free_all_variables() {
        let mut system = System::new(true);
        let c = system.create_constraint(4.0);
        for _ in 0..4 {
            let v = system.create_variable(1.0, None);
            system.attach(c, v, 1.0);
        }
        system.solve();
        assert_eq!(system.take_modified_variables().len(), 4);
        system.free_all_variables();
        assert_eq!(system.num_variables(), 0);
        assert!(!system.is_constraint_used(c));
        assert!(system.active_constraints().is_empty());
    }

    #[test]
    fn test_introspection() {
        let mut system = System::new(false);
        let c = system.create_constraint(6.0);
        let d = system.create_constraint(6.0);
        let a = system.create_variable(1.0, None);
        let b = system.create_variable(0.0, None);
        let z = system.create_variable(1.0, None);
        system.attach(c, a, 2.0);
        system.attach(c, b, 1.0);
        system.attach(c, z, 0.0);
        system.attach(d, a, 1.0);
        system.solve();

        assert!((system.variable_value(a) - 3.0).abs() < EPS);
        assert!((system.constraint_usage(c) - 6.0).abs() < EPS);
        assert!((system.constraint_usage(d) - 3.0).abs() < EPS);
        assert_eq!(system.constraint_variable_amount(c), 1);
        assert!(system.is_constraint_used(c));

        let vars: Vec<_> = system.constraint_variables(c).collect();
        assert_eq!(vars, vec![a, z, b]);
        let cnsts: Vec<_> = system.variable_constraints(a).collect();
        assert_eq!(cnsts, vec![(c, 2.0), (d, 1.0)]);
        assert!(system.take_modified_variables().is_empty());
        system.free_all_variables();
    }

    #[test]
    fn test_display_dump() {
        let mut system = System::new(false);
        let c = system.create_constraint(10.0);
        let f = system.create_constraint(10.0);
        system.set_sharing_policy(f, SharingPolicy::Fatpipe);
        let a = system.create_variable(1.0, Some(4.0));
        system.attach(c, a, 1.0);
        system.attach(f, a, 1.0);
        system.solve();
        let dump = system.to_string();
        assert!(dump.starts_with("MAX-MIN ( '0'(1) )"));
        assert!(dump.contains("1.'0'(4) = 4 <= 10 ('0')"));
        assert!(dump.contains("max(1.'0'(4))"));
        assert!(dump.contains("'0'(1) : 4 (<=4)"));
        system.free_all_variables();
    }
}
