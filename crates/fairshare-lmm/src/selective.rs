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

//! # Selective Update
//!
//! Tracks which constraints must be revisited by the next max-min pass.
//! Marking a constraint dirty marks its whole connected component: every
//! constraint reachable through enabled variables.
//!
//! Variables carry a visit stamp compared against a counter that advances
//! after every solve, so no per-solve reset of the stamps is needed. When
//! the counter wraps, all stamps are reset once.

use crate::index::{ConstraintIndex, VariableIndex};
use crate::system::System;
use tracing::trace;

/// The dirty set and the visit counter of a `System`.
#[derive(Debug, Clone)]
pub(crate) struct SelectiveUpdate {
    enabled: bool,
    dirty: Vec<ConstraintIndex>,
    visited_counter: u32,
}

impl SelectiveUpdate {
    pub(crate) fn new(enabled: bool) -> Self {
        Self {
            enabled,
            dirty: Vec::new(),
            visited_counter: 1,
        }
    }

    #[inline]
    pub(crate) fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[inline]
    pub(crate) fn dirty(&self) -> &[ConstraintIndex] {
        &self.dirty
    }

    #[inline]
    pub(crate) fn visited_counter(&self) -> u32 {
        self.visited_counter
    }

    /// A stamp that never equals the current counter.
    #[inline]
    pub(crate) fn unvisited_stamp(&self) -> u32 {
        self.visited_counter.wrapping_sub(1)
    }

    /// Drops a constraint from the dirty list without touching its flag.
    pub(crate) fn forget(&mut self, constraint: ConstraintIndex) {
        if let Some(pos) = self.dirty.iter().position(|&c| c == constraint) {
            self.dirty.swap_remove(pos);
        }
    }
}

impl System {
    /// Returns the constraints marked dirty since the last solve.
    #[inline]
    pub fn dirty_constraints(&self) -> &[ConstraintIndex] {
        self.selective.dirty()
    }

    /// Marks a constraint and its connected component dirty.
    ///
    /// Does nothing when selective update is disabled.
    pub fn mark_dirty(&mut self, constraint: ConstraintIndex) {
        if !self.selective.enabled || self.constraints[constraint].dirty {
            return;
        }
        let counter = self.selective.visited_counter;
        self.constraints[constraint].dirty = true;
        self.selective.dirty.push(constraint);

        let mut stack = vec![constraint];
        while let Some(current) = stack.pop() {
            let num_enabled = self.constraints[current].enabled.len();
            for i in 0..num_enabled {
                let element = self.constraints[current].enabled[i];
                let variable = self.elements[element].variable();
                let var = &mut self.variables[variable];
                if var.visited == counter {
                    continue;
                }
                var.visited = counter;
                for &other in &var.elements {
                    let next = self.elements[other].constraint();
                    let cnst = &mut self.constraints[next];
                    if next != current && !cnst.dirty {
                        cnst.dirty = true;
                        self.selective.dirty.push(next);
                        stack.push(next);
                    }
                }
            }
        }
        trace!(
            %constraint,
            dirty = self.selective.dirty.len(),
            "constraint component marked dirty"
        );
    }

    /// Marks the component of an enabled variable dirty.
    ///
    /// Every constraint of the variable is marked on its own: a variable
    /// enabled since the last solve may join a clean constraint to one that
    /// is already dirty.
    pub(crate) fn mark_dirty_from_variable(&mut self, variable: VariableIndex) {
        let var = &self.variables[variable];
        if !self.selective.enabled || var.weight <= 0.0 {
            return;
        }
        let constraints: Vec<ConstraintIndex> = var
            .elements
            .iter()
            .map(|&e| self.elements[e].constraint())
            .collect();
        for constraint in constraints {
            self.mark_dirty(constraint);
        }
    }

    /// Empties the dirty set and advances the visit counter.
    pub(crate) fn clear_dirty(&mut self) {
        for &constraint in &self.selective.dirty {
            self.constraints[constraint].dirty = false;
        }
        self.selective.dirty.clear();

        self.selective.visited_counter = self.selective.visited_counter.wrapping_add(1);
        if self.selective.visited_counter == 0 {
            // zero is the stamp of never-visited variables
            self.selective.visited_counter = 1;
            for (_, var) in self.variables.iter_mut() {
                var.visited = 0;
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn set_visited_counter(&mut self, counter: u32) {
        self.selective.visited_counter = counter;
    }
}
