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

/// Counters collected by one solve.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SolveStatistics {
    /// Saturation rounds (max-min, bottleneck) or dual iterations (Lagrange).
    pub iterations: u64,
    /// Constraints taken into account.
    pub constraints_considered: usize,
    /// Variables whose value was recomputed.
    pub variables_considered: usize,
    /// Constraints that were saturated and retired.
    pub saturated_constraints: u64,
    /// Wall-clock time spent in the solve.
    pub time_total: std::time::Duration,
}

impl SolveStatistics {
    #[inline(always)]
    pub fn on_iteration(&mut self) {
        self.iterations = self.iterations.saturating_add(1);
    }

    #[inline(always)]
    pub fn on_constraint_saturated(&mut self) {
        self.saturated_constraints = self.saturated_constraints.saturating_add(1);
    }

    #[inline(always)]
    pub fn set_scope(&mut self, constraints: usize, variables: usize) {
        self.constraints_considered = constraints;
        self.variables_considered = variables;
    }

    #[inline(always)]
    pub fn set_total_time(&mut self, duration: std::time::Duration) {
        self.time_total = duration;
    }
}

impl std::fmt::Display for SolveStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Solve Statistics:")?;
        writeln!(f, "  Iterations: {}", self.iterations)?;
        writeln!(f, "  Constraints Considered: {}", self.constraints_considered)?;
        writeln!(f, "  Variables Considered: {}", self.variables_considered)?;
        writeln!(f, "  Saturated Constraints: {}", self.saturated_constraints)?;
        writeln!(
            f,
            "  Total Time (secs): {:.6}",
            self.time_total.as_secs_f64()
        )
    }
}
