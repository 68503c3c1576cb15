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

use crate::stats::SolveStatistics;

/// Why a solve returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Termination {
    /// Nothing changed since the previous solve; values were left untouched.
    Skipped,
    /// The algorithm ran to completion.
    Converged,
    /// The Lagrangian iteration cap was reached before the values settled.
    IterationLimit,
}

impl std::fmt::Display for Termination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Termination::Skipped => write!(f, "Skipped"),
            Termination::Converged => write!(f, "Converged"),
            Termination::IterationLimit => write!(f, "Iteration Limit"),
        }
    }
}

/// The outcome of one call to a solver.
#[derive(Debug, Clone, PartialEq)]
pub struct SolveReport {
    /// The solver that ran, e.g. `maxmin` or `lagrange-reno`.
    pub solver: String,
    pub termination: Termination,
    pub statistics: SolveStatistics,
}

impl SolveReport {
    #[inline]
    pub fn new(
        solver: impl ToString,
        termination: Termination,
        statistics: SolveStatistics,
    ) -> Self {
        Self {
            solver: solver.to_string(),
            termination,
            statistics,
        }
    }

    /// A report for a solve that found nothing to do.
    #[inline]
    pub fn skipped(solver: impl ToString) -> Self {
        Self::new(solver, Termination::Skipped, SolveStatistics::default())
    }

    #[inline]
    pub fn is_skipped(&self) -> bool {
        self.termination == Termination::Skipped
    }

    #[inline]
    pub fn is_converged(&self) -> bool {
        self.termination == Termination::Converged
    }
}

impl std::fmt::Display for SolveReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Solve Report ({}): {}", self.solver, self.termination)?;
        write!(f, "{}", self.statistics)
    }
}
