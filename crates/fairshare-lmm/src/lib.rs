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

//! Fairshare-LMM: linear resource sharing for fluid simulation models
//!
//! Computes how concurrent activities (network flows, computations, disk
//! transfers) share capacity-limited resources. Activities are variables,
//! resources are constraints, and each variable loads the constraints it
//! crosses with a consumption coefficient. A solve assigns every variable
//! a value such that no constraint is overloaded and the allocation is fair
//! under the chosen model.
//!
//! Core flow
//! - Create a `system::System` (optionally from a `config::SystemConfig`).
//! - Create constraints and variables, attach them with coefficients.
//! - Call `System::solve` (or one of the solver entry points) and read the
//!   values back.
//! - Mutate the system as the simulation advances and solve again; with
//!   selective update enabled, only the affected components are recomputed.
//!
//! Sharing models
//! - `maxmin`: weighted max-min fairness by progressive saturation.
//! - `bottleneck`: equal increments until a bottleneck saturates.
//! - `lagrange`: utility maximization (TCP Vegas, Reno, Reno2) by
//!   Lagrangian relaxation.
//!
//! Module map
//! - `system`: the aggregate and its construction, mutation and query API.
//! - `constraint`, `variable`, `element`: the entities of the graph.
//! - `selective`: dirty-set tracking for incremental solves.
//! - `feasibility`: post-solve verification of bounds.
//! - `config`: system configuration and algorithm selection.
//! - `report`, `stats`: solve outcomes and counters.
//! - `error`: recoverable errors.

pub mod bottleneck;
pub mod config;
pub mod constraint;
pub mod element;
pub mod error;
pub mod feasibility;
pub mod index;
pub mod lagrange;
pub mod maxmin;
pub mod report;
mod selective;
pub mod stats;
pub mod system;
pub mod variable;

#[cfg(test)]
mod properties;
