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

//! # Solver Properties
//!
//! Seeded randomized checks over generated resource graphs. Each case
//! builds a system from a fixed seed, so a failure reproduces exactly.

use crate::config::{Algorithm, SystemConfig, SystemConfigBuilder};
use crate::constraint::SharingPolicy;
use crate::index::{ConstraintIndex, VariableIndex};
use crate::system::System;
use rand::{rngs::StdRng, Rng, SeedableRng};

const CASES: u64 = 64;

/// Shape of the generated graphs.
#[derive(Debug, Clone, Copy)]
struct Shape {
    constraints: usize,
    variables: usize,
    fatpipe_ratio: f64,
    bounded_ratio: f64,
    /// Share of the bounded variables whose bound is zero.
    closed_ratio: f64,
    disabled_ratio: f64,
}

impl Default for Shape {
    fn default() -> Self {
        Self {
            constraints: 6,
            variables: 16,
            fatpipe_ratio: 0.2,
            bounded_ratio: 0.3,
            closed_ratio: 0.2,
            disabled_ratio: 0.1,
        }
    }
}

struct Generated {
    system: System,
    constraints: Vec<ConstraintIndex>,
    variables: Vec<VariableIndex>,
}

fn generate(seed: u64, config: SystemConfig, shape: Shape) -> Generated {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut system = System::with_config(config);

    let constraints: Vec<ConstraintIndex> = (0..shape.constraints)
        .map(|_| {
            let c = system.create_constraint(rng.random_range(1.0..100.0));
            if rng.random_bool(shape.fatpipe_ratio) {
                system.set_sharing_policy(c, SharingPolicy::Fatpipe);
            }
            c
        })
        .collect();

    let variables: Vec<VariableIndex> = (0..shape.variables)
        .map(|_| {
            let weight = if rng.random_bool(shape.disabled_ratio) {
                0.0
            } else {
                rng.random_range(0.5..3.0)
            };
            let bound = rng.random_bool(shape.bounded_ratio).then(|| {
                if rng.random_bool(shape.closed_ratio) {
                    0.0
                } else {
                    rng.random_range(1.0..50.0)
                }
            });
            let v = system.create_variable(weight, bound);

            let first = rng.random_range(0..constraints.len());
            system.attach(constraints[first], v, rng.random_range(0.5..2.0));
            if rng.random_bool(0.5) {
                let second = (first + rng.random_range(1..constraints.len())) % constraints.len();
                system.attach(constraints[second], v, rng.random_range(0.5..2.0));
            }
            v
        })
        .collect();

    Generated {
        system,
        constraints,
        variables,
    }
}

fn config(algorithm: Algorithm, selective: bool) -> SystemConfig {
    SystemConfigBuilder::new()
        .with_algorithm(algorithm)
        .with_selective_update(selective)
        .build()
        .unwrap()
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-4 * a.abs().max(b.abs()).max(1.0)
}

/// `value * weight` of the slowest enabled variable that may grow at all.
fn min_level(system: &System, variables: &[VariableIndex]) -> f64 {
    variables
        .iter()
        .map(|&v| system.variable(v))
        .filter(|var| var.is_enabled() && var.bound() != Some(0.0))
        .map(|var| var.value() * var.weight())
        .fold(f64::INFINITY, f64::min)
}

fn assert_feasible(system: &System, seed: u64) {
    let violations = system.violations();
    assert!(
        violations.is_empty(),
        "seed {}: infeasible allocation: {:?}",
        seed,
        violations
    );
}

#[test]
fn test_maxmin_allocations_are_feasible() {
    for seed in 0..CASES {
        let Generated {
            mut system,
            variables,
            ..
        } = generate(seed, config(Algorithm::MaxMin, false), Shape::default());
        let report = system.solve();
        assert!(report.is_converged(), "seed {}: {}", seed, report);
        assert_feasible(&system, seed);
        for &v in &variables {
            let var = system.variable(v);
            assert!(var.value() >= 0.0);
            if !var.is_enabled() || var.bound() == Some(0.0) {
                assert_eq!(var.value(), 0.0, "seed {}: closed {} got a share", seed, v);
            }
        }
        system.check_consistency();
        system.free_all_variables();
    }
}

#[test]
fn test_bottleneck_allocations_are_feasible() {
    for seed in 0..CASES {
        let Generated {
            mut system,
            variables,
            ..
        } = generate(seed, config(Algorithm::FairBottleneck, false), Shape::default());
        system.solve();
        assert_feasible(&system, seed);
        for &v in &variables {
            let var = system.variable(v);
            if !var.is_enabled() || var.bound() == Some(0.0) {
                assert_eq!(var.value(), 0.0, "seed {}: closed {} got a share", seed, v);
            }
        }
        system.free_all_variables();
    }
}

#[test]
fn test_maxmin_leaves_no_idle_capacity() {
    let shape = Shape {
        fatpipe_ratio: 0.0,
        ..Shape::default()
    };
    for seed in 0..CASES {
        let Generated {
            mut system,
            variables,
            ..
        } = generate(seed, config(Algorithm::MaxMin, false), shape);
        system.solve();
        for &v in &variables {
            let var = system.variable(v);
            if !var.is_enabled() {
                continue;
            }
            let at_bound = var.bound().is_some_and(|b| var.value() >= b * (1.0 - 1e-6));
            let saturated = system.variable_constraints(v).any(|(c, _)| {
                let bound = system.constraint(c).bound();
                system.constraint_usage(c) >= bound * (1.0 - 1e-4) - 1e-9
            });
            assert!(
                at_bound || saturated,
                "seed {}: {} could still grow from {}",
                seed,
                v,
                var.value()
            );
        }
        system.free_all_variables();
    }
}

#[test]
fn test_maxmin_more_capacity_never_lowers_the_minimum() {
    for seed in 0..CASES {
        let Generated {
            mut system,
            constraints,
            variables,
        } = generate(seed, config(Algorithm::MaxMin, false), Shape::default());
        system.solve();
        let before = min_level(&system, &variables);

        let mut rng = StdRng::seed_from_u64(seed ^ 0xfa15);
        let c = constraints[rng.random_range(0..constraints.len())];
        let bound = system.constraint(c).bound();
        system.update_constraint_bound(c, bound * rng.random_range(1.0..4.0));
        system.solve();
        let after = min_level(&system, &variables);

        assert!(
            after >= before - 1e-4 * before.abs().max(1.0),
            "seed {}: minimum level dropped from {} to {}",
            seed,
            before,
            after
        );
        system.free_all_variables();
    }
}

#[test]
fn test_second_solve_is_skipped() {
    for algorithm in [Algorithm::MaxMin, Algorithm::FairBottleneck] {
        for seed in 0..8 {
            let Generated {
                mut system,
                variables,
                ..
            } = generate(seed, config(algorithm, false), Shape::default());
            system.solve();
            let values: Vec<f64> = variables.iter().map(|&v| system.variable_value(v)).collect();
            let report = system.solve();
            assert!(report.is_skipped());
            let again: Vec<f64> = variables.iter().map(|&v| system.variable_value(v)).collect();
            assert_eq!(values, again);
            system.free_all_variables();
        }
    }
}

#[test]
fn test_zero_weight_excludes_variable() {
    for seed in 0..CASES {
        let Generated {
            mut system,
            constraints,
            variables,
        } = generate(seed, config(Algorithm::MaxMin, false), Shape::default());
        system.solve();

        let victim = variables[seed as usize % variables.len()];
        system.update_variable_weight(victim, 0.0);
        system.solve();
        assert_eq!(system.variable_value(victim), 0.0);
        for &c in &constraints {
            let listed = system.constraint(c).enabled_elements().iter().any(|&e| {
                system.element(e).variable() == victim
            });
            assert!(!listed, "seed {}: disabled variable still loads {}", seed, c);
        }
        assert_feasible(&system, seed);
        system.free_all_variables();
    }
}

#[test]
fn test_selective_update_matches_full_solve() {
    for seed in 0..CASES {
        let Generated {
            system: mut full,
            constraints,
            variables,
        } = generate(seed, config(Algorithm::MaxMin, false), Shape::default());
        let Generated {
            system: mut selective,
            ..
        } = generate(seed, config(Algorithm::MaxMin, true), Shape::default());

        let mut rng = StdRng::seed_from_u64(seed.wrapping_mul(31));
        for round in 0..4 {
            full.solve();
            selective.solve();
            for &v in &variables {
                let (a, b) = (full.variable_value(v), selective.variable_value(v));
                assert!(
                    close(a, b),
                    "seed {} round {}: {} is {} after a full solve but {} selectively",
                    seed,
                    round,
                    v,
                    a,
                    b
                );
            }
            assert!(selective.dirty_constraints().is_empty());

            let c = constraints[rng.random_range(0..constraints.len())];
            let bound = rng.random_range(1.0..100.0);
            full.update_constraint_bound(c, bound);
            selective.update_constraint_bound(c, bound);

            let v = variables[rng.random_range(0..variables.len())];
            let weight = rng.random_range(0.0..3.0);
            full.update_variable_weight(v, weight);
            selective.update_variable_weight(v, weight);
        }
        full.free_all_variables();
        selective.free_all_variables();
    }
}

#[test]
fn test_selective_solve_reports_touched_variables() {
    for seed in 0..16 {
        let Generated {
            mut system,
            constraints,
            ..
        } = generate(seed, config(Algorithm::MaxMin, true), Shape::default());
        system.solve();
        system.take_modified_variables();

        let c = constraints[0];
        system.update_constraint_bound(c, system.constraint(c).bound() * 2.0);
        system.solve();
        let modified = system.take_modified_variables();
        for (v, _) in system.variables() {
            if system.variable_constraints(v).any(|(other, w)| other == c && w > 0.0)
                && system.variable(v).is_enabled()
            {
                assert!(modified.contains(&v), "seed {}: {} not reported", seed, v);
            }
        }
        system.free_all_variables();
    }
}

#[test]
fn test_random_churn_keeps_bookkeeping_consistent() {
    let config = SystemConfigBuilder::new()
        .with_concurrency_limit(2)
        .build()
        .unwrap();
    let mut rng = StdRng::seed_from_u64(7);
    let mut system = System::with_config(config);
    let constraints: Vec<ConstraintIndex> = (0..4)
        .map(|_| system.create_constraint(rng.random_range(1.0..20.0)))
        .collect();
    let mut live: Vec<VariableIndex> = Vec::new();

    for step in 0..2_000 {
        match rng.random_range(0..6) {
            0 => {
                let weight = if rng.random_bool(0.2) {
                    0.0
                } else {
                    rng.random_range(1.0..3.0)
                };
                let v = system.create_variable(weight, None);
                let first = rng.random_range(0..constraints.len());
                system.attach(constraints[first], v, [0.5, 1.0, 2.0][rng.random_range(0..3)]);
                if rng.random_bool(0.5) {
                    let second = (first + 1) % constraints.len();
                    system.attach(constraints[second], v, 1.0);
                }
                live.push(v);
            }
            1 if !live.is_empty() => {
                let v = live[rng.random_range(0..live.len())];
                system.update_variable_weight(v, [0.0, 1.0, 2.0][rng.random_range(0..3)]);
            }
            2 if !live.is_empty() => {
                let v = live.swap_remove(rng.random_range(0..live.len()));
                system.free_variable(v);
            }
            3 if !live.is_empty() => {
                let v = live[rng.random_range(0..live.len())];
                let (c, _) = system
                    .variable_constraints(v)
                    .next()
                    .expect("generated variables have an element");
                system
                    .set_element_value(c, v, [0.25, 1.0, 2.0][rng.random_range(0..3)])
                    .unwrap();
            }
            4 if !live.is_empty() => {
                let v = live[rng.random_range(0..live.len())];
                let (c, _) = system
                    .variable_constraints(v)
                    .next()
                    .expect("generated variables have an element");
                system.attach_add(c, v, 0.5);
            }
            _ => {
                system.solve();
                assert_feasible(&system, step);
            }
        }
        system.check_consistency();
        for &c in &constraints {
            let cnst = system.constraint(c);
            assert!(cnst.concurrency_current() <= 2, "step {}: {} overflows", step, c);
        }
    }
    system.free_all_variables();
    system.check_consistency();
}
