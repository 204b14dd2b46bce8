//! Local search improvement for TA pickup walks.
//!
//! The neighborhood of a walk is its "1-change" neighborhood:
//! - Exclusion: drop one visited vertex (other than the source), bridging the
//!   gap with an alternative simple path when needed
//! - Inclusion: add one unvisited vertex next to its cheapest visited neighbor
//!
//! Every neighbor is scored with optimal drop-offs. The search moves to the
//! best neighbor while it strictly improves, optionally taking random moves
//! with a decaying probability, and always stops within its iteration and
//! time budget.

use crate::graph::EPSILON;
use crate::instance::TaInstance;
use crate::solution::{Solution, Walk};
use ordered_float::OrderedFloat;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Instant;

/// Trait for local search improvement methods
pub trait LocalSearch {
    fn improve(&self, instance: &TaInstance, solution: &mut Solution) -> bool;
    fn name(&self) -> &str;
}

/// Budget and exploration settings of the local search
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalSearchConfig {
    /// Maximum number of moves
    pub max_iterations: usize,
    /// Wall-clock limit in seconds
    pub time_limit: f64,
    /// Initial probability of taking a random neighbor instead of the best
    pub epsilon: f64,
    /// Factor applied to epsilon after every iteration
    pub epsilon_decay: f64,
    /// Random seed
    pub seed: u64,
    /// Score neighbors on the rayon pool
    pub parallel: bool,
}

impl Default for LocalSearchConfig {
    fn default() -> Self {
        LocalSearchConfig {
            max_iterations: 10_000,
            time_limit: 60.0,
            epsilon: 0.0,
            epsilon_decay: 0.95,
            seed: 42,
            parallel: true,
        }
    }
}

/// Why the search stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Termination {
    /// No neighbor improves on the current walk
    LocalOptimum,
    /// The walk has no neighbors at all
    NoNeighbors,
    IterationLimit,
    TimeLimit,
}

/// Outcome of a local search run
#[derive(Debug, Clone)]
pub struct LocalSearchReport {
    /// Best solution seen, never worse than the seed
    pub solution: Solution,
    pub iterations: usize,
    pub termination: Termination,
}

/// All exclusion neighbors (ascending vertex) followed by all inclusion
/// neighbors (ascending vertex) of `walk`.
pub fn neighbors(instance: &TaInstance, walk: &[usize]) -> Vec<Walk> {
    let visited: BTreeSet<usize> = walk.iter().copied().collect();
    let mut result = Vec::new();

    for &vertex in &visited {
        if vertex == instance.source {
            continue;
        }
        if let Some(candidate) = exclude_vertex(instance, walk, vertex) {
            result.push(candidate);
        }
    }

    for vertex in 0..instance.num_vertices() {
        if visited.contains(&vertex) {
            continue;
        }
        if let Some(candidate) = include_vertex(instance, walk, &visited, vertex) {
            result.push(candidate);
        }
    }

    result
}

/// Remove every occurrence of `vertex` from the walk.
///
/// An occurrence between two copies of the same stop is spliced out together
/// with one copy. Otherwise the segment `prev, vertex, next` is replaced by
/// the first of the two shortest simple `prev -> next` paths that avoids
/// `vertex`; without one the move is rejected.
pub fn exclude_vertex(instance: &TaInstance, walk: &[usize], vertex: usize) -> Option<Walk> {
    let mut new_walk = walk.to_vec();

    while let Some(idx) = new_walk.iter().position(|&v| v == vertex) {
        if idx == 0 || idx + 1 >= new_walk.len() {
            return None;
        }
        let (prev, next) = (new_walk[idx - 1], new_walk[idx + 1]);

        if prev == next {
            new_walk.drain(idx..idx + 2);
        } else {
            let original = [prev, vertex, next];
            let alternative = instance
                .graph
                .k_shortest_simple_paths(prev, next, 2)
                .into_iter()
                .find(|path| path.as_slice() != original && !path.contains(&vertex))?;
            new_walk.splice(idx - 1..=idx + 1, alternative);
        }
    }

    Some(new_walk)
}

/// Insert an unvisited `vertex` after the first occurrence of its cheapest
/// visited graph neighbor: directly if it has an edge to the following stop,
/// otherwise as a there-and-back detour.
pub fn include_vertex(
    instance: &TaInstance,
    walk: &[usize],
    visited: &BTreeSet<usize>,
    vertex: usize,
) -> Option<Walk> {
    let (closest, _) = instance
        .graph
        .neighbors(vertex)
        .filter(|(v, _)| visited.contains(v))
        .min_by_key(|&(v, w)| (OrderedFloat(w), v))?;
    let idx = walk.iter().position(|&v| v == closest)?;

    let mut new_walk = walk.to_vec();
    match walk.get(idx + 1) {
        Some(&next) if instance.graph.has_edge(vertex, next) => {
            new_walk.insert(idx + 1, vertex);
        }
        _ => {
            new_walk.splice(idx + 1..idx + 1, [vertex, closest]);
        }
    }
    Some(new_walk)
}

/// Cost of a walk under its optimal drop-off assignment
pub fn evaluate_walk(instance: &TaInstance, walk: &[usize]) -> f64 {
    let dropoffs = instance.assign_optimal_dropoffs(walk);
    instance.evaluate(walk, &dropoffs).total
}

/// Steepest-descent search over the 1-change neighborhood with optional
/// epsilon-greedy exploration.
pub struct OneChangeSearch {
    pub config: LocalSearchConfig,
}

impl OneChangeSearch {
    pub fn new() -> Self {
        OneChangeSearch {
            config: LocalSearchConfig::default(),
        }
    }

    pub fn with_config(config: LocalSearchConfig) -> Self {
        OneChangeSearch { config }
    }

    /// Lowest-cost neighbor, earliest position on ties
    fn best_neighbor(&self, instance: &TaInstance, candidates: &[Walk]) -> Option<(usize, f64)> {
        let score = |(i, walk): (usize, &Walk)| (OrderedFloat(evaluate_walk(instance, walk)), i);
        let best = if self.config.parallel {
            candidates.par_iter().enumerate().map(score).min()
        } else {
            candidates.iter().enumerate().map(score).min()
        };
        best.map(|(cost, i)| (i, cost.0))
    }

    /// Improve the walk `seed`, returning the best solution found
    pub fn run(&self, instance: &TaInstance, seed: &[usize]) -> LocalSearchReport {
        let start = Instant::now();
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);

        let mut current = Solution::from_walk(instance, seed.to_vec(), self.name());
        let mut best = current.clone();
        let mut epsilon = self.config.epsilon;
        let mut iterations = 0;

        let termination = loop {
            if iterations >= self.config.max_iterations {
                log::warn!("local search stopped after {} iterations", iterations);
                break Termination::IterationLimit;
            }
            if start.elapsed().as_secs_f64() >= self.config.time_limit {
                log::warn!("local search hit its {:.1}s time limit", self.config.time_limit);
                break Termination::TimeLimit;
            }

            let mut candidates = neighbors(instance, &current.walk);
            if candidates.is_empty() {
                break Termination::NoNeighbors;
            }
            iterations += 1;

            if epsilon > 0.0 && rng.gen::<f64>() < epsilon {
                let pick = rng.gen_range(0..candidates.len());
                current = Solution::from_walk(instance, candidates.swap_remove(pick), self.name());
                log::debug!(
                    "iteration {}: random neighbor (epsilon {:.4}), cost {:.4}",
                    iterations,
                    epsilon,
                    current.cost
                );
            } else {
                match self.best_neighbor(instance, &candidates) {
                    Some((idx, cost)) if cost < current.cost - EPSILON => {
                        current = Solution::from_walk(instance, candidates.swap_remove(idx), self.name());
                        log::debug!("iteration {}: improved cost {:.4}", iterations, current.cost);
                    }
                    _ => break Termination::LocalOptimum,
                }
            }

            if current.cost < best.cost - EPSILON {
                best = current.clone();
            }
            epsilon *= self.config.epsilon_decay;
        };

        best.iterations = Some(iterations);
        best.computation_time = start.elapsed().as_secs_f64();
        log::info!(
            "local search: {:?} after {} iterations, cost {:.4}",
            termination,
            iterations,
            best.cost
        );

        LocalSearchReport {
            solution: best,
            iterations,
            termination,
        }
    }
}

impl Default for OneChangeSearch {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalSearch for OneChangeSearch {
    fn improve(&self, instance: &TaInstance, solution: &mut Solution) -> bool {
        let report = self.run(instance, &solution.walk);
        let improved = report.solution.cost < solution.cost - EPSILON;
        *solution = report.solution;
        improved
    }

    fn name(&self) -> &str {
        "LocalSearch"
    }
}
