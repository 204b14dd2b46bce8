//! End-to-end pipeline: run every constructive heuristic, keep the cheapest
//! and hand its walk to local search.

use crate::config::SolverConfig;
use crate::error::Result;
use crate::heuristics::construction::MultiStartConstruction;
use crate::heuristics::local_search::{OneChangeSearch, Termination};
use crate::instance::TaInstance;
use crate::solution::Solution;
use std::time::Instant;

/// Everything a pipeline run produced
#[derive(Debug, Clone)]
pub struct SolveReport {
    pub solution: Solution,
    /// (algorithm, cost) of every constructive candidate, in run order
    pub candidates: Vec<(String, f64)>,
    /// Algorithm whose walk seeded local search
    pub seed_algorithm: String,
    pub seed_cost: f64,
    /// `None` when local search did not run
    pub termination: Option<Termination>,
}

pub struct TaPickupSolver {
    pub config: SolverConfig,
}

impl TaPickupSolver {
    pub fn new(config: SolverConfig) -> Self {
        TaPickupSolver { config }
    }

    pub fn solve(&self, instance: &TaInstance) -> Result<Solution> {
        Ok(self.solve_with_report(instance)?.solution)
    }

    /// Solutions are scored with this solver's cost weights, whatever the
    /// instance carries.
    pub fn solve_with_report(&self, instance: &TaInstance) -> Result<SolveReport> {
        self.config.validate()?;
        if instance.cost != self.config.cost {
            let mut rescored = instance.clone();
            rescored.cost = self.config.cost;
            return self.run_pipeline(&rescored);
        }
        self.run_pipeline(instance)
    }

    fn run_pipeline(&self, instance: &TaInstance) -> Result<SolveReport> {
        let start = Instant::now();
        log::info!(
            "solving {} ({} vertices, {} homes)",
            instance.name,
            instance.num_vertices(),
            instance.homes.len()
        );

        if instance.homes.is_empty() {
            let mut solution = Solution::trivial(instance, "Trivial");
            solution.computation_time = start.elapsed().as_secs_f64();
            return Ok(SolveReport {
                seed_algorithm: solution.algorithm.clone(),
                seed_cost: solution.cost,
                solution,
                candidates: Vec::new(),
                termination: None,
            });
        }

        let construction = MultiStartConstruction::with_all_heuristics(&self.config.construction);
        let solutions = construction.construct_all(instance)?;
        let candidates: Vec<(String, f64)> = solutions
            .iter()
            .map(|s| (s.algorithm.clone(), s.cost))
            .collect();
        for (algorithm, cost) in &candidates {
            log::info!("  {:<20} cost {:.4}", algorithm, cost);
        }

        let seed = solutions
            .into_iter()
            .reduce(|best, s| if s.cost < best.cost { s } else { best })
            .unwrap_or_else(|| Solution::trivial(instance, "Trivial"));
        log::info!("seeding local search with {} (cost {:.4})", seed.algorithm, seed.cost);

        let search = OneChangeSearch::with_config(self.config.local_search);
        let report = search.run(instance, &seed.walk);

        let mut solution = report.solution;
        solution.algorithm = format!("{}+LocalSearch", seed.algorithm);
        solution.computation_time = start.elapsed().as_secs_f64();
        log::info!(
            "final cost {:.4} after {} local search iterations ({:.3}s)",
            solution.cost,
            report.iterations,
            solution.computation_time
        );

        Ok(SolveReport {
            solution,
            candidates,
            seed_algorithm: seed.algorithm,
            seed_cost: seed.cost,
            termination: Some(report.termination),
        })
    }
}

impl Default for TaPickupSolver {
    fn default() -> Self {
        Self::new(SolverConfig::default())
    }
}
