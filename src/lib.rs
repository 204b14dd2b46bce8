//! TA Pickup Solver Library
//!
//! A car leaves a source vertex carrying every TA, drives a closed walk on a
//! weighted graph and drops each TA at some vertex of the walk, from where
//! they walk home. The objective is the scaled driving distance plus the
//! scaled total walking distance.
//!
//! # Features
//!
//! - All-pairs shortest paths with path reconstruction (Floyd-Warshall)
//! - Construction heuristics (MST depth-first tour, three facility-location
//!   variants, greedy nearest home)
//! - Local search over single vertex exclusions and inclusions, with optional
//!   epsilon-greedy exploration and iteration / time budgets
//! - Benchmarking tools
//!
//! # Example
//!
//! ```no_run
//! use ta_pickup_solver::instance::TaInstance;
//! use ta_pickup_solver::solver::TaPickupSolver;
//!
//! let instance = TaInstance::from_file("inputs/50.in").unwrap();
//! let solution = TaPickupSolver::default().solve(&instance).unwrap();
//!
//! println!("Solution cost: {:.2}", solution.cost);
//! print!("{}", solution.to_output_string(&instance));
//! ```

pub mod error;
pub mod graph;
pub mod distances;
pub mod cost;
pub mod instance;
pub mod solution;
pub mod heuristics;
pub mod config;
pub mod solver;
pub mod benchmark;

pub use error::SolverError;
pub use instance::TaInstance;
pub use solution::Solution;
pub use solver::TaPickupSolver;
