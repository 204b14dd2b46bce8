//! Benchmarking and experimentation module for TA pickup.
//!
//! Provides tools for running experiments, collecting statistics,
//! and comparing algorithm performance.

use crate::config::SolverConfig;
use crate::graph::EPSILON;
use crate::heuristics::construction::*;
use crate::heuristics::local_search::*;
use crate::instance::TaInstance;
use crate::error::Result;
use crate::solution::Solution;
use crate::solver::TaPickupSolver;

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Result of running a single algorithm on an instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlgorithmResult {
    /// Algorithm name
    pub algorithm: String,
    /// Instance name
    pub instance: String,
    pub num_vertices: usize,
    pub num_homes: usize,
    /// Scaled objective
    pub cost: f64,
    pub driving_cost: f64,
    pub walking_cost: f64,
    /// Whether the solution passed structural validation
    pub valid: bool,
    /// Computation time in seconds
    pub time: f64,
    /// Number of iterations (if applicable)
    pub iterations: Option<usize>,
    /// Gap to best known, in percent
    pub gap_to_best: Option<f64>,
}

/// Aggregated statistics for an algorithm
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlgorithmStatistics {
    pub algorithm: String,
    /// Number of recorded runs
    pub num_runs: usize,
    pub num_valid: usize,
    pub avg_cost: f64,
    pub best_cost: f64,
    pub worst_cost: f64,
    /// Population standard deviation of cost
    pub std_cost: f64,
    pub avg_time: f64,
    pub total_time: f64,
    pub avg_gap: Option<f64>,
}

/// Benchmark configuration
#[derive(Debug, Clone)]
pub struct BenchmarkConfig {
    /// Number of pipeline runs per instance, one seed each
    pub num_runs: usize,
    /// Settings used by every solver run
    pub solver: SolverConfig,
    /// Output directory
    pub output_dir: String,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        BenchmarkConfig {
            num_runs: 5,
            solver: SolverConfig::default(),
            output_dir: "results".to_string(),
        }
    }
}

/// Benchmarking engine
pub struct Benchmark {
    config: BenchmarkConfig,
    results: Vec<AlgorithmResult>,
    best_known: HashMap<String, f64>,
}

impl Benchmark {
    pub fn new(config: BenchmarkConfig) -> Self {
        Benchmark {
            config,
            results: Vec::new(),
            best_known: HashMap::new(),
        }
    }

    /// Set best known solution for an instance
    pub fn set_best_known(&mut self, instance_name: &str, cost: f64) {
        self.best_known.insert(instance_name.to_string(), cost);
    }

    /// Constructive heuristics, including the unpruned MST tour
    fn all_constructions(&self) -> Vec<Box<dyn ConstructionHeuristic + Send + Sync>> {
        let facility = self.config.solver.construction.facility;
        vec![
            Box::new(MstDfsHeuristic::new()),
            Box::new(MstDfsHeuristic::full()),
            Box::new(FacilityLocationHeuristic::with_config(FacilityLocationVariant::Static, facility)),
            Box::new(FacilityLocationHeuristic::with_config(
                FacilityLocationVariant::DiscountSelected,
                facility,
            )),
            Box::new(FacilityLocationHeuristic::with_config(
                FacilityLocationVariant::ProximityToSelected,
                facility,
            )),
            Box::new(GreedyNearestHomeHeuristic::new()),
        ]
    }

    /// Run all construction heuristics on an instance, returning their solutions
    pub fn run_construction_heuristics(&mut self, instance: &TaInstance) -> Result<Vec<Solution>> {
        let mut solutions = Vec::new();
        for heuristic in self.all_constructions() {
            let solution = heuristic.construct(instance)?;
            self.record_result(instance, &solution);
            solutions.push(solution);
        }
        Ok(solutions)
    }

    /// Improve every constructive solution with local search
    pub fn run_local_search(&mut self, instance: &TaInstance, initial: &[Solution]) {
        let search = OneChangeSearch::with_config(self.config.solver.local_search);
        for seed in initial {
            let mut solution = seed.clone();
            search.improve(instance, &mut solution);
            solution.algorithm = format!("{} + LocalSearch", seed.algorithm);
            self.record_result(instance, &solution);
        }
    }

    /// Run the full pipeline once per seed
    pub fn run_pipeline(&mut self, instance: &TaInstance) -> Result<()> {
        for seed in 0..self.config.num_runs {
            let mut config = self.config.solver;
            config.local_search.seed = seed as u64;
            let mut solution = TaPickupSolver::new(config).solve(instance)?;
            solution.algorithm = "Pipeline".to_string();
            self.record_result(instance, &solution);
        }
        Ok(())
    }

    /// Run full benchmark on an instance
    pub fn run_full_benchmark(&mut self, instance: &TaInstance) -> Result<()> {
        log::info!("Running benchmark on instance: {}", instance.name);

        let mut rescored = instance.clone();
        rescored.cost = self.config.solver.cost;

        let constructed = self.run_construction_heuristics(&rescored)?;
        self.run_local_search(&rescored, &constructed);
        self.run_pipeline(&rescored)?;
        self.update_gaps(&rescored.name);
        Ok(())
    }

    /// Recompute gaps for one instance against its best known cost, taking
    /// the best recorded cost when none was set.
    fn update_gaps(&mut self, instance_name: &str) {
        let found = self
            .results
            .iter()
            .filter(|r| r.instance == instance_name && r.valid)
            .map(|r| r.cost)
            .fold(f64::INFINITY, f64::min);
        let best = self
            .best_known
            .get(instance_name)
            .map_or(found, |&known| known.min(found));
        if !best.is_finite() {
            return;
        }
        self.best_known.insert(instance_name.to_string(), best);

        for result in self.results.iter_mut().filter(|r| r.instance == instance_name) {
            result.gap_to_best = if best > EPSILON {
                Some((result.cost - best) / best * 100.0)
            } else {
                None
            };
        }
    }

    /// Record a result
    fn record_result(&mut self, instance: &TaInstance, solution: &Solution) {
        self.results.push(AlgorithmResult {
            algorithm: solution.algorithm.clone(),
            instance: instance.name.clone(),
            num_vertices: instance.num_vertices(),
            num_homes: instance.homes.len(),
            cost: solution.cost,
            driving_cost: solution.driving_cost,
            walking_cost: solution.walking_cost,
            valid: solution.is_valid(instance),
            time: solution.computation_time,
            iterations: solution.iterations,
            gap_to_best: None,
        });
    }

    /// Compute statistics for each algorithm, cheapest average first
    pub fn compute_statistics(&self) -> Vec<AlgorithmStatistics> {
        let mut stats_map: HashMap<&str, Vec<&AlgorithmResult>> = HashMap::new();
        for result in &self.results {
            stats_map.entry(result.algorithm.as_str()).or_default().push(result);
        }

        let mut statistics = Vec::new();
        for (algo, results) in stats_map {
            let valid: Vec<&AlgorithmResult> = results.iter().copied().filter(|r| r.valid).collect();
            if valid.is_empty() {
                continue;
            }

            let costs: Vec<f64> = valid.iter().map(|r| r.cost).collect();
            let times: Vec<f64> = valid.iter().map(|r| r.time).collect();
            let gaps: Vec<f64> = valid.iter().filter_map(|r| r.gap_to_best).collect();

            statistics.push(AlgorithmStatistics {
                algorithm: algo.to_string(),
                num_runs: results.len(),
                num_valid: valid.len(),
                avg_cost: costs.iter().mean(),
                best_cost: costs.iter().cloned().fold(f64::INFINITY, f64::min),
                worst_cost: costs.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
                std_cost: costs.iter().population_std_dev(),
                avg_time: times.iter().mean(),
                total_time: times.iter().sum(),
                avg_gap: if gaps.is_empty() { None } else { Some(gaps.iter().mean()) },
            });
        }

        statistics.sort_by(|a, b| {
            a.avg_cost
                .total_cmp(&b.avg_cost)
                .then_with(|| a.algorithm.cmp(&b.algorithm))
        });
        statistics
    }

    /// Export results to CSV
    pub fn export_to_csv<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let file = File::create(path)?;
        let mut writer = csv::Writer::from_writer(file);
        for result in &self.results {
            writer.serialize(result)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Export statistics to CSV
    pub fn export_statistics_csv<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let file = File::create(path)?;
        let mut writer = csv::Writer::from_writer(file);
        for stat in self.compute_statistics() {
            writer.serialize(stat)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Generate summary report
    pub fn generate_report(&self) -> String {
        let mut report = String::new();

        report.push_str("========================================\n");
        report.push_str("       TA Pickup Benchmark Report\n");
        report.push_str("========================================\n");
        report.push_str(&format!(
            "Generated: {}\n\n",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        ));

        report.push_str("Algorithm Performance Summary:\n");
        report.push_str("-".repeat(90).as_str());
        report.push('\n');
        report.push_str(&format!(
            "{:<35} {:>8} {:>12} {:>12} {:>10} {:>10}\n",
            "Algorithm", "Valid", "Avg Cost", "Best Cost", "Avg Gap%", "Avg Time"
        ));
        report.push_str("-".repeat(90).as_str());
        report.push('\n');

        for stat in &self.compute_statistics() {
            let gap_str = stat
                .avg_gap
                .map(|g| format!("{:.2}%", g))
                .unwrap_or_else(|| "-".to_string());

            report.push_str(&format!(
                "{:<35} {:>8} {:>12.2} {:>12.2} {:>10} {:>10.4}\n",
                stat.algorithm,
                format!("{}/{}", stat.num_valid, stat.num_runs),
                stat.avg_cost,
                stat.best_cost,
                gap_str,
                stat.avg_time
            ));
        }

        report.push_str("-".repeat(90).as_str());
        report.push('\n');

        report.push_str("\nBest Solutions per Instance:\n");
        let mut instance_best: HashMap<&str, &AlgorithmResult> = HashMap::new();
        for result in self.results.iter().filter(|r| r.valid) {
            let entry = instance_best.entry(result.instance.as_str()).or_insert(result);
            if result.cost < entry.cost {
                *entry = result;
            }
        }

        let mut names: Vec<&&str> = instance_best.keys().collect();
        names.sort();
        for name in names {
            let best = instance_best[*name];
            report.push_str(&format!("  {}: {:.2} ({})\n", name, best.cost, best.algorithm));
        }

        report
    }

    /// Get all results
    pub fn results(&self) -> &[AlgorithmResult] {
        &self.results
    }

    /// Get best known values
    pub fn best_known(&self) -> &HashMap<String, f64> {
        &self.best_known
    }
}

/// Every `*.in` file in a directory, sorted by path
pub fn instance_files<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.extension().map(|e| e == "in").unwrap_or(false))
        .collect();
    files.sort();
    Ok(files)
}

/// Helper function to load instances from a directory; unreadable files are
/// skipped with a warning.
pub fn load_instances_from_dir<P: AsRef<Path>>(dir: P) -> Vec<TaInstance> {
    let files = match instance_files(dir) {
        Ok(files) => files,
        Err(e) => {
            log::warn!("cannot list instances: {}", e);
            return Vec::new();
        }
    };

    let mut instances: Vec<TaInstance> = files
        .iter()
        .filter_map(|path| match TaInstance::from_file(path) {
            Ok(instance) => Some(instance),
            Err(e) => {
                log::warn!("skipping {}: {}", path.display(), e);
                None
            }
        })
        .collect();

    // Sort by size
    instances.sort_by_key(|i| i.num_vertices());
    instances
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMALL: &str = "4\n2\nSoda Dwinelle Wheeler Campanile\nDwinelle Campanile\nSoda\n\
x 1 x 4\n1 x 2 x\nx 2 x 3\n4 x 3 x\n";

    fn quick_config() -> BenchmarkConfig {
        let mut solver = SolverConfig::default();
        solver.construction.parallel = false;
        solver.local_search.parallel = false;
        BenchmarkConfig {
            num_runs: 2,
            solver,
            output_dir: "results".to_string(),
        }
    }

    #[test]
    fn test_benchmark_config() {
        let config = BenchmarkConfig::default();
        assert_eq!(config.num_runs, 5);
    }

    #[test]
    fn test_full_benchmark_records_every_run() {
        let instance = TaInstance::parse("small", SMALL).unwrap();
        let mut benchmark = Benchmark::new(quick_config());
        benchmark.run_full_benchmark(&instance).unwrap();

        // 6 constructions, 6 improved, 2 pipeline runs
        assert_eq!(benchmark.results().len(), 14);
        assert!(benchmark.results().iter().all(|r| r.valid));
        assert!(benchmark.results().iter().all(|r| r.gap_to_best.map_or(false, |g| g >= -1e-9)));

        let best = benchmark.best_known()["small"];
        let cost_of = |name: &str| {
            benchmark
                .results()
                .iter()
                .find(|r| r.algorithm == name)
                .map(|r| r.cost)
                .unwrap()
        };
        assert!(cost_of("Pipeline") >= best - 1e-9);
        assert!(cost_of("Pipeline") <= cost_of("GreedyNearestHome") + 1e-9);
        assert!(cost_of("Pipeline") <= cost_of("MST-DFS") + 1e-9);
    }

    #[test]
    fn test_statistics_group_runs() {
        let instance = TaInstance::parse("small", SMALL).unwrap();
        let mut benchmark = Benchmark::new(quick_config());
        benchmark.run_pipeline(&instance).unwrap();

        let stats = benchmark.compute_statistics();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].algorithm, "Pipeline");
        assert_eq!(stats[0].num_runs, 2);
        // deterministic without exploration
        assert!(stats[0].std_cost.abs() < 1e-9);
        assert_eq!(stats[0].best_cost, stats[0].worst_cost);
    }

    #[test]
    fn test_report_and_csv() {
        let instance = TaInstance::parse("small", SMALL).unwrap();
        let mut benchmark = Benchmark::new(quick_config());
        benchmark.run_full_benchmark(&instance).unwrap();

        let report = benchmark.generate_report();
        assert!(report.contains("Best Solutions per Instance"));
        assert!(report.contains("small:"));

        let dir = std::env::temp_dir().join(format!("ta-pickup-bench-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("results.csv");
        benchmark.export_to_csv(&path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("algorithm,instance,"));
        assert_eq!(content.lines().count(), 15);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_instance_files_only_lists_inputs() {
        let dir = std::env::temp_dir().join(format!("ta-pickup-files-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("b.in"), SMALL).unwrap();
        std::fs::write(dir.join("a.in"), SMALL).unwrap();
        std::fs::write(dir.join("a.out"), "").unwrap();

        let files = instance_files(&dir).unwrap();
        let names: Vec<_> = files.iter().filter_map(|p| p.file_name()).collect();
        assert_eq!(names, vec!["a.in", "b.in"]);
        assert_eq!(load_instances_from_dir(&dir).len(), 2);
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
