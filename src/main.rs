//! TA Pickup Solver - Command Line Interface
//!
//! Drives a car from the source, drops every TA off at a stop on the walk and
//! lets them walk home, minimizing scaled driving plus walking distance.

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use ta_pickup_solver::benchmark::{instance_files, load_instances_from_dir, Benchmark, BenchmarkConfig};
use ta_pickup_solver::config::SolverConfig;
use ta_pickup_solver::error::{Result, SolverError};
use ta_pickup_solver::heuristics::construction::*;
use ta_pickup_solver::instance::TaInstance;
use ta_pickup_solver::solution::Solution;
use ta_pickup_solver::solver::TaPickupSolver;

use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Parser)]
#[command(name = "ta-pickup-solver")]
#[command(author = "M2 AI2D Student")]
#[command(version = "1.0")]
#[command(about = "Heuristic solver for the TA pickup problem")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve an input file, or every .in file in a directory
    Solve {
        /// Input file or directory
        input: PathBuf,

        /// Directory receiving the .out files
        output_dir: Option<PathBuf>,

        /// Overrides of the form key=value (e.g. epsilon=0.2)
        params: Vec<String>,

        /// JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Random seed
        #[arg(short, long)]
        seed: Option<u64>,

        /// Local search time limit in seconds
        #[arg(short, long)]
        time_limit: Option<f64>,

        /// Local search iteration limit
        #[arg(long)]
        max_iterations: Option<usize>,

        /// Initial probability of a random local search move
        #[arg(long)]
        epsilon: Option<f64>,

        #[arg(long)]
        driving_factor: Option<f64>,

        #[arg(long)]
        walking_factor: Option<f64>,

        /// Also write each solution as JSON
        #[arg(long)]
        json: bool,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Run benchmarks on a directory of instances
    Benchmark {
        /// Directory containing instance files
        #[arg(short, long)]
        dir: PathBuf,

        /// Output directory for results
        #[arg(short, long, default_value = "results")]
        output: PathBuf,

        /// Number of pipeline runs per instance
        #[arg(short, long, default_value = "5")]
        runs: usize,

        /// JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Maximum instance size
        #[arg(long)]
        max_size: Option<usize>,
    },

    /// Analyze an instance
    Analyze {
        /// Path to the instance file
        input: PathBuf,
    },

    /// Compare algorithms on an instance
    Compare {
        /// Path to the instance file
        input: PathBuf,

        /// Number of runs
        #[arg(short, long, default_value = "5")]
        runs: usize,

        /// Exploration probability for the pipeline runs
        #[arg(long, default_value = "0.0")]
        epsilon: f64,

        /// Output CSV file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Settings taken from `solve` flags, applied on top of the config file
struct Overrides {
    config: Option<PathBuf>,
    seed: Option<u64>,
    time_limit: Option<f64>,
    max_iterations: Option<usize>,
    epsilon: Option<f64>,
    driving_factor: Option<f64>,
    walking_factor: Option<f64>,
    params: Vec<String>,
}

fn main() {
    let cli = Cli::parse();

    let level = match &cli.command {
        Commands::Solve { verbose: true, .. } => "debug",
        _ => "warn",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let outcome = match cli.command {
        Commands::Solve {
            input,
            output_dir,
            mut params,
            config,
            seed,
            time_limit,
            max_iterations,
            epsilon,
            driving_factor,
            walking_factor,
            json,
            verbose,
        } => {
            // a lone key=value lands in the output directory slot
            let output_dir = match output_dir {
                Some(dir) if dir.to_string_lossy().contains('=') => {
                    params.insert(0, dir.to_string_lossy().into_owned());
                    PathBuf::from(".")
                }
                Some(dir) => dir,
                None => PathBuf::from("."),
            };
            let overrides = Overrides {
                config,
                seed,
                time_limit,
                max_iterations,
                epsilon,
                driving_factor,
                walking_factor,
                params,
            };
            solve_command(&input, &output_dir, &overrides, json, verbose)
        }

        Commands::Benchmark {
            dir,
            output,
            runs,
            config,
            max_size,
        } => run_benchmark(&dir, &output, runs, config.as_deref(), max_size),

        Commands::Analyze { input } => analyze_instance(&input),

        Commands::Compare {
            input,
            runs,
            epsilon,
            output,
        } => compare_algorithms(&input, runs, epsilon, output.as_deref()),
    };

    if let Err(e) = outcome {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn build_config(overrides: &Overrides) -> Result<SolverConfig> {
    let mut config = match &overrides.config {
        Some(path) => SolverConfig::from_json_file(path)?,
        None => SolverConfig::default(),
    };

    if let Some(seed) = overrides.seed {
        config.local_search.seed = seed;
    }
    if let Some(time_limit) = overrides.time_limit {
        config.local_search.time_limit = time_limit;
    }
    if let Some(max_iterations) = overrides.max_iterations {
        config.local_search.max_iterations = max_iterations;
    }
    if let Some(epsilon) = overrides.epsilon {
        config.local_search.epsilon = epsilon;
    }
    if let Some(driving_factor) = overrides.driving_factor {
        config.cost.driving_factor = driving_factor;
    }
    if let Some(walking_factor) = overrides.walking_factor {
        config.cost.walking_factor = walking_factor;
    }
    for param in &overrides.params {
        config.apply_param(param)?;
    }

    config.validate()?;
    Ok(config)
}

fn progress_bar(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::with_template("[{elapsed_precise}] {bar:40} {pos}/{len} {msg}") {
        pb.set_style(style.progress_chars("=>-"));
    }
    pb
}

fn load_instance(path: &Path, config: &SolverConfig) -> Result<TaInstance> {
    let mut instance = TaInstance::from_file(path)?;
    instance.cost = config.cost;
    Ok(instance)
}

fn solve_command(
    input: &Path,
    output_dir: &Path,
    overrides: &Overrides,
    json: bool,
    verbose: bool,
) -> Result<()> {
    let config = build_config(overrides)?;
    let solver = TaPickupSolver::new(config);
    std::fs::create_dir_all(output_dir)?;

    if !input.is_dir() {
        let solution = solve_file(input, output_dir, &solver, json, verbose)?;
        println!("\n========== Results ==========");
        println!("{}", solution);
        return Ok(());
    }

    let files = instance_files(input)?;
    println!("Found {} instances in {:?}", files.len(), input);

    let pb = progress_bar(files.len());
    let mut failures = 0;
    for path in &files {
        pb.set_message(path.display().to_string());
        match solve_file(path, output_dir, &solver, json, false) {
            Ok(solution) => pb.println(format!(
                "{}: cost {:.4} ({:.2}s)",
                path.display(),
                solution.cost,
                solution.computation_time
            )),
            Err(e) => {
                failures += 1;
                pb.println(format!("{}: FAILED ({})", path.display(), e));
            }
        }
        pb.inc(1);
    }
    pb.finish_with_message("done");

    println!("Solved {}/{} instances", files.len() - failures, files.len());
    batch_outcome(failures, files.len())
}

/// A directory run fails as a whole when any of its files failed
fn batch_outcome(failed: usize, total: usize) -> Result<()> {
    if failed > 0 {
        return Err(SolverError::BatchFailed { failed, total });
    }
    Ok(())
}

/// Solve one file and write `<stem>.out` (and `<stem>.json`) into `output_dir`
fn solve_file(
    path: &Path,
    output_dir: &Path,
    solver: &TaPickupSolver,
    json: bool,
    verbose: bool,
) -> Result<Solution> {
    let instance = load_instance(path, &solver.config)?;
    if verbose {
        println!("{}", instance.statistics());
    }

    let report = solver.solve_with_report(&instance)?;
    if verbose {
        println!("Constructive candidates:");
        for (algorithm, cost) in &report.candidates {
            println!("  {:<20} {:>12.4}", algorithm, cost);
        }
        println!("Seed: {} ({:.4})", report.seed_algorithm, report.seed_cost);
        if let Some(termination) = report.termination {
            println!("Local search stopped: {:?}", termination);
        }
    }

    let solution = report.solution;
    for problem in solution.violations(&instance) {
        log::error!("{}: {}", instance.name, problem);
    }

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| instance.name.clone());
    solution.write_output(&instance, output_dir.join(format!("{}.out", stem)))?;
    if json {
        let content = serde_json::to_string_pretty(&solution).map_err(std::io::Error::from)?;
        std::fs::write(output_dir.join(format!("{}.json", stem)), content)?;
    }
    Ok(solution)
}

fn run_benchmark(
    dir: &Path,
    output: &Path,
    runs: usize,
    config: Option<&Path>,
    max_size: Option<usize>,
) -> Result<()> {
    let solver = match config {
        Some(path) => SolverConfig::from_json_file(path)?,
        None => SolverConfig::default(),
    };
    solver.validate()?;

    println!("Loading instances from {:?}...", dir);
    let mut instances = load_instances_from_dir(dir);
    if let Some(max) = max_size {
        instances.retain(|i| i.num_vertices() <= max);
    }
    println!("Found {} instances", instances.len());
    if instances.is_empty() {
        eprintln!("No instances found!");
        return Ok(());
    }

    std::fs::create_dir_all(output)?;
    let mut benchmark = Benchmark::new(BenchmarkConfig {
        num_runs: runs,
        solver,
        output_dir: output.to_string_lossy().to_string(),
    });

    let pb = progress_bar(instances.len());
    for instance in &instances {
        pb.set_message(format!("{} (n={})", instance.name, instance.num_vertices()));
        if let Err(e) = benchmark.run_full_benchmark(instance) {
            pb.println(format!("{}: FAILED ({})", instance.name, e));
        }
        pb.inc(1);
    }
    pb.finish_with_message("done");

    let results_path = output.join("results.csv");
    benchmark.export_to_csv(&results_path)?;
    println!("\nResults exported to {:?}", results_path);

    let stats_path = output.join("statistics.csv");
    benchmark.export_statistics_csv(&stats_path)?;
    println!("Statistics exported to {:?}", stats_path);

    let report = benchmark.generate_report();
    println!("\n{}", report);
    let report_path = output.join("report.txt");
    std::fs::write(&report_path, &report)?;
    println!("Report saved to {:?}", report_path);
    Ok(())
}

fn analyze_instance(path: &Path) -> Result<()> {
    let instance = TaInstance::from_file(path)?;

    println!("========== Instance Analysis ==========\n");
    println!("{}", instance.statistics());

    let heuristics: Vec<Box<dyn ConstructionHeuristic>> = vec![
        Box::new(MstDfsHeuristic::new()),
        Box::new(MstDfsHeuristic::full()),
        Box::new(FacilityLocationHeuristic::new(FacilityLocationVariant::Static)),
        Box::new(FacilityLocationHeuristic::new(FacilityLocationVariant::DiscountSelected)),
        Box::new(FacilityLocationHeuristic::new(FacilityLocationVariant::ProximityToSelected)),
        Box::new(GreedyNearestHomeHeuristic::new()),
    ];

    println!("\nQuick Solution Estimates:");
    for heuristic in &heuristics {
        let solution = heuristic.construct(&instance)?;
        println!(
            "  {:<20} {:>12.4} (stops: {}, walk length: {})",
            heuristic.name(),
            solution.cost,
            solution.num_stops(),
            solution.walk.len()
        );
    }

    let solution = TaPickupSolver::default().solve(&instance)?;
    println!("  {:<20} {:>12.4}", "Pipeline", solution.cost);
    Ok(())
}

#[derive(Serialize)]
struct CompareRecord<'a> {
    algorithm: &'a str,
    run: usize,
    cost: f64,
    time: f64,
}

fn compare_algorithms(path: &Path, runs: usize, epsilon: f64, output: Option<&Path>) -> Result<()> {
    let instance = TaInstance::from_file(path)?;
    println!(
        "Comparing algorithms on {} (n={}, homes={})...\n",
        instance.name,
        instance.num_vertices(),
        instance.homes.len()
    );

    type Runner = Box<dyn Fn(&TaInstance, u64) -> Result<Solution>>;
    let construction = |h: Box<dyn ConstructionHeuristic>| -> Runner {
        Box::new(move |inst: &TaInstance, _seed: u64| h.construct(inst))
    };
    let algorithms: Vec<(&str, Runner)> = vec![
        ("MST-DFS", construction(Box::new(MstDfsHeuristic::new()))),
        ("MST-DFS-Full", construction(Box::new(MstDfsHeuristic::full()))),
        (
            "FacilityLocation-0",
            construction(Box::new(FacilityLocationHeuristic::new(FacilityLocationVariant::Static))),
        ),
        (
            "FacilityLocation-1",
            construction(Box::new(FacilityLocationHeuristic::new(
                FacilityLocationVariant::DiscountSelected,
            ))),
        ),
        (
            "FacilityLocation-2",
            construction(Box::new(FacilityLocationHeuristic::new(
                FacilityLocationVariant::ProximityToSelected,
            ))),
        ),
        ("GreedyNearestHome", construction(Box::new(GreedyNearestHomeHeuristic::new()))),
        (
            "Pipeline",
            Box::new(move |inst: &TaInstance, seed: u64| {
                let mut config = SolverConfig::default();
                config.local_search.seed = seed;
                config.local_search.epsilon = epsilon;
                TaPickupSolver::new(config).solve(inst)
            }),
        ),
    ];

    let mut results: Vec<(&str, Vec<f64>, Vec<f64>)> = Vec::new();
    for (name, solver) in &algorithms {
        let mut costs = Vec::new();
        let mut times = Vec::new();

        for seed in 0..runs as u64 {
            let start = Instant::now();
            let sol = solver(&instance, seed)?;
            times.push(start.elapsed().as_secs_f64());
            costs.push(sol.cost);
        }
        results.push((*name, costs, times));
    }

    println!("========== Summary ==========");
    println!(
        "{:<20} {:>10} {:>10} {:>10} {:>10}",
        "Algorithm", "Best", "Average", "Worst", "Avg Time"
    );
    println!("{}", "-".repeat(64));

    for (name, costs, times) in &results {
        if costs.is_empty() {
            continue;
        }
        let best = costs.iter().cloned().fold(f64::INFINITY, f64::min);
        let avg = costs.iter().sum::<f64>() / costs.len() as f64;
        let worst = costs.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let avg_time = times.iter().sum::<f64>() / times.len() as f64;
        println!(
            "{:<20} {:>10.2} {:>10.2} {:>10.2} {:>10.4}",
            name, best, avg, worst, avg_time
        );
    }

    if let Some(out_path) = output {
        let mut writer = csv::Writer::from_path(out_path).map_err(std::io::Error::from)?;
        for (name, costs, times) in &results {
            for (run, (&cost, &time)) in costs.iter().zip(times.iter()).enumerate() {
                writer
                    .serialize(CompareRecord {
                        algorithm: name,
                        run,
                        cost,
                        time,
                    })
                    .map_err(std::io::Error::from)?;
            }
        }
        writer.flush()?;
        println!("\nResults exported to {:?}", out_path);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_outcome_reports_failures() {
        assert!(batch_outcome(0, 3).is_ok());
        assert!(matches!(
            batch_outcome(1, 3),
            Err(SolverError::BatchFailed { failed: 1, total: 3 })
        ));
    }
}
