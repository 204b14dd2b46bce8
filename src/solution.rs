//! Solution representation for the TA pickup problem.
//!
//! A solution is a closed car walk plus the drop-off assignment of every home
//! to a stop on that walk. Solutions are scored once when created; search
//! moves build new solutions instead of editing existing ones.

use crate::instance::TaInstance;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::path::Path;

/// Vertex sequence of the car, closed at the source
pub type Walk = Vec<usize>;

/// Stop vertex -> homes walking from that stop
pub type DropoffAssignment = BTreeMap<usize, Vec<usize>>;

/// Represents a solution to a TA pickup instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Solution {
    pub walk: Walk,
    pub dropoffs: DropoffAssignment,
    /// Scaled objective value
    pub cost: f64,
    /// Unscaled driving distance
    pub driving_cost: f64,
    /// Unscaled walking distance
    pub walking_cost: f64,
    /// Algorithm that generated this solution
    pub algorithm: String,
    /// Computation time in seconds
    pub computation_time: f64,
    /// Number of iterations (if applicable)
    pub iterations: Option<usize>,
}

impl Solution {
    /// Create a new empty solution
    pub fn new() -> Self {
        Solution {
            walk: Vec::new(),
            dropoffs: DropoffAssignment::new(),
            cost: f64::INFINITY,
            driving_cost: 0.0,
            walking_cost: 0.0,
            algorithm: String::new(),
            computation_time: 0.0,
            iterations: None,
        }
    }

    /// Score a walk with an explicit drop-off assignment
    pub fn with_dropoffs(
        instance: &TaInstance,
        walk: Walk,
        dropoffs: DropoffAssignment,
        algorithm: &str,
    ) -> Self {
        let breakdown = instance.evaluate(&walk, &dropoffs);
        Solution {
            walk,
            dropoffs,
            cost: breakdown.total,
            driving_cost: breakdown.driving,
            walking_cost: breakdown.walking,
            algorithm: algorithm.to_string(),
            computation_time: 0.0,
            iterations: None,
        }
    }

    /// Score a walk, assigning every home to its closest stop
    pub fn from_walk(instance: &TaInstance, walk: Walk, algorithm: &str) -> Self {
        let dropoffs = instance.assign_optimal_dropoffs(&walk);
        Self::with_dropoffs(instance, walk, dropoffs, algorithm)
    }

    /// The car never leaves the source; every home walks from there
    pub fn trivial(instance: &TaInstance, algorithm: &str) -> Self {
        Self::from_walk(instance, vec![instance.source], algorithm)
    }

    /// Distinct vertices on the walk
    pub fn visited(&self) -> BTreeSet<usize> {
        self.walk.iter().copied().collect()
    }

    pub fn num_stops(&self) -> usize {
        self.dropoffs.len()
    }

    /// Structural problems of this solution, empty when it is valid
    pub fn violations(&self, instance: &TaInstance) -> Vec<String> {
        let mut problems = Vec::new();

        match (self.walk.first(), self.walk.last()) {
            (Some(&first), Some(&last)) => {
                if first != instance.source || last != instance.source {
                    problems.push(format!(
                        "walk must start and end at source {}, got {} .. {}",
                        instance.source, first, last
                    ));
                }
            }
            _ => problems.push("walk is empty".to_string()),
        }

        let n = instance.num_vertices();
        if let Some(&v) = self.walk.iter().find(|&&v| v >= n) {
            problems.push(format!("walk vertex {} out of range", v));
            return problems;
        }

        for step in self.walk.windows(2) {
            if !instance.graph.has_edge(step[0], step[1]) {
                problems.push(format!("step {} -> {} is not an edge", step[0], step[1]));
            }
        }

        let visited = self.visited();
        let mut seen = BTreeMap::new();
        for (&stop, homes) in &self.dropoffs {
            if !visited.contains(&stop) {
                problems.push(format!("drop-off stop {} is not on the walk", stop));
            }
            for &home in homes {
                *seen.entry(home).or_insert(0usize) += 1;
            }
        }

        for &home in &instance.homes {
            match seen.remove(&home) {
                None => problems.push(format!("home {} has no drop-off", home)),
                Some(count) if count > 1 => {
                    problems.push(format!("home {} is dropped off {} times", home, count))
                }
                _ => {}
            }
        }
        for (vertex, _) in seen {
            problems.push(format!("vertex {} is dropped off but is not a home", vertex));
        }

        problems
    }

    pub fn is_valid(&self, instance: &TaInstance) -> bool {
        self.violations(instance).is_empty()
    }

    /// Output file text: walk names, stop count, then one line per stop
    pub fn to_output_string(&self, instance: &TaInstance) -> String {
        let mut out = String::new();
        let walk: Vec<&str> = self.walk.iter().map(|&v| instance.name_of(v)).collect();
        out.push_str(&walk.join(" "));
        out.push('\n');

        let _ = writeln!(out, "{}", self.dropoffs.len());
        for (&stop, homes) in &self.dropoffs {
            let mut line = vec![instance.name_of(stop)];
            line.extend(homes.iter().map(|&h| instance.name_of(h)));
            out.push_str(&line.join(" "));
            out.push('\n');
        }
        out
    }

    pub fn write_output<P: AsRef<Path>>(&self, instance: &TaInstance, path: P) -> std::io::Result<()> {
        std::fs::write(path, self.to_output_string(instance))
    }
}

impl Default for Solution {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for Solution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Solution ({})", self.algorithm)?;
        writeln!(f, "  Cost: {:.4}", self.cost)?;
        writeln!(f, "  Driving distance: {:.2}", self.driving_cost)?;
        writeln!(f, "  Walking distance: {:.2}", self.walking_cost)?;
        writeln!(f, "  Stops: {}", self.dropoffs.len())?;
        writeln!(f, "  Time: {:.4}s", self.computation_time)?;
        if let Some(iter) = self.iterations {
            writeln!(f, "  Iterations: {}", iter)?;
        }
        writeln!(f, "  Walk: {:?}", self.walk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMALL: &str = "4\n2\nSoda Dwinelle Wheeler Campanile\nDwinelle Campanile\nSoda\n\
x 1 x 4\n1 x 2 x\nx 2 x 3\n4 x 3 x\n";

    #[test]
    fn test_solution_creation() {
        let sol = Solution::new();
        assert!(sol.walk.is_empty());
        assert_eq!(sol.cost, f64::INFINITY);
    }

    #[test]
    fn test_trivial_solution_walks_everyone_from_source() {
        let instance = TaInstance::parse("small", SMALL).unwrap();
        let sol = Solution::trivial(&instance, "trivial");
        assert_eq!(sol.walk, vec![0]);
        assert_eq!(sol.dropoffs.get(&0), Some(&vec![1, 3]));
        assert_eq!(sol.driving_cost, 0.0);
        assert_eq!(sol.walking_cost, 5.0);
        assert!(sol.is_valid(&instance));
    }

    #[test]
    fn test_violations_are_reported() {
        let instance = TaInstance::parse("small", SMALL).unwrap();
        let mut dropoffs = DropoffAssignment::new();
        dropoffs.insert(2, vec![1, 1]);
        let sol = Solution::with_dropoffs(&instance, vec![0, 2, 0], dropoffs, "broken");
        let problems = sol.violations(&instance);
        assert!(problems.iter().any(|p| p.contains("not an edge")));
        assert!(problems.iter().any(|p| p.contains("home 1 is dropped off 2 times")));
        assert!(problems.iter().any(|p| p.contains("home 3 has no drop-off")));
    }

    #[test]
    fn test_output_uses_location_names() {
        let instance = TaInstance::parse("small", SMALL).unwrap();
        let sol = Solution::from_walk(&instance, vec![0, 1, 0], "test");
        let out = sol.to_output_string(&instance);
        assert_eq!(out, "Soda Dwinelle Soda\n2\nSoda Campanile\nDwinelle Dwinelle\n");

        for token in out.lines().filter(|l| l.parse::<usize>().is_err()).flat_map(str::split_whitespace) {
            assert!(instance.locations.iter().any(|loc| loc == token));
        }
    }
}
