//! Module for parsing and representing TA pickup instances.
//!
//! The input format is line based:
//!
//! ```text
//! <num_vertices>
//! <num_homes>
//! <vertex names>
//! <home names>
//! <source name>
//! <num_vertices adjacency rows, weight or 'x' per entry>
//! ```
//!
//! All-pairs shortest paths are computed once when the instance is built and
//! shared read-only by every solver afterwards.

use crate::cost::{self, CostBreakdown, CostConfig};
use crate::distances::AllPairsDistances;
use crate::error::{Result, SolverError};
use crate::graph::Graph;
use crate::solution::DropoffAssignment;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::Path;

/// Marker used in adjacency rows for a missing edge
pub const NO_EDGE: &str = "x";

/// Name -> index map; location names must be unique
fn index_locations(locations: &[String]) -> Result<HashMap<String, usize>> {
    let mut name_index = HashMap::with_capacity(locations.len());
    for (i, loc) in locations.iter().enumerate() {
        if name_index.insert(loc.clone(), i).is_some() {
            return Err(SolverError::malformed(format!("duplicate location name '{}'", loc)));
        }
    }
    Ok(name_index)
}

/// A complete TA pickup instance
#[derive(Debug, Clone)]
pub struct TaInstance {
    /// Name of the instance (file stem when loaded from disk)
    pub name: String,
    /// Location names, index i names vertex i
    pub locations: Vec<String>,
    /// Home vertex indices, ascending and unique
    pub homes: Vec<usize>,
    /// Start and end of the car walk
    pub source: usize,
    pub graph: Graph,
    pub distances: AllPairsDistances,
    /// Objective weights used by every evaluation on this instance
    pub cost: CostConfig,
    name_index: HashMap<String, usize>,
}

impl TaInstance {
    /// Build an instance from an already indexed graph.
    ///
    /// Fails with `DisconnectedGraph` if some vertex cannot be reached.
    pub fn new(
        name: &str,
        locations: Vec<String>,
        homes: Vec<usize>,
        source: usize,
        graph: Graph,
    ) -> Result<Self> {
        let n = graph.num_vertices();
        if locations.len() != n {
            return Err(SolverError::malformed(format!(
                "{} location names for {} vertices",
                locations.len(),
                n
            )));
        }
        if source >= n {
            return Err(SolverError::malformed(format!("source {} out of range", source)));
        }
        if let Some(&h) = homes.iter().find(|&&h| h >= n) {
            return Err(SolverError::malformed(format!("home {} out of range", h)));
        }

        let name_index = index_locations(&locations)?;

        let homes: Vec<usize> = homes.into_iter().collect::<BTreeSet<_>>().into_iter().collect();

        let distances = AllPairsDistances::compute(&graph);
        distances.ensure_connected()?;
        if !graph.is_metric(&distances) {
            log::warn!("instance {} does not satisfy the triangle inequality", name);
        }

        Ok(TaInstance {
            name: name.to_string(),
            locations,
            homes,
            source,
            graph,
            distances,
            cost: CostConfig::default(),
            name_index,
        })
    }

    /// Build an instance with generated names `v0..v{n-1}`
    pub fn from_graph(graph: Graph, homes: Vec<usize>, source: usize) -> Result<Self> {
        let locations = (0..graph.num_vertices()).map(|i| format!("v{}", i)).collect();
        Self::new("unnamed", locations, homes, source, graph)
    }

    /// Parse an instance from a file on disk
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        Self::parse(&name, &content)
    }

    /// Parse an instance from the text of an input file
    pub fn parse(name: &str, content: &str) -> Result<Self> {
        let mut lines = content.lines().map(str::trim);
        let mut next_line = |what: &str| {
            lines
                .next()
                .ok_or_else(|| SolverError::malformed(format!("missing {}", what)))
        };

        let num_vertices: usize = next_line("vertex count")?
            .parse()
            .map_err(|_| SolverError::malformed("invalid vertex count"))?;
        let num_homes: usize = next_line("home count")?
            .parse()
            .map_err(|_| SolverError::malformed("invalid home count"))?;

        let locations: Vec<String> = next_line("vertex names")?
            .split_whitespace()
            .map(str::to_string)
            .collect();
        if locations.len() != num_vertices {
            return Err(SolverError::malformed(format!(
                "expected {} vertex names, found {}",
                num_vertices,
                locations.len()
            )));
        }

        let home_names: Vec<&str> = next_line("home names")?.split_whitespace().collect();
        if home_names.len() != num_homes {
            return Err(SolverError::malformed(format!(
                "expected {} home names, found {}",
                num_homes,
                home_names.len()
            )));
        }

        let source_name = next_line("source name")?.to_string();

        let mut rows = Vec::with_capacity(num_vertices);
        for i in 0..num_vertices {
            let line = next_line(&format!("adjacency row {}", i))?;
            rows.push(parse_row(i, line, num_vertices)?);
        }

        if let Some(extra) = lines.find(|l| !l.is_empty()) {
            return Err(SolverError::malformed(format!(
                "unexpected trailing content '{}'",
                extra
            )));
        }

        let name_index = index_locations(&locations)?;
        let lookup = |n: &str| {
            name_index
                .get(n)
                .copied()
                .ok_or_else(|| SolverError::malformed(format!("unknown location '{}'", n)))
        };
        let mut homes = Vec::with_capacity(num_homes);
        for h in &home_names {
            let idx = lookup(h)?;
            if homes.contains(&idx) {
                return Err(SolverError::malformed(format!("home '{}' listed twice", h)));
            }
            homes.push(idx);
        }
        let source = lookup(&source_name)?;

        let graph = Graph::from_adjacency(rows)?;
        Self::new(name, locations, homes, source, graph)
    }

    /// Index of a location name
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.name_index.get(name).copied()
    }

    /// Name of a location index
    pub fn name_of(&self, index: usize) -> &str {
        &self.locations[index]
    }

    #[inline]
    pub fn num_vertices(&self) -> usize {
        self.graph.num_vertices()
    }

    #[inline]
    pub fn distance(&self, i: usize, j: usize) -> f64 {
        self.distances.distance(i, j)
    }

    /// Shortest path between two vertices, both endpoints included
    pub fn shortest_path(&self, from: usize, to: usize) -> Result<Vec<usize>> {
        self.distances.reconstruct_path(from, to)
    }

    /// Cost of a walk with an explicit drop-off assignment
    pub fn evaluate(&self, walk: &[usize], dropoffs: &DropoffAssignment) -> CostBreakdown {
        cost::evaluate(&self.graph, &self.distances, &self.cost, walk, dropoffs)
    }

    /// Optimal drop-off assignment of this instance's homes for a walk
    pub fn assign_optimal_dropoffs(&self, walk: &[usize]) -> DropoffAssignment {
        cost::assign_optimal_dropoffs(&self.distances, walk, &self.homes)
    }

    /// Get statistics about the instance
    pub fn statistics(&self) -> InstanceStatistics {
        let weights: Vec<f64> = self.graph.edges().iter().map(|&(_, _, w)| w).collect();
        let avg_edge_weight = if weights.is_empty() {
            0.0
        } else {
            weights.iter().sum::<f64>() / weights.len() as f64
        };
        let max_edge_weight = weights.iter().cloned().fold(0.0, f64::max);

        let home_distances: Vec<f64> = self
            .homes
            .iter()
            .map(|&h| self.distance(self.source, h))
            .collect();
        let avg_home_distance = if home_distances.is_empty() {
            0.0
        } else {
            home_distances.iter().sum::<f64>() / home_distances.len() as f64
        };
        let max_home_distance = home_distances.iter().cloned().fold(0.0, f64::max);

        let n = self.num_vertices();
        let density = if n > 1 {
            2.0 * self.graph.num_edges() as f64 / (n * (n - 1)) as f64
        } else {
            0.0
        };

        InstanceStatistics {
            name: self.name.clone(),
            num_vertices: n,
            num_edges: self.graph.num_edges(),
            num_homes: self.homes.len(),
            source: self.name_of(self.source).to_string(),
            density,
            metric: self.graph.is_metric(&self.distances),
            avg_edge_weight,
            max_edge_weight,
            avg_home_distance,
            max_home_distance,
        }
    }
}

fn parse_row(row: usize, line: &str, expected: usize) -> Result<Vec<Option<f64>>> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() != expected {
        return Err(SolverError::malformed(format!(
            "adjacency row {} has {} entries, expected {}",
            row,
            tokens.len(),
            expected
        )));
    }

    tokens
        .iter()
        .enumerate()
        .map(|(col, tok)| {
            if *tok == NO_EDGE {
                return Ok(None);
            }
            let weight: f64 = tok.parse().map_err(|_| {
                SolverError::malformed(format!("invalid weight '{}' at ({}, {})", tok, row, col))
            })?;
            if !weight.is_finite() || weight < 0.0 {
                return Err(SolverError::malformed(format!(
                    "negative or non-finite weight '{}' at ({}, {})",
                    tok, row, col
                )));
            }
            Ok(Some(weight))
        })
        .collect()
}

/// Statistics about a TA pickup instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceStatistics {
    pub name: String,
    pub num_vertices: usize,
    pub num_edges: usize,
    pub num_homes: usize,
    pub source: String,
    pub density: f64,
    pub metric: bool,
    pub avg_edge_weight: f64,
    pub max_edge_weight: f64,
    pub avg_home_distance: f64,
    pub max_home_distance: f64,
}

impl std::fmt::Display for InstanceStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Instance: {}", self.name)?;
        writeln!(f, "  Locations: {} ({} edges, density {:.3})", self.num_vertices, self.num_edges, self.density)?;
        writeln!(f, "  Homes: {}", self.num_homes)?;
        writeln!(f, "  Source: {}", self.source)?;
        writeln!(f, "  Metric: {}", self.metric)?;
        writeln!(f, "  Avg edge weight: {:.2}", self.avg_edge_weight)?;
        writeln!(f, "  Max edge weight: {:.2}", self.max_edge_weight)?;
        writeln!(f, "  Avg home distance from source: {:.2}", self.avg_home_distance)?;
        writeln!(f, "  Max home distance from source: {:.2}", self.max_home_distance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMALL: &str = "4\n2\nSoda Dwinelle Wheeler Campanile\nDwinelle Campanile\nSoda\n\
x 1 x 4\n1 x 2 x\nx 2 x 3\n4 x 3 x\n";

    #[test]
    fn test_parse_small_instance() {
        let instance = TaInstance::parse("small", SMALL).unwrap();
        assert_eq!(instance.num_vertices(), 4);
        assert_eq!(instance.homes, vec![1, 3]);
        assert_eq!(instance.source, 0);
        assert_eq!(instance.index_of("Wheeler"), Some(2));
        assert_eq!(instance.name_of(3), "Campanile");
        assert_eq!(instance.distance(1, 3), 5.0);
    }

    #[test]
    fn test_parse_accepts_tabs() {
        let input = "2\n1\na b\nb\na\nx\t2\n2\tx\n";
        let instance = TaInstance::parse("tabs", input).unwrap();
        assert_eq!(instance.graph.edge_weight(0, 1), Some(2.0));
    }

    #[test]
    fn test_parse_empty_home_line() {
        let input = "2\n0\na b\n\na\nx 1\n1 x\n";
        let instance = TaInstance::parse("no-homes", input).unwrap();
        assert!(instance.homes.is_empty());
    }

    #[test]
    fn test_bad_token_is_malformed() {
        let input = "2\n1\na b\nb\na\nx y\n1 x\n";
        assert!(matches!(
            TaInstance::parse("bad", input),
            Err(SolverError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_row_count_mismatch_is_malformed() {
        let input = "3\n1\na b c\nb\na\nx 1 x\n1 x 1\n";
        assert!(matches!(
            TaInstance::parse("short", input),
            Err(SolverError::MalformedInput(_))
        ));
        let input = "2\n1\na b\nb\na\nx 1 x\n1 x\n";
        assert!(TaInstance::parse("wide", input).is_err());
    }

    #[test]
    fn test_unknown_home_is_malformed() {
        let input = "2\n1\na b\nc\na\nx 1\n1 x\n";
        assert!(matches!(
            TaInstance::parse("unknown", input),
            Err(SolverError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_duplicate_location_is_malformed() {
        let input = "2\n1\na a\na\na\nx 1\n1 x\n";
        assert!(matches!(
            TaInstance::parse("dup", input),
            Err(SolverError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_parsed_indices_agree_with_index_of() {
        let instance = TaInstance::parse("small", SMALL).unwrap();
        assert_eq!(instance.index_of("Soda"), Some(instance.source));
        let by_name: Vec<usize> = ["Dwinelle", "Campanile"]
            .iter()
            .filter_map(|n| instance.index_of(n))
            .collect();
        assert_eq!(instance.homes, by_name);
    }

    #[test]
    fn test_disconnected_graph_is_rejected() {
        let input = "3\n1\na b c\nc\na\nx 1 x\n1 x x\nx x x\n";
        assert!(matches!(
            TaInstance::parse("disconnected", input),
            Err(SolverError::DisconnectedGraph { .. })
        ));
    }

    #[test]
    fn test_statistics() {
        let instance = TaInstance::parse("small", SMALL).unwrap();
        let stats = instance.statistics();
        assert_eq!(stats.num_edges, 4);
        assert_eq!(stats.num_homes, 2);
        assert!(stats.metric);
        assert!((stats.avg_edge_weight - 2.5).abs() < 1e-9);
        assert!((stats.avg_home_distance - 2.5).abs() < 1e-9);
    }
}
