//! Objective function: driving cost along the walk plus walking cost of every
//! home to its drop-off stop, and the optimal drop-off assignment for a walk.

use crate::distances::AllPairsDistances;
use crate::graph::Graph;
use crate::solution::DropoffAssignment;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Weight of one unit of driving distance in the objective
pub const DEFAULT_DRIVING_FACTOR: f64 = 2.0 / 3.0;
/// Weight of one unit of walking distance in the objective
pub const DEFAULT_WALKING_FACTOR: f64 = 1.0;

/// Scaling applied to the two parts of the objective
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostConfig {
    pub driving_factor: f64,
    pub walking_factor: f64,
}

impl Default for CostConfig {
    fn default() -> Self {
        CostConfig {
            driving_factor: DEFAULT_DRIVING_FACTOR,
            walking_factor: DEFAULT_WALKING_FACTOR,
        }
    }
}

/// Unscaled driving and walking distances plus the scaled total
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub driving: f64,
    pub walking: f64,
    pub total: f64,
}

/// Driving distance of a walk. Steps that are not graph edges are charged
/// the shortest-path distance between their endpoints.
pub fn driving_distance(graph: &Graph, distances: &AllPairsDistances, walk: &[usize]) -> f64 {
    walk.windows(2)
        .map(|step| {
            graph
                .edge_weight(step[0], step[1])
                .unwrap_or_else(|| distances.distance(step[0], step[1]))
        })
        .sum()
}

/// Total walking distance of every home to its assigned stop
pub fn walking_distance(distances: &AllPairsDistances, dropoffs: &DropoffAssignment) -> f64 {
    dropoffs
        .iter()
        .flat_map(|(&stop, homes)| homes.iter().map(move |&home| distances.distance(home, stop)))
        .sum()
}

pub fn evaluate(
    graph: &Graph,
    distances: &AllPairsDistances,
    config: &CostConfig,
    walk: &[usize],
    dropoffs: &DropoffAssignment,
) -> CostBreakdown {
    let driving = driving_distance(graph, distances, walk);
    let walking = walking_distance(distances, dropoffs);
    CostBreakdown {
        driving,
        walking,
        total: config.driving_factor * driving + config.walking_factor * walking,
    }
}

/// Send every home to the closest vertex on the walk, lowest index on ties
pub fn assign_optimal_dropoffs(
    distances: &AllPairsDistances,
    walk: &[usize],
    homes: &[usize],
) -> DropoffAssignment {
    let stops: BTreeSet<usize> = walk.iter().copied().collect();
    let mut dropoffs = DropoffAssignment::new();

    for &home in homes {
        let mut best: Option<(usize, f64)> = None;
        for &stop in &stops {
            let d = distances.distance(home, stop);
            if best.map_or(true, |(_, best_d)| d < best_d) {
                best = Some((stop, d));
            }
        }
        if let Some((stop, _)) = best {
            dropoffs.entry(stop).or_insert_with(Vec::new).push(home);
        }
    }

    for homes in dropoffs.values_mut() {
        homes.sort_unstable();
    }
    dropoffs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path_graph() -> (Graph, AllPairsDistances) {
        // 0 -1- 1 -2- 2 -3- 3
        let g = Graph::from_edges(4, &[(0, 1, 1.0), (1, 2, 2.0), (2, 3, 3.0)]).unwrap();
        let d = AllPairsDistances::compute(&g);
        (g, d)
    }

    #[test]
    fn test_driving_uses_distance_for_virtual_steps() {
        let (g, d) = path_graph();
        assert_eq!(driving_distance(&g, &d, &[0, 1, 0]), 2.0);
        // 0 -> 2 is not an edge and is charged 3
        assert_eq!(driving_distance(&g, &d, &[0, 2, 0]), 6.0);
        assert_eq!(driving_distance(&g, &d, &[0]), 0.0);
    }

    #[test]
    fn test_assignment_prefers_lowest_index_on_ties() {
        // 1 is equally far from 0 and 2
        let g = Graph::from_edges(3, &[(0, 1, 1.0), (1, 2, 1.0)]).unwrap();
        let d = AllPairsDistances::compute(&g);
        let dropoffs = assign_optimal_dropoffs(&d, &[2, 0, 2], &[1]);
        assert_eq!(dropoffs.get(&0), Some(&vec![1]));
        assert!(dropoffs.get(&2).is_none());
    }

    #[test]
    fn test_assignment_is_idempotent() {
        let (_, d) = path_graph();
        let walk = [0, 1, 2, 1, 0];
        let homes = [1, 3, 2, 0];
        let first = assign_optimal_dropoffs(&d, &walk, &homes);
        let stops: Vec<usize> = first.keys().copied().collect();
        let second = assign_optimal_dropoffs(&d, &stops, &homes);
        assert_eq!(first, second);
    }

    #[test]
    fn test_cost_ignores_home_order_within_stop() {
        let (g, d) = path_graph();
        let config = CostConfig::default();
        let walk = [0, 1, 0];
        let mut a = DropoffAssignment::new();
        a.insert(1, vec![2, 3]);
        let mut b = DropoffAssignment::new();
        b.insert(1, vec![3, 2]);
        let cost_a = evaluate(&g, &d, &config, &walk, &a);
        let cost_b = evaluate(&g, &d, &config, &walk, &b);
        assert_eq!(cost_a, cost_b);
        assert_eq!(cost_a.driving, 2.0);
        assert_eq!(cost_a.walking, 2.0 + 5.0);
        assert!((cost_a.total - (2.0 * 2.0 / 3.0 + 7.0)).abs() < 1e-9);
    }
}
