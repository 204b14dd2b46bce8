//! All-pairs shortest paths (Floyd–Warshall) with predecessor reconstruction.

use crate::error::{Result, SolverError};
use crate::graph::{Graph, EPSILON};

/// Shortest-path distances between every pair of vertices.
///
/// `predecessors[i][j]` is the vertex preceding `j` on a shortest path from
/// `i`, or `None` when `i == j` or `j` is unreachable.
#[derive(Debug, Clone)]
pub struct AllPairsDistances {
    distances: Vec<Vec<f64>>,
    predecessors: Vec<Vec<Option<usize>>>,
}

impl AllPairsDistances {
    pub fn compute(graph: &Graph) -> Self {
        let n = graph.num_vertices();
        let mut distances = vec![vec![f64::INFINITY; n]; n];
        let mut predecessors = vec![vec![None; n]; n];

        for i in 0..n {
            distances[i][i] = 0.0;
            for (j, w) in graph.neighbors(i) {
                distances[i][j] = w;
                predecessors[i][j] = Some(i);
            }
        }

        for k in 0..n {
            for i in 0..n {
                let d_ik = distances[i][k];
                if !d_ik.is_finite() {
                    continue;
                }
                for j in 0..n {
                    let through = d_ik + distances[k][j];
                    if through + EPSILON < distances[i][j] {
                        distances[i][j] = through;
                        predecessors[i][j] = predecessors[k][j];
                    }
                }
            }
        }

        AllPairsDistances {
            distances,
            predecessors,
        }
    }

    #[inline]
    pub fn distance(&self, from: usize, to: usize) -> f64 {
        self.distances[from][to]
    }

    #[inline]
    pub fn num_vertices(&self) -> usize {
        self.distances.len()
    }

    /// Fails on the first unreachable pair
    pub fn ensure_connected(&self) -> Result<()> {
        let n = self.num_vertices();
        for from in 0..n {
            for to in 0..n {
                if !self.distances[from][to].is_finite() {
                    return Err(SolverError::DisconnectedGraph { from, to });
                }
            }
        }
        Ok(())
    }

    /// Shortest path from `source` to `target`, both endpoints included
    pub fn reconstruct_path(&self, source: usize, target: usize) -> Result<Vec<usize>> {
        if source == target {
            return Ok(vec![source]);
        }

        let disconnected = SolverError::DisconnectedGraph {
            from: source,
            to: target,
        };
        let mut path = vec![target];
        let mut current = target;
        // A path never has more vertices than the graph.
        for _ in 0..self.num_vertices() {
            match self.predecessors[source][current] {
                Some(prev) if prev == source => {
                    path.push(source);
                    path.reverse();
                    return Ok(path);
                }
                Some(prev) => {
                    path.push(prev);
                    current = prev;
                }
                None => return Err(disconnected),
            }
        }
        Err(disconnected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_floyd_warshall_on_cycle() {
        let g = Graph::from_edges(4, &[(0, 1, 1.0), (1, 2, 2.0), (2, 3, 3.0), (3, 0, 4.0)]).unwrap();
        let d = AllPairsDistances::compute(&g);
        assert_eq!(d.distance(0, 2), 3.0);
        assert_eq!(d.distance(1, 3), 5.0);
        assert_eq!(d.distance(3, 3), 0.0);
        assert_eq!(d.reconstruct_path(0, 2).unwrap(), vec![0, 1, 2]);
        assert_eq!(d.reconstruct_path(2, 0).unwrap(), vec![2, 1, 0]);
        assert_eq!(d.reconstruct_path(1, 1).unwrap(), vec![1]);
        assert!(d.ensure_connected().is_ok());
    }

    #[test]
    fn test_shortcut_through_cheaper_path() {
        // Direct edge 0-2 is longer than the detour through 1.
        let g = Graph::from_edges(3, &[(0, 1, 1.0), (1, 2, 1.0), (0, 2, 5.0)]).unwrap();
        let d = AllPairsDistances::compute(&g);
        assert_eq!(d.distance(0, 2), 2.0);
        assert_eq!(d.reconstruct_path(0, 2).unwrap(), vec![0, 1, 2]);
        assert!(!g.is_metric(&d));
    }

    #[test]
    fn test_disconnected_pair() {
        let g = Graph::from_edges(3, &[(0, 1, 1.0)]).unwrap();
        let d = AllPairsDistances::compute(&g);
        assert!(matches!(
            d.reconstruct_path(0, 2),
            Err(SolverError::DisconnectedGraph { from: 0, to: 2 })
        ));
        assert!(d.ensure_connected().is_err());
    }
}
