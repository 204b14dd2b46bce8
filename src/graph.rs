//! Weighted undirected graph over dense vertex indices.
//!
//! The graph is stored as a symmetric adjacency matrix where `None` marks a
//! missing edge. Besides plain accessors it provides the path algorithms the
//! solvers need directly on the graph: Dijkstra with blocked vertices/edges,
//! Yen's k shortest simple paths, and Prim's minimum spanning tree.

use crate::distances::AllPairsDistances;
use crate::error::{Result, SolverError};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

/// Tolerance used when comparing path lengths
pub const EPSILON: f64 = 1e-9;

/// Undirected graph with non-negative edge weights
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Graph {
    adjacency: Vec<Vec<Option<f64>>>,
    num_edges: usize,
}

/// Rooted spanning tree produced by [`Graph::minimum_spanning_tree`]
#[derive(Debug, Clone)]
pub struct SpanningTree {
    pub root: usize,
    pub parent: Vec<Option<usize>>,
    /// Children of every vertex, ascending
    pub children: Vec<Vec<usize>>,
    pub total_weight: f64,
}

impl Graph {
    /// Build a graph from adjacency rows. Diagonal entries are ignored.
    pub fn from_adjacency(rows: Vec<Vec<Option<f64>>>) -> Result<Self> {
        let n = rows.len();
        let mut num_edges = 0;

        for (i, row) in rows.iter().enumerate() {
            if row.len() != n {
                return Err(SolverError::malformed(format!(
                    "adjacency row {} has {} entries, expected {}",
                    i,
                    row.len(),
                    n
                )));
            }
        }

        let mut adjacency = rows;
        for i in 0..n {
            adjacency[i][i] = None;
            for j in i + 1..n {
                match (adjacency[i][j], adjacency[j][i]) {
                    (None, None) => {}
                    (Some(a), Some(b)) if (a - b).abs() <= EPSILON => {
                        if !a.is_finite() || a < 0.0 {
                            return Err(SolverError::malformed(format!(
                                "edge ({}, {}) has invalid weight {}",
                                i, j, a
                            )));
                        }
                        num_edges += 1;
                    }
                    _ => {
                        return Err(SolverError::malformed(format!(
                            "adjacency matrix is not symmetric at ({}, {})",
                            i, j
                        )));
                    }
                }
            }
        }

        Ok(Graph { adjacency, num_edges })
    }

    /// Build a graph from an undirected edge list
    pub fn from_edges(num_vertices: usize, edges: &[(usize, usize, f64)]) -> Result<Self> {
        let mut rows = vec![vec![None; num_vertices]; num_vertices];
        for &(u, v, w) in edges {
            if u >= num_vertices || v >= num_vertices {
                return Err(SolverError::malformed(format!(
                    "edge ({}, {}) references a vertex outside 0..{}",
                    u, v, num_vertices
                )));
            }
            rows[u][v] = Some(w);
            rows[v][u] = Some(w);
        }
        Self::from_adjacency(rows)
    }

    #[inline]
    pub fn num_vertices(&self) -> usize {
        self.adjacency.len()
    }

    #[inline]
    pub fn num_edges(&self) -> usize {
        self.num_edges
    }

    #[inline]
    pub fn edge_weight(&self, u: usize, v: usize) -> Option<f64> {
        self.adjacency[u][v]
    }

    #[inline]
    pub fn has_edge(&self, u: usize, v: usize) -> bool {
        self.adjacency[u][v].is_some()
    }

    /// Neighbors of `u` with their edge weights, by ascending index
    pub fn neighbors(&self, u: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.adjacency[u]
            .iter()
            .enumerate()
            .filter_map(|(v, w)| w.map(|w| (v, w)))
    }

    /// All edges `(u, v, w)` with `u < v`
    pub fn edges(&self) -> Vec<(usize, usize, f64)> {
        let n = self.num_vertices();
        let mut edges = Vec::with_capacity(self.num_edges);
        for u in 0..n {
            for v in u + 1..n {
                if let Some(w) = self.adjacency[u][v] {
                    edges.push((u, v, w));
                }
            }
        }
        edges
    }

    /// Sum of edge weights along `path`, `None` if a step is not an edge
    pub fn path_weight(&self, path: &[usize]) -> Option<f64> {
        path.windows(2)
            .map(|pair| self.edge_weight(pair[0], pair[1]))
            .sum()
    }

    /// True when every edge is itself a shortest path between its endpoints
    pub fn is_metric(&self, distances: &AllPairsDistances) -> bool {
        self.edges()
            .iter()
            .all(|&(u, v, w)| w <= distances.distance(u, v) + EPSILON)
    }

    /// Dijkstra from `source` to `target` ignoring `blocked` vertices and
    /// `blocked_edges` (stored as `(min, max)` pairs).
    pub fn shortest_path_avoiding(
        &self,
        source: usize,
        target: usize,
        blocked: &[bool],
        blocked_edges: &HashSet<(usize, usize)>,
    ) -> Option<(f64, Vec<usize>)> {
        let n = self.num_vertices();
        if blocked[source] || blocked[target] {
            return None;
        }

        let mut dist = vec![f64::INFINITY; n];
        let mut prev: Vec<Option<usize>> = vec![None; n];
        let mut visited = vec![false; n];
        let mut heap = BinaryHeap::with_capacity(n);

        dist[source] = 0.0;
        heap.push(State {
            cost: OrderedFloat(0.0),
            position: source,
        });

        while let Some(State { cost, position }) = heap.pop() {
            if visited[position] || cost.0 > dist[position] {
                continue;
            }
            visited[position] = true;
            if position == target {
                break;
            }

            for (other, weight) in self.neighbors(position) {
                if blocked[other] || visited[other] || blocked_edges.contains(&edge_key(position, other)) {
                    continue;
                }
                let next = cost.0 + weight;
                if next < dist[other] {
                    dist[other] = next;
                    prev[other] = Some(position);
                    heap.push(State {
                        cost: OrderedFloat(next),
                        position: other,
                    });
                }
            }
        }

        if !dist[target].is_finite() {
            return None;
        }

        let mut path = vec![target];
        let mut current = target;
        while let Some(p) = prev[current] {
            path.push(p);
            current = p;
        }
        path.reverse();
        Some((dist[target], path))
    }

    /// Yen's algorithm: up to `k` loopless paths from `source` to `target`,
    /// cheapest first. Equal-cost candidates are ordered lexicographically.
    pub fn k_shortest_simple_paths(&self, source: usize, target: usize, k: usize) -> Vec<Vec<usize>> {
        if k == 0 {
            return Vec::new();
        }
        if source == target {
            return vec![vec![source]];
        }

        let n = self.num_vertices();
        let no_edges = HashSet::new();
        let mut accepted: Vec<(f64, Vec<usize>)> =
            match self.shortest_path_avoiding(source, target, &vec![false; n], &no_edges) {
                Some(first) => vec![first],
                None => return Vec::new(),
            };
        let mut candidates: Vec<(f64, Vec<usize>)> = Vec::new();

        while accepted.len() < k {
            let last = accepted[accepted.len() - 1].1.clone();

            for i in 0..last.len() - 1 {
                let spur = last[i];
                let root = &last[..=i];

                let mut blocked_edges = HashSet::new();
                for (_, path) in &accepted {
                    if path.len() > i + 1 && path[..=i] == *root {
                        blocked_edges.insert(edge_key(path[i], path[i + 1]));
                    }
                }
                let mut blocked = vec![false; n];
                for &v in &root[..i] {
                    blocked[v] = true;
                }

                if let Some((spur_cost, spur_path)) =
                    self.shortest_path_avoiding(spur, target, &blocked, &blocked_edges)
                {
                    let root_cost = self.path_weight(root).unwrap_or(f64::INFINITY);
                    let mut path = root[..i].to_vec();
                    path.extend(spur_path);

                    let known = candidates.iter().any(|(_, c)| *c == path)
                        || accepted.iter().any(|(_, a)| *a == path);
                    if !known {
                        candidates.push((root_cost + spur_cost, path));
                    }
                }
            }

            let best = candidates
                .iter()
                .enumerate()
                .min_by(|(_, a), (_, b)| {
                    OrderedFloat(a.0)
                        .cmp(&OrderedFloat(b.0))
                        .then_with(|| a.1.cmp(&b.1))
                })
                .map(|(idx, _)| idx);

            match best {
                Some(idx) => accepted.push(candidates.swap_remove(idx)),
                None => break,
            }
        }

        accepted.into_iter().map(|(_, path)| path).collect()
    }

    /// Prim's algorithm on the adjacency matrix, rooted at `root`.
    /// Ties are broken by lowest vertex index.
    pub fn minimum_spanning_tree(&self, root: usize) -> Result<SpanningTree> {
        let n = self.num_vertices();
        let mut in_tree = vec![false; n];
        let mut best = vec![f64::INFINITY; n];
        let mut parent: Vec<Option<usize>> = vec![None; n];
        let mut total_weight = 0.0;

        best[root] = 0.0;

        for _ in 0..n {
            let mut next = None;
            let mut next_weight = f64::INFINITY;
            for v in 0..n {
                if !in_tree[v] && best[v] < next_weight {
                    next_weight = best[v];
                    next = Some(v);
                }
            }

            let u = match next {
                Some(u) => u,
                None => {
                    let missing = (0..n).find(|&v| !in_tree[v]).unwrap_or(root);
                    return Err(SolverError::DisconnectedGraph { from: root, to: missing });
                }
            };

            in_tree[u] = true;
            total_weight += next_weight;

            for (v, w) in self.neighbors(u) {
                if !in_tree[v] && w < best[v] {
                    best[v] = w;
                    parent[v] = Some(u);
                }
            }
        }

        let mut children = vec![Vec::new(); n];
        for v in 0..n {
            if let Some(p) = parent[v] {
                children[p].push(v);
            }
        }

        Ok(SpanningTree {
            root,
            parent,
            children,
            total_weight,
        })
    }
}

#[inline]
fn edge_key(u: usize, v: usize) -> (usize, usize) {
    if u < v {
        (u, v)
    } else {
        (v, u)
    }
}

#[derive(Copy, Clone, Eq, PartialEq)]
struct State {
    cost: OrderedFloat<f64>,
    position: usize,
}

// Flip the ordering so the binary heap pops the cheapest state first,
// lowest position on ties.
impl Ord for State {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .cmp(&self.cost)
            .then_with(|| other.position.cmp(&self.position))
    }
}

impl PartialOrd for State {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 0 -1- 1 -2- 2 -3- 3 -4- 0
    fn cycle() -> Graph {
        Graph::from_edges(4, &[(0, 1, 1.0), (1, 2, 2.0), (2, 3, 3.0), (3, 0, 4.0)]).unwrap()
    }

    #[test]
    fn test_rejects_asymmetric_matrix() {
        let rows = vec![vec![None, Some(1.0)], vec![None, None]];
        assert!(matches!(
            Graph::from_adjacency(rows),
            Err(SolverError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_rejects_negative_weight() {
        let rows = vec![vec![None, Some(-1.0)], vec![Some(-1.0), None]];
        assert!(Graph::from_adjacency(rows).is_err());
    }

    #[test]
    fn test_neighbors_and_edges() {
        let g = cycle();
        assert_eq!(g.num_edges(), 4);
        let n0: Vec<usize> = g.neighbors(0).map(|(v, _)| v).collect();
        assert_eq!(n0, vec![1, 3]);
        assert_eq!(g.edge_weight(2, 3), Some(3.0));
        assert_eq!(g.path_weight(&[0, 1, 2]), Some(3.0));
        assert_eq!(g.path_weight(&[0, 2]), None);
    }

    #[test]
    fn test_two_shortest_paths_on_cycle() {
        let g = cycle();
        let paths = g.k_shortest_simple_paths(1, 3, 2);
        assert_eq!(paths.len(), 2);
        // Both directions cost 5; lexicographic order decides.
        assert_eq!(paths[0], vec![1, 0, 3]);
        assert_eq!(paths[1], vec![1, 2, 3]);
    }

    #[test]
    fn test_k_shortest_on_tree_has_single_path() {
        let g = Graph::from_edges(3, &[(0, 1, 1.0), (1, 2, 1.0)]).unwrap();
        let paths = g.k_shortest_simple_paths(0, 2, 2);
        assert_eq!(paths, vec![vec![0, 1, 2]]);
    }

    #[test]
    fn test_minimum_spanning_tree() {
        let g = cycle();
        let tree = g.minimum_spanning_tree(0).unwrap();
        assert!((tree.total_weight - 6.0).abs() < EPSILON);
        assert_eq!(tree.children[0], vec![1]);
        assert_eq!(tree.children[1], vec![2]);
        assert_eq!(tree.children[2], vec![3]);
        assert_eq!(tree.parent[3], Some(2));
    }

    #[test]
    fn test_spanning_tree_of_disconnected_graph_fails() {
        let g = Graph::from_edges(3, &[(0, 1, 1.0)]).unwrap();
        assert!(matches!(
            g.minimum_spanning_tree(0),
            Err(SolverError::DisconnectedGraph { from: 0, to: 2 })
        ));
    }
}
