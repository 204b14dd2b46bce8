//! Construction heuristics for the TA pickup problem.
//!
//! Every heuristic turns an instance into an initial (walk, drop-off)
//! solution:
//! - MST-DFS: depth-first tour of a minimum spanning tree
//! - Facility location: greedy set cover of homes by drop-off stops
//! - Greedy nearest home: drive to the closest unvisited home until done
//!
//! All "nearest" selections break ties by lowest vertex index.

use crate::error::Result;
use crate::graph::SpanningTree;
use crate::instance::TaInstance;
use crate::solution::{DropoffAssignment, Solution, Walk};
use ordered_float::OrderedFloat;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Instant;

pub trait ConstructionHeuristic {
    fn construct(&self, instance: &TaInstance) -> Result<Solution>;
    fn name(&self) -> &str;
}

/// Weight of the source-to-facility driving distance in a candidate's cost
pub const DEFAULT_OPEN_WEIGHT: f64 = 2.0 / 3.0;
/// Weight of the distance to already selected facilities (variant 2)
pub const DEFAULT_PROXIMITY_WEIGHT: f64 = 0.25;

/// Constants of the facility-location heuristic
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FacilityLocationConfig {
    pub open_weight: f64,
    pub proximity_weight: f64,
}

impl Default for FacilityLocationConfig {
    fn default() -> Self {
        FacilityLocationConfig {
            open_weight: DEFAULT_OPEN_WEIGHT,
            proximity_weight: DEFAULT_PROXIMITY_WEIGHT,
        }
    }
}

/// Settings shared by the construction phase
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConstructionConfig {
    /// Skip spanning-tree subtrees that contain no home
    pub prune_mst: bool,
    pub facility: FacilityLocationConfig,
    /// Run the heuristics on the rayon pool
    pub parallel: bool,
}

impl Default for ConstructionConfig {
    fn default() -> Self {
        ConstructionConfig {
            prune_mst: true,
            facility: FacilityLocationConfig::default(),
            parallel: true,
        }
    }
}

/// Append the shortest path from the end of `walk` to `target`
fn extend_walk(instance: &TaInstance, walk: &mut Walk, target: usize) -> Result<()> {
    let from = walk[walk.len() - 1];
    let path = instance.shortest_path(from, target)?;
    walk.extend_from_slice(&path[1..]);
    Ok(())
}

/// Closest candidate to `from`, lowest index on ties
fn nearest(instance: &TaInstance, from: usize, candidates: &BTreeSet<usize>) -> Option<usize> {
    candidates
        .iter()
        .copied()
        .min_by_key(|&c| (OrderedFloat(instance.distance(from, c)), c))
}

/// MST-DFS Heuristic
///
/// Tours a minimum spanning tree depth-first from the source, driving down
/// and back along every tree edge. Each home is dropped off at its own door.
/// `new()` prunes subtrees without homes, touring only the tree spanning the
/// source and the homes; `full()` is the classic tour of every vertex.
pub struct MstDfsHeuristic {
    /// Only enter subtrees that contain a home
    pub prune: bool,
}

impl MstDfsHeuristic {
    pub fn new() -> Self {
        MstDfsHeuristic { prune: true }
    }

    /// Tour every vertex of the tree
    pub fn full() -> Self {
        MstDfsHeuristic { prune: false }
    }

    fn subtrees_with_homes(tree: &SpanningTree, homes: &[usize]) -> Vec<bool> {
        let n = tree.children.len();
        let mut has_home = vec![false; n];
        for &h in homes {
            has_home[h] = true;
        }

        let mut order = Vec::with_capacity(n);
        let mut stack = vec![tree.root];
        while let Some(v) = stack.pop() {
            order.push(v);
            stack.extend(tree.children[v].iter().copied());
        }
        for &v in order.iter().rev() {
            if let Some(p) = tree.parent[v] {
                if has_home[v] {
                    has_home[p] = true;
                }
            }
        }
        has_home
    }

    /// Depth-first tour with an explicit stack of (vertex, next child) frames
    fn tour(tree: &SpanningTree, include: &[bool]) -> Walk {
        let mut walk = vec![tree.root];
        let mut stack: Vec<(usize, usize)> = vec![(tree.root, 0)];

        while let Some(&(v, next_child)) = stack.last() {
            let children = &tree.children[v];
            if next_child < children.len() {
                if let Some(top) = stack.last_mut() {
                    top.1 += 1;
                }
                let child = children[next_child];
                if include[child] {
                    walk.push(child);
                    stack.push((child, 0));
                }
            } else {
                stack.pop();
                if let Some(&(parent, _)) = stack.last() {
                    walk.push(parent);
                }
            }
        }
        walk
    }
}

impl Default for MstDfsHeuristic {
    fn default() -> Self {
        Self::new()
    }
}

impl ConstructionHeuristic for MstDfsHeuristic {
    fn construct(&self, instance: &TaInstance) -> Result<Solution> {
        let start = Instant::now();
        if instance.homes.is_empty() {
            return Ok(Solution::trivial(instance, self.name()));
        }

        let tree = instance.graph.minimum_spanning_tree(instance.source)?;
        let include = if self.prune {
            Self::subtrees_with_homes(&tree, &instance.homes)
        } else {
            vec![true; instance.num_vertices()]
        };
        let walk = Self::tour(&tree, &include);

        let dropoffs: DropoffAssignment = instance.homes.iter().map(|&h| (h, vec![h])).collect();

        let mut solution = Solution::with_dropoffs(instance, walk, dropoffs, self.name());
        solution.computation_time = start.elapsed().as_secs_f64();
        Ok(solution)
    }

    fn name(&self) -> &str {
        if self.prune {
            "MST-DFS"
        } else {
            "MST-DFS-Full"
        }
    }
}

/// How candidate costs are updated after each facility selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FacilityLocationVariant {
    /// Costs never change
    Static,
    /// Candidates at selected facilities lose the opening distance every round
    DiscountSelected,
    /// Unselected facilities are re-costed by their distance to selected ones
    ProximityToSelected,
}

impl FacilityLocationVariant {
    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(FacilityLocationVariant::Static),
            1 => Some(FacilityLocationVariant::DiscountSelected),
            2 => Some(FacilityLocationVariant::ProximityToSelected),
            _ => None,
        }
    }

    pub fn index(&self) -> usize {
        match self {
            FacilityLocationVariant::Static => 0,
            FacilityLocationVariant::DiscountSelected => 1,
            FacilityLocationVariant::ProximityToSelected => 2,
        }
    }
}

/// A facility serving its `homes.len()` closest homes
#[derive(Debug, Clone)]
struct Candidate {
    facility: usize,
    homes: Vec<usize>,
    cost: f64,
}

/// Facility-Location Heuristic
///
/// Treats drop-off stops as facilities and greedily covers the homes with
/// the candidate (facility, closest homes) set of best cost per newly
/// covered home. The selected facilities are then toured nearest-first.
pub struct FacilityLocationHeuristic {
    pub variant: FacilityLocationVariant,
    pub config: FacilityLocationConfig,
    name: String,
}

impl FacilityLocationHeuristic {
    pub fn new(variant: FacilityLocationVariant) -> Self {
        Self::with_config(variant, FacilityLocationConfig::default())
    }

    pub fn with_config(variant: FacilityLocationVariant, config: FacilityLocationConfig) -> Self {
        FacilityLocationHeuristic {
            variant,
            config,
            name: format!("FacilityLocation-{}", variant.index()),
        }
    }

    fn build_candidates(&self, instance: &TaInstance) -> Vec<Candidate> {
        let homes = &instance.homes;
        let mut candidates = Vec::new();

        for facility in 0..instance.num_vertices() {
            let mut by_distance = homes.clone();
            by_distance.sort_by_key(|&h| (OrderedFloat(instance.distance(facility, h)), h));

            let open_cost = self.config.open_weight * instance.distance(instance.source, facility);
            let mut walking = 0.0;
            for size in 1..homes.len() {
                walking += instance.distance(by_distance[size - 1], facility);
                candidates.push(Candidate {
                    facility,
                    homes: by_distance[..size].to_vec(),
                    cost: walking + open_cost,
                });
            }
        }
        candidates
    }

    /// Greedy weighted set cover; returns the selected facilities
    fn select_facilities(&self, instance: &TaInstance) -> BTreeSet<usize> {
        let source = instance.source;
        let mut candidates = self.build_candidates(instance);
        let mut ratios: Vec<f64> = candidates
            .iter()
            .map(|c| c.cost / c.homes.len() as f64)
            .collect();
        let mut alive = vec![true; candidates.len()];

        let mut uncovered: BTreeSet<usize> = instance.homes.iter().copied().collect();
        let mut selected = BTreeSet::new();

        while !uncovered.is_empty() {
            let mut best: Option<(usize, f64)> = None;
            for (i, &ratio) in ratios.iter().enumerate() {
                if alive[i] && ratio.is_finite() && best.map_or(true, |(_, r)| ratio < r) {
                    best = Some((i, ratio));
                }
            }
            let Some((chosen, _)) = best else {
                log::debug!(
                    "{}: candidates exhausted with {} homes uncovered",
                    self.name,
                    uncovered.len()
                );
                break;
            };

            alive[chosen] = false;
            selected.insert(candidates[chosen].facility);
            for h in &candidates[chosen].homes {
                uncovered.remove(h);
            }

            for (i, candidate) in candidates.iter_mut().enumerate() {
                if !alive[i] {
                    continue;
                }
                let f = candidate.facility;
                match self.variant {
                    FacilityLocationVariant::Static => {}
                    FacilityLocationVariant::DiscountSelected => {
                        if selected.contains(&f) {
                            candidate.cost -= instance.distance(source, f);
                        }
                    }
                    FacilityLocationVariant::ProximityToSelected => {
                        if !selected.contains(&f) {
                            let walking: f64 =
                                candidate.homes.iter().map(|&h| instance.distance(h, f)).sum();
                            let proximity: f64 = selected
                                .iter()
                                .filter(|&&r| r != source)
                                .map(|&r| instance.distance(r, f))
                                .sum();
                            candidate.cost = walking + self.config.proximity_weight * proximity;
                        }
                    }
                }

                let covered = candidate.homes.iter().filter(|h| uncovered.contains(h)).count();
                ratios[i] = if covered > 0 {
                    candidate.cost / covered as f64
                } else {
                    f64::INFINITY
                };
            }
        }

        selected
    }
}

impl ConstructionHeuristic for FacilityLocationHeuristic {
    fn construct(&self, instance: &TaInstance) -> Result<Solution> {
        let start = Instant::now();
        let source = instance.source;

        let mut remaining = self.select_facilities(instance);
        remaining.remove(&source);
        log::debug!("{}: {} facilities selected", self.name, remaining.len());

        let mut walk = vec![source];
        while let Some(next) = nearest(instance, walk[walk.len() - 1], &remaining) {
            remaining.remove(&next);
            extend_walk(instance, &mut walk, next)?;
        }
        extend_walk(instance, &mut walk, source)?;

        // Homes left uncovered by the set cover are picked up here too.
        let mut solution = Solution::from_walk(instance, walk, self.name());
        solution.computation_time = start.elapsed().as_secs_f64();
        Ok(solution)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Greedy Nearest-Home Heuristic
///
/// Repeatedly drives to the nearest home not yet on the walk, then returns
/// to the source. Homes passed on the way to the target count as visited
/// and are never driven back to.
pub struct GreedyNearestHomeHeuristic;

impl GreedyNearestHomeHeuristic {
    pub fn new() -> Self {
        GreedyNearestHomeHeuristic
    }
}

impl Default for GreedyNearestHomeHeuristic {
    fn default() -> Self {
        Self::new()
    }
}

impl ConstructionHeuristic for GreedyNearestHomeHeuristic {
    fn construct(&self, instance: &TaInstance) -> Result<Solution> {
        let start = Instant::now();
        let source = instance.source;

        let mut remaining: BTreeSet<usize> = instance.homes.iter().copied().collect();
        remaining.remove(&source);

        let mut walk = vec![source];
        while let Some(next) = nearest(instance, walk[walk.len() - 1], &remaining) {
            let from = walk.len();
            extend_walk(instance, &mut walk, next)?;
            for v in &walk[from..] {
                remaining.remove(v);
            }
        }
        extend_walk(instance, &mut walk, source)?;

        let mut solution = Solution::from_walk(instance, walk, self.name());
        solution.computation_time = start.elapsed().as_secs_f64();
        Ok(solution)
    }

    fn name(&self) -> &str {
        "GreedyNearestHome"
    }
}

/// Multi-Start Construction
///
/// Runs multiple construction heuristics and returns the cheapest result,
/// each scored with its own drop-off assignment.
pub struct MultiStartConstruction {
    heuristics: Vec<Box<dyn ConstructionHeuristic + Send + Sync>>,
    pub parallel: bool,
}

impl MultiStartConstruction {
    pub fn new() -> Self {
        MultiStartConstruction {
            heuristics: Vec::new(),
            parallel: false,
        }
    }

    /// MST-DFS, the three facility-location variants and greedy nearest-home
    pub fn with_all_heuristics(config: &ConstructionConfig) -> Self {
        let mst = if config.prune_mst {
            MstDfsHeuristic::new()
        } else {
            MstDfsHeuristic::full()
        };
        let heuristics: Vec<Box<dyn ConstructionHeuristic + Send + Sync>> = vec![
            Box::new(mst),
            Box::new(FacilityLocationHeuristic::with_config(
                FacilityLocationVariant::Static,
                config.facility,
            )),
            Box::new(FacilityLocationHeuristic::with_config(
                FacilityLocationVariant::DiscountSelected,
                config.facility,
            )),
            Box::new(FacilityLocationHeuristic::with_config(
                FacilityLocationVariant::ProximityToSelected,
                config.facility,
            )),
            Box::new(GreedyNearestHomeHeuristic::new()),
        ];

        MultiStartConstruction {
            heuristics,
            parallel: config.parallel,
        }
    }

    pub fn add_heuristic<H: ConstructionHeuristic + Send + Sync + 'static>(&mut self, h: H) {
        self.heuristics.push(Box::new(h));
    }

    pub fn len(&self) -> usize {
        self.heuristics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heuristics.is_empty()
    }

    /// Every heuristic's solution, in registration order
    pub fn construct_all(&self, instance: &TaInstance) -> Result<Vec<Solution>> {
        if self.parallel {
            self.heuristics
                .par_iter()
                .map(|h| h.construct(instance))
                .collect()
        } else {
            self.heuristics.iter().map(|h| h.construct(instance)).collect()
        }
    }
}

impl Default for MultiStartConstruction {
    fn default() -> Self {
        Self::new()
    }
}

impl ConstructionHeuristic for MultiStartConstruction {
    fn construct(&self, instance: &TaInstance) -> Result<Solution> {
        let start = Instant::now();

        let mut best_solution = Solution::new();
        for solution in self.construct_all(instance)? {
            log::debug!("{}: cost {:.4}", solution.algorithm, solution.cost);
            if solution.cost < best_solution.cost {
                best_solution = solution;
            }
        }

        if best_solution.walk.is_empty() {
            best_solution = Solution::trivial(instance, self.name());
        }
        best_solution.computation_time = start.elapsed().as_secs_f64();
        Ok(best_solution)
    }

    fn name(&self) -> &str {
        "MultiStart"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Graph;

    /// 0 -1- 1 -2- 2 -3- 3 -4- 0, homes 1 and 3
    fn cycle_instance() -> TaInstance {
        let g = Graph::from_edges(4, &[(0, 1, 1.0), (1, 2, 2.0), (2, 3, 3.0), (3, 0, 4.0)]).unwrap();
        TaInstance::from_graph(g, vec![1, 3], 0).unwrap()
    }

    fn star_instance(k: usize) -> TaInstance {
        let edges: Vec<(usize, usize, f64)> = (1..=k).map(|leaf| (0, leaf, 1.0)).collect();
        let g = Graph::from_edges(k + 1, &edges).unwrap();
        TaInstance::from_graph(g, (1..=k).collect(), 0).unwrap()
    }

    fn complete_instance(n: usize, w: f64, homes: Vec<usize>) -> TaInstance {
        let mut edges = Vec::new();
        for u in 0..n {
            for v in u + 1..n {
                edges.push((u, v, w));
            }
        }
        TaInstance::from_graph(Graph::from_edges(n, &edges).unwrap(), homes, 0).unwrap()
    }

    fn all_heuristics() -> Vec<Box<dyn ConstructionHeuristic + Send + Sync>> {
        vec![
            Box::new(MstDfsHeuristic::new()),
            Box::new(FacilityLocationHeuristic::new(FacilityLocationVariant::Static)),
            Box::new(FacilityLocationHeuristic::new(FacilityLocationVariant::DiscountSelected)),
            Box::new(FacilityLocationHeuristic::new(FacilityLocationVariant::ProximityToSelected)),
            Box::new(GreedyNearestHomeHeuristic::new()),
        ]
    }

    #[test]
    fn test_mst_dfs_on_star() {
        let instance = star_instance(3);
        let solution = MstDfsHeuristic::new().construct(&instance).unwrap();
        assert_eq!(solution.walk, vec![0, 1, 0, 2, 0, 3, 0]);
        assert_eq!(solution.dropoffs.get(&2), Some(&vec![2]));
        assert_eq!(solution.driving_cost, 6.0);
        assert!(solution.is_valid(&instance));
    }

    #[test]
    fn test_mst_dfs_pruning_skips_homeless_branches() {
        // Path 0-1-2 plus leaf 3 hanging off 0; only 2 is a home.
        let g = Graph::from_edges(4, &[(0, 1, 1.0), (1, 2, 1.0), (0, 3, 1.0)]).unwrap();
        let instance = TaInstance::from_graph(g, vec![2], 0).unwrap();

        let pruned = MstDfsHeuristic::new().construct(&instance).unwrap();
        assert_eq!(pruned.walk, vec![0, 1, 2, 1, 0]);

        let full = MstDfsHeuristic::full().construct(&instance).unwrap();
        assert_eq!(full.walk, vec![0, 1, 2, 1, 0, 3, 0]);
    }

    #[test]
    fn test_facility_location_on_cycle() {
        let instance = cycle_instance();
        let solution = FacilityLocationHeuristic::new(FacilityLocationVariant::Static)
            .construct(&instance)
            .unwrap();
        assert_eq!(solution.walk, vec![0, 1, 0, 3, 0]);
        assert_eq!(solution.dropoffs.get(&1), Some(&vec![1]));
        assert_eq!(solution.dropoffs.get(&3), Some(&vec![3]));
        assert!(solution.is_valid(&instance));
    }

    #[test]
    fn test_facility_location_variants_rescore_differently() {
        // 1-3 is longer than the detour through 0
        let g = Graph::from_edges(
            4,
            &[(0, 1, 6.105), (0, 2, 8.848), (0, 3, 1.082), (1, 3, 17.298)],
        )
        .unwrap();
        let instance = TaInstance::from_graph(g, vec![0, 1, 2, 3], 2).unwrap();

        let walk_of = |variant| {
            FacilityLocationHeuristic::new(variant)
                .construct(&instance)
                .unwrap()
                .walk
        };
        assert_eq!(walk_of(FacilityLocationVariant::Static), vec![2, 0, 1, 0, 2]);
        // facility 0 keeps losing its opening distance and wins the last home too
        assert_eq!(walk_of(FacilityLocationVariant::DiscountSelected), vec![2, 0, 2]);
        // free singletons at 0, then 3 close to 0, then 1
        assert_eq!(
            walk_of(FacilityLocationVariant::ProximityToSelected),
            vec![2, 0, 3, 0, 1, 0, 2]
        );
    }

    #[test]
    fn test_facility_location_single_home_falls_back() {
        // One home leaves no candidate sets; every home walks from the source.
        let instance = star_instance(1);
        let solution = FacilityLocationHeuristic::new(FacilityLocationVariant::ProximityToSelected)
            .construct(&instance)
            .unwrap();
        assert_eq!(solution.walk, vec![0]);
        assert_eq!(solution.dropoffs.get(&0), Some(&vec![1]));
        assert!(solution.is_valid(&instance));
    }

    #[test]
    fn test_greedy_nearest_home_on_cycle() {
        let instance = cycle_instance();
        let solution = GreedyNearestHomeHeuristic::new().construct(&instance).unwrap();
        assert_eq!(solution.walk, vec![0, 1, 0, 3, 0]);
        assert_eq!(solution.driving_cost, 10.0);
        assert!(solution.is_valid(&instance));
    }

    #[test]
    fn test_home_at_source_gives_trivial_walk() {
        let instance = complete_instance(5, 3.0, vec![0]);
        for heuristic in all_heuristics() {
            let solution = heuristic.construct(&instance).unwrap();
            assert_eq!(solution.walk, vec![0], "{}", heuristic.name());
            assert_eq!(solution.cost, 0.0, "{}", heuristic.name());
        }
    }

    #[test]
    fn test_no_homes_gives_trivial_walk() {
        let instance = complete_instance(4, 1.0, vec![]);
        for heuristic in all_heuristics() {
            let solution = heuristic.construct(&instance).unwrap();
            assert_eq!(solution.walk, vec![0]);
            assert!(solution.dropoffs.is_empty());
        }
    }

    #[test]
    fn test_every_heuristic_produces_valid_solutions() {
        let instance = star_instance(5);
        let mut heuristics = all_heuristics();
        heuristics.push(Box::new(MstDfsHeuristic::full()));
        for heuristic in heuristics {
            let solution = heuristic.construct(&instance).unwrap();
            assert!(
                solution.is_valid(&instance),
                "{}: {:?}",
                heuristic.name(),
                solution.violations(&instance)
            );
        }
    }

    #[test]
    fn test_multi_start_picks_cheapest() {
        let instance = cycle_instance();
        let multi = MultiStartConstruction::with_all_heuristics(&ConstructionConfig::default());
        assert_eq!(multi.len(), 5);
        let all = multi.construct_all(&instance).unwrap();
        let best = multi.construct(&instance).unwrap();
        let min = all.iter().map(|s| s.cost).fold(f64::INFINITY, f64::min);
        assert_eq!(best.cost, min);
    }
}
