//! Per-intersection routing: weighted-cost choice with ε-exploration, and an
//! optional A\* shortest-path mode.
//!
//! The strategy set is closed — a tagged [`RouteMode`] rather than an open
//! trait — because the engine needs exhaustive knowledge of every decision
//! path for determinism.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use fleet_core::{NodeId, SegmentId, VehicleRng};
use fleet_grid::Grid;

use crate::vehicle::Vehicle;

/// Routing algorithm selection.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub enum RouteMode {
    /// Greedy one-hop weighted cost (the default).
    #[default]
    WeightedCost,
    /// A\* shortest path over the same edge cost; the decision is the first
    /// hop of the path.
    AStar,
}

/// Router weights and exploration policy.
#[derive(Clone, Debug)]
pub struct RouterConfig {
    pub distance_weight: f64,
    pub congestion_weight: f64,
    /// Probability of a uniform random pick when ≥ 2 candidates exist.
    /// Set to 0.0 for seed-reproducibility assertions in tests.
    pub exploration_rate: f64,
    pub mode: RouteMode,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            distance_weight: 0.6,
            congestion_weight: 0.4,
            exploration_rate: 0.15,
            mode: RouteMode::WeightedCost,
        }
    }
}

/// Why a decision picked its segment (or nothing).
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum DecisionReason {
    Optimal,
    Exploration,
    DeadEnd,
    ReachedDestination,
}

impl std::fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DecisionReason::Optimal => "optimal",
            DecisionReason::Exploration => "exploration",
            DecisionReason::DeadEnd => "dead_end",
            DecisionReason::ReachedDestination => "reached_destination",
        };
        f.write_str(s)
    }
}

/// The outcome of one routing call.
#[derive(Clone, Debug)]
pub struct RoutingDecision {
    pub from_node: NodeId,
    pub to_segment: Option<SegmentId>,
    pub to_node: Option<NodeId>,
    pub total_cost: f64,
    pub reason: DecisionReason,
}

impl RoutingDecision {
    fn dead_end(from_node: NodeId) -> Self {
        Self {
            from_node,
            to_segment: None,
            to_node: None,
            total_cost: f64::INFINITY,
            reason: DecisionReason::DeadEnd,
        }
    }
}

/// Choose the next segment for a vehicle standing at `from_node`.
///
/// The grid's derived indexes must be built (frozen grid).
pub fn next_segment(
    config: &RouterConfig,
    grid: &Grid,
    vehicle: &Vehicle,
    from_node: NodeId,
    rng: &mut VehicleRng,
) -> RoutingDecision {
    if from_node == vehicle.target_node {
        return RoutingDecision {
            from_node,
            to_segment: None,
            to_node: None,
            total_cost: 0.0,
            reason: DecisionReason::ReachedDestination,
        };
    }

    let candidates = candidate_segments(grid, vehicle, from_node);
    if candidates.is_empty() {
        return RoutingDecision::dead_end(from_node);
    }

    // The exploration draw happens on every call so that toggling between
    // greedy and exploratory picks never shifts the vehicle's RNG stream.
    let explore = rng.gen_bool(config.exploration_rate);
    if explore && candidates.len() >= 2 {
        let pick = candidates[rng.gen_range(0..candidates.len())];
        let mut decision = score(config, grid, pick, from_node, vehicle.target_node);
        decision.reason = DecisionReason::Exploration;
        return decision;
    }

    match config.mode {
        RouteMode::WeightedCost => best_by_cost(config, grid, &candidates, from_node, vehicle),
        RouteMode::AStar => {
            astar_first_hop(config, grid, vehicle, from_node).unwrap_or_else(|| {
                RoutingDecision::dead_end(from_node)
            })
        }
    }
}

/// Segments incident to the node, excluding the one just traversed.
///
/// With undirected segments an empty result means the node is degree-1 — a
/// true stub end, which terminates the vehicle as a dead end rather than
/// permitting a U-turn.  (A\* still allows doubling back when the current
/// segment is the only way out of the *start* node mid-path.)
fn candidate_segments(grid: &Grid, vehicle: &Vehicle, from_node: NodeId) -> Vec<SegmentId> {
    let Some(node) = grid.node(from_node) else {
        return Vec::new();
    };
    grid.endpoint_segments(node.x, node.y)
        .iter()
        .copied()
        .filter(|&id| id != vehicle.segment)
        .collect()
}

/// Weighted one-hop cost:
/// `w_dist·len + w_cong·congestion·len + 0.1·euclid(other_end, target)/1000`.
fn score(
    config: &RouterConfig,
    grid: &Grid,
    segment: SegmentId,
    from_node: NodeId,
    target_node: NodeId,
) -> RoutingDecision {
    let seg = grid.segment(segment).expect("candidate segment exists");
    let to_node = seg.other_endpoint(from_node);

    let distance_cost = seg.length_km;
    let congestion_cost = seg.congestion_factor() * seg.length_km;
    let heuristic = match (grid.node(to_node), grid.node(target_node)) {
        (Some(a), Some(b)) => 0.1 * a.pos.distance_m(b.pos) / 1000.0,
        _ => f64::INFINITY,
    };

    let total_cost = config.distance_weight * distance_cost
        + config.congestion_weight * congestion_cost
        + heuristic;

    RoutingDecision {
        from_node,
        to_segment: Some(segment),
        to_node: Some(to_node),
        total_cost,
        reason: DecisionReason::Optimal,
    }
}

fn best_by_cost(
    config: &RouterConfig,
    grid: &Grid,
    candidates: &[SegmentId],
    from_node: NodeId,
    vehicle: &Vehicle,
) -> RoutingDecision {
    let mut best: Option<RoutingDecision> = None;
    // Candidates arrive in ascending id order (endpoint index is sorted), so
    // a strict `<` keeps the smaller id on cost ties.
    for &candidate in candidates {
        let decision = score(config, grid, candidate, from_node, vehicle.target_node);
        let better = match &best {
            None => true,
            Some(current) => decision.total_cost < current.total_cost,
        };
        if better {
            best = Some(decision);
        }
    }
    best.unwrap_or_else(|| RoutingDecision::dead_end(from_node))
}

// ── A* ────────────────────────────────────────────────────────────────────────

/// Cost scaled to integer micro-units so the heap ordering is total and
/// deterministic.
#[inline]
fn micro(cost: f64) -> u64 {
    (cost * 1e6).round() as u64
}

/// A\* from `from_node` to the vehicle's target; returns the decision for
/// the first hop, or `None` when no path exists.
fn astar_first_hop(
    config: &RouterConfig,
    grid: &Grid,
    vehicle: &Vehicle,
    from_node: NodeId,
) -> Option<RoutingDecision> {
    let target = vehicle.target_node;
    grid.node(target)?;

    let n = grid.nodes().len();
    let mut g_score = vec![u64::MAX; n];
    let mut came_from: Vec<(NodeId, SegmentId)> = vec![(NodeId::INVALID, SegmentId::INVALID); n];

    let heuristic = |node: NodeId| -> u64 {
        match (grid.node(node), grid.node(target)) {
            (Some(a), Some(b)) => micro(a.pos.distance_m(b.pos) / 1000.0),
            _ => 0,
        }
    };

    // Min-heap on (f_score, node); NodeId tie-break keeps pops deterministic.
    let mut open: BinaryHeap<Reverse<(u64, NodeId)>> = BinaryHeap::new();
    g_score[from_node.index()] = 0;
    open.push(Reverse((heuristic(from_node), from_node)));

    while let Some(Reverse((_, current))) = open.pop() {
        if current == target {
            return reconstruct_first_hop(config, grid, &came_from, from_node, current, vehicle);
        }

        let node = grid.node(current)?;
        for &seg_id in grid.endpoint_segments(node.x, node.y) {
            let seg = grid.segment(seg_id)?;
            // Avoid doubling back over the just-traversed segment when any
            // alternative exists at the start node.
            if current == from_node && seg_id == vehicle.segment {
                let others = grid
                    .endpoint_segments(node.x, node.y)
                    .iter()
                    .any(|&other| other != vehicle.segment);
                if others {
                    continue;
                }
            }
            let neighbor = seg.other_endpoint(current);
            let edge_cost = micro(
                config.distance_weight * seg.length_km
                    + config.congestion_weight * seg.congestion_factor() * seg.length_km,
            );
            let tentative = g_score[current.index()].saturating_add(edge_cost);
            if tentative < g_score[neighbor.index()] {
                g_score[neighbor.index()] = tentative;
                came_from[neighbor.index()] = (current, seg_id);
                open.push(Reverse((tentative.saturating_add(heuristic(neighbor)), neighbor)));
            }
        }
    }
    None
}

fn reconstruct_first_hop(
    config: &RouterConfig,
    grid: &Grid,
    came_from: &[(NodeId, SegmentId)],
    from_node: NodeId,
    target: NodeId,
    vehicle: &Vehicle,
) -> Option<RoutingDecision> {
    // Walk back from the target to the hop leaving `from_node`.
    let mut cursor = target;
    let mut first_hop = None;
    while cursor != from_node {
        let (prev, via) = came_from[cursor.index()];
        if prev == NodeId::INVALID {
            return None;
        }
        first_hop = Some((cursor, via));
        cursor = prev;
    }
    let (to_node, to_segment) = first_hop?;
    let mut decision = score(config, grid, to_segment, from_node, vehicle.target_node);
    decision.to_node = Some(to_node);
    decision.reason = DecisionReason::Optimal;
    Some(decision)
}
