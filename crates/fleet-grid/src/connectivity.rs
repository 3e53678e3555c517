//! Connected-component discovery, bridge repair, and articulation probing.
//!
//! Two segments are connected when they share an endpoint cell.  All
//! traversals are iterative (explicit queue / union-find) — component sizes
//! scale with the grid, so recursion depth must not.

use std::collections::{HashMap, VecDeque};

use fleet_core::SegmentId;

use crate::error::{GridError, GridResult};
use crate::grid::{Grid, SegmentSpec, DEFAULT_BASE_SPEED_KPH};
use crate::CellRole;

// ── Union-find ────────────────────────────────────────────────────────────────

/// Disjoint-set over segment ids; the fast connectivity check used by
/// blocked-cell placement and the articulation probe.
#[derive(Default)]
pub struct Dsu {
    parent: HashMap<SegmentId, SegmentId>,
}

impl Dsu {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: SegmentId) {
        self.parent.entry(id).or_insert(id);
    }

    pub fn find(&mut self, id: SegmentId) -> SegmentId {
        let mut root = id;
        while self.parent[&root] != root {
            root = self.parent[&root];
        }
        // Path compression.
        let mut cur = id;
        while self.parent[&cur] != root {
            let next = self.parent[&cur];
            self.parent.insert(cur, root);
            cur = next;
        }
        root
    }

    pub fn union(&mut self, a: SegmentId, b: SegmentId) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            self.parent.insert(ra, rb);
        }
    }

    /// Number of disjoint sets.
    pub fn component_count(&mut self) -> usize {
        let ids: Vec<SegmentId> = self.parent.keys().copied().collect();
        let mut roots: Vec<SegmentId> = ids.into_iter().map(|id| self.find(id)).collect();
        roots.sort_unstable();
        roots.dedup();
        roots.len()
    }
}

// ── Segment-graph construction ────────────────────────────────────────────────

/// Endpoint-cell → incident segments, built from the cell arena (works on
/// grids whose derived indexes are stale mid-generation).
fn endpoint_map(grid: &Grid, exclude: Option<SegmentId>) -> HashMap<(i64, i64), Vec<SegmentId>> {
    let mut map: HashMap<(i64, i64), Vec<SegmentId>> = HashMap::new();
    for seg in grid.segments() {
        if Some(seg.id) == exclude {
            continue;
        }
        let (s, e) = grid.segment_cells(seg);
        map.entry(s).or_default().push(seg.id);
        if e != s {
            map.entry(e).or_default().push(seg.id);
        }
    }
    map
}

/// Union-find over the segment graph, optionally excluding one segment or
/// every segment incident to one cell.
fn build_dsu(grid: &Grid, exclude_segment: Option<SegmentId>, exclude_cell: Option<(i64, i64)>) -> Dsu {
    let mut dsu = Dsu::new();
    let excluded_ids: Vec<SegmentId> = match exclude_cell {
        Some((x, y)) => grid
            .cell_at(x, y)
            .map(|c| c.segments.clone())
            .unwrap_or_default(),
        None => Vec::new(),
    };
    let is_excluded = |id: SegmentId| Some(id) == exclude_segment || excluded_ids.contains(&id);

    for seg in grid.segments() {
        if !is_excluded(seg.id) {
            dsu.insert(seg.id);
        }
    }
    for (_, ids) in endpoint_map(grid, exclude_segment) {
        let kept: Vec<SegmentId> = ids.into_iter().filter(|&id| !is_excluded(id)).collect();
        for pair in kept.windows(2) {
            dsu.union(pair[0], pair[1]);
        }
    }
    dsu
}

// ── Public operations ─────────────────────────────────────────────────────────

/// All connected components, each a sorted list of segment ids.  Components
/// are ordered by their smallest segment id, so output is deterministic.
pub fn find_components(grid: &Grid) -> Vec<Vec<SegmentId>> {
    let endpoints = endpoint_map(grid, None);
    let mut adjacency: HashMap<SegmentId, Vec<SegmentId>> = HashMap::new();
    for ids in endpoints.values() {
        for &a in ids {
            for &b in ids {
                if a != b {
                    adjacency.entry(a).or_default().push(b);
                }
            }
        }
    }

    let all: Vec<SegmentId> = {
        let mut v: Vec<SegmentId> = grid.segments().map(|s| s.id).collect();
        v.sort_unstable();
        v
    };

    let mut visited: HashMap<SegmentId, bool> = HashMap::new();
    let mut components = Vec::new();

    for &start in &all {
        if visited.get(&start).copied().unwrap_or(false) {
            continue;
        }
        let mut component = Vec::new();
        let mut queue = VecDeque::new();
        visited.insert(start, true);
        queue.push_back(start);
        while let Some(id) = queue.pop_front() {
            component.push(id);
            if let Some(neighbors) = adjacency.get(&id) {
                for &n in neighbors {
                    if !visited.get(&n).copied().unwrap_or(false) {
                        visited.insert(n, true);
                        queue.push_back(n);
                    }
                }
            }
        }
        component.sort_unstable();
        components.push(component);
    }
    components
}

/// Union-find connectivity check over the whole segment graph — the fast
/// path blocked-cell placement runs after each tentative block.
pub fn connected_fast(grid: &Grid) -> bool {
    let mut dsu = build_dsu(grid, None, None);
    dsu.component_count() <= 1
}

/// `true` iff connectivity survives the removal of every segment incident to
/// the given cell.  Used by blocked-cell placement before committing a block.
pub fn connected_excluding_cell(grid: &Grid, x: i64, y: i64) -> bool {
    let mut dsu = build_dsu(grid, None, Some((x, y)));
    dsu.component_count() <= 1
}

/// `true` iff removing the segment disconnects the remaining graph.
///
/// A graph that becomes empty (the segment was the only one) does not count
/// as disconnected.
pub fn articulation_probe(grid: &Grid, segment: SegmentId) -> bool {
    let mut dsu = build_dsu(grid, Some(segment), None);
    dsu.component_count() > 1
}

/// A candidate bridge between two components.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
struct BridgeCandidate {
    from: (i64, i64),
    to: (i64, i64),
}

/// Repair connectivity by inserting bridge segments between the largest
/// component and each outlier, repeating until one component remains.
///
/// Returns the number of bridges added.  Fails with
/// [`GridError::ConnectivityUnreachable`] when more than one component
/// remains and no valid bridge exists.
pub fn validate_and_repair(grid: &mut Grid) -> GridResult<usize> {
    let mut bridges_added = 0usize;

    loop {
        let components = find_components(grid);
        if components.len() <= 1 {
            if bridges_added > 0 {
                log::info!("connectivity repair added {bridges_added} bridge segments");
            }
            return Ok(bridges_added);
        }

        // Largest component is the anchor; components are already ordered by
        // smallest segment id, so max_by_key keeps the earlier one on ties.
        let anchor_idx = components
            .iter()
            .enumerate()
            .max_by_key(|(i, c)| (c.len(), std::cmp::Reverse(*i)))
            .map(|(i, _)| i)
            .unwrap();

        let anchor_cells = component_cells(grid, &components[anchor_idx]);
        let mut added_this_round = 0usize;

        for (i, component) in components.iter().enumerate() {
            if i == anchor_idx {
                continue;
            }
            let outlier_cells = component_cells(grid, component);
            if let Some(bridge) = best_bridge(grid, &anchor_cells, &outlier_cells) {
                let spec = SegmentSpec {
                    base_speed_kph: DEFAULT_BASE_SPEED_KPH,
                    base_congestion: 1.0,
                    is_artery: false,
                };
                if grid.connect(bridge.from, bridge.to, spec).is_some() {
                    log::info!(
                        "added bridge ({}, {}) -> ({}, {})",
                        bridge.from.0,
                        bridge.from.1,
                        bridge.to.0,
                        bridge.to.1
                    );
                    bridges_added += 1;
                    added_this_round += 1;
                }
            }
        }

        if added_this_round == 0 {
            return Err(GridError::ConnectivityUnreachable {
                components: components.len(),
            });
        }
    }
}

/// Distinct road cells touched by a component, sorted for determinism.
fn component_cells(grid: &Grid, component: &[SegmentId]) -> Vec<(i64, i64)> {
    let mut cells = Vec::new();
    for &id in component {
        if let Some(seg) = grid.segment(id) {
            let (s, e) = grid.segment_cells(seg);
            cells.push(s);
            cells.push(e);
        }
    }
    cells.sort_unstable();
    cells.dedup();
    cells
}

/// The best bridge between two cell sets: cardinal-adjacent, both endpoints
/// non-blocked road cells, no existing connection; smallest
/// `(from_x, from_y, to_x, to_y)` tuple wins.
fn best_bridge(
    grid: &Grid,
    anchor: &[(i64, i64)],
    outlier: &[(i64, i64)],
) -> Option<BridgeCandidate> {
    let mut best: Option<BridgeCandidate> = None;
    for &from in anchor {
        for &to in outlier {
            let dx = to.0 - from.0;
            let dy = to.1 - from.1;
            let cardinal_adjacent = (dx.abs() == 1 && dy == 0) || (dx == 0 && dy.abs() == 1);
            if !cardinal_adjacent {
                continue;
            }
            if !valid_bridge_endpoint(grid, from) || !valid_bridge_endpoint(grid, to) {
                continue;
            }
            if grid.connection_exists(from.0, from.1, to.0, to.1) {
                continue;
            }
            let candidate = BridgeCandidate { from, to };
            if best.map(|b| candidate < b).unwrap_or(true) {
                best = Some(candidate);
            }
        }
    }
    best
}

fn valid_bridge_endpoint(grid: &Grid, (x, y): (i64, i64)) -> bool {
    grid.cell_at(x, y)
        .map(|c| c.role != CellRole::Blocked && c.has_roads())
        .unwrap_or(false)
}

/// Convenience used by import validation: error when the network is split.
pub fn require_single_component(grid: &Grid) -> GridResult<()> {
    let components = find_components(grid);
    if components.len() > 1 {
        return Err(GridError::Invariant(format!(
            "road network has {} isolated components (should be 1 for full connectivity)",
            components.len()
        )));
    }
    Ok(())
}
