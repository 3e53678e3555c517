//! The `Grid` — arena storage for cells, nodes, and segments plus the
//! derived spatial indexes.

use std::collections::{BTreeMap, HashMap};

use fleet_core::{NodeId, Point, SegmentId};

use crate::cell::{Cell, CellRole};
use crate::error::{GridError, GridResult};
use crate::connectivity;
use crate::segment::{ConditionList, Node, RoadSegment, TrafficLoad};

/// Metres per grid cell when no explicit size is configured.
pub const DEFAULT_CELL_SIZE_M: f64 = 100.0;
/// Default maximum concurrent occupants per segment.
pub const DEFAULT_SEGMENT_CAPACITY: u32 = 15;
/// Free-flow speed of an ordinary street, km/h.
pub const DEFAULT_BASE_SPEED_KPH: f64 = 50.0;
/// Free-flow speed of a promoted main artery, km/h.
pub const ARTERY_BASE_SPEED_KPH: f64 = 80.0;

/// Construction-time parameters of one segment.
#[derive(Clone, Copy, Debug)]
pub struct SegmentSpec {
    pub base_speed_kph: f64,
    pub base_congestion: f64,
    pub is_artery: bool,
}

impl Default for SegmentSpec {
    fn default() -> Self {
        Self {
            base_speed_kph: DEFAULT_BASE_SPEED_KPH,
            base_congestion: 1.0,
            is_artery: false,
        }
    }
}

/// Snapshot of all mutable generation state, used by the placement
/// relaxation loop to reset a failed attempt.
pub struct GridBackup {
    cells: Vec<(CellRole, Option<f64>, Vec<SegmentId>)>,
    segments: BTreeMap<SegmentId, RoadSegment>,
    next_segment_id: u32,
}

/// Dense `width × height` grid owning all cells, nodes, and segments.
///
/// The cell array is row-major, so coordinate lookup is arithmetic — that
/// array *is* the coordinate index.  The other three indexes (endpoint,
/// segment → cell, segment adjacency) are derived and only valid after
/// [`rebuild_indexes`](Self::rebuild_indexes); generation-time code works
/// from the cell arena directly.
#[derive(Debug)]
pub struct Grid {
    pub width: i64,
    pub height: i64,
    pub cell_size_m: f64,

    cells: Vec<Cell>,
    nodes: Vec<Node>,
    segments: BTreeMap<SegmentId, RoadSegment>,
    node_lookup: HashMap<(i64, i64), NodeId>,
    next_segment_id: u32,

    // ── Derived indexes (rebuilt atomically) ──────────────────────────────
    endpoint_index: HashMap<(i64, i64), Vec<SegmentId>>,
    segment_index: HashMap<SegmentId, (i64, i64)>,
    adjacency: HashMap<SegmentId, Vec<SegmentId>>,
}

impl Grid {
    /// Create an all-normal grid with no roads.
    pub fn new(width: i64, height: i64, cell_size_m: f64) -> Self {
        let mut cells = Vec::with_capacity((width * height) as usize);
        for y in 0..height {
            for x in 0..width {
                cells.push(Cell::new(x, y));
            }
        }
        Self {
            width,
            height,
            cell_size_m,
            cells,
            nodes: Vec::new(),
            segments: BTreeMap::new(),
            node_lookup: HashMap::new(),
            next_segment_id: 1,
            endpoint_index: HashMap::new(),
            segment_index: HashMap::new(),
            adjacency: HashMap::new(),
        }
    }

    // ── Cell access ───────────────────────────────────────────────────────

    #[inline]
    pub fn in_bounds(&self, x: i64, y: i64) -> bool {
        x >= 0 && x < self.width && y >= 0 && y < self.height
    }

    #[inline]
    pub fn cell_at(&self, x: i64, y: i64) -> Option<&Cell> {
        if !self.in_bounds(x, y) {
            return None;
        }
        Some(&self.cells[(y * self.width + x) as usize])
    }

    #[inline]
    pub fn cell_at_mut(&mut self, x: i64, y: i64) -> Option<&mut Cell> {
        if !self.in_bounds(x, y) {
            return None;
        }
        let w = self.width;
        Some(&mut self.cells[(y * w + x) as usize])
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn total_cells(&self) -> usize {
        self.cells.len()
    }

    pub fn road_cell_count(&self) -> usize {
        self.cells.iter().filter(|c| c.has_roads()).count()
    }

    pub fn special_cell_count(&self) -> usize {
        self.cells
            .iter()
            .filter(|c| c.role != CellRole::Normal)
            .count()
    }

    // ── Node access ───────────────────────────────────────────────────────

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    /// The node at cell coordinates, if one exists.
    #[inline]
    pub fn node_at(&self, x: i64, y: i64) -> Option<NodeId> {
        self.node_lookup.get(&(x, y)).copied()
    }

    /// Get or create the node for a road cell.  Node positions are cell
    /// coordinates scaled to metres.
    pub fn ensure_node(&mut self, x: i64, y: i64) -> NodeId {
        if let Some(id) = self.node_lookup.get(&(x, y)) {
            return *id;
        }
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            id,
            x,
            y,
            pos: Point::new(x as f64 * self.cell_size_m, y as f64 * self.cell_size_m),
        });
        self.node_lookup.insert((x, y), id);
        id
    }

    // ── Segment access ────────────────────────────────────────────────────

    #[inline]
    pub fn segment(&self, id: SegmentId) -> Option<&RoadSegment> {
        self.segments.get(&id)
    }

    #[inline]
    pub fn segment_mut(&mut self, id: SegmentId) -> Option<&mut RoadSegment> {
        self.segments.get_mut(&id)
    }

    /// All segments in ascending id order.
    pub fn segments(&self) -> impl Iterator<Item = &RoadSegment> {
        self.segments.values()
    }

    pub fn segments_mut(&mut self) -> impl Iterator<Item = &mut RoadSegment> {
        self.segments.values_mut()
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Endpoint cell coordinates of a segment.
    pub fn segment_cells(&self, seg: &RoadSegment) -> ((i64, i64), (i64, i64)) {
        let a = &self.nodes[seg.start.index()];
        let b = &self.nodes[seg.end.index()];
        ((a.x, a.y), (b.x, b.y))
    }

    /// `true` if a segment already joins the two cells (either orientation).
    pub fn connection_exists(&self, ax: i64, ay: i64, bx: i64, by: i64) -> bool {
        let Some(cell) = self.cell_at(ax, ay) else {
            return false;
        };
        cell.segments.iter().any(|id| {
            let seg = &self.segments[id];
            let (s, e) = self.segment_cells(seg);
            (s == (ax, ay) && e == (bx, by)) || (s == (bx, by) && e == (ax, ay))
        })
    }

    /// Create a segment between two distinct in-bounds cells, registering it
    /// in both cells' segment lists.
    ///
    /// Returns `None` when the coordinates coincide, fall outside the grid,
    /// or a segment between the two cells already exists — all of which the
    /// generator treats as "nothing to add".
    pub fn connect(
        &mut self,
        (ax, ay): (i64, i64),
        (bx, by): (i64, i64),
        spec: SegmentSpec,
    ) -> Option<SegmentId> {
        if (ax, ay) == (bx, by) || !self.in_bounds(ax, ay) || !self.in_bounds(bx, by) {
            return None;
        }
        if self.connection_exists(ax, ay, bx, by) {
            return None;
        }

        let start = self.ensure_node(ax, ay);
        let end = self.ensure_node(bx, by);
        let length_km = self.nodes[start.index()]
            .pos
            .distance_km(self.nodes[end.index()].pos);

        let id = SegmentId(self.next_segment_id);
        self.next_segment_id += 1;

        self.segments.insert(
            id,
            RoadSegment {
                id,
                start,
                end,
                length_km,
                base_speed_kph: spec.base_speed_kph,
                base_congestion: spec.base_congestion,
                speed_limit_kph: None,
                capacity: Some(DEFAULT_SEGMENT_CAPACITY),
                is_open: true,
                is_artery: spec.is_artery,
                base_conditions: ConditionList::new(),
                temporary_conditions: ConditionList::new(),
                load: TrafficLoad::default(),
            },
        );
        self.cell_at_mut(ax, ay).unwrap().segments.push(id);
        self.cell_at_mut(bx, by).unwrap().segments.push(id);
        Some(id)
    }

    /// Insert a fully-formed segment record (JSON import path).  Cell
    /// segment lists come from the file and are validated separately, so
    /// this touches only the arena.
    pub(crate) fn insert_segment_record(&mut self, seg: RoadSegment) {
        self.next_segment_id = self.next_segment_id.max(seg.id.0.saturating_add(1));
        self.segments.insert(seg.id, seg);
    }

    /// Remove every segment incident to a cell, detaching it from both
    /// endpoint cells.  Returns the removed segments (blocked-cell
    /// application; the relaxation loop keeps its own full backup).
    pub fn remove_cell_segments(&mut self, x: i64, y: i64) -> Vec<RoadSegment> {
        let Some(cell) = self.cell_at(x, y) else {
            return Vec::new();
        };
        let ids: Vec<SegmentId> = cell.segments.clone();
        let mut removed = Vec::with_capacity(ids.len());
        for id in ids {
            let Some(seg) = self.segments.remove(&id) else {
                continue;
            };
            let (s, e) = self.segment_cells(&seg);
            for (cx, cy) in [s, e] {
                if let Some(c) = self.cell_at_mut(cx, cy) {
                    c.segments.retain(|&sid| sid != id);
                }
            }
            removed.push(seg);
        }
        removed
    }

    /// Re-insert segments previously returned by
    /// [`remove_cell_segments`](Self::remove_cell_segments), restoring both
    /// endpoint cells' references (blocked-cell revert).
    pub fn reinsert_segments(&mut self, segments: Vec<RoadSegment>) {
        for seg in segments {
            let (s, e) = self.segment_cells(&seg);
            let id = seg.id;
            self.segments.insert(id, seg);
            for (cx, cy) in [s, e] {
                if let Some(cell) = self.cell_at_mut(cx, cy) {
                    if !cell.segments.contains(&id) {
                        cell.segments.push(id);
                    }
                }
                if s == e {
                    break;
                }
            }
        }
    }

    // ── Connection geometry ───────────────────────────────────────────────

    /// Number of distinct cardinal directions (N/S/E/W) in which this cell
    /// has a road connection.  Diagonal segments count toward their dominant
    /// horizontal direction.
    pub fn cardinal_connections(&self, x: i64, y: i64) -> usize {
        let Some(cell) = self.cell_at(x, y) else {
            return 0;
        };
        let mut dirs = [false; 4]; // E, W, S, N
        for id in &cell.segments {
            let seg = &self.segments[id];
            let (s, e) = self.segment_cells(seg);
            let (dx, dy) = if s == (x, y) {
                (e.0 - s.0, e.1 - s.1)
            } else if e == (x, y) {
                (s.0 - e.0, s.1 - e.1)
            } else {
                continue;
            };
            if dx > 0 {
                dirs[0] = true;
            } else if dx < 0 {
                dirs[1] = true;
            } else if dy > 0 {
                dirs[2] = true;
            } else if dy < 0 {
                dirs[3] = true;
            }
        }
        dirs.iter().filter(|d| **d).count()
    }

    // ── Derived indexes ───────────────────────────────────────────────────

    /// Rebuild the endpoint index, segment → cell index, and segment
    /// adjacency in one pass.  Called once at the end of generation or
    /// import; the three maps are mutually consistent afterwards.
    pub fn rebuild_indexes(&mut self) {
        let mut endpoint: HashMap<(i64, i64), Vec<SegmentId>> = HashMap::new();
        let mut seg_cell: HashMap<SegmentId, (i64, i64)> = HashMap::new();

        for seg in self.segments.values() {
            let (s, e) = {
                let a = &self.nodes[seg.start.index()];
                let b = &self.nodes[seg.end.index()];
                ((a.x, a.y), (b.x, b.y))
            };
            endpoint.entry(s).or_default().push(seg.id);
            if e != s {
                endpoint.entry(e).or_default().push(seg.id);
            }
            seg_cell.insert(seg.id, s);
        }
        for ids in endpoint.values_mut() {
            ids.sort_unstable();
        }

        let mut adjacency: HashMap<SegmentId, Vec<SegmentId>> = HashMap::new();
        for (_, ids) in endpoint.iter() {
            for &a in ids {
                for &b in ids {
                    if a != b {
                        adjacency.entry(a).or_default().push(b);
                    }
                }
            }
        }
        for neighbors in adjacency.values_mut() {
            neighbors.sort_unstable();
            neighbors.dedup();
        }

        self.endpoint_index = endpoint;
        self.segment_index = seg_cell;
        self.adjacency = adjacency;

        log::debug!(
            "rebuilt grid indexes: {} endpoints, {} segments, {} adjacency entries",
            self.endpoint_index.len(),
            self.segment_index.len(),
            self.adjacency.len()
        );
    }

    /// Segments incident to the given cell coordinates (endpoint index).
    pub fn endpoint_segments(&self, x: i64, y: i64) -> &[SegmentId] {
        self.endpoint_index
            .get(&(x, y))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// One containing cell of a segment (segment index).
    pub fn segment_cell(&self, id: SegmentId) -> Option<(i64, i64)> {
        self.segment_index.get(&id).copied()
    }

    /// Segments sharing at least one endpoint cell with `id`.
    pub fn adjacent_segments(&self, id: SegmentId) -> &[SegmentId] {
        self.adjacency.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    // ── Backup / restore ──────────────────────────────────────────────────

    /// Snapshot cell roles, refuel amounts, segment lists, and the segment
    /// arena for the placement relaxation loop.
    pub fn backup(&self) -> GridBackup {
        GridBackup {
            cells: self
                .cells
                .iter()
                .map(|c| (c.role, c.refuel_amount, c.segments.clone()))
                .collect(),
            segments: self.segments.clone(),
            next_segment_id: self.next_segment_id,
        }
    }

    /// Restore a snapshot taken by [`backup`](Self::backup).
    pub fn restore(&mut self, backup: &GridBackup) {
        for (cell, (role, refuel, segments)) in self.cells.iter_mut().zip(backup.cells.iter()) {
            cell.role = *role;
            cell.refuel_amount = *refuel;
            cell.segments = segments.clone();
        }
        self.segments = backup.segments.clone();
        self.next_segment_id = backup.next_segment_id;
    }

    // ── Invariant validation ──────────────────────────────────────────────

    /// Check the frozen-grid invariants: refuel cells carry positive fuel,
    /// blocked cells carry no segments, every segment is listed by both of
    /// its endpoint cells, and the road network forms a single component.
    pub fn validate_invariants(&self) -> GridResult<()> {
        for cell in &self.cells {
            match cell.role {
                CellRole::Refuel => {
                    if !matches!(cell.refuel_amount, Some(a) if a > 0.0) {
                        return Err(GridError::Invariant(format!(
                            "refuel cell ({},{}) has no positive refuel amount",
                            cell.x, cell.y
                        )));
                    }
                }
                CellRole::Blocked => {
                    if cell.has_roads() {
                        return Err(GridError::Invariant(format!(
                            "blocked cell ({},{}) still carries {} segments",
                            cell.x,
                            cell.y,
                            cell.segments.len()
                        )));
                    }
                }
                _ => {}
            }
        }

        for seg in self.segments.values() {
            if seg.length_km <= 0.0 {
                return Err(GridError::Invariant(format!(
                    "segment {} has non-positive length",
                    seg.id
                )));
            }
            let (s, e) = self.segment_cells(seg);
            for (cx, cy) in [s, e] {
                let listed = self
                    .cell_at(cx, cy)
                    .map(|c| c.segments.contains(&seg.id))
                    .unwrap_or(false);
                if !listed {
                    return Err(GridError::Invariant(format!(
                        "segment {} not listed by its endpoint cell ({cx},{cy})",
                        seg.id
                    )));
                }
            }
        }

        let components = connectivity::find_components(self);
        if components.len() > 1 {
            return Err(GridError::Invariant(format!(
                "road network has {} components",
                components.len()
            )));
        }
        Ok(())
    }
}
