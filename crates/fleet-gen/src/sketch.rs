//! Continuous-space topology builders.
//!
//! Each builder produces a [`RoadSketch`]: points on the plane plus links
//! between them.  The sketch knows nothing about cells; rasterization
//! (see [`raster`][crate::raster]) snaps it onto the grid.

use rstar::{PointDistance, RTree, RTreeObject, AABB};

use fleet_core::{Point, SimRng};

use crate::params::{
    GeneratorParams, KnnMeshParams, LSystemParams, LatticeParams, LatticeRadialParams,
    LorenzParams, RandomParams, SpaceColonizationParams, Topology,
};

/// A topology sketch: points in metres and links between point indices.
#[derive(Debug, Default)]
pub struct RoadSketch {
    pub points: Vec<Point>,
    pub links: Vec<SketchLink>,
}

#[derive(Debug, Clone, Copy)]
pub struct SketchLink {
    pub a: usize,
    pub b: usize,
    /// Static congestion factor carried onto rasterized segments.
    pub congestion: f64,
}

impl RoadSketch {
    fn add_point(&mut self, x: f64, y: f64) -> usize {
        self.points.push(Point::new(x, y));
        self.points.len() - 1
    }

    fn link(&mut self, a: usize, b: usize) {
        self.link_with(a, b, 1.0);
    }

    fn link_with(&mut self, a: usize, b: usize, congestion: f64) {
        if a != b {
            self.links.push(SketchLink { a, b, congestion });
        }
    }
}

/// Dispatch on the selected topology.
pub fn build_sketch(params: &GeneratorParams, rng: &mut SimRng) -> RoadSketch {
    match &params.topology {
        Topology::Lattice(p) => lattice(params, rng, p),
        Topology::LatticeRadial(p) => lattice_radial(params, rng, p),
        Topology::SpaceColonization(p) => space_colonization(params, rng, p),
        Topology::KnnMesh(p) => knn_mesh(params, rng, p),
        Topology::LSystem(p) => l_system(params, p),
        Topology::Lorenz(p) => lorenz(params, rng, p),
        Topology::Random(p) => random(params, rng, p),
    }
}

fn jitter(rng: &mut SimRng, val: f64, max_jitter: f64) -> f64 {
    if max_jitter <= 0.0 {
        return val;
    }
    val + (rng.gen_range(0.0..1.0) * 2.0 - 1.0) * max_jitter
}

// ── Lattice ───────────────────────────────────────────────────────────────────

fn lattice(params: &GeneratorParams, rng: &mut SimRng, p: &LatticeParams) -> RoadSketch {
    let mut sketch = RoadSketch::default();
    let (w, h) = (params.width, params.height);
    let s = params.cell_size_m;

    // One point per cell, row-major, jittered inside the snap radius.
    let mut grid_idx = vec![0usize; (w * h) as usize];
    for y in 0..h {
        for x in 0..w {
            let px = jitter(rng, x as f64 * s, p.jitter_m);
            let py = jitter(rng, y as f64 * s, p.jitter_m);
            grid_idx[(y * w + x) as usize] = sketch.add_point(px, py);
        }
    }

    for y in 0..h {
        for x in 0..w {
            let u = grid_idx[(y * w + x) as usize];
            if x < w - 1 && rng.gen_range(0.0..1.0) >= p.delete_prob {
                sketch.link(u, grid_idx[(y * w + x + 1) as usize]);
            }
            if y < h - 1 && rng.gen_range(0.0..1.0) >= p.delete_prob {
                sketch.link(u, grid_idx[((y + 1) * w + x) as usize]);
            }
            if p.add_diagonals {
                if x < w - 1 && y < h - 1 && rng.gen_range(0.0..1.0) >= p.delete_prob {
                    sketch.link(u, grid_idx[((y + 1) * w + x + 1) as usize]);
                }
                if x < w - 1 && y > 0 && rng.gen_range(0.0..1.0) >= p.delete_prob {
                    sketch.link(u, grid_idx[((y - 1) * w + x + 1) as usize]);
                }
            }
        }
    }
    sketch
}

// ── Lattice + radial overlay ──────────────────────────────────────────────────

fn lattice_radial(
    params: &GeneratorParams,
    rng: &mut SimRng,
    p: &LatticeRadialParams,
) -> RoadSketch {
    let mut sketch = lattice(params, rng, &p.lattice);

    let cx = params.box_width_m() / 2.0;
    let cy = params.box_height_m() / 2.0;
    let center = sketch.add_point(cx, cy);

    // ring_nodes[ring][ray]
    let mut ring_nodes = vec![Vec::with_capacity(p.num_rays); p.num_rings];
    for ray in 0..p.num_rays {
        let theta = std::f64::consts::TAU * ray as f64 / p.num_rays as f64;
        for ring in 1..=p.num_rings {
            let radius = ring as f64 * p.ring_spacing_m;
            let x = jitter(rng, cx + theta.cos() * radius, p.lattice.jitter_m);
            let y = jitter(rng, cy + theta.sin() * radius, p.lattice.jitter_m);
            ring_nodes[ring - 1].push(sketch.add_point(x, y));
        }
    }

    // Rays: center outwards through each ring.
    for ray in 0..p.num_rays {
        let mut prev = center;
        for ring in 0..p.num_rings {
            let node = ring_nodes[ring][ray];
            sketch.link(prev, node);
            prev = node;
        }
    }
    // Ring circumferences.
    for nodes in &ring_nodes {
        for i in 0..nodes.len() {
            sketch.link(nodes[i], nodes[(i + 1) % nodes.len()]);
        }
    }
    sketch
}

// ── Space colonization ────────────────────────────────────────────────────────

struct Attraction {
    point: [f64; 2],
    index: usize,
}

impl RTreeObject for Attraction {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.point)
    }
}

impl PointDistance for Attraction {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.point[0] - point[0];
        let dy = self.point[1] - point[1];
        dx * dx + dy * dy
    }
}

fn space_colonization(
    params: &GeneratorParams,
    rng: &mut SimRng,
    p: &SpaceColonizationParams,
) -> RoadSketch {
    let mut sketch = RoadSketch::default();
    let (bw, bh) = (params.box_width_m(), params.box_height_m());
    let (cx, cy) = (bw / 2.0, bh / 2.0);
    let center = sketch.add_point(cx, cy);

    // ── Attraction field: a dense core plus a stratified fill ─────────────
    let n = p.attractions.max(1);
    let mut attractions: Vec<[f64; 2]> = Vec::with_capacity(n);
    let core = n.min(20);
    for _ in 0..core {
        let angle = rng.gen_range(0.0..std::f64::consts::TAU);
        let dist = rng.gen_range(0.0..1.0) * p.capture_radius_m * 0.8;
        attractions.push([cx + angle.cos() * dist, cy + angle.sin() * dist]);
    }
    let strata = 10usize;
    let (cell_w, cell_h) = (bw / strata as f64, bh / strata as f64);
    let per_cell = n / (strata * strata);
    'fill: for gy in 0..strata {
        for gx in 0..strata {
            for _ in 0..per_cell {
                if attractions.len() >= n {
                    break 'fill;
                }
                let x = gx as f64 * cell_w + rng.gen_range(0.0..1.0) * cell_w;
                let y = gy as f64 * cell_h + rng.gen_range(0.0..1.0) * cell_h;
                attractions.push([x, y]);
            }
        }
    }
    while attractions.len() < n {
        let gx = rng.gen_range(0..strata);
        let gy = rng.gen_range(0..strata);
        let x = gx as f64 * cell_w + rng.gen_range(0.0..1.0) * cell_w;
        let y = gy as f64 * cell_h + rng.gen_range(0.0..1.0) * cell_h;
        attractions.push([x, y]);
    }

    let mut alive = vec![true; attractions.len()];
    let mut alive_count = attractions.len();
    let build_tree = |alive: &[bool]| {
        RTree::bulk_load(
            attractions
                .iter()
                .enumerate()
                .filter(|(i, _)| alive[*i])
                .map(|(index, &point)| Attraction { point, index })
                .collect(),
        )
    };
    let mut tree = build_tree(&alive);

    // ── Growth ────────────────────────────────────────────────────────────
    let mut frontier = vec![center];
    let max_iterations = n * 3;
    let capture_2 = p.capture_radius_m * p.capture_radius_m;

    for iteration in 0..max_iterations {
        if alive_count == 0 || frontier.is_empty() {
            break;
        }
        let mut next_frontier = Vec::new();

        for &u in &frontier {
            let pos = sketch.points[u];
            // Closest live attraction within the capture radius; ties go to
            // the lowest index so growth is deterministic.
            let mut closest: Option<(usize, f64)> = None;
            for attr in tree.locate_within_distance([pos.x, pos.y], capture_2) {
                if !alive[attr.index] {
                    continue;
                }
                let d2 = attr.distance_2(&[pos.x, pos.y]);
                let better = match closest {
                    None => true,
                    Some((best_idx, best_d2)) => {
                        d2 < best_d2 || (d2 == best_d2 && attr.index < best_idx)
                    }
                };
                if better {
                    closest = Some((attr.index, d2));
                }
            }

            if let Some((idx, d2)) = closest {
                let dist = d2.sqrt();
                if dist <= 0.0 {
                    alive[idx] = false;
                    alive_count -= 1;
                    continue;
                }
                let step = p.step_size_m / dist;
                let target = attractions[idx];
                let nx = pos.x + (target[0] - pos.x) * step;
                let ny = pos.y + (target[1] - pos.y) * step;
                let v = sketch.add_point(nx, ny);
                sketch.link(u, v);
                next_frontier.push(v);

                if dist <= p.step_size_m * 1.2 {
                    alive[idx] = false;
                    alive_count -= 1;
                }
            }
        }

        if next_frontier.is_empty() {
            // Stalled: restart growth from any existing points that can
            // still reach a live attraction.
            for (i, point) in sketch.points.iter().enumerate() {
                let reachable = tree
                    .locate_within_distance([point.x, point.y], capture_2)
                    .any(|a| alive[a.index]);
                if reachable {
                    next_frontier.push(i);
                }
                if next_frontier.len() > 20 {
                    break;
                }
            }
            if next_frontier.is_empty() {
                break;
            }
        }
        frontier = next_frontier;

        if (iteration + 1) % 15 == 0 {
            tree = build_tree(&alive);
        }
    }
    sketch
}

// ── k-NN mesh ─────────────────────────────────────────────────────────────────

fn knn_mesh(params: &GeneratorParams, rng: &mut SimRng, p: &KnnMeshParams) -> RoadSketch {
    let mut sketch = RoadSketch::default();
    let (bw, bh) = (params.box_width_m(), params.box_height_m());

    for _ in 0..p.sites {
        let x = rng.gen_range(0.0..1.0) * bw;
        let y = rng.gen_range(0.0..1.0) * bh;
        sketch.add_point(x, y);
    }

    let tree = RTree::bulk_load(
        sketch
            .points
            .iter()
            .enumerate()
            .map(|(index, pt)| Attraction {
                point: [pt.x, pt.y],
                index,
            })
            .collect(),
    );

    for u in 0..sketch.points.len() {
        let pos = sketch.points[u];
        let neighbors: Vec<usize> = tree
            .nearest_neighbor_iter(&[pos.x, pos.y])
            .filter(|a| a.index != u)
            .take(p.k)
            .map(|a| a.index)
            .collect();
        for v in neighbors {
            sketch.link(u, v);
        }
    }
    sketch
}

// ── L-system ──────────────────────────────────────────────────────────────────

fn l_system(params: &GeneratorParams, p: &LSystemParams) -> RoadSketch {
    let mut sketch = RoadSketch::default();

    // Expand the axiom.
    let mut current = p.axiom.clone();
    for _ in 0..p.iterations {
        let mut next = String::with_capacity(current.len() * 2);
        for ch in current.chars() {
            match p.rules.get(&ch) {
                Some(rule) => next.push_str(rule),
                None => next.push(ch),
            }
        }
        current = next;
    }

    #[derive(Clone, Copy)]
    struct Turtle {
        x: f64,
        y: f64,
        angle: f64,
    }

    let mut state = Turtle {
        x: params.box_width_m() / 2.0,
        y: params.box_height_m() / 2.0,
        angle: -std::f64::consts::FRAC_PI_2,
    };
    let mut stack: Vec<Turtle> = Vec::new();
    let mut prev = sketch.add_point(state.x, state.y);

    for ch in current.chars() {
        match ch {
            'F' | 'G' => {
                let nx = state.x + p.step_m * state.angle.cos();
                let ny = state.y + p.step_m * state.angle.sin();
                let node = sketch.add_point(nx, ny);
                sketch.link(prev, node);
                state.x = nx;
                state.y = ny;
                prev = node;
            }
            '+' => state.angle += p.angle_deg.to_radians(),
            '-' => state.angle -= p.angle_deg.to_radians(),
            '[' => stack.push(state),
            ']' => {
                if let Some(saved) = stack.pop() {
                    state = saved;
                    // Resume drawing from the point we branched at.
                    prev = sketch
                        .points
                        .iter()
                        .position(|pt| {
                            (pt.x - state.x).abs() < 1e-3 && (pt.y - state.y).abs() < 1e-3
                        })
                        .unwrap_or(prev);
                }
            }
            _ => {}
        }
    }
    sketch
}

// ── Lorenz attractor ──────────────────────────────────────────────────────────

fn lorenz(params: &GeneratorParams, rng: &mut SimRng, p: &LorenzParams) -> RoadSketch {
    let mut sketch = RoadSketch::default();
    let (cx, cy) = (params.box_width_m() / 2.0, params.box_height_m() / 2.0);

    let mut x = rng.gen_range(0.0..1.0) * 10.0 - 5.0;
    let mut y = rng.gen_range(0.0..1.0) * 10.0 - 5.0;
    let mut z = rng.gen_range(0.0..1.0) * 10.0 - 5.0;

    let deriv = |x: f64, y: f64, z: f64| {
        (
            p.sigma * (y - x),
            x * (p.rho - z) - y,
            x * y - p.beta * z,
        )
    };

    let mut prev = sketch.add_point(x * p.scale_x + cx, y * p.scale_y + cy);

    for _ in 0..p.num_steps {
        // RK4 integration step.
        let (k1x, k1y, k1z) = deriv(x, y, z);
        let (k2x, k2y, k2z) = deriv(
            x + p.step_size * k1x / 2.0,
            y + p.step_size * k1y / 2.0,
            z + p.step_size * k1z / 2.0,
        );
        let (k3x, k3y, k3z) = deriv(
            x + p.step_size * k2x / 2.0,
            y + p.step_size * k2y / 2.0,
            z + p.step_size * k2z / 2.0,
        );
        let (k4x, k4y, k4z) = deriv(
            x + p.step_size * k3x,
            y + p.step_size * k3y,
            z + p.step_size * k3z,
        );
        x += (p.step_size / 6.0) * (k1x + 2.0 * k2x + 2.0 * k3x + k4x);
        y += (p.step_size / 6.0) * (k1y + 2.0 * k2y + 2.0 * k3y + k4y);
        z += (p.step_size / 6.0) * (k1z + 2.0 * k2z + 2.0 * k3z + k4z);

        let node = sketch.add_point(x * p.scale_x + cx, y * p.scale_y + cy);
        sketch.link(prev, node);
        prev = node;
    }
    sketch
}

// ── Pure random ───────────────────────────────────────────────────────────────

fn random(params: &GeneratorParams, rng: &mut SimRng, p: &RandomParams) -> RoadSketch {
    let mut sketch = RoadSketch::default();
    let (bw, bh) = (params.box_width_m(), params.box_height_m());

    for _ in 0..p.node_count {
        let x = rng.gen_range(0.0..1.0) * bw;
        let y = rng.gen_range(0.0..1.0) * bh;
        sketch.add_point(x, y);
    }

    // A chain keeps the base graph connected; extras add shortcuts.
    for i in 1..sketch.points.len() {
        sketch.link(i - 1, i);
    }
    for _ in 0..p.extra_edges {
        let u = rng.gen_range(0..sketch.points.len());
        let v = rng.gen_range(0..sketch.points.len());
        if u == v {
            continue;
        }
        let congestion = 1.0 + rng.gen_range(0.0..1.0) * 0.25;
        sketch.link_with(u, v, congestion);
    }
    sketch
}
