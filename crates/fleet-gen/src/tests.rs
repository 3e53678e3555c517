//! Unit and scenario tests for fleet-gen.

#[cfg(test)]
mod helpers {
    use crate::{GeneratorParams, LatticeParams, Topology};

    /// A lattice run with no deletions and no post passes: fully predictable.
    pub fn full_lattice(width: i64, height: i64, seed: u64) -> GeneratorParams {
        let mut params = GeneratorParams::new(width, height, seed);
        params.topology = Topology::Lattice(LatticeParams {
            delete_prob: 0.0,
            add_diagonals: false,
            jitter_m: 12.0,
        });
        params.cell_size_m = 80.0;
        params.refuel_fraction = 0.0;
        params.depot_fraction = 0.0;
        params.blocked_fraction = 0.0;
        params.road_density = 0.7;
        params.main_road_bias = 0.0;
        params.dead_end_bias = 0.0;
        params
    }
}

// ── Sketch builders ───────────────────────────────────────────────────────────

#[cfg(test)]
mod sketch {
    use fleet_core::SimRng;

    use crate::sketch::build_sketch;
    use crate::{GeneratorParams, Topology};

    fn sketch_for(topology: Topology) -> crate::RoadSketch {
        let mut params = GeneratorParams::new(12, 12, 7);
        params.topology = topology;
        let mut rng = SimRng::new(params.seed);
        build_sketch(&params, &mut rng)
    }

    #[test]
    fn lattice_full_link_count() {
        let sketch = sketch_for(Topology::Lattice(crate::LatticeParams {
            delete_prob: 0.0,
            add_diagonals: false,
            jitter_m: 0.0,
        }));
        // 12x12 points, (11*12)*2 links.
        assert_eq!(sketch.points.len(), 144);
        assert_eq!(sketch.links.len(), 264);
    }

    #[test]
    fn lattice_diagonals_add_links() {
        let plain = sketch_for(Topology::Lattice(crate::LatticeParams {
            delete_prob: 0.0,
            add_diagonals: false,
            jitter_m: 0.0,
        }));
        let diag = sketch_for(Topology::Lattice(crate::LatticeParams {
            delete_prob: 0.0,
            add_diagonals: true,
            jitter_m: 0.0,
        }));
        assert!(diag.links.len() > plain.links.len());
    }

    #[test]
    fn space_colonization_grows_from_center() {
        let sketch = sketch_for(Topology::space_colonization_for(12, 12));
        assert!(sketch.points.len() > 1, "growth should add points");
        assert_eq!(sketch.links.len(), sketch.points.len() - 1, "tree shape");
    }

    #[test]
    fn knn_mesh_links_every_site() {
        let sketch = sketch_for(Topology::knn_mesh_for(12, 12));
        let sites = sketch.points.len();
        assert!(sites > 0);
        let mut degree = vec![0usize; sites];
        for link in &sketch.links {
            degree[link.a] += 1;
            degree[link.b] += 1;
        }
        assert!(degree.iter().all(|&d| d > 0));
    }

    #[test]
    fn l_system_expands_axiom() {
        let sketch = sketch_for(Topology::LSystem(crate::LSystemParams::default()));
        // F[-F][+F] for 4 iterations draws plenty of strokes.
        assert!(sketch.links.len() > 30);
    }

    #[test]
    fn lorenz_is_a_path() {
        let sketch = sketch_for(Topology::Lorenz(crate::LorenzParams {
            num_steps: 200,
            ..crate::LorenzParams::default()
        }));
        assert_eq!(sketch.points.len(), 201);
        assert_eq!(sketch.links.len(), 200);
    }

    #[test]
    fn random_chain_connects_all() {
        let sketch = sketch_for(Topology::random_for(12, 12));
        assert!(sketch.links.len() >= sketch.points.len() - 1);
    }
}

// ── Rasterization ─────────────────────────────────────────────────────────────

#[cfg(test)]
mod raster {
    use fleet_core::Point;
    use fleet_grid::Grid;

    use crate::raster::rasterize;
    use crate::sketch::{RoadSketch, SketchLink};

    #[test]
    fn long_link_becomes_unit_chain() {
        let mut grid = Grid::new(6, 1, 100.0);
        let sketch = RoadSketch {
            points: vec![Point::new(0.0, 0.0), Point::new(500.0, 0.0)],
            links: vec![SketchLink {
                a: 0,
                b: 1,
                congestion: 1.0,
            }],
        };
        let added = rasterize(&mut grid, &sketch);
        assert_eq!(added, 5);
        for x in 0..5 {
            assert!(grid.connection_exists(x, 0, x + 1, 0));
        }
    }

    #[test]
    fn diagonal_link_walks_cells() {
        let mut grid = Grid::new(4, 4, 100.0);
        let sketch = RoadSketch {
            points: vec![Point::new(0.0, 0.0), Point::new(300.0, 300.0)],
            links: vec![SketchLink {
                a: 0,
                b: 1,
                congestion: 1.0,
            }],
        };
        let added = rasterize(&mut grid, &sketch);
        assert_eq!(added, 3, "pure diagonal walks one step per cell");
        // Every produced segment has positive length.
        for seg in grid.segments() {
            assert!(seg.length_km > 0.0);
        }
    }

    #[test]
    fn out_of_box_points_clamp_into_grid() {
        let mut grid = Grid::new(3, 3, 100.0);
        let sketch = RoadSketch {
            points: vec![Point::new(-250.0, -250.0), Point::new(900.0, 50.0)],
            links: vec![SketchLink {
                a: 0,
                b: 1,
                congestion: 1.0,
            }],
        };
        rasterize(&mut grid, &sketch);
        assert!(grid.segment_count() > 0);
        for seg in grid.segments() {
            let ((sx, sy), (ex, ey)) = grid.segment_cells(seg);
            assert!(grid.in_bounds(sx, sy) && grid.in_bounds(ex, ey));
        }
    }
}

// ── End-to-end generation scenarios ───────────────────────────────────────────

#[cfg(test)]
mod scenarios {
    use fleet_core::manhattan;
    use fleet_grid::{json, CellRole};

    use crate::{generate, GeneratorParams, LatticeParams, Topology};

    #[test]
    fn deterministic_full_lattice() {
        let params = super::helpers::full_lattice(10, 10, 42);
        let (grid, stats) = generate(&params).unwrap();

        assert_eq!(stats.total_cells, 100);
        assert_eq!(stats.road_cells, 100);
        assert_eq!(stats.special_cells, 0);
        assert_eq!(stats.total_segments, 180, "full 10x10 lattice");
        assert_eq!(stats.connected_components, 1);
        assert_eq!(grid.segment_count(), 180);
        grid.validate_invariants().unwrap();
    }

    #[test]
    fn same_seed_same_grid() {
        let params = super::helpers::full_lattice(10, 10, 42);
        let (a, _) = generate(&params).unwrap();
        let (b, _) = generate(&params).unwrap();
        assert_eq!(json::export(&a).unwrap(), json::export(&b).unwrap());
    }

    #[test]
    fn different_seeds_differ() {
        let mut a = GeneratorParams::new(10, 10, 1);
        let mut b = GeneratorParams::new(10, 10, 2);
        for p in [&mut a, &mut b] {
            p.topology = Topology::Lattice(LatticeParams::default());
        }
        let (ga, _) = generate(&a).unwrap();
        let (gb, _) = generate(&b).unwrap();
        assert_ne!(json::export(&ga).unwrap(), json::export(&gb).unwrap());
    }

    #[test]
    fn spacing_enforced() {
        let mut params = GeneratorParams::new(20, 20, 99);
        params.topology = Topology::Lattice(LatticeParams::default());
        params.refuel_fraction = 0.10;
        params.depot_fraction = 0.05;
        params.blocked_fraction = 0.0;
        let (grid, _) = generate(&params).unwrap();

        let refuels: Vec<_> = grid
            .cells()
            .iter()
            .filter(|c| c.role == CellRole::Refuel)
            .collect();
        let depots: Vec<_> = grid
            .cells()
            .iter()
            .filter(|c| c.role == CellRole::Depot)
            .collect();

        assert!(refuels.len() <= 40, "quota cap: {} refuels", refuels.len());
        assert!(depots.len() <= 20, "quota cap: {} depots", depots.len());

        for (i, a) in refuels.iter().enumerate() {
            for b in refuels.iter().skip(i + 1) {
                assert!(manhattan(a.x, a.y, b.x, b.y) >= 4, "fuel spacing");
            }
        }
        for (i, a) in depots.iter().enumerate() {
            for b in depots.iter().skip(i + 1) {
                assert!(manhattan(a.x, a.y, b.x, b.y) >= 6, "depot spacing");
            }
        }
        for cell in refuels {
            let amount = cell.refuel_amount.unwrap();
            assert!((1000.0..=3000.0).contains(&amount));
        }
    }

    #[test]
    fn blocked_cells_vetoed_by_connectivity() {
        let mut params = super::helpers::full_lattice(5, 5, 7);
        params.blocked_fraction = 0.5;
        let (grid, _) = generate(&params).unwrap();

        let blocked = grid
            .cells()
            .iter()
            .filter(|c| c.role == CellRole::Blocked)
            .count();
        assert!(blocked <= 2, "connectivity veto should reject most blocks, got {blocked}");
        grid.validate_invariants().unwrap();
    }

    #[test]
    fn blocked_cells_keep_clearance_and_carry_no_roads() {
        let mut params = GeneratorParams::new(16, 16, 11);
        params.topology = Topology::Lattice(LatticeParams {
            delete_prob: 0.25,
            add_diagonals: false,
            jitter_m: 12.0,
        });
        params.refuel_fraction = 0.06;
        params.depot_fraction = 0.03;
        params.blocked_fraction = 0.10;
        let (grid, _) = generate(&params).unwrap();

        let specials: Vec<_> = grid
            .cells()
            .iter()
            .filter(|c| matches!(c.role, CellRole::Refuel | CellRole::Depot))
            .collect();
        for cell in grid.cells() {
            if cell.role != CellRole::Blocked {
                continue;
            }
            assert!(cell.segments.is_empty(), "blocked cell carries roads");
            for s in &specials {
                assert!(
                    manhattan(cell.x, cell.y, s.x, s.y) >= 2,
                    "blocked cell ({},{}) too close to {} at ({},{})",
                    cell.x,
                    cell.y,
                    s.role,
                    s.x,
                    s.y
                );
            }
        }
    }

    #[test]
    fn every_topology_yields_connected_grid() {
        let topologies = [
            Topology::Lattice(LatticeParams::default()),
            Topology::LatticeRadial(crate::LatticeRadialParams::default()),
            Topology::space_colonization_for(12, 12),
            Topology::knn_mesh_for(12, 12),
            // Strokes must span at least a cell, or the turtle never leaves
            // its starting cell at this grid scale.
            Topology::LSystem(crate::LSystemParams {
                step_m: 120.0,
                iterations: 5,
                ..crate::LSystemParams::default()
            }),
            Topology::Lorenz(crate::LorenzParams {
                num_steps: 600,
                ..crate::LorenzParams::default()
            }),
            Topology::random_for(12, 12),
        ];
        for (i, topology) in topologies.into_iter().enumerate() {
            let mut params = GeneratorParams::new(12, 12, 100 + i as u64);
            params.topology = topology;
            params.refuel_fraction = 0.04;
            params.depot_fraction = 0.02;
            params.blocked_fraction = 0.03;
            let (grid, stats) = generate(&params)
                .unwrap_or_else(|e| panic!("topology {i} failed: {e}"));
            assert_eq!(stats.connected_components, 1, "topology {i}");
            grid.validate_invariants()
                .unwrap_or_else(|e| panic!("topology {i}: {e}"));
        }
    }

    #[test]
    fn connectivity_holds_across_seeds() {
        for seed in 0..6 {
            let mut params = GeneratorParams::new(14, 14, seed);
            params.topology = Topology::Lattice(LatticeParams {
                delete_prob: 0.3,
                add_diagonals: false,
                jitter_m: 12.0,
            });
            params.refuel_fraction = 0.05;
            params.depot_fraction = 0.02;
            params.blocked_fraction = 0.08;
            let (grid, stats) = generate(&params).unwrap();
            assert_eq!(stats.connected_components, 1, "seed {seed}");
            grid.validate_invariants().unwrap();
        }
    }

    #[test]
    fn artery_promotion_marks_segments() {
        let mut params = super::helpers::full_lattice(12, 12, 3);
        params.main_road_bias = 0.8;
        let (_grid, stats) = generate(&params).unwrap();
        // A full lattice already has every cardinal connection, so arteries
        // add nothing here; rerun on a sparse lattice instead.
        assert_eq!(stats.main_arteries, 0);

        let mut sparse = GeneratorParams::new(12, 12, 3);
        sparse.topology = Topology::Lattice(LatticeParams {
            delete_prob: 0.6,
            add_diagonals: false,
            jitter_m: 12.0,
        });
        sparse.main_road_bias = 0.8;
        sparse.refuel_fraction = 0.0;
        sparse.depot_fraction = 0.0;
        sparse.blocked_fraction = 0.0;
        let (sparse_grid, sparse_stats) = generate(&sparse).unwrap();
        assert!(sparse_stats.main_arteries > 0);
        assert!(sparse_grid.segments().any(|s| s.is_artery));
    }

    #[test]
    fn rejects_invalid_params() {
        let mut params = GeneratorParams::new(0, 10, 1);
        assert!(generate(&params).is_err());
        params.width = 10;
        params.refuel_fraction = 1.5;
        assert!(generate(&params).is_err());
    }

    #[test]
    fn generated_grid_round_trips_through_json() {
        let mut params = GeneratorParams::new(10, 10, 21);
        params.topology = Topology::Lattice(LatticeParams::default());
        params.refuel_fraction = 0.05;
        params.depot_fraction = 0.02;
        let (grid, _) = generate(&params).unwrap();

        let exported = json::export(&grid).unwrap();
        let imported = json::import(&exported).unwrap();
        assert_eq!(exported, json::export(&imported).unwrap());
    }
}
