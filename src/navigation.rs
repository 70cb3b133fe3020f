//! Face-graph navigation
//!
//! Compiles the terrain into a weighted graph over land faces and answers
//! least-cost path queries with A*. Edge weights are step factors >= 1:
//! climbing above the lowland threshold raises them, river crossings
//! multiply them, and edges at or above the impassable threshold are not
//! in the graph at all. Multiplying a path's total cost by
//! `time_per_face_seconds` gives its traversal time.
//!
//! The search is pure and deterministic: the open set breaks f-ties by
//! larger g first, then by ascending face id.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::controls::Controls;
use crate::elevation::ElevationState;
use crate::mesh::{EdgeId, FaceId, MeshGraph};
use crate::pipeline::TerrainCache;
use crate::rivers::RiverState;
use crate::water::WaterState;

/// Movement-cost parameters, sanitized on construction.
#[derive(Clone, Copy, Debug)]
pub struct CostParams {
    pub time_per_face_seconds: f64,
    pub lowland_threshold: i32,
    pub impassable_threshold: i32,
    pub elevation_power: f64,
    pub elevation_gain_k: f64,
    pub river_penalty: f64,
    /// Mesh site spacing; scales the heuristic to step units.
    pub spacing: f64,
}

impl CostParams {
    pub fn from_controls(controls: &Controls) -> Self {
        Self {
            time_per_face_seconds: controls.time_per_face_seconds,
            lowland_threshold: controls.lowland_threshold,
            // Guard the invariant even for hand-built controls
            impassable_threshold: controls
                .impassable_threshold
                .max(controls.lowland_threshold + 1),
            elevation_power: controls.elevation_power,
            elevation_gain_k: controls.elevation_gain_k,
            river_penalty: controls.river_penalty,
            spacing: controls.spacing,
        }
    }
}

/// One traversable connection out of a face.
#[derive(Clone, Copy, Debug)]
pub struct NeighborLink {
    pub neighbor: FaceId,
    /// Step factor for this crossing (>= 1).
    pub step_cost: f64,
    pub via_edge: EdgeId,
}

/// Adjacency list of one face. Water faces keep an empty list.
#[derive(Clone, Debug, Default)]
pub struct FaceNode {
    pub neighbors: Vec<NeighborLink>,
}

/// Weighted face graph, an immutable view derived from a cache.
#[derive(Clone, Debug)]
pub struct NavigationGraph {
    pub nodes: Vec<FaceNode>,
    pub land_face_ids: Vec<FaceId>,
    pub params: CostParams,
}

/// A* answer: the face sequence from start to goal inclusive, and the
/// summed step cost. Unreachable goals give an empty path and +infinity.
#[derive(Clone, Debug)]
pub struct PathResult {
    pub faces: Vec<FaceId>,
    pub total_cost: f64,
}

impl PathResult {
    fn unreachable() -> Self {
        Self {
            faces: Vec::new(),
            total_cost: f64::INFINITY,
        }
    }

    pub fn is_reachable(&self) -> bool {
        !self.faces.is_empty()
    }
}

impl NavigationGraph {
    /// Build from a finished (or rivers-deep) cache.
    pub fn from_cache(cache: &TerrainCache) -> Self {
        Self::build(
            &cache.mesh,
            &cache.water,
            &cache.elevation,
            &cache.rivers,
            CostParams::from_controls(&cache.controls),
        )
    }

    /// Build from individual stage outputs.
    pub fn build(
        mesh: &MeshGraph,
        water: &WaterState,
        elevation: &ElevationState,
        rivers: &RiverState,
        params: CostParams,
    ) -> Self {
        let mut nodes: Vec<FaceNode> = vec![FaceNode::default(); mesh.faces.len()];

        for (idx, edge) in mesh.edges.iter().enumerate() {
            let [a, b] = edge.faces;
            if a.is_none() || b.is_none() {
                continue;
            }
            if !water.is_land[a.idx()] || !water.is_land[b.idx()] {
                continue;
            }
            let higher = elevation.face_elevation[a.idx()].max(elevation.face_elevation[b.idx()]);
            if higher >= params.impassable_threshold {
                continue;
            }

            let span = (params.impassable_threshold - params.lowland_threshold) as f64;
            let t = (((higher - params.lowland_threshold) as f64) / span).clamp(0.0, 1.0);
            let mut factor = 1.0 + params.elevation_gain_k * t.powf(params.elevation_power);
            if rivers.is_river(EdgeId(idx as u32)) {
                factor *= 1.0 + params.river_penalty;
            }

            nodes[a.idx()].neighbors.push(NeighborLink {
                neighbor: b,
                step_cost: factor,
                via_edge: EdgeId(idx as u32),
            });
            nodes[b.idx()].neighbors.push(NeighborLink {
                neighbor: a,
                step_cost: factor,
                via_edge: EdgeId(idx as u32),
            });
        }

        Self {
            nodes,
            land_face_ids: water.land_faces.clone(),
            params,
        }
    }

    /// Traversal time in seconds for a path result.
    pub fn travel_time(&self, path: &PathResult) -> f64 {
        path.total_cost * self.params.time_per_face_seconds
    }

    /// Least-cost path between two faces.
    pub fn find_path(&self, mesh: &MeshGraph, from: FaceId, to: FaceId) -> PathResult {
        if from.idx() >= self.nodes.len() || to.idx() >= self.nodes.len() {
            return PathResult::unreachable();
        }
        if from == to {
            return PathResult {
                faces: vec![from],
                total_cost: 0.0,
            };
        }

        let n = self.nodes.len();
        let goal = mesh.faces[to.idx()].point;
        let heuristic = |face: FaceId| -> f64 {
            mesh.faces[face.idx()].point.distance(goal) / self.params.spacing
        };

        let mut g_score = vec![f64::INFINITY; n];
        let mut came_from: Vec<FaceId> = vec![FaceId::NONE; n];
        let mut closed = vec![false; n];
        let mut open = BinaryHeap::new();

        g_score[from.idx()] = 0.0;
        open.push(OpenNode {
            f: heuristic(from),
            g: 0.0,
            face: from.0,
        });

        while let Some(node) = open.pop() {
            let face = FaceId(node.face);
            if closed[face.idx()] {
                continue;
            }
            closed[face.idx()] = true;

            if face == to {
                return self.reconstruct(&came_from, g_score[to.idx()], from, to);
            }

            for link in &self.nodes[face.idx()].neighbors {
                let next = link.neighbor;
                if closed[next.idx()] {
                    continue;
                }
                let tentative = g_score[face.idx()] + link.step_cost;
                if tentative < g_score[next.idx()] {
                    g_score[next.idx()] = tentative;
                    came_from[next.idx()] = face;
                    open.push(OpenNode {
                        f: tentative + heuristic(next),
                        g: tentative,
                        face: next.0,
                    });
                }
            }
        }

        PathResult::unreachable()
    }

    fn reconstruct(
        &self,
        came_from: &[FaceId],
        total_cost: f64,
        from: FaceId,
        to: FaceId,
    ) -> PathResult {
        let mut faces = vec![to];
        let mut at = to;
        while at != from {
            at = came_from[at.idx()];
            if at.is_none() {
                return PathResult::unreachable();
            }
            faces.push(at);
        }
        faces.reverse();
        PathResult { faces, total_cost }
    }
}

/// Open-set entry. Reverse-ordered so the heap pops the smallest f; ties
/// prefer the larger g (deeper progress), then the smaller face id.
#[derive(Clone, Copy)]
struct OpenNode {
    f: f64,
    g: f64,
    face: u32,
}

impl PartialEq for OpenNode {
    fn eq(&self, other: &Self) -> bool {
        self.f == other.f && self.g == other.g && self.face == other.face
    }
}

impl Eq for OpenNode {}

impl PartialOrd for OpenNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenNode {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .f
            .partial_cmp(&self.f)
            .unwrap_or(Ordering::Equal)
            .then_with(|| self.g.partial_cmp(&other.g).unwrap_or(Ordering::Equal))
            .then_with(|| other.face.cmp(&self.face))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controls::Config;
    use crate::geometry::Vec2;
    use crate::mesh::{Edge, Face, Vertex, VertexId};
    use crate::pipeline;
    use approx::assert_relative_eq;

    /// A hand-built row of `count` unit faces joined left to right.
    fn face_row(count: usize, spacing: f64) -> (MeshGraph, WaterState) {
        let mut mesh = MeshGraph {
            width: spacing * count as f64,
            height: spacing,
            faces: Vec::new(),
            vertices: vec![Vertex {
                point: Vec2::ZERO,
                faces: Vec::new(),
                adjacent_vertices: Vec::new(),
                edges: Vec::new(),
            }],
            edges: Vec::new(),
        };
        for i in 0..count {
            mesh.faces.push(Face {
                point: Vec2::new(spacing * (i as f64 + 0.5), spacing * 0.5),
                vertices: Vec::new(),
                adjacent_faces: Vec::new(),
                edges: Vec::new(),
                polygon: Vec::new(),
            });
        }
        for i in 0..count - 1 {
            let e = EdgeId(mesh.edges.len() as u32);
            mesh.edges.push(Edge {
                faces: [FaceId(i as u32), FaceId(i as u32 + 1)],
                vertices: [VertexId(0), VertexId(0)],
                midpoint: Vec2::ZERO,
            });
            mesh.faces[i].edges.push(e);
            mesh.faces[i + 1].edges.push(e);
            mesh.faces[i].adjacent_faces.push(FaceId(i as u32 + 1));
            mesh.faces[i + 1].adjacent_faces.push(FaceId(i as u32));
        }
        let water = WaterState {
            is_land: vec![true; count],
            land_faces: (0..count).map(|i| FaceId(i as u32)).collect(),
            ocean_water: vec![false; count],
            land_distance: vec![0; count],
            has_land: true,
            has_water: false,
        };
        (mesh, water)
    }

    fn flat_elevation(mesh: &MeshGraph, level: i32) -> ElevationState {
        ElevationState {
            face_elevation: vec![level; mesh.faces.len()],
            vertex_elevation: vec![level as f64; mesh.vertices.len()],
            land_base_level: vec![level; mesh.faces.len()],
            ridge_boost: vec![0; mesh.faces.len()],
        }
    }

    fn no_rivers(mesh: &MeshGraph) -> RiverState {
        RiverState {
            traces: Vec::new(),
            river_edge_mask: vec![false; mesh.edges.len()],
            barrier_edge_set: vec![false; mesh.edges.len()],
        }
    }

    fn default_params(spacing: f64) -> CostParams {
        CostParams {
            time_per_face_seconds: 1.0,
            lowland_threshold: 8,
            impassable_threshold: 26,
            elevation_power: 1.0,
            elevation_gain_k: 1.5,
            river_penalty: 2.0,
            spacing,
        }
    }

    #[test]
    fn test_river_crossing_cost_on_flat_row() {
        let (mesh, water) = face_row(3, 64.0);
        let elevation = flat_elevation(&mesh, 1);
        let mut rivers = no_rivers(&mesh);
        // The second crossing is a river
        rivers.river_edge_mask[1] = true;

        let graph = NavigationGraph::build(&mesh, &water, &elevation, &rivers, default_params(64.0));
        let path = graph.find_path(&mesh, FaceId(0), FaceId(2));
        assert_eq!(path.faces, vec![FaceId(0), FaceId(1), FaceId(2)]);
        // 1 face-time for the plain edge, (1 + 2) for the river edge
        assert_relative_eq!(path.total_cost, 4.0, max_relative = 1e-12);
        assert_relative_eq!(graph.travel_time(&path), 4.0, max_relative = 1e-12);
    }

    #[test]
    fn test_impassable_edges_disconnect() {
        let (mesh, water) = face_row(3, 64.0);
        let mut elevation = flat_elevation(&mesh, 1);
        elevation.face_elevation[1] = 30; // above the impassable threshold
        let rivers = no_rivers(&mesh);
        let graph = NavigationGraph::build(&mesh, &water, &elevation, &rivers, default_params(64.0));

        assert!(graph.nodes[1].neighbors.is_empty());
        let path = graph.find_path(&mesh, FaceId(0), FaceId(2));
        assert!(!path.is_reachable());
        assert!(path.total_cost.is_infinite());
    }

    #[test]
    fn test_lowland_steps_cost_exactly_one() {
        let (mesh, water) = face_row(5, 64.0);
        let elevation = flat_elevation(&mesh, 8);
        let rivers = no_rivers(&mesh);
        let graph = NavigationGraph::build(&mesh, &water, &elevation, &rivers, default_params(64.0));
        let path = graph.find_path(&mesh, FaceId(0), FaceId(4));
        assert_relative_eq!(path.total_cost, 4.0, max_relative = 1e-12);
    }

    #[test]
    fn test_same_face_path_is_free() {
        let (mesh, water) = face_row(3, 64.0);
        let elevation = flat_elevation(&mesh, 1);
        let rivers = no_rivers(&mesh);
        let graph = NavigationGraph::build(&mesh, &water, &elevation, &rivers, default_params(64.0));
        let path = graph.find_path(&mesh, FaceId(1), FaceId(1));
        assert_eq!(path.faces, vec![FaceId(1)]);
        assert_eq!(path.total_cost, 0.0);
    }

    /// Reference Dijkstra over the same weighted graph.
    fn dijkstra_cost(graph: &NavigationGraph, from: FaceId, to: FaceId) -> f64 {
        let n = graph.nodes.len();
        let mut dist = vec![f64::INFINITY; n];
        let mut done = vec![false; n];
        dist[from.idx()] = 0.0;
        loop {
            let mut best: Option<usize> = None;
            for i in 0..n {
                if !done[i]
                    && dist[i].is_finite()
                    && best.map_or(true, |b| dist[i] < dist[b])
                {
                    best = Some(i);
                }
            }
            let Some(at) = best else { break };
            if at == to.idx() {
                return dist[at];
            }
            done[at] = true;
            for link in &graph.nodes[at].neighbors {
                let next = link.neighbor.idx();
                if dist[at] + link.step_cost < dist[next] {
                    dist[next] = dist[at] + link.step_cost;
                }
            }
        }
        f64::INFINITY
    }

    #[test]
    fn test_astar_matches_dijkstra_on_generated_world() {
        let config = Config::new(512, 512).unwrap();
        let controls = Controls {
            seed: 1337,
            ..Controls::default()
        };
        let cache = pipeline::build(config, &controls, None).unwrap();
        let graph = NavigationGraph::from_cache(&cache);

        let land = &graph.land_face_ids;
        assert!(land.len() >= 2);
        // Sample pairs across the land set
        for i in (0..land.len()).step_by(5) {
            let from = land[i];
            let to = land[land.len() - 1 - i % land.len()];
            let astar = graph.find_path(&cache.mesh, from, to);
            let reference = dijkstra_cost(&graph, from, to);
            if reference.is_finite() {
                assert!(astar.is_reachable(), "A* missed a reachable pair");
                assert_relative_eq!(astar.total_cost, reference, max_relative = 1e-12);
                // No face on the path sits at or above the impassable cut
                for &f in &astar.faces {
                    assert!(
                        cache.elevation.face_elevation[f.idx()]
                            < graph.params.impassable_threshold
                            || f == from
                            || f == to
                    );
                }
            } else {
                assert!(!astar.is_reachable());
            }
        }
    }

    #[test]
    fn test_low_impassable_threshold_strands_uplands() {
        let config = Config::new(512, 512).unwrap();
        let controls = Controls {
            seed: 1337,
            lowland_threshold: 1,
            impassable_threshold: 2,
            ..Controls::default()
        };
        let cache = pipeline::build(config, &controls, None).unwrap();
        let graph = NavigationGraph::from_cache(&cache);

        // Every face at elevation >= 2 has no traversable edges at all
        for &f in &graph.land_face_ids {
            if cache.elevation.face_elevation[f.idx()] >= 2 {
                assert!(graph.nodes[f.idx()].neighbors.is_empty());
            }
        }
    }
}
