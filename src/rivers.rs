//! River tracing along mesh edges
//!
//! Rivers are vertex chains walked along mesh edges from high ground
//! toward the sea. A trace prefers the incident edge whose far vertex has
//! the lowest mean face elevation and ends at a water-incident vertex (a
//! mouth), at a confluence with an existing river, or in a closed basin.
//! Ties are broken by ascending edge index, which makes the whole stage
//! byte-deterministic.
//!
//! One rule for pits: a stuck trace draws once from the river substream;
//! under `river_climb_chance` it takes the single lowest ascending step
//! and resumes, otherwise it ends as a closed-basin trace. Branch spawns
//! use their own draws and never consult the climb chance.

use std::collections::VecDeque;

use crate::controls::Controls;
use crate::elevation::ElevationState;
use crate::mesh::{EdgeId, MeshGraph, VertexId};
use crate::rng::{tags, Lcg32};
use crate::water::WaterState;

/// One traced river (trunk or branch).
#[derive(Clone, Debug)]
pub struct RiverTrace {
    /// Edges walked, in flow order.
    pub edges: Vec<EdgeId>,
    /// Vertices visited, one more than `edges`.
    pub vertices: Vec<VertexId>,
    /// 0 for trunks, parent depth + 1 for branches.
    pub depth: u8,
    /// True when the trace ended in a pit instead of reaching water.
    pub closed_basin: bool,
}

/// River stage output.
#[derive(Clone, Debug, Default)]
pub struct RiverState {
    pub traces: Vec<RiverTrace>,
    /// Edge-indexed: visited by any trace.
    pub river_edge_mask: Vec<bool>,
    /// Edge-indexed: trunk edges provinces may not grow across.
    pub barrier_edge_set: Vec<bool>,
}

impl RiverState {
    pub fn is_river(&self, edge: EdgeId) -> bool {
        self.river_edge_mask[edge.idx()]
    }

    pub fn is_barrier(&self, edge: EdgeId) -> bool {
        self.barrier_edge_set[edge.idx()]
    }
}

/// Land faces per river source at density 1.
const FACES_PER_SOURCE: f64 = 24.0;
/// Branches deeper than this never spawn further branches.
const MAX_BRANCH_DEPTH: u8 = 3;
/// Sources must start at least this high.
const MIN_SOURCE_HEIGHT: f64 = 2.0;

struct Tracer<'a> {
    mesh: &'a MeshGraph,
    water: &'a WaterState,
    elevation: &'a ElevationState,
    controls: &'a Controls,
    rng: Lcg32,
    edge_mask: Vec<bool>,
    vertex_mask: Vec<bool>,
    traces: Vec<RiverTrace>,
}

/// Trace the river network for a generated elevation field.
pub fn trace(
    mesh: &MeshGraph,
    water: &WaterState,
    elevation: &ElevationState,
    controls: &Controls,
) -> RiverState {
    let mut tracer = Tracer {
        mesh,
        water,
        elevation,
        controls,
        rng: Lcg32::substream(controls.seed, tags::RIVERS),
        edge_mask: vec![false; mesh.edges.len()],
        vertex_mask: vec![false; mesh.vertices.len()],
        traces: Vec::new(),
    };

    if water.has_land && water.has_water {
        let sources = tracer.pick_sources();
        let mut pending: VecDeque<(VertexId, u8)> =
            sources.into_iter().map(|v| (v, 0u8)).collect();

        while let Some((start, depth)) = pending.pop_front() {
            tracer.walk(start, depth, &mut pending);
        }
    }

    let mut barrier_edge_set = vec![false; mesh.edges.len()];
    for t in &tracer.traces {
        if t.depth == 0 {
            for &e in &t.edges {
                barrier_edge_set[e.idx()] = true;
            }
        }
    }

    RiverState {
        traces: tracer.traces,
        river_edge_mask: tracer.edge_mask,
        barrier_edge_set,
    }
}

impl<'a> Tracer<'a> {
    /// Weighted draw of source vertices, proportional to vertex height.
    fn pick_sources(&mut self) -> Vec<VertexId> {
        let land_count = self.water.land_faces.len() as f64;
        let count =
            (self.controls.river_density * land_count / FACES_PER_SOURCE).round() as usize;
        if count == 0 {
            return Vec::new();
        }

        let mut weights: Vec<f64> = self
            .mesh
            .vertices
            .iter()
            .enumerate()
            .map(|(idx, vertex)| {
                let touches_water = vertex
                    .faces
                    .iter()
                    .any(|&f| self.water.is_water(f));
                let height = self.elevation.vertex_elevation[idx];
                if touches_water || height < MIN_SOURCE_HEIGHT {
                    0.0
                } else {
                    height - 1.0
                }
            })
            .collect();

        let mut sources = Vec::with_capacity(count);
        for _ in 0..count {
            let Some(choice) = self.rng.weighted_choice(&weights) else {
                break;
            };
            weights[choice] = 0.0;
            sources.push(VertexId(choice as u32));
        }
        sources
    }

    fn vertex_touches_water(&self, v: VertexId) -> bool {
        self.mesh
            .vertex(v)
            .faces
            .iter()
            .any(|&f| self.water.is_water(f))
    }

    /// Lowest candidate step from `v`. `descending` selects whether the
    /// far vertex must be at or below the current height. Vertices
    /// already on this trace are never candidates; vertices on other
    /// traces are allowed only once `allow_confluence` is set (a step
    /// onto one ends the trace as a confluence).
    fn best_step(
        &self,
        v: VertexId,
        height: f64,
        descending: bool,
        in_trace: &[bool],
        allow_confluence: bool,
    ) -> Option<(EdgeId, VertexId)> {
        let mut best: Option<(f64, EdgeId, VertexId)> = None;
        for &e in &self.mesh.vertex(v).edges {
            if self.edge_mask[e.idx()] {
                continue;
            }
            let far = self.mesh.edge(e).other_vertex(v);
            if far == v || in_trace[far.idx()] {
                continue;
            }
            if self.vertex_mask[far.idx()] && !allow_confluence {
                continue;
            }
            let far_height = self.elevation.vertex_elevation[far.idx()];
            let ok = if descending {
                far_height <= height
            } else {
                far_height > height
            };
            if !ok {
                continue;
            }
            // Ties resolve to the lowest edge index
            let better = match &best {
                None => true,
                Some((h, id, _)) => {
                    far_height < *h || (far_height == *h && e < *id)
                }
            };
            if better {
                best = Some((far_height, e, far));
            }
        }
        best.map(|(_, e, far)| (e, far))
    }

    /// Walk one trace and enqueue its branch starts.
    fn walk(&mut self, start: VertexId, depth: u8, pending: &mut VecDeque<(VertexId, u8)>) {
        if self.vertex_touches_water(start) {
            return;
        }

        let mut vertices = vec![start];
        let mut edges = Vec::new();
        let mut closed_basin = false;
        let mut in_trace = vec![false; self.mesh.vertices.len()];
        in_trace[start.idx()] = true;

        let mut current = start;
        let limit = self.mesh.vertices.len();

        while edges.len() < limit {
            let height = self.elevation.vertex_elevation[current.idx()];
            // The first step may not immediately merge into another river
            let allow_confluence = !edges.is_empty();
            let step = match self.best_step(current, height, true, &in_trace, allow_confluence) {
                Some(step) => Some(step),
                None => {
                    // Pit: one draw decides escape or closed basin
                    if self.rng.chance(self.controls.river_climb_chance) {
                        self.best_step(current, height, false, &in_trace, allow_confluence)
                    } else {
                        None
                    }
                }
            };

            let Some((edge, far)) = step else {
                closed_basin = true;
                break;
            };

            self.edge_mask[edge.idx()] = true;
            edges.push(edge);
            vertices.push(far);
            in_trace[far.idx()] = true;

            if self.vertex_mask[far.idx()] || self.vertex_touches_water(far) {
                break;
            }

            // Branch draw for the vertex the trace just passed through
            if depth < MAX_BRANCH_DEPTH && self.rng.chance(self.controls.river_branch_chance) {
                pending.push_back((far, depth + 1));
            }

            current = far;
        }

        if edges.is_empty() {
            return;
        }

        for &v in &vertices {
            self.vertex_mask[v.idx()] = true;
        }
        self.traces.push(RiverTrace {
            edges,
            vertices,
            depth,
            closed_basin,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elevation;
    use crate::mesh::build_mesh;
    use crate::water;

    fn generate(seed: u32, density: f64) -> (MeshGraph, WaterState, ElevationState, RiverState) {
        let controls = Controls {
            seed,
            river_density: density,
            ..Controls::default()
        }
        .normalized()
        .unwrap();
        let mut rng = Lcg32::substream(seed, tags::MESH);
        let mesh = build_mesh(512.0, 512.0, controls.spacing, &mut rng, 0);
        let water = water::classify(&mesh, &controls);
        let elev = elevation::build(&mesh, &water, &controls);
        let rivers = trace(&mesh, &water, &elev, &controls);
        (mesh, water, elev, rivers)
    }

    #[test]
    fn test_traces_are_connected_edge_chains() {
        let (mesh, _, _, rivers) = generate(1337, 2.0);
        for t in &rivers.traces {
            assert_eq!(t.vertices.len(), t.edges.len() + 1);
            for (i, &e) in t.edges.iter().enumerate() {
                let edge = mesh.edge(e);
                let mut ends = [edge.vertices[0], edge.vertices[1]];
                ends.sort();
                let mut expect = [t.vertices[i], t.vertices[i + 1]];
                expect.sort();
                assert_eq!(ends, expect, "trace edge {i} does not join its vertices");
            }
        }
    }

    #[test]
    fn test_rivers_end_at_water_confluence_or_basin() {
        let (mesh, water, _, rivers) = generate(1337, 2.0);
        for (n, t) in rivers.traces.iter().enumerate() {
            let last = *t.vertices.last().unwrap();
            let touches_water = mesh
                .vertex(last)
                .faces
                .iter()
                .any(|&f| water.is_water(f));
            let at_confluence = rivers
                .traces
                .iter()
                .enumerate()
                .any(|(m, other)| m != n && other.vertices.contains(&last));
            assert!(
                touches_water || at_confluence || t.closed_basin,
                "trace {n} ends nowhere"
            );
        }
    }

    #[test]
    fn test_mask_matches_traces() {
        let (mesh, _, _, rivers) = generate(1337, 2.0);
        let mut expect = vec![false; mesh.edges.len()];
        for t in &rivers.traces {
            for &e in &t.edges {
                expect[e.idx()] = true;
            }
        }
        assert_eq!(expect, rivers.river_edge_mask);
    }

    #[test]
    fn test_barriers_are_trunk_edges_only() {
        let (_, _, _, rivers) = generate(1337, 2.0);
        for t in &rivers.traces {
            for &e in &t.edges {
                if t.depth == 0 {
                    assert!(rivers.barrier_edge_set[e.idx()]);
                }
            }
        }
        // Barriers are a subset of the river mask
        for (idx, &barrier) in rivers.barrier_edge_set.iter().enumerate() {
            if barrier {
                assert!(rivers.river_edge_mask[idx]);
            }
        }
    }

    #[test]
    fn test_zero_density_gives_no_rivers() {
        let (_, _, _, rivers) = generate(1337, 0.0);
        assert!(rivers.traces.is_empty());
        assert!(rivers.river_edge_mask.iter().all(|&m| !m));
    }

    #[test]
    fn test_tracing_is_deterministic() {
        let (_, _, _, a) = generate(2024, 1.5);
        let (_, _, _, b) = generate(2024, 1.5);
        assert_eq!(a.traces.len(), b.traces.len());
        for (ta, tb) in a.traces.iter().zip(&b.traces) {
            assert_eq!(ta.edges, tb.edges);
            assert_eq!(ta.vertices, tb.vertices);
            assert_eq!(ta.depth, tb.depth);
        }
        assert_eq!(a.river_edge_mask, b.river_edge_mask);
    }
}
