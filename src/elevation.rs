//! Integer elevation assignment
//!
//! Layered elevation synthesis over the classified mesh:
//! 1. Base relief from coast distance
//! 2. Ridge seeds at inland coast-distance maxima, picked by a weighted
//!    farthest-point draw
//! 3. Ridge boost rings around the seeds
//! 4. Ridge connection along shortest land paths, then outward widening
//! 5. Ocean-distance caps
//! 6. Lowland plateau smoothing
//! 7. Water depth rings below sea level
//!
//! Land elevations live in 1..=32; water is 0 or negative down to -6.

use std::collections::VecDeque;

use crate::controls::{Controls, MAX_ELEVATION};
use crate::geometry::lerp;
use crate::mesh::MeshGraph;
use crate::rng::{tags, Lcg32};
use crate::water::WaterState;

/// Elevation output: integer face field plus derived vertex means.
#[derive(Clone, Debug, Default)]
pub struct ElevationState {
    /// Per-face elevation: land in 1..=32, water in -6..=0.
    pub face_elevation: Vec<i32>,
    /// Mean of incident face elevations, per vertex.
    pub vertex_elevation: Vec<f64>,
    /// Intermediate coast-relief term, retained for refinement passes.
    pub land_base_level: Vec<i32>,
    /// Intermediate ridge term, retained for refinement passes.
    pub ridge_boost: Vec<i32>,
}

impl ElevationState {
    /// Mean face elevation at a vertex, the quantity river tracing
    /// descends along.
    pub fn vertex_height(&self, vertex: crate::mesh::VertexId) -> f64 {
        self.vertex_elevation[vertex.idx()]
    }
}

/// Exponent shaping base relief against normalized coast distance.
const RELIEF_EXPONENT: f64 = 1.6;
/// Elevation assigned everywhere when the map has no water.
const UNIFORM_LAND_ELEVATION: i32 = 2;
/// Coast distance at which ridges reach full strength.
const RIDGE_COAST_RAMP: i32 = 4;
/// Deepest water ring used for colouring.
const MAX_WATER_DEPTH: i32 = -6;
/// Elevation at or below which plateau smoothing applies.
const LOWLAND_SMOOTH_CEILING: i32 = 10;

/// Build the elevation field for a classified mesh.
pub fn build(mesh: &MeshGraph, water: &WaterState, controls: &Controls) -> ElevationState {
    let n = mesh.faces.len();
    let mut state = ElevationState {
        face_elevation: vec![0; n],
        vertex_elevation: vec![0.0; mesh.vertices.len()],
        land_base_level: vec![0; n],
        ridge_boost: vec![0; n],
    };

    if !water.has_land {
        assign_water_depth(mesh, water, &mut state);
        average_vertices(mesh, &mut state);
        return state;
    }

    if !water.has_water {
        // No coast to measure relief from; the whole map is mild upland
        for &f in &water.land_faces {
            state.land_base_level[f.idx()] = UNIFORM_LAND_ELEVATION;
            state.face_elevation[f.idx()] = UNIFORM_LAND_ELEVATION;
        }
        average_vertices(mesh, &mut state);
        return state;
    }

    base_relief(water, controls, &mut state);

    let seeds = pick_ridge_seeds(mesh, water, controls);
    ridge_boost_rings(mesh, water, controls, &seeds, &mut state);
    connect_ridges(mesh, water, controls, &seeds, &mut state);
    widen_ridges(mesh, water, controls, &mut state);
    apply_ocean_clamps(water, controls, &mut state);

    for &f in &water.land_faces {
        let idx = f.idx();
        let total = state.land_base_level[idx] + state.ridge_boost[idx];
        state.face_elevation[idx] = total.clamp(1, MAX_ELEVATION);
    }

    smooth_lowlands(mesh, water, controls, &mut state);
    assign_water_depth(mesh, water, &mut state);
    average_vertices(mesh, &mut state);

    state
}

/// Step 1: relief rises with normalized coast distance.
fn base_relief(water: &WaterState, controls: &Controls, state: &mut ElevationState) {
    let max_distance = water
        .land_faces
        .iter()
        .map(|&f| water.land_distance[f.idx()])
        .max()
        .unwrap_or(0);

    for &f in &water.land_faces {
        let idx = f.idx();
        let base = if max_distance == 0 {
            1
        } else {
            let t = water.land_distance[idx] as f64 / max_distance as f64;
            1 + (t.powf(RELIEF_EXPONENT)
                * controls.land_relief
                * (MAX_ELEVATION - 1) as f64)
                .floor() as i32
        };
        state.land_base_level[idx] = base;
    }
}

/// Step 2: ridge seed selection.
///
/// Candidates are inland local maxima of the coast-distance field; if too
/// few exist the deepest inland faces fill in. The final set is drawn one
/// seed at a time with weights blending coast depth against separation
/// from already-picked seeds.
fn pick_ridge_seeds(mesh: &MeshGraph, water: &WaterState, controls: &Controls) -> Vec<usize> {
    let mut candidates: Vec<usize> = Vec::new();
    for &f in &water.land_faces {
        let idx = f.idx();
        if water.land_distance[idx] <= 2 {
            continue;
        }
        let local_max = mesh.faces[idx].adjacent_faces.iter().all(|&adj| {
            !water.is_land[adj.idx()]
                || water.land_distance[adj.idx()] <= water.land_distance[idx]
        });
        if local_max {
            candidates.push(idx);
        }
    }

    let want = controls.ridge_count as usize;
    if candidates.len() < want {
        let mut deepest: Vec<usize> = water.land_faces.iter().map(|f| f.idx()).collect();
        deepest.sort_by(|&a, &b| {
            water.land_distance[b]
                .cmp(&water.land_distance[a])
                .then(a.cmp(&b))
        });
        for idx in deepest {
            if candidates.len() >= want {
                break;
            }
            if !candidates.contains(&idx) {
                candidates.push(idx);
            }
        }
        candidates.sort_unstable();
    }
    if candidates.is_empty() {
        return Vec::new();
    }

    let max_distance = candidates
        .iter()
        .map(|&i| water.land_distance[i])
        .max()
        .unwrap_or(1)
        .max(1) as f64;
    let diagonal = (mesh.width * mesh.width + mesh.height * mesh.height).sqrt();
    let separation = controls.ridge_separation;

    let mut rng = Lcg32::substream(controls.seed, tags::ELEVATION);
    let mut picked: Vec<usize> = Vec::new();

    while picked.len() < want && picked.len() < candidates.len() {
        let weights: Vec<f64> = candidates
            .iter()
            .map(|&idx| {
                if picked.contains(&idx) {
                    return 0.0;
                }
                let depth = water.land_distance[idx] as f64 / max_distance;
                let spread = if picked.is_empty() {
                    1.0
                } else {
                    let p = mesh.faces[idx].point;
                    picked
                        .iter()
                        .map(|&s| mesh.faces[s].point.distance(p))
                        .fold(f64::MAX, f64::min)
                        / diagonal
                };
                (1.0 - separation) * depth + separation * spread
            })
            .collect();

        match rng.weighted_choice(&weights) {
            Some(choice) => picked.push(candidates[choice]),
            None => break,
        }
    }

    picked
}

/// Step 3: boost rings around the seeds.
fn ridge_boost_rings(
    mesh: &MeshGraph,
    water: &WaterState,
    controls: &Controls,
    seeds: &[usize],
    state: &mut ElevationState,
) {
    if seeds.is_empty() {
        return;
    }

    let radius = lerp(2.0, 10.0, controls.ridge_distribution).round().max(1.0);
    let exponent = lerp(2.2, 3.2, controls.ridge_strength);

    let rings = bfs_rings(mesh, water, seeds);
    for &f in &water.land_faces {
        let idx = f.idx();
        let Some(ring) = rings[idx] else { continue };
        if ring as f64 > radius {
            continue;
        }
        let t = 1.0 - ring as f64 / radius;
        let coast_factor =
            water.land_distance[idx].min(RIDGE_COAST_RAMP) as f64 / RIDGE_COAST_RAMP as f64;
        let boost = (t.powf(exponent)
            * coast_factor
            * controls.ridge_strength
            * (MAX_ELEVATION - 1) as f64)
            .round() as i32;
        state.ridge_boost[idx] = state.ridge_boost[idx].max(boost);
    }
}

/// Multi-source BFS ring distance over land. `None` for unreached faces.
fn bfs_rings(mesh: &MeshGraph, water: &WaterState, sources: &[usize]) -> Vec<Option<u32>> {
    let mut rings: Vec<Option<u32>> = vec![None; mesh.faces.len()];
    let mut queue = VecDeque::new();
    for &s in sources {
        if rings[s].is_none() {
            rings[s] = Some(0);
            queue.push_back(s);
        }
    }
    while let Some(idx) = queue.pop_front() {
        let ring = rings[idx].unwrap();
        for &adj in &mesh.faces[idx].adjacent_faces {
            let a = adj.idx();
            if water.is_land[a] && rings[a].is_none() {
                rings[a] = Some(ring + 1);
                queue.push_back(a);
            }
        }
    }
    rings
}

/// Step 4a: connect each later seed to the nearest earlier seed along the
/// shortest land path, blending path boosts toward the endpoint
/// interpolation. Links longer than the continuity threshold are skipped.
fn connect_ridges(
    mesh: &MeshGraph,
    water: &WaterState,
    controls: &Controls,
    seeds: &[usize],
    state: &mut ElevationState,
) {
    if seeds.len() < 2 || controls.ridge_continuity <= 0.0 {
        return;
    }

    let max_link = lerp(6.0, 26.0, controls.ridge_continuity_threshold).round() as usize;
    let mut connected: Vec<usize> = vec![seeds[0]];

    for &seed in &seeds[1..] {
        if let Some(path) = shortest_land_path(mesh, water, seed, &connected) {
            if path.len() - 1 <= max_link {
                blend_path(controls, &path, state);
            }
        }
        connected.push(seed);
    }
}

/// BFS shortest path (in faces) from `start` to the nearest of `targets`.
/// Returns the path start..=target, or `None` when unreachable.
fn shortest_land_path(
    mesh: &MeshGraph,
    water: &WaterState,
    start: usize,
    targets: &[usize],
) -> Option<Vec<usize>> {
    let n = mesh.faces.len();
    let mut parent: Vec<i32> = vec![-2; n]; // -2 unvisited, -1 root
    let mut queue = VecDeque::new();
    parent[start] = -1;
    queue.push_back(start);

    let mut found = None;
    'search: while let Some(idx) = queue.pop_front() {
        if targets.contains(&idx) && idx != start {
            found = Some(idx);
            break 'search;
        }
        for &adj in &mesh.faces[idx].adjacent_faces {
            let a = adj.idx();
            if water.is_land[a] && parent[a] == -2 {
                parent[a] = idx as i32;
                queue.push_back(a);
            }
        }
    }

    let mut at = found?;
    let mut path = vec![at];
    while parent[at] >= 0 {
        at = parent[at] as usize;
        path.push(at);
    }
    path.reverse(); // now start..=target
    Some(path)
}

/// Raise interior path faces toward the interpolation of the endpoint
/// boosts, weighted by `ridge_continuity`.
fn blend_path(controls: &Controls, path: &[usize], state: &mut ElevationState) {
    let len = path.len() - 1;
    if len < 1 {
        return;
    }
    let from = state.ridge_boost[path[0]] as f64;
    let to = state.ridge_boost[path[len]] as f64;
    for (j, &idx) in path.iter().enumerate().skip(1).take(len - 1) {
        let along = lerp(from, to, j as f64 / len as f64);
        let current = state.ridge_boost[idx] as f64;
        let target = current.max(along);
        state.ridge_boost[idx] = lerp(current, target, controls.ridge_continuity).round() as i32;
    }
}

/// Step 4b: widen ridges outward with quadratic falloff.
fn widen_ridges(
    mesh: &MeshGraph,
    water: &WaterState,
    controls: &Controls,
    state: &mut ElevationState,
) {
    let width = lerp(0.0, 6.0, controls.ridge_width).round() as u32;
    if width == 0 {
        return;
    }

    // Multi-source BFS carrying the boost of the nearest ridge face
    let n = mesh.faces.len();
    let mut ring: Vec<Option<u32>> = vec![None; n];
    let mut source_boost: Vec<i32> = vec![0; n];
    let mut queue = VecDeque::new();

    for &f in &water.land_faces {
        let idx = f.idx();
        if state.ridge_boost[idx] >= 1 {
            ring[idx] = Some(0);
            source_boost[idx] = state.ridge_boost[idx];
            queue.push_back(idx);
        }
    }

    let falloff_span = (width + 1) as f64;
    while let Some(idx) = queue.pop_front() {
        let r = ring[idx].unwrap();
        if r >= width {
            continue;
        }
        for &adj in &mesh.faces[idx].adjacent_faces {
            let a = adj.idx();
            if !water.is_land[a] || ring[a].is_some() {
                continue;
            }
            let next_ring = r + 1;
            ring[a] = Some(next_ring);
            source_boost[a] = source_boost[idx];
            let fall = 1.0 - (next_ring as f64 / falloff_span).powi(2);
            let contribution = (source_boost[idx] as f64 * fall).round() as i32;
            state.ridge_boost[a] = state.ridge_boost[a].max(contribution);
            queue.push_back(a);
        }
    }
}

/// Step 5: optional caps tying peaks to distance from the ocean.
fn apply_ocean_clamps(water: &WaterState, controls: &Controls, state: &mut ElevationState) {
    if controls.ridge_ocean_clamp <= 0.0 && controls.ocean_peak_clamp <= 0.0 {
        return;
    }
    for &f in &water.land_faces {
        let idx = f.idx();
        let distance_cap = 2 * water.land_distance[idx];

        if controls.ridge_ocean_clamp > 0.0 {
            let allowed = lerp(
                (MAX_ELEVATION - 1) as f64,
                distance_cap as f64,
                controls.ridge_ocean_clamp,
            )
            .round() as i32;
            state.ridge_boost[idx] = state.ridge_boost[idx].min(allowed.max(0));
        }

        if controls.ocean_peak_clamp > 0.0 {
            let allowed = lerp(
                MAX_ELEVATION as f64,
                distance_cap as f64,
                controls.ocean_peak_clamp,
            )
            .round() as i32;
            let total = state.land_base_level[idx] + state.ridge_boost[idx];
            if total > allowed.max(1) {
                // Take the excess out of the ridge term first, then relief
                let mut over = total - allowed.max(1);
                let cut = over.min(state.ridge_boost[idx]);
                state.ridge_boost[idx] -= cut;
                over -= cut;
                state.land_base_level[idx] = (state.land_base_level[idx] - over).max(1);
            }
        }
    }
}

/// Step 6: blend lowland faces toward their land-neighbor average.
fn smooth_lowlands(
    mesh: &MeshGraph,
    water: &WaterState,
    controls: &Controls,
    state: &mut ElevationState,
) {
    if controls.plateau_strength <= 0.0 {
        return;
    }
    // Blend against the pre-smoothing snapshot so face order cannot leak
    let before = state.face_elevation.clone();

    for &f in &water.land_faces {
        let idx = f.idx();
        if before[idx] > LOWLAND_SMOOTH_CEILING {
            continue;
        }
        let mut sum = 0.0;
        let mut count = 0;
        for &adj in &mesh.faces[idx].adjacent_faces {
            if water.is_land[adj.idx()] {
                sum += before[adj.idx()] as f64;
                count += 1;
            }
        }
        if count == 0 {
            continue;
        }
        let average = sum / count as f64;
        let blended = lerp(before[idx] as f64, average, controls.plateau_strength);
        state.face_elevation[idx] = (blended.round() as i32).clamp(1, MAX_ELEVATION);
    }
}

/// Step 7: water depth rings from the shore, clipped for colouring.
fn assign_water_depth(mesh: &MeshGraph, water: &WaterState, state: &mut ElevationState) {
    let n = mesh.faces.len();
    let mut ring: Vec<Option<i32>> = vec![None; n];
    let mut queue = VecDeque::new();

    for idx in 0..n {
        if water.is_land[idx] {
            continue;
        }
        let shore = mesh.faces[idx]
            .adjacent_faces
            .iter()
            .any(|&adj| water.is_land[adj.idx()]);
        if shore {
            ring[idx] = Some(0);
            queue.push_back(idx);
        }
    }

    while let Some(idx) = queue.pop_front() {
        let r = ring[idx].unwrap();
        for &adj in &mesh.faces[idx].adjacent_faces {
            let a = adj.idx();
            if !water.is_land[a] && ring[a].is_none() {
                ring[a] = Some(r + 1);
                queue.push_back(a);
            }
        }
    }

    for idx in 0..n {
        if !water.is_land[idx] {
            // Unreached water (an all-water map) sits at the first ring
            let r = ring[idx].unwrap_or(0);
            state.face_elevation[idx] = (-(r + 1)).max(MAX_WATER_DEPTH);
        }
    }
}

/// Vertex elevations are the mean of incident face elevations.
fn average_vertices(mesh: &MeshGraph, state: &mut ElevationState) {
    for (idx, vertex) in mesh.vertices.iter().enumerate() {
        if vertex.faces.is_empty() {
            state.vertex_elevation[idx] = 0.0;
            continue;
        }
        let sum: f64 = vertex
            .faces
            .iter()
            .map(|&f| state.face_elevation[f.idx()] as f64)
            .sum();
        state.vertex_elevation[idx] = sum / vertex.faces.len() as f64;
    }
}
