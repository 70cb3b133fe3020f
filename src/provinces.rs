//! Province partitioning of the land
//!
//! Land faces are carved into political provinces by balanced multi-source
//! growth:
//! 1. Flood-fill land into connected components
//! 2. Allocate seeds across components proportional to size (largest
//!    remainder), scaled by the island-size multipliers
//! 3. Place seeds per component by iterative farthest-point
//! 4. Grow all provinces at once from a min-heap whose score blends
//!    geometric distance with a size-balance term
//! 5. Assign any face the growth could not reach to the nearest seed
//! 6. Build the province graph: adjacency and outer (boundary) edges
//!
//! Growth never crosses a river barrier edge or an edge above the passage
//! elevation; crossing a plain river edge costs `province_river_penalty`.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};

use crate::controls::Controls;
use crate::elevation::ElevationState;
use crate::mesh::{EdgeId, FaceId, MeshGraph};
use crate::rivers::RiverState;
use crate::rng::{tags, Lcg32};
use crate::water::WaterState;

/// Index of a province in the graph arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProvinceId(pub u32);

impl ProvinceId {
    pub const NONE: ProvinceId = ProvinceId(u32::MAX);

    pub fn is_none(self) -> bool {
        self.0 == u32::MAX
    }

    pub fn idx(self) -> usize {
        self.0 as usize
    }
}

/// One province: a connected set of land faces.
#[derive(Clone, Debug)]
pub struct Province {
    /// Member faces in ascending id order.
    pub faces: Vec<FaceId>,
    /// Provinces sharing a boundary edge, ascending, de-duplicated.
    pub adjacent_provinces: Vec<ProvinceId>,
    /// Indices into `ProvinceGraph::outer_edges`.
    pub outer_edges: Vec<usize>,
}

/// A boundary edge of the province partition: either between two
/// provinces or between a province and water/exterior.
#[derive(Clone, Debug)]
pub struct OuterEdge {
    pub edge: EdgeId,
    pub provinces: [ProvinceId; 2],
    pub faces: [FaceId; 2],
}

/// Province stage output.
#[derive(Clone, Debug, Default)]
pub struct ProvinceGraph {
    pub provinces: Vec<Province>,
    pub outer_edges: Vec<OuterEdge>,
    /// Per-face province assignment; `NONE` for water.
    pub province_by_face: Vec<ProvinceId>,
    /// The face each province grew from, by province id.
    pub seed_faces: Vec<FaceId>,
    pub land_faces: Vec<FaceId>,
    pub is_land: Vec<bool>,
}

/// Components below this size count as tiny islands for seed allocation.
const SMALL_ISLAND_FACES: usize = 16;
/// Components holding more than this share of all land count as dominant.
const LARGE_ISLAND_SHARE: f64 = 0.5;

/// Heap node for balanced growth. Reverse-ordered so `BinaryHeap` pops
/// the lowest score; ties resolve by face id then province id so growth
/// never depends on float identity alone.
#[derive(Clone, Copy)]
struct GrowthNode {
    score: f64,
    travelled: f64,
    face: u32,
    province: u32,
}

impl PartialEq for GrowthNode {
    fn eq(&self, other: &Self) -> bool {
        self.score == other.score && self.face == other.face && self.province == other.province
    }
}

impl Eq for GrowthNode {}

impl PartialOrd for GrowthNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for GrowthNode {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .score
            .partial_cmp(&self.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.face.cmp(&self.face))
            .then_with(|| other.province.cmp(&self.province))
    }
}

/// Build the province partition and graph.
pub fn build(
    mesh: &MeshGraph,
    water: &WaterState,
    elevation: &ElevationState,
    rivers: &RiverState,
    controls: &Controls,
) -> ProvinceGraph {
    let n = mesh.faces.len();
    let mut graph = ProvinceGraph {
        provinces: Vec::new(),
        outer_edges: Vec::new(),
        province_by_face: vec![ProvinceId::NONE; n],
        seed_faces: Vec::new(),
        land_faces: water.land_faces.clone(),
        is_land: water.is_land.clone(),
    };

    if !water.has_land {
        build_outer_edges(mesh, &mut graph);
        return graph;
    }

    let components = land_components(mesh, water);
    let seats = allocate_seats(&components, controls);

    let mut rng = Lcg32::substream(controls.seed, tags::PROVINCES);
    let seed_faces = place_seeds(mesh, &components, &seats, &mut rng);

    grow_provinces(mesh, water, elevation, rivers, controls, &seed_faces, &mut rng, &mut graph);
    assign_leftovers(mesh, water, &seed_faces, &mut graph);
    collect_faces(water, &mut graph);
    build_outer_edges(mesh, &mut graph);

    graph.seed_faces = seed_faces;
    graph
}

/// Connected components of land faces, each listed in ascending order.
fn land_components(mesh: &MeshGraph, water: &WaterState) -> Vec<Vec<usize>> {
    let n = mesh.faces.len();
    let mut component: Vec<i32> = vec![-1; n];
    let mut components: Vec<Vec<usize>> = Vec::new();

    for &f in &water.land_faces {
        let start = f.idx();
        if component[start] >= 0 {
            continue;
        }
        let id = components.len() as i32;
        let mut members = Vec::new();
        let mut queue = VecDeque::new();
        component[start] = id;
        queue.push_back(start);
        while let Some(idx) = queue.pop_front() {
            members.push(idx);
            for &adj in &mesh.faces[idx].adjacent_faces {
                let a = adj.idx();
                if water.is_land[a] && component[a] < 0 {
                    component[a] = id;
                    queue.push_back(a);
                }
            }
        }
        members.sort_unstable();
        components.push(members);
    }

    components
}

/// Largest-remainder seat allocation across components, weighted by size
/// and the island multipliers, capped at one seed per face.
fn allocate_seats(components: &[Vec<usize>], controls: &Controls) -> Vec<usize> {
    let total_land: usize = components.iter().map(|c| c.len()).sum();
    let weights: Vec<f64> = components
        .iter()
        .map(|c| {
            let share = c.len() as f64 / total_land as f64;
            let multiplier = if c.len() < SMALL_ISLAND_FACES {
                controls.small_island_multiplier
            } else if share > LARGE_ISLAND_SHARE {
                controls.large_island_multiplier
            } else {
                1.0
            };
            c.len() as f64 * multiplier
        })
        .collect();

    let total_weight: f64 = weights.iter().sum();
    let want = controls.province_count as usize;
    let mut seats = vec![0usize; components.len()];

    if total_weight <= 0.0 {
        // All multipliers zeroed out: the biggest component carries one
        if let Some(biggest) = (0..components.len()).max_by_key(|&i| components[i].len()) {
            seats[biggest] = 1;
        }
        return seats;
    }

    let mut remainders: Vec<(f64, usize)> = Vec::with_capacity(components.len());
    let mut assigned = 0usize;
    for (i, w) in weights.iter().enumerate() {
        let exact = w / total_weight * want as f64;
        let floor = (exact.floor() as usize).min(components[i].len());
        seats[i] = floor;
        assigned += floor;
        remainders.push((exact - floor as f64, i));
    }

    // Hand out the remaining seats by descending remainder, then by
    // component id for determinism
    remainders.sort_by(|a, b| {
        b.0.partial_cmp(&a.0)
            .unwrap_or(Ordering::Equal)
            .then(a.1.cmp(&b.1))
    });
    let mut cursor = 0;
    while assigned < want && cursor < remainders.len() {
        let i = remainders[cursor].1;
        if seats[i] < components[i].len() {
            seats[i] += 1;
            assigned += 1;
        }
        cursor += 1;
        if cursor == remainders.len() && assigned < want {
            // All components saturated; stop rather than over-seed
            break;
        }
    }

    if seats.iter().all(|&s| s == 0) {
        if let Some(biggest) = (0..components.len()).max_by_key(|&i| components[i].len()) {
            seats[biggest] = 1;
        }
    }

    seats
}

/// Iterative farthest-point seed placement inside each component.
fn place_seeds(
    mesh: &MeshGraph,
    components: &[Vec<usize>],
    seats: &[usize],
    rng: &mut Lcg32,
) -> Vec<FaceId> {
    let mut seed_faces = Vec::new();

    for (component, &count) in components.iter().zip(seats) {
        if count == 0 {
            continue;
        }
        let mut picked: Vec<usize> = Vec::with_capacity(count);
        let first = component[rng.range_usize(0, component.len())];
        picked.push(first);

        while picked.len() < count {
            let mut best: Option<(f64, usize)> = None;
            for &candidate in component {
                if picked.contains(&candidate) {
                    continue;
                }
                let p = mesh.faces[candidate].point;
                let nearest = picked
                    .iter()
                    .map(|&s| mesh.faces[s].point.distance(p))
                    .fold(f64::MAX, f64::min);
                let better = match best {
                    None => true,
                    Some((d, i)) => nearest > d || (nearest == d && candidate < i),
                };
                if better {
                    best = Some((nearest, candidate));
                }
            }
            match best {
                Some((_, face)) => picked.push(face),
                None => break,
            }
        }

        seed_faces.extend(picked.into_iter().map(|i| FaceId(i as u32)));
    }

    seed_faces
}

/// Whether growth may cross this edge at all.
fn edge_passable(
    elevation: &ElevationState,
    rivers: &RiverState,
    controls: &Controls,
    edge: EdgeId,
    a: FaceId,
    b: FaceId,
) -> bool {
    if rivers.is_barrier(edge) {
        return false;
    }
    let higher = elevation.face_elevation[a.idx()].max(elevation.face_elevation[b.idx()]);
    higher <= controls.province_passage_elevation
}

/// Balanced multi-source growth over the passability-filtered face graph.
#[allow(clippy::too_many_arguments)]
fn grow_provinces(
    mesh: &MeshGraph,
    water: &WaterState,
    elevation: &ElevationState,
    rivers: &RiverState,
    controls: &Controls,
    seed_faces: &[FaceId],
    rng: &mut Lcg32,
    graph: &mut ProvinceGraph,
) {
    let count = seed_faces.len();
    graph.provinces = (0..count)
        .map(|_| Province {
            faces: Vec::new(),
            adjacent_provinces: Vec::new(),
            outer_edges: Vec::new(),
        })
        .collect();
    if count == 0 {
        return;
    }

    // Jittered size targets: every province draws once, in id order
    let total_land = water.land_faces.len() as f64;
    let base_target = (total_land / count as f64).max(1.0);
    let targets: Vec<f64> = (0..count)
        .map(|_| {
            let jitter = 1.0 + controls.province_size_variance * (2.0 * rng.next_f64() - 1.0);
            (base_target * jitter).max(1.0)
        })
        .collect();

    let balance_weight = (controls.spacing * 1.1).max(8.0);
    let mut sizes = vec![0usize; count];
    let mut heap: BinaryHeap<GrowthNode> = BinaryHeap::new();

    for (p, &seed) in seed_faces.iter().enumerate() {
        heap.push(GrowthNode {
            score: 0.0,
            travelled: 0.0,
            face: seed.0,
            province: p as u32,
        });
    }

    while let Some(node) = heap.pop() {
        let face = FaceId(node.face);
        if !graph.province_by_face[face.idx()].is_none() {
            continue;
        }
        let province = ProvinceId(node.province);
        graph.province_by_face[face.idx()] = province;
        sizes[province.idx()] += 1;

        let from = mesh.faces[face.idx()].point;
        for &edge_id in &mesh.faces[face.idx()].edges {
            let edge = mesh.edge(edge_id);
            let neighbor = edge.other_face(face);
            if neighbor.is_none()
                || !water.is_land[neighbor.idx()]
                || !graph.province_by_face[neighbor.idx()].is_none()
            {
                continue;
            }
            if !edge_passable(elevation, rivers, controls, edge_id, face, neighbor) {
                continue;
            }
            let mut travelled = node.travelled + from.distance(mesh.faces[neighbor.idx()].point);
            if rivers.is_river(edge_id) {
                travelled += controls.province_river_penalty;
            }
            let balance =
                balance_weight * (sizes[province.idx()] as f64 / targets[province.idx()]);
            heap.push(GrowthNode {
                score: travelled + balance,
                travelled,
                face: neighbor.0,
                province: province.0,
            });
        }
    }
}

/// Any land face the growth could not reach joins the nearest seed.
fn assign_leftovers(
    mesh: &MeshGraph,
    water: &WaterState,
    seed_faces: &[FaceId],
    graph: &mut ProvinceGraph,
) {
    if seed_faces.is_empty() {
        return;
    }
    for &f in &water.land_faces {
        let idx = f.idx();
        if !graph.province_by_face[idx].is_none() {
            continue;
        }
        let p = mesh.faces[idx].point;
        let mut best = 0usize;
        let mut best_distance = f64::MAX;
        for (i, &seed) in seed_faces.iter().enumerate() {
            let d = mesh.faces[seed.idx()].point.distance(p);
            if d < best_distance {
                best_distance = d;
                best = i;
            }
        }
        graph.province_by_face[idx] = ProvinceId(best as u32);
    }
}

/// Fill each province's face list in ascending order.
fn collect_faces(water: &WaterState, graph: &mut ProvinceGraph) {
    for &f in &water.land_faces {
        let p = graph.province_by_face[f.idx()];
        if !p.is_none() {
            graph.provinces[p.idx()].faces.push(f);
        }
    }
}

impl ProvinceGraph {
    /// Greedy color classes for rendering: adjacent provinces never share
    /// a class. Provinces are colored in id order with the smallest class
    /// unused by their already-colored neighbors, so the assignment is
    /// deterministic and typically needs at most five classes on the
    /// planar province graph.
    pub fn color_classes(&self) -> Vec<u8> {
        let mut colors: Vec<Option<u8>> = vec![None; self.provinces.len()];
        for (i, province) in self.provinces.iter().enumerate() {
            let mut used = [false; 16];
            for &adj in &province.adjacent_provinces {
                if let Some(c) = colors[adj.idx()] {
                    used[c as usize] = true;
                }
            }
            let class = (0..16).find(|&c| !used[c]).unwrap_or(0) as u8;
            colors[i] = Some(class);
        }
        colors.into_iter().map(|c| c.unwrap_or(0)).collect()
    }
}

/// Outer edges and province adjacency, scanned in edge-id order.
fn build_outer_edges(mesh: &MeshGraph, graph: &mut ProvinceGraph) {
    for (idx, edge) in mesh.edges.iter().enumerate() {
        let [fa, fb] = edge.faces;
        let pa = if fa.is_none() {
            ProvinceId::NONE
        } else {
            graph.province_by_face[fa.idx()]
        };
        let pb = if fb.is_none() {
            ProvinceId::NONE
        } else {
            graph.province_by_face[fb.idx()]
        };

        if pa == pb {
            // Interior edge of one province, open water, or exterior
            continue;
        }

        let outer_idx = graph.outer_edges.len();
        graph.outer_edges.push(OuterEdge {
            edge: EdgeId(idx as u32),
            provinces: [pa, pb],
            faces: [fa, fb],
        });

        for (p, other) in [(pa, pb), (pb, pa)] {
            if p.is_none() {
                continue;
            }
            let province = &mut graph.provinces[p.idx()];
            province.outer_edges.push(outer_idx);
            if !other.is_none() && !province.adjacent_provinces.contains(&other) {
                province.adjacent_provinces.push(other);
            }
        }
    }

    for province in &mut graph.provinces {
        province.adjacent_provinces.sort_unstable();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elevation;
    use crate::mesh::build_mesh;
    use crate::rivers;
    use crate::water;

    fn generate(controls: &Controls) -> (MeshGraph, WaterState, ProvinceGraph) {
        let mut rng = Lcg32::substream(controls.seed, tags::MESH);
        let mesh = build_mesh(512.0, 512.0, controls.spacing, &mut rng, 0);
        let water = water::classify(&mesh, controls);
        let elev = elevation::build(&mesh, &water, controls);
        let river_state = rivers::trace(&mesh, &water, &elev, controls);
        let provinces = build(&mesh, &water, &elev, &river_state, controls);
        (mesh, water, provinces)
    }

    fn open_controls(seed: u32) -> Controls {
        // No barriers, no passage limit: growth alone covers the land
        Controls {
            seed,
            river_density: 0.0,
            province_passage_elevation: 32,
            ..Controls::default()
        }
        .normalized()
        .unwrap()
    }

    #[test]
    fn test_every_land_face_has_a_province() {
        let (_, water, graph) = generate(&open_controls(1337));
        for &f in &water.land_faces {
            assert!(
                !graph.province_by_face[f.idx()].is_none(),
                "land face {} unassigned",
                f.0
            );
        }
        for (idx, &is_land) in water.is_land.iter().enumerate() {
            if !is_land {
                assert!(graph.province_by_face[idx].is_none());
            }
        }
    }

    #[test]
    fn test_partition_is_surjective() {
        let (_, _, graph) = generate(&open_controls(1337));
        assert!(!graph.provinces.is_empty());
        assert!(graph.provinces.len() <= 8);
        for (i, province) in graph.provinces.iter().enumerate() {
            assert!(
                !province.faces.is_empty(),
                "province {i} received no faces"
            );
        }
    }

    #[test]
    fn test_province_faces_are_connected_within_components() {
        // A seedless islet is attached to the nearest province wholesale,
        // so connectivity holds per land component, not across water
        let (mesh, water, graph) = generate(&open_controls(1337));
        let components = land_components(&mesh, &water);
        let mut component_of = vec![usize::MAX; mesh.faces.len()];
        for (c, members) in components.iter().enumerate() {
            for &idx in members {
                component_of[idx] = c;
            }
        }

        // Components holding a seed are covered purely by growth; only
        // there is connectivity guaranteed (seedless islets may split
        // between nearest provinces)
        let seeded: std::collections::HashSet<usize> = graph
            .seed_faces
            .iter()
            .map(|s| component_of[s.idx()])
            .collect();

        for (i, province) in graph.provinces.iter().enumerate() {
            for c in seeded.iter().copied() {
                let members: std::collections::HashSet<u32> = province
                    .faces
                    .iter()
                    .filter(|f| component_of[f.idx()] == c)
                    .map(|f| f.0)
                    .collect();
                if members.is_empty() {
                    continue;
                }
                // BFS inside the province slice from any member
                let start = FaceId(*members.iter().min().unwrap());
                let mut seen = std::collections::HashSet::new();
                let mut queue = VecDeque::new();
                seen.insert(start.0);
                queue.push_back(start);
                while let Some(f) = queue.pop_front() {
                    for &adj in &mesh.faces[f.idx()].adjacent_faces {
                        if members.contains(&adj.0) && seen.insert(adj.0) {
                            queue.push_back(adj);
                        }
                    }
                }
                assert_eq!(
                    seen.len(),
                    members.len(),
                    "province {i} is disconnected inside component {c}"
                );
            }
        }
    }

    #[test]
    fn test_adjacency_comes_from_shared_edges() {
        let (mesh, _, graph) = generate(&open_controls(1337));
        for (i, province) in graph.provinces.iter().enumerate() {
            let id = ProvinceId(i as u32);
            for &other in &province.adjacent_provinces {
                assert_ne!(other, id);
                // Some mesh edge must join the two provinces
                let touches = mesh.edges.iter().any(|e| {
                    let [fa, fb] = e.faces;
                    if fa.is_none() || fb.is_none() {
                        return false;
                    }
                    let pa = graph.province_by_face[fa.idx()];
                    let pb = graph.province_by_face[fb.idx()];
                    (pa == id && pb == other) || (pa == other && pb == id)
                });
                assert!(touches, "province {i} lists a phantom neighbor");
            }
        }
    }

    #[test]
    fn test_outer_edges_cover_shores_and_borders() {
        let (mesh, water, graph) = generate(&open_controls(1337));
        for outer in &graph.outer_edges {
            let edge = mesh.edge(outer.edge);
            assert_eq!(outer.faces, edge.faces);
            assert_ne!(outer.provinces[0], outer.provinces[1]);
        }
        // Every land/water edge appears exactly once
        let mut expected = 0;
        for e in &mesh.edges {
            let [fa, fb] = e.faces;
            let a_land = !fa.is_none() && water.is_land[fa.idx()];
            let b_land = !fb.is_none() && water.is_land[fb.idx()];
            if a_land != b_land {
                expected += 1;
            }
        }
        let shore_count = graph
            .outer_edges
            .iter()
            .filter(|o| o.provinces[0].is_none() || o.provinces[1].is_none())
            .count();
        assert_eq!(shore_count, expected);
    }

    #[test]
    fn test_color_classes_separate_neighbors() {
        let (_, _, graph) = generate(&open_controls(1337));
        let colors = graph.color_classes();
        assert_eq!(colors.len(), graph.provinces.len());
        for (i, province) in graph.provinces.iter().enumerate() {
            for &adj in &province.adjacent_provinces {
                assert_ne!(
                    colors[i],
                    colors[adj.idx()],
                    "provinces {i} and {} share a color",
                    adj.0
                );
            }
        }
    }

    #[test]
    fn test_single_province_spans_component() {
        let controls = Controls {
            province_count: 1,
            ..open_controls(1337)
        }
        .normalized()
        .unwrap();
        let (_, water, graph) = generate(&controls);
        assert_eq!(graph.provinces.len(), 1);
        let assigned: usize = graph.provinces.iter().map(|p| p.faces.len()).sum();
        assert_eq!(assigned, water.land_faces.len());
    }
}
