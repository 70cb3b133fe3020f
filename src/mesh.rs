//! Polygonal mesh construction
//!
//! Builds the map mesh every later stage runs on:
//! 1. Poisson-disk site sampling (Bridson) over the map rectangle
//! 2. A Voronoi cell per site, clipped by neighbor half-planes and the
//!    rectangle
//! 3. Assembly into a `MeshGraph`: faces, merged corner vertices, and
//!    edges with full adjacency
//!
//! Corner points are quantized to 1e-3 world units before merging so that
//! shared cell corners identify reliably. Hash maps are used only for
//! keyed lookup during assembly; every output array is filled in face
//! order, so the mesh is byte-identical for a given seed and spacing.

use std::collections::HashMap;

use crate::geometry::{clip_half_plane, rect_polygon, Vec2};
use crate::rng::{tags, Lcg32};

/// Index of a face (Voronoi cell) in the mesh arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FaceId(pub u32);

/// Index of a vertex (cell corner) in the mesh arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexId(pub u32);

/// Index of an edge (boundary segment between two faces) in the mesh arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeId(pub u32);

macro_rules! impl_id {
    ($name:ident) => {
        impl $name {
            /// Sentinel for "no such element" (the exterior side of a
            /// border edge, an unassigned slot).
            pub const NONE: $name = $name(u32::MAX);

            pub fn is_none(self) -> bool {
                self.0 == u32::MAX
            }

            pub fn idx(self) -> usize {
                self.0 as usize
            }
        }
    };
}

impl_id!(FaceId);
impl_id!(VertexId);
impl_id!(EdgeId);

/// A Voronoi cell.
#[derive(Clone, Debug)]
pub struct Face {
    /// The generating site.
    pub point: Vec2,
    /// Corner vertices, ordered along the polygon boundary.
    pub vertices: Vec<VertexId>,
    /// Faces sharing an edge with this one, de-duplicated.
    pub adjacent_faces: Vec<FaceId>,
    /// Edges bounding this face, in boundary order.
    pub edges: Vec<EdgeId>,
    /// Refined boundary polygon: corners with jittered edge midpoints
    /// interleaved. Used by picking and export.
    pub polygon: Vec<Vec2>,
}

/// A cell corner shared by up to three faces.
#[derive(Clone, Debug)]
pub struct Vertex {
    pub point: Vec2,
    pub faces: Vec<FaceId>,
    pub adjacent_vertices: Vec<VertexId>,
    pub edges: Vec<EdgeId>,
}

/// A boundary segment between two faces, or between one face and the
/// exterior (`FaceId::NONE` on the open side).
#[derive(Clone, Debug)]
pub struct Edge {
    pub faces: [FaceId; 2],
    pub vertices: [VertexId; 2],
    /// Refined midpoint (geometric midpoint plus perpendicular jitter).
    pub midpoint: Vec2,
}

impl Edge {
    pub fn is_border(&self) -> bool {
        self.faces[0].is_none() || self.faces[1].is_none()
    }

    /// The face on the other side of this edge, or `NONE` for a border.
    pub fn other_face(&self, face: FaceId) -> FaceId {
        if self.faces[0] == face {
            self.faces[1]
        } else {
            self.faces[0]
        }
    }

    /// The vertex at the other end of this edge.
    pub fn other_vertex(&self, vertex: VertexId) -> VertexId {
        if self.vertices[0] == vertex {
            self.vertices[1]
        } else {
            self.vertices[0]
        }
    }
}

/// The complete polygonal mesh: three arenas with cross-references by id.
#[derive(Clone, Debug, Default)]
pub struct MeshGraph {
    pub width: f64,
    pub height: f64,
    pub faces: Vec<Face>,
    pub vertices: Vec<Vertex>,
    pub edges: Vec<Edge>,
}

impl MeshGraph {
    pub fn face(&self, id: FaceId) -> &Face {
        &self.faces[id.idx()]
    }

    pub fn vertex(&self, id: VertexId) -> &Vertex {
        &self.vertices[id.idx()]
    }

    pub fn edge(&self, id: EdgeId) -> &Edge {
        &self.edges[id.idx()]
    }

    /// Whether any edge of the face lies on the map rectangle boundary.
    pub fn face_touches_border(&self, id: FaceId) -> bool {
        self.faces[id.idx()]
            .edges
            .iter()
            .any(|&e| self.edges[e.idx()].is_border())
    }
}

/// Maximum candidate attempts per active point in Bridson sampling.
const POISSON_ATTEMPTS: u32 = 30;

/// Neighbor-gathering radius for Voronoi clipping, in spacings. Sites
/// beyond this distance cannot contribute a half-plane that survives the
/// nearer clips on a Poisson-disk set.
const CLIP_RADIUS_SPACINGS: f64 = 5.0;

/// Vertex-merge quantization step (world units).
const VERTEX_QUANTUM: f64 = 1e-3;

/// Bridson Poisson-disk sampling over the map rectangle.
///
/// Pairwise site distances are >= `spacing`. The background grid uses
/// cells of `spacing / sqrt(2)` so each cell holds at most one site.
pub fn poisson_disk_sites(width: f64, height: f64, spacing: f64, rng: &mut Lcg32) -> Vec<Vec2> {
    let cell = spacing / std::f64::consts::SQRT_2;
    let grid_w = (width / cell).ceil() as usize;
    let grid_h = (height / cell).ceil() as usize;
    let mut grid: Vec<i32> = vec![-1; grid_w * grid_h];

    let mut sites: Vec<Vec2> = Vec::new();
    let mut active: Vec<usize> = Vec::new();

    let cell_of = |p: Vec2| -> (usize, usize) {
        (
            ((p.x / cell) as usize).min(grid_w - 1),
            ((p.y / cell) as usize).min(grid_h - 1),
        )
    };

    let mut insert = |p: Vec2, sites: &mut Vec<Vec2>, grid: &mut Vec<i32>| -> usize {
        let idx = sites.len();
        sites.push(p);
        let (cx, cy) = cell_of(p);
        grid[cy * grid_w + cx] = idx as i32;
        idx
    };

    let fits = |p: Vec2, sites: &[Vec2], grid: &[i32]| -> bool {
        if p.x < 0.0 || p.x >= width || p.y < 0.0 || p.y >= height {
            return false;
        }
        let (cx, cy) = cell_of(p);
        // Any site within `spacing` lies in the surrounding 5x5 cell block
        for gy in cy.saturating_sub(2)..(cy + 3).min(grid_h) {
            for gx in cx.saturating_sub(2)..(cx + 3).min(grid_w) {
                let slot = grid[gy * grid_w + gx];
                if slot >= 0 && sites[slot as usize].distance_sq(p) < spacing * spacing {
                    return false;
                }
            }
        }
        true
    };

    let first = Vec2::new(rng.range_f64(0.0, width), rng.range_f64(0.0, height));
    let first_idx = insert(first, &mut sites, &mut grid);
    active.push(first_idx);

    while !active.is_empty() {
        let pick = rng.range_usize(0, active.len());
        let around = sites[active[pick]];
        let mut placed = false;

        for _ in 0..POISSON_ATTEMPTS {
            let angle = rng.range_f64(0.0, std::f64::consts::TAU);
            let radius = spacing * (1.0 + rng.next_f64());
            let candidate = Vec2::new(
                around.x + radius * angle.cos(),
                around.y + radius * angle.sin(),
            );
            if fits(candidate, &sites, &grid) {
                let idx = insert(candidate, &mut sites, &mut grid);
                active.push(idx);
                placed = true;
                break;
            }
        }

        if !placed {
            active.swap_remove(pick);
        }
    }

    sites
}

/// Clip the map rectangle down to the Voronoi cell of `site`.
///
/// Each neighbor contributes the half-plane of points closer to `site`
/// than to it. Neighbors are clipped in site-index order so the float
/// rounding sequence is reproducible.
fn voronoi_cell(site: Vec2, neighbors: &[Vec2], width: f64, height: f64) -> Vec<Vec2> {
    let mut polygon = rect_polygon(width, height);
    for &other in neighbors {
        if polygon.len() < 3 {
            break;
        }
        let origin = site.midpoint(other);
        let normal = other.sub(site);
        polygon = clip_half_plane(&polygon, origin, normal);
    }
    polygon
}

/// Uniform bucket grid over sites, for neighbor gathering during clipping.
struct SiteGrid {
    cell: f64,
    grid_w: usize,
    grid_h: usize,
    buckets: Vec<Vec<u32>>,
}

impl SiteGrid {
    fn build(sites: &[Vec2], width: f64, height: f64, cell: f64) -> Self {
        let grid_w = ((width / cell).ceil() as usize).max(1);
        let grid_h = ((height / cell).ceil() as usize).max(1);
        let mut buckets = vec![Vec::new(); grid_w * grid_h];
        for (i, p) in sites.iter().enumerate() {
            let cx = ((p.x / cell) as usize).min(grid_w - 1);
            let cy = ((p.y / cell) as usize).min(grid_h - 1);
            buckets[cy * grid_w + cx].push(i as u32);
        }
        Self {
            cell,
            grid_w,
            grid_h,
            buckets,
        }
    }

    /// Site indices within `radius` of `sites[center]`, excluding the
    /// center itself, in ascending index order.
    fn neighbors(&self, sites: &[Vec2], center: usize, radius: f64) -> Vec<u32> {
        let p = sites[center];
        let r_sq = radius * radius;
        let reach = (radius / self.cell).ceil() as usize;
        let cx = ((p.x / self.cell) as usize).min(self.grid_w - 1);
        let cy = ((p.y / self.cell) as usize).min(self.grid_h - 1);

        let mut found: Vec<u32> = Vec::new();
        for gy in cy.saturating_sub(reach)..(cy + reach + 1).min(self.grid_h) {
            for gx in cx.saturating_sub(reach)..(cx + reach + 1).min(self.grid_w) {
                for &i in &self.buckets[gy * self.grid_w + gx] {
                    if i as usize != center && sites[i as usize].distance_sq(p) <= r_sq {
                        found.push(i);
                    }
                }
            }
        }
        found.sort_unstable();
        found
    }
}

fn quantize_key(p: Vec2) -> (i64, i64) {
    (
        (p.x / VERTEX_QUANTUM).round() as i64,
        (p.y / VERTEX_QUANTUM).round() as i64,
    )
}

/// Build the complete mesh for one generation.
///
/// `rng` is the mesh substream; `intermediate_seed` drives the edge
/// refinement jitter so shoreline detail can be re-rolled without moving
/// any site.
pub fn build_mesh(
    width: f64,
    height: f64,
    spacing: f64,
    rng: &mut Lcg32,
    intermediate_seed: u32,
) -> MeshGraph {
    let sites = poisson_disk_sites(width, height, spacing, rng);
    let clip_radius = spacing * CLIP_RADIUS_SPACINGS;
    let site_grid = SiteGrid::build(&sites, width, height, spacing * 2.0);

    let mut mesh = MeshGraph {
        width,
        height,
        faces: Vec::with_capacity(sites.len()),
        vertices: Vec::new(),
        edges: Vec::new(),
    };

    let mut vertex_map: HashMap<(i64, i64), VertexId> = HashMap::new();
    let mut edge_map: HashMap<(VertexId, VertexId), EdgeId> = HashMap::new();

    for site_idx in 0..sites.len() {
        let site = sites[site_idx];
        let neighbors: Vec<Vec2> = site_grid
            .neighbors(&sites, site_idx, clip_radius)
            .iter()
            .map(|&i| sites[i as usize])
            .collect();
        let cell = voronoi_cell(site, &neighbors, width, height);
        if cell.len() < 3 {
            // Fully clipped away; the site contributes no face
            continue;
        }

        // Merge quantized corners into the vertex arena, dropping
        // consecutive corners that collapse onto the same vertex.
        let mut loop_ids: Vec<VertexId> = Vec::with_capacity(cell.len());
        for corner in &cell {
            let key = quantize_key(*corner);
            let id = *vertex_map.entry(key).or_insert_with(|| {
                let id = VertexId(mesh.vertices.len() as u32);
                mesh.vertices.push(Vertex {
                    point: Vec2::new(
                        key.0 as f64 * VERTEX_QUANTUM,
                        key.1 as f64 * VERTEX_QUANTUM,
                    ),
                    faces: Vec::new(),
                    adjacent_vertices: Vec::new(),
                    edges: Vec::new(),
                });
                id
            });
            if loop_ids.last() != Some(&id) {
                loop_ids.push(id);
            }
        }
        if loop_ids.len() > 1 && loop_ids.first() == loop_ids.last() {
            loop_ids.pop();
        }
        if loop_ids.len() < 3 {
            panic!(
                "mesh invariant violated [MESH-FACE-DEGEN]: \
                 face at ({:.3}, {:.3}) collapsed to {} vertices after merging",
                site.x,
                site.y,
                loop_ids.len()
            );
        }

        let face_id = FaceId(mesh.faces.len() as u32);
        let mut face_edges: Vec<EdgeId> = Vec::with_capacity(loop_ids.len());

        for i in 0..loop_ids.len() {
            let a = loop_ids[i];
            let b = loop_ids[(i + 1) % loop_ids.len()];
            let key = if a < b { (a, b) } else { (b, a) };
            let edge_id = *edge_map.entry(key).or_insert_with(|| {
                let id = EdgeId(mesh.edges.len() as u32);
                mesh.edges.push(Edge {
                    faces: [FaceId::NONE, FaceId::NONE],
                    vertices: [key.0, key.1],
                    midpoint: Vec2::ZERO,
                });
                id
            });

            let edge = &mut mesh.edges[edge_id.idx()];
            if edge.faces[0].is_none() {
                edge.faces[0] = face_id;
            } else if edge.faces[1].is_none() && edge.faces[0] != face_id {
                edge.faces[1] = face_id;
            } else if edge.faces[0] != face_id && edge.faces[1] != face_id {
                panic!(
                    "mesh invariant violated [MESH-EDGE-TRIPLE]: \
                     edge {} claimed by a third face",
                    edge_id.0
                );
            }
            face_edges.push(edge_id);
        }

        mesh.faces.push(Face {
            point: site,
            vertices: loop_ids,
            adjacent_faces: Vec::new(),
            edges: face_edges,
            polygon: Vec::new(),
        });
    }

    populate_adjacency(&mut mesh);
    refine_edges(&mut mesh, intermediate_seed);
    build_refined_polygons(&mut mesh);

    mesh
}

/// Second pass: fill vertex/face adjacency lists from the edge table.
fn populate_adjacency(mesh: &mut MeshGraph) {
    for edge_idx in 0..mesh.edges.len() {
        let edge_id = EdgeId(edge_idx as u32);
        let [va, vb] = mesh.edges[edge_idx].vertices;
        let [fa, fb] = mesh.edges[edge_idx].faces;

        for (v, other) in [(va, vb), (vb, va)] {
            let vertex = &mut mesh.vertices[v.idx()];
            vertex.edges.push(edge_id);
            if !vertex.adjacent_vertices.contains(&other) {
                vertex.adjacent_vertices.push(other);
            }
            for f in [fa, fb] {
                if !f.is_none() && !vertex.faces.contains(&f) {
                    vertex.faces.push(f);
                }
            }
        }

        if !fa.is_none() && !fb.is_none() {
            if !mesh.faces[fa.idx()].adjacent_faces.contains(&fb) {
                mesh.faces[fa.idx()].adjacent_faces.push(fb);
            }
            if !mesh.faces[fb.idx()].adjacent_faces.contains(&fa) {
                mesh.faces[fb.idx()].adjacent_faces.push(fa);
            }
        }
    }
}

/// Fraction of edge length used as the refinement jitter amplitude.
const REFINE_JITTER: f64 = 0.15;

/// Assign each edge its refined midpoint: the geometric midpoint nudged
/// perpendicular to the edge. Border edges stay unjittered so the map
/// outline remains the exact rectangle.
fn refine_edges(mesh: &mut MeshGraph, intermediate_seed: u32) {
    let mut rng = Lcg32::substream(intermediate_seed, tags::EDGE_REFINE);
    for edge in mesh.edges.iter_mut() {
        let a = mesh.vertices[edge.vertices[0].idx()].point;
        let b = mesh.vertices[edge.vertices[1].idx()].point;
        let mid = a.midpoint(b);
        // Every edge consumes one draw, jittered or not, so the stream
        // stays aligned regardless of which edges are borders
        let t = rng.next_f64() * 2.0 - 1.0;
        if edge.is_border() {
            edge.midpoint = mid;
            continue;
        }
        let along = b.sub(a);
        let offset = along.perp().scale(t * REFINE_JITTER);
        edge.midpoint = Vec2::new(
            (mid.x + offset.x).clamp(0.0, mesh.width),
            (mid.y + offset.y).clamp(0.0, mesh.height),
        );
    }
}

/// Interleave refined edge midpoints with the corner loop of each face.
fn build_refined_polygons(mesh: &mut MeshGraph) {
    for face_idx in 0..mesh.faces.len() {
        let n = mesh.faces[face_idx].vertices.len();
        let mut polygon = Vec::with_capacity(n * 2);
        for i in 0..n {
            let v = mesh.faces[face_idx].vertices[i];
            let e = mesh.faces[face_idx].edges[i];
            polygon.push(mesh.vertices[v.idx()].point);
            polygon.push(mesh.edges[e.idx()].midpoint);
        }
        mesh.faces[face_idx].polygon = polygon;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::polygon_area;

    fn small_mesh() -> MeshGraph {
        let mut rng = Lcg32::substream(1337, tags::MESH);
        build_mesh(512.0, 512.0, 64.0, &mut rng, 0)
    }

    #[test]
    fn test_poisson_spacing_holds() {
        let mut rng = Lcg32::new(7);
        let sites = poisson_disk_sites(256.0, 256.0, 32.0, &mut rng);
        assert!(sites.len() > 10);
        for i in 0..sites.len() {
            for j in (i + 1)..sites.len() {
                assert!(
                    sites[i].distance(sites[j]) >= 32.0 - 1e-9,
                    "sites {i} and {j} violate minimum spacing"
                );
            }
        }
    }

    #[test]
    fn test_mesh_is_deterministic() {
        let a = small_mesh();
        let b = small_mesh();
        assert_eq!(a.faces.len(), b.faces.len());
        assert_eq!(a.vertices.len(), b.vertices.len());
        assert_eq!(a.edges.len(), b.edges.len());
        for (fa, fb) in a.faces.iter().zip(&b.faces) {
            assert_eq!(fa.point, fb.point);
            assert_eq!(fa.vertices, fb.vertices);
            assert_eq!(fa.adjacent_faces, fb.adjacent_faces);
        }
        for (ea, eb) in a.edges.iter().zip(&b.edges) {
            assert_eq!(ea.midpoint, eb.midpoint);
        }
    }

    #[test]
    fn test_edges_listed_by_endpoints_and_faces() {
        let mesh = small_mesh();
        for (idx, edge) in mesh.edges.iter().enumerate() {
            let id = EdgeId(idx as u32);
            for v in edge.vertices {
                assert!(
                    mesh.vertex(v).edges.contains(&id),
                    "vertex {} does not list edge {}",
                    v.0,
                    idx
                );
            }
            for f in edge.faces {
                if !f.is_none() {
                    assert!(
                        mesh.face(f).edges.contains(&id),
                        "face {} does not list edge {}",
                        f.0,
                        idx
                    );
                }
            }
        }
    }

    #[test]
    fn test_face_loops_are_closed_polygons() {
        let mesh = small_mesh();
        for face in &mesh.faces {
            assert!(face.vertices.len() >= 3);
            assert_eq!(face.vertices.len(), face.edges.len());
            // Consecutive loop vertices must be joined by the listed edge
            for i in 0..face.vertices.len() {
                let a = face.vertices[i];
                let b = face.vertices[(i + 1) % face.vertices.len()];
                let edge = mesh.edge(face.edges[i]);
                let mut ends = [edge.vertices[0], edge.vertices[1]];
                ends.sort();
                let mut expect = [a, b];
                expect.sort();
                assert_eq!(ends, expect);
            }
            // The corner loop encloses area
            let corners: Vec<Vec2> = face
                .vertices
                .iter()
                .map(|&v| mesh.vertex(v).point)
                .collect();
            assert!(polygon_area(&corners).abs() > 1.0);
        }
    }

    #[test]
    fn test_adjacency_is_symmetric_and_deduplicated() {
        let mesh = small_mesh();
        for (idx, face) in mesh.faces.iter().enumerate() {
            let id = FaceId(idx as u32);
            let mut seen = face.adjacent_faces.clone();
            seen.sort();
            seen.dedup();
            assert_eq!(seen.len(), face.adjacent_faces.len(), "duplicate adjacency");
            for &other in &face.adjacent_faces {
                assert!(mesh.face(other).adjacent_faces.contains(&id));
            }
        }
    }

    #[test]
    fn test_refined_polygon_interleaves_midpoints() {
        let mesh = small_mesh();
        for face in &mesh.faces {
            assert_eq!(face.polygon.len(), face.vertices.len() * 2);
        }
    }

    #[test]
    fn test_intermediate_seed_only_moves_midpoints() {
        let mut rng_a = Lcg32::substream(2024, tags::MESH);
        let a = build_mesh(512.0, 512.0, 64.0, &mut rng_a, 1);
        let mut rng_b = Lcg32::substream(2024, tags::MESH);
        let b = build_mesh(512.0, 512.0, 64.0, &mut rng_b, 2);
        assert_eq!(a.faces.len(), b.faces.len());
        for (fa, fb) in a.faces.iter().zip(&b.faces) {
            assert_eq!(fa.point, fb.point);
            assert_eq!(fa.vertices, fb.vertices);
        }
        // Midpoints differ somewhere on interior edges
        let moved = a
            .edges
            .iter()
            .zip(&b.edges)
            .any(|(ea, eb)| ea.midpoint != eb.midpoint);
        assert!(moved);
    }
}
