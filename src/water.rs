//! Land/water classification
//!
//! Classifies each face by a warped radial island predicate, flood-fills
//! ocean connectivity from the map border, and computes the coast-distance
//! field every elevation pass feeds on.
//!
//! Degenerate maps are legal: an all-land or all-water classification is
//! reported through `has_land` / `has_water` and downstream stages degrade
//! gracefully.

use std::collections::VecDeque;

use crate::controls::Controls;
use crate::mesh::{FaceId, MeshGraph};
use crate::noise::{domain_warp, fbm};
use crate::rng::{tags, Lcg32};

/// Per-face water classification and coast distances.
#[derive(Clone, Debug, Default)]
pub struct WaterState {
    /// Land flag per face.
    pub is_land: Vec<bool>,
    /// Land face ids in ascending order.
    pub land_faces: Vec<FaceId>,
    /// Water connected to the rectangle boundary.
    pub ocean_water: Vec<bool>,
    /// BFS distance in faces from the nearest coast; -1 for water.
    pub land_distance: Vec<i32>,
    pub has_land: bool,
    pub has_water: bool,
}

impl WaterState {
    pub fn is_water(&self, face: FaceId) -> bool {
        !self.is_land[face.idx()]
    }
}

/// Base shoreline radius in normalized units before the level shift.
const BASE_RADIUS: f64 = 0.62;
/// How strongly `water_level` shifts the shoreline radius.
const LEVEL_SCALE: f64 = 0.01;
/// Primary and secondary bump amplitudes at roughness 100.
const BUMP_AMPLITUDE: f64 = 0.12;
const BUMP_AMPLITUDE_2: f64 = 0.07;
/// Noise amplitude at `water_noise_strength` 1.
const NOISE_AMPLITUDE: f64 = 0.5;

/// The island silhouette: deterministic parameters drawn once per
/// generation from the water substream.
struct IslandShape {
    start: f64,
    bumps: f64,
    base_radius: f64,
    bump_amp: f64,
    bump_amp_2: f64,
    noise_amp: f64,
    noise_scale: f64,
    noise_octaves: u32,
    noise_seed: u32,
    warp_scale: f64,
    warp_strength: f64,
    warp_seed_x: u32,
    warp_seed_y: u32,
}

impl IslandShape {
    fn from_controls(controls: &Controls, rng: &mut Lcg32) -> Self {
        // Draw order is part of the map identity; do not reorder
        let start = rng.range_f64(0.0, std::f64::consts::TAU);
        let bumps = (2 + rng.range_usize(0, 5)) as f64;
        let noise_seed = rng.next_u32();
        let warp_seed_x = Lcg32::substream(noise_seed, tags::WARP_X).next_u32();
        let warp_seed_y = Lcg32::substream(noise_seed, tags::WARP_Y).next_u32();

        let roughness = controls.water_roughness / 100.0;
        Self {
            start,
            bumps,
            base_radius: BASE_RADIUS - controls.water_level * LEVEL_SCALE,
            bump_amp: BUMP_AMPLITUDE * roughness,
            bump_amp_2: BUMP_AMPLITUDE_2 * roughness,
            noise_amp: NOISE_AMPLITUDE * controls.water_noise_strength,
            noise_scale: controls.water_noise_scale,
            noise_octaves: controls.water_noise_octaves,
            noise_seed,
            warp_scale: controls.water_warp_scale,
            warp_strength: controls.water_warp_strength,
            warp_seed_x,
            warp_seed_y,
        }
    }

    /// Whether a normalized position (each axis in [-1, 1]) is inside the
    /// island.
    fn contains(&self, nx: f64, ny: f64) -> bool {
        let (wx, wy) = domain_warp(
            nx,
            ny,
            self.warp_scale,
            self.warp_strength,
            self.warp_seed_x,
            self.warp_seed_y,
        );
        let r = (wx * wx + wy * wy).sqrt();
        let theta = wy.atan2(wx);

        let noise = fbm(
            wx * self.noise_scale,
            wy * self.noise_scale,
            self.noise_seed,
            self.noise_octaves,
        );

        let radius = self.base_radius
            + self.bump_amp
                * (self.start + self.bumps * theta + ((self.bumps + 2.0) * theta).cos()).sin()
            + self.bump_amp_2 * (0.7 * self.start + (self.bumps + 3.0) * theta).sin()
            + self.noise_amp * (2.0 * noise - 1.0);

        r < radius
    }
}

/// Classify every face and derive ocean connectivity and coast distances.
pub fn classify(mesh: &MeshGraph, controls: &Controls) -> WaterState {
    let mut rng = Lcg32::substream(controls.seed, tags::WATER);
    let shape = IslandShape::from_controls(controls, &mut rng);

    let n = mesh.faces.len();
    let mut is_land = vec![false; n];
    let mut land_faces = Vec::new();

    for (idx, face) in mesh.faces.iter().enumerate() {
        let p = face.point;
        let strictly_inside =
            p.x > 0.0 && p.x < mesh.width && p.y > 0.0 && p.y < mesh.height;
        let nx = (p.x / mesh.width) * 2.0 - 1.0;
        let ny = (p.y / mesh.height) * 2.0 - 1.0;
        if strictly_inside && shape.contains(nx, ny) {
            is_land[idx] = true;
            land_faces.push(FaceId(idx as u32));
        }
    }

    let ocean_water = flood_ocean(mesh, &is_land);
    let land_distance = coast_distance(mesh, &is_land);

    let has_land = !land_faces.is_empty();
    let has_water = land_faces.len() < n;

    WaterState {
        is_land,
        land_faces,
        ocean_water,
        land_distance,
        has_land,
        has_water,
    }
}

/// Flood-fill water connected to the rectangle boundary.
fn flood_ocean(mesh: &MeshGraph, is_land: &[bool]) -> Vec<bool> {
    let n = mesh.faces.len();
    let mut ocean = vec![false; n];
    let mut queue = VecDeque::new();

    for idx in 0..n {
        if !is_land[idx] && mesh.face_touches_border(FaceId(idx as u32)) {
            ocean[idx] = true;
            queue.push_back(idx);
        }
    }

    while let Some(idx) = queue.pop_front() {
        for &adj in &mesh.faces[idx].adjacent_faces {
            let a = adj.idx();
            if !is_land[a] && !ocean[a] {
                ocean[a] = true;
                queue.push_back(a);
            }
        }
    }

    ocean
}

/// BFS distance from the shore over land adjacency.
///
/// Shore faces (land with a water neighbor) are distance 0; water faces
/// are -1. With no water anywhere, every land face is distance 0.
fn coast_distance(mesh: &MeshGraph, is_land: &[bool]) -> Vec<i32> {
    let n = mesh.faces.len();
    let mut distance = vec![-1i32; n];
    let mut queue = VecDeque::new();

    for idx in 0..n {
        if !is_land[idx] {
            continue;
        }
        let shore = mesh.faces[idx]
            .adjacent_faces
            .iter()
            .any(|&adj| !is_land[adj.idx()]);
        if shore {
            distance[idx] = 0;
            queue.push_back(idx);
        }
    }

    if queue.is_empty() {
        // All-land map: no coast to measure from
        for idx in 0..n {
            if is_land[idx] {
                distance[idx] = 0;
            }
        }
        return distance;
    }

    while let Some(idx) = queue.pop_front() {
        let d = distance[idx];
        for &adj in &mesh.faces[idx].adjacent_faces {
            let a = adj.idx();
            if is_land[a] && distance[a] < 0 {
                distance[a] = d + 1;
                queue.push_back(a);
            }
        }
    }

    // Land cut off from the shore by the mesh (single-face islets fully
    // surrounded by land holes) cannot happen, but keep the field total
    for idx in 0..n {
        if is_land[idx] && distance[idx] < 0 {
            distance[idx] = 0;
        }
    }

    distance
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::build_mesh;

    fn state_for(seed: u32) -> (MeshGraph, WaterState) {
        let controls = Controls {
            seed,
            ..Controls::default()
        }
        .normalized()
        .unwrap();
        let mut rng = Lcg32::substream(seed, tags::MESH);
        let mesh = build_mesh(512.0, 512.0, controls.spacing, &mut rng, 0);
        let water = classify(&mesh, &controls);
        (mesh, water)
    }

    #[test]
    fn test_default_island_has_land_and_water() {
        let (_, water) = state_for(1337);
        assert!(water.has_land);
        assert!(water.has_water);
        assert!(!water.land_faces.is_empty());
    }

    #[test]
    fn test_land_faces_sorted_ascending() {
        let (_, water) = state_for(1337);
        for pair in water.land_faces.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn test_ocean_touches_border_and_is_water() {
        let (mesh, water) = state_for(1337);
        for idx in 0..mesh.faces.len() {
            if water.ocean_water[idx] {
                assert!(!water.is_land[idx], "ocean face {idx} marked land");
            }
        }
        // Every border water face must be ocean
        for idx in 0..mesh.faces.len() {
            if !water.is_land[idx] && mesh.face_touches_border(FaceId(idx as u32)) {
                assert!(water.ocean_water[idx]);
            }
        }
    }

    #[test]
    fn test_ocean_is_border_connected_component() {
        let (mesh, water) = state_for(1337);
        // Any water face adjacent to ocean water must itself be ocean
        for idx in 0..mesh.faces.len() {
            if water.is_land[idx] || water.ocean_water[idx] {
                continue;
            }
            for &adj in &mesh.faces[idx].adjacent_faces {
                assert!(
                    water.is_land[adj.idx()] || !water.ocean_water[adj.idx()],
                    "non-ocean water face {idx} touches ocean"
                );
            }
        }
    }

    #[test]
    fn test_coast_distance_field() {
        let (mesh, water) = state_for(1337);
        for idx in 0..mesh.faces.len() {
            if water.is_land[idx] {
                assert!(water.land_distance[idx] >= 0);
            } else {
                assert_eq!(water.land_distance[idx], -1);
            }
        }
        // Distances step by at most one across adjacency
        for idx in 0..mesh.faces.len() {
            if !water.is_land[idx] {
                continue;
            }
            let d = water.land_distance[idx];
            for &adj in &mesh.faces[idx].adjacent_faces {
                if water.is_land[adj.idx()] {
                    assert!((water.land_distance[adj.idx()] - d).abs() <= 1);
                }
            }
        }
    }

    #[test]
    fn test_high_water_level_drowns_map() {
        let controls = Controls {
            seed: 1337,
            water_level: 40.0,
            water_noise_strength: 0.0,
            water_roughness: 0.0,
            ..Controls::default()
        }
        .normalized()
        .unwrap();
        let mut rng = Lcg32::substream(1337, tags::MESH);
        let mesh = build_mesh(512.0, 512.0, controls.spacing, &mut rng, 0);
        let water = classify(&mesh, &controls);
        // Radius 0.22 leaves a small island at most; far fewer land faces
        assert!(water.land_faces.len() < mesh.faces.len() / 4);
    }
}
