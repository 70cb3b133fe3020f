//! Spatial pick index
//!
//! A uniform grid over face bounding boxes for point-to-face (and thus
//! point-to-province) lookup. The index copies the refined polygons and
//! the province assignment out of the cache, so it holds no references
//! into mutable structures and can be shared read-only.

use crate::geometry::{point_in_polygon, Aabb, Vec2};
use crate::mesh::{FaceId, MeshGraph};
use crate::pipeline::TerrainCache;
use crate::provinces::{ProvinceGraph, ProvinceId};

/// Grid cell size in world units.
const CELL_SIZE: f64 = 32.0;

/// Immutable point-lookup structure over a generated map.
#[derive(Clone, Debug)]
pub struct PickIndex {
    width: f64,
    height: f64,
    grid_w: usize,
    grid_h: usize,
    /// Candidate faces per cell, ascending face id.
    cells: Vec<Vec<FaceId>>,
    bounds: Vec<Aabb>,
    polygons: Vec<Vec<Vec2>>,
    province_by_face: Vec<ProvinceId>,
    is_land: Vec<bool>,
}

impl PickIndex {
    pub fn from_cache(cache: &TerrainCache) -> Self {
        Self::build(&cache.mesh, &cache.provinces)
    }

    pub fn build(mesh: &MeshGraph, provinces: &ProvinceGraph) -> Self {
        let grid_w = ((mesh.width / CELL_SIZE).ceil() as usize).max(1);
        let grid_h = ((mesh.height / CELL_SIZE).ceil() as usize).max(1);
        let mut cells: Vec<Vec<FaceId>> = vec![Vec::new(); grid_w * grid_h];
        let mut bounds = Vec::with_capacity(mesh.faces.len());
        let mut polygons = Vec::with_capacity(mesh.faces.len());

        for (idx, face) in mesh.faces.iter().enumerate() {
            let aabb = Aabb::from_points(&face.polygon);
            // Every cell the box overlaps lists the face
            let x0 = ((aabb.min_x / CELL_SIZE).floor().max(0.0)) as usize;
            let y0 = ((aabb.min_y / CELL_SIZE).floor().max(0.0)) as usize;
            let x1 = ((aabb.max_x / CELL_SIZE).floor()) as usize;
            let y1 = ((aabb.max_y / CELL_SIZE).floor()) as usize;
            for gy in y0..=y1.min(grid_h - 1) {
                for gx in x0..=x1.min(grid_w - 1) {
                    cells[gy * grid_w + gx].push(FaceId(idx as u32));
                }
            }
            bounds.push(aabb);
            polygons.push(face.polygon.clone());
        }

        let province_by_face = if provinces.province_by_face.len() == mesh.faces.len() {
            provinces.province_by_face.clone()
        } else {
            vec![ProvinceId::NONE; mesh.faces.len()]
        };
        let is_land = if provinces.is_land.len() == mesh.faces.len() {
            provinces.is_land.clone()
        } else {
            vec![false; mesh.faces.len()]
        };

        Self {
            width: mesh.width,
            height: mesh.height,
            grid_w,
            grid_h,
            cells,
            bounds,
            polygons,
            province_by_face,
            is_land,
        }
    }

    /// The face under a world point, if any.
    pub fn pick_face(&self, p: Vec2) -> Option<FaceId> {
        if p.x < 0.0 || p.y < 0.0 || p.x > self.width || p.y > self.height {
            return None;
        }
        let gx = ((p.x / CELL_SIZE) as usize).min(self.grid_w - 1);
        let gy = ((p.y / CELL_SIZE) as usize).min(self.grid_h - 1);

        for &face in &self.cells[gy * self.grid_w + gx] {
            let idx = face.idx();
            if !self.bounds[idx].contains(p) {
                continue;
            }
            if point_in_polygon(p, &self.polygons[idx]) {
                return Some(face);
            }
        }
        None
    }

    /// The province under a world point. Water and missed points give
    /// `None`.
    pub fn pick_province(&self, p: Vec2) -> Option<ProvinceId> {
        let face = self.pick_face(p)?;
        if !self.is_land[face.idx()] {
            return None;
        }
        let province = self.province_by_face[face.idx()];
        if province.is_none() {
            None
        } else {
            Some(province)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controls::{Config, Controls};
    use crate::pipeline;

    fn cache_for(seed: u32) -> TerrainCache {
        let config = Config::new(512, 512).unwrap();
        let controls = Controls {
            seed,
            ..Controls::default()
        };
        pipeline::build(config, &controls, None).unwrap()
    }

    #[test]
    fn test_every_site_picks_its_own_face() {
        let cache = cache_for(1337);
        let index = PickIndex::from_cache(&cache);
        for (idx, face) in cache.mesh.faces.iter().enumerate() {
            let picked = index.pick_face(face.point);
            assert_eq!(
                picked,
                Some(crate::mesh::FaceId(idx as u32)),
                "site of face {idx} picked {:?}",
                picked
            );
        }
    }

    #[test]
    fn test_water_faces_have_no_province() {
        let cache = cache_for(1337);
        let index = PickIndex::from_cache(&cache);
        for (idx, face) in cache.mesh.faces.iter().enumerate() {
            if !cache.water.is_land[idx] {
                assert_eq!(index.pick_province(face.point), None);
            }
        }
    }

    #[test]
    fn test_land_faces_pick_their_assigned_province() {
        let cache = cache_for(1337);
        let index = PickIndex::from_cache(&cache);
        for &f in &cache.water.land_faces {
            let expect = cache.provinces.province_by_face[f.idx()];
            assert_eq!(
                index.pick_province(cache.mesh.faces[f.idx()].point),
                Some(expect)
            );
        }
    }

    #[test]
    fn test_out_of_bounds_picks_nothing() {
        let cache = cache_for(1337);
        let index = PickIndex::from_cache(&cache);
        assert_eq!(index.pick_face(Vec2::new(-1.0, 10.0)), None);
        assert_eq!(index.pick_face(Vec2::new(10.0, 513.0)), None);
    }
}
