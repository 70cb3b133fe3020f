//! Staged generation driver
//!
//! Runs `mesh -> water -> elevation -> rivers -> provinces` and bundles
//! the outputs into a [`TerrainCache`]. Each stage carries a fingerprint
//! hashing its config, its slice of the controls, and the fingerprints of
//! everything upstream; a rebuild with a previous cache reuses any stage
//! whose fingerprint is unchanged by moving the old output across.
//!
//! The driver is synchronous and single-threaded; a cache is plain value
//! data with no back-pointers, safe to hand to read-only consumers.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use log::debug;

use crate::controls::{Config, Controls, Result};
use crate::elevation::{self, ElevationState};
use crate::mesh::{build_mesh, MeshGraph};
use crate::provinces::{self, ProvinceGraph};
use crate::rivers::{self, RiverState};
use crate::rng::{tags, Lcg32};
use crate::water::{self, WaterState};

/// Pipeline stages, in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Mesh,
    Water,
    Elevation,
    Rivers,
    Provinces,
}

pub const STAGES: [Stage; 5] = [
    Stage::Mesh,
    Stage::Water,
    Stage::Elevation,
    Stage::Rivers,
    Stage::Provinces,
];

impl Stage {
    fn index(self) -> usize {
        match self {
            Stage::Mesh => 0,
            Stage::Water => 1,
            Stage::Elevation => 2,
            Stage::Rivers => 3,
            Stage::Provinces => 4,
        }
    }
}

/// The complete generation output plus per-stage fingerprints.
///
/// Stages past a `stop_after` cut-off hold their empty defaults and a
/// `None` fingerprint, so they always rebuild when asked for later.
#[derive(Clone, Debug)]
pub struct TerrainCache {
    pub config: Config,
    /// The normalized controls this cache was generated from.
    pub controls: Controls,
    pub mesh: MeshGraph,
    pub water: WaterState,
    pub elevation: ElevationState,
    pub rivers: RiverState,
    pub provinces: ProvinceGraph,
    pub fingerprints: [Option<u64>; 5],
}

impl TerrainCache {
    pub fn fingerprint(&self, stage: Stage) -> Option<u64> {
        self.fingerprints[stage.index()]
    }

    /// World position of a face's site; the anchor point entity stores
    /// place units at.
    pub fn face_center(&self, face: crate::mesh::FaceId) -> crate::geometry::Vec2 {
        self.mesh.faces[face.idx()].point
    }

    pub fn stats(&self) -> CacheStats {
        let river_edges = self
            .rivers
            .river_edge_mask
            .iter()
            .filter(|&&m| m)
            .count();
        CacheStats {
            faces: self.mesh.faces.len(),
            vertices: self.mesh.vertices.len(),
            edges: self.mesh.edges.len(),
            land_faces: self.water.land_faces.len(),
            river_traces: self.rivers.traces.len(),
            river_edges,
            provinces: self.provinces.provinces.len(),
        }
    }
}

/// Summary numbers for CLI output and logging.
#[derive(Clone, Copy, Debug)]
pub struct CacheStats {
    pub faces: usize,
    pub vertices: usize,
    pub edges: usize,
    pub land_faces: usize,
    pub river_traces: usize,
    pub river_edges: usize,
    pub provinces: usize,
}

/// What `Pipeline::step` just did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StageReport {
    pub stage: Stage,
    pub reused: bool,
}

/// Hash a stage's inputs into its fingerprint.
struct FingerprintHasher(DefaultHasher);

impl FingerprintHasher {
    fn new(config: Config, stage: Stage, upstream: &[u64]) -> Self {
        let mut hasher = DefaultHasher::new();
        config.width.hash(&mut hasher);
        config.height.hash(&mut hasher);
        stage.index().hash(&mut hasher);
        for fp in upstream {
            fp.hash(&mut hasher);
        }
        Self(hasher)
    }

    fn float(&mut self, v: f64) {
        v.to_bits().hash(&mut self.0);
    }

    fn int(&mut self, v: i64) {
        v.hash(&mut self.0);
    }

    fn finish(self) -> u64 {
        self.0.finish()
    }
}

/// Fingerprint one stage from the control subset it consumes.
fn stage_fingerprint(config: Config, controls: &Controls, stage: Stage, upstream: &[u64]) -> u64 {
    let mut h = FingerprintHasher::new(config, stage, upstream);
    h.int(controls.seed as i64);
    match stage {
        Stage::Mesh => {
            h.float(controls.spacing);
            h.int(controls.intermediate_seed as i64);
        }
        Stage::Water => {
            h.float(controls.water_level);
            h.float(controls.water_roughness);
            h.float(controls.water_noise_scale);
            h.float(controls.water_noise_strength);
            h.int(controls.water_noise_octaves as i64);
            h.float(controls.water_warp_scale);
            h.float(controls.water_warp_strength);
        }
        Stage::Elevation => {
            h.float(controls.land_relief);
            h.float(controls.ridge_strength);
            h.int(controls.ridge_count as i64);
            h.float(controls.plateau_strength);
            h.float(controls.ridge_distribution);
            h.float(controls.ridge_separation);
            h.float(controls.ridge_continuity);
            h.float(controls.ridge_continuity_threshold);
            h.float(controls.ocean_peak_clamp);
            h.float(controls.ridge_ocean_clamp);
            h.float(controls.ridge_width);
        }
        Stage::Rivers => {
            h.float(controls.river_density);
            h.float(controls.river_branch_chance);
            h.float(controls.river_climb_chance);
        }
        Stage::Provinces => {
            h.int(controls.province_count as i64);
            h.float(controls.province_size_variance);
            h.int(controls.province_passage_elevation as i64);
            h.float(controls.province_river_penalty);
            h.float(controls.small_island_multiplier);
            h.float(controls.large_island_multiplier);
        }
    }
    h.finish()
}

/// Step-based pipeline, for callers that want per-stage progress.
///
/// [`build`] and [`build_until`] are the eager wrappers.
pub struct Pipeline {
    config: Config,
    controls: Controls,
    stop_after: Option<Stage>,
    previous: Option<TerrainCache>,
    next: usize,
    fingerprints: [Option<u64>; 5],
    mesh: Option<MeshGraph>,
    water: Option<WaterState>,
    elevation: Option<ElevationState>,
    rivers: Option<RiverState>,
    provinces: Option<ProvinceGraph>,
}

impl Pipeline {
    /// Normalize controls and prepare a run. `previous` donates any stage
    /// output whose fingerprint is unchanged.
    pub fn new(
        config: Config,
        controls: &Controls,
        previous: Option<TerrainCache>,
        stop_after: Option<Stage>,
    ) -> Result<Self> {
        let controls = controls.normalized()?;
        Ok(Self {
            config,
            controls,
            stop_after,
            previous,
            next: 0,
            fingerprints: [None; 5],
            mesh: None,
            water: None,
            elevation: None,
            rivers: None,
            provinces: None,
        })
    }

    /// Fingerprints of all stages upstream of `stage` (all already run).
    fn upstream(&self, stage: Stage) -> Vec<u64> {
        self.fingerprints[..stage.index()]
            .iter()
            .map(|fp| fp.expect("upstream stage must have run"))
            .collect()
    }

    /// Whether the previous cache can donate this stage's output.
    fn reusable(&self, stage: Stage, fingerprint: u64) -> bool {
        self.previous
            .as_ref()
            .and_then(|prev| prev.fingerprint(stage))
            .is_some_and(|prev_fp| prev_fp == fingerprint)
    }

    /// Run (or reuse) the next stage. Returns `None` once every requested
    /// stage is complete.
    pub fn step(&mut self) -> Option<StageReport> {
        let stage = *STAGES.get(self.next)?;
        if self
            .stop_after
            .is_some_and(|stop| stage.index() > stop.index())
        {
            return None;
        }
        self.next += 1;

        let fingerprint =
            stage_fingerprint(self.config, &self.controls, stage, &self.upstream(stage));
        let reused = self.reusable(stage, fingerprint);
        self.fingerprints[stage.index()] = Some(fingerprint);

        match stage {
            Stage::Mesh => {
                let mesh = if reused {
                    std::mem::take(&mut self.previous.as_mut().unwrap().mesh)
                } else {
                    let mut rng = Lcg32::substream(self.controls.seed, tags::MESH);
                    build_mesh(
                        self.config.width as f64,
                        self.config.height as f64,
                        self.controls.spacing,
                        &mut rng,
                        self.controls.intermediate_seed,
                    )
                };
                debug!(
                    "mesh: {} faces, {} edges ({})",
                    mesh.faces.len(),
                    mesh.edges.len(),
                    if reused { "reused" } else { "rebuilt" }
                );
                self.mesh = Some(mesh);
            }
            Stage::Water => {
                let water = if reused {
                    std::mem::take(&mut self.previous.as_mut().unwrap().water)
                } else {
                    water::classify(self.mesh.as_ref().unwrap(), &self.controls)
                };
                debug!(
                    "water: {} land faces ({})",
                    water.land_faces.len(),
                    if reused { "reused" } else { "rebuilt" }
                );
                self.water = Some(water);
            }
            Stage::Elevation => {
                let elevation = if reused {
                    std::mem::take(&mut self.previous.as_mut().unwrap().elevation)
                } else {
                    elevation::build(
                        self.mesh.as_ref().unwrap(),
                        self.water.as_ref().unwrap(),
                        &self.controls,
                    )
                };
                self.elevation = Some(elevation);
            }
            Stage::Rivers => {
                let rivers = if reused {
                    std::mem::take(&mut self.previous.as_mut().unwrap().rivers)
                } else {
                    rivers::trace(
                        self.mesh.as_ref().unwrap(),
                        self.water.as_ref().unwrap(),
                        self.elevation.as_ref().unwrap(),
                        &self.controls,
                    )
                };
                debug!(
                    "rivers: {} traces ({})",
                    rivers.traces.len(),
                    if reused { "reused" } else { "rebuilt" }
                );
                self.rivers = Some(rivers);
            }
            Stage::Provinces => {
                let provinces = if reused {
                    std::mem::take(&mut self.previous.as_mut().unwrap().provinces)
                } else {
                    provinces::build(
                        self.mesh.as_ref().unwrap(),
                        self.water.as_ref().unwrap(),
                        self.elevation.as_ref().unwrap(),
                        self.rivers.as_ref().unwrap(),
                        &self.controls,
                    )
                };
                debug!(
                    "provinces: {} ({})",
                    provinces.provinces.len(),
                    if reused { "reused" } else { "rebuilt" }
                );
                self.provinces = Some(provinces);
            }
        }

        Some(StageReport { stage, reused })
    }

    /// Run any remaining stages and assemble the cache.
    pub fn finish(mut self) -> TerrainCache {
        while self.step().is_some() {}
        TerrainCache {
            config: self.config,
            controls: self.controls,
            mesh: self.mesh.unwrap_or_default(),
            water: self.water.unwrap_or_default(),
            elevation: self.elevation.unwrap_or_default(),
            rivers: self.rivers.unwrap_or_default(),
            provinces: self.provinces.unwrap_or_default(),
            fingerprints: self.fingerprints,
        }
    }
}

impl Iterator for Pipeline {
    type Item = StageReport;

    fn next(&mut self) -> Option<StageReport> {
        self.step()
    }
}

/// Generate a complete cache, reusing unchanged stages from `previous`.
pub fn build(
    config: Config,
    controls: &Controls,
    previous: Option<TerrainCache>,
) -> Result<TerrainCache> {
    build_until(config, controls, previous, None)
}

/// Generate up to and including `stop_after` (or everything when `None`).
pub fn build_until(
    config: Config,
    controls: &Controls,
    previous: Option<TerrainCache>,
    stop_after: Option<Stage>,
) -> Result<TerrainCache> {
    Ok(Pipeline::new(config, controls, previous, stop_after)?.finish())
}
