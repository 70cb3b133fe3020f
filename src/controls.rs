//! Generation controls, config validation, and the snapshot record
//!
//! `Controls` is the single closed record of every generation knob. It is
//! normalized on entry: missing JSON fields default, numeric fields clamp
//! to their documented ranges, and unknown fields are dropped. After
//! normalization the only remaining failure modes are the boundary errors
//! in [`Error`]; degenerate worlds (no land, no water) are data, not
//! errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Boundary errors. Nothing else escapes the generator.
#[derive(Error, Debug)]
pub enum Error {
    /// Map extent outside the supported range.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// Controls still degenerate after clamping.
    #[error("invalid controls: {0}")]
    InvalidControls(String),

    /// Export-surface IO failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Export-surface image encoding failure.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// Snapshot (de)serialization failure.
    #[error("snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Supported map extent, in world units per axis.
pub const MIN_MAP_EXTENT: u32 = 256;
pub const MAX_MAP_EXTENT: u32 = 4096;

/// Highest land elevation the generator produces.
pub const MAX_ELEVATION: i32 = 32;

/// Immutable per-generation map extent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Config {
    pub width: u32,
    pub height: u32,
}

impl Config {
    /// Validate and construct. Width and height must both lie in
    /// 256..=4096.
    pub fn new(width: u32, height: u32) -> Result<Self> {
        for (name, value) in [("width", width), ("height", height)] {
            if !(MIN_MAP_EXTENT..=MAX_MAP_EXTENT).contains(&value) {
                return Err(Error::InvalidConfig(format!(
                    "{name} {value} outside {MIN_MAP_EXTENT}..{MAX_MAP_EXTENT}"
                )));
            }
        }
        Ok(Self { width, height })
    }
}

/// Every generation knob, grouped the way the pipeline consumes them.
///
/// All fields are scalar and clamp on entry; see [`Controls::normalized`].
/// Serialization ignores unknown fields and defaults missing ones, so old
/// snapshots keep loading as the record grows.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Controls {
    // === Mesh ===
    /// Poisson-disk minimum site distance (16..128 world units).
    pub spacing: f64,

    // === Seeds ===
    /// Master seed; every stage derives its own substream from it.
    pub seed: u32,
    /// Seed for edge-midpoint refinement jitter.
    pub intermediate_seed: u32,

    // === Water shape ===
    /// Sea level shift (-40..40, smaller produces more land).
    pub water_level: f64,
    /// Coastline bump amplitude (0..100).
    pub water_roughness: f64,
    /// Island-noise frequency.
    pub water_noise_scale: f64,
    /// Island-noise amplitude contribution to the shoreline radius.
    pub water_noise_strength: f64,
    /// Island-noise octave count (1..6).
    pub water_noise_octaves: u32,
    /// Domain-warp field frequency.
    pub water_warp_scale: f64,
    /// Domain-warp offset magnitude (0..0.8 in normalized map units).
    pub water_warp_strength: f64,

    // === Elevation ===
    pub land_relief: f64,
    pub ridge_strength: f64,
    /// Number of ridge seeds (1..10).
    pub ridge_count: u32,
    pub plateau_strength: f64,
    pub ridge_distribution: f64,
    pub ridge_separation: f64,
    pub ridge_continuity: f64,
    pub ridge_continuity_threshold: f64,
    pub ocean_peak_clamp: f64,
    pub ridge_ocean_clamp: f64,
    pub ridge_width: f64,

    // === Rivers ===
    /// Source density multiplier (0..2).
    pub river_density: f64,
    /// Probability of spawning a branch at a visited vertex (0..1).
    pub river_branch_chance: f64,
    /// Probability of escaping a closed basin by one uphill step (0..1).
    pub river_climb_chance: f64,

    // === Provinces ===
    /// Target province count (1..32).
    pub province_count: u32,
    /// Target-size jitter (0..0.75).
    pub province_size_variance: f64,
    /// Growth is forbidden across edges above this elevation.
    pub province_passage_elevation: i32,
    /// Score penalty for growing across a non-barrier river edge.
    pub province_river_penalty: f64,
    /// Seed-allocation weight for tiny islands.
    pub small_island_multiplier: f64,
    /// Seed-allocation weight for dominant landmasses.
    pub large_island_multiplier: f64,

    // === Movement ===
    /// Baseline traversal time for one face at step factor 1.
    pub time_per_face_seconds: f64,
    /// Elevation at or below which movement costs the baseline (1..31).
    pub lowland_threshold: i32,
    /// Elevation at or above which an edge is not traversable (2..32,
    /// forced above `lowland_threshold`).
    pub impassable_threshold: i32,
    /// Exponent on the normalized climb term (0.5..2).
    pub elevation_power: f64,
    /// Gain applied to the climb term (0..4).
    pub elevation_gain_k: f64,
    /// Multiplier added when crossing a river edge (0..8).
    pub river_penalty: f64,
}

impl Default for Controls {
    fn default() -> Self {
        Self {
            spacing: 64.0,
            seed: 0,
            intermediate_seed: 0,
            water_level: 0.0,
            water_roughness: 30.0,
            water_noise_scale: 3.0,
            water_noise_strength: 0.35,
            water_noise_octaves: 4,
            water_warp_scale: 2.0,
            water_warp_strength: 0.3,
            land_relief: 0.5,
            ridge_strength: 0.6,
            ridge_count: 4,
            plateau_strength: 0.35,
            ridge_distribution: 0.5,
            ridge_separation: 0.5,
            ridge_continuity: 0.5,
            ridge_continuity_threshold: 0.5,
            ocean_peak_clamp: 0.0,
            ridge_ocean_clamp: 0.0,
            ridge_width: 0.5,
            river_density: 1.0,
            river_branch_chance: 0.25,
            river_climb_chance: 0.15,
            province_count: 8,
            province_size_variance: 0.25,
            province_passage_elevation: 24,
            province_river_penalty: 24.0,
            small_island_multiplier: 1.0,
            large_island_multiplier: 1.0,
            time_per_face_seconds: 1.0,
            lowland_threshold: 8,
            impassable_threshold: 26,
            elevation_power: 1.0,
            elevation_gain_k: 1.5,
            river_penalty: 2.0,
        }
    }
}

fn clamp_f64(v: f64, min: f64, max: f64) -> f64 {
    if v.is_nan() {
        min
    } else {
        v.clamp(min, max)
    }
}

impl Controls {
    /// Clamp every field to its documented range and enforce the
    /// cross-field constraint `impassable_threshold > lowland_threshold`.
    pub fn normalized(&self) -> Result<Controls> {
        let mut c = self.clone();

        c.spacing = clamp_f64(c.spacing, 16.0, 128.0);

        c.water_level = clamp_f64(c.water_level, -40.0, 40.0);
        c.water_roughness = clamp_f64(c.water_roughness, 0.0, 100.0);
        c.water_noise_scale = clamp_f64(c.water_noise_scale, 0.1, 32.0);
        c.water_noise_strength = clamp_f64(c.water_noise_strength, 0.0, 2.0);
        c.water_noise_octaves = c.water_noise_octaves.clamp(1, 6);
        c.water_warp_scale = clamp_f64(c.water_warp_scale, 0.1, 32.0);
        c.water_warp_strength = clamp_f64(c.water_warp_strength, 0.0, 0.8);

        c.land_relief = clamp_f64(c.land_relief, 0.0, 1.0);
        c.ridge_strength = clamp_f64(c.ridge_strength, 0.0, 1.0);
        c.ridge_count = c.ridge_count.clamp(1, 10);
        c.plateau_strength = clamp_f64(c.plateau_strength, 0.0, 1.0);
        c.ridge_distribution = clamp_f64(c.ridge_distribution, 0.0, 1.0);
        c.ridge_separation = clamp_f64(c.ridge_separation, 0.0, 1.0);
        c.ridge_continuity = clamp_f64(c.ridge_continuity, 0.0, 1.0);
        c.ridge_continuity_threshold = clamp_f64(c.ridge_continuity_threshold, 0.0, 1.0);
        c.ocean_peak_clamp = clamp_f64(c.ocean_peak_clamp, 0.0, 1.0);
        c.ridge_ocean_clamp = clamp_f64(c.ridge_ocean_clamp, 0.0, 1.0);
        c.ridge_width = clamp_f64(c.ridge_width, 0.0, 1.0);

        c.river_density = clamp_f64(c.river_density, 0.0, 2.0);
        c.river_branch_chance = clamp_f64(c.river_branch_chance, 0.0, 1.0);
        c.river_climb_chance = clamp_f64(c.river_climb_chance, 0.0, 1.0);

        c.province_count = c.province_count.clamp(1, 32);
        c.province_size_variance = clamp_f64(c.province_size_variance, 0.0, 0.75);
        c.province_passage_elevation = c.province_passage_elevation.clamp(1, MAX_ELEVATION);
        c.province_river_penalty = clamp_f64(c.province_river_penalty, 0.0, 1024.0);
        c.small_island_multiplier = clamp_f64(c.small_island_multiplier, 0.0, 4.0);
        c.large_island_multiplier = clamp_f64(c.large_island_multiplier, 0.0, 4.0);

        c.time_per_face_seconds = clamp_f64(c.time_per_face_seconds, 0.01, 3600.0);
        c.lowland_threshold = c.lowland_threshold.clamp(1, 31);
        c.impassable_threshold = c.impassable_threshold.clamp(2, MAX_ELEVATION);
        c.impassable_threshold = c.impassable_threshold.max(c.lowland_threshold + 1);
        c.elevation_power = clamp_f64(c.elevation_power, 0.5, 2.0);
        c.elevation_gain_k = clamp_f64(c.elevation_gain_k, 0.0, 4.0);
        c.river_penalty = clamp_f64(c.river_penalty, 0.0, 8.0);

        if c.impassable_threshold > MAX_ELEVATION {
            return Err(Error::InvalidControls(format!(
                "impassable_threshold {} cannot exceed {MAX_ELEVATION}",
                c.impassable_threshold
            )));
        }

        Ok(c)
    }
}

/// Current snapshot schema version.
pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

/// The minimal byte-portable record a world is rebuilt from.
///
/// The generator never serializes caches; transports carry this record and
/// every consumer regenerates the identical world from it. The embedder
/// bumps `terrain_version` each time the snapshot content changes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub schema_version: u32,
    pub controls: Controls,
    pub map_width: u32,
    pub map_height: u32,
}

impl Snapshot {
    pub fn new(config: Config, controls: &Controls) -> Self {
        Self {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            controls: controls.clone(),
            map_width: config.width,
            map_height: config.height,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse and validate a snapshot. The embedded controls come back
    /// normalized; unknown fields in the JSON are ignored.
    pub fn from_json(json: &str) -> Result<(Config, Controls)> {
        let snapshot: Snapshot = serde_json::from_str(json)?;
        let config = Config::new(snapshot.map_width, snapshot.map_height)?;
        let controls = snapshot.controls.normalized()?;
        Ok((config, controls))
    }
}
