//! Deterministic realm map generation library
//!
//! A procedural province-map generator featuring:
//! - Poisson-disk Voronoi mesh construction with full adjacency
//! - Warped island-shape land/water classification
//! - Ridge-driven integer elevation synthesis
//! - River tracing along mesh edges with branching
//! - Balanced province partitioning with a political graph
//! - Fingerprinted pipeline stages that recompute only what changed
//! - A weighted face graph with A* navigation, and spatial picking
//!
//! Generation is bit-reproducible: the same config, controls, and seed
//! give the identical map on every machine, so an authoritative server
//! and its clients can each rebuild the world from a small snapshot.

pub mod controls;
pub mod elevation;
pub mod export;
pub mod geometry;
pub mod mesh;
pub mod navigation;
pub mod noise;
pub mod pick;
pub mod pipeline;
pub mod provinces;
pub mod rivers;
pub mod rng;
pub mod water;

pub use controls::{Config, Controls, Error, Result, Snapshot};
pub use pipeline::{build, build_until, Pipeline, Stage, TerrainCache};
