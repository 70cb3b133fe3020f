use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use realm_generator::controls::{Config, Controls, Snapshot};
use realm_generator::export;
use realm_generator::navigation::NavigationGraph;
use realm_generator::pipeline::{self, STAGES};

#[derive(Parser, Debug)]
#[command(name = "realm_generator")]
#[command(about = "Generate deterministic province maps with rivers and navigation data")]
struct Args {
    /// Map width in world units
    #[arg(short = 'W', long, default_value = "512")]
    width: u32,

    /// Map height in world units
    #[arg(short = 'H', long, default_value = "512")]
    height: u32,

    /// Master seed (derives every stage substream)
    #[arg(short, long, default_value = "0")]
    seed: u32,

    /// Seed for edge refinement jitter
    #[arg(long, default_value = "0")]
    intermediate_seed: u32,

    /// Poisson-disk site spacing (16-128)
    #[arg(long, default_value = "64")]
    spacing: f64,

    // === Water shape overrides ===

    /// Sea level shift (-40..40, smaller = more land)
    #[arg(long)]
    water_level: Option<f64>,

    /// Coastline roughness (0..100)
    #[arg(long)]
    water_roughness: Option<f64>,

    /// Island noise strength
    #[arg(long)]
    water_noise_strength: Option<f64>,

    /// Island noise octaves (1..6)
    #[arg(long)]
    water_noise_octaves: Option<u32>,

    /// Domain warp strength (0..0.8)
    #[arg(long)]
    water_warp_strength: Option<f64>,

    // === Elevation overrides ===

    /// Overall land relief (0..1)
    #[arg(long)]
    land_relief: Option<f64>,

    /// Ridge strength (0..1)
    #[arg(long)]
    ridge_strength: Option<f64>,

    /// Number of ridge seeds (1..10)
    #[arg(long)]
    ridge_count: Option<u32>,

    /// Ridge spread radius factor (0..1)
    #[arg(long)]
    ridge_distribution: Option<f64>,

    /// Ridge seed separation weight (0..1)
    #[arg(long)]
    ridge_separation: Option<f64>,

    /// Ridge chain connection weight (0..1)
    #[arg(long)]
    ridge_continuity: Option<f64>,

    /// Ridge widening (0..1)
    #[arg(long)]
    ridge_width: Option<f64>,

    /// Lowland plateau smoothing (0..1)
    #[arg(long)]
    plateau_strength: Option<f64>,

    // === River overrides ===

    /// River source density (0..2)
    #[arg(long)]
    river_density: Option<f64>,

    /// Branch spawn probability (0..1)
    #[arg(long)]
    river_branch_chance: Option<f64>,

    /// Pit escape probability (0..1)
    #[arg(long)]
    river_climb_chance: Option<f64>,

    // === Province overrides ===

    /// Target province count (1..32)
    #[arg(long)]
    province_count: Option<u32>,

    /// Province size jitter (0..0.75)
    #[arg(long)]
    province_size_variance: Option<f64>,

    /// Max elevation provinces grow across (1..32)
    #[arg(long)]
    province_passage_elevation: Option<i32>,

    // === Movement overrides ===

    /// Elevation where step costs start rising (1..31)
    #[arg(long)]
    lowland_threshold: Option<i32>,

    /// Elevation where edges become impassable (2..32)
    #[arg(long)]
    impassable_threshold: Option<i32>,

    /// River crossing penalty (0..8)
    #[arg(long)]
    river_penalty: Option<f64>,

    // === Output ===

    /// Write a PNG of the generated map
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Write a grayscale elevation-data PNG
    #[arg(long)]
    out_data: Option<PathBuf>,

    /// Print an ASCII preview of the map
    #[arg(long)]
    ascii: bool,

    /// Print the snapshot JSON the map can be rebuilt from
    #[arg(long)]
    snapshot: bool,

    /// Show per-stage fingerprints
    #[arg(long)]
    show_fingerprints: bool,

    /// Run a sample navigation query between two far-apart land faces
    #[arg(long)]
    probe_route: bool,
}

macro_rules! apply_overrides {
    ($args:expr, $controls:expr, [$($field:ident),* $(,)?]) => {
        $(
            if let Some(v) = $args.$field {
                $controls.$field = v;
            }
        )*
    };
}

impl Args {
    fn controls(&self) -> Controls {
        let mut controls = Controls {
            seed: self.seed,
            intermediate_seed: self.intermediate_seed,
            spacing: self.spacing,
            ..Controls::default()
        };
        apply_overrides!(
            self,
            controls,
            [
                water_level,
                water_roughness,
                water_noise_strength,
                water_noise_octaves,
                water_warp_strength,
                land_relief,
                ridge_strength,
                ridge_count,
                ridge_distribution,
                ridge_separation,
                ridge_continuity,
                ridge_width,
                plateau_strength,
                river_density,
                river_branch_chance,
                river_climb_chance,
                province_count,
                province_size_variance,
                province_passage_elevation,
                lowland_threshold,
                impassable_threshold,
                river_penalty,
            ]
        );
        controls
    }
}

fn run(args: &Args) -> realm_generator::Result<()> {
    let config = Config::new(args.width, args.height)?;
    let controls = args.controls();

    let cache = pipeline::build(config, &controls, None)?;
    let stats = cache.stats();

    println!(
        "Generated {}x{} map: {} faces ({} land), {} edges, {} river traces, {} provinces",
        args.width,
        args.height,
        stats.faces,
        stats.land_faces,
        stats.edges,
        stats.river_traces,
        stats.provinces
    );

    if args.show_fingerprints {
        for stage in STAGES {
            match cache.fingerprint(stage) {
                Some(fp) => println!("  {:?}: {:016x}", stage, fp),
                None => println!("  {:?}: (not run)", stage),
            }
        }
    }

    if args.probe_route {
        probe_route(&cache);
    }

    if args.ascii {
        print!("{}", export::ascii_preview(&cache, 96));
    }

    if args.snapshot {
        println!("{}", Snapshot::new(config, &cache.controls).to_json()?);
    }

    if let Some(path) = &args.out {
        export::render_map_png(&cache, path)?;
        println!("Wrote {}", path.display());
    }

    if let Some(path) = &args.out_data {
        export::render_elevation_data_png(&cache, path)?;
        println!("Wrote {}", path.display());
    }

    Ok(())
}

/// Route between the two land faces whose sites are farthest apart.
fn probe_route(cache: &pipeline::TerrainCache) {
    let graph = NavigationGraph::from_cache(cache);
    let land = &graph.land_face_ids;
    if land.len() < 2 {
        println!("Route probe: not enough land");
        return;
    }

    let mut best = (land[0], land[0], 0.0f64);
    for &a in land {
        for &b in land {
            let d = cache.face_center(a).distance(cache.face_center(b));
            if d > best.2 {
                best = (a, b, d);
            }
        }
    }

    let path = graph.find_path(&cache.mesh, best.0, best.1);
    if path.is_reachable() {
        println!(
            "Route probe: face {} -> face {} in {} steps, {:.1} face-times ({:.0}s)",
            best.0 .0,
            best.1 .0,
            path.faces.len() - 1,
            path.total_cost,
            graph.travel_time(&path)
        );
    } else {
        println!(
            "Route probe: face {} -> face {} unreachable",
            best.0 .0, best.1 .0
        );
    }
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
