//! Command-line arguments.

use std::path::PathBuf;

use clap::Parser;

use crate::{Config, TerrainSourceKind};

/// CLI values override settings loaded from `sphaera.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "sphaera", about = "Chunked LOD planet renderer")]
pub struct CliArgs {
    /// Terrain noise seed.
    #[arg(long)]
    pub seed: Option<u32>,

    /// Planet base radius.
    #[arg(long)]
    pub radius: Option<f64>,

    /// Quads along one patch edge (even).
    #[arg(long)]
    pub quads: Option<u32>,

    /// Number of frames the demo descent runs.
    #[arg(long)]
    pub frames: Option<u32>,

    /// Surface elevation source.
    #[arg(long, value_enum)]
    pub source: Option<TerrainSourceKind>,

    /// Log filter (error, warn, info, debug, trace, or per-target directives).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Config directory (overrides the platform default).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(seed) = args.seed {
            self.terrain.seed = seed;
        }
        if let Some(radius) = args.radius {
            self.planet.base_radius = radius;
        }
        if let Some(quads) = args.quads {
            self.lod.quads = quads;
        }
        if let Some(frames) = args.frames {
            self.camera.frames = frames;
        }
        if let Some(source) = args.source {
            self.terrain.source = source;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}
