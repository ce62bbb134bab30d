//! Configuration for the planet renderer.
//!
//! Settings persist to disk as a RON file. CLI arguments parsed with clap
//! override individual values, and [`Config::reload`] detects on-disk edits.
//! Every section is `#[serde(default)]`, so older and newer files both load.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{
    CameraConfig, Config, DebugConfig, LodConfig, PlanetConfig, TerrainConfig, TerrainSourceKind,
    WorkerConfig,
};
pub use error::ConfigError;
