//! Configuration structs with defaults and RON persistence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const FILE_NAME: &str = "sphaera.ron";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub planet: PlanetConfig,
    pub lod: LodConfig,
    pub terrain: TerrainConfig,
    pub worker: WorkerConfig,
    pub camera: CameraConfig,
    pub debug: DebugConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlanetConfig {
    pub base_radius: f64,
    /// Multiplier applied to surface heights.
    pub scaling_factor: f64,
    /// Height of the sky shell above the base radius.
    pub sky_altitude: f64,
    pub ocean: bool,
    pub sky: bool,
}

impl Default for PlanetConfig {
    fn default() -> Self {
        Self {
            base_radius: 6371.0,
            scaling_factor: 1.0,
            sky_altitude: 20.0,
            ocean: true,
            sky: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LodConfig {
    /// Quads along one patch edge. Must be even.
    pub quads: u32,
    /// Border samples around each height field.
    pub padding: u32,
    pub surface_min_depth: u8,
    pub surface_max_depth: u8,
    pub ocean_min_depth: u8,
    pub ocean_max_depth: u8,
    pub sky_min_depth: u8,
    pub sky_max_depth: u8,
    pub texture_tiling_depth: u8,
}

impl Default for LodConfig {
    fn default() -> Self {
        Self {
            quads: 32,
            padding: 2,
            surface_min_depth: 4,
            surface_max_depth: 15,
            ocean_min_depth: 4,
            ocean_max_depth: 15,
            sky_min_depth: 0,
            sky_max_depth: 7,
            texture_tiling_depth: 9,
        }
    }
}

/// Which elevation source feeds the surface layer.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
pub enum TerrainSourceKind {
    /// Flat sphere.
    Constant,
    /// Simplex fBm.
    #[default]
    Fbm,
    /// Oceans, lowlands and ridged mountains.
    Continents,
    /// Equirectangular height map from disk.
    Equirect,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TerrainConfig {
    pub source: TerrainSourceKind,
    pub seed: u32,
    pub octaves: u32,
    pub frequency: f64,
    pub lacunarity: f64,
    pub persistence: f64,
    pub amplitude: f64,
    /// Raw big-endian `i16` file for [`TerrainSourceKind::Equirect`].
    pub heightmap: Option<PathBuf>,
    pub heightmap_width: usize,
    pub heightmap_height: usize,
    /// Multiplier from stored samples to planet units.
    pub heightmap_scale: f64,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            source: TerrainSourceKind::Fbm,
            seed: 0,
            octaves: 8,
            frequency: 1.5,
            lacunarity: 2.0,
            persistence: 0.5,
            amplitude: 6.0,
            heightmap: None,
            heightmap_width: 0,
            heightmap_height: 0,
            heightmap_scale: 0.001,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorkerConfig {
    /// How often the preparation queue is re-sorted by camera distance.
    pub resort_interval_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            resort_interval_ms: 1000,
        }
    }
}

/// Scripted descent used by the demo.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CameraConfig {
    /// Altitude above the base radius at the first frame.
    pub start_altitude: f64,
    /// Lowest altitude the descent reaches.
    pub min_altitude: f64,
    /// Fraction of the remaining altitude covered each frame.
    pub approach_speed: f64,
    pub frames: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            start_altitude: 20_000.0,
            min_altitude: 2.0,
            approach_speed: 0.02,
            frames: 600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log filter, e.g. `info` or `info,sphaera_lod=debug`.
    pub log_level: String,
    /// Directory for JSON log files in debug builds.
    pub log_dir: Option<PathBuf>,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_dir: None,
        }
    }
}

impl Config {
    /// Platform config directory, e.g. `~/.config/sphaera` on Linux.
    pub fn default_dir() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join("sphaera"))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Load the config from `config_dir`, writing the defaults there first
    /// if no file exists.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let path = config_dir.join(FILE_NAME);
        if path.exists() {
            let config = Self::read(&path)?;
            tracing::info!("Loaded config from {}", path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            tracing::info!("Created default config at {}", path.display());
            Ok(config)
        }
    }

    fn read(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        ron::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_owned(),
            source,
        })
    }

    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        let path = config_dir.join(FILE_NAME);
        let write_err = |source| ConfigError::Write {
            path: path.clone(),
            source,
        };
        std::fs::create_dir_all(config_dir).map_err(write_err)?;

        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);
        let serialized = ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::Serialize)?;
        std::fs::write(&path, serialized).map_err(write_err)
    }

    /// Returns `Some(new_config)` if the file on disk differs from `self`.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let new_config = Self::read(&config_dir.join(FILE_NAME))?;
        if &new_config != self {
            tracing::info!("Config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }

    /// Reject values the planet cannot be built with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field, reason: String| Err(ConfigError::Invalid { field, reason });
        let lod = &self.lod;

        if self.planet.base_radius <= 0.0 {
            return invalid("planet.base_radius", "must be positive".into());
        }
        if lod.quads < 2 || lod.quads % 2 != 0 {
            return invalid("lod.quads", format!("{} is not an even number >= 2", lod.quads));
        }
        // Vertex indices are 16-bit.
        if (u64::from(lod.quads) + 1).pow(2) > 1 << 16 {
            return invalid("lod.quads", format!("{} is too large", lod.quads));
        }
        if lod.padding < 1 {
            return invalid("lod.padding", "must be at least 1".into());
        }
        for (field, min, max) in [
            ("lod.surface_max_depth", lod.surface_min_depth, lod.surface_max_depth),
            ("lod.ocean_max_depth", lod.ocean_min_depth, lod.ocean_max_depth),
            ("lod.sky_max_depth", lod.sky_min_depth, lod.sky_max_depth),
        ] {
            if max < min {
                return invalid(field, format!("{max} is below the min depth {min}"));
            }
            if max > 30 {
                return invalid(field, format!("{max} is deeper than 30"));
            }
        }
        if self.terrain.source == TerrainSourceKind::Equirect && self.terrain.heightmap.is_none() {
            return invalid("terrain.heightmap", "required by the equirect source".into());
        }
        Ok(())
    }
}
