//! Turns the config into a surface source and planet settings.

use std::sync::Arc;
use std::time::Duration;

use sphaera_config::{Config, TerrainConfig, TerrainSourceKind};
use sphaera_planet::{LayerSettings, PlanetSettings};
use sphaera_terrain::{
    ConstantSource, ContinentParams, ContinentSource, DataSource, DataSourceError, EquirectSource,
    FbmParams, FbmSource,
};

pub fn build_source(terrain: &TerrainConfig) -> Result<Arc<dyn DataSource>, DataSourceError> {
    let source: Arc<dyn DataSource> = match terrain.source {
        TerrainSourceKind::Constant => Arc::new(ConstantSource::new(0.0)),
        TerrainSourceKind::Fbm => Arc::new(FbmSource::new(FbmParams {
            seed: terrain.seed,
            octaves: terrain.octaves,
            lacunarity: terrain.lacunarity,
            persistence: terrain.persistence,
            frequency: terrain.frequency,
            amplitude: terrain.amplitude,
        })),
        TerrainSourceKind::Continents => Arc::new(ContinentSource::new(ContinentParams {
            seed: terrain.seed,
            frequency: terrain.frequency,
            amplitude: terrain.amplitude,
            ..ContinentParams::default()
        })),
        TerrainSourceKind::Equirect => {
            let Some(path) = &terrain.heightmap else {
                return Err(DataSourceError::InvalidDimensions {
                    width: terrain.heightmap_width,
                    height: terrain.heightmap_height,
                    len: 0,
                });
            };
            Arc::new(EquirectSource::from_raw_i16_be(
                path,
                terrain.heightmap_width,
                terrain.heightmap_height,
                terrain.heightmap_scale,
            )?)
        }
    };
    tracing::info!("Surface source: {:?} (seed {})", terrain.source, terrain.seed);
    Ok(source)
}

pub fn planet_settings(config: &Config) -> PlanetSettings {
    let lod = &config.lod;
    PlanetSettings {
        base_radius: config.planet.base_radius,
        scaling_factor: config.planet.scaling_factor,
        sky_altitude: config.planet.sky_altitude,
        quads: lod.quads,
        padding: lod.padding,
        texture_tiling_depth: lod.texture_tiling_depth,
        resort_interval: Duration::from_millis(config.worker.resort_interval_ms),
        surface: LayerSettings {
            enabled: true,
            min_depth: lod.surface_min_depth,
            max_depth: lod.surface_max_depth,
        },
        ocean: LayerSettings {
            enabled: config.planet.ocean,
            min_depth: lod.ocean_min_depth,
            max_depth: lod.ocean_max_depth,
        },
        sky: LayerSettings {
            enabled: config.planet.sky,
            min_depth: lod.sky_min_depth,
            max_depth: lod.sky_max_depth,
        },
    }
}
