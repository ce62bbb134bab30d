//! Continents, lowlands and mountain ranges.
//!
//! A low-frequency continent field decides between open ocean and land.
//! On land a second field decides between gentle lowlands and ridged
//! mountains. Both decisions blend over a narrow falloff band so coastlines
//! and foothills have no hard steps.

use glam::DVec3;
use noise::{Fbm, MultiFractal, NoiseFn, Perlin, RidgedMulti};

use crate::{DataSource, DataSourceError};

#[derive(Clone, Debug)]
pub struct ContinentParams {
    pub seed: u32,
    /// Input scale applied to the unit-sphere position.
    pub frequency: f64,
    /// Output scale, in planet units.
    pub amplitude: f64,
    /// Value of the ocean floor before `amplitude` is applied.
    pub ocean_floor: f64,
}

impl Default for ContinentParams {
    fn default() -> Self {
        Self {
            seed: 0,
            frequency: 1.0,
            amplitude: 8.0,
            ocean_floor: -1.0,
        }
    }
}

pub struct ContinentSource {
    continents: Fbm<Perlin>,
    mountains: RidgedMulti<Perlin>,
    lowlands: Fbm<Perlin>,
    mountain_definition: Fbm<Perlin>,
    params: ContinentParams,
}

const MOUNTAIN_SCALE: f64 = 0.8;
const MOUNTAIN_BIAS: f64 = 0.2;
const MOUNTAIN_POINT_SCALE: f64 = 250.0;
const LOWLAND_SCALE: f64 = 0.2;
const LOWLAND_BIAS: f64 = -0.8;
const DEFINITION_POINT_SCALE: f64 = 10.0;
const MOUNTAIN_THRESHOLD: f64 = 0.5;
const COAST_THRESHOLD: f64 = 0.0;
const FALLOFF: f64 = 0.1;

impl ContinentSource {
    pub fn new(params: ContinentParams) -> Self {
        let seed = params.seed;
        Self {
            continents: Fbm::<Perlin>::new(seed)
                .set_octaves(12)
                .set_lacunarity(2.0)
                .set_persistence(0.625),
            mountains: RidgedMulti::<Perlin>::new(seed.wrapping_add(1)).set_octaves(12),
            lowlands: Fbm::<Perlin>::new(seed.wrapping_add(2)).set_octaves(7),
            mountain_definition: Fbm::<Perlin>::new(seed.wrapping_add(3)).set_octaves(12),
            params,
        }
    }

    pub fn params(&self) -> &ContinentParams {
        &self.params
    }

    fn sample(&self, p: DVec3) -> f64 {
        let p = p * self.params.frequency;
        let at = |scale: f64| [p.x * scale, p.y * scale, p.z * scale];

        let continent = self.continents.get(at(1.0));
        let mountains = self.mountains.get(at(MOUNTAIN_POINT_SCALE)) * MOUNTAIN_SCALE + MOUNTAIN_BIAS;
        let lowlands = self.lowlands.get(at(1.0)) * LOWLAND_SCALE + LOWLAND_BIAS;
        let definition = self.mountain_definition.get(at(DEFINITION_POINT_SCALE));

        let land = select(lowlands, mountains, definition, MOUNTAIN_THRESHOLD, FALLOFF);
        select(self.params.ocean_floor, land, continent, COAST_THRESHOLD, FALLOFF) * self.params.amplitude
    }
}

impl DataSource for ContinentSource {
    fn height(&self, position: DVec3) -> Result<f64, DataSourceError> {
        let h = self.sample(position);
        if h.is_finite() {
            Ok(h)
        } else {
            Err(DataSourceError::Sample {
                position,
                reason: format!("non-finite elevation {h}"),
            })
        }
    }
}

/// `above` where `control >= threshold`, `below` otherwise, blended with an
/// s-curve over `threshold +/- falloff`.
fn select(below: f64, above: f64, control: f64, threshold: f64, falloff: f64) -> f64 {
    if control < threshold - falloff {
        below
    } else if control > threshold + falloff {
        above
    } else {
        let t = (control - (threshold - falloff)) / (2.0 * falloff);
        let s = t * t * (3.0 - 2.0 * t);
        below + (above - below) * s
    }
}
