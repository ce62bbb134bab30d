//! Fractal Brownian motion over 3D simplex noise, sampled on the unit sphere.

use glam::DVec3;
use noise::{NoiseFn, Simplex};

use crate::{DataSource, DataSourceError};

#[derive(Clone, Debug)]
pub struct FbmParams {
    pub seed: u32,
    pub octaves: u32,
    /// Frequency multiplier between octaves.
    pub lacunarity: f64,
    /// Amplitude multiplier between octaves.
    pub persistence: f64,
    /// Frequency of the first octave, in cycles per planet radius.
    pub frequency: f64,
    /// Amplitude of the first octave, in planet units.
    pub amplitude: f64,
}

impl Default for FbmParams {
    fn default() -> Self {
        Self {
            seed: 0,
            octaves: 8,
            lacunarity: 2.0,
            persistence: 0.5,
            frequency: 1.5,
            amplitude: 6.0,
        }
    }
}

pub struct FbmSource {
    noise: Simplex,
    params: FbmParams,
}

impl FbmSource {
    pub fn new(params: FbmParams) -> Self {
        Self {
            noise: Simplex::new(params.seed),
            params,
        }
    }

    pub fn params(&self) -> &FbmParams {
        &self.params
    }

    /// Sum of all octave amplitudes; bounds `|height|`.
    pub fn max_amplitude(&self) -> f64 {
        (0..self.params.octaves)
            .map(|i| self.params.amplitude * self.params.persistence.powi(i as i32))
            .sum()
    }

    fn sample(&self, p: DVec3) -> f64 {
        let mut total = 0.0;
        let mut frequency = self.params.frequency;
        let mut amplitude = self.params.amplitude;
        for _ in 0..self.params.octaves {
            let q = p * frequency;
            total += self.noise.get([q.x, q.y, q.z]) * amplitude;
            frequency *= self.params.lacunarity;
            amplitude *= self.params.persistence;
        }
        total
    }
}

impl DataSource for FbmSource {
    fn height(&self, position: DVec3) -> Result<f64, DataSourceError> {
        Ok(self.sample(position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_determinism_same_seed_same_point() {
        let a = FbmSource::new(FbmParams { seed: 42, ..Default::default() });
        let b = FbmSource::new(FbmParams { seed: 42, ..Default::default() });
        let p = DVec3::new(0.3, 0.4, 0.5).normalize();
        assert_eq!(a.height(p).unwrap(), b.height(p).unwrap());
    }

    #[test]
    fn test_different_seeds_differ() {
        let a = FbmSource::new(FbmParams { seed: 1, ..Default::default() });
        let b = FbmSource::new(FbmParams { seed: 999, ..Default::default() });
        let differs = (0..32).any(|i| {
            let p = DVec3::new(f64::from(i) * 0.1, 1.0, -0.4).normalize();
            a.height(p).unwrap() != b.height(p).unwrap()
        });
        assert!(differs, "different seeds should produce different terrain");
    }

    #[test]
    fn test_height_bounded_by_max_amplitude() {
        let src = FbmSource::new(FbmParams::default());
        let max = src.max_amplitude();
        for i in 0..200 {
            let t = f64::from(i) * 0.173;
            let p = DVec3::new(t.sin(), t.cos(), (t * 0.7).sin()).normalize();
            let h = src.height(p).unwrap();
            assert!(h.abs() <= max + 1e-9, "height {h} exceeds {max}");
        }
    }
}
