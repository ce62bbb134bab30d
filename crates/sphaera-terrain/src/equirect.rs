//! Elevation from a longitude/latitude grid.

use std::io::Read;
use std::path::Path;

use glam::DVec3;

use crate::{DataSource, DataSourceError};

/// An equirectangular height map. Column 0 is longitude `-pi`, row 0 is the
/// north pole. Sampling is bilinear, wrapping in longitude.
#[derive(Clone, Debug)]
pub struct EquirectSource {
    width: usize,
    height: usize,
    samples: Vec<f64>,
}

impl EquirectSource {
    pub fn new(width: usize, height: usize, samples: Vec<f64>) -> Result<Self, DataSourceError> {
        if width < 2 || height < 2 || samples.len() != width * height {
            return Err(DataSourceError::InvalidDimensions {
                width,
                height,
                len: samples.len(),
            });
        }
        Ok(Self {
            width,
            height,
            samples,
        })
    }

    /// Read a headerless file of big-endian `i16` samples, multiplying each
    /// by `scale`.
    pub fn from_raw_i16_be(
        path: &Path,
        width: usize,
        height: usize,
        scale: f64,
    ) -> Result<Self, DataSourceError> {
        let mut bytes = Vec::new();
        std::fs::File::open(path)?.read_to_end(&mut bytes)?;
        if bytes.len() != width * height * 2 {
            return Err(DataSourceError::InvalidDimensions {
                width,
                height,
                len: bytes.len() / 2,
            });
        }
        let samples = bytes
            .chunks_exact(2)
            .map(|c| f64::from(i16::from_be_bytes([c[0], c[1]])) * scale)
            .collect();
        Self::new(width, height, samples)
    }

    fn at(&self, col: usize, row: usize) -> f64 {
        self.samples[row * self.width + col]
    }
}

impl DataSource for EquirectSource {
    fn height(&self, position: DVec3) -> Result<f64, DataSourceError> {
        let p = position.normalize_or_zero();
        if p == DVec3::ZERO {
            return Err(DataSourceError::Sample {
                position,
                reason: "zero-length direction".to_owned(),
            });
        }
        let lat = p.y.clamp(-1.0, 1.0).asin();
        let lon = p.z.atan2(p.x);

        let fx = (lon + std::f64::consts::PI) / std::f64::consts::TAU * self.width as f64;
        let fy = ((std::f64::consts::FRAC_PI_2 - lat) / std::f64::consts::PI
            * (self.height - 1) as f64)
            .clamp(0.0, (self.height - 1) as f64);

        let x0 = fx.floor();
        let y0 = fy.floor();
        let tx = fx - x0;
        let ty = fy - y0;
        let c0 = (x0 as usize) % self.width;
        let c1 = (c0 + 1) % self.width;
        let r0 = y0 as usize;
        let r1 = (r0 + 1).min(self.height - 1);

        let top = self.at(c0, r0) * (1.0 - tx) + self.at(c1, r0) * tx;
        let bottom = self.at(c0, r1) * (1.0 - tx) + self.at(c1, r1) * tx;
        Ok(top * (1.0 - ty) + bottom * ty)
    }
}
