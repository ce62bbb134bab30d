//! The elevation sampling contract.

use glam::DVec3;
use sphaera_cubesphere::Footprint;

#[derive(Debug, thiserror::Error)]
pub enum DataSourceError {
    #[error("failed to sample height at {position}: {reason}")]
    Sample { position: DVec3, reason: String },
    #[error("data source does not support bulk sampling")]
    BulkUnsupported,
    #[error("bulk sampling returned {actual} samples, expected {expected}")]
    BulkSize { expected: usize, actual: usize },
    #[error("height map of {width}x{height} cannot hold {len} samples")]
    InvalidDimensions { width: usize, height: usize, len: usize },
    #[error("failed to read height map: {0}")]
    Io(#[from] std::io::Error),
}

/// A scalar elevation field over the unit sphere.
///
/// Implementations must be deterministic for a fixed input and safe to call
/// concurrently from the preparation worker.
pub trait DataSource: Send + Sync {
    /// Elevation at `position`, a unit-length direction from the planet centre.
    fn height(&self, position: DVec3) -> Result<f64, DataSourceError>;

    /// Whether [`DataSource::bulk_heights`] is implemented.
    fn supports_bulk(&self) -> bool {
        false
    }

    /// Fill a whole `(quads + 2 * padding + 1)^2` grid over `footprint` in
    /// one call, row-major from grid `(-padding, -padding)`.
    fn bulk_heights(
        &self,
        _quads: u32,
        _padding: u32,
        _footprint: &Footprint,
    ) -> Result<Vec<f64>, DataSourceError> {
        Err(DataSourceError::BulkUnsupported)
    }
}

/// The same elevation everywhere. Used for the ocean and sky shells.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ConstantSource {
    pub value: f64,
}

impl ConstantSource {
    pub fn new(value: f64) -> Self {
        Self { value }
    }
}

impl DataSource for ConstantSource {
    fn height(&self, _position: DVec3) -> Result<f64, DataSourceError> {
        Ok(self.value)
    }

    fn supports_bulk(&self) -> bool {
        true
    }

    fn bulk_heights(
        &self,
        quads: u32,
        padding: u32,
        _footprint: &Footprint,
    ) -> Result<Vec<f64>, DataSourceError> {
        let side = (quads + 2 * padding + 1) as usize;
        Ok(vec![self.value; side * side])
    }
}
